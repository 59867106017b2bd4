use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Template, TemplateInfo, TemplateParameters, WorkflowZone};
use crate::entity::EntityData;
use crate::errors::TemplateError;
use crate::instructions::LayerSpec;

static BUILTIN: Lazy<TemplateCatalog> = Lazy::new(TemplateCatalog::new);

const DIMENSION_WEIGHT: f64 = 0.4;
const STYLE_WEIGHT: f64 = 0.3;
const PARTIAL_STYLE_WEIGHT: f64 = 0.15;
const APPLIANCE_WEIGHT: f64 = 0.3;

/// 模板推荐的输入条件。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub dimensions: Option<[f64; 2]>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub appliances: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub template_name: String,
    pub score: f64,
    pub description: String,
    pub reasons: Vec<String>,
}

/// 内置只读模板目录，保持声明顺序。
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self {
            templates: vec![
                modern_l_shaped(),
                compact_galley(),
                u_shaped_luxury(),
                open_plan_modern(),
                traditional_country(),
            ],
        }
    }

    /// 进程共享的内置目录。
    pub fn builtin() -> &'static TemplateCatalog {
        &BUILTIN
    }

    pub fn from_templates(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    fn find(&self, name: &str) -> Result<&Template, TemplateError> {
        self.templates
            .iter()
            .find(|template| template.name == name)
            .ok_or_else(|| TemplateError::NotFound {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// 返回模板副本，目录本身不会被修改。
    pub fn get(&self, name: &str) -> Result<Template, TemplateError> {
        self.find(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.templates.iter().map(|template| template.name.clone()).collect()
    }

    pub fn info(&self, name: &str) -> Result<TemplateInfo, TemplateError> {
        self.find(name).map(Template::info)
    }

    /// 按需求为全部模板打分，从高到低排序。
    pub fn suggest(&self, requirements: &Requirements) -> Vec<Suggestion> {
        let mut suggestions: Vec<Suggestion> = self
            .templates
            .iter()
            .map(|template| Suggestion {
                template_name: template.name.clone(),
                score: score(template, requirements),
                description: template.description.clone(),
                reasons: reasons(template, requirements),
            })
            .collect();
        suggestions.sort_by(|a, b| b.score.total_cmp(&a.score));
        suggestions
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn score(template: &Template, requirements: &Requirements) -> f64 {
    let mut score = 0.0;

    if let Some([width, height]) = requirements.dimensions {
        let [rec_width, rec_height] = template.parameters.recommended_dimensions;
        let width_diff = (width - rec_width).abs() / rec_width;
        let height_diff = (height - rec_height).abs() / rec_height;
        score += (1.0 - (width_diff + height_diff) / 2.0).max(0.0) * DIMENSION_WEIGHT;
    }

    if let Some(style) = requirements.style.as_deref().map(str::to_lowercase) {
        let template_style = template.style.to_lowercase();
        if !style.is_empty() {
            if template_style == style {
                score += STYLE_WEIGHT;
            } else if template_style.contains(&style) {
                score += PARTIAL_STYLE_WEIGHT;
            }
        }
    }

    let requested: HashSet<&str> = requirements.appliances.iter().map(String::as_str).collect();
    if !requested.is_empty() {
        let overlap = template
            .appliances_included
            .iter()
            .filter(|appliance| requested.contains(appliance.as_str()))
            .count();
        score += overlap as f64 / requested.len() as f64 * APPLIANCE_WEIGHT;
    }

    score.min(1.0)
}

fn reasons(template: &Template, requirements: &Requirements) -> Vec<String> {
    let mut reasons = Vec::new();
    if let Some([width, _]) = requirements.dimensions {
        let rec_width = template.parameters.recommended_dimensions[0];
        if (width - rec_width).abs() < rec_width * 0.2 {
            reasons.push("Good dimension match".to_string());
        }
    }
    if let Some(style) = requirements.style.as_deref().map(str::to_lowercase) {
        if !style.is_empty() && template.style.to_lowercase() == style {
            reasons.push(format!("Perfect {style} style match"));
        }
    }
    reasons
}

fn rectangle(points: [[f64; 2]; 4], layer: &str) -> EntityData {
    EntityData::new(json!({
        "type": "rectangle",
        "points": points,
        "layer": layer,
    }))
}

fn label(position: [f64; 2], content: &str, height: f64) -> EntityData {
    EntityData::new(json!({
        "type": "text",
        "position": position,
        "text": content,
        "height": height,
        "layer": "Text",
    }))
}

fn room(width: f64, height: f64) -> EntityData {
    rectangle([[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]], "Walls")
}

fn layers(entries: &[(&str, i64)]) -> Vec<LayerSpec> {
    entries
        .iter()
        .map(|(name, color)| LayerSpec::new(*name, *color))
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn zones(entries: &[(&str, [f64; 2], f64)]) -> BTreeMap<String, WorkflowZone> {
    entries
        .iter()
        .map(|(name, center, radius)| {
            (
                name.to_string(),
                WorkflowZone {
                    center: *center,
                    radius: *radius,
                },
            )
        })
        .collect()
}

fn standard_options() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("cabinet_style".to_string(), strings(&["flat_panel", "shaker", "raised_panel"])),
        ("color_scheme".to_string(), strings(&["white", "gray", "wood_tone", "black"])),
        (
            "counter_material".to_string(),
            strings(&["quartz", "granite", "marble", "concrete"]),
        ),
    ])
}

fn parameters(min: [f64; 2], recommended: [f64; 2]) -> TemplateParameters {
    TemplateParameters {
        min_dimensions: min,
        recommended_dimensions: recommended,
        applied_dimensions: None,
        scaling_factors: None,
        style: None,
    }
}

fn modern_l_shaped() -> Template {
    Template {
        name: "modern_l_shaped".to_string(),
        description: "Modern L-shaped kitchen with optional island".to_string(),
        style: "modern".to_string(),
        layout_type: "l_shaped".to_string(),
        parameters: parameters([3000.0, 2500.0], [4000.0, 3000.0]),
        appliances_included: strings(&["refrigerator", "stove", "sink", "dishwasher"]),
        layers: layers(&[
            ("Walls", 7),
            ("Cabinets", 3),
            ("Appliances", 5),
            ("Dimensions", 2),
            ("Text", 1),
        ]),
        figures: vec![
            room(4000.0, 3000.0),
            rectangle(
                [[100.0, 100.0], [3900.0, 100.0], [3900.0, 700.0], [100.0, 700.0]],
                "Cabinets",
            ),
            rectangle(
                [[100.0, 700.0], [700.0, 700.0], [700.0, 2900.0], [100.0, 2900.0]],
                "Cabinets",
            ),
            label([2000.0, 1500.0], "Modern L-Shaped Kitchen", 100.0),
        ],
        workflow_zones: zones(&[
            ("cooking", [2000.0, 400.0], 600.0),
            ("cleaning", [3200.0, 400.0], 500.0),
            ("storage", [400.0, 1800.0], 700.0),
        ]),
        customization_options: standard_options(),
        customization_applied: None,
    }
}

fn compact_galley() -> Template {
    Template {
        name: "compact_galley".to_string(),
        description: "Compact galley kitchen for small spaces".to_string(),
        style: "modern".to_string(),
        layout_type: "galley".to_string(),
        parameters: parameters([1800.0, 2400.0], [2400.0, 3600.0]),
        appliances_included: strings(&["refrigerator", "stove", "sink"]),
        layers: layers(&[("Walls", 7), ("Cabinets", 3), ("Appliances", 5)]),
        figures: vec![
            room(2400.0, 3600.0),
            rectangle(
                [[100.0, 100.0], [2300.0, 100.0], [2300.0, 700.0], [100.0, 700.0]],
                "Cabinets",
            ),
            rectangle(
                [[100.0, 2900.0], [2300.0, 2900.0], [2300.0, 3500.0], [100.0, 3500.0]],
                "Cabinets",
            ),
        ],
        workflow_zones: zones(&[
            ("cooking", [1200.0, 400.0], 500.0),
            ("cleaning", [1200.0, 3200.0], 500.0),
        ]),
        customization_options: standard_options(),
        customization_applied: None,
    }
}

fn u_shaped_luxury() -> Template {
    Template {
        name: "u_shaped_luxury".to_string(),
        description: "Luxury U-shaped kitchen with premium appliances".to_string(),
        style: "modern".to_string(),
        layout_type: "u_shaped".to_string(),
        parameters: parameters([4000.0, 3500.0], [5000.0, 4000.0]),
        appliances_included: strings(&[
            "refrigerator",
            "stove",
            "sink",
            "dishwasher",
            "oven",
            "microwave",
        ]),
        layers: layers(&[("Walls", 7), ("Cabinets", 3), ("Appliances", 5), ("Luxury", 1)]),
        figures: vec![
            room(5000.0, 4000.0),
            rectangle(
                [[100.0, 100.0], [4900.0, 100.0], [4900.0, 700.0], [100.0, 700.0]],
                "Cabinets",
            ),
            rectangle(
                [[100.0, 700.0], [700.0, 700.0], [700.0, 3900.0], [100.0, 3900.0]],
                "Cabinets",
            ),
            rectangle(
                [[4300.0, 700.0], [4900.0, 700.0], [4900.0, 3900.0], [4300.0, 3900.0]],
                "Cabinets",
            ),
        ],
        workflow_zones: zones(&[
            ("cooking", [2500.0, 400.0], 700.0),
            ("cleaning", [400.0, 2300.0], 600.0),
            ("storage", [4600.0, 2300.0], 600.0),
        ]),
        customization_options: standard_options(),
        customization_applied: None,
    }
}

fn open_plan_modern() -> Template {
    Template {
        name: "open_plan_modern".to_string(),
        description: "Open plan modern kitchen with dining integration".to_string(),
        style: "modern".to_string(),
        layout_type: "open_plan".to_string(),
        parameters: parameters([5000.0, 4000.0], [6000.0, 4500.0]),
        appliances_included: strings(&["island", "refrigerator", "stove", "sink", "dishwasher"]),
        layers: layers(&[("Walls", 7), ("Cabinets", 3), ("Appliances", 5), ("Dining", 4)]),
        figures: vec![
            room(6000.0, 4500.0),
            rectangle(
                [[100.0, 100.0], [5900.0, 100.0], [5900.0, 700.0], [100.0, 700.0]],
                "Cabinets",
            ),
            rectangle(
                [[2000.0, 1800.0], [4000.0, 1800.0], [4000.0, 2700.0], [2000.0, 2700.0]],
                "Cabinets",
            ),
            EntityData::new(json!({
                "type": "circle",
                "center": [3000.0, 3700.0],
                "radius": 600.0,
                "layer": "Dining",
            })),
        ],
        workflow_zones: zones(&[
            ("cooking", [3000.0, 400.0], 800.0),
            ("island", [3000.0, 2250.0], 900.0),
            ("dining", [3000.0, 3700.0], 800.0),
        ]),
        customization_options: standard_options(),
        customization_applied: None,
    }
}

fn traditional_country() -> Template {
    Template {
        name: "traditional_country".to_string(),
        description: "Traditional country-style kitchen with farmhouse elements".to_string(),
        style: "traditional".to_string(),
        layout_type: "l_shaped".to_string(),
        parameters: parameters([3500.0, 3000.0], [4500.0, 3500.0]),
        appliances_included: strings(&["refrigerator", "stove", "sink", "pantry"]),
        layers: layers(&[("Walls", 7), ("Cabinets", 6), ("Appliances", 4), ("Traditional", 2)]),
        figures: vec![
            room(4500.0, 3500.0),
            rectangle(
                [[100.0, 100.0], [4400.0, 100.0], [4400.0, 700.0], [100.0, 700.0]],
                "Cabinets",
            ),
            rectangle(
                [[1500.0, 1500.0], [3000.0, 1500.0], [3000.0, 2300.0], [1500.0, 2300.0]],
                "Traditional",
            ),
        ],
        workflow_zones: zones(&[
            ("cooking", [2250.0, 400.0], 700.0),
            ("gathering", [2250.0, 1900.0], 900.0),
        ]),
        customization_options: standard_options(),
        customization_applied: None,
    }
}
