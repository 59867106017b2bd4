use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::{Customization, CustomizationRecord, Template};
use crate::coordinates::coerce_number;
use crate::entity::EntityData;
use crate::errors::TemplateError;

/// 随宽高分别缩放的单点字段。
const POINT_FIELDS: &[&str] = &[
    "center",
    "start",
    "end",
    "position",
    "dimline_point",
    "radius_point",
    "base_point",
    "origin",
    "major_axis",
    "offset",
    "corner1",
    "corner2",
];

/// 方向向量：按宽高比例变换但不取整，处理阶段会重新归一化。
const DIRECTION_FIELDS: &[&str] = &["x_axis", "y_axis"];

/// 随宽高分别缩放的点列字段。
const POINT_LIST_FIELDS: &[&str] = &["points", "vertices", "boundary", "control_points"];

/// 按较小比例缩放的长度字段，保持圆形不变形。
const LENGTH_FIELDS: &[&str] = &["radius", "height", "text_height", "axis_length"];

struct ApplianceSpec {
    name: &'static str,
    layer: &'static str,
    size: [f64; 2],
    position_factor: [f64; 2],
}

const APPLIANCES: &[ApplianceSpec] = &[
    ApplianceSpec {
        name: "microwave",
        layer: "Appliances",
        size: [600.0, 400.0],
        position_factor: [0.7, 0.2],
    },
    ApplianceSpec {
        name: "oven",
        layer: "Appliances",
        size: [600.0, 600.0],
        position_factor: [0.3, 0.2],
    },
    ApplianceSpec {
        name: "pantry",
        layer: "Cabinets",
        size: [800.0, 600.0],
        position_factor: [0.9, 0.8],
    },
    ApplianceSpec {
        name: "wine_cooler",
        layer: "Appliances",
        size: [400.0, 600.0],
        position_factor: [0.1, 0.8],
    },
];

struct StyleConfig {
    name: &'static str,
    layer_colors: &'static [(&'static str, i64)],
    defaults: &'static [(&'static str, &'static [&'static str])],
}

const STYLES: &[StyleConfig] = &[
    StyleConfig {
        name: "modern",
        layer_colors: &[("Cabinets", 3), ("Appliances", 5), ("Island", 6), ("Text", 1)],
        defaults: &[
            ("cabinet_style", &["flat_panel"]),
            ("color_scheme", &["white", "gray"]),
            ("counter_material", &["quartz", "granite"]),
        ],
    },
    StyleConfig {
        name: "traditional",
        layer_colors: &[("Cabinets", 30), ("Appliances", 5), ("Island", 32), ("Text", 1)],
        defaults: &[
            ("cabinet_style", &["shaker", "raised_panel"]),
            ("color_scheme", &["wood_tone", "cream"]),
            ("counter_material", &["granite", "marble"]),
        ],
    },
    StyleConfig {
        name: "industrial",
        layer_colors: &[("Cabinets", 8), ("Appliances", 251), ("Island", 9), ("Text", 7)],
        defaults: &[
            ("cabinet_style", &["flat_panel"]),
            ("color_scheme", &["gray", "black"]),
            ("counter_material", &["stainless_steel", "concrete"]),
        ],
    },
];

/// 定制结果及过程中产生的告警。
#[derive(Debug, Clone, PartialEq)]
pub struct Customized {
    pub template: Template,
    pub warnings: Vec<String>,
}

/// 模板定制流水线。每一步都基于输入模板的副本，目录中的模板保持不变。
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateCustomizer;

impl TemplateCustomizer {
    pub fn new() -> Self {
        Self
    }

    /// 将模板缩放到 `width` x `height`（毫米）。基准为当前生效尺寸，因此缩放可逆。
    pub fn apply_dimensions(
        &self,
        template: &Template,
        width: f64,
        height: f64,
    ) -> Result<Template, TemplateError> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(TemplateError::InvalidDimensions(format!(
                "dimensions must be positive, got [{width}, {height}]"
            )));
        }
        let [base_width, base_height] = template.parameters.current_dimensions();
        let scale = [width / base_width, height / base_height];
        info!(
            template = %template.name,
            width,
            height,
            width_scale = scale[0],
            height_scale = scale[1],
            "缩放模板"
        );

        let mut scaled = template.clone();
        scaled.parameters.applied_dimensions = Some([width, height]);
        scaled.parameters.scaling_factors = Some(scale);
        scaled.figures = template
            .figures
            .iter()
            .map(|figure| scale_figure(figure, scale))
            .collect();

        let min_scale = scale[0].min(scale[1]);
        for zone in scaled.workflow_zones.values_mut() {
            zone.center = [
                (zone.center[0] * scale[0]).round(),
                (zone.center[1] * scale[1]).round(),
            ];
            zone.radius = (zone.radius * min_scale).round();
        }
        Ok(scaled)
    }

    /// 追加电器。已包含的电器跳过；已知电器按最终尺寸的比例位置生成矩形。
    pub fn add_appliances(&self, template: &Template, appliances: &[String]) -> Customized {
        let mut modified = template.clone();
        let mut warnings = Vec::new();
        let [width, height] = modified.parameters.current_dimensions();

        for appliance in appliances {
            if modified.appliances_included.contains(appliance) {
                debug!(appliance = %appliance, "电器已存在，跳过");
                continue;
            }
            modified.appliances_included.push(appliance.clone());
            match APPLIANCES.iter().find(|spec| spec.name == appliance) {
                Some(spec) => modified.figures.push(appliance_figure(spec, width, height)),
                None => {
                    warn!(appliance = %appliance, "未知电器类型，不生成图元");
                    warnings.push(format!("Unknown appliance type: {appliance}"));
                }
            }
        }
        Customized {
            template: modified,
            warnings,
        }
    }

    /// 按风格重映射图层颜色，并标注推荐的定制选项。未知风格回退到 modern。
    pub fn apply_style_modifications(&self, template: &Template, style: &str) -> Customized {
        let mut styled = template.clone();
        let mut warnings = Vec::new();
        let config = match STYLES.iter().find(|config| config.name == style) {
            Some(config) => config,
            None => {
                warn!(style, "未知风格，回退到 modern");
                warnings.push(format!("Unknown style `{style}`, using modern"));
                &STYLES[0]
            }
        };

        styled.parameters.style = Some(style.to_string());
        for layer in &mut styled.layers {
            if let Some((_, color)) = config
                .layer_colors
                .iter()
                .find(|(name, _)| *name == layer.name)
            {
                layer.color = *color;
            }
        }
        for (option, values) in config.defaults {
            if styled.customization_options.contains_key(*option) {
                styled.customization_options.insert(
                    format!("{option}_recommended"),
                    values.iter().map(|value| value.to_string()).collect(),
                );
            }
        }
        Customized {
            template: styled,
            warnings,
        }
    }

    /// 固定顺序：风格 → 尺寸 → 电器（电器位置依赖最终尺寸）。
    pub fn combine_customizations(
        &self,
        template: &Template,
        customization: &Customization,
    ) -> Result<Customized, TemplateError> {
        let mut warnings = Vec::new();
        let mut current = template.clone();

        if let Some(style) = &customization.style {
            let styled = self.apply_style_modifications(&current, style);
            warnings.extend(styled.warnings);
            current = styled.template;
        }

        let dimensions = match customization.dimensions.as_deref() {
            Some([width, height]) => {
                current = self.apply_dimensions(&current, *width, *height)?;
                Some([*width, *height])
            }
            Some(other) => {
                return Err(TemplateError::InvalidDimensions(format!(
                    "expected [width, height], got {} values",
                    other.len()
                )));
            }
            None => None,
        };

        if !customization.appliances.is_empty() {
            let extended = self.add_appliances(&current, &customization.appliances);
            warnings.extend(extended.warnings);
            current = extended.template;
        }

        current.customization_applied = Some(CustomizationRecord {
            dimensions,
            appliances_added: customization.appliances.clone(),
            style: customization.style.clone(),
            timestamp: Utc::now().to_rfc3339(),
        });
        Ok(Customized {
            template: current,
            warnings,
        })
    }
}

fn appliance_figure(spec: &ApplianceSpec, width: f64, height: f64) -> EntityData {
    let [w, h] = spec.size;
    let x = (width * spec.position_factor[0] - w / 2.0).round();
    let y = (height * spec.position_factor[1] - h / 2.0).round();
    EntityData::new(json!({
        "type": "rectangle",
        "layer": spec.layer,
        "points": [[x, y], [x + w, y], [x + w, y + h], [x, y + h]],
        "description": title_case(spec.name),
        "appliance_type": spec.name,
        "added_by_customizer": true,
    }))
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn scale_figure(figure: &EntityData, scale: [f64; 2]) -> EntityData {
    let Some(object) = figure.as_object() else {
        return figure.clone();
    };
    let mut object = object.clone();
    let is_viewport = figure.kind_tag() == Some("viewport");

    for field in POINT_FIELDS {
        if let Some(point) = object.get_mut(*field) {
            scale_point(point, scale);
        }
    }
    for field in POINT_LIST_FIELDS {
        if let Some(Value::Array(points)) = object.get_mut(*field) {
            for point in points {
                scale_point(point, scale);
            }
        }
    }
    for field in DIRECTION_FIELDS {
        if let Some(Value::Array(coords)) = object.get_mut(*field) {
            for (coord, factor) in coords.iter_mut().zip(scale) {
                if let Some(number) = coerce_number(coord) {
                    *coord = json!(number * factor);
                }
            }
        }
    }
    // 视口宽高各随一轴；多行文字的参考宽度随水平轴。
    scale_number(&mut object, "width", scale[0]);
    if is_viewport {
        scale_number(&mut object, "height", scale[1]);
    } else {
        let min_scale = scale[0].min(scale[1]);
        for field in LENGTH_FIELDS {
            scale_number(&mut object, field, min_scale);
        }
    }
    EntityData::new(Value::Object(object))
}

/// 只缩放前两个分量，z 保持不变；非数值坐标原样保留，留给处理阶段报错。
fn scale_point(point: &mut Value, scale: [f64; 2]) {
    let Value::Array(coords) = point else {
        return;
    };
    for (coord, factor) in coords.iter_mut().zip(scale) {
        if let Some(number) = coerce_number(coord) {
            *coord = json!((number * factor).round());
        }
    }
}

fn scale_number(object: &mut Map<String, Value>, field: &str, factor: f64) {
    if let Some(value) = object.get_mut(field) {
        if let Some(number) = coerce_number(value) {
            *value = json!((number * factor).round());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateCatalog;

    fn template(name: &str) -> Template {
        TemplateCatalog::builtin().get(name).expect("模板应存在")
    }

    fn coordinates(template: &Template) -> Vec<f64> {
        template
            .figures
            .iter()
            .filter_map(|figure| figure.get("points").and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_f64)
            .collect()
    }

    #[test]
    fn scaling_reaches_solid_transform_and_text_fields() {
        let mut base = template("modern_l_shaped");
        base.figures.extend([
            EntityData::new(json!({"type": "solid", "solid_type": "box", "corner1": [100, 100, 0], "corner2": [500, 300, 900]})),
            EntityData::new(json!({"type": "coordinate_system", "transform_type": "translate", "base_point": [0, 0], "offset": [100, 50]})),
            EntityData::new(json!({"type": "coordinate_system", "transform_type": "ucs", "origin": [0, 0], "x_axis": [0.6, 0.8], "y_axis": [-0.8, 0.6], "axis_length": 100})),
            EntityData::new(json!({"type": "mtext", "text": "note", "position": [0, 0], "height": 100, "width": 1000})),
        ]);
        let count = base.figures.len();
        let scaled = TemplateCustomizer::new()
            .apply_dimensions(&base, 5000.0, 3600.0)
            .expect("缩放应成功");
        let figure = |offset: usize| &scaled.figures[count - 4 + offset];

        assert_eq!(figure(0).get("corner1"), Some(&json!([125.0, 120.0, 0])));
        assert_eq!(figure(0).get("corner2"), Some(&json!([625.0, 360.0, 900])));
        assert_eq!(figure(1).get("offset"), Some(&json!([125.0, 60.0])));

        let x_axis = figure(2).get("x_axis").and_then(Value::as_array).expect("应保留轴向");
        assert!((x_axis[0].as_f64().unwrap_or(0.0) - 0.75).abs() < 1e-9);
        assert!((x_axis[1].as_f64().unwrap_or(0.0) - 0.96).abs() < 1e-9);
        assert_eq!(figure(2).get("axis_length"), Some(&json!(120.0)));

        assert_eq!(figure(3).get("width"), Some(&json!(1250.0)));
        assert_eq!(figure(3).get("height"), Some(&json!(120.0)));
    }

    #[test]
    fn scaling_uses_independent_axis_ratios() {
        let customizer = TemplateCustomizer::new();
        let scaled = customizer
            .apply_dimensions(&template("modern_l_shaped"), 5000.0, 3600.0)
            .expect("缩放应成功");
        let room = scaled.figures[0].get("points").expect("墙体应有点列");
        assert_eq!(room, &json!([[0.0, 0.0], [5000.0, 0.0], [5000.0, 3600.0], [0.0, 3600.0]]));
        assert_eq!(scaled.parameters.applied_dimensions, Some([5000.0, 3600.0]));
        let [sx, sy] = scaled.parameters.scaling_factors.expect("应记录缩放系数");
        assert!((sx - 1.25).abs() < 1e-9);
        assert!((sy - 1.2).abs() < 1e-9);

        let cooking = scaled.workflow_zones["cooking"];
        assert_eq!(cooking.center, [2500.0, 480.0]);
        assert_eq!(cooking.radius, 720.0);
    }

    #[test]
    fn scaling_there_and_back_restores_coordinates() {
        let customizer = TemplateCustomizer::new();
        let original = template("u_shaped_luxury");
        let there = customizer
            .apply_dimensions(&original, 3333.0, 4777.0)
            .expect("缩放应成功");
        let back = customizer
            .apply_dimensions(&there, 5000.0, 4000.0)
            .expect("缩放应成功");
        let before = coordinates(&original);
        let after = coordinates(&back);
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() <= 1.0, "{a} vs {b}");
        }
    }

    #[test]
    fn non_positive_dimensions_are_rejected() {
        let customizer = TemplateCustomizer::new();
        assert!(matches!(
            customizer.apply_dimensions(&template("compact_galley"), 0.0, 3000.0),
            Err(TemplateError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn appliances_are_deduplicated_and_positioned() {
        let customizer = TemplateCustomizer::new();
        let base = template("modern_l_shaped");
        let figures_before = base.figures.len();
        let result = customizer.add_appliances(
            &base,
            &["sink".to_string(), "microwave".to_string(), "espresso".to_string()],
        );
        let appliances = &result.template.appliances_included;
        assert_eq!(appliances.iter().filter(|a| *a == "sink").count(), 1);
        assert!(appliances.contains(&"microwave".to_string()));
        assert_eq!(result.template.figures.len(), figures_before + 1);
        assert_eq!(result.warnings, ["Unknown appliance type: espresso"]);

        let microwave = result.template.figures.last().expect("应新增微波炉图元");
        assert_eq!(microwave.layer(), Some("Appliances"));
        assert_eq!(microwave.get("points").expect("应有点列")[0], json!([2500.0, 400.0]));
        assert_eq!(microwave.get("description"), Some(&json!("Microwave")));
    }

    #[test]
    fn unknown_style_falls_back_to_modern_colors() {
        let customizer = TemplateCustomizer::new();
        let result = customizer.apply_style_modifications(&template("traditional_country"), "baroque");
        let cabinets = result
            .template
            .layers
            .iter()
            .find(|layer| layer.name == "Cabinets")
            .expect("应有橱柜图层");
        assert_eq!(cabinets.color, 3);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            result.template.customization_options["cabinet_style_recommended"],
            ["flat_panel"]
        );
    }

    #[test]
    fn combined_customization_places_appliances_after_scaling() {
        let customizer = TemplateCustomizer::new();
        let base = template("compact_galley");
        let result = customizer
            .combine_customizations(
                &base,
                &Customization {
                    dimensions: Some(vec![3000.0, 4000.0]),
                    appliances: vec!["oven".to_string()],
                    style: Some("industrial".to_string()),
                },
            )
            .expect("定制应成功");
        let oven = result.template.figures.last().expect("应新增烤箱图元");
        assert_eq!(oven.get("points").expect("应有点列")[0], json!([600.0, 500.0]));
        assert_eq!(result.template.effective_style(), "industrial");
        let record = result.template.customization_applied.expect("应记录定制元数据");
        assert_eq!(record.dimensions, Some([3000.0, 4000.0]));
        assert_eq!(record.appliances_added, ["oven"]);
        assert_eq!(base.parameters.applied_dimensions, None);
    }
}
