//! 参数化布局模板：只读目录、定制流水线与到生成指令的转换。

mod catalog;
mod customizer;

pub use catalog::{Requirements, Suggestion, TemplateCatalog};
pub use customizer::{Customized, TemplateCustomizer};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityData;
use crate::instructions::{InstructionDocument, LayerSpec};

/// 模板参数。`applied_dimensions` 为空表示尚未缩放，按推荐尺寸计。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParameters {
    pub min_dimensions: [f64; 2],
    pub recommended_dimensions: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_dimensions: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_factors: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl TemplateParameters {
    /// 当前生效的尺寸。
    #[inline]
    pub fn current_dimensions(&self) -> [f64; 2] {
        self.applied_dimensions.unwrap_or(self.recommended_dimensions)
    }
}

/// 工作区：中心点与半径，随尺寸缩放。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkflowZone {
    pub center: [f64; 2],
    pub radius: f64,
}

/// 定制请求：尺寸 `[宽, 高]`（毫米）、追加电器与风格。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub appliances: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Customization {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_none() && self.appliances.is_empty() && self.style.is_none()
    }
}

/// 定制完成后写入模板的元数据。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomizationRecord {
    pub dimensions: Option<[f64; 2]>,
    pub appliances_added: Vec<String>,
    pub style: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub description: String,
    pub style: String,
    pub layout_type: String,
    pub parameters: TemplateParameters,
    pub appliances_included: Vec<String>,
    pub layers: Vec<LayerSpec>,
    pub figures: Vec<EntityData>,
    #[serde(default)]
    pub workflow_zones: BTreeMap<String, WorkflowZone>,
    #[serde(default)]
    pub customization_options: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization_applied: Option<CustomizationRecord>,
}

impl Template {
    /// 生效风格：定制后的风格优先。
    pub fn effective_style(&self) -> &str {
        self.parameters.style.as_deref().unwrap_or(&self.style)
    }

    pub fn info(&self) -> TemplateInfo {
        TemplateInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            layout_type: self.layout_type.clone(),
            recommended_dimensions: self.parameters.recommended_dimensions,
            min_dimensions: self.parameters.min_dimensions,
            appliances_included: self.appliances_included.clone(),
            style: self.style.clone(),
        }
    }

    /// 转换为生成指令：图层与图元原样带入。
    pub fn to_instructions(&self) -> InstructionDocument {
        InstructionDocument {
            layers: self.layers.clone(),
            figures: self.figures.clone(),
            ..InstructionDocument::default()
        }
    }

    /// 摘要模式下随响应返回的模板信息。
    pub fn applied_info(&self) -> AppliedTemplateInfo {
        AppliedTemplateInfo {
            name: self.name.clone(),
            style: self.effective_style().to_string(),
            dimensions: self.parameters.current_dimensions(),
            appliances: self.appliances_included.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateInfo {
    pub name: String,
    pub description: String,
    pub layout_type: String,
    pub recommended_dimensions: [f64; 2],
    pub min_dimensions: [f64; 2],
    pub appliances_included: Vec<String>,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedTemplateInfo {
    pub name: String,
    pub style: String,
    pub dimensions: [f64; 2],
    pub appliances: Vec<String>,
}
