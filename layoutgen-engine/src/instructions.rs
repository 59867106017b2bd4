use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use layoutgen_core::document::DEFAULT_COLOR;

use crate::entity::EntityData;

/// 默认的流式传输阈值（1 MiB）。
pub const DEFAULT_STREAMING_THRESHOLD: u64 = 1_048_576;

fn default_layer_color() -> i64 {
    i64::from(DEFAULT_COLOR)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    #[serde(default = "default_layer_color")]
    pub color: i64,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>, color: i64) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_point: Option<[f64; 2]>,
    #[serde(default)]
    pub entities: Vec<EntityData>,
}

/// 生成指令文档：图层、块与顶层图元。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionDocument {
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
    #[serde(default)]
    pub figures: Vec<EntityData>,
    #[serde(default)]
    pub return_summary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Map<String, Value>>,
}

impl InstructionDocument {
    /// 块内实体与顶层图元的总数。
    pub fn entity_count(&self) -> usize {
        self.figures.len() + self.blocks.iter().map(|block| block.entities.len()).sum::<usize>()
    }

    /// 依次遍历块内实体与顶层图元，附带位置描述。
    pub fn entities_with_location(&self) -> impl Iterator<Item = (String, &EntityData)> {
        let block_entities = self.blocks.iter().flat_map(|block| {
            block
                .entities
                .iter()
                .enumerate()
                .map(move |(index, entity)| (format!("block `{}` entity {index}", block.name), entity))
        });
        let figures = self
            .figures
            .iter()
            .enumerate()
            .map(|(index, entity)| (format!("figure {index}"), entity));
        block_entities.chain(figures)
    }

    #[inline]
    pub fn streaming_threshold(&self) -> u64 {
        self.streaming_threshold.unwrap_or(DEFAULT_STREAMING_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_sections_default_to_empty() {
        let doc: InstructionDocument =
            serde_json::from_value(json!({"figures": [{"type": "line"}]})).expect("解析失败");
        assert!(doc.layers.is_empty());
        assert!(!doc.return_summary);
        assert_eq!(doc.streaming_threshold(), DEFAULT_STREAMING_THRESHOLD);
        assert_eq!(doc.entity_count(), 1);
    }

    #[test]
    fn layer_color_defaults_to_seven() {
        let layer: LayerSpec = serde_json::from_value(json!({"name": "Walls"})).expect("解析失败");
        assert_eq!(layer.color, 7);
    }

    #[test]
    fn locations_cover_blocks_then_figures() {
        let doc: InstructionDocument = serde_json::from_value(json!({
            "blocks": [{"name": "Sink", "entities": [{"type": "circle"}]}],
            "figures": [{"type": "line"}]
        }))
        .expect("解析失败");
        let locations: Vec<String> = doc.entities_with_location().map(|(loc, _)| loc).collect();
        assert_eq!(locations, vec!["block `Sink` entity 0", "figure 0"]);
    }
}
