use std::collections::HashSet;

use tracing::{debug, warn};

use layoutgen_core::document::DEFAULT_COLOR;

use crate::entity::{is_plain_name, DEFAULT_LAYER};
use crate::errors::RequestError;
use crate::instructions::{InstructionDocument, LayerSpec, DEFAULT_STREAMING_THRESHOLD};
use crate::template::Customization;

pub const DEFAULT_MAX_ENTITIES: usize = 10_000;
pub const DEFAULT_MAX_MESH_VERTICES: usize = 50_000;

/// 一侧小于该值且另一侧大于 `LARGE_AXIS` 时判定单位混用。
const SMALL_AXIS: f64 = 100.0;
const LARGE_AXIS: f64 = 1000.0;

/// 生成前的请求守卫：规模上限、图层引用完整性、缺省值填充。
#[derive(Debug, Clone, Copy)]
pub struct RequestValidator {
    max_entities: usize,
    max_mesh_vertices: usize,
    streaming_threshold: u64,
}

impl RequestValidator {
    pub fn new() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
            max_mesh_vertices: DEFAULT_MAX_MESH_VERTICES,
            streaming_threshold: DEFAULT_STREAMING_THRESHOLD,
        }
    }

    pub fn with_limits(mut self, max_entities: usize, max_mesh_vertices: usize) -> Self {
        self.max_entities = max_entities;
        self.max_mesh_vertices = max_mesh_vertices;
        self
    }

    pub fn with_streaming_threshold(mut self, threshold: u64) -> Self {
        self.streaming_threshold = threshold;
        self
    }

    #[inline]
    pub fn max_entities(&self) -> usize {
        self.max_entities
    }

    /// 校验并补全指令文档。被拒绝的请求不会进入生成阶段。
    pub fn validate_and_preprocess(
        &self,
        mut instructions: InstructionDocument,
    ) -> Result<InstructionDocument, RequestError> {
        let count = instructions.entity_count();
        if count > self.max_entities {
            warn!(count, limit = self.max_entities, "请求实体数超限");
            return Err(RequestError::TooManyEntities {
                count,
                limit: self.max_entities,
            });
        }

        let largest_mesh = instructions
            .entities_with_location()
            .filter_map(|(_, entity)| entity.mesh_vertex_count())
            .max()
            .unwrap_or(0);
        if largest_mesh > self.max_mesh_vertices {
            warn!(vertices = largest_mesh, limit = self.max_mesh_vertices, "网格顶点数超限");
            return Err(RequestError::MeshTooLarge {
                vertices: largest_mesh,
                limit: self.max_mesh_vertices,
            });
        }

        let names = instructions
            .layers
            .iter()
            .enumerate()
            .map(|(index, layer)| ("layer", &layer.name, format!("layer {index}")))
            .chain(
                instructions
                    .blocks
                    .iter()
                    .enumerate()
                    .map(|(index, block)| ("block", &block.name, format!("block {index}"))),
            );
        for (field, name, location) in names {
            if !is_plain_name(name) {
                warn!(name = ?name, location = %location, "名称含控制字符");
                return Err(RequestError::InvalidName {
                    field,
                    value: name.clone(),
                    location,
                });
            }
        }

        let declared: HashSet<&str> = instructions
            .layers
            .iter()
            .map(|layer| layer.name.trim())
            .collect();
        for (location, entity) in instructions.entities_with_location() {
            let Some(layer) = entity.layer() else {
                continue;
            };
            if layer != DEFAULT_LAYER && !declared.contains(layer) {
                warn!(layer, location = %location, "引用了未声明的图层");
                return Err(RequestError::UndefinedLayer {
                    layer: layer.to_string(),
                    location,
                });
            }
        }

        if instructions.layers.is_empty() {
            instructions
                .layers
                .push(LayerSpec::new(DEFAULT_LAYER, i64::from(DEFAULT_COLOR)));
        }
        if instructions.streaming_threshold.is_none() {
            instructions.streaming_threshold = Some(self.streaming_threshold);
        }
        debug!(
            entities = count,
            layers = instructions.layers.len(),
            "请求校验通过"
        );
        Ok(instructions)
    }

    /// 校验模板定制参数，返回不阻断生成的告警。
    pub fn validate_customization(
        &self,
        customization: &Customization,
    ) -> Result<Vec<String>, RequestError> {
        let mut warnings = Vec::new();
        if let Some(dimensions) = &customization.dimensions {
            let [width, height] = dimensions.as_slice() else {
                return Err(RequestError::InvalidCustomization(format!(
                    "dimensions must be [width, height], got {} values",
                    dimensions.len()
                )));
            };
            if !(width.is_finite() && height.is_finite()) || *width <= 0.0 || *height <= 0.0 {
                return Err(RequestError::InvalidCustomization(format!(
                    "dimensions must be positive numbers, got [{width}, {height}]"
                )));
            }
            let (small, large) = (width.min(*height), width.max(*height));
            if small < SMALL_AXIS && large > LARGE_AXIS {
                warn!(width, height, "尺寸单位可能不一致");
                warnings.push(format!(
                    "Inconsistent units detected: dimensions [{width}, {height}] mix metre-scale and millimetre-scale values"
                ));
            }
        }
        if let Some(style) = &customization.style {
            if style.trim().is_empty() {
                return Err(RequestError::InvalidCustomization(
                    "style must not be empty".to_string(),
                ));
            }
        }
        Ok(warnings)
    }
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn circles(count: usize, layer: &str) -> InstructionDocument {
        let figures: Vec<_> = (0..count)
            .map(|i| json!({"type": "circle", "center": [i, 0], "radius": 1, "layer": layer}))
            .collect();
        serde_json::from_value(json!({"layers": [{"name": "L"}], "figures": figures}))
            .expect("指令解析失败")
    }

    #[test]
    fn entity_ceiling_is_inclusive() {
        let validator = RequestValidator::new();
        assert!(validator.validate_and_preprocess(circles(10_000, "L")).is_ok());
        let err = validator
            .validate_and_preprocess(circles(10_001, "L"))
            .expect_err("超限请求应被拒绝");
        assert!(err.to_string().contains("too many entities"));
    }

    #[test]
    fn block_entities_count_towards_the_ceiling() {
        let validator = RequestValidator::new().with_limits(2, DEFAULT_MAX_MESH_VERTICES);
        let instructions: InstructionDocument = serde_json::from_value(json!({
            "blocks": [{"name": "B", "entities": [{"type": "line"}, {"type": "line"}]}],
            "figures": [{"type": "line"}]
        }))
        .expect("指令解析失败");
        assert_eq!(
            validator.validate_and_preprocess(instructions),
            Err(RequestError::TooManyEntities { count: 3, limit: 2 })
        );
    }

    #[test]
    fn oversized_mesh_is_rejected() {
        let validator = RequestValidator::new().with_limits(DEFAULT_MAX_ENTITIES, 3);
        let instructions: InstructionDocument = serde_json::from_value(json!({
            "figures": [{"type": "mesh", "vertices": [[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0]], "faces": [[0, 1, 2, 3]]}]
        }))
        .expect("指令解析失败");
        assert!(matches!(
            validator.validate_and_preprocess(instructions),
            Err(RequestError::MeshTooLarge { vertices: 4, limit: 3 })
        ));
    }

    #[test]
    fn undeclared_layer_is_rejected_but_default_is_allowed() {
        let validator = RequestValidator::new();
        match validator.validate_and_preprocess(circles(1, "Ghost")) {
            Err(RequestError::UndefinedLayer { layer, location }) => {
                assert_eq!(layer, "Ghost");
                assert_eq!(location, "figure 0");
            }
            other => panic!("意外结果: {other:?}"),
        }
        assert!(validator.validate_and_preprocess(circles(1, "default")).is_ok());
    }

    #[test]
    fn layer_references_are_trimmed_like_declarations() {
        let instructions: InstructionDocument = serde_json::from_value(json!({
            "layers": [{"name": "L "}],
            "figures": [{"type": "line", "start": [0, 0], "end": [1, 0], "layer": " L "}]
        }))
        .expect("指令解析失败");
        assert!(RequestValidator::new().validate_and_preprocess(instructions).is_ok());
    }

    #[test]
    fn names_with_control_characters_are_rejected() {
        let validator = RequestValidator::new();
        let layer: InstructionDocument = serde_json::from_value(json!({
            "layers": [{"name": "Walls"}, {"name": "Walls\n  0\nEOF"}]
        }))
        .expect("指令解析失败");
        assert_eq!(
            validator.validate_and_preprocess(layer),
            Err(RequestError::InvalidName {
                field: "layer",
                value: "Walls\n  0\nEOF".to_string(),
                location: "layer 1".to_string(),
            })
        );

        let block: InstructionDocument = serde_json::from_value(json!({
            "blocks": [{"name": "Chair\r", "entities": []}]
        }))
        .expect("指令解析失败");
        assert!(matches!(
            validator.validate_and_preprocess(block),
            Err(RequestError::InvalidName { field: "block", .. })
        ));
    }

    #[test]
    fn preprocessing_fills_defaults() {
        let validator = RequestValidator::new().with_streaming_threshold(4096);
        let prepared = validator
            .validate_and_preprocess(
                serde_json::from_value(json!({"figures": [{"type": "line"}]})).expect("指令解析失败"),
            )
            .expect("请求应通过");
        assert_eq!(prepared.layers, vec![LayerSpec::new(DEFAULT_LAYER, 7)]);
        assert_eq!(prepared.streaming_threshold, Some(4096));

        let explicit = validator
            .validate_and_preprocess(
                serde_json::from_value(json!({"streaming_threshold": 10})).expect("指令解析失败"),
            )
            .expect("请求应通过");
        assert_eq!(explicit.streaming_threshold, Some(10));
    }

    #[test]
    fn mixed_units_warn_without_rejecting() {
        let validator = RequestValidator::new();
        let warnings = validator
            .validate_customization(&Customization {
                dimensions: Some(vec![50.0, 3000.0]),
                ..Customization::default()
            })
            .expect("单位告警不应阻断");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Inconsistent units detected"));

        assert!(validator
            .validate_customization(&Customization {
                dimensions: Some(vec![4000.0, 3000.0]),
                ..Customization::default()
            })
            .expect("正常尺寸应通过")
            .is_empty());
    }

    #[test]
    fn malformed_dimensions_are_rejected() {
        let validator = RequestValidator::new();
        for dimensions in [vec![4000.0], vec![4000.0, -1.0], vec![1.0, 2.0, 3.0]] {
            assert!(matches!(
                validator.validate_customization(&Customization {
                    dimensions: Some(dimensions),
                    ..Customization::default()
                }),
                Err(RequestError::InvalidCustomization(_))
            ));
        }
    }
}
