use layoutgen_core::document::{LayerStateRecord, Linetype, TextAlign, Ucs};
use layoutgen_core::geometry::Vector2;
use serde_json::Value;

use super::{EntityProcessor, ProcessReport};
use crate::coordinates::coerce_number;
use crate::entity::{
    plain_name, DrawingTarget, EntityData, EntityKind, SharedAttributes, DEFAULT_LAYER,
    DEFAULT_TEXT_HEIGHT,
};
use crate::errors::{EntityError, ValidationError};

const DEFAULT_AXIS_LENGTH: f64 = 100.0;

/// 自定义线型：正值为实线段，负值为空白段。
pub struct LinetypeProcessor;

impl EntityProcessor for LinetypeProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Linetype
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        _attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let name = plain_name("linetype_name", data.text("linetype_name")?.trim())?;
        if name.is_empty() {
            return Err(EntityError::MissingField("linetype_name"));
        }
        let pattern = data
            .list("linetype_pattern", 1)?
            .iter()
            .map(|value| {
                coerce_number(value).ok_or_else(|| {
                    EntityError::invalid("linetype_pattern", ValidationError::NonNumeric(value.clone()))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        if pattern.iter().all(|segment| *segment == 0.0) {
            return Err(EntityError::InvalidGeometry(
                "linetype pattern has zero length".to_string(),
            ));
        }
        let description = match data.optional_text("description")? {
            Some(text) => plain_name("description", &text)?,
            None => describe_pattern(&pattern),
        };

        let mut report = ProcessReport::ok();
        let defined = target.document_mut().define_linetype(Linetype {
            name: name.clone(),
            description,
            pattern,
        });
        if !defined {
            report.warn(format!("linetype `{name}` already defined, keeping the first definition"));
        }
        Ok(report)
    }
}

fn describe_pattern(pattern: &[f64]) -> String {
    pattern
        .iter()
        .map(|segment| match segment {
            s if *s > 0.0 => "__",
            s if *s < 0.0 => " ",
            _ => ".",
        })
        .collect()
}

/// 修改图层的可见/锁定/冻结状态并保存一条状态记录。
pub struct LayerStateProcessor;

impl EntityProcessor for LayerStateProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::LayerState
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let layer_name = match data.get("layer_name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
            Some(_) => return Err(EntityError::MissingField("layer_name")),
            None => attrs.layer.clone(),
        };
        let visible = optional_flag(data, "visible")?;
        let frozen = optional_flag(data, "frozen")?;
        let locked = optional_flag(data, "locked")?;
        let state_name = data
            .optional_text("state_name")?
            .unwrap_or_else(|| format!("{layer_name}_state"));

        let document = target.document_mut();
        if layer_name == DEFAULT_LAYER {
            document.ensure_layer(DEFAULT_LAYER);
        }
        let layer = document
            .layer_mut(&layer_name)
            .ok_or_else(|| EntityError::LayerNotFound(layer_name.clone()))?;
        if let Some(visible) = visible {
            layer.is_visible = visible;
        }
        if let Some(frozen) = frozen {
            layer.is_frozen = frozen;
        }
        if let Some(locked) = locked {
            layer.is_locked = locked;
        }
        let record = LayerStateRecord {
            name: state_name,
            layer: layer_name,
            is_visible: layer.is_visible,
            is_frozen: layer.is_frozen,
            is_locked: layer.is_locked,
        };
        document.record_layer_state(record);
        Ok(ProcessReport::ok())
    }
}

fn optional_flag(data: &EntityData, field: &'static str) -> Result<Option<bool>, EntityError> {
    match data.get(field) {
        None => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(other) => Err(EntityError::InvalidGeometry(format!(
            "`{field}` must be a boolean, got {other}"
        ))),
    }
}

/// 属性定义/属性值以文字代理表示。
pub struct AttributeProcessor;

impl EntityProcessor for AttributeProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Attribute
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let attribute_type = data.string_or("attribute_type", "value").to_ascii_lowercase();
        let tag = data.text("tag")?;
        let position = data.point("position")?;
        let height = data.positive_or("height", DEFAULT_TEXT_HEIGHT)?;
        let content = match attribute_type.as_str() {
            "definition" => match data.optional_text("default_value")? {
                Some(default) => format!("{tag}={default}"),
                None => tag,
            },
            "value" => format!("{tag}: {}", data.text("value")?),
            _ => {
                return Err(EntityError::UnknownVariant {
                    field: "attribute_type",
                    value: attribute_type,
                });
            }
        };
        target.add_text(position, content, height, TextAlign::Left, attrs);
        Ok(ProcessReport::ok())
    }
}

/// translate 画出平移向量；ucs 设置图纸 UCS 并画出两条轴线。
pub struct CoordinateSystemProcessor;

impl EntityProcessor for CoordinateSystemProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::CoordinateSystem
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let transform_type = data.string_or("transform_type", "translate").to_ascii_lowercase();
        match transform_type.as_str() {
            "translate" => {
                let base = data.point("base_point")?;
                let offset = data.point("offset")?;
                let moved = base.translate(Vector2::new(offset.x(), offset.y()));
                target.add_line(base, moved, attrs);
            }
            "ucs" => {
                let origin = data.point("origin")?;
                let x_axis = unit_axis(data, "x_axis")?;
                let y_axis = unit_axis(data, "y_axis")?;
                let cross = x_axis.x() * y_axis.y() - x_axis.y() * y_axis.x();
                if cross.abs() <= 1e-9 {
                    return Err(EntityError::InvalidGeometry(
                        "UCS axes are parallel".to_string(),
                    ));
                }
                let length = data.positive_or("axis_length", DEFAULT_AXIS_LENGTH)?;

                target.document_mut().set_ucs(Ucs {
                    origin,
                    x_axis,
                    y_axis,
                });
                for axis in [x_axis, y_axis] {
                    let tip = origin.translate(Vector2::new(axis.x() * length, axis.y() * length));
                    target.add_line(origin, tip, attrs);
                }
            }
            _ => {
                return Err(EntityError::UnknownVariant {
                    field: "transform_type",
                    value: transform_type,
                });
            }
        }
        Ok(ProcessReport::ok())
    }
}

fn unit_axis(data: &EntityData, field: &'static str) -> Result<Vector2, EntityError> {
    let point = data.point(field)?;
    Vector2::new(point.x(), point.y())
        .normalize()
        .ok_or_else(|| EntityError::InvalidGeometry(format!("`{field}` has zero length")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::run;
    use layoutgen_core::document::{Document, Entity};
    use serde_json::json;

    #[test]
    fn linetype_registers_document_state() {
        let mut document = Document::new();
        let (result, before, after) = run(
            &LinetypeProcessor,
            &mut document,
            json!({"linetype_name": "CUSTOM_DASH", "linetype_pattern": [12.7, -6.35, 3.175, -6.35]}),
        );
        assert!(result.is_ok());
        assert_eq!(after, before + 1);
        let linetype = document.linetype("CUSTOM_DASH").expect("线型应已定义");
        assert_eq!(linetype.pattern.len(), 4);
        assert_eq!(linetype.description, "__ __ ");
    }

    #[test]
    fn redefined_linetype_warns() {
        let mut document = Document::new();
        let value = json!({"linetype_name": "DOTS", "linetype_pattern": [0.0, -1.0]});
        run(&LinetypeProcessor, &mut document, value.clone()).0.expect("首次定义");
        let report = run(&LinetypeProcessor, &mut document, value).0.expect("重复定义仅警告");
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn linetype_names_with_line_breaks_fail_without_changes() {
        let mut document = Document::new();
        let (result, before, after) = run(
            &LinetypeProcessor,
            &mut document,
            json!({"linetype_name": "DASH\n  0\nEOF", "linetype_pattern": [5.0, -2.0]}),
        );
        assert!(matches!(
            result,
            Err(EntityError::InvalidName { field: "linetype_name", .. })
        ));
        assert_eq!(before, after);

        let (result, _, _) = run(
            &LinetypeProcessor,
            &mut document,
            json!({"linetype_name": "DASH", "linetype_pattern": [5.0, -2.0], "description": "__\r__"}),
        );
        assert!(matches!(
            result,
            Err(EntityError::InvalidName { field: "description", .. })
        ));
        assert!(document.linetype("DASH").is_none());
    }

    #[test]
    fn layer_state_creates_the_implicit_default_layer() {
        let mut document = Document::new();
        let (result, before, after) = run(
            &LayerStateProcessor,
            &mut document,
            json!({"layer_name": "default", "visible": false}),
        );
        assert!(result.is_ok());
        assert_eq!(after, before + 1);
        let layer = document.layer(DEFAULT_LAYER).expect("默认图层应被创建");
        assert!(!layer.is_visible);
    }

    #[test]
    fn layer_state_updates_flags_and_records_snapshot() {
        let mut document = Document::new();
        document.declare_layer("Hidden", 1);
        let (result, before, after) = run(
            &LayerStateProcessor,
            &mut document,
            json!({"layer_name": "Hidden", "visible": false, "locked": true}),
        );
        assert!(result.is_ok());
        assert_eq!(after, before + 1);
        let layer = document.layer("Hidden").expect("图层存在");
        assert!(!layer.is_visible);
        assert!(layer.is_locked);
        assert!(!layer.is_frozen);
        assert_eq!(document.layer_states()[0].name, "Hidden_state");
    }

    #[test]
    fn layer_state_for_missing_layer_fails_without_changes() {
        let mut document = Document::new();
        let (result, before, after) = run(
            &LayerStateProcessor,
            &mut document,
            json!({"layer_name": "Ghost", "visible": false}),
        );
        assert_eq!(result, Err(EntityError::LayerNotFound("Ghost".to_string())));
        assert_eq!(before, after);
    }

    #[test]
    fn attributes_become_text_proxies() {
        let mut document = Document::new();
        run(
            &AttributeProcessor,
            &mut document,
            json!({"attribute_type": "definition", "tag": "PART_NUMBER", "position": [300, 100], "prompt": "Enter part number:", "default_value": "PN-001"}),
        )
        .0
        .expect("属性定义应成功");
        run(
            &AttributeProcessor,
            &mut document,
            json!({"attribute_type": "value", "tag": "MATERIAL", "value": "Steel", "position": [300, 150]}),
        )
        .0
        .expect("属性值应成功");
        let contents: Vec<&str> = document
            .entities()
            .filter_map(|(_, entity)| match entity {
                Entity::Text(text) => Some(text.content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(contents, vec!["PART_NUMBER=PN-001", "MATERIAL: Steel"]);
    }

    #[test]
    fn ucs_sets_header_and_draws_axes() {
        let mut document = Document::new();
        let (result, before, after) = run(
            &CoordinateSystemProcessor,
            &mut document,
            json!({"transform_type": "ucs", "origin": [200, 200], "x_axis": [2, 0], "y_axis": [0, 1]}),
        );
        assert!(result.is_ok());
        assert_eq!(after - before, 2);
        let ucs = document.header().ucs.expect("UCS 应已设置");
        assert!((ucs.x_axis.x() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn parallel_ucs_axes_are_rejected() {
        let mut document = Document::new();
        let (result, before, after) = run(
            &CoordinateSystemProcessor,
            &mut document,
            json!({"transform_type": "ucs", "origin": [0, 0], "x_axis": [1, 0], "y_axis": [2, 0]}),
        );
        assert!(result.is_err());
        assert_eq!(before, after);
        assert!(document.header().ucs.is_none());
    }

    #[test]
    fn translate_draws_offset_proxy() {
        let mut document = Document::new();
        run(
            &CoordinateSystemProcessor,
            &mut document,
            json!({"transform_type": "translate", "base_point": [0, 0], "offset": [100, 50]}),
        )
        .0
        .expect("平移应成功");
        let bounds = document.bounds().expect("应有范围");
        assert!((bounds.max().x() - 100.0).abs() < 1e-9);
        assert!((bounds.max().y() - 50.0).abs() < 1e-9);
    }
}
