use layoutgen_core::document::{
    Dimension, DimensionKind, Entity, Hatch, HatchPattern, Leader, MText, TextAlign,
};
use layoutgen_core::geometry::Point2;

use super::{EntityProcessor, ProcessReport};
use crate::entity::{
    plain_name, DrawingTarget, EntityData, EntityKind, SharedAttributes, DEFAULT_TEXT_HEIGHT,
};
use crate::errors::EntityError;

/// 标注按 `dimension_type` 分派：linear / radial / angular / diameter。
pub struct DimensionProcessor;

impl EntityProcessor for DimensionProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Dimension
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let dimension_type = data.string_or("dimension_type", "linear").to_ascii_lowercase();
        let text = data.optional_text("text")?;
        let dimension = match dimension_type.as_str() {
            "linear" => {
                let start = data.point("start")?;
                let end = data.point("end")?;
                let anchor = data.point("dimline_point")?;
                let span = end.as_vec2() - start.as_vec2();
                if span.length() <= f64::EPSILON {
                    return Err(EntityError::InvalidGeometry(
                        "linear dimension start and end coincide".to_string(),
                    ));
                }
                Dimension {
                    kind: DimensionKind::Linear,
                    definition_point: anchor,
                    text_midpoint: anchor,
                    extension_line_origin: Some(start),
                    extension_line_end: Some(end),
                    secondary_point: None,
                    text,
                    rotation: span.y.atan2(span.x).to_degrees(),
                    style: attrs.style(),
                }
            }
            "radial" | "diameter" => {
                let center = data.point("center")?;
                let on_curve = data.point("radius_point")?;
                if center == on_curve {
                    return Err(EntityError::InvalidGeometry(
                        "radius point coincides with center".to_string(),
                    ));
                }
                let (kind, definition_point, text_midpoint) = if dimension_type == "radial" {
                    let mid = (center.as_vec2() + on_curve.as_vec2()) * 0.5;
                    (DimensionKind::Radius, center, Point2::from(mid))
                } else {
                    let opposite = center.as_vec2() * 2.0 - on_curve.as_vec2();
                    (DimensionKind::Diameter, Point2::from(opposite), center)
                };
                Dimension {
                    kind,
                    definition_point,
                    text_midpoint,
                    extension_line_origin: None,
                    extension_line_end: None,
                    secondary_point: Some(on_curve),
                    text,
                    rotation: 0.0,
                    style: attrs.style(),
                }
            }
            "angular" => {
                let center = data.point("center")?;
                let start = data.point("start")?;
                let end = data.point("end")?;
                let anchor = data.point("dimline_point")?;
                if start == center || end == center {
                    return Err(EntityError::InvalidGeometry(
                        "angular dimension legs must differ from the vertex".to_string(),
                    ));
                }
                Dimension {
                    kind: DimensionKind::Angular,
                    definition_point: anchor,
                    text_midpoint: anchor,
                    extension_line_origin: Some(start),
                    extension_line_end: Some(end),
                    secondary_point: Some(center),
                    text,
                    rotation: 0.0,
                    style: attrs.style(),
                }
            }
            _ => {
                return Err(EntityError::UnknownVariant {
                    field: "dimension_type",
                    value: dimension_type,
                });
            }
        };
        target.add(Entity::Dimension(dimension));
        Ok(ProcessReport::ok())
    }
}

/// 引线末端可附带文字。
pub struct LeaderProcessor;

impl EntityProcessor for LeaderProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Leader
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let vertices = data.points("vertices", 2)?;
        let text = data.optional_text("text")?;
        let text_height = data.positive_or("text_height", DEFAULT_TEXT_HEIGHT)?;
        let anchor = vertices[vertices.len() - 1];

        target.add(Entity::Leader(Leader {
            vertices,
            has_arrowhead: true,
            style: attrs.style(),
        }));
        if let Some(text) = text {
            target.add_text(anchor, text, text_height, TextAlign::Left, attrs);
        }
        Ok(ProcessReport::ok())
    }
}

pub struct HatchProcessor;

impl EntityProcessor for HatchProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Hatch
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let boundary = data.points("boundary", 3)?;
        let name = plain_name("pattern", &data.string_or("pattern", "SOLID").to_ascii_uppercase())?;
        let pattern = if name == "SOLID" {
            HatchPattern::Solid
        } else {
            HatchPattern::Named {
                name,
                scale: data.positive_or("pattern_scale", 1.0)?,
                angle: data.angle_or("pattern_angle", 0.0)?,
            }
        };
        target.add(Entity::Hatch(Hatch {
            pattern,
            boundary,
            style: attrs.style(),
        }));
        Ok(ProcessReport::ok())
    }
}

/// 对齐方式映射到组码 71 的上排锚点：LEFT 1、CENTER 2、RIGHT 3。
pub struct MTextProcessor;

impl EntityProcessor for MTextProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::MText
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let content = data.text("text")?;
        let insert = data.point("position")?;
        let height = data.positive_or("height", DEFAULT_TEXT_HEIGHT)?;
        let reference_width = if data.has("width") {
            Some(data.positive_or("width", 1.0)?)
        } else {
            None
        };
        let rotation = data.angle_or("rotation", 0.0)?;

        let mut report = ProcessReport::ok();
        let alignment = data.string_or("alignment", "LEFT").to_ascii_uppercase();
        let attachment_point = match alignment.as_str() {
            "LEFT" => 1,
            "CENTER" => 2,
            "RIGHT" => 3,
            other => {
                report.warn(format!("unknown mtext alignment `{other}`, using LEFT"));
                1
            }
        };

        target.add(Entity::MText(MText {
            insert,
            content,
            height,
            reference_width,
            attachment_point,
            rotation,
            style: attrs.style(),
        }));
        Ok(report)
    }
}

/// 视口以居中矩形表示，标签置于中心。
pub struct ViewportProcessor;

impl EntityProcessor for ViewportProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Viewport
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let center = data.point("center")?;
        let width = data.radius("width")?;
        let height = data.radius("height")?;
        let label = data.optional_text("label")?;
        let label_height = data.positive_or("text_height", DEFAULT_TEXT_HEIGHT)?;

        let (hw, hh) = (width / 2.0, height / 2.0);
        let corners = vec![
            Point2::new(center.x() - hw, center.y() - hh),
            Point2::new(center.x() + hw, center.y() - hh),
            Point2::new(center.x() + hw, center.y() + hh),
            Point2::new(center.x() - hw, center.y() + hh),
        ];
        target.add_polyline(corners, true, attrs);
        if let Some(label) = label {
            target.add_text(center, label, label_height, TextAlign::Middle, attrs);
        }
        Ok(ProcessReport::ok())
    }
}
