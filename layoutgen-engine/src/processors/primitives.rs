use std::f64::consts::TAU;

use serde_json::Value;

use layoutgen_core::document::{Arc, Ellipse, Entity, Polyline3D, Spline, Text, TextAlign};
use layoutgen_core::geometry::Vector2;

use super::{EntityProcessor, ProcessReport};
use crate::entity::{DrawingTarget, EntityData, EntityKind, SharedAttributes, DEFAULT_TEXT_HEIGHT};
use crate::errors::EntityError;

pub struct RectangleProcessor;

impl EntityProcessor for RectangleProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Rectangle
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let points = data.points("points", 3)?;
        target.add_polyline(points, true, attrs);
        Ok(ProcessReport::ok())
    }
}

pub struct CircleProcessor;

impl EntityProcessor for CircleProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Circle
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let center = data.point("center")?;
        let radius = data.radius("radius")?;
        target.add_circle(center, radius, attrs);
        Ok(ProcessReport::ok())
    }
}

pub struct LineProcessor;

impl EntityProcessor for LineProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Line
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let start = data.point("start")?;
        let end = data.point("end")?;
        let mut report = ProcessReport::ok();
        if start == end {
            report.warn("line has zero length");
        }
        target.add_line(start, end, attrs);
        Ok(report)
    }
}

pub struct TextProcessor;

impl EntityProcessor for TextProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Text
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
        let rotation = data.angle_or("rotation", 0.0)?;
        target.add(Entity::Text(Text {
            insert,
            content,
            height,
            rotation,
            align: TextAlign::Left,
            style: attrs.style(),
        }));
        Ok(ProcessReport::ok())
    }
}

/// 起止角各自独立校验，终止角小于起始角时圆弧跨越 0°。
pub struct ArcProcessor;

impl EntityProcessor for ArcProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Arc
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let center = data.point("center")?;
        let radius = data.radius("radius")?;
        let start = data.angle("start_angle")?;
        let end = data.angle("end_angle")?;
        target.add(Entity::Arc(Arc {
            center,
            radius,
            start_angle: start.to_radians(),
            end_angle: end.to_radians(),
            style: attrs.style(),
        }));
        Ok(ProcessReport::ok())
    }
}

pub struct SplineProcessor;

impl EntityProcessor for SplineProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Spline
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let control_points = data.points("control_points", 2)?;
        let degree = data.number_or("degree", 3.0)?;
        if degree < 1.0 || degree.fract() != 0.0 {
            return Err(EntityError::InvalidGeometry(format!(
                "spline degree {degree} must be a positive integer"
            )));
        }
        let is_closed = data.bool_or("closed", false);

        let mut report = ProcessReport::ok();
        let spline = Spline::clamped(degree as i32, is_closed, control_points, attrs.style());
        if f64::from(spline.degree) < degree {
            report.warn(format!(
                "spline degree lowered from {degree} to {} to fit control points",
                spline.degree
            ));
        }
        target.add(Entity::Spline(spline));
        Ok(report)
    }
}

/// 首点带 Z 坐标时生成 3D 多段线。
pub struct PolylineProcessor;

impl EntityProcessor for PolylineProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Polyline
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let is_closed = data.bool_or("closed", false);
        let is_3d = data
            .list("points", 2)?
            .first()
            .and_then(Value::as_array)
            .is_some_and(|first| first.len() >= 3);

        if is_3d {
            let vertices = data.points3("points", 2)?;
            target.add(Entity::Polyline3D(Polyline3D {
                vertices,
                is_closed,
                style: attrs.style(),
            }));
        } else {
            let vertices = data.points("points", 2)?;
            target.add_polyline(vertices, is_closed, attrs);
        }
        Ok(ProcessReport::ok())
    }
}

/// 未给出参数范围时绘制完整椭圆。
pub struct EllipseProcessor;

impl EntityProcessor for EllipseProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Ellipse
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let center = data.point("center")?;
        let axis = data.point("major_axis")?;
        let major_axis = Vector2::new(axis.x(), axis.y());
        if major_axis.length() <= f64::EPSILON {
            return Err(EntityError::InvalidGeometry(
                "ellipse major axis has zero length".to_string(),
            ));
        }
        let ratio = data.number_or("ratio", 1.0)?;
        if ratio <= 0.0 || ratio > 1.0 {
            return Err(EntityError::InvalidGeometry(format!(
                "ellipse ratio {ratio} must be in (0, 1]"
            )));
        }
        let start_parameter = data.number_or("start_param", 0.0)?;
        let end_parameter = data.number_or("end_param", TAU)?;

        target.add(Entity::Ellipse(Ellipse {
            center,
            major_axis,
            ratio,
            start_parameter,
            end_parameter,
            style: attrs.style(),
        }));
        Ok(ProcessReport::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::run;
    use layoutgen_core::document::Document;
    use serde_json::json;

    #[test]
    fn well_formed_primitives_add_drawables() {
        let cases: Vec<(Box<dyn EntityProcessor>, serde_json::Value)> = vec![
            (
                Box::new(RectangleProcessor),
                json!({"points": [[0, 0], [10, 0], [10, 10], [0, 10]]}),
            ),
            (Box::new(CircleProcessor), json!({"center": [0, 0], "radius": 10})),
            (Box::new(LineProcessor), json!({"start": [0, 0], "end": [5, 5]})),
            (Box::new(TextProcessor), json!({"text": "Label", "position": [1, 1]})),
            (
                Box::new(ArcProcessor),
                json!({"center": [0, 0], "radius": 5, "start_angle": 0, "end_angle": 90}),
            ),
            (
                Box::new(SplineProcessor),
                json!({"control_points": [[0, 0], [50, 100], [100, 50], [150, 150]]}),
            ),
            (Box::new(PolylineProcessor), json!({"points": [[0, 0], [1, 1]]})),
            (
                Box::new(EllipseProcessor),
                json!({"center": [100, 200], "major_axis": [50, 0], "ratio": 0.6}),
            ),
        ];
        for (processor, value) in cases {
            let mut document = Document::new();
            let (result, before, after) = run(processor.as_ref(), &mut document, value);
            assert!(result.is_ok(), "{} 应成功: {result:?}", processor.kind());
            assert!(after > before, "{} 应增加可绘制实体", processor.kind());
        }
    }

    #[test]
    fn malformed_primitives_leave_target_unchanged() {
        let cases: Vec<(Box<dyn EntityProcessor>, serde_json::Value)> = vec![
            (Box::new(RectangleProcessor), json!({"points": [[0, 0], [10, 0]]})),
            (Box::new(CircleProcessor), json!({"center": [0, 0]})),
            (Box::new(CircleProcessor), json!({"center": [0, 0], "radius": -2})),
            (Box::new(CircleProcessor), json!({"center": [0], "radius": 2})),
            (Box::new(LineProcessor), json!({"start": [0, 0]})),
            (Box::new(TextProcessor), json!({"position": [0, 0]})),
            (
                Box::new(ArcProcessor),
                json!({"center": [0, 0], "radius": 5, "start_angle": 0, "end_angle": 400}),
            ),
            (
                Box::new(SplineProcessor),
                json!({"control_points": [[0, 0], [1, 1]], "degree": 0}),
            ),
            (Box::new(PolylineProcessor), json!({"points": [[0, 0]]})),
            (
                Box::new(EllipseProcessor),
                json!({"center": [0, 0], "major_axis": [10, 0], "ratio": 1.5}),
            ),
            (
                Box::new(EllipseProcessor),
                json!({"center": [0, 0], "major_axis": [0, 0]}),
            ),
        ];
        for (processor, value) in cases {
            let mut document = Document::new();
            let (result, before, after) = run(processor.as_ref(), &mut document, value.clone());
            assert!(result.is_err(), "{} 应失败: {value}", processor.kind());
            assert_eq!(before, after);
        }
    }

    #[test]
    fn wrapping_arc_is_accepted() {
        let mut document = Document::new();
        let (result, _, _) = run(
            &ArcProcessor,
            &mut document,
            json!({"center": [0, 0], "radius": 5, "start_angle": 270, "end_angle": 90}),
        );
        assert!(result.is_ok());
        let Some((_, Entity::Arc(arc))) = document.entities().next() else {
            panic!("应生成圆弧");
        };
        assert!((arc.start_angle - 270f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn polyline_detects_third_dimension_from_first_point() {
        let mut document = Document::new();
        let (result, _, _) = run(
            &PolylineProcessor,
            &mut document,
            json!({"points": [[0, 0, 1], [5, 5, 2], [10, 0, 3]], "closed": true}),
        );
        assert!(result.is_ok());
        assert!(matches!(
            document.entities().next(),
            Some((_, Entity::Polyline3D(polyline))) if polyline.is_closed && polyline.vertices.len() == 3
        ));
    }

    #[test]
    fn spline_degree_is_reduced_with_warning() {
        let mut document = Document::new();
        let (result, _, _) = run(
            &SplineProcessor,
            &mut document,
            json!({"control_points": [[300, 0], [350, 50], [400, 0]]}),
        );
        let report = result.expect("样条应成功");
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn ellipse_defaults_to_full_turn() {
        let mut document = Document::new();
        run(
            &EllipseProcessor,
            &mut document,
            json!({"center": [0, 0], "major_axis": [40, 0], "ratio": 0.7}),
        )
        .0
        .expect("椭圆应成功");
        let Some((_, Entity::Ellipse(ellipse))) = document.entities().next() else {
            panic!("应生成椭圆");
        };
        assert!(ellipse.start_parameter.abs() < 1e-12);
        assert!((ellipse.end_parameter - TAU).abs() < 1e-12);
    }
}
