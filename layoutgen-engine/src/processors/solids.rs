use serde_json::Value;

use layoutgen_core::document::{Entity, ThreeDFace};
use layoutgen_core::geometry::Point3;

use super::{EntityProcessor, ProcessReport};
use crate::entity::{DrawingTarget, EntityData, EntityKind, SharedAttributes};
use crate::errors::EntityError;

/// 简化实体代理：box 画上下两个面，cylinder / sphere 画一个圆。
pub struct SolidProcessor;

impl EntityProcessor for SolidProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Solid
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let solid_type = data
            .require("solid_type")?
            .as_str()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match solid_type.as_str() {
            "box" => {
                let first = data.point3("corner1")?;
                let second = data.point3("corner2")?;
                if (first.x() - second.x()).abs() <= f64::EPSILON
                    || (first.y() - second.y()).abs() <= f64::EPSILON
                {
                    return Err(EntityError::InvalidGeometry(
                        "box corners must span a non-empty footprint".to_string(),
                    ));
                }
                for z in [first.z(), second.z()] {
                    let face = ThreeDFace {
                        vertices: [
                            Point3::new(first.x(), first.y(), z),
                            Point3::new(second.x(), first.y(), z),
                            Point3::new(second.x(), second.y(), z),
                            Point3::new(first.x(), second.y(), z),
                        ],
                        style: attrs.style(),
                    };
                    target.add(Entity::Face3D(face));
                }
            }
            "cylinder" => {
                let center = data.point("center")?;
                let radius = data.radius("radius")?;
                data.positive_or("height", 1.0)?;
                target.add_circle(center, radius, attrs);
            }
            "sphere" => {
                let center = data.point("center")?;
                let radius = data.radius("radius")?;
                target.add_circle(center, radius, attrs);
            }
            _ => {
                return Err(EntityError::UnknownVariant {
                    field: "solid_type",
                    value: solid_type,
                });
            }
        }
        Ok(ProcessReport::ok())
    }
}

/// 网格面按四边形输出，不足四个索引时以最后一个顶点补齐（三角面退化为四边形）。
pub struct MeshProcessor;

impl EntityProcessor for MeshProcessor {
    fn kind(&self) -> EntityKind {
        EntityKind::Mesh
    }

    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError> {
        let vertices = data.points3("vertices", 3)?;
        let faces = data.list("faces", 1)?;

        let mut report = ProcessReport::ok();
        let mut quads = Vec::with_capacity(faces.len());
        for (face_index, face) in faces.iter().enumerate() {
            match face_quad(face, &vertices) {
                Ok((quad, truncated)) => {
                    if truncated {
                        report.warn(format!(
                            "mesh face {face_index} has more than 4 vertices, extra indices ignored"
                        ));
                    }
                    quads.push(quad);
                }
                Err(reason) => report.warn(format!("mesh face {face_index} skipped: {reason}")),
            }
        }

        if quads.is_empty() {
            return Err(EntityError::NoRenderableFaces);
        }
        for vertices in quads {
            target.add(Entity::Face3D(ThreeDFace {
                vertices,
                style: attrs.style(),
            }));
        }
        Ok(report)
    }
}

fn face_quad(face: &Value, vertices: &[Point3]) -> Result<([Point3; 4], bool), String> {
    let indices = face
        .as_array()
        .ok_or_else(|| format!("expected an index list, got {face}"))?;
    if indices.len() < 3 {
        return Err(format!("needs at least 3 indices, got {}", indices.len()));
    }
    let mut resolved = Vec::with_capacity(4);
    for index in indices.iter().take(4) {
        let vertex = index
            .as_u64()
            .and_then(|i| vertices.get(i as usize))
            .ok_or_else(|| format!("index {index} out of range for {} vertices", vertices.len()))?;
        resolved.push(*vertex);
    }
    let last = resolved[resolved.len() - 1];
    while resolved.len() < 4 {
        resolved.push(last);
    }
    Ok((
        [resolved[0], resolved[1], resolved[2], resolved[3]],
        indices.len() > 4,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::run;
    use layoutgen_core::document::Document;
    use serde_json::json;

    #[test]
    fn box_emits_two_planar_faces() {
        let mut document = Document::new();
        let (result, before, after) = run(
            &SolidProcessor,
            &mut document,
            json!({"solid_type": "box", "corner1": [0, 300, 0], "corner2": [50, 350, 50]}),
        );
        assert!(result.is_ok());
        assert_eq!(after - before, 2);
        let heights: Vec<f64> = document
            .entities()
            .filter_map(|(_, entity)| match entity {
                Entity::Face3D(face) => Some(face.vertices[0].z()),
                _ => None,
            })
            .collect();
        assert_eq!(heights, vec![0.0, 50.0]);
    }

    #[test]
    fn cylinder_and_sphere_become_circles() {
        for value in [
            json!({"solid_type": "cylinder", "center": [0, 0], "radius": 10, "height": 40}),
            json!({"solid_type": "sphere", "center": [5, 5], "radius": 3}),
        ] {
            let mut document = Document::new();
            let (result, before, after) = run(&SolidProcessor, &mut document, value);
            assert!(result.is_ok());
            assert_eq!(after, before + 1);
        }
    }

    #[test]
    fn unknown_solid_type_fails() {
        let mut document = Document::new();
        let (result, before, after) = run(
            &SolidProcessor,
            &mut document,
            json!({"solid_type": "torus", "center": [0, 0], "radius": 1}),
        );
        assert!(matches!(result, Err(EntityError::UnknownVariant { .. })));
        assert_eq!(before, after);
    }

    #[test]
    fn triangular_faces_are_padded_with_last_vertex() {
        let mut document = Document::new();
        let (result, _, after) = run(
            &MeshProcessor,
            &mut document,
            json!({
                "vertices": [[0, 400, 0], [50, 400, 0], [25, 450, 25], [25, 400, 50]],
                "faces": [[0, 1, 2], [0, 2, 3], [1, 2, 3]]
            }),
        );
        assert!(result.expect("网格应成功").warnings.is_empty());
        assert_eq!(after, 3);
        let Some((_, Entity::Face3D(face))) = document.entities().next() else {
            panic!("应生成 3DFACE");
        };
        assert_eq!(face.vertices[2], face.vertices[3]);
    }

    #[test]
    fn out_of_range_faces_are_skipped_with_warning() {
        let mut document = Document::new();
        let (result, _, after) = run(
            &MeshProcessor,
            &mut document,
            json!({
                "vertices": [[0, 0, 0], [1, 0, 0], [1, 1, 0]],
                "faces": [[0, 1, 2], [0, 1, 9], [0, 1]]
            }),
        );
        let report = result.expect("仍有可渲染面");
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(after, 1);
    }

    #[test]
    fn mesh_without_renderable_faces_fails_cleanly() {
        let mut document = Document::new();
        let (result, before, after) = run(
            &MeshProcessor,
            &mut document,
            json!({"vertices": [[0, 0, 0], [1, 0, 0], [1, 1, 0]], "faces": [[5, 6, 7]]}),
        );
        assert_eq!(result, Err(EntityError::NoRenderableFaces));
        assert_eq!(before, after);
    }

    #[test]
    fn mesh_needs_three_vertices() {
        let mut document = Document::new();
        let (result, _, _) = run(
            &MeshProcessor,
            &mut document,
            json!({"vertices": [[0, 0, 0], [1, 0, 0]], "faces": [[0, 1, 1]]}),
        );
        assert!(matches!(result, Err(EntityError::TooFewItems { field: "vertices", .. })));
    }
}
