use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::entity::{DrawingTarget, EntityData, SharedAttributes};
use crate::errors::EntityError;
use crate::processors::{
    ArcProcessor, AttributeProcessor, CircleProcessor, CoordinateSystemProcessor,
    DimensionProcessor, EllipseProcessor, EntityProcessor, HatchProcessor, LayerStateProcessor,
    LeaderProcessor, LineProcessor, LinetypeProcessor, MTextProcessor, MeshProcessor,
    PolylineProcessor, ProcessReport, RectangleProcessor, SolidProcessor, SplineProcessor,
    TextProcessor, ViewportProcessor,
};

static STANDARD: Lazy<Arc<EntityFactory>> = Lazy::new(|| Arc::new(EntityFactory::new()));

/// 单个实体的处理结果。
#[derive(Debug, Clone)]
pub struct EntityOutcome {
    pub kind: String,
    pub layer: String,
    pub result: Result<ProcessReport, EntityError>,
}

impl EntityOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn warnings(&self) -> &[String] {
        match &self.result {
            Ok(report) => &report.warnings,
            Err(_) => &[],
        }
    }
}

/// 类型标签到处理器的注册表。处理失败全部收敛为 `EntityOutcome`，不向外传播。
pub struct EntityFactory {
    processors: HashMap<&'static str, Box<dyn EntityProcessor>>,
}

impl EntityFactory {
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.register(RectangleProcessor);
        factory.register(CircleProcessor);
        factory.register(LineProcessor);
        factory.register(TextProcessor);
        factory.register(ArcProcessor);
        factory.register(SplineProcessor);
        factory.register(PolylineProcessor);
        factory.register(EllipseProcessor);
        factory.register(SolidProcessor);
        factory.register(MeshProcessor);
        factory.register(DimensionProcessor);
        factory.register(LeaderProcessor);
        factory.register(HatchProcessor);
        factory.register(MTextProcessor);
        factory.register(ViewportProcessor);
        factory.register(LinetypeProcessor);
        factory.register(LayerStateProcessor);
        factory.register(AttributeProcessor);
        factory.register(CoordinateSystemProcessor);
        factory
    }

    pub fn empty() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// 进程内共享的标准注册表。
    pub fn standard() -> Arc<EntityFactory> {
        Arc::clone(&STANDARD)
    }

    /// 注册处理器，同类型的旧处理器被替换。
    pub fn register<P: EntityProcessor + 'static>(&mut self, processor: P) {
        self.processors
            .insert(processor.kind().as_str(), Box::new(processor));
    }

    pub fn supports(&self, tag: &str) -> bool {
        self.processors.contains_key(tag)
    }

    pub fn supported_kinds(&self) -> impl Iterator<Item = &&'static str> {
        self.processors.keys()
    }

    /// 分派单个实体；未知或缺失的类型标签记为失败实体。
    pub fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        fallback_layer: &str,
    ) -> EntityOutcome {
        let kind = data.kind_tag().unwrap_or("unknown").to_string();
        let layer = data.layer_or(fallback_layer).to_string();
        let result = self.dispatch(data, target, fallback_layer);
        match &result {
            Ok(report) => debug!(kind = %kind, layer = %layer, warnings = report.warnings.len(), "实体处理完成"),
            Err(err) => debug!(kind = %kind, layer = %layer, error = %err, "实体处理失败"),
        }
        EntityOutcome { kind, layer, result }
    }

    fn dispatch(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        fallback_layer: &str,
    ) -> Result<ProcessReport, EntityError> {
        if data.as_object().is_none() {
            return Err(EntityError::NotAnObject);
        }
        let tag = data.kind_tag().ok_or(EntityError::MissingKind)?;
        let processor = self
            .processors
            .get(tag)
            .ok_or_else(|| EntityError::UnsupportedKind(tag.to_string()))?;
        let attrs = SharedAttributes::from_entity(data, fallback_layer)?;
        processor.process(data, target, &attrs)
    }
}

impl Default for EntityFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use layoutgen_core::document::Document;
    use serde_json::json;

    #[test]
    fn standard_registry_covers_every_kind() {
        let factory = EntityFactory::standard();
        for kind in EntityKind::ALL {
            assert!(factory.supports(kind.as_str()), "缺少处理器: {kind}");
        }
        assert_eq!(factory.supported_kinds().count(), 19);
    }

    #[test]
    fn unknown_or_missing_tags_are_contained() {
        let factory = EntityFactory::new();
        let mut document = Document::new();
        let mut target = DrawingTarget::model(&mut document);

        let unknown = factory.process(
            &EntityData::new(json!({"type": "invalid_entity", "layer": "Geometry"})),
            &mut target,
            "default",
        );
        assert_eq!(
            unknown.result,
            Err(EntityError::UnsupportedKind("invalid_entity".to_string()))
        );
        assert_eq!(unknown.layer, "Geometry");

        let missing = factory.process(&EntityData::new(json!({"center": [0, 0]})), &mut target, "default");
        assert_eq!(missing.result, Err(EntityError::MissingKind));
        assert_eq!(missing.kind, "unknown");

        let scalar = factory.process(&EntityData::new(json!(42)), &mut target, "default");
        assert_eq!(scalar.result, Err(EntityError::NotAnObject));
        assert_eq!(target.drawable_count(), 0);
    }

    #[test]
    fn every_minimal_entity_adds_a_drawable() {
        let factory = EntityFactory::new();
        let minimal = [
            json!({"type": "rectangle", "points": [[0, 0], [1, 0], [1, 1]]}),
            json!({"type": "circle", "center": [0, 0], "radius": 1}),
            json!({"type": "line", "start": [0, 0], "end": [1, 0]}),
            json!({"type": "text", "text": "T", "position": [0, 0]}),
            json!({"type": "arc", "center": [0, 0], "radius": 1, "start_angle": 0, "end_angle": 45}),
            json!({"type": "spline", "control_points": [[0, 0], [1, 1]]}),
            json!({"type": "polyline", "points": [[0, 0], [1, 1]]}),
            json!({"type": "ellipse", "center": [0, 0], "major_axis": [2, 0], "ratio": 0.5}),
            json!({"type": "solid", "solid_type": "sphere", "center": [0, 0], "radius": 1}),
            json!({"type": "mesh", "vertices": [[0, 0, 0], [1, 0, 0], [0, 1, 0]], "faces": [[0, 1, 2]]}),
            json!({"type": "dimension", "dimension_type": "radial", "center": [0, 0], "radius_point": [1, 0]}),
            json!({"type": "leader", "vertices": [[0, 0], [1, 1]]}),
            json!({"type": "hatch", "boundary": [[0, 0], [1, 0], [1, 1]]}),
            json!({"type": "mtext", "text": "M", "position": [0, 0]}),
            json!({"type": "viewport", "center": [0, 0], "width": 10, "height": 5}),
            json!({"type": "linetype", "linetype_name": "DASH", "linetype_pattern": [1, -1]}),
            json!({"type": "layer_state", "layer_name": "0", "frozen": true}),
            json!({"type": "attribute", "attribute_type": "value", "tag": "T", "value": "V", "position": [0, 0]}),
            json!({"type": "coordinate_system", "transform_type": "translate", "base_point": [0, 0], "offset": [1, 1]}),
        ];
        for value in minimal {
            let mut document = Document::new();
            let mut target = DrawingTarget::model(&mut document);
            let before = target.drawable_count();
            let outcome = factory.process(&EntityData::new(value), &mut target, "0");
            assert!(outcome.is_success(), "{} 应成功: {:?}", outcome.kind, outcome.result);
            assert!(target.drawable_count() > before, "{} 未增加可绘制数", outcome.kind);
        }
    }

    #[test]
    fn invalid_color_fails_before_drawing() {
        let factory = EntityFactory::new();
        let mut document = Document::new();
        let mut target = DrawingTarget::model(&mut document);
        let outcome = factory.process(
            &EntityData::new(json!({"type": "circle", "center": [0, 0], "radius": 1, "color": 999})),
            &mut target,
            "0",
        );
        assert!(!outcome.is_success());
        assert_eq!(target.drawable_count(), 0);
    }
}
