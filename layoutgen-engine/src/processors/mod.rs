//! 每种实体类型一个处理器。处理器先完成全部字段与几何校验，
//! 校验通过后才调用绘图原语，失败时目标文档保持原状。

mod annotations;
mod primitives;
mod solids;
mod state;

pub use annotations::{
    DimensionProcessor, HatchProcessor, LeaderProcessor, MTextProcessor, ViewportProcessor,
};
pub use primitives::{
    ArcProcessor, CircleProcessor, EllipseProcessor, LineProcessor, PolylineProcessor,
    RectangleProcessor, SplineProcessor, TextProcessor,
};
pub use solids::{MeshProcessor, SolidProcessor};
pub use state::{
    AttributeProcessor, CoordinateSystemProcessor, LayerStateProcessor, LinetypeProcessor,
};

use crate::entity::{DrawingTarget, EntityData, EntityKind, SharedAttributes};
use crate::errors::EntityError;

/// 处理成功时附带的非致命警告。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessReport {
    pub warnings: Vec<String>,
}

impl ProcessReport {
    #[inline]
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

pub trait EntityProcessor: Send + Sync {
    fn kind(&self) -> EntityKind;
    fn process(
        &self,
        data: &EntityData,
        target: &mut DrawingTarget<'_>,
        attrs: &SharedAttributes,
    ) -> Result<ProcessReport, EntityError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use layoutgen_core::document::Document;
    use serde_json::Value;

    use super::*;

    /// 在模型空间运行处理器，返回结果与处理前后的可绘制数。
    pub fn run(
        processor: &dyn EntityProcessor,
        document: &mut Document,
        value: Value,
    ) -> (Result<ProcessReport, EntityError>, usize, usize) {
        let data = EntityData::new(value);
        let attrs = SharedAttributes::from_entity(&data, "0").expect("共享属性应有效");
        let mut target = DrawingTarget::model(document);
        let before = target.drawable_count();
        let result = processor.process(&data, &mut target, &attrs);
        let after = target.drawable_count();
        (result, before, after)
    }
}
