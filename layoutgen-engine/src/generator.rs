use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use layoutgen_core::document::{
    BlockDefinition, Document, EntitySpace, LayerDeclaration, DEFAULT_COLOR,
};
use layoutgen_core::geometry::Point2;
use layoutgen_io::{DocumentSaver, DxfWriter};

use crate::artifact::{ArtifactHandle, ArtifactRegistry};
use crate::entity::{is_plain_name, DrawingTarget, DEFAULT_LAYER};
use crate::errors::{EntityError, GenerationError};
use crate::factory::{EntityFactory, EntityOutcome};
use crate::instructions::{BlockSpec, InstructionDocument, LayerSpec};
use crate::summary::ProcessingSummary;

/// 生成流程的阶段。除 Save 外，各列表阶段逐项容错。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Init,
    ProcessLayers,
    ProcessBlocks,
    ProcessFigures,
    FinalizeLayout,
    Save,
    Done,
    Failed,
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationPhase::Init => "init",
            GenerationPhase::ProcessLayers => "process_layers",
            GenerationPhase::ProcessBlocks => "process_blocks",
            GenerationPhase::ProcessFigures => "process_figures",
            GenerationPhase::FinalizeLayout => "finalize_layout",
            GenerationPhase::Save => "save",
            GenerationPhase::Done => "done",
            GenerationPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 成功生成的产物与摘要。产物句柄释放时文件被删除。
#[derive(Debug)]
pub struct GenerationOutput {
    pub artifact: ArtifactHandle,
    pub size_bytes: u64,
    pub summary: ProcessingSummary,
}

/// 致命失败，仍然保留失败前累积的摘要。
#[derive(Debug, Error)]
#[error("generation failed during {phase}: {error}")]
pub struct GenerationFailure {
    #[source]
    pub error: GenerationError,
    pub phase: GenerationPhase,
    pub summary: ProcessingSummary,
}

pub struct DxfGenerator {
    factory: Arc<EntityFactory>,
    saver: Box<dyn DocumentSaver>,
    default_layer_color: i16,
}

impl DxfGenerator {
    pub fn new() -> Self {
        Self {
            factory: EntityFactory::standard(),
            saver: Box::new(DxfWriter::new()),
            default_layer_color: DEFAULT_COLOR,
        }
    }

    pub fn with_saver(mut self, saver: impl DocumentSaver + 'static) -> Self {
        self.saver = Box::new(saver);
        self
    }

    pub fn with_factory(mut self, factory: Arc<EntityFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_default_layer_color(mut self, color: i16) -> Self {
        self.default_layer_color = color;
        self
    }

    /// 执行 ProcessLayers → ProcessBlocks → ProcessFigures → FinalizeLayout，返回内存中的文档。
    pub fn build_document(
        &self,
        instructions: &InstructionDocument,
        summary: &mut ProcessingSummary,
    ) -> Document {
        self.build(instructions, summary, &mut Run::new())
    }

    fn build(
        &self,
        instructions: &InstructionDocument,
        summary: &mut ProcessingSummary,
        run: &mut Run,
    ) -> Document {
        let mut document = Document::new();

        run.enter(GenerationPhase::ProcessLayers);
        for layer in &instructions.layers {
            self.declare_layer(&mut document, layer, summary);
        }
        let default_declared = document.has_layer(DEFAULT_LAYER);

        run.enter(GenerationPhase::ProcessBlocks);
        let mut declared_blocks = HashSet::new();
        for block in &instructions.blocks {
            self.process_block(&mut document, block, &mut declared_blocks, summary);
        }

        run.enter(GenerationPhase::ProcessFigures);
        {
            let mut target = DrawingTarget::model(&mut document);
            for (index, figure) in instructions.figures.iter().enumerate() {
                let outcome = self.factory.process(figure, &mut target, DEFAULT_LAYER);
                log_failure(&outcome, "figure", index);
                summary.record(&outcome);
            }
        }

        run.enter(GenerationPhase::FinalizeLayout);
        if !default_declared {
            if let Some(layer) = document.layer_mut(DEFAULT_LAYER) {
                layer.color = self.default_layer_color;
            }
        }
        let extents = document.refresh_extents();
        debug!(
            entity_count = document.space_entity_count(&EntitySpace::Model),
            has_extents = extents.is_some(),
            "布局整理完成"
        );
        document
    }

    /// 完整生成：构建文档并写出登记在 `registry` 中的临时产物。
    pub fn generate(
        &self,
        instructions: &InstructionDocument,
        registry: &Arc<ArtifactRegistry>,
    ) -> Result<GenerationOutput, GenerationFailure> {
        let mut summary = ProcessingSummary::new();
        let mut run = Run::new();
        if let Some(client_info) = &instructions.client_info {
            info!(client_info = %serde_json::Value::Object(client_info.clone()), "收到生成请求");
        }
        info!(
            layers = instructions.layers.len(),
            blocks = instructions.blocks.len(),
            figures = instructions.figures.len(),
            "开始生成 DXF"
        );

        let document = self.build(instructions, &mut summary, &mut run);

        run.enter(GenerationPhase::Save);
        match self.save(&document, registry) {
            Ok((artifact, size_bytes)) => {
                summary.finalize(artifact.filename(), size_bytes);
                run.enter(GenerationPhase::Done);
                info!(
                    total = summary.total_entities(),
                    successful = summary.successful_entities(),
                    failed = summary.failed_entities(),
                    size_bytes,
                    "DXF 生成完成"
                );
                Ok(GenerationOutput {
                    artifact,
                    size_bytes,
                    summary,
                })
            }
            Err(err) => {
                run.enter(GenerationPhase::Failed);
                error!(error = %err, "DXF 保存失败");
                summary.finish_failed(format!("generation: {err}"));
                Err(GenerationFailure {
                    error: err,
                    phase: GenerationPhase::Save,
                    summary,
                })
            }
        }
    }

    fn save(
        &self,
        document: &Document,
        registry: &Arc<ArtifactRegistry>,
    ) -> Result<(ArtifactHandle, u64), GenerationError> {
        let artifact = registry.create(".dxf")?;
        self.saver.save(document, artifact.path())?;
        let size = artifact.size()?;
        Ok((artifact, size))
    }

    fn declare_layer(&self, document: &mut Document, spec: &LayerSpec, summary: &mut ProcessingSummary) {
        let name = spec.name.trim();
        if name.is_empty() {
            summary.add_warning("layer: empty layer name ignored");
            return;
        }
        if !is_plain_name(name) {
            warn!(layer = ?name, "图层名含控制字符，已忽略");
            summary.add_warning(format!("layer {name:?}: name contains control characters, ignored"));
            return;
        }
        let color = match i16::try_from(spec.color) {
            Ok(color) if (0..=256).contains(&color) => color,
            _ => {
                summary.add_warning(format!(
                    "layer `{name}`: color {} out of range, using {}",
                    spec.color, self.default_layer_color
                ));
                self.default_layer_color
            }
        };
        if document.declare_layer(name, color) == LayerDeclaration::Duplicate {
            warn!(layer = name, "重复声明图层，保留首个定义");
            summary.add_warning(format!("layer `{name}` declared more than once, keeping the first"));
        }
    }

    fn process_block(
        &self,
        document: &mut Document,
        block: &BlockSpec,
        declared: &mut HashSet<String>,
        summary: &mut ProcessingSummary,
    ) {
        let rejection = if !is_plain_name(&block.name) {
            Some(EntityError::InvalidName {
                field: "block",
                value: block.name.clone(),
            })
        } else if !declared.insert(block.name.clone()) {
            Some(EntityError::DuplicateBlock(block.name.clone()))
        } else {
            None
        };
        if let Some(error) = rejection {
            warn!(block = ?block.name, error = %error, "块被拒绝，其实体记为失败");
            for (index, data) in block.entities.iter().enumerate() {
                let outcome = EntityOutcome {
                    kind: data.kind_tag().unwrap_or("unknown").to_string(),
                    layer: data.layer_or(DEFAULT_LAYER).to_string(),
                    result: Err(error.clone()),
                };
                log_failure(&outcome, "block entity", index);
                summary.record(&outcome);
            }
            return;
        }

        let mut definition = BlockDefinition::new(&block.name);
        if let Some([x, y]) = block.base_point {
            definition.base_point = Point2::new(x, y);
        }
        document.add_block_definition(definition);

        let mut target = DrawingTarget::block(document, block.name.clone());
        for (index, data) in block.entities.iter().enumerate() {
            let outcome = self.factory.process(data, &mut target, DEFAULT_LAYER);
            log_failure(&outcome, "block entity", index);
            summary.record(&outcome);
        }
        debug!(block = %block.name, entities = block.entities.len(), "块处理完成");
    }
}

impl Default for DxfGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn log_failure(outcome: &EntityOutcome, scope: &str, index: usize) {
    if let Err(err) = &outcome.result {
        warn!(scope, index, kind = %outcome.kind, error = %err, "实体记为失败");
    }
}

/// 阶段迁移记录。
struct Run {
    phase: GenerationPhase,
}

impl Run {
    fn new() -> Self {
        Self {
            phase: GenerationPhase::Init,
        }
    }

    fn enter(&mut self, next: GenerationPhase) {
        debug!(from = %self.phase, to = %next, "生成阶段切换");
        self.phase = next;
    }
}
