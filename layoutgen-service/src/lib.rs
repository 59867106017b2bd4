pub mod errors;
pub mod request;
pub mod response;

use std::sync::Arc;

use tracing::{info, warn};

use layoutgen_config::AppConfig;
use layoutgen_engine::artifact::ArtifactRegistry;
use layoutgen_engine::generator::{DxfGenerator, GenerationFailure, GenerationOutput};
use layoutgen_engine::instructions::InstructionDocument;
use layoutgen_engine::request::RequestValidator;
use layoutgen_engine::template::{AppliedTemplateInfo, TemplateCatalog, TemplateCustomizer};

use errors::{ServiceError, ServiceFailure};
use request::TemplateRequest;
use response::{ArtifactBody, ArtifactResponse, ServiceResponse, SummaryResponse, DXF_CONTENT_TYPE};

/// 请求处理入口：校验 → 定制 → 生成 → 选择响应形式。
///
/// 每次调用独占自己的文档与摘要；多个调用之间只共享临时产物登记表。
pub struct GenerationService {
    config: AppConfig,
    generator: DxfGenerator,
    validator: RequestValidator,
    customizer: TemplateCustomizer,
    catalog: &'static TemplateCatalog,
    registry: Arc<ArtifactRegistry>,
}

impl GenerationService {
    pub fn new(config: AppConfig) -> Self {
        let generator =
            DxfGenerator::new().with_default_layer_color(config.generation.default_layer_color);
        let validator = RequestValidator::new()
            .with_limits(
                config.generation.max_entities,
                config.generation.max_mesh_vertices,
            )
            .with_streaming_threshold(config.generation.streaming_threshold);
        let registry = Arc::new(ArtifactRegistry::new(
            config.output.artifact_dir.clone(),
            config.output.filename_prefix.clone(),
        ));
        Self {
            config,
            generator,
            validator,
            customizer: TemplateCustomizer::new(),
            catalog: TemplateCatalog::builtin(),
            registry,
        }
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[inline]
    pub fn catalog(&self) -> &TemplateCatalog {
        self.catalog
    }

    #[inline]
    pub fn registry(&self) -> &Arc<ArtifactRegistry> {
        &self.registry
    }

    /// 处理原始指令请求体。
    pub fn handle_instructions(&self, body: &[u8]) -> Result<ServiceResponse, ServiceFailure> {
        let instructions = request::parse_instructions(body)?;
        self.generate(instructions)
    }

    /// 处理原始模板请求体。
    pub fn handle_template(&self, body: &[u8]) -> Result<ServiceResponse, ServiceFailure> {
        let request = request::parse_template_request(body)?;
        self.generate_from_template(request)
    }

    pub fn generate(
        &self,
        instructions: InstructionDocument,
    ) -> Result<ServiceResponse, ServiceFailure> {
        let filename = format!("{}.dxf", self.config.output.filename_prefix);
        self.run(instructions, Vec::new(), None, filename)
    }

    pub fn generate_from_template(
        &self,
        request: TemplateRequest,
    ) -> Result<ServiceResponse, ServiceFailure> {
        let mut warnings = self
            .validator
            .validate_customization(&request.customization)
            .map_err(ServiceError::from)?;
        let template = self
            .catalog
            .get(&request.template_name)
            .map_err(ServiceError::from)?;
        let customized = self
            .customizer
            .combine_customizations(&template, &request.customization)
            .map_err(ServiceError::from)?;
        warnings.extend(customized.warnings);
        info!(
            template = %request.template_name,
            style = customized.template.effective_style(),
            "模板定制完成"
        );

        let mut instructions = customized.template.to_instructions();
        instructions.return_summary = request.return_summary;
        instructions.client_info = request.client_info;
        let filename = format!("{}.dxf", request.template_name);
        self.run(
            instructions,
            warnings,
            Some(customized.template.applied_info()),
            filename,
        )
    }

    fn run(
        &self,
        instructions: InstructionDocument,
        warnings: Vec<String>,
        template_info: Option<AppliedTemplateInfo>,
        filename: String,
    ) -> Result<ServiceResponse, ServiceFailure> {
        let instructions = self
            .validator
            .validate_and_preprocess(instructions)
            .map_err(ServiceError::from)?;
        let detail_limit = self.config.generation.detail_limit;

        let GenerationOutput {
            artifact,
            size_bytes,
            mut summary,
        } = match self.generator.generate(&instructions, &self.registry) {
            Ok(output) => output,
            Err(GenerationFailure {
                error, mut summary, ..
            }) => {
                for warning in warnings {
                    summary.add_warning(warning);
                }
                return Err(ServiceFailure::with_summary(error, summary.report(detail_limit)));
            }
        };
        for warning in warnings {
            summary.add_warning(warning);
        }

        if instructions.return_summary {
            return Ok(ServiceResponse::Summary(SummaryResponse {
                report: summary.report(detail_limit),
                template_info,
            }));
        }

        let threshold = instructions.streaming_threshold();
        let body = if size_bytes > threshold {
            info!(size_bytes, threshold, "产物超过阈值，分块传输");
            ArtifactBody::Streamed(
                artifact
                    .chunks(self.config.output.chunk_size)
                    .map_err(ServiceError::from)?,
            )
        } else {
            ArtifactBody::Buffered(artifact.read_all().map_err(ServiceError::from)?)
        };
        Ok(ServiceResponse::Artifact(ArtifactResponse {
            content_type: DXF_CONTENT_TYPE,
            filename,
            size_bytes,
            body,
        }))
    }

    /// 清理残留产物，进程退出前调用。
    pub fn shutdown(&self) -> usize {
        let removed = self.registry.cleanup_all();
        if removed > 0 {
            warn!(removed, "退出时清理了残留临时产物");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layoutgen_config::OutputConfig;

    fn service(dir: &std::path::Path) -> GenerationService {
        let mut config = AppConfig::default();
        config.output = OutputConfig {
            artifact_dir: Some(dir.to_path_buf()),
            ..OutputConfig::default()
        };
        GenerationService::new(config)
    }

    #[test]
    fn small_artifact_is_buffered_and_cleaned_up() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let service = service(dir.path());
        let response = service
            .handle_instructions(
                br#"{"figures": [{"type": "line", "start": [0, 0], "end": [100, 0]}]}"#,
            )
            .expect("生成应成功");
        let ServiceResponse::Artifact(artifact) = response else {
            panic!("应返回产物");
        };
        assert_eq!(artifact.content_type, "application/dxf");
        assert_eq!(artifact.filename, "layout.dxf");
        assert!(!artifact.body.is_streamed());
        assert_eq!(service.registry().active_count(), 0);
    }

    #[test]
    fn artifact_above_threshold_is_streamed() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let service = service(dir.path());
        let response = service
            .handle_instructions(
                br#"{"streaming_threshold": 16, "figures": [{"type": "circle", "center": [0, 0], "radius": 5}]}"#,
            )
            .expect("生成应成功");
        let ServiceResponse::Artifact(artifact) = response else {
            panic!("应返回产物");
        };
        assert!(artifact.body.is_streamed());
        assert_eq!(service.registry().active_count(), 1);
        let mut sink = Vec::new();
        let written = artifact.body.write_to(&mut sink).expect("写出失败");
        assert_eq!(written, artifact.size_bytes);
        assert!(sink.ends_with(b"EOF\n"));
        assert_eq!(service.registry().active_count(), 0);
    }

    #[test]
    fn rejected_request_carries_no_summary() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let failure = service(dir.path())
            .handle_instructions(br#"{"figures": [{"type": "line", "layer": "Ghost"}]}"#)
            .expect_err("未声明图层应被拒绝");
        assert!(matches!(failure.error, ServiceError::Request(_)));
        assert!(failure.summary.is_none());
    }

    #[test]
    fn template_summary_reports_template_and_unit_warning() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let service = service(dir.path());
        let response = service
            .handle_template(
                br#"{"template_name": "modern_l_shaped", "customization": {"dimensions": [50, 3000]}, "return_summary": true}"#,
            )
            .expect("模板请求应成功");
        let ServiceResponse::Summary(summary) = response else {
            panic!("应返回摘要");
        };
        let info = summary.template_info.expect("应附带模板信息");
        assert_eq!(info.name, "modern_l_shaped");
        assert_eq!(info.dimensions, [50.0, 3000.0]);
        assert!(summary
            .report
            .warnings
            .iter()
            .any(|warning| warning.starts_with("Inconsistent units detected")));
        assert!(summary.report.processing_summary.total_entities > 0);
        assert_eq!(service.registry().active_count(), 0);
    }

    #[test]
    fn unknown_template_is_reported() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let failure = service(dir.path())
            .handle_template(br#"{"template_name": "castle"}"#)
            .expect_err("不存在的模板应失败");
        assert!(failure.to_string().contains("castle"));
    }
}
