use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use layoutgen_engine::instructions::InstructionDocument;
use layoutgen_engine::template::Customization;

use crate::errors::ServiceError;

/// 模板生成请求。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRequest {
    pub template_name: String,
    #[serde(default)]
    pub customization: Customization,
    #[serde(default)]
    pub return_summary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Map<String, Value>>,
}

/// 解析指令请求体；错误信息由 serde 给出出错字段与位置。
pub fn parse_instructions(body: &[u8]) -> Result<InstructionDocument, ServiceError> {
    let instructions: InstructionDocument = serde_json::from_slice(body)?;
    debug!(
        layers = instructions.layers.len(),
        blocks = instructions.blocks.len(),
        figures = instructions.figures.len(),
        "指令请求解析完成"
    );
    Ok(instructions)
}

pub fn parse_template_request(body: &[u8]) -> Result<TemplateRequest, ServiceError> {
    let request: TemplateRequest = serde_json::from_slice(body)?;
    debug!(template = %request.template_name, "模板请求解析完成");
    Ok(request)
}

/// 读取磁盘上的请求体。
pub fn read_body(path: impl AsRef<Path>) -> Result<Vec<u8>, ServiceError> {
    Ok(fs::read(path.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_request_defaults() {
        let request = parse_template_request(br#"{"template_name": "compact_galley"}"#)
            .expect("请求解析失败");
        assert_eq!(request.template_name, "compact_galley");
        assert!(request.customization.is_empty());
        assert!(!request.return_summary);
    }

    #[test]
    fn missing_template_name_is_reported() {
        let err = parse_template_request(br#"{"customization": {}}"#).expect_err("缺少模板名应失败");
        assert!(err.to_string().contains("template_name"));
    }

    #[test]
    fn malformed_instructions_name_the_field() {
        let err = parse_instructions(br#"{"layers": [{"color": 3}]}"#).expect_err("缺少图层名应失败");
        assert!(err.to_string().contains("name"));
    }
}
