use std::fmt::Display;

use serde::{Serialize, Serializer};
use thiserror::Error;

use layoutgen_engine::errors::{GenerationError, RequestError, TemplateError};
use layoutgen_engine::summary::SummaryReport;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request body: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("request rejected: {0}")]
    Request(#[from] RequestError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("failed to read artifact: {0}")]
    Artifact(#[from] std::io::Error),
}

/// 请求失败的完整结果。生成阶段失败时附带失败前累积的摘要。
#[derive(Debug, Error, Serialize)]
#[error("{error}")]
pub struct ServiceFailure {
    #[source]
    #[serde(serialize_with = "as_display")]
    pub error: ServiceError,
    pub summary: Option<SummaryReport>,
}

impl ServiceFailure {
    pub fn with_summary(error: impl Into<ServiceError>, summary: SummaryReport) -> Self {
        Self {
            error: error.into(),
            summary: Some(summary),
        }
    }
}

impl From<ServiceError> for ServiceFailure {
    fn from(error: ServiceError) -> Self {
        Self {
            error,
            summary: None,
        }
    }
}

fn as_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
