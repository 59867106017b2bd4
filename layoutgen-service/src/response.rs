use std::io::{self, Write};

use serde::Serialize;

use layoutgen_engine::artifact::ArtifactChunks;
use layoutgen_engine::summary::SummaryReport;
use layoutgen_engine::template::AppliedTemplateInfo;

pub const DXF_CONTENT_TYPE: &str = "application/dxf";

/// 请求结果：摘要或产物，二者必居其一。
#[derive(Debug)]
pub enum ServiceResponse {
    Summary(SummaryResponse),
    Artifact(ArtifactResponse),
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub report: SummaryReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_info: Option<AppliedTemplateInfo>,
}

#[derive(Debug)]
pub struct ArtifactResponse {
    pub content_type: &'static str,
    pub filename: String,
    pub size_bytes: u64,
    pub body: ArtifactBody,
}

/// 小产物一次读入；超过阈值的产物按块读取。
#[derive(Debug)]
pub enum ArtifactBody {
    Buffered(Vec<u8>),
    Streamed(ArtifactChunks),
}

impl ArtifactBody {
    #[inline]
    pub fn is_streamed(&self) -> bool {
        matches!(self, ArtifactBody::Streamed(_))
    }

    /// 写出全部内容，返回写入字节数。流式产物在读完后被清理。
    pub fn write_to<W: Write>(self, mut writer: W) -> io::Result<u64> {
        let mut written = 0u64;
        match self {
            ArtifactBody::Buffered(bytes) => {
                writer.write_all(&bytes)?;
                written += bytes.len() as u64;
            }
            ArtifactBody::Streamed(chunks) => {
                for chunk in chunks {
                    let chunk = chunk?;
                    writer.write_all(&chunk)?;
                    written += chunk.len() as u64;
                }
            }
        }
        writer.flush()?;
        Ok(written)
    }
}
