use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::factory::EntityOutcome;

/// 序列化时逐项列出的条目上限，超出部分只给出计数。
pub const DEFAULT_DETAIL_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRecord {
    pub index: usize,
    pub kind: String,
    pub layer: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub generation_time_ms: u64,
}

/// 一次生成调用的处理摘要：逐实体记录成功/失败，结束时补充产物大小与耗时。
#[derive(Debug, Clone)]
pub struct ProcessingSummary {
    started_at: DateTime<Utc>,
    started: Instant,
    finished_at: Option<DateTime<Utc>>,
    duration: Option<Duration>,
    counts: OutcomeCounts,
    warnings: Vec<String>,
    errors: Vec<String>,
    by_kind: BTreeMap<String, OutcomeCounts>,
    by_layer: BTreeMap<String, usize>,
    details: Vec<EntityRecord>,
    file_info: Option<FileInfo>,
}

impl ProcessingSummary {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            finished_at: None,
            duration: None,
            counts: OutcomeCounts::default(),
            warnings: Vec::new(),
            errors: Vec::new(),
            by_kind: BTreeMap::new(),
            by_layer: BTreeMap::new(),
            details: Vec::new(),
            file_info: None,
        }
    }

    /// 记录单个实体结果；失败信息以 `kind: error` 形式进入错误列表。
    pub fn add_entity_result(
        &mut self,
        kind: impl Into<String>,
        layer: impl Into<String>,
        success: bool,
        error: Option<String>,
    ) {
        let kind = kind.into();
        let layer = layer.into();
        self.counts.record(success);
        self.by_kind.entry(kind.clone()).or_default().record(success);
        *self.by_layer.entry(layer.clone()).or_default() += 1;
        if let Some(error) = &error {
            self.errors.push(format!("{kind}: {error}"));
        }
        self.details.push(EntityRecord {
            index: self.details.len(),
            kind,
            layer,
            success,
            error,
        });
    }

    pub fn record(&mut self, outcome: &EntityOutcome) {
        for warning in outcome.warnings() {
            self.warnings.push(format!("{}: {warning}", outcome.kind));
        }
        let error = outcome.result.as_ref().err().map(ToString::to_string);
        self.add_entity_result(&outcome.kind, &outcome.layer, outcome.is_success(), error);
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// 生成成功：记录产物信息与结束时间。
    pub fn finalize(&mut self, filename: impl Into<String>, size_bytes: u64) {
        let duration = self.stop();
        self.file_info = Some(FileInfo {
            filename: filename.into(),
            size_bytes,
            generation_time_ms: duration.as_millis() as u64,
        });
    }

    /// 生成失败：仍然记录结束时间，便于诊断。
    pub fn finish_failed(&mut self, error: impl Into<String>) {
        self.add_error(error);
        self.stop();
    }

    fn stop(&mut self) -> Duration {
        let duration = self.started.elapsed();
        self.finished_at = Some(Utc::now());
        self.duration = Some(duration);
        duration
    }

    #[inline]
    pub fn total_entities(&self) -> usize {
        self.counts.total
    }

    #[inline]
    pub fn successful_entities(&self) -> usize {
        self.counts.successful
    }

    #[inline]
    pub fn failed_entities(&self) -> usize {
        self.counts.failed
    }

    #[inline]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    #[inline]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    #[inline]
    pub fn details(&self) -> &[EntityRecord] {
        &self.details
    }

    #[inline]
    pub fn file_info(&self) -> Option<&FileInfo> {
        self.file_info.as_ref()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn kind_counts(&self, kind: &str) -> OutcomeCounts {
        self.by_kind.get(kind).copied().unwrap_or_default()
    }

    /// 成功率在读取时计算；总数为 0 时为 "0%"。
    pub fn success_rate(&self) -> String {
        if self.counts.total == 0 {
            return "0%".to_string();
        }
        let rate = self.counts.successful as f64 / self.counts.total as f64 * 100.0;
        format!("{rate:.1}%")
    }

    pub fn report(&self, detail_limit: usize) -> SummaryReport {
        let (warnings, omitted_warnings) = capped(&self.warnings, detail_limit);
        let (errors, omitted_errors) = capped(&self.errors, detail_limit);
        let (entity_details, omitted_details) = capped(&self.details, detail_limit);
        let omitted = Omitted {
            warnings: omitted_warnings,
            errors: omitted_errors,
            entity_details: omitted_details,
        };
        SummaryReport {
            processing_summary: Totals {
                total_entities: self.counts.total,
                successful_entities: self.counts.successful,
                failed_entities: self.counts.failed,
                success_rate: self.success_rate(),
                started_at: self.started_at.to_rfc3339(),
                finished_at: self.finished_at.map(|at| at.to_rfc3339()),
                duration_ms: self.duration.map(|d| d.as_millis() as u64),
            },
            entity_counts: EntityCounts {
                by_kind: self.by_kind.clone(),
                by_layer: self.by_layer.clone(),
            },
            warnings,
            errors,
            entity_details,
            omitted: (!omitted.is_empty()).then_some(omitted),
            file_info: self.file_info.clone(),
        }
    }
}

impl Default for ProcessingSummary {
    fn default() -> Self {
        Self::new()
    }
}

fn capped<T: Clone>(items: &[T], limit: usize) -> (Vec<T>, usize) {
    let kept = items.iter().take(limit).cloned().collect();
    (kept, items.len().saturating_sub(limit))
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub processing_summary: Totals,
    pub entity_counts: EntityCounts,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub entity_details: Vec<EntityRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omitted: Option<Omitted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Totals {
    pub total_entities: usize,
    pub successful_entities: usize,
    pub failed_entities: usize,
    pub success_rate: String,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityCounts {
    pub by_kind: BTreeMap<String, OutcomeCounts>,
    pub by_layer: BTreeMap<String, usize>,
}

/// 超出上限而未逐项列出的条目数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Omitted {
    pub warnings: usize,
    pub errors: usize,
    pub entity_details: usize,
}

impl Omitted {
    fn is_empty(&self) -> bool {
        self.warnings == 0 && self.errors == 0 && self.entity_details == 0
    }
}
