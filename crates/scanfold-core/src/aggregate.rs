//! 结果聚合
//!
//! - 文件级：按分块序号重排后拼接，一次线性遍历完成去重与计数；
//! - 全局级：单一所有者收集各文件结果，结束时按文件名排序。
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use tracing::warn;

use crate::chunk::ChunkResult;
use crate::options::{DedupMode, RunStats};
use crate::record::ScanRecord;
use crate::severity::Tally;

/// 单个文件的处理结局
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Complete,
    /// 部分分块失败（其贡献为空）
    Partial { failed_chunks: usize },
    /// 整个文件失败：计数为零、明细为空
    Failed { reason: String },
}

/// 单文件结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    pub filename: String,
    /// 非 UTF-8 路径以有损形式输出
    #[serde(serialize_with = "serialize_path_lossy")]
    pub path: PathBuf,
    pub tally: Tally,
    pub details: Vec<ScanRecord>,
    pub outcome: FileOutcome,
}

fn serialize_path_lossy<S: Serializer>(path: &Path, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&path.to_string_lossy())
}

impl FileResult {
    pub fn empty(filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            path: path.into(),
            tally: Tally::default(),
            details: Vec::new(),
            outcome: FileOutcome::Complete,
        }
    }

    pub fn failed(filename: impl Into<String>, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self { outcome: FileOutcome::Failed { reason: reason.into() }, ..Self::empty(filename, path) }
    }

    pub fn failed_chunks(&self) -> usize {
        match self.outcome {
            FileOutcome::Partial { failed_chunks } => failed_chunks,
            _ => 0,
        }
    }
}

/// 合并单个文件的全部分块结果
/// - 先按分块序号重排（不可按完成顺序合并，否则“首次出现”不确定）
/// - FirstOccurrence：已出现的标识符直接丢弃，不重复计数
/// - KeepAll：保留全部记录，计数为各分块局部计数之和
pub fn merge_chunks(
    filename: impl Into<String>,
    path: impl Into<PathBuf>,
    mut chunks: Vec<ChunkResult>,
    mode: DedupMode,
) -> FileResult {
    let mut result = FileResult::empty(filename, path);
    chunks.sort_by_key(|(index, _)| *index);

    let mut seen: HashSet<String> = HashSet::new();
    let mut failed = 0usize;
    for (index, chunk) in chunks {
        let out = match chunk {
            Ok(out) => out,
            Err(e) => {
                warn!(file = %result.filename, chunk = index, error = %e, "chunk failed; contributing no records");
                failed += 1;
                continue;
            }
        };
        match mode {
            DedupMode::FirstOccurrence => {
                for c in out.records {
                    if seen.insert(c.record.cve.clone()) {
                        result.tally.add(c.severity);
                        result.details.push(c.record);
                    }
                }
            }
            DedupMode::KeepAll => {
                result.tally.merge(&out.tally);
                result.details.extend(out.records.into_iter().map(|c| c.record));
            }
        }
    }

    if failed > 0 {
        result.outcome = FileOutcome::Partial { failed_chunks: failed };
    }
    result
}

/// 最终合并结果（按文件名排序，构建后不可变）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidatedResult {
    files: Vec<FileResult>,
}

impl ConsolidatedResult {
    pub fn files(&self) -> &[FileResult] {
        &self.files
    }

    pub fn stats(&self) -> RunStats {
        let mut stats = RunStats::default();
        for f in &self.files {
            stats.files_processed += 1;
            if matches!(f.outcome, FileOutcome::Failed { .. }) {
                stats.files_failed += 1;
            }
            stats.chunks_failed += f.failed_chunks();
            stats.records_emitted += f.details.len();
        }
        stats
    }
}

/// 全局合并点：唯一持有并修改结果集合的所有者
#[derive(Debug, Default)]
pub struct Consolidator {
    files: Vec<FileResult>,
}

impl Consolidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: FileResult) {
        self.files.push(result);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 按文件名（其次完整路径）排序并冻结；到达顺序不影响输出
    pub fn finish(mut self) -> ConsolidatedResult {
        self.files
            .sort_by(|a, b| a.filename.cmp(&b.filename).then_with(|| a.path.cmp(&b.path)));
        ConsolidatedResult { files: self.files }
    }
}
