//! 合并选项与统计信息（模块）
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConsolidateError;
use crate::schema::AliasTable;

/// 外层并行度上限（自动模式下）
pub const MAX_AUTO_WORKERS: usize = 4;
/// 每个文件的内层工作线程数（默认）
pub const DEFAULT_INNER_WORKERS: usize = 4;
/// 每个分块的行数（默认）
pub const DEFAULT_CHUNK_SIZE: usize = 5000;
/// 默认标识符模式
pub const DEFAULT_IDENTIFIER_PATTERN: &str = "^CVE-";

/// 文件内去重模式
/// - FirstOccurrence：同一标识符只保留首次出现（按原始行序）
/// - KeepAll：逐行累积，不去重（兼容旧版本行为）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupMode {
    #[default]
    FirstOccurrence,
    KeepAll,
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 逐行输出块结构（类表格）
    #[default]
    Csv,
    Json,
}

/// 合并选项（启动时构建一次，贯穿执行器与聚合器）
#[derive(Debug, Clone)]
pub struct ConsolidateOptions {
    /// 输入目录（至少一个）
    pub input_dirs: Vec<PathBuf>,
    /// 输出文件路径
    pub output: PathBuf,
    pub format: OutputFormat,
    /// 外层工作线程数：None 表示自动（min(4, CPU 核数)）
    pub workers: Option<usize>,
    /// 每个文件的内层工作线程数
    pub inner_workers: usize,
    /// 每个分块的行数
    pub chunk_size: usize,
    pub dedup: DedupMode,
    /// 识别的扩展名（小写，不含点）
    pub extensions: Vec<String>,
    /// 分隔符：None 表示根据表头行自动探测
    pub delimiter: Option<u8>,
    /// 标识符模式（正则）
    pub identifier_pattern: String,
    pub aliases: AliasTable,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            input_dirs: Vec::new(),
            output: PathBuf::from("./consolidated.csv"),
            format: OutputFormat::Csv,
            workers: None,
            inner_workers: DEFAULT_INNER_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            dedup: DedupMode::FirstOccurrence,
            extensions: vec!["csv".to_string()],
            delimiter: None,
            identifier_pattern: DEFAULT_IDENTIFIER_PATTERN.to_string(),
            aliases: AliasTable::default(),
        }
    }
}

impl ConsolidateOptions {
    /// 实际使用的外层并行度
    pub fn outer_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| num_cpus::get().min(MAX_AUTO_WORKERS)).max(1)
    }

    /// 校验数值选项
    pub fn validate(&self) -> Result<(), ConsolidateError> {
        if self.input_dirs.is_empty() {
            return Err(ConsolidateError::Config("at least one input directory is required".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConsolidateError::Config("chunk size must be at least 1".into()));
        }
        if self.inner_workers == 0 {
            return Err(ConsolidateError::Config("inner worker count must be at least 1".into()));
        }
        if self.workers == Some(0) {
            return Err(ConsolidateError::Config("worker count must be at least 1".into()));
        }
        if self.extensions.is_empty() {
            return Err(ConsolidateError::Config("no report extensions configured".into()));
        }
        Ok(())
    }

    pub(crate) fn compile_identifier_pattern(&self) -> Result<Regex, ConsolidateError> {
        Regex::new(&self.identifier_pattern)
            .map_err(|e| ConsolidateError::Config(format!("identifier pattern {:?}: {e}", self.identifier_pattern)))
    }
}

/// 运行统计（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub chunks_failed: usize,
    pub records_emitted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_input() -> ConsolidateOptions {
        ConsolidateOptions { input_dirs: vec![PathBuf::from("in")], ..Default::default() }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(with_input().validate().is_ok());
        let w = with_input().outer_workers();
        assert!((1..=MAX_AUTO_WORKERS).contains(&w));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let opts = ConsolidateOptions { chunk_size: 0, ..with_input() };
        assert!(matches!(opts.validate(), Err(ConsolidateError::Config(_))));
        let opts = ConsolidateOptions { workers: Some(0), ..with_input() };
        assert!(opts.validate().is_err());
        assert!(ConsolidateOptions::default().validate().is_err());
    }

    #[test]
    fn bad_identifier_pattern_is_a_config_error() {
        let opts = ConsolidateOptions { identifier_pattern: "(".into(), ..with_input() };
        assert!(matches!(opts.compile_identifier_pattern(), Err(ConsolidateError::Config(_))));
    }
}
