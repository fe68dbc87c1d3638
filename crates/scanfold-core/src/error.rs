//! 错误类型（分层：运行级 / 文件级 / 分块级）
//!
//! - `ConsolidateError`：配置与输出错误，直接中止整次运行；
//! - `FileError`：单个文件失败，降级为空结果块；
//! - `ChunkError`：单个分块失败，降级为空的局部结果。
use std::path::PathBuf;
use thiserror::Error;

/// 运行级错误（致命）
#[derive(Debug, Error)]
pub enum ConsolidateError {
    #[error("input directory not found: {0}")]
    InputDirMissing(PathBuf),

    #[error("input path is not a directory: {0}")]
    InputNotDirectory(PathBuf),

    #[error("no recognized scan reports found (extensions: {extensions})")]
    NoInputFiles { extensions: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write report to {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 文件级错误（非致命）
#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot open file: {0}")]
    Open(#[source] std::io::Error),

    #[error("unparsable even after full read: {0}")]
    Unparsable(String),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// 分块级错误（非致命）
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("row {row} is not valid UTF-8")]
    Decode { row: u64 },

    #[error("read failed: {0}")]
    Read(String),

    #[error("chunk task panicked: {0}")]
    Panicked(String),
}

/// 将 panic 负载转换为可读文本
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
