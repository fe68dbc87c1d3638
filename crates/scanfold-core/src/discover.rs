//! 输入目录遍历：收集扩展名匹配的扫描报告
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ConsolidateError;

/// 扩展名是否在识别列表中（大小写不敏感）
fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// 遍历所有输入目录（单层），返回按文件名排序的报告路径
/// - 目录不存在或不是目录：致命错误
/// - 没有任何识别的文件：致命错误
pub fn discover_reports(dirs: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>, ConsolidateError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !dir.exists() {
            return Err(ConsolidateError::InputDirMissing(dir.clone()));
        }
        if !dir.is_dir() {
            return Err(ConsolidateError::InputNotDirectory(dir.clone()));
        }
        // 报告目录为单层结构，限制深度为 1
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if has_extension(entry.path(), extensions) {
                files.push(entry.into_path());
            } else {
                debug!(path = %entry.path().display(), "ignoring file with unrecognized extension");
            }
        }
    }

    if files.is_empty() {
        return Err(ConsolidateError::NoInputFiles { extensions: extensions.join(",") });
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    Ok(files)
}
