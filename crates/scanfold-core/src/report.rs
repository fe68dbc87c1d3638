//! 报告组装与输出
//!
//! 每个文件渲染为一个块：文件名行、四个计数行（即使为 0）、明细表头、明细行、空行分隔。
use std::io::Write;
use std::path::Path;

use crate::aggregate::{ConsolidatedResult, FileResult};
use crate::error::ConsolidateError;
use crate::options::OutputFormat;
use crate::severity::Severity;

/// 明细表头（与 `ScanRecord::cells` 顺序一致）
pub const DETAIL_HEADER: [&str; 6] = ["CVEs", "Severity", "Jfrog Severity", "CVSS v3", "Cwe", "Fix Version"];

/// 块中的一行；空行表示分隔
pub type Line = Vec<String>;

/// 单个文件对应的输出块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub lines: Vec<Line>,
}

fn render_block(file: &FileResult) -> Block {
    let mut lines: Vec<Line> = Vec::with_capacity(file.details.len() + 7);
    lines.push(vec![file.filename.clone()]);
    for tier in Severity::TIERS {
        lines.push(vec![tier.label().to_string(), file.tally.get(tier).to_string()]);
    }
    lines.push(DETAIL_HEADER.iter().map(|h| h.to_string()).collect());
    for d in &file.details {
        lines.push(d.cells().iter().map(|c| c.to_string()).collect());
    }
    lines.push(Vec::new());
    Block { lines }
}

/// 按合并结果的顺序渲染全部块
pub fn assemble(result: &ConsolidatedResult) -> Vec<Block> {
    result.files().iter().map(render_block).collect()
}

/// 以逗号分隔的逐行形式写出块（空行原样写出）
pub fn write_csv(blocks: &[Block], out: &mut dyn Write) -> std::io::Result<()> {
    for line in blocks.iter().flat_map(|b| b.lines.iter()) {
        if line.is_empty() {
            out.write_all(b"\n")?;
            continue;
        }
        // writer 只借用 out 写一行，写空行前已 flush 并释放
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(&mut *out);
        wtr.write_record(line)?;
        wtr.flush()?;
    }
    Ok(())
}

/// 以 JSON 形式写出完整合并结果
pub fn write_json(result: &ConsolidatedResult, out: &mut dyn Write) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, result)?;
    out.write_all(b"\n")
}

/// 渲染并一次性写入输出文件；失败为致命错误
pub fn write_report(result: &ConsolidatedResult, path: &Path, format: OutputFormat) -> Result<(), ConsolidateError> {
    let mut buf: Vec<u8> = Vec::new();
    let rendered = match format {
        OutputFormat::Csv => write_csv(&assemble(result), &mut buf),
        OutputFormat::Json => write_json(result, &mut buf),
    };
    rendered
        .and_then(|_| std::fs::write(path, &buf))
        .map_err(|source| ConsolidateError::Output { path: path.to_path_buf(), source })
}
