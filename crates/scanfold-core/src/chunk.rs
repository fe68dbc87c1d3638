//! 分块处理：对一段连续行做抽取与分类，产出有序记录与局部计数
use csv::{ByteRecord, StringRecord};
use regex::Regex;

use crate::error::ChunkError;
use crate::record::{extract_records, ClassifiedRecord};
use crate::schema::ResolvedSchema;
use crate::severity::Tally;

/// 一个待处理分块（原始字节行 + 在文件中的位置）
#[derive(Debug, Clone)]
pub struct RawChunk {
    /// 分块序号（从 0 开始，用于重排）
    pub index: usize,
    /// 首行的数据行号（不含表头，从 1 开始）
    pub first_row: u64,
    pub rows: Vec<ByteRecord>,
}

/// 单个分块的局部结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOutput {
    pub records: Vec<ClassifiedRecord>,
    /// 未去重的局部计数
    pub tally: Tally,
}

/// 分块结果：序号 + 成功/失败
pub type ChunkResult = (usize, Result<ChunkOutput, ChunkError>);

/// 处理单个文件所需的只读上下文（分块任务之间共享）
#[derive(Debug)]
pub struct ChunkContext<'a> {
    pub schema: &'a ResolvedSchema,
    pub identifier: &'a Regex,
}

/// 按原始行序处理一个分块
/// - 任一行不是合法 UTF-8 时，整个分块视为失败
pub fn process_chunk(chunk: RawChunk, ctx: &ChunkContext<'_>) -> Result<ChunkOutput, ChunkError> {
    let mut out = ChunkOutput::default();
    let first_row = chunk.first_row;
    for (offset, raw) in chunk.rows.into_iter().enumerate() {
        let row = StringRecord::from_byte_record(raw)
            .map_err(|_| ChunkError::Decode { row: first_row + offset as u64 })?;
        for record in extract_records(&row, ctx.schema, ctx.identifier) {
            let severity = record.classify();
            out.tally.add(severity);
            out.records.push(ClassifiedRecord { record, severity });
        }
    }
    Ok(out)
}
