//! 扫描报告合并库
//!
//! 设计要点：
//! - 每个输入文件是一份漏洞扫描报告（带表头的分隔文本），表头在运行时解析并映射到规范字段；
//! - 外层线程按文件拉取任务，内层线程池按行分块并发处理；
//! - 分块结果按序号重排后合并，文件内按标识符首次出现去重；
//! - 文件级 / 分块级错误降级为空结果，只有配置与输出错误会中止运行；
//! - 最终结果按文件名排序，与调度顺序无关。

mod aggregate;
mod chunk;
mod config;
mod discover;
mod error;
mod executor;
mod options;
mod reader;
mod record;
mod report;
mod schema;
mod severity;

pub use aggregate::{merge_chunks, ConsolidatedResult, Consolidator, FileOutcome, FileResult};
pub use chunk::{process_chunk, ChunkContext, ChunkOutput, ChunkResult, RawChunk};
pub use config::{normalize_extensions, parse_delimiter, ConfigFile};
pub use discover::discover_reports;
pub use error::{ChunkError, ConsolidateError, FileError};
pub use executor::consolidate;
pub use options::{ConsolidateOptions, DedupMode, OutputFormat, RunStats};
pub use reader::{open_report, sniff_delimiter, ChunkStream, ReportSource};
pub use record::{extract_records, split_identifiers, ClassifiedRecord, ScanRecord};
pub use report::{assemble, write_csv, write_json, write_report, Block, Line, DETAIL_HEADER};
pub use schema::{resolve_schema, AliasTable, CanonicalField, ResolvedSchema};
pub use severity::{classify, Severity, Tally};

/// 合并全部报告并写出结果文件
/// 致命错误（配置、输入目录、输出）直接返回；输出文件只在合并完成后写入一次
pub fn consolidate_and_write(opts: &ConsolidateOptions) -> Result<RunStats, ConsolidateError> {
    let result = consolidate(opts)?;
    write_report(&result, &opts.output, opts.format)?;
    let stats = result.stats();
    tracing::info!(
        files = stats.files_processed,
        failed = stats.files_failed,
        failed_chunks = stats.chunks_failed,
        records = stats.records_emitted,
        output = %opts.output.display(),
        "report written"
    );
    Ok(stats)
}
