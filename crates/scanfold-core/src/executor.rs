//! 两级并行调度
//!
//! - 外层：固定数量的 OS 线程从共享工作队列逐个拉取文件（拉取式，天然负载均衡），
//!   每个线程端到端负责一个文件；
//! - 内层：每个外层线程持有一个 Rayon 线程池，文件按行数切块后并发处理；
//! - 结果只经由通道传递，唯一的合并点是调用线程上的 `Consolidator`。
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crossbeam_channel as channel;
use rayon::{ThreadPool, ThreadPoolBuilder};
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::aggregate::{merge_chunks, ConsolidatedResult, Consolidator, FileResult};
use crate::chunk::{process_chunk, ChunkContext, ChunkOutput, ChunkResult, RawChunk};
use crate::discover::discover_reports;
use crate::error::{panic_message, ChunkError, ConsolidateError, FileError};
use crate::options::{ConsolidateOptions, DedupMode};
use crate::reader::open_report;
use crate::schema::resolve_schema;

/// 一次运行内所有工作线程共享的只读上下文
struct RunContext<'a> {
    opts: &'a ConsolidateOptions,
    identifier: Regex,
}

/// 发现并处理全部报告，返回按文件名排序的合并结果
/// 致命错误（目录缺失、无可识别文件、配置非法、线程池构建失败）在任何工作开始前返回
pub fn consolidate(opts: &ConsolidateOptions) -> Result<ConsolidatedResult, ConsolidateError> {
    opts.validate()?;
    let identifier = opts.compile_identifier_pattern()?;
    let files = discover_reports(&opts.input_dirs, &opts.extensions)?;

    let workers = opts.outer_workers().min(files.len());
    info!(
        files = files.len(),
        workers,
        inner_workers = opts.inner_workers,
        chunk_size = opts.chunk_size,
        "consolidating scan reports"
    );

    // 每个外层线程一个内层线程池（启动前全部构建，失败即中止）
    let pools = (0..workers)
        .map(|w| {
            ThreadPoolBuilder::new()
                .num_threads(opts.inner_workers)
                .thread_name(move |i| format!("scanfold-w{w}-c{i}"))
                .build()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let run = RunContext { opts, identifier };
    let consolidator = run_workers(&files, pools, &run);
    debug!(results = consolidator.len(), "all workers finished");
    Ok(consolidator.finish())
}

/// 外层调度：共享队列 + 结果通道；调用线程作为唯一的合并者
fn run_workers(files: &[PathBuf], pools: Vec<ThreadPool>, run: &RunContext<'_>) -> Consolidator {
    let (work_tx, work_rx) = channel::unbounded::<&Path>();
    for f in files {
        // 接收端仍存活，发送不会失败
        let _ = work_tx.send(f.as_path());
    }
    drop(work_tx);

    let (result_tx, result_rx) = channel::unbounded::<FileResult>();
    let mut consolidator = Consolidator::new();

    std::thread::scope(|s| {
        for pool in pools {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            s.spawn(move || {
                while let Ok(path) = work_rx.recv() {
                    let result = process_file(path, &pool, run);
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        // 只保留工作线程持有的发送端，全部退出后接收循环结束
        drop(result_tx);
        for result in result_rx.iter() {
            consolidator.push(result);
        }
    });

    consolidator
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 处理单个文件；任何文件级错误或 panic 都降级为空结果块
fn process_file(path: &Path, pool: &ThreadPool, run: &RunContext<'_>) -> FileResult {
    let filename = display_name(path);
    debug!(file = %filename, "processing started");
    isolate_file(path, filename, run.opts.dedup, |name| scan_report(path, name, pool, run))
}

/// 在 panic 边界内执行文件扫描并合并分块结果
fn isolate_file<F>(path: &Path, filename: String, dedup: DedupMode, scan: F) -> FileResult
where
    F: FnOnce(&str) -> Result<Vec<ChunkResult>, FileError>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| scan(&filename)))
        .unwrap_or_else(|p| Err(FileError::Panicked(panic_message(&*p))));

    match outcome {
        Ok(chunks) => {
            let result = merge_chunks(filename, path, chunks, dedup);
            info!(
                file = %result.filename,
                critical = result.tally.critical,
                high = result.tally.high,
                medium = result.tally.medium,
                low = result.tally.low,
                details = result.details.len(),
                failed_chunks = result.failed_chunks(),
                "processing finished"
            );
            result
        }
        Err(e) => {
            error!(file = %filename, error = %e, "failed to process report");
            FileResult::failed(filename, path, e.to_string())
        }
    }
}

/// 读取表头、解析字段并把数据行分派到内层线程池
fn scan_report(path: &Path, filename: &str, pool: &ThreadPool, run: &RunContext<'_>) -> Result<Vec<ChunkResult>, FileError> {
    let source = open_report(path, run.opts.delimiter)?;
    if source.headers.is_empty() {
        warn!(file = %filename, "empty report");
        return Ok(Vec::new());
    }
    if source.fallback {
        info!(file = %filename, "report decoded via full read fallback");
    }

    let schema = resolve_schema(source.headers.iter(), &run.opts.aliases);
    for field in schema.missing() {
        warn!(file = %filename, column = %field, "missing column; treating as empty");
    }

    let ctx = ChunkContext { schema: &schema, identifier: &run.identifier };
    Ok(run_chunks(source.chunks(run.opts.chunk_size), pool, run.opts.inner_workers, |chunk| {
        process_chunk(chunk, &ctx)
    }))
}

/// 内层调度：分块并发处理，结果携带序号返回（完成顺序任意，由聚合器重排）
/// - 在途分块数不超过 `max_in_flight`，读取线程在名额用尽时阻塞，限制内存峰值
/// - 单个分块的 panic 被捕获为失败分块，不影响其他分块
fn run_chunks<I, F>(chunks: I, pool: &ThreadPool, max_in_flight: usize, process: F) -> Vec<ChunkResult>
where
    I: Iterator<Item = Result<RawChunk, (usize, ChunkError)>>,
    F: Fn(RawChunk) -> Result<ChunkOutput, ChunkError> + Sync,
{
    let process = &process;
    let (tx, rx) = channel::unbounded::<ChunkResult>();
    let (permit_tx, permit_rx) = channel::bounded::<()>(max_in_flight.max(1));

    pool.in_place_scope(|s| {
        for item in chunks {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err((index, err)) => {
                    let _ = tx.send((index, Err(err)));
                    continue;
                }
            };
            if permit_tx.send(()).is_err() {
                break;
            }
            let tx = tx.clone();
            let permit_rx = permit_rx.clone();
            s.spawn(move |_| {
                let index = chunk.index;
                let res = panic::catch_unwind(AssertUnwindSafe(|| process(chunk)))
                    .unwrap_or_else(|p| Err(ChunkError::Panicked(panic_message(&*p))));
                let _ = tx.send((index, res));
                let _ = permit_rx.recv();
            });
        }
    });

    drop(tx);
    rx.iter().collect()
}
