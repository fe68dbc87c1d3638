use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use scanfold_core::{
    consolidate_and_write, normalize_extensions, parse_delimiter, ConfigFile, ConsolidateOptions, DedupMode,
    OutputFormat,
};
use std::path::PathBuf;
use tracing::info;

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "scanfold", version, about = "合并多份镜像漏洞扫描报告")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 合并目录中的扫描报告并生成一份汇总报告
    Consolidate(ConsolidateArgs),
}

#[derive(clap::Args, Debug)]
struct ConsolidateArgs {
    /// 输入目录（可重复指定）
    #[arg(long = "input", env = "SCANFOLD_INPUT", required = true, value_delimiter = ',')]
    inputs: Vec<PathBuf>,

    /// 输出文件
    #[arg(long, env = "SCANFOLD_OUTPUT", default_value = "./consolidated.csv")]
    output: PathBuf,

    /// 输出格式：csv（分块表格）或 json
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// 外层线程数（"auto" = min(4, CPU 核数)）
    #[arg(long)]
    workers: Option<String>,

    /// 每个文件的内层线程数
    #[arg(long)]
    inner_workers: Option<usize>,

    /// 每个分块的行数
    #[arg(long)]
    chunk_size: Option<usize>,

    /// 不做文件内去重，逐行累积
    #[arg(long)]
    keep_duplicates: bool,

    /// 识别的报告扩展名（逗号分隔）
    #[arg(long, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// 分隔符（默认根据表头自动探测）
    #[arg(long)]
    delimiter: Option<String>,

    /// 标识符正则（默认 ^CVE-）
    #[arg(long)]
    identifier_pattern: Option<String>,

    /// 配置文件路径（TOML）
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Csv,
    Json,
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Consolidate(args) => {
            let opts = build_options(args)?;
            info!(inputs = ?opts.input_dirs, output = ?opts.output, "starting consolidation");
            let stats = consolidate_and_write(&opts).context("consolidation failed")?;
            info!(
                files = stats.files_processed,
                files_failed = stats.files_failed,
                records = stats.records_emitted,
                "consolidation finished"
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).with_thread_names(true).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 组装合并选项：内置默认值 < 配置文件 < 命令行
fn build_options(args: ConsolidateArgs) -> Result<ConsolidateOptions> {
    let mut opts = ConsolidateOptions::default();
    if let Some(path) = &args.config {
        ConfigFile::load(path)
            .and_then(|cfg| cfg.apply(&mut opts))
            .with_context(|| format!("load config {}", path.display()))?;
    }

    opts.input_dirs = args.inputs;
    opts.output = args.output;
    if let Some(f) = args.format {
        opts.format = match f {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        };
    }
    if let Some(w) = args.workers.as_deref() {
        opts.workers = parse_workers(w)?;
    }
    if let Some(n) = args.inner_workers {
        opts.inner_workers = n;
    }
    if let Some(n) = args.chunk_size {
        opts.chunk_size = n;
    }
    if args.keep_duplicates {
        opts.dedup = DedupMode::KeepAll;
    }
    if let Some(exts) = args.extensions {
        opts.extensions = normalize_extensions(exts);
    }
    if let Some(d) = args.delimiter.as_deref() {
        opts.delimiter = Some(parse_delimiter(d)?);
    }
    if let Some(p) = args.identifier_pattern {
        opts.identifier_pattern = p;
    }
    Ok(opts)
}

/// 解析线程参数："auto" 表示自动；其他为具体数值（>= 1）
fn parse_workers(s: &str) -> Result<Option<usize>> {
    if s.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(Some(n)),
        _ => anyhow::bail!("invalid worker count: {s}"),
    }
}
