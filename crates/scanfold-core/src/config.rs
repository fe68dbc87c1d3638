//! 配置文件加载（TOML）
//!
//! 所有键均可选；存在的键覆盖内置默认值，命令行参数再覆盖配置文件。
use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConsolidateError;
use crate::options::{ConsolidateOptions, DedupMode, OutputFormat};
use crate::schema::CanonicalField;

/// 顶层配置文件结构
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub inner_workers: Option<usize>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub dedup: Option<DedupMode>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    /// 单字符分隔符，例如 "," 或 "\t"
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub identifier_pattern: Option<String>,
    /// 规范字段名 -> 别名列表（整体替换默认列表）
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConsolidateError> {
        let txt = std::fs::read_to_string(path)
            .map_err(|source| ConsolidateError::ConfigFile { path: path.to_path_buf(), source })?;
        Self::parse(&txt)
    }

    pub fn parse(txt: &str) -> Result<Self, ConsolidateError> {
        toml::from_str(txt).map_err(|e| ConsolidateError::Config(e.to_string()))
    }

    /// 将配置文件中出现的键写入选项
    pub fn apply(self, opts: &mut ConsolidateOptions) -> Result<(), ConsolidateError> {
        if let Some(w) = self.workers {
            opts.workers = Some(w);
        }
        if let Some(w) = self.inner_workers {
            opts.inner_workers = w;
        }
        if let Some(n) = self.chunk_size {
            opts.chunk_size = n;
        }
        if let Some(d) = self.dedup {
            opts.dedup = d;
        }
        if let Some(f) = self.format {
            opts.format = f;
        }
        if let Some(exts) = self.extensions {
            opts.extensions = normalize_extensions(exts);
        }
        if let Some(d) = self.delimiter {
            opts.delimiter = Some(parse_delimiter(&d)?);
        }
        if let Some(p) = self.identifier_pattern {
            opts.identifier_pattern = p;
        }
        for (name, names) in self.aliases {
            let field = CanonicalField::parse(&name)
                .ok_or_else(|| ConsolidateError::Config(format!("unknown field in [aliases]: {name}")))?;
            opts.aliases.set(field, names);
        }
        Ok(())
    }
}

/// 扩展名统一为小写且不含前导点
pub fn normalize_extensions(exts: Vec<String>) -> Vec<String> {
    exts.into_iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// 解析分隔符：接受单个 ASCII 字符，或 "\t" / "tab"
pub fn parse_delimiter(s: &str) -> Result<u8, ConsolidateError> {
    match s {
        "\\t" | "tab" | "\t" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(ConsolidateError::Config(format!("delimiter must be a single ASCII character, got {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_present_keys_only() {
        let cfg = ConfigFile::parse(
            r#"
chunk_size = 100
dedup = "keep-all"
extensions = [".CSV", "tsv"]
delimiter = "tab"

[aliases]
cves = ["Vulnerability"]
"#,
        )
        .unwrap();
        let mut opts = ConsolidateOptions::default();
        cfg.apply(&mut opts).unwrap();
        assert_eq!(opts.chunk_size, 100);
        assert_eq!(opts.dedup, DedupMode::KeepAll);
        assert_eq!(opts.extensions, vec!["csv", "tsv"]);
        assert_eq!(opts.delimiter, Some(b'\t'));
        assert_eq!(opts.aliases.aliases(CanonicalField::Cves), ["vulnerability"]);
        assert_eq!(opts.inner_workers, crate::options::DEFAULT_INNER_WORKERS);
        assert_eq!(opts.format, OutputFormat::Csv);
    }

    #[test]
    fn unknown_alias_field_is_rejected() {
        let cfg = ConfigFile::parse("[aliases]\nseverityy = [\"x\"]\n").unwrap();
        let err = cfg.apply(&mut ConsolidateOptions::default()).unwrap_err();
        assert!(matches!(err, ConsolidateError::Config(_)));
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        assert!(ConfigFile::parse("chunksize = 5\n").is_err());
    }

    #[test]
    fn delimiter_parsing() {
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert!(parse_delimiter(";;").is_err());
    }
}
