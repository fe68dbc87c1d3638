//! 表头解析：将文件声明的列名映射到规范字段（大小写不敏感，支持别名）
use std::collections::HashMap;
use std::fmt;

/// 规范字段（与具体报告中的列名无关）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Cves,
    Severity,
    JfrogSeverity,
    CvssV3,
    Cwe,
    FixVersion,
}

impl CanonicalField {
    /// 固定顺序，亦即输出明细列的顺序
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Cves,
        CanonicalField::Severity,
        CanonicalField::JfrogSeverity,
        CanonicalField::CvssV3,
        CanonicalField::Cwe,
        CanonicalField::FixVersion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Cves => "cves",
            CanonicalField::Severity => "severity",
            CanonicalField::JfrogSeverity => "jfrog_severity",
            CanonicalField::CvssV3 => "cvss_v3",
            CanonicalField::Cwe => "cwe",
            CanonicalField::FixVersion => "fix_version",
        }
    }

    /// 从配置文件中的键名解析
    pub fn parse(name: &str) -> Option<Self> {
        let key = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.as_str() == key)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 规范字段 -> 可接受的别名列表（按顺序尝试）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    aliases: HashMap<CanonicalField, Vec<String>>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut aliases = HashMap::new();
        let defaults: [(CanonicalField, &[&str]); 6] = [
            (CanonicalField::Cves, &["cves", "cve", "cve(s)"]),
            (CanonicalField::Severity, &["severity"]),
            (CanonicalField::JfrogSeverity, &["jfrog severity", "jfrog_severity", "jfrogseverity"]),
            (CanonicalField::CvssV3, &["cvss v3", "cvss_v3", "cvssv3"]),
            (CanonicalField::Cwe, &["cwe"]),
            (CanonicalField::FixVersion, &["fix version", "fix_version", "fixversion", "fix"]),
        ];
        for (field, names) in defaults {
            aliases.insert(field, names.iter().map(|s| s.to_string()).collect());
        }
        Self { aliases }
    }
}

impl AliasTable {
    /// 替换某个字段的别名列表（别名统一归一化为小写）
    pub fn set(&mut self, field: CanonicalField, names: Vec<String>) {
        let names = names.iter().map(|n| normalize_header(n)).filter(|n| !n.is_empty()).collect();
        self.aliases.insert(field, names);
    }

    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.aliases.get(&field).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// 解析结果：每个规范字段对应的列下标（None 表示缺失）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedSchema {
    positions: [Option<usize>; 6],
}

impl ResolvedSchema {
    pub fn position(&self, field: CanonicalField) -> Option<usize> {
        self.positions[field.slot()]
    }

    /// 缺失的规范字段（按固定顺序）
    pub fn missing(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL.into_iter().filter(|f| self.position(*f).is_none()).collect()
    }

    /// 读取行内某字段的值（去除首尾空白）；字段缺失或行过短时返回空串
    pub fn get<'r>(&self, row: &'r csv::StringRecord, field: CanonicalField) -> &'r str {
        self.position(field).and_then(|idx| row.get(idx)).map(str::trim).unwrap_or("")
    }
}

fn normalize_header(h: &str) -> String {
    h.trim().to_lowercase()
}

/// 将表头解析为字段位置
/// - 列名先去空白并转小写；重复列名取第一次出现的位置
/// - 别名按表中顺序尝试，先匹配者胜出
pub fn resolve_schema<'h, I>(headers: I, table: &AliasTable) -> ResolvedSchema
where
    I: IntoIterator<Item = &'h str>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    for (idx, h) in headers.into_iter().enumerate() {
        index.entry(normalize_header(h)).or_insert(idx);
    }

    let mut schema = ResolvedSchema::default();
    for field in CanonicalField::ALL {
        schema.positions[field.slot()] = table
            .aliases(field)
            .iter()
            .find_map(|alias| index.get(alias.as_str()).copied());
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(headers: &[&str]) -> ResolvedSchema {
        resolve_schema(headers.iter().copied(), &AliasTable::default())
    }

    #[test]
    fn resolves_canonical_headers_in_order() {
        let s = resolve(&["cves", "severity", "jfrog severity", "cvss v3", "cwe", "fix version"]);
        for (i, f) in CanonicalField::ALL.into_iter().enumerate() {
            assert_eq!(s.position(f), Some(i));
        }
        assert!(s.missing().is_empty());
    }

    #[test]
    fn header_aliases_are_case_insensitive() {
        let a = resolve(&["CVE(s)", "Severity"]);
        let b = resolve(&["cves", "severity"]);
        assert_eq!(a, b);
        assert_eq!(a.position(CanonicalField::Cves), Some(0));
    }

    #[test]
    fn header_whitespace_is_trimmed() {
        let s = resolve(&["  Fix_Version ", "JFROGSEVERITY"]);
        assert_eq!(s.position(CanonicalField::FixVersion), Some(0));
        assert_eq!(s.position(CanonicalField::JfrogSeverity), Some(1));
    }

    #[test]
    fn missing_fields_are_reported() {
        let s = resolve(&["cve", "severity"]);
        assert_eq!(
            s.missing(),
            vec![
                CanonicalField::JfrogSeverity,
                CanonicalField::CvssV3,
                CanonicalField::Cwe,
                CanonicalField::FixVersion
            ]
        );
    }

    #[test]
    fn earlier_alias_wins_over_later_one() {
        // "fix version" 排在 "fix" 之前
        let s = resolve(&["fix", "fix version"]);
        assert_eq!(s.position(CanonicalField::FixVersion), Some(1));
    }

    #[test]
    fn duplicate_header_takes_first_column() {
        let s = resolve(&["severity", "severity"]);
        assert_eq!(s.position(CanonicalField::Severity), Some(0));
    }

    #[test]
    fn get_tolerates_short_rows_and_absent_fields() {
        let s = resolve(&["cves", "severity", "cwe"]);
        let row = csv::StringRecord::from(vec!["CVE-1", " High "]);
        assert_eq!(s.get(&row, CanonicalField::Severity), "High");
        assert_eq!(s.get(&row, CanonicalField::Cwe), "");
        assert_eq!(s.get(&row, CanonicalField::FixVersion), "");
    }

    #[test]
    fn custom_aliases_replace_defaults() {
        let mut table = AliasTable::default();
        table.set(CanonicalField::Cves, vec!["Vulnerability ID".to_string()]);
        let s = resolve_schema(["cves", "vulnerability id"], &table);
        assert_eq!(s.position(CanonicalField::Cves), Some(1));
        assert_eq!(CanonicalField::parse("Fix_Version"), Some(CanonicalField::FixVersion));
    }
}
