//! 漏洞记录与单行抽取
use regex::Regex;
use serde::Serialize;

use crate::schema::{CanonicalField, ResolvedSchema};
use crate::severity::{classify, Severity};

/// 一条归一化的漏洞记录（构造后不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRecord {
    pub cve: String,
    pub severity: String,
    pub jfrog_severity: String,
    pub cvss_v3: String,
    pub cwe: String,
    pub fix_version: String,
}

impl ScanRecord {
    pub fn classify(&self) -> Severity {
        classify(&self.severity, &self.jfrog_severity)
    }

    /// 按输出列顺序展开
    pub fn cells(&self) -> [&str; 6] {
        [&self.cve, &self.severity, &self.jfrog_severity, &self.cvss_v3, &self.cwe, &self.fix_version]
    }
}

/// 已分类的记录（分块处理的产物）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub record: ScanRecord,
    pub severity: Severity,
}

/// 将标识符字段拆分为合法的标识符列表
/// - 逗号与分号均视为分隔符
/// - 每个片段去空白后须匹配标识符模式，否则静默丢弃
pub fn split_identifiers<'a>(raw: &'a str, pattern: &'a Regex) -> impl Iterator<Item = &'a str> + 'a {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(move |tok| !tok.is_empty() && pattern.is_match(tok))
}

/// 单行抽取：每个合法标识符产出一条记录，其余字段取自同一行
pub fn extract_records(row: &csv::StringRecord, schema: &ResolvedSchema, pattern: &Regex) -> Vec<ScanRecord> {
    let ids = schema.get(row, CanonicalField::Cves);
    if ids.is_empty() {
        return Vec::new();
    }
    let severity = schema.get(row, CanonicalField::Severity);
    let jfrog_severity = schema.get(row, CanonicalField::JfrogSeverity);
    let cvss_v3 = schema.get(row, CanonicalField::CvssV3);
    let cwe = schema.get(row, CanonicalField::Cwe);
    let fix_version = schema.get(row, CanonicalField::FixVersion);

    split_identifiers(ids, pattern)
        .map(|cve| ScanRecord {
            cve: cve.to_string(),
            severity: severity.to_string(),
            jfrog_severity: jfrog_severity.to_string(),
            cvss_v3: cvss_v3.to_string(),
            cwe: cwe.to_string(),
            fix_version: fix_version.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{resolve_schema, AliasTable};

    fn cve_pattern() -> Regex {
        Regex::new("^CVE-").unwrap()
    }

    fn full_schema() -> ResolvedSchema {
        resolve_schema(
            ["cves", "severity", "jfrog severity", "cvss v3", "cwe", "fix version"],
            &AliasTable::default(),
        )
    }

    #[test]
    fn splits_on_comma_and_semicolon() {
        let p = cve_pattern();
        let ids: Vec<_> = split_identifiers(" CVE-2021-1 ;CVE-2021-2, CVE-2021-3", &p).collect();
        assert_eq!(ids, vec!["CVE-2021-1", "CVE-2021-2", "CVE-2021-3"]);
    }

    #[test]
    fn drops_malformed_tokens() {
        let p = cve_pattern();
        let ids: Vec<_> = split_identifiers("GHSA-xxxx, cve-2020-1,,XRAY-1;CVE-2020-9", &p).collect();
        assert_eq!(ids, vec!["CVE-2020-9"]);
    }

    #[test]
    fn one_record_per_identifier_sharing_row_fields() {
        let row = csv::StringRecord::from(vec!["CVE-1;CVE-2", "High", "Critical", "7.5", "CWE-79", "1.2.3"]);
        let recs = extract_records(&row, &full_schema(), &cve_pattern());
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].cve, "CVE-1");
        assert_eq!(recs[1].cve, "CVE-2");
        assert_eq!(recs[1].cells()[1..], ["High", "Critical", "7.5", "CWE-79", "1.2.3"]);
    }

    #[test]
    fn short_row_yields_empty_fields() {
        let row = csv::StringRecord::from(vec!["CVE-7", "Low"]);
        let recs = extract_records(&row, &full_schema(), &cve_pattern());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].fix_version, "");
        assert_eq!(recs[0].classify(), Severity::Low);
    }

    #[test]
    fn row_without_identifier_column_yields_nothing() {
        let schema = resolve_schema(["severity"], &AliasTable::default());
        let row = csv::StringRecord::from(vec!["High"]);
        assert!(extract_records(&row, &schema, &cve_pattern()).is_empty());
    }
}
