//! 严重级别分类与计数
//!
//! 分类是宽松的子串匹配：依次检查 critical/high/medium/low，首个命中即返回；
//! 主字段（severity）无命中时再检查备用字段（jfrog severity）。
use std::sync::OnceLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::Serialize;

/// 分类结果；`Unclassified` 只出现在明细中，不计入任何档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unclassified,
}

impl Severity {
    /// 报告中的四个计数档位（按输出顺序）
    pub const TIERS: [Severity; 4] = [Severity::Critical, Severity::High, Severity::Medium, Severity::Low];

    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Unclassified => "Unclassified",
        }
    }
}

// 模式下标即优先级（0 最高）
const KEYWORDS: [&str; 4] = ["critical", "high", "medium", "low"];

fn keyword_matcher() -> &'static AhoCorasick {
    static AC: OnceLock<AhoCorasick> = OnceLock::new();
    AC.get_or_init(|| {
        AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .build(KEYWORDS)
            .expect("build severity keyword automaton")
    })
}

/// 在单个字段上做子串匹配，返回优先级最高的档位
fn match_tier(raw: &str) -> Option<Severity> {
    let lower = raw.to_lowercase();
    keyword_matcher()
        .find_overlapping_iter(&lower)
        .map(|m| m.pattern().as_usize())
        .min()
        .map(|pid| Severity::TIERS[pid])
}

/// 主字段优先，备用字段兜底
pub fn classify(severity: &str, secondary: &str) -> Severity {
    match_tier(severity)
        .or_else(|| match_tier(secondary))
        .unwrap_or(Severity::Unclassified)
}

/// 单文件（或单分块）的档位计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl Tally {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Unclassified => {}
        }
    }

    pub fn merge(&mut self, other: &Tally) {
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Unclassified => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_plain_labels() {
        assert_eq!(classify("Critical", ""), Severity::Critical);
        assert_eq!(classify("HIGH", ""), Severity::High);
        assert_eq!(classify("medium", ""), Severity::Medium);
        assert_eq!(classify("Low", ""), Severity::Low);
    }

    #[test]
    fn substring_match_on_free_text() {
        assert_eq!(classify("Very High Risk", ""), Severity::High);
        assert_eq!(classify("sev:lowest", ""), Severity::Low);
    }

    #[test]
    fn priority_order_decides_multi_keyword_labels() {
        // 同时含 low 与 high 时按 critical > high > medium > low 取首个
        assert_eq!(classify("low-to-high", ""), Severity::High);
        assert_eq!(classify("medium/critical", ""), Severity::Critical);
        assert_eq!(classify("Low Medium", ""), Severity::Medium);
    }

    #[test]
    fn falls_back_to_secondary_severity() {
        assert_eq!(classify("", "High"), Severity::High);
        assert_eq!(classify("unknown", "critical"), Severity::Critical);
    }

    #[test]
    fn primary_wins_over_secondary() {
        assert_eq!(classify("Low", "Critical"), Severity::Low);
    }

    #[test]
    fn unmatched_is_unclassified() {
        assert_eq!(classify("", ""), Severity::Unclassified);
        assert_eq!(classify("n/a", "informational"), Severity::Unclassified);
    }

    #[test]
    fn tally_ignores_unclassified() {
        let mut t = Tally::default();
        for s in [Severity::Critical, Severity::High, Severity::High, Severity::Unclassified] {
            t.add(s);
        }
        assert_eq!(t.get(Severity::High), 2);
        assert_eq!(t.total(), 3);

        let mut u = Tally::default();
        u.add(Severity::Low);
        t.merge(&u);
        assert_eq!(t, Tally { critical: 1, high: 2, medium: 0, low: 1 });
    }
}
