//! E-number codec - parse, normalize and compare approval numbers / E号解析与规范化
//!
//! An E-number is a four-part approval code `(authority, base, extension, revision)`.
//! Canonical form / 规范格式: `e13*1234*5678*00` (widths 2/4/4/2, zero padded, lower case).
//!
//! Surface grammars are plain data (`GRAMMARS`); adding a new spelling is a new
//! table entry, not new control flow. 新增格式只需在表中追加一项。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

/// One surface spelling of an E-number / E号的一种书写格式
#[derive(Debug, Clone, Copy)]
pub struct Grammar {
    pub name: &'static str,
    pub pattern: &'static str,
    /// Capture group index for authority, base, extension, revision / 各部分对应的捕获组
    pub groups: [usize; 4],
}

/// Built-in grammars in priority order / 内置格式（按优先级排序）
///
/// Digit groups never exceed the canonical widths, so a canonical string is
/// never wider than `e99*9999*9999*99`.
pub const GRAMMARS: &[Grammar] = &[
    // e13*1234*5678*00, separators optional
    Grammar {
        name: "asterisk",
        pattern: r"(?i)e([0-9]{1,2})\*?([0-9]{1,4})\*?([0-9]{1,4})\*?([0-9]{1,2})",
        groups: [1, 2, 3, 4],
    },
    // e13-1234-5678-00 / e13 - 1234 - 5678 - 00
    Grammar {
        name: "dashed",
        pattern: r"(?i)e([0-9]{1,2})[\s\-]*([0-9]{1,4})[\s\-]*([0-9]{1,4})[\s\-]*([0-9]{1,2})",
        groups: [1, 2, 3, 4],
    },
    // e13 1234 5678 00
    Grammar {
        name: "spaced",
        pattern: r"(?i)e([0-9]{1,2})\s+([0-9]{1,4})\s+([0-9]{1,4})\s+([0-9]{1,2})",
        groups: [1, 2, 3, 4],
    },
    // e131234567800
    Grammar {
        name: "compact",
        pattern: r"(?i)e([0-9]{2})([0-9]{4})([0-9]{4})([0-9]{2})",
        groups: [1, 2, 3, 4],
    },
];

const CANONICAL_PATTERN: &str = r"^e([0-9]{2})\*([0-9]{4})\*([0-9]{4})\*([0-9]{2})$";

/// Decoded E-number / 解析后的E号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Enumber {
    pub authority: u32,
    pub base: u32,
    pub extension: u32,
    pub revision: u32,
}

impl Enumber {
    pub fn new(authority: u32, base: u32, extension: u32, revision: u32) -> Self {
        Self { authority, base, extension, revision }
    }

    /// Same approval, ignoring extension and revision / 同一许可（忽略扩展号与修订号）
    pub fn same_approval(&self, other: &Enumber) -> bool {
        self.authority == other.authority && self.base == other.base
    }

    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Enumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "e{:02}*{:04}*{:04}*{:02}",
            self.authority, self.base, self.extension, self.revision
        )
    }
}

struct CompiledGrammar {
    name: &'static str,
    regex: Regex,
    groups: [usize; 4],
}

/// E-number codec / E号编解码器
///
/// Pure and `Sync`: build once at startup and share by reference.
pub struct EnumberCodec {
    grammars: Vec<CompiledGrammar>,
    canonical: Regex,
}

impl EnumberCodec {
    /// Codec with the built-in grammars / 使用内置格式创建
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_grammars(GRAMMARS)
    }

    pub fn with_grammars(grammars: &[Grammar]) -> Result<Self, regex::Error> {
        let grammars = grammars
            .iter()
            .map(|g| {
                Ok(CompiledGrammar {
                    name: g.name,
                    regex: Regex::new(g.pattern)?,
                    groups: g.groups,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            grammars,
            canonical: Regex::new(CANONICAL_PATTERN)?,
        })
    }

    /// Grammar names in priority order
    pub fn grammar_names(&self) -> Vec<&'static str> {
        self.grammars.iter().map(|g| g.name).collect()
    }

    /// All matches of one grammar with their byte spans / 单个格式的全部匹配
    ///
    /// A match directly followed by another digit is not an E-number (the digit
    /// run is longer than any canonical group) and is skipped. Once a match
    /// uses separators, every group must end at a non-digit too: an over-wide
    /// group is never split across its neighbours.
    fn scan<'t>(
        grammar: &'t CompiledGrammar,
        text: &'t str,
    ) -> impl Iterator<Item = (Range<usize>, Enumber)> + 't {
        let digit_at = move |pos: usize| text[pos..].starts_with(|c: char| c.is_ascii_digit());
        grammar.regex.captures_iter(text).filter_map(move |caps| {
            let whole = caps.get(0)?;
            if digit_at(whole.end()) {
                return None;
            }
            let separated = whole.as_str().contains(|c: char| !c.is_ascii_alphanumeric());
            if separated
                && grammar
                    .groups
                    .iter()
                    .filter_map(|&g| caps.get(g))
                    .any(|m| digit_at(m.end()))
            {
                return None;
            }
            let part = |i: usize| -> Option<u32> { caps.get(grammar.groups[i])?.as_str().parse().ok() };
            let enumber = Enumber::new(part(0)?, part(1)?, part(2)?, part(3)?);
            Some((whole.range(), enumber))
        })
    }

    /// Decoded E-numbers found in text / 从文本中提取E号
    ///
    /// Grammars run in priority order; a match overlapping a span already taken
    /// by a higher-priority grammar is dropped, so one occurrence never yields
    /// two different canonical strings.
    pub fn extract_enumbers<'a>(&self, text: impl Into<Option<&'a str>>) -> BTreeSet<Enumber> {
        let mut found = BTreeSet::new();
        let text = match text.into() {
            Some(t) if !t.is_empty() => t,
            _ => return found,
        };

        let mut taken: Vec<Range<usize>> = Vec::new();
        for grammar in &self.grammars {
            for (span, enumber) in Self::scan(grammar, text) {
                if taken.iter().any(|t| span.start < t.end && t.start < span.end) {
                    continue;
                }
                taken.push(span);
                found.insert(enumber);
            }
        }
        found
    }

    /// Distinct canonical E-numbers found in text, sorted / 提取规范化E号（去重、排序）
    pub fn extract<'a>(&self, text: impl Into<Option<&'a str>>) -> Vec<String> {
        self.extract_enumbers(text)
            .into_iter()
            .map(|e| e.canonical())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether the text holds at least one E-number / 文本是否包含E号
    pub fn contains_enumber(&self, text: &str) -> bool {
        !self.extract_enumbers(text).is_empty()
    }

    /// Normalize a single candidate to canonical form / 规范化单个E号
    ///
    /// Strips everything except digits, `*`, `-`, the marker letter and
    /// whitespace, then takes the first grammar (in priority order) that
    /// matches anywhere in the cleaned string.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '*' | '-' | 'e' | 'E') || c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return None;
        }

        self.grammars
            .iter()
            .find_map(|g| Self::scan(g, &cleaned).next())
            .map(|(_, enumber)| enumber.canonical())
    }

    /// Split an E-number into its four components / 拆分为四个部分
    pub fn decompose(&self, raw: &str) -> Option<Enumber> {
        let normalized = self.normalize(raw)?;
        let caps = self.canonical.captures(&normalized)?;
        let part = |i: usize| -> Option<u32> { caps.get(i)?.as_str().parse().ok() };
        Some(Enumber::new(part(1)?, part(2)?, part(3)?, part(4)?))
    }

    /// Tolerant comparison of two E-number lists / 宽松匹配两组E号
    ///
    /// Exact canonical match first, then same authority and base.
    /// `_tolerance` is reserved for graded matching; the policy is binary today.
    pub fn equivalent<Q, D>(&self, query: &[Q], doc: &[D], _tolerance: f32) -> bool
    where
        Q: AsRef<str>,
        D: AsRef<str>,
    {
        let norm_query: Vec<String> = query.iter().filter_map(|e| self.normalize(e.as_ref())).collect();
        let norm_doc: Vec<String> = doc.iter().filter_map(|e| self.normalize(e.as_ref())).collect();
        if norm_query.is_empty() || norm_doc.is_empty() {
            return false;
        }

        if norm_query.iter().any(|q| norm_doc.contains(q)) {
            return true;
        }

        let query_parts: Vec<Enumber> = norm_query.iter().filter_map(|e| self.decompose(e)).collect();
        let doc_parts: Vec<Enumber> = norm_doc.iter().filter_map(|e| self.decompose(e)).collect();
        query_parts
            .iter()
            .any(|q| doc_parts.iter().any(|d| q.same_approval(d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> EnumberCodec {
        EnumberCodec::new().unwrap()
    }

    #[test]
    fn test_extract_standard_format() {
        let found = codec().extract("This document contains e13*1234*5678*00 and e1*2345*6789*01");
        assert_eq!(found, vec!["e01*2345*6789*01", "e13*1234*5678*00"]);
    }

    #[test]
    fn test_extract_spaces_and_hyphens() {
        let spaced = codec().extract("E13 1234 5678 00 and e1 2345 6789 01");
        assert_eq!(spaced, vec!["e01*2345*6789*01", "e13*1234*5678*00"]);

        let dashed = codec().extract("E13-1234-5678-00 and e1-2345-6789-01");
        assert_eq!(dashed, vec!["e01*2345*6789*01", "e13*1234*5678*00"]);
    }

    #[test]
    fn test_extract_compact_format() {
        let found = codec().extract("e131234567800 and e012345678901");
        assert_eq!(found, vec!["e01*2345*6789*01", "e13*1234*5678*00"]);
    }

    #[test]
    fn test_extract_every_grammar() {
        let c = codec();
        let samples = [
            "e7*42*9*3",
            "E7 - 42 - 9 - 3",
            "e7  42\t9 3",
            "e070042000903",
        ];
        for sample in samples {
            assert!(
                c.extract(sample).contains(&"e07*0042*0009*03".to_string()),
                "{} not recognised",
                sample
            );
        }
    }

    #[test]
    fn test_extract_case_variants_dedup() {
        let found = codec().extract("E13*1234*5678*00 and e13*1234*5678*00");
        assert_eq!(found, vec!["e13*1234*5678*00"]);
    }

    #[test]
    fn test_extract_empty() {
        let c = codec();
        assert!(c.extract("").is_empty());
        assert!(c.extract(None::<&str>).is_empty());
        assert!(c.extract("no approval numbers here").is_empty());
    }

    #[test]
    fn test_extract_rejects_overlong_digit_runs() {
        assert!(codec().extract("e13123456780012345").is_empty());
    }

    #[test]
    fn test_extract_rejects_overwide_inner_groups() {
        let c = codec();
        // base 23456 and extension 56789 are one digit too wide
        assert!(c.extract("e1*23456*7*8").is_empty());
        assert!(c.extract("e13*1234*56789*0").is_empty());
        assert!(c.extract("E13 1234 56789 00").is_empty());
        assert!(c.extract("e13-12345-678-00").is_empty());
        assert_eq!(c.normalize("e1*23456*7*8"), None);
        assert_eq!(c.normalize("e13*1234*56789*0"), None);
        assert!(!c.contains_enumber("e13*12345*5678*00"));
    }

    #[test]
    fn test_extract_complex_text() {
        let text = "
            This is a homologation document for BMW X5.
            E-approval number: e13*1234*5678*00
            Additional approval: E13-9999-8888-77
            Also contains: e131111222233
        ";
        let found = codec().extract(text);
        assert_eq!(found.len(), 3);
        assert!(found.contains(&"e13*1234*5678*00".to_string()));
        assert!(found.contains(&"e13*9999*8888*77".to_string()));
        assert!(found.contains(&"e13*1111*2222*33".to_string()));
    }

    #[test]
    fn test_normalize_variants() {
        let c = codec();
        assert_eq!(c.normalize("e13*1234*5678*00").as_deref(), Some("e13*1234*5678*00"));
        assert_eq!(c.normalize("e13 1234 5678 00").as_deref(), Some("e13*1234*5678*00"));
        assert_eq!(c.normalize("e13-1234-5678-00").as_deref(), Some("e13*1234*5678*00"));
        assert_eq!(c.normalize("e131234567800").as_deref(), Some("e13*1234*5678*00"));
        assert_eq!(c.normalize("E1*234*567*8").as_deref(), Some("e01*0234*0567*08"));
        assert_eq!(c.normalize("Nr. e13*1234*5678*00 (ABE)").as_deref(), Some("e13*1234*5678*00"));
    }

    #[test]
    fn test_normalize_invalid() {
        let c = codec();
        assert_eq!(c.normalize("invalid"), None);
        assert_eq!(c.normalize(""), None);
        assert_eq!(c.normalize("   "), None);
    }

    #[test]
    fn test_normalize_idempotent() {
        let c = codec();
        for raw in ["e1*234*567*8", "E13 1234 5678 00", "e131234567800", "e4-0001-0002-3"] {
            let once = c.normalize(raw).unwrap();
            assert_eq!(c.normalize(&once).as_deref(), Some(once.as_str()));
        }
    }

    #[test]
    fn test_decompose() {
        let c = codec();
        assert_eq!(c.decompose("e13*1234*5678*00"), Some(Enumber::new(13, 1234, 5678, 0)));
        assert_eq!(c.decompose("e1*234*567*8"), Some(Enumber::new(1, 234, 567, 8)));
        assert_eq!(c.decompose("E1 234 567 8"), Some(Enumber::new(1, 234, 567, 8)));
        assert_eq!(c.decompose("invalid"), None);
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(Enumber::new(1, 2, 3, 4).to_string(), "e01*0002*0003*04");
    }

    #[test]
    fn test_equivalent() {
        let c = codec();
        assert!(c.equivalent(&["e13*1234*5678*00"], &["e13*1234*5678*00"], 0.8));
        assert!(c.equivalent(&["e13*1234*5678*00"], &["e13*1234*9999*99"], 0.8));
        assert!(!c.equivalent(&["e13*1234*5678*00"], &["e14*1234*5678*00"], 0.8));
        assert!(c.equivalent(&["E13 1234 5678 00"], &["e13-1234-0001-01"], 0.8));
    }

    #[test]
    fn test_equivalent_empty_lists() {
        let c = codec();
        let none: [&str; 0] = [];
        assert!(!c.equivalent(&none, &["e13*1234*5678*00"], 0.8));
        assert!(!c.equivalent(&["e13*1234*5678*00"], &none, 0.8));
        assert!(!c.equivalent(&none, &none, 0.8));
        assert!(!c.equivalent(&["garbage"], &["e13*1234*5678*00"], 0.8));
    }

    #[test]
    fn test_contains_enumber() {
        let c = codec();
        assert!(c.contains_enumber("e13*1234*5678*00"));
        assert!(c.contains_enumber("This contains e13*1234*5678*00"));
        assert!(!c.contains_enumber("not an enumber"));
        assert!(!c.contains_enumber(""));
    }

    #[test]
    fn test_custom_grammar_table() {
        let grammars = [Grammar {
            name: "slash",
            pattern: r"(?i)e([0-9]{1,2})/([0-9]{1,4})/([0-9]{1,4})/([0-9]{1,2})",
            groups: [1, 2, 3, 4],
        }];
        let c = EnumberCodec::with_grammars(&grammars).unwrap();
        assert_eq!(c.grammar_names(), vec!["slash"]);
        assert_eq!(c.extract("e13/1234/5678/00"), vec!["e13*1234*5678*00"]);
        assert!(c.extract("e13*1234*5678*00").is_empty());
    }
}
