//! Search text tokenizer - shared by indexing and querying / 搜索文本处理
//!
//! Provides / 提供：
//! - `normalize_for_search`: the single normalization used for both the stored
//!   `normalized_title` and the query text / 索引与查询共用的标准化
//! - `query_tokens`: discriminative query words / 查询分词
//! - `similarity`: trigram similarity (pg_trgm semantics) / 三元组相似度

use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Tokens this short are ignored for trigram matching / 过短的词不参与三元组匹配
pub const MIN_TOKEN_CHARS: usize = 3;

/// Normalize text for search / 标准化文本用于搜索
/// - Lowercase / 转小写
/// - Strip accents (NFD, drop combining marks) / 去除重音
/// - Every run of non-word characters becomes one space / 非单词字符替换为空格
/// - Trim / 去除首尾空白
pub fn normalize_for_search(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if is_word_char(c) { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Query words long enough for trigram matching / 可用于三元组匹配的查询词
pub fn query_tokens(normalized_query: &str) -> Vec<&str> {
    normalized_query
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .collect()
}

/// Trigram set of a string / 生成三元组集合
///
/// Same extraction as PostgreSQL pg_trgm: split into alphanumeric words,
/// lowercase, pad each word with two leading blanks and one trailing blank.
pub fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let mut set = HashSet::new();
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.to_lowercase().chars())
            .chain(" ".chars())
            .collect();
        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }
    set
}

/// Trigram similarity in `[0, 1]`: shared / (total distinct) / 三元组相似度
pub fn similarity(a: &str, b: &str) -> f32 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.len() + tb.len() - shared;
    shared as f32 / union as f32
}
