//! 入力サニタイズ
//!
//! 自由記述フィールドの HTML エスケープと検索クエリの整形。

use serde::{Deserialize, Deserializer};

/// 検索クエリの最大長（文字数）
pub const MAX_SEARCH_QUERY_LEN: usize = 100;

/// HTML 特殊文字をエスケープ
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 汎用サニタイズ: HTML エスケープ、NUL 除去、前後空白除去
pub fn sanitize_input(text: &str) -> String {
    escape_html(text).replace('\0', "").trim().to_string()
}

/// 検索クエリを整形
///
/// 先頭 `max_len` 文字に切り詰め、`< > ' " ; \` を除去して前後空白を落とす。
pub fn sanitize_search_query(query: &str, max_len: usize) -> String {
    query
        .chars()
        .take(max_len)
        .filter(|c| !matches!(c, '<' | '>' | '\'' | '"' | ';' | '\\'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// メールアドレスを正規化（前後空白除去・小文字化）
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// serde 用: メールアドレスを正規化して受け取る
pub fn deserialize_email<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let email = String::deserialize(deserializer)?;
    Ok(normalize_email(&email))
}

/// serde 用: 前後空白を除去して受け取る
pub fn deserialize_trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}
