//! Asset key normalization and token filter parsing.
//!
//! Both accept the same loose notations (`CODE`, `CODE:ISSUER`,
//! `CODE/ISSUER`, `CODE|ISSUER`, any case, stray whitespace). The normalized
//! key is the equality key for allow/block lists; the token filter keeps its
//! full normalized text for diagnostics and matches on code/issuer.

use serde::{Deserialize, Serialize};

fn is_asset_separator(c: char) -> bool {
    c.is_whitespace() || c == '/' || c == '|'
}

/// Canonicalize an asset reference into `"CODE:ISSUER"`.
///
/// Empty input yields `""`. A missing issuer yields `"CODE:"`. Segments past
/// the issuer are dropped.
pub fn normalize_asset_key(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let normalized: String = raw
        .chars()
        .map(|c| if is_asset_separator(c) { ':' } else { c })
        .collect::<String>()
        .to_uppercase();

    let mut parts = normalized.split(':').filter(|p| !p.is_empty());
    let code = parts.next().unwrap_or("");
    let issuer = parts.next().unwrap_or("");
    format!("{}:{}", code, issuer)
}

/// Uppercased, trimmed code or issuer for token comparisons.
pub fn normalize_token_part(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Parsed `TOKEN_FILTER` expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFilter {
    /// Trimmed input as given.
    pub raw: String,
    /// Whitespace-free, uppercased, `:`-separated form; not truncated.
    pub norm: String,
    pub code: String,
    pub issuer: String,
    pub has_issuer: bool,
}

impl TokenFilter {
    pub fn parse(raw_value: &str) -> Self {
        let raw = raw_value.trim();
        if raw.is_empty() {
            return TokenFilter::default();
        }

        let norm: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == '/' || c == '|' { ':' } else { c })
            .collect::<String>()
            .to_uppercase();

        let mut parts = norm.split(':').filter(|p| !p.is_empty());
        let code = parts.next().unwrap_or("").to_string();
        let issuer = parts.next().unwrap_or("").to_string();
        let has_issuer = !issuer.is_empty();

        TokenFilter {
            raw: raw.to_string(),
            norm,
            code,
            issuer,
            has_issuer,
        }
    }

    /// An empty filter lets everything through.
    pub fn is_empty(&self) -> bool {
        self.norm.is_empty()
    }

    /// Match a normalized asset code and issuer against this filter.
    pub fn matches(&self, code_norm: &str, issuer_norm: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        if self.has_issuer {
            code_norm == self.code && issuer_norm == self.issuer
        } else {
            code_norm == self.code
        }
    }

    pub fn mode(&self) -> &'static str {
        if self.has_issuer {
            "CODE:ISSUER"
        } else {
            "CODE"
        }
    }
}
