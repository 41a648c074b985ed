//! `url()` reference scanning and substitution in CSS text

use futures::future::join_all;
use std::collections::HashMap;
use std::ops::Range;

use super::{is_data_url, resolve_url, EmbedContext};
use crate::dom::css::split_top_level;
use crate::Result;

/// A `url()` reference found in CSS text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlToken<'a> {
    /// The URL literal, without quotes
    pub url: &'a str,
    /// Byte range of the literal inside the scanned text
    pub range: Range<usize>,
}

/// Find every `url(...)` token, data URLs included.
///
/// Accepts `url("x")`, `url('x')` and `url(x)` with optional inner
/// whitespace; the keyword is matched case-insensitively.
pub fn scan_urls(text: &str) -> Vec<UrlToken<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i + 4 <= bytes.len() {
        if !bytes[i..i + 4].eq_ignore_ascii_case(b"url(") {
            i += 1;
            continue;
        }
        let ident_before = i > 0 && {
            let b = bytes[i - 1];
            b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
        };
        if ident_before {
            i += 4;
            continue;
        }
        match scan_argument(text, i + 4) {
            Some((range, end)) => {
                if !range.is_empty() {
                    tokens.push(UrlToken { url: &text[range.clone()], range });
                }
                i = end;
            }
            None => i += 4,
        }
    }
    tokens
}

/// Returns the literal's range and the index just past the closing `)`.
fn scan_argument(text: &str, start: usize) -> Option<(Range<usize>, usize)> {
    let bytes = text.as_bytes();
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let quote = match bytes.get(i) {
        Some(b'"') => Some(b'"'),
        Some(b'\'') => Some(b'\''),
        _ => None,
    };
    match quote {
        Some(q) => {
            let lit_start = i + 1;
            let mut j = lit_start;
            while j < bytes.len() && bytes[j] != q {
                if bytes[j] == b'\\' {
                    j += 1;
                }
                j += 1;
            }
            if j >= bytes.len() {
                return None;
            }
            let lit_end = j;
            let mut k = j + 1;
            while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if bytes.get(k) != Some(&b')') {
                return None;
            }
            Some((lit_start..lit_end, k + 1))
        }
        None => {
            let close = text[i..].find(')')? + i;
            let literal = text[i..close].trim_end();
            Some((i..i + literal.len(), close + 1))
        }
    }
}

/// Every non-data URL referenced by `text`, in order of appearance.
pub fn parse_urls(text: &str) -> Vec<String> {
    scan_urls(text)
        .into_iter()
        .filter(|t| !is_data_url(t.url))
        .map(|t| t.url.to_string())
        .collect()
}

pub fn should_embed(text: &str) -> bool {
    !scan_urls(text).is_empty()
}

/// Rebuild `text` with the literal of each token replaced by `substitute`.
fn substitute<'t, F>(text: &'t str, tokens: &[UrlToken<'t>], mut replacement: F) -> String
where
    F: FnMut(&str) -> Option<&'t str>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for token in tokens {
        if let Some(new) = replacement(token.url) {
            out.push_str(&text[last..token.range.start]);
            out.push_str(new);
            last = token.range.end;
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Embed one resource: every `url()` whose literal equals `resource_url`
/// is replaced by the resource's `data:` URI.
///
/// `base_url` resolves a relative `resource_url`; the media type comes from
/// the resource's extension.
pub async fn embed(
    text: &str,
    resource_url: &str,
    base_url: Option<&str>,
    ctx: &EmbedContext<'_>,
) -> Result<String> {
    let resolved = resolve_url(resource_url, base_url);
    let outcome = ctx.resource_to_data_url(&resolved, None).await;
    let Some(data_url) = ctx.settle(outcome)? else {
        return Ok(text.to_string());
    };
    let tokens = scan_urls(text);
    Ok(substitute(text, &tokens, |url| {
        (url == resource_url).then_some(data_url.as_str())
    }))
}

/// Embed every external reference of `text`.
///
/// Distinct URLs are resolved concurrently; results are substituted back
/// at their original positions, so the output does not depend on fetch
/// completion order. Text with only `data:` URLs is returned unchanged.
pub async fn embed_resources(text: &str, base_url: Option<&str>, ctx: &EmbedContext<'_>) -> Result<String> {
    if !should_embed(text) {
        return Ok(text.to_string());
    }
    let filtered = filter_preferred_font_format(text, ctx.options().preferred_font_format.as_deref());
    let urls = parse_urls(&filtered);
    if urls.is_empty() {
        return Ok(filtered);
    }

    let mut distinct: Vec<&str> = Vec::new();
    for url in &urls {
        if !distinct.contains(&url.as_str()) {
            distinct.push(url);
        }
    }

    let outcomes = join_all(distinct.iter().map(|url| async move {
        let resolved = resolve_url(url, base_url);
        (*url, ctx.resource_to_data_url(&resolved, None).await)
    }))
    .await;

    let mut embedded: HashMap<&str, String> = HashMap::new();
    for (url, outcome) in outcomes {
        if let Some(data_url) = ctx.settle(outcome)? {
            embedded.insert(url, data_url);
        }
    }

    let tokens: Vec<_> = scan_urls(&filtered)
        .into_iter()
        .filter(|t| !is_data_url(t.url))
        .collect();
    Ok(substitute(&filtered, &tokens, |url| embedded.get(url).map(String::as_str)))
}

/// Keep only the `src` entries of `@font-face` rules whose `format()`
/// equals `preferred`; a `src` with no matching entry is dropped.
pub fn filter_preferred_font_format(text: &str, preferred: Option<&str>) -> String {
    let Some(preferred) = preferred else {
        return text.to_string();
    };
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = find_src_declaration(rest) {
        out.push_str(&rest[..pos]);
        let value_start = pos + rest[pos..].find(':').map(|c| c + 1).unwrap_or(4);
        let value_end = declaration_end(rest, value_start);
        let value = &rest[value_start..value_end];

        let kept: Vec<&str> = split_top_level(value, b',')
            .into_iter()
            .map(str::trim)
            .filter(|entry| entry_format(entry).as_deref() == Some(preferred))
            .collect();
        if let Some(first) = kept.first() {
            out.push_str("src: ");
            out.push_str(first);
        }
        // Drop the terminating ';' together with a removed declaration.
        let mut next = value_end;
        if kept.is_empty() && rest[next..].starts_with(';') {
            next += 1;
        }
        rest = &rest[next..];
    }
    out.push_str(rest);
    out
}

fn find_src_declaration(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(found) = text[from..].find("src") {
        let pos = from + found;
        let before_ok = pos == 0 || matches!(bytes[pos - 1], b'{' | b';' | b' ' | b'\n' | b'\t' | b'\r');
        let after = text[pos + 3..].trim_start();
        if before_ok && after.starts_with(':') {
            return Some(pos);
        }
        from = pos + 3;
    }
    None
}

fn declaration_end(text: &str, from: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b';' | b'}' if depth == 0 => return i,
                _ => {}
            },
        }
        i += 1;
    }
    bytes.len()
}

fn entry_format(entry: &str) -> Option<String> {
    let lower = entry.to_ascii_lowercase();
    let start = lower.find("format(")? + "format(".len();
    let end = entry[start..].find(')')? + start;
    Some(entry[start..end].trim().trim_matches(['"', '\'']).to_string())
}
