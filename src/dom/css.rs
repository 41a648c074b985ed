//! Permissive CSS text parsing.
//!
//! This is not a conforming CSS tokenizer. It splits stylesheet text into
//! rules and declaration blocks while respecting strings, parentheses and
//! nested blocks, which is all the embedders and the static host need.

/// One `name: value` pair of a declaration block
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CssRule {
    /// `selectors { declarations }`
    Style {
        selectors: String,
        declarations: Vec<Declaration>,
    },
    /// `@font-face { ... }` with its original text
    FontFace {
        css_text: String,
        declarations: Vec<Declaration>,
    },
    /// `@import url(...)`; `href` is as written
    Import { href: String },
    /// `@media`/`@supports`/`@layer` blocks with nested rules
    Group { prelude: String, rules: Vec<CssRule> },
    /// Anything else, kept verbatim
    Other { css_text: String },
}

impl CssRule {
    pub fn declaration(&self, name: &str) -> Option<&str> {
        let decls = match self {
            CssRule::Style { declarations, .. } | CssRule::FontFace { declarations, .. } => {
                declarations
            }
            _ => return None,
        };
        decls
            .iter()
            .rev()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }
}

/// Remove `/* ... */` comments outside of strings.
pub fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut last = 0;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
                    out.push_str(&text[last..i]);
                    let end = text[i + 2..].find("*/").map(|p| i + 2 + p + 2).unwrap_or(bytes.len());
                    i = end;
                    last = end;
                    continue;
                }
            }
        }
        i += 1;
    }
    out.push_str(&text[last.min(text.len())..]);
    out
}

/// Parse stylesheet text into rules.
pub fn parse_stylesheet(text: &str) -> Vec<CssRule> {
    let text = strip_comments(text);
    parse_rules(&text)
}

fn parse_rules(text: &str) -> Vec<CssRule> {
    let mut rules = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }
        let start = pos + (rest.len() - trimmed.len());

        // Statement at-rules end at the first top-level ';' before any '{'
        if trimmed.starts_with('@') {
            let semi = find_top_level(text, start, b';');
            let brace = find_top_level(text, start, b'{');
            if let Some(semi) = semi.filter(|s| brace.map_or(true, |b| *s < b)) {
                let statement = text[start..semi].trim();
                if let Some(href) = import_href(statement) {
                    rules.push(CssRule::Import { href });
                } else {
                    rules.push(CssRule::Other { css_text: format!("{};", statement) });
                }
                pos = semi + 1;
                continue;
            }
        }

        let Some(open) = find_top_level(text, start, b'{') else {
            break;
        };
        let Some(close) = find_block_end(text, open) else {
            break;
        };
        let prelude = text[start..open].trim();
        let body = &text[open + 1..close];
        let lower = prelude.to_ascii_lowercase();
        if lower.starts_with("@font-face") {
            rules.push(CssRule::FontFace {
                css_text: text[start..=close].trim().to_string(),
                declarations: parse_declarations(body),
            });
        } else if lower.starts_with("@media")
            || lower.starts_with("@supports")
            || lower.starts_with("@layer")
            || lower.starts_with("@document")
        {
            rules.push(CssRule::Group {
                prelude: prelude.to_string(),
                rules: parse_rules(body),
            });
        } else if lower.starts_with('@') {
            rules.push(CssRule::Other { css_text: text[start..=close].to_string() });
        } else if !prelude.is_empty() {
            rules.push(CssRule::Style {
                selectors: prelude.to_string(),
                declarations: parse_declarations(body),
            });
        }
        pos = close + 1;
    }
    rules
}

fn import_href(statement: &str) -> Option<String> {
    let lower = statement.to_ascii_lowercase();
    if !lower.starts_with("@import") {
        return None;
    }
    let rest = statement["@import".len()..].trim_start();
    if let Some(token) = crate::resource::embed::scan_urls(rest).into_iter().next() {
        return Some(token.url.to_string());
    }
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = &rest[1..];
    inner.find(quote).map(|end| inner[..end].to_string())
}

/// Parse the inside of a `{ ... }` block.
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    split_top_level(block, b';')
        .into_iter()
        .filter_map(|decl| {
            let colon = decl.find(':')?;
            let name = decl[..colon].trim();
            let mut value = decl[colon + 1..].trim();
            if name.is_empty() || value.is_empty() {
                return None;
            }
            let mut important = false;
            if let Some(idx) = value.to_ascii_lowercase().rfind("!important") {
                if value[idx + "!important".len()..].trim().is_empty() {
                    important = true;
                    value = value[..idx].trim_end();
                }
            }
            let name = if name.starts_with("--") {
                name.to_string()
            } else {
                name.to_ascii_lowercase()
            };
            Some(Declaration { name, value: value.to_string(), important })
        })
        .collect()
}

/// Split on `sep` outside strings, parentheses and brackets.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                _ if b == sep && depth == 0 => {
                    parts.push(&text[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}

fn find_top_level(text: &str, from: usize, target: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ if b == target && depth == 0 => return Some(i),
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Index of the `}` closing the block opened at `open`.
fn find_block_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}
