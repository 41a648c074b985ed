//! `::before` / `::after` materialization

use super::{style_capture_error, ClonedElement, ClonedNode};
use crate::dom::{LiveNode, PseudoElement};
use crate::{CaptureOptions, Result};

pub(crate) fn clone_pseudo_elements<N: LiveNode>(
    node: &N,
    el: &mut ClonedElement,
    options: &CaptureOptions,
) -> Result<()> {
    for pseudo in [PseudoElement::Before, PseudoElement::After] {
        let style = node
            .computed_style(Some(pseudo))
            .map_err(|e| style_capture_error(&el.tag, e))?;
        let Some(content) = style.get("content") else {
            continue;
        };
        if matches!(content.trim(), "" | "none" | "normal") {
            continue;
        }

        let text = resolve_content(content, &el.attributes);
        let mut span = ClonedElement::new("span");
        span.set_attr(
            "data-pseudo",
            match pseudo {
                PseudoElement::Before => "before",
                PseudoElement::After => "after",
            },
        );
        for (name, value) in style.iter() {
            if name == "content" || !options.keeps_property(name) {
                continue;
            }
            span.style.set(name, value);
        }
        if !text.is_empty() {
            span.children.push(ClonedNode::Text(text));
        }

        match pseudo {
            PseudoElement::Before => el.children.insert(0, ClonedNode::Element(span)),
            PseudoElement::After => el.children.push(ClonedNode::Element(span)),
        }
    }
    Ok(())
}

/// Text generated by a `content` value.
///
/// Quoted strings (with CSS escapes) and `attr()` are resolved; counters,
/// images and unknown functions contribute nothing.
pub fn resolve_content(value: &str, attributes: &[(String, String)]) -> String {
    let mut out = String::new();
    let mut chars = value.trim().chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '"' | '\'' => {
                chars.next();
                read_string(&mut chars, c, &mut out);
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut ident = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() || n == '(' || n == '"' || n == '\'' {
                        break;
                    }
                    ident.push(n);
                    chars.next();
                }
                let mut args = String::new();
                if chars.peek() == Some(&'(') {
                    chars.next();
                    let mut depth = 1;
                    for n in chars.by_ref() {
                        match n {
                            '(' => depth += 1,
                            ')' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        args.push(n);
                    }
                }
                match ident.to_ascii_lowercase().as_str() {
                    "attr" => {
                        let name = args.split_whitespace().next().unwrap_or("");
                        if let Some((_, v)) = attributes.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                            out.push_str(v);
                        }
                    }
                    "open-quote" => out.push('\u{201C}'),
                    "close-quote" => out.push('\u{201D}'),
                    _ => {}
                }
            }
        }
    }
    out
}

fn read_string<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>, quote: char, out: &mut String) {
    while let Some(c) = chars.next() {
        if c == quote {
            return;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        // Escape: up to six hex digits plus one optional space, or a literal char.
        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(*h);
                    chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            match chars.next() {
                Some('\n') | None => {}
                Some(other) => out.push(other),
            }
        } else {
            if chars.peek() == Some(&' ') {
                chars.next();
            }
            let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
            out.push(char::from_u32(code).filter(|c| *c != '\0').unwrap_or('\u{FFFD}'));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_strings_are_unquoted() {
        assert_eq!(resolve_content("\"JUSTBEFORE\"", &[]), "JUSTBEFORE");
        assert_eq!(resolve_content("'a' \"b\"", &[]), "ab");
        assert_eq!(resolve_content("\"say \\\"hi\\\"\"", &[]), "say \"hi\"");
    }

    #[test]
    fn escapes_decode_to_characters() {
        assert_eq!(resolve_content("\"\\201C x\\A\"", &[]), "\u{201C}x\n");
    }

    #[test]
    fn attr_and_counters_resolve() {
        let attrs = vec![("data-label".to_string(), "Label".to_string())];
        assert_eq!(resolve_content("\"[\" attr(data-label) \"]\"", &attrs), "[Label]");
        assert_eq!(resolve_content("counter(item) \". \"", &attrs), ". ");
        assert_eq!(resolve_content("attr(missing)", &attrs), "");
        assert_eq!(resolve_content("open-quote \"x\" close-quote", &attrs), "\u{201C}x\u{201D}");
    }
}
