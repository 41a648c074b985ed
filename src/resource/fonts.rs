//! Web font embedding
//!
//! Collects the `@font-face` rules of the host document that the captured
//! tree actually uses and embeds their font binaries, producing one CSS
//! block for the vector document's `<style>`.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use log::{debug, warn};
use std::collections::HashSet;

use super::embed::{embed_resources, should_embed};
use super::{resolve_url, EmbedContext};
use crate::clone::ClonedElement;
use crate::dom::css::{parse_stylesheet, split_top_level, CssRule};
use crate::dom::HostDocument;
use crate::Result;

const MAX_IMPORT_DEPTH: usize = 8;

/// A `@font-face` rule together with the URL its references resolve against
#[derive(Debug, Clone, PartialEq)]
pub struct FontFaceRule {
    pub css_text: String,
    pub family: String,
    pub base_url: Option<String>,
}

/// Font CSS for the vector document, `None` when there is nothing to embed.
pub async fn font_embed_css<D: HostDocument>(
    document: &D,
    root: &ClonedElement,
    ctx: &EmbedContext<'_>,
) -> Result<Option<String>> {
    let options = ctx.options();
    if let Some(css) = &options.font_embed_css {
        return Ok(Some(css.clone()));
    }
    if options.skip_fonts {
        return Ok(None);
    }

    let rules = web_font_rules(document, ctx).await;
    let used = used_fonts(root);
    let relevant: Vec<_> = rules
        .into_iter()
        .filter(|rule| used.contains(&normalize_font_family(&rule.family)))
        .collect();
    debug!("embedding {} font-face rule(s)", relevant.len());
    if relevant.is_empty() {
        return Ok(None);
    }

    let texts = try_join_all(
        relevant
            .iter()
            .map(|rule| embed_resources(&rule.css_text, rule.base_url.as_deref(), ctx)),
    )
    .await?;
    Ok(Some(texts.join("\n")))
}

/// Every `@font-face` rule with a `url()` source reachable from the
/// document's stylesheets, `@import`s followed.
pub async fn web_font_rules<D: HostDocument>(document: &D, ctx: &EmbedContext<'_>) -> Vec<FontFaceRule> {
    let document_base = document.base_url();
    let mut visited = HashSet::new();
    let mut out = Vec::new();
    for sheet in document.style_sheets() {
        let base = sheet.href.clone().or_else(|| document_base.clone());
        let text = match (sheet.css_text, &sheet.href) {
            (Some(text), _) => text,
            (None, Some(href)) => {
                if !visited.insert(href.clone()) {
                    continue;
                }
                match ctx.fetch_text(href).await {
                    Ok(text) => text,
                    Err(err) => {
                        warn!("Failed to load stylesheet {}: {}", href, err);
                        continue;
                    }
                }
            }
            (None, None) => continue,
        };
        collect_font_faces(text, base, ctx, &mut visited, &mut out, 0).await;
    }
    out
}

fn collect_font_faces<'a>(
    text: String,
    base: Option<String>,
    ctx: &'a EmbedContext<'a>,
    visited: &'a mut HashSet<String>,
    out: &'a mut Vec<FontFaceRule>,
    depth: usize,
) -> BoxFuture<'a, ()> {
    async move {
        for rule in flatten_groups(parse_stylesheet(&text)) {
            match rule {
                CssRule::FontFace { ref css_text, .. } => {
                    let has_source = rule.declaration("src").map(should_embed).unwrap_or(false);
                    let family = rule.declaration("font-family").map(|f| f.to_string());
                    if let (true, Some(family)) = (has_source, family) {
                        out.push(FontFaceRule {
                            css_text: css_text.clone(),
                            family,
                            base_url: base.clone(),
                        });
                    }
                }
                CssRule::Import { href } if depth < MAX_IMPORT_DEPTH => {
                    let url = resolve_url(&href, base.as_deref());
                    if !visited.insert(url.clone()) {
                        continue;
                    }
                    match ctx.fetch_text(&url).await {
                        Ok(imported) => {
                            collect_font_faces(imported, Some(url), ctx, visited, out, depth + 1).await
                        }
                        Err(err) => warn!("Failed to load imported stylesheet {}: {}", url, err),
                    }
                }
                _ => {}
            }
        }
    }
    .boxed()
}

/// `@media`/`@supports` contents inlined in document order
fn flatten_groups(rules: Vec<CssRule>) -> Vec<CssRule> {
    let mut out = Vec::with_capacity(rules.len());
    for rule in rules {
        match rule {
            CssRule::Group { rules, .. } => out.extend(flatten_groups(rules)),
            other => out.push(other),
        }
    }
    out
}

pub fn normalize_font_family(family: &str) -> String {
    family.trim().replace(['"', '\''], "")
}

/// Font families named anywhere in the cloned tree
pub fn used_fonts(root: &ClonedElement) -> HashSet<String> {
    let mut fonts = HashSet::new();
    root.walk(&mut |el| {
        if let Some(families) = el.style.get("font-family") {
            for family in split_top_level(families, b',') {
                let family = normalize_font_family(family);
                if !family.is_empty() {
                    fonts.insert(family);
                }
            }
        }
    });
    fonts
}
