//! Image embedding over a cloned tree
//!
//! Handles `url()` references in any inline style property (backgrounds,
//! masks, list markers, cursors, border images), `<img src>` and SVG
//! `<image href>`.
//! Children are processed concurrently; a node's failure surfaces unless
//! the capture options handle it.

use futures::future::{try_join_all, BoxFuture, FutureExt};

use super::embed::{embed_resources, should_embed};
use super::{is_data_url, mime_type_for_url, resolve_url, EmbedContext};
use crate::clone::ClonedElement;
use crate::Result;

/// Embed every image referenced by `el` and its descendants.
pub fn embed_images<'a>(el: &'a mut ClonedElement, ctx: &'a EmbedContext<'a>) -> BoxFuture<'a, Result<()>> {
    async move {
        embed_style_urls(el, ctx).await?;
        embed_image_node(el, ctx).await?;
        try_join_all(el.element_children_mut().map(|child| embed_images(child, ctx))).await?;
        Ok(())
    }
    .boxed()
}

/// Embed every style value that references an external resource.
///
/// Shorthands and longhands are both kept by hosts, so no property is
/// skipped because another one of its group has a value.
async fn embed_style_urls(el: &mut ClonedElement, ctx: &EmbedContext<'_>) -> Result<()> {
    let pending: Vec<(String, String)> = el
        .style
        .iter()
        .filter(|(_, value)| should_embed(value))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    if pending.is_empty() {
        return Ok(());
    }
    let embedded =
        try_join_all(pending.iter().map(|(_, value)| embed_resources(value, ctx.base_url(), ctx))).await?;
    for ((name, _), value) in pending.into_iter().zip(embedded) {
        el.style.set(name, value);
    }
    Ok(())
}

async fn embed_image_node(el: &mut ClonedElement, ctx: &EmbedContext<'_>) -> Result<()> {
    let source_attr = if el.is("img") {
        "src"
    } else if el.is("image") {
        if el.attr("href").is_some() {
            "href"
        } else {
            "xlink:href"
        }
    } else {
        return Ok(());
    };
    let Some(src) = el.attr(source_attr).map(|s| s.to_string()) else {
        return Ok(());
    };
    if src.is_empty() || is_data_url(&src) {
        return Ok(());
    }

    let resolved = resolve_url(&src, ctx.base_url());
    let outcome = ctx.resource_to_data_url(&resolved, mime_type_for_url(&src)).await;
    if let Some(data_url) = ctx.settle(outcome)? {
        el.set_attr(source_attr, data_url);
        if source_attr == "src" {
            el.remove_attr("srcset");
            if el.attr("loading") == Some("lazy") {
                el.set_attr("loading", "eager");
            }
        }
    }
    Ok(())
}
