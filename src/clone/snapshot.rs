//! State snapshots for replaced and stateful elements, dispatched by kind.

use super::{ClonedElement, ClonedNode, Namespace};
use crate::dom::{ElementKind, LiveNode};

/// What a live element looked like at capture time
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Snapshot {
    Plain,
    /// Bitmap of a canvas or video frame
    Bitmap(String),
    /// Video that has not painted yet; its poster stands in
    Poster(String),
    Input { value: Option<String>, checked: Option<bool> },
    TextArea(String),
    Select(String),
}

pub(crate) fn take<N: LiveNode>(kind: ElementKind, node: &N) -> Snapshot {
    match kind {
        ElementKind::Canvas => canvas(node),
        ElementKind::Video => video(node),
        ElementKind::Input => input(node),
        ElementKind::TextArea => node.form_value().map(Snapshot::TextArea).unwrap_or(Snapshot::Plain),
        ElementKind::Select => node.form_value().map(Snapshot::Select).unwrap_or(Snapshot::Plain),
        _ => Snapshot::Plain,
    }
}

fn canvas<N: LiveNode>(node: &N) -> Snapshot {
    node.canvas_data_url()
        .filter(|uri| !uri.is_empty() && uri != "data:,")
        .map(Snapshot::Bitmap)
        .unwrap_or(Snapshot::Plain)
}

fn video<N: LiveNode>(node: &N) -> Snapshot {
    if let Some(frame) = node.video_frame_data_url() {
        return Snapshot::Bitmap(frame);
    }
    node.attributes()
        .into_iter()
        .find(|(k, v)| k.eq_ignore_ascii_case("poster") && !v.is_empty())
        .map(|(_, poster)| Snapshot::Poster(poster))
        .unwrap_or(Snapshot::Plain)
}

fn input<N: LiveNode>(node: &N) -> Snapshot {
    let value = node.form_value();
    let checked = node.is_checked();
    if value.is_none() && checked.is_none() {
        return Snapshot::Plain;
    }
    Snapshot::Input { value, checked }
}

/// Turn canvases and videos with a bitmap into `<img>`.
///
/// Returns true when the element's live children must not be cloned.
pub(crate) fn replace_element(el: &mut ClonedElement, state: &Snapshot) -> bool {
    let src = match state {
        Snapshot::Bitmap(uri) | Snapshot::Poster(uri) => uri.clone(),
        _ => return false,
    };
    let keep: Vec<(String, String)> = el
        .attributes
        .iter()
        .filter(|(k, _)| matches!(k.to_ascii_lowercase().as_str(), "id" | "class" | "width" | "height"))
        .cloned()
        .collect();
    el.tag = "img".to_string();
    el.namespace = Namespace::Html;
    el.attributes = keep;
    el.children.clear();
    el.set_attr("src", src);
    true
}

/// Write captured form state into the clone.
pub(crate) fn apply_values(el: &mut ClonedElement, state: Snapshot) {
    match state {
        Snapshot::Input { value, checked } => {
            if let Some(value) = value {
                el.set_attr("value", value);
            }
            match checked {
                Some(true) => el.set_attr("checked", "checked"),
                Some(false) => el.remove_attr("checked"),
                None => {}
            }
        }
        Snapshot::TextArea(value) => {
            el.children = vec![ClonedNode::Text(value)];
        }
        Snapshot::Select(value) => select_option(el, &value),
        _ => {}
    }
}

fn select_option(el: &mut ClonedElement, value: &str) {
    let mut found = false;
    mark_options(el, value, &mut found);
}

fn mark_options(el: &mut ClonedElement, value: &str, found: &mut bool) {
    for child in el.element_children_mut() {
        if child.is("option") {
            let option_value = child
                .attr("value")
                .map(|v| v.to_string())
                .unwrap_or_else(|| child.text_content().trim().to_string());
            if !*found && option_value == value {
                child.set_attr("selected", "selected");
                *found = true;
            } else {
                child.remove_attr("selected");
            }
        } else if child.is("optgroup") {
            mark_options(child, value, found);
        }
    }
}
