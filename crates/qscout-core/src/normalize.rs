//! Answer text normalization (markup stripping, whitespace collapsing).

use regex::Regex;

use crate::document::{Element, Node, ATTR_ENCODING, TEX_ENCODING};

/// Collapse whitespace runs to single spaces and trim the ends.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a raw text/markup string into a canonical display string.
///
/// Strips any tags, collapses whitespace and trims. Empty input yields an
/// empty string; this never fails.
pub fn normalize_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let tag_re = Regex::new(r"<[^>]*>").expect("valid regex");
    let stripped = tag_re.replace_all(raw, " ");
    collapse_whitespace(&stripped)
}

/// Normalize an element's content into a canonical display string.
///
/// Prefers a machine-readable annotation (a descendant carrying the TeX
/// encoding attribute, as left behind by formula renderers) over the visible
/// text, which for rendered math duplicates every symbol.
pub fn normalize_element(el: &Element) -> String {
    if let Some(annotation) = el.find(&|e| e.attr(ATTR_ENCODING) == Some(TEX_ENCODING)) {
        return collapse_whitespace(&visible_text(annotation));
    }
    collapse_whitespace(&visible_text(el))
}

fn visible_text(el: &Element) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text { text } => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(e) => collect_text(e, out),
        }
    }
}
