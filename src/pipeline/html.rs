//! HTML text extraction: every text node in document order, space-joined.
//!
//! Markup, attributes and comments are dropped. Script and style bodies are
//! text nodes to an HTML parser but never visible text, so they are skipped.
//! Malformed markup is recovered by the html5ever parser rather than rejected.

use crate::error::ExtractError;
use crate::pipeline::postprocess::collapse_whitespace;
use scraper::{Html, Node};
use tracing::debug;

/// Concatenate all visible text nodes of `bytes`, separated by single spaces.
///
/// Invalid UTF-8 is replaced rather than rejected. A document without
/// visible text, including an empty one, yields `""`.
pub fn extract_text_from_html(bytes: &[u8]) -> Result<String, ExtractError> {
    let source = String::from_utf8_lossy(bytes);
    let document = Html::parse_document(&source);

    let mut pieces: Vec<String> = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element())
            .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"));
        if hidden {
            continue;
        }
        let text = collapse_whitespace(text);
        if !text.is_empty() {
            pieces.push(text);
        }
    }

    let text = pieces.join(" ");
    debug!("HTML: {} text node(s) → {} chars", pieces.len(), text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_nodes_are_space_joined_in_order() {
        let html = b"<html><body><h1>Invoice</h1><p>No. <b>42</b></p><p>Total: 10</p></body></html>";
        assert_eq!(
            extract_text_from_html(html).unwrap(),
            "Invoice No. 42 Total: 10"
        );
    }

    #[test]
    fn scripts_styles_and_comments_are_dropped() {
        let html = br#"<html><head><title>T</title><style>p{color:red}</style>
            <script>var x = 1;</script></head>
            <body><!-- hidden --><p class="a">Visible</p></body></html>"#;
        assert_eq!(extract_text_from_html(html).unwrap(), "T Visible");
    }

    #[test]
    fn malformed_markup_is_recovered() {
        let html = b"<p>one<p>two <div>three";
        assert_eq!(extract_text_from_html(html).unwrap(), "one two three");
    }

    #[test]
    fn markup_without_text_yields_empty_string() {
        assert_eq!(extract_text_from_html(b"<html><body></body></html>").unwrap(), "");
    }

    #[test]
    fn empty_or_blank_input_yields_empty_string() {
        assert_eq!(extract_text_from_html(b"").unwrap(), "");
        assert_eq!(extract_text_from_html(b"  \n").unwrap(), "");
    }
}
