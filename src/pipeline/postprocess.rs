//! Post-processing: deterministic cleanup of recognised text and LLM replies.
//!
//! OCR engines emit form feeds, CRLF line endings, zero-width characters and
//! runs of blank lines; none of that helps the invoice structurer. LLMs asked
//! for JSON sometimes wrap it in a ```` ```json ```` fence or add a sentence of
//! prose around it. Each rule here is a small pure `&str → String` pass.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise one page (or HTML document) of recognised text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF) and drop form feeds
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive newlines down to one blank line
/// 5. Trim leading/trailing whitespace of the whole text
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Collapse every whitespace run to one space. Used for HTML text, where
/// source indentation carries no meaning.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Recover the JSON object from an LLM reply.
///
/// Accepts a bare object, an object inside a Markdown code fence, or an object
/// surrounded by prose. Returns `None` when no `{ … }` span exists.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let body = RE_JSON_FENCE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply);

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\x0c', "\n")
}

// ── Rule 2: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
            )
        })
        .collect()
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse blank lines ─────────────────────────────────────────────

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

// ── JSON fence ───────────────────────────────────────────────────────────────

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n(.*?)\n\s*```").unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_normalises_ocr_output() {
        let raw = "INVOICE\r\n\r\n\r\n\r\nNo. 42   \x0cTotal\u{200B}: 10\n\n";
        assert_eq!(clean_text(raw), "INVOICE\n\nNo. 42\nTotal: 10");
    }

    #[test]
    fn clean_text_of_blank_page_is_empty() {
        assert_eq!(clean_text(" \n\x0c\n  "), "");
    }

    #[test]
    fn collapse_whitespace_joins_runs() {
        assert_eq!(collapse_whitespace("  Hello \n\t world  "), "Hello world");
    }

    #[test]
    fn json_bare_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn json_inside_fence() {
        let reply = "Here you go:\n```json\n{\"a\": {\"b\": 2}}\n```\nAnything else?";
        assert_eq!(extract_json_object(reply), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn json_surrounded_by_prose() {
        let reply = "[INST] ... [/INST] Sure! {\"invoice_number\": \"7\"} Hope this helps.";
        assert_eq!(
            extract_json_object(reply),
            Some("{\"invoice_number\": \"7\"}")
        );
    }

    #[test]
    fn json_missing() {
        assert_eq!(extract_json_object("I could not find an invoice."), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
