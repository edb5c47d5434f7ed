//! Deterministic cleanup of LLM output.
//!
//! Even well-prompted models occasionally wrap their answer in code fences,
//! emit Windows line endings or sprinkle zero-width characters. These rules
//! fix such quirks without touching content.
//!
//! Two entry points:
//! - [`clean_text`] for recognised page text
//! - [`clean_html`] for generated notes

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean recognised text from one page.
///
/// 1. Strip outer fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode
/// 6. Trim leading and trailing blank lines
pub fn clean_text(input: &str) -> String {
    let s = strip_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

/// Clean a generated notes fragment.
///
/// Strips fences and any `<html>`/`<body>` wrapper the model added despite
/// the prompt, then normalises whitespace the same way as [`clean_text`].
pub fn clean_html(input: &str) -> String {
    let s = strip_fences(input);
    let s = unwrap_body(&s);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Fences ───────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|html|text|plaintext)?[ \t]*\r?\n(.*)\r?\n```\s*$")
        .expect("valid regex")
});

fn strip_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Document wrapper ─────────────────────────────────────────────────────

static RE_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").expect("valid regex"));

fn unwrap_body(input: &str) -> String {
    match RE_BODY.captures(input) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Whitespace ───────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
