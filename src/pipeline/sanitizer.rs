// src/pipeline/sanitizer.rs

use std::sync::LazyLock;

use regex::Regex;

/// Any run of commas (and the whitespace between them) right before a closer.
static TRAILING_COMMAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:,\s*)+([}\]])").expect("static regex"));

/// Best-effort repair of raw model output into something a strict JSON
/// parser can accept.
///
/// Steps: trim, cut down to the outermost `{...}` span, drop ASCII control
/// characters, drop trailing commas before `}`/`]`. Never fails; when no
/// object span exists the cleaned input is returned and parsing is left to
/// fail downstream. The transform is idempotent.
pub fn sanitize(raw: &str) -> String {
    let trimmed = raw.trim();

    let span = match object_span(trimmed) {
        Some((start, end)) => &trimmed[start..end],
        None => trimmed,
    };

    let without_controls: String = span.chars().filter(|c| !is_ascii_control(*c)).collect();
    let repaired = TRAILING_COMMAS.replace_all(&without_controls, "$1");

    repaired.trim().to_string()
}

fn is_ascii_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{1F}' | '\u{7F}')
}

/// Byte range of the first `{` through its matching `}`.
///
/// Braces inside JSON string literals are ignored, as are control characters
/// (they are stripped afterwards and must not influence the match). If the
/// first object never closes, the span runs greedily to the last `}`.
fn object_span(text: &str) -> Option<(usize, usize)> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if is_ascii_control(c) {
            continue;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + offset + 1));
                }
            }
            _ => {}
        }
    }

    let last_close = text.rfind('}')?;
    (last_close > start).then_some((start, last_close + 1))
}
