//! Markdown flattening for narration input.
//!
//! Posts arrive as markdown; speech drivers want plain prose. The
//! flattener works line by line, keeps the original line order, and joins
//! the surviving lines with single spaces. It never fails: any input,
//! including the empty string, produces a (possibly empty) string.

/// Flatten markdown-flavored text into a single narration string.
///
/// Per line: surrounding whitespace is trimmed; empty lines and fenced
/// code delimiters are dropped; a leading run of `#` header markers is
/// stripped; `**` and `*` emphasis markers are removed; inline
/// `[text](url)` links are reduced to their link text. Malformed link
/// syntax is left in place untouched.
#[must_use]
pub fn normalize(input: &str) -> String {
    let mut kept = Vec::new();
    for raw in input.lines() {
        let mut line = raw.trim().to_string();
        if line.is_empty() || line.starts_with("```") {
            continue;
        }
        if line.starts_with('#') {
            line = line.trim_start_matches('#').trim().to_string();
        }
        line = line.replace("**", "").replace('*', "");
        line = resolve_links(&line);
        if !line.is_empty() {
            kept.push(line);
        }
    }
    kept.join(" ")
}

/// Count the whitespace-delimited words in a narration string.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Repeatedly replace the first `[text](url)` span with `text`.
///
/// Scans for the first `[`, the first `]` after it, and the first `)`
/// after that. If any of the three is missing the line is returned as-is,
/// raw brackets included.
fn resolve_links(line: &str) -> String {
    let mut line = line.to_string();
    loop {
        let Some(start) = line.find('[') else {
            break;
        };
        let Some(middle) = line[start..].find(']').map(|i| start + i) else {
            break;
        };
        let Some(end) = line[middle..].find(')').map(|i| middle + i) else {
            break;
        };
        let text = line[start + 1..middle].to_string();
        line = format!("{}{}{}", &line[..start], text, &line[end + 1..]);
    }
    line
}
