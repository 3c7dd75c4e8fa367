/// Tidy raw model output into the idea text. Returns `None` when nothing
/// usable is left.
///
/// The completion is kept whole. Only a lead-in line ending in `:` is dropped,
/// and a bullet or a quote pair is removed when it wraps the entire answer.
pub fn clean_generated_text(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let body = match lines.split_first() {
        Some((first, rest)) if first.ends_with(':') && !rest.is_empty() => rest,
        _ => &lines[..],
    };
    let text = match body {
        [] => return None,
        [single] => unquote(strip_list_marker(single)),
        many => unquote(&many.join("\n")),
    };
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn strip_list_marker(line: &str) -> &str {
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    line
}

fn unquote(line: &str) -> String {
    // JSON string literal, possibly with escapes
    if line.len() >= 2 && line.starts_with('"') && line.ends_with('"') {
        if let Ok(s) = serde_json::from_str::<String>(line) {
            return s;
        }
    }

    const PAIRS: [(char, char); 4] = [('"', '"'), ('«', '»'), ('“', '”'), ('\'', '\'')];
    for (open, close) in PAIRS {
        if let Some(inner) = line
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    line.to_string()
}
