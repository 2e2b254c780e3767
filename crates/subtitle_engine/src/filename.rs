const MAX_STEM_CHARS: usize = 120;

/// Output name for a converted file: `{stem}.{converter}.{ext}`.
///
/// `ep01.ass` converted with `Taiwan` becomes `ep01.Taiwan.ass`. Characters
/// that are invalid in Windows filenames are replaced, and reserved device
/// names are escaped.
pub fn converted_filename(original: &str, converter: &str) -> String {
    let (stem, extension) = split_extension(original);
    let stem = sanitize(stem, "subtitle");
    let tag = sanitize(converter, "converted");
    match extension {
        Some(ext) => format!("{stem}.{tag}.{}", sanitize(ext, "txt")),
        None => format!("{stem}.{tag}"),
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn sanitize(input: &str, fallback: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }

    let trimmed = compacted.trim_matches(&['_', ' ', '.'][..]);
    let mut cleaned: String = trimmed.chars().take(MAX_STEM_CHARS).collect();
    if cleaned.is_empty() {
        cleaned = fallback.to_string();
    }
    if is_reserved_windows_name(&cleaned) {
        cleaned.push('_');
    }
    cleaned
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
