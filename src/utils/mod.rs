use std::collections::HashSet;

/// Placeholder replaced by every configured extension in wordlist lines.
pub const EXT_PLACEHOLDER: &str = "%EXT%";

pub fn parse_http_method(value: &str) -> Result<reqwest::Method, String> {
    let item = value.trim();
    if item.is_empty() {
        return Err("method is empty".to_string());
    }
    let canonical = item.to_ascii_uppercase();
    reqwest::Method::from_bytes(canonical.as_bytes()).map_err(|_| format!("invalid method '{item}'"))
}

pub fn parse_extensions_csv(value: &str) -> Result<Vec<String>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("extensions list is empty".to_string());
    }
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let cleaned = item.trim_start_matches('.');
        if cleaned.is_empty() {
            continue;
        }
        let key = cleaned.to_ascii_lowercase();
        if seen.insert(key) {
            out.push(cleaned.to_string());
        }
    }
    if out.is_empty() {
        return Err("extensions list is empty".to_string());
    }
    Ok(out)
}

/// Splits a comma separated list, dropping empty items. Order is kept.
pub fn parse_list_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn parse_u16_set_csv(value: &str) -> Result<HashSet<u16>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("list is empty".to_string());
    }
    let mut out = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let code: u16 = item
            .parse()
            .map_err(|_| format!("invalid status code '{item}'"))?;
        out.insert(code);
    }
    if out.is_empty() {
        return Err("list is empty".to_string());
    }
    Ok(out)
}

/// Parses a `Key: Value` header line.
pub fn parse_header(value: &str) -> Result<(String, String), String> {
    let (key, val) = value
        .split_once(':')
        .ok_or_else(|| format!("invalid header '{value}', expected 'Key: Value'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid header '{value}', empty name"));
    }
    Ok((key.to_string(), val.trim().to_string()))
}

/// Expands wordlist lines into request paths.
///
/// Lines holding `%EXT%` produce one entry per extension, in extension order.
/// With `force_extensions` every other word that does not look like a
/// directory also gets a `word.ext` variant after the bare word.
pub fn apply_wordlist_extensions(
    words: Vec<String>,
    extensions: &[String],
    force_extensions: bool,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(words.len());
    for word in words {
        if word.contains(EXT_PLACEHOLDER) {
            for ext in extensions {
                out.push(word.replace(EXT_PLACEHOLDER, ext));
            }
            continue;
        }
        let is_dir = word.ends_with('/');
        out.push(word.clone());
        if force_extensions && !is_dir {
            for ext in extensions {
                out.push(format!("{word}.{ext}"));
            }
        }
    }
    out
}

/// Formats a byte count the way the console finding line shows it.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{}{}", value.round() as u64, UNITS[unit])
    }
}
