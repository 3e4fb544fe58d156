use serde_json::{json, Map, Value};

use super::ReportEntry;
use crate::utils;

pub fn render_plain(base_url: &str, entries: &[ReportEntry]) -> Vec<u8> {
    let mut out = String::new();
    for e in entries {
        out.push_str(base_url);
        out.push_str(e.path.trim_start_matches('/'));
        out.push('\n');
    }
    out.into_bytes()
}

/// `{ "<base_url>": [[status, "path"], ...] }`
pub fn render_json(base_url: &str, entries: &[ReportEntry]) -> Result<Vec<u8>, serde_json::Error> {
    let rows: Vec<Value> = entries.iter().map(|e| json!([e.status, e.path])).collect();
    let mut root = Map::new();
    root.insert(base_url.to_string(), Value::Array(rows));
    let mut out = serde_json::to_vec_pretty(&Value::Object(root))?;
    out.push(b'\n');
    Ok(out)
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn json_for_script_tag(value: &str) -> String {
    value.replace("</", "<\\/")
}

fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "ok",
        300..=399 => "redirect",
        400..=499 => "client",
        _ => "server",
    }
}

pub fn render_html(base_url: &str, entries: &[ReportEntry]) -> Vec<u8> {
    let json = serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string());
    let json = json_for_script_tag(&json);

    let mut rows = String::new();
    for e in entries {
        let url = format!("{}{}", base_url, e.path.trim_start_matches('/'));
        let size = e
            .content_length
            .map(utils::human_size)
            .unwrap_or_else(|| "-".to_string());
        rows.push_str(&format!(
            "      <tr class=\"{cls}\"><td>{status}</td><td>{size}</td><td><a href=\"{url}\">{url}</a></td></tr>\n",
            cls = status_class(e.status),
            status = e.status,
            size = escape_html(&size),
            url = escape_html(&url),
        ));
    }

    let html = format!(
        r####"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <title>dirsweep report: {title}</title>
  <style>
    body {{ font-family: sans-serif; margin: 2rem; background: #f8fafc; color: #0f172a; }}
    table {{ border-collapse: collapse; width: 100%; }}
    th, td {{ text-align: left; padding: 0.4rem 0.8rem; border-bottom: 1px solid #e2e8f0; }}
    tr.ok td:first-child {{ color: #15803d; }}
    tr.redirect td:first-child {{ color: #0e7490; }}
    tr.client td:first-child {{ color: #b45309; }}
    tr.server td:first-child {{ color: #b91c1c; }}
  </style>
</head>
<body>
  <script type="application/json" id="records-data">{json}</script>
  <h1>{title}</h1>
  <p>{count} paths found</p>
  <table>
    <thead><tr><th>Status</th><th>Size</th><th>URL</th></tr></thead>
    <tbody>
{rows}    </tbody>
  </table>
</body>
</html>
"####,
        title = escape_html(base_url),
        count = entries.len(),
    );

    html.into_bytes()
}
