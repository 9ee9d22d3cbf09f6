//! Raw document dumps for offline diagnosis of rejected or unexpected pages.

use std::path::{Path, PathBuf};

/// Runs of characters outside `[A-Za-z0-9_-]` collapse to one `_`; edge
/// underscores are dropped.
fn sanitize_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

pub fn dump_file_name(prefix: &str, at: chrono::NaiveDateTime) -> String {
    let prefix = sanitize_prefix(prefix);
    let prefix = if prefix.is_empty() { "dump" } else { prefix.as_str() };
    format!("{}_{}.html", prefix, at.format("%Y%m%d-%H%M%S"))
}

/// Writes `html` to `<dir>/<prefix>_<YYYYmmdd-HHMMSS>.html`.
pub fn dump_html(dir: &Path, prefix: &str, html: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(dump_file_name(prefix, chrono::Local::now().naive_local()));
    std::fs::write(&path, html)?;
    Ok(path)
}

/// Like [`dump_html`], but failures are logged and swallowed.
pub fn dump_best_effort(dir: Option<&Path>, prefix: &str, html: &str) -> Option<PathBuf> {
    let dir = dir?;
    match dump_html(dir, prefix, html) {
        Ok(path) => {
            tracing::info!(event = "diagnostics_dumped", path = %path.display(), bytes = html.len());
            Some(path)
        }
        Err(e) => {
            tracing::warn!(event = "diagnostics_dump_failed", dir = %dir.display(), error = %e);
            None
        }
    }
}
