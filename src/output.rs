//! Rendering of snapshot sets for the command line.

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::query::{QuerySnapshot, QueryStatus, SnapshotSet};
use std::fmt::Write;

/// Maximum characters of SQL shown per row in text output.
const SQL_PREVIEW_CHARS: usize = 40;

/// Renders a snapshot set in the requested format, without a trailing newline.
pub fn render(set: &SnapshotSet, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(set)),
        OutputFormat::Json => set.to_json(),
    }
}

/// Renders a snapshot set as a small table, one query per line, with the
/// outcome of finished queries on an indented line below.
pub fn render_text(set: &SnapshotSet) -> String {
    let mut out = format!(
        "tick {} at {} ({} running)",
        set.tick,
        set.taken_at.format("%H:%M:%S"),
        set.count(QueryStatus::Running)
    );
    for query in &set.queries {
        let _ = write!(
            out,
            "\n{:>6}  {:<8}  {:>9}  {}  {}",
            query.id.to_string(),
            query.status.as_str(),
            format_duration(query),
            query.target,
            preview(&query.sql)
        );
        if let Some(detail) = query.results.as_ref().or(query.error.as_ref()) {
            let _ = write!(out, "\n        {detail}");
        }
    }
    out
}

fn format_duration(query: &QuerySnapshot) -> String {
    format!("{:.3}s", query.duration.as_secs_f64())
}

fn preview(sql: &str) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SQL_PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(SQL_PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    }
}
