use std::{
    fmt::Write as _,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;
use stepgauge_core::ChartDiffReport;
use tracing::{info, instrument};

/// Writes through a temp file in the target directory so a crash never
/// leaves a half-written report.
#[instrument(skip(bytes), fields(path = %path.display(), bytes = bytes.len()))]
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create directory: {}", parent.display()))?;

    let mut temp_file =
        tempfile::NamedTempFile::new_in(&parent).context("failed to create temp report file")?;
    temp_file
        .write_all(bytes)
        .context("failed to write temp report file")?;
    temp_file
        .persist(path)
        .map_err(|error| anyhow::anyhow!(error.error))
        .with_context(|| format!("failed to persist report: {}", path.display()))?;

    info!("report written");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("failed to encode report json")?;
    write_atomic(path, &json)
}

/// Human-readable diff report: the unified diff followed by a summary.
#[must_use]
pub fn render_diff_report(report: &ChartDiffReport) -> String {
    let mut text = String::from("=== CHART DATA COMPARISON ===\n\n");
    text.push_str("Only note rows, measure separators and terminators are compared.\n");
    text.push_str("Metadata and headers are ignored.\n\n");
    text.push_str("=== Differences ===\n\n");
    text.push_str(&report.unified_diff);
    text.push_str("\n=== Summary ===\n");
    let _ = writeln!(
        text,
        "Lines in chart a (level {}): {}",
        report.level_a, report.total_lines_a
    );
    let _ = writeln!(
        text,
        "Lines in chart b (level {}): {}",
        report.level_b, report.total_lines_b
    );
    let _ = writeln!(text, "Same lines: {}", report.same_line_count);
    let _ = writeln!(text, "Different lines: {}", report.different_line_count);
    let _ = writeln!(
        text,
        "Chart data similarity: {:.2}%",
        report.similarity_ratio * 100.0
    );
    text
}

/// `<report_dir>/<stem_a>_vs_<stem_b>.diff.txt`
#[must_use]
pub fn default_diff_path(report_dir: &Path, chart_a: &Path, chart_b: &Path) -> PathBuf {
    let stem = |path: &Path| {
        path.file_stem()
            .map_or_else(|| "chart".to_string(), |stem| stem.to_string_lossy().into_owned())
    };
    report_dir.join(format!("{}_vs_{}.diff.txt", stem(chart_a), stem(chart_b)))
}

/// JSON companion of a text report. A text path that already ends in
/// `.json` gets a second extension instead of being overwritten.
#[must_use]
pub fn json_report_path(text_path: &Path) -> PathBuf {
    let is_json = text_path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    if is_json {
        let mut name = text_path.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    } else {
        text_path.with_extension("json")
    }
}
