use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;
use stepgauge_core::{
    ChartDocument, DensitySample, DensitySummary, Judgment, ReplayAnalysis, ReplayComparison,
    analyze_replay_text, body_hash, compare_documents, compare_replays, compute_density,
    extract_chart_body, fingerprint_level,
    fixtures::{demo_chart_text, demo_replay_text, demo_variant_chart_text},
    parse_chart, render_section, set_subtitle, splice_section,
};
use tracing::{info, instrument, warn};

use crate::{
    Commands,
    config::AppConfig,
    input::read_text,
    report::{default_diff_path, json_report_path, render_diff_report, write_atomic, write_json},
};

pub const LEARNING_MODE_SUBTITLE: &str = "Learning Mode";
const LEARNING_MODE_SUFFIX: &str = "_LearnMode";

#[derive(Debug, Serialize)]
struct DensityOutput<'a> {
    level_index: usize,
    difficulty: &'a str,
    summary: DensitySummary,
    series: Vec<DensitySample>,
}

#[derive(Debug, Serialize)]
struct ReplayOutput<'a> {
    analysis: &'a ReplayAnalysis,
    comparison: Option<&'a ReplayComparison>,
}

pub fn run(command: Commands, config: &AppConfig, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Levels { chart } => levels(&chart, out),
        Commands::Density {
            chart,
            level,
            difficulty,
            json,
        } => density(&chart, level, difficulty.as_deref(), json, config, out),
        Commands::Replay {
            replay: path,
            compare,
            output,
        } => replay(&path, compare.as_deref(), output.as_deref(), out),
        Commands::Diff {
            chart_a,
            chart_b,
            level_a,
            level_b,
            output,
        } => diff(
            &chart_a,
            &chart_b,
            level_a.zip(level_b),
            output,
            config,
            out,
        ),
        Commands::Fingerprint { chart, level } => fingerprint(&chart, level, config, out),
        Commands::Learn {
            chart,
            response,
            level,
            output,
        } => learn(&chart, &response, level, output, config, out),
        Commands::Demo { output_dir } => demo(&output_dir, out),
    }
}

/// Level precedence: `--level`, `--difficulty`, configured index, configured
/// label. A label nobody carries falls back to level 0.
pub fn select_level(
    document: &ChartDocument,
    level: Option<usize>,
    difficulty: Option<&str>,
    config: &AppConfig,
) -> Result<usize> {
    document.require_sections()?;
    let configured = if difficulty.is_none() {
        config.analysis.level_index
    } else {
        None
    };
    if let Some(level) = level.or(configured) {
        document.section(level)?;
        return Ok(level);
    }

    let label = difficulty.unwrap_or(&config.analysis.target_difficulty);
    match document.find_by_difficulty(label) {
        Some(section) => Ok(section.meta.level_index),
        None => {
            warn!(label, "no level carries the difficulty label; using level 0");
            Ok(0)
        }
    }
}

fn load_chart(path: &Path) -> Result<(String, ChartDocument)> {
    let text = read_text(path)?;
    let document = parse_chart(&text);
    Ok((text, document))
}

#[instrument(skip(out), fields(chart = %chart.display()))]
fn levels(chart: &Path, out: &mut impl Write) -> Result<()> {
    let (_, document) = load_chart(chart)?;
    document.require_sections()?;

    writeln!(
        out,
        "{:>5}  {:<32} {:>6} {:>6} {:>6}",
        "level", "name", "rating", "rows", "notes"
    )?;
    for section in &document.sections {
        writeln!(
            out,
            "{:>5}  {:<32} {:>6} {:>6} {:>6}",
            section.meta.level_index,
            section.meta.display_name(),
            section.meta.rating,
            section.grid.row_count(),
            section.grid.lane_counts().iter().sum::<usize>()
        )?;
    }
    Ok(())
}

#[instrument(skip(config, out), fields(chart = %chart.display()))]
fn density(
    chart: &Path,
    level: Option<usize>,
    difficulty: Option<&str>,
    json: bool,
    config: &AppConfig,
    out: &mut impl Write,
) -> Result<()> {
    let (_, document) = load_chart(chart)?;
    let level = select_level(&document, level, difficulty, config)?;
    let section = document.section(level)?;
    let (series, summary) = compute_density(&document.tempo, &section.grid);

    if json {
        let output = DensityOutput {
            level_index: level,
            difficulty: &section.meta.difficulty,
            summary,
            series: series.dense(),
        };
        serde_json::to_writer_pretty(&mut *out, &output)
            .context("failed to encode density json")?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "Level {level}: {}", section.meta.display_name())?;
    writeln!(out, "Total notes: {}", summary.total_notes)?;
    writeln!(out, "Duration (s): {:.1}", summary.duration_seconds)?;
    writeln!(out, "Mean NPS: {:.2}", summary.mean_nps)?;
    writeln!(out, "Peak NPS: {}", summary.peak_nps)?;
    writeln!(out, "Stdev NPS: {:.2}", summary.stdev_nps)?;
    Ok(())
}

fn print_replay(out: &mut impl Write, analysis: &ReplayAnalysis) -> Result<()> {
    writeln!(out, "Events: {}", analysis.total_events)?;
    writeln!(out, "Mean offset (s): {:+.4}", analysis.mean_offset)?;
    writeln!(out, "Offset stdev (s): {:.4}", analysis.stdev_offset)?;
    writeln!(out, "Accuracy (W1+W2): {:.2}%", analysis.accuracy_percent)?;
    for judgment in Judgment::ALL {
        writeln!(out, "  {:<14} {:>5}", judgment.label(), analysis.count(judgment))?;
    }
    for stat in &analysis.lane_judgments {
        writeln!(
            out,
            "  {:<6} {:<14} {:>5}/{:<5} {:>6.2}%",
            stat.lane_name,
            stat.judgment.label(),
            stat.count,
            stat.total,
            stat.percentage
        )?;
    }
    Ok(())
}

#[instrument(skip(out), fields(replay = %replay.display()))]
fn replay(
    replay: &Path,
    compare: Option<&Path>,
    output: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    let before = analyze_replay_text(&read_text(replay)?)
        .with_context(|| format!("failed to analyze {}", replay.display()))?;
    print_replay(out, &before)?;

    let comparison = match compare {
        Some(other) => {
            let after = analyze_replay_text(&read_text(other)?)
                .with_context(|| format!("failed to analyze {}", other.display()))?;
            writeln!(out, "--- compared with {}", other.display())?;
            print_replay(out, &after)?;

            let comparison = compare_replays(&before, &after);
            writeln!(
                out,
                "Accuracy: {:+.2} points ({:?})",
                comparison.accuracy_delta, comparison.accuracy_trend
            )?;
            writeln!(
                out,
                "Offset stdev: {:+.4} s ({:?})",
                comparison.stdev_delta, comparison.consistency_trend
            )?;
            writeln!(
                out,
                "Mean offset: {:+.4} s ({})",
                comparison.mean_offset_delta,
                if comparison.timing_consistent {
                    "consistent"
                } else {
                    "shifted"
                }
            )?;
            Some(comparison)
        }
        None => None,
    };

    if let Some(output) = output {
        write_json(
            output,
            &ReplayOutput {
                analysis: &before,
                comparison: comparison.as_ref(),
            },
        )?;
        writeln!(out, "Report: {}", output.display())?;
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[instrument(skip(config, out), fields(chart_a = %chart_a.display(), chart_b = %chart_b.display()))]
fn diff(
    chart_a: &Path,
    chart_b: &Path,
    explicit: Option<(usize, usize)>,
    output: Option<PathBuf>,
    config: &AppConfig,
    out: &mut impl Write,
) -> Result<()> {
    let (_, doc_a) = load_chart(chart_a)?;
    let (_, doc_b) = load_chart(chart_b)?;
    doc_a.require_sections()?;
    doc_b.require_sections()?;

    let explicit = explicit.or_else(|| config.analysis.level_index.map(|level| (level, level)));
    let (selection, report) = compare_documents(
        &doc_a,
        &display_name(chart_a),
        &doc_b,
        &display_name(chart_b),
        explicit,
        &config.analysis.target_difficulty,
    )?;

    let text_path =
        output.unwrap_or_else(|| default_diff_path(&config.paths.report_dir, chart_a, chart_b));
    write_atomic(&text_path, render_diff_report(&report).as_bytes())?;
    let json_path = json_report_path(&text_path);
    write_json(&json_path, &report)?;

    let identical_bodies = body_hash(&doc_a.sections[selection.level_a].grid)
        == body_hash(&doc_b.sections[selection.level_b].grid);
    writeln!(
        out,
        "Levels: {} vs {} ({:?})",
        selection.level_a, selection.level_b, selection.how
    )?;
    writeln!(
        out,
        "Same lines: {}, different lines: {}",
        report.same_line_count, report.different_line_count
    )?;
    writeln!(out, "Similarity: {:.2}%", report.similarity_ratio * 100.0)?;
    if identical_bodies {
        writeln!(out, "Note data is identical")?;
    }
    writeln!(out, "Report: {}", text_path.display())?;
    Ok(())
}

#[instrument(skip(config, out), fields(chart = %chart.display()))]
fn fingerprint(
    chart: &Path,
    level: Option<usize>,
    config: &AppConfig,
    out: &mut impl Write,
) -> Result<()> {
    let (_, document) = load_chart(chart)?;
    let level = select_level(&document, level, None, config)?;
    let fingerprint = fingerprint_level(&document, level)?;
    serde_json::to_writer_pretty(&mut *out, &fingerprint)
        .context("failed to encode fingerprint json")?;
    writeln!(out)?;
    Ok(())
}

/// `<dir>/<stem>_LearnMode.<ext>` next to the source chart.
#[must_use]
pub fn learn_mode_path(chart: &Path) -> PathBuf {
    let stem = chart
        .file_stem()
        .map_or_else(|| "chart".to_string(), |stem| stem.to_string_lossy().into_owned());
    let extension = chart
        .extension()
        .map_or_else(|| "sm".to_string(), |ext| ext.to_string_lossy().into_owned());
    chart.with_file_name(format!("{stem}{LEARNING_MODE_SUFFIX}.{extension}"))
}

#[instrument(skip(config, out), fields(chart = %chart.display(), response = %response.display()))]
fn learn(
    chart: &Path,
    response: &Path,
    level: Option<usize>,
    output: Option<PathBuf>,
    config: &AppConfig,
    out: &mut impl Write,
) -> Result<()> {
    let (source, document) = load_chart(chart)?;
    let level = select_level(&document, level, None, config)?;
    let section = document.section(level)?;

    let response_text = read_text(response)?;
    let grid = extract_chart_body(&response_text).with_context(|| {
        format!("no chart body found in {}", response.display())
    })?;

    let rendered = render_section(&section.meta, &grid);
    let spliced = splice_section(&source, section, &rendered)?;
    let updated = set_subtitle(&spliced, LEARNING_MODE_SUBTITLE);

    let target = output.unwrap_or_else(|| learn_mode_path(chart));
    write_atomic(&target, updated.as_bytes())?;
    info!(
        level,
        rows = grid.row_count(),
        target = %target.display(),
        "learning chart written"
    );
    writeln!(
        out,
        "Level {level} replaced with {} rows in {} measures: {}",
        grid.row_count(),
        grid.measure_count(),
        target.display()
    )?;
    Ok(())
}

#[instrument(skip(out), fields(output_dir = %output_dir.display()))]
fn demo(output_dir: &Path, out: &mut impl Write) -> Result<()> {
    let files = [
        ("demo.sm", demo_chart_text()),
        ("demo_LearnMode.sm", demo_variant_chart_text()),
        ("demo.replay.txt", demo_replay_text()),
    ];
    for (name, content) in files {
        let path = output_dir.join(name);
        write_atomic(&path, content.as_bytes())?;
        writeln!(out, "{}", path.display())?;
    }
    Ok(())
}
