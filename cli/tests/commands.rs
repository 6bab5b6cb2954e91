use std::{fs, path::Path};

use stepgauge_cli::{
    AppConfig, Commands,
    commands::{learn_mode_path, run},
};
use stepgauge_core::{ChartDiffReport, ReplayAnalysis, parse_chart};

fn run_to_string(command: Commands, config: &AppConfig) -> String {
    let mut out = Vec::new();
    run(command, config, &mut out).expect("command should succeed");
    String::from_utf8(out).expect("command output should be utf-8")
}

fn write_demo(dir: &Path, config: &AppConfig) {
    run_to_string(
        Commands::Demo {
            output_dir: dir.to_path_buf(),
        },
        config,
    );
}

fn config_in(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.paths.report_dir = dir.join("reports");
    config
}

#[test]
fn levels_lists_every_section() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let config = config_in(temp.path());
    write_demo(temp.path(), &config);

    let output = run_to_string(
        Commands::Levels {
            chart: temp.path().join("demo.sm"),
        },
        &config,
    );
    assert!(output.contains("Beginner (fixture)"));
    assert!(output.contains("Medium (fixture)"));
    assert_eq!(output.lines().count(), 3);
}

#[test]
fn density_defaults_to_the_configured_label() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let config = config_in(temp.path());
    write_demo(temp.path(), &config);

    let output = run_to_string(
        Commands::Density {
            chart: temp.path().join("demo.sm"),
            level: None,
            difficulty: None,
            json: false,
        },
        &config,
    );
    assert!(output.starts_with("Level 0: Beginner (fixture)\n"));
    assert!(output.contains("Total notes: 8\n"));
    assert!(output.contains("Duration (s): 4.8\n"));
}

#[test]
fn density_json_includes_the_dense_series() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let config = config_in(temp.path());
    write_demo(temp.path(), &config);

    let output = run_to_string(
        Commands::Density {
            chart: temp.path().join("demo.sm"),
            level: Some(1),
            difficulty: None,
            json: true,
        },
        &config,
    );
    let value: serde_json::Value = serde_json::from_str(&output).expect("output should be json");
    assert_eq!(value["level_index"], 1);
    assert_eq!(value["summary"]["total_notes"], 19);
    assert!(value["series"].as_array().is_some_and(|series| !series.is_empty()));
}

#[test]
fn diff_writes_text_and_json_reports() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let config = config_in(temp.path());
    write_demo(temp.path(), &config);

    let output = run_to_string(
        Commands::Diff {
            chart_a: temp.path().join("demo.sm"),
            chart_b: temp.path().join("demo_LearnMode.sm"),
            level_a: None,
            level_b: None,
            output: None,
        },
        &config,
    );
    assert!(output.contains("Levels: 0 vs 0 (Label)"));
    assert!(output.contains("Similarity: 93.33%"));

    let text_path = temp.path().join("reports/demo_vs_demo_LearnMode.diff.txt");
    let text = fs::read_to_string(&text_path).expect("text report should exist");
    assert!(text.contains("+0011\n"));

    let json = fs::read_to_string(text_path.with_extension("json")).expect("json report should exist");
    let report: ChartDiffReport = serde_json::from_str(&json).expect("json report should parse");
    assert_eq!(report.different_line_count, 1);
}

#[test]
fn json_named_diff_output_keeps_both_reports() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let config = config_in(temp.path());
    write_demo(temp.path(), &config);

    let text_path = temp.path().join("report.json");
    run_to_string(
        Commands::Diff {
            chart_a: temp.path().join("demo.sm"),
            chart_b: temp.path().join("demo_LearnMode.sm"),
            level_a: None,
            level_b: None,
            output: Some(text_path.clone()),
        },
        &config,
    );

    let text = fs::read_to_string(&text_path).expect("text report should exist");
    assert!(text.starts_with("=== CHART DATA COMPARISON ==="));
    let json = fs::read_to_string(temp.path().join("report.json.json"))
        .expect("json report should exist");
    let report: ChartDiffReport = serde_json::from_str(&json).expect("json report should parse");
    assert_eq!(report.same_line_count, 14);
}

#[test]
fn replay_report_round_trips_through_json() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let config = config_in(temp.path());
    write_demo(temp.path(), &config);
    let report_path = temp.path().join("reports/replay.json");

    let output = run_to_string(
        Commands::Replay {
            replay: temp.path().join("demo.replay.txt"),
            compare: Some(temp.path().join("demo.replay.txt")),
            output: Some(report_path.clone()),
        },
        &config,
    );
    assert!(output.contains("Accuracy (W1+W2): 37.50%"));
    assert!(output.contains("(Unchanged)"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("report should exist"))
            .expect("report should be json");
    let analysis: ReplayAnalysis =
        serde_json::from_value(json["analysis"].clone()).expect("analysis should deserialize");
    assert_eq!(analysis.total_events, 8);
    assert_eq!(json["comparison"]["timing_consistent"], true);
}

#[test]
fn learn_splices_a_recovered_body_into_a_copy() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let config = config_in(temp.path());
    write_demo(temp.path(), &config);

    let response_path = temp.path().join("response.txt");
    let mut response = String::from("Here you go:\n```\n");
    for _ in 0..3 {
        response.push_str("1000\n0000\n0100\n0000\n,\n");
    }
    response.push_str(";\n```\n");
    fs::write(&response_path, response).expect("response should be writable");

    let chart = temp.path().join("demo.sm");
    run_to_string(
        Commands::Learn {
            chart: chart.clone(),
            response: response_path,
            level: None,
            output: None,
        },
        &config,
    );

    let target = learn_mode_path(&chart);
    assert_eq!(target, temp.path().join("demo_LearnMode.sm"));
    let document = parse_chart(&fs::read_to_string(&target).expect("learning chart should exist"));
    assert_eq!(document.header.subtitle, "Learning Mode");
    assert_eq!(document.sections.len(), 2);
    assert_eq!(document.sections[0].grid.row_count(), 12);
    assert_eq!(document.sections[0].grid.lane_counts(), [3, 3, 0, 0]);
}

#[test]
fn out_of_range_level_is_an_error() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let config = config_in(temp.path());
    write_demo(temp.path(), &config);

    let mut out = Vec::new();
    let error = run(
        Commands::Fingerprint {
            chart: temp.path().join("demo.sm"),
            level: Some(4),
        },
        &config,
        &mut out,
    )
    .expect_err("level 4 does not exist");
    assert!(error.to_string().contains("level 4 not found"));
}
