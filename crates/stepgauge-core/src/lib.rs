pub mod chart;
pub mod density;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod fixtures;
pub mod replay;
pub mod time;

pub use chart::{
    BodyLine, BpmBreakpoint, ChartDocument, ChartHeader, ChartSection, DifficultyMeta, LANE_COUNT,
    Measure, NoteGrid, NoteSymbol, Row, SECTION_MARKER, TempoTimeline, classify_line,
    extract_chart_body, parse_body, parse_chart, render_section, set_subtitle, splice_section,
};
pub use density::{DensitySample, DensitySeries, DensitySummary, compute_density, summarize};
pub use diagnostics::{TelemetryGuard, init_tracing, init_tracing_with_options};
pub use diff::{
    ChartDiffReport, LevelMatch, LevelSelection, compare, compare_documents, compare_lines,
    resolve_levels,
};
pub use error::StepgaugeError;
pub use fingerprint::{ChartFingerprint, body_hash, fingerprint_level, fingerprint_section};
pub use replay::{
    Judgment, ReplayAnalysis, ReplayComparison, ReplayEvent, Trend, analyze_replay,
    analyze_replay_text, classify_judgment, compare_replays, lane_name, parse_replay,
};
pub use time::{TempoCursor, beats_to_seconds};
