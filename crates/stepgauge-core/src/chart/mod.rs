mod extract;
mod model;
mod parser;
mod render;

pub use extract::extract_chart_body;
pub use model::{
    BEATS_PER_MEASURE, BpmBreakpoint, ChartDocument, ChartHeader, ChartSection, DEFAULT_BPM,
    DifficultyMeta, LANE_COUNT, METADATA_FIELD_COUNT, MIN_METADATA_FIELDS, Measure, NoteGrid,
    NoteSymbol, Row, TempoTimeline,
};
pub use parser::{
    BodyLine, SECTION_MARKER, classify_line, parse_body, parse_chart, parse_header, parse_tempo,
};
pub use render::{render_section, set_subtitle, splice_section};
