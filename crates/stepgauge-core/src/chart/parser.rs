use std::mem;

use tracing::{debug, instrument, trace, warn};

use super::model::{
    BpmBreakpoint, ChartDocument, ChartHeader, ChartSection, DifficultyMeta, MIN_METADATA_FIELDS,
    METADATA_FIELD_COUNT, Measure, NoteGrid, Row, TempoTimeline,
};

pub const SECTION_MARKER: &str = "#NOTES:";
const TEMPO_TAG: &str = "#BPMS:";
const DEFAULT_CHART_TYPE: &str = "dance-single";
const DEFAULT_OFFSET: &str = "0.000";
const DEFAULT_BPMS: &str = "0.000=120.000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLine {
    Row(Row),
    Separator,
    Terminator,
    Other,
}

/// Classifies one body line after dropping a trailing `//` comment and
/// surrounding whitespace.
#[must_use]
pub fn classify_line(raw: &str) -> BodyLine {
    let line = strip_comment(raw).trim();
    match line {
        "," => BodyLine::Separator,
        ";" => BodyLine::Terminator,
        _ => Row::parse(line).map_or(BodyLine::Other, BodyLine::Row),
    }
}

#[derive(Debug, Default)]
pub(crate) struct GridBuilder {
    measures: Vec<Measure>,
    current: Vec<Row>,
}

impl GridBuilder {
    /// Returns `false` once the terminator is seen.
    pub(crate) fn accept(&mut self, line: BodyLine) -> bool {
        match line {
            BodyLine::Row(row) => self.current.push(row),
            BodyLine::Separator => self.close_measure(),
            BodyLine::Terminator => return false,
            BodyLine::Other => {}
        }
        true
    }

    pub(crate) fn row_count(&self) -> usize {
        self.measures
            .iter()
            .map(|measure| measure.rows().len())
            .sum::<usize>()
            + self.current.len()
    }

    pub(crate) fn finish(mut self) -> NoteGrid {
        self.close_measure();
        NoteGrid::new(self.measures)
    }

    fn close_measure(&mut self) {
        // an empty measure neither exists nor advances the beat clock
        if let Some(measure) = Measure::new(mem::take(&mut self.current)) {
            self.measures.push(measure);
        }
    }
}

/// Parses a bare chart body (rows, separators, terminator) without any
/// section header.
#[must_use]
pub fn parse_body(text: &str) -> NoteGrid {
    let mut builder = GridBuilder::default();
    for line in text.lines() {
        if !builder.accept(classify_line(line)) {
            break;
        }
    }
    builder.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ScanState {
    #[default]
    SeekingSection,
    ReadingMetadata,
    ReadingBody,
    Done,
}

#[derive(Debug, Default)]
struct SectionScanner {
    state: ScanState,
    start: usize,
    metadata: Vec<String>,
    body: GridBuilder,
}

impl SectionScanner {
    fn begin(&mut self, marker_at: usize) {
        *self = Self {
            state: ScanState::ReadingMetadata,
            start: marker_at,
            ..Self::default()
        };
    }

    fn feed(&mut self, line: &str) {
        let trimmed = strip_comment(line).trim();
        if trimmed.is_empty() {
            return;
        }

        match self.state {
            ScanState::SeekingSection | ScanState::Done => {}
            ScanState::ReadingMetadata => {
                if trimmed.contains(':') {
                    self.metadata
                        .push(trimmed.trim_matches(':').trim().to_string());
                    if self.metadata.len() == METADATA_FIELD_COUNT {
                        self.state = ScanState::ReadingBody;
                    }
                    return;
                }

                match classify_line(trimmed) {
                    BodyLine::Other => trace!(line = trimmed, "ignoring line inside metadata"),
                    body_line => {
                        debug!(
                            fields = self.metadata.len(),
                            "chart body started before all metadata fields"
                        );
                        self.state = ScanState::ReadingBody;
                        self.accept_body(body_line);
                    }
                }
            }
            ScanState::ReadingBody => self.accept_body(classify_line(trimmed)),
        }
    }

    fn accept_body(&mut self, line: BodyLine) {
        if line == BodyLine::Other {
            trace!("ignoring unrecognised body line");
        }
        if !self.body.accept(line) {
            self.state = ScanState::Done;
        }
    }

    fn finish(&mut self, end: usize, sections: &mut Vec<ChartSection>) {
        let scanner = mem::take(self);
        if scanner.state == ScanState::SeekingSection {
            return;
        }

        if scanner.metadata.len() < MIN_METADATA_FIELDS {
            debug!(
                fields = scanner.metadata.len(),
                start = scanner.start,
                "discarding section with too few metadata fields"
            );
            return;
        }

        let level_index = sections.len();
        let meta = build_meta(level_index, scanner.metadata);
        trace!(
            level_index,
            rows = scanner.body.row_count(),
            "section complete"
        );
        sections.push(ChartSection {
            meta,
            grid: scanner.body.finish(),
            span: scanner.start..end,
        });
    }
}

/// Parses a whole chart document. Never fails: malformed sections are
/// dropped and a missing tempo declaration yields an empty timeline.
#[instrument(skip(text), fields(bytes = text.len()))]
pub fn parse_chart(text: &str) -> ChartDocument {
    let mut sections = Vec::new();
    let mut scanner = SectionScanner::default();
    let mut offset = 0;

    for segment in text.split_inclusive('\n') {
        let mut rest = segment;
        let mut rest_start = offset;
        while let Some(position) = find_ascii_ci(rest, SECTION_MARKER) {
            scanner.feed(&rest[..position]);
            let marker_at = rest_start + position;
            scanner.finish(marker_at, &mut sections);
            scanner.begin(marker_at);

            let skip = position + SECTION_MARKER.len();
            rest = &rest[skip..];
            rest_start += skip;
        }
        scanner.feed(rest);
        offset += segment.len();
    }
    scanner.finish(text.len(), &mut sections);

    let document = ChartDocument {
        header: parse_header(text),
        tempo: parse_tempo(text),
        sections,
    };
    debug!(
        sections = document.sections.len(),
        breakpoints = document.tempo.breakpoints().len(),
        "chart parsed"
    );
    document
}

#[must_use]
pub fn parse_tempo(text: &str) -> TempoTimeline {
    let Some(raw) = tag_value(text, TEMPO_TAG) else {
        debug!("no tempo declaration, default bpm applies");
        return TempoTimeline::default();
    };

    let mut breakpoints = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        match parse_bpm_pair(pair) {
            Some(point) => breakpoints.push(point),
            None => warn!(pair, "dropping malformed tempo pair"),
        }
    }
    TempoTimeline::new(breakpoints)
}

#[must_use]
pub fn parse_header(text: &str) -> ChartHeader {
    let tag = |name: &str| {
        tag_value(text, name)
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };

    let mut header = ChartHeader {
        title: tag("#TITLE:"),
        subtitle: tag("#SUBTITLE:"),
        artist: tag("#ARTIST:"),
        music: tag("#MUSIC:"),
        offset: tag("#OFFSET:"),
        bpms: tag(TEMPO_TAG),
    };
    if header.offset.is_empty() {
        header.offset = DEFAULT_OFFSET.to_string();
    }
    if header.bpms.is_empty() {
        header.bpms = DEFAULT_BPMS.to_string();
    }
    header
}

fn parse_bpm_pair(pair: &str) -> Option<BpmBreakpoint> {
    let (beat, bpm) = pair.split_once('=')?;
    let beat: f64 = beat.trim().parse().ok()?;
    let bpm: f64 = bpm.trim().parse().ok()?;
    let valid = beat.is_finite() && beat >= 0.0 && bpm.is_finite() && bpm > 0.0;
    valid.then_some(BpmBreakpoint { beat, bpm })
}

fn build_meta(level_index: usize, fields: Vec<String>) -> DifficultyMeta {
    let mut fields = fields.into_iter();
    let mut next = || fields.next().unwrap_or_default();

    let chart_type = next();
    let author = next();
    let difficulty = next();
    let rating = next();
    let groove_radar = next();

    DifficultyMeta {
        level_index,
        chart_type: if chart_type.is_empty() {
            DEFAULT_CHART_TYPE.to_string()
        } else {
            chart_type
        },
        author,
        difficulty: if difficulty.is_empty() {
            format!("Difficulty_{}", level_index + 1)
        } else {
            difficulty
        },
        rating: rating.parse().unwrap_or(0),
        groove_radar,
    }
}

/// Value of `#TAG:...;`, up to the first semicolon after the tag.
pub(crate) fn tag_value<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let start = find_ascii_ci(text, tag)? + tag.len();
    let length = text[start..].find(';')?;
    Some(&text[start..start + length])
}

/// Byte offset of an ASCII `needle`, ignoring ASCII case.
pub(crate) fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

fn strip_comment(line: &str) -> &str {
    line.find("//").map_or(line, |position| &line[..position])
}
