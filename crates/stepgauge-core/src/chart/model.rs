use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};

use crate::{error::StepgaugeError, time::measure_row_beat};

pub const LANE_COUNT: usize = 4;
pub const BEATS_PER_MEASURE: f64 = 4.0;
pub const DEFAULT_BPM: f64 = 120.0;
pub const METADATA_FIELD_COUNT: usize = 5;
pub const MIN_METADATA_FIELDS: usize = 3;

static IMPLICIT_TEMPO: [BpmBreakpoint; 1] = [BpmBreakpoint {
    beat: 0.0,
    bpm: DEFAULT_BPM,
}];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteSymbol {
    Empty,
    Tap,
    HoldStart,
    HoldEnd,
    RollStart,
    Mine,
}

impl NoteSymbol {
    #[must_use]
    pub const fn from_char(symbol: char) -> Option<Self> {
        match symbol {
            '0' => Some(Self::Empty),
            '1' => Some(Self::Tap),
            '2' => Some(Self::HoldStart),
            '3' => Some(Self::HoldEnd),
            '4' => Some(Self::RollStart),
            'M' => Some(Self::Mine),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Empty => '0',
            Self::Tap => '1',
            Self::HoldStart => '2',
            Self::HoldEnd => '3',
            Self::RollStart => '4',
            Self::Mine => 'M',
        }
    }

    /// Every symbol except `Empty` denotes an event in its lane.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Row([NoteSymbol; LANE_COUNT]);

impl Row {
    #[must_use]
    pub const fn new(lanes: [NoteSymbol; LANE_COUNT]) -> Self {
        Self(lanes)
    }

    /// Parses an already trimmed row line: exactly four characters from the
    /// accepted alphabet.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut lanes = [NoteSymbol::Empty; LANE_COUNT];
        let mut chars = line.chars();
        for lane in &mut lanes {
            *lane = NoteSymbol::from_char(chars.next()?)?;
        }
        if chars.next().is_some() {
            return None;
        }
        Some(Self(lanes))
    }

    #[must_use]
    pub const fn lanes(&self) -> &[NoteSymbol; LANE_COUNT] {
        &self.0
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|symbol| symbol.is_active()).count()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for symbol in self.0 {
            write!(f, "{}", symbol.as_char())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    rows: Vec<Row>,
}

impl Measure {
    /// Returns `None` for an empty row list; measures always hold at least one row.
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Option<Self> {
        if rows.is_empty() {
            None
        } else {
            Some(Self { rows })
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteGrid {
    measures: Vec<Measure>,
}

impl NoteGrid {
    #[must_use]
    pub fn new(measures: Vec<Measure>) -> Self {
        Self { measures }
    }

    #[must_use]
    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    #[must_use]
    pub fn measure_count(&self) -> usize {
        self.measures.len()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.measures.iter().map(|measure| measure.rows.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    /// Every row paired with its absolute beat position, in chart order.
    pub fn positioned_rows(&self) -> impl Iterator<Item = (f64, &Row)> + '_ {
        self.measures
            .iter()
            .enumerate()
            .flat_map(|(measure_index, measure)| {
                let rows_in_measure = measure.rows.len();
                measure
                    .rows
                    .iter()
                    .enumerate()
                    .map(move |(row_index, row)| {
                        (measure_row_beat(measure_index, row_index, rows_in_measure), row)
                    })
            })
    }

    #[must_use]
    pub fn lane_counts(&self) -> [usize; LANE_COUNT] {
        let mut counts = [0; LANE_COUNT];
        for measure in &self.measures {
            for row in &measure.rows {
                for (count, symbol) in counts.iter_mut().zip(row.lanes()) {
                    if symbol.is_active() {
                        *count += 1;
                    }
                }
            }
        }
        counts
    }

    /// Canonical line form of the body: rows, `,` between measures, `;` last.
    #[must_use]
    pub fn body_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.row_count() + self.measures.len() + 1);
        for (index, measure) in self.measures.iter().enumerate() {
            if index > 0 {
                lines.push(",".to_string());
            }
            lines.extend(measure.rows.iter().map(ToString::to_string));
        }
        lines.push(";".to_string());
        lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmBreakpoint {
    pub beat: f64,
    pub bpm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TempoTimeline {
    breakpoints: Vec<BpmBreakpoint>,
}

impl TempoTimeline {
    /// Sorts by beat and keeps the last declaration for a repeated beat.
    /// Breakpoints with a negative or non-finite beat or a non-positive bpm
    /// are discarded.
    #[must_use]
    pub fn new(mut breakpoints: Vec<BpmBreakpoint>) -> Self {
        breakpoints.retain(|point| {
            point.beat.is_finite() && point.beat >= 0.0 && point.bpm.is_finite() && point.bpm > 0.0
        });
        breakpoints.sort_by(|left, right| left.beat.total_cmp(&right.beat));

        let mut unique: Vec<BpmBreakpoint> = Vec::with_capacity(breakpoints.len());
        for point in breakpoints {
            match unique.last_mut() {
                Some(last) if last.beat.total_cmp(&point.beat).is_eq() => *last = point,
                _ => unique.push(point),
            }
        }
        Self { breakpoints: unique }
    }

    #[must_use]
    pub fn constant(bpm: f64) -> Self {
        Self::new(vec![BpmBreakpoint { beat: 0.0, bpm }])
    }

    /// Declared breakpoints; empty when the chart declared none.
    #[must_use]
    pub fn breakpoints(&self) -> &[BpmBreakpoint] {
        &self.breakpoints
    }

    /// Declared breakpoints, or the implicit 120 bpm breakpoint at beat 0.
    #[must_use]
    pub fn effective_breakpoints(&self) -> &[BpmBreakpoint] {
        if self.breakpoints.is_empty() {
            &IMPLICIT_TEMPO
        } else {
            &self.breakpoints
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyMeta {
    pub level_index: usize,
    pub chart_type: String,
    pub author: String,
    pub difficulty: String,
    pub rating: u32,
    pub groove_radar: String,
}

impl DifficultyMeta {
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.author.is_empty() {
            self.difficulty.clone()
        } else {
            format!("{} ({})", self.difficulty, self.author)
        }
    }

    #[must_use]
    pub fn matches_label(&self, target: &str) -> bool {
        self.difficulty
            .to_lowercase()
            .contains(&target.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSection {
    pub meta: DifficultyMeta,
    pub grid: NoteGrid,
    /// Byte range in the source text, from the section marker up to the next
    /// marker or the end of the text.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartHeader {
    pub title: String,
    pub subtitle: String,
    pub artist: String,
    pub music: String,
    pub offset: String,
    pub bpms: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartDocument {
    pub header: ChartHeader,
    pub tempo: TempoTimeline,
    pub sections: Vec<ChartSection>,
}

impl ChartDocument {
    pub fn section(&self, level_index: usize) -> Result<&ChartSection, StepgaugeError> {
        self.sections
            .get(level_index)
            .ok_or(StepgaugeError::LevelOutOfRange {
                requested: level_index,
                available: self.sections.len(),
            })
    }

    #[must_use]
    pub fn find_by_difficulty(&self, target: &str) -> Option<&ChartSection> {
        self.sections
            .iter()
            .find(|section| section.meta.matches_label(target))
    }

    /// Fails with `EmptyDocument` when no section survived parsing.
    pub fn require_sections(&self) -> Result<&[ChartSection], StepgaugeError> {
        if self.sections.is_empty() {
            Err(StepgaugeError::EmptyDocument)
        } else {
            Ok(&self.sections)
        }
    }
}
