use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::error::StepgaugeError;

pub const REPLAY_LANE_COUNT: u8 = 4;
const LANE_NAMES: [&str; REPLAY_LANE_COUNT as usize] = ["Left", "Down", "Up", "Right"];
const TIMING_CONSISTENCY_SECONDS: f64 = 0.01;

const JUDGMENT_WINDOWS: [(Judgment, f64); 5] = [
    (Judgment::Flawless, 0.0225),
    (Judgment::Perfect, 0.045),
    (Judgment::Great, 0.090),
    (Judgment::Good, 0.135),
    (Judgment::Boo, 0.180),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub row_index: i64,
    pub offset_seconds: f64,
    pub lane: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    Flawless,
    Perfect,
    Great,
    Good,
    Boo,
    Miss,
}

impl Judgment {
    pub const ALL: [Self; 6] = [
        Self::Flawless,
        Self::Perfect,
        Self::Great,
        Self::Good,
        Self::Boo,
        Self::Miss,
    ];

    /// Inclusive upper bound on `|offset|`; `None` for `Miss`.
    #[must_use]
    pub fn window_seconds(self) -> Option<f64> {
        JUDGMENT_WINDOWS
            .iter()
            .find(|(judgment, _)| *judgment == self)
            .map(|(_, limit)| *limit)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Flawless => "W1 (Flawless)",
            Self::Perfect => "W2 (Perfect)",
            Self::Great => "W3 (Great)",
            Self::Good => "W4 (Good)",
            Self::Boo => "W5 (Boo)",
            Self::Miss => "Miss",
        }
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Total over every `f64`: anything outside the Boo window, NaN included,
/// is a `Miss`.
#[must_use]
pub fn classify_judgment(offset_seconds: f64) -> Judgment {
    let magnitude = offset_seconds.abs();
    JUDGMENT_WINDOWS
        .iter()
        .find(|(_, limit)| magnitude <= *limit)
        .map_or(Judgment::Miss, |(judgment, _)| *judgment)
}

#[must_use]
pub fn lane_name(lane: u8) -> &'static str {
    LANE_NAMES.get(usize::from(lane)).copied().unwrap_or("Unknown")
}

/// Parses `<row> <offset> <lane>...` lines. Lines without a numeric row and
/// offset are dropped, as are individual lane tokens outside `0..=3`.
#[instrument(skip(text), fields(bytes = text.len()))]
pub fn parse_replay(text: &str) -> Vec<ReplayEvent> {
    let mut events = Vec::new();
    let mut dropped_lines = 0_usize;
    let mut dropped_lanes = 0_usize;

    for (line_number, line) in text.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() < 3 {
            trace!(line_number, "replay line has fewer than three tokens");
            dropped_lines += 1;
            continue;
        }

        let Ok(row_index) = tokens[0].parse::<i64>() else {
            trace!(line_number, token = tokens[0], "replay row is not an integer");
            dropped_lines += 1;
            continue;
        };
        let Some(offset_seconds) = tokens[1]
            .parse::<f64>()
            .ok()
            .filter(|offset| offset.is_finite())
        else {
            trace!(line_number, token = tokens[1], "replay offset is not numeric");
            dropped_lines += 1;
            continue;
        };

        for token in &tokens[2..] {
            // signed parse so "-0" and "+1" name lanes too
            let lane = token
                .parse::<i64>()
                .ok()
                .and_then(|lane| u8::try_from(lane).ok())
                .filter(|&lane| lane < REPLAY_LANE_COUNT);
            match lane {
                Some(lane) => events.push(ReplayEvent {
                    row_index,
                    offset_seconds,
                    lane,
                }),
                None => {
                    trace!(line_number, token = *token, "dropping invalid lane token");
                    dropped_lanes += 1;
                }
            }
        }
    }

    debug!(
        events = events.len(),
        dropped_lines, dropped_lanes, "replay parsed"
    );
    events
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneJudgmentStat {
    pub lane: u8,
    pub lane_name: String,
    pub judgment: Judgment,
    pub count: usize,
    pub total: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneSummary {
    pub lane: u8,
    pub lane_name: String,
    pub events: usize,
    pub mean_offset: f64,
    pub stdev_offset: f64,
    pub judgments: BTreeMap<Judgment, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSummary {
    pub row_index: i64,
    pub events: usize,
    pub mean_offset: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayAnalysis {
    pub total_events: usize,
    pub mean_offset: f64,
    pub stdev_offset: f64,
    pub accuracy_percent: f64,
    pub judgment_counts: BTreeMap<Judgment, usize>,
    pub lane_judgments: Vec<LaneJudgmentStat>,
    pub lanes: Vec<LaneSummary>,
    pub rows: Vec<RowSummary>,
}

impl ReplayAnalysis {
    #[must_use]
    pub fn count(&self, judgment: Judgment) -> usize {
        self.judgment_counts.get(&judgment).copied().unwrap_or(0)
    }
}

#[instrument(skip(events), fields(events = events.len()))]
pub fn analyze_replay(events: &[ReplayEvent]) -> ReplayAnalysis {
    let mut judgment_counts: BTreeMap<Judgment, usize> = BTreeMap::new();
    let mut by_lane: BTreeMap<u8, Vec<&ReplayEvent>> = BTreeMap::new();
    let mut by_row: BTreeMap<i64, Vec<f64>> = BTreeMap::new();

    for event in events {
        *judgment_counts
            .entry(classify_judgment(event.offset_seconds))
            .or_default() += 1;
        by_lane.entry(event.lane).or_default().push(event);
        by_row
            .entry(event.row_index)
            .or_default()
            .push(event.offset_seconds);
    }

    let mut lane_judgments = Vec::new();
    let mut lanes = Vec::with_capacity(by_lane.len());
    for (&lane, lane_events) in &by_lane {
        let total = lane_events.len();
        let mut judgments: BTreeMap<Judgment, usize> = BTreeMap::new();
        for event in lane_events {
            *judgments
                .entry(classify_judgment(event.offset_seconds))
                .or_default() += 1;
        }

        lane_judgments.extend(judgments.iter().map(|(&judgment, &count)| LaneJudgmentStat {
            lane,
            lane_name: lane_name(lane).to_string(),
            judgment,
            count,
            total,
            percentage: round_2(count as f64 / total as f64 * 100.0),
        }));

        let (mean_offset, stdev_offset) =
            mean_and_stdev(lane_events.iter().map(|event| event.offset_seconds));
        lanes.push(LaneSummary {
            lane,
            lane_name: lane_name(lane).to_string(),
            events: total,
            mean_offset,
            stdev_offset,
            judgments,
        });
    }

    let rows = by_row
        .into_iter()
        .map(|(row_index, offsets)| RowSummary {
            row_index,
            events: offsets.len(),
            mean_offset: mean_and_stdev(offsets.iter().copied()).0,
        })
        .collect();

    let (mean_offset, stdev_offset) =
        mean_and_stdev(events.iter().map(|event| event.offset_seconds));
    let on_time = judgment_counts.get(&Judgment::Flawless).copied().unwrap_or(0)
        + judgment_counts.get(&Judgment::Perfect).copied().unwrap_or(0);
    let accuracy_percent = if events.is_empty() {
        0.0
    } else {
        on_time as f64 / events.len() as f64 * 100.0
    };

    ReplayAnalysis {
        total_events: events.len(),
        mean_offset,
        stdev_offset,
        accuracy_percent,
        judgment_counts,
        lane_judgments,
        lanes,
        rows,
    }
}

/// Parses and analyzes a replay that is required to hold events.
pub fn analyze_replay_text(text: &str) -> Result<ReplayAnalysis, StepgaugeError> {
    let events = parse_replay(text);
    if events.is_empty() {
        return Err(StepgaugeError::EmptyReplay);
    }
    Ok(analyze_replay(&events))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improved,
    Regressed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayComparison {
    pub accuracy_delta: f64,
    pub mean_offset_delta: f64,
    pub stdev_delta: f64,
    pub accuracy_trend: Trend,
    pub consistency_trend: Trend,
    pub timing_consistent: bool,
}

#[must_use]
pub fn compare_replays(before: &ReplayAnalysis, after: &ReplayAnalysis) -> ReplayComparison {
    let accuracy_delta = after.accuracy_percent - before.accuracy_percent;
    let mean_offset_delta = after.mean_offset - before.mean_offset;
    let stdev_delta = after.stdev_offset - before.stdev_offset;

    ReplayComparison {
        accuracy_delta,
        mean_offset_delta,
        stdev_delta,
        accuracy_trend: trend(accuracy_delta),
        // a shrinking spread is the improvement
        consistency_trend: trend(-stdev_delta),
        timing_consistent: mean_offset_delta.abs() < TIMING_CONSISTENCY_SECONDS,
    }
}

fn trend(delta: f64) -> Trend {
    if delta > 0.0 {
        Trend::Improved
    } else if delta < 0.0 {
        Trend::Regressed
    } else {
        Trend::Unchanged
    }
}

/// Population mean and standard deviation; `(0, 0)` for no values.
fn mean_and_stdev(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (count, sum) = values
        .clone()
        .fold((0_usize, 0.0_f64), |(count, sum), value| (count + 1, sum + value));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let variance = values.map(|value| (value - mean).powi(2)).sum::<f64>() / count as f64;
    (mean, variance.sqrt())
}

fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judgment_boundaries_are_inclusive() {
        assert_eq!(classify_judgment(0.0225), Judgment::Flawless);
        assert_eq!(classify_judgment(-0.0225), Judgment::Flawless);
        assert_eq!(classify_judgment(0.0226), Judgment::Perfect);
        assert_eq!(classify_judgment(0.045), Judgment::Perfect);
        assert_eq!(classify_judgment(0.090), Judgment::Great);
        assert_eq!(classify_judgment(-0.135), Judgment::Good);
        assert_eq!(classify_judgment(0.180), Judgment::Boo);
        assert_eq!(classify_judgment(0.1801), Judgment::Miss);
        assert_eq!(classify_judgment(0.5), Judgment::Miss);
        assert_eq!(classify_judgment(f64::NAN), Judgment::Miss);
    }

    #[test]
    fn malformed_lines_and_lanes_are_dropped() {
        let text = "abc 0.01 1\n5 xyz 2\n5 0.01 9\n7 -0.03 0 3 x 4\n8 0.2\n\n";
        let events = parse_replay(text);

        let lanes: Vec<u8> = events.iter().map(|event| event.lane).collect();
        assert_eq!(lanes, vec![0, 3]);
        assert!(events.iter().all(|event| event.row_index == 7));
    }

    #[test]
    fn signed_lane_tokens_are_range_checked() {
        let events = parse_replay("3 0.01 -0 +1 -1 4\n");
        let lanes: Vec<u8> = events.iter().map(|event| event.lane).collect();
        assert_eq!(lanes, vec![0, 1]);
    }

    #[test]
    fn multi_lane_lines_share_row_and_offset() {
        let events = parse_replay("768 -0.019590 2 1\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].offset_seconds, events[1].offset_seconds);
        assert_eq!(events[1].lane, 1);
    }

    #[test]
    fn lane_percentages_are_rounded_per_lane() {
        let events = parse_replay("1 0.01 0\n2 0.05 0\n3 0.2 0\n4 0.0 1\n");
        let analysis = analyze_replay(&events);

        let lane_zero: Vec<&LaneJudgmentStat> = analysis
            .lane_judgments
            .iter()
            .filter(|stat| stat.lane == 0)
            .collect();
        assert_eq!(lane_zero.len(), 3);
        assert!(lane_zero.iter().all(|stat| stat.total == 3));
        assert_eq!(lane_zero[0].percentage, 33.33);
        assert_eq!(analysis.count(Judgment::Flawless), 2);
        assert_eq!(analysis.lanes[1].lane_name, "Down");
        assert_eq!(analysis.accuracy_percent, 50.0);
    }

    #[test]
    fn offset_statistics_are_population_based() {
        let analysis = analyze_replay(&parse_replay("1 0.01 0\n2 0.03 1\n"));
        assert!((analysis.mean_offset - 0.02).abs() < 1e-12);
        assert!((analysis.stdev_offset - 0.01).abs() < 1e-12);
        assert_eq!(analysis.rows.len(), 2);
    }

    #[test]
    fn empty_replay_is_a_reportable_failure() {
        assert_eq!(
            analyze_replay_text("garbage\n").expect_err("no events"),
            StepgaugeError::EmptyReplay
        );
    }

    #[test]
    fn comparison_reports_trends() {
        let before = analyze_replay(&parse_replay("1 0.05 0\n2 -0.05 1\n"));
        let after = analyze_replay(&parse_replay("1 0.01 0\n2 -0.01 1\n"));
        let comparison = compare_replays(&before, &after);

        assert_eq!(comparison.accuracy_trend, Trend::Improved);
        assert_eq!(comparison.consistency_trend, Trend::Improved);
        assert!(comparison.timing_consistent);
        assert_eq!(comparison.accuracy_delta, 100.0);
    }
}
