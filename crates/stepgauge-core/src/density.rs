use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    chart::{NoteGrid, TempoTimeline},
    time::TempoCursor,
};

pub const BUCKETS_PER_SECOND: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensitySample {
    pub time_seconds: f64,
    pub note_count: u32,
}

/// Note counts keyed by 0.1 s bucket. Only buckets holding at least one note
/// exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensitySeries {
    buckets: BTreeMap<i64, u32>,
}

impl DensitySeries {
    pub fn add(&mut self, time_seconds: f64, note_count: u32) {
        if note_count == 0 {
            return;
        }
        *self.buckets.entry(bucket_key(time_seconds)).or_default() += note_count;
    }

    pub fn samples(&self) -> impl Iterator<Item = DensitySample> + '_ {
        self.buckets.iter().map(|(&key, &note_count)| DensitySample {
            time_seconds: bucket_time(key),
            note_count,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Zero-filled series on the 0.1 s grid from 0 to the last bucket, for
    /// plotting. Statistics never use it.
    #[must_use]
    pub fn dense(&self) -> Vec<DensitySample> {
        let Some(&last) = self.buckets.keys().next_back() else {
            return Vec::new();
        };
        let first = self.buckets.keys().next().map_or(0, |&key| key.min(0));
        (first..=last)
            .map(|key| DensitySample {
                time_seconds: bucket_time(key),
                note_count: self.buckets.get(&key).copied().unwrap_or(0),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DensitySummary {
    pub total_notes: u64,
    pub duration_seconds: f64,
    pub mean_nps: f64,
    pub peak_nps: u32,
    pub stdev_nps: f64,
}

#[instrument(skip(timeline, grid), fields(measures = grid.measure_count()))]
pub fn compute_density(
    timeline: &TempoTimeline,
    grid: &NoteGrid,
) -> (DensitySeries, DensitySummary) {
    let mut series = DensitySeries::default();
    let mut cursor = TempoCursor::new(timeline);

    for (beat, row) in grid.positioned_rows() {
        let notes = row.active_count();
        if notes == 0 {
            continue;
        }
        let seconds = cursor.seconds_at(beat);
        series.add(seconds, u32::try_from(notes).unwrap_or(u32::MAX));
    }

    let summary = summarize(&series);
    debug!(
        buckets = series.len(),
        total_notes = summary.total_notes,
        peak_nps = summary.peak_nps,
        "density computed"
    );
    (series, summary)
}

/// Statistics over the set of bucket counts. Seconds without notes have no
/// bucket and do not pull the mean down.
#[must_use]
pub fn summarize(series: &DensitySeries) -> DensitySummary {
    let Some(&last_key) = series.buckets.keys().next_back() else {
        return DensitySummary::default();
    };

    let counts: Vec<f64> = series.buckets.values().map(|&count| f64::from(count)).collect();
    let total_notes: u64 = series.buckets.values().map(|&count| u64::from(count)).sum();
    let mean_nps = counts.iter().sum::<f64>() / counts.len() as f64;
    let variance = counts
        .iter()
        .map(|count| (count - mean_nps).powi(2))
        .sum::<f64>()
        / counts.len() as f64;

    DensitySummary {
        total_notes,
        duration_seconds: bucket_time(last_key),
        mean_nps,
        peak_nps: series.buckets.values().copied().max().unwrap_or(0),
        stdev_nps: variance.sqrt(),
    }
}

/// Decisecond bucket of a time, rounded on its exact binary value with ties
/// to even, so 1.25 s lands in 1.2 and 0.35 s (stored just below) in 0.3.
fn bucket_key(time_seconds: f64) -> i64 {
    format!("{time_seconds:.1}")
        .replace('.', "")
        .parse()
        .unwrap_or_else(|_| (time_seconds * BUCKETS_PER_SECOND).round() as i64)
}

fn bucket_time(key: i64) -> f64 {
    key as f64 / BUCKETS_PER_SECOND
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::parse_body;

    #[test]
    fn empty_series_summarizes_to_zero() {
        let summary = summarize(&DensitySeries::default());
        assert_eq!(summary, DensitySummary::default());
        assert_eq!(summary.total_notes, 0);
        assert_eq!(summary.peak_nps, 0);
    }

    #[test]
    fn colliding_rows_share_a_bucket() {
        // 192 rows per measure at 120 bpm puts consecutive rows 10.4 ms apart
        let mut body = String::new();
        for index in 0..192 {
            body.push_str(if index < 3 { "1000\n" } else { "0000\n" });
        }
        let grid = parse_body(&body);
        let (series, summary) = compute_density(&TempoTimeline::default(), &grid);

        assert_eq!(series.len(), 1);
        assert_eq!(summary.total_notes, 3);
        assert_eq!(summary.peak_nps, 3);
        assert_eq!(summary.duration_seconds, 0.0);
    }

    #[test]
    fn empty_rows_never_create_samples() {
        let grid = parse_body("0000\n1100\n0000\n0000\n,\n0000\n;");
        let (series, summary) = compute_density(&TempoTimeline::default(), &grid);
        let samples: Vec<DensitySample> = series.samples().collect();

        assert_eq!(
            samples,
            vec![DensitySample {
                time_seconds: 0.5,
                note_count: 2
            }]
        );
        assert_eq!(summary.duration_seconds, 0.5);
        assert_eq!(summary.stdev_nps, 0.0);
    }

    #[test]
    fn ties_round_to_the_even_decisecond() {
        let mut series = DensitySeries::default();
        series.add(1.25, 1);
        series.add(0.35, 1);
        series.add(0.45, 1);
        series.add(-0.25, 1);
        let times: Vec<f64> = series.samples().map(|sample| sample.time_seconds).collect();

        assert_eq!(times, vec![-0.2, 0.3, 0.5, 1.2]);
    }

    #[test]
    fn eighth_note_tie_at_120_bpm_rounds_to_even() {
        let grid = parse_body("0000\n0000\n0000\n0000\n0000\n1000\n0000\n0000\n;");
        let (series, summary) = compute_density(&TempoTimeline::default(), &grid);
        let samples: Vec<DensitySample> = series.samples().collect();

        assert_eq!(
            samples,
            vec![DensitySample {
                time_seconds: 1.2,
                note_count: 1
            }]
        );
        assert_eq!(summary.duration_seconds, 1.2);
    }

    #[test]
    fn mean_and_stdev_cover_bucket_counts_only() {
        let mut series = DensitySeries::default();
        series.add(0.0, 1);
        series.add(10.0, 3);
        let summary = summarize(&series);

        assert_eq!(summary.mean_nps, 2.0);
        assert_eq!(summary.stdev_nps, 1.0);
        assert_eq!(summary.duration_seconds, 10.0);
        assert_eq!(series.dense().len(), 101);
    }
}
