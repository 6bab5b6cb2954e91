use crate::chart::{BEATS_PER_MEASURE, BpmBreakpoint, TempoTimeline};

#[must_use]
pub fn seconds_per_beat(bpm: f64) -> f64 {
    if bpm <= 0.0 {
        return 0.0;
    }

    60.0 / bpm
}

#[must_use]
pub fn measure_row_beat(measure_index: usize, row_index: usize, rows_in_measure: usize) -> f64 {
    if rows_in_measure == 0 {
        return measure_index as f64 * BEATS_PER_MEASURE;
    }

    measure_index as f64 * BEATS_PER_MEASURE
        + (row_index as f64 / rows_in_measure as f64) * BEATS_PER_MEASURE
}

/// Elapsed seconds at `beat`, integrating the piecewise-constant tempo. An
/// empty timeline behaves as a single 120 bpm breakpoint at beat 0.
#[must_use]
pub fn beats_to_seconds(timeline: &TempoTimeline, beat: f64) -> f64 {
    TempoCursor::new(timeline).seconds_at(beat)
}

/// Forward-walking tempo integrator. Sorted beat queries reuse the segments
/// already summed; a query behind the cursor rewinds it. Results are
/// bit-identical to [`beats_to_seconds`].
#[derive(Debug, Clone)]
pub struct TempoCursor<'a> {
    breakpoints: &'a [BpmBreakpoint],
    next: usize,
    elapsed: f64,
    last_beat: f64,
    last_bpm: f64,
}

impl<'a> TempoCursor<'a> {
    #[must_use]
    pub fn new(timeline: &'a TempoTimeline) -> Self {
        let breakpoints = timeline.effective_breakpoints();
        Self {
            breakpoints,
            next: 0,
            elapsed: 0.0,
            last_beat: 0.0,
            last_bpm: breakpoints[0].bpm,
        }
    }

    pub fn seconds_at(&mut self, beat: f64) -> f64 {
        if self.next > 0 && beat < self.last_beat {
            self.rewind();
        }

        while let Some(point) = self.breakpoints.get(self.next) {
            if point.beat > beat {
                break;
            }
            self.elapsed += (point.beat - self.last_beat) * seconds_per_beat(self.last_bpm);
            self.last_beat = point.beat;
            self.last_bpm = point.bpm;
            self.next += 1;
        }

        self.elapsed + (beat - self.last_beat) * seconds_per_beat(self.last_bpm)
    }

    fn rewind(&mut self) {
        self.next = 0;
        self.elapsed = 0.0;
        self.last_beat = 0.0;
        self.last_bpm = self.breakpoints[0].bpm;
    }
}
