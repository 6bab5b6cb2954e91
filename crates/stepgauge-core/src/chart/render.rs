use std::fmt::Write as _;

use tracing::{debug, instrument};

use super::{
    model::{ChartSection, DifficultyMeta, NoteGrid},
    parser::{SECTION_MARKER, find_ascii_ci},
};
use crate::error::StepgaugeError;

const METADATA_INDENT: &str = "     ";
const EMPTY_SUBTITLE_TAG: &str = "#SUBTITLE:;";

/// Renders a complete `#NOTES:` section: marker, the five metadata fields
/// and the canonical body.
#[must_use]
pub fn render_section(meta: &DifficultyMeta, grid: &NoteGrid) -> String {
    let rating = meta.rating.to_string();
    let mut section = String::from(SECTION_MARKER);
    section.push('\n');
    for field in [
        meta.chart_type.as_str(),
        meta.author.as_str(),
        meta.difficulty.as_str(),
        rating.as_str(),
        meta.groove_radar.as_str(),
    ] {
        let _ = writeln!(section, "{METADATA_INDENT}{field}:");
    }
    for line in grid.body_lines() {
        section.push_str(&line);
        section.push('\n');
    }
    section
}

/// Replaces exactly the source span of `section` with `replacement`.
#[instrument(skip(source, section, replacement), fields(level_index = section.meta.level_index))]
pub fn splice_section(
    source: &str,
    section: &ChartSection,
    replacement: &str,
) -> Result<String, StepgaugeError> {
    let span = section.span.clone();
    let original = source
        .get(span.clone())
        .filter(|text| find_ascii_ci(text, SECTION_MARKER) == Some(0))
        .ok_or(StepgaugeError::SectionSpanMissing(section.meta.level_index))?;

    let mut spliced =
        String::with_capacity(source.len() - original.len() + replacement.len());
    spliced.push_str(&source[..span.start]);
    spliced.push_str(replacement);
    spliced.push_str(&source[span.end..]);
    debug!(
        replaced_bytes = original.len(),
        inserted_bytes = replacement.len(),
        "section spliced"
    );
    Ok(spliced)
}

/// Fills an empty `#SUBTITLE:;` tag. Leaves the text alone when the tag is
/// missing or already carries a value.
#[must_use]
pub fn set_subtitle(source: &str, subtitle: &str) -> String {
    match find_ascii_ci(source, EMPTY_SUBTITLE_TAG) {
        Some(position) => {
            let mut updated = String::with_capacity(source.len() + subtitle.len());
            updated.push_str(&source[..position]);
            let _ = write!(updated, "#SUBTITLE:{subtitle};");
            updated.push_str(&source[position + EMPTY_SUBTITLE_TAG.len()..]);
            updated
        }
        None => source.to_string(),
    }
}
