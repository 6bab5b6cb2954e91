use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::{
    chart::{ChartDocument, ChartSection, LANE_COUNT, NoteGrid},
    error::StepgaugeError,
};

pub const FINGERPRINT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartFingerprint {
    pub schema_version: u32,
    pub level_index: usize,
    pub difficulty: String,
    pub row_count: usize,
    pub measure_count: usize,
    pub note_count: usize,
    pub lane_counts: [usize; LANE_COUNT],
    pub body_hash: String,
}

#[instrument(skip(section), fields(level = section.meta.level_index))]
#[must_use]
pub fn fingerprint_section(section: &ChartSection) -> ChartFingerprint {
    let lane_counts = section.grid.lane_counts();
    ChartFingerprint {
        schema_version: FINGERPRINT_SCHEMA_VERSION,
        level_index: section.meta.level_index,
        difficulty: section.meta.difficulty.clone(),
        row_count: section.grid.row_count(),
        measure_count: section.grid.measure_count(),
        note_count: lane_counts.iter().sum(),
        lane_counts,
        body_hash: body_hash(&section.grid),
    }
}

pub fn fingerprint_level(
    document: &ChartDocument,
    level_index: usize,
) -> Result<ChartFingerprint, StepgaugeError> {
    document.section(level_index).map(fingerprint_section)
}

/// Lowercase hex SHA-256 of the canonical body lines joined by `\n`.
#[must_use]
pub fn body_hash(grid: &NoteGrid) -> String {
    let digest = Sha256::digest(grid.body_lines().join("\n").as_bytes());
    format!("{digest:x}")
}

pub fn read_fingerprint(path: &Path) -> Result<ChartFingerprint> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read fingerprint: {}", path.display()))?;
    let fingerprint: ChartFingerprint =
        serde_json::from_slice(&bytes).context("failed to parse fingerprint json")?;
    Ok(fingerprint)
}

pub fn write_fingerprint(path: &Path, fingerprint: &ChartFingerprint) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create fingerprint directory: {}", parent.display())
        })?;
    }

    let json =
        serde_json::to_vec_pretty(fingerprint).context("failed to encode fingerprint json")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write fingerprint: {}", path.display()))?;
    Ok(())
}
