use std::{fs, path::Path};

use anyhow::{Context, Result};
use encoding_rs::{UTF_8, WINDOWS_1252};
use tracing::{debug, instrument};

#[instrument(fields(path = %path.display()))]
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(decode_text(&bytes))
}

/// UTF-8 (BOM tolerated), falling back to Windows-1252 for legacy files.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    let (text, _, had_errors) = UTF_8.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }

    debug!("input is not valid utf-8, decoding as windows-1252");
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}
