//! Sequential output naming: `prefix_N.ext` in a results directory.

use std::path::{Path, PathBuf};

use crate::error::{StillreelError, StillreelResult};

/// Pick the next unused sequential output path in `dir`.
///
/// Scans for `{prefix}_{N}.{ext}` and returns `{prefix}_{max+1}.{ext}`,
/// starting at 1 when no match exists. A missing directory counts as empty.
///
/// No locking: concurrent runs sharing a directory may race and pick the
/// same name. Single-writer use only.
pub fn next_output_path(dir: &Path, prefix: &str, ext: &str) -> StillreelResult<PathBuf> {
    let next = next_index(dir, prefix, ext)?;
    Ok(dir.join(format!("{prefix}_{next}.{ext}")))
}

fn next_index(dir: &Path, prefix: &str, ext: &str) -> StillreelResult<u64> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(1),
        Err(e) => {
            return Err(StillreelError::io(format!(
                "failed to scan output directory '{}': {e}",
                dir.display()
            )));
        }
    };

    let mut max_seen = 0u64;
    for entry in entries {
        let entry = entry.map_err(|e| {
            StillreelError::io(format!(
                "failed to scan output directory '{}': {e}",
                dir.display()
            ))
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(n) = parse_sequential(name, prefix, ext) {
            max_seen = max_seen.max(n);
        }
    }
    Ok(max_seen + 1)
}

fn parse_sequential(file_name: &str, prefix: &str, ext: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('_')?;
    let digits = rest.strip_suffix(ext)?.strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
