use std::io::Write;
use std::path::Path;

use rc_domain::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load a JSON document, or the default when the file does not exist.
pub(crate) fn load<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw)
        .map_err(|e| Error::Store(format!("{}: {e}", path.display())))
}

/// Replace `path` atomically: write a sibling temp file, then rename.
pub(crate) fn save<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Store(format!("{} has no parent", path.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
