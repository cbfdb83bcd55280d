use crate::{Error, Result};
use serde::Serialize;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes `value` as pretty JSON (two-space indent, no trailing newline),
/// creating the parent directory when needed.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let write_err = |source| Error::Write { path: path.to_path_buf(), source };
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        create_dir_all(dir).map_err(write_err)?;
    }
    let mut f = BufWriter::new(File::create(path).map_err(write_err)?);
    serde_json::to_writer_pretty(&mut f, value).map_err(|source| Error::Json { path: path.to_path_buf(), source })?;
    f.flush().map_err(write_err)?;
    Ok(())
}
