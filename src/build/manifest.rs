//! Manifest persistence.
//!
//! The manifest is the serialized route table, written after every
//! successful build so that an out-of-process server can route without
//! re-running discovery.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::discovery::RouteTable;
use crate::error::BuildError;

pub const MANIFEST_FILE: &str = "functions/manifest.json";

pub fn manifest_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(MANIFEST_FILE)
}

/// Write the table to `<cache_dir>/functions/manifest.json`.
///
/// Written to a temporary file first and renamed, so readers never see a
/// partial manifest.
pub fn write_manifest(cache_dir: &Path, table: &RouteTable) -> Result<PathBuf, BuildError> {
    let path = manifest_path(cache_dir);
    let io_err = |source| BuildError::Manifest {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, table)?;
        writer.flush().map_err(io_err)?;
    }
    fs::rename(&tmp, &path).map_err(io_err)?;

    tracing::debug!(path = %path.display(), routes = table.len(), "Manifest written");
    Ok(path)
}

pub fn read_manifest(path: &Path) -> Result<RouteTable, BuildError> {
    let file = File::open(path).map_err(|source| BuildError::Manifest {
        path: path.to_path_buf(),
        source,
    })?;
    let table: RouteTable = serde_json::from_reader(BufReader::new(file))?;
    tracing::info!(path = %path.display(), routes = table.len(), "Loaded manifest");
    Ok(table)
}
