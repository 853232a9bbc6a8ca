//! Result packaging.
//!
//! Bundles batch artifacts into a single downloadable zip blob, in input
//! order, and releases every artifact's temporary file exactly once —
//! on the success path and on every failure path. Ownership does the
//! bookkeeping: artifacts are consumed by `package`, and a temp file whose
//! bytes never reach the archive is still deleted when its owner drops.

use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::batch::Artifact;

/// Conventional download name for the packaged results.
pub const ARCHIVE_NAME: &str = "detected_images.zip";

/// Write all artifacts into one deflate-compressed zip and return the blob.
pub fn package(artifacts: Vec<Artifact>) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for artifact in artifacts {
        let (name, temp_path) = artifact.into_parts();
        let bytes = std::fs::read(&temp_path)
            .with_context(|| format!("read artifact {}", name))?;
        writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("add {} to archive", name))?;
        writer
            .write_all(&bytes)
            .with_context(|| format!("write {} to archive", name))?;
        temp_path
            .close()
            .with_context(|| format!("remove temp file for {}", name))?;
    }

    let cursor = writer.finish().context("finalize archive")?;
    Ok(cursor.into_inner())
}
