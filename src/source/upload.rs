//! Uploaded-image sources.
//!
//! Wraps a single uploaded image or an ordered batch of uploads as a
//! `FrameSource`. Decode happens lazily at read time; a file that fails to
//! decode surfaces as a per-frame read error so the caller can record it
//! and continue with the rest of the set.

use std::path::{Path, PathBuf};

use crate::source::{Frame, FrameSource, SourceError};

/// Ordered set of uploaded images, yielded one frame per file.
pub struct ImageSetSource {
    id: String,
    paths: Vec<PathBuf>,
    cursor: usize,
    connected: bool,
}

impl ImageSetSource {
    pub fn new(id: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            id: id.into(),
            paths,
            cursor: 0,
            connected: false,
        }
    }

    /// Single-upload convenience: a set of one.
    pub fn single(id: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(id, vec![path.as_ref().to_path_buf()])
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSetSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        self.connected = true;
        self.cursor = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if !self.connected {
            return Err(SourceError::NotConnected);
        }
        let Some(path) = self.paths.get(self.cursor) else {
            return Err(SourceError::Exhausted);
        };
        let sequence = self.cursor as u64;
        self.cursor += 1;

        let image = image::open(path)
            .map_err(|e| SourceError::Read(format!("decode {}: {}", path.display(), e)))?
            .to_rgb8();
        Ok(Frame {
            image,
            sequence,
        })
    }

    fn close(&mut self) {
        self.connected = false;
    }
}
