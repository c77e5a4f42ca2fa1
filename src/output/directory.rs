use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use super::{SinkError, Target};

/// Writes every piece as a regular file below `root`.
pub struct Directory {
    root:   PathBuf,
    handle: Option<BufWriter<File>>,
}

impl Directory {
    /// Use `root` as the target, creating it (and its parents) if missing.
    ///
    /// Fails without touching the filesystem if `root` exists and is not a
    /// directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, SinkError> {
        let root = root.as_ref().to_owned();
        if root.exists() {
            if !root.is_dir() {
                error!(path = %root.display(), "specified target is a file, not a directory");
                return Err(SinkError::NotADirectory(root));
            }
        } else {
            fs::create_dir_all(&root).map_err(|source| {
                error!(path = %root.display(), %source, "unable to create target directory");
                SinkError::CreateDir { path: root.clone(), source }
            })?;
            debug!(path = %root.display(), "created target directory");
        }
        Ok(Self { root, handle: None })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Target for Directory {
    /// Create or truncate `<root>/<name>`.  A piece still open is closed first.
    fn open(&mut self, name: &str) -> Result<(), SinkError> {
        if self.handle.is_some() {
            self.close()?;
        }
        let path = self.root.join(name);
        let file = File::create(&path).map_err(|source| {
            error!(path = %path.display(), %source, "unable to open file");
            SinkError::Open { path: path.clone(), source }
        })?;
        debug!(path = %path.display(), "opened output file");
        self.handle = Some(BufWriter::new(file));
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, SinkError> {
        let handle = self.handle.as_mut().ok_or(SinkError::NotOpen)?;
        handle.write_all(data)?;
        Ok(data.len())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let mut handle = self.handle.take().ok_or(SinkError::NotOpen)?;
        handle.flush()?;
        Ok(())
    }
}
