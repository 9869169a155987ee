//! On-disk copy of a domain descriptor.
//!
//! Saved when a domain starts so the descriptor can be found again when its
//! unit is recovered after a restart.

use std::path::{Path, PathBuf};

use convirt_common::constants::DESCRIPTOR_EXTENSION;
use convirt_common::error::{ConvirtError, Result};
use convirt_common::types::RuntimeId;

/// Descriptor file of one runtime, `<run_dir>/<runtime_id>.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFile {
    path: PathBuf,
}

impl DescriptorFile {
    /// Locates the descriptor file of `runtime_id`. Nothing is read.
    #[must_use]
    pub fn new(run_dir: &Path, runtime_id: &RuntimeId) -> Self {
        Self {
            path: run_dir.join(format!("{runtime_id}.{DESCRIPTOR_EXTENSION}")),
        }
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether a descriptor was saved.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes `descriptor`, creating the run directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, descriptor: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(ConvirtError::io(parent))?;
        }
        std::fs::write(&self.path, descriptor).map_err(ConvirtError::io(&self.path))?;
        tracing::debug!(path = %self.path.display(), "descriptor saved");
        Ok(())
    }

    /// Reads the saved descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unreadable.
    pub fn load(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(ConvirtError::io(&self.path))
    }

    /// Removes the saved descriptor. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "descriptor cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConvirtError::io(&self.path)(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_keyed_by_runtime_id() {
        let file = DescriptorFile::new(Path::new("/run/convirt"), &RuntimeId::new("abc"));
        assert_eq!(file.path(), Path::new("/run/convirt/abc.xml"));
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = DescriptorFile::new(&dir.path().join("nested"), &RuntimeId::new("abc"));
        assert!(!file.exists());

        file.save("<domain/>").expect("save");
        assert!(file.exists());
        assert_eq!(file.load().expect("load"), "<domain/>");

        file.clear().expect("clear");
        assert!(!file.exists());
    }

    #[test]
    fn clear_missing_file_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = DescriptorFile::new(dir.path(), &RuntimeId::new("absent"));
        assert!(file.clear().is_ok());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = DescriptorFile::new(dir.path(), &RuntimeId::new("absent"));
        assert!(matches!(file.load(), Err(ConvirtError::Io { .. })));
    }
}
