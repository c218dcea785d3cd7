use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

/// A downloaded document on disk for the duration of one pipeline run.
/// The file is removed by `remove`, or on drop if the run bails out early.
#[derive(Debug)]
pub struct TransientFile {
    inner: NamedTempFile,
}

impl TransientFile {
    pub fn create(dir: &Path, suffix: &str, bytes: &[u8]) -> std::io::Result<Self> {
        let mut inner = tempfile::Builder::new()
            .prefix("paper-")
            .suffix(suffix)
            .tempfile_in(dir)?;
        inner.write_all(bytes)?;
        inner.flush()?;
        debug!(path = %inner.path().display(), bytes = bytes.len(), "wrote transient file");
        Ok(Self { inner })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    pub fn remove(self) -> std::io::Result<()> {
        let path = self.inner.path().to_path_buf();
        self.inner.close()?;
        debug!(path = %path.display(), "removed transient file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn create_writes_bytes_with_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let file = TransientFile::create(dir.path(), ".pdf", b"%PDF-1.7").unwrap();

        let name = file.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("paper-") && name.ends_with(".pdf"), "got: {name}");
        assert_eq!(std::fs::read(file.path()).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = TransientFile::create(dir.path(), ".txt", b"text").unwrap();
        assert_eq!(entries(dir.path()), 1);

        file.remove().unwrap();
        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn drop_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _file = TransientFile::create(dir.path(), ".html", b"<p>x</p>").unwrap();
            assert_eq!(entries(dir.path()), 1);
        }
        assert_eq!(entries(dir.path()), 0);
    }
}
