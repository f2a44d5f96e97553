use crate::error::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to a segment file name for its staging file.
pub const STAGING_SUFFIX: &str = ".tmp";

/// Append-only staging buffer for a segment's incoming payloads.
///
/// Appended bytes accumulate in a temp file next to the segment file
/// and are copied onto the segment's tail at persist. Until then they
/// are not readable through the segment.
#[derive(Debug)]
pub struct StagingBuffer {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    staged: u64,
}

impl StagingBuffer {
    /// Staging buffer for the segment at `segment_path`. No file is
    /// created until the first append.
    pub fn new(segment_path: &Path) -> StagingBuffer {
        let mut name = segment_path.as_os_str().to_os_string();
        name.push(STAGING_SUFFIX);
        StagingBuffer {
            path: PathBuf::from(name),
            writer: None,
            staged: 0,
        }
    }

    /// Append bytes to the staging file, creating it on first use.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(data)?;
            self.staged += data.len() as u64;
        }
        Ok(())
    }

    /// Bytes appended since the last merge or discard.
    pub fn staged(&self) -> u64 {
        self.staged
    }

    pub fn is_empty(&self) -> bool {
        self.staged == 0
    }

    /// Drain buffered writes to the staging file without merging.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Copy the staged bytes onto the end of `target`, then remove the
    /// staging file. Returns the number of bytes merged. A missing
    /// staging file with nothing staged is a no-op.
    pub fn merge_into(&mut self, target: &mut File) -> Result<u64> {
        self.flush()?;
        self.writer = None;

        if !self.path.exists() {
            if self.staged > 0 {
                tracing::warn!(
                    staging = %self.path.display(),
                    staged = self.staged,
                    "staging file missing at merge, staged bytes lost"
                );
            }
            self.staged = 0;
            return Ok(0);
        }

        let mut source = File::open(&self.path)?;
        target.seek(SeekFrom::End(0))?;
        let merged = io::copy(&mut source, target)?;
        drop(source);
        fs::remove_file(&self.path)?;
        self.staged = 0;
        Ok(merged)
    }

    /// Drop any staged bytes and remove the staging file if present.
    pub fn discard(&mut self) -> Result<()> {
        self.writer = None;
        self.staged = 0;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_append_accumulates_in_temp_file() {
        let dir = TempDir::new().unwrap();
        let segment_path = dir.path().join("hoard00000000.seg");
        let mut staging = StagingBuffer::new(&segment_path);

        assert!(staging.is_empty());
        staging.append(b"hello").unwrap();
        staging.append(b"world").unwrap();
        assert_eq!(staging.staged(), 10);
        assert!(staging.path().to_string_lossy().ends_with(".seg.tmp"));

        staging.flush().unwrap();
        let bytes = fs::read(staging.path()).unwrap();
        assert_eq!(bytes, b"helloworld");
    }

    #[test]
    fn test_merge_appends_to_target_and_removes_temp() {
        let dir = TempDir::new().unwrap();
        let segment_path = dir.path().join("hoard00000000.seg");
        let mut target = File::create(&segment_path).unwrap();
        target.write_all(b"HEAD").unwrap();

        let mut staging = StagingBuffer::new(&segment_path);
        staging.append(b"tail").unwrap();
        let merged = staging.merge_into(&mut target).unwrap();
        assert_eq!(merged, 4);
        assert!(staging.is_empty());
        assert!(!staging.path().exists());

        let mut contents = String::new();
        File::open(&segment_path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "HEADtail");
    }

    #[test]
    fn test_merge_with_nothing_staged_is_noop() {
        let dir = TempDir::new().unwrap();
        let segment_path = dir.path().join("hoard00000000.seg");
        let mut target = File::create(&segment_path).unwrap();

        let mut staging = StagingBuffer::new(&segment_path);
        let merged = staging.merge_into(&mut target).unwrap();
        assert_eq!(merged, 0);
    }

    #[test]
    fn test_discard_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let segment_path = dir.path().join("hoard00000000.seg");
        let mut staging = StagingBuffer::new(&segment_path);
        staging.append(b"doomed").unwrap();
        staging.flush().unwrap();
        assert!(staging.path().exists());

        staging.discard().unwrap();
        assert!(!staging.path().exists());
        assert!(staging.is_empty());

        // Appending again starts a fresh file.
        staging.append(b"new").unwrap();
        assert_eq!(staging.staged(), 3);
    }
}
