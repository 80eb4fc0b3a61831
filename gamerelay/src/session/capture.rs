use std::{
    collections::HashMap,
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
};

use tokio::{io::AsyncWriteExt, sync::mpsc};
use tracing::{debug, warn};

use crate::error::RelayError;

struct CaptureEntry<W> {
    path: PathBuf,
    remaining: u32,
    writer: W,
}

/// What applying a chunk did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureProgress {
    /// No capture is open under that basename.
    NotCapturing,
    InProgress { remaining: u32 },
    Completed { path: PathBuf },
}

/// In-progress file extractions, keyed by basename.
pub struct FileCaptures<W: Write> {
    entries: HashMap<String, CaptureEntry<W>>,
}

impl<W: Write> Default for FileCaptures<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> FileCaptures<W> {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_capturing(&self, basename: &str) -> bool {
        self.entries.contains_key(basename)
    }

    pub fn remaining(&self, basename: &str) -> Option<u32> {
        self.entries.get(basename).map(|e| e.remaining)
    }

    /// Starts capturing `size` bytes into `writer`. A zero-byte file is complete right away and
    /// no entry is kept. Reopening a basename abandons the previous capture.
    pub fn open(&mut self, basename: String, path: PathBuf, writer: W, size: u32) -> CaptureProgress {
        if size == 0 {
            self.entries.remove(&basename);
            return CaptureProgress::Completed { path };
        }

        let entry = CaptureEntry {
            path,
            remaining: size,
            writer,
        };

        if let Some(previous) = self.entries.insert(basename, entry) {
            debug!("Abandoning capture into {} with {} bytes left", previous.path.display(), previous.remaining);
        }

        CaptureProgress::InProgress { remaining: size }
    }

    /// Appends a chunk. A chunk larger than what's left abandons the capture without writing
    /// anything.
    pub fn apply_chunk(&mut self, basename: &str, data: &[u8]) -> Result<CaptureProgress, RelayError> {
        let entry = match self.entries.get_mut(basename) {
            Some(entry) => entry,
            None => return Ok(CaptureProgress::NotCapturing),
        };

        if data.len() > entry.remaining as usize {
            let remaining = entry.remaining;
            self.entries.remove(basename);
            return Err(RelayError::CaptureOverrun {
                basename: basename.to_string(),
                remaining,
                chunk: data.len(),
            });
        }

        if let Err(error) = entry.writer.write_all(data) {
            self.entries.remove(basename);
            return Err(RelayError::Io(error));
        }

        entry.remaining -= data.len() as u32;
        if entry.remaining != 0 {
            return Ok(CaptureProgress::InProgress {
                remaining: entry.remaining,
            });
        }

        match self.entries.remove(basename) {
            Some(mut entry) => {
                entry.writer.flush()?;
                Ok(CaptureProgress::Completed { path: entry.path })
            }
            None => Ok(CaptureProgress::NotCapturing),
        }
    }
}

/// A file being written by a local task, so the event loop never waits on the disk.
///
/// Writes only queue the bytes. The task creates the file, writes everything queued in order and
/// closes the file once this handle is dropped. Failures are logged, the relay doesn't hear about
/// them.
pub struct CaptureFile {
    chunks: mpsc::UnboundedSender<Vec<u8>>,
}

impl CaptureFile {
    pub fn create(path: PathBuf) -> Self {
        let (chunks, chunks_rx) = mpsc::unbounded_channel();
        tokio::task::spawn_local(async move {
            if let Err(error) = write_capture(&path, chunks_rx).await {
                warn!("Capture into {} failed: {error}", path.display());
            }
        });

        Self { chunks }
    }
}

async fn write_capture(path: &Path, mut chunks: mpsc::UnboundedReceiver<Vec<u8>>) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = chunks.recv().await {
        file.write_all(&chunk).await?;
    }

    file.flush().await
}

impl Write for CaptureFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.chunks.send(buf.to_vec()) {
            Ok(()) => Ok(buf.len()),
            Err(_) => Err(io::Error::new(ErrorKind::BrokenPipe, "capture writer stopped")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Where a captured file goes: `<dir>/<session id in hex>-<basename>`, with anything that isn't
/// safe in a file name replaced.
pub fn capture_path(dir: &Path, session_id: u64, basename: &str) -> PathBuf {
    let mut name: String = basename
        .chars()
        .map(|c| match c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
            true => c,
            false => '_',
        })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        name = "unnamed".to_string();
    }

    dir.join(format!("{session_id:016x}-{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_capture(captures: &mut FileCaptures<Vec<u8>>, size: u32) {
        let progress = captures.open("quest.dat".to_string(), PathBuf::from("q"), Vec::new(), size);
        assert_eq!(progress, CaptureProgress::InProgress { remaining: size });
    }

    #[test]
    fn test_chunks_summing_to_size_complete() {
        let mut captures = FileCaptures::new();
        open_capture(&mut captures, 10);

        assert_eq!(
            captures.apply_chunk("quest.dat", &[1; 4]).unwrap(),
            CaptureProgress::InProgress { remaining: 6 }
        );
        assert_eq!(captures.remaining("quest.dat"), Some(6));
        assert_eq!(
            captures.apply_chunk("quest.dat", &[2; 6]).unwrap(),
            CaptureProgress::Completed { path: PathBuf::from("q") }
        );
        assert!(captures.is_empty());
    }

    #[test]
    fn test_overrun_abandons_only_that_capture() {
        let mut captures = FileCaptures::new();
        open_capture(&mut captures, 5);
        captures.open("other.bin".to_string(), PathBuf::from("o"), Vec::new(), 3);

        captures.apply_chunk("quest.dat", &[0; 3]).unwrap();
        let error = captures.apply_chunk("quest.dat", &[0; 3]).unwrap_err();
        assert!(matches!(
            error,
            RelayError::CaptureOverrun { remaining: 2, chunk: 3, .. }
        ));

        assert!(!captures.is_capturing("quest.dat"));
        assert_eq!(captures.remaining("other.bin"), Some(3));
    }

    #[test]
    fn test_zero_size_completes_on_open() {
        let mut captures = FileCaptures::new();
        let progress = captures.open("empty".to_string(), PathBuf::from("e"), Vec::new(), 0);
        assert_eq!(progress, CaptureProgress::Completed { path: PathBuf::from("e") });
        assert!(captures.is_empty());
    }

    #[test]
    fn test_chunk_without_capture() {
        let mut captures = FileCaptures::<Vec<u8>>::new();
        assert_eq!(captures.apply_chunk("nope", &[1]).unwrap(), CaptureProgress::NotCapturing);
    }

    #[tokio::test]
    async fn test_capture_file_writes_in_the_background() {
        let path = std::env::temp_dir().join(format!("gamerelay-capture-{:08x}", rand::random::<u32>()));

        tokio::task::LocalSet::new()
            .run_until(async {
                let mut captures = FileCaptures::new();
                captures.open("quest.dat".to_string(), path.clone(), CaptureFile::create(path.clone()), 5);
                captures.apply_chunk("quest.dat", b"he").unwrap();
                let progress = captures.apply_chunk("quest.dat", b"llo").unwrap();
                assert_eq!(progress, CaptureProgress::Completed { path: path.clone() });

                for _ in 0..200 {
                    if std::fs::read(&path).ok().as_deref() == Some(b"hello".as_slice()) {
                        break;
                    }

                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            })
            .await;

        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_capture_path_is_sanitised() {
        let path = capture_path(Path::new("/tmp/caps"), 0x2A, "../etc/passwd");
        assert_eq!(path, Path::new("/tmp/caps/000000000000002a-.._etc_passwd"));
        assert_eq!(capture_path(Path::new("d"), 1, ".."), Path::new("d/0000000000000001-unnamed"));
    }
}
