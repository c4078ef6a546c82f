use futures::Stream;
use std::fs::{File, Metadata};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("failed to open {}: {}", .path.display(), .source)]
    Open { path: PathBuf, source: io::Error },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Where following starts when the file is first opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailCursor {
    Start,
    Offset(u64),
}

#[derive(Debug, Clone)]
pub struct FollowConfig {
    /// Wait between checks for new content at end of file
    pub poll_interval: Duration,
    /// How long a removed file may stay missing before the stream closes
    pub reopen_grace: Duration,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            reopen_grace: Duration::from_secs(60),
        }
    }
}

/// Follows a growing file and yields complete lines as they are appended.
///
/// Rotation (the path now names a different inode) and truncation both
/// restart reading from byte 0 of the current file. A trailing line without
/// a newline is held back until its newline arrives, or flushed when the
/// file is rotated away.
pub struct Follower {
    path: PathBuf,
    config: FollowConfig,

    file: Option<BufReader<File>>,
    file_inode: Option<u64>,
    current_offset: u64,
    pending: Vec<u8>,
    missing_since: Option<Instant>,
}

impl Follower {
    /// Opens `path` at `cursor`. The file must exist.
    pub fn open(path: &Path, cursor: TailCursor, config: FollowConfig) -> Result<Self, FollowError> {
        let file = File::open(path).map_err(|source| FollowError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let metadata = file.metadata()?;
        let mut reader = BufReader::new(file);

        let offset = match cursor {
            TailCursor::Start => 0,
            TailCursor::Offset(offset) => offset,
        };
        reader.seek(SeekFrom::Start(offset))?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
            file: Some(reader),
            file_inode: Some(get_inode(&metadata)),
            current_offset: offset,
            pending: Vec::new(),
            missing_since: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset just after the last byte read from the current file
    pub fn offset(&self) -> u64 {
        self.current_offset
    }

    /// Waits for the next complete line.
    ///
    /// Returns `Ok(None)` once the file has been gone for longer than the
    /// reopen grace period, or when `cancel` fires.
    pub async fn next_line(&mut self, cancel: &CancellationToken) -> Result<Option<String>, FollowError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            if self.file.is_none() && !self.reopen()? {
                let missing_since = *self.missing_since.get_or_insert_with(Instant::now);
                if missing_since.elapsed() >= self.config.reopen_grace {
                    info!(path = %self.path.display(), "File removed and not recreated, closing");
                    return Ok(None);
                }
                if !self.wait(cancel).await {
                    return Ok(None);
                }
                continue;
            }

            let bytes_read = match self.file.as_mut() {
                Some(file) => file.read_until(b'\n', &mut self.pending)?,
                None => continue,
            };

            if bytes_read > 0 {
                self.current_offset += bytes_read as u64;
                if self.pending.last() == Some(&b'\n') {
                    return Ok(Some(self.take_pending()));
                }
                // Partial line at EOF, keep it and look for the rest
                continue;
            }

            match self.check_rotation()? {
                Rotation::None => {}
                Rotation::Truncated => {
                    warn!(path = %self.path.display(), "File truncated, reading from start");
                    if let Some(file) = self.file.as_mut() {
                        file.seek(SeekFrom::Start(0))?;
                    }
                    self.current_offset = 0;
                    self.pending.clear();
                    continue;
                }
                Rotation::Replaced | Rotation::Removed => {
                    debug!(path = %self.path.display(), "File rotated, reopening");
                    self.file = None;
                    self.file_inode = None;
                    self.current_offset = 0;
                    if !self.pending.is_empty() {
                        return Ok(Some(self.take_pending()));
                    }
                    continue;
                }
            }

            if !self.wait(cancel).await {
                return Ok(None);
            }
        }
    }

    /// Converts the follower into a stream of lines that ends when the file
    /// goes away or `cancel` fires.
    pub fn into_stream(
        self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<String, FollowError>> {
        futures::stream::unfold(Some((self, cancel)), |state| async move {
            let (mut follower, cancel) = state?;
            match follower.next_line(&cancel).await {
                Ok(Some(line)) => Some((Ok(line), Some((follower, cancel)))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    fn take_pending(&mut self) -> String {
        let bytes = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&bytes);
        // One terminator only: "\n" or "\r\n"
        let line = text.strip_suffix('\n').unwrap_or(&text);
        line.strip_suffix('\r').unwrap_or(line).to_string()
    }

    /// Tries to open the path again after rotation. `Ok(false)` if it is
    /// still missing.
    fn reopen(&mut self) -> Result<bool, FollowError> {
        match File::open(&self.path) {
            Ok(file) => {
                let metadata = file.metadata()?;
                self.file_inode = Some(get_inode(&metadata));
                self.file = Some(BufReader::new(file));
                self.current_offset = 0;
                self.missing_since = None;
                info!(path = %self.path.display(), "Reopened file");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn check_rotation(&self) -> Result<Rotation, FollowError> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Rotation::Removed),
            Err(e) => return Err(e.into()),
        };

        if self.file_inode != Some(get_inode(&metadata)) {
            return Ok(Rotation::Replaced);
        }
        if metadata.len() < self.current_offset {
            return Ok(Rotation::Truncated);
        }
        Ok(Rotation::None)
    }

    /// Sleeps one poll interval; false if cancelled meanwhile.
    async fn wait(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sleep(self.config.poll_interval) => true,
        }
    }
}

enum Rotation {
    None,
    Truncated,
    Replaced,
    Removed,
}

#[cfg(unix)]
fn get_inode(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn get_inode(metadata: &Metadata) -> u64 {
    // Creation time stands in for an inode; it changes when the path is recreated.
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    if let Ok(created) = metadata.created() {
        created.hash(&mut hasher);
    }
    hasher.finish()
}
