//! Bounded, lock-protected log file
//!
//! Each log event is buffered by a [`LogLineWriter`] and, when the writer is
//! dropped, appended to the file under an exclusive OS lock. The file is then
//! trimmed to the most recent `max_lines` lines in the same critical section,
//! so overlapping cron runs never interleave partial lines and the file never
//! exceeds the ceiling after a write.

use std::fs::{DirBuilder, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::MakeWriter;

/// Default line ceiling for the log file
pub const DEFAULT_MAX_LINES: usize = 1000;

#[cfg(unix)]
const LOG_FILE_MODE: u32 = 0o600;

#[cfg(unix)]
const STATE_DIR_MODE: u32 = 0o700;

/// A log file that keeps only its most recent lines
#[derive(Debug, Clone)]
pub struct BoundedLogFile {
    path: PathBuf,
    max_lines: usize,
}

impl BoundedLogFile {
    /// Open (creating if needed) the log file at `path`
    ///
    /// Fails if the parent directory cannot be created or the file cannot be
    /// opened for writing. A ceiling of 0 is raised to 1.
    pub fn open(path: impl Into<PathBuf>, max_lines: usize) -> io::Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_private_dir(parent)?;
        }
        open_for_update(&path)?;

        Ok(Self {
            path,
            max_lines: max_lines.max(1),
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `data` and trim, holding the file lock throughout
    pub fn append(&self, data: &[u8]) -> io::Result<()> {
        let mut file = open_for_update(&self.path)?;
        file.lock()?;

        let result = append_and_trim(&mut file, data, self.max_lines);
        let unlocked = file.unlock();

        result.and(unlocked)
    }
}

impl<'a> MakeWriter<'a> for BoundedLogFile {
    type Writer = LogLineWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LogLineWriter {
            file: self,
            buf: Vec::new(),
        }
    }
}

/// Buffers one formatted event; the write happens on drop
pub struct LogLineWriter<'a> {
    file: &'a BoundedLogFile,
    buf: Vec<u8>,
}

impl Write for LogLineWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogLineWriter<'_> {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        // Logging must never take the process down; report on stderr only
        if let Err(e) = self.file.append(&self.buf) {
            eprintln!(
                "cfddns: failed to write log file {}: {}",
                self.file.path.display(),
                e
            );
        }
    }
}

/// Create `dir` and missing parents, owner-only on Unix
fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(STATE_DIR_MODE);
    }

    builder.create(dir)
}

fn open_for_update(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(LOG_FILE_MODE);
    }

    options.open(path)
}

fn append_and_trim(file: &mut File, data: &[u8], max_lines: usize) -> io::Result<()> {
    let mut contents = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut contents)?;

    // A previous writer may have died mid-line
    if !contents.is_empty() && !contents.ends_with(b"\n") {
        contents.push(b'\n');
    }
    contents.extend_from_slice(data);
    if !contents.ends_with(b"\n") {
        contents.push(b'\n');
    }

    let kept = tail_lines(&contents, max_lines);

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(kept)?;
    file.flush()
}

/// The last `max_lines` newline-terminated lines of `buf`
fn tail_lines(buf: &[u8], max_lines: usize) -> &[u8] {
    let total = buf.iter().filter(|&&b| b == b'\n').count();
    if total <= max_lines {
        return buf;
    }

    let mut to_skip = total - max_lines;
    for (i, &b) in buf.iter().enumerate() {
        if b == b'\n' {
            to_skip -= 1;
            if to_skip == 0 {
                return &buf[i + 1..];
            }
        }
    }
    buf
}
