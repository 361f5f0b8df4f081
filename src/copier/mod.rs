//! Streaming copy engine.
//!
//! [`copy`] moves every remaining byte of a [`Read`] source into a [`Write`]
//! sink through a bounded transfer buffer whose size comes from the
//! [`CopyStrategy`].  The whole source is never held in memory, whatever its
//! size.
//!
//! # Ownership
//! Source and sink are borrowed for the duration of the call.  Neither is
//! closed; [`copy_file`] is the variant that opens and closes files itself.
//!
//! # Failure
//! A failed read surfaces as [`Error::Read`], a failed write or flush as
//! [`Error::Write`].  Nothing is retried and nothing is rolled back: every
//! chunk written before the failure stays in the sink.  Reads interrupted by
//! a signal (`ErrorKind::Interrupted`) are simply reissued.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::Error;
use crate::strategy::{CopyMode, CopyStrategy};

/// Outcome of a completed copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyReport {
    /// Bytes read from the source, which equals bytes written to the sink.
    pub total_bytes: u64,
    /// Non-empty reads transferred.
    pub chunks:      u64,
}

/// Copy `source` to `sink` until end-of-data.
pub fn copy<R, W>(source: &mut R, sink: &mut W, strategy: &CopyStrategy) -> Result<CopyReport, Error>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    copy_with_trace(source, sink, strategy, |_| {})
}

/// [`copy`] with a callback invoked with the length of every chunk, after
/// that chunk has been handed to the sink.  In `BufferedBlock` mode the bytes
/// may still sit in the write buffer when the callback runs.
pub fn copy_with_trace<R, W, F>(
    source:       &mut R,
    sink:         &mut W,
    strategy:     &CopyStrategy,
    mut on_chunk: F,
) -> Result<CopyReport, Error>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(usize),
{
    strategy.validate()?;
    let chunk_size = strategy.effective_chunk_size();
    debug!(mode = %strategy.mode, chunk_size, "copy started");

    let report = match strategy.mode {
        CopyMode::Unbuffered | CopyMode::FixedBlock => {
            pump(source, sink, chunk_size, &mut on_chunk)?
        }
        CopyMode::BufferedBlock => {
            let mut reader = BufReader::with_capacity(chunk_size, source);
            let mut writer = BufWriter::with_capacity(chunk_size, sink);
            let report = pump(&mut reader, &mut writer, chunk_size, &mut on_chunk)?;
            writer.flush().map_err(Error::Write)?;
            report
        }
    };

    debug!(total_bytes = report.total_bytes, chunks = report.chunks, "copy finished");
    Ok(report)
}

/// Open `input`, create or truncate `output`, and copy one into the other.
///
/// Both files are closed on every exit path.  The strategy is validated
/// before `output` is touched, and `output` naming the same file as `input`
/// is refused before it can be truncated.  I/O failures name the path
/// involved.
pub fn copy_file(input: &Path, output: &Path, strategy: &CopyStrategy) -> Result<CopyReport, Error> {
    copy_file_with_trace(input, output, strategy, |_| {})
}

pub fn copy_file_with_trace<F>(
    input:    &Path,
    output:   &Path,
    strategy: &CopyStrategy,
    on_chunk: F,
) -> Result<CopyReport, Error>
where
    F: FnMut(usize),
{
    strategy.validate()?;
    let mut src = File::open(input).map_err(|e| Error::path(input, e))?;
    if is_same_file(&src, input, output)? {
        return Err(Error::InvalidArgument(format!(
            "{} and {} are the same file",
            input.display(),
            output.display()
        )));
    }
    let mut dst = File::create(output).map_err(|e| Error::path(output, e))?;

    copy_with_trace(&mut src, &mut dst, strategy, on_chunk).map_err(|e| match e {
        Error::Read(_)  => e.at_path(input),
        Error::Write(_) => e.at_path(output),
        other           => other,
    })
}

fn pump<R, W, F>(source: &mut R, sink: &mut W, chunk_size: usize, on_chunk: &mut F) -> Result<CopyReport, Error>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: FnMut(usize),
{
    let mut buf    = transfer_buffer(chunk_size)?;
    let mut report = CopyReport::default();

    loop {
        let n = match source.read(&mut buf) {
            Ok(0)  => break,
            Ok(n)  => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Read(e)),
        };
        sink.write_all(&buf[..n]).map_err(Error::Write)?;

        report.total_bytes += n as u64;
        report.chunks      += 1;
        trace!(len = n, total = report.total_bytes, "chunk written");
        on_chunk(n);
    }
    Ok(report)
}

fn transfer_buffer(len: usize) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| {
        Error::InvalidArgument(format!("cannot allocate a {len} byte transfer buffer: {e}"))
    })?;
    buf.resize(len, 0);
    Ok(buf)
}

/// `true` if `output` exists and is the file already opened as `src`.
fn is_same_file(src: &File, input: &Path, output: &Path) -> Result<bool, Error> {
    let out_meta = match fs::metadata(output) {
        Ok(m)  => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::path(output, e)),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let in_meta = src.metadata().map_err(|e| Error::path(input, e))?;
        Ok(in_meta.dev() == out_meta.dev() && in_meta.ino() == out_meta.ino())
    }

    #[cfg(not(unix))]
    {
        let _ = (src, out_meta);
        let a = fs::canonicalize(input).map_err(|e| Error::path(input, e))?;
        let b = fs::canonicalize(output).map_err(|e| Error::path(output, e))?;
        Ok(a == b)
    }
}
