// File-level helpers around the buffer codec.
//
// Provides `mangle_file()` / `unmangle_file()` for single files and
// `run_batch()` for many. Each file is read fully, processed in memory and
// written through a `BufWriter`. Optionally computes SHA-256 checksums of
// input and output (feature-gated behind `file-io`).

use std::cmp::Reverse;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "file-io")]
use sha2::Digest;
use thiserror::Error;

use crate::engine::{self, Options};
use crate::error::CodecError;

/// Appended to the file stem of mangled outputs.
pub const MANGLED_SUFFIX: &str = "_mang";
/// Appended to the file stem of unmangled outputs.
pub const UNMANGLED_SUFFIX: &str = "_unmang";

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Mangle,
    Unmangle,
}

impl Direction {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Mangle => MANGLED_SUFFIX,
            Self::Unmangle => UNMANGLED_SUFFIX,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Mangle => "mangle",
            Self::Unmangle => "unmangle",
        }
    }
}

/// `out_dir/<stem><suffix><.ext>`, so `level1.dat` becomes
/// `level1_mang.dat`.
pub fn output_path(input: &Path, out_dir: &Path, direction: Direction) -> PathBuf {
    let mut name = input.file_stem().unwrap_or_default().to_os_string();
    name.push(direction.suffix());
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    out_dir.join(name)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `mangle_file()` and `unmangle_file()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub input_size: u64,
    pub output_size: u64,
    /// SHA-256 of the input file (if `file-io` feature is enabled).
    pub input_sha256: Option<[u8; 32]>,
    /// SHA-256 of the written output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file operations. Every variant names the file involved.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("{}: output exists (use --force to overwrite)", path.display())]
    OutputExists { path: PathBuf },
}

impl IoError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// The codec error behind this failure, if any.
    pub fn codec_error(&self) -> Option<&CodecError> {
        match self {
            Self::Codec { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Single files
// ---------------------------------------------------------------------------

/// Mangle `input` into `output`, verifying the result before writing it.
///
/// Refuses to replace an existing `output` unless `force` is set.
pub fn mangle_file(
    input: &Path,
    output: &Path,
    opts: &Options,
    force: bool,
) -> Result<FileStats, IoError> {
    process_file(input, output, Direction::Mangle, opts, force)
}

/// Unmangle `input` into `output`.
///
/// Refuses to replace an existing `output` unless `force` is set.
pub fn unmangle_file(
    input: &Path,
    output: &Path,
    opts: &Options,
    force: bool,
) -> Result<FileStats, IoError> {
    process_file(input, output, Direction::Unmangle, opts, force)
}

fn process_file(
    input: &Path,
    output: &Path,
    direction: Direction,
    opts: &Options,
    force: bool,
) -> Result<FileStats, IoError> {
    if !force && output.exists() {
        return Err(IoError::OutputExists {
            path: output.to_path_buf(),
        });
    }

    if direction == Direction::Mangle {
        let len = fs::metadata(input).map_err(|e| IoError::io(input, e))?.len();
        if len > opts.max_len as u64 {
            return Err(IoError::Codec {
                path: input.to_path_buf(),
                source: CodecError::SizeLimit {
                    len,
                    limit: opts.max_len,
                },
            });
        }
    }

    let data = fs::read(input).map_err(|e| IoError::io(input, e))?;
    let result = match direction {
        Direction::Mangle => engine::mangle_verified_with_options(&data, opts),
        Direction::Unmangle => engine::unmangle_with_options(&data, opts),
    }
    .map_err(|source| IoError::Codec {
        path: input.to_path_buf(),
        source,
    })?;

    let output_sha256 = write_output(output, &result)?;
    debug!(
        "{} {} -> {} ({} -> {} bytes)",
        direction.name(),
        input.display(),
        output.display(),
        data.len(),
        result.len()
    );

    Ok(FileStats {
        input_size: data.len() as u64,
        output_size: result.len() as u64,
        input_sha256: sha256(&data),
        output_sha256,
    })
}

fn write_output(path: &Path, data: &[u8]) -> Result<Option<[u8; 32]>, IoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IoError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| IoError::io(path, e))?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, file);

    #[cfg(feature = "file-io")]
    let digest = {
        let mut hasher = sha2::Sha256::new();
        let mut hashing_writer = HashingWriter {
            inner: &mut writer,
            hasher: &mut hasher,
        };
        hashing_writer
            .write_all(data)
            .map_err(|e| IoError::io(path, e))?;
        Some(hasher.finalize().into())
    };

    #[cfg(not(feature = "file-io"))]
    let digest: Option<[u8; 32]> = {
        writer.write_all(data).map_err(|e| IoError::io(path, e))?;
        None
    };

    writer.flush().map_err(|e| IoError::io(path, e))?;
    Ok(digest)
}

#[cfg(feature = "file-io")]
fn sha256(data: &[u8]) -> Option<[u8; 32]> {
    Some(sha2::Sha256::digest(data).into())
}

#[cfg(not(feature = "file-io"))]
fn sha256(_data: &[u8]) -> Option<[u8; 32]> {
    None
}

/// Lowercase hex rendering of a digest.
pub fn hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Result of processing one file in a batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<FileStats, IoError>,
}

/// Per-file outcomes and totals for one `run_batch()` call.
#[derive(Debug)]
pub struct BatchReport {
    pub direction: Direction,
    /// Outcomes in processing order (largest input first).
    pub outcomes: Vec<FileOutcome>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn stats(&self) -> impl Iterator<Item = &FileStats> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Total input bytes of successfully processed files.
    pub fn input_bytes(&self) -> u64 {
        self.stats().map(|s| s.input_size).sum()
    }

    /// Total output bytes of successfully processed files.
    pub fn output_bytes(&self) -> u64 {
        self.stats().map(|s| s.output_size).sum()
    }

    /// Output bytes per input byte, or `None` when nothing was read.
    pub fn ratio(&self) -> Option<f64> {
        let input = self.input_bytes();
        (input > 0).then(|| self.output_bytes() as f64 / input as f64)
    }
}

/// Process every input into `out_dir`, largest file first.
///
/// Files are independent: a failure is recorded in its `FileOutcome` and
/// the remaining files are still processed. With the `parallel` feature the
/// files are spread over the rayon thread pool.
pub fn run_batch(
    inputs: &[PathBuf],
    out_dir: &Path,
    direction: Direction,
    opts: &Options,
    force: bool,
) -> BatchReport {
    let start = Instant::now();

    let mut jobs: Vec<(&PathBuf, u64)> = inputs
        .iter()
        .map(|p| (p, fs::metadata(p).map(|m| m.len()).unwrap_or(0)))
        .collect();
    jobs.sort_by_key(|&(_, len)| Reverse(len));

    let run = |&(input, _): &(&PathBuf, u64)| {
        let output = output_path(input, out_dir, direction);
        let result = process_file(input, &output, direction, opts, force);
        if let Err(e) = &result {
            warn!("{} failed: {e}", direction.name());
        }
        FileOutcome {
            input: input.clone(),
            output,
            result,
        }
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<FileOutcome> = jobs.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<FileOutcome> = jobs.iter().map(run).collect();

    BatchReport {
        direction,
        outcomes,
        elapsed: start.elapsed(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
