//! Copies cover images to the hand-off file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("could not open input file `{}`: {source}", .path.display())]
    OpenSource { path: PathBuf, source: io::Error },
    #[error("could not open output file `{}`: {source}", .path.display())]
    OpenDest { path: PathBuf, source: io::Error },
    #[error("copy interrupted: {0}")]
    Io(#[from] io::Error),
}

/// Copies `source` over `dest` chunk by chunk.
///
/// `dest` is created if missing and truncated otherwise, so after success it holds exactly
/// the bytes of `source`. It is written in place: a reader may observe a partial file while
/// the copy is running.
///
/// # Returns
/// The number of bytes copied.
///
/// # Errors
/// See [`CopyError`].
pub fn copy_file(source: &Path, dest: &Path) -> Result<u64, CopyError> {
    let mut input = File::open(source).map_err(|err| CopyError::OpenSource {
        path: source.to_path_buf(),
        source: err,
    })?;
    let mut output = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dest)
        .map_err(|err| CopyError::OpenDest {
            path: dest.to_path_buf(),
            source: err,
        })?;

    let mut buf = [0_u8; CHUNK_SIZE];
    let mut total = 0_u64;
    loop {
        let read = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(CopyError::Io(err)),
        };
        output.write_all(&buf[..read])?;
        total += read as u64;
    }
    output.flush()?;
    Ok(total)
}
