//! Spawns and waits on the image viewer.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::process::ExitStatus;
use thiserror::Error;

use crate::backends::Backend;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("cannot create placeholder cover: {0}")]
    Placeholder(io::Error),
    #[error("cannot spawn image viewer: {0}")]
    CannotSpawn(io::Error),
    #[error("lost track of image viewer: {0}")]
    Wait(io::Error),
    #[error("image viewer exited with {0}")]
    ViewerFailed(ExitStatus),
}

/// Makes sure `path` exists so the viewer has something to open.
/// An existing file is left untouched.
///
/// # Errors
/// [`DisplayError::Placeholder`] if the file cannot be created.
pub fn ensure_placeholder(path: &Path) -> Result<(), DisplayError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(DisplayError::Placeholder)
}

/// Runs the viewer on `image` until it exits.
///
/// # Errors
/// If the viewer cannot be spawned or does not exit successfully.
pub async fn run<T: Backend>(backend: &T, image: &Path) -> Result<(), DisplayError> {
    let mut cmd = backend.get_sys_command(image);
    let mut child = cmd.spawn().map_err(DisplayError::CannotSpawn)?;
    log::debug!("`{}` running with pid {}", backend.get_name(), child.id());

    let status = child.status().await.map_err(DisplayError::Wait)?;
    if status.success() {
        log::debug!("`{}` exited", backend.get_name());
        Ok(())
    } else {
        Err(DisplayError::ViewerFailed(status))
    }
}
