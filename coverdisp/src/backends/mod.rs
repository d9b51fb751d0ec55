mod feh;

pub use feh::Feh;

use smol::process::Command;
use std::path::Path;

/// General trait of an image viewer.
pub trait Backend {
    /// Name of the viewer, for logging.
    fn get_name(&self) -> &str;
    /// Gets the [`Command`] that shows `image` and keeps reloading it.
    fn get_sys_command(&self, image: &Path) -> Command;
}
