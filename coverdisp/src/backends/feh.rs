//! Generates the command line for `feh`.

use smol::process::{Command, Stdio};
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use crate::backends::Backend;

pub struct Feh {
    binary: String,
    geometry: Option<String>,
    reload: Duration,
}

impl Backend for Feh {
    fn get_name(&self) -> &str {
        &self.binary
    }

    /// Gets the [`Command`] to start `feh`.
    fn get_sys_command(&self, image: &Path) -> Command {
        let mut sys_cmd = Command::new(&self.binary);
        sys_cmd.args(self.args(image)).stdout(Stdio::null());
        sys_cmd
    }
}

impl Feh {
    pub fn new(binary: Option<String>, geometry: Option<String>, reload: Duration) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| "feh".to_string()),
            geometry,
            reload,
        }
    }

    /// Borderless, zoomed to fit, no pointer, reloading `image` on an interval.
    fn args(&self, image: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-x".into()];
        if let Some(value) = &self.geometry {
            args.push("-g".into());
            args.push(value.into());
        }
        args.push("--reload".into());
        args.push(reload_secs(self.reload).into());
        args.push("-Z".into());
        args.push("-Y".into());
        args.push(image.into());
        args
    }
}

/// `feh` takes the reload interval in (possibly fractional) seconds.
fn reload_secs(interval: Duration) -> String {
    interval.as_secs_f64().to_string()
}
