pub mod backends;
pub mod cover;
pub mod display;
pub mod entry;
pub mod mpd;
pub mod watcher;

pub use display::DisplayError;
pub use mpd::{Connection, MusicDaemon};
pub use watcher::{Cycle, Settings, WatchError, Watcher};
