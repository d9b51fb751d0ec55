//! Watches MPD for album changes and keeps the cover file current.
//!
//! Every cycle asks MPD for the current song. When its album differs from the last one seen,
//! the album's directory is looked up and its `cover.jpg` is copied over the cover file.
//! Errors only skip the current cycle, except failing to connect in the first place.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::cover;
use crate::mpd::{Connection, Entity, MpdError, MusicDaemon, Song};

/// Longest tag value accepted, in bytes.
pub const MAX_TAG_LEN: usize = 512;
/// Name of the image looked up in album directories.
pub const COVER_NAME: &str = "cover.jpg";

#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Daemon(#[from] MpdError),
    #[error("`{0}` tag is longer than {max} bytes", max = MAX_TAG_LEN)]
    TagTooLong(&'static str),
}

impl WatchError {
    /// Whether the watcher cannot go on after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WatchError::Daemon(MpdError::Connect(_) | MpdError::Handshake(_))
        )
    }
}

/// What a poll cycle did.
#[derive(Debug, PartialEq)]
pub enum Cycle {
    /// Nothing is playing, or the song lacks album tags.
    NoTrack,
    /// Still the same album.
    Unchanged,
    /// The album changed. Holds the copied cover, if one was found.
    Changed { cover: Option<PathBuf> },
}

/// Settings of a [`Watcher`].
#[derive(Debug, Clone)]
pub struct Settings {
    /// MPD's music directory, which listing paths are relative to.
    pub music_dir: PathBuf,
    /// The hand-off file the viewer displays.
    pub cover: PathBuf,
    /// Sleep between polls.
    pub interval: Duration,
    /// Do not announce album changes.
    pub quiet: bool,
}

/// The tags the watcher cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub title: Option<String>,
    pub artist: String,
    pub album: String,
}

impl Track {
    /// Extracts a [`Track`] from a [`Song`].
    ///
    /// # Returns
    /// [`None`] if the song has no album or album artist.
    ///
    /// # Errors
    /// [`WatchError::TagTooLong`] if the album or album artist exceeds [`MAX_TAG_LEN`].
    /// A longer title is truncated instead.
    pub fn from_song(song: &Song) -> Result<Option<Self>, WatchError> {
        let (Some(album), Some(artist)) = (song.tag("Album"), song.tag("AlbumArtist")) else {
            return Ok(None);
        };
        for (name, value) in [("Album", album), ("AlbumArtist", artist)] {
            if value.len() > MAX_TAG_LEN {
                return Err(WatchError::TagTooLong(name));
            }
        }
        // Only informative, so cut rather than rejected
        let title = song.tag("Title").map(truncate_tag);
        Ok(Some(Self {
            title: title.map(String::from),
            artist: artist.to_string(),
            album: album.to_string(),
        }))
    }
}

/// Cuts `value` to at most [`MAX_TAG_LEN`] bytes on a character boundary.
fn truncate_tag(value: &str) -> &str {
    let mut end = value.len().min(MAX_TAG_LEN);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// The album a cover copy was last attempted for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumState {
    pub album: String,
    pub artist: String,
}

/// Text before the first whitespace of `album`, or all of it.
pub fn leading_word(album: &str) -> &str {
    album.split(char::is_whitespace).next().unwrap_or(album)
}

/// Picks the first directory whose path contains the album's leading word.
fn match_directory<'a>(entities: &'a [Entity], album: &str) -> Option<&'a str> {
    let word = leading_word(album);
    entities.iter().find_map(|entity| match entity {
        Entity::Directory(path) if path.contains(word) => Some(path.as_str()),
        _ => None,
    })
}

pub struct Watcher<D: MusicDaemon> {
    daemon: D,
    settings: Settings,
    state: AlbumState,
    last_error: Option<String>,
}

impl Watcher<Connection> {
    /// Connects to MPD and creates a [`Watcher`] on that connection.
    ///
    /// # Errors
    /// A fatal [`WatchError::Daemon`] if MPD cannot be reached.
    pub fn connect(
        host: &str,
        port: u16,
        timeout: Duration,
        settings: Settings,
    ) -> Result<Self, WatchError> {
        let conn = Connection::connect(host, port, timeout)?;
        log::debug!("connected to MPD {} at {host}:{port}", conn.version());
        Ok(Self::new(conn, settings))
    }
}

impl<D: MusicDaemon> Watcher<D> {
    pub fn new(daemon: D, settings: Settings) -> Self {
        Self {
            daemon,
            settings,
            state: AlbumState::default(),
            last_error: None,
        }
    }

    pub fn state(&self) -> &AlbumState {
        &self.state
    }

    /// Runs one cycle.
    ///
    /// The stored album is replaced before its cover is looked up, so a failed lookup is not
    /// retried until the album changes again.
    ///
    /// # Errors
    /// Query failures and over-long tags, both of which only skip this cycle.
    pub fn poll(&mut self) -> Result<Cycle, WatchError> {
        let Some(song) = self.daemon.current_song()? else {
            return Ok(Cycle::NoTrack);
        };
        let Some(track) = Track::from_song(&song)? else {
            return Ok(Cycle::NoTrack);
        };
        if track.album == self.state.album {
            return Ok(Cycle::Unchanged);
        }

        self.state = AlbumState {
            album: track.album,
            artist: track.artist,
        };
        if !self.settings.quiet {
            log::info!(
                "album changed: {} - '{}'",
                self.state.artist,
                self.state.album
            );
        }

        let (artist, album) = (self.state.artist.clone(), self.state.album.clone());
        let Some(source) = self.resolve_cover_path(&artist, &album)? else {
            log::debug!("no directory under `{artist}` matches '{album}'");
            return Ok(Cycle::Changed { cover: None });
        };
        match cover::copy_file(&source, &self.settings.cover) {
            Ok(bytes) => {
                log::debug!("copied {bytes} bytes from {}", source.display());
                Ok(Cycle::Changed {
                    cover: Some(source),
                })
            }
            Err(err) => {
                log::debug!("{err}");
                Ok(Cycle::Changed { cover: None })
            }
        }
    }

    /// Finds the cover of an album by matching its leading word against the directories
    /// under `artist`. An empty `artist` searches the music root instead.
    ///
    /// # Errors
    /// If MPD cannot list the directory.
    pub fn resolve_cover_path(
        &mut self,
        artist: &str,
        album: &str,
    ) -> Result<Option<PathBuf>, WatchError> {
        let entities = self.daemon.list_meta(artist)?;
        Ok(match_directory(&entities, album)
            .map(|dir| cover_path(&self.settings.music_dir, dir)))
    }

    /// Polls forever, sleeping the configured interval between cycles.
    /// Only returns on a fatal error.
    pub fn run(&mut self) {
        loop {
            match self.poll() {
                Ok(_) => self.last_error = None,
                Err(err) if err.is_fatal() => {
                    log::error!("{err}, watcher stopped");
                    return;
                }
                Err(err) => self.report(&err),
            }
            thread::sleep(self.settings.interval);
        }
    }

    /// Logs an error unless it is the same as the previous one.
    fn report(&mut self, err: &WatchError) {
        let message = err.to_string();
        if self.last_error.as_ref() != Some(&message) {
            log::error!("{message}");
            self.last_error = Some(message);
        }
    }
}

fn cover_path(music_dir: &Path, dir: &str) -> PathBuf {
    music_dir.join(dir).join(COVER_NAME)
}
