//! Do some preparations for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, LazyLock, Once, RwLock};
use std::thread;

pub static CAPTURED: LazyLock<Arc<RwLock<String>>> =
    LazyLock::new(|| Arc::new(RwLock::new(String::new())));
static LOGGER: Once = Once::new();

struct Capturer {
    content: Arc<RwLock<String>>,
}
impl Write for Capturer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut locked = self.content.write().unwrap();
        locked.push_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Routes every log record of this test binary into [`CAPTURED`].
pub fn setup() {
    LOGGER.call_once(|| {
        let cap = Capturer {
            content: CAPTURED.clone(),
        };
        env_logger::builder()
            .format(|buf, record| writeln!(buf, "{}", record.args()))
            .filter_level(log::LevelFilter::Debug)
            .target(env_logger::Target::Pipe(Box::new(cap)))
            .init();
    });
}

pub fn captured() -> String {
    CAPTURED.read().expect("Cannot read captured log").clone()
}

/// Replies of a fake MPD, keyed by the exact command line.
/// Each command pops its replies in order and repeats the last one.
pub struct FakeMpd {
    replies: HashMap<String, Vec<String>>,
}

impl FakeMpd {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
        }
    }

    pub fn reply(mut self, command: &str, response: &str) -> Self {
        self.replies
            .entry(command.to_string())
            .or_default()
            .push(response.to_string());
        self
    }

    /// Serves the first connection on a background thread.
    ///
    /// # Returns
    /// The port to connect to.
    pub fn serve(mut self) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Cannot bind fake MPD");
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut writer = stream.try_clone().unwrap();
            if writer.write_all(b"OK MPD 0.23.5\n").is_err() {
                return;
            }
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else {
                    break;
                };
                let reply = match self.replies.get_mut(&line) {
                    Some(queue) if queue.len() > 1 => queue.remove(0),
                    Some(queue) => queue[0].clone(),
                    None => format!("ACK [5@0] {{}} unknown command \"{line}\"\n"),
                };
                if writer.write_all(reply.as_bytes()).is_err() {
                    break;
                }
            }
        });
        port
    }
}

/// A `currentsong` response.
pub fn song(title: &str, artist: &str, album: &str) -> String {
    format!(
        "file: {artist}/{album}/{title}.flac\nTitle: {title}\nArtist: {artist}\nAlbumArtist: {artist}\nAlbum: {album}\nPos: 0\nId: 1\nOK\n"
    )
}
