//! A minimal synchronous MPD client.
//!
//! Only the two requests the watcher needs are implemented: `currentsong` and `lsinfo`.
//! Responses are parsed line by line, each line being either a `key: value` pair, the
//! terminating `OK`, or an `ACK` error.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_till1};
use nom::character::complete::{char, digit1, space0};
use nom::combinator::{all_consuming, map, map_res, rest};
use nom::sequence::{preceded, separated_pair};
use nom::{Finish, IResult, Parser};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MpdError {
    #[error("cannot connect to MPD: {0}")]
    Connect(io::Error),
    #[error("unexpected greeting from MPD: `{0}`")]
    Handshake(String),
    #[error("connection to MPD failed: {0}")]
    Io(#[from] io::Error),
    /// The server rejected a command.
    #[error("MPD refused `{command}` (code {code}): {message}")]
    Ack {
        code: u32,
        command: String,
        message: String,
    },
    #[error("malformed response line `{0}`")]
    Malformed(String),
}

/// A song as reported by `currentsong`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Song {
    /// Path relative to the music directory.
    pub file: String,
    /// Every other key/value pair in server order.
    pub tags: Vec<(String, String)>,
}

impl Song {
    /// First value of the given tag, compared case-insensitively.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// One record of an `lsinfo` listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Directory(String),
    File(String),
    Playlist(String),
}

/// Whatever can answer the queries the watcher makes.
pub trait MusicDaemon {
    /// Tags of the song currently playing, [`None`] if nothing is.
    ///
    /// # Errors
    /// See [`MpdError`].
    fn current_song(&mut self) -> Result<Option<Song>, MpdError>;

    /// Lists the entries of a directory. An empty path lists the music root.
    ///
    /// # Errors
    /// See [`MpdError`].
    fn list_meta(&mut self, path: &str) -> Result<Vec<Entity>, MpdError>;
}

/// A single line of a response.
#[derive(Debug, PartialEq)]
enum Line<'a> {
    Ok,
    Ack {
        code: u32,
        command: &'a str,
        message: &'a str,
    },
    Pair(&'a str, &'a str),
}

fn parse_ok(input: &str) -> IResult<&str, Line<'_>> {
    map(all_consuming(tag("OK")), |_| Line::Ok).parse(input)
}

// ACK [50@0] {lsinfo} No such directory
fn parse_ack(input: &str) -> IResult<&str, Line<'_>> {
    let (input, _) = tag("ACK [")(input)?;
    let (input, code) = map_res(digit1, str::parse::<u32>).parse(input)?;
    let (input, _) = char('@')(input)?;
    let (input, _) = digit1(input)?;
    let (input, _) = tag("] {")(input)?;
    let (input, command) = take_till(|c: char| c == '}')(input)?;
    let (input, _) = char('}')(input)?;
    let (input, _) = space0(input)?;
    map(rest, |message: &str| Line::Ack {
        code,
        command,
        message,
    })
    .parse(input)
}

fn parse_pair(input: &str) -> IResult<&str, Line<'_>> {
    map(
        separated_pair(take_till1(|c: char| c == ':'), tag(":"), preceded(space0, rest)),
        |(key, value)| Line::Pair(key, value),
    )
    .parse(input)
}

fn parse_line(input: &str) -> Result<Line<'_>, MpdError> {
    alt((parse_ok, parse_ack, parse_pair))
        .parse(input)
        .finish()
        .map(|(_, line)| line)
        .map_err(|_| MpdError::Malformed(input.to_string()))
}

fn parse_greeting(input: &str) -> IResult<&str, &str> {
    preceded(tag("OK MPD "), rest).parse(input)
}

/// Quotes a command argument, escaping `"` and `\`.
fn quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Groups `key: value` pairs of a listing into [`Entity`]s.
fn collect_entities(pairs: Vec<(String, String)>) -> Vec<Entity> {
    pairs
        .into_iter()
        .filter_map(|(key, value)| match key.as_str() {
            "directory" => Some(Entity::Directory(value)),
            "file" => Some(Entity::File(value)),
            "playlist" => Some(Entity::Playlist(value)),
            // Metadata of the previous entity
            _ => None,
        })
        .collect()
}

/// A connection to MPD.
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    version: String,
}

impl Connection {
    /// Connects to MPD and waits for its greeting.
    ///
    /// # Errors
    /// [`MpdError::Connect`] if no resolved address accepts the connection within `timeout`,
    /// [`MpdError::Handshake`] if the server does not greet like MPD.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, MpdError> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs().map_err(MpdError::Connect)? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Self::handshake(stream, timeout),
                Err(err) => last_err = Some(err),
            }
        }
        Err(MpdError::Connect(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {host}"))
        })))
    }

    fn handshake(stream: TcpStream, timeout: Duration) -> Result<Self, MpdError> {
        // Only the greeting is bounded, later requests block as long as MPD needs
        stream.set_read_timeout(Some(timeout)).map_err(MpdError::Connect)?;
        let writer = stream.try_clone().map_err(MpdError::Connect)?;
        let mut conn = Self {
            reader: BufReader::new(stream),
            writer,
            version: String::new(),
        };

        let greeting = match conn.read_line() {
            Ok(raw) => String::from_utf8_lossy(&raw).into_owned(),
            Err(MpdError::Io(err)) => return Err(MpdError::Connect(err)),
            Err(err) => return Err(err),
        };
        let Ok((_, version)) = parse_greeting(&greeting).finish() else {
            return Err(MpdError::Handshake(greeting));
        };
        conn.version = version.to_string();
        conn.writer.set_read_timeout(None).map_err(MpdError::Connect)?;
        Ok(conn)
    }

    /// Protocol version announced by the server.
    pub fn version(&self) -> &str {
        &self.version
    }

    fn read_line(&mut self) -> Result<Vec<u8>, MpdError> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            return Err(MpdError::Io(io::ErrorKind::UnexpectedEof.into()));
        }
        if line.ends_with(b"\n") {
            line.pop();
        }
        Ok(line)
    }

    /// Sends a command and collects the pairs of its response.
    ///
    /// The response is always read up to its `OK` or `ACK`, even past a bad line, so the
    /// next request starts on its own response. The first bad line is what gets reported.
    fn request(&mut self, command: &str) -> Result<Vec<(String, String)>, MpdError> {
        log::trace!("> {command}");
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        let mut pairs = Vec::new();
        let mut bad_line = None;
        loop {
            let parsed = decode(self.read_line()?).and_then(|line| {
                Ok(match parse_line(&line)? {
                    Line::Ok => None,
                    Line::Ack {
                        code,
                        command,
                        message,
                    } => Some(Err(MpdError::Ack {
                        code,
                        command: command.to_string(),
                        message: message.to_string(),
                    })),
                    Line::Pair(key, value) => Some(Ok((key.to_string(), value.to_string()))),
                })
            });
            match parsed {
                Ok(None) => return bad_line.map_or(Ok(pairs), Err),
                Ok(Some(Err(ack))) => return Err(bad_line.unwrap_or(ack)),
                Ok(Some(Ok(pair))) => pairs.push(pair),
                Err(err) => {
                    log::trace!("< {err}");
                    bad_line.get_or_insert(err);
                }
            }
        }
    }
}

/// Turns a raw line into text, rejecting invalid UTF-8.
fn decode(raw: Vec<u8>) -> Result<String, MpdError> {
    String::from_utf8(raw)
        .map_err(|err| MpdError::Malformed(String::from_utf8_lossy(err.as_bytes()).into_owned()))
}

impl MusicDaemon for Connection {
    fn current_song(&mut self) -> Result<Option<Song>, MpdError> {
        let pairs = self.request("currentsong")?;
        if pairs.is_empty() {
            return Ok(None);
        }
        let mut song = Song::default();
        for (key, value) in pairs {
            if key == "file" {
                song.file = value;
            } else {
                song.tags.push((key, value));
            }
        }
        Ok(Some(song))
    }

    fn list_meta(&mut self, path: &str) -> Result<Vec<Entity>, MpdError> {
        let command = if path.is_empty() {
            String::from("lsinfo")
        } else {
            format!("lsinfo {}", quote(path))
        };
        Ok(collect_entities(self.request(&command)?))
    }
}
