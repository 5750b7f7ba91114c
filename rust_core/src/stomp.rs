// rust_core/src/stomp.rs
// Minimal STOMP 1.2 codec for the match push channel.
// Frames ride inside WebSocket text messages. A message may hold several
// frames, a frame may be split across messages, and a bare EOL is a heartbeat.

use std::fmt;
use std::time::Duration;

use bytes::{Buf, BytesMut};

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        Ok(match raw {
            "CONNECT" => Command::Connect,
            "CONNECTED" => Command::Connected,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "SEND" => Command::Send,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            other => return Err(ClientError::Frame(format!("unknown command {:?}", other))),
        })
    }

    // CONNECT and CONNECTED headers are sent verbatim.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// First value for `key`; repeated headers keep the earliest, as STOMP says.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (k, v) in &self.headers {
            if escape {
                out.push_str(&escape_header(k));
                out.push(':');
                out.push_str(&escape_header(v));
            } else {
                out.push_str(k);
                out.push(':');
                out.push_str(v);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

// --- BUILDERS ---

pub fn connect(host: &str, token: Option<&str>, heartbeat: Duration) -> Frame {
    let ms = heartbeat.as_millis();
    let mut frame = Frame::new(Command::Connect)
        .header("accept-version", "1.2,1.1,1.0")
        .header("host", host)
        .header("heart-beat", format!("{},{}", ms, ms));
    if let Some(token) = token {
        frame = frame.header("token", token);
    }
    frame
}

pub fn subscribe(id: &str, destination: &str) -> Frame {
    Frame::new(Command::Subscribe)
        .header("id", id)
        .header("destination", destination)
        .header("ack", "auto")
}

pub fn disconnect() -> Frame {
    Frame::new(Command::Disconnect)
}

/// Destination the server publishes a match's snapshots to.
pub fn match_topic(match_id: i64) -> String {
    format!("/topic/match/{}", match_id)
}

// --- HEARTBEATS ---

/// Negotiated heartbeat periods. `None` means disabled in that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub outgoing: Option<Duration>,
    pub incoming: Option<Duration>,
}

/// `client` is what we offered as `(cx, cy)`; `server` is the CONNECTED
/// frame's `heart-beat` header. A missing or garbled header disables both.
pub fn negotiate_heartbeat(client: Duration, server: Option<&str>) -> Heartbeat {
    let parsed = server.and_then(|raw| {
        let (sx, sy) = raw.split_once(',')?;
        Some((sx.trim().parse::<u64>().ok()?, sy.trim().parse::<u64>().ok()?))
    });
    let Some((sx, sy)) = parsed else {
        return Heartbeat {
            outgoing: None,
            incoming: None,
        };
    };
    let c = client.as_millis() as u64;
    let period = |ours: u64, theirs: u64| {
        if ours == 0 || theirs == 0 {
            None
        } else {
            Some(Duration::from_millis(ours.max(theirs)))
        }
    };
    Heartbeat {
        outgoing: period(c, sy),
        incoming: period(c, sx),
    }
}

// --- DECODING ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Heartbeat,
    Frame(Frame),
}

/// Largest frame the decoder will buffer unless told otherwise.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Accumulates raw text and hands back whole frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame (head, body and terminator) larger than `max_frame` bytes is
    /// a `ClientError::Frame`, whether declared or still arriving.
    pub fn with_limit(max_frame: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame,
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Next complete item, `Ok(None)` if more data is needed.
    pub fn next_item(&mut self) -> Result<Option<Incoming>> {
        // Heartbeats: bare EOLs between frames.
        if self.buf.starts_with(b"\r\n") {
            self.buf.advance(2);
            return Ok(Some(Incoming::Heartbeat));
        }
        if self.buf.starts_with(b"\n") {
            self.buf.advance(1);
            return Ok(Some(Incoming::Heartbeat));
        }
        if self.buf.is_empty() || self.buf.as_ref() == b"\r" {
            return Ok(None);
        }

        let Some((head_len, body_start)) = find_head_end(&self.buf) else {
            return self.need_more();
        };
        let head = std::str::from_utf8(&self.buf[..head_len])
            .map_err(|e| ClientError::Frame(e.to_string()))?
            .to_string();
        let mut lines = head.lines();
        let command = Command::parse(lines.next().unwrap_or_default().trim_end_matches('\r'))?;
        let escaped = command.escapes_headers();
        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            let (k, v) = line
                .split_once(':')
                .ok_or_else(|| ClientError::Frame(format!("bad header line {:?}", line)))?;
            if escaped {
                headers.push((unescape_header(k)?, unescape_header(v)?));
            } else {
                headers.push((k.to_string(), v.to_string()));
            }
        }

        let declared = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| ClientError::Frame(format!("bad content-length {:?}", v)))
            })
            .transpose()?;
        let body_end = match declared {
            Some(len) => {
                let frame_len = body_start
                    .checked_add(len)
                    .and_then(|n| n.checked_add(1))
                    .filter(|n| *n <= self.max_frame)
                    .ok_or_else(|| self.too_large(Some(len)))?;
                if self.buf.len() < frame_len {
                    return Ok(None);
                }
                if self.buf[body_start + len] != 0 {
                    return Err(ClientError::Frame(
                        "body longer than content-length".to_string(),
                    ));
                }
                body_start + len
            }
            None => match self.buf[body_start..].iter().position(|b| *b == 0) {
                Some(offset) => body_start + offset,
                None => return self.need_more(),
            },
        };

        let body = String::from_utf8(self.buf[body_start..body_end].to_vec())
            .map_err(|e| ClientError::Frame(e.to_string()))?;
        self.buf.advance(body_end + 1);
        Ok(Some(Incoming::Frame(Frame {
            command,
            headers,
            body,
        })))
    }

    // The buffer holds one unfinished frame at this point.
    fn need_more(&self) -> Result<Option<Incoming>> {
        if self.buf.len() > self.max_frame {
            return Err(self.too_large(None));
        }
        Ok(None)
    }

    fn too_large(&self, declared: Option<usize>) -> ClientError {
        match declared {
            Some(len) => ClientError::Frame(format!(
                "content-length {} exceeds the {} byte frame limit",
                len, self.max_frame
            )),
            None => ClientError::Frame(format!(
                "unterminated frame exceeds the {} byte frame limit",
                self.max_frame
            )),
        }
    }
}

/// Returns (length of command+headers, offset of the body).
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            if buf.get(i + 1) == Some(&b'\n') {
                return Some((i, i + 2));
            }
            if buf.get(i + 1) == Some(&b'\r') && buf.get(i + 2) == Some(&b'\n') {
                return Some((i, i + 3));
            }
        }
        i += 1;
    }
    None
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ClientError::Frame(format!(
                    "invalid header escape \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

// --- TESTS ---
