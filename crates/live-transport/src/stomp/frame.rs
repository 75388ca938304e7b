//! STOMP 1.1 프레임 인코딩/디코딩.
//!
//! ```text
//! COMMAND\n
//! header:value\n
//! \n
//! body\0
//! ```
//!
//! 하나의 WebSocket 텍스트 메시지에 여러 프레임이나 heart-beat(EOL)가 섞여 올 수
//! 있으므로 디코더는 프레임 목록을 반환합니다.

use std::fmt;
use std::str::FromStr;

use crate::{TransportError, TransportResult};

/// STOMP 명령.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StompCommand {
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

impl StompCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            StompCommand::Connect => "CONNECT",
            StompCommand::Connected => "CONNECTED",
            StompCommand::Subscribe => "SUBSCRIBE",
            StompCommand::Unsubscribe => "UNSUBSCRIBE",
            StompCommand::Send => "SEND",
            StompCommand::Message => "MESSAGE",
            StompCommand::Receipt => "RECEIPT",
            StompCommand::Error => "ERROR",
            StompCommand::Disconnect => "DISCONNECT",
        }
    }

    /// CONNECT/CONNECTED 프레임 헤더는 escape하지 않습니다.
    fn escapes_headers(self) -> bool {
        !matches!(self, StompCommand::Connect | StompCommand::Connected)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StompCommand {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" | "STOMP" => Ok(StompCommand::Connect),
            "CONNECTED" => Ok(StompCommand::Connected),
            "SUBSCRIBE" => Ok(StompCommand::Subscribe),
            "UNSUBSCRIBE" => Ok(StompCommand::Unsubscribe),
            "SEND" => Ok(StompCommand::Send),
            "MESSAGE" => Ok(StompCommand::Message),
            "RECEIPT" => Ok(StompCommand::Receipt),
            "ERROR" => Ok(StompCommand::Error),
            "DISCONNECT" => Ok(StompCommand::Disconnect),
            other => Err(TransportError::Protocol(format!(
                "unknown STOMP command: {}",
                other
            ))),
        }
    }
}

/// STOMP 프레임.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub command: StompCommand,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    /// 본문 없는 프레임 생성.
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// 헤더 추가.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 본문 설정.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// 헤더 조회. 같은 이름이 반복되면 첫 번째 값이 유효합니다.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// 와이어 형식으로 인코딩.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());

        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// WebSocket 텍스트 메시지에서 프레임을 모두 디코딩.
///
/// heart-beat만 있는 메시지는 빈 목록을 반환합니다.
pub fn decode_frames(text: &str) -> TransportResult<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut rest = text;

    loop {
        rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() {
            break;
        }
        let (frame, remaining) = decode_one(rest)?;
        frames.push(frame);
        rest = remaining;
    }

    Ok(frames)
}

fn decode_one(input: &str) -> TransportResult<(Frame, &str)> {
    let (command_line, mut rest) = split_line(input)
        .ok_or_else(|| TransportError::Protocol("frame without command line".to_string()))?;
    let command: StompCommand = command_line.parse()?;
    let escape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let (line, remaining) = split_line(rest)
            .ok_or_else(|| TransportError::Protocol("unterminated frame headers".to_string()))?;
        rest = remaining;
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| TransportError::Protocol(format!("malformed header: {}", line)))?;
        if escape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .map(|(_, value)| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| TransportError::Protocol(format!("bad content-length: {}", value)))
        })
        .transpose()?;

    let (body, after) = match content_length {
        Some(len) => {
            let body = rest.get(..len).ok_or_else(|| {
                TransportError::Protocol(format!("body shorter than content-length {}", len))
            })?;
            let after = rest[len..]
                .strip_prefix('\0')
                .ok_or_else(|| TransportError::Protocol("missing NUL after body".to_string()))?;
            (body, after)
        }
        None => {
            let end = rest
                .find('\0')
                .ok_or_else(|| TransportError::Protocol("missing NUL terminator".to_string()))?;
            (&rest[..end], &rest[end + 1..])
        }
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_string(),
        },
        after,
    ))
}

/// 한 줄 분리 (`\n` 또는 `\r\n`).
fn split_line(input: &str) -> Option<(&str, &str)> {
    let idx = input.find('\n')?;
    let line = input[..idx].strip_suffix('\r').unwrap_or(&input[..idx]);
    Some((line, &input[idx + 1..]))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> TransportResult<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            other => {
                return Err(TransportError::Protocol(format!(
                    "invalid header escape: \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}
