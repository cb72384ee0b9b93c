use super::errors::{HttpError, HttpResult};
use super::fields::{strip_line_ending, Fields};
use regex::bytes::Regex;
use std::sync::OnceLock;

pub const HTTP_1_1: &str = "HTTP/1.1";
pub const DEFAULT_REASON: &str = "OK";

fn request_line_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\w+)\s+(\S+)\s+(HTTP/\d+\.\d+)").expect("request line pattern")
    })
}

fn response_line_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(HTTP/\d+\.\d+)\s+(\d+)\s+([^\r\n]*)").expect("response line pattern")
    })
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub fields: Fields,
    pub payload: Option<Vec<u8>>,
}

impl Request {
    #[must_use]
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            version: HTTP_1_1.into(),
            fields: Fields::new(),
            payload: None,
        }
    }

    /// Parses a request head: the request line followed by header lines.
    pub fn parse<L: AsRef<[u8]>>(lines: &[L]) -> HttpResult<Self> {
        let (first, rest) = lines.split_first().ok_or(HttpError::EmptyHead)?;
        let first = strip_line_ending(first.as_ref());

        let captures = request_line_regex()
            .captures(first)
            .ok_or_else(|| HttpError::InvalidRequestLine(lossy(first)))?;

        Ok(Self {
            method: lossy(&captures[1]),
            uri: lossy(&captures[2]),
            version: lossy(&captures[3]),
            fields: Fields::parse_lines(rest)?,
            payload: None,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.method, self.uri, self.version).into_bytes();
        out.extend(self.fields.to_bytes());
        out.extend_from_slice(b"\r\n");
        if let Some(payload) = &self.payload {
            out.extend_from_slice(payload);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub fields: Fields,
    pub payload: Option<Vec<u8>>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(200, DEFAULT_REASON)
    }
}

impl Response {
    #[must_use]
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            version: HTTP_1_1.into(),
            status,
            reason: reason.into(),
            fields: Fields::new(),
            payload: None,
        }
    }

    pub fn parse<L: AsRef<[u8]>>(lines: &[L]) -> HttpResult<Self> {
        let (first, rest) = lines.split_first().ok_or(HttpError::EmptyHead)?;
        let first = strip_line_ending(first.as_ref());

        let captures = response_line_regex()
            .captures(first)
            .ok_or_else(|| HttpError::InvalidResponseLine(lossy(first)))?;

        let status = lossy(&captures[2]);
        Ok(Self {
            version: lossy(&captures[1]),
            status: status
                .parse()
                .map_err(|_| HttpError::InvalidStatus(status.clone()))?,
            reason: lossy(&captures[3]),
            fields: Fields::parse_lines(rest)?,
            payload: None,
        })
    }

    /// Status line plus headers plus the terminating blank line.
    #[must_use]
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.version, self.status, self.reason).into_bytes();
        out.extend(self.fields.to_bytes());
        out.extend_from_slice(b"\r\n");
        out
    }
}
