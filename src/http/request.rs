//! Minimal request-head reading for the built-in handler.
//!
//! # Responsibilities
//! - Read up to the end of the request head with a hard size cap
//! - Extract method and path from the request line
//!
//! # Design Decisions
//! - Header size limits enforced before anything is parsed
//! - Bodies are never read here; the cache backend owns them

use tokio::io::{AsyncRead, AsyncReadExt};

/// Largest request head accepted before giving up.
pub const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Method and target of an HTTP request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub path: String,
}

impl RequestLine {
    /// Parse `GET /path HTTP/1.1`. Absolute-form targets
    /// (`http://host/path`) are reduced to their path.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let method = parts.next()?.to_string();
        let target = parts.next()?;
        let path = match target.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
            None => target,
        };
        Some(Self {
            method,
            path: path.to_string(),
        })
    }
}

/// Read the request head (through the blank line) or until EOF.
pub async fn read_head<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut head = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") || head.windows(2).any(|w| w == b"\n\n") {
            break;
        }
        if head.len() > MAX_HEAD_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}
