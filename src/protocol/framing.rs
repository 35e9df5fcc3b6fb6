//! Stream framing — `Content-Length` headers around JSON bodies.
//!
//! ```text
//! Content-Length: 44\r\n
//! \r\n
//! {"jsonrpc":"2.0","id":1,"method":"shutdown"}
//! ```
//!
//! A malformed frame is reported as [`Frame::Malformed`] and the reader
//! stays positioned at the next header block, so one bad message never
//! ends a session.

use serde_json::Value;
use std::io::{self, BufRead, Read, Write};

/// Upper bound on a single body. Larger frames are skipped.
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

const CONTENT_LENGTH: &str = "content-length";

/// Why a frame was dropped.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("header block without Content-Length")]
    MissingContentLength,

    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    #[error("body of {0} bytes exceeds the frame limit")]
    TooLarge(usize),

    #[error("body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// One unit read off the wire.
#[derive(Debug)]
pub enum Frame {
    Message(Value),
    Malformed(FrameError),
}

/// Write one framed message and flush.
pub fn write_message<W: Write>(writer: &mut W, body: &[u8]) -> io::Result<()> {
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(body)?;
    writer.flush()
}

/// Read the next frame.
///
/// Returns `Ok(None)` at end of stream, including a stream that ends in the
/// middle of a frame.
pub fn read_frame<R: BufRead>(reader: &mut R) -> io::Result<Option<Frame>> {
    let mut content_length: Option<Result<usize, FrameError>> = None;
    let mut saw_header = false;
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches(['\r', '\n']);

        if text.is_empty() {
            // Stray blank lines between frames are not a header block
            if saw_header {
                break;
            }
            continue;
        }
        saw_header = true;

        if let Some((name, value)) = text.split_once(':') {
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let value = value.trim();
                content_length = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| FrameError::InvalidContentLength(value.to_string())),
                );
            }
        }
    }

    let length = match content_length {
        Some(Ok(length)) => length,
        Some(Err(e)) => return Ok(Some(Frame::Malformed(e))),
        None => return Ok(Some(Frame::Malformed(FrameError::MissingContentLength))),
    };

    if length > MAX_CONTENT_LENGTH {
        let skipped = io::copy(&mut (&mut *reader).take(length as u64), &mut io::sink())?;
        if (skipped as usize) < length {
            return Ok(None);
        }
        return Ok(Some(Frame::Malformed(FrameError::TooLarge(length))));
    }

    let mut body = vec![0u8; length];
    match reader.read_exact(&mut body) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    Ok(Some(match serde_json::from_slice(&body) {
        Ok(value) => Frame::Message(value),
        Err(e) => Frame::Malformed(FrameError::InvalidBody(e)),
    }))
}
