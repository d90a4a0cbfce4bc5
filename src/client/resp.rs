//! RESP2 framing
//!
//! Requests are always arrays of bulk strings. Replies are decoded
//! incrementally from a growing buffer; `decode` returns `Ok(None)` until a
//! whole frame is available.

use bytes::{BufMut, Bytes, BytesMut};

/// A decoded reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    /// Textual form of a reply, used as the acknowledgment string
    pub fn to_text(&self) -> String {
        match self {
            Frame::Simple(s) | Frame::Error(s) => s.clone(),
            Frame::Integer(n) => n.to_string(),
            Frame::Bulk(data) => String::from_utf8_lossy(data).into_owned(),
            Frame::Null => String::new(),
            Frame::Array(items) => items
                .iter()
                .map(Frame::to_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Encode a command as an array of bulk strings
pub fn encode_command(args: &[&str], dst: &mut BytesMut) {
    dst.put_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        dst.put_slice(format!("${}\r\n", arg.len()).as_bytes());
        dst.put_slice(arg.as_bytes());
        dst.put_slice(b"\r\n");
    }
}

/// Deepest array nesting accepted in a reply
pub const MAX_DEPTH: usize = 32;

/// Try to decode one frame from the front of `src`
///
/// Returns the frame and the number of bytes it occupied.
pub fn decode(src: &[u8]) -> Result<Option<(Frame, usize)>, String> {
    decode_at(src, 0)
}

fn decode_at(src: &[u8], depth: usize) -> Result<Option<(Frame, usize)>, String> {
    if depth > MAX_DEPTH {
        return Err(format!("arrays nested deeper than {}", MAX_DEPTH));
    }
    let Some((line, mut consumed)) = read_line(src, 0) else {
        return Ok(None);
    };
    if line.is_empty() {
        return Err("empty frame header".to_string());
    }

    let body = std::str::from_utf8(&line[1..])
        .map_err(|e| format!("frame header is not UTF-8: {}", e))?;

    let frame = match line[0] {
        b'+' => Frame::Simple(body.to_string()),
        b'-' => Frame::Error(body.to_string()),
        b':' => Frame::Integer(parse_int(body)?),
        b'$' => {
            let len = parse_int(body)?;
            if len < 0 {
                Frame::Null
            } else {
                let len = usize::try_from(len)
                    .map_err(|_| format!("bulk length {} is too large", len))?;
                let end = consumed
                    .checked_add(len)
                    .and_then(|n| n.checked_add(2))
                    .ok_or_else(|| format!("bulk length {} is too large", len))?;
                if src.len() < end {
                    return Ok(None);
                }
                if &src[consumed + len..end] != b"\r\n" {
                    return Err("bulk string not terminated by CRLF".to_string());
                }
                let data = Bytes::copy_from_slice(&src[consumed..consumed + len]);
                consumed += len + 2;
                Frame::Bulk(data)
            }
        }
        b'*' => {
            let count = parse_int(body)?;
            if count < 0 {
                Frame::Null
            } else {
                // every element takes at least three bytes
                let remaining = (src.len() - consumed) / 3;
                let mut items = Vec::with_capacity(remaining.min(count as usize));
                for _ in 0..count {
                    match decode_at(&src[consumed..], depth + 1)? {
                        Some((item, used)) => {
                            items.push(item);
                            consumed += used;
                        }
                        None => return Ok(None),
                    }
                }
                Frame::Array(items)
            }
        }
        other => return Err(format!("unknown frame type byte 0x{:02x}", other)),
    };

    Ok(Some((frame, consumed)))
}

fn read_line(src: &[u8], start: usize) -> Option<(&[u8], usize)> {
    src[start..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|pos| (&src[start..start + pos], start + pos + 2))
}

fn parse_int(text: &str) -> Result<i64, String> {
    text.parse::<i64>()
        .map_err(|e| format!("invalid integer `{}`: {}", text, e))
}
