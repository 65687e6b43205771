//! Newline framing for the stdio transport.
//!
//! Wraps [`AnyDelimiterCodec`] with a hard per-line limit. Lines are handed
//! out as raw bytes so that a line which is not valid UTF-8 reaches the
//! envelope codec (and becomes a parse error) instead of killing the stream.

use bytes::{Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder};

/// Framing failures
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("line too long: exceeded {0} bytes")]
    LineTooLong(usize),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// `\n`-delimited line decoder with a maximum line length
#[derive(Debug)]
pub struct LineCodec {
    inner: AnyDelimiterCodec,
    max_line_bytes: usize,
}

impl LineCodec {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(
                b"\n".to_vec(),
                b"\n".to_vec(),
                max_line_bytes,
            ),
            max_line_bytes,
        }
    }

    fn map_error(&self, e: AnyDelimiterCodecError) -> FramingError {
        match e {
            AnyDelimiterCodecError::MaxChunkLengthExceeded => {
                FramingError::LineTooLong(self.max_line_bytes)
            }
            AnyDelimiterCodecError::Io(e) => FramingError::Io(e),
        }
    }
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        match self.inner.decode(src) {
            Ok(line) => Ok(line.map(strip_carriage_return)),
            Err(e) => Err(self.map_error(e)),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        match self.inner.decode_eof(src) {
            Ok(line) => Ok(line.map(strip_carriage_return)),
            Err(e) => Err(self.map_error(e)),
        }
    }
}

fn strip_carriage_return(line: Bytes) -> Bytes {
    match line.last() {
        Some(b'\r') => line.slice(..line.len() - 1),
        _ => line,
    }
}
