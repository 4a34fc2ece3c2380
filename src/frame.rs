//! Length-prefixed framing: `length:u32_be || payload`.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::error::FrameError;

/// Size of the length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Frame a payload.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    write_frame(&mut out, payload)?;
    Ok(out)
}

/// Write one frame to `w`.
pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::OverLong {
        len: payload.len() as u64,
        max: u32::MAX,
    })?;
    w.write_u32::<BigEndian>(len)?;
    w.write_all(payload)?;
    Ok(())
}

/// Split an in-memory byte string into frame payloads.
pub fn split_frames(bytes: &[u8], max_frame_len: u32) -> Result<Vec<&[u8]>, FrameError> {
    let mut frames = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        if rest.len() < FRAME_HEADER_LEN {
            return Err(FrameError::Truncated {
                needed: FRAME_HEADER_LEN,
                available: rest.len(),
            });
        }
        let len = BigEndian::read_u32(&rest[..FRAME_HEADER_LEN]);
        if len > max_frame_len {
            return Err(FrameError::OverLong {
                len: u64::from(len),
                max: max_frame_len,
            });
        }
        let body = &rest[FRAME_HEADER_LEN..];
        let len = len as usize;
        if body.len() < len {
            return Err(FrameError::Truncated {
                needed: len,
                available: body.len(),
            });
        }
        frames.push(&body[..len]);
        rest = &body[len..];
    }
    Ok(frames)
}

/// Byte offset just past the last complete frame. Everything after it is a
/// partial write and must be discarded before resuming.
pub fn last_complete_frame(bytes: &[u8]) -> usize {
    let mut offset = 0;
    while bytes.len() - offset >= FRAME_HEADER_LEN {
        let len = BigEndian::read_u32(&bytes[offset..offset + FRAME_HEADER_LEN]) as usize;
        let end = offset + FRAME_HEADER_LEN + len;
        if end > bytes.len() {
            break;
        }
        offset = end;
    }
    offset
}

/// Synchronous frame iterator over any reader.
///
/// A clean end of input at a frame boundary ends iteration. Any framing error is
/// yielded once and fuses the iterator; [`FrameReader::is_poisoned`] tells the
/// two endings apart.
pub struct FrameReader<R> {
    inner: R,
    max_frame_len: u32,
    poisoned: bool,
    frames_read: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, max_frame_len: u32) -> Self {
        Self {
            inner,
            max_frame_len,
            poisoned: false,
            frames_read: 0,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        let got = read_up_to(&mut self.inner, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < FRAME_HEADER_LEN {
            return Err(FrameError::Truncated {
                needed: FRAME_HEADER_LEN,
                available: got,
            });
        }
        let len = BigEndian::read_u32(&header);
        if len > self.max_frame_len {
            return Err(FrameError::OverLong {
                len: u64::from(len),
                max: self.max_frame_len,
            });
        }
        let mut payload = vec![0u8; len as usize];
        let got = read_up_to(&mut self.inner, &mut payload)?;
        if got < payload.len() {
            return Err(FrameError::Truncated {
                needed: payload.len(),
                available: got,
            });
        }
        Ok(Some(payload))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Vec<u8>, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned {
            return None;
        }
        match self.read_frame() {
            Ok(Some(payload)) => {
                self.frames_read += 1;
                tracing::debug!(frame = self.frames_read, len = payload.len(), "frame read");
                Some(Ok(payload))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(frame = self.frames_read + 1, error = %e, "framing error, reader closed");
                self.poisoned = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the reader allows; returns the byte count.
fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
