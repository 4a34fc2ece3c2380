//! Whole streams: one template frame followed by delta frames.

use std::io::{Cursor, Read, Write};

use crate::compress::{self, GZIP_LEVEL};
use crate::error::FrameError;
use crate::frame::{self, FrameReader};

/// zstd level for the alternate wrapping.
pub const ZSTD_LEVEL: i32 = 19;

/// An in-memory stream of canonical payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stream {
    pub template: Vec<u8>,
    pub deltas: Vec<Vec<u8>>,
}

impl Stream {
    pub fn new(template: Vec<u8>) -> Self {
        Self {
            template,
            deltas: Vec::new(),
        }
    }

    pub fn push_delta(&mut self, delta: Vec<u8>) {
        self.deltas.push(delta);
    }

    pub fn frame_count(&self) -> usize {
        1 + self.deltas.len()
    }

    /// Raw framed bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        let len = self.template.len()
            + self.deltas.iter().map(Vec::len).sum::<usize>()
            + frame::FRAME_HEADER_LEN * self.frame_count();
        let mut out = Vec::with_capacity(len);
        let mut writer = StreamWriter::new(&mut out, &self.template)?;
        for delta in &self.deltas {
            writer.write_delta(delta)?;
        }
        Ok(out)
    }

    /// Raw bytes gzipped at level 9 with `mtime = 0`.
    pub fn to_gzip(&self) -> Result<Vec<u8>, FrameError> {
        Ok(compress::gzip_compress(&self.to_bytes()?, GZIP_LEVEL)?)
    }

    pub fn to_zstd(&self) -> Result<Vec<u8>, FrameError> {
        Ok(compress::zstd_compress(&self.to_bytes()?, ZSTD_LEVEL)?)
    }

    /// Parse raw, gzip or zstd bytes. All three decode to the same stream.
    pub fn from_bytes(bytes: &[u8], max_frame_len: u32) -> Result<Self, FrameError> {
        let raw = compress::unwrap_any(bytes)?;
        let mut frames = frame::split_frames(&raw, max_frame_len)?.into_iter();
        let template = frames.next().ok_or(FrameError::MissingTemplate)?.to_vec();
        Ok(Self {
            template,
            deltas: frames.map(<[u8]>::to_vec).collect(),
        })
    }
}

/// Writes a stream incrementally. The template frame is written on construction,
/// so a delta can never precede it.
pub struct StreamWriter<W: Write> {
    inner: W,
    frames: u64,
    bytes: u64,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(mut inner: W, template: &[u8]) -> Result<Self, FrameError> {
        frame::write_frame(&mut inner, template)?;
        Ok(Self {
            inner,
            frames: 1,
            bytes: (frame::FRAME_HEADER_LEN + template.len()) as u64,
        })
    }

    pub fn write_delta(&mut self, delta: &[u8]) -> Result<(), FrameError> {
        frame::write_frame(&mut self.inner, delta)?;
        self.frames += 1;
        self.bytes += (frame::FRAME_HEADER_LEN + delta.len()) as u64;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn flush(&mut self) -> Result<(), FrameError> {
        Ok(self.inner.flush()?)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// One frame of a stream, tagged by position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamItem {
    Template(Vec<u8>),
    Delta(Vec<u8>),
}

/// Reads a framed stream. The first frame is the template; an empty input is a
/// [`FrameError::MissingTemplate`]. Ends after the first error.
pub struct StreamReader<R> {
    frames: FrameReader<R>,
    seen_template: bool,
    done: bool,
}

impl<R: Read> StreamReader<R> {
    pub fn new(inner: R, max_frame_len: u32) -> Self {
        Self {
            frames: FrameReader::new(inner, max_frame_len),
            seen_template: false,
            done: false,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames.frames_read()
    }

    pub fn is_poisoned(&self) -> bool {
        self.frames.is_poisoned()
    }
}

impl StreamReader<Cursor<Vec<u8>>> {
    /// Reader over in-memory bytes, stripping gzip or zstd wrapping first.
    pub fn from_wrapped(bytes: &[u8], max_frame_len: u32) -> Result<Self, FrameError> {
        Ok(Self::new(Cursor::new(compress::unwrap_any(bytes)?), max_frame_len))
    }
}

impl<R: Read> Iterator for StreamReader<R> {
    type Item = Result<StreamItem, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.frames.next() {
            Some(Ok(payload)) if !self.seen_template => {
                self.seen_template = true;
                Some(Ok(StreamItem::Template(payload)))
            }
            Some(Ok(payload)) => Some(Ok(StreamItem::Delta(payload))),
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None if !self.seen_template => {
                self.done = true;
                Some(Err(FrameError::MissingTemplate))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_FRAME_LEN;

    fn sample() -> Stream {
        let mut stream = Stream::new(b"[1,2,3]".to_vec());
        stream.push_delta(br#"[{"i":0,"n":5,"o":1}]"#.to_vec());
        stream.push_delta(br#"[{"i":2,"n":0,"o":3}]"#.to_vec());
        stream
    }

    #[test]
    fn test_all_wrappings_decode_identically() {
        let stream = sample();
        let raw = stream.to_bytes().unwrap();
        let gz = stream.to_gzip().unwrap();
        let zst = stream.to_zstd().unwrap();
        for bytes in [&raw, &gz, &zst] {
            assert_eq!(Stream::from_bytes(bytes, DEFAULT_MAX_FRAME_LEN).unwrap(), stream);
        }
        assert_eq!(stream.to_gzip().unwrap(), gz, "gzip output is deterministic");
    }

    #[test]
    fn test_raw_layout() {
        let raw = Stream::new(b"[]".to_vec()).to_bytes().unwrap();
        assert_eq!(raw, vec![0, 0, 0, 2, b'[', b']']);
    }

    #[test]
    fn test_reader_tags_items() {
        let raw = sample().to_bytes().unwrap();
        let items: Vec<_> = StreamReader::new(raw.as_slice(), DEFAULT_MAX_FRAME_LEN)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], StreamItem::Template(b"[1,2,3]".to_vec()));
        assert!(matches!(items[2], StreamItem::Delta(_)));
    }

    #[test]
    fn test_empty_input_has_no_template() {
        assert!(matches!(
            Stream::from_bytes(&[], DEFAULT_MAX_FRAME_LEN),
            Err(FrameError::MissingTemplate)
        ));
        let mut reader = StreamReader::new(&[][..], DEFAULT_MAX_FRAME_LEN);
        assert!(matches!(reader.next(), Some(Err(FrameError::MissingTemplate))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated_stream_closes_reader() {
        let raw = sample().to_bytes().unwrap();
        let cut = &raw[..raw.len() - 3];
        let mut reader = StreamReader::new(cut, DEFAULT_MAX_FRAME_LEN);
        assert!(matches!(reader.next(), Some(Ok(StreamItem::Template(_)))));
        assert!(matches!(reader.next(), Some(Ok(StreamItem::Delta(_)))));
        assert!(matches!(reader.next(), Some(Err(FrameError::Truncated { .. }))));
        assert!(reader.next().is_none());
        assert!(reader.is_poisoned());
        assert_eq!(reader.by_ref().count(), 0);
        assert_eq!(frame::last_complete_frame(cut), raw.len() - 4 - 21);
    }

    #[test]
    fn test_writer_counts() {
        let mut writer = StreamWriter::new(Vec::new(), b"[0]").unwrap();
        writer.write_delta(b"[]").unwrap();
        assert_eq!(writer.frames_written(), 2);
        assert_eq!(writer.bytes_written(), 4 + 3 + 4 + 2);
        assert_eq!(writer.into_inner().len(), 13);
    }
}
