//! Fixed-field little-endian encoding primitives
//!
//! Text fields occupy `width` bytes on the wire: UTF-8 content followed by
//! NUL padding, with at least one trailing NUL. Callers size their buffers
//! up front, so the reader and writer never grow or shrink.

use crate::error::WireError;

/// Sequential writer over a preallocated frame
pub(crate) struct FrameWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FrameWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    pub fn put_u8(&mut self, value: u8) {
        self.put_bytes(&[value]);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.put_bytes(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.put_bytes(&value.to_le_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.put_bytes(&value.to_le_bytes());
    }

    /// Write a NUL-padded text field of exactly `width` bytes
    pub fn put_text(&mut self, field: &'static str, value: &str, width: usize) -> Result<(), WireError> {
        let max = width - 1;
        if value.len() > max {
            return Err(WireError::FieldTooLong {
                field,
                len: value.len(),
                max,
            });
        }
        if value.as_bytes().contains(&0) {
            return Err(WireError::EmbeddedNul { field });
        }

        let slot = &mut self.buf[self.pos..self.pos + width];
        slot.fill(0);
        slot[..value.len()].copy_from_slice(value.as_bytes());
        self.pos += width;
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Sequential reader over a frame of known length
pub(crate) struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn take(&mut self, len: usize) -> &'a [u8] {
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        bytes
    }

    pub fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    pub fn u16(&mut self) -> u16 {
        let b = self.take(2);
        u16::from_le_bytes([b[0], b[1]])
    }

    pub fn u32(&mut self) -> u32 {
        let b = self.take(4);
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    pub fn i32(&mut self) -> i32 {
        let b = self.take(4);
        i32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Read a NUL-padded text field of exactly `width` bytes
    pub fn text(&mut self, field: &'static str, width: usize) -> Result<String, WireError> {
        let slot = self.take(width);
        let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
        std::str::from_utf8(&slot[..end])
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidText { field })
    }
}

/// Cut `text` to at most `max` bytes without splitting a character
pub(crate) fn truncate_text(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_field_padding() {
        let mut buf = [0xffu8; 8];
        let mut writer = FrameWriter::new(&mut buf);
        writer.put_text("name", "abc", 8).unwrap();
        assert_eq!(writer.position(), 8);
        assert_eq!(&buf, b"abc\0\0\0\0\0");

        let mut reader = FrameReader::new(&buf);
        assert_eq!(reader.text("name", 8).unwrap(), "abc");
    }

    #[test]
    fn test_text_field_capacity() {
        let mut buf = [0u8; 4];
        let mut writer = FrameWriter::new(&mut buf);
        assert!(writer.put_text("name", "abc", 4).is_ok());

        let mut writer = FrameWriter::new(&mut buf);
        match writer.put_text("name", "abcd", 4) {
            Err(WireError::FieldTooLong { len: 4, max: 3, .. }) => {}
            other => panic!("Expected FieldTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let buf = [0xc3u8, 0x28, 0, 0];
        let mut reader = FrameReader::new(&buf);
        assert!(matches!(
            reader.text("name", 4),
            Err(WireError::InvalidText { field: "name" })
        ));
    }

    #[test]
    fn test_truncate_text_char_boundary() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello", 3), "hel");
        // 'é' is two bytes; cutting at 2 would split it
        assert_eq!(truncate_text("aé", 2), "a");
    }
}
