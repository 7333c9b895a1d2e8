//! Little-endian binary cursor

use super::CodecError;

/// Forward-only reader over a payload buffer
#[derive(Debug, Clone)]
pub struct BinaryParser<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BinaryParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read `size` bytes
    pub fn buffer(&mut self, size: usize) -> Result<&'a [u8], CodecError> {
        if size > self.remaining() {
            return Err(CodecError::UnexpectedEnd {
                needed: size,
                remaining: self.remaining(),
            });
        }

        let slice = &self.data[self.offset..self.offset + size];
        self.offset += size;
        Ok(slice)
    }

    /// Read all unread bytes
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.offset..];
        self.offset = self.data.len();
        slice
    }

    pub fn uint8(&mut self) -> Result<u8, CodecError> {
        Ok(self.buffer(1)?[0])
    }

    pub fn uint16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn uint32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn uint64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.buffer(N)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian_integers() {
        let data = [
            0x01, // u8
            0x34, 0x12, // u16
            0x78, 0x56, 0x34, 0x12, // u32
            0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, // u64
        ];
        let mut parser = BinaryParser::new(&data);

        assert_eq!(parser.uint8().unwrap(), 0x01);
        assert_eq!(parser.uint16().unwrap(), 0x1234);
        assert_eq!(parser.uint32().unwrap(), 0x1234_5678);
        assert_eq!(parser.uint64().unwrap(), 0x0102_0304_0506_0708);
        assert!(parser.is_empty());
    }

    #[test]
    fn test_buffer_past_end_fails_without_advancing() {
        let data = [0xAA, 0xBB];
        let mut parser = BinaryParser::new(&data);

        assert_eq!(
            parser.uint32(),
            Err(CodecError::UnexpectedEnd {
                needed: 4,
                remaining: 2
            })
        );
        assert_eq!(parser.remaining(), 2);
        assert_eq!(parser.buffer(2).unwrap(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_rest_drains_parser() {
        let data = [1, 2, 3];
        let mut parser = BinaryParser::new(&data);
        parser.uint8().unwrap();

        assert_eq!(parser.rest(), &[2, 3]);
        assert!(parser.rest().is_empty());
    }
}
