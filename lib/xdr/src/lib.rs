//! RFC 4506 - XDR: External Data Representation Standard
//!
//! https://datatracker.ietf.org/doc/html/rfc4506
//!
//! Every quantity is big-endian. Opaque data is aligned to 4 bytes only when the
//! caller asks for it, sFlow relies on unpadded fields in a few places.

use std::io::{Cursor, Error, ErrorKind, Read, Result};

use bytes::{Buf, BufMut};

/// Number of zero bytes needed to align `len` to the next multiple of 4.
#[inline]
pub const fn padding(len: usize) -> usize {
    (4 - (len & 3)) & 3
}

pub trait XDRReader: Read {
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Read an unsigned integer `width` bytes wide, `width` must be in `1..=8`.
    fn read_uint(&mut self, width: usize) -> Result<u64> {
        if width == 0 || width > 8 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("unsupported integer width {width}"),
            ));
        }

        let mut buf = [0; 8];
        self.read_exact(&mut buf[8 - width..])?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Read exactly `len` bytes verbatim.
    fn read_opaque(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.read_exact(&mut data)?;
        Ok(data)
    }

    /// Read `len` bytes followed by the zero padding that aligns them to 4,
    /// only the first `len` bytes are returned.
    fn read_padded_opaque(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len + padding(len)];
        self.read_exact(&mut data)?;
        data.truncate(len);

        Ok(data)
    }
}

impl<T> XDRReader for T where T: Read {}

pub trait XDRWriter: BufMut {
    /// Write the low `width` bytes of `value`, `width` must be in `1..=8`.
    #[inline]
    fn write_uint(&mut self, width: usize, value: u64) {
        self.put_uint(value, width);
    }

    #[inline]
    fn write_opaque(&mut self, data: &[u8]) {
        self.put_slice(data);
    }

    fn write_padded_opaque(&mut self, data: &[u8]) {
        self.put_slice(data);
        self.put_bytes(0, padding(data.len()));
    }
}

impl<T> XDRWriter for T where T: BufMut + ?Sized {}

/// Bounds-checked positioning over an in-memory buffer.
pub trait XDRCursor<'a> {
    /// Split the next `len` bytes off into their own cursor and advance past them.
    fn window(&mut self, len: usize) -> Result<Cursor<&'a [u8]>>;

    /// Advance past `len` bytes without looking at them.
    fn skip(&mut self, len: usize) -> Result<()>;
}

impl<'a> XDRCursor<'a> for Cursor<&'a [u8]> {
    fn window(&mut self, len: usize) -> Result<Cursor<&'a [u8]>> {
        if self.remaining() < len {
            return Err(ErrorKind::UnexpectedEof.into());
        }

        let start = self.position() as usize;
        let data: &'a [u8] = *self.get_ref();
        self.advance(len);

        Ok(Cursor::new(&data[start..start + len]))
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        if self.remaining() < len {
            return Err(ErrorKind::UnexpectedEof.into());
        }

        self.advance(len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn padding_to_four() {
        assert_eq!(padding(0), 0);
        assert_eq!(padding(1), 3);
        assert_eq!(padding(2), 2);
        assert_eq!(padding(3), 1);
        assert_eq!(padding(4), 0);
        assert_eq!(padding(78), 2);
    }

    #[test]
    fn read_widths() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut buf = Cursor::new(data.as_ref());

        assert_eq!(buf.read_uint(1).unwrap(), 0x01);
        assert_eq!(buf.read_uint(2).unwrap(), 0x0203);
        assert_eq!(buf.read_uint(4).unwrap(), 0x04050607);
        assert_eq!(buf.remaining(), 1);

        let err = buf.read_uint(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);

        let err = Cursor::new(data.as_ref()).read_uint(9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn padded_opaque() {
        let data = [b'a', b'b', b'c', 0, 0xff];
        let mut buf = Cursor::new(data.as_ref());

        assert_eq!(buf.read_padded_opaque(3).unwrap(), b"abc");
        assert_eq!(buf.position(), 4);
        assert_eq!(buf.read_u8().unwrap(), 0xff);
    }

    #[test]
    fn write_back() {
        let mut buf = BytesMut::new();
        buf.write_uint(4, 1001);
        buf.write_uint(2, 0x0800);
        buf.write_padded_opaque(&[0xaa, 0xbb, 0xcc]);

        assert_eq!(
            buf.as_ref(),
            [0x00, 0x00, 0x03, 0xe9, 0x08, 0x00, 0xaa, 0xbb, 0xcc, 0x00]
        );
    }

    #[test]
    fn window_is_bounded() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut buf = Cursor::new(data.as_ref());
        buf.skip(1).unwrap();

        let mut window = buf.window(4).unwrap();
        assert_eq!(buf.position(), 5);
        assert_eq!(window.remaining(), 4);
        assert_eq!(window.read_u32().unwrap(), 0x02030405);
        assert!(window.read_u8().is_err());

        assert!(buf.window(2).is_err());
        assert!(buf.skip(2).is_err());
        // failed attempts leave the position alone
        assert_eq!(buf.position(), 5);
    }
}
