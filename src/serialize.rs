//! Serialize/deserialize 9P2000 messages into/from the session buffer.
//!
//! `Encoder`/`Decoder` borrow a slice of the session's fixed, owned
//! message buffer and track remaining capacity/length directly, failing
//! with `Error::Overflow`/`Error::MalformedMessage` instead of an
//! `io::Error`, so a short-lived cursor view can be taken without a
//! generic `std::io::Read`/`Write` stream underneath it.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::fcall::{Qid, QidType};

/// Cursor over a mutable byte slice used while building a T-message body.
///
/// Mirrors the reference client's `_9ppkt` (`buf`/`len`), but borrows the
/// session's buffer instead of re-deriving a raw pointer each call.
pub struct Encoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Encoder { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes still available in the underlying buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn encode<T: Encodable>(&mut self, value: &T) -> Result<()> {
        value.encode(self)
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.remaining() {
            return Err(Error::Overflow);
        }
        (&mut self.buf[self.pos..self.pos + bytes.len()]).copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        if self.remaining() < 1 {
            return Err(Error::Overflow);
        }
        (&mut self.buf[self.pos..]).write_u8(v).unwrap();
        self.pos += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        if self.remaining() < 2 {
            return Err(Error::Overflow);
        }
        (&mut self.buf[self.pos..]).write_u16::<LittleEndian>(v).unwrap();
        self.pos += 2;
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        if self.remaining() < 4 {
            return Err(Error::Overflow);
        }
        (&mut self.buf[self.pos..]).write_u32::<LittleEndian>(v).unwrap();
        self.pos += 4;
        Ok(())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        if self.remaining() < 8 {
            return Err(Error::Overflow);
        }
        (&mut self.buf[self.pos..]).write_u64::<LittleEndian>(v).unwrap();
        self.pos += 8;
        Ok(())
    }

    /// Encode a `string[s]`: `u16` length followed by UTF-8 bytes.
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        if s.len() > u16::MAX as usize {
            return Err(Error::Overflow);
        }
        self.write_u16(s.len() as u16)?;
        self.put(s.as_bytes())
    }

    /// Write a raw byte slice with no length prefix, e.g. a `Twrite`
    /// payload whose length was already encoded as a separate `count[4]`
    /// field.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put(bytes)
    }
}

/// Cursor over an immutable byte slice used while parsing an R-message
/// body. Every decode operation fails with `Error::MalformedMessage` if
/// the remaining length is insufficient or a declared string length
/// exceeds either the remaining length or a caller-supplied destination
/// capacity.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Decoder { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn decode<T: Decodable>(&mut self) -> Result<T> {
        T::decode(self)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::MalformedMessage(
                "message shorter than declared field".into(),
            ));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?.read_u8().unwrap())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.take(2)?.read_u16::<LittleEndian>().unwrap())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.take(4)?.read_u32::<LittleEndian>().unwrap())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.take(8)?.read_u64::<LittleEndian>().unwrap())
    }

    /// Carve off the next `len` bytes as an independent decoder, useful
    /// for fields like `stat[n]` whose own length prefix bounds a nested
    /// record that must be fully consumed even if this crate doesn't
    /// care about every field inside it.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder<'a>> {
        Ok(Decoder::new(self.take(len)?))
    }

    /// Decode a `string[s]` into an owned `String`.
    pub fn read_str(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::MalformedMessage("string field is not valid UTF-8".into()))
    }
}

/// Trait for types that can be written to an [`Encoder`].
pub trait Encodable {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()>;
}

/// Trait for types that can be parsed from a [`Decoder`].
pub trait Decodable: Sized {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self>;
}

impl Encodable for u8 {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.write_u8(*self)
    }
}
impl Encodable for u16 {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.write_u16(*self)
    }
}
impl Encodable for u32 {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.write_u32(*self)
    }
}
impl Encodable for u64 {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.write_u64(*self)
    }
}
impl Encodable for str {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.write_str(self)
    }
}
impl Encodable for String {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.write_str(self)
    }
}

impl Decodable for u8 {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        dec.read_u8()
    }
}
impl Decodable for u16 {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        dec.read_u16()
    }
}
impl Decodable for u32 {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        dec.read_u32()
    }
}
impl Decodable for u64 {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        dec.read_u64()
    }
}
impl Decodable for String {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        dec.read_str()
    }
}

impl Encodable for Qid {
    fn encode(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.write_u8(self.typ.bits())?;
        enc.write_u32(self.version)?;
        enc.write_u64(self.path)
    }
}

impl Decodable for Qid {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let typ = QidType::from_bits_truncate(dec.read_u8()?);
        let version = dec.read_u32()?;
        let path = dec.read_u64()?;
        Ok(Qid {
            typ,
            version,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_round_trip() {
        let mut buf = [0u8; 4];
        Encoder::new(&mut buf).encode(&0xdead_beef_u32).unwrap();
        assert_eq!(buf, [0xef, 0xbe, 0xad, 0xde]);
        let v: u32 = Decoder::new(&buf).decode().unwrap();
        assert_eq!(v, 0xdead_beef);
    }

    #[test]
    fn string_round_trip() {
        let mut buf = [0u8; 32];
        let mut enc = Encoder::new(&mut buf);
        enc.encode(&"9P2000".to_owned()).unwrap();
        let written = enc.position();
        assert_eq!(&buf[..2], &[6, 0]);
        let mut dec = Decoder::new(&buf[..written]);
        let s: String = dec.decode().unwrap();
        assert_eq!(s, "9P2000");
    }

    #[test]
    fn empty_string_is_two_zero_bytes() {
        let mut buf = [0xffu8; 2];
        Encoder::new(&mut buf).encode(&String::new()).unwrap();
        assert_eq!(buf, [0, 0]);
    }

    #[test]
    fn qid_round_trip() {
        let qid = Qid {
            typ: QidType::DIR,
            version: 7,
            path: 42,
        };
        let mut buf = [0u8; 13];
        Encoder::new(&mut buf).encode(&qid).unwrap();
        let decoded: Qid = Decoder::new(&buf).decode().unwrap();
        assert_eq!(decoded, qid);
    }

    #[test]
    fn decode_fails_on_truncated_buffer() {
        let buf = [0u8; 1];
        let mut dec = Decoder::new(&buf);
        let r: Result<u32> = dec.decode();
        assert!(matches!(r, Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn encode_fails_on_overflow() {
        let mut buf = [0u8; 1];
        let mut enc = Encoder::new(&mut buf);
        assert!(matches!(enc.encode(&0u32), Err(Error::Overflow)));
    }

    #[test]
    fn hstring_rejects_declared_len_exceeding_remaining() {
        // len=10 declared, but only 2 bytes follow.
        let buf = [10u8, 0, b'a', b'b'];
        let mut dec = Decoder::new(&buf);
        let r: Result<String> = dec.decode();
        assert!(matches!(r, Err(Error::MalformedMessage(_))));
    }
}
