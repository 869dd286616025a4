//! Decoding of `stat[n]` records, as returned by `Rstat` and by `read`ing
//! a directory fid.
//!
//! Wire shape (`stat(5)`): `size[2] type[2] dev[4] qid[13] mode[4]
//! atime[4] mtime[4] length[8] name[s] uid[s] gid[s] muid[s]`. This
//! crate only surfaces `qid`, `mode`, `atime`, `mtime`, and `length`
//! (see `Stat` in `fcall.rs`); `type`/`dev` are protocol-reserved and
//! the four trailing strings exist only so the cursor lands correctly
//! on whatever follows.

use crate::error::Result;
use crate::fcall::{Permissions, Qid, Stat};
use crate::serialize::{Decodable, Decoder};

impl Decodable for Stat {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let size = dec.read_u16()? as usize;
        let mut body = dec.sub_decoder(size)?;

        let _typ: u16 = body.decode()?;
        let _dev: u32 = body.decode()?;
        let qid: Qid = body.decode()?;
        let mode = Permissions::from_bits_truncate(body.decode()?);
        let atime: u32 = body.decode()?;
        let mtime: u32 = body.decode()?;
        let length: u64 = body.decode()?;
        let _name: String = body.decode()?;
        let _uid: String = body.decode()?;
        let _gid: String = body.decode()?;
        let _muid: String = body.decode()?;

        Ok(Stat {
            qid,
            mode,
            atime,
            mtime,
            ctime: mtime,
            length,
        })
    }
}

/// Decodes a buffer holding a concatenation of `stat[n]` records, as
/// produced by reading a directory fid.
///
/// 9P2000 has no dedicated `readdir` verb: a directory's listing is read
/// like any other file's bytes, and those bytes happen to be a run of
/// back-to-back `stat[n]` records. This type only parses that buffer; it
/// does not perform any I/O itself.
pub struct StatReader;

impl StatReader {
    /// Parse every `stat[n]` record packed into `buf`.
    ///
    /// Fails with [`crate::error::Error::MalformedMessage`] if the final
    /// record is truncated; a `buf` of length zero yields an empty
    /// `Vec`.
    pub fn entries(buf: &[u8]) -> Result<Vec<Stat>> {
        let mut dec = Decoder::new(buf);
        let mut out = Vec::new();
        while dec.remaining() > 0 {
            out.push(dec.decode()?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fcall::QidType;
    use crate::serialize::Encoder;

    fn encode_stat(buf: &mut [u8], name: &str, length: u64) -> usize {
        // Build the body first so we know its size, then prepend size[2].
        let mut body = [0u8; 128];
        let mut enc = Encoder::new(&mut body);
        enc.write_u16(0).unwrap(); // type
        enc.write_u32(0).unwrap(); // dev
        enc.encode(&Qid {
            typ: QidType::FILE,
            version: 1,
            path: 99,
        })
        .unwrap();
        enc.write_u32(Permissions::OWNER_R.bits() | Permissions::OWNER_W.bits())
            .unwrap();
        enc.write_u32(1000).unwrap(); // atime
        enc.write_u32(2000).unwrap(); // mtime
        enc.write_u64(length).unwrap();
        enc.write_str(name).unwrap();
        enc.write_str("uid").unwrap();
        enc.write_str("gid").unwrap();
        enc.write_str("muid").unwrap();
        let body_len = enc.position();

        let mut out = Encoder::new(buf);
        out.write_u16(body_len as u16).unwrap();
        let total = 2 + body_len;
        buf[2..total].copy_from_slice(&body[..body_len]);
        total
    }

    #[test]
    fn single_stat_round_trips_named_fields() {
        let mut buf = [0u8; 256];
        let len = encode_stat(&mut buf, "file.txt", 42);
        let stat: Stat = Decoder::new(&buf[..len]).decode().unwrap();
        assert_eq!(stat.length, 42);
        assert_eq!(stat.atime, 1000);
        assert_eq!(stat.mtime, 2000);
        assert_eq!(stat.ctime, 2000);
        assert!(!stat.is_dir());
    }

    #[test]
    fn entries_parses_concatenated_stats() {
        let mut buf = [0u8; 512];
        let len1 = encode_stat(&mut buf, "a", 1);
        let len2 = encode_stat(&mut buf[len1..], "bb", 2);
        let stats = StatReader::entries(&buf[..len1 + len2]).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].length, 1);
        assert_eq!(stats[1].length, 2);
    }

    #[test]
    fn entries_of_empty_buffer_is_empty() {
        assert_eq!(StatReader::entries(&[]).unwrap().len(), 0);
    }
}
