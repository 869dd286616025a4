//! Transaction engine and protocol operations: a [`Session`] owns one
//! transport, one shared message buffer, and the fid table, and drives
//! the request/reply cycle for every verb.
//!
//! A transaction is "encode a T-message into the shared buffer, send
//! it, read back exactly one R-message, match tag and type, decode the
//! body". This engine drives a single outstanding request at a time;
//! serialization across concurrent callers is left to the embedder, and
//! `&mut self` on every verb makes "one transaction in flight" a
//! compile-time property rather than a runtime lock.

use num_traits::FromPrimitive;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::fcall::{
    Access, Fid, MsgType, OpenMode, Permissions, Qid, Stat, HEADSIZ, IOHDRSIZ, MAXFIDS, MAXWEL,
    MINSIZE, MSIZE, NOFID, NOTAG, ROOTFID, VERSION, VERSION_UNKNOWN,
};
use crate::fidtbl::FidTable;
use crate::serialize::{Decodable, Decoder, Encoder};
use crate::transport::Transport;

/// Tunable parameters for a [`Session`], with defaults matching the
/// constants in `fcall.rs`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum message size offered to the server during `version`.
    pub msize: u32,
    /// Capacity of the client-side fid table.
    pub max_fids: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            msize: MSIZE,
            max_fids: MAXFIDS,
        }
    }
}

/// A live (or not-yet-negotiated) connection to a 9P2000 file server.
pub struct Session<T: Transport> {
    transport: T,
    buf: Vec<u8>,
    offered_msize: u32,
    negotiated_msize: Option<u32>,
    fids: FidTable,
    rng: StdRng,
}

impl<T: Transport> Session<T> {
    /// Build a session seeded from OS entropy.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Session {
            transport,
            buf: vec![0u8; config.msize as usize],
            offered_msize: config.msize,
            negotiated_msize: None,
            fids: FidTable::new(config.max_fids),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Build a session with a fixed PRNG seed, for deterministic tests.
    pub fn with_seed(transport: T, config: SessionConfig, seed: u64) -> Self {
        Session {
            transport,
            buf: vec![0u8; config.msize as usize],
            offered_msize: config.msize,
            negotiated_msize: None,
            fids: FidTable::new(config.max_fids),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The message size in effect: the negotiated value once `version`
    /// has succeeded, otherwise the value this client will offer.
    pub fn msize(&self) -> u32 {
        self.negotiated_msize.unwrap_or(self.offered_msize)
    }

    /// Whether `version` has completed successfully.
    pub fn is_negotiated(&self) -> bool {
        self.negotiated_msize.is_some()
    }

    fn next_tag(&mut self) -> u16 {
        loop {
            let tag = self.rng.random_range(0..=u16::MAX);
            if tag != NOTAG {
                return tag;
            }
        }
    }

    fn resolve_iounit(&self, iounit: u32) -> u32 {
        if iounit == 0 {
            self.msize().saturating_sub(IOHDRSIZ)
        } else {
            iounit
        }
    }

    /// Encode, send, and receive one T/R-message pair.
    ///
    /// Returns the reply's message type and its body (the bytes after
    /// the 7-byte header). An `Rerror` reply is translated into
    /// `Error::ServerError` here so every verb gets that behavior for
    /// free; any other type mismatch or tag mismatch is a malformed or
    /// unsupported reply.
    fn call<F>(&mut self, typ: MsgType, tag: u16, encode_body: F) -> Result<(MsgType, Vec<u8>)>
    where
        F: FnOnce(&mut Encoder<'_>) -> Result<()>,
    {
        let head = HEADSIZ as usize;
        let cap = self.buf.len();

        let body_len = {
            let mut enc = Encoder::new(&mut self.buf[head..]);
            encode_body(&mut enc)?;
            enc.position()
        };
        let total = head + body_len;
        self.buf[0..4].copy_from_slice(&(total as u32).to_le_bytes());
        self.buf[4] = typ as u8;
        self.buf[5..7].copy_from_slice(&tag.to_le_bytes());
        log::debug!("-> {:?} tag={} len={}", typ, tag, total);
        self.transport.send(&self.buf[..total])?;

        let mut size_buf = [0u8; 4];
        self.transport.recv(&mut size_buf)?;
        let size = u32::from_le_bytes(size_buf) as usize;
        if size < head || size > cap {
            return Err(Error::MalformedMessage(format!(
                "reply size {size} out of bounds (head={head}, cap={cap})"
            )));
        }
        self.buf[0..4].copy_from_slice(&size_buf);
        self.transport.recv(&mut self.buf[4..size])?;

        let rtype_raw = self.buf[4];
        let rtag = u16::from_le_bytes([self.buf[5], self.buf[6]]);
        if rtag != tag {
            return Err(Error::MalformedMessage(format!(
                "reply tag {rtag} does not match request tag {tag}"
            )));
        }
        let body = self.buf[head..size].to_vec();

        if rtype_raw == MsgType::Rerror as u8 {
            let ename: String = Decoder::new(&body).decode()?;
            log::warn!("server returned Rerror for tag={tag}: {ename}");
            return Err(Error::ServerError(ename));
        }

        let rtype = MsgType::from_u8(rtype_raw)
            .ok_or_else(|| Error::Unsupported(format!("unknown message type {rtype_raw}")))?;
        let expected = typ as u8 + 1;
        if rtype_raw != expected {
            log::error!("expected reply type {expected}, got {rtype_raw} for tag={tag}");
            return Err(Error::Unsupported(format!(
                "expected reply type {expected}, got {rtype_raw}"
            )));
        }
        log::debug!("<- {:?} tag={} len={}", rtype, tag, size);
        Ok((rtype, body))
    }

    /// Negotiate the protocol version and message size.
    ///
    /// Must be called once, before `attach`. `Tversion`/`Rversion` are
    /// the one exchange in 9P2000 that always uses [`NOTAG`].
    pub fn version(&mut self) -> Result<()> {
        let offered = self.offered_msize;
        let (_, body) = self.call(MsgType::Tversion, NOTAG, |enc| {
            enc.write_u32(offered)?;
            enc.write_str(VERSION)
        })?;

        if body.len() < 10 {
            return Err(Error::MalformedMessage(
                "Rversion body shorter than msize[4]+len[2]+text".into(),
            ));
        }
        let mut dec = Decoder::new(&body);
        let server_msize: u32 = dec.decode()?;
        let server_version: String = dec.decode()?;

        if server_version == VERSION_UNKNOWN {
            return Err(Error::UnsupportedProtocol);
        }
        if server_version != VERSION {
            return Err(Error::Unsupported(format!(
                "server proposed unrecognized version string {server_version:?}"
            )));
        }
        if server_msize > offered {
            return Err(Error::MessageTooLarge {
                negotiated: server_msize,
                max: offered,
            });
        }
        if server_msize < MINSIZE {
            return Err(Error::MalformedMessage(format!(
                "server msize {server_msize} below minimum {MINSIZE}"
            )));
        }

        self.negotiated_msize = Some(server_msize);
        log::info!("negotiated 9P2000, msize={server_msize}");
        Ok(())
    }

    /// Attach to the root of a file tree, without authentication.
    pub fn attach(&mut self, uname: &str, aname: &str) -> Result<Fid> {
        let tag = self.next_tag();
        let (_, body) = self.call(MsgType::Tattach, tag, |enc| {
            enc.write_u32(ROOTFID)?;
            enc.write_u32(NOFID)?;
            enc.write_str(uname)?;
            enc.write_str(aname)
        })?;
        let qid: Qid = Decoder::new(&body).decode()?;
        let fid = self.fids.add(ROOTFID, qid, 0)?;
        log::info!("attached as {uname}@{aname}, root qid={qid:?}");
        Ok(fid)
    }

    /// Walk from `fid` along `path` (`/`-separated, leading/trailing
    /// slashes ignored) to a freshly allocated fid.
    ///
    /// An empty path (after normalization) clones `fid` onto a new wire
    /// fid referring to the same file. Fails with
    /// `Error::PartialWalk { resolved }` if the server could only
    /// resolve a prefix of the requested path.
    pub fn walk(&mut self, fid: Fid, path: &str) -> Result<Fid> {
        let names = split_wname(path)?;
        let newfid = self.fids.fresh_fid(&mut self.rng)?;
        let tag = self.next_tag();
        let nwname = names.len();

        let (_, body) = self.call(MsgType::Twalk, tag, |enc| {
            enc.write_u32(fid.id())?;
            enc.write_u32(newfid)?;
            enc.write_u16(nwname as u16)?;
            for name in &names {
                enc.write_str(name)?;
            }
            Ok(())
        })?;

        let mut dec = Decoder::new(&body);
        let nwqid: u16 = dec.decode()?;
        let mut last_qid = fid.qid();
        for _ in 0..nwqid {
            last_qid = dec.decode()?;
        }
        if (nwqid as usize) < nwname {
            return Err(Error::PartialWalk { resolved: nwqid });
        }
        self.fids.add(newfid, last_qid, 0)
    }

    /// Open `fid` for I/O.
    pub fn open(&mut self, fid: Fid, mode: OpenMode) -> Result<Fid> {
        let tag = self.next_tag();
        let (_, body) = self.call(MsgType::Topen, tag, |enc| {
            enc.write_u32(fid.id())?;
            enc.write_u8(mode.to_wire())
        })?;
        let mut dec = Decoder::new(&body);
        let qid: Qid = dec.decode()?;
        let iounit: u32 = dec.decode()?;
        let updated = Fid {
            fid: fid.id(),
            qid,
            off: 0,
            iounit: self.resolve_iounit(iounit),
        };
        self.fids.update(updated)?;
        Ok(updated)
    }

    /// Create `name` under the directory `fid`, and open the result.
    pub fn create(&mut self, fid: Fid, name: &str, perm: Permissions, mode: OpenMode) -> Result<Fid> {
        let tag = self.next_tag();
        let (_, body) = self.call(MsgType::Tcreate, tag, |enc| {
            enc.write_u32(fid.id())?;
            enc.write_str(name)?;
            enc.write_u32(perm.bits())?;
            enc.write_u8(mode.to_wire())
        })?;
        let mut dec = Decoder::new(&body);
        let qid: Qid = dec.decode()?;
        let iounit: u32 = dec.decode()?;
        let updated = Fid {
            fid: fid.id(),
            qid,
            off: 0,
            iounit: self.resolve_iounit(iounit),
        };
        self.fids.update(updated)?;
        Ok(updated)
    }

    /// Fetch the attributes of `fid`.
    pub fn stat(&mut self, fid: Fid) -> Result<Stat> {
        let tag = self.next_tag();
        let (_, body) = self.call(MsgType::Tstat, tag, |enc| enc.write_u32(fid.id()))?;
        // Rstat's body is `n[2] stat[n]`: an outer byte count ahead of
        // the stat record, which carries its own inner size[2]. Consume
        // the outer count before handing the rest to `Stat::decode`.
        let mut dec = Decoder::new(&body);
        let _n: u16 = dec.decode()?;
        dec.decode()
    }

    /// Release `fid` without asking the server to delete the file.
    pub fn clunk(&mut self, fid: Fid) -> Result<()> {
        let tag = self.next_tag();
        self.call(MsgType::Tclunk, tag, |enc| enc.write_u32(fid.id()))?;
        self.fids.remove(fid.id())?;
        Ok(())
    }

    /// Remove the file named by `fid` from the server.
    ///
    /// Per `remove(5)`, the fid is clunked whether or not the removal
    /// itself succeeds, so the local table entry is dropped
    /// unconditionally.
    pub fn remove(&mut self, fid: Fid) -> Result<()> {
        let tag = self.next_tag();
        let result = self.call(MsgType::Tremove, tag, |enc| enc.write_u32(fid.id()));
        let _ = self.fids.remove(fid.id());
        result.map(|_| ())
    }

    /// Read up to `buf.len()` bytes starting at `fid`'s current offset,
    /// chunked to `fid`'s `iounit`. Stops early on a short read or an
    /// `Rread` of zero bytes (end of file); does not touch the wire at
    /// all if `buf` is empty.
    ///
    /// Advances `fid`'s offset by the number of bytes actually read.
    pub fn read(&mut self, fid: &mut Fid, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let chunk_cap = self.resolve_iounit(fid.iounit()).min(self.msize().saturating_sub(IOHDRSIZ));
        let mut total = 0usize;
        while total < buf.len() {
            let want = (buf.len() - total).min(chunk_cap as usize);
            if want == 0 {
                break;
            }
            let tag = self.next_tag();
            let off = fid.off;
            let (_, body) = self.call(MsgType::Tread, tag, |enc| {
                enc.write_u32(fid.id())?;
                enc.write_u64(off)?;
                enc.write_u32(want as u32)
            })?;
            let mut dec = Decoder::new(&body);
            let count: u32 = dec.decode()?;
            let count = count as usize;
            let payload_available = body.len() - 4;
            if count > want || count > payload_available {
                return Err(Error::MalformedMessage(
                    "Rread count exceeds the bytes actually delivered".into(),
                ));
            }
            buf[total..total + count].copy_from_slice(&body[4..4 + count]);
            total += count;
            fid.off += count as u64;
            if count < want {
                break;
            }
        }
        self.fids.update(*fid)?;
        Ok(total)
    }

    /// Write all of `data` starting at `fid`'s current offset, chunked
    /// to `fid`'s `iounit`. Stops early on a short write; does not touch
    /// the wire at all if `data` is empty.
    ///
    /// Advances `fid`'s offset by the number of bytes actually written.
    pub fn write(&mut self, fid: &mut Fid, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let chunk_cap = self.resolve_iounit(fid.iounit()).min(self.msize().saturating_sub(IOHDRSIZ));
        let mut total = 0usize;
        while total < data.len() {
            let want = (data.len() - total).min(chunk_cap as usize);
            if want == 0 {
                break;
            }
            let tag = self.next_tag();
            let off = fid.off;
            let chunk = &data[total..total + want];
            let (_, body) = self.call(MsgType::Twrite, tag, |enc| {
                enc.write_u32(fid.id())?;
                enc.write_u64(off)?;
                enc.write_u32(want as u32)?;
                enc.write_bytes(chunk)
            })?;
            let count: u32 = Decoder::new(&body).decode()?;
            let count = count as usize;
            total += count;
            fid.off += count as u64;
            if count < want {
                break;
            }
        }
        self.fids.update(*fid)?;
        Ok(total)
    }
}

/// Normalize a walk path into its name elements: strip a leading and a
/// single trailing slash, then split on `/`. Rejects interior empty
/// components (`a//b`) and paths longer than [`MAXWEL`] elements. An
/// all-slash or empty path normalizes to zero elements (a walk-in-place).
fn split_wname(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim_start_matches('/');
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::MalformedMessage(
            "walk path contains an empty element".into(),
        ));
    }
    if parts.len() > MAXWEL {
        return Err(Error::NameTooLong);
    }
    Ok(parts)
}
