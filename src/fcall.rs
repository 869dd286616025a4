//! 9P2000 protocol data types and constants.
//!
//! # Protocol
//! 9P2000

use bitflags::bitflags;
use enum_primitive::*;

/// 9P2000 version string
pub const VERSION: &str = "9P2000";

/// The version string that comes with `Rversion` when the server does not
/// understand the client's version string
pub const VERSION_UNKNOWN: &str = "unknown";

/// Special tag which `Tversion`/`Rversion` must use as `tag`
pub const NOTAG: u16 = !0;

/// Special value which `Tattach` with no auth must use as `afid`
///
/// If the client does not wish to authenticate the connection, or knows
/// that authentication is not required, the afid field in the attach
/// message should be set to `NOFID`.
pub const NOFID: u32 = !0;

/// Client-reserved fid identifying the root of the attached file tree.
pub const ROOTFID: u32 = 1;

/// Size of the 7-byte 9P message header: size[4] type[1] tag[2]
pub const HEADSIZ: u32 = 7;

/// Wire size of a qid: type[1] version[4] path[8]
pub const QIDSIZ: u32 = 13;

/// Ample room for Tread/Rwrite header overhead.
///
/// size[4] Tread/Twrite[2] tag[2] fid[4] offset[8] count[4]
pub const IOHDRSIZ: u32 = 24;

/// Minimum message size this client will accept from a server during
/// `version` negotiation.
pub const MINSIZE: u32 = 64;

/// Maximum number of name elements that may be packed into a single
/// `Twalk` message.
pub const MAXWEL: usize = 16;

/// Default maximum message size offered during `version` negotiation.
pub const MSIZE: u32 = 8192;

/// Default fid table capacity.
pub const MAXFIDS: usize = 128;

/// Open for read.
pub const OREAD: u8 = 0;
/// Open for write.
pub const OWRITE: u8 = 1;
/// Open for read and write.
pub const ORDWR: u8 = 2;
/// Open for execute (checked like read, but against execute permission).
pub const OEXEC: u8 = 3;
/// Or'ed in (except for exec): truncate the file first.
pub const OTRUNC: u8 = 0x10;

bitflags! {
    /// Bits in `Qid.typ`.
    ///
    /// # Protocol
    /// 9P2000
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord)]
    pub struct QidType: u8 {
        #[doc = "Type bit for directories"]
        const DIR    = 0x80;
        #[doc = "Type bit for append only files"]
        const APPEND = 0x40;
        #[doc = "Type bit for exclusive use files"]
        const EXCL   = 0x20;
        #[doc = "Type bit for mounted channel"]
        const MOUNT  = 0x10;
        #[doc = "Type bit for authentication file"]
        const AUTH   = 0x08;
        #[doc = "Type bit for not-backed-up file"]
        const TMP    = 0x04;
        #[doc = "Plain file"]
        const FILE   = 0x00;
    }
}

bitflags! {
    /// Bits in `Stat.mode` / `Tcreate.perm` (high byte); echoed in `Qid.typ`.
    ///
    /// # Protocol
    /// 9P2000
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord)]
    pub struct Permissions: u32 {
        #[doc = "Mode bit for directories"]
        const DMDIR    = 0x8000_0000;
        #[doc = "Mode bit for append only files"]
        const DMAPPEND = 0x4000_0000;
        #[doc = "Mode bit for exclusive use files"]
        const DMEXCL   = 0x2000_0000;
        #[doc = "Mode bit for mounted channel"]
        const DMMOUNT  = 0x1000_0000;
        #[doc = "Mode bit for authentication file"]
        const DMAUTH   = 0x0800_0000;
        #[doc = "Mode bit for non-backed-up files"]
        const DMTMP    = 0x0400_0000;
        #[doc = "Owner read permission"]
        const OWNER_R  = 0o400;
        #[doc = "Owner write permission"]
        const OWNER_W  = 0o200;
        #[doc = "Owner execute permission"]
        const OWNER_X  = 0o100;
        #[doc = "Group read permission"]
        const GROUP_R  = 0o040;
        #[doc = "Group write permission"]
        const GROUP_W  = 0o020;
        #[doc = "Group execute permission"]
        const GROUP_X  = 0o010;
        #[doc = "World read permission"]
        const OTHER_R  = 0o004;
        #[doc = "World write permission"]
        const OTHER_W  = 0o002;
        #[doc = "World execute permission"]
        const OTHER_X  = 0o001;
    }
}

/// I/O mode used by `open`/`create`, corresponding to the low bits of the
/// 9P `mode[1]` field (`OREAD`, `OWRITE`, `ORDWR`, `OEXEC`) plus the
/// `OTRUNC` flag.
///
/// Kept as a small enum plus a boolean rather than a raw `u8` so that a
/// caller cannot accidentally pass POSIX `O_*` flags, whose numeric values
/// do not agree with the Plan 9 constants beyond `OREAD`/`OWRITE`/`ORDWR`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpenMode {
    pub access: Access,
    pub truncate: bool,
}

/// Access portion of [`OpenMode`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
    Exec,
}

impl OpenMode {
    pub const fn new(access: Access) -> Self {
        OpenMode {
            access,
            truncate: false,
        }
    }

    pub const fn truncating(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// Encode to the wire `mode[1]` byte.
    pub fn to_wire(self) -> u8 {
        let base = match self.access {
            Access::Read => OREAD,
            Access::Write => OWRITE,
            Access::ReadWrite => ORDWR,
            Access::Exec => OEXEC,
        };
        if self.truncate { base | OTRUNC } else { base }
    }
}

/// Server-assigned unique file identity.
///
/// Two qids are equal if and only if they name the same file on the same
/// server.
///
/// # Protocol
/// 9P2000
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Qid {
    /// Whether the file is a directory, append-only file, etc.
    pub typ: QidType,
    /// Version number for a file; incremented every time the file is
    /// modified.
    pub version: u32,
    /// An integer unique among all files in the hierarchy.
    pub path: u64,
}

/// Client-local handle to a server file.
///
/// Analogous to a file descriptor: the value itself is meaningless to the
/// server beyond being an opaque key, but the triple (fid, qid, off) is
/// what lets this crate offer sequential read/write semantics over a
/// stateless wire protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fid {
    pub(crate) fid: u32,
    pub(crate) qid: Qid,
    pub(crate) off: u64,
    pub(crate) iounit: u32,
}

impl Fid {
    /// The raw wire fid.
    pub fn id(&self) -> u32 {
        self.fid
    }

    /// Last qid observed for this fid (from `attach`, `walk`, `open`, or
    /// `create`).
    pub fn qid(&self) -> Qid {
        self.qid
    }

    /// Client-tracked byte offset used by the I/O chunker for sequential
    /// read/write.
    pub fn offset(&self) -> u64 {
        self.off
    }

    /// Maximum bytes transferable in one read/write without fragmentation.
    pub fn iounit(&self) -> u32 {
        self.iounit
    }
}

/// Plan 9 file attributes, as returned by `stat`.
///
/// The trailing `name`, `uid`, `gid`, `muid` string fields are
/// intentionally omitted here: the wire encoding still has to be parsed
/// past them for the cursor to land correctly, but nothing refers to
/// their contents afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stat {
    pub qid: Qid,
    pub mode: Permissions,
    pub atime: u32,
    pub mtime: u32,
    /// Mirrors `mtime`; 9P2000 has no separate change time.
    pub ctime: u32,
    pub length: u64,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.mode.contains(Permissions::DMDIR)
    }
}

enum_from_primitive! {
    /// 9P2000 message type, one octet on the wire.
    #[doc = "Message type, 9P operations"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum MsgType {
        Tversion = 100,
        Rversion,
        Tauth,
        Rauth,
        Tattach,
        Rattach,
        Terror, // Illegal, never sent
        Rerror,
        Tflush,
        Rflush,
        Twalk,
        Rwalk,
        Topen,
        Ropen,
        Tcreate,
        Rcreate,
        Tread,
        Rread,
        Twrite,
        Rwrite,
        Tclunk,
        Rclunk,
        Tremove,
        Rremove,
        Tstat,
        Rstat,
        Twstat,
        Rwstat,
    }
}

impl MsgType {
    /// `true` if this is a T-message (client to server).
    pub fn is_t(&self) -> bool {
        !self.is_r()
    }

    /// `true` if this is an R-message (server to client).
    pub fn is_r(&self) -> bool {
        (*self as u8) % 2 == 1
    }
}
