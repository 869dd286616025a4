//! Client library for the 9P2000 network file-service protocol.
//!
//! Provides the wire codec, a fixed-capacity fid table, and a
//! [`session::Session`] that drives the `version`/`attach`/`walk`/
//! `open`/`create`/`read`/`write`/`stat`/`clunk`/`remove` transactions
//! over any [`transport::Transport`]. It does not implement a
//! transport, a VFS layer, authentication, or any server-side behavior;
//! those are left to the embedder.
//!
//! # Protocol
//! 9P2000

pub mod error;
pub mod fcall;
pub mod fidtbl;
pub mod serialize;
pub mod session;
pub mod stat;
pub mod transport;

pub use crate::error::{Error, Result};
pub use crate::fcall::*;
pub use crate::session::{Session, SessionConfig};
pub use crate::transport::Transport;
