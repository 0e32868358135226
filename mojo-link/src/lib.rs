//! Host side of the Mojo serial transaction protocol.
//!
//! Every transaction is a two byte header followed by
//! up to 127 payload bytes:
//!
//! ```text
//!  7    [6:0]  [7:0]
//! [w/~r, len] [addr]
//! ```

#![no_std]

#[macro_use]
mod fmt;

pub mod command;
pub mod link;

pub use command::{CommandWord, Direction, HEADER_LEN, MAX_ADDR, MAX_LEN};
pub use link::{Error, MojoLink};
