//! A loopback stand-in for the Mojo.
//!
//! [`Peripheral`] speaks the device side of the transaction
//! protocol over the same channel traits the host uses, so a
//! [`mojo_link::MojoLink`] can be driven against it directly.

#![no_std]

#[macro_use]
mod fmt;

pub mod peripheral;
pub mod rx_buffer;

pub use peripheral::{Error, Peripheral, REGISTER_COUNT};
pub use rx_buffer::RxBuffer;
