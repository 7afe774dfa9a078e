//! Virtual Display Protocol
//!
//! This crate provides the text protocol spoken by virtual point-of-sale
//! customer displays, and the line codec external senders use to reach them.
//!
//! # Protocol Overview
//!
//! A display payload is either bare text, which replaces the first line, or
//! a control sequence introduced by `ESC` (`0x1B`) or `FF` (`0x0C`):
//!
//! - **Line select**: `ESC [ row H text` writes `text` on a 1-based row
//! - **Clear**: `FF` or `ESC [ 2 J`
//! - **Theme**: `ESC ] theme ; tag BEL`
//! - **Status query**: `ESC [ 5 n`
//!
//! Payloads are decoded once into a [`Command`] against the [`LineLimits`] of
//! the target display. Text longer than a line is truncated, not rejected.
//!
//! # Ingress Wire Format
//!
//! Out-of-process senders write `PORT|MESSAGE` lines; see [`IngressCodec`].
//!
//! # Example
//!
//! ```rust
//! use vdisplay_protocol::{decode, Command, LineLimits};
//!
//! let cmd = decode("Hello World", LineLimits::new(2, 20)).unwrap();
//! assert_eq!(cmd, Command::WriteLine { index: 0, text: "Hello World".to_string() });
//! ```

mod codec;
mod commands;
mod error;
mod parser;
mod theme;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use parser::*;
pub use theme::*;
