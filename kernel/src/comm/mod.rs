//! The radio messaging stack.
//!
//! Layered like the wire format: `frame` defines addresses, the outer
//! frame and its checksum; `command` defines the inner command codec;
//! `link` assembles and disassembles frames on the byte transport; and
//! `adapter` binds received commands to their effectors and offers one
//! typed send per command.

pub mod adapter;
pub mod command;
pub mod frame;
pub mod link;

pub use adapter::RfAdapter;
pub use command::{Command, LcdText};
pub use frame::{Address, Frame, InnerFrame};
