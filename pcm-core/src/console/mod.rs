//! Line-oriented command console used to drive the controller from a host.
//!
//! [`grammar`] turns one input line into a [`Command`]; [`catalog`] holds the
//! keyword table and the help text printed for each command.

pub mod catalog;
pub mod grammar;

pub use grammar::{Command, ParseError, parse};
