//! # SCPI Control Plane Protocol
//!
//! This crate implements the text protocol used to configure a remote digitizer:
//! channel enablement, timebase, trigger and the arm/disarm lifecycle of an acquisition.
//!
//! ## Overview
//!
//! Commands are ASCII lines with the general shape `SUBJECT:VERB[?] arg1,arg2`.
//! Lines are terminated by a newline or a semicolon, replies by a newline.
//!
//! Handling a line happens in two steps:
//!
//! - [`ScpiLine::parse`] splits the raw text into subject, verb, query flag and arguments.
//! - [`Command`] turns the split line into a closed set of typed commands.
//!
//! ## Basic Usage
//!
//! ```
//! use scpi_protocol::{Command, ScpiLine};
//!
//! let line = ScpiLine::parse("C2:RANGE 5.0");
//! assert_eq!(line.subject, "C2");
//! assert_eq!(line.verb, "RANGE");
//! assert_eq!(line.args, vec!["5.0".to_string()]);
//!
//! let command = Command::try_from(&line).expect("RANGE takes one number");
//! assert_eq!(command, Command::ChannelRange { channel: 2, volts: 5.0 });
//! ```
//!
//! ### Framing
//!
//! ```
//! use scpi_protocol::codec::{read_line, write_line};
//! use std::io::Cursor;
//!
//! let mut input = Cursor::new(b"C1:ON;START\n".to_vec());
//! assert_eq!(read_line(&mut input).unwrap(), "C1:ON");
//! assert_eq!(read_line(&mut input).unwrap(), "START");
//!
//! let mut output = Vec::new();
//! write_line(&mut output, "4").unwrap();
//! assert_eq!(output, b"4\n");
//! ```
//!
//! With the `tokio` feature, [`codec::ScpiLineCodec`] offers the same framing as a
//! `tokio_util` codec.
//!
//! ## Supported Commands
//!
//! | Line | Command |
//! |---|---|
//! | `*IDN?`, `CHANS?`, `RATES?`, `DEPTHS?` | queries |
//! | `C<n>:ON`, `C<n>:OFF`, `C<n>:OFFS v`, `C<n>:ATTEN v`, `C<n>:RANGE v` | channel setup |
//! | `RATE hz`, `DEPTH n` | timebase |
//! | `START`, `SINGLE`, `FORCE`, `STOP` | acquisition |
//! | `TRIG:MODE EDGE`, `TRIG:EDGE:DIR s`, `TRIG:LEV v`, `TRIG:SOU C<n>`, `TRIG:DELAY fs` | trigger |
//! | `EXIT` | end of session |
//!
//! ## Error Handling
//!
//! [`error::ReadError`] covers transport failures, [`error::CommandError`] covers lines
//! that do not map to a command. The protocol itself has no way to report errors back
//! to the client.

pub mod protocol;
pub use protocol::*;
pub mod codec;
pub mod error;
