use std::{error::Error, fmt::Display, io};

/// Errors that may occur when reading a line from a stream.
#[derive(Debug)]
pub enum ReadError {
    IoError(io::Error),
}

impl From<io::Error> for ReadError {
    fn from(value: io::Error) -> Self {
        ReadError::IoError(value)
    }
}

impl Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::IoError(error) => write!(f, "{}", error),
        }
    }
}

impl Error for ReadError {}

/// Errors that may occur when turning a parsed line into a [`crate::Command`].
///
/// The protocol has no error response channel. Servers are expected to log these
/// and carry on with the next line.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Neither the subject nor the verb names a known command.
    UnrecognizedCommand { subject: String, verb: String },
    /// A query for a verb that has no query form.
    UnrecognizedQuery(String),
    /// The verb is known but got the wrong number of arguments.
    WrongArgumentCount {
        verb: String,
        expected: usize,
        got: usize,
    },
    /// An argument could not be converted to the number the verb expects.
    InvalidNumber { verb: String, arg: String },
    /// A per-channel verb was sent without a `C<n>` subject.
    InvalidChannel(String),
    /// `TRIG:MODE` with anything but `EDGE`.
    UnsupportedTriggerMode(String),
}

impl Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::UnrecognizedCommand { subject, verb } => {
                write!(f, "Unrecognized command {}:{}", subject, verb)
            }
            CommandError::UnrecognizedQuery(verb) => write!(f, "Unrecognized query {}?", verb),
            CommandError::WrongArgumentCount {
                verb,
                expected,
                got,
            } => write!(
                f,
                "{} expects {} argument(s), but got {}",
                verb, expected, got
            ),
            CommandError::InvalidNumber { verb, arg } => {
                write!(f, "Invalid numeric argument '{}' for {}", arg, verb)
            }
            CommandError::InvalidChannel(subject) => {
                write!(f, "Invalid channel '{}', expected C<n>", subject)
            }
            CommandError::UnsupportedTriggerMode(mode) => {
                write!(f, "Unknown trigger mode {}", mode)
            }
        }
    }
}

impl Error for CommandError {}
