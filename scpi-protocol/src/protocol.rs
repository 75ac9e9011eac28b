use std::{fmt::Display, str::FromStr};

use crate::error::CommandError;

/// A single command line split into its parts.
///
/// Lines have the general shape `SUBJECT:VERB[?] arg1,arg2`. Only one subject/verb split
/// is recognized, so `TRIG:EDGE:DIR RISING` has the subject `TRIG` and the verb `EDGE:DIR`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScpiLine {
    /// Text before the first colon. Empty if the line has no colon.
    pub subject: String,
    /// The command name. Only empty if the line contained nothing but delimiters.
    pub verb: String,
    /// Whether a `?` appeared anywhere in the line.
    pub is_query: bool,
    /// Positional arguments in the order they were received.
    pub args: Vec<String>,
}

impl ScpiLine {
    /// Splits a line into subject, verb, query flag and arguments.
    ///
    /// The grammar is loose:
    /// - `?` anywhere marks a query and is dropped.
    /// - The first `:` ends the subject. Any later `:` is part of the current token.
    /// - A run of whitespace separates the verb from the arguments. Past that point,
    ///   whitespace is kept inside argument text.
    /// - `,` separates arguments.
    /// - Runs of delimiters collapse, so no empty tokens are produced.
    pub fn parse(line: &str) -> ScpiLine {
        let mut parsed = ScpiLine::default();
        let mut token = String::new();

        for c in line.chars() {
            if c == ':' && parsed.subject.is_empty() {
                parsed.subject = std::mem::take(&mut token);
                continue;
            }

            if c == '?' {
                parsed.is_query = true;
                continue;
            }

            // The whole whitespace run after the verb is a single delimiter.
            let splits_verb =
                parsed.verb.is_empty() || (token.is_empty() && parsed.args.is_empty());
            let is_delimiter = c == ',' || (c.is_ascii_whitespace() && splits_verb);
            if !is_delimiter {
                token.push(c);
                continue;
            }

            if token.is_empty() {
                continue;
            }
            parsed.push_token(std::mem::take(&mut token));
        }

        if !token.is_empty() {
            parsed.push_token(token);
        }
        parsed
    }

    fn push_token(&mut self, token: String) {
        if self.verb.is_empty() {
            self.verb = token;
        } else {
            self.args.push(token);
        }
    }
}

/// Direction of the signal edge that fires the trigger.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Slope {
    #[default]
    Rising,
    Falling,
    Either,
}

impl Slope {
    /// `RISING` and `FALLING` map to their slopes, anything else triggers on either edge.
    pub fn from_keyword(keyword: &str) -> Slope {
        match keyword.trim() {
            "RISING" => Slope::Rising,
            "FALLING" => Slope::Falling,
            _ => Slope::Either,
        }
    }
}

impl Display for Slope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slope::Rising => write!(f, "RISING"),
            Slope::Falling => write!(f, "FALLING"),
            Slope::Either => write!(f, "ANY"),
        }
    }
}

/// Trigger types understood by the server. Only edge triggers are supported for now.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TriggerKind {
    #[default]
    Edge,
}

/// A fully decoded command.
///
/// Channel numbers are kept exactly as received (1-based `C<n>`); mapping them onto the
/// physical channels is up to the server, which knows how many there are.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// `*IDN?`: vendor, model, serial and firmware version.
    Identify,
    /// `CHANS?`: number of analog channels.
    ChannelCount,
    /// `RATES?`: legal sample intervals in femtoseconds.
    SampleRates,
    /// `DEPTHS?`: supported memory depths.
    MemoryDepths,
    /// `EXIT`: ends the session.
    Exit,
    /// `C<n>:ON` and `C<n>:OFF`
    ChannelEnable { channel: u32, enabled: bool },
    /// `C<n>:OFFS <volts>`
    ChannelOffset { channel: u32, volts: f64 },
    /// `C<n>:ATTEN <factor>`
    ChannelAttenuation { channel: u32, factor: f64 },
    /// `C<n>:RANGE <volts>`: full-scale range.
    ChannelRange { channel: u32, volts: f64 },
    /// `RATE <hz>`
    SampleRate { hz: u64 },
    /// `DEPTH <samples>`
    MemoryDepth { samples: u64 },
    /// `START`, or `SINGLE` when `single` is set.
    Start { single: bool },
    /// `FORCE`: arm and trigger immediately.
    Force,
    /// `STOP`
    Stop,
    /// `TRIG:MODE <mode>`
    TriggerMode(TriggerKind),
    /// `TRIG:EDGE:DIR <slope>`
    TriggerSlope(Slope),
    /// `TRIG:LEV <volts>`
    TriggerLevel { volts: f64 },
    /// `TRIG:SOU C<n>`
    TriggerSource { channel: u32 },
    /// `TRIG:DELAY <fs>`: trigger position measured from the start of the buffer.
    TriggerDelay { femtoseconds: i64 },
}

impl Command {
    const TRIGGER_SUBJECT: &'static str = "TRIG";

    fn query(line: &ScpiLine) -> Result<Command, CommandError> {
        match line.verb.as_str() {
            "*IDN" => Ok(Command::Identify),
            "CHANS" => Ok(Command::ChannelCount),
            "RATES" => Ok(Command::SampleRates),
            "DEPTHS" => Ok(Command::MemoryDepths),
            _ => Err(CommandError::UnrecognizedQuery(line.verb.clone())),
        }
    }

    fn trigger(line: &ScpiLine) -> Result<Command, CommandError> {
        match line.verb.as_str() {
            "MODE" => match single_arg(line)?.trim() {
                "EDGE" => Ok(Command::TriggerMode(TriggerKind::Edge)),
                other => Err(CommandError::UnsupportedTriggerMode(other.to_string())),
            },
            "EDGE:DIR" => Ok(Command::TriggerSlope(Slope::from_keyword(single_arg(
                line,
            )?))),
            "LEV" => Ok(Command::TriggerLevel {
                volts: number_arg(line)?,
            }),
            "SOU" => Ok(Command::TriggerSource {
                channel: channel_number(single_arg(line)?)?,
            }),
            "DELAY" => Ok(Command::TriggerDelay {
                femtoseconds: number_arg(line)?,
            }),
            _ => Err(unrecognized(line)),
        }
    }
}

impl TryFrom<&ScpiLine> for Command {
    type Error = CommandError;

    fn try_from(line: &ScpiLine) -> Result<Self, Self::Error> {
        if line.is_query {
            return Command::query(line);
        }

        match line.verb.as_str() {
            "EXIT" => Ok(Command::Exit),
            "ON" | "OFF" => Ok(Command::ChannelEnable {
                channel: channel_number(&line.subject)?,
                enabled: line.verb == "ON",
            }),
            "OFFS" => Ok(Command::ChannelOffset {
                channel: channel_number(&line.subject)?,
                volts: number_arg(line)?,
            }),
            "ATTEN" => Ok(Command::ChannelAttenuation {
                channel: channel_number(&line.subject)?,
                factor: number_arg(line)?,
            }),
            "RANGE" => Ok(Command::ChannelRange {
                channel: channel_number(&line.subject)?,
                volts: number_arg(line)?,
            }),
            "RATE" => Ok(Command::SampleRate {
                hz: number_arg(line)?,
            }),
            "DEPTH" => Ok(Command::MemoryDepth {
                samples: number_arg(line)?,
            }),
            "START" => Ok(Command::Start { single: false }),
            "SINGLE" => Ok(Command::Start { single: true }),
            "FORCE" => Ok(Command::Force),
            "STOP" => Ok(Command::Stop),
            _ if line.subject == Command::TRIGGER_SUBJECT => Command::trigger(line),
            _ => Err(unrecognized(line)),
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::try_from(&ScpiLine::parse(s))
    }
}

fn unrecognized(line: &ScpiLine) -> CommandError {
    CommandError::UnrecognizedCommand {
        subject: line.subject.clone(),
        verb: line.verb.clone(),
    }
}

fn single_arg(line: &ScpiLine) -> Result<&str, CommandError> {
    match line.args.as_slice() {
        [arg] => Ok(arg),
        args => Err(CommandError::WrongArgumentCount {
            verb: line.verb.clone(),
            expected: 1,
            got: args.len(),
        }),
    }
}

fn number_arg<T: FromStr>(line: &ScpiLine) -> Result<T, CommandError> {
    let arg = single_arg(line)?;
    arg.trim()
        .parse::<T>()
        .map_err(|_| CommandError::InvalidNumber {
            verb: line.verb.clone(),
            arg: arg.to_string(),
        })
}

/// Parses `C<n>` (or `c<n>`) into the 1-based channel number `n`.
fn channel_number(text: &str) -> Result<u32, CommandError> {
    let text = text.trim();
    text.strip_prefix(['C', 'c'])
        .and_then(|number| number.parse::<u32>().ok())
        .ok_or_else(|| CommandError::InvalidChannel(text.to_string()))
}
