//! # SCPI Control Plane Server Library
//!
//! This crate provides the control plane of a remote digitizer: a line based command
//! server that configures channels, timebase and trigger, and arms acquisitions.
//!
//! ## Architecture
//!
//! - **[`Digitizer`] Trait**: the interface that hardware backends implement to program
//!   the acquisition front end.
//! - **[`acquisition::Instrument`]**: the instrument aggregate. It owns the backend and
//!   the [`state::InstrumentState`] and implements the arm/disarm lifecycle.
//! - **[`dispatch`]**: maps each [`scpi_protocol::Command`] onto the instrument.
//! - **[`server::Server`]**: accepts one client at a time and drives the command loop.
//! - **[`waveform::WaveformPlane`]**: the companion task that streams captured data
//!   while a client is connected.
//!
//! ## Re-arming
//!
//! Once armed, the hardware keeps running with the configuration it had when it was
//! armed. Every command that changes the configuration therefore arms the instrument
//! again right after applying the change, while still holding the instrument lock.
//! The [`state::ArmSnapshot`] taken on each arm is what the waveform plane uses to
//! interpret a capture.
//!
//! ## Starting the Server
//!
//! ```ignore
//! use scpi_server::server::{Builder, Server};
//!
//! let server = Builder::new().build(MyDigitizer::open()?);
//! server.listen("127.0.0.1:5025")?;
//! ```
//!
//! ## Error Handling
//!
//! The protocol cannot report errors to the client. Lines that do not parse are logged
//! and skipped. Failing hardware calls are logged, remembered as the instrument's
//! [`state::HardwareFault`], and handled according to the configured
//! [`acquisition::FaultPolicy`].
//!
//! ## Logging
//!
//! This crate uses the `log` crate. Connections are logged at `info`, every received
//! line at `trace`, rejected lines at `debug` or `warn`, and hardware failures at `error`.
//!
//! ## Thread Model
//!
//! Clients are served one after another. While a client is connected the waveform plane
//! runs on its own thread; both share the instrument through a single mutex.
use std::{error::Error, fmt::Display, io};

use scpi_protocol::{Slope, TriggerKind};

pub mod acquisition;
pub mod dispatch;
pub mod server;
pub mod state;
pub mod waveform;

#[cfg(test)]
pub(crate) mod fake;

/// How the hardware captures once armed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AcquisitionMode {
    /// Capture one buffer per arm.
    #[default]
    Single,
}

/// Error reported by a [`Digitizer`] backend.
#[derive(Debug)]
pub enum HardwareError {
    /// The device refused the request.
    Rejected(String),
    IoError(io::Error),
}

impl From<io::Error> for HardwareError {
    fn from(value: io::Error) -> Self {
        HardwareError::IoError(value)
    }
}

impl Display for HardwareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HardwareError::Rejected(reason) => write!(f, "Device rejected request: {}", reason),
            HardwareError::IoError(error) => write!(f, "{}", error),
        }
    }
}

impl Error for HardwareError {}

/// Trait that hardware backends must implement to be driven by the server.
///
/// Channels are addressed by their zero-based index. Every call may fail; the server
/// logs failures and records them as the instrument's fault status instead of passing
/// them to the client.
pub trait Digitizer {
    /// Number of analog input channels.
    fn channel_count(&self) -> usize;

    /// Restores the device's power-on configuration.
    fn reset(&mut self) -> Result<(), HardwareError>;

    fn set_channel_enabled(&mut self, channel: usize, enabled: bool) -> Result<(), HardwareError>;

    /// Sets the vertical offset of a channel in volts.
    fn set_offset(&mut self, channel: usize, volts: f64) -> Result<(), HardwareError>;

    /// Sets the probe attenuation factor of a channel.
    fn set_attenuation(&mut self, channel: usize, factor: f64) -> Result<(), HardwareError>;

    /// Sets the full-scale range of a channel in volts.
    fn set_range(&mut self, channel: usize, volts: f64) -> Result<(), HardwareError>;

    /// Sets the sample frequency in Hz.
    fn set_frequency(&mut self, hz: u64) -> Result<(), HardwareError>;

    /// The lowest and highest supported sample frequency in Hz.
    fn frequency_range(&self) -> Result<(f64, f64), HardwareError>;

    /// Sets the number of samples captured per acquisition.
    fn set_buffer_size(&mut self, samples: u64) -> Result<(), HardwareError>;

    fn set_trigger_type(&mut self, kind: TriggerKind) -> Result<(), HardwareError>;

    fn set_trigger_condition(&mut self, slope: Slope) -> Result<(), HardwareError>;

    fn set_trigger_level(&mut self, volts: f64) -> Result<(), HardwareError>;

    fn set_trigger_source(&mut self, channel: usize) -> Result<(), HardwareError>;

    /// Time after which the device triggers on its own. `0.0` disables it.
    fn set_trigger_auto_timeout(&mut self, seconds: f64) -> Result<(), HardwareError>;

    /// Sets the trigger position in seconds, measured from the middle of the buffer.
    ///
    /// Devices may round the position; see [`Digitizer::trigger_position`].
    fn set_trigger_position(&mut self, seconds: f64) -> Result<(), HardwareError>;

    /// The trigger position the device actually applied.
    fn trigger_position(&self) -> Result<f64, HardwareError>;

    fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<(), HardwareError>;

    /// Applies the pending configuration.
    ///
    /// With `start` set, the device is armed and waits for the trigger. With `start`
    /// cleared, it is stopped and left idle.
    fn configure(&mut self, auto_start: bool, start: bool) -> Result<(), HardwareError>;

    /// Triggers the armed device immediately, regardless of the trigger condition.
    fn force_trigger(&mut self) -> Result<(), HardwareError>;
}
