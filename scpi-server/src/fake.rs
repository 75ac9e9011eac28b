//! Recording backend for unit tests.
use std::collections::HashSet;

use scpi_protocol::{Slope, TriggerKind};

use crate::{AcquisitionMode, Digitizer, HardwareError};

#[derive(Debug)]
pub struct FakeDigitizer {
    pub channels: usize,
    pub calls: Vec<String>,
    /// Operations that report failure.
    pub failing: HashSet<&'static str>,
    /// Trigger positions are rounded to multiples of this.
    pub position_step: f64,
    pub position: f64,
    pub frequency_range: (f64, f64),
}

impl FakeDigitizer {
    pub fn new(channels: usize) -> FakeDigitizer {
        FakeDigitizer {
            channels,
            calls: Vec::new(),
            failing: HashSet::new(),
            position_step: 0.0,
            position: 0.0,
            frequency_range: (1.0, 100e6),
        }
    }

    pub fn failing(mut self, operation: &'static str) -> FakeDigitizer {
        self.failing.insert(operation);
        self
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&mut self, operation: &'static str, call: String) -> Result<(), HardwareError> {
        self.calls.push(call);
        if self.failing.contains(operation) {
            Err(HardwareError::Rejected(format!("{} failed", operation)))
        } else {
            Ok(())
        }
    }
}

impl Digitizer for FakeDigitizer {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn reset(&mut self) -> Result<(), HardwareError> {
        self.record("reset", "reset()".to_string())
    }

    fn set_channel_enabled(&mut self, channel: usize, enabled: bool) -> Result<(), HardwareError> {
        self.record(
            "set_channel_enabled",
            format!("set_channel_enabled({}, {})", channel, enabled),
        )
    }

    fn set_offset(&mut self, channel: usize, volts: f64) -> Result<(), HardwareError> {
        self.record("set_offset", format!("set_offset({}, {})", channel, volts))
    }

    fn set_attenuation(&mut self, channel: usize, factor: f64) -> Result<(), HardwareError> {
        self.record(
            "set_attenuation",
            format!("set_attenuation({}, {})", channel, factor),
        )
    }

    fn set_range(&mut self, channel: usize, volts: f64) -> Result<(), HardwareError> {
        self.record("set_range", format!("set_range({}, {})", channel, volts))
    }

    fn set_frequency(&mut self, hz: u64) -> Result<(), HardwareError> {
        self.record("set_frequency", format!("set_frequency({})", hz))
    }

    fn frequency_range(&self) -> Result<(f64, f64), HardwareError> {
        if self.failing.contains("frequency_range") {
            return Err(HardwareError::Rejected("frequency_range failed".to_string()));
        }
        Ok(self.frequency_range)
    }

    fn set_buffer_size(&mut self, samples: u64) -> Result<(), HardwareError> {
        self.record("set_buffer_size", format!("set_buffer_size({})", samples))
    }

    fn set_trigger_type(&mut self, kind: TriggerKind) -> Result<(), HardwareError> {
        self.record("set_trigger_type", format!("set_trigger_type({:?})", kind))
    }

    fn set_trigger_condition(&mut self, slope: Slope) -> Result<(), HardwareError> {
        self.record(
            "set_trigger_condition",
            format!("set_trigger_condition({:?})", slope),
        )
    }

    fn set_trigger_level(&mut self, volts: f64) -> Result<(), HardwareError> {
        self.record("set_trigger_level", format!("set_trigger_level({})", volts))
    }

    fn set_trigger_source(&mut self, channel: usize) -> Result<(), HardwareError> {
        self.record(
            "set_trigger_source",
            format!("set_trigger_source({})", channel),
        )
    }

    fn set_trigger_auto_timeout(&mut self, seconds: f64) -> Result<(), HardwareError> {
        self.record(
            "set_trigger_auto_timeout",
            format!("set_trigger_auto_timeout({})", seconds),
        )
    }

    fn set_trigger_position(&mut self, seconds: f64) -> Result<(), HardwareError> {
        self.position = if self.position_step > 0.0 {
            (seconds / self.position_step).round() * self.position_step
        } else {
            seconds
        };
        self.record(
            "set_trigger_position",
            format!("set_trigger_position({:e})", seconds),
        )
    }

    fn trigger_position(&self) -> Result<f64, HardwareError> {
        if self.failing.contains("trigger_position") {
            return Err(HardwareError::Rejected("trigger_position failed".to_string()));
        }
        Ok(self.position)
    }

    fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<(), HardwareError> {
        self.record(
            "set_acquisition_mode",
            format!("set_acquisition_mode({:?})", mode),
        )
    }

    fn configure(&mut self, auto_start: bool, start: bool) -> Result<(), HardwareError> {
        self.record(
            "configure",
            format!("configure({}, {})", auto_start, start),
        )
    }

    fn force_trigger(&mut self) -> Result<(), HardwareError> {
        self.record("force_trigger", "force_trigger()".to_string())
    }
}
