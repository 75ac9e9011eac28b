//! # Simulated Backend
//!
//! A digitizer that only exists in memory. It validates settings like a real front end
//! would and rounds the trigger position to whole sample periods, so clients see the
//! same kind of position error they would see on hardware.
//!
//! ## Example Usage
//!
//! ```ignore
//! use scpi_server::server::{Config, Server};
//!
//! let digitizer = SimulatedDigitizer::new(2, 100e6);
//! let server = Server::new(digitizer, Config::default());
//! server.listen("127.0.0.1:5025")?;
//! ```
use scpi_protocol::{Slope, TriggerKind};
use scpi_server::{AcquisitionMode, Digitizer, HardwareError};

/// Lowest sample frequency the simulated front end accepts.
const MIN_FREQUENCY_HZ: f64 = 1.0;
const MAX_BUFFER_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
struct SimChannel {
    enabled: bool,
    offset_volts: f64,
    attenuation: f64,
    range_volts: f64,
}

impl Default for SimChannel {
    fn default() -> Self {
        Self {
            enabled: false,
            offset_volts: 0.0,
            attenuation: 1.0,
            range_volts: 5.0,
        }
    }
}

#[derive(Debug)]
pub struct SimulatedDigitizer {
    channels: Vec<SimChannel>,
    max_frequency_hz: f64,
    frequency_hz: f64,
    buffer_size: u64,
    trigger_kind: TriggerKind,
    trigger_slope: Slope,
    trigger_level_volts: f64,
    trigger_source: usize,
    trigger_auto_timeout_s: f64,
    trigger_position_s: f64,
    mode: AcquisitionMode,
    running: bool,
}

impl SimulatedDigitizer {
    pub fn new(channel_count: usize, max_frequency_hz: f64) -> SimulatedDigitizer {
        log::debug!(
            "Creating simulated digitizer: channels={}, max_frequency_hz={}",
            channel_count,
            max_frequency_hz
        );
        SimulatedDigitizer {
            channels: vec![SimChannel::default(); channel_count],
            max_frequency_hz,
            frequency_hz: max_frequency_hz,
            buffer_size: 8192,
            trigger_kind: TriggerKind::Edge,
            trigger_slope: Slope::Rising,
            trigger_level_volts: 0.0,
            trigger_source: 0,
            trigger_auto_timeout_s: 1.0,
            trigger_position_s: 0.0,
            mode: AcquisitionMode::Single,
            running: false,
        }
    }

    fn channel(&mut self, channel: usize) -> Result<&mut SimChannel, HardwareError> {
        self.channels
            .get_mut(channel)
            .ok_or_else(|| HardwareError::Rejected(format!("No channel {}", channel)))
    }

    fn log_armed(&self) {
        log::info!(
            "Sim armed ({:?}): {} samples at {} Hz, {:?} trigger on channel {}, {} at {} V, \
             position {:e}s, auto timeout {}s",
            self.mode,
            self.buffer_size,
            self.frequency_hz,
            self.trigger_kind,
            self.trigger_source,
            self.trigger_slope,
            self.trigger_level_volts,
            self.trigger_position_s,
            self.trigger_auto_timeout_s
        );
        for (index, channel) in self.channels.iter().enumerate().filter(|(_, c)| c.enabled) {
            log::info!(
                "Sim channel {}: range {} V, offset {} V, attenuation {}x",
                index,
                channel.range_volts,
                channel.offset_volts,
                channel.attenuation
            );
        }
    }
}

impl Digitizer for SimulatedDigitizer {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn reset(&mut self) -> Result<(), HardwareError> {
        log::debug!("Sim reset");
        *self = SimulatedDigitizer::new(self.channels.len(), self.max_frequency_hz);
        Ok(())
    }

    fn set_channel_enabled(&mut self, channel: usize, enabled: bool) -> Result<(), HardwareError> {
        log::debug!("Sim set_channel_enabled: channel={}, enabled={}", channel, enabled);
        self.channel(channel)?.enabled = enabled;
        Ok(())
    }

    fn set_offset(&mut self, channel: usize, volts: f64) -> Result<(), HardwareError> {
        log::debug!("Sim set_offset: channel={}, volts={}", channel, volts);
        self.channel(channel)?.offset_volts = volts;
        Ok(())
    }

    fn set_attenuation(&mut self, channel: usize, factor: f64) -> Result<(), HardwareError> {
        log::debug!("Sim set_attenuation: channel={}, factor={}", channel, factor);
        if factor <= 0.0 {
            return Err(HardwareError::Rejected(format!(
                "Attenuation must be positive, got {}",
                factor
            )));
        }
        self.channel(channel)?.attenuation = factor;
        Ok(())
    }

    fn set_range(&mut self, channel: usize, volts: f64) -> Result<(), HardwareError> {
        log::debug!("Sim set_range: channel={}, volts={}", channel, volts);
        if volts <= 0.0 {
            return Err(HardwareError::Rejected(format!(
                "Range must be positive, got {}",
                volts
            )));
        }
        self.channel(channel)?.range_volts = volts;
        Ok(())
    }

    fn set_frequency(&mut self, hz: u64) -> Result<(), HardwareError> {
        log::debug!("Sim set_frequency: hz={}", hz);
        let hz = hz as f64;
        if !(MIN_FREQUENCY_HZ..=self.max_frequency_hz).contains(&hz) {
            return Err(HardwareError::Rejected(format!(
                "Frequency {} Hz out of range",
                hz
            )));
        }
        self.frequency_hz = hz;
        Ok(())
    }

    fn frequency_range(&self) -> Result<(f64, f64), HardwareError> {
        Ok((MIN_FREQUENCY_HZ, self.max_frequency_hz))
    }

    fn set_buffer_size(&mut self, samples: u64) -> Result<(), HardwareError> {
        log::debug!("Sim set_buffer_size: samples={}", samples);
        if samples > MAX_BUFFER_SIZE {
            return Err(HardwareError::Rejected(format!(
                "Buffer size {} exceeds {}",
                samples, MAX_BUFFER_SIZE
            )));
        }
        self.buffer_size = samples;
        Ok(())
    }

    fn set_trigger_type(&mut self, kind: TriggerKind) -> Result<(), HardwareError> {
        log::debug!("Sim set_trigger_type: {:?}", kind);
        self.trigger_kind = kind;
        Ok(())
    }

    fn set_trigger_condition(&mut self, slope: Slope) -> Result<(), HardwareError> {
        log::debug!("Sim set_trigger_condition: {}", slope);
        self.trigger_slope = slope;
        Ok(())
    }

    fn set_trigger_level(&mut self, volts: f64) -> Result<(), HardwareError> {
        log::debug!("Sim set_trigger_level: volts={}", volts);
        self.trigger_level_volts = volts;
        Ok(())
    }

    fn set_trigger_source(&mut self, channel: usize) -> Result<(), HardwareError> {
        log::debug!("Sim set_trigger_source: channel={}", channel);
        self.channel(channel)?;
        self.trigger_source = channel;
        Ok(())
    }

    fn set_trigger_auto_timeout(&mut self, seconds: f64) -> Result<(), HardwareError> {
        log::debug!("Sim set_trigger_auto_timeout: seconds={}", seconds);
        self.trigger_auto_timeout_s = seconds;
        Ok(())
    }

    fn set_trigger_position(&mut self, seconds: f64) -> Result<(), HardwareError> {
        // The front end can only place the trigger on a sample.
        let period = 1.0 / self.frequency_hz;
        self.trigger_position_s = (seconds / period).round() * period;
        log::debug!(
            "Sim set_trigger_position: requested={:e}s, applied={:e}s",
            seconds,
            self.trigger_position_s
        );
        Ok(())
    }

    fn trigger_position(&self) -> Result<f64, HardwareError> {
        Ok(self.trigger_position_s)
    }

    fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<(), HardwareError> {
        log::debug!("Sim set_acquisition_mode: {:?}", mode);
        self.mode = mode;
        Ok(())
    }

    fn configure(&mut self, auto_start: bool, start: bool) -> Result<(), HardwareError> {
        log::debug!("Sim configure: auto_start={}, start={}", auto_start, start);
        self.running = start;
        if start {
            self.log_armed();
        }
        Ok(())
    }

    fn force_trigger(&mut self) -> Result<(), HardwareError> {
        if !self.running {
            return Err(HardwareError::Rejected(
                "Cannot force a trigger while stopped".to_string(),
            ));
        }
        log::info!(
            "Sim forced trigger: {} samples at {} Hz",
            self.buffer_size,
            self.frequency_hz
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scpi_protocol::Command;
    use scpi_server::{acquisition::Instrument, server::Config};

    #[test]
    fn trigger_position_is_rounded_to_samples() {
        let mut sim = SimulatedDigitizer::new(2, 100e6);
        sim.set_trigger_position(12.3e-9).unwrap();
        let applied = sim.trigger_position().unwrap();
        assert!((applied - 10e-9).abs() < 1e-15);
    }

    #[test]
    fn rejects_out_of_range_settings() {
        let mut sim = SimulatedDigitizer::new(2, 100e6);
        assert!(sim.set_channel_enabled(2, true).is_err());
        assert!(sim.set_frequency(200_000_000).is_err());
        assert!(sim.set_range(0, -1.0).is_err());
        assert!(sim.set_buffer_size(MAX_BUFFER_SIZE + 1).is_err());
        assert!(sim.force_trigger().is_err());
    }

    #[test]
    fn reset_keeps_channel_count() {
        let mut sim = SimulatedDigitizer::new(4, 50e6);
        sim.set_frequency(1000).unwrap();
        sim.configure(true, true).unwrap();
        sim.reset().unwrap();
        assert_eq!(sim.channel_count(), 4);
        assert!(!sim.running);
        assert_eq!(sim.frequency_range().unwrap(), (1.0, 50e6));
    }

    #[test]
    fn first_arm_after_reset_matches_software_defaults() {
        let mut instrument = Instrument::new(SimulatedDigitizer::new(2, 100e6), Config::default());
        instrument.reset();
        instrument.execute("C1:ON".parse::<Command>().unwrap());
        instrument.execute("START".parse::<Command>().unwrap());

        let state = instrument.state();
        let sim = instrument.digitizer();
        assert!(sim.running);
        assert_eq!(sim.buffer_size, state.snapshot().mem_depth);
        assert_eq!(sim.frequency_hz, 100e6);
        assert_eq!(state.snapshot().sample_interval_fs, 10_000_000);
        assert!((sim.trigger_position_s - 5e-3).abs() < 1e-12);
        assert!(state.trigger().position_error_seconds.abs() < 1e-12);
        assert!(sim.channels[0].enabled);
        assert!(!sim.channels[1].enabled);
    }
}
