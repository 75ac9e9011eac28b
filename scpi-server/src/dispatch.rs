//! Applies decoded commands to the instrument.
use scpi_protocol::Command;

use crate::{
    Digitizer,
    acquisition::Instrument,
    state::{FS_PER_SECOND, fs_to_seconds},
};

/// Sample rates below this are not offered to clients.
pub const MIN_REPORTED_FREQUENCY_HZ: f64 = 1000.0;

/// What the session loop should do after a command has been handled.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Done,
    /// Send this line back to the client.
    Reply(String),
    /// End the session.
    Exit,
}

/// Sample intervals in femtoseconds for a frequency range, walking down from `max_hz`
/// in 1-2-5 steps.
///
/// Each decade yields three values, for `f`, `f / 2` and `f / 5`. The walk stops once
/// `f` drops below `min_hz`, which is never taken lower than 1 kHz.
pub fn sample_intervals(min_hz: f64, max_hz: f64) -> Vec<i64> {
    let min_hz = min_hz.max(MIN_REPORTED_FREQUENCY_HZ);
    let mut intervals = Vec::new();
    let mut freq = max_hz;
    while freq.is_finite() && freq >= min_hz {
        for divisor in [1.0, 2.0, 5.0] {
            intervals.push((FS_PER_SECOND as f64 / (freq / divisor)).round() as i64);
        }
        freq /= 10.0;
    }
    intervals
}

/// Formats a list the way clients expect it: every value followed by a comma.
fn comma_list<T: ToString>(values: &[T]) -> String {
    values.iter().map(|v| v.to_string() + ",").collect()
}

impl<D: Digitizer> Instrument<D> {
    /// Handles a single command.
    ///
    /// Commands that change the configuration re-arm a running acquisition before
    /// returning, so the caller must hold the instrument lock for the whole call.
    pub fn execute(&mut self, command: Command) -> Outcome {
        log::debug!("Executing {:?}", command);
        match command {
            Command::Identify => Outcome::Reply(self.config.identity.to_string()),
            Command::ChannelCount => Outcome::Reply(self.state.channels.len().to_string()),
            Command::SampleRates => match self.digitizer.frequency_range() {
                Ok((min_hz, max_hz)) => {
                    Outcome::Reply(comma_list(&sample_intervals(min_hz, max_hz)))
                }
                Err(err) => {
                    self.record_fault("frequency_range", &err);
                    Outcome::Reply(String::new())
                }
            },
            Command::MemoryDepths => Outcome::Reply(comma_list(&self.config.memory_depths)),
            Command::Exit => Outcome::Exit,
            Command::ChannelEnable { channel, enabled } => {
                let index = self.state.channel_index(channel);
                if self.program("set_channel_enabled", |d| {
                    d.set_channel_enabled(index, enabled)
                }) {
                    self.state.channels[index].enabled = enabled;
                    self.state.buffers_dirty = true;
                    self.rearm_if_armed();
                }
                Outcome::Done
            }
            Command::ChannelOffset { channel, volts } => {
                let index = self.state.channel_index(channel);
                if self.program("set_offset", |d| d.set_offset(index, volts)) {
                    self.state.channels[index].offset_volts = volts;
                    self.rearm_if_armed();
                }
                Outcome::Done
            }
            Command::ChannelAttenuation { channel, factor } => {
                let index = self.state.channel_index(channel);
                if self.program("set_attenuation", |d| d.set_attenuation(index, factor)) {
                    self.state.channels[index].attenuation = factor;
                    self.rearm_if_armed();
                }
                Outcome::Done
            }
            Command::ChannelRange { channel, volts } => {
                let index = self.state.channel_index(channel);
                if self.program("set_range", |d| d.set_range(index, volts)) {
                    self.state.channels[index].range_volts = Some(volts);
                    self.rearm_if_armed();
                }
                Outcome::Done
            }
            Command::SampleRate { hz } => {
                // Rates above 1 PHz have no whole femtosecond interval.
                if hz == 0 || hz > FS_PER_SECOND as u64 {
                    log::warn!("Ignoring sample rate of {} Hz", hz);
                    return Outcome::Done;
                }
                if self.program("set_frequency", |d| d.set_frequency(hz)) {
                    self.state.sample_interval_fs = FS_PER_SECOND / hz as i64;
                    self.rearm_if_armed();
                }
                Outcome::Done
            }
            Command::MemoryDepth { samples } => {
                if samples == 0 {
                    log::warn!("Ignoring memory depth of 0 samples");
                    return Outcome::Done;
                }
                if self.program("set_buffer_size", |d| d.set_buffer_size(samples)) {
                    self.state.mem_depth = samples;
                    self.state.buffers_dirty = true;
                    self.rearm_if_armed();
                }
                Outcome::Done
            }
            Command::Start { single } => {
                if self.state.armed {
                    log::info!("Ignoring START command because trigger is already armed");
                } else if !self.state.any_channel_enabled() {
                    log::info!("Ignoring START command because no channels are active");
                } else {
                    self.start(false);
                    self.state.one_shot = single;
                }
                Outcome::Done
            }
            Command::Force => {
                self.start(true);
                Outcome::Done
            }
            Command::Stop => {
                self.stop();
                Outcome::Done
            }
            Command::TriggerMode(kind) => {
                self.program("set_trigger_type", |d| d.set_trigger_type(kind));
                Outcome::Done
            }
            Command::TriggerSlope(slope) => {
                if self.program("set_trigger_condition", |d| d.set_trigger_condition(slope)) {
                    self.state.trigger.slope = slope;
                    self.rearm_if_armed();
                }
                Outcome::Done
            }
            Command::TriggerLevel { volts } => {
                if self.program("set_trigger_level", |d| d.set_trigger_level(volts)) {
                    self.state.trigger.level_volts = volts;
                    self.rearm_if_armed();
                }
                Outcome::Done
            }
            Command::TriggerSource { channel } => {
                let index = self.state.channel_index(channel);
                if !self.program("set_trigger_source", |d| d.set_trigger_source(index)) {
                    return Outcome::Done;
                }
                // The device already follows the new source, even if the timeout fails.
                self.state.trigger.source = index;
                if self.program("set_trigger_auto_timeout", |d| {
                    d.set_trigger_auto_timeout(0.0)
                }) {
                    self.rearm_if_armed();
                }
                Outcome::Done
            }
            Command::TriggerDelay { femtoseconds } => {
                self.set_trigger_delay(femtoseconds);
                Outcome::Done
            }
        }
    }

    /// The client measures the delay from the start of the buffer while the device
    /// measures the trigger position from its middle.
    pub(crate) fn set_trigger_delay(&mut self, delay_fs: i64) {
        let requested = fs_to_seconds(self.state.trigger_position_fs(delay_fs));
        if !self.program("set_trigger_position", |d| d.set_trigger_position(requested)) {
            return;
        }

        let actual = match self.digitizer.trigger_position() {
            Ok(actual) => actual,
            Err(err) => {
                self.record_fault("trigger_position", &err);
                requested
            }
        };
        self.state.trigger.delay_fs = delay_fs;
        self.state.trigger.position_error_seconds = actual - requested;
        log::debug!(
            "Trigger position: requested={:e}s, actual={:e}s",
            requested,
            actual
        );
        self.rearm_if_armed();
    }
}
