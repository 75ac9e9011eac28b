//! The configuration the client asked for, and the copy of it that was active when the
//! instrument was last armed.
use scpi_protocol::Slope;

pub const FS_PER_SECOND: i64 = 1_000_000_000_000_000;

/// Memory depth after a reset, in samples.
pub const DEFAULT_MEM_DEPTH: u64 = 1_000_000;

/// Used when the device cannot report its frequency range (100 MS/s).
pub const FALLBACK_SAMPLE_INTERVAL_FS: i64 = 10_000_000;

#[derive(Clone, Debug, PartialEq)]
pub struct ChannelState {
    pub enabled: bool,
    pub offset_volts: f64,
    pub attenuation: f64,
    /// `None` until the client sets a range; the device default applies until then.
    pub range_volts: Option<f64>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            enabled: false,
            offset_volts: 0.0,
            attenuation: 1.0,
            range_volts: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriggerConfig {
    /// Zero-based source channel.
    pub source: usize,
    pub level_volts: f64,
    pub slope: Slope,
    /// Trigger position from the start of the buffer.
    pub delay_fs: i64,
    /// `delay_fs / sample_interval_fs`, computed on every arm.
    pub sample_index: i64,
    /// Applied minus requested trigger position. The device may round the position.
    pub position_error_seconds: f64,
}

/// The configuration copied at arm time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArmSnapshot {
    pub channels: Vec<ChannelState>,
    pub mem_depth: u64,
    pub sample_interval_fs: i64,
}

/// A hardware call that failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HardwareFault {
    pub operation: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentState {
    pub(crate) channels: Vec<ChannelState>,
    pub(crate) mem_depth: u64,
    pub(crate) sample_interval_fs: i64,
    pub(crate) trigger: TriggerConfig,
    pub(crate) armed: bool,
    pub(crate) one_shot: bool,
    pub(crate) buffers_dirty: bool,
    pub(crate) snapshot: ArmSnapshot,
    pub(crate) fault: Option<HardwareFault>,
}

impl InstrumentState {
    pub fn new(channel_count: usize, mem_depth: u64, sample_interval_fs: i64) -> InstrumentState {
        InstrumentState {
            channels: vec![ChannelState::default(); channel_count],
            mem_depth,
            sample_interval_fs,
            trigger: TriggerConfig::default(),
            armed: false,
            one_shot: false,
            buffers_dirty: true,
            snapshot: ArmSnapshot::default(),
            fault: None,
        }
    }

    pub fn channels(&self) -> &[ChannelState] {
        &self.channels
    }

    pub fn mem_depth(&self) -> u64 {
        self.mem_depth
    }

    pub fn sample_interval_fs(&self) -> i64 {
        self.sample_interval_fs
    }

    pub fn trigger(&self) -> &TriggerConfig {
        &self.trigger
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether the current acquisition was started with `SINGLE`.
    pub fn is_one_shot(&self) -> bool {
        self.one_shot
    }

    /// The configuration as of the last arm.
    pub fn snapshot(&self) -> &ArmSnapshot {
        &self.snapshot
    }

    /// The most recent failed hardware call since the last reset.
    pub fn fault(&self) -> Option<&HardwareFault> {
        self.fault.as_ref()
    }

    /// Returns whether channels or depth changed since the last call, and clears the flag.
    ///
    /// The waveform plane uses this to know when its sample buffers must be reallocated.
    pub fn take_buffers_dirty(&mut self) -> bool {
        std::mem::take(&mut self.buffers_dirty)
    }

    pub fn any_channel_enabled(&self) -> bool {
        self.channels.iter().any(|channel| channel.enabled)
    }

    /// Maps a 1-based channel number to a channel index.
    ///
    /// Numbers past the last channel are clamped to the last channel rather than
    /// rejected. `0` wraps around and is clamped as well.
    pub fn channel_index(&self, number: u32) -> usize {
        let last = self.channels.len().saturating_sub(1);
        let index = (number as usize).checked_sub(1).map_or(last, |i| i.min(last));
        if index + 1 != number as usize {
            log::warn!(
                "Channel C{} does not exist, using C{} instead",
                number,
                index + 1
            );
        }
        index
    }

    /// Trigger position relative to the middle of the buffer for a delay measured from
    /// its start.
    pub fn trigger_position_fs(&self, delay_fs: i64) -> i64 {
        let offset_samples = (self.mem_depth / 2) as i64;
        let offset_fs = offset_samples.saturating_mul(self.sample_interval_fs);
        offset_fs.saturating_sub(delay_fs)
    }

    pub(crate) fn live_snapshot(&self) -> ArmSnapshot {
        ArmSnapshot {
            channels: self.channels.clone(),
            mem_depth: self.mem_depth,
            sample_interval_fs: self.sample_interval_fs,
        }
    }
}

pub fn fs_to_seconds(fs: i64) -> f64 {
    fs as f64 / FS_PER_SECOND as f64
}
