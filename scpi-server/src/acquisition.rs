//! The instrument aggregate and its arm/disarm lifecycle.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    AcquisitionMode, Digitizer, HardwareError,
    server::Config,
    state::{FALLBACK_SAMPLE_INTERVAL_FS, FS_PER_SECOND, HardwareFault, InstrumentState},
};

/// What to do when the device reports a failure while applying a setting.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum FaultPolicy {
    /// Record the fault, then update the software state and re-arm as if the call had
    /// succeeded. Software and hardware state may disagree afterwards.
    #[default]
    Continue,
    /// Record the fault, leave the software state unchanged and skip the re-arm.
    ///
    /// When arming, a failed mode change or `configure` leaves the instrument disarmed
    /// and no trigger is forced. A failed forced trigger leaves it armed.
    AbortRearm,
}

/// Instrument shared between the command loop and the waveform plane.
pub type SharedInstrument<D> = Arc<Mutex<Instrument<D>>>;

/// Locks the shared instrument.
///
/// A panic on one side must not take the other down with it, so poisoning is ignored.
pub fn lock<D>(instrument: &SharedInstrument<D>) -> MutexGuard<'_, Instrument<D>> {
    instrument.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A digitizer together with the configuration requested for it.
///
/// The instrument is either disarmed or armed. Arming copies the live configuration into
/// the [`crate::state::ArmSnapshot`]; only a new arm replaces it.
#[derive(Debug)]
pub struct Instrument<D> {
    pub(crate) digitizer: D,
    pub(crate) state: InstrumentState,
    pub(crate) config: Config,
}

impl<D: Digitizer> Instrument<D> {
    pub fn new(digitizer: D, config: Config) -> Instrument<D> {
        let state = Self::default_state(&digitizer, &config);
        Instrument {
            digitizer,
            state,
            config,
        }
    }

    pub fn digitizer(&self) -> &D {
        &self.digitizer
    }

    pub fn digitizer_mut(&mut self) -> &mut D {
        &mut self.digitizer
    }

    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut InstrumentState {
        &mut self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resets the device and returns the software state to its defaults.
    ///
    /// The defaults are then programmed into the device, since its own power-on
    /// configuration need not match them.
    pub fn reset(&mut self) {
        let result = self.digitizer.reset();
        self.state = Self::default_state(&self.digitizer, &self.config);
        if let Err(err) = result {
            self.record_fault("reset", &err);
        }
        self.program_defaults();
        log::debug!("Instrument reset");
    }

    fn program_defaults(&mut self) {
        for index in 0..self.state.channels.len() {
            let channel = self.state.channels[index].clone();
            self.program("set_channel_enabled", |d| {
                d.set_channel_enabled(index, channel.enabled)
            });
            self.program("set_offset", |d| d.set_offset(index, channel.offset_volts));
            self.program("set_attenuation", |d| {
                d.set_attenuation(index, channel.attenuation)
            });
        }

        let hz = (FS_PER_SECOND / self.state.sample_interval_fs) as u64;
        let mem_depth = self.state.mem_depth;
        let trigger = self.state.trigger.clone();
        self.program("set_frequency", |d| d.set_frequency(hz));
        self.program("set_buffer_size", |d| d.set_buffer_size(mem_depth));
        self.program("set_trigger_condition", |d| {
            d.set_trigger_condition(trigger.slope)
        });
        self.program("set_trigger_level", |d| d.set_trigger_level(trigger.level_volts));
        self.program("set_trigger_source", |d| d.set_trigger_source(trigger.source));
        self.program("set_trigger_auto_timeout", |d| d.set_trigger_auto_timeout(0.0));
        self.set_trigger_delay(trigger.delay_fs);
    }

    /// Arms the device with the current configuration.
    ///
    /// With `force`, the device is triggered immediately instead of waiting for the
    /// trigger condition.
    pub fn start(&mut self, force: bool) {
        self.state.snapshot = self.state.live_snapshot();
        self.state.trigger.sample_index =
            self.state.trigger.delay_fs / self.state.sample_interval_fs;

        let armed = self.program("set_acquisition_mode", |d| {
            d.set_acquisition_mode(AcquisitionMode::Single)
        }) && self.program("configure", |d| d.configure(true, true));
        if armed && force {
            self.program("force_trigger", |d| d.force_trigger());
        }
        self.state.armed = armed;
        log::debug!(
            "Armed: depth={}, interval_fs={}, force={}",
            self.state.mem_depth,
            self.state.sample_interval_fs,
            force
        );
    }

    /// Stops the device. Stopping a disarmed instrument is harmless.
    pub fn stop(&mut self) {
        self.program("configure", |d| d.configure(true, false));
        self.state.armed = false;
        log::debug!("Disarmed");
    }

    /// Applies a configuration change to a running acquisition.
    pub(crate) fn rearm_if_armed(&mut self) {
        if self.state.armed {
            self.start(false);
        }
    }

    /// Runs a hardware call and decides whether the software state should follow.
    ///
    /// Returns `true` if the call succeeded, or if it failed and the fault policy is
    /// [`FaultPolicy::Continue`].
    pub(crate) fn program(
        &mut self,
        operation: &'static str,
        call: impl FnOnce(&mut D) -> Result<(), HardwareError>,
    ) -> bool {
        match call(&mut self.digitizer) {
            Ok(()) => true,
            Err(err) => {
                self.record_fault(operation, &err);
                self.config.fault_policy == FaultPolicy::Continue
            }
        }
    }

    pub(crate) fn record_fault(&mut self, operation: &'static str, err: &HardwareError) {
        log::error!("{} failed: {}", operation, err);
        self.state.fault = Some(HardwareFault {
            operation,
            message: err.to_string(),
        });
    }

    fn default_state(digitizer: &D, config: &Config) -> InstrumentState {
        let sample_interval_fs = match digitizer.frequency_range() {
            // Rounded up so the resulting rate never exceeds the maximum.
            Ok((_, max_hz)) if max_hz >= 1.0 => (FS_PER_SECOND as f64 / max_hz).ceil() as i64,
            Ok((_, max_hz)) => {
                log::warn!("Device reported maximum frequency of {} Hz", max_hz);
                FALLBACK_SAMPLE_INTERVAL_FS
            }
            Err(err) => {
                log::error!("frequency_range failed: {}", err);
                FALLBACK_SAMPLE_INTERVAL_FS
            }
        };
        InstrumentState::new(
            digitizer.channel_count(),
            config.default_memory_depth,
            sample_interval_fs.max(1),
        )
    }
}
