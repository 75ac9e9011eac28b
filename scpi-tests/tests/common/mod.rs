// Not every test binary uses every helper.
#![allow(dead_code)]

use std::{
    net::{SocketAddr, TcpListener},
    thread,
};

use scpi_protocol::{Slope, TriggerKind};
use scpi_server::{
    AcquisitionMode, Digitizer, HardwareError,
    acquisition::SharedInstrument,
    server::{Builder, Identity},
};

/// Backend that records every call it receives.
#[derive(Debug, Default)]
pub struct RecordingDigitizer {
    pub calls: Vec<String>,
    pub position: f64,
}

impl RecordingDigitizer {
    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == call).count()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Digitizer for RecordingDigitizer {
    fn channel_count(&self) -> usize {
        4
    }

    fn reset(&mut self) -> Result<(), HardwareError> {
        self.calls.push("reset()".to_string());
        Ok(())
    }

    fn set_channel_enabled(&mut self, channel: usize, enabled: bool) -> Result<(), HardwareError> {
        self.calls
            .push(format!("set_channel_enabled({}, {})", channel, enabled));
        Ok(())
    }

    fn set_offset(&mut self, channel: usize, volts: f64) -> Result<(), HardwareError> {
        self.calls.push(format!("set_offset({}, {})", channel, volts));
        Ok(())
    }

    fn set_attenuation(&mut self, channel: usize, factor: f64) -> Result<(), HardwareError> {
        self.calls
            .push(format!("set_attenuation({}, {})", channel, factor));
        Ok(())
    }

    fn set_range(&mut self, channel: usize, volts: f64) -> Result<(), HardwareError> {
        self.calls.push(format!("set_range({}, {})", channel, volts));
        Ok(())
    }

    fn set_frequency(&mut self, hz: u64) -> Result<(), HardwareError> {
        self.calls.push(format!("set_frequency({})", hz));
        Ok(())
    }

    fn frequency_range(&self) -> Result<(f64, f64), HardwareError> {
        Ok((1.0, 100e6))
    }

    fn set_buffer_size(&mut self, samples: u64) -> Result<(), HardwareError> {
        self.calls.push(format!("set_buffer_size({})", samples));
        Ok(())
    }

    fn set_trigger_type(&mut self, kind: TriggerKind) -> Result<(), HardwareError> {
        self.calls.push(format!("set_trigger_type({:?})", kind));
        Ok(())
    }

    fn set_trigger_condition(&mut self, slope: Slope) -> Result<(), HardwareError> {
        self.calls.push(format!("set_trigger_condition({})", slope));
        Ok(())
    }

    fn set_trigger_level(&mut self, volts: f64) -> Result<(), HardwareError> {
        self.calls.push(format!("set_trigger_level({})", volts));
        Ok(())
    }

    fn set_trigger_source(&mut self, channel: usize) -> Result<(), HardwareError> {
        self.calls.push(format!("set_trigger_source({})", channel));
        Ok(())
    }

    fn set_trigger_auto_timeout(&mut self, seconds: f64) -> Result<(), HardwareError> {
        self.calls
            .push(format!("set_trigger_auto_timeout({})", seconds));
        Ok(())
    }

    fn set_trigger_position(&mut self, seconds: f64) -> Result<(), HardwareError> {
        self.calls.push(format!("set_trigger_position({:e})", seconds));
        self.position = seconds;
        Ok(())
    }

    fn trigger_position(&self) -> Result<f64, HardwareError> {
        Ok(self.position)
    }

    fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<(), HardwareError> {
        self.calls.push(format!("set_acquisition_mode({:?})", mode));
        Ok(())
    }

    fn configure(&mut self, auto_start: bool, start: bool) -> Result<(), HardwareError> {
        self.calls
            .push(format!("configure({}, {})", auto_start, start));
        Ok(())
    }

    fn force_trigger(&mut self) -> Result<(), HardwareError> {
        self.calls.push("force_trigger()".to_string());
        Ok(())
    }
}

pub fn test_identity() -> Identity {
    Identity::new("Acme", "Test Digitizer", "42", "1.0")
}

/// Starts a server on an ephemeral loopback port and returns its address together with
/// a handle to the instrument it drives.
pub fn spawn_server() -> (SocketAddr, SharedInstrument<RecordingDigitizer>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Listener has no address");
    let server = Builder::new()
        .identity(test_identity())
        .build(RecordingDigitizer::default());
    let instrument = server.instrument();
    thread::spawn(move || {
        if let Err(e) = server.serve(listener) {
            log::error!("Server stopped: {}", e);
        }
    });
    (addr, instrument)
}
