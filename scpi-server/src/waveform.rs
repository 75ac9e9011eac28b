//! The companion task that serves captured waveforms while a client is connected.
use std::{thread, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{Digitizer, acquisition::SharedInstrument};

/// Implemented by waveform transports.
///
/// The server calls [`WaveformPlane::run`] on a dedicated thread when a client connects
/// and cancels `stop` when the client goes away. Implementations must return soon after
/// `stop` is cancelled. To interpret a capture, use
/// [`crate::state::InstrumentState::snapshot`] rather than the live configuration,
/// which the client may already have changed again.
pub trait WaveformPlane<D>: Send + Sync + 'static {
    fn run(&self, instrument: SharedInstrument<D>, stop: CancellationToken);
}

/// Serves no data and only waits to be stopped.
#[derive(Clone, Debug)]
pub struct IdlePlane {
    poll_interval: Duration,
}

impl IdlePlane {
    pub fn new(poll_interval: Duration) -> IdlePlane {
        IdlePlane { poll_interval }
    }
}

impl Default for IdlePlane {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

impl<D: Digitizer + Send + 'static> WaveformPlane<D> for IdlePlane {
    fn run(&self, _instrument: SharedInstrument<D>, stop: CancellationToken) {
        while !stop.is_cancelled() {
            thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{acquisition::Instrument, fake::FakeDigitizer, server::Config};
    use std::sync::{Arc, Mutex};

    #[test]
    fn idle_plane_returns_when_cancelled() {
        let instrument = Arc::new(Mutex::new(Instrument::new(
            FakeDigitizer::new(1),
            Config::default(),
        )));
        let stop = CancellationToken::new();
        let handle = {
            let stop = stop.clone();
            thread::spawn(move || IdlePlane::default().run(instrument, stop))
        };
        stop.cancel();
        handle.join().unwrap();
    }
}
