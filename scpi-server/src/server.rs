use std::{
    fmt::Display,
    io::{ErrorKind, Read, Write},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        Arc, Mutex,
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::Duration,
};

use scpi_protocol::{
    Command, ScpiLine,
    codec::{read_line, write_line},
    error::{CommandError, ReadError},
};
use tokio_util::sync::CancellationToken;

use crate::{
    Digitizer,
    acquisition::{FaultPolicy, Instrument, SharedInstrument, lock},
    dispatch::Outcome,
    state::DEFAULT_MEM_DEPTH,
    waveform::{IdlePlane, WaveformPlane},
};

/// The reply to `*IDN?`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Identity {
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl Identity {
    pub fn new(
        vendor: impl Into<String>,
        model: impl Into<String>,
        serial: impl Into<String>,
        firmware: impl Into<String>,
    ) -> Identity {
        Identity {
            vendor: vendor.into(),
            model: model.into(),
            serial: serial.into(),
            firmware: firmware.into(),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Identity::new("scpi-rs", "Digitizer", "0", env!("CARGO_PKG_VERSION"))
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.vendor, self.model, self.serial, self.firmware
        )
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub identity: Identity,
    /// Reported by `DEPTHS?`.
    pub memory_depths: Vec<u64>,
    /// Memory depth after every reset.
    pub default_memory_depth: u64,
    /// `None` waits for commands forever.
    pub read_write_timeout: Option<Duration>,
    /// How long to wait for the waveform plane to stop after a client disconnects.
    pub data_plane_join_timeout: Duration,
    pub fault_policy: FaultPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: Identity::default(),
            memory_depths: vec![65536],
            default_memory_depth: DEFAULT_MEM_DEPTH,
            read_write_timeout: None,
            data_plane_join_timeout: Duration::from_secs(5),
            fault_policy: FaultPolicy::default(),
        }
    }
}

pub struct Server<D, W = IdlePlane> {
    instrument: SharedInstrument<D>,
    plane: Arc<W>,
    config: Config,
}

/// Builder to create a [Server] instance and modify configuration options
///
/// # Example
///
/// ```ignore
/// use scpi_server::server::{Builder, Identity};
/// use scpi_server::acquisition::FaultPolicy;
///
/// let server = Builder::new()
///     .identity(Identity::new("Digilent", "Analog Discovery 2", "SN:210321A", "3.16"))
///     .fault_policy(FaultPolicy::AbortRearm)
///     .build(my_digitizer);
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the fields reported by `*IDN?`
    pub fn identity(mut self, identity: Identity) -> Self {
        self.config.identity = identity;
        self
    }

    /// Set the memory depths reported by `DEPTHS?`
    pub fn memory_depths(mut self, depths: Vec<u64>) -> Self {
        self.config.memory_depths = depths;
        self
    }

    /// Set the memory depth the instrument starts with after a reset
    pub fn default_memory_depth(mut self, depth: u64) -> Self {
        self.config.default_memory_depth = depth;
        self
    }

    /// Set the TCP read and write timeout
    pub fn rw_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_write_timeout = Some(timeout);
        self
    }

    /// Set how long to wait for the waveform plane when a client disconnects
    pub fn data_plane_join_timeout(mut self, timeout: Duration) -> Self {
        self.config.data_plane_join_timeout = timeout;
        self
    }

    /// Set how failing hardware calls are handled
    pub fn fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.config.fault_policy = policy;
        self
    }

    /// Return the configuration without building a server
    pub fn config(self) -> Config {
        self.config
    }

    /// Build and return the server
    pub fn build<D: Digitizer + Send + 'static>(self, digitizer: D) -> Server<D> {
        Server::new(digitizer, self.config)
    }
}

impl<D: Digitizer + Send + 'static> Server<D> {
    pub fn new(digitizer: D, config: Config) -> Server<D> {
        Server {
            instrument: Arc::new(Mutex::new(Instrument::new(digitizer, config.clone()))),
            plane: Arc::new(IdlePlane::default()),
            config,
        }
    }
}

impl<D: Digitizer + Send + 'static, W: WaveformPlane<D>> Server<D, W> {
    /// Replace the waveform plane that runs alongside each client session.
    pub fn with_waveform_plane<P: WaveformPlane<D>>(self, plane: P) -> Server<D, P> {
        Server {
            instrument: self.instrument,
            plane: Arc::new(plane),
            config: self.config,
        }
    }

    /// Handle to the instrument, shared with the command loop.
    pub fn instrument(&self) -> SharedInstrument<D> {
        Arc::clone(&self.instrument)
    }

    pub fn listen(&self, addr: impl ToSocketAddrs) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr)?;
        self.serve(listener)
    }

    /// Accept clients from an already bound listener, one at a time.
    pub fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("Server listening for connections");

        for stream in listener.incoming() {
            match stream {
                Ok(tcp) => {
                    let peer_addr = tcp.peer_addr().ok();
                    if let Some(addr) = peer_addr {
                        log::info!("New client connection from {}", addr);
                    }
                    if let Err(e) = self.handle_client(tcp) {
                        log::error!("Client error: {}", e);
                    }
                }
                Err(e) => log::error!("Connection error: {}", e),
            }
        }
        Ok(())
    }

    fn handle_client(&self, mut tcp: TcpStream) -> Result<(), ReadError> {
        if let Err(e) = tcp.set_nodelay(true) {
            log::warn!("Failed to disable Nagle on socket, performance may be poor: {}", e);
        }
        tcp.set_read_timeout(self.config.read_write_timeout)?;
        tcp.set_write_timeout(self.config.read_write_timeout)?;
        self.run_session(&mut tcp)
    }

    /// Serve a single client until it disconnects or sends `EXIT`.
    ///
    /// The instrument is reset before and after the session. The waveform plane runs
    /// for the duration of the session and is stopped before this returns.
    pub fn run_session(&self, stream: &mut (impl Read + Write)) -> Result<(), ReadError> {
        lock(&self.instrument).reset();

        let stop = CancellationToken::new();
        let (done_tx, done_rx) = mpsc::channel();
        let companion = {
            let plane = Arc::clone(&self.plane);
            let instrument = Arc::clone(&self.instrument);
            let stop = stop.clone();
            thread::Builder::new()
                .name("waveform-plane".to_string())
                .spawn(move || {
                    plane.run(instrument, stop);
                    let _ = done_tx.send(());
                })?
        };

        let result = self.command_loop(stream);

        lock(&self.instrument).reset();
        log::info!("Client disconnected");

        stop.cancel();
        match done_rx.recv_timeout(self.config.data_plane_join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if companion.join().is_err() {
                    log::error!("Waveform plane panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::error!(
                    "Waveform plane did not stop within {:?}, detaching it",
                    self.config.data_plane_join_timeout
                );
            }
        }
        result
    }

    fn command_loop(&self, stream: &mut (impl Read + Write)) -> Result<(), ReadError> {
        loop {
            let line = match read_line(stream) {
                Ok(line) => line,
                Err(ReadError::IoError(err))
                    if err.kind() == ErrorKind::TimedOut || err.kind() == ErrorKind::WouldBlock =>
                {
                    log::error!("Client read timeout, closing connection");
                    break;
                }
                Err(ReadError::IoError(err))
                    if err.kind() == ErrorKind::UnexpectedEof
                        || err.kind() == ErrorKind::ConnectionAborted
                        || err.kind() == ErrorKind::ConnectionReset =>
                {
                    break;
                } // Client disconnected
                Err(other) => return Err(other),
            };
            log::trace!("Received line: {}", line);
            if line.trim().is_empty() {
                continue;
            }

            let parsed = ScpiLine::parse(&line);
            let command = match Command::try_from(&parsed) {
                Ok(command) => command,
                Err(err) => {
                    log_rejected(&line, &parsed, &err);
                    continue;
                }
            };

            // The guard is dropped before replying.
            let outcome = lock(&self.instrument).execute(command);
            match outcome {
                Outcome::Done => {}
                Outcome::Reply(reply) => {
                    log::debug!("Sending reply: {}", reply);
                    write_line(stream, &reply)?;
                }
                Outcome::Exit => break,
            }
        }
        Ok(())
    }
}

fn log_rejected(line: &str, parsed: &ScpiLine, err: &CommandError) {
    match err {
        CommandError::UnrecognizedCommand { .. } | CommandError::UnrecognizedQuery(_) => {
            log::debug!("{}: {}", err, line);
            log::debug!("  Subject: {}", parsed.subject);
            log::debug!("  Command: {}", parsed.verb);
            for arg in &parsed.args {
                log::debug!("  Arg: {}", arg);
            }
        }
        CommandError::WrongArgumentCount { .. }
        | CommandError::InvalidNumber { .. }
        | CommandError::InvalidChannel(_)
        | CommandError::UnsupportedTriggerMode(_) => {
            log::warn!("Ignoring '{}': {}", line, err);
        }
    }
}
