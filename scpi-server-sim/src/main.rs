//! # SCPI Server for a Simulated Digitizer
//!
//! Runs the control plane from [`scpi_server`](https://docs.rs/scpi-server/) against a
//! digitizer that only exists in memory. Useful for developing clients without hardware
//! at hand.
pub mod backends;

use std::error::Error;
use std::net::{IpAddr, SocketAddr, TcpListener};

use clap::{Parser, ValueEnum};
use clap_num::{number_range, si_number};
use env_logger::Env;
use scpi_server::{
    acquisition::FaultPolicy,
    server::{Builder, Identity},
};
use tokio::sync::oneshot;

use crate::backends::sim::SimulatedDigitizer;

const MAX_CHANNELS: usize = 16;

#[derive(ValueEnum, Eq, PartialEq, Clone, Copy, Debug)]
enum FaultPolicyArg {
    /// Keep going as if the failing call had succeeded
    Continue,
    /// Leave the configuration unchanged and skip re-arming
    Abort,
}

impl From<FaultPolicyArg> for FaultPolicy {
    fn from(value: FaultPolicyArg) -> Self {
        match value {
            FaultPolicyArg::Continue => FaultPolicy::Continue,
            FaultPolicyArg::Abort => FaultPolicy::AbortRearm,
        }
    }
}

fn channel_count(s: &str) -> Result<usize, String> {
    number_range(s, 1, MAX_CHANNELS)
}

#[derive(Parser)]
#[command(about = "SCPI control plane for a simulated digitizer", long_about=None)]
struct Args {
    #[arg(short, long, default_value = "5025")]
    port: u16,

    #[arg(short, long, default_value = "127.0.0.1")]
    ip: IpAddr,

    #[arg(short, long, default_value = "2", value_parser = channel_count, help = "Number of analog channels")]
    channels: usize,

    #[arg(long, default_value = "100M", value_parser = si_number::<u64>, help = "Highest sample rate in Hz, SI suffixes allowed")]
    max_rate: u64,

    #[arg(long, value_enum, default_value_t = FaultPolicyArg::Continue)]
    fault_policy: FaultPolicyArg,

    #[arg(long, default_value = "SIM0001", help = "Serial number reported by *IDN?")]
    serial: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    log::info!("Starting SCPI server");

    let args = Args::parse();
    log::debug!(
        "Parsed arguments: ip={}, port={}, channels={}, max_rate={}",
        args.ip,
        args.port,
        args.channels,
        args.max_rate
    );

    let server = Builder::new()
        .identity(Identity::new(
            "scpi-rs",
            "Simulated Digitizer",
            args.serial,
            env!("CARGO_PKG_VERSION"),
        ))
        .fault_policy(args.fault_policy.into())
        .build(SimulatedDigitizer::new(args.channels, args.max_rate as f64));

    let addr = SocketAddr::new(args.ip, args.port);
    log::info!("Binding to address: {}", addr);
    let listener = TcpListener::bind(addr)?;

    // Accepting blocks, so the server gets its own thread and is abandoned on Ctrl-C.
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("scpi-server".to_string())
        .spawn(move || {
            let result = server.serve(listener).map_err(|e| e.to_string());
            let _ = done_tx.send(result);
        })?;

    tokio::select! {
        result = done_rx => result??,
        _ = tokio::signal::ctrl_c() => log::info!("Interrupted, shutting down"),
    }
    Ok(())
}
