//! # SCPI Client
//!
//! A blocking client for SCPI control-plane servers.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use scpi_client::ScpiClient;
//!
//! let mut client = ScpiClient::new("127.0.0.1:5025")?;
//! println!("Connected to {}", client.identify()?);
//!
//! client.send("C1:ON")?;
//! client.send("RATE 100000000")?;
//! client.send("TRIG:LEV 0.5")?;
//! client.send("SINGLE")?;
//! ```
//!
//! Only queries produce a reply. Commands that the server cannot handle are dropped
//! silently, since the protocol has no error responses.
//!
//! ## Related Crates
//!
//! - [`scpi_protocol`] - Line framing and command parsing
use std::{
    io,
    net::{TcpStream, ToSocketAddrs},
};

use scpi_protocol::{
    codec::{read_line, write_line},
    error::ReadError,
};

/// SCPI client for a remote digitizer.
pub struct ScpiClient {
    tcp: TcpStream,
}

impl ScpiClient {
    pub fn new(addr: impl ToSocketAddrs) -> io::Result<ScpiClient> {
        let tcp = TcpStream::connect(addr)?;
        tcp.set_nodelay(true)?;
        Ok(ScpiClient { tcp })
    }

    /// Send a command that has no reply.
    pub fn send(&mut self, command: &str) -> io::Result<()> {
        write_line(&mut self.tcp, command)
    }

    /// Send a query and wait for its reply.
    pub fn query(&mut self, query: &str) -> Result<String, ReadError> {
        write_line(&mut self.tcp, query)?;
        read_line(&mut self.tcp)
    }

    /// Vendor, model, serial number and firmware version, comma separated.
    pub fn identify(&mut self) -> Result<String, ReadError> {
        self.query("*IDN?")
    }

    pub fn channel_count(&mut self) -> Result<usize, ReadError> {
        let reply = self.query("CHANS?")?;
        reply.trim().parse().map_err(|_| invalid_reply("CHANS?", &reply))
    }

    /// Legal sample intervals in femtoseconds.
    pub fn sample_intervals(&mut self) -> Result<Vec<i64>, ReadError> {
        let reply = self.query("RATES?")?;
        parse_list(&reply).map_err(|_| invalid_reply("RATES?", &reply))
    }

    /// Supported memory depths in samples.
    pub fn memory_depths(&mut self) -> Result<Vec<u64>, ReadError> {
        let reply = self.query("DEPTHS?")?;
        parse_list(&reply).map_err(|_| invalid_reply("DEPTHS?", &reply))
    }

    /// Ask the server to end the session.
    pub fn exit(mut self) -> io::Result<()> {
        self.send("EXIT")
    }
}

/// Parses a comma separated list. Servers terminate every entry with a comma.
fn parse_list<T: std::str::FromStr>(reply: &str) -> Result<Vec<T>, T::Err> {
    reply
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::parse)
        .collect()
}

fn invalid_reply(query: &str, reply: &str) -> ReadError {
    ReadError::IoError(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Invalid reply to {}: '{}'", query, reply),
    ))
}
