//! A minimal bitcoind-family P2P client: enough of the wire protocol to
//! complete a one-way handshake and push framed messages, nothing more.
//!
//! This does not parse inbound messages. It periodically drains and
//! discards unread inbound bytes so the peer's unread outbound stream never
//! backpressures our writer -- see [`WireClient::send`].

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// Opaque, pre-recorded `version` message payload. The driver never
/// negotiates a real version handshake -- it just needs the peer to accept
/// a plausible-looking `version` message before relaying transactions.
const VERSION_PAYLOAD_HEX: &str = "7e1101000100000000000000d6d1675d00000000010000000000000000000000000000000000ffff7f0000013bed010000000000000000000000000000000000ffff000000000000ecaff3bf4f09fcf309747847656e3a302e31ffffffff";

/// Inbound bytes are drained every this many successful sends.
const DRAIN_PERIOD: u64 = 4096;

/// Size of the (reused) inbound drain buffer.
const DRAIN_BUF_SIZE: usize = 2 * 1024 * 1024;

/// Given "ip[:port]", return (ip, port), falling back to `default_port`.
fn parse_host(host: &str, default_port: u16) -> (String, u16) {
    match host.rsplit_once(':') {
        Some((ip, port_str)) => match port_str.parse::<u16>() {
            Ok(port) => (ip.to_string(), port),
            Err(_) => (host.to_string(), default_port),
        },
        None => (host.to_string(), default_port),
    }
}

/// A connection to one target node.
pub struct WireClient {
    stream: TcpStream,
    magic: [u8; 4],
    sends: u64,
    drain_buf: Vec<u8>,
    peer: String,
}

impl WireClient {
    /// Connect to `host` ("ip[:port]", falling back to `default_port`),
    /// retrying forever with a one-second backoff -- the target node may
    /// still be starting up. Completes the one-way handshake (`version`
    /// then empty `verack`) before returning.
    pub fn connect(host: &str, default_port: u16, magic: [u8; 4]) -> Self {
        let (ip, port) = parse_host(host, default_port);
        let stream = loop {
            match TcpStream::connect((ip.as_str(), port)) {
                Ok(s) => break s,
                Err(e) => {
                    log::error!("cannot connect to {host}: {e}, retrying...");
                    thread::sleep(Duration::from_secs(1));
                }
            }
        };

        let mut client = WireClient {
            stream,
            magic,
            sends: 0,
            drain_buf: vec![0u8; DRAIN_BUF_SIZE],
            peer: host.to_string(),
        };

        let version_payload = hex::decode(VERSION_PAYLOAD_HEX).unwrap_or_default();
        client.send("version", &version_payload);
        client.send("verack", &[]);
        client
    }

    /// Frame `payload` under `command` (ASCII, zero-padded to 12 bytes) and
    /// send it. Write failures are logged and swallowed -- the caller is
    /// not meant to treat a broken socket as fatal; the next send will
    /// simply retry against the same (possibly still-broken) connection.
    pub fn send(&mut self, command: &str, payload: &[u8]) {
        if let Err(e) = self.write_frame(command, payload) {
            log::error!("write to {} failed: {e}", self.peer);
        }
        self.sends += 1;
        if self.sends % DRAIN_PERIOD == 0 {
            self.drain_inbound();
        }
    }

    fn write_frame(&mut self, command: &str, payload: &[u8]) -> Result<()> {
        let mut header = [0u8; 24];
        header[0..4].copy_from_slice(&self.magic);
        let mut cmd_bytes = [0u8; 12];
        let name = command.as_bytes();
        let n = name.len().min(12);
        cmd_bytes[..n].copy_from_slice(&name[..n]);
        header[4..16].copy_from_slice(&cmd_bytes);
        header[16..20].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        // bytes 20..24 (checksum) stay zero -- this node family accepts
        // zero as "no checksum".

        self.stream.write_all(&header)?;
        self.stream.write_all(payload)?;
        Ok(())
    }

    /// Read and discard up to one buffer of inbound bytes, if any are
    /// waiting. Toggles the socket briefly into non-blocking mode to probe
    /// for available data without stalling the writer -- `std::net` has no
    /// portable "bytes available" query, so this is the idiomatic
    /// substitute for it.
    fn drain_inbound(&mut self) {
        if let Err(e) = self.stream.set_nonblocking(true) {
            log::warn!("drain: could not switch {} to non-blocking: {e}", self.peer);
            return;
        }
        match self.stream.read(&mut self.drain_buf) {
            Ok(n) if n > 0 => log::debug!("drained {n} inbound bytes from {}", self.peer),
            Ok(_) => {}
            Err(e) if would_block(&e) => {}
            Err(e) => log::warn!("drain read from {} failed: {e}", self.peer),
        }
        if let Err(e) = self.stream.set_nonblocking(false) {
            log::warn!("drain: could not restore blocking mode on {}: {e}", self.peer);
        }
    }
}

fn would_block(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
}

/// Parse a 4-byte hex network-magic string (e.g. from config) into bytes.
pub fn parse_magic(hex_str: &str) -> Result<[u8; 4]> {
    let bytes = hex::decode(hex_str)?;
    if bytes.len() != 4 {
        return Err(Error::Config(format!(
            "netMagic must be 4 bytes, got {}",
            bytes.len()
        )));
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes);
    Ok(magic)
}

/// The regtest network magic used by the bitcoind family this driver
/// targets by default (`da b5 bf fa`).
pub const REGTEST_MAGIC: [u8; 4] = [0xda, 0xb5, 0xbf, 0xfa];
