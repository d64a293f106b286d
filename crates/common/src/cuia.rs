//! Control-UI-action (CUIA) messages
//!
//! The appliance's UI process listens for OSC messages on a local UDP
//! port. Configuration changes that the UI must pick up are signalled by
//! sending `/CUIA/<ACTION>` to it.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::{Error, Result};

/// Actions understood by the UI process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CuiaCommand {
    ReloadMidiConfig,
    ReloadKeyBinding,
    RestartUi,
    Custom(String),
}

impl CuiaCommand {
    pub fn name(&self) -> &str {
        match self {
            CuiaCommand::ReloadMidiConfig => "RELOAD_MIDI_CONFIG",
            CuiaCommand::ReloadKeyBinding => "RELOAD_KEY_BINDING",
            CuiaCommand::RestartUi => "RESTART_UI",
            CuiaCommand::Custom(name) => name,
        }
    }

    pub fn address(&self) -> String {
        format!("/CUIA/{}", self.name())
    }

    /// Parse an action name, case-insensitive
    pub fn parse(name: &str) -> Result<Self> {
        let upper = name.trim().trim_start_matches("/CUIA/").to_ascii_uppercase();
        if upper.is_empty() || !upper.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidInput(format!("Invalid CUIA action: {:?}", name)));
        }
        Ok(match upper.as_str() {
            "RELOAD_MIDI_CONFIG" => CuiaCommand::ReloadMidiConfig,
            "RELOAD_KEY_BINDING" => CuiaCommand::ReloadKeyBinding,
            "RESTART_UI" => CuiaCommand::RestartUi,
            _ => CuiaCommand::Custom(upper),
        })
    }
}

impl fmt::Display for CuiaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

/// OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
}

/// Encode an OSC 1.0 message
pub fn encode(address: &str, args: &[OscArg]) -> Bytes {
    let mut buf = BytesMut::new();
    put_padded_str(&mut buf, address);

    let mut tags = String::from(",");
    for arg in args {
        tags.push(match arg {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
        });
    }
    put_padded_str(&mut buf, &tags);

    for arg in args {
        match arg {
            OscArg::Int(v) => buf.put_i32(*v),
            OscArg::Float(v) => buf.put_f32(*v),
            OscArg::Str(s) => put_padded_str(&mut buf, s),
        }
    }
    buf.freeze()
}

// NUL-terminated, padded to a multiple of four bytes
fn put_padded_str(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    let pad = 4 - (s.len() % 4);
    buf.put_bytes(0, pad);
}

/// Sends CUIA messages to the UI process
#[derive(Debug, Clone)]
pub struct CuiaClient {
    target: String,
}

impl CuiaClient {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub async fn send(&self, cmd: &CuiaCommand, args: &[OscArg]) -> Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let packet = encode(&cmd.address(), args);
        debug!("Sending {} bytes to {}", packet.len(), self.target);
        socket.send_to(&packet, &self.target).await?;
        info!("Sent {} to UI at {}", cmd, self.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_without_args() {
        let packet = encode("/CUIA/RELOAD_MIDI_CONFIG", &[]);
        // 24 address bytes + 4 NUL, then ",\0\0\0"
        let mut expected = b"/CUIA/RELOAD_MIDI_CONFIG".to_vec();
        expected.extend_from_slice(&[0, 0, 0, 0]);
        expected.extend_from_slice(b",\0\0\0");
        assert_eq!(packet.as_ref(), expected.as_slice());
        assert_eq!(packet.len() % 4, 0);
    }

    #[test]
    fn test_encode_with_args() {
        let packet = encode("/a", &[OscArg::Int(1), OscArg::Str("hi".into())]);
        let expected: &[u8] = b"/a\0\0,is\0\0\0\0\x01hi\0\0";
        assert_eq!(packet.as_ref(), expected);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            CuiaCommand::parse("reload_key_binding").unwrap(),
            CuiaCommand::ReloadKeyBinding
        );
        assert_eq!(
            CuiaCommand::parse("/CUIA/POWER_OFF").unwrap(),
            CuiaCommand::Custom("POWER_OFF".into())
        );
        assert!(CuiaCommand::parse("bad name").is_err());
        assert_eq!(CuiaCommand::RestartUi.to_string(), "/CUIA/RESTART_UI");
    }

    #[tokio::test]
    async fn test_send_over_udp() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = CuiaClient::new(addr.to_string());
        client.send(&CuiaCommand::ReloadMidiConfig, &[]).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = listener.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], encode("/CUIA/RELOAD_MIDI_CONFIG", &[]).as_ref());
    }
}
