//! Wire envelope for a test packet: `nonce: u32, port: u16, ip_size: u8,
//! ip: [u8; ip_size], intro_key: [u8; 32]`, big-endian. `ip_size` is `0`
//! (no reflected endpoint), `4` (IPv4) or `16` (IPv6); anything else is
//! malformed.
use std::io::{Cursor, Read};
use std::net::IpAddr;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::nonce::Nonce;
use crate::transport::IntroKey;

/// An opaque, already-encoded UDP payload. The coordinator never looks
/// inside one it didn't just build itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet(pub Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPayload {
    pub nonce: Nonce,
    pub port: u16,
    pub ip: Option<IpAddr>,
    pub intro_key: IntroKey,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload truncated")]
    Truncated,
    #[error("invalid ip_size {0}")]
    InvalidIpSize(u8),
}

impl TestPayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 2 + 1 + 16 + 32);
        buf.write_u32::<BigEndian>(self.nonce)
            .expect("writes to a Vec<u8> never fail");
        buf.write_u16::<BigEndian>(self.port)
            .expect("writes to a Vec<u8> never fail");

        match self.ip {
            None => buf
                .write_u8(0)
                .expect("writes to a Vec<u8> never fail"),
            Some(IpAddr::V4(ip)) => {
                buf.write_u8(4).expect("writes to a Vec<u8> never fail");
                buf.extend_from_slice(&ip.octets());
            }
            Some(IpAddr::V6(ip)) => {
                buf.write_u8(16).expect("writes to a Vec<u8> never fail");
                buf.extend_from_slice(&ip.octets());
            }
        }
        buf.extend_from_slice(&self.intro_key);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(data);
        let nonce = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| DecodeError::Truncated)?;
        let port = cursor
            .read_u16::<BigEndian>()
            .map_err(|_| DecodeError::Truncated)?;
        let ip_size = cursor.read_u8().map_err(|_| DecodeError::Truncated)?;

        let ip = match ip_size {
            0 => None,
            4 => {
                let mut octets = [0u8; 4];
                cursor
                    .read_exact(&mut octets)
                    .map_err(|_| DecodeError::Truncated)?;
                Some(IpAddr::from(octets))
            }
            16 => {
                let mut octets = [0u8; 16];
                cursor
                    .read_exact(&mut octets)
                    .map_err(|_| DecodeError::Truncated)?;
                Some(IpAddr::from(octets))
            }
            n => return Err(DecodeError::InvalidIpSize(n)),
        };

        let mut intro_key = [0u8; 32];
        cursor
            .read_exact(&mut intro_key)
            .map_err(|_| DecodeError::Truncated)?;

        Ok(TestPayload {
            nonce,
            port,
            ip,
            intro_key,
        })
    }
}

/// Whether `a` and `b` share the same first two octets — the "/16" check
/// used both for rejecting too-close source addresses and for spotting a
/// test IP that's actually our own address reflected back.
pub fn same_slash16(a: IpAddr, b: IpAddr) -> bool {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => a.octets()[..2] == b.octets()[..2],
        (IpAddr::V6(a), IpAddr::V6(b)) => a.octets()[..2] == b.octets()[..2],
        _ => false,
    }
}

/// Source-address validation applied to every inbound test packet before
/// it's even decoded further: the port must be in the ephemeral range, the
/// IP must be valid and not blocklisted, and it must not share our own /16.
pub fn validate_source<T: crate::transport::Transport>(transport: &T, from: std::net::SocketAddr) -> bool {
    if !(1024..=65535).contains(&from.port()) {
        return false;
    }
    let ip = from.ip();
    if !transport.is_valid(ip) || transport.is_blocklisted(ip) {
        return false;
    }
    if same_slash16(ip, transport.external_ip()) {
        return false;
    }
    true
}
