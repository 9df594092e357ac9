use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Transport or network protocol tag assigned to a frame.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
pub enum Protocol {
    #[strum(serialize = "ICMP")]
    #[serde(rename = "ICMP")]
    Icmp,
    #[strum(serialize = "ICMPv6")]
    #[serde(rename = "ICMPv6")]
    Icmpv6,
    #[strum(serialize = "TCP")]
    #[serde(rename = "TCP")]
    Tcp,
    #[strum(serialize = "UDP")]
    #[serde(rename = "UDP")]
    Udp,
    #[strum(serialize = "IP")]
    #[serde(rename = "IP")]
    Ip,
    #[strum(serialize = "IPv6")]
    #[serde(rename = "IPv6")]
    Ipv6,
    #[strum(serialize = "other")]
    #[serde(rename = "other")]
    Other,
}

impl Protocol {
    /// Candidates for the dominant protocol, in tie-break order: the first
    /// maximum wins.
    pub const DOMINANCE_ORDER: [Protocol; 4] =
        [Protocol::Icmp, Protocol::Icmpv6, Protocol::Tcp, Protocol::Udp];
}

/// Endpoint of a frame as shown in the Source/Destination columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    Ip(IpAddr),
    Mac([u8; 6]),
    Unknown,
}

impl Address {
    /// Network-layer address, if the frame carried one.
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Address::Ip(ip) => Some(*ip),
            Address::Mac(_) | Address::Unknown => None,
        }
    }
}

impl From<IpAddr> for Address {
    fn from(value: IpAddr) -> Self {
        Address::Ip(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ip(ip) => write!(f, "{ip}"),
            Address::Mac(mac) => write!(
                f,
                "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
            ),
            Address::Unknown => write!(f, "unknown"),
        }
    }
}

/// One captured frame. Immutable once parsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Setters)]
#[setters(into)]
pub struct Packet {
    /// 1-based ordinal within the capture.
    pub number: u64,
    /// Seconds since the epoch.
    pub timestamp: f64,
    pub source: Address,
    pub destination: Address,
    pub protocol: Protocol,
    /// Length on the wire in bytes.
    pub length: u64,
    pub info: String,
}

impl Packet {
    pub fn new(number: u64, timestamp: f64, protocol: Protocol, length: u64) -> Self {
        Self {
            number,
            timestamp,
            source: Address::Unknown,
            destination: Address::Unknown,
            protocol,
            length,
            info: String::new(),
        }
    }
}

/// Ordered prefix of the packets stored in one capture file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub source: PathBuf,
    pub packets: Vec<Packet>,
}

impl Capture {
    pub fn new(source: impl Into<PathBuf>, packets: Vec<Packet>) -> Self {
        Self { source: source.into(), packets }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// File name used to identify the capture in records and logs.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
