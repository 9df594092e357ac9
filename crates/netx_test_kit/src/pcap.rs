use std::io;
use std::path::{Path, PathBuf};

use etherparse::PacketBuilder;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86dd;
const ETHERTYPE_ARP: u16 = 0x0806;

/// Link layer written in front of every frame of a fixture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureLink {
    Ethernet,
    RawIp,
    LinuxSll,
}

impl FixtureLink {
    fn link_type(self) -> u16 {
        match self {
            FixtureLink::Ethernet => 1,
            FixtureLink::RawIp => 101,
            FixtureLink::LinuxSll => 113,
        }
    }
}

#[derive(Clone, Debug)]
struct FixtureFrame {
    timestamp: f64,
    ethertype: u16,
    mac_tail: u8,
    network: Vec<u8>,
}

/// Builds synthetic captures packet by packet.
///
/// Frames are produced with etherparse and wrapped in either a legacy pcap
/// container (`to_bytes`) or a minimal pcapng section (`to_pcapng_bytes`).
#[derive(Clone, Debug)]
pub struct PcapFixture {
    link: FixtureLink,
    snaplen: Option<usize>,
    frames: Vec<FixtureFrame>,
}

impl Default for PcapFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl PcapFixture {
    pub fn new() -> Self {
        Self { link: FixtureLink::Ethernet, snaplen: None, frames: Vec::new() }
    }

    /// Stores at most `snaplen` bytes of every frame while the recorded wire
    /// length stays the full frame size.
    pub fn snaplen(mut self, snaplen: usize) -> Self {
        self.snaplen = Some(snaplen);
        self
    }

    fn captured<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[..data.len().min(self.snaplen.unwrap_or(usize::MAX))]
    }

    pub fn link(mut self, link: FixtureLink) -> Self {
        self.link = link;
        self
    }

    /// TCP segment with the ACK and PSH flags set.
    pub fn tcp(
        self,
        timestamp: f64,
        source: [u8; 4],
        destination: [u8; 4],
        ports: (u16, u16),
        payload_len: usize,
    ) -> Self {
        let builder = PacketBuilder::ipv4(source, destination, 64)
            .tcp(ports.0, ports.1, 1, 64240)
            .ack(1)
            .psh();
        let mut network = Vec::with_capacity(builder.size(payload_len));
        builder
            .write(&mut network, &vec![0u8; payload_len])
            .expect("writing into a Vec never fails");
        self.push(timestamp, ETHERTYPE_IPV4, source[3], network)
    }

    /// Bare SYN opening a connection.
    pub fn tcp_syn(
        self,
        timestamp: f64,
        source: [u8; 4],
        destination: [u8; 4],
        ports: (u16, u16),
    ) -> Self {
        let builder = PacketBuilder::ipv4(source, destination, 64)
            .tcp(ports.0, ports.1, 0, 64240)
            .syn();
        let mut network = Vec::with_capacity(builder.size(0));
        builder
            .write(&mut network, &[])
            .expect("writing into a Vec never fails");
        self.push(timestamp, ETHERTYPE_IPV4, source[3], network)
    }

    pub fn udp(
        self,
        timestamp: f64,
        source: [u8; 4],
        destination: [u8; 4],
        ports: (u16, u16),
        payload_len: usize,
    ) -> Self {
        let builder = PacketBuilder::ipv4(source, destination, 64).udp(ports.0, ports.1);
        let mut network = Vec::with_capacity(builder.size(payload_len));
        builder
            .write(&mut network, &vec![0u8; payload_len])
            .expect("writing into a Vec never fails");
        self.push(timestamp, ETHERTYPE_IPV4, source[3], network)
    }

    pub fn icmp_echo(self, timestamp: f64, source: [u8; 4], destination: [u8; 4]) -> Self {
        let builder = PacketBuilder::ipv4(source, destination, 64).icmpv4_echo_request(1, 1);
        let payload = [0u8; 32];
        let mut network = Vec::with_capacity(builder.size(payload.len()));
        builder
            .write(&mut network, &payload)
            .expect("writing into a Vec never fails");
        self.push(timestamp, ETHERTYPE_IPV4, source[3], network)
    }

    pub fn ipv6_udp(
        self,
        timestamp: f64,
        source: [u8; 16],
        destination: [u8; 16],
        ports: (u16, u16),
        payload_len: usize,
    ) -> Self {
        let builder = PacketBuilder::ipv6(source, destination, 64).udp(ports.0, ports.1);
        let mut network = Vec::with_capacity(builder.size(payload_len));
        builder
            .write(&mut network, &vec![0u8; payload_len])
            .expect("writing into a Vec never fails");
        self.push(timestamp, ETHERTYPE_IPV6, source[15], network)
    }

    pub fn icmpv6_echo(self, timestamp: f64, source: [u8; 16], destination: [u8; 16]) -> Self {
        let builder = PacketBuilder::ipv6(source, destination, 64).icmpv6_echo_request(1, 1);
        let payload = [0u8; 16];
        let mut network = Vec::with_capacity(builder.size(payload.len()));
        builder
            .write(&mut network, &payload)
            .expect("writing into a Vec never fails");
        self.push(timestamp, ETHERTYPE_IPV6, source[15], network)
    }

    /// ARP request: a frame without a network-layer address.
    pub fn arp(self, timestamp: f64) -> Self {
        let mut body = vec![0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01];
        body.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01, 10, 0, 0, 1]);
        body.extend_from_slice(&[0, 0, 0, 0, 0, 0, 10, 0, 0, 2]);
        self.push(timestamp, ETHERTYPE_ARP, 0x01, body)
    }

    fn push(mut self, timestamp: f64, ethertype: u16, mac_tail: u8, network: Vec<u8>) -> Self {
        self.frames.push(FixtureFrame { timestamp, ethertype, mac_tail, network });
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Wire length of each frame, link header included.
    pub fn frame_lengths(&self) -> Vec<u64> {
        self.frames.iter().map(|frame| self.frame(frame).len() as u64).collect()
    }

    pub fn total_bytes(&self) -> u64 {
        self.frame_lengths().iter().sum()
    }

    fn frame(&self, frame: &FixtureFrame) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(frame.network.len() + 16);
        match self.link {
            FixtureLink::Ethernet => {
                bytes.extend_from_slice(&[0x02, 0, 0, 0, 0, 0xfe]);
                bytes.extend_from_slice(&[0x02, 0, 0, 0, 0, frame.mac_tail]);
                bytes.extend_from_slice(&frame.ethertype.to_be_bytes());
            }
            FixtureLink::RawIp => {}
            FixtureLink::LinuxSll => {
                bytes.extend_from_slice(&0u16.to_be_bytes());
                bytes.extend_from_slice(&1u16.to_be_bytes());
                bytes.extend_from_slice(&6u16.to_be_bytes());
                bytes.extend_from_slice(&[0x02, 0, 0, 0, 0, frame.mac_tail, 0, 0]);
                bytes.extend_from_slice(&frame.ethertype.to_be_bytes());
            }
        }
        bytes.extend_from_slice(&frame.network);
        bytes
    }

    fn split_timestamp(timestamp: f64) -> (u32, u32) {
        let micros = (timestamp * 1_000_000.0).round() as u64;
        ((micros / 1_000_000) as u32, (micros % 1_000_000) as u32)
    }

    /// Legacy little-endian pcap with microsecond timestamps.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(self.snaplen.unwrap_or(65535) as u32).to_le_bytes());
        out.extend_from_slice(&u32::from(self.link.link_type()).to_le_bytes());

        for frame in &self.frames {
            let data = self.frame(frame);
            let captured = self.captured(&data);
            let (seconds, micros) = Self::split_timestamp(frame.timestamp);
            out.extend_from_slice(&seconds.to_le_bytes());
            out.extend_from_slice(&micros.to_le_bytes());
            out.extend_from_slice(&(captured.len() as u32).to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(captured);
        }
        out
    }

    /// Single-interface pcapng section with microsecond timestamps.
    pub fn to_pcapng_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();

        // Section header block
        out.extend_from_slice(&0x0a0d_0d0au32.to_le_bytes());
        out.extend_from_slice(&28u32.to_le_bytes());
        out.extend_from_slice(&0x1a2b_3c4du32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&(-1i64).to_le_bytes());
        out.extend_from_slice(&28u32.to_le_bytes());

        // Interface description block
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&20u32.to_le_bytes());
        out.extend_from_slice(&self.link.link_type().to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&65535u32.to_le_bytes());
        out.extend_from_slice(&20u32.to_le_bytes());

        for frame in &self.frames {
            let data = self.frame(frame);
            let captured = self.captured(&data);
            let padded = captured.len().div_ceil(4) * 4;
            let block_len = (32 + padded) as u32;
            let micros = (frame.timestamp * 1_000_000.0).round() as u64;

            out.extend_from_slice(&6u32.to_le_bytes());
            out.extend_from_slice(&block_len.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&((micros >> 32) as u32).to_le_bytes());
            out.extend_from_slice(&(micros as u32).to_le_bytes());
            out.extend_from_slice(&(captured.len() as u32).to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(captured);
            out.resize(out.len() + padded - captured.len(), 0);
            out.extend_from_slice(&block_len.to_le_bytes());
        }
        out
    }

    /// Writes the legacy pcap form to `dir/name`.
    pub fn write(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, self.to_bytes())?;
        Ok(path)
    }

    pub fn write_pcapng(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, self.to_pcapng_bytes())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_frame_lengths_include_link_header() {
        let fixture = PcapFixture::new()
            .udp(0.0, [10, 0, 0, 1], [10, 0, 0, 2], (53, 5353), 10)
            .link(FixtureLink::RawIp);
        let actual = fixture.frame_lengths();
        let expected = vec![20 + 8 + 10];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_legacy_layout() {
        let fixture = PcapFixture::new().tcp(1.5, [10, 0, 0, 1], [10, 0, 0, 2], (443, 51000), 0);
        let actual = fixture.to_bytes();
        assert_eq!(actual.len(), 24 + 16 + 14 + 20 + 20);
        assert_eq!(&actual[0..4], &[0xd4, 0xc3, 0xb2, 0xa1]);
        assert_eq!(&actual[24..28], &1u32.to_le_bytes());
        assert_eq!(&actual[28..32], &500_000u32.to_le_bytes());
    }

    #[test]
    fn test_snaplen_truncates_stored_bytes_only() {
        let fixture = PcapFixture::new()
            .tcp(0.0, [10, 0, 0, 1], [10, 0, 0, 2], (443, 51000), 200)
            .snaplen(54);
        let actual = fixture.to_bytes();
        assert_eq!(actual.len(), 24 + 16 + 54);
        assert_eq!(&actual[32..36], &54u32.to_le_bytes());
        assert_eq!(&actual[36..40], &(14u32 + 20 + 20 + 200).to_le_bytes());
        assert_eq!(fixture.total_bytes(), 254);
    }

    #[test]
    fn test_pcapng_blocks_are_aligned() {
        let fixture = PcapFixture::new().udp(0.0, [10, 0, 0, 1], [10, 0, 0, 2], (1, 2), 1);
        let actual = fixture.to_pcapng_bytes();
        assert_eq!(actual.len() % 4, 0);
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = PcapFixture::new().arp(0.0);
        let path = fixture.write(dir.path(), "arp.pcap").unwrap();
        let actual = std::fs::read(path).unwrap();
        assert_eq!(actual, fixture.to_bytes());
    }
}
