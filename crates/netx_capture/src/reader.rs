use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use netx_domain::{Capture, Error, Result};
use pcap_parser::pcapng::Block;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapError, PcapNGReader};
use tracing::debug;

use crate::dissect;

/// Buffer size for reading capture files (64KB).
const BUFFER_SIZE: usize = 65536;

/// Refills in a row that may still end in an incomplete block before the file
/// is treated as truncated.
const MAX_STALLED_REFILLS: usize = 4;

pub const CAPTURE_EXTENSIONS: [&str; 3] = ["pcap", "pcapng", "cap"];

/// Checks that `path` names an existing regular file with a capture extension.
pub fn validate_capture_path(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|err| Error::validation(path, format!("cannot access file: {err}")))?;
    if !metadata.is_file() {
        return Err(Error::validation(path, "not a regular file"));
    }

    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_lowercase());
    match extension {
        Some(extension) if CAPTURE_EXTENSIONS.contains(&extension.as_str()) => Ok(()),
        _ => Err(Error::validation(
            path,
            format!("expected one of: {}", CAPTURE_EXTENSIONS.join(", ")),
        )),
    }
}

/// Encapsulation of the frames of one interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkType {
    Ethernet,
    /// Bare IPv4 or IPv6 packets, version taken from the first nibble.
    RawIp,
    /// Linux "cooked" capture (SLL).
    LinuxSll,
}

impl LinkType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(LinkType::Ethernet),
            12 | 14 | 101 | 228 | 229 => Some(LinkType::RawIp),
            113 => Some(LinkType::LinuxSll),
            _ => None,
        }
    }
}

/// A frame as stored in the capture, before dissection.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFrame {
    pub number: u64,
    pub timestamp: f64,
    pub wire_length: u64,
    pub link_type: LinkType,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
struct Interface {
    link_type: std::result::Result<LinkType, i32>,
    /// Timestamp units per second.
    resolution: u64,
    offset: i64,
}

enum Stamp {
    /// Whole seconds plus a fraction in interface units.
    Split { seconds: u32, fraction: u32 },
    Ticks(u64),
    Missing,
}

enum Event {
    Interface(Interface),
    Packet { interface: u32, stamp: Stamp, wire_length: u32, data: Vec<u8> },
}

enum ReaderInner {
    Legacy(LegacyPcapReader<BufReader<File>>),
    Ng(PcapNGReader<BufReader<File>>),
}

/// Streams frames out of a legacy pcap or pcapng file.
pub struct FrameReader {
    path: PathBuf,
    inner: ReaderInner,
    interfaces: Vec<Interface>,
    frame_number: u64,
    last_timestamp: f64,
}

impl FrameReader {
    pub fn open(path: &Path) -> Result<Self> {
        let mut magic = [0u8; 4];
        File::open(path)
            .and_then(|mut file| file.read_exact(&mut magic))
            .map_err(|err| Error::capture_read(path, format!("cannot read magic number: {err}")))?;

        let file = File::open(path).map_err(|err| Error::capture_read(path, err))?;
        let reader = BufReader::with_capacity(BUFFER_SIZE, file);

        let inner = match magic {
            [0xd4, 0xc3, 0xb2, 0xa1]
            | [0xa1, 0xb2, 0xc3, 0xd4]
            | [0x4d, 0x3c, 0xb2, 0xa1]
            | [0xa1, 0xb2, 0x3c, 0x4d] => LegacyPcapReader::new(BUFFER_SIZE, reader)
                .map(ReaderInner::Legacy)
                .map_err(|e| {
                    Error::capture_read(path, format!("failed to parse pcap header: {e}"))
                })?,
            [0x0a, 0x0d, 0x0d, 0x0a] => PcapNGReader::new(BUFFER_SIZE, reader)
                .map(ReaderInner::Ng)
                .map_err(|e| {
                    Error::capture_read(path, format!("failed to parse pcapng header: {e}"))
                })?,
            _ => {
                return Err(Error::capture_read(
                    path,
                    format!("unknown magic number: {magic:02x?}"),
                ));
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            inner,
            interfaces: Vec::new(),
            frame_number: 0,
            last_timestamp: 0.0,
        })
    }

    /// Reads the next frame, `None` at the end of the file.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        loop {
            let event = match &mut self.inner {
                ReaderInner::Legacy(reader) => next_legacy_event(reader, &self.path)?,
                ReaderInner::Ng(reader) => next_ng_event(reader, &self.path)?,
            };

            match event {
                None => return Ok(None),
                Some(Event::Interface(interface)) => self.interfaces.push(interface),
                Some(Event::Packet { interface, stamp, wire_length, data }) => {
                    return self.frame(interface, stamp, wire_length, data).map(Some);
                }
            }
        }
    }

    fn frame(
        &mut self,
        interface: u32,
        stamp: Stamp,
        wire_length: u32,
        data: Vec<u8>,
    ) -> Result<RawFrame> {
        let Some(description) = self.interfaces.get(interface as usize).copied() else {
            return Err(Error::capture_read(
                &self.path,
                format!("packet refers to undeclared interface {interface}"),
            ));
        };
        let link_type = description.link_type.map_err(|code| {
            Error::capture_read(&self.path, format!("unsupported link type {code}"))
        })?;

        let resolution = description.resolution as f64;
        let timestamp = match stamp {
            Stamp::Split { seconds, fraction } => f64::from(seconds) + f64::from(fraction) / resolution,
            Stamp::Ticks(ticks) => {
                let seconds = (ticks / description.resolution) as f64;
                let fraction = (ticks % description.resolution) as f64 / resolution;
                description.offset as f64 + seconds + fraction
            }
            Stamp::Missing => self.last_timestamp,
        };
        self.last_timestamp = timestamp;
        self.frame_number += 1;

        Ok(RawFrame {
            number: self.frame_number,
            timestamp,
            wire_length: u64::from(wire_length),
            link_type,
            data,
        })
    }
}

fn next_legacy_event(
    reader: &mut LegacyPcapReader<BufReader<File>>,
    path: &Path,
) -> Result<Option<Event>> {
    let mut stalled = 0;
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let event = match block {
                    PcapBlockOwned::LegacyHeader(header) => {
                        let code = header.network.0;
                        let resolution = if header.is_nanosecond_precision() {
                            1_000_000_000
                        } else {
                            1_000_000
                        };
                        Some(Event::Interface(Interface {
                            link_type: LinkType::from_code(code).ok_or(code),
                            resolution,
                            offset: 0,
                        }))
                    }
                    PcapBlockOwned::Legacy(packet) => Some(Event::Packet {
                        interface: 0,
                        stamp: Stamp::Split { seconds: packet.ts_sec, fraction: packet.ts_usec },
                        wire_length: packet.origlen,
                        data: packet.data.to_vec(),
                    }),
                    _ => None,
                };
                reader.consume(offset);

                if let Some(event) = event {
                    return Ok(Some(event));
                }
            }
            Err(PcapError::Eof) => return Ok(None),
            Err(PcapError::Incomplete(_)) => {
                stalled += 1;
                if stalled > MAX_STALLED_REFILLS {
                    return Err(Error::capture_read(path, "truncated capture file"));
                }
                reader
                    .refill()
                    .map_err(|e| Error::capture_read(path, format!("refill error: {e}")))?;
            }
            Err(e) => return Err(Error::capture_read(path, format!("parse error: {e}"))),
        }
    }
}

fn next_ng_event(reader: &mut PcapNGReader<BufReader<File>>, path: &Path) -> Result<Option<Event>> {
    let mut stalled = 0;
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let event = match block {
                    PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                        let code = idb.linktype.0;
                        Some(
                            ts_resolution(idb.if_tsresol)
                                .map(|resolution| {
                                    Event::Interface(Interface {
                                        link_type: LinkType::from_code(code).ok_or(code),
                                        resolution,
                                        offset: idb.if_tsoffset,
                                    })
                                })
                                .ok_or(idb.if_tsresol),
                        )
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => Some(Ok(Event::Packet {
                        interface: epb.if_id,
                        stamp: Stamp::Ticks((u64::from(epb.ts_high) << 32) | u64::from(epb.ts_low)),
                        wire_length: epb.origlen,
                        data: epb.data.to_vec(),
                    })),
                    PcapBlockOwned::NG(Block::SimplePacket(spb)) => Some(Ok(Event::Packet {
                        interface: 0,
                        stamp: Stamp::Missing,
                        wire_length: spb.origlen,
                        data: spb.data.to_vec(),
                    })),
                    _ => None,
                };
                reader.consume(offset);

                match event {
                    Some(Ok(event)) => return Ok(Some(event)),
                    Some(Err(tsresol)) => {
                        return Err(Error::capture_read(
                            path,
                            format!("unsupported timestamp resolution {tsresol:#04x}"),
                        ));
                    }
                    None => {}
                }
            }
            Err(PcapError::Eof) => return Ok(None),
            Err(PcapError::Incomplete(_)) => {
                stalled += 1;
                if stalled > MAX_STALLED_REFILLS {
                    return Err(Error::capture_read(path, "truncated capture file"));
                }
                reader
                    .refill()
                    .map_err(|e| Error::capture_read(path, format!("refill error: {e}")))?;
            }
            Err(e) => return Err(Error::capture_read(path, format!("parse error: {e}"))),
        }
    }
}

/// Units per second encoded by a pcapng `if_tsresol` option.
fn ts_resolution(tsresol: u8) -> Option<u64> {
    let exponent = u32::from(tsresol & 0x7f);
    if tsresol & 0x80 == 0 {
        10u64.checked_pow(exponent)
    } else {
        2u64.checked_pow(exponent)
    }
}

/// Reads captures into dissected packets.
pub struct CaptureReader;

impl CaptureReader {
    /// Reads at most `max_packets` packets, in file order.
    pub fn read(path: &Path, max_packets: usize) -> Result<Capture> {
        validate_capture_path(path)?;
        let mut reader = FrameReader::open(path)?;

        let mut packets = Vec::new();
        while packets.len() < max_packets {
            match reader.next_frame()? {
                Some(frame) => packets.push(dissect(&frame)),
                None => break,
            }
        }

        debug!(path = %path.display(), packets = packets.len(), "Capture read");
        Ok(Capture::new(path, packets))
    }

    /// Counts every packet in the file without dissecting them.
    pub fn count(path: &Path) -> Result<u64> {
        validate_capture_path(path)?;
        let mut reader = FrameReader::open(path)?;
        let mut count = 0;
        while reader.next_frame()?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}
