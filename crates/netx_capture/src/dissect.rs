use std::net::IpAddr;

use etherparse::{LaxNetSlice, LaxSlicedPacket, TransportSlice};
use netx_domain::{Address, Packet, Protocol};

use crate::{LinkType, RawFrame};

const ETHERNET_HEADER_LEN: usize = 14;
const SLL_HEADER_LEN: usize = 16;
const TRUNCATED: &str = "[Packet size limited during capture]";

/// Turns a raw frame into a [`Packet`] with analyser-style summary columns.
///
/// Slicing is lax: frames cut short by the capture's snapshot length keep
/// their addresses and transport protocol. Frames whose headers cannot be
/// read at all are kept, tagged by their link-layer type, with the slicing
/// error in the info column.
pub fn dissect(frame: &RawFrame) -> Packet {
    let packet = Packet::new(frame.number, frame.timestamp, Protocol::Other, frame.wire_length);
    match frame.link_type {
        LinkType::Ethernet => dissect_ethernet(packet, &frame.data),
        LinkType::RawIp => match LaxSlicedPacket::from_ip(&frame.data) {
            Ok(sliced) => dissect_network(packet, &sliced),
            Err(err) => packet.info(format!("[Malformed Packet: {err}]")),
        },
        LinkType::LinuxSll => dissect_linux_sll(packet, &frame.data),
    }
}

fn dissect_ethernet(packet: Packet, data: &[u8]) -> Packet {
    if data.len() < ETHERNET_HEADER_LEN {
        return packet.info("[Malformed Packet: short Ethernet header]");
    }
    let destination = mac(&data[0..6]);
    let source = mac(&data[6..12]);
    let ether_type = u16::from_be_bytes([data[12], data[13]]);

    match LaxSlicedPacket::from_ethernet(data) {
        Ok(sliced) if has_ip_layer(&sliced) => dissect_network(packet, &sliced),
        Ok(sliced) => match sliced.stop_err {
            Some((err, _)) => packet
                .source(source)
                .destination(destination)
                .protocol(fallback_protocol(ether_type))
                .info(format!("[Malformed Packet: {err}]")),
            None => packet
                .source(source)
                .destination(destination)
                .info(format!("Ethernet II, type {}", ether_type_name(ether_type))),
        },
        Err(err) => packet
            .source(source)
            .destination(destination)
            .protocol(fallback_protocol(ether_type))
            .info(format!("[Malformed Packet: {err}]")),
    }
}

fn dissect_linux_sll(packet: Packet, data: &[u8]) -> Packet {
    if data.len() < SLL_HEADER_LEN {
        return packet.info("[Malformed Packet: short Linux cooked header]");
    }
    let address_len = u16::from_be_bytes([data[4], data[5]]);
    let protocol = u16::from_be_bytes([data[14], data[15]]);
    let source = if address_len == 6 { mac(&data[6..12]) } else { Address::Unknown };

    match protocol {
        0x0800 | 0x86dd => match LaxSlicedPacket::from_ip(&data[SLL_HEADER_LEN..]) {
            Ok(sliced) => dissect_network(packet, &sliced),
            Err(err) => packet
                .source(source)
                .protocol(fallback_protocol(protocol))
                .info(format!("[Malformed Packet: {err}]")),
        },
        _ => packet
            .source(source)
            .info(format!("Linux cooked capture, type {}", ether_type_name(protocol))),
    }
}

fn has_ip_layer(sliced: &LaxSlicedPacket<'_>) -> bool {
    matches!(sliced.net, Some(LaxNetSlice::Ipv4(_) | LaxNetSlice::Ipv6(_)))
}

fn dissect_network(packet: Packet, sliced: &LaxSlicedPacket<'_>) -> Packet {
    // `declared` is the transport length the IP header announces, which
    // exceeds the stored bytes when the frame was truncated.
    let (source, destination, network_protocol, ip_number, incomplete, declared): (
        IpAddr,
        IpAddr,
        Protocol,
        u8,
        bool,
        usize,
    ) = match &sliced.net {
        Some(LaxNetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            (
                header.source_addr().into(),
                header.destination_addr().into(),
                Protocol::Ip,
                ipv4.payload().ip_number.0,
                ipv4.payload().incomplete,
                usize::from(header.total_len()).saturating_sub(usize::from(header.ihl()) * 4),
            )
        }
        Some(LaxNetSlice::Ipv6(ipv6)) => (
            ipv6.header().source_addr().into(),
            ipv6.header().destination_addr().into(),
            Protocol::Ipv6,
            ipv6.payload().ip_number.0,
            ipv6.payload().incomplete,
            usize::from(ipv6.header().payload_length()),
        ),
        _ => return packet.info("Unsupported network layer"),
    };
    let packet = packet.source(Address::Ip(source)).destination(Address::Ip(destination));
    let truncated = |info: String| {
        if incomplete { format!("{info} {TRUNCATED}") } else { info }
    };

    match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            let flags = [
                (tcp.fin(), "FIN"),
                (tcp.syn(), "SYN"),
                (tcp.rst(), "RST"),
                (tcp.psh(), "PSH"),
                (tcp.ack(), "ACK"),
                (tcp.urg(), "URG"),
            ]
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(", ");

            let length = if incomplete {
                declared.saturating_sub(tcp.header_len())
            } else {
                tcp.payload().len()
            };
            let mut info = format!("{} → {}", tcp.source_port(), tcp.destination_port());
            if !flags.is_empty() {
                info.push_str(&format!(" [{flags}]"));
            }
            info.push_str(&format!(" Seq={}", tcp.sequence_number()));
            if tcp.ack() {
                info.push_str(&format!(" Ack={}", tcp.acknowledgment_number()));
            }
            info.push_str(&format!(" Win={} Len={length}", tcp.window_size()));
            packet.protocol(Protocol::Tcp).info(truncated(info))
        }
        Some(TransportSlice::Udp(udp)) => {
            let length = if incomplete {
                usize::from(udp.length()).saturating_sub(8)
            } else {
                udp.payload().len()
            };
            packet.protocol(Protocol::Udp).info(truncated(format!(
                "{} → {} Len={length}",
                udp.source_port(),
                udp.destination_port()
            )))
        }
        Some(TransportSlice::Icmpv4(icmp)) => packet
            .protocol(Protocol::Icmp)
            .info(truncated(icmpv4_name(icmp.type_u8(), icmp.code_u8()))),
        Some(TransportSlice::Icmpv6(icmp)) => packet
            .protocol(Protocol::Icmpv6)
            .info(truncated(icmpv6_name(icmp.type_u8(), icmp.code_u8()))),
        None => match (incomplete, transport_protocol(ip_number)) {
            // The transport header itself was cut off.
            (true, Some(protocol)) => packet
                .protocol(protocol)
                .info(format!("[Malformed Packet: truncated {protocol} header] {TRUNCATED}")),
            _ => packet
                .protocol(network_protocol)
                .info(format!("{network_protocol} protocol {}", ip_protocol_name(ip_number))),
        },
    }
}

fn transport_protocol(ip_number: u8) -> Option<Protocol> {
    match ip_number {
        1 => Some(Protocol::Icmp),
        6 => Some(Protocol::Tcp),
        17 => Some(Protocol::Udp),
        58 => Some(Protocol::Icmpv6),
        _ => None,
    }
}

fn mac(bytes: &[u8]) -> Address {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&bytes[..6]);
    Address::Mac(mac)
}

fn fallback_protocol(ether_type: u16) -> Protocol {
    match ether_type {
        0x0800 => Protocol::Ip,
        0x86dd => Protocol::Ipv6,
        _ => Protocol::Other,
    }
}

fn ether_type_name(ether_type: u16) -> String {
    let name = match ether_type {
        0x0806 => "ARP",
        0x8035 => "RARP",
        0x88cc => "LLDP",
        0x888e => "EAPOL",
        0x8863 | 0x8864 => "PPPoE",
        0x8847 | 0x8848 => "MPLS",
        _ => return format!("0x{ether_type:04x}"),
    };
    format!("{name} (0x{ether_type:04x})")
}

fn ip_protocol_name(number: u8) -> String {
    let name = match number {
        2 => "IGMP",
        4 => "IPIP",
        41 => "IPv6",
        47 => "GRE",
        50 => "ESP",
        51 => "AH",
        89 => "OSPF",
        103 => "PIM",
        112 => "VRRP",
        132 => "SCTP",
        _ => return number.to_string(),
    };
    format!("{name} ({number})")
}

fn icmpv4_name(icmp_type: u8, code: u8) -> String {
    match icmp_type {
        0 => "Echo (ping) reply".to_string(),
        3 => format!("Destination unreachable (code {code})"),
        5 => format!("Redirect (code {code})"),
        8 => "Echo (ping) request".to_string(),
        11 => format!("Time-to-live exceeded (code {code})"),
        13 => "Timestamp request".to_string(),
        14 => "Timestamp reply".to_string(),
        _ => format!("Type {icmp_type}, code {code}"),
    }
}

fn icmpv6_name(icmp_type: u8, code: u8) -> String {
    match icmp_type {
        1 => format!("Destination Unreachable (code {code})"),
        2 => "Packet Too Big".to_string(),
        3 => format!("Time Exceeded (code {code})"),
        128 => "Echo (ping) request".to_string(),
        129 => "Echo (ping) reply".to_string(),
        133 => "Router Solicitation".to_string(),
        134 => "Router Advertisement".to_string(),
        135 => "Neighbor Solicitation".to_string(),
        136 => "Neighbor Advertisement".to_string(),
        143 => "Multicast Listener Report Message v2".to_string(),
        _ => format!("Type {icmp_type}, code {code}"),
    }
}
