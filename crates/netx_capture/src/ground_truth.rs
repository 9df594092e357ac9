use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use netx_domain::{
    Capture, Protocol, QuestionCatalog, QuestionKind, ReferenceAnswer, ReferenceAnswers,
};

pub const NO_DOMINANT_PROTOCOL: &str = "no ICMP, ICMPv6, TCP or UDP packets found";
pub const NO_IP_COMMUNICATIONS: &str = "no IP communications found";
pub const RATE_NOT_COMPUTABLE: &str = "not computable, only one packet";

/// Aggregates gathered from a capture in a single pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TraceStatistics {
    pub packet_count: u64,
    pub total_bytes: u64,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
    /// Occurrences of each network-layer address as source or destination,
    /// IPv4 and IPv6 alike.
    pub address_counts: BTreeMap<IpAddr, u64>,
    pub protocol_counts: HashMap<Protocol, u64>,
}

impl TraceStatistics {
    pub fn collect(capture: &Capture) -> Self {
        let mut stats = Self::default();
        for packet in &capture.packets {
            stats.packet_count += 1;
            stats.total_bytes += packet.length;
            stats.first_timestamp.get_or_insert(packet.timestamp);
            stats.last_timestamp = Some(packet.timestamp);

            for address in [packet.source.ip(), packet.destination.ip()].into_iter().flatten() {
                *stats.address_counts.entry(address).or_default() += 1;
            }
            *stats.protocol_counts.entry(packet.protocol).or_default() += 1;
        }
        stats
    }

    /// Seconds between the first and last packet; never negative.
    pub fn duration(&self) -> f64 {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) if last > first => last - first,
            _ => 0.0,
        }
    }

    pub fn unique_communicators(&self) -> u64 {
        self.address_counts.len() as u64
    }

    /// Every address sharing the highest occurrence count, in address order.
    pub fn most_active_addresses(&self) -> Vec<IpAddr> {
        let Some(max) = self.address_counts.values().max().copied() else {
            return Vec::new();
        };
        self.address_counts
            .iter()
            .filter(|(_, count)| **count == max)
            .map(|(address, _)| *address)
            .collect()
    }

    pub fn average_packet_size(&self) -> f64 {
        if self.packet_count == 0 {
            0.0
        } else {
            self.total_bytes as f64 / self.packet_count as f64
        }
    }

    /// First protocol in [`Protocol::DOMINANCE_ORDER`] reaching the highest
    /// count.
    pub fn dominant_protocol(&self) -> Option<Protocol> {
        let mut best: Option<(Protocol, u64)> = None;
        for protocol in Protocol::DOMINANCE_ORDER {
            let count = self.protocol_counts.get(&protocol).copied().unwrap_or_default();
            if count > 0 && best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((protocol, count));
            }
        }
        best.map(|(protocol, _)| protocol)
    }

    pub fn answer(&self, kind: QuestionKind) -> ReferenceAnswer {
        match kind {
            QuestionKind::TotalPackets => ReferenceAnswer::Count(self.packet_count),
            QuestionKind::UniqueCommunicators => ReferenceAnswer::Count(self.unique_communicators()),
            QuestionKind::MostActiveAddress => {
                let addresses = self.most_active_addresses();
                if addresses.is_empty() {
                    ReferenceAnswer::Undefined(NO_IP_COMMUNICATIONS.to_string())
                } else {
                    ReferenceAnswer::Addresses(addresses)
                }
            }
            QuestionKind::TotalBytes => ReferenceAnswer::Count(self.total_bytes),
            QuestionKind::AveragePacketSize => {
                ReferenceAnswer::Quantity(self.average_packet_size())
            }
            QuestionKind::DominantProtocol => match self.dominant_protocol() {
                Some(protocol) => ReferenceAnswer::Protocol(protocol),
                None => ReferenceAnswer::Undefined(NO_DOMINANT_PROTOCOL.to_string()),
            },
            QuestionKind::Duration => ReferenceAnswer::Quantity(self.duration()),
            QuestionKind::PacketsPerSecond => self.rate(self.packet_count),
            QuestionKind::BytesPerSecond => self.rate(self.total_bytes),
        }
    }

    fn rate(&self, total: u64) -> ReferenceAnswer {
        let duration = self.duration();
        if duration > 0.0 {
            ReferenceAnswer::Quantity(total as f64 / duration)
        } else {
            ReferenceAnswer::Undefined(RATE_NOT_COMPUTABLE.to_string())
        }
    }
}

/// Deterministic oracle the evaluator scores model answers against.
pub struct GroundTruth;

impl GroundTruth {
    /// One reference answer per catalog question, in catalog order.
    pub fn compute(capture: &Capture, catalog: &QuestionCatalog) -> ReferenceAnswers {
        let stats = TraceStatistics::collect(capture);
        catalog
            .iter()
            .map(|entry| (entry.question.clone(), stats.answer(entry.kind)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use netx_domain::{Address, Packet, QuestionDefinition};
    use netx_test_kit::PcapFixture;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::CaptureReader;

    const A: [u8; 4] = [192, 168, 1, 10];
    const B: [u8; 4] = [192, 168, 1, 20];
    const C: [u8; 4] = [192, 168, 1, 30];

    fn catalog() -> QuestionCatalog {
        let definitions = QuestionKind::iter()
            .map(|kind| QuestionDefinition {
                question: kind.canonical_question().to_string(),
                kind: None,
                subquestions: vec!["How many lines are in the trace?".to_string()],
            })
            .collect();
        QuestionCatalog::from_definitions(definitions).unwrap()
    }

    fn answer(answers: &ReferenceAnswers, kind: QuestionKind) -> ReferenceAnswer {
        answers[kind.canonical_question()].clone()
    }

    fn packet(number: u64, timestamp: f64, protocol: Protocol, source: [u8; 4], destination: [u8; 4]) -> Packet {
        Packet::new(number, timestamp, protocol, 100)
            .source(Address::Ip(IpAddr::from(source)))
            .destination(Address::Ip(IpAddr::from(destination)))
    }

    #[test]
    fn test_five_packet_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = PcapFixture::new()
            .tcp(0.0, A, B, (51000, 80), 10)
            .tcp(1.0, B, A, (80, 51000), 100)
            .udp(2.0, A, C, (5353, 53), 20)
            .tcp(3.0, C, B, (51001, 443), 0)
            .udp(4.0, B, A, (53, 5353), 40);
        let path = fixture.write(dir.path(), "scenario.pcap").unwrap();
        let capture = CaptureReader::read(&path, 100).unwrap();

        let actual = GroundTruth::compute(&capture, &catalog());
        let total = fixture.total_bytes();

        assert_eq!(answer(&actual, QuestionKind::TotalPackets), ReferenceAnswer::Count(5));
        assert_eq!(answer(&actual, QuestionKind::UniqueCommunicators), ReferenceAnswer::Count(3));
        assert_eq!(
            answer(&actual, QuestionKind::DominantProtocol),
            ReferenceAnswer::Protocol(Protocol::Tcp)
        );
        assert_eq!(answer(&actual, QuestionKind::Duration), ReferenceAnswer::Quantity(4.0));
        assert_eq!(
            answer(&actual, QuestionKind::PacketsPerSecond),
            ReferenceAnswer::Quantity(1.25)
        );
        assert_eq!(answer(&actual, QuestionKind::TotalBytes), ReferenceAnswer::Count(total));
        assert_eq!(
            answer(&actual, QuestionKind::BytesPerSecond),
            ReferenceAnswer::Quantity(total as f64 / 4.0)
        );
    }

    #[test]
    fn test_snaplen_limited_capture_keeps_network_answers() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = PcapFixture::new()
            .tcp(0.0, A, B, (51000, 80), 200)
            .tcp(0.5, B, A, (80, 51000), 300)
            .snaplen(54);
        let path = fixture.write(dir.path(), "snaplen.pcap").unwrap();
        let capture = CaptureReader::read(&path, 100).unwrap();

        let actual = GroundTruth::compute(&capture, &catalog());

        assert_eq!(answer(&actual, QuestionKind::UniqueCommunicators), ReferenceAnswer::Count(2));
        assert_eq!(
            answer(&actual, QuestionKind::DominantProtocol),
            ReferenceAnswer::Protocol(Protocol::Tcp)
        );
        assert_eq!(
            answer(&actual, QuestionKind::TotalBytes),
            ReferenceAnswer::Count(fixture.total_bytes())
        );
    }

    #[test]
    fn test_empty_capture_uses_identity_values() {
        let fixture = Capture::new("empty.pcap", vec![]);
        let actual = GroundTruth::compute(&fixture, &catalog());

        assert_eq!(answer(&actual, QuestionKind::TotalPackets), ReferenceAnswer::Count(0));
        assert_eq!(answer(&actual, QuestionKind::TotalBytes), ReferenceAnswer::Count(0));
        assert_eq!(answer(&actual, QuestionKind::UniqueCommunicators), ReferenceAnswer::Count(0));
        assert_eq!(
            answer(&actual, QuestionKind::AveragePacketSize),
            ReferenceAnswer::Quantity(0.0)
        );
        assert_eq!(answer(&actual, QuestionKind::Duration), ReferenceAnswer::Quantity(0.0));
        assert_eq!(
            answer(&actual, QuestionKind::MostActiveAddress),
            ReferenceAnswer::Undefined(NO_IP_COMMUNICATIONS.to_string())
        );
        assert_eq!(
            answer(&actual, QuestionKind::DominantProtocol),
            ReferenceAnswer::Undefined(NO_DOMINANT_PROTOCOL.to_string())
        );
    }

    #[test]
    fn test_single_packet_rates_are_not_computable() {
        let fixture = Capture::new("one.pcap", vec![packet(1, 5.0, Protocol::Udp, A, B)]);
        let actual = GroundTruth::compute(&fixture, &catalog());

        let expected = ReferenceAnswer::Undefined(RATE_NOT_COMPUTABLE.to_string());
        assert_eq!(answer(&actual, QuestionKind::PacketsPerSecond), expected);
        assert_eq!(answer(&actual, QuestionKind::BytesPerSecond), expected);
        assert_eq!(answer(&actual, QuestionKind::Duration), ReferenceAnswer::Quantity(0.0));
    }

    #[test]
    fn test_unordered_timestamps_clamp_duration() {
        let fixture = Capture::new(
            "reordered.pcap",
            vec![packet(1, 9.0, Protocol::Tcp, A, B), packet(2, 3.0, Protocol::Tcp, B, A)],
        );
        let actual = TraceStatistics::collect(&fixture);
        assert_eq!(actual.duration(), 0.0);
        assert_eq!(
            actual.answer(QuestionKind::PacketsPerSecond),
            ReferenceAnswer::Undefined(RATE_NOT_COMPUTABLE.to_string())
        );
    }

    #[test]
    fn test_dominant_protocol_tie_prefers_enumeration_order() {
        let fixture = Capture::new(
            "tie.pcap",
            vec![
                packet(1, 0.0, Protocol::Udp, A, B),
                packet(2, 1.0, Protocol::Tcp, A, B),
                packet(3, 2.0, Protocol::Udp, A, B),
                packet(4, 3.0, Protocol::Tcp, A, B),
            ],
        );
        for _ in 0..3 {
            let actual = TraceStatistics::collect(&fixture).dominant_protocol();
            assert_eq!(actual, Some(Protocol::Tcp));
        }
    }

    #[test]
    fn test_most_active_tie_lists_both_addresses() {
        let fixture = Capture::new(
            "tie.pcap",
            vec![packet(1, 0.0, Protocol::Tcp, A, B), packet(2, 1.0, Protocol::Tcp, B, A)],
        );
        let actual = TraceStatistics::collect(&fixture)
            .answer(QuestionKind::MostActiveAddress)
            .to_string();
        assert!(actual.contains("192.168.1.10"));
        assert!(actual.contains("192.168.1.20"));
    }

    #[test]
    fn test_ipv6_addresses_count_as_communicators() {
        let v6 = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1));
        let fixture = Capture::new(
            "mixed.pcap",
            vec![
                packet(1, 0.0, Protocol::Udp, A, B),
                Packet::new(2, 1.0, Protocol::Icmpv6, 80)
                    .source(Address::Ip(v6))
                    .destination(Address::Ip(IpAddr::from(A))),
                Packet::new(3, 2.0, Protocol::Other, 42).source(Address::Mac([2, 0, 0, 0, 0, 1])),
            ],
        );
        let actual = TraceStatistics::collect(&fixture);
        assert_eq!(actual.unique_communicators(), 3);
        assert_eq!(actual.most_active_addresses(), vec![IpAddr::from(A)]);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let fixture = Capture::new(
            "repeat.pcap",
            vec![packet(1, 0.0, Protocol::Icmp, A, C), packet(2, 0.3, Protocol::Udp, C, B)],
        );
        let catalog = catalog();
        let first = GroundTruth::compute(&fixture, &catalog);
        let second = GroundTruth::compute(&fixture, &catalog);
        assert_eq!(first, second);
        assert_eq!(first.len(), catalog.len());
    }
}
