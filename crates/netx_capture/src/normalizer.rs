use std::path::{Path, PathBuf};

use netx_domain::{Capture, Error, Result};
use tracing::info;

use crate::CaptureReader;

pub const TRACE_HEADER: &str = "No.|Time|Source|Destination|Protocol|Length|Info";
pub const TRACE_SEPARATOR: &str = " | ";

/// Renders captures as the pipe-delimited packet table given to the models.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceNormalizer {
    max_packets: usize,
}

impl TraceNormalizer {
    pub fn new(max_packets: usize) -> Self {
        Self { max_packets }
    }

    pub fn max_packets(&self) -> usize {
        self.max_packets
    }

    /// Header line plus one line per packet, at most `max_packets` of them.
    /// Times are relative to the first packet.
    pub fn render(&self, capture: &Capture) -> String {
        let first = capture.packets.first().map(|packet| packet.timestamp).unwrap_or_default();

        let mut text = String::from(TRACE_HEADER);
        text.push('\n');
        for packet in capture.packets.iter().take(self.max_packets) {
            let fields = [
                packet.number.to_string(),
                format!("{:.6}", packet.timestamp - first),
                packet.source.to_string(),
                packet.destination.to_string(),
                packet.protocol.to_string(),
                packet.length.to_string(),
                packet.info.clone(),
            ];
            let line = fields
                .iter()
                .map(|field| clean_field(field))
                .collect::<Vec<_>>()
                .join(TRACE_SEPARATOR);
            text.push_str(&line);
            text.push('\n');
        }
        text
    }

    /// Reads `path` and writes its table next to it with a `.txt` extension.
    /// Nothing is written when the capture cannot be read.
    pub fn normalize(&self, path: &Path) -> Result<PathBuf> {
        let capture = CaptureReader::read(path, self.max_packets)?;
        let text = self.render(&capture);

        let output = path.with_extension("txt");
        std::fs::write(&output, text).map_err(|err| Error::output(&output, err))?;

        info!(
            source = %path.display(),
            output = %output.display(),
            packets = capture.len(),
            "Capture normalized"
        );
        Ok(output)
    }
}

/// Trims a field and swaps the arrow glyph and double quotes for ASCII.
pub fn clean_field(field: &str) -> String {
    field.trim().replace('→', "->").replace('"', "'")
}

#[cfg(test)]
mod tests {
    use netx_domain::{Address, Packet, Protocol};
    use netx_test_kit::PcapFixture;
    use pretty_assertions::assert_eq;

    use super::*;

    fn fixture(count: usize) -> PcapFixture {
        (0..count).fold(PcapFixture::new(), |fixture, index| {
            fixture.udp(index as f64 * 0.5, [10, 0, 0, 1], [10, 0, 0, 2], (53, 5353), 4)
        })
    }

    #[test]
    fn test_clean_field() {
        let actual = clean_field("  GET \"/index.html\" 80 → 51000 ");
        let expected = "GET '/index.html' 80 -> 51000";
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_render_line_shape() {
        let packet = Packet::new(1, 1000.0, Protocol::Udp, 60)
            .source(Address::Ip("10.0.0.1".parse().unwrap()))
            .destination(Address::Ip("10.0.0.2".parse().unwrap()))
            .info("53 → 5353 Len=18");
        let capture = Capture::new("dns.pcap", vec![packet]);

        let actual = TraceNormalizer::new(10).render(&capture);
        let expected = "No.|Time|Source|Destination|Protocol|Length|Info\n\
                        1 | 0.000000 | 10.0.0.1 | 10.0.0.2 | UDP | 60 | 53 -> 5353 Len=18\n";
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_render_truncates_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(8).write(dir.path(), "dns.pcap").unwrap();
        let capture = CaptureReader::read(&path, 100).unwrap();

        let actual = TraceNormalizer::new(3).render(&capture);
        assert_eq!(actual.lines().count(), 1 + 3);
        assert!(actual.lines().nth(3).unwrap().starts_with("3 | 1.000000 |"));
    }

    #[test]
    fn test_render_has_no_arrow_or_double_quote() {
        let dir = tempfile::tempdir().unwrap();
        let path = PcapFixture::new()
            .tcp(0.0, [10, 0, 0, 1], [10, 0, 0, 2], (80, 51000), 10)
            .write(dir.path(), "http.pcap")
            .unwrap();
        let capture = CaptureReader::read(&path, 10).unwrap();

        let actual = TraceNormalizer::new(10).render(&capture);
        assert!(!actual.contains('→'));
        assert!(!actual.contains('"'));
        assert!(actual.contains("80 -> 51000 [PSH, ACK]"));
    }

    #[test]
    fn test_normalize_writes_sibling_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(5).write(dir.path(), "dns.pcap").unwrap();

        let actual = TraceNormalizer::new(2).normalize(&path).unwrap();
        let expected = dir.path().join("dns.txt");
        assert_eq!(actual, expected);

        let text = std::fs::read_to_string(actual).unwrap();
        assert_eq!(text.lines().next(), Some(TRACE_HEADER));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_normalize_failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.pcapng");
        std::fs::write(&path, [0u8; 64]).unwrap();

        let actual = TraceNormalizer::new(10).normalize(&path);
        assert!(matches!(actual, Err(Error::CaptureRead { .. })));
        assert!(!dir.path().join("corrupt.txt").exists());
    }

    #[test]
    fn test_unwritable_output_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(1).write(dir.path(), "dns.pcap").unwrap();
        std::fs::create_dir(dir.path().join("dns.txt")).unwrap();

        let actual = TraceNormalizer::new(10).normalize(&path);
        assert!(matches!(actual, Err(Error::Output { path, .. }) if path == dir.path().join("dns.txt")));
    }

    #[test]
    fn test_normalize_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(1).write(dir.path(), "dns.bin").unwrap();

        let actual = TraceNormalizer::new(10).normalize(&path);
        assert!(matches!(actual, Err(Error::Validation { .. })));
    }
}
