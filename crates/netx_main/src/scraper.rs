use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indexmap::IndexSet;
use lazy_static::lazy_static;
use netx_capture::{CAPTURE_EXTENSIONS, CaptureReader};
use netx_eval::find_captures;
use regex::Regex;
use tracing::{error, info, warn};
use url::Url;

lazy_static! {
    static ref HREF: Regex =
        Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("valid href pattern");
}

/// Fetches sample captures from an index page and filters them by size.
pub struct Scraper {
    client: reqwest::Client,
    index_url: Url,
    raw_dir: PathBuf,
    cleaned_dir: PathBuf,
}

impl Scraper {
    pub fn new(index_url: &str, data_dir: &Path, timeout: Duration) -> Result<Self> {
        let index_url = Url::parse(index_url)
            .with_context(|| format!("Invalid index URL '{index_url}'"))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            index_url,
            raw_dir: data_dir.join("raw"),
            cleaned_dir: data_dir.join("cleaned"),
        })
    }

    /// Capture links on the index page, resolved and de-duplicated in page
    /// order.
    pub async fn download_urls(&self) -> Result<Vec<Url>> {
        let page = self
            .client
            .get(self.index_url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("Failed to fetch {}", self.index_url))?
            .text()
            .await
            .with_context(|| format!("Failed to read {}", self.index_url))?;

        let urls = HREF
            .captures_iter(&page)
            .filter_map(|captures| captures.get(1))
            .map(|href| href.as_str().replace("&amp;", "&"))
            .filter_map(|href| self.index_url.join(&href).ok())
            .filter(is_capture_url)
            .collect::<IndexSet<_>>();

        info!(count = urls.len(), index = %self.index_url, "Found capture links");
        Ok(urls.into_iter().collect())
    }

    /// Downloads every linked capture into the raw directory. A failed
    /// download is logged and skipped.
    pub async fn download_captures(&self) -> Result<Vec<PathBuf>> {
        let urls = self.download_urls().await?;
        std::fs::create_dir_all(&self.raw_dir)
            .with_context(|| format!("Failed to create {}", self.raw_dir.display()))?;

        let mut downloaded = Vec::new();
        for url in urls {
            let Some(filename) = file_name(&url) else {
                warn!(url = %url, "Skipping link without a file name");
                continue;
            };
            info!("Downloading {filename}");
            match self.download(&url, &self.raw_dir.join(&filename)).await {
                Ok(path) => downloaded.push(path),
                Err(e) => error!("Error downloading {url}: {e:#}"),
            }
        }
        Ok(downloaded)
    }

    async fn download(&self, url: &Url, destination: &Path) -> Result<PathBuf> {
        let bytes = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())?
            .bytes()
            .await?;
        tokio::fs::write(destination, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", destination.display()))?;
        Ok(destination.to_path_buf())
    }

    /// Copies raw captures with at most `max_packets` packets into the cleaned
    /// directory. Does nothing when that directory already has content.
    pub fn clean_raw_data(&self, max_packets: u64) -> Result<Vec<PathBuf>> {
        if has_entries(&self.cleaned_dir) {
            info!(
                "Directory {} already exists and is not empty. Skipping creation.",
                self.cleaned_dir.display()
            );
            return Ok(Vec::new());
        }

        let captures = find_captures(&self.raw_dir)?;
        std::fs::create_dir_all(&self.cleaned_dir)
            .with_context(|| format!("Failed to create {}", self.cleaned_dir.display()))?;

        let mut kept = Vec::new();
        for capture in captures {
            match CaptureReader::count(&capture) {
                Ok(count) if count <= max_packets => {
                    let Some(name) = capture.file_name() else {
                        continue;
                    };
                    let destination = self.cleaned_dir.join(name);
                    std::fs::copy(&capture, &destination).with_context(|| {
                        format!("Failed to copy {} to {}", capture.display(), destination.display())
                    })?;
                    kept.push(destination);
                }
                Ok(count) => {
                    info!(file = %capture.display(), packets = count, "Capture too large, skipped")
                }
                Err(e) => error!("Error processing file {}: {e}", capture.display()),
            }
        }

        info!(kept = kept.len(), max_packets, "Raw captures cleaned");
        Ok(kept)
    }
}

fn is_capture_url(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    CAPTURE_EXTENSIONS
        .iter()
        .any(|extension| path.ends_with(&format!(".{extension}")))
}

fn file_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .next_back()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use netx_test_kit::PcapFixture;
    use pretty_assertions::assert_eq;

    use super::*;

    fn scraper(index_url: &str, data_dir: &Path) -> Scraper {
        Scraper::new(index_url, data_dir, Duration::from_secs(5)).unwrap()
    }

    const INDEX: &str = r#"<html><body>
        <a href="/uploads/sample/dns.cap">dns</a>
        <a HREF='/uploads/sample/http.PCAPNG'>http</a>
        <a href="/uploads/sample/dns.cap">again</a>
        <a href="/uploads/sample/readme.txt">readme</a>
        <a href="/uploads/sample/broken.pcap">broken</a>
        <a href="SampleCaptures?action=edit">edit</a>
    </body></html>"#;

    #[tokio::test]
    async fn test_download_urls() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/SampleCaptures").with_status(200).with_body(INDEX).create();
        let dir = tempfile::tempdir().unwrap();

        let actual = scraper(&format!("{}/SampleCaptures", server.url()), dir.path())
            .download_urls()
            .await
            .unwrap()
            .into_iter()
            .map(|url| url.path().to_string())
            .collect::<Vec<_>>();
        let expected = vec![
            "/uploads/sample/dns.cap",
            "/uploads/sample/http.PCAPNG",
            "/uploads/sample/broken.pcap",
        ];
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_download_skips_failures() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/SampleCaptures").with_status(200).with_body(INDEX).create();
        server
            .mock("GET", "/uploads/sample/dns.cap")
            .with_status(200)
            .with_body(b"dns bytes")
            .create();
        server
            .mock("GET", "/uploads/sample/http.PCAPNG")
            .with_status(200)
            .with_body(b"http bytes")
            .create();
        server.mock("GET", "/uploads/sample/broken.pcap").with_status(404).create();
        let dir = tempfile::tempdir().unwrap();

        let actual = scraper(&format!("{}/SampleCaptures", server.url()), dir.path())
            .download_captures()
            .await
            .unwrap();

        let expected = vec![
            dir.path().join("raw/dns.cap"),
            dir.path().join("raw/http.PCAPNG"),
        ];
        assert_eq!(actual, expected);
        assert_eq!(std::fs::read(&expected[0]).unwrap(), b"dns bytes");
        assert!(!dir.path().join("raw/broken.pcap").exists());
    }

    #[tokio::test]
    async fn test_unreachable_index_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/SampleCaptures").with_status(500).create();
        let dir = tempfile::tempdir().unwrap();

        let actual = scraper(&format!("{}/SampleCaptures", server.url()), dir.path())
            .download_urls()
            .await;
        assert!(actual.is_err());
    }

    #[test]
    fn test_clean_raw_data_filters_by_packet_count() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        std::fs::create_dir_all(&raw).unwrap();
        let small = PcapFixture::new().udp(0.0, [10, 0, 0, 1], [10, 0, 0, 2], (53, 53), 10);
        let large = (0..5).fold(PcapFixture::new(), |fixture, index| {
            fixture.udp(index as f64, [10, 0, 0, 1], [10, 0, 0, 2], (53, 53), 10)
        });
        small.write(&raw, "small.pcap").unwrap();
        large.write(&raw, "large.pcap").unwrap();
        std::fs::write(raw.join("garbage.cap"), b"nope").unwrap();

        let actual = scraper(DEFAULT_TEST_URL, dir.path()).clean_raw_data(3).unwrap();

        assert_eq!(actual, vec![dir.path().join("cleaned/small.pcap")]);
        assert!(actual[0].exists());
    }

    #[test]
    fn test_clean_raw_data_keeps_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let cleaned = dir.path().join("cleaned");
        std::fs::create_dir_all(&cleaned).unwrap();
        std::fs::write(cleaned.join("kept.pcap"), b"").unwrap();

        let actual = scraper(DEFAULT_TEST_URL, dir.path()).clean_raw_data(3).unwrap();
        assert!(actual.is_empty());
        assert!(cleaned.join("kept.pcap").exists());
    }

    #[test]
    fn test_file_name_from_url() {
        let fixture = Url::parse("https://wiki.wireshark.org/uploads/a/b/dhcp.pcap").unwrap();
        assert_eq!(file_name(&fixture).as_deref(), Some("dhcp.pcap"));
        let fixture = Url::parse("https://wiki.wireshark.org/").unwrap();
        assert_eq!(file_name(&fixture), None);
    }

    const DEFAULT_TEST_URL: &str = "http://localhost/SampleCaptures";
}
