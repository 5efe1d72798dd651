use crate::config::SourceSection;
use crate::models::RawRow;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use encoding_rs::{UTF_8, WINDOWS_1252};
use std::path::PathBuf;
use tracing::{info, warn};
use wreq::Client;
use wreq_util::Emulation;

/// Somewhere a catalogue export can be read from.
#[async_trait]
pub trait CsvSource: Send + Sync {
    async fn fetch_bytes(&self) -> Result<Vec<u8>>;

    fn describe(&self) -> String;
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

#[async_trait]
impl CsvSource for FileSource {
    async fn fetch_bytes(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read CSV file: {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .emulation(Emulation::Firefox136)
            .build()?;

        Ok(HttpSource {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CsvSource for HttpSource {
    async fn fetch_bytes(&self) -> Result<Vec<u8>> {
        info!("Fetching CSV from: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header("Cache-Control", "no-store")
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch {}: {}", self.url, e))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error fetching {}: {}", self.url, response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", self.url, e))?;
        Ok(bytes.to_vec())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Picks the configured source; a local path wins over a URL.
pub fn source_from_config(section: &SourceSection) -> Result<Box<dyn CsvSource>> {
    if let Some(path) = section.path.as_deref().filter(|p| !p.trim().is_empty()) {
        return Ok(Box::new(FileSource::new(path)));
    }
    if let Some(url) = section.url.as_deref().filter(|u| !u.trim().is_empty()) {
        return Ok(Box::new(HttpSource::new(url)?));
    }
    Err(anyhow!("No CSV source configured for dataset {}", section.dataset))
}

/// Decodes export bytes as UTF-8 (BOM removed), falling back to Windows-1252
/// for legacy exports where `£` is a single 0xA3 byte.
pub fn decode_text(bytes: &[u8]) -> String {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return text.into_owned();
    }

    warn!("CSV is not valid UTF-8, decoding as Windows-1252");
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}

/// Splits CSV text into raw rows keyed by the header line.
///
/// Short lines are padded with empty cells and cells past the header are
/// ignored. Values are kept verbatim; trimming is the normalizer's job.
pub fn parse_csv_text(text: &str) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at line {}", line_num + 2))?;

        let mut row = RawRow::new();
        for (i, header) in headers.iter().enumerate() {
            row.push(header.as_str(), record.get(i).unwrap_or(""));
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Reads, decodes and splits one export.
pub async fn fetch_raw_rows(source: &dyn CsvSource) -> Result<Vec<RawRow>> {
    let bytes = source.fetch_bytes().await?;
    info!("Read {} bytes from {}", bytes.len(), source.describe());

    let text = decode_text(&bytes);
    let rows = parse_csv_text(&text)
        .with_context(|| format!("Failed to parse CSV from {}", source.describe()))?;
    info!("Parsed {} CSV rows from {}", rows.len(), source.describe());

    Ok(rows)
}
