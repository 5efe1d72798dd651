use crate::config::PipelineConfig;
use crate::fetcher::{CsvSource, fetch_raw_rows};
use crate::models::RawRow;
use crate::processor::{NormalizationReport, RecordNormalizer};
use crate::storage::{CommitOutcome, LoadTicket, RecordStore};
use anyhow::{Result, anyhow};
use tracing::{error, info, warn};

/// Result of one load transaction.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub ticket: LoadTicket,
    pub source: String,
    pub outcome: CommitOutcome,
    pub records: usize,
    pub report: NormalizationReport,
}

impl LoadSummary {
    pub fn applied(&self) -> bool {
        self.outcome == CommitOutcome::Applied
    }
}

/// Fetch, parse, normalize and commit a catalogue export.
pub struct CataloguePipeline {
    normalizer: RecordNormalizer,
}

impl CataloguePipeline {
    pub fn new(normalizer: RecordNormalizer) -> Self {
        CataloguePipeline { normalizer }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let aliases = config.header_aliases()?;
        Ok(Self::new(RecordNormalizer::new(aliases, config.metrics)))
    }

    pub fn normalizer(&self) -> &RecordNormalizer {
        &self.normalizer
    }

    /// Runs one load against `source`.
    ///
    /// Any failure is recorded on the store and returned; the store keeps
    /// whatever records it had before.
    pub async fn load(&self, source: &dyn CsvSource, store: &RecordStore) -> Result<LoadSummary> {
        let ticket = store.begin_load();
        let description = source.describe();
        info!("Starting load #{} from {}", ticket.sequence(), description);

        let rows = match fetch_raw_rows(source).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Load #{} failed: {:#}", ticket.sequence(), e);
                store.reject(ticket, format!("{:#}", e));
                return Err(e.context(format!("Failed to load catalogue from {}", description)));
            }
        };

        self.commit_rows(ticket, description, &rows, store)
    }

    /// Normalizes rows that were already read by the caller and commits them.
    pub fn load_rows(&self, source: &str, rows: &[RawRow], store: &RecordStore) -> Result<LoadSummary> {
        let ticket = store.begin_load();
        self.commit_rows(ticket, source.to_string(), rows, store)
    }

    fn commit_rows(
        &self,
        ticket: LoadTicket,
        source: String,
        rows: &[RawRow],
        store: &RecordStore,
    ) -> Result<LoadSummary> {
        let batch = self.normalizer.normalize(rows);
        batch.report.log();

        let records = batch.records.len();
        match store.commit(ticket, batch.records) {
            CommitOutcome::Empty => Err(anyhow!(
                "No populated rows in {} ({} rows read)",
                source,
                batch.report.input_rows
            )),
            outcome => {
                if outcome == CommitOutcome::Stale {
                    warn!("Load #{} from {} was superseded", ticket.sequence(), source);
                }
                Ok(LoadSummary {
                    ticket,
                    source,
                    outcome,
                    records,
                    report: batch.report,
                })
            }
        }
    }
}
