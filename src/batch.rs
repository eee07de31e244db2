use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::client::{NichesClient, NichesHttpClient};
use crate::config::HarvestConfig;
use crate::domain::{BatchReport, CategoryFailure, CategoryId, FailureKind, Record};
use crate::error::NichesError;
use crate::fetcher::CategoryFetcher;
use crate::loader::{PaginatedCategoryLoader, PaginationConfig};
use crate::retry::BackoffPolicy;
use crate::sheet::SpreadsheetParser;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn event(&self, _event: ProgressEvent) {}
}

type CategoryOutcome = (CategoryId, Result<Vec<Record>, CategoryFailure>);

pub struct BatchOrchestrator<C> {
    fetcher: CategoryFetcher<C>,
    pagination: PaginationConfig,
    max_concurrency: usize,
}

impl<C: NichesClient> BatchOrchestrator<C> {
    pub fn new(client: C, config: &HarvestConfig) -> Result<Self, NichesError> {
        config.validate()?;
        Ok(Self {
            fetcher: CategoryFetcher::new(client, BackoffPolicy::from_config(config)),
            pagination: PaginationConfig::from_config(config),
            max_concurrency: config.max_concurrency,
        })
    }

    pub fn run(
        &self,
        categories: &[CategoryId],
        cancel: &CancelToken,
        sink: &dyn ProgressSink,
    ) -> Result<BatchReport, NichesError> {
        if categories.is_empty() {
            return Err(NichesError::InvalidInput(
                "category set is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let queue: VecDeque<CategoryId> = categories
            .iter()
            .copied()
            .filter(|category| seen.insert(*category))
            .collect();
        if queue.len() < categories.len() {
            tracing::debug!(
                duplicates = categories.len() - queue.len(),
                "dropped duplicate categories"
            );
        }

        let total = queue.len();
        let workers = self.max_concurrency.min(total);
        let started = Instant::now();
        let mut report = BatchReport {
            started_at: chrono::Utc::now().to_rfc3339(),
            ..BatchReport::default()
        };

        tracing::info!(categories = total, workers, "starting batch");
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {total} categories on {workers} workers"),
            elapsed: None,
        });

        let queue = Mutex::new(queue);
        let (tx, rx) = mpsc::channel::<CategoryOutcome>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    loop {
                        let next = queue
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .pop_front();
                        let Some(category) = next else {
                            break;
                        };
                        let outcome = self.process(category, cancel);
                        if tx.send((category, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (done, (category, outcome)) in rx.into_iter().enumerate() {
                let done = done + 1;
                match outcome {
                    Ok(records) => {
                        tracing::info!(%category, records = records.len(), "category completed");
                        sink.event(ProgressEvent {
                            message: format!(
                                "[{done}/{total}] category {category}: {} records",
                                records.len()
                            ),
                            elapsed: Some(started.elapsed()),
                        });
                        report.record_counts.insert(category, records.len());
                        report.records.extend(records);
                    }
                    Err(failure) => {
                        tracing::warn!(%category, kind = %failure.kind, "category failed: {}", failure.message);
                        sink.event(ProgressEvent {
                            message: format!("[{done}/{total}] category {category} failed: {failure}"),
                            elapsed: Some(started.elapsed()),
                        });
                        report.failures.insert(category, failure);
                    }
                }
            }
        });

        report.finished_at = chrono::Utc::now().to_rfc3339();
        tracing::info!(
            records = report.records.len(),
            failed = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        Ok(report)
    }

    fn process(
        &self,
        category: CategoryId,
        cancel: &CancelToken,
    ) -> Result<Vec<Record>, CategoryFailure> {
        if cancel.is_cancelled() {
            return Err(CategoryFailure::new(
                FailureKind::Cancelled,
                "cancelled before start",
            ));
        }

        let loader = PaginatedCategoryLoader::new(&self.fetcher, self.pagination);
        let batch = loader.load(category, cancel)?;

        let mut records = Vec::new();
        for (page, payload) in batch.payloads.iter().enumerate() {
            if payload.is_empty() {
                continue;
            }
            let parsed = SpreadsheetParser::parse(payload).map_err(|err| {
                let offset = self.pagination.start_offset + page as u64 * self.pagination.page_size;
                CategoryFailure::new(FailureKind::Parse, err.to_string()).at_offset(offset)
            })?;
            records.extend(parsed);
        }
        Ok(records)
    }
}

pub fn run_batch(
    categories: &[CategoryId],
    config: &HarvestConfig,
) -> Result<BatchReport, NichesError> {
    if categories.is_empty() {
        return Err(NichesError::InvalidInput(
            "category set is empty".to_string(),
        ));
    }
    let client = NichesHttpClient::new(config)?;
    let orchestrator = BatchOrchestrator::new(client, config)?;
    orchestrator.run(categories, &CancelToken::new(), &NoopProgress)
}
