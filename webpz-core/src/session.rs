use std::sync::Arc;

use crate::batch::{BatchCoordinator, BatchHandle, BatchItem, BatchReport};
use crate::config::Config;
use crate::diagnostics::{Diagnostic, DiagnosticsBoard};
use crate::error::Result;
use crate::intake::{InputFile, screen};
use crate::preview::PreviewRegistry;
use crate::record::ConversionRecord;
use crate::retrieval::{DownloadSink, Emitted, Retrieval};
use crate::stats::Stats;
use crate::store::ResultStore;

/// One application session: a store plus everything that feeds and reads it.
pub struct Session {
    config: Config,
    store: Arc<ResultStore>,
    previews: Arc<PreviewRegistry>,
    diagnostics: Arc<DiagnosticsBoard>,
    coordinator: Arc<BatchCoordinator>,
    retrieval: Arc<Retrieval>,
}

impl Session {
    pub fn new(config: Config, sink: Box<dyn DownloadSink>) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(ResultStore::new());
        let previews = Arc::new(PreviewRegistry::new());
        let diagnostics = Arc::new(DiagnosticsBoard::new());
        let coordinator = Arc::new(BatchCoordinator::new(
            config.policy.clone(),
            config.worker_count(),
            store.clone(),
            previews.clone(),
            diagnostics.clone(),
        )?);
        let retrieval = Arc::new(Retrieval::new(
            store.clone(),
            sink,
            config.pack.clone(),
            config.policy.target_format,
            diagnostics.clone(),
        ));
        Ok(Self {
            config,
            store,
            previews,
            diagnostics,
            coordinator,
            retrieval,
        })
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Screens the batch, then converts what passed. Rejected files are
    /// reported in place, in submission order, alongside transcode results.
    pub fn submit_files(&self, inputs: Vec<InputFile>) -> BatchReport {
        let order: Vec<String> = inputs.iter().map(|f| f.name.clone()).collect();
        let screened = screen(inputs);
        let mut report = self.coordinator.process_batch(screened.accepted);
        if screened.rejected.is_empty() {
            return report;
        }
        let mut converted = report.items.into_iter();
        let mut rejected = screened.rejected.into_iter().peekable();
        let mut items = Vec::with_capacity(order.len());
        for name in order {
            let is_rejected = matches!(rejected.peek(), Some((n, _)) if *n == name);
            let next = if is_rejected {
                rejected.next().map(|(name, e)| BatchItem {
                    name,
                    result: Err(e),
                })
            } else {
                converted.next()
            };
            items.extend(next);
        }
        report.items = items;
        if let Some(d) = report.diagnostic() {
            self.diagnostics.set(d);
        }
        report
    }

    /// Converts without screening (inputs already passed the boundary).
    pub fn process_batch(&self, inputs: Vec<InputFile>) -> BatchReport {
        self.coordinator.process_batch(inputs)
    }

    pub fn submit_background(&self, inputs: Vec<InputFile>) -> Result<BatchHandle> {
        self.coordinator.submit(inputs)
    }

    pub fn download_one(&self, record: &ConversionRecord) -> Result<Emitted> {
        self.retrieval.download_one(record)
    }

    pub fn download_all(&self) -> Result<Option<Emitted>> {
        self.retrieval.download_all()
    }

    pub fn download_all_detached(
        &self,
    ) -> Result<std::thread::JoinHandle<Result<Option<Emitted>>>> {
        self.retrieval.download_all_detached()
    }

    pub fn diagnostic(&self) -> Option<Diagnostic> {
        self.diagnostics.current()
    }

    pub fn stats(&self) -> Stats {
        Stats::from_records(&self.store.snapshot())
    }

    /// Replaces the store wholesale; old records' previews are revoked.
    pub fn reset(&mut self, sink: Box<dyn DownloadSink>) -> Result<()> {
        let fresh = Session::new(self.config.clone(), sink)?;
        // dropping the old session cancels its batch and revokes previews
        *self = fresh;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.coordinator.begin();
        self.previews.revoke_all();
    }
}
