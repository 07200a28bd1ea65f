// Batch coordination: fan a batch out over a bounded worker pool, isolate
// per-item failures, and append successes to the shared store as they finish.
//
// The store sees completion order; the returned `BatchReport` keeps
// submission order so callers can correlate results with inputs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::diagnostics::{Diagnostic, DiagnosticsBoard};
use crate::error::{Result, TranscodeError, WebpzError};
use crate::intake::InputFile;
use crate::policy::Policy;
use crate::preview::PreviewRegistry;
use crate::record::ConversionRecord;
use crate::store::ResultStore;
use crate::transcode::transcode;

#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug)]
pub struct BatchItem {
    pub name: String,
    pub result: std::result::Result<ConversionRecord, TranscodeError>,
}

#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    /// One entry per input, in submission order.
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn records(&self) -> impl Iterator<Item = &ConversionRecord> {
        self.items.iter().filter_map(|i| i.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &TranscodeError)> {
        self.items
            .iter()
            .filter_map(|i| i.result.as_ref().err().map(|e| (i.name.as_str(), e)))
    }

    pub fn diagnostic(&self) -> Option<Diagnostic> {
        let failed = self.failed();
        (failed > 0).then(|| Diagnostic::BatchFailures {
            failed,
            total: self.total(),
            reasons: self
                .failures()
                .map(|(n, e)| (n.to_string(), e.to_string()))
                .collect(),
        })
    }
}

pub struct BatchCoordinator {
    policy: Policy,
    pool: rayon::ThreadPool,
    store: Arc<ResultStore>,
    previews: Arc<PreviewRegistry>,
    diagnostics: Arc<DiagnosticsBoard>,
    current: Mutex<CancelToken>,
}

impl BatchCoordinator {
    pub fn new(
        policy: Policy,
        workers: usize,
        store: Arc<ResultStore>,
        previews: Arc<PreviewRegistry>,
        diagnostics: Arc<DiagnosticsBoard>,
    ) -> Result<Self> {
        policy.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("webpz-worker-{i}"))
            .build()
            .map_err(|e| WebpzError::Config(format!("worker pool: {e}")))?;
        Ok(Self {
            policy,
            pool,
            store,
            previews,
            diagnostics,
            current: Mutex::new(CancelToken::default()),
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Abandons the remainder of any running batch and clears diagnostics.
    pub fn begin(&self) -> CancelToken {
        let token = CancelToken::default();
        let prev = std::mem::replace(&mut *self.current.lock(), token.clone());
        prev.cancel();
        self.diagnostics.clear();
        token
    }

    /// Runs a batch on the pool, blocking the caller until every item settles.
    pub fn process_batch(&self, inputs: Vec<InputFile>) -> BatchReport {
        let token = self.begin();
        self.run(inputs, &token)
    }

    /// Same as [`process_batch`](Self::process_batch) but off the caller's thread.
    pub fn submit(self: &Arc<Self>, inputs: Vec<InputFile>) -> Result<BatchHandle> {
        let token = self.begin();
        let this = Arc::clone(self);
        let t = token.clone();
        let join = std::thread::Builder::new()
            .name("webpz-batch".into())
            .spawn(move || this.run(inputs, &t))?;
        Ok(BatchHandle { token, join })
    }

    pub fn run(&self, inputs: Vec<InputFile>, token: &CancelToken) -> BatchReport {
        let total = inputs.len();
        info!(items = total, workers = self.workers(), "batch started");

        let items: Vec<BatchItem> = self.pool.install(|| {
            inputs
                .into_par_iter()
                .map(|input| self.convert_one(input, token))
                .collect()
        });
        let report = BatchReport { items };

        if token.is_cancelled() {
            info!(items = total, done = report.succeeded(), "batch abandoned");
        } else {
            if let Some(d) = report.diagnostic() {
                self.diagnostics.set(d);
            }
            info!(
                items = total,
                succeeded = report.succeeded(),
                failed = report.failed(),
                "batch finished"
            );
        }
        report
    }

    fn convert_one(&self, input: InputFile, token: &CancelToken) -> BatchItem {
        let InputFile { name, bytes, .. } = input;
        if token.is_cancelled() {
            let result = Err(TranscodeError::Cancelled(name.clone()));
            return BatchItem { name, result };
        }
        let size_before = bytes.len() as u64;
        let result = match transcode(&bytes, &name, &self.policy) {
            Ok(encoded) => {
                drop(bytes);
                let rec =
                    ConversionRecord::from_encoded(&name, size_before, encoded, &self.previews);
                self.store.append(rec.clone());
                Ok(rec)
            }
            Err(e) => {
                warn!(file = %name, error = %e, "conversion failed");
                Err(e)
            }
        };
        BatchItem { name, result }
    }
}

pub struct BatchHandle {
    token: CancelToken,
    join: JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// Items not yet started are skipped; in-flight ones finish.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn join(self) -> Result<BatchReport> {
        self.join
            .join()
            .map_err(|_| std::io::Error::other("batch thread panicked").into())
    }
}
