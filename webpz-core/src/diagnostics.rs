use parking_lot::Mutex;

/// What the single user-visible message surface currently shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    BatchFailures {
        failed: usize,
        total: usize,
        /// (input name, reason) per failed item, in submission order.
        reasons: Vec<(String, String)>,
    },
    ArchiveFailed {
        reason: String,
    },
}

impl Diagnostic {
    pub fn message(&self) -> String {
        match self {
            Diagnostic::BatchFailures { failed, total, .. } => {
                format!("{failed} of {total} files could not be converted")
            }
            Diagnostic::ArchiveFailed { reason } => {
                format!("could not build the download archive: {reason}")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticsBoard {
    current: Mutex<Option<Diagnostic>>,
}

impl DiagnosticsBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, d: Diagnostic) {
        *self.current.lock() = Some(d);
    }

    pub fn clear(&self) {
        *self.current.lock() = None;
    }

    pub fn current(&self) -> Option<Diagnostic> {
        self.current.lock().clone()
    }
}
