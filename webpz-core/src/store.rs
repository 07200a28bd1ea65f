use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};

use crate::record::ConversionRecord;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    Appended { index: usize, output_name: String },
}

/// Append-only, completion-ordered record list shared by batch workers.
#[derive(Debug, Default)]
pub struct ResultStore {
    records: RwLock<Vec<ConversionRecord>>,
    subscribers: Mutex<Vec<Sender<StoreEvent>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index the record landed at.
    pub fn append(&self, record: ConversionRecord) -> usize {
        let output_name = record.output_name.clone();
        let index = {
            let mut recs = self.records.write();
            recs.push(record);
            recs.len() - 1
        };
        let ev = StoreEvent::Appended { index, output_name };
        self.subscribers
            .lock()
            .retain(|tx| tx.send(ev.clone()).is_ok());
        index
    }

    /// Point-in-time copy; later appends do not show up in it.
    pub fn snapshot(&self) -> Vec<ConversionRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }
}
