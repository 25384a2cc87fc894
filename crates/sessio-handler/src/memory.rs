//! In-memory save handler for tests and single-process development setups.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::record::{expiry_cutoff, SessionRecord};
use crate::{Result, SaveHandler};

pub struct MemoryHandler {
    records: RwLock<HashMap<String, SessionRecord>>,
    clock: Arc<dyn Clock>,
}

impl MemoryHandler {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn record(&self, id: &str) -> Option<SessionRecord> {
        self.records.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for MemoryHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveHandler for MemoryHandler {
    fn read(&self, id: &str) -> Result<Vec<u8>> {
        Ok(self
            .records
            .read()
            .get(id)
            .map(|record| record.data.clone())
            .unwrap_or_default())
    }

    fn write(&self, id: &str, data: &[u8]) -> Result<()> {
        let now = self.clock.now();
        let mut records = self.records.write();

        match records.get_mut(id) {
            Some(record) => record.touch(data.to_vec(), now),
            None => {
                records.insert(
                    id.to_string(),
                    SessionRecord::new(id.to_string(), data.to_vec(), now),
                );
            }
        }

        Ok(())
    }

    fn destroy(&self, id: &str) -> Result<()> {
        self.records.write().remove(id);
        Ok(())
    }

    fn gc(&self, lifetime: u64) -> Result<usize> {
        let Some(cutoff) = expiry_cutoff(self.clock.now(), lifetime) else {
            return Ok(0);
        };

        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(cutoff));

        Ok(before - records.len())
    }
}
