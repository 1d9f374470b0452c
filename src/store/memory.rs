// src/store/memory.rs
//! In-process store. One `RwLock` guards the map, so an insert, a query and a
//! cleanup never see each other half done.

use chrono::Duration;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{InsertOutcome, RecordStore, StoredRecord, TimeWindow};
use crate::clock::{self, SharedClock};
use crate::error::{PipelineError, Result};

pub struct MemoryStore {
    records: RwLock<HashMap<String, StoredRecord>>,
    clock: SharedClock,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(clock::system())
    }
}

impl MemoryStore {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoredRecord>>> {
        self.records
            .read()
            .map_err(|_| PipelineError::storage("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredRecord>>> {
        self.records
            .write()
            .map_err(|_| PipelineError::storage("memory store lock poisoned"))
    }
}

impl RecordStore for MemoryStore {
    fn insert(&self, record: StoredRecord) -> Result<InsertOutcome> {
        record.validate()?;
        let mut map = self.write()?;
        match map.entry(record.source_id.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::Skipped),
            Entry::Vacant(v) => {
                v.insert(record);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    fn cleanup(&self, retention: Duration) -> Result<usize> {
        let Some(cutoff) = self.clock.now().checked_sub_signed(retention) else {
            return Ok(0);
        };
        let mut map = self.write()?;
        let before = map.len();
        map.retain(|_, r| r.inserted_at >= cutoff);
        Ok(before - map.len())
    }

    fn query(&self, ticker: &str, window: &TimeWindow) -> Result<Vec<StoredRecord>> {
        let map = self.read()?;
        let mut out: Vec<StoredRecord> = map
            .values()
            .filter(|r| r.ticker.eq_ignore_ascii_case(ticker) && window.contains(r.timestamp))
            .cloned()
            .collect();
        drop(map);
        out.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        Ok(out)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
