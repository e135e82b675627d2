// src/sequence/memory.rs

use std::sync::{Arc, Mutex};

use super::store::{SequenceStore, StoreFuture};
use crate::errors::StoreError;

#[derive(Debug, Default)]
struct MemoryState {
    table_exists: bool,
    value: Option<u64>,
    outage: bool,
    ensure_calls: usize,
    update_calls: usize,
}

/// In-process sequence store.
///
/// Clones share state, so handing clones to several allocators simulates
/// cooperating instances. `set_outage` and `without_table` simulate the two
/// failure classes the allocator distinguishes.
#[derive(Debug, Clone)]
pub struct MemorySequenceStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySequenceStore {
    /// A store whose table exists and already holds `value`.
    pub fn with_value(value: u64) -> Self {
        let state = MemoryState {
            table_exists: true,
            value: Some(value),
            ..MemoryState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A store whose table has not been provisioned yet.
    pub fn without_table() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    pub fn set_outage(&self, outage: bool) {
        self.state.lock().unwrap().outage = outage;
    }

    pub fn value(&self) -> Option<u64> {
        self.state.lock().unwrap().value
    }

    pub fn table_exists(&self) -> bool {
        self.state.lock().unwrap().table_exists
    }

    pub fn ensure_calls(&self) -> usize {
        self.state.lock().unwrap().ensure_calls
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().unwrap().update_calls
    }
}

impl SequenceStore for MemorySequenceStore {
    fn get_sequence(&self) -> StoreFuture<'_, u64> {
        let result = {
            let state = self.state.lock().unwrap();
            if state.outage {
                Err(StoreError::Unavailable("simulated outage".to_string()))
            } else if !state.table_exists {
                Err(StoreError::NotFound)
            } else {
                state
                    .value
                    .ok_or_else(|| StoreError::Corrupt("sequence item is absent".to_string()))
            }
        };
        Box::pin(async move { result })
    }

    fn update_sequence(&self, value: u64) -> StoreFuture<'_, ()> {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.update_calls += 1;
            if state.outage {
                Err(StoreError::Unavailable("simulated outage".to_string()))
            } else if !state.table_exists {
                Err(StoreError::NotFound)
            } else {
                state.value = Some(value);
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn ensure_sequence_table(&self) -> StoreFuture<'_, ()> {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.ensure_calls += 1;
            if state.outage {
                Err(StoreError::Unavailable("simulated outage".to_string()))
            } else {
                state.table_exists = true;
                Ok(())
            }
        };
        Box::pin(async move { result })
    }
}
