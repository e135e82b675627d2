// src/manager/cancel.rs

use std::collections::HashMap;
use std::sync::Mutex;

use crate::task::CancelHandle;
use crate::types::TaskId;

/// Cancel handles by task ID.
#[derive(Debug, Default)]
pub(crate) struct CancelRegistry {
    handles: Mutex<HashMap<TaskId, CancelHandle>>,
}

impl CancelRegistry {
    /// Store `handle`, replacing any previous one for `id`.
    pub fn register(&self, id: TaskId, handle: CancelHandle) {
        self.handles.lock().unwrap().insert(id, handle);
    }

    pub fn get(&self, id: TaskId) -> Option<CancelHandle> {
        self.handles.lock().unwrap().get(&id).cloned()
    }

    pub fn clear(&self, id: TaskId) {
        self.handles.lock().unwrap().remove(&id);
    }

    /// Remove and return every registered handle.
    pub fn drain(&self) -> Vec<(TaskId, CancelHandle)> {
        self.handles.lock().unwrap().drain().collect()
    }
}
