use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// ProjectLocks hands out one async mutex per project id.
///
/// Holding the guard grants exclusive access to the project's model
/// read-modify-write. Different projects never contend.
#[derive(Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of `project_id`.
    pub async fn lock(&self, project_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("lock poisoned");
            Arc::clone(locks.entry(project_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
