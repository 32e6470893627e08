use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per employee, so check-in and the close paths for the same person
/// never interleave inside this process.
///
/// Entries leave the cache only through idle expiry, never by size, so a mutex can be
/// replaced only after nobody has touched it for the whole idle window. The idle window
/// must stay well above the longest critical section (config enforces it exceeds the
/// transition deadline). Across processes, UNIQUE(employee_id) on `presensi_open`
/// remains the guarantee.
#[derive(Clone)]
pub struct EmployeeLocks {
    locks: Cache<u64, Arc<Mutex<()>>>,
}

impl EmployeeLocks {
    pub fn new(idle: Duration) -> Self {
        Self {
            locks: Cache::builder().time_to_idle(idle).build(),
        }
    }

    pub async fn acquire(&self, employee_id: u64) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get_with(employee_id, async { Arc::new(Mutex::new(())) })
            .await;
        lock.lock_owned().await
    }
}
