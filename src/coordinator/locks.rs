//! Per-name locks
//!
//! Optional mutual exclusion for PUT and RM on the same file name. When
//! disabled, operations run unlocked and the last writer wins.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

pub struct NameLocks {
    enabled: bool,
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` while holding the lock for `name`
    pub fn with<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        if !self.enabled {
            return f();
        }

        let slot = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(name.to_string()).or_default())
        };

        let result = {
            let _held = slot.lock();
            f()
        };

        // Entries are cloned only under the table lock, so a count of 2
        // (table + this call) means nobody else is waiting.
        let mut table = self.table.lock();
        if table.get(name).is_some_and(|e| Arc::strong_count(e) <= 2) {
            table.remove(name);
        }
        result
    }

    /// Names currently tracked
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
