//! Concurrency-safe keyed table of tasks.
//!
//! Used twice per executor: once as the handler registry (keyed by handler
//! name) and once as the set of running instances (keyed by job id).

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::Task;

/// Key of a running task in the table.
pub fn job_key(job_id: i64) -> String {
    job_id.to_string()
}

#[derive(Debug, Default)]
pub struct TaskTable {
    data: RwLock<HashMap<String, Task>>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-written, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Task>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Task>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Task> {
        self.read().get(key).cloned()
    }

    /// Insert or overwrite, returning the previous entry.
    pub fn set(&self, key: impl Into<String>, task: Task) -> Option<Task> {
        self.write().insert(key.into(), task)
    }

    /// Remove an entry; no-op if absent.
    pub fn delete(&self, key: &str) -> Option<Task> {
        self.write().remove(key)
    }

    /// Remove the entry only when `pred` accepts it, in one write section.
    pub fn delete_if(&self, key: &str, pred: impl FnOnce(&Task) -> bool) -> Option<Task> {
        let mut data = self.write();
        if data.get(key).is_some_and(pred) {
            data.remove(key)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::handler_fn;
    use jobwire_core::RunRequest;
    use std::sync::Arc;

    fn task(id: i64, instance: u64) -> Task {
        Task::template("demoJob", handler_fn(|_ctx| async { Ok(String::new()) }))
            .bind(RunRequest::new(id, "demoJob"), instance)
            .unwrap()
    }

    #[test]
    fn set_get_delete() {
        let table = TaskTable::new();
        assert!(!table.exists("1"));
        assert!(table.get("1").is_none());

        assert!(table.set(job_key(1), task(1, 1)).is_none());
        assert!(table.exists("1"));
        assert_eq!(table.get("1").unwrap().instance(), 1);

        let previous = table.set(job_key(1), task(1, 2)).unwrap();
        assert_eq!(previous.instance(), 1);
        assert_eq!(table.len(), 1);

        assert!(table.delete("1").is_some());
        assert!(table.delete("1").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn delete_if_checks_predicate() {
        let table = TaskTable::new();
        table.set(job_key(5), task(5, 7));

        assert!(table.delete_if("5", |t| t.instance() == 6).is_none());
        assert!(table.exists("5"));
        assert!(table.delete_if("5", |t| t.instance() == 7).is_some());
        assert!(!table.exists("5"));
        assert!(table.delete_if("5", |_| true).is_none());
    }

    #[test]
    fn writes_are_visible_across_threads() {
        let table = Arc::new(TaskTable::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    table.set(job_key(i), task(i, 1));
                    assert!(table.exists(&job_key(i)));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.len(), 8);
        assert_eq!(table.keys()[0], "0");
    }
}
