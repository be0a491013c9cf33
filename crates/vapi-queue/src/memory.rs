//! In-process broker backend.
//!
//! Mirrors the Redis semantics the queue relies on (atomic right-pop, missing
//! keys read as `None`) and adds fault injection so connection-loss paths can
//! be exercised without a real server. Selected with a `memory://` broker URL.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::store::{BrokerConnection, BrokerConnector, StoreError, StoreResult};

#[derive(Default)]
struct Keyspace {
    values: HashMap<String, String>,
    lists: HashMap<String, VecDeque<String>>,
}

#[derive(Default)]
struct Shared {
    keyspace: Mutex<Keyspace>,
    /// Bumped by `sever_connections`; handles from older generations are dead.
    generation: AtomicU64,
    failing_connects: AtomicU32,
    failing_operations: AtomicU32,
    connect_attempts: AtomicU32,
}

/// In-memory broker. Clones share the same keyspace.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` connection attempts fail with a connectivity error.
    pub fn fail_next_connects(&self, n: u32) {
        self.shared.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` commands fail with a connectivity error.
    pub fn fail_next_operations(&self, n: u32) {
        self.shared.failing_operations.store(n, Ordering::SeqCst);
    }

    /// Break every open connection. New connections work normally.
    pub fn sever_connections(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Total connection attempts seen so far, failed ones included.
    pub fn connect_attempts(&self) -> u32 {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }
}

/// Consume one unit from a fault counter, returning true if a fault fires.
fn take_fault(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self) -> StoreResult<Arc<dyn BrokerConnection>> {
        self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if take_fault(&self.shared.failing_connects) {
            return Err(StoreError::connectivity("connection refused (injected)"));
        }
        Ok(Arc::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            generation: self.shared.generation.load(Ordering::SeqCst),
        }))
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

struct MemoryConnection {
    shared: Arc<Shared>,
    generation: u64,
}

impl MemoryConnection {
    fn keyspace(&self) -> StoreResult<MutexGuard<'_, Keyspace>> {
        if self.shared.generation.load(Ordering::SeqCst) != self.generation {
            return Err(StoreError::connectivity("connection reset (injected)"));
        }
        if take_fault(&self.shared.failing_operations) {
            return Err(StoreError::connectivity("broken pipe (injected)"));
        }
        self.shared
            .keyspace
            .lock()
            .map_err(|_| StoreError::command("keyspace lock poisoned"))
    }
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut ks = self.keyspace()?;
        if ks.lists.contains_key(key) {
            return Err(StoreError::command(format!("WRONGTYPE {key} holds a list")));
        }
        ks.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let ks = self.keyspace()?;
        if ks.lists.contains_key(key) {
            return Err(StoreError::command(format!("WRONGTYPE {key} holds a list")));
        }
        Ok(ks.values.get(key).cloned())
    }

    async fn push_left(&self, list: &str, value: &str) -> StoreResult<()> {
        let mut ks = self.keyspace()?;
        if ks.values.contains_key(list) {
            return Err(StoreError::command(format!("WRONGTYPE {list} holds a value")));
        }
        ks.lists
            .entry(list.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn pop_right(&self, list: &str) -> StoreResult<Option<String>> {
        let mut ks = self.keyspace()?;
        let Some(items) = ks.lists.get_mut(list) else {
            return Ok(None);
        };
        let popped = items.pop_back();
        // Redis deletes empty lists
        if items.is_empty() {
            ks.lists.remove(list);
        }
        Ok(popped)
    }

    async fn list_len(&self, list: &str) -> StoreResult<u64> {
        let ks = self.keyspace()?;
        Ok(ks.lists.get(list).map_or(0, |items| items.len() as u64))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let ks = self.keyspace()?;
        let mut keys: Vec<String> = ks
            .values
            .keys()
            .chain(ks.lists.keys())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.keyspace().map(|_| ())
    }
}
