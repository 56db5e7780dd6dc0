#![allow(dead_code)]

/// Test helpers and fixtures for storage integration tests
///
/// Tests run against the in-process backend. [`SpyBackend`] wraps it to record
/// every store call and to inject unprocessed batch requests and failures.
pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{item, new_customer, new_order, new_product, new_review};

use async_trait::async_trait;
use single_table_dal::table::{BatchGetOutput, WriteOp};
use single_table_dal::{
    Backend, ConditionExpressionBuilder, Error, Item, MemoryBackend, OutputItems, PrimaryKey,
    QueryOptions, QueryRequest, RetryPolicy, Table, TransactEntry,
};
use std::sync::{Arc, Mutex, Once};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (idempotent)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Generate a unique, time-ordered identifier
pub fn unique_id() -> String {
    rusty_ulid::generate_ulid_string()
}

/// Engine over a fresh in-memory table that retries without waiting
pub fn memory_table() -> Table {
    Table::in_memory().with_retry_policy(RetryPolicy::immediate())
}

/// Engine over a spy, returned together with the spy
pub fn spy_table(faults: Faults) -> (Table, Arc<SpyBackend>) {
    let spy = Arc::new(SpyBackend::new(faults));
    let table = Table::new(spy.clone()).with_retry_policy(RetryPolicy::immediate());
    (table, spy)
}

/// One store call seen by the spy
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Put,
    Get,
    Update,
    Delete,
    Query,
    Scan,
    /// Number of requests sent
    BatchWrite(usize),
    /// Number of keys sent
    BatchGet(usize),
    /// Number of entries sent
    Transact(usize),
}

/// Faults the spy injects
#[derive(Clone, Debug, Default)]
pub struct Faults {
    /// The first N batch writes only apply the first half of their requests
    pub unprocessed_write_rounds: usize,
    /// Every batch write leaves its second half unprocessed
    pub always_unprocessed: bool,
    /// The first N batch gets only return the first half of their keys
    pub unprocessed_get_rounds: usize,
    /// The batch write call with this 1-based number fails outright
    pub fail_batch_write_call: Option<usize>,
    /// Deletes (single and batched) fail
    pub fail_deletes: bool,
}

/// Recording, fault-injecting wrapper around [`MemoryBackend`]
#[derive(Debug)]
pub struct SpyBackend {
    pub inner: MemoryBackend,
    calls: Mutex<Vec<Call>>,
    faults: Mutex<Faults>,
}

impl SpyBackend {
    pub fn new(faults: Faults) -> Self {
        Self {
            inner: MemoryBackend::new(),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(faults),
        }
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Batch write calls recorded so far
    pub fn batch_write_calls(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::BatchWrite(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Batch get calls recorded so far
    pub fn batch_get_calls(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::BatchGet(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Replaces the injected faults
    pub fn set_faults(&self, faults: Faults) {
        *self.faults.lock().unwrap() = faults;
    }

    fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        calls.len()
    }

    fn injected(message: &str) -> Error {
        Error::InvalidRequest(format!("injected: {message}"))
    }
}

#[async_trait]
impl Backend for SpyBackend {
    async fn put_item(&self, item: Item) -> Result<(), Error> {
        let _ = self.record(Call::Put);
        self.inner.put_item(item).await
    }

    async fn get_item(&self, key: &PrimaryKey) -> Result<Option<Item>, Error> {
        let _ = self.record(Call::Get);
        self.inner.get_item(key).await
    }

    async fn update_item(
        &self,
        key: &PrimaryKey,
        fields: Item,
        condition: Option<&ConditionExpressionBuilder>,
    ) -> Result<Item, Error> {
        let _ = self.record(Call::Update);
        self.inner.update_item(key, fields, condition).await
    }

    async fn delete_item(&self, key: &PrimaryKey) -> Result<(), Error> {
        let _ = self.record(Call::Delete);
        if self.faults.lock().unwrap().fail_deletes {
            return Err(Self::injected("delete"));
        }
        self.inner.delete_item(key).await
    }

    async fn query(&self, request: QueryRequest) -> Result<OutputItems, Error> {
        let _ = self.record(Call::Query);
        self.inner.query(request).await
    }

    async fn scan(&self, options: QueryOptions) -> Result<OutputItems, Error> {
        let _ = self.record(Call::Scan);
        self.inner.scan(options).await
    }

    async fn batch_write(&self, requests: Vec<WriteOp>) -> Result<Vec<WriteOp>, Error> {
        let call = self
            .batch_write_calls()
            .len()
            + 1;
        let _ = self.record(Call::BatchWrite(requests.len()));

        let partial = {
            let mut faults = self.faults.lock().unwrap();
            if faults.fail_batch_write_call == Some(call) {
                return Err(Self::injected("batch write"));
            }
            let has_delete = requests.iter().any(|r| matches!(r, WriteOp::Delete(_)));
            if faults.fail_deletes && has_delete {
                return Err(Self::injected("batch delete"));
            }
            if faults.unprocessed_write_rounds > 0 {
                faults.unprocessed_write_rounds -= 1;
                true
            } else {
                faults.always_unprocessed
            }
        };

        let mut requests = requests;
        let unprocessed = if partial {
            requests.split_off(requests.len() / 2)
        } else {
            Vec::new()
        };
        let rejected = self.inner.batch_write(requests).await?;
        assert!(rejected.is_empty());
        Ok(unprocessed)
    }

    async fn batch_get(&self, keys: Vec<PrimaryKey>) -> Result<BatchGetOutput, Error> {
        let _ = self.record(Call::BatchGet(keys.len()));

        let partial = {
            let mut faults = self.faults.lock().unwrap();
            let partial = faults.unprocessed_get_rounds > 0;
            if partial {
                faults.unprocessed_get_rounds -= 1;
            }
            partial
        };

        let mut keys = keys;
        let unprocessed = if partial {
            keys.split_off(keys.len() / 2)
        } else {
            Vec::new()
        };
        let mut output = self.inner.batch_get(keys).await?;
        output.unprocessed.extend(unprocessed);
        Ok(output)
    }

    async fn transact_write(&self, entries: Vec<TransactEntry>) -> Result<(), Error> {
        let _ = self.record(Call::Transact(entries.len()));
        self.inner.transact_write(entries).await
    }
}
