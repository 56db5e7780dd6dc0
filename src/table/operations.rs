use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;
use futures_util::{TryStreamExt, stream};
use serde::{Serialize, de::DeserializeOwned};
use serde_dynamo::{from_item, to_attribute_value, to_item};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::instrument;

use crate::Error;
use crate::condition::ConditionExpressionBuilder;
use crate::keys::{PrimaryKey, attr};
use crate::table::backend::{Backend, QueryRequest, TransactEntry};
use crate::table::helpers::batch_processor;
use crate::table::memory::MemoryBackend;
use crate::table::types::{Index, Item, OutputItems, QueryOptions, RetryPolicy, SortKeyCondition};

/// Storage access engine over one table.
///
/// Cheap to clone; every clone shares the same backend. Construct one per
/// process (or per test) and hand clones to services.
///
/// ```rust
/// use single_table_dal::{PrimaryKey, Table};
/// use aws_sdk_dynamodb::types::AttributeValue;
///
/// # async fn example() -> Result<(), single_table_dal::Error> {
/// let table = Table::in_memory();
/// let key = PrimaryKey::new("Customer#1", "Customer#1");
///
/// let mut item = key.to_item();
/// item.insert("firstName".into(), AttributeValue::S("Ada".into()));
/// table.put(item).await?;
///
/// assert!(table.get(&key).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Table {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) retry_policy: RetryPolicy,
}

fn now_attribute() -> Result<AttributeValue, Error> {
    Ok(to_attribute_value(Utc::now())?)
}

impl Table {
    /// Engine over any backend, with the default retry policy.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Engine over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Replaces the batch retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Backend every call goes through.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Policy applied to batch retries.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Insert or replace a full item and return it.
    #[instrument(level = "debug", skip_all)]
    pub async fn put(&self, item: Item) -> Result<Item, Error> {
        let _ = PrimaryKey::from_item(&item)?;
        self.backend.put_item(item.clone()).await?;
        Ok(item)
    }

    /// Serializes a record and puts it.
    pub async fn put_record<T: Serialize>(&self, record: &T) -> Result<(), Error> {
        let _ = self.put(to_item(record)?).await?;
        Ok(())
    }

    /// Strongly consistent point read.
    #[instrument(level = "debug", skip(self), fields(key = %key))]
    pub async fn get(&self, key: &PrimaryKey) -> Result<Option<Item>, Error> {
        self.backend.get_item(key).await
    }

    /// Point read deserialized into `T`.
    pub async fn get_record<T: DeserializeOwned>(
        &self,
        key: &PrimaryKey,
    ) -> Result<Option<T>, Error> {
        self.get(key)
            .await?
            .map(|item| from_item(item).map_err(Error::from))
            .transpose()
    }

    /// Merges `fields` into an existing item and returns the full item after the write.
    ///
    /// `pk` and `sk` are never changed; `updatedAt` is stamped. Fails with
    /// [`Error::NotFound`] when nothing is stored under `key`.
    #[instrument(level = "debug", skip(self, fields), fields(key = %key))]
    pub async fn update(&self, key: &PrimaryKey, fields: Item) -> Result<Item, Error> {
        let mut fields = fields;
        let _ = fields.remove(attr::PK);
        let _ = fields.remove(attr::SK);
        let _ = fields.insert(attr::UPDATED_AT.to_string(), now_attribute()?);

        let guard = ConditionExpressionBuilder::attribute_exists(attr::PK);
        match self.backend.update_item(key, fields, Some(&guard)).await {
            Err(Error::ConditionFailed(_)) => Err(Error::NotFound(key.clone())),
            other => other,
        }
    }

    /// Serializes `changes` as the update fields and decodes the result as `T`.
    pub async fn update_record<U, T>(&self, key: &PrimaryKey, changes: &U) -> Result<T, Error>
    where
        U: Serialize,
        T: DeserializeOwned,
    {
        let updated = self.update(key, to_item(changes)?).await?;
        Ok(from_item(updated)?)
    }

    /// Removes an item. Deleting an absent key succeeds.
    #[instrument(level = "debug", skip(self), fields(key = %key))]
    pub async fn delete(&self, key: &PrimaryKey) -> Result<(), Error> {
        self.backend.delete_item(key).await
    }

    /// One page of any key-conditioned read.
    #[instrument(
        level = "debug",
        skip(self, request),
        fields(index = ?request.index, partition = %request.partition_key)
    )]
    pub async fn query(&self, request: QueryRequest) -> Result<OutputItems, Error> {
        self.backend.query(request).await
    }

    /// One page of a base-table partition.
    pub async fn query_by_partition(
        &self,
        partition_key: &str,
        options: QueryOptions,
    ) -> Result<OutputItems, Error> {
        self.query(QueryRequest::new(Index::Table, partition_key).options(options))
            .await
    }

    /// One page of a base-table partition narrowed by sort key.
    pub async fn query_by_partition_and_sort(
        &self,
        partition_key: &str,
        sort_key: SortKeyCondition,
        options: QueryOptions,
    ) -> Result<OutputItems, Error> {
        let request = QueryRequest::new(Index::Table, partition_key)
            .sort_key(sort_key)
            .options(options);
        self.query(request).await
    }

    /// Every item matching `request`, following page tokens until exhausted.
    ///
    /// The request's own limit becomes the page size.
    pub fn query_stream(
        &self,
        request: QueryRequest,
    ) -> impl Stream<Item = Result<Item, Error>> + Send + 'static {
        let backend = Arc::clone(&self.backend);
        stream::try_unfold(Some(request), move |next| {
            let backend = Arc::clone(&backend);
            async move {
                let Some(request) = next else {
                    return Ok::<_, Error>(None);
                };
                let page = backend.query(request.clone()).await?;
                let following = page.last_evaluated_key.map(|token| {
                    let mut request = request;
                    request.options.exclusive_start_key = Some(token);
                    request
                });
                Ok(Some((page.items, following)))
            }
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<Item, Error>)))
        .try_flatten()
    }

    /// Collects [`Table::query_stream`].
    pub async fn query_all(&self, request: QueryRequest) -> Result<Vec<Item>, Error> {
        self.query_stream(request).try_collect().await
    }

    /// One page of a full-table read.
    #[instrument(level = "debug", skip_all)]
    pub async fn scan(&self, options: QueryOptions) -> Result<OutputItems, Error> {
        self.backend.scan(options).await
    }

    /// Applies up to 25 entries atomically; all or nothing.
    ///
    /// More than 25 entries is rejected, never split. An empty list is a no-op.
    /// Update entries get `updatedAt` stamped.
    #[instrument(level = "debug", skip_all, fields(entries = entries.len()))]
    pub async fn transact_write(&self, entries: Vec<TransactEntry>) -> Result<(), Error> {
        if entries.is_empty() {
            return Ok(());
        }
        if entries.len() > batch_processor::TRANSACT_WRITE_SIZE {
            return Err(Error::invalid(format!(
                "transaction of {} entries exceeds the limit of {}",
                entries.len(),
                batch_processor::TRANSACT_WRITE_SIZE
            )));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            let key = entry.key()?;
            if let TransactEntry::Update { fields, .. } = entry {
                if fields.is_empty() {
                    return Err(Error::invalid(format!("update of {key} has no fields")));
                }
            }
            if !seen.insert(key.clone()) {
                return Err(Error::invalid(format!("{key} appears twice in one transaction")));
            }
        }

        let mut entries = entries;
        for entry in &mut entries {
            if let TransactEntry::Update { fields, .. } = entry {
                let _ = fields.insert(attr::UPDATED_AT.to_string(), now_attribute()?);
            }
        }
        self.backend.transact_write(entries).await
    }
}
