use async_trait::async_trait;
use std::fmt;

use crate::Error;
use crate::condition::ConditionExpressionBuilder;
use crate::keys::PrimaryKey;
use crate::table::types::{Index, Item, OutputItems, QueryOptions, SortKeyCondition};

/// One request of a batch write.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    /// Insert or replace an item
    Put(Item),
    /// Remove an item by key
    Delete(PrimaryKey),
}

impl WriteOp {
    /// Key targeted by the request.
    pub fn key(&self) -> Result<PrimaryKey, Error> {
        match self {
            WriteOp::Put(item) => PrimaryKey::from_item(item),
            WriteOp::Delete(key) => Ok(key.clone()),
        }
    }
}

/// One entry of an atomic multi-item write.
#[derive(Clone, Debug, PartialEq)]
pub enum TransactEntry {
    /// Put an item, optionally guarded
    Put {
        /// Full item including `pk`/`sk`
        item: Item,
        /// Guard evaluated against the current item
        condition: Option<ConditionExpressionBuilder>,
    },
    /// Delete an item, optionally guarded
    Delete {
        /// Target key
        key: PrimaryKey,
        /// Guard evaluated against the current item
        condition: Option<ConditionExpressionBuilder>,
    },
    /// Merge attributes into an item, optionally guarded
    Update {
        /// Target key
        key: PrimaryKey,
        /// Attributes to set; must not be empty
        fields: Item,
        /// Guard evaluated against the current item
        condition: Option<ConditionExpressionBuilder>,
    },
}

impl TransactEntry {
    /// Unconditional put.
    pub fn put(item: Item) -> Self {
        TransactEntry::Put {
            item,
            condition: None,
        }
    }

    /// Guarded put.
    pub fn put_if(item: Item, condition: ConditionExpressionBuilder) -> Self {
        TransactEntry::Put {
            item,
            condition: Some(condition),
        }
    }

    /// Unconditional delete.
    pub fn delete(key: PrimaryKey) -> Self {
        TransactEntry::Delete {
            key,
            condition: None,
        }
    }

    /// Unconditional attribute merge.
    pub fn update(key: PrimaryKey, fields: Item) -> Self {
        TransactEntry::Update {
            key,
            fields,
            condition: None,
        }
    }

    /// Replaces the guard of any entry kind.
    pub fn with_condition(mut self, guard: ConditionExpressionBuilder) -> Self {
        match &mut self {
            TransactEntry::Put { condition, .. }
            | TransactEntry::Delete { condition, .. }
            | TransactEntry::Update { condition, .. } => *condition = Some(guard),
        }
        self
    }

    /// Key targeted by the entry.
    pub fn key(&self) -> Result<PrimaryKey, Error> {
        match self {
            TransactEntry::Put { item, .. } => PrimaryKey::from_item(item),
            TransactEntry::Delete { key, .. } | TransactEntry::Update { key, .. } => {
                Ok(key.clone())
            }
        }
    }

    /// Guard of the entry, if any.
    pub fn condition(&self) -> Option<&ConditionExpressionBuilder> {
        match self {
            TransactEntry::Put { condition, .. }
            | TransactEntry::Delete { condition, .. }
            | TransactEntry::Update { condition, .. } => condition.as_ref(),
        }
    }
}

/// Key-conditioned read against one index.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryRequest {
    /// Index to read
    pub index: Index,
    /// Partition value of that index
    pub partition_key: String,
    /// Optional sort-key narrowing
    pub sort_key: Option<SortKeyCondition>,
    /// Paging, ordering and filtering
    pub options: QueryOptions,
}

impl QueryRequest {
    /// Query of one partition of `index`.
    pub fn new(index: Index, partition_key: impl Into<String>) -> Self {
        Self {
            index,
            partition_key: partition_key.into(),
            sort_key: None,
            options: QueryOptions::default(),
        }
    }

    /// Narrows by sort key.
    pub fn sort_key(mut self, condition: SortKeyCondition) -> Self {
        self.sort_key = Some(condition);
        self
    }

    /// Replaces the options.
    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Result of one batch read call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchGetOutput {
    /// Items found, in no particular order
    pub items: Vec<Item>,
    /// Keys the store did not get to
    pub unprocessed: Vec<PrimaryKey>,
}

/// Minimal store contract the engine is written against.
///
/// Implementations send exactly one request per call. Chunking, retries and
/// input normalisation happen above this trait, so a backend may reject
/// batches larger than the store limits with [`Error::InvalidRequest`].
#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Insert or replace a full item.
    async fn put_item(&self, item: Item) -> Result<(), Error>;

    /// Strongly consistent point read.
    async fn get_item(&self, key: &PrimaryKey) -> Result<Option<Item>, Error>;

    /// Merge `fields` into the item at `key` and return the item after the write.
    ///
    /// A failing guard is reported as [`Error::ConditionFailed`].
    async fn update_item(
        &self,
        key: &PrimaryKey,
        fields: Item,
        condition: Option<&ConditionExpressionBuilder>,
    ) -> Result<Item, Error>;

    /// Remove the item at `key`; absent keys are not an error.
    async fn delete_item(&self, key: &PrimaryKey) -> Result<(), Error>;

    /// One page of a key-conditioned read.
    async fn query(&self, request: QueryRequest) -> Result<OutputItems, Error>;

    /// One page of a full-table read.
    async fn scan(&self, options: QueryOptions) -> Result<OutputItems, Error>;

    /// Apply up to 25 writes and return those the store did not process.
    async fn batch_write(&self, requests: Vec<WriteOp>) -> Result<Vec<WriteOp>, Error>;

    /// Read up to 100 distinct keys.
    async fn batch_get(&self, keys: Vec<PrimaryKey>) -> Result<BatchGetOutput, Error>;

    /// Apply up to 25 entries atomically.
    ///
    /// When any guard fails nothing is written and the call returns
    /// [`Error::ConditionFailed`].
    async fn transact_write(&self, entries: Vec<TransactEntry>) -> Result<(), Error>;
}
