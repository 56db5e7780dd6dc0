use aws_sdk_dynamodb::types::AttributeValue;
use serde::de::DeserializeOwned;
use serde_dynamo::from_items;
use std::{collections::HashMap, time::Duration};

use crate::Error;
use crate::condition::ConditionExpressionBuilder;
use crate::keys::attr;
use crate::table::helpers::retry_config;

/// Raw attribute map as stored in the table.
pub type Item = HashMap<String, AttributeValue>;

/// Opaque resumption point returned by a query or scan page.
///
/// Pass it back through [`QueryOptions::start_from`] to fetch the next page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageToken(pub(crate) Item);

impl PageToken {
    /// The underlying last-evaluated key, for callers that persist tokens.
    pub fn into_inner(self) -> Item {
        self.0
    }

    /// Rebuilds a token from a persisted key map.
    pub fn from_inner(key: Item) -> Self {
        Self(key)
    }
}

/// One page of query or scan results.
#[must_use = "query results should be used or you'll lose the fetched data"]
#[derive(Clone, Debug)]
pub struct OutputItems<T = Item> {
    /// Items that passed the filter
    pub items: Vec<T>,
    /// Number of items returned
    pub count: usize,
    /// Number of items evaluated before filtering
    pub scanned_count: usize,
    /// Present when more results may follow
    pub last_evaluated_key: Option<PageToken>,
}

impl<T> Default for OutputItems<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            scanned_count: 0,
            last_evaluated_key: None,
        }
    }
}

impl<T> OutputItems<T> {
    /// Token for the next page, if any.
    pub fn next_page(&self) -> Option<&PageToken> {
        self.last_evaluated_key.as_ref()
    }

    /// True when no further page exists.
    pub fn is_last_page(&self) -> bool {
        self.last_evaluated_key.is_none()
    }
}

impl OutputItems<Item> {
    /// Deserializes every item into `T`, keeping paging metadata.
    pub fn decode<T: DeserializeOwned>(self) -> Result<OutputItems<T>, Error> {
        Ok(OutputItems {
            items: from_items(self.items)?,
            count: self.count,
            scanned_count: self.scanned_count,
            last_evaluated_key: self.last_evaluated_key,
        })
    }
}

/// Condition on the sort key of a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortKeyCondition {
    /// `sk = value`
    Equals(String),
    /// `begins_with(sk, prefix)`
    BeginsWith(String),
    /// `sk BETWEEN low AND high`, inclusive
    Between(String, String),
    /// `sk < value`
    LessThan(String),
    /// `sk <= value`
    LessThanOrEqual(String),
    /// `sk > value`
    GreaterThan(String),
    /// `sk >= value`
    GreaterThanOrEqual(String),
}

impl SortKeyCondition {
    /// Evaluates the condition against a sort key value.
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            SortKeyCondition::Equals(v) => sort_key == v,
            SortKeyCondition::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
            SortKeyCondition::Between(low, high) => {
                sort_key >= low.as_str() && sort_key <= high.as_str()
            }
            SortKeyCondition::LessThan(v) => sort_key < v.as_str(),
            SortKeyCondition::LessThanOrEqual(v) => sort_key <= v.as_str(),
            SortKeyCondition::GreaterThan(v) => sort_key > v.as_str(),
            SortKeyCondition::GreaterThanOrEqual(v) => sort_key >= v.as_str(),
        }
    }
}

/// Index a query runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Index {
    /// Base table keyed by `pk`/`sk`
    Table,
    /// `GSI1` keyed by `gsi1pk`/`gsi1sk`
    Gsi1,
    /// `GSI2` keyed by `gsi2pk`/`gsi2sk`
    Gsi2,
}

impl Index {
    /// Name sent as `IndexName`; `None` for the base table.
    pub const fn index_name(&self) -> Option<&'static str> {
        match self {
            Index::Table => None,
            Index::Gsi1 => Some("GSI1"),
            Index::Gsi2 => Some("GSI2"),
        }
    }

    /// Partition key attribute.
    pub const fn partition_attr(&self) -> &'static str {
        match self {
            Index::Table => attr::PK,
            Index::Gsi1 => attr::GSI1PK,
            Index::Gsi2 => attr::GSI2PK,
        }
    }

    /// Sort key attribute.
    pub const fn sort_attr(&self) -> &'static str {
        match self {
            Index::Table => attr::SK,
            Index::Gsi1 => attr::GSI1SK,
            Index::Gsi2 => attr::GSI2SK,
        }
    }
}

/// Paging, ordering and filtering for queries and scans.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOptions {
    /// Maximum number of items evaluated per page (before filtering)
    pub limit: Option<u16>,
    /// Resume after this key
    pub exclusive_start_key: Option<PageToken>,
    /// Ascending sort-key order; ignored by scans
    pub scan_index_forward: bool,
    /// Post-read filter; it never reduces what counts towards `limit`
    pub filter: Option<ConditionExpressionBuilder>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: None,
            exclusive_start_key: None,
            scan_index_forward: true,
            filter: None,
        }
    }
}

impl QueryOptions {
    /// Sets the page size.
    pub fn limit(mut self, limit: u16) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Descending sort-key order.
    pub fn descending(mut self) -> Self {
        self.scan_index_forward = false;
        self
    }

    /// Resumes from a previous page.
    pub fn start_from(mut self, token: PageToken) -> Self {
        self.exclusive_start_key = Some(token);
        self
    }

    /// Applies a filter after the key condition.
    pub fn filter(mut self, filter: ConditionExpressionBuilder) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Bounded retry with exponential backoff for batch calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total sends per chunk, first attempt included
    pub max_attempts: usize,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Growth factor between retries
    pub multiplier: u32,
    /// Upper bound of a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            multiplier: 2,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Same attempt bound, no waiting. Intended for tests.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: usize) -> Duration {
        retry_config::retry_delay(retry, self.base_delay, self.multiplier, self.max_delay)
    }
}
