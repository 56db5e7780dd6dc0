use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use crate::Error;
use crate::condition::ConditionExpressionBuilder;
use crate::keys::{PrimaryKey, attr};
use crate::table::backend::{Backend, BatchGetOutput, QueryRequest, TransactEntry, WriteOp};
use crate::table::helpers::batch_processor;
use crate::table::types::{Index, Item, OutputItems, PageToken, QueryOptions};

/// In-process [`Backend`] with the semantics of the single table.
///
/// Items are kept in key order. Queries honour sparse secondary indexes,
/// sort-key ordering, limits applied before filters and resumption tokens;
/// transactions check every guard before applying anything.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: RwLock<BTreeMap<PrimaryKey, Item>>,
}

struct Row<'a> {
    sort: &'a str,
    key: &'a PrimaryKey,
    item: &'a Item,
}

impl Row<'_> {
    fn position(&self) -> (&str, &PrimaryKey) {
        (self.sort, self.key)
    }
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Some(value.as_str()),
        _ => None,
    }
}

fn token_of(index: Option<Index>, row: &Row<'_>) -> PageToken {
    let mut token = row.key.to_item();
    if let Some(index) = index.filter(|index| *index != Index::Table) {
        for name in [index.partition_attr(), index.sort_attr()] {
            if let Some(value) = row.item.get(name) {
                let _ = token.insert(name.to_string(), value.clone());
            }
        }
    }
    PageToken(token)
}

/// Pages through `rows`, already in read order. `index` is `None` for scans,
/// whose rows are ordered by primary key alone.
fn paginate(
    index: Option<Index>,
    rows: Vec<Row<'_>>,
    options: &QueryOptions,
) -> Result<OutputItems, Error> {
    if options.limit == Some(0) {
        return Err(Error::invalid("limit must be at least 1"));
    }

    let begin = match &options.exclusive_start_key {
        None => 0,
        Some(PageToken(token)) => {
            let key = PrimaryKey::from_item(token)?;
            let sort = index
                .and_then(|index| string_attr(token, index.sort_attr()))
                .unwrap_or_default();
            let wanted = if options.scan_index_forward {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            rows.iter()
                .position(|row| row.position().cmp(&(sort, &key)) == wanted)
                .unwrap_or(rows.len())
        }
    };

    let remaining = &rows[begin..];
    let take = options
        .limit
        .map_or(remaining.len(), |limit| usize::from(limit).min(remaining.len()));
    let evaluated = &remaining[..take];

    let items: Vec<Item> = evaluated
        .iter()
        .filter(|row| {
            options
                .filter
                .as_ref()
                .is_none_or(|filter| filter.evaluate(Some(row.item)))
        })
        .map(|row| row.item.clone())
        .collect();

    let last_evaluated_key = match evaluated.last() {
        Some(row) if take < remaining.len() => Some(token_of(index, row)),
        _ => None,
    };

    Ok(OutputItems {
        count: items.len(),
        scanned_count: evaluated.len(),
        items,
        last_evaluated_key,
    })
}

fn reject_key_fields(key: &PrimaryKey, fields: &Item) -> Result<(), Error> {
    if fields.is_empty() {
        return Err(Error::invalid(format!("update of {key} has no fields")));
    }
    if fields.contains_key(attr::PK) || fields.contains_key(attr::SK) {
        return Err(Error::invalid(format!("update of {key} touches key attributes")));
    }
    Ok(())
}

fn merge(existing: Option<&Item>, key: &PrimaryKey, fields: Item) -> Item {
    let mut merged = existing.cloned().unwrap_or_else(|| key.to_item());
    merged.extend(fields);
    merged
}

fn ensure_unique<'a>(keys: impl IntoIterator<Item = &'a PrimaryKey>) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(Error::invalid(format!("duplicate key {key} in one request")));
        }
    }
    Ok(())
}

impl MemoryBackend {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Every item in key order.
    pub async fn snapshot(&self) -> Vec<Item> {
        self.items.read().await.values().cloned().collect()
    }

    /// Drops every item.
    pub async fn clear(&self) {
        self.items.write().await.clear();
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn put_item(&self, item: Item) -> Result<(), Error> {
        let key = PrimaryKey::from_item(&item)?;
        let _ = self.items.write().await.insert(key, item);
        Ok(())
    }

    async fn get_item(&self, key: &PrimaryKey) -> Result<Option<Item>, Error> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn update_item(
        &self,
        key: &PrimaryKey,
        fields: Item,
        condition: Option<&ConditionExpressionBuilder>,
    ) -> Result<Item, Error> {
        reject_key_fields(key, &fields)?;

        let mut items = self.items.write().await;
        let existing = items.get(key);
        if condition.is_some_and(|c| !c.evaluate(existing)) {
            return Err(Error::ConditionFailed(format!("update of {key}")));
        }
        let merged = merge(existing, key, fields);
        let _ = items.insert(key.clone(), merged.clone());
        Ok(merged)
    }

    async fn delete_item(&self, key: &PrimaryKey) -> Result<(), Error> {
        let _ = self.items.write().await.remove(key);
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<OutputItems, Error> {
        let QueryRequest {
            index,
            partition_key,
            sort_key,
            options,
        } = request;

        let items = self.items.read().await;
        let mut rows: Vec<Row<'_>> = items
            .iter()
            .filter_map(|(key, item)| {
                let partition = string_attr(item, index.partition_attr())?;
                let sort = string_attr(item, index.sort_attr())?;
                let selected = partition == partition_key
                    && sort_key.as_ref().is_none_or(|c| c.matches(sort));
                selected.then_some(Row { sort, key, item })
            })
            .collect();

        rows.sort_by(|a, b| a.position().cmp(&b.position()));
        if !options.scan_index_forward {
            rows.reverse();
        }

        paginate(Some(index), rows, &options)
    }

    async fn scan(&self, options: QueryOptions) -> Result<OutputItems, Error> {
        let options = QueryOptions {
            scan_index_forward: true,
            ..options
        };
        let items = self.items.read().await;
        let rows = items
            .iter()
            .map(|(key, item)| Row { sort: "", key, item })
            .collect();
        paginate(None, rows, &options)
    }

    async fn batch_write(&self, requests: Vec<WriteOp>) -> Result<Vec<WriteOp>, Error> {
        if requests.len() > batch_processor::BATCH_WRITE_SIZE {
            return Err(Error::invalid(format!(
                "batch write of {} requests exceeds {}",
                requests.len(),
                batch_processor::BATCH_WRITE_SIZE
            )));
        }
        let keys = requests
            .iter()
            .map(WriteOp::key)
            .collect::<Result<Vec<_>, _>>()?;
        ensure_unique(&keys)?;

        let mut items = self.items.write().await;
        for (key, request) in keys.into_iter().zip(requests) {
            match request {
                WriteOp::Put(item) => {
                    let _ = items.insert(key, item);
                }
                WriteOp::Delete(_) => {
                    let _ = items.remove(&key);
                }
            }
        }
        Ok(Vec::new())
    }

    async fn batch_get(&self, keys: Vec<PrimaryKey>) -> Result<BatchGetOutput, Error> {
        if keys.len() > batch_processor::BATCH_READ_SIZE {
            return Err(Error::invalid(format!(
                "batch get of {} keys exceeds {}",
                keys.len(),
                batch_processor::BATCH_READ_SIZE
            )));
        }
        ensure_unique(&keys)?;

        let items = self.items.read().await;
        Ok(BatchGetOutput {
            items: keys.iter().filter_map(|key| items.get(key).cloned()).collect(),
            unprocessed: Vec::new(),
        })
    }

    async fn transact_write(&self, entries: Vec<TransactEntry>) -> Result<(), Error> {
        if entries.len() > batch_processor::TRANSACT_WRITE_SIZE {
            return Err(Error::invalid(format!(
                "transaction of {} entries exceeds {}",
                entries.len(),
                batch_processor::TRANSACT_WRITE_SIZE
            )));
        }
        let keys = entries
            .iter()
            .map(TransactEntry::key)
            .collect::<Result<Vec<_>, _>>()?;
        ensure_unique(&keys)?;
        for (key, entry) in keys.iter().zip(&entries) {
            if let TransactEntry::Update { fields, .. } = entry {
                reject_key_fields(key, fields)?;
            }
        }

        let mut items = self.items.write().await;
        for (key, entry) in keys.iter().zip(&entries) {
            if entry.condition().is_some_and(|c| !c.evaluate(items.get(key))) {
                return Err(Error::ConditionFailed(format!(
                    "transaction cancelled by the guard on {key}"
                )));
            }
        }

        for (key, entry) in keys.into_iter().zip(entries) {
            match entry {
                TransactEntry::Put { item, .. } => {
                    let _ = items.insert(key, item);
                }
                TransactEntry::Delete { .. } => {
                    let _ = items.remove(&key);
                }
                TransactEntry::Update { fields, .. } => {
                    let merged = merge(items.get(&key), &key, fields);
                    let _ = items.insert(key, merged);
                }
            }
        }
        Ok(())
    }
}
