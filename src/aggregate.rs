//! Writes of a parent item together with its children.
//!
//! Up to 25 items go through one transaction and are all-or-nothing. Larger
//! aggregates cannot be atomic: the parent is written first under a
//! not-exists guard, children follow in batches, and on failure every step
//! already taken is undone in reverse order before the error is returned as
//! [`Error::AggregateWrite`].

use std::collections::HashSet;
use tracing::{error, info, instrument, warn};

use crate::Error;
use crate::condition::ConditionExpressionBuilder;
use crate::error::{AggregateOperation, AggregateWriteFailure};
use crate::keys::{EntityType, PrimaryKey, attr};
use crate::table::helpers::batch_processor;
use crate::table::{Index, Item, QueryRequest, Table, TransactEntry};

/// How an aggregate write was carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStrategy {
    /// One all-or-nothing transaction
    Transactional,
    /// Parent first, children in batches, compensated on failure
    Compensating,
}

impl WriteStrategy {
    /// Strategy used for a parent with `children` children.
    pub fn for_children(children: usize) -> Self {
        // The parent takes one of the transaction slots.
        if children < batch_processor::TRANSACT_WRITE_SIZE {
            WriteStrategy::Transactional
        } else {
            WriteStrategy::Compensating
        }
    }
}

/// Parent and children as read back through GSI1.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregate {
    /// The parent item
    pub parent: Item,
    /// Every other item sharing the parent's GSI1 partition
    pub children: Vec<Item>,
}

#[derive(Debug)]
enum Undo {
    DeleteParent(PrimaryKey),
    DeleteChildren(Vec<PrimaryKey>),
}

/// Guard making a put fail when the key is already taken.
fn not_exists_guard() -> ConditionExpressionBuilder {
    ConditionExpressionBuilder::new()
        .attr(attr::PK)
        .not_exists()
        .attr(attr::SK)
        .not_exists()
}

fn distinct_keys<'a>(keys: impl IntoIterator<Item = &'a PrimaryKey>) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(Error::invalid(format!("{key} appears twice in one aggregate")));
        }
    }
    Ok(())
}

/// Orchestrates parent + children writes over a [`Table`].
#[derive(Clone, Debug)]
pub struct AggregateWriter {
    table: Table,
}

impl AggregateWriter {
    /// Orchestrator over `table`.
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    /// The underlying engine.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Writes a new parent and its children.
    ///
    /// Fails with [`Error::ConditionFailed`] and writes nothing if the parent
    /// key is taken. On the compensating path any later failure returns
    /// [`Error::AggregateWrite`] after the undo steps ran.
    #[instrument(level = "debug", skip_all, fields(children = children.len()))]
    pub async fn create(&self, parent: Item, children: Vec<Item>) -> Result<WriteStrategy, Error> {
        let parent_key = PrimaryKey::from_item(&parent)?;
        let child_keys = children
            .iter()
            .map(PrimaryKey::from_item)
            .collect::<Result<Vec<_>, _>>()?;
        distinct_keys(std::iter::once(&parent_key).chain(&child_keys))?;

        let strategy = WriteStrategy::for_children(children.len());
        match strategy {
            WriteStrategy::Transactional => {
                let entries = std::iter::once(TransactEntry::put_if(parent, not_exists_guard()))
                    .chain(children.into_iter().map(TransactEntry::put))
                    .collect();
                self.table.transact_write(entries).await?;
            }
            WriteStrategy::Compensating => {
                self.create_compensating(parent_key, parent, children, child_keys)
                    .await?;
            }
        }
        Ok(strategy)
    }

    async fn create_compensating(
        &self,
        parent_key: PrimaryKey,
        parent: Item,
        children: Vec<Item>,
        child_keys: Vec<PrimaryKey>,
    ) -> Result<(), Error> {
        // Nothing has been written if the guarded parent put fails.
        self.table
            .transact_write(vec![TransactEntry::put_if(parent, not_exists_guard())])
            .await?;
        let mut undo = vec![Undo::DeleteParent(parent_key.clone())];

        let size = batch_processor::BATCH_WRITE_SIZE;
        for (chunk, keys) in children.chunks(size).zip(child_keys.chunks(size)) {
            undo.push(Undo::DeleteChildren(keys.to_vec()));
            if let Err(source) = self.table.batch_write(chunk.to_vec(), Vec::new()).await {
                return Err(self.compensate(parent_key, source, undo).await);
            }
        }
        Ok(())
    }

    async fn compensate(&self, parent: PrimaryKey, source: Error, undo: Vec<Undo>) -> Error {
        let mut cleanup_errors = Vec::new();
        for step in undo.into_iter().rev() {
            let result = match &step {
                Undo::DeleteChildren(keys) => self
                    .table
                    .batch_write(Vec::new(), keys.clone())
                    .await
                    .map(|_| ()),
                Undo::DeleteParent(key) => self.table.delete(key).await,
            };
            if let Err(err) = result {
                warn!(step = ?step, error = %err, "compensating delete failed");
                cleanup_errors.push(err);
            }
        }

        error!(
            parent = %parent,
            error = %source,
            cleanup_errors = cleanup_errors.len(),
            "aggregate create failed, partial write compensated"
        );
        Error::AggregateWrite(Box::new(AggregateWriteFailure {
            operation: AggregateOperation::Create,
            parent,
            source,
            cleanup_attempted: true,
            cleanup_errors,
        }))
    }

    /// Removes a parent and its children.
    ///
    /// Up to 25 keys are removed in one transaction. Beyond that children are
    /// batch-deleted first and the parent last; a failure part way returns
    /// [`Error::AggregateWrite`] without compensation.
    #[instrument(level = "debug", skip_all, fields(parent = %parent, children = children.len()))]
    pub async fn delete(
        &self,
        parent: PrimaryKey,
        children: Vec<PrimaryKey>,
    ) -> Result<WriteStrategy, Error> {
        distinct_keys(std::iter::once(&parent).chain(&children))?;

        let strategy = WriteStrategy::for_children(children.len());
        match strategy {
            WriteStrategy::Transactional => {
                let entries = children
                    .into_iter()
                    .chain(std::iter::once(parent))
                    .map(TransactEntry::delete)
                    .collect();
                self.table.transact_write(entries).await?;
            }
            WriteStrategy::Compensating => {
                let result = match self.table.batch_write(Vec::new(), children).await {
                    Ok(_) => self.table.delete(&parent).await,
                    Err(err) => Err(err),
                };
                if let Err(source) = result {
                    error!(parent = %parent, error = %source, "aggregate delete left a partial state");
                    return Err(Error::AggregateWrite(Box::new(AggregateWriteFailure {
                        operation: AggregateOperation::Delete,
                        parent,
                        source,
                        cleanup_attempted: false,
                        cleanup_errors: Vec::new(),
                    })));
                }
            }
        }
        Ok(strategy)
    }

    /// Reads a GSI1 partition and splits it into the parent and its children.
    ///
    /// Children are the items of `parent_type`'s child type. Anything else in
    /// the partition is skipped. Returns `None` when no item of `parent_type`
    /// is in the partition.
    #[instrument(level = "debug", skip(self))]
    pub async fn load(
        &self,
        gsi1_partition: &str,
        parent_type: EntityType,
    ) -> Result<Option<Aggregate>, Error> {
        let items = self
            .table
            .query_all(QueryRequest::new(Index::Gsi1, gsi1_partition))
            .await?;

        let child_type = parent_type.child_type();
        let mut parent = None;
        let mut children = Vec::with_capacity(items.len());
        for item in items {
            let found = EntityType::of_item(&item).ok();
            if parent.is_none() && found == Some(parent_type) {
                parent = Some(item);
            } else if found.is_some() && found == child_type {
                children.push(item);
            } else {
                warn!(
                    partition = gsi1_partition,
                    entity_type = ?found,
                    "skipping foreign item in aggregate partition"
                );
            }
        }

        Ok(parent.map(|parent| Aggregate { parent, children }))
    }

    /// Loads the aggregate in `gsi1_partition` and deletes it.
    ///
    /// Returns `None` when there was nothing to delete.
    pub async fn delete_loaded(
        &self,
        gsi1_partition: &str,
        parent_type: EntityType,
    ) -> Result<Option<WriteStrategy>, Error> {
        let Some(aggregate) = self.load(gsi1_partition, parent_type).await? else {
            return Ok(None);
        };
        let parent = PrimaryKey::from_item(&aggregate.parent)?;
        let children = aggregate
            .children
            .iter()
            .map(PrimaryKey::from_item)
            .collect::<Result<Vec<_>, _>>()?;

        let strategy = self.delete(parent, children).await?;
        info!(partition = gsi1_partition, ?strategy, "aggregate deleted");
        Ok(Some(strategy))
    }
}
