use serde::de::DeserializeOwned;
use serde_dynamo::from_items;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument};

use crate::Error;
use crate::error::PartialBatchFailure;
use crate::keys::PrimaryKey;
use crate::table::Table;
use crate::table::backend::WriteOp;
use crate::table::helpers::batch_processor;
use crate::table::types::Item;

/// Summary of a completed batch write
///
/// Only produced when every request was applied; a batch that runs out of
/// retries fails with [`Error::PartialBatch`] instead.
#[must_use = "batch write results carry retry metrics"]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWriteOutput {
    /// Puts and deletes requested
    pub requested: usize,
    /// Store calls made for first attempts
    pub chunks: usize,
    /// Extra calls spent on unprocessed requests
    pub retry_count: usize,
    /// Total execution time including all retries
    pub total_duration: Duration,
}

fn keys_of(requests: &[WriteOp]) -> Vec<PrimaryKey> {
    requests.iter().filter_map(|r| r.key().ok()).collect()
}

impl Table {
    /// Batch put/delete any number of items
    ///
    /// Requests are sent in sequential chunks of 25. Within a chunk only the
    /// requests the store reports as unprocessed are resent, backing off per
    /// the table's [`RetryPolicy`](crate::RetryPolicy). When a chunk is still
    /// incomplete after the last attempt the call fails with
    /// [`Error::PartialBatch`] listing what was left behind; earlier chunks
    /// stay written.
    #[instrument(level = "debug", skip_all, fields(puts = puts.len(), deletes = deletes.len()))]
    pub async fn batch_write(
        &self,
        puts: Vec<Item>,
        deletes: Vec<PrimaryKey>,
    ) -> Result<BatchWriteOutput, Error> {
        let start_time = Instant::now();

        let requests: Vec<WriteOp> = puts
            .into_iter()
            .map(WriteOp::Put)
            .chain(deletes.into_iter().map(WriteOp::Delete))
            .collect();
        for request in &requests {
            let _ = request.key()?;
        }

        let mut output = BatchWriteOutput {
            requested: requests.len(),
            ..BatchWriteOutput::default()
        };

        let size = batch_processor::BATCH_WRITE_SIZE;
        for (index, chunk) in requests.chunks(size).enumerate() {
            output.chunks += 1;
            let mut pending = chunk.to_vec();
            let mut attempt = 1;

            loop {
                pending = self.backend.batch_write(pending).await?;
                if pending.is_empty() {
                    break;
                }

                if attempt >= self.retry_policy.max_attempts {
                    let failure = PartialBatchFailure {
                        unprocessed: keys_of(&pending),
                        not_attempted: keys_of(requests.get((index + 1) * size..).unwrap_or_default()),
                        attempts: attempt,
                    };
                    error!(
                        unprocessed = ?failure.unprocessed,
                        not_attempted = failure.not_attempted.len(),
                        attempts = attempt,
                        "batch write gave up on unprocessed items"
                    );
                    return Err(Error::PartialBatch(Box::new(failure)));
                }

                let delay = self.retry_policy.delay(attempt - 1);
                debug!(unprocessed = pending.len(), attempt, ?delay, "retrying batch write");
                sleep(delay).await;
                attempt += 1;
                output.retry_count += 1;
            }
        }

        output.total_duration = start_time.elapsed();
        Ok(output)
    }

    /// Batch read any number of keys
    ///
    /// Duplicate keys are collapsed, then read in chunks of 100 with the same
    /// retry policy as [`Table::batch_write`]. Missing items are simply absent
    /// from the result, whose order is unspecified.
    #[instrument(level = "debug", skip_all, fields(keys = keys.len()))]
    pub async fn batch_get(&self, keys: Vec<PrimaryKey>) -> Result<Vec<Item>, Error> {
        let mut seen = HashSet::with_capacity(keys.len());
        let keys: Vec<PrimaryKey> = keys
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect();

        let size = batch_processor::BATCH_READ_SIZE;
        let mut items = Vec::with_capacity(keys.len());

        for (index, chunk) in keys.chunks(size).enumerate() {
            let mut pending = chunk.to_vec();
            let mut attempt = 1;

            loop {
                let output = self.backend.batch_get(pending).await?;
                items.extend(output.items);
                pending = output.unprocessed;
                if pending.is_empty() {
                    break;
                }

                if attempt >= self.retry_policy.max_attempts {
                    let failure = PartialBatchFailure {
                        unprocessed: pending,
                        not_attempted: keys.get((index + 1) * size..).unwrap_or_default().to_vec(),
                        attempts: attempt,
                    };
                    error!(
                        unprocessed = ?failure.unprocessed,
                        attempts = attempt,
                        "batch get gave up on unprocessed keys"
                    );
                    return Err(Error::PartialBatch(Box::new(failure)));
                }

                let delay = self.retry_policy.delay(attempt - 1);
                debug!(unprocessed = pending.len(), attempt, ?delay, "retrying batch get");
                sleep(delay).await;
                attempt += 1;
            }
        }

        Ok(items)
    }

    /// [`Table::batch_get`] deserialized into `T`.
    pub async fn batch_get_records<T: DeserializeOwned>(
        &self,
        keys: Vec<PrimaryKey>,
    ) -> Result<Vec<T>, Error> {
        Ok(from_items(self.batch_get(keys).await?)?)
    }
}
