use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    Delete, DeleteRequest, KeysAndAttributes, Put, PutRequest, ReturnValue, Select,
    TransactWriteItem, Update, WriteRequest,
};
use std::collections::HashMap;

use crate::Error;
use crate::condition::{ConditionExpression, ConditionExpressionBuilder};
use crate::keys::PrimaryKey;
use crate::table::backend::{Backend, BatchGetOutput, QueryRequest, TransactEntry, WriteOp};
use crate::table::helpers::expressions;
use crate::table::types::{Item, OutputItems, PageToken, QueryOptions};

/// [`Backend`] over a real DynamoDB table.
#[derive(Clone, Debug)]
pub struct DynamoBackend {
    client: Client,
    table_name: String,
}

impl DynamoBackend {
    /// Binds a client to one table.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Underlying SDK client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Table every request targets.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn transact_item(&self, entry: TransactEntry, prefix: &str) -> Result<TransactWriteItem, Error> {
        let render = |condition: &Option<ConditionExpressionBuilder>| {
            condition.as_ref().and_then(|c| c.to_expression(Some(prefix)))
        };

        let item = match entry {
            TransactEntry::Put { item, condition } => {
                let guard = render(&condition);
                let put = Put::builder()
                    .table_name(&self.table_name)
                    .set_item(Some(item))
                    .set_condition_expression(guard.as_ref().map(|g| g.expression.clone()))
                    .set_expression_attribute_names(guard.as_ref().map(|g| g.names.clone()))
                    .set_expression_attribute_values(
                        guard.as_ref().and_then(ConditionExpression::values_or_none),
                    )
                    .build()?;
                TransactWriteItem::builder().put(put).build()
            }
            TransactEntry::Delete { key, condition } => {
                let guard = render(&condition);
                let delete = Delete::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key.to_item()))
                    .set_condition_expression(guard.as_ref().map(|g| g.expression.clone()))
                    .set_expression_attribute_names(guard.as_ref().map(|g| g.names.clone()))
                    .set_expression_attribute_values(
                        guard.as_ref().and_then(ConditionExpression::values_or_none),
                    )
                    .build()?;
                TransactWriteItem::builder().delete(delete).build()
            }
            TransactEntry::Update {
                key,
                fields,
                condition,
            } => {
                let mut rendered = expressions::update_expression(fields);
                let guard = render(&condition).map(|g| expressions::merge(&mut rendered, g));
                let ConditionExpression {
                    expression,
                    names,
                    values,
                } = rendered;
                let update = Update::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key.to_item()))
                    .update_expression(expression)
                    .set_condition_expression(guard)
                    .set_expression_attribute_names(Some(names))
                    .set_expression_attribute_values(Some(values))
                    .build()?;
                TransactWriteItem::builder().update(update).build()
            }
        };
        Ok(item)
    }
}

fn non_empty<K, V>(map: HashMap<K, V>) -> Option<HashMap<K, V>> {
    (!map.is_empty()).then_some(map)
}

fn page(
    items: Option<Vec<Item>>,
    scanned_count: i32,
    last_evaluated_key: Option<Item>,
) -> OutputItems {
    let items = items.unwrap_or_default();
    OutputItems {
        count: items.len(),
        scanned_count: usize::try_from(scanned_count).unwrap_or_default(),
        items,
        last_evaluated_key: last_evaluated_key.and_then(non_empty).map(PageToken),
    }
}

#[async_trait]
impl Backend for DynamoBackend {
    async fn put_item(&self, item: Item) -> Result<(), Error> {
        let _ = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await?;
        Ok(())
    }

    async fn get_item(&self, key: &PrimaryKey) -> Result<Option<Item>, Error> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key.to_item()))
            .consistent_read(true)
            .send()
            .await?;
        Ok(output.item)
    }

    async fn update_item(
        &self,
        key: &PrimaryKey,
        fields: Item,
        condition: Option<&ConditionExpressionBuilder>,
    ) -> Result<Item, Error> {
        if fields.is_empty() {
            return Err(Error::invalid(format!("update of {key} has no fields")));
        }

        let mut rendered = expressions::update_expression(fields);
        let guard = condition
            .and_then(|c| c.to_expression(Some("c")))
            .map(|g| expressions::merge(&mut rendered, g));
        let ConditionExpression {
            expression,
            names,
            values,
        } = rendered;

        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key.to_item()))
            .update_expression(expression)
            .set_condition_expression(guard)
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(UpdateItemError::ConditionalCheckFailedException(_)) => {
                    Error::ConditionFailed(format!("update of {key}"))
                }
                _ => Error::from(e),
            })?;

        Ok(output.attributes.unwrap_or_default())
    }

    async fn delete_item(&self, key: &PrimaryKey) -> Result<(), Error> {
        let _ = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key.to_item()))
            .send()
            .await?;
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<OutputItems, Error> {
        let QueryRequest {
            index,
            partition_key,
            sort_key,
            options,
        } = request;

        let mut rendered = expressions::KeyConditionBuilder::new(index)
            .with_partition_key(&partition_key)
            .with_sort_key(sort_key.as_ref())
            .build();
        let filter = options
            .filter
            .as_ref()
            .and_then(|f| f.to_expression(Some("f")))
            .map(|f| expressions::merge(&mut rendered, f));

        // Secondary indexes only serve projected attributes.
        let select = if index.index_name().is_some() {
            Select::AllProjectedAttributes
        } else {
            Select::AllAttributes
        };

        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(index.index_name().map(str::to_string))
            .select(select)
            .key_condition_expression(rendered.expression)
            .set_filter_expression(filter)
            .set_expression_attribute_names(Some(rendered.names))
            .set_expression_attribute_values(Some(rendered.values))
            .scan_index_forward(options.scan_index_forward)
            .set_limit(options.limit.map(i32::from))
            .set_exclusive_start_key(options.exclusive_start_key.map(PageToken::into_inner))
            .send()
            .await?;

        Ok(page(
            output.items,
            output.scanned_count,
            output.last_evaluated_key,
        ))
    }

    async fn scan(&self, options: QueryOptions) -> Result<OutputItems, Error> {
        let filter = options
            .filter
            .as_ref()
            .and_then(|f| f.to_expression(Some("f")))
            .unwrap_or_default();
        let expression = (!filter.expression.is_empty()).then_some(filter.expression);

        let output = self
            .client
            .scan()
            .table_name(&self.table_name)
            .set_filter_expression(expression)
            .set_expression_attribute_names(non_empty(filter.names))
            .set_expression_attribute_values(non_empty(filter.values))
            .set_limit(options.limit.map(i32::from))
            .set_exclusive_start_key(options.exclusive_start_key.map(PageToken::into_inner))
            .consistent_read(true)
            .send()
            .await?;

        Ok(page(
            output.items,
            output.scanned_count,
            output.last_evaluated_key,
        ))
    }

    async fn batch_write(&self, requests: Vec<WriteOp>) -> Result<Vec<WriteOp>, Error> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut writes = Vec::with_capacity(requests.len());
        for request in requests {
            let write = match request {
                WriteOp::Put(item) => WriteRequest::builder()
                    .put_request(PutRequest::builder().set_item(Some(item)).build()?)
                    .build(),
                WriteOp::Delete(key) => WriteRequest::builder()
                    .delete_request(DeleteRequest::builder().set_key(Some(key.to_item())).build()?)
                    .build(),
            };
            writes.push(write);
        }

        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, writes)
            .send()
            .await?;

        let mut unprocessed = Vec::new();
        for requests in output.unprocessed_items.unwrap_or_default().into_values() {
            for request in requests {
                if let Some(put) = request.put_request {
                    unprocessed.push(WriteOp::Put(put.item));
                }
                if let Some(delete) = request.delete_request {
                    unprocessed.push(WriteOp::Delete(PrimaryKey::from_item(&delete.key)?));
                }
            }
        }
        Ok(unprocessed)
    }

    async fn batch_get(&self, keys: Vec<PrimaryKey>) -> Result<BatchGetOutput, Error> {
        if keys.is_empty() {
            return Ok(BatchGetOutput::default());
        }

        let request = KeysAndAttributes::builder()
            .set_keys(Some(keys.iter().map(PrimaryKey::to_item).collect()))
            .consistent_read(true)
            .build()?;

        let output = self
            .client
            .batch_get_item()
            .request_items(&self.table_name, request)
            .send()
            .await?;

        let items = output
            .responses
            .unwrap_or_default()
            .into_values()
            .flatten()
            .collect();
        let unprocessed = output
            .unprocessed_keys
            .unwrap_or_default()
            .into_values()
            .flat_map(|pending| pending.keys)
            .map(|key| PrimaryKey::from_item(&key))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BatchGetOutput { items, unprocessed })
    }

    async fn transact_write(&self, entries: Vec<TransactEntry>) -> Result<(), Error> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut items = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            items.push(self.transact_item(entry, &format!("t{i}"))?);
        }

        let _ = self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(TransactWriteItemsError::TransactionCanceledException(cancelled))
                    if cancelled
                        .cancellation_reasons()
                        .iter()
                        .any(|reason| reason.code() == Some("ConditionalCheckFailed")) =>
                {
                    Error::ConditionFailed("transaction cancelled by a guard".to_string())
                }
                _ => Error::from(e),
            })?;
        Ok(())
    }
}
