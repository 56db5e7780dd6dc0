use tracing::{info, instrument};

use crate::Error;
use crate::aggregate::{AggregateWriter, WriteStrategy};
use crate::keys::{EntityType, KeyBuilder};
use crate::models::{NewOrder, Order, OrderItem, OrderStatus, OrderWithItems, Record};
use crate::table::{Index, OutputItems, QueryOptions, QueryRequest, Table};

/// Orders together with their line items.
#[derive(Clone, Debug)]
pub struct OrderService {
    table: Table,
    writer: AggregateWriter,
}

impl OrderService {
    /// Service over `table`.
    pub fn new(table: Table) -> Self {
        Self {
            writer: AggregateWriter::new(table.clone()),
            table,
        }
    }

    /// Writes a pending order and all of its items.
    ///
    /// Atomic up to 24 items; larger orders are compensated on failure, see
    /// [`AggregateWriter::create`].
    #[instrument(level = "debug", skip_all, fields(order_id = %new.order_id, items = new.items.len()))]
    pub async fn create(&self, new: NewOrder) -> Result<OrderWithItems, Error> {
        let order = Order::create(&new);
        let items: Vec<OrderItem> = new
            .items
            .iter()
            .map(|item| OrderItem::create(&order.order_id, item))
            .collect();
        let children = items
            .iter()
            .map(Record::to_item)
            .collect::<Result<Vec<_>, _>>()?;

        let strategy = self.writer.create(order.to_item()?, children).await?;
        if strategy == WriteStrategy::Compensating {
            info!(order_id = %order.order_id, items = items.len(), "large order written in batches");
        }
        Ok(OrderWithItems { order, items })
    }

    /// Order and items, read through the order's GSI1 partition.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, order_id: &str) -> Result<Option<OrderWithItems>, Error> {
        let Some(aggregate) = self
            .writer
            .load(&KeyBuilder::order_gsi1_pk(order_id), EntityType::Order)
            .await?
        else {
            return Ok(None);
        };

        let order = Order::from_item(aggregate.parent)?;
        let items = aggregate
            .children
            .into_iter()
            .map(OrderItem::from_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// Orders of a customer, highest order id first.
    ///
    /// Order ids are expected to sort by creation time (ULIDs), which makes
    /// this most recent first. Without a limit every order is returned.
    pub async fn list_for_customer(
        &self,
        customer_id: &str,
        limit: Option<u16>,
    ) -> Result<Vec<Order>, Error> {
        let mut options = QueryOptions::default().descending();
        if let Some(limit) = limit {
            options = options.limit(limit);
        }
        let request = QueryRequest::new(Index::Table, KeyBuilder::order_pk(customer_id))
            .sort_key(KeyBuilder::orders_sk_condition())
            .options(options);

        let items = match limit {
            Some(_) => self.table.query(request).await?.items,
            None => self.table.query_all(request).await?,
        };
        items.into_iter().map(Order::from_item).collect()
    }

    /// One page of orders in `status`, oldest order date first.
    pub async fn list_by_status(
        &self,
        status: OrderStatus,
        options: QueryOptions,
    ) -> Result<OutputItems<Order>, Error> {
        self.table
            .query_gsi2(
                &KeyBuilder::order_status_gsi2_pk(status.as_str()),
                None,
                options,
            )
            .await?
            .decode()
    }

    /// Moves an order to `status` and returns it.
    #[instrument(level = "debug", skip(self))]
    pub async fn update_status(
        &self,
        customer_id: &str,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Order, Error> {
        let key = KeyBuilder::order_key(customer_id, order_id);
        let Some(mut order) = self.table.get_record::<Order>(&key).await? else {
            return Err(Error::NotFound(key));
        };
        order.set_status(status);
        self.table.put_record(&order).await?;

        info!(order_id, status = status.as_str(), "order status changed");
        Ok(order)
    }

    /// Deletes an order and its items. Returns `false` when it did not exist.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, order_id: &str) -> Result<bool, Error> {
        let deleted = self
            .writer
            .delete_loaded(&KeyBuilder::order_gsi1_pk(order_id), EntityType::Order)
            .await?;
        Ok(deleted.is_some())
    }
}
