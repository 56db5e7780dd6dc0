/// Aggregate write orchestrator tests
///
/// Small aggregates go through one transaction. Large ones are written parent
/// first, then in batches, and compensated when a step fails.
mod helpers;
use helpers::*;
use single_table_dal::AggregateOperation;
use single_table_dal::models::{Order, OrderItem, Record};
use single_table_dal::{AggregateWriter, EntityType, Item, KeyBuilder, PrimaryKey, WriteStrategy};

fn order_aggregate(order_id: &str, items: usize) -> (Item, Vec<Item>) {
    let new = new_order("c1", order_id, items);
    let order = Order::create(&new);
    let children = new
        .items
        .iter()
        .map(|item| OrderItem::create(order_id, item).to_item().unwrap())
        .collect();
    (order.to_item().unwrap(), children)
}

#[tokio::test]
async fn test_small_aggregate_is_one_transaction() {
    init_tracing();
    let (table, spy) = spy_table(Faults::default());
    let writer = AggregateWriter::new(table);
    let (parent, children) = order_aggregate("o1", 2);

    let strategy = writer.create(parent, children).await.unwrap();

    assert_eq!(strategy, WriteStrategy::Transactional);
    assert_eq!(spy.calls(), [Call::Transact(3)]);

    let loaded = writer
        .load(&KeyBuilder::order_gsi1_pk("o1"), EntityType::Order)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(EntityType::of_item(&loaded.parent).unwrap(), EntityType::Order);
    assert_eq!(loaded.children.len(), 2);
}

#[tokio::test]
async fn test_taken_parent_writes_no_children() {
    let table = memory_table();
    let writer = AggregateWriter::new(table.clone());
    let (parent, _) = order_aggregate("o1", 0);
    let _ = table.put(parent.clone()).await.unwrap();

    for size in [2, 30] {
        let (_, children) = order_aggregate("o1", size);
        let err = writer.create(parent.clone(), children).await.unwrap_err();
        assert!(err.is_condition_failed());
        assert!(err.aggregate_failure().is_none());
    }

    let loaded = writer
        .load(&KeyBuilder::order_gsi1_pk("o1"), EntityType::Order)
        .await
        .unwrap()
        .unwrap();
    assert!(loaded.children.is_empty());
}

#[tokio::test]
async fn test_large_aggregate_create_and_delete() {
    let (table, spy) = spy_table(Faults::default());
    let writer = AggregateWriter::new(table);
    let (parent, children) = order_aggregate("o1", 30);

    let strategy = writer.create(parent, children).await.unwrap();

    assert_eq!(strategy, WriteStrategy::Compensating);
    assert_eq!(
        spy.calls(),
        [Call::Transact(1), Call::BatchWrite(25), Call::BatchWrite(5)]
    );
    assert_eq!(spy.inner.len().await, 31);

    let deleted = writer
        .delete_loaded(&KeyBuilder::order_gsi1_pk("o1"), EntityType::Order)
        .await
        .unwrap();
    assert_eq!(deleted, Some(WriteStrategy::Compensating));
    assert!(spy.inner.is_empty().await);
    assert_eq!(spy.calls().last(), Some(&Call::Delete));
}

#[tokio::test]
async fn test_failed_batch_is_compensated() {
    let (table, spy) = spy_table(Faults {
        fail_batch_write_call: Some(2),
        ..Faults::default()
    });
    let writer = AggregateWriter::new(table);
    let (parent, children) = order_aggregate("o1", 60);
    let parent_key = PrimaryKey::from_item(&parent).unwrap();

    let err = writer.create(parent, children).await.unwrap_err();

    let failure = err.aggregate_failure().unwrap();
    assert_eq!(failure.operation, AggregateOperation::Create);
    assert_eq!(failure.parent, parent_key);
    assert!(matches!(failure.source, single_table_dal::Error::InvalidRequest(_)));
    assert!(failure.cleanup_attempted);
    assert!(failure.rolled_back());

    // Undo runs newest first: the failed chunk, the written chunk, the parent.
    assert_eq!(
        spy.calls(),
        [
            Call::Transact(1),
            Call::BatchWrite(25),
            Call::BatchWrite(25),
            Call::BatchWrite(25),
            Call::BatchWrite(25),
            Call::Delete,
        ]
    );
    assert!(spy.inner.is_empty().await);
}

#[tokio::test]
async fn test_cleanup_errors_are_reported() {
    let (table, spy) = spy_table(Faults {
        fail_batch_write_call: Some(2),
        fail_deletes: true,
        ..Faults::default()
    });
    let writer = AggregateWriter::new(table);
    let (parent, children) = order_aggregate("o1", 60);

    let err = writer.create(parent, children).await.unwrap_err();

    let failure = err.aggregate_failure().unwrap();
    assert!(failure.cleanup_attempted);
    assert_eq!(failure.cleanup_errors.len(), 3);
    assert!(!failure.rolled_back());
    assert_eq!(spy.inner.len().await, 26);
}

#[tokio::test]
async fn test_failed_large_delete_is_not_compensated() {
    let (table, spy) = spy_table(Faults::default());
    let writer = AggregateWriter::new(table);
    let (parent, children) = order_aggregate("o1", 30);
    let parent_key = PrimaryKey::from_item(&parent).unwrap();
    let child_keys: Vec<PrimaryKey> = children
        .iter()
        .map(|child| PrimaryKey::from_item(child).unwrap())
        .collect();
    let _ = writer.create(parent, children).await.unwrap();

    spy.set_faults(Faults {
        fail_deletes: true,
        ..Faults::default()
    });
    let err = writer.delete(parent_key, child_keys).await.unwrap_err();

    let failure = err.aggregate_failure().unwrap();
    assert_eq!(failure.operation, AggregateOperation::Delete);
    assert!(!failure.cleanup_attempted);
    assert_eq!(spy.inner.len().await, 31);
}

#[tokio::test]
async fn test_small_delete_is_atomic() {
    let (table, spy) = spy_table(Faults::default());
    let writer = AggregateWriter::new(table);
    let (parent, children) = order_aggregate("o1", 3);
    let _ = writer.create(parent, children).await.unwrap();

    let deleted = writer
        .delete_loaded(&KeyBuilder::order_gsi1_pk("o1"), EntityType::Order)
        .await
        .unwrap();

    assert_eq!(deleted, Some(WriteStrategy::Transactional));
    assert_eq!(spy.calls().last(), Some(&Call::Transact(4)));
    assert!(spy.inner.is_empty().await);
}

#[tokio::test]
async fn test_duplicate_children_are_rejected() {
    let table = memory_table();
    let writer = AggregateWriter::new(table);
    let (parent, mut children) = order_aggregate("o1", 2);
    children.push(children[0].clone());

    let err = writer.create(parent, children).await.unwrap_err();
    assert!(matches!(err, single_table_dal::Error::InvalidRequest(_)));
}

#[tokio::test]
async fn test_load_skips_foreign_items_in_partition() {
    let table = memory_table();
    let writer = AggregateWriter::new(table.clone());
    let (parent, children) = order_aggregate("o1", 2);
    let _ = writer.create(parent, children).await.unwrap();
    let _ = table
        .put(item(
            "Stray#1",
            "Stray#1",
            &[("gsi1pk", "Order#o1"), ("gsi1sk", "Note#1"), ("entityType", "Product")],
        ))
        .await
        .unwrap();
    let _ = table
        .put(item("Stray#2", "Stray#2", &[("gsi1pk", "Order#o1"), ("gsi1sk", "Note#2")]))
        .await
        .unwrap();

    let loaded = writer
        .load(&KeyBuilder::order_gsi1_pk("o1"), EntityType::Order)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded.children.len(), 2);
    for child in loaded.children {
        assert_eq!(EntityType::of_item(&child).unwrap(), EntityType::OrderItem);
        let _ = OrderItem::from_item(child).unwrap();
    }
}

#[tokio::test]
async fn test_missing_aggregate_loads_as_none() {
    let writer = AggregateWriter::new(memory_table());
    let loaded = writer
        .load(&KeyBuilder::order_gsi1_pk("nope"), EntityType::Order)
        .await
        .unwrap();
    assert!(loaded.is_none());
    assert_eq!(
        writer
            .delete_loaded(&KeyBuilder::order_gsi1_pk("nope"), EntityType::Order)
            .await
            .unwrap(),
        None
    );
}
