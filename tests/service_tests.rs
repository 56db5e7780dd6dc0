/// Entity service tests against the in-memory table
mod helpers;
use helpers::*;
use single_table_dal::models::{CustomerUpdate, OrderStatus, ProductStatus};
use single_table_dal::services::{CustomerService, OrderService, ProductService, ReviewService};
use single_table_dal::{KeyBuilder, PrimaryKey, QueryOptions};

#[tokio::test]
async fn test_customer_lifecycle() {
    init_tracing();
    let table = memory_table();
    let customers = CustomerService::new(table.clone());

    let created = customers
        .create(new_customer("c1", "ada@example.com"))
        .await
        .unwrap();
    assert_eq!(customers.get("c1").await.unwrap(), Some(created.clone()));
    assert_eq!(
        customers.find_by_email("ada@example.com").await.unwrap(),
        Some(created.clone())
    );

    let updated = customers
        .update(
            "c1",
            &CustomerUpdate {
                last_name: Some("King".into()),
                ..CustomerUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.last_name, "King");
    assert_eq!(updated.email, created.email);
    assert_eq!(updated.base.created_at, created.base.created_at);
    assert!(updated.base.updated_at >= created.base.updated_at);

    assert!(customers.delete("c1").await.unwrap());
    assert!(!customers.delete("c1").await.unwrap());
    assert!(customers.find_by_email("ada@example.com").await.unwrap().is_none());
    assert!(table.scan(QueryOptions::default()).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn test_duplicate_email_is_rejected_atomically() {
    let table = memory_table();
    let customers = CustomerService::new(table.clone());
    let _ = customers
        .create(new_customer("c1", "ada@example.com"))
        .await
        .unwrap();

    let err = customers
        .create(new_customer("c2", "ada@example.com"))
        .await
        .unwrap_err();

    assert!(err.is_condition_failed());
    assert!(customers.get("c2").await.unwrap().is_none());
    assert!(customers.find_by_email("ada@example.com").await.unwrap().is_some());
    let stored = table.scan(QueryOptions::default()).await.unwrap();
    assert_eq!(stored.items.len(), 2);
    let owner = customers.find_by_email("ada@example.com").await.unwrap().unwrap();
    assert_eq!(owner.customer_id, "c1");
}

#[tokio::test]
async fn test_customer_update_edge_cases() {
    let customers = CustomerService::new(memory_table());
    let err = customers
        .update(
            "ghost",
            &CustomerUpdate {
                phone: Some("1".into()),
                ..CustomerUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let created = customers
        .create(new_customer("c1", "ada@example.com"))
        .await
        .unwrap();
    let unchanged = customers
        .update("c1", &CustomerUpdate::default())
        .await
        .unwrap();
    assert_eq!(unchanged, created);
}

#[tokio::test]
async fn test_order_round_trip() {
    let orders = OrderService::new(memory_table());
    let created = orders.create(new_order("c1", "o1", 3)).await.unwrap();
    assert_eq!(created.order.status, OrderStatus::Pending);
    assert_eq!(created.items.len(), 3);

    let loaded = orders.get("o1").await.unwrap().unwrap();
    assert_eq!(loaded.order, created.order);
    let mut products: Vec<String> = loaded.items.iter().map(|i| i.product_id.clone()).collect();
    products.sort();
    assert_eq!(products, ["p000", "p001", "p002"]);

    assert!(orders.get("o2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_large_order_round_trip() {
    let orders = OrderService::new(memory_table());
    let _ = orders.create(new_order("c1", "o1", 40)).await.unwrap();

    let loaded = orders.get("o1").await.unwrap().unwrap();
    assert_eq!(loaded.items.len(), 40);

    assert!(orders.delete("o1").await.unwrap());
    assert!(orders.get("o1").await.unwrap().is_none());
    assert!(!orders.delete("o1").await.unwrap());
}

#[tokio::test]
async fn test_orders_for_customer_most_recent_first() {
    let table = memory_table();
    let customers = CustomerService::new(table.clone());
    let orders = OrderService::new(table);
    let _ = customers
        .create(new_customer("c1", "ada@example.com"))
        .await
        .unwrap();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let id = unique_id();
        let _ = orders.create(new_order("c1", &id, 1)).await.unwrap();
        ids.push(id);
        // ULIDs generated within the same millisecond are not guaranteed monotonic.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    ids.reverse();

    let listed: Vec<String> = orders
        .list_for_customer("c1", None)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.order_id)
        .collect();
    assert_eq!(listed, ids);

    let latest = orders.list_for_customer("c1", Some(1)).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].order_id, ids[0]);
}

#[tokio::test]
async fn test_status_change_moves_status_index_entry() {
    let table = memory_table();
    let orders = OrderService::new(table.clone());
    let _ = orders.create(new_order("c1", "o1", 1)).await.unwrap();
    let _ = orders.create(new_order("c1", "o2", 1)).await.unwrap();

    let pending = orders
        .list_by_status(OrderStatus::Pending, QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(pending.count, 2);

    let shipped = orders
        .update_status("c1", "o1", OrderStatus::Shipped)
        .await
        .unwrap();
    assert!(shipped.shipped_date.is_some());

    let pending = orders
        .list_by_status(OrderStatus::Pending, QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(pending.items.len(), 1);
    assert_eq!(pending.items[0].order_id, "o2");

    let shipped = orders
        .list_by_status(OrderStatus::Shipped, QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(shipped.items.len(), 1);
    assert_eq!(shipped.items[0].order_id, "o1");

    let stored = table
        .get(&KeyBuilder::order_key("c1", "o1"))
        .await
        .unwrap()
        .unwrap();
    assert!(stored.contains_key("shippedDate"));

    let err = orders
        .update_status("c1", "missing", OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_products_by_category_and_brand() {
    let products = ProductService::new(memory_table());
    for (id, category, brand, name) in [
        ("p1", "books", "Ace", "Dune"),
        ("p2", "books", "Tor", "Mistborn"),
        ("p3", "games", "Ace", "Go"),
    ] {
        let _ = products
            .create(new_product(id, category, brand, name))
            .await
            .unwrap();
    }

    let books = products
        .list_by_category("books", QueryOptions::default())
        .await
        .unwrap();
    let names: Vec<&str> = books.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Dune", "Mistborn"]);

    let ace = products
        .list_by_brand("Ace", QueryOptions::default())
        .await
        .unwrap();
    let names: Vec<&str> = ace.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Dune", "Go"]);

    let err = products
        .create(new_product("p1", "books", "Ace", "Dune"))
        .await
        .unwrap_err();
    assert!(err.is_condition_failed());
}

#[tokio::test]
async fn test_product_stock_updates() {
    let table = memory_table();
    let products = ProductService::new(table.clone());
    let _ = products
        .create(new_product("p1", "books", "Ace", "Dune"))
        .await
        .unwrap();

    let sold_out = products.update_stock("p1", 0).await.unwrap();
    assert_eq!(sold_out.status, ProductStatus::OutOfStock);
    assert_eq!(products.get("p1").await.unwrap(), Some(sold_out));

    let restocked = products.update_stock("p1", 4).await.unwrap();
    assert!(restocked.is_in_stock());

    let err = products.update_stock("p9", 1).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(table.get(&PrimaryKey::new("Product#p9", "Product#DETAILS")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reviews_by_product_and_customer() {
    let table = memory_table();
    let products = ProductService::new(table.clone());
    let reviews = ReviewService::new(table.clone());
    let _ = products
        .create(new_product("p1", "books", "Ace", "Dune"))
        .await
        .unwrap();

    for (id, product, customer, rating) in [
        ("r1", "p1", "c1", 5),
        ("r2", "p1", "c2", 3),
        ("r3", "p2", "c1", 4),
    ] {
        let _ = reviews
            .create(new_review(id, product, customer, rating))
            .await
            .unwrap();
    }

    let for_dune = reviews
        .list_for_product("p1", QueryOptions::default().descending())
        .await
        .unwrap();
    let ids: Vec<&str> = for_dune.items.iter().map(|r| r.review_id.as_str()).collect();
    assert_eq!(ids, ["r1", "r2"]);

    let by_c1 = reviews
        .list_by_customer("c1", QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(by_c1.items.len(), 2);

    let err = reviews
        .create(new_review("r1", "p1", "c3", 1))
        .await
        .unwrap_err();
    assert!(err.is_condition_failed());
    let err = reviews
        .create(new_review("r9", "p1", "c3", 7))
        .await
        .unwrap_err();
    assert!(matches!(err, single_table_dal::Error::InvalidRequest(_)));
}

#[tokio::test]
async fn test_review_helpful_votes_and_product_rating() {
    let table = memory_table();
    let products = ProductService::new(table.clone());
    let reviews = ReviewService::new(table);
    let _ = products
        .create(new_product("p1", "books", "Ace", "Dune"))
        .await
        .unwrap();

    let unrated = reviews.refresh_product_rating("p1").await.unwrap();
    assert_eq!(unrated.average_rating, None);

    for (id, rating) in [("r1", 5), ("r2", 4), ("r3", 4)] {
        let _ = reviews
            .create(new_review(id, "p1", "c1", rating))
            .await
            .unwrap();
    }
    let rated = reviews.refresh_product_rating("p1").await.unwrap();
    assert_eq!(rated.average_rating, Some(4.3));
    assert_eq!(rated.review_count, Some(3));
    assert_eq!(products.get("p1").await.unwrap(), Some(rated));

    let voted = reviews.mark_helpful("r1", 2).await.unwrap();
    assert_eq!(voted.helpful_count, 2);
    let voted = reviews.mark_helpful("r1", -3).await.unwrap();
    assert_eq!(voted.helpful_count, 0);
    assert_eq!(reviews.get("r1").await.unwrap(), Some(voted));
    assert!(reviews.mark_helpful("r9", 1).await.unwrap_err().is_not_found());
    assert!(reviews.refresh_product_rating("p9").await.unwrap_err().is_not_found());

    assert!(reviews.delete("r1").await.unwrap());
    assert!(!reviews.delete("r1").await.unwrap());
    assert!(reviews.get("r1").await.unwrap().is_none());
}
