/// Test fixtures for storage integration tests
///
/// Builders for raw items and entity inputs with sensible defaults.
use aws_sdk_dynamodb::types::AttributeValue;
use single_table_dal::models::{
    Address, NewCustomer, NewOrder, NewOrderItem, NewProduct, NewReview, PaymentMethod,
    PaymentType,
};
use single_table_dal::{Item, PrimaryKey};

/// Raw item at `pk`/`sk` with extra string attributes
#[allow(dead_code)]
pub fn item(pk: &str, sk: &str, attrs: &[(&str, &str)]) -> Item {
    let mut item = PrimaryKey::new(pk, sk).to_item();
    for (name, value) in attrs {
        let _ = item.insert(name.to_string(), AttributeValue::S(value.to_string()));
    }
    item
}

#[allow(dead_code)]
pub fn new_customer(customer_id: &str, email: &str) -> NewCustomer {
    NewCustomer {
        customer_id: customer_id.into(),
        email: email.into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        phone: Some("+44 20 7946 0000".into()),
        ..NewCustomer::default()
    }
}

/// Order with `items` distinct line items
#[allow(dead_code)]
pub fn new_order(customer_id: &str, order_id: &str, items: usize) -> NewOrder {
    let items: Vec<NewOrderItem> = (0..items)
        .map(|i| NewOrderItem {
            product_id: format!("p{i:03}"),
            product_name: format!("Book {i}"),
            quantity: 1,
            unit_price: 10.0,
            total_price: None,
        })
        .collect();
    NewOrder {
        order_id: order_id.into(),
        customer_id: customer_id.into(),
        total_amount: 10.0 * items.len() as f64,
        currency: "EUR".into(),
        items,
        shipping_address: Address {
            street: "1 Main St".into(),
            city: "Dublin".into(),
            state: "Leinster".into(),
            zip_code: "D01".into(),
            country: "IE".into(),
        },
        payment_method: PaymentMethod {
            kind: PaymentType::CreditCard,
            last4: Some("4242".into()),
            brand: Some("VISA".into()),
        },
        order_date: "2024-05-01T10:00:00Z".into(),
    }
}

#[allow(dead_code)]
pub fn new_product(product_id: &str, category: &str, brand: &str, name: &str) -> NewProduct {
    NewProduct {
        product_id: product_id.into(),
        name: name.into(),
        description: format!("{name} by {brand}"),
        category: category.into(),
        brand: brand.into(),
        price: 12.5,
        currency: "EUR".into(),
        sku: format!("SKU-{product_id}"),
        stock: 10,
        ..NewProduct::default()
    }
}

#[allow(dead_code)]
pub fn new_review(review_id: &str, product_id: &str, customer_id: &str, rating: u8) -> NewReview {
    NewReview {
        review_id: review_id.into(),
        product_id: product_id.into(),
        customer_id: customer_id.into(),
        rating,
        title: format!("{rating} stars"),
        content: "Arrived on time".into(),
        verified: true,
        ..NewReview::default()
    }
}
