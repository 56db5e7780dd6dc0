//! Key conventions of the single table.
//!
//! Every physical key in the table is produced here. Entities never format
//! `pk`/`sk` strings themselves; they ask [`KeyBuilder`] for them, so the
//! collation of orders under customers and of order items under an order's
//! GSI1 partition is decided in one place.

use aws_sdk_dynamodb::types::AttributeValue;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

use crate::Error;
use crate::condition::ConditionExpressionBuilder;
use crate::table::SortKeyCondition;

/// Attribute names shared by every record.
pub mod attr {
    /// Partition key
    pub const PK: &str = "pk";
    /// Sort key
    pub const SK: &str = "sk";
    /// GSI1 partition key
    pub const GSI1PK: &str = "gsi1pk";
    /// GSI1 sort key
    pub const GSI1SK: &str = "gsi1sk";
    /// GSI2 partition key
    pub const GSI2PK: &str = "gsi2pk";
    /// GSI2 sort key
    pub const GSI2SK: &str = "gsi2sk";
    /// Record kind discriminator
    pub const ENTITY_TYPE: &str = "entityType";
    /// Creation timestamp
    pub const CREATED_AT: &str = "createdAt";
    /// Last modification timestamp
    pub const UPDATED_AT: &str = "updatedAt";
}

const SEPARATOR: char = '#';

/// Kind of record stored in the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// Customer profile
    Customer,
    /// Uniqueness lock on a customer's email
    CustomerEmail,
    /// Order header
    Order,
    /// Line item of an order
    #[serde(rename = "Item")]
    OrderItem,
    /// Catalogue product
    Product,
    /// Customer review of a product
    Review,
}

impl EntityType {
    /// Value stored in the `entityType` attribute
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityType::Customer => "Customer",
            EntityType::CustomerEmail => "CustomerEmail",
            EntityType::Order => "Order",
            EntityType::OrderItem => "Item",
            EntityType::Product => "Product",
            EntityType::Review => "Review",
        }
    }

    /// Kind of the children stored beside a parent of this kind, if any.
    pub const fn child_type(&self) -> Option<EntityType> {
        match self {
            EntityType::Order => Some(EntityType::OrderItem),
            _ => None,
        }
    }

    /// Reads the discriminator of a raw item.
    pub fn of_item(item: &HashMap<String, AttributeValue>) -> Result<Self, Error> {
        match item.get(attr::ENTITY_TYPE) {
            Some(AttributeValue::S(value)) => value.parse(),
            _ => Err(Error::invalid("item has no entityType attribute")),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Customer" => Ok(EntityType::Customer),
            "CustomerEmail" => Ok(EntityType::CustomerEmail),
            "Order" => Ok(EntityType::Order),
            "Item" => Ok(EntityType::OrderItem),
            "Product" => Ok(EntityType::Product),
            "Review" => Ok(EntityType::Review),
            other => Err(Error::invalid(format!("unknown entity type `{other}`"))),
        }
    }
}

/// Primary key of an item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Partition key value
    pub pk: String,
    /// Sort key value
    pub sk: String,
}

impl PrimaryKey {
    /// Creates a key from its two parts.
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Extracts the key from an item. Fails unless both attributes are strings.
    pub fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Self, Error> {
        match (item.get(attr::PK), item.get(attr::SK)) {
            (Some(AttributeValue::S(pk)), Some(AttributeValue::S(sk))) => {
                Ok(Self::new(pk.clone(), sk.clone()))
            }
            _ => Err(Error::invalid("item is missing a string pk or sk")),
        }
    }

    /// The key as an attribute map, as the store expects in key parameters.
    pub fn to_item(&self) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (attr::PK.to_string(), AttributeValue::S(self.pk.clone())),
            (attr::SK.to_string(), AttributeValue::S(self.sk.clone())),
        ])
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

/// Partition/sort pair of a secondary index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    /// Index partition value
    pub pk: String,
    /// Index sort value
    pub sk: String,
}

impl IndexKey {
    /// Creates an index key from its two parts.
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

/// Every physical key field of one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySet {
    /// Table key
    pub primary: PrimaryKey,
    /// GSI1 membership, absent for records outside the index
    pub gsi1: Option<IndexKey>,
    /// GSI2 membership, absent for records outside the index
    pub gsi2: Option<IndexKey>,
}

impl KeySet {
    /// Key set with only a primary key.
    pub fn new(primary: PrimaryKey) -> Self {
        Self {
            primary,
            gsi1: None,
            gsi2: None,
        }
    }

    /// Adds a GSI1 key.
    pub fn with_gsi1(mut self, key: IndexKey) -> Self {
        self.gsi1 = Some(key);
        self
    }

    /// Adds a GSI2 key.
    pub fn with_gsi2(mut self, key: IndexKey) -> Self {
        self.gsi2 = Some(key);
        self
    }
}

fn join(parts: &[&str]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.push_str(part);
    }
    out
}

/// Pure functions from business identifiers to key strings.
#[derive(Debug, Clone, Copy)]
pub struct KeyBuilder;

impl KeyBuilder {
    /// `Customer#{id}`
    pub fn customer_pk(customer_id: &str) -> String {
        join(&["Customer", customer_id])
    }

    /// `Customer#{id}`
    pub fn customer_sk(customer_id: &str) -> String {
        join(&["Customer", customer_id])
    }

    /// Key of a customer record.
    pub fn customer_key(customer_id: &str) -> PrimaryKey {
        PrimaryKey::new(Self::customer_pk(customer_id), Self::customer_sk(customer_id))
    }

    /// `CustomerEmail#{email}`
    pub fn customer_email_pk(email: &str) -> String {
        join(&["CustomerEmail", email])
    }

    /// `CustomerEmail#{email}`
    pub fn customer_email_sk(email: &str) -> String {
        join(&["CustomerEmail", email])
    }

    /// Key of the email uniqueness lock.
    pub fn customer_email_key(email: &str) -> PrimaryKey {
        PrimaryKey::new(Self::customer_email_pk(email), Self::customer_email_sk(email))
    }

    /// Orders live in their customer's partition: `Customer#{customerId}`.
    pub fn order_pk(customer_id: &str) -> String {
        Self::customer_pk(customer_id)
    }

    /// `#Order#{orderId}`
    pub fn order_sk(order_id: &str) -> String {
        format!("{}{order_id}", Self::orders_sk_prefix())
    }

    /// Key of an order header.
    pub fn order_key(customer_id: &str, order_id: &str) -> PrimaryKey {
        PrimaryKey::new(Self::order_pk(customer_id), Self::order_sk(order_id))
    }

    /// Sort-key prefix shared by every order of a customer.
    pub fn orders_sk_prefix() -> &'static str {
        "#Order#"
    }

    /// Sort-key condition selecting the orders in a customer partition.
    pub fn orders_sk_condition() -> SortKeyCondition {
        SortKeyCondition::BeginsWith(Self::orders_sk_prefix().to_string())
    }

    /// The same selection as a condition builder, for filters.
    pub fn orders_sk_filter() -> ConditionExpressionBuilder {
        ConditionExpressionBuilder::new()
            .attr(attr::SK)
            .begins_with(Self::orders_sk_prefix())
    }

    /// `Order#{orderId}#Item#{productId}`
    pub fn order_item_pk(order_id: &str, product_id: &str) -> String {
        join(&["Order", order_id, "Item", product_id])
    }

    /// `#Order#{orderId}#Item#{productId}`
    pub fn order_item_sk(order_id: &str, product_id: &str) -> String {
        format!("{}{order_id}#Item#{product_id}", Self::orders_sk_prefix())
    }

    /// Key of an order line item.
    pub fn order_item_key(order_id: &str, product_id: &str) -> PrimaryKey {
        PrimaryKey::new(
            Self::order_item_pk(order_id, product_id),
            Self::order_item_sk(order_id, product_id),
        )
    }

    /// GSI1 partition grouping an order with its items: `Order#{orderId}`.
    pub fn order_gsi1_pk(order_id: &str) -> String {
        join(&["Order", order_id])
    }

    /// GSI1 key of an order header.
    pub fn order_gsi1(order_id: &str) -> IndexKey {
        IndexKey::new(Self::order_gsi1_pk(order_id), Self::order_gsi1_pk(order_id))
    }

    /// GSI1 key of an order item.
    pub fn order_item_gsi1(order_id: &str, product_id: &str) -> IndexKey {
        IndexKey::new(Self::order_gsi1_pk(order_id), join(&["Item", product_id]))
    }

    /// `Order#STATUS#{status}`
    pub fn order_status_gsi2_pk(status: &str) -> String {
        join(&["Order", "STATUS", status])
    }

    /// GSI2 key listing orders by status, ordered by order date.
    pub fn order_status_gsi2(status: &str, order_date: &str) -> IndexKey {
        IndexKey::new(Self::order_status_gsi2_pk(status), order_date)
    }

    /// `Product#{productId}`
    pub fn product_pk(product_id: &str) -> String {
        join(&["Product", product_id])
    }

    /// `Product#DETAILS`
    pub fn product_sk() -> String {
        join(&["Product", "DETAILS"])
    }

    /// Key of a product record.
    pub fn product_key(product_id: &str) -> PrimaryKey {
        PrimaryKey::new(Self::product_pk(product_id), Self::product_sk())
    }

    /// `Product#CATEGORY#{category}`
    pub fn product_category_gsi1_pk(category: &str) -> String {
        join(&["Product", "CATEGORY", category])
    }

    /// GSI1 key browsing products by category, ordered by `{brand}#{name}`.
    pub fn product_category_gsi1(category: &str, brand: &str, name: &str) -> IndexKey {
        IndexKey::new(Self::product_category_gsi1_pk(category), join(&[brand, name]))
    }

    /// `Product#BRAND#{brand}`
    pub fn product_brand_gsi2_pk(brand: &str) -> String {
        join(&["Product", "BRAND", brand])
    }

    /// GSI2 key browsing products by brand, ordered by `{category}#{name}`.
    pub fn product_brand_gsi2(brand: &str, category: &str, name: &str) -> IndexKey {
        IndexKey::new(Self::product_brand_gsi2_pk(brand), join(&[category, name]))
    }

    /// `Review#{reviewId}`
    pub fn review_pk(review_id: &str) -> String {
        join(&["Review", review_id])
    }

    /// `Review#DETAILS`
    pub fn review_sk() -> String {
        join(&["Review", "DETAILS"])
    }

    /// Key of a review record.
    pub fn review_key(review_id: &str) -> PrimaryKey {
        PrimaryKey::new(Self::review_pk(review_id), Self::review_sk())
    }

    /// Index sort-key prefix shared by every review.
    pub fn reviews_sk_prefix() -> &'static str {
        "Review#"
    }

    /// Index sort-key condition selecting reviews.
    pub fn reviews_sk_condition() -> SortKeyCondition {
        SortKeyCondition::BeginsWith(Self::reviews_sk_prefix().to_string())
    }

    /// GSI1 key listing a customer's reviews by date: `Customer#{customerId}`,
    /// `Review#{createdAt}`.
    pub fn customer_reviews_gsi1(customer_id: &str, created_at: &str) -> IndexKey {
        IndexKey::new(Self::customer_pk(customer_id), join(&["Review", created_at]))
    }

    /// GSI2 key listing a product's reviews by rating then date:
    /// `Product#{productId}`, `Review#{rating}#{createdAt}`.
    pub fn product_reviews_gsi2(product_id: &str, rating: u8, created_at: &str) -> IndexKey {
        IndexKey::new(
            Self::product_pk(product_id),
            join(&["Review", &rating.to_string(), created_at]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_keys() {
        assert_eq!(KeyBuilder::customer_pk("c1"), "Customer#c1");
        assert_eq!(KeyBuilder::customer_sk("c1"), "Customer#c1");
        assert_eq!(
            KeyBuilder::customer_email_key("a@b.c"),
            PrimaryKey::new("CustomerEmail#a@b.c", "CustomerEmail#a@b.c")
        );
    }

    #[test]
    fn test_order_keys_collate_under_customer() {
        let key = KeyBuilder::order_key("c1", "o1");
        assert_eq!(key.pk, KeyBuilder::customer_pk("c1"));
        assert_eq!(key.sk, "#Order#o1");
        assert!(key.sk.starts_with(KeyBuilder::orders_sk_prefix()));
    }

    #[test]
    fn test_order_item_keys() {
        let key = KeyBuilder::order_item_key("o1", "p9");
        assert_eq!(key.pk, "Order#o1#Item#p9");
        assert_eq!(key.sk, "#Order#o1#Item#p9");

        let order = KeyBuilder::order_gsi1("o1");
        let item = KeyBuilder::order_item_gsi1("o1", "p9");
        assert_eq!(order, IndexKey::new("Order#o1", "Order#o1"));
        assert_eq!(item.pk, order.pk);
        assert_eq!(item.sk, "Item#p9");
    }

    #[test]
    fn test_product_keys() {
        assert_eq!(KeyBuilder::product_key("p1"), PrimaryKey::new("Product#p1", "Product#DETAILS"));
        assert_eq!(
            KeyBuilder::product_category_gsi1("books", "Acme", "Dune"),
            IndexKey::new("Product#CATEGORY#books", "Acme#Dune")
        );
        assert_eq!(
            KeyBuilder::product_brand_gsi2("Acme", "books", "Dune"),
            IndexKey::new("Product#BRAND#Acme", "books#Dune")
        );
    }

    #[test]
    fn test_review_keys() {
        assert_eq!(KeyBuilder::review_key("r1"), PrimaryKey::new("Review#r1", "Review#DETAILS"));
        assert_eq!(
            KeyBuilder::customer_reviews_gsi1("c1", "2024-05-01T10:00:00.000Z"),
            IndexKey::new("Customer#c1", "Review#2024-05-01T10:00:00.000Z")
        );
        let by_product = KeyBuilder::product_reviews_gsi2("p1", 4, "2024-05-01T10:00:00.000Z");
        assert_eq!(by_product.pk, KeyBuilder::product_pk("p1"));
        assert_eq!(by_product.sk, "Review#4#2024-05-01T10:00:00.000Z");
        assert!(KeyBuilder::reviews_sk_condition().matches(&by_product.sk));
    }

    #[test]
    fn test_child_types() {
        assert_eq!(EntityType::Order.child_type(), Some(EntityType::OrderItem));
        assert_eq!(EntityType::Customer.child_type(), None);
    }

    #[test]
    fn test_builders_are_deterministic() {
        assert_eq!(KeyBuilder::order_sk("x"), KeyBuilder::order_sk("x"));
        assert_eq!(
            KeyBuilder::order_status_gsi2("SHIPPED", "2024-01-01"),
            IndexKey::new("Order#STATUS#SHIPPED", "2024-01-01")
        );
    }

    #[test]
    fn test_entity_type_round_trip() {
        for kind in [
            EntityType::Customer,
            EntityType::CustomerEmail,
            EntityType::Order,
            EntityType::OrderItem,
            EntityType::Product,
            EntityType::Review,
        ] {
            assert_eq!(kind.as_str().parse::<EntityType>().ok(), Some(kind));
        }
        assert!("User".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_primary_key_from_item() {
        let key = PrimaryKey::new("a", "b");
        assert_eq!(PrimaryKey::from_item(&key.to_item()).ok(), Some(key));

        let mut item = HashMap::new();
        let _ = item.insert("pk".to_string(), AttributeValue::N("1".into()));
        assert!(PrimaryKey::from_item(&item).is_err());
    }
}
