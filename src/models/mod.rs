//! Typed records of the single table.
//!
//! Every record flattens a [`BaseRecord`] carrying the physical key fields,
//! the `entityType` discriminator and timestamps. Key fields are always
//! derived through [`Record::derive_keys`], never set by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::Error;
use crate::keys::{EntityType, IndexKey, KeySet, PrimaryKey};
use crate::table::Item;

mod customer;
mod order;
mod product;
mod review;

pub use customer::{Customer, CustomerEmail, CustomerUpdate, NewCustomer};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, OrderWithItems, PaymentMethod,
    PaymentType,
};
pub use product::{AttributeKind, NewProduct, Product, ProductAttribute, ProductStatus};
pub use review::{MAX_RATING, MIN_RATING, NewReview, Review};

/// Postal address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Street and number
    pub street: String,
    /// City
    pub city: String,
    /// State or region
    pub state: String,
    /// Postal code
    pub zip_code: String,
    /// Country
    pub country: String,
}

/// Fields shared by every record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseRecord {
    /// Partition key
    pub pk: String,
    /// Sort key
    pub sk: String,
    /// GSI1 partition key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gsi1pk: Option<String>,
    /// GSI1 sort key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gsi1sk: Option<String>,
    /// GSI2 partition key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gsi2pk: Option<String>,
    /// GSI2 sort key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gsi2sk: Option<String>,
    /// Record kind
    pub entity_type: EntityType,
    /// Set once at creation
    pub created_at: DateTime<Utc>,
    /// Refreshed on every modification
    pub updated_at: DateTime<Utc>,
}

impl BaseRecord {
    /// Fresh base with `createdAt == updatedAt == now`.
    pub fn new(entity_type: EntityType, keys: KeySet) -> Self {
        let now = Utc::now();
        let mut base = Self {
            pk: String::new(),
            sk: String::new(),
            gsi1pk: None,
            gsi1sk: None,
            gsi2pk: None,
            gsi2sk: None,
            entity_type,
            created_at: now,
            updated_at: now,
        };
        base.apply_keys(keys);
        base
    }

    /// Overwrites every key field.
    pub fn apply_keys(&mut self, keys: KeySet) {
        let KeySet {
            primary,
            gsi1,
            gsi2,
        } = keys;
        self.pk = primary.pk;
        self.sk = primary.sk;
        (self.gsi1pk, self.gsi1sk) = split(gsi1);
        (self.gsi2pk, self.gsi2sk) = split(gsi2);
    }

    /// Table key of the record.
    pub fn key(&self) -> PrimaryKey {
        PrimaryKey::new(self.pk.clone(), self.sk.clone())
    }

    /// Marks a modification; `updatedAt` never moves backwards.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }
}

fn split(key: Option<IndexKey>) -> (Option<String>, Option<String>) {
    match key {
        Some(IndexKey { pk, sk }) => (Some(pk), Some(sk)),
        None => (None, None),
    }
}

/// A typed record kind.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Discriminator written to `entityType`
    const ENTITY_TYPE: EntityType;

    /// Shared fields.
    fn base(&self) -> &BaseRecord;

    /// Shared fields, mutably.
    fn base_mut(&mut self) -> &mut BaseRecord;

    /// Key fields computed from the record's business identifiers.
    fn derive_keys(&self) -> KeySet;

    /// Table key of the record.
    fn key(&self) -> PrimaryKey {
        self.base().key()
    }

    /// Recomputes key fields after business fields changed.
    fn restamp(&mut self) {
        let keys = self.derive_keys();
        let base = self.base_mut();
        base.apply_keys(keys);
        base.touch();
    }

    /// Serializes into a table item.
    fn to_item(&self) -> Result<Item, Error> {
        Ok(serde_dynamo::to_item(self)?)
    }

    /// Deserializes from a table item, checking the discriminator.
    fn from_item(item: Item) -> Result<Self, Error> {
        let found = EntityType::of_item(&item)?;
        if found != Self::ENTITY_TYPE {
            return Err(Error::invalid(format!(
                "expected a {} record, found {found}",
                Self::ENTITY_TYPE
            )));
        }
        Ok(serde_dynamo::from_item(item)?)
    }
}

/// Any record of the table, decoded by its `entityType`.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    /// Customer profile
    Customer(Customer),
    /// Email uniqueness lock
    CustomerEmail(CustomerEmail),
    /// Order header
    Order(Order),
    /// Order line item
    OrderItem(OrderItem),
    /// Catalogue product
    Product(Product),
    /// Product review
    Review(Review),
}

impl Entity {
    /// Decodes an untyped item.
    pub fn from_item(item: Item) -> Result<Self, Error> {
        let entity = match EntityType::of_item(&item)? {
            EntityType::Customer => Entity::Customer(serde_dynamo::from_item(item)?),
            EntityType::CustomerEmail => Entity::CustomerEmail(serde_dynamo::from_item(item)?),
            EntityType::Order => Entity::Order(serde_dynamo::from_item(item)?),
            EntityType::OrderItem => Entity::OrderItem(serde_dynamo::from_item(item)?),
            EntityType::Product => Entity::Product(serde_dynamo::from_item(item)?),
            EntityType::Review => Entity::Review(serde_dynamo::from_item(item)?),
        };
        Ok(entity)
    }

    /// Kind of the record.
    pub fn entity_type(&self) -> EntityType {
        self.base().entity_type
    }

    /// Shared fields.
    pub fn base(&self) -> &BaseRecord {
        match self {
            Entity::Customer(r) => r.base(),
            Entity::CustomerEmail(r) => r.base(),
            Entity::Order(r) => r.base(),
            Entity::OrderItem(r) => r.base(),
            Entity::Product(r) => r.base(),
            Entity::Review(r) => r.base(),
        }
    }

    /// Key fields the record should carry.
    pub fn derive_keys(&self) -> KeySet {
        match self {
            Entity::Customer(r) => r.derive_keys(),
            Entity::CustomerEmail(r) => r.derive_keys(),
            Entity::Order(r) => r.derive_keys(),
            Entity::OrderItem(r) => r.derive_keys(),
            Entity::Product(r) => r.derive_keys(),
            Entity::Review(r) => r.derive_keys(),
        }
    }

    /// Serializes into a table item.
    pub fn to_item(&self) -> Result<Item, Error> {
        match self {
            Entity::Customer(r) => r.to_item(),
            Entity::CustomerEmail(r) => r.to_item(),
            Entity::Order(r) => r.to_item(),
            Entity::OrderItem(r) => r.to_item(),
            Entity::Product(r) => r.to_item(),
            Entity::Review(r) => r.to_item(),
        }
    }
}
