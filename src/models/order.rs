use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::{EntityType, KeyBuilder, KeySet};
use crate::models::{Address, BaseRecord, Record};

/// Lifecycle of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, not yet confirmed
    Pending,
    /// Accepted
    Confirmed,
    /// Being prepared
    Processing,
    /// Handed to the carrier
    Shipped,
    /// Received by the customer
    Delivered,
    /// Cancelled before shipping
    Cancelled,
    /// Paid back
    Refunded,
}

impl OrderStatus {
    /// Wire value, also used in the GSI2 partition.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

/// Kind of payment instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    /// Credit card
    CreditCard,
    /// Debit card
    DebitCard,
    /// PayPal
    Paypal,
    /// Apple Pay
    ApplePay,
}

/// Payment instrument summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Instrument kind
    #[serde(rename = "type")]
    pub kind: PaymentType,
    /// Last four digits of a card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last4: Option<String>,
    /// Card brand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// Order header, stored in its customer's partition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Key fields and timestamps
    #[serde(flatten)]
    pub base: BaseRecord,
    /// Business identifier
    pub order_id: String,
    /// Owning customer
    pub customer_id: String,
    /// Current status
    pub status: OrderStatus,
    /// Sum charged
    pub total_amount: f64,
    /// ISO currency code
    pub currency: String,
    /// Delivery address
    pub shipping_address: Address,
    /// Payment used
    pub payment_method: PaymentMethod,
    /// Caller-supplied order date (ISO 8601)
    pub order_date: String,
    /// Set the first time the order ships
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_date: Option<DateTime<Utc>>,
    /// Set the first time the order is delivered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_date: Option<DateTime<Utc>>,
    /// Carrier tracking reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
}

/// Line item of an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Key fields and timestamps
    #[serde(flatten)]
    pub base: BaseRecord,
    /// Parent order
    pub order_id: String,
    /// Ordered product
    pub product_id: String,
    /// Product name at order time
    pub product_name: String,
    /// Units ordered
    pub quantity: u32,
    /// Price per unit
    pub unit_price: f64,
    /// Line total
    pub total_price: f64,
}

/// Input for one line of a new order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    /// Ordered product
    pub product_id: String,
    /// Product name at order time
    pub product_name: String,
    /// Units ordered
    pub quantity: u32,
    /// Price per unit
    pub unit_price: f64,
    /// Line total; `unit_price * quantity` when absent
    #[serde(default)]
    pub total_price: Option<f64>,
}

/// Input for creating an order with its items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// Business identifier
    pub order_id: String,
    /// Owning customer
    pub customer_id: String,
    /// Sum charged
    pub total_amount: f64,
    /// ISO currency code
    pub currency: String,
    /// Line items
    pub items: Vec<NewOrderItem>,
    /// Delivery address
    pub shipping_address: Address,
    /// Payment used
    pub payment_method: PaymentMethod,
    /// Order date (ISO 8601)
    pub order_date: String,
}

/// An order header with all of its items.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderWithItems {
    /// Header
    pub order: Order,
    /// Items, in GSI1 sort order
    pub items: Vec<OrderItem>,
}

impl Order {
    /// New pending order (without items).
    pub fn create(new: &NewOrder) -> Self {
        let mut order = Self {
            base: BaseRecord::new(
                EntityType::Order,
                KeySet::new(KeyBuilder::order_key(&new.customer_id, &new.order_id)),
            ),
            order_id: new.order_id.clone(),
            customer_id: new.customer_id.clone(),
            status: OrderStatus::Pending,
            total_amount: new.total_amount,
            currency: new.currency.clone(),
            shipping_address: new.shipping_address.clone(),
            payment_method: new.payment_method.clone(),
            order_date: new.order_date.clone(),
            shipped_date: None,
            delivered_date: None,
            tracking_number: None,
        };
        let keys = order.derive_keys();
        order.base.apply_keys(keys);
        order
    }

    /// Moves the order to `status`, re-keying its GSI2 entry.
    ///
    /// Shipping and delivery dates are stamped the first time those statuses
    /// are reached.
    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        let now = Utc::now();
        match status {
            OrderStatus::Shipped if self.shipped_date.is_none() => self.shipped_date = Some(now),
            OrderStatus::Delivered if self.delivered_date.is_none() => {
                self.delivered_date = Some(now)
            }
            _ => {}
        }
        self.restamp();
    }

    /// Records the carrier reference.
    pub fn add_tracking_number(&mut self, tracking_number: impl Into<String>) {
        self.tracking_number = Some(tracking_number.into());
        self.base.touch();
    }
}

impl Record for Order {
    const ENTITY_TYPE: EntityType = EntityType::Order;

    fn base(&self) -> &BaseRecord {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseRecord {
        &mut self.base
    }

    fn derive_keys(&self) -> KeySet {
        KeySet::new(KeyBuilder::order_key(&self.customer_id, &self.order_id))
            .with_gsi1(KeyBuilder::order_gsi1(&self.order_id))
            .with_gsi2(KeyBuilder::order_status_gsi2(
                self.status.as_str(),
                &self.order_date,
            ))
    }
}

impl OrderItem {
    /// New line item of `order_id`.
    pub fn create(order_id: &str, new: &NewOrderItem) -> Self {
        let keys = KeySet::new(KeyBuilder::order_item_key(order_id, &new.product_id))
            .with_gsi1(KeyBuilder::order_item_gsi1(order_id, &new.product_id));
        Self {
            base: BaseRecord::new(EntityType::OrderItem, keys),
            order_id: order_id.to_string(),
            product_id: new.product_id.clone(),
            product_name: new.product_name.clone(),
            quantity: new.quantity,
            unit_price: new.unit_price,
            total_price: new
                .total_price
                .unwrap_or(new.unit_price * f64::from(new.quantity)),
        }
    }
}

impl Record for OrderItem {
    const ENTITY_TYPE: EntityType = EntityType::OrderItem;

    fn base(&self) -> &BaseRecord {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseRecord {
        &mut self.base
    }

    fn derive_keys(&self) -> KeySet {
        KeySet::new(KeyBuilder::order_item_key(&self.order_id, &self.product_id))
            .with_gsi1(KeyBuilder::order_item_gsi1(&self.order_id, &self.product_id))
    }
}
