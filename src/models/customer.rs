use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::keys::{EntityType, KeyBuilder, KeySet};
use crate::models::{Address, BaseRecord, Record};

/// Customer profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Key fields and timestamps
    #[serde(flatten)]
    pub base: BaseRecord,
    /// Business identifier
    pub customer_id: String,
    /// Unique email, locked by a [`CustomerEmail`] record
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Contact number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Named addresses (`home`, `work`, ...)
    #[serde(default)]
    pub address: BTreeMap<String, Address>,
}

/// Input for creating a customer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    /// Business identifier
    pub customer_id: String,
    /// Unique email
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Contact number
    #[serde(default)]
    pub phone: Option<String>,
    /// Named addresses
    #[serde(default)]
    pub address: BTreeMap<String, Address>,
}

/// Changeable customer fields. The email is deliberately absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdate {
    /// New given name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// New family name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// New contact number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Replacement address map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<BTreeMap<String, Address>>,
}

impl CustomerUpdate {
    /// True when nothing would change.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
    }
}

impl Customer {
    /// New customer record with derived keys and fresh timestamps.
    pub fn create(new: NewCustomer) -> Self {
        let keys = KeySet::new(KeyBuilder::customer_key(&new.customer_id));
        Self {
            base: BaseRecord::new(EntityType::Customer, keys),
            customer_id: new.customer_id,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            address: new.address,
        }
    }

    /// `first last`
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Email lock record pointing back at this customer.
    pub fn email_lock(&self) -> CustomerEmail {
        CustomerEmail::create(&self.email, &self.customer_id)
    }
}

impl Record for Customer {
    const ENTITY_TYPE: EntityType = EntityType::Customer;

    fn base(&self) -> &BaseRecord {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseRecord {
        &mut self.base
    }

    fn derive_keys(&self) -> KeySet {
        KeySet::new(KeyBuilder::customer_key(&self.customer_id))
    }
}

/// Record reserving an email for one customer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerEmail {
    /// Key fields and timestamps
    #[serde(flatten)]
    pub base: BaseRecord,
    /// Reserved email
    pub email: String,
    /// Owner of the email
    pub customer_id: String,
}

impl CustomerEmail {
    /// New lock record.
    pub fn create(email: &str, customer_id: &str) -> Self {
        let keys = KeySet::new(KeyBuilder::customer_email_key(email));
        Self {
            base: BaseRecord::new(EntityType::CustomerEmail, keys),
            email: email.to_string(),
            customer_id: customer_id.to_string(),
        }
    }
}

impl Record for CustomerEmail {
    const ENTITY_TYPE: EntityType = EntityType::CustomerEmail;

    fn base(&self) -> &BaseRecord {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseRecord {
        &mut self.base
    }

    fn derive_keys(&self) -> KeySet {
        KeySet::new(KeyBuilder::customer_email_key(&self.email))
    }
}
