use tracing::{info, instrument};

use crate::Error;
use crate::keys::KeyBuilder;
use crate::models::{Customer, CustomerEmail, CustomerUpdate, NewCustomer, Record};
use crate::services::absent;
use crate::table::{Table, TransactEntry};

/// Customers and their email locks.
#[derive(Clone, Debug)]
pub struct CustomerService {
    table: Table,
}

impl CustomerService {
    /// Service over `table`.
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    /// Creates the customer and reserves its email in one transaction.
    ///
    /// Fails with [`Error::ConditionFailed`] and writes nothing when either the
    /// customer id or the email is taken.
    #[instrument(level = "debug", skip_all, fields(customer_id = %new.customer_id))]
    pub async fn create(&self, new: NewCustomer) -> Result<Customer, Error> {
        let customer = Customer::create(new);
        let lock = customer.email_lock();

        self.table
            .transact_write(vec![
                TransactEntry::put_if(customer.to_item()?, absent()),
                TransactEntry::put_if(lock.to_item()?, absent()),
            ])
            .await?;

        info!(customer_id = %customer.customer_id, "customer created");
        Ok(customer)
    }

    /// Customer by id.
    pub async fn get(&self, customer_id: &str) -> Result<Option<Customer>, Error> {
        self.table
            .get(&KeyBuilder::customer_key(customer_id))
            .await?
            .map(Customer::from_item)
            .transpose()
    }

    /// Customer owning `email`, resolved through its lock record.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, Error> {
        let Some(lock) = self
            .table
            .get(&KeyBuilder::customer_email_key(email))
            .await?
        else {
            return Ok(None);
        };
        let lock = CustomerEmail::from_item(lock)?;
        self.get(&lock.customer_id).await
    }

    /// Applies the present fields of `changes`.
    ///
    /// An empty update returns the stored customer unchanged. Fails with
    /// [`Error::NotFound`] when the customer does not exist.
    #[instrument(level = "debug", skip(self, changes))]
    pub async fn update(
        &self,
        customer_id: &str,
        changes: &CustomerUpdate,
    ) -> Result<Customer, Error> {
        let key = KeyBuilder::customer_key(customer_id);
        if changes.is_empty() {
            return self.get(customer_id).await?.ok_or(Error::NotFound(key));
        }
        self.table.update_record(&key, changes).await
    }

    /// Deletes the customer and releases its email.
    ///
    /// Returns `false` when there was no such customer.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, customer_id: &str) -> Result<bool, Error> {
        let Some(customer) = self.get(customer_id).await? else {
            return Ok(false);
        };
        self.table
            .transact_write(vec![
                TransactEntry::delete(customer.key()),
                TransactEntry::delete(KeyBuilder::customer_email_key(&customer.email)),
            ])
            .await?;

        info!(customer_id, "customer deleted");
        Ok(true)
    }
}
