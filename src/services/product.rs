use tracing::instrument;

use crate::Error;
use crate::keys::KeyBuilder;
use crate::models::{NewProduct, Product, Record};
use crate::services::absent;
use crate::table::{OutputItems, QueryOptions, Table, TransactEntry};

/// Product catalogue.
#[derive(Clone, Debug)]
pub struct ProductService {
    table: Table,
}

impl ProductService {
    /// Service over `table`.
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    /// Adds a product; [`Error::ConditionFailed`] if the id is taken.
    #[instrument(level = "debug", skip_all, fields(product_id = %new.product_id))]
    pub async fn create(&self, new: NewProduct) -> Result<Product, Error> {
        let product = Product::create(new);
        self.table
            .transact_write(vec![TransactEntry::put_if(product.to_item()?, absent())])
            .await?;
        Ok(product)
    }

    /// Product by id.
    pub async fn get(&self, product_id: &str) -> Result<Option<Product>, Error> {
        self.table
            .get(&KeyBuilder::product_key(product_id))
            .await?
            .map(Product::from_item)
            .transpose()
    }

    /// One page of a category, ordered by brand then name.
    pub async fn list_by_category(
        &self,
        category: &str,
        options: QueryOptions,
    ) -> Result<OutputItems<Product>, Error> {
        self.table
            .query_gsi1(&KeyBuilder::product_category_gsi1_pk(category), None, options)
            .await?
            .decode()
    }

    /// One page of a brand, ordered by category then name.
    pub async fn list_by_brand(
        &self,
        brand: &str,
        options: QueryOptions,
    ) -> Result<OutputItems<Product>, Error> {
        self.table
            .query_gsi2(&KeyBuilder::product_brand_gsi2_pk(brand), None, options)
            .await?
            .decode()
    }

    /// Sets the stock level; fails with [`Error::NotFound`] for unknown ids.
    #[instrument(level = "debug", skip(self))]
    pub async fn update_stock(&self, product_id: &str, stock: u32) -> Result<Product, Error> {
        let key = KeyBuilder::product_key(product_id);
        let Some(mut product) = self.table.get_record::<Product>(&key).await? else {
            return Err(Error::NotFound(key));
        };
        product.update_stock(stock);
        self.table.put_record(&product).await?;
        Ok(product)
    }
}
