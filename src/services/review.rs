use tracing::{info, instrument};

use crate::Error;
use crate::keys::KeyBuilder;
use crate::models::{NewReview, Product, Record, Review};
use crate::services::absent;
use crate::table::{Index, OutputItems, QueryOptions, QueryRequest, Table, TransactEntry};

/// Product reviews and the rating summary kept on each product.
#[derive(Clone, Debug)]
pub struct ReviewService {
    table: Table,
}

impl ReviewService {
    /// Service over `table`.
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    /// Stores a review; [`Error::ConditionFailed`] if the id is taken.
    #[instrument(level = "debug", skip_all, fields(review_id = %new.review_id))]
    pub async fn create(&self, new: NewReview) -> Result<Review, Error> {
        let review = Review::create(new)?;
        self.table
            .transact_write(vec![TransactEntry::put_if(review.to_item()?, absent())])
            .await?;
        Ok(review)
    }

    /// Review by id.
    pub async fn get(&self, review_id: &str) -> Result<Option<Review>, Error> {
        self.table
            .get(&KeyBuilder::review_key(review_id))
            .await?
            .map(Review::from_item)
            .transpose()
    }

    /// One page of a product's reviews, ordered by rating then date.
    pub async fn list_for_product(
        &self,
        product_id: &str,
        options: QueryOptions,
    ) -> Result<OutputItems<Review>, Error> {
        self.table
            .query_gsi2(
                &KeyBuilder::product_pk(product_id),
                Some(KeyBuilder::reviews_sk_prefix()),
                options,
            )
            .await?
            .decode()
    }

    /// One page of a customer's reviews, oldest first.
    pub async fn list_by_customer(
        &self,
        customer_id: &str,
        options: QueryOptions,
    ) -> Result<OutputItems<Review>, Error> {
        self.table
            .query_gsi1(
                &KeyBuilder::customer_pk(customer_id),
                Some(KeyBuilder::reviews_sk_prefix()),
                options,
            )
            .await?
            .decode()
    }

    /// Adds `delta` to the helpful counter; [`Error::NotFound`] for unknown ids.
    #[instrument(level = "debug", skip(self))]
    pub async fn mark_helpful(&self, review_id: &str, delta: i32) -> Result<Review, Error> {
        let key = KeyBuilder::review_key(review_id);
        let Some(mut review) = self.table.get_record::<Review>(&key).await? else {
            return Err(Error::NotFound(key));
        };
        review.mark_helpful(delta);
        self.table.put_record(&review).await?;
        Ok(review)
    }

    /// Recomputes a product's average rating and review count from its reviews.
    ///
    /// A product without reviews is returned unchanged.
    #[instrument(level = "debug", skip(self))]
    pub async fn refresh_product_rating(&self, product_id: &str) -> Result<Product, Error> {
        let key = KeyBuilder::product_key(product_id);
        let Some(mut product) = self.table.get_record::<Product>(&key).await? else {
            return Err(Error::NotFound(key));
        };

        let request = QueryRequest::new(Index::Gsi2, KeyBuilder::product_pk(product_id))
            .sort_key(KeyBuilder::reviews_sk_condition());
        let reviews = self
            .table
            .query_all(request)
            .await?
            .into_iter()
            .map(Review::from_item)
            .collect::<Result<Vec<_>, _>>()?;
        if reviews.is_empty() {
            return Ok(product);
        }

        let total: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
        let count = u32::try_from(reviews.len())
            .map_err(|_| Error::invalid("review count overflows u32"))?;
        product.update_rating(f64::from(total) / f64::from(count), count);
        self.table.put_record(&product).await?;

        info!(product_id, count, "product rating refreshed");
        Ok(product)
    }

    /// Removes a review; `false` when it did not exist.
    pub async fn delete(&self, review_id: &str) -> Result<bool, Error> {
        let key = KeyBuilder::review_key(review_id);
        if self.table.get(&key).await?.is_none() {
            return Ok(false);
        }
        self.table.delete(&key).await?;
        Ok(true)
    }
}
