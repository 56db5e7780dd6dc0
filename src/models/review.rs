use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::keys::{EntityType, KeyBuilder, KeySet};
use crate::models::{BaseRecord, Record};

/// Lowest allowed star rating
pub const MIN_RATING: u8 = 1;
/// Highest allowed star rating
pub const MAX_RATING: u8 = 5;

/// A customer's review of a product.
///
/// Listed per customer on GSI1 (by date) and per product on GSI2 (by rating,
/// then date).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Shared record fields
    #[serde(flatten)]
    pub base: BaseRecord,
    /// Review id
    pub review_id: String,
    /// Reviewed product
    pub product_id: String,
    /// Author
    pub customer_id: String,
    /// Stars, 1 to 5
    pub rating: u8,
    /// Headline
    pub title: String,
    /// Body text
    pub content: String,
    /// The author bought the product
    #[serde(default)]
    pub verified: bool,
    /// Times other customers marked the review helpful
    #[serde(default)]
    pub helpful_count: u32,
    /// Image URLs
    #[serde(default)]
    pub images: Vec<String>,
}

/// Input for creating a review.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    /// Review id
    pub review_id: String,
    /// Reviewed product
    pub product_id: String,
    /// Author
    pub customer_id: String,
    /// Stars, 1 to 5
    pub rating: u8,
    /// Headline
    pub title: String,
    /// Body text
    pub content: String,
    /// The author bought the product
    #[serde(default)]
    pub verified: bool,
    /// Image URLs
    #[serde(default)]
    pub images: Vec<String>,
}

impl Review {
    /// New review with its customer and product index keys.
    ///
    /// Fails with [`Error::InvalidRequest`] for a rating outside 1 to 5.
    pub fn create(new: NewReview) -> Result<Self, Error> {
        if !(MIN_RATING..=MAX_RATING).contains(&new.rating) {
            return Err(Error::invalid(format!(
                "rating {} is outside {MIN_RATING}..={MAX_RATING}",
                new.rating
            )));
        }
        let mut review = Self {
            base: BaseRecord::new(
                EntityType::Review,
                KeySet::new(KeyBuilder::review_key(&new.review_id)),
            ),
            review_id: new.review_id,
            product_id: new.product_id,
            customer_id: new.customer_id,
            rating: new.rating,
            title: new.title,
            content: new.content,
            verified: new.verified,
            helpful_count: 0,
            images: new.images,
        };
        let keys = review.derive_keys();
        review.base.apply_keys(keys);
        Ok(review)
    }

    /// Adjusts the helpful counter, never below zero.
    pub fn mark_helpful(&mut self, delta: i32) {
        self.helpful_count = self.helpful_count.saturating_add_signed(delta);
        self.base.touch();
    }

    /// Four stars or more.
    pub fn is_high_rating(&self) -> bool {
        self.rating >= 4
    }

    fn created_stamp(&self) -> String {
        self.base
            .created_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl Record for Review {
    const ENTITY_TYPE: EntityType = EntityType::Review;

    fn base(&self) -> &BaseRecord {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseRecord {
        &mut self.base
    }

    fn derive_keys(&self) -> KeySet {
        let created = self.created_stamp();
        KeySet::new(KeyBuilder::review_key(&self.review_id))
            .with_gsi1(KeyBuilder::customer_reviews_gsi1(&self.customer_id, &created))
            .with_gsi2(KeyBuilder::product_reviews_gsi2(
                &self.product_id,
                self.rating,
                &created,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: u8) -> Result<Review, Error> {
        Review::create(NewReview {
            review_id: "r1".into(),
            product_id: "p1".into(),
            customer_id: "c1".into(),
            rating,
            title: "Great".into(),
            content: "Read it twice".into(),
            ..NewReview::default()
        })
    }

    #[test]
    fn test_review_index_keys() {
        let review = review(4).unwrap();
        assert_eq!(review.base.pk, "Review#r1");
        assert_eq!(review.base.gsi1pk.as_deref(), Some("Customer#c1"));
        assert_eq!(review.base.gsi2pk.as_deref(), Some("Product#p1"));
        assert!(review.base.gsi2sk.as_deref().unwrap().starts_with("Review#4#"));
        assert!(review.is_high_rating());
    }

    #[test]
    fn test_rating_bounds() {
        assert!(review(0).is_err());
        assert!(review(6).is_err());
        assert!(!review(1).unwrap().is_high_rating());
    }

    #[test]
    fn test_helpful_count_stays_non_negative() {
        let mut review = review(5).unwrap();
        review.mark_helpful(2);
        review.mark_helpful(-5);
        assert_eq!(review.helpful_count, 0);
    }
}
