use serde::{Deserialize, Serialize};

use crate::keys::{EntityType, KeyBuilder, KeySet};
use crate::models::{BaseRecord, Record};

/// Sales state of a product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    /// On sale
    #[default]
    Active,
    /// Hidden from the catalogue
    Inactive,
    /// On sale but no stock left
    OutOfStock,
    /// No longer sold
    Discontinued,
}

/// How a [`ProductAttribute`] value is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeKind {
    /// Free text
    Text,
    /// Decimal number
    Number,
    /// `true` or `false`
    Boolean,
    /// Colour name or code
    Color,
    /// Size label
    Size,
}

/// Free-form product property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAttribute {
    /// Property name
    pub name: String,
    /// Property value
    pub value: String,
    /// How to interpret the value
    #[serde(rename = "type")]
    pub kind: AttributeKind,
}

/// Catalogue product, browsable by category (GSI1) and brand (GSI2).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Shared record fields
    #[serde(flatten)]
    pub base: BaseRecord,
    /// Product id
    pub product_id: String,
    /// Display name
    pub name: String,
    /// Long description
    pub description: String,
    /// Catalogue category
    pub category: String,
    /// Brand or publisher
    pub brand: String,
    /// Unit price
    pub price: f64,
    /// ISO currency code of `price`
    pub currency: String,
    /// Stock keeping unit
    pub sku: String,
    /// Units in stock
    pub stock: u32,
    /// Image URLs
    #[serde(default)]
    pub images: Vec<String>,
    /// Extra properties
    #[serde(default)]
    pub attributes: Vec<ProductAttribute>,
    /// Sales state
    pub status: ProductStatus,
    /// Mean review rating, one decimal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    /// Reviews counted in `average_rating`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u32>,
    /// Search tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Input for creating a product.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    /// Product id
    pub product_id: String,
    /// Display name
    pub name: String,
    /// Long description
    pub description: String,
    /// Catalogue category
    pub category: String,
    /// Brand or publisher
    pub brand: String,
    /// Unit price
    pub price: f64,
    /// ISO currency code of `price`
    pub currency: String,
    /// Stock keeping unit
    pub sku: String,
    /// Units in stock
    pub stock: u32,
    /// Image URLs
    #[serde(default)]
    pub images: Vec<String>,
    /// Extra properties
    #[serde(default)]
    pub attributes: Vec<ProductAttribute>,
    /// Initial sales state
    #[serde(default)]
    pub status: ProductStatus,
    /// Search tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Product {
    /// New product record with category and brand index keys.
    pub fn create(new: NewProduct) -> Self {
        let mut product = Self {
            base: BaseRecord::new(
                EntityType::Product,
                KeySet::new(KeyBuilder::product_key(&new.product_id)),
            ),
            product_id: new.product_id,
            name: new.name,
            description: new.description,
            category: new.category,
            brand: new.brand,
            price: new.price,
            currency: new.currency,
            sku: new.sku,
            stock: new.stock,
            images: new.images,
            attributes: new.attributes,
            status: new.status,
            average_rating: None,
            review_count: None,
            tags: new.tags,
        };
        let keys = product.derive_keys();
        product.base.apply_keys(keys);
        product
    }

    /// Sets the stock level, toggling between active and out of stock.
    pub fn update_stock(&mut self, stock: u32) {
        self.stock = stock;
        self.status = match (stock, self.status) {
            (0, ProductStatus::Active) => ProductStatus::OutOfStock,
            (1.., ProductStatus::OutOfStock) => ProductStatus::Active,
            (_, status) => status,
        };
        self.base.touch();
    }

    /// Records review aggregates, rounding the rating to one decimal.
    pub fn update_rating(&mut self, average_rating: f64, review_count: u32) {
        self.average_rating = Some((average_rating * 10.0).round() / 10.0);
        self.review_count = Some(review_count);
        self.base.touch();
    }

    /// Sellable right now.
    pub fn is_in_stock(&self) -> bool {
        self.stock > 0 && self.status == ProductStatus::Active
    }
}

impl Record for Product {
    const ENTITY_TYPE: EntityType = EntityType::Product;

    fn base(&self) -> &BaseRecord {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseRecord {
        &mut self.base
    }

    fn derive_keys(&self) -> KeySet {
        KeySet::new(KeyBuilder::product_key(&self.product_id))
            .with_gsi1(KeyBuilder::product_category_gsi1(
                &self.category,
                &self.brand,
                &self.name,
            ))
            .with_gsi2(KeyBuilder::product_brand_gsi2(
                &self.brand,
                &self.category,
                &self.name,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dune(stock: u32) -> Product {
        Product::create(NewProduct {
            product_id: "p1".into(),
            name: "Dune".into(),
            category: "books".into(),
            brand: "Ace".into(),
            price: 9.99,
            currency: "EUR".into(),
            stock,
            ..NewProduct::default()
        })
    }

    #[test]
    fn test_product_index_keys() {
        let product = dune(3);
        assert_eq!(product.base.sk, "Product#DETAILS");
        assert_eq!(product.base.gsi1pk.as_deref(), Some("Product#CATEGORY#books"));
        assert_eq!(product.base.gsi1sk.as_deref(), Some("Ace#Dune"));
        assert_eq!(product.base.gsi2pk.as_deref(), Some("Product#BRAND#Ace"));
        assert_eq!(product.base.gsi2sk.as_deref(), Some("books#Dune"));
    }

    #[test]
    fn test_stock_transitions() {
        let mut product = dune(1);
        assert!(product.is_in_stock());

        product.update_stock(0);
        assert_eq!(product.status, ProductStatus::OutOfStock);
        assert!(!product.is_in_stock());

        product.update_stock(5);
        assert_eq!(product.status, ProductStatus::Active);

        product.status = ProductStatus::Discontinued;
        product.update_stock(0);
        assert_eq!(product.status, ProductStatus::Discontinued);
    }

    #[test]
    fn test_rating_rounds() {
        let mut product = dune(1);
        product.update_rating(4.26, 12);
        assert_eq!(product.average_rating, Some(4.3));
        assert_eq!(product.review_count, Some(12));
    }
}
