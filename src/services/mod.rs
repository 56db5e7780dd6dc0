//! Entity services.
//!
//! Thin call sites: each assembles keys for one entity family and delegates to
//! the [`Table`](crate::Table) or the [`AggregateWriter`](crate::AggregateWriter).

mod customer;
mod order;
mod product;
mod review;

pub use customer::CustomerService;
pub use order::OrderService;
pub use product::ProductService;
pub use review::ReviewService;

use crate::condition::ConditionExpressionBuilder;
use crate::keys::attr;

/// Guard rejecting a put onto an existing key.
fn absent() -> ConditionExpressionBuilder {
    ConditionExpressionBuilder::attribute_not_exists(attr::PK)
}
