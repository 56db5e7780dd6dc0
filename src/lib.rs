//! # Single-table data access layer
//!
//! Customers, orders with their line items and products share one DynamoDB
//! table. This crate provides:
//! - Key construction for every record kind and both sparse secondary indexes
//! - A composable condition expression builder
//! - A storage engine with chunked batch writes and reads, bounded retry of
//!   unprocessed requests, transactions, pagination and streaming
//! - Parent + children writes that are atomic up to the transaction limit and
//!   compensated beyond it
//! - Typed records and thin entity services
//!
//! The engine talks to the store through the [`Backend`] trait.
//! [`DynamoBackend`] uses the AWS SDK, [`MemoryBackend`] keeps everything in
//! process and is what tests run against.
//!
//! ## Quick Start
//!
//! ```rust
//! use single_table_dal::models::{NewCustomer, NewOrder};
//! use single_table_dal::services::{CustomerService, OrderService};
//! use single_table_dal::{Error, Table};
//!
//! # async fn example(order: NewOrder) -> Result<(), Error> {
//! let table = Table::in_memory();
//!
//! let customers = CustomerService::new(table.clone());
//! let ada = customers
//!     .create(NewCustomer {
//!         customer_id: "c1".into(),
//!         email: "ada@example.com".into(),
//!         first_name: "Ada".into(),
//!         last_name: "Lovelace".into(),
//!         ..NewCustomer::default()
//!     })
//!     .await?;
//! assert!(customers.find_by_email(&ada.email).await?.is_some());
//!
//! let orders = OrderService::new(table);
//! let created = orders.create(order).await?;
//! let loaded = orders.get(&created.order.order_id).await?;
//! assert_eq!(loaded.map(|o| o.items.len()), Some(created.items.len()));
//! # Ok(())
//! # }
//! ```
//!
//! Against a real table:
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), single_table_dal::Error> {
//! let config = single_table_dal::StoreConfig::from_env();
//! single_table_dal::setup::create_table(&config.client().await, &config.table_name).await?;
//! let table = config.connect().await;
//! # Ok(())
//! # }
//! ```
#![warn(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    deprecated,
    unknown_lints,
    unreachable_code,
    unused_mut
)]

mod error;
pub use error::{AggregateOperation, AggregateWriteFailure, Error, PartialBatchFailure};

/// Key builder and key types
pub mod keys;

/// Condition expressions
pub mod condition;

/// Storage access engine
pub mod table;

/// Parent + children writes
pub mod aggregate;

pub mod models;

pub mod services;

pub mod config;

pub mod setup;

pub use aggregate::{Aggregate, AggregateWriter, WriteStrategy};
pub use condition::{ConditionExpression, ConditionExpressionBuilder};
pub use config::StoreConfig;
pub use keys::{EntityType, IndexKey, KeyBuilder, KeySet, PrimaryKey};
pub use table::{
    Backend, BatchWriteOutput, DynamoBackend, Index, Item, MemoryBackend, OutputItems,
    PageToken, QueryOptions, QueryRequest, RetryPolicy, SortKeyCondition, Table, TransactEntry,
};
