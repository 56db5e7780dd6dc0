mod backend;
mod batch;
mod dynamo;
mod gsi;
pub(crate) mod helpers;
mod memory;
mod operations;
mod types;

pub use backend::{Backend, BatchGetOutput, QueryRequest, TransactEntry, WriteOp};
pub use batch::BatchWriteOutput;
pub use dynamo::DynamoBackend;
pub use memory::MemoryBackend;
pub use operations::Table;
pub use types::{
    Index, Item, OutputItems, PageToken, QueryOptions, RetryPolicy, SortKeyCondition,
};
