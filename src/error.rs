use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::delete_table::DeleteTableError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use serde_dynamo::Error as SerdeDynamoError;
use std::error::Error as StdError;
use std::fmt;

use crate::keys::PrimaryKey;

type DynamoPutError = SdkError<PutItemError, Response>;
type DynamoUpdateError = SdkError<UpdateItemError, Response>;
type DynamoGetError = SdkError<GetItemError, Response>;
type DynamoQueryError = SdkError<QueryError, Response>;
type DynamoScanError = SdkError<ScanError, Response>;
type DynamoDeleteItemError = SdkError<DeleteItemError, Response>;
type DynamoCreateTableError = SdkError<CreateTableError, Response>;
type DynamoDeleteTableError = SdkError<DeleteTableError, Response>;
type DynamoBatchWriteItemError = SdkError<BatchWriteItemError, Response>;
type DynamoBatchGetItemError = SdkError<BatchGetItemError, Response>;
type DynamoTransactWriteError = SdkError<TransactWriteItemsError, Response>;

/// Data access error
///
/// The domain variants (`NotFound`, `ConditionFailed`, `PartialBatch`,
/// `AggregateWrite`, `InvalidRequest`) are what callers normally branch on.
/// Store and serialization failures are kept with their original SDK error.
#[derive(Debug)]
pub enum Error {
    /// Update targeted a key that does not exist
    NotFound(PrimaryKey),
    /// A guard condition (uniqueness, existence) did not hold; nothing was written
    ConditionFailed(String),
    /// Batch write gave up after exhausting its retries
    PartialBatch(Box<PartialBatchFailure>),
    /// Multi-step aggregate write failed after at least one step was applied
    AggregateWrite(Box<AggregateWriteFailure>),
    /// Request rejected before reaching the store
    InvalidRequest(String),
    /// Serde DynamoDB serialization/deserialization error
    SerdeDynamo(SerdeDynamoError),
    /// DynamoDB request builder error
    BuildError(BuildError),
    /// DynamoDB PutItem operation error
    DynamoPutError(DynamoPutError),
    /// DynamoDB GetItem operation error
    DynamoGetError(DynamoGetError),
    /// DynamoDB Query operation error
    DynamoQueryError(DynamoQueryError),
    /// DynamoDB Scan operation error
    DynamoScanError(DynamoScanError),
    /// DynamoDB UpdateItem operation error
    DynamoUpdateError(DynamoUpdateError),
    /// DynamoDB DeleteItem operation error
    DynamoDeleteItemError(DynamoDeleteItemError),
    /// DynamoDB CreateTable operation error
    DynamoCreateTableError(DynamoCreateTableError),
    /// DynamoDB DeleteTable operation error
    DynamoDeleteTableError(DynamoDeleteTableError),
    /// DynamoDB BatchWriteItem operation error
    DynamoBatchWriteItemError(DynamoBatchWriteItemError),
    /// DynamoDB BatchGetItem operation error
    DynamoBatchGetItemError(DynamoBatchGetItemError),
    /// DynamoDB TransactWriteItems operation error
    DynamoTransactWriteError(DynamoTransactWriteError),
}

/// Keys left behind by a batch write that ran out of retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialBatchFailure {
    /// Keys the store kept returning as unprocessed
    pub unprocessed: Vec<PrimaryKey>,
    /// Keys in later chunks that were never sent
    pub not_attempted: Vec<PrimaryKey>,
    /// Attempts spent on the failing chunk
    pub attempts: usize,
}

/// Which aggregate operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOperation {
    /// Parent + children creation
    Create,
    /// Parent + children removal
    Delete,
}

impl fmt::Display for AggregateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateOperation::Create => f.write_str("create"),
            AggregateOperation::Delete => f.write_str("delete"),
        }
    }
}

/// Failure of a non-atomic aggregate write.
///
/// `source` is the error that stopped the write. When `cleanup_attempted` is
/// set, compensation ran and `cleanup_errors` lists the undo steps that
/// themselves failed; an empty list means the partial write was rolled back.
#[derive(Debug)]
pub struct AggregateWriteFailure {
    /// Operation that failed
    pub operation: AggregateOperation,
    /// Parent key of the aggregate
    pub parent: PrimaryKey,
    /// Error that interrupted the write
    pub source: Error,
    /// Whether compensating deletes were executed
    pub cleanup_attempted: bool,
    /// Errors raised by compensation steps
    pub cleanup_errors: Vec<Error>,
}

impl AggregateWriteFailure {
    /// True when compensation ran and every undo step succeeded.
    pub fn rolled_back(&self) -> bool {
        self.cleanup_attempted && self.cleanup_errors.is_empty()
    }
}

impl Error {
    /// Check if the error reports a missing item
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if the error is a failed guard condition
    ///
    /// Covers both the mapped [`Error::ConditionFailed`] variant and raw
    /// `ConditionalCheckFailedException`s surfaced by single-item calls.
    pub fn is_condition_failed(&self) -> bool {
        match self {
            Error::ConditionFailed(_) => true,
            Error::DynamoPutError(e) => matches!(
                e.as_service_error(),
                Some(PutItemError::ConditionalCheckFailedException(_))
            ),
            Error::DynamoUpdateError(e) => matches!(
                e.as_service_error(),
                Some(UpdateItemError::ConditionalCheckFailedException(_))
            ),
            Error::DynamoDeleteItemError(e) => matches!(
                e.as_service_error(),
                Some(DeleteItemError::ConditionalCheckFailedException(_))
            ),
            _ => false,
        }
    }

    /// Check if the error left the store partially written
    ///
    /// True for exhausted batch writes and for aggregate writes that failed
    /// after their first step. Errors from the atomic paths never are.
    pub fn is_partial_write(&self) -> bool {
        matches!(self, Error::PartialBatch(_) | Error::AggregateWrite(_))
    }

    /// Check if the error is a serialization/deserialization error
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Error::SerdeDynamo(_))
    }

    /// Check if the error came from the DynamoDB SDK
    pub fn is_dynamodb_error(&self) -> bool {
        !matches!(
            self,
            Error::NotFound(_)
                | Error::ConditionFailed(_)
                | Error::PartialBatch(_)
                | Error::AggregateWrite(_)
                | Error::InvalidRequest(_)
                | Error::SerdeDynamo(_)
        )
    }

    /// Aggregate failure details, if any
    pub fn aggregate_failure(&self) -> Option<&AggregateWriteFailure> {
        match self {
            Error::AggregateWrite(failure) => Some(failure),
            _ => None,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidRequest(message.into())
    }
}

macro_rules! impl_from_error {
    ($name:ident, $variant:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$variant(e)
            }
        }
    };
    ($name:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$name(e)
            }
        }
    };
}

impl_from_error!(SerdeDynamoError, SerdeDynamo);
impl_from_error!(BuildError);
impl_from_error!(DynamoPutError);
impl_from_error!(DynamoGetError);
impl_from_error!(DynamoUpdateError);
impl_from_error!(DynamoQueryError);
impl_from_error!(DynamoScanError);
impl_from_error!(DynamoDeleteItemError);
impl_from_error!(DynamoCreateTableError);
impl_from_error!(DynamoDeleteTableError);
impl_from_error!(DynamoBatchWriteItemError);
impl_from_error!(DynamoBatchGetItemError);
impl_from_error!(DynamoTransactWriteError);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(key) => write!(f, "item not found: {key}"),
            Error::ConditionFailed(message) => write!(f, "condition check failed: {message}"),
            Error::PartialBatch(failure) => write!(
                f,
                "batch write incomplete after {} attempts: {} unprocessed, {} not attempted",
                failure.attempts,
                failure.unprocessed.len(),
                failure.not_attempted.len()
            ),
            Error::AggregateWrite(failure) => write!(
                f,
                "aggregate {} of {} failed (cleanup attempted: {}, cleanup errors: {}): {}",
                failure.operation,
                failure.parent,
                failure.cleanup_attempted,
                failure.cleanup_errors.len(),
                failure.source
            ),
            Error::InvalidRequest(message) => write!(f, "invalid request: {message}"),
            Error::SerdeDynamo(e) => write!(f, "DynamoDB serialization error: {}", e),
            Error::BuildError(e) => write!(f, "DynamoDB request builder error: {}", e),
            Error::DynamoPutError(e) => write!(f, "DynamoDB PutItem operation failed: {}", e),
            Error::DynamoGetError(e) => write!(f, "DynamoDB GetItem operation failed: {}", e),
            Error::DynamoQueryError(e) => write!(f, "DynamoDB Query operation failed: {}", e),
            Error::DynamoScanError(e) => write!(f, "DynamoDB Scan operation failed: {}", e),
            Error::DynamoUpdateError(e) => {
                write!(f, "DynamoDB UpdateItem operation failed: {}", e)
            }
            Error::DynamoDeleteItemError(e) => {
                write!(f, "DynamoDB DeleteItem operation failed: {}", e)
            }
            Error::DynamoCreateTableError(e) => {
                write!(f, "DynamoDB CreateTable operation failed: {}", e)
            }
            Error::DynamoDeleteTableError(e) => {
                write!(f, "DynamoDB DeleteTable operation failed: {}", e)
            }
            Error::DynamoBatchWriteItemError(e) => {
                write!(f, "DynamoDB BatchWriteItem operation failed: {}", e)
            }
            Error::DynamoBatchGetItemError(e) => {
                write!(f, "DynamoDB BatchGetItem operation failed: {}", e)
            }
            Error::DynamoTransactWriteError(e) => {
                write!(f, "DynamoDB TransactWriteItems operation failed: {}", e)
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::AggregateWrite(failure) => Some(&failure.source),
            Error::SerdeDynamo(e) => Some(e),
            Error::BuildError(e) => Some(e),
            Error::DynamoPutError(e) => Some(e),
            Error::DynamoGetError(e) => Some(e),
            Error::DynamoQueryError(e) => Some(e),
            Error::DynamoScanError(e) => Some(e),
            Error::DynamoUpdateError(e) => Some(e),
            Error::DynamoDeleteItemError(e) => Some(e),
            Error::DynamoCreateTableError(e) => Some(e),
            Error::DynamoDeleteTableError(e) => Some(e),
            Error::DynamoBatchWriteItemError(e) => Some(e),
            Error::DynamoBatchGetItemError(e) => Some(e),
            Error::DynamoTransactWriteError(e) => Some(e),
            Error::NotFound(_)
            | Error::ConditionFailed(_)
            | Error::PartialBatch(_)
            | Error::InvalidRequest(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate_failure(cleanup_errors: Vec<Error>) -> Error {
        Error::AggregateWrite(Box::new(AggregateWriteFailure {
            operation: AggregateOperation::Create,
            parent: PrimaryKey::new("Customer#1", "#Order#1"),
            source: Error::invalid("boom"),
            cleanup_attempted: true,
            cleanup_errors,
        }))
    }

    #[test]
    fn test_build_error_is_store_error() {
        let err = Error::BuildError(BuildError::other("test"));
        assert!(err.is_dynamodb_error());
        assert!(!err.is_serialization_error());
        assert!(!err.is_partial_write());
    }

    #[test]
    fn test_error_conversion() {
        let build_err = BuildError::other("test");
        let err: Error = build_err.into();
        assert!(matches!(err, Error::BuildError(_)));
    }

    #[test]
    fn test_domain_predicates() {
        let key = PrimaryKey::new("Customer#1", "Customer#1");
        assert!(Error::NotFound(key).is_not_found());
        assert!(Error::ConditionFailed("exists".into()).is_condition_failed());
        assert!(!Error::invalid("nope").is_dynamodb_error());
        assert!(Error::PartialBatch(Box::default()).is_partial_write());
    }

    #[test]
    fn test_aggregate_failure_reports_source() {
        let err = aggregate_failure(Vec::new());
        assert!(err.is_partial_write());
        assert!(err.aggregate_failure().is_some_and(|f| f.rolled_back()));

        let source = StdError::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("invalid request: boom"));
        assert!(err.to_string().contains("aggregate create of Customer#1/#Order#1"));
    }

    #[test]
    fn test_aggregate_failure_with_cleanup_errors_is_not_rolled_back() {
        let err = aggregate_failure(vec![Error::invalid("undo")]);
        assert!(err.aggregate_failure().is_some_and(|f| !f.rolled_back()));
    }
}
