//! Store connection settings.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), single_table_dal::Error> {
//! let config = single_table_dal::StoreConfig::from_env();
//! let table = config.connect().await;
//! # Ok(())
//! # }
//! ```

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Credentials;
use aws_types::sdk_config::{RetryConfig, TimeoutConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::table::{DynamoBackend, RetryPolicy, Table};

/// Table name used when `TABLE_NAME` is unset
pub const DEFAULT_TABLE_NAME: &str = "Bookstore";
/// Region used when `AWS_DEFAULT_REGION` is unset
pub const DEFAULT_REGION: &str = "eu-west-1";
/// LocalStack edge endpoint selected by `AWS_PROFILE=localstack`
pub const LOCALSTACK_ENDPOINT: &str = "http://127.0.0.1:4566";

/// Where and how to reach the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name of the single table
    pub table_name: String,
    /// AWS region
    pub region: String,
    /// Endpoint override, for LocalStack or DynamoDB Local
    pub endpoint: Option<String>,
    /// Static access key; the default provider chain is used when absent
    pub access_key_id: Option<String>,
    /// Static secret key
    pub secret_access_key: Option<String>,
    /// Connect timeout per attempt
    pub connect_timeout: Duration,
    /// Read timeout per attempt
    pub read_timeout: Duration,
    /// Bound on a whole SDK operation including SDK retries
    pub operation_timeout: Duration,
    /// Retry policy for batch calls
    pub retry_policy: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(20),
            operation_timeout: Duration::from_secs(60),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Settings read from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Settings read through `lookup`, which returns the value of a variable.
    ///
    /// An explicit `DYNAMODB_ENDPOINT` wins over `AWS_PROFILE=localstack`.
    /// When an endpoint is set, missing credentials default to `test`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let defaults = Self::default();

        let endpoint = non_empty("DYNAMODB_ENDPOINT").or_else(|| {
            (non_empty("AWS_PROFILE").as_deref() == Some("localstack"))
                .then(|| LOCALSTACK_ENDPOINT.to_string())
        });
        let fallback = endpoint.as_ref().map(|_| "test".to_string());

        Self {
            table_name: non_empty("TABLE_NAME").unwrap_or(defaults.table_name),
            region: non_empty("AWS_DEFAULT_REGION").unwrap_or(defaults.region),
            access_key_id: non_empty("AWS_ACCESS_KEY_ID").or_else(|| fallback.clone()),
            secret_access_key: non_empty("AWS_SECRET_ACCESS_KEY").or(fallback),
            endpoint,
            ..defaults
        }
    }

    /// SDK configuration with bounded timeouts and adaptive SDK retries.
    pub async fn sdk_config(&self) -> SdkConfig {
        let timeout_config = TimeoutConfig::builder()
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .operation_timeout(self.operation_timeout)
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .retry_config(
                RetryConfig::adaptive()
                    .with_max_attempts(3)
                    .with_initial_backoff(Duration::from_secs(1)),
            )
            .timeout_config(timeout_config);

        if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(key), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "single-table-dal",
            ));
        }

        loader.load().await
    }

    /// DynamoDB client for these settings.
    pub async fn client(&self) -> Client {
        Client::new(&self.sdk_config().await)
    }

    /// Engine over DynamoDB for these settings.
    pub async fn connect(&self) -> Table {
        debug!(
            table = %self.table_name,
            region = %self.region,
            endpoint = ?self.endpoint,
            "connecting"
        );
        let backend = DynamoBackend::new(self.client().await, self.table_name.clone());
        Table::new(Arc::new(backend)).with_retry_policy(self.retry_policy.clone())
    }
}
