use crate::Error;
use crate::table::Table;
use crate::table::backend::QueryRequest;
use crate::table::types::{Index, OutputItems, QueryOptions, SortKeyCondition};

impl Table {
    /// One page of a GSI1 partition, optionally narrowed to a sort-key prefix.
    pub async fn query_gsi1(
        &self,
        partition_key: &str,
        sort_prefix: Option<&str>,
        options: QueryOptions,
    ) -> Result<OutputItems, Error> {
        self.query(index_request(Index::Gsi1, partition_key, sort_prefix, options))
            .await
    }

    /// One page of a GSI2 partition, optionally narrowed to a sort-key prefix.
    pub async fn query_gsi2(
        &self,
        partition_key: &str,
        sort_prefix: Option<&str>,
        options: QueryOptions,
    ) -> Result<OutputItems, Error> {
        self.query(index_request(Index::Gsi2, partition_key, sort_prefix, options))
            .await
    }

    /// Number of items in a secondary-index partition, across all pages.
    pub async fn count_index_items(&self, index: Index, partition_key: &str) -> Result<usize, Error> {
        let mut count = 0;
        let mut options = QueryOptions::default();
        loop {
            let page = self
                .query(QueryRequest::new(index, partition_key).options(options.clone()))
                .await?;
            count += page.count;
            match page.last_evaluated_key {
                Some(token) => options = options.start_from(token),
                None => return Ok(count),
            }
        }
    }
}

fn index_request(
    index: Index,
    partition_key: &str,
    sort_prefix: Option<&str>,
    options: QueryOptions,
) -> QueryRequest {
    let mut request = QueryRequest::new(index, partition_key).options(options);
    if let Some(prefix) = sort_prefix {
        request = request.sort_key(SortKeyCondition::BeginsWith(prefix.to_string()));
    }
    request
}
