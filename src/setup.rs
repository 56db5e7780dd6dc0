//! Table provisioning for local stacks and tests.

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::operation::create_table::{CreateTableError, CreateTableOutput};
use aws_sdk_dynamodb::operation::delete_table::DeleteTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ProvisionedThroughput, ScalarAttributeType,
};
use tracing::{info, instrument};

use crate::error::Error;
use crate::table::Index;

fn key_element(name: &str, key_type: KeyType) -> Result<KeySchemaElement, Error> {
    Ok(KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()?)
}

fn string_attribute(name: &str) -> Result<AttributeDefinition, Error> {
    Ok(AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()?)
}

fn throughput() -> Result<ProvisionedThroughput, Error> {
    Ok(ProvisionedThroughput::builder()
        .read_capacity_units(10)
        .write_capacity_units(10)
        .build()?)
}

fn global_index(index: Index, name: &str) -> Result<GlobalSecondaryIndex, Error> {
    Ok(GlobalSecondaryIndex::builder()
        .index_name(name)
        .key_schema(key_element(index.partition_attr(), KeyType::Hash)?)
        .key_schema(key_element(index.sort_attr(), KeyType::Range)?)
        .projection(
            Projection::builder()
                .projection_type(ProjectionType::All)
                .build(),
        )
        .provisioned_throughput(throughput()?)
        .build()?)
}

/// Creates the single table with its primary key and both secondary indexes.
///
/// An existing table is left alone.
#[instrument(level = "debug", skip(client))]
pub async fn create_table(client: &Client, table_name: &str) -> Result<CreateTableOutput, Error> {
    let mut builder = client
        .create_table()
        .table_name(table_name)
        .provisioned_throughput(throughput()?);

    for index in [Index::Table, Index::Gsi1, Index::Gsi2] {
        builder = builder
            .attribute_definitions(string_attribute(index.partition_attr())?)
            .attribute_definitions(string_attribute(index.sort_attr())?);
        match index.index_name() {
            Some(name) => builder = builder.global_secondary_indexes(global_index(index, name)?),
            None => {
                builder = builder
                    .key_schema(key_element(index.partition_attr(), KeyType::Hash)?)
                    .key_schema(key_element(index.sort_attr(), KeyType::Range)?);
            }
        }
    }

    match builder.send().await {
        Ok(output) => {
            info!(table = table_name, "table created");
            Ok(output)
        }
        Err(e) => {
            if let Some(CreateTableError::ResourceInUseException(_)) = e.as_service_error() {
                return Ok(CreateTableOutput::builder().build());
            }
            Err(e.into())
        }
    }
}

/// Drops the table. A missing table is not an error.
#[instrument(level = "debug", skip(client))]
pub async fn delete_table(client: &Client, table_name: &str) -> Result<(), Error> {
    match client.delete_table().table_name(table_name).send().await {
        Ok(_) => Ok(()),
        Err(e) => match e.as_service_error() {
            Some(DeleteTableError::ResourceNotFoundException(_)) => Ok(()),
            _ => Err(e.into()),
        },
    }
}
