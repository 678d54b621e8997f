use std::fmt::Write;

use crate::api::middleware::AppError;
use crate::models::{Column, Table};
use crate::services::database::PooledResource;

/// Renders a plain-text description of the tables behind a connection
pub struct SchemaService;

impl SchemaService {
    /// Describe every base table and its columns.
    /// Returns an empty string when the metadata cannot be read.
    pub async fn extract_schema(resource: &dyn PooledResource) -> String {
        match Self::collect(resource).await {
            Ok(tables) => Self::render(&tables),
            Err(e) => {
                tracing::warn!("Failed to extract {} schema: {}", resource.engine().as_str(), e);
                String::new()
            }
        }
    }

    async fn collect(resource: &dyn PooledResource) -> Result<Vec<(Table, Vec<Column>)>, AppError> {
        let tables = resource.tables().await?;
        let mut described = Vec::with_capacity(tables.len());
        for table in tables {
            let columns = resource.columns(&table).await?;
            described.push((table, columns));
        }
        Ok(described)
    }

    fn render(tables: &[(Table, Vec<Column>)]) -> String {
        let mut schema = String::from("Database schema:\n");
        for (table, columns) in tables {
            let columns = columns
                .iter()
                .map(|c| format!(" {} {}", c.name, c.data_type))
                .collect::<Vec<_>>()
                .join(",\n");
            let _ = write!(schema, "Table: {} (\n{}\n)\n\n", table.qualified_name(), columns);
        }
        schema
    }
}
