//! Schema catalog types and source contract
//!
//! SchemaItem is the normalized record describing one table or column
//! entity together with its generated descriptive text. Items are created
//! on catalog refresh, get an embedding attached once during index build,
//! and are immutable afterwards except via full rebuild.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Kind of schema entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Table,
    Column,
}

/// One table or column of the source schema.
///
/// Identity: tables by `name`, columns by `(table, name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaItem {
    /// Entity name
    pub name: String,
    /// Table or column
    pub kind: ItemKind,
    /// Owning table (columns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Declared data type (columns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// Generated descriptive text used for embedding
    pub description: String,
    /// Embedding vector, attached during index build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl SchemaItem {
    /// Create a table item (description filled in by the builder)
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Table,
            table: None,
            data_type: None,
            description: String::new(),
            embedding: None,
        }
    }

    /// Create a column item belonging to a table
    pub fn column(
        table: impl Into<String>,
        name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Column,
            table: Some(table.into()),
            data_type: Some(data_type.into()),
            description: String::new(),
            embedding: None,
        }
    }

    /// Lookup key: the table name, or `table.column` for columns
    pub fn key(&self) -> String {
        match (&self.kind, &self.table) {
            (ItemKind::Column, Some(table)) => format!("{}.{}", table, self.name),
            _ => self.name.clone(),
        }
    }
}

/// A column definition as reported by the catalog source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Declared data type
    pub data_type: String,
}

impl ColumnDef {
    /// Create a column definition
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// The live source of truth for schema metadata.
///
/// Either call may fail independently; a failed per-table column fetch is
/// non-fatal to index construction.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// List all table names
    async fn list_tables(&self) -> Result<Vec<String>, CatalogError>;

    /// Describe the columns of one table
    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDef>, CatalogError>;
}
