// Relational schema model extracted from SQL DDL

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder that prefixes table names in installation SQL
pub const DEFAULT_TABLE_PREFIX: &str = "#__";

/// Strip the table-name placeholder.
///
/// Repeated prefixes are all removed, so applying this twice gives the same
/// result as applying it once.
pub fn strip_table_prefix<'a>(qualified_name: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return qualified_name;
    }
    qualified_name.trim_start_matches(prefix)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub auto_increment: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
    Fulltext,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Primary => "primary",
            IndexKind::Unique => "unique",
            IndexKind::Index => "index",
            IndexKind::Fulltext => "fulltext",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDef {
    pub name: String,
    pub kind: IndexKind,
    pub columns: Vec<String>,
}

/// One `CREATE TABLE` statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub qualified_name: String,
    pub short_name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<IndexDef>,
    pub engine: Option<String>,
    pub charset: Option<String>,
    pub comment: Option<String>,
}

impl TableSchema {
    pub fn primary_key(&self) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Every parsed table plus a lookup keyed by short name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaIndex {
    pub tables: Vec<TableSchema>,
    pub table_map: BTreeMap<String, TableSchema>,
}

impl SchemaIndex {
    /// Build the short-name map; a later table with the same short name replaces
    /// the earlier one.
    pub fn from_tables(tables: Vec<TableSchema>) -> Self {
        let mut table_map = BTreeMap::new();
        for table in &tables {
            table_map.insert(table.short_name.clone(), table.clone());
        }
        Self { tables, table_map }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table(qualified: &str, columns: usize) -> TableSchema {
        TableSchema {
            qualified_name: qualified.to_string(),
            short_name: strip_table_prefix(qualified, DEFAULT_TABLE_PREFIX).to_string(),
            columns: (0..columns)
                .map(|i| Column {
                    name: format!("c{}", i),
                    type_: "int".to_string(),
                    nullable: true,
                    default_value: None,
                    auto_increment: false,
                    comment: None,
                })
                .collect(),
            indexes: Vec::new(),
            engine: None,
            charset: None,
            comment: None,
        }
    }

    #[test]
    fn test_strip_table_prefix() {
        assert_eq!(strip_table_prefix("#__content", "#__"), "content");
        assert_eq!(strip_table_prefix("content", "#__"), "content");
        assert_eq!(strip_table_prefix("#__#__content", "#__"), "content");
        assert_eq!(strip_table_prefix("#__content", ""), "#__content");
    }

    #[test]
    fn test_table_map_last_write_wins() {
        let schema = SchemaIndex::from_tables(vec![table("#__users", 1), table("#__users", 3)]);

        assert_eq!(schema.tables.len(), 2);
        assert_eq!(schema.table_map.len(), 1);
        assert_eq!(schema.table_map["users"].columns.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_strip_table_prefix_idempotent(name in "(#__){0,3}[a-z_#]{0,12}") {
            let once = strip_table_prefix(&name, DEFAULT_TABLE_PREFIX);
            let twice = strip_table_prefix(once, DEFAULT_TABLE_PREFIX);
            prop_assert_eq!(once, twice);
        }
    }
}
