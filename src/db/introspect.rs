//! Live schema introspection.
//!
//! Reads tables and columns from `information_schema` and key constraints
//! from `duckdb_constraints()`, producing both the wire-facing snapshot and
//! the schema text handed to the generation prompt. Snapshots are computed
//! on demand; nothing is cached across requests.

use std::collections::{HashMap, HashSet};

use duckdb::Connection;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::db::pool::DbPool;

#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("no database connection available: {0}")]
    PoolExhausted(String),

    #[error("schema query failed: {0}")]
    Query(String),

    #[error("introspection worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

/// A foreign-key edge, both ends as `table.column`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Relationship {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableSchema>,
    pub relationships: Vec<Relationship>,
}

impl SchemaSnapshot {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Renders the snapshot as the markdown-ish schema block used in
    /// generation prompts.
    pub fn to_prompt_text(&self) -> String {
        let mut text = String::from("# DATABASE SCHEMA\n\n");

        for table in &self.tables {
            text.push_str(&format!("## Table: {}\n\n", table.name));
            text.push_str("| Column | Type | Nullable | Key |\n");
            text.push_str("| --- | --- | --- | --- |\n");
            for column in &table.columns {
                let key = if column.is_primary_key {
                    "PK"
                } else if column.is_foreign_key {
                    "FK"
                } else {
                    ""
                };
                text.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    column.name,
                    column.data_type,
                    if column.is_nullable { "YES" } else { "NO" },
                    key
                ));
            }
            text.push('\n');
        }

        if !self.relationships.is_empty() {
            text.push_str("## Relationships\n\n");
            for relationship in &self.relationships {
                text.push_str(&format!("- {} -> {}\n", relationship.from, relationship.to));
            }
        }

        text
    }
}

pub async fn snapshot(pool: &DbPool) -> Result<SchemaSnapshot, IntrospectError> {
    let pool = pool.clone();
    let worker = tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| IntrospectError::PoolExhausted(e.to_string()))?;
        build_snapshot(&conn)
    });

    match worker.await {
        Ok(result) => result,
        Err(join_err) => Err(IntrospectError::Worker(join_err.to_string())),
    }
}

fn query_error(e: duckdb::Error) -> IntrospectError {
    IntrospectError::Query(e.to_string())
}

fn build_snapshot(conn: &Connection) -> Result<SchemaSnapshot, IntrospectError> {
    let mut table_stmt = conn
        .prepare(
            "SELECT table_name
             FROM information_schema.tables
             WHERE table_schema = 'main' AND table_type = 'BASE TABLE'
             ORDER BY table_name",
        )
        .map_err(query_error)?;
    let table_names = table_stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(query_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_error)?;

    let (keys, relationships) = load_constraints(conn)?;

    let mut tables = Vec::with_capacity(table_names.len());
    for table_name in table_names {
        let mut column_stmt = conn
            .prepare(
                "SELECT column_name, data_type, is_nullable
                 FROM information_schema.columns
                 WHERE table_schema = 'main' AND table_name = ?
                 ORDER BY ordinal_position",
            )
            .map_err(query_error)?;
        let raw_columns = column_stmt
            .query_map(duckdb::params![table_name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        let table_keys = keys.get(&table_name);
        let columns = raw_columns
            .into_iter()
            .map(|(name, data_type, nullable)| ColumnSchema {
                is_primary_key: table_keys.is_some_and(|k| k.primary.contains(&name)),
                is_foreign_key: table_keys.is_some_and(|k| k.foreign.contains(&name)),
                is_nullable: nullable.eq_ignore_ascii_case("yes"),
                name,
                data_type,
            })
            .collect();

        tables.push(TableSchema {
            name: table_name,
            columns,
        });
    }

    Ok(SchemaSnapshot {
        tables,
        relationships,
    })
}

#[derive(Default)]
struct TableKeys {
    primary: HashSet<String>,
    foreign: HashSet<String>,
}

/// Reads key constraints for every table in the main schema. DuckDB exposes
/// them as rendered constraint text, so the column lists are parsed back out
/// of that text.
fn load_constraints(
    conn: &Connection,
) -> Result<(HashMap<String, TableKeys>, Vec<Relationship>), IntrospectError> {
    let pk_pattern = Regex::new(r"(?i)PRIMARY\s+KEY\s*\(([^)]+)\)").unwrap();
    let fk_pattern =
        Regex::new(r#"(?i)FOREIGN\s+KEY\s*\(([^)]+)\)\s*REFERENCES\s+"?(\w+)"?\s*\(([^)]+)\)"#)
            .unwrap();

    let mut stmt = conn
        .prepare(
            "SELECT table_name, constraint_type, constraint_text
             FROM duckdb_constraints()
             WHERE schema_name = 'main'",
        )
        .map_err(query_error)?;
    let constraints = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(query_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_error)?;

    let mut keys: HashMap<String, TableKeys> = HashMap::new();
    let mut relationships = Vec::new();

    for (table_name, constraint_type, constraint_text) in constraints {
        match constraint_type.as_str() {
            "PRIMARY KEY" => {
                if let Some(captures) = pk_pattern.captures(&constraint_text) {
                    let entry = keys.entry(table_name).or_default();
                    for column in split_columns(&captures[1]) {
                        entry.primary.insert(column);
                    }
                }
            }
            "FOREIGN KEY" => {
                if let Some(captures) = fk_pattern.captures(&constraint_text) {
                    let local_columns = split_columns(&captures[1]);
                    let target_table = captures[2].to_string();
                    let target_columns = split_columns(&captures[3]);

                    let entry = keys.entry(table_name.clone()).or_default();
                    for column in &local_columns {
                        entry.foreign.insert(column.clone());
                    }

                    for (local, target) in local_columns.iter().zip(target_columns.iter()) {
                        relationships.push(Relationship {
                            from: format!("{table_name}.{local}"),
                            to: format!("{target_table}.{target}"),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    relationships.sort_by(|a, b| a.from.cmp(&b.from));
    Ok((keys, relationships))
}

fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(|column| column.trim().trim_matches('"').to_string())
        .filter(|column| !column.is_empty())
        .collect()
}
