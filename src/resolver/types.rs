//! Values produced by field resolution: tables, column sources, columns,
//! joins and the resulting field descriptors.

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{expression::MemberInfo, query_model::QueryModel};

/// A database table. Joined tables start without an alias and receive one
/// when the session finalizes aliases; the alias never changes afterwards.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    alias: OnceLock<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            alias: OnceLock::new(),
        }
    }

    pub fn with_alias(name: impl Into<String>, alias: impl Into<String>) -> Self {
        let table = Table::new(name);
        let _ = table.alias.set(alias.into());
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.get().map(String::as_str)
    }

    /// Returns false if the table already had an alias.
    pub(crate) fn set_alias(&self, alias: String) -> bool {
        self.alias.set(alias).is_ok()
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.alias() == other.alias()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.alias() {
            Some(alias) => write!(f, "{} {}", self.name, alias),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Columns selected from a nested query, addressed through its from-clause alias.
#[derive(Debug, Clone)]
pub struct SubQuerySource {
    pub query_model: Arc<QueryModel>,
    pub alias: String,
}

impl PartialEq for SubQuerySource {
    fn eq(&self, other: &Self) -> bool {
        self.alias == other.alias && Arc::ptr_eq(&self.query_model, &other.query_model)
    }
}

/// Value introduced by a `let` clause. `is_table` is set when the bound
/// expression is itself a range variable, so its members map to table columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LetSource {
    pub alias: String,
    pub is_table: bool,
}

#[derive(Debug, Clone)]
pub enum ColumnSource {
    Table(Arc<Table>),
    SubQuery(Arc<SubQuerySource>),
    Let(Arc<LetSource>),
}

impl ColumnSource {
    /// Alias used to qualify columns of this source, if one is known yet.
    pub fn alias(&self) -> Option<&str> {
        match self {
            ColumnSource::Table(table) => table.alias(),
            ColumnSource::SubQuery(source) => Some(&source.alias),
            ColumnSource::Let(source) => Some(&source.alias),
        }
    }

    pub fn as_table(&self) -> Option<&Arc<Table>> {
        match self {
            ColumnSource::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Identity comparison, as opposed to the value comparison of `==`.
    pub fn is_same_instance(&self, other: &ColumnSource) -> bool {
        match (self, other) {
            (ColumnSource::Table(a), ColumnSource::Table(b)) => Arc::ptr_eq(a, b),
            (ColumnSource::SubQuery(a), ColumnSource::SubQuery(b)) => Arc::ptr_eq(a, b),
            (ColumnSource::Let(a), ColumnSource::Let(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for ColumnSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ColumnSource::Table(a), ColumnSource::Table(b)) => a == b,
            (ColumnSource::SubQuery(a), ColumnSource::SubQuery(b)) => a == b,
            (ColumnSource::Let(a), ColumnSource::Let(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ColumnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSource::Table(table) => write!(f, "{}", table),
            ColumnSource::SubQuery(source) => write!(f, "(subquery) {}", source.alias),
            ColumnSource::Let(source) => write!(f, "(let) {}", source.alias),
        }
    }
}

/// A column of a source. `name == None` stands for the whole entity (`*`).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub source: ColumnSource,
    pub name: Option<String>,
}

impl Column {
    pub fn new(source: ColumnSource, name: Option<&str>) -> Self {
        Column {
            source,
            name: name.map(str::to_string),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let qualifier = match &self.source {
            ColumnSource::Table(table) => table.alias().unwrap_or(table.name()),
            other => other.alias().unwrap_or("?"),
        };
        write!(f, "{}.{}", qualifier, self.name.as_deref().unwrap_or("*"))
    }
}

/// One equi-join step: `left_column = right_column`.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleJoin {
    pub left_column: Column,
    pub right_column: Column,
}

impl fmt::Display for SingleJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.left_column, self.right_column)
    }
}

/// Where a field's column lives: the clause's own source followed by the
/// joins needed to reach the table that holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSourcePath {
    pub first_source: ColumnSource,
    pub joins: Vec<SingleJoin>,
}

impl FieldSourcePath {
    pub fn new(first_source: ColumnSource, joins: Vec<SingleJoin>) -> Self {
        FieldSourcePath {
            first_source,
            joins,
        }
    }

    /// The source the path ends at.
    pub fn last_source(&self) -> &ColumnSource {
        self.joins
            .last()
            .map(|join| &join.right_column.source)
            .unwrap_or(&self.first_source)
    }
}

/// Result of resolving one field reference.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Member ultimately accessed; `None` when the whole entity is referenced.
    pub member: Option<MemberInfo>,
    pub source_path: FieldSourcePath,
    /// `None` when the member has no column mapping.
    pub column: Option<Column>,
}

impl FieldDescriptor {
    pub fn is_mapped(&self) -> bool {
        self.column.is_some()
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{}", column)?,
            None => write!(f, "<unmapped>")?,
        }
        if !self.source_path.joins.is_empty() {
            write!(f, " via ")?;
            for (i, join) in self.source_path.joins.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "[{}]", join)?;
            }
        }
        Ok(())
    }
}
