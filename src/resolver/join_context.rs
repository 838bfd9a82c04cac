//! JoinedTableContext: table instances created for relation joins.
//!
//! Every time a member chain walks a relation, the resolver asks the context
//! for the table at the end of that hop. The same relation reached over the
//! same path yields the same table instance, so two references to
//! `d.Student.First` and `d.Student.Last` share one join target. Joins
//! themselves are recomputed per hop; only the tables are cached.
//!
//! Joined tables are created without an alias. [`JoinedTableContext::finalize_aliases`]
//! names them once the session is done resolving.

use std::{collections::HashSet, sync::Arc};

use crate::{
    config::{ResolverConfig, DEFAULT_ALIAS_PREFIX},
    expression::MemberInfo,
    query_model::QueryModel,
    resolver::types::{FieldSourcePath, Table},
};

#[derive(Debug)]
struct JoinedTable {
    /// Path leading up to (not including) the relation hop.
    path: FieldSourcePath,
    member: MemberInfo,
    table: Arc<Table>,
}

/// Per-session cache of joined tables, keyed by (path so far, relation member).
#[derive(Debug)]
pub struct JoinedTableContext {
    entries: Vec<JoinedTable>,
    alias_prefix: String,
}

impl Default for JoinedTableContext {
    fn default() -> Self {
        Self::with_alias_prefix(DEFAULT_ALIAS_PREFIX)
    }
}

impl JoinedTableContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias_prefix(prefix: &str) -> Self {
        JoinedTableContext {
            entries: Vec::new(),
            alias_prefix: prefix.to_string(),
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::with_alias_prefix(&config.alias_prefix)
    }

    /// Number of distinct joined tables created so far.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Joined tables in creation order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<Table>> {
        self.entries.iter().map(|entry| &entry.table)
    }

    /// Table reached by following `member` from the end of `path`. A cached
    /// instance is returned when the same path and member were seen before,
    /// otherwise a new unaliased table named `target_table` is registered.
    pub fn get_joined_table(
        &mut self,
        path: &FieldSourcePath,
        member: &MemberInfo,
        target_table: &str,
    ) -> Arc<Table> {
        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.member == *member && entry.path == *path)
        {
            log::debug!("JoinedTableContext: reusing table for {}", member);
            return Arc::clone(&entry.table);
        }

        let table = Arc::new(Table::new(target_table));
        log::debug!(
            "JoinedTableContext: new joined table '{}' for {} (#{})",
            target_table,
            member,
            self.entries.len()
        );
        self.entries.push(JoinedTable {
            path: path.clone(),
            member: member.clone(),
            table: Arc::clone(&table),
        });
        table
    }

    /// Gives every joined table that still lacks an alias a unique one,
    /// `{prefix}{n}` with `n` the table's creation index. Names already used
    /// by from-clause identifiers of `model` (including nested queries) or by
    /// other aliases are skipped by appending `_1`, `_2`, ...
    pub fn finalize_aliases(&self, model: &QueryModel) {
        let mut taken: HashSet<String> = model.identifier_names().into_iter().collect();
        taken.extend(
            self.tables()
                .filter_map(|table| table.alias().map(str::to_string)),
        );

        let mut assigned = 0;
        for (index, table) in self.tables().enumerate() {
            if table.alias().is_some() {
                continue;
            }
            let base = format!("{}{}", self.alias_prefix, index);
            let mut alias = base.clone();
            let mut suffix = 1;
            while taken.contains(&alias) {
                alias = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            if table.set_alias(alias.clone()) {
                log::debug!("JoinedTableContext: aliased {} as {}", table.name(), alias);
                taken.insert(alias);
                assigned += 1;
            }
        }
        log::info!(
            "JoinedTableContext: finalized aliases ({} new, {} joined tables)",
            assigned,
            self.count()
        );
    }
}
