use std::sync::Arc;

use crate::{
    expression::MemberInfo,
    resolver::{
        errors::{FieldAccessResolveError, ResolveError},
        join_context::JoinedTableContext,
        types::{Column, ColumnSource, FieldSourcePath, SingleJoin},
    },
    schema::SchemaProvider,
};

/// Turns a list of relation hops into a [`FieldSourcePath`], one join per hop.
pub struct JoinPathBuilder<'a> {
    provider: &'a dyn SchemaProvider,
}

impl<'a> JoinPathBuilder<'a> {
    pub fn new(provider: &'a dyn SchemaProvider) -> Self {
        JoinPathBuilder { provider }
    }

    pub fn build(
        &self,
        context: &mut JoinedTableContext,
        first_source: ColumnSource,
        join_members: &[MemberInfo],
    ) -> Result<FieldSourcePath, ResolveError> {
        let mut path = FieldSourcePath::new(first_source, Vec::new());

        for member in join_members {
            let relation =
                self.provider
                    .relation(member)
                    .ok_or_else(|| FieldAccessResolveError::NotARelation {
                        member: member.to_string(),
                        expression: join_members
                            .iter()
                            .map(|m| m.name.as_str())
                            .collect::<Vec<_>>()
                            .join("."),
                    })?;

            let table = context.get_joined_table(&path, member, &relation.target_table);
            let join = SingleJoin {
                left_column: Column::new(path.last_source().clone(), Some(&relation.left_column)),
                right_column: Column::new(
                    ColumnSource::Table(Arc::clone(&table)),
                    Some(&relation.right_column),
                ),
            };
            log::trace!("join for {}: {}", member, join);
            path.joins.push(join);
        }

        Ok(path)
    }
}
