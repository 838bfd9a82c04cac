use std::sync::Arc;

use crate::{
    expression::{Expr, MemberInfo, ParameterExpr},
    query_model::FromClause,
    resolver::{
        errors::{FieldAccessResolveError, ResolveError},
        join_context::JoinedTableContext,
        path_builder::JoinPathBuilder,
        policy::{FieldAccessPolicy, MemberAccessAdjustment},
        types::{Column, ColumnSource, FieldDescriptor},
    },
    schema::SchemaProvider,
};

/// Splits `a.B.C` into the root parameter `a` and the members `[B, C]`.
pub fn member_chain(expr: &Arc<Expr>) -> Result<(&ParameterExpr, Vec<MemberInfo>), ResolveError> {
    let mut members = Vec::new();
    let mut current = expr;
    loop {
        match current.as_ref() {
            Expr::MemberAccess(access) => match &access.expression {
                Some(inner) => {
                    members.push(access.member.clone());
                    current = inner;
                }
                None => return Err(unresolvable(expr, current)),
            },
            Expr::Parameter(parameter) => {
                members.reverse();
                return Ok((parameter, members));
            }
            _ => return Err(unresolvable(expr, current)),
        }
    }
}

fn unresolvable(expr: &Arc<Expr>, at: &Arc<Expr>) -> ResolveError {
    FieldAccessResolveError::UnresolvableReference {
        expression: expr.to_string(),
        kind: at.kind_name().to_string(),
    }
    .into()
}

/// Resolves member chains rooted at the range variable of a single from clause.
pub struct ClauseFieldResolver<'a> {
    provider: &'a dyn SchemaProvider,
}

impl<'a> ClauseFieldResolver<'a> {
    pub fn new(provider: &'a dyn SchemaProvider) -> Self {
        ClauseFieldResolver { provider }
    }

    /// Resolves `expr` against `from_clause`. Joins on the resulting path are
    /// attached to the clause (without duplicates).
    pub fn resolve_field(
        &self,
        from_clause: &FromClause,
        expr: &Arc<Expr>,
        context: &mut JoinedTableContext,
        policy: &dyn FieldAccessPolicy,
    ) -> Result<FieldDescriptor, ResolveError> {
        let (root, members) = member_chain(expr)?;
        let identifier = from_clause.identifier();
        if root != identifier {
            return Err(FieldAccessResolveError::IdentifierMismatch {
                expected_name: identifier.name.clone(),
                expected_type: identifier.type_name.clone(),
                actual: root.name.clone(),
            }
            .into());
        }

        let source = from_clause.column_source(self.provider)?;
        let adjustment = self.adjust(&source, &identifier.type_name, members, policy)?;
        let adjustment = self.optimize_related_key_access(adjustment, policy);

        let path = JoinPathBuilder::new(self.provider).build(
            context,
            source,
            &adjustment.join_members,
        )?;
        let column = self.column_for(path.last_source(), adjustment.accessed_member.as_ref());

        for join in &path.joins {
            from_clause.add_join(join.clone());
        }

        log::debug!(
            "{} resolver: '{}' -> {}",
            policy.name(),
            expr,
            column
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "<unmapped>".to_string())
        );

        Ok(FieldDescriptor {
            member: adjustment.accessed_member,
            source_path: path,
            column,
        })
    }

    fn adjust(
        &self,
        source: &ColumnSource,
        type_name: &str,
        members: Vec<MemberInfo>,
        policy: &dyn FieldAccessPolicy,
    ) -> Result<MemberAccessAdjustment, ResolveError> {
        let Some((accessed, joins)) = members.split_last() else {
            // Non-entity values (scalar lets, scalar sub-queries) are always read whole.
            let is_entity = match source {
                ColumnSource::Let(l) => l.is_table,
                _ => self.provider.table_name(type_name).is_some(),
            };
            return if is_entity {
                policy.adjust_member_infos_for_direct_access(type_name, self.provider)
            } else {
                Ok(MemberAccessAdjustment::new(Vec::new(), None))
            };
        };

        if self.provider.is_relation(accessed) {
            policy.adjust_member_infos_for_relation(accessed, joins, self.provider)
        } else {
            Ok(MemberAccessAdjustment::new(
                joins.to_vec(),
                Some(accessed.clone()),
            ))
        }
    }

    /// `x.Rel.PK` reads `x.Rel`'s foreign key when `Rel` is stored on `x`'s table.
    fn optimize_related_key_access(
        &self,
        adjustment: MemberAccessAdjustment,
        policy: &dyn FieldAccessPolicy,
    ) -> MemberAccessAdjustment {
        if !policy.optimize_related_key_access() {
            return adjustment;
        }
        let (Some(accessed), Some(last_join)) =
            (&adjustment.accessed_member, adjustment.join_members.last())
        else {
            return adjustment;
        };
        let Some(relation) = self.provider.relation(last_join) else {
            return adjustment;
        };
        if relation.is_virtual {
            return adjustment;
        }
        match self.provider.primary_key_member(&relation.target_type) {
            Some(primary_key) if primary_key == *accessed => {}
            _ => return adjustment,
        }

        let mut join_members = adjustment.join_members;
        let foreign_key_member = join_members.pop();
        log::trace!(
            "reading {:?} through its foreign key instead of joining",
            foreign_key_member.as_ref().map(ToString::to_string)
        );
        MemberAccessAdjustment::new(join_members, foreign_key_member)
    }

    fn column_for(&self, source: &ColumnSource, member: Option<&MemberInfo>) -> Option<Column> {
        let Some(member) = member else {
            return Some(Column::new(source.clone(), None));
        };
        let name = match source {
            ColumnSource::Table(_) => self.provider.column_name(member)?,
            ColumnSource::Let(l) if l.is_table => self.provider.column_name(member)?,
            ColumnSource::Let(_) | ColumnSource::SubQuery(_) => member.name.clone(),
        };
        Some(Column::new(source.clone(), Some(&name)))
    }
}
