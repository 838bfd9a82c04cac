//! Clause-specific rules for field resolution.
//!
//! The same member chain means different things depending on where it
//! appears. In a select clause `s` stands for the whole entity; in a where
//! clause it is compared by primary key; an order-by clause cannot sort by an
//! entity at all. Each clause kind has a [`FieldAccessPolicy`] that adjusts the
//! chain before the join path is built.

use crate::{
    expression::MemberInfo,
    resolver::errors::{FieldAccessResolveError, NotSupportedError, ResolveError},
    schema::SchemaProvider,
};

/// Relation hops to join through and the member finally read.
/// `accessed_member == None` means the whole entity.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberAccessAdjustment {
    pub join_members: Vec<MemberInfo>,
    pub accessed_member: Option<MemberInfo>,
}

impl MemberAccessAdjustment {
    pub fn new(join_members: Vec<MemberInfo>, accessed_member: Option<MemberInfo>) -> Self {
        MemberAccessAdjustment {
            join_members,
            accessed_member,
        }
    }
}

pub trait FieldAccessPolicy {
    fn name(&self) -> &'static str;

    /// A bare reference to the range variable of type `type_name`.
    fn adjust_member_infos_for_direct_access(
        &self,
        type_name: &str,
        provider: &dyn SchemaProvider,
    ) -> Result<MemberAccessAdjustment, ResolveError>;

    /// A chain whose last member `relation_member` is itself a relation;
    /// `join_members` are the hops before it.
    fn adjust_member_infos_for_relation(
        &self,
        relation_member: &MemberInfo,
        join_members: &[MemberInfo],
        provider: &dyn SchemaProvider,
    ) -> Result<MemberAccessAdjustment, ResolveError>;

    /// Whether `x.Rel.PK` may be read from `x.Rel`'s foreign key instead of joining.
    fn optimize_related_key_access(&self) -> bool;
}

fn primary_key_of(
    type_name: &str,
    provider: &dyn SchemaProvider,
) -> Result<MemberInfo, ResolveError> {
    provider.primary_key_member(type_name).ok_or_else(|| {
        FieldAccessResolveError::MissingPrimaryKey {
            type_name: type_name.to_string(),
        }
        .into()
    })
}

fn join_through(relation_member: &MemberInfo, join_members: &[MemberInfo]) -> Vec<MemberInfo> {
    let mut joins = join_members.to_vec();
    joins.push(relation_member.clone());
    joins
}

/// Select clauses read whole entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectFieldAccessPolicy;

impl FieldAccessPolicy for SelectFieldAccessPolicy {
    fn name(&self) -> &'static str {
        "select"
    }

    fn adjust_member_infos_for_direct_access(
        &self,
        _type_name: &str,
        _provider: &dyn SchemaProvider,
    ) -> Result<MemberAccessAdjustment, ResolveError> {
        Ok(MemberAccessAdjustment::new(Vec::new(), None))
    }

    fn adjust_member_infos_for_relation(
        &self,
        relation_member: &MemberInfo,
        join_members: &[MemberInfo],
        _provider: &dyn SchemaProvider,
    ) -> Result<MemberAccessAdjustment, ResolveError> {
        Ok(MemberAccessAdjustment::new(
            join_through(relation_member, join_members),
            None,
        ))
    }

    fn optimize_related_key_access(&self) -> bool {
        false
    }
}

/// Where clauses compare entities by primary key.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhereFieldAccessPolicy;

impl FieldAccessPolicy for WhereFieldAccessPolicy {
    fn name(&self) -> &'static str {
        "where"
    }

    fn adjust_member_infos_for_direct_access(
        &self,
        type_name: &str,
        provider: &dyn SchemaProvider,
    ) -> Result<MemberAccessAdjustment, ResolveError> {
        let primary_key = primary_key_of(type_name, provider)?;
        Ok(MemberAccessAdjustment::new(Vec::new(), Some(primary_key)))
    }

    fn adjust_member_infos_for_relation(
        &self,
        relation_member: &MemberInfo,
        join_members: &[MemberInfo],
        provider: &dyn SchemaProvider,
    ) -> Result<MemberAccessAdjustment, ResolveError> {
        let relation = provider.relation(relation_member).ok_or_else(|| {
            FieldAccessResolveError::NotARelation {
                member: relation_member.to_string(),
                expression: relation_member.to_string(),
            }
        })?;
        let primary_key = primary_key_of(&relation.target_type, provider)?;
        Ok(MemberAccessAdjustment::new(
            join_through(relation_member, join_members),
            Some(primary_key),
        ))
    }

    fn optimize_related_key_access(&self) -> bool {
        true
    }
}

/// Order-by clauses sort by primary key and reject relations.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderByFieldAccessPolicy;

impl FieldAccessPolicy for OrderByFieldAccessPolicy {
    fn name(&self) -> &'static str {
        "orderby"
    }

    fn adjust_member_infos_for_direct_access(
        &self,
        type_name: &str,
        provider: &dyn SchemaProvider,
    ) -> Result<MemberAccessAdjustment, ResolveError> {
        let primary_key = primary_key_of(type_name, provider)?;
        Ok(MemberAccessAdjustment::new(Vec::new(), Some(primary_key)))
    }

    fn adjust_member_infos_for_relation(
        &self,
        relation_member: &MemberInfo,
        join_members: &[MemberInfo],
        _provider: &dyn SchemaProvider,
    ) -> Result<MemberAccessAdjustment, ResolveError> {
        let path = join_members
            .iter()
            .chain(std::iter::once(relation_member))
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(".");
        Err(NotSupportedError::OrderingByRelation {
            expression: path,
            member: relation_member.to_string(),
        }
        .into())
    }

    fn optimize_related_key_access(&self) -> bool {
        true
    }
}

/// Let clauses bind whole entities, like select, but may shortcut key reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct LetFieldAccessPolicy;

impl FieldAccessPolicy for LetFieldAccessPolicy {
    fn name(&self) -> &'static str {
        "let"
    }

    fn adjust_member_infos_for_direct_access(
        &self,
        type_name: &str,
        provider: &dyn SchemaProvider,
    ) -> Result<MemberAccessAdjustment, ResolveError> {
        SelectFieldAccessPolicy.adjust_member_infos_for_direct_access(type_name, provider)
    }

    fn adjust_member_infos_for_relation(
        &self,
        relation_member: &MemberInfo,
        join_members: &[MemberInfo],
        provider: &dyn SchemaProvider,
    ) -> Result<MemberAccessAdjustment, ResolveError> {
        SelectFieldAccessPolicy.adjust_member_infos_for_relation(
            relation_member,
            join_members,
            provider,
        )
    }

    fn optimize_related_key_access(&self) -> bool {
        true
    }
}

/// Clause kinds that carry field references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Select,
    Where,
    OrderBy,
    Let,
}

impl ClauseKind {
    pub fn policy(&self) -> &'static dyn FieldAccessPolicy {
        match self {
            ClauseKind::Select => &SelectFieldAccessPolicy,
            ClauseKind::Where => &WhereFieldAccessPolicy,
            ClauseKind::OrderBy => &OrderByFieldAccessPolicy,
            ClauseKind::Let => &LetFieldAccessPolicy,
        }
    }
}
