use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FieldAccessResolveError {
    #[error(
        "This resolver can only resolve accesses for parameter '{expected_name}' of type '{expected_type}', but got '{actual}'."
    )]
    IdentifierMismatch {
        expected_name: String,
        expected_type: String,
        actual: String,
    },

    #[error("The expression '{expression}' references no from clause of the query or any enclosing query.")]
    NoFromClauseIdentifier { expression: String },

    #[error("The expression '{expression}' is not a member access chain rooted at a range variable ({kind} found).")]
    UnresolvableReference { expression: String, kind: String },

    #[error("Member '{member}' is not a relation, but it is used as one in '{expression}'.")]
    NotARelation { member: String, expression: String },

    #[error("Type '{type_name}' has no table mapping.")]
    UnmappedType { type_name: String },

    #[error("Type '{type_name}' has no primary key mapping.")]
    MissingPrimaryKey { type_name: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NotSupportedError {
    #[error("Ordering by '{expression}' is not supported because it denotes an entity ('{member}' is a relation).")]
    OrderingByRelation { expression: String, member: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error(transparent)]
    FieldAccess(#[from] FieldAccessResolveError),

    #[error(transparent)]
    NotSupported(#[from] NotSupportedError),

    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;
