//! Intermediate parse results.
//!
//! The chain parser walks an operator chain source-first and records what it
//! sees as flat lists: body steps in the order their clauses will appear, the
//! projections of the operators that have one, the distinct flag and result
//! modifiers. [`QueryModelBuilder`](super::builder::QueryModelBuilder) turns
//! the lists into clauses.

use std::sync::Arc;

use crate::{
    expression::{Expr, ParameterExpr},
    query_model::{OrderingDirection, ResultModifier},
};

#[derive(Debug, Clone, PartialEq)]
pub struct FromStep {
    pub identifier: ParameterExpr,
    /// Constant or member source for the first step, collection selector lambda after that.
    pub source: Arc<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhereStep {
    pub predicate: Arc<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderStep {
    pub expression: Arc<Expr>,
    pub direction: OrderingDirection,
    /// `OrderBy`/`OrderByDescending` start a new clause; `ThenBy*` extend the last one.
    pub first_order_by: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetStep {
    /// Selector lambda of the nested `Select` that introduced the binding.
    pub projection: Arc<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyStep {
    From(FromStep),
    Where(WhereStep),
    Order(OrderStep),
    Let(LetStep),
}

#[derive(Debug, Default)]
pub struct ParseResultCollector {
    body_steps: Vec<BodyStep>,
    /// `None` is the placeholder pushed by top-level operators without a selector.
    projections: Vec<Option<Arc<Expr>>>,
    distinct: bool,
    result_modifiers: Vec<ResultModifier>,
}

impl ParseResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body_step(&mut self, step: BodyStep) {
        log::trace!("collected body step {:?}", step);
        self.body_steps.push(step);
    }

    pub fn add_projection(&mut self, projection: Option<Arc<Expr>>) {
        self.projections.push(projection);
    }

    pub fn set_distinct(&mut self) {
        self.distinct = true;
    }

    pub fn add_result_modifier(&mut self, modifier: ResultModifier) {
        self.result_modifiers.push(modifier);
    }

    pub fn body_steps(&self) -> &[BodyStep] {
        &self.body_steps
    }

    pub fn projections(&self) -> &[Option<Arc<Expr>>] {
        &self.projections
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn result_modifiers(&self) -> &[ResultModifier] {
        &self.result_modifiers
    }

    pub fn into_parts(
        self,
    ) -> (
        Vec<BodyStep>,
        Vec<Option<Arc<Expr>>>,
        bool,
        Vec<ResultModifier>,
    ) {
        (
            self.body_steps,
            self.projections,
            self.distinct,
            self.result_modifiers,
        )
    }
}
