use std::ops::{Add, Mul, Neg, Sub};

use nalgebra::Scalar;
use rustc_hash::FxHashMap;

use crate::form::ScalarExpr;
use crate::operators::SourceId;
use crate::Real;

/// A field-valued expression, i.e. a symbolic linear combination of coefficient vectors.
///
/// Leaves reference the previous-step solution of a field, the time derivative of a
/// field, one stage unknown of a stage system, or prescribed source data evaluated at
/// some time. Interior nodes scale and sum subexpressions. Since the tree offers no
/// products of field expressions, every expression is affine in the stage unknowns by
/// construction, with scalar weights obtained by [`stage_weight`](FieldExpr::stage_weight).
///
/// Like [`ScalarExpr`], trees are immutable; substitution produces new trees.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldExpr<T: Scalar> {
    /// The value of a solution field at the previous time level.
    PreviousSolution { field: usize },
    /// The time derivative of a solution field.
    TimeDerivative { field: usize },
    /// One stage unknown block of a stage system.
    Stage { stage: usize, field: usize },
    /// Prescribed data evaluated at the given time.
    Source { source: SourceId, time: ScalarExpr<T> },
    /// A scalar multiple of an expression.
    Scaled(ScalarExpr<T>, Box<FieldExpr<T>>),
    /// A sum of expressions of equal dimension.
    Sum(Vec<FieldExpr<T>>),
}

impl<T: Real> FieldExpr<T> {
    pub fn previous_solution(field: usize) -> Self {
        Self::PreviousSolution { field }
    }

    pub fn time_derivative(field: usize) -> Self {
        Self::TimeDerivative { field }
    }

    pub fn stage(stage: usize, field: usize) -> Self {
        Self::Stage { stage, field }
    }

    pub fn source(source: SourceId, time: ScalarExpr<T>) -> Self {
        Self::Source { source, time }
    }

    /// Builds $\sum_j w_j e_j$ from weighted expressions, skipping terms whose weight
    /// is the literal zero so that sparse tableau rows stay sparse.
    pub fn linear_combination<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = (ScalarExpr<T>, FieldExpr<T>)>,
    {
        let summands: Vec<_> = terms
            .into_iter()
            .filter(|(w, _)| !w.is_zero())
            .map(|(w, e)| Self::Scaled(w, Box::new(e)))
            .collect();
        match summands.len() {
            0 => Self::Sum(Vec::new()),
            1 => summands.into_iter().next().unwrap(),
            _ => Self::Sum(summands),
        }
    }

    /// The largest stage index referenced by any leaf, or `None` if the expression
    /// does not reference stage unknowns at all.
    pub fn max_stage_index(&self) -> Option<usize> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::PreviousSolution { .. } | Self::TimeDerivative { .. } | Self::Source { .. } => None,
            Self::Scaled(_, e) => e.max_stage_index(),
            Self::Sum(es) => es.iter().filter_map(|e| e.max_stage_index()).max(),
        }
    }

    /// Whether any leaf of the expression is a time derivative.
    pub fn has_time_derivative(&self) -> bool {
        match self {
            Self::TimeDerivative { .. } => true,
            Self::PreviousSolution { .. } | Self::Stage { .. } | Self::Source { .. } => false,
            Self::Scaled(_, e) => e.has_time_derivative(),
            Self::Sum(es) => es.iter().any(|e| e.has_time_derivative()),
        }
    }

    /// The weight of the given stage unknown in this expression, i.e. the scalar
    /// $\partial e / \partial w_{(i, f)}$ evaluated at time `t` and step size `dt`.
    pub fn stage_weight(&self, stage: usize, field: usize, t: T, dt: T) -> T {
        match self {
            Self::Stage { stage: s, field: f } if *s == stage && *f == field => T::one(),
            Self::Stage { .. } | Self::PreviousSolution { .. } | Self::TimeDerivative { .. } | Self::Source { .. } => {
                T::zero()
            }
            Self::Scaled(w, e) => w.evaluate(t, dt) * e.stage_weight(stage, field, t, dt),
            Self::Sum(es) => es
                .iter()
                .fold(T::zero(), |acc, e| acc + e.stage_weight(stage, field, t, dt)),
        }
    }

    /// Returns a new expression with the replacement rules applied to every leaf in a
    /// single post-order pass.
    pub fn substitute(&self, substitution: &Substitution<T>) -> Self {
        match self {
            Self::PreviousSolution { field } => match substitution.values.get(field) {
                Some(replacement) => replacement.clone(),
                None => self.clone(),
            },
            Self::TimeDerivative { field } => match substitution.derivatives.get(field) {
                Some(replacement) => replacement.clone(),
                None => self.clone(),
            },
            Self::Stage { .. } | Self::Source { .. } => self.clone(),
            Self::Scaled(w, e) => Self::Scaled(w.clone(), Box::new(e.substitute(substitution))),
            Self::Sum(es) => Self::Sum(es.iter().map(|e| e.substitute(substitution)).collect()),
        }
    }

    /// Returns a new expression in which the time variable of every embedded scalar
    /// expression (scaling factors and source evaluation times) is replaced.
    pub fn substitute_time(&self, replacement: &ScalarExpr<T>) -> Self {
        match self {
            Self::PreviousSolution { .. } | Self::TimeDerivative { .. } | Self::Stage { .. } => self.clone(),
            Self::Source { source, time } => Self::Source {
                source: *source,
                time: time.substitute_time(replacement),
            },
            Self::Scaled(w, e) => Self::Scaled(w.substitute_time(replacement), Box::new(e.substitute_time(replacement))),
            Self::Sum(es) => Self::Sum(es.iter().map(|e| e.substitute_time(replacement)).collect()),
        }
    }
}

/// A set of leaf replacement rules applied simultaneously by [`FieldExpr::substitute`].
///
/// Value rules replace [`FieldExpr::PreviousSolution`] leaves; derivative rules replace
/// [`FieldExpr::TimeDerivative`] leaves. Fields without a rule are left alone.
#[derive(Debug, Clone)]
pub struct Substitution<T: Scalar> {
    values: FxHashMap<usize, FieldExpr<T>>,
    derivatives: FxHashMap<usize, FieldExpr<T>>,
}

impl<T: Scalar> Default for Substitution<T> {
    fn default() -> Self {
        Self {
            values: FxHashMap::default(),
            derivatives: FxHashMap::default(),
        }
    }
}

impl<T: Real> Substitution<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule replacing the value of the given field.
    pub fn replace_value(mut self, field: usize, replacement: FieldExpr<T>) -> Self {
        self.values.insert(field, replacement);
        self
    }

    /// Adds a rule replacing the time derivative of the given field.
    pub fn replace_derivative(mut self, field: usize, replacement: FieldExpr<T>) -> Self {
        self.derivatives.insert(field, replacement);
        self
    }
}

impl<T: Real> Add for FieldExpr<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        // Keep sums flat rather than building deep binary trees
        match (self, rhs) {
            (Self::Sum(mut a), Self::Sum(b)) => {
                a.extend(b);
                Self::Sum(a)
            }
            (Self::Sum(mut a), rhs) => {
                a.push(rhs);
                Self::Sum(a)
            }
            (lhs, Self::Sum(mut b)) => {
                b.insert(0, lhs);
                Self::Sum(b)
            }
            (lhs, rhs) => Self::Sum(vec![lhs, rhs]),
        }
    }
}

impl<T: Real> Sub for FieldExpr<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl<T: Real> Neg for FieldExpr<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::Scaled(ScalarExpr::Constant(-T::one()), Box::new(self))
    }
}

impl<T: Real> Mul<FieldExpr<T>> for ScalarExpr<T> {
    type Output = FieldExpr<T>;

    fn mul(self, rhs: FieldExpr<T>) -> FieldExpr<T> {
        FieldExpr::Scaled(self, Box::new(rhs))
    }
}
