//! Symbolic residual forms.
//!
//! A semi-discrete problem is described by a residual form $F(t, u; v) = 0$: a sum of
//! terms, each pairing an opaque spatial operator applied to a *trial expression* with
//! a test function, scaled by a time-dependent coefficient. The representation here is
//! purely symbolic; the numeric meaning of operators and sources is supplied by a
//! [`SemidiscreteSystem`](crate::operators::SemidiscreteSystem) when the
//! form is assembled.
//!
//! All expression trees are immutable. The form transformers in [`crate::rk`] and
//! [`crate::galerkin`] never rewrite a user's form in place; they build new forms with
//! [`FieldExpr::substitute`] and friends, so the same semi-discrete form can safely be
//! handed to several steppers.

use nalgebra::Scalar;

use crate::operators::SemidiscreteSystem;
use crate::{ConfigError, Real};

mod field;
mod manipulation;
mod scalar;

pub use field::{FieldExpr, Substitution};
pub use manipulation::{split_form, SplitForm};
pub use scalar::ScalarExpr;

use crate::operators::OperatorId;

/// The test function of a form term, identified by stage and field.
///
/// Semi-discrete forms written by a user always test against stage 0; form
/// transformers introduce the remaining stage blocks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TestFunction {
    pub stage: usize,
    pub field: usize,
}

impl TestFunction {
    /// The test function of the given field in a semi-discrete form.
    pub fn field(field: usize) -> Self {
        Self { stage: 0, field }
    }

    /// The test function of the given stage block and field in a stage system.
    pub fn stage_field(stage: usize, field: usize) -> Self {
        Self { stage, field }
    }
}

/// One term $c(t, \Delta t) \, \langle A(e),\, v \rangle$ of a residual form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormTerm<T: Scalar> {
    /// Scalar factor multiplying the whole term.
    pub coefficient: ScalarExpr<T>,
    /// The time at which the operator itself is evaluated.
    pub time: ScalarExpr<T>,
    pub operator: OperatorId,
    pub trial: FieldExpr<T>,
    pub test: TestFunction,
}

impl<T: Real> FormTerm<T> {
    /// A term with unit coefficient, evaluated at the unsubstituted time $t$.
    pub fn new(operator: OperatorId, trial: FieldExpr<T>, test: TestFunction) -> Self {
        Self {
            coefficient: ScalarExpr::one(),
            time: ScalarExpr::time(),
            operator,
            trial,
            test,
        }
    }

    pub fn with_coefficient(mut self, coefficient: ScalarExpr<T>) -> Self {
        self.coefficient = coefficient;
        self
    }

    pub fn at_time(mut self, time: ScalarExpr<T>) -> Self {
        self.time = time;
        self
    }
}

/// A residual form: a sum of terms that must vanish at the solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Form<T: Scalar> {
    terms: Vec<FormTerm<T>>,
}

impl<T: Scalar> Default for Form<T> {
    fn default() -> Self {
        Self { terms: Vec::new() }
    }
}

impl<T: Scalar> Form<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, term: FormTerm<T>) {
        self.terms.push(term);
    }

    pub fn with_term(mut self, term: FormTerm<T>) -> Self {
        self.terms.push(term);
        self
    }

    pub fn terms(&self) -> &[FormTerm<T>] {
        &self.terms
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<T: Real> Form<T> {
    /// Validates the form against the operator and source registry of a system.
    ///
    /// Checks that every referenced operator, source and field exists, that operator
    /// input dimensions match their trial expressions, and that operator outputs match
    /// their test fields. Returns the first violation found.
    pub fn validate(&self, system: &SemidiscreteSystem<T>) -> Result<(), ConfigError> {
        let space = system.space();
        for term in &self.terms {
            let operator = system
                .operator(term.operator)
                .ok_or(ConfigError::UnknownOperator {
                    operator: term.operator.index(),
                })?;
            if term.test.field >= space.num_fields() {
                return Err(ConfigError::FieldIndexOutOfRange {
                    field: term.test.field,
                    num_fields: space.num_fields(),
                });
            }
            if let Some(found) = expression_dimension(&term.trial, system)? {
                if found != operator.input_dimension() {
                    return Err(ConfigError::OperatorInputMismatch {
                        operator: term.operator.index(),
                        expected: operator.input_dimension(),
                        found,
                    });
                }
            }
            let test_dim = space.field_dim(term.test.field);
            if operator.output_dimension() != test_dim {
                return Err(ConfigError::OperatorOutputMismatch {
                    operator: term.operator.index(),
                    expected: operator.output_dimension(),
                    found: test_dim,
                });
            }
        }
        Ok(())
    }
}

/// The dimension of a field expression, or `None` for an empty sum, which acts as a
/// zero of any dimension.
pub(crate) fn expression_dimension<T: Real>(
    expr: &FieldExpr<T>,
    system: &SemidiscreteSystem<T>,
) -> Result<Option<usize>, ConfigError> {
    let space = system.space();
    let field_dim = |field: usize| {
        if field < space.num_fields() {
            Ok(Some(space.field_dim(field)))
        } else {
            Err(ConfigError::FieldIndexOutOfRange {
                field,
                num_fields: space.num_fields(),
            })
        }
    };
    match expr {
        FieldExpr::PreviousSolution { field } => field_dim(*field),
        FieldExpr::TimeDerivative { field } => field_dim(*field),
        FieldExpr::Stage { field, .. } => field_dim(*field),
        FieldExpr::Source { source, .. } => {
            let source_term = system.source(*source).ok_or(ConfigError::UnknownSource {
                source: source.index(),
            })?;
            Ok(Some(source_term.dimension()))
        }
        FieldExpr::Scaled(_, e) => expression_dimension(e, system),
        FieldExpr::Sum(es) => {
            let mut dimension = None;
            for e in es {
                match (dimension, expression_dimension(e, system)?) {
                    (_, None) => {}
                    (None, d) => dimension = d,
                    (Some(expected), Some(found)) if expected != found => {
                        return Err(ConfigError::SumDimensionMismatch { expected, found });
                    }
                    _ => {}
                }
            }
            Ok(dimension)
        }
    }
}
