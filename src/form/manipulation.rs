use nalgebra::Scalar;

use crate::form::Form;
use crate::Real;

/// The outcome of splitting a residual form at its time-derivative terms.
///
/// `time` collects every term whose trial expression references a time derivative,
/// `remainder` everything else. Together they reproduce the original form.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitForm<T: Scalar> {
    pub time: Form<T>,
    pub remainder: Form<T>,
}

/// Splits a form into its time-derivative part and the remainder.
///
/// Galerkin-in-time discretizations treat the two parts differently: the
/// time-derivative part produces the weak derivative and jump terms, while the
/// remainder is merely sampled at the quadrature points.
pub fn split_form<T: Real>(form: &Form<T>) -> SplitForm<T> {
    let mut time = Form::new();
    let mut remainder = Form::new();
    for term in form.terms() {
        if term.trial.has_time_derivative() {
            time.add_term(term.clone());
        } else {
            remainder.add_term(term.clone());
        }
    }
    SplitForm { time, remainder }
}
