//! Newton solution of the nonlinear stage systems.

use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::Real;

/// A nonlinear system $F(w) = 0$ in the stage unknowns, together with a solver for
/// its linearizations.
pub trait StageSystem<T: Scalar> {
    fn dimension(&self) -> usize;

    /// Evaluates the residual at `w`.
    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, w: &DVectorView<T>) -> eyre::Result<()>;

    /// Solves the linearized system $J(w) \, \Delta = b$.
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        w: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), SolveError>;
}

impl<T: Scalar, F: StageSystem<T>> StageSystem<T> for &mut F {
    fn dimension(&self) -> usize {
        F::dimension(self)
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, w: &DVectorView<T>) -> eyre::Result<()> {
        F::eval_into(self, f, w)
    }

    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        w: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), SolveError> {
        F::solve_jacobian_system(self, sol, w, rhs)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NewtonSettings<T> {
    pub max_iterations: Option<usize>,
    pub tolerance: T,
}

impl<T: Real> Default for NewtonSettings<T> {
    fn default() -> Self {
        Self {
            max_iterations: Some(50),
            tolerance: T::default_epsilon().sqrt(),
        }
    }
}

#[derive(Debug)]
pub enum SolveError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached(usize),
    /// The linearized stage system could not be factorized.
    SingularJacobian,
    /// Evaluating the residual or its Jacobian failed.
    Assembly(eyre::Report),
}

impl Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &SolveError::MaximumIterationsReached(maxit) => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", maxit)
            }
            SolveError::SingularJacobian => {
                write!(f, "Failed to solve Jacobian system: matrix is singular.")
            }
            SolveError::Assembly(report) => {
                write!(f, "Failed to assemble stage system. Error: {}", report)
            }
        }
    }
}

impl Error for SolveError {}

/// Cumulative work counters of a time stepper.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStats {
    /// Number of completed steps, including rejected attempts.
    pub num_steps: usize,
    pub num_nonlinear_iterations: usize,
    pub num_linear_iterations: usize,
}

/// A Newton solver with owned workspace vectors, reusable across steps.
#[derive(Debug)]
pub struct NewtonSolver<T: Scalar> {
    settings: NewtonSettings<T>,
    f: DVector<T>,
    dw: DVector<T>,
}

impl<T: Real> NewtonSolver<T> {
    pub fn new(settings: NewtonSettings<T>) -> Self {
        Self {
            settings,
            f: DVector::zeros(0),
            dw: DVector::zeros(0),
        }
    }

    pub fn settings(&self) -> &NewtonSettings<T> {
        &self.settings
    }

    /// Solves F(w) = 0 with `w` as the initial guess, resizing the workspace if
    /// necessary. Returns the number of iterations performed.
    pub fn solve<F: StageSystem<T>>(
        &mut self,
        function: F,
        w: &mut DVector<T>,
    ) -> Result<usize, SolveError> {
        let n = function.dimension();
        assert_eq!(w.len(), n);
        if self.f.len() != n {
            self.f = DVector::zeros(n);
            self.dw = DVector::zeros(n);
        }
        newton(function, w, &mut self.f, &mut self.dw, self.settings)
    }
}

/// Attempts to solve the non-linear stage equations F(w) = 0.
///
/// No heap allocation is performed. The solution is said to have converged if
/// ```|F(w)|_2 <= tolerance```.
///
/// If successful, returns the number of iterations performed.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn newton<'a, T, F>(
    mut function: F,
    w: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dw: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
) -> Result<usize, SolveError>
where
    T: Real,
    F: StageSystem<T>,
{
    let mut w = w.into();
    let mut f = f.into();
    let mut dw = dw.into();

    assert_eq!(w.nrows(), f.nrows());
    assert_eq!(dw.nrows(), f.nrows());

    function
        .eval_into(&mut f, &DVectorView::from(&w))
        .map_err(SolveError::Assembly)?;

    let mut iter = 0;

    while f.norm() > settings.tolerance {
        if settings
            .max_iterations
            .map(|max_iter| iter == max_iter)
            .unwrap_or(false)
        {
            return Err(SolveError::MaximumIterationsReached(iter));
        }

        // Solve the system J dw = f, so that the Newton update is w <- w - dw
        function.solve_jacobian_system(&mut dw, &DVectorView::from(&w), &DVectorView::from(&f))?;
        w.axpy(-1.0, &dw, 1.0);

        function
            .eval_into(&mut f, &DVectorView::from(&w))
            .map_err(SolveError::Assembly)?;
        debug!("Newton residual norm at iter {}: {}", iter, f.norm());
        iter += 1;
    }

    Ok(iter)
}
