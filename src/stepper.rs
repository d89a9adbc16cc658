//! Drivers that march a semidiscrete system through time.
//!
//! [`TimeStepper`] advances a [`SemidiscreteSystem`] with an implicit Runge-Kutta
//! tableau and [`DiscontinuousGalerkinTimeStepper`] with a Galerkin-in-time
//! discretization, while [`AdaptiveTimeStepper`] wraps the former with embedded
//! error control. All steppers operate on a [`TimeState`] that owns the running
//! time, the current step size and the solution, and overwrite it in place.

use std::error::Error;
use std::fmt;

use nalgebra::{DVector, Scalar};

use crate::bc::{BcType, DirichletBc};
use crate::element::TimeElement;
use crate::form::Form;
use crate::galerkin;
use crate::nullspace::Nullspace;
use crate::operators::SemidiscreteSystem;
use crate::problem::StageProblem;
use crate::quadrature::TimeQuadrature;
use crate::rk::{self, Splitting};
use crate::solve::{NewtonSettings, NewtonSolver, SolveError, SolverStats};
use crate::space::{StageLayout, SystemState};
use crate::tableau::ButcherTableau;
use crate::{ConfigError, Real};

mod adaptive;

pub use adaptive::{AcceptedStep, AdaptiveSettings, AdaptiveTimeStepper};

/// The complete state of a time integration.
///
/// Steppers advance `t` and overwrite `u` in place. `dt` is the size of the next
/// step; fixed-step drivers leave it untouched, adaptive stepping rewrites it with
/// the proposed size of the next step.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeState<T: Scalar> {
    /// The time at the beginning of the next step.
    pub t: T,
    /// The size of the next step.
    pub dt: T,
    /// The solution at time `t`.
    pub u: SystemState<T>,
}

impl<T: Scalar> TimeState<T> {
    pub fn new(t: T, dt: T, u: SystemState<T>) -> Self {
        Self { t, dt, u }
    }
}

/// Failure modes of advancing a time step.
#[derive(Debug)]
pub enum StepError<T> {
    /// The nonlinear solve of the stage system failed.
    Solve(SolveError),
    /// Step size control proposed a step size below the configured minimum.
    MinimumTimeStep { dt_next: T, dt_min: T },
    /// The same step was rejected too many times in a row.
    RejectionLimitReached { attempts: usize, dt: T },
}

impl<T: fmt::Display> fmt::Display for StepError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StepError::Solve(error) => write!(f, "Stage solve failed: {}", error),
            StepError::MinimumTimeStep { dt_next, dt_min } => write!(
                f,
                "Proposed step size {} is below the minimum step size {}.",
                dt_next, dt_min
            ),
            StepError::RejectionLimitReached { attempts, dt } => write!(
                f,
                "Step was rejected {} times in a row, last attempted step size {}.",
                attempts, dt
            ),
        }
    }
}

impl<T: fmt::Debug + fmt::Display> Error for StepError<T> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StepError::Solve(error) => Some(error),
            _ => None,
        }
    }
}

impl<T> From<SolveError> for StepError<T> {
    fn from(error: SolveError) -> Self {
        StepError::Solve(error)
    }
}

/// Configuration of a Runge-Kutta stepper beyond the tableau itself.
#[derive(Debug, Clone)]
pub struct StepperOptions<T: Scalar> {
    /// How strongly enforced boundary conditions are imposed on the stages.
    pub bc_type: BcType,
    pub bcs: Vec<DirichletBc>,
    /// The splitting $A = A_1 A_2$ applied to the tableau matrix.
    pub splitting: Splitting<T>,
    pub nullspace: Option<Nullspace<T>>,
    pub newton_settings: NewtonSettings<T>,
}

impl<T: Real> Default for StepperOptions<T> {
    fn default() -> Self {
        Self {
            bc_type: BcType::Dae,
            bcs: Vec::new(),
            splitting: rk::ai,
            nullspace: None,
            newton_settings: NewtonSettings::default(),
        }
    }
}

/// Configuration of a Galerkin-in-time stepper beyond the element and quadrature.
#[derive(Debug, Clone)]
pub struct GalerkinOptions<T: Scalar> {
    pub bcs: Vec<DirichletBc>,
    pub nullspace: Option<Nullspace<T>>,
    pub newton_settings: NewtonSettings<T>,
}

impl<T: Real> Default for GalerkinOptions<T> {
    fn default() -> Self {
        Self {
            bcs: Vec::new(),
            nullspace: None,
            newton_settings: NewtonSettings::default(),
        }
    }
}

/// Advances a semidiscrete system in time with an implicit Runge-Kutta method.
///
/// Each step solves the coupled stage system produced by [`rk::build_stage_form`]
/// with Newton's method and applies the update
/// $u_{n+1} = u_n + \Delta t \sum_s \beta_s w_s$, where $\beta = A_2^{-T} b$
/// expresses the tableau weights in terms of the stage unknowns.
///
/// The stage vector is kept across steps, so each solve warm-starts from the
/// solution of the previous step.
pub struct TimeStepper<'a, T: Real> {
    problem: StageProblem<'a, T>,
    solver: NewtonSolver<T>,
    w: DVector<T>,
    update_weights: DVector<T>,
    error_weights: Option<DVector<T>>,
    order: usize,
    update_buf: DVector<T>,
    stats: SolverStats,
}

impl<'a, T: Real> TimeStepper<'a, T> {
    pub fn new(
        system: &'a SemidiscreteSystem<T>,
        form: &Form<T>,
        tableau: &ButcherTableau<T>,
        options: StepperOptions<T>,
    ) -> Result<Self, ConfigError> {
        let StepperOptions {
            bc_type,
            bcs,
            splitting,
            nullspace,
            newton_settings,
        } = options;
        let stage_form =
            rk::build_stage_form(system, form, tableau, splitting, bc_type, &bcs, nullspace.as_ref())?;
        let rk::StageForm {
            form,
            layout,
            bcs,
            nullspace,
            update_weights,
            error_weights,
            order,
        } = stage_form;
        let w = DVector::zeros(layout.total_dim());
        let update_buf = DVector::zeros(layout.stage_dim());
        let problem = StageProblem::new(system, form, layout, bcs, nullspace)?;
        Ok(Self {
            problem,
            solver: NewtonSolver::new(newton_settings),
            w,
            update_weights,
            error_weights,
            order,
            update_buf,
            stats: SolverStats::default(),
        })
    }

    /// The classical order of the underlying tableau.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn solver_stats(&self) -> &SolverStats {
        &self.stats
    }

    pub fn problem(&self) -> &StageProblem<'a, T> {
        &self.problem
    }

    /// Advances the state by one step of size `state.dt`.
    ///
    /// Overwrites `state.u` with the new solution and advances `state.t`; the step
    /// size is left unchanged.
    pub fn advance(&mut self, state: &mut TimeState<T>) -> Result<(), StepError<T>> {
        self.solve_stages(state)?;
        self.apply_update(&mut state.u, state.dt);
        state.t = state.t + state.dt;
        Ok(())
    }

    /// Solves the stage system at `(state.t, state.dt, state.u)` without committing
    /// an update.
    pub(crate) fn solve_stages(&mut self, state: &TimeState<T>) -> Result<(), StepError<T>> {
        assert!(state.dt > T::zero(), "step size must be positive");
        self.problem
            .refresh(state.t, state.dt, &state.u)
            .map_err(|error| StepError::Solve(SolveError::Assembly(error)))?;
        self.problem.apply_constraints(&mut self.w);
        let iterations = self.solver.solve(&mut self.problem, &mut self.w)?;
        self.stats.num_steps += 1;
        self.stats.num_nonlinear_iterations += iterations;
        self.stats.num_linear_iterations += iterations;
        Ok(())
    }

    /// Adds the weighted stage combination of the last solve to `u`.
    pub(crate) fn apply_update(&mut self, u: &mut SystemState<T>, dt: T) {
        combine_stages(
            &mut self.update_buf,
            &self.update_weights,
            &self.w,
            self.problem.layout(),
            dt,
        );
        let layout = self.problem.layout();
        for field in 0..layout.num_fields() {
            let range = layout.block_range(0, field);
            u.field_mut(field)
                .axpy(T::one(), &self.update_buf.rows_range(range), T::one());
        }
    }
}

/// Advances a semidiscrete system in time with a discontinuous Galerkin method.
///
/// Each step solves for the coefficients $U_j$ of the polynomial solution on the
/// step interval produced by [`galerkin::build_stage_form`] and evaluates its right
/// end point, $u_{n+1} = \sum_j \phi_j(1) \, U_j$.
pub struct DiscontinuousGalerkinTimeStepper<'a, T: Real> {
    problem: StageProblem<'a, T>,
    solver: NewtonSolver<T>,
    w: DVector<T>,
    update_weights: DVector<T>,
    update_buf: DVector<T>,
    stats: SolverStats,
}

impl<'a, T: Real> DiscontinuousGalerkinTimeStepper<'a, T> {
    pub fn new(
        system: &'a SemidiscreteSystem<T>,
        form: &Form<T>,
        element: &TimeElement<T>,
        quadrature: &TimeQuadrature<T>,
        options: GalerkinOptions<T>,
    ) -> Result<Self, ConfigError> {
        let GalerkinOptions {
            bcs,
            nullspace,
            newton_settings,
        } = options;
        let stage_form =
            galerkin::build_stage_form(system, form, element, quadrature, &bcs, nullspace.as_ref())?;
        let galerkin::StageForm {
            form,
            layout,
            bcs,
            nullspace,
            update_weights,
        } = stage_form;
        let w = DVector::zeros(layout.total_dim());
        let update_buf = DVector::zeros(layout.stage_dim());
        let problem = StageProblem::new(system, form, layout, bcs, nullspace)?;
        Ok(Self {
            problem,
            solver: NewtonSolver::new(newton_settings),
            w,
            update_weights,
            update_buf,
            stats: SolverStats::default(),
        })
    }

    pub fn solver_stats(&self) -> &SolverStats {
        &self.stats
    }

    pub fn problem(&self) -> &StageProblem<'a, T> {
        &self.problem
    }

    /// Advances the state by one step of size `state.dt`.
    ///
    /// Overwrites `state.u` with the trace of the polynomial solution at the end of
    /// the step and advances `state.t`; the step size is left unchanged.
    pub fn advance(&mut self, state: &mut TimeState<T>) -> Result<(), StepError<T>> {
        self.solve_stages(state)?;
        self.apply_update(&mut state.u);
        state.t = state.t + state.dt;
        Ok(())
    }

    fn solve_stages(&mut self, state: &TimeState<T>) -> Result<(), StepError<T>> {
        assert!(state.dt > T::zero(), "step size must be positive");
        self.problem
            .refresh(state.t, state.dt, &state.u)
            .map_err(|error| StepError::Solve(SolveError::Assembly(error)))?;
        self.problem.apply_constraints(&mut self.w);
        let iterations = self.solver.solve(&mut self.problem, &mut self.w)?;
        self.stats.num_steps += 1;
        self.stats.num_nonlinear_iterations += iterations;
        self.stats.num_linear_iterations += iterations;
        Ok(())
    }

    fn apply_update(&mut self, u: &mut SystemState<T>) {
        combine_stages(
            &mut self.update_buf,
            &self.update_weights,
            &self.w,
            self.problem.layout(),
            T::one(),
        );
        let layout = self.problem.layout();
        for field in 0..layout.num_fields() {
            let range = layout.block_range(0, field);
            u.field_mut(field)
                .copy_from(&self.update_buf.rows_range(range));
        }
    }
}

/// Accumulates `out = scale * sum_s weights[s] * w_s` over the stage blocks of `w`.
fn combine_stages<T: Real>(
    out: &mut DVector<T>,
    weights: &DVector<T>,
    w: &DVector<T>,
    layout: &StageLayout,
    scale: T,
) {
    out.fill(T::zero());
    for (stage, weight) in weights.iter().enumerate() {
        out.axpy(scale * *weight, &w.rows_range(layout.stage_range(stage)), T::one());
    }
}
