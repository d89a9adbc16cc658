//! Embedded-pair step size control for implicit Runge-Kutta stepping.

use log::debug;
use nalgebra::DVector;
use numeric_literals::replace_float_literals;

use crate::{ConfigError, Real};

use super::{combine_stages, StepError, TimeState, TimeStepper};

/// Settings of the proportional step size controller.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveSettings<T> {
    /// Target truncation error per step.
    pub tolerance: T,
    /// Smallest admissible step size; stepping fails rather than go below it.
    pub dt_min: T,
    /// Upper bound on consecutive rejections of a single step, or `None` for no
    /// bound.
    pub max_rejections: Option<usize>,
}

impl<T> AdaptiveSettings<T> {
    /// Creates settings with the given tolerance and minimum step size, and a
    /// rejection cap of 50 attempts per step.
    pub fn new(tolerance: T, dt_min: T) -> Self {
        Self {
            tolerance,
            dt_min,
            max_rejections: Some(50),
        }
    }
}

/// The report of one accepted adaptive step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedStep<T> {
    /// Estimated truncation error of the accepted step.
    pub error_estimate: T,
    /// Step size proposed for the next step, already written back to the state.
    pub dt_next: T,
}

/// Wraps a [`TimeStepper`] with proportional control of the step size based on the
/// embedded error weights of its tableau.
///
/// After every stage solve the truncation error $e$ is estimated from the embedded
/// pair and the step size factor
/// $q = 0.84 \, (\mathrm{tol} / e)^{1/(p - 1)}$, clamped to $[0.1, 4]$, is applied
/// to the step size, where $p$ is the order of the method. Steps with $e$ at or
/// above the tolerance are re-solved with the reduced step size.
pub struct AdaptiveTimeStepper<'a, T: Real> {
    stepper: TimeStepper<'a, T>,
    error_weights: DVector<T>,
    settings: AdaptiveSettings<T>,
    num_accepted: usize,
    num_rejected: usize,
}

impl<'a, T: Real> AdaptiveTimeStepper<'a, T> {
    /// Wraps the given stepper, which must be built from a tableau with embedded
    /// weights and order at least two.
    pub fn new(stepper: TimeStepper<'a, T>, settings: AdaptiveSettings<T>) -> Result<Self, ConfigError> {
        let error_weights = stepper
            .error_weights
            .clone()
            .ok_or(ConfigError::MissingEmbeddedWeights)?;
        if stepper.order() < 2 {
            return Err(ConfigError::AdaptiveOrderTooLow {
                order: stepper.order(),
            });
        }
        Ok(Self {
            stepper,
            error_weights,
            settings,
            num_accepted: 0,
            num_rejected: 0,
        })
    }

    pub fn settings(&self) -> &AdaptiveSettings<T> {
        &self.settings
    }

    /// Number of steps accepted so far.
    pub fn num_accepted(&self) -> usize {
        self.num_accepted
    }

    /// Number of step attempts rejected so far.
    pub fn num_rejected(&self) -> usize {
        self.num_rejected
    }

    pub fn stepper(&self) -> &TimeStepper<'a, T> {
        &self.stepper
    }

    /// Attempts to advance the state by one step, shrinking the step size until the
    /// error estimate satisfies the tolerance.
    ///
    /// On success `state.u` holds the accepted solution, `state.t` has advanced by
    /// the accepted step size and `state.dt` holds the predicted size of the next
    /// step.
    pub fn advance(&mut self, state: &mut TimeState<T>) -> Result<AcceptedStep<T>, StepError<T>> {
        let mut attempts = 0;
        loop {
            debug!("Trying step size {} at time {}", state.dt, state.t);
            self.stepper.solve_stages(state)?;
            let error = self.estimate_error(state.dt);
            debug!("Truncation error estimate: {}", error);
            let q = self.step_factor(error);
            debug!("Step size factor: {}", q);
            let dt_next = q * state.dt;
            if error >= self.settings.tolerance {
                attempts += 1;
                self.num_rejected += 1;
                if self
                    .settings
                    .max_rejections
                    .map(|cap| attempts >= cap)
                    .unwrap_or(false)
                {
                    return Err(StepError::RejectionLimitReached {
                        attempts,
                        dt: state.dt,
                    });
                }
                debug!("Step rejected, retrying with step size {}", dt_next);
                state.dt = dt_next;
            } else if dt_next <= self.settings.dt_min {
                return Err(StepError::MinimumTimeStep {
                    dt_next,
                    dt_min: self.settings.dt_min,
                });
            } else {
                debug!("Step accepted, next step size is {}", dt_next);
                let dt = state.dt;
                self.stepper.apply_update(&mut state.u, dt);
                state.t = state.t + dt;
                state.dt = dt_next;
                self.num_accepted += 1;
                return Ok(AcceptedStep {
                    error_estimate: error,
                    dt_next,
                });
            }
        }
    }

    /// Estimates the truncation error of the last stage solve as the norm of the
    /// difference between the updates of the method and its embedded companion.
    fn estimate_error(&mut self, dt: T) -> T {
        let stepper = &mut self.stepper;
        combine_stages(
            &mut stepper.update_buf,
            &self.error_weights,
            &stepper.w,
            stepper.problem.layout(),
            dt,
        );
        stepper.update_buf.norm()
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn step_factor(&self, error: T) -> T {
        if error == T::zero() {
            return 4.0;
        }
        let order = T::from_usize(self.stepper.order()).expect("Must be able to fit usize in T");
        let q = 0.84 * (self.settings.tolerance / error).powf(1.0 / (order - 1.0));
        q.clamp(0.1, 4.0)
    }
}
