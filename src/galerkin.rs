//! Discontinuous-Galerkin-in-time transformation of semi-discrete forms.
//!
//! The solution over one step is represented as a polynomial
//! $u_h(\tau) = \sum_j U_j \, \varphi_j(\tau)$ on the unit interval, with one stage
//! unknown block $U_j$ per basis function of a discontinuous Lagrange
//! [`TimeElement`]. Testing against $v \, \varphi_i$ and integrating with a
//! [`TimeQuadrature`] rule turns the semi-discrete residual into
//! $\Delta t \sum_q w_q \varphi_i(\tau_q) F(t + \tau_q \Delta t, u_h(\tau_q); v)$,
//! where time derivatives become $\frac{1}{\Delta t} \sum_j \varphi_j'(\tau_q) U_j$.
//! Weak continuity with the previous step is enforced by the upwind jump
//! $\varphi_i(0) \, \langle A(u_h(0^+) - u_0), v \rangle$ applied to the
//! time-derivative terms. The end-of-step state is the right trace
//! $u_0 \leftarrow \sum_j \varphi_j(1) U_j$.
//!
//! For $k = 0$ the basis derivative vanishes, the jump carries the whole coupling and
//! the scheme degenerates to implicit Euler.

use itertools::izip;
use nalgebra::{DVector, Scalar};

use crate::bc::{DirichletBc, StageBoundaryCondition};
use crate::element::TimeElement;
use crate::form::{split_form, FieldExpr, Form, FormTerm, ScalarExpr, Substitution, TestFunction};
use crate::nullspace::{Nullspace, StageNullspace};
use crate::operators::SemidiscreteSystem;
use crate::quadrature::TimeQuadrature;
use crate::space::StageLayout;
use crate::{ConfigError, Real};

/// The product of the Galerkin-in-time transformation.
#[derive(Debug, Clone)]
pub struct StageForm<T: Scalar> {
    /// Coupled residual form in the stage unknowns.
    pub form: Form<T>,
    /// Block layout of the stage vector.
    pub layout: StageLayout,
    /// Boundary conditions lowered onto the stage unknowns.
    pub bcs: Vec<StageBoundaryCondition<T>>,
    /// Stage-replicated null-space basis, if the problem has one.
    pub nullspace: Option<StageNullspace<T>>,
    /// Basis values at the right endpoint, combining stage unknowns into the
    /// end-of-step state.
    pub update_weights: DVector<T>,
}

/// Transforms a semi-discrete residual form into the coupled residual of one
/// Galerkin-in-time step.
///
/// The input form must be posed on the semi-discrete spaces: every term tests against
/// stage 0 and no trial expression references stage unknowns (assertions). The
/// quadrature rule must have at least `element.degree() + 1` points, enough to keep
/// the element's mass matrix exact and invertible.
pub fn build_stage_form<T: Real>(
    system: &SemidiscreteSystem<T>,
    form: &Form<T>,
    element: &TimeElement<T>,
    quadrature: &TimeQuadrature<T>,
    bcs: &[DirichletBc],
    nullspace: Option<&Nullspace<T>>,
) -> Result<StageForm<T>, ConfigError> {
    form.validate(system)?;
    for term in form.terms() {
        assert_eq!(term.test.stage, 0, "semi-discrete forms test against stage 0");
        assert!(
            term.trial.max_stage_index().is_none(),
            "semi-discrete forms must not reference stage unknowns"
        );
    }

    let space = system.space();
    let num_stages = element.num_nodes();
    let layout = StageLayout::new(num_stages, space);

    let required = element.degree() + 1;
    if quadrature.len() < required {
        return Err(ConfigError::QuadratureTooWeak {
            num_points: quadrature.len(),
            required,
        });
    }

    let table = element.tabulate(quadrature.points());
    let split = split_form(form);
    let mut coupled = Form::new();

    // Quadrature part: every term of the form, integrated over the step.
    for (q, (&tau, &wq)) in izip!(quadrature.points(), quadrature.weights()).enumerate() {
        let stage_time = ScalarExpr::stage_time(tau);
        let mut substitution = Substitution::new();
        for field in 0..space.num_fields() {
            let value = FieldExpr::linear_combination(
                (0..num_stages).map(|j| (ScalarExpr::constant(table.values()[(j, q)]), FieldExpr::stage(j, field))),
            );
            let derivative = (ScalarExpr::one() / ScalarExpr::time_step())
                * FieldExpr::linear_combination((0..num_stages).map(|j| {
                    (ScalarExpr::constant(table.derivatives()[(j, q)]), FieldExpr::stage(j, field))
                }));
            substitution = substitution
                .replace_value(field, value)
                .replace_derivative(field, derivative);
        }
        for term in split.time.terms().iter().chain(split.remainder.terms()) {
            let trial = term.trial.substitute(&substitution).substitute_time(&stage_time);
            for i in 0..num_stages {
                let phi_iq = table.values()[(i, q)];
                if phi_iq == T::zero() {
                    continue;
                }
                coupled.add_term(FormTerm {
                    coefficient: term.coefficient.substitute_time(&stage_time)
                        * ScalarExpr::time_step()
                        * ScalarExpr::constant(wq * phi_iq),
                    time: term.time.substitute_time(&stage_time),
                    operator: term.operator,
                    trial: trial.clone(),
                    test: TestFunction::stage_field(i, term.test.field),
                });
            }
        }
    }

    // Jump part: time-derivative terms tested at the left endpoint.
    let left_values = element.evaluate_basis(T::zero());
    let mut jump_substitution = Substitution::new();
    for field in 0..space.num_fields() {
        let trace = FieldExpr::linear_combination(
            (0..num_stages).map(|j| (ScalarExpr::constant(left_values[j]), FieldExpr::stage(j, field))),
        );
        jump_substitution = jump_substitution
            .replace_derivative(field, trace.clone() - FieldExpr::previous_solution(field))
            .replace_value(field, trace);
    }
    for term in split.time.terms() {
        let trial = term.trial.substitute(&jump_substitution);
        for i in 0..num_stages {
            let phi_i0 = left_values[i];
            if phi_i0 == T::zero() {
                continue;
            }
            coupled.add_term(FormTerm {
                coefficient: term.coefficient.clone() * ScalarExpr::constant(phi_i0),
                time: term.time.clone(),
                operator: term.operator,
                trial: trial.clone(),
                test: TestFunction::stage_field(i, term.test.field),
            });
        }
    }

    let mut stage_bcs = Vec::with_capacity(bcs.len());
    if !bcs.is_empty() {
        // L2 projector P = M^{-1} Phi diag(w) onto the element's basis, computed once
        // and applied to fresh data samples every step.
        let phi = table.values();
        let mut weighted = phi.clone();
        for (mut column, &w) in izip!(weighted.column_iter_mut(), quadrature.weights()) {
            column *= w;
        }
        let mass = &weighted * phi.transpose();
        let projector = mass
            .lu()
            .solve(&weighted)
            .ok_or(ConfigError::SingularTimeMassMatrix)?;
        let sample_points = DVector::from_column_slice(quadrature.points());
        for (bc_index, bc) in bcs.iter().enumerate() {
            bc.validate(bc_index, system)?;
            stage_bcs.push(StageBoundaryCondition::projection(
                bc.clone(),
                sample_points.clone(),
                projector.clone(),
            ));
        }
    }

    let stage_nullspace = match nullspace {
        Some(nullspace) => {
            nullspace.validate(space)?;
            Some(StageNullspace::replicate(nullspace, &layout))
        }
        None => None,
    };

    Ok(StageForm {
        form: coupled,
        layout,
        bcs: stage_bcs,
        nullspace: stage_nullspace,
        update_weights: element.evaluate_basis(T::one()),
    })
}
