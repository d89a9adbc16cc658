//! Runge-Kutta stage transformation of semi-discrete forms.
//!
//! Given a residual form $F(t, u; v) = 0$ and an $s$-stage Butcher tableau $(A, b, c)$,
//! the transformation introduces one stage unknown block $w_i$ per stage and builds the
//! coupled residual whose $i$-th block reads
//! $F(t + c_i \Delta t,\; u_0 + \Delta t \sum_j (A_1)_{ij} w_j;\; v_i) = 0$,
//! where time derivatives of the solution are replaced by $\sum_j (A_2^{-1})_{ij} w_j$
//! for a splitting $A = A_1 A_2$ of the tableau matrix. With the default [`ai`]
//! splitting this is the standard implicit collocation form, in which $w_i$ coincides
//! with the stage derivative $k_i$. The end-of-step update is
//! $u_0 \leftarrow u_0 + \Delta t \sum_i \beta_i w_i$ with $\beta = A_2^{-T} b$.

use nalgebra::{DMatrix, DVector, Scalar};

use crate::bc::{BcType, DirichletBc, StageBoundaryCondition};
use crate::form::{FieldExpr, Form, FormTerm, ScalarExpr, Substitution, TestFunction};
use crate::nullspace::{Nullspace, StageNullspace};
use crate::operators::SemidiscreteSystem;
use crate::space::StageLayout;
use crate::tableau::ButcherTableau;
use crate::{ConfigError, Real};

/// A factorization $A = A_1 A_2$ of the Runge-Kutta matrix.
///
/// $A_1$ enters the stage value expressions, $A_2$ relates the stage unknowns to the
/// stage derivatives through $k = A_2^{-1} w$. The product is validated against $A$
/// when a stage form is built.
pub type Splitting<T> = fn(&DMatrix<T>) -> (DMatrix<T>, DMatrix<T>);

/// The trivial splitting $A_1 = A$, $A_2 = I$, under which the stage unknowns are the
/// stage derivatives.
pub fn ai<T: Real>(a: &DMatrix<T>) -> (DMatrix<T>, DMatrix<T>) {
    (a.clone(), DMatrix::identity(a.nrows(), a.ncols()))
}

/// The reversed splitting $A_1 = I$, $A_2 = A$, under which the stage unknowns are the
/// stage values shifted by $u_0$ and scaled by $1 / \Delta t$.
pub fn ia<T: Real>(a: &DMatrix<T>) -> (DMatrix<T>, DMatrix<T>) {
    (DMatrix::identity(a.nrows(), a.ncols()), a.clone())
}

/// The product of the Runge-Kutta stage transformation: the coupled residual form over
/// the stage-replicated space together with everything the stepper needs to drive it.
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
    /// Weights $\beta = A_2^{-T} b$ combining stage unknowns into the state increment.
    pub update_weights: DVector<T>,
    /// Weights $A_2^{-T} (b - \tilde b)$ combining stage unknowns into the embedded
    /// error increment, when the tableau carries embedded weights.
    pub error_weights: Option<DVector<T>>,
    /// Consistency order of the method.
    pub order: usize,
}

/// Transforms a semi-discrete residual form into the coupled residual of one implicit
/// Runge-Kutta step.
///
/// The input form must be posed on the semi-discrete spaces: every term tests against
/// stage 0 and no trial expression references stage unknowns (assertions). Registry,
/// dimension, splitting and boundary-condition problems are reported as configuration
/// errors.
pub fn build_stage_form<T: Real>(
    system: &SemidiscreteSystem<T>,
    form: &Form<T>,
    tableau: &ButcherTableau<T>,
    splitting: Splitting<T>,
    bc_type: BcType,
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
    let num_stages = tableau.num_stages();
    let layout = StageLayout::new(num_stages, space);

    let (a1, a2) = splitting(tableau.a());
    let tol = T::default_epsilon().sqrt();
    if (&a1 * &a2 - tableau.a()).norm() > tol * T::one().max(tableau.a().norm()) {
        return Err(ConfigError::InvalidSplitting);
    }
    let a2_inv = a2
        .clone()
        .try_inverse()
        .ok_or(ConfigError::SingularSplittingFactor { factor: "A2" })?;

    let update_weights = a2_inv.transpose() * tableau.b();
    let error_weights = tableau
        .embedded_weights()
        .map(|btilde| a2_inv.transpose() * (tableau.b() - btilde));

    let mut coupled = Form::new();
    for i in 0..num_stages {
        let stage_time = ScalarExpr::stage_time(tableau.c()[i]);
        let mut substitution = Substitution::new();
        for field in 0..space.num_fields() {
            let value = FieldExpr::previous_solution(field)
                + ScalarExpr::time_step()
                    * FieldExpr::linear_combination(
                        (0..num_stages)
                            .map(|j| (ScalarExpr::constant(a1[(i, j)]), FieldExpr::stage(j, field))),
                    );
            let derivative = FieldExpr::linear_combination(
                (0..num_stages).map(|j| (ScalarExpr::constant(a2_inv[(i, j)]), FieldExpr::stage(j, field))),
            );
            substitution = substitution
                .replace_value(field, value)
                .replace_derivative(field, derivative);
        }
        for term in form.terms() {
            coupled.add_term(FormTerm {
                coefficient: term.coefficient.substitute_time(&stage_time),
                time: term.time.substitute_time(&stage_time),
                operator: term.operator,
                trial: term.trial.substitute(&substitution).substitute_time(&stage_time),
                test: TestFunction::stage_field(i, term.test.field),
            });
        }
    }

    let mut stage_bcs = Vec::with_capacity(bcs.len());
    match bc_type {
        BcType::Dae => {
            if !bcs.is_empty() {
                let a1_inv = a1
                    .clone()
                    .try_inverse()
                    .ok_or(ConfigError::SingularSplittingFactor { factor: "A1" })?;
                for (bc_index, bc) in bcs.iter().enumerate() {
                    bc.validate(bc_index, system)?;
                    stage_bcs.push(StageBoundaryCondition::dae(
                        bc.clone(),
                        tableau.c().clone(),
                        a1_inv.clone(),
                    ));
                }
            }
        }
        BcType::Ode => {
            for (bc_index, bc) in bcs.iter().enumerate() {
                bc.validate(bc_index, system)?;
                let derivative = bc
                    .derivative()
                    .ok_or(ConfigError::MissingBoundaryDerivative { bc_index })?;
                stage_bcs.push(StageBoundaryCondition::ode(
                    bc.clone(),
                    derivative,
                    tableau.c().clone(),
                    a2.clone(),
                ));
            }
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
        update_weights,
        error_weights,
        order: tableau.order(),
    })
}
