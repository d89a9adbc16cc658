use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{dvector, DMatrix};

use skoll::bc::{BcType, DirichletBc};
use skoll::form::{FieldExpr, Form, FormTerm, ScalarExpr, TestFunction};
use skoll::nullspace::Nullspace;
use skoll::operators::SourceFunction;
use skoll::rk;
use skoll::tableau::ButcherTableau;
use skoll::ConfigError;

use crate::unit_tests::{decay_form, scalar_system};

fn build(
    tableau: &ButcherTableau<f64>,
    splitting: rk::Splitting<f64>,
) -> rk::StageForm<f64> {
    let (system, operator) = scalar_system();
    rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        tableau,
        splitting,
        BcType::Dae,
        &[],
        None,
    )
    .unwrap()
}

#[test]
fn trivial_splitting_keeps_the_quadrature_weights() {
    let tableau = ButcherTableau::<f64>::radau_iia(2);
    let stage_form = build(&tableau, rk::ai);
    assert_eq!(&stage_form.update_weights, tableau.b());
    assert_eq!(stage_form.order, 3);
    assert_eq!(stage_form.layout.num_stages(), 2);
}

#[test]
fn inverse_splitting_of_a_stiffly_accurate_method_selects_the_last_stage() {
    // For stiffly accurate methods the last row of A equals b, so A^{-T} b is the
    // last unit vector
    let tableau = ButcherTableau::<f64>::radau_iia(2);
    let stage_form = build(&tableau, rk::ia);
    assert_matrix_eq!(stage_form.update_weights, dvector![0.0, 1.0], comp = abs, tol = 1e-13);
}

#[test]
fn embedded_weights_turn_into_error_weights() {
    let gamma = 1.0 - 2.0_f64.sqrt() / 2.0;
    let stage_form = build(&ButcherTableau::sdirk2(), rk::ai);
    let error_weights = stage_form.error_weights.unwrap();
    assert_matrix_eq!(error_weights, dvector![-gamma, gamma], comp = abs, tol = 1e-14);
}

#[test]
fn methods_without_embedded_weights_have_no_error_weights() {
    let stage_form = build(&ButcherTableau::<f64>::radau_iia(2), rk::ai);
    assert!(stage_form.error_weights.is_none());
}

#[test]
fn backward_euler_replaces_derivatives_and_values_stage_by_stage() {
    let stage_form = build(&ButcherTableau::backward_euler(), rk::ai);
    let terms = stage_form.form.terms();
    assert_eq!(terms.len(), 2);
    assert_eq!(terms[0].test, TestFunction::stage_field(0, 0));
    assert_eq!(terms[1].test, TestFunction::stage_field(0, 0));

    // The derivative term becomes the stage unknown itself, the value term becomes
    // u0 + dt * w with the single stage weight dt * a_11
    assert_eq!(terms[0].trial.stage_weight(0, 0, 0.0, 0.25), 1.0);
    assert_eq!(terms[1].trial.stage_weight(0, 0, 0.0, 0.25), 0.25);
}

#[test]
fn term_times_shift_to_the_stage_abscissae() {
    let (system, operator) = scalar_system();
    let form = Form::new().with_term(
        FormTerm::new(operator, FieldExpr::time_derivative(0), TestFunction::field(0))
            .with_coefficient(ScalarExpr::time()),
    );
    let tableau = ButcherTableau::<f64>::radau_iia(2);
    let stage_form =
        rk::build_stage_form(&system, &form, &tableau, rk::ai, BcType::Dae, &[], None).unwrap();

    let terms = stage_form.form.terms();
    assert_eq!(terms.len(), 2);
    assert_eq!(terms[0].test.stage, 0);
    assert_eq!(terms[1].test.stage, 1);
    assert_scalar_eq!(terms[0].coefficient.evaluate(1.0, 0.3), 1.1, comp = abs, tol = 1e-15);
    assert_scalar_eq!(terms[1].coefficient.evaluate(1.0, 0.3), 1.3, comp = abs, tol = 1e-15);
}

#[test]
fn splittings_must_multiply_back_to_the_tableau() {
    fn bad_splitting(a: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        (a * 2.0, DMatrix::identity(a.nrows(), a.ncols()))
    }

    let (system, operator) = scalar_system();
    let result = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &ButcherTableau::<f64>::radau_iia(2),
        bad_splitting,
        BcType::Dae,
        &[],
        None,
    );
    assert_eq!(result.unwrap_err(), ConfigError::InvalidSplitting);
}

#[test]
fn singular_interpolation_factors_are_rejected() {
    // Lobatto IIIA methods have a singular A, so the (I, A) splitting cannot recover
    // stage derivatives from the stage unknowns
    let (system, operator) = scalar_system();
    let result = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &ButcherTableau::<f64>::lobatto_iiia(2),
        rk::ia,
        BcType::Dae,
        &[],
        None,
    );
    assert_eq!(
        result.unwrap_err(),
        ConfigError::SingularSplittingFactor { factor: "A2" }
    );
}

#[test]
fn dae_conditions_need_an_invertible_first_factor() {
    let (mut system, operator) = scalar_system();
    let data = system.add_source(SourceFunction::new(1, |mut out: nalgebra::DVectorViewMut<f64>, t| {
        out[0] = t;
    }));
    let bc = DirichletBc::new(0, vec![0], data);
    let result = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &ButcherTableau::<f64>::lobatto_iiia(2),
        rk::ai,
        BcType::Dae,
        &[bc],
        None,
    );
    assert_eq!(
        result.unwrap_err(),
        ConfigError::SingularSplittingFactor { factor: "A1" }
    );
}

#[test]
fn nullspace_validation_errors_propagate() {
    let (system, operator) = scalar_system();
    let nullspace = Nullspace::new(vec![(0, dvector![1.0, 1.0])]);
    let result = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &ButcherTableau::backward_euler(),
        rk::ai,
        BcType::Dae,
        &[],
        Some(&nullspace),
    );
    assert_eq!(
        result.unwrap_err(),
        ConfigError::NullspaceDimensionMismatch {
            field: 0,
            expected: 1,
            found: 2,
        }
    );
}

#[test]
#[should_panic(expected = "semi-discrete forms test against stage 0")]
fn forms_testing_against_stage_unknowns_are_rejected() {
    let (system, operator) = scalar_system();
    let form = Form::new().with_term(FormTerm::new(
        operator,
        FieldExpr::time_derivative(0),
        TestFunction::stage_field(1, 0),
    ));
    let _ = rk::build_stage_form(
        &system,
        &form,
        &ButcherTableau::backward_euler(),
        rk::ai,
        BcType::Dae,
        &[],
        None,
    );
}

#[test]
#[should_panic(expected = "semi-discrete forms must not reference stage unknowns")]
fn forms_trialing_stage_unknowns_are_rejected() {
    let (system, operator) = scalar_system();
    let form = Form::new().with_term(FormTerm::new(
        operator,
        FieldExpr::stage(0, 0),
        TestFunction::field(0),
    ));
    let _ = rk::build_stage_form(
        &system,
        &form,
        &ButcherTableau::backward_euler(),
        rk::ai,
        BcType::Dae,
        &[],
        None,
    );
}

#[test]
fn invalid_forms_are_rejected_before_transformation() {
    let (system, _) = scalar_system();
    let form = Form::new().with_term(FormTerm::new(
        skoll::operators::OperatorId::from_index(3),
        FieldExpr::time_derivative(0),
        TestFunction::field(0),
    ));
    let result = rk::build_stage_form(
        &system,
        &form,
        &ButcherTableau::backward_euler(),
        rk::ai,
        BcType::Dae,
        &[],
        None,
    );
    assert_eq!(result.unwrap_err(), ConfigError::UnknownOperator { operator: 3 });
}
