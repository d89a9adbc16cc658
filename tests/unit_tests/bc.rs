use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{dvector, DMatrix, DVectorViewMut};
use proptest::prelude::*;

use skoll::bc::{BcType, DirichletBc};
use skoll::element::TimeElement;
use skoll::galerkin;
use skoll::operators::{SourceFunction, SourceId};
use skoll::quadrature::TimeQuadrature;
use skoll::rk;
use skoll::space::SystemState;
use skoll::tableau::ButcherTableau;
use skoll::ConfigError;

use crate::unit_tests::{decay_form, scalar_system};

fn linear_ramp_source() -> impl Fn(DVectorViewMut<f64>, f64) {
    |mut out, t| out[0] = t
}

#[test]
fn dae_conditions_pin_the_stage_values() {
    let (mut system, operator) = scalar_system();
    let data = system.add_source(SourceFunction::new(1, linear_ramp_source()));
    let bc = DirichletBc::new(0, vec![0], data);

    let tableau = ButcherTableau::backward_euler();
    let stage_form = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &tableau,
        rk::ai,
        BcType::Dae,
        &[bc],
        None,
    )
    .unwrap();

    // g(t + dt) = 0.75, so the single stage unknown must be (0.75 - 0.3) / dt
    let u0 = SystemState::from_fields(vec![dvector![0.3]]);
    let targets = stage_form.bcs[0].stage_targets(&system, 0.5, 0.25, &u0).unwrap();
    assert_eq!(targets.shape(), (1, 1));
    assert_scalar_eq!(targets[(0, 0)], 1.8, comp = abs, tol = 1e-14);
}

#[test]
fn ode_conditions_pin_the_stage_derivatives() {
    let (mut system, operator) = scalar_system();
    let data = system.add_source(SourceFunction::new(1, linear_ramp_source()));
    let derivative = system.add_source(SourceFunction::new(1, |mut out: DVectorViewMut<f64>, _| {
        out[0] = 1.0;
    }));
    let bc = DirichletBc::new(0, vec![0], data).with_derivative(derivative);

    let tableau = ButcherTableau::backward_euler();
    let stage_form = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &tableau,
        rk::ai,
        BcType::Ode,
        &[bc],
        None,
    )
    .unwrap();

    // With the trivial splitting the stage unknowns are the stage derivatives, so the
    // target is g'(t + dt) itself
    let u0 = SystemState::from_fields(vec![dvector![0.3]]);
    let targets = stage_form.bcs[0].stage_targets(&system, 0.5, 0.25, &u0).unwrap();
    assert_eq!(targets, DMatrix::from_element(1, 1, 1.0));
}

#[test]
fn stage_samples_are_taken_at_the_abscissae() {
    let (mut system, operator) = scalar_system();
    let data = system.add_source(SourceFunction::new(1, linear_ramp_source()));
    let bc = DirichletBc::new(0, vec![0], data);

    let tableau = ButcherTableau::<f64>::radau_iia(2);
    let stage_form = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &tableau,
        rk::ai,
        BcType::Dae,
        &[bc],
        None,
    )
    .unwrap();

    let condition = &stage_form.bcs[0];
    assert_eq!(condition.num_stages(), 2);
    assert_eq!(condition.sample_offsets(), tableau.c());

    let samples = condition.sampled_data(&system, 2.0, 0.3).unwrap();
    assert_scalar_eq!(samples[(0, 0)], 2.0 + 0.3 / 3.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(samples[(0, 1)], 2.3, comp = abs, tol = 1e-15);
}

proptest! {
    // For constant data the lifted targets must place every stage value on the datum,
    // whatever the collocation abscissae are
    #[test]
    fn dae_lifting_recovers_constant_data_at_every_stage(
        (g0, gaps) in (0.5..=2.0f64, prop::collection::vec(0.05..=0.3f64, 1..=3)),
    ) {
        let (mut system, operator) = scalar_system();
        let data = system.add_source(SourceFunction::new(1, move |mut out: DVectorViewMut<f64>, _| {
            out[0] = g0;
        }));
        let bc = DirichletBc::new(0, vec![0], data);

        let abscissae: Vec<f64> = gaps
            .iter()
            .scan(0.0, |end, gap| {
                *end += *gap;
                Some(*end)
            })
            .collect();
        let tableau = ButcherTableau::collocation(&abscissae, abscissae.len());
        let stage_form = rk::build_stage_form(
            &system,
            &decay_form(operator, 1.0),
            &tableau,
            rk::ai,
            BcType::Dae,
            &[bc],
            None,
        );
        prop_assume!(stage_form.is_ok());
        let stage_form = stage_form.unwrap();

        let u0 = SystemState::from_fields(vec![dvector![0.3]]);
        let dt = 0.25;
        let targets = stage_form.bcs[0].stage_targets(&system, 1.0, dt, &u0).unwrap();
        let stage_values = tableau.a() * targets.transpose() * dt;
        for i in 0..abscissae.len() {
            prop_assert!((u0.field(0)[0] + stage_values[(i, 0)] - g0).abs() < 1e-8);
        }
    }
}

#[test]
fn ode_conditions_require_derivative_data() {
    let (mut system, operator) = scalar_system();
    let data = system.add_source(SourceFunction::new(1, linear_ramp_source()));
    let bc = DirichletBc::new(0, vec![0], data);

    let result = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &ButcherTableau::backward_euler(),
        rk::ai,
        BcType::Ode,
        &[bc],
        None,
    );
    assert_eq!(result.err(), Some(ConfigError::MissingBoundaryDerivative { bc_index: 0 }));
}

#[test]
fn boundary_data_must_cover_every_constrained_dof() {
    let (mut system, operator) = scalar_system();
    let data = system.add_source(SourceFunction::new(2, |mut out: DVectorViewMut<f64>, _| {
        out[0] = 0.0;
        out[1] = 0.0;
    }));
    let bc = DirichletBc::new(0, vec![0], data);

    let result = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &ButcherTableau::backward_euler(),
        rk::ai,
        BcType::Dae,
        &[bc],
        None,
    );
    assert_eq!(
        result.err(),
        Some(ConfigError::BoundaryDataDimensionMismatch {
            bc_index: 0,
            expected: 1,
            found: 2,
        })
    );
}

#[test]
fn constrained_dofs_must_exist() {
    let (mut system, operator) = scalar_system();
    let data = system.add_source(SourceFunction::new(1, linear_ramp_source()));
    let bc = DirichletBc::new(0, vec![4], data);

    let result = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &ButcherTableau::backward_euler(),
        rk::ai,
        BcType::Dae,
        &[bc],
        None,
    );
    assert_eq!(result.err(), Some(ConfigError::DofIndexOutOfRange { dof: 4, field_dim: 1 }));
}

#[test]
fn boundary_sources_must_be_registered() {
    let (system, operator) = scalar_system();
    let bc = DirichletBc::new(0, vec![0], SourceId::from_index(9));

    let result = rk::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &ButcherTableau::backward_euler(),
        rk::ai,
        BcType::Dae,
        &[bc],
        None,
    );
    assert_eq!(result.err(), Some(ConfigError::UnknownSource { source: 9 }));
}

#[test]
fn projection_conditions_reproduce_constant_data_exactly() {
    let (mut system, operator) = scalar_system();
    let data = system.add_source(SourceFunction::new(1, |mut out: DVectorViewMut<f64>, _| {
        out[0] = 2.0;
    }));
    let bc = DirichletBc::new(0, vec![0], data);

    let element = TimeElement::lagrange(2);
    let quadrature = TimeQuadrature::gauss(3);
    let stage_form = galerkin::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &element,
        &quadrature,
        &[bc],
        None,
    )
    .unwrap();

    let u0 = SystemState::from_fields(vec![dvector![0.0]]);
    let targets = stage_form.bcs[0].stage_targets(&system, 0.0, 1.0, &u0).unwrap();
    assert_eq!(targets.shape(), (1, 3));
    assert_matrix_eq!(targets, DMatrix::from_element(1, 3, 2.0), comp = abs, tol = 1e-13);
}

#[test]
fn projection_conditions_interpolate_polynomial_data_exactly() {
    let (mut system, operator) = scalar_system();
    let data = system.add_source(SourceFunction::new(1, linear_ramp_source()));
    let bc = DirichletBc::new(0, vec![0], data);

    let element = TimeElement::lagrange(1);
    let quadrature = TimeQuadrature::gauss(2);
    let stage_form = galerkin::build_stage_form(
        &system,
        &decay_form(operator, 1.0),
        &element,
        &quadrature,
        &[bc],
        None,
    )
    .unwrap();

    // The projection of data linear in time onto a degree-one basis is interpolation,
    // so the stage coefficients are the data values at the element nodes
    let u0 = SystemState::from_fields(vec![dvector![0.0]]);
    let targets = stage_form.bcs[0].stage_targets(&system, 2.0, 0.5, &u0).unwrap();
    assert_scalar_eq!(targets[(0, 0)], 2.0, comp = abs, tol = 1e-13);
    assert_scalar_eq!(targets[(0, 1)], 2.5, comp = abs, tol = 1e-13);
}
