use matrixcompare::assert_scalar_eq;
use paste::paste;

use skoll::quadrature::TimeQuadrature;

/// The monomial integrals $\int_0^1 x^k = 1 / (k + 1)$ probe the exactness degree.
fn assert_rule_integrates_monomials_up_to(quadrature: &TimeQuadrature<f64>, degree: usize) {
    for k in 0..=degree {
        let integral = quadrature.integrate(|x| x.powi(k as i32));
        let exact = 1.0 / (k as f64 + 1.0);
        assert_scalar_eq!(integral, exact, comp = abs, tol = 1e-14);
    }
}

macro_rules! test_gauss_rule_is_exact {
    ($($name:ident => $num_points:expr),+ $(,)?) => {
        $(
            paste! {
                #[test]
                fn [<gauss_ $name _has_full_exactness_degree>]() {
                    let quadrature = TimeQuadrature::<f64>::gauss($num_points);
                    assert_eq!(quadrature.len(), $num_points);
                    assert_rule_integrates_monomials_up_to(&quadrature, 2 * $num_points - 1);
                }
            }
        )+
    };
}

test_gauss_rule_is_exact!(
    one_point => 1,
    two_points => 2,
    three_points => 3,
    four_points => 4,
    five_points => 5,
);

macro_rules! test_gauss_lobatto_rule_is_exact {
    ($($name:ident => $num_points:expr),+ $(,)?) => {
        $(
            paste! {
                #[test]
                fn [<gauss_lobatto_ $name _has_full_exactness_degree>]() {
                    let quadrature = TimeQuadrature::<f64>::gauss_lobatto($num_points);
                    assert_eq!(quadrature.len(), $num_points);
                    assert_rule_integrates_monomials_up_to(&quadrature, 2 * $num_points - 3);
                }
            }
        )+
    };
}

test_gauss_lobatto_rule_is_exact!(
    two_points => 2,
    three_points => 3,
    four_points => 4,
    five_points => 5,
);

#[test]
fn gauss_points_are_interior_sorted_and_positively_weighted() {
    for num_points in 1..=12 {
        let quadrature = TimeQuadrature::<f64>::gauss(num_points);
        let points = quadrature.points();
        assert!(points.windows(2).all(|w| w[0] < w[1]));
        assert!(points.iter().all(|&x| x > 0.0 && x < 1.0));
        assert!(quadrature.weights().iter().all(|&w| w > 0.0));
        let weight_sum: f64 = quadrature.weights().iter().sum();
        assert_scalar_eq!(weight_sum, 1.0, comp = abs, tol = 1e-13);
    }
}

#[test]
fn gauss_lobatto_includes_the_endpoints() {
    for num_points in 2..=6 {
        let quadrature = TimeQuadrature::<f64>::gauss_lobatto(num_points);
        let points = quadrature.points();
        assert_eq!(points[0], 0.0);
        assert_eq!(points[num_points - 1], 1.0);
        assert!(points.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn gauss_lobatto_two_points_is_the_trapezoid_rule() {
    let quadrature = TimeQuadrature::<f64>::gauss_lobatto(2);
    assert_eq!(quadrature.points(), &[0.0, 1.0]);
    assert_scalar_eq!(quadrature.weights()[0], 0.5, comp = abs, tol = 1e-15);
    assert_scalar_eq!(quadrature.weights()[1], 0.5, comp = abs, tol = 1e-15);
}

#[test]
fn gauss_lobatto_three_points_is_simpsons_rule() {
    let quadrature = TimeQuadrature::<f64>::gauss_lobatto(3);
    let points = quadrature.points();
    let weights = quadrature.weights();
    assert_scalar_eq!(points[1], 0.5, comp = abs, tol = 1e-15);
    assert_scalar_eq!(weights[0], 1.0 / 6.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(weights[1], 4.0 / 6.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(weights[2], 1.0 / 6.0, comp = abs, tol = 1e-15);
}

#[test]
fn integrate_applies_weights_pointwise() {
    let quadrature = TimeQuadrature::from_points_and_weights(vec![0.25, 0.75], vec![0.5, 0.5]);
    let integral = quadrature.integrate(|x| 2.0 * x);
    assert_scalar_eq!(integral, 1.0, comp = abs, tol = 1e-15);
}

#[test]
#[should_panic(expected = "every point must have a weight")]
fn point_and_weight_counts_must_match() {
    let _ = TimeQuadrature::from_points_and_weights(vec![0.5], vec![0.5, 0.5]);
}

#[test]
#[should_panic(expected = "quadrature points must lie in the unit interval")]
fn points_outside_the_unit_interval_are_rejected() {
    let _ = TimeQuadrature::from_points_and_weights(vec![-0.5, 0.5], vec![0.5, 0.5]);
}
