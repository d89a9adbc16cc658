use itertools::izip;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq, prop_assert_scalar_eq};
use nalgebra::{dvector, DMatrix};
use proptest::prelude::*;

use skoll::element::TimeElement;

#[test]
fn constant_element_has_a_single_midpoint_node() {
    let element = TimeElement::<f64>::lagrange(0);
    assert_eq!(element.degree(), 0);
    assert_eq!(element.num_nodes(), 1);
    assert_eq!(element.nodes(), &[0.5]);
    assert_eq!(element.evaluate_basis(0.3), dvector![1.0]);
    assert_eq!(element.evaluate_basis_derivatives(0.3), dvector![0.0]);
}

#[test]
fn lagrange_nodes_are_equispaced() {
    let element = TimeElement::<f64>::lagrange(4);
    let expected = [0.0, 0.25, 0.5, 0.75, 1.0];
    for (node, expected) in izip!(element.nodes(), &expected) {
        assert_scalar_eq!(*node, *expected, comp = abs, tol = 1e-15);
    }
}

#[test]
fn gauss_lobatto_nodes_include_the_endpoints() {
    let element = TimeElement::<f64>::lagrange_gauss_lobatto(3);
    let nodes = element.nodes();
    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes[0], 0.0);
    assert_eq!(nodes[3], 1.0);
}

#[test]
fn nodal_basis_is_a_kronecker_delta_at_the_nodes() {
    for element in [
        TimeElement::<f64>::lagrange(3),
        TimeElement::<f64>::lagrange_gauss_lobatto(3),
    ] {
        let nodes = element.nodes().to_vec();
        let table = element.tabulate(&nodes);
        assert_eq!(table.num_basis_functions(), 4);
        assert_eq!(table.num_points(), 4);
        assert_matrix_eq!(table.values(), DMatrix::identity(4, 4), comp = abs, tol = 1e-12);
    }
}

#[test]
fn interpolation_derivative_reproduces_the_quadratic_monomial() {
    // Degree 2 interpolation of x^2 is exact, so the interpolated derivative is 2x
    let element = TimeElement::<f64>::lagrange(2);
    let coefficients: Vec<f64> = element.nodes().iter().map(|&x| x * x).collect();
    for &x in &[0.0, 0.37, 0.5, 0.81, 1.0] {
        let derivatives = element.evaluate_basis_derivatives(x);
        let interpolated: f64 = izip!(&coefficients, derivatives.iter()).map(|(c, d)| c * d).sum();
        assert_scalar_eq!(interpolated, 2.0 * x, comp = abs, tol = 1e-13);
    }
}

proptest! {
    #[test]
    fn lagrange_basis_is_a_partition_of_unity((order, x) in (0usize..5, 0.0..=1.0)) {
        let element = TimeElement::<f64>::lagrange(order);
        let values = element.evaluate_basis(x);
        let derivatives = element.evaluate_basis_derivatives(x);
        prop_assert_scalar_eq!(values.sum(), 1.0, comp = abs, tol = 1e-12);
        prop_assert_scalar_eq!(derivatives.sum(), 0.0, comp = abs, tol = 1e-10);
    }
}

#[test]
#[should_panic(expected = "nodes must be strictly increasing")]
fn nodes_must_be_strictly_increasing() {
    let _ = TimeElement::from_nodes(vec![0.0, 0.5, 0.5]);
}

#[test]
#[should_panic(expected = "nodes must lie in the unit interval")]
fn nodes_must_lie_in_the_unit_interval() {
    let _ = TimeElement::from_nodes(vec![0.0, 1.5]);
}
