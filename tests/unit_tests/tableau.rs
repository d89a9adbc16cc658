use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{dmatrix, dvector};
use paste::paste;

use skoll::tableau::ButcherTableau;

macro_rules! test_tableau_is_consistent {
    ($($name:ident => ($tableau:expr, $stages:expr, $order:expr)),+ $(,)?) => {
        $(
            paste! {
                #[test]
                fn [<$name _is_consistent>]() {
                    let tableau: ButcherTableau<f64> = $tableau;
                    assert_eq!(tableau.num_stages(), $stages);
                    assert_eq!(tableau.order(), $order);
                    assert!(tableau.is_consistent(1e-12));

                    let weight_sum: f64 = tableau.b().iter().sum();
                    assert_scalar_eq!(weight_sum, 1.0, comp = abs, tol = 1e-13);

                    // b' c = 1/2 is the order condition shared by all methods of order >= 2
                    if tableau.order() >= 2 {
                        let first_moment = tableau.b().dot(tableau.c());
                        assert_scalar_eq!(first_moment, 0.5, comp = abs, tol = 1e-13);
                    }
                }
            }
        )+
    };
}

test_tableau_is_consistent!(
    backward_euler => (ButcherTableau::backward_euler(), 1, 1),
    implicit_midpoint => (ButcherTableau::implicit_midpoint(), 1, 2),
    gauss_legendre_2 => (ButcherTableau::gauss_legendre(2), 2, 4),
    gauss_legendre_3 => (ButcherTableau::gauss_legendre(3), 3, 6),
    radau_iia_1 => (ButcherTableau::radau_iia(1), 1, 1),
    radau_iia_2 => (ButcherTableau::radau_iia(2), 2, 3),
    radau_iia_3 => (ButcherTableau::radau_iia(3), 3, 5),
    lobatto_iiia_2 => (ButcherTableau::lobatto_iiia(2), 2, 2),
    lobatto_iiia_3 => (ButcherTableau::lobatto_iiia(3), 3, 4),
    lobatto_iiic_2 => (ButcherTableau::lobatto_iiic(2), 2, 2),
    lobatto_iiic_3 => (ButcherTableau::lobatto_iiic(3), 3, 4),
    sdirk2 => (ButcherTableau::sdirk2(), 2, 2),
);

#[test]
fn backward_euler_coefficients() {
    let tableau = ButcherTableau::<f64>::backward_euler();
    assert_eq!(tableau.a(), &dmatrix![1.0]);
    assert_eq!(tableau.b(), &dvector![1.0]);
    assert_eq!(tableau.c(), &dvector![1.0]);
    assert!(tableau.embedded_weights().is_none());
}

#[test]
fn implicit_midpoint_coefficients() {
    let tableau = ButcherTableau::<f64>::implicit_midpoint();
    assert_matrix_eq!(tableau.a(), dmatrix![0.5], comp = abs, tol = 1e-15);
    assert_matrix_eq!(tableau.b(), dvector![1.0], comp = abs, tol = 1e-15);
    assert_matrix_eq!(tableau.c(), dvector![0.5], comp = abs, tol = 1e-15);
}

#[test]
fn radau_iia_methods_are_stiffly_accurate() {
    for num_stages in 1..=3 {
        let tableau = ButcherTableau::<f64>::radau_iia(num_stages);
        let last_row = tableau.a().row(num_stages - 1).transpose();
        assert_matrix_eq!(last_row, tableau.b(), comp = abs, tol = 1e-14);
        assert_scalar_eq!(tableau.c()[num_stages - 1], 1.0, comp = abs, tol = 1e-15);
    }
}

#[test]
fn collocation_at_radau_points_reproduces_the_analytic_tableau() {
    let collocated = ButcherTableau::collocation(&[1.0 / 3.0, 1.0], 3);
    let analytic = ButcherTableau::<f64>::radau_iia(2);
    assert_matrix_eq!(collocated.a(), analytic.a(), comp = abs, tol = 1e-14);
    assert_matrix_eq!(collocated.b(), analytic.b(), comp = abs, tol = 1e-14);
    assert_eq!(collocated.c(), analytic.c());
}

#[test]
fn gauss_legendre_abscissae_are_symmetric() {
    let tableau = ButcherTableau::<f64>::gauss_legendre(3);
    let c = tableau.c();
    assert_scalar_eq!(c[0] + c[2], 1.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(c[1], 0.5, comp = abs, tol = 1e-14);
}

#[test]
fn sdirk2_carries_embedded_weights() {
    let tableau = ButcherTableau::<f64>::sdirk2();
    let btilde = tableau.embedded_weights().unwrap();
    assert_eq!(btilde, &dvector![1.0, 0.0]);

    let gamma = 1.0 - 2.0_f64.sqrt() / 2.0;
    assert_scalar_eq!(tableau.a()[(0, 0)], gamma);
    assert_scalar_eq!(tableau.b()[1], gamma);
}

#[test]
fn lobatto_iiia_2_is_the_trapezoid_rule() {
    let tableau = ButcherTableau::<f64>::lobatto_iiia(2);
    assert_eq!(tableau.a(), &dmatrix![0.0, 0.0; 0.5, 0.5]);
    assert_eq!(tableau.b(), &dvector![0.5, 0.5]);
    assert_eq!(tableau.c(), &dvector![0.0, 1.0]);
}

#[test]
#[should_panic(expected = "A must be square")]
fn tableau_rejects_non_square_coefficient_matrix() {
    let _ = ButcherTableau::new(
        dmatrix![1.0, 0.0, 0.0; 0.0, 1.0, 0.0],
        dvector![0.5, 0.5],
        dvector![0.0, 1.0],
        2,
    );
}

#[test]
#[should_panic(expected = "btilde must have one weight per stage")]
fn embedded_weights_must_match_the_stage_count() {
    let _ = ButcherTableau::<f64>::radau_iia(2).with_embedded(dvector![1.0]);
}

#[test]
#[should_panic(expected = "only available for 1 to 3 stages")]
fn radau_iia_rejects_unsupported_stage_counts() {
    let _ = ButcherTableau::<f64>::radau_iia(4);
}
