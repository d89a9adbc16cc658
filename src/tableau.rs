//! Butcher tableaus for implicit Runge-Kutta methods.
//!
//! A tableau $(A, b, c)$ with $s$ stages describes the Runge-Kutta update
//! $$ u_1 = u_0 + \Delta t \sum_i b_i k_i, \qquad
//!    k_i = f(t_0 + c_i \Delta t,\; u_0 + \Delta t \sum_j a_{ij} k_j), $$
//! where $f$ is the right-hand side of the evolution equation. Only the tableau data
//! itself lives here; how the stage systems are formed from a residual form is the
//! business of [`crate::rk`].

use nalgebra::{dmatrix, dvector, DMatrix, DVector, Scalar};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

use crate::quadrature::TimeQuadrature;
use crate::Real;

/// A Butcher tableau describing an implicit Runge-Kutta method.
///
/// Invariants maintained by the constructors: $A$ is square, $b$ and $c$ have as many
/// entries as $A$ has rows, and the embedded weight vector (if any) has the same length
/// as $b$. The *consistency* condition $\sum_j a_{ij} = c_i$ is not enforced, since some
/// exotic methods violate it on purpose, but it can be checked with
/// [`is_consistent`](ButcherTableau::is_consistent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButcherTableau<T: Scalar> {
    a: DMatrix<T>,
    b: DVector<T>,
    c: DVector<T>,
    order: usize,
    btilde: Option<DVector<T>>,
}

impl<T: Real> ButcherTableau<T> {
    /// Creates a tableau from its coefficient matrix, weights and abscissae.
    ///
    /// `order` is the classical order of accuracy of the method.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions of `a`, `b` and `c` are inconsistent or if `order == 0`.
    pub fn new(a: DMatrix<T>, b: DVector<T>, c: DVector<T>, order: usize) -> Self {
        let s = b.len();
        assert_eq!(a.nrows(), s, "A must have one row per stage");
        assert_eq!(a.ncols(), s, "A must be square");
        assert_eq!(c.len(), s, "c must have one abscissa per stage");
        assert!(order >= 1, "the order of a consistent method is at least 1");
        Self {
            a,
            b,
            c,
            order,
            btilde: None,
        }
    }

    /// Attaches an embedded weight vector $\tilde b$ for error estimation.
    ///
    /// # Panics
    ///
    /// Panics if `btilde` does not have one weight per stage.
    pub fn with_embedded(mut self, btilde: DVector<T>) -> Self {
        assert_eq!(btilde.len(), self.num_stages(), "btilde must have one weight per stage");
        self.btilde = Some(btilde);
        self
    }

    pub fn num_stages(&self) -> usize {
        self.b.len()
    }

    pub fn a(&self) -> &DMatrix<T> {
        &self.a
    }

    pub fn b(&self) -> &DVector<T> {
        &self.b
    }

    pub fn c(&self) -> &DVector<T> {
        &self.c
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn embedded_weights(&self) -> Option<&DVector<T>> {
        self.btilde.as_ref()
    }

    /// Checks the row-sum consistency condition $\sum_j a_{ij} \approx c_i$
    /// up to the given absolute tolerance.
    pub fn is_consistent(&self, tol: T) -> bool {
        (0..self.num_stages()).all(|i| (self.a.row(i).sum() - self.c[i]).abs() <= tol)
    }

    /// Constructs the collocation method with the given abscissae.
    ///
    /// The coefficients are $a_{ij} = \int_0^{c_i} \ell_j$ and $b_j = \int_0^1 \ell_j$
    /// with $\ell_j$ the Lagrange basis on the abscissae, so that the stages collocate
    /// the differential equation at the points $t_0 + c_i \Delta t$.
    ///
    /// # Panics
    ///
    /// Panics if the abscissae are not strictly increasing points in $[0, 1]$.
    pub fn collocation(points: &[T], order: usize) -> Self {
        let element = crate::element::TimeElement::from_nodes(points.to_vec());
        let s = points.len();
        // Exact for polynomials of degree s - 1
        let rule = TimeQuadrature::gauss((s + 1) / 2 + 1);
        let mut a = DMatrix::zeros(s, s);
        let mut b = DVector::zeros(s);
        for (&w, &x) in rule.weights().iter().zip(rule.points()) {
            let phi = element.evaluate_basis(x);
            b.axpy(w, &phi, T::one());
            for i in 0..s {
                // Map the rule onto [0, c_i]
                let phi_i = element.evaluate_basis(points[i] * x);
                for j in 0..s {
                    a[(i, j)] += points[i] * w * phi_i[j];
                }
            }
        }
        let c = DVector::from_column_slice(points);
        Self::new(a, b, c, order)
    }

    /// The one-stage Radau IIA method, better known as backward Euler. Order 1.
    pub fn backward_euler() -> Self {
        Self::radau_iia(1)
    }

    /// The one-stage Gauss-Legendre method, better known as the implicit midpoint rule. Order 2.
    pub fn implicit_midpoint() -> Self {
        Self::gauss_legendre(1)
    }

    /// The Gauss-Legendre collocation method with the given number of stages. Order $2s$.
    ///
    /// # Panics
    ///
    /// Panics if `num_stages == 0`.
    pub fn gauss_legendre(num_stages: usize) -> Self {
        assert!(num_stages >= 1, "a Gauss-Legendre method has at least one stage");
        let rule = TimeQuadrature::<T>::gauss(num_stages);
        Self::collocation(rule.points(), 2 * num_stages)
    }

    /// The Radau IIA collocation method with the given number of stages. Order $2s - 1$.
    ///
    /// # Panics
    ///
    /// Panics if `num_stages` is not between 1 and 3.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn radau_iia(num_stages: usize) -> Self {
        match num_stages {
            1 => Self::new(dmatrix![1.0], dvector![1.0], dvector![1.0], 1),
            2 => Self::new(
                // `replace_float_literals` cannot reach into a macro body that mixes
                // `,` and `;` separators, so the literal conversions are spelled out.
                dmatrix![
                    T::from_f64(5.0).expect("Literal must fit in T") / T::from_f64(12.0).expect("Literal must fit in T"),
                    -T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(12.0).expect("Literal must fit in T");
                    T::from_f64(3.0).expect("Literal must fit in T") / T::from_f64(4.0).expect("Literal must fit in T"),
                    T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(4.0).expect("Literal must fit in T")
                ],
                dvector![3.0 / 4.0, 1.0 / 4.0],
                dvector![1.0 / 3.0, 1.0],
                3,
            ),
            3 => {
                let sq6 = 6.0.sqrt();
                Self::new(
                    // `replace_float_literals` cannot reach into a macro body that mixes
                    // `,` and `;` separators, so the literal conversions are spelled out.
                    dmatrix![
                        (T::from_f64(88.0).expect("Literal must fit in T") - T::from_f64(7.0).expect("Literal must fit in T") * sq6) / T::from_f64(360.0).expect("Literal must fit in T"),
                        (T::from_f64(296.0).expect("Literal must fit in T") - T::from_f64(169.0).expect("Literal must fit in T") * sq6) / T::from_f64(1800.0).expect("Literal must fit in T"),
                        (-T::from_f64(2.0).expect("Literal must fit in T") + T::from_f64(3.0).expect("Literal must fit in T") * sq6) / T::from_f64(225.0).expect("Literal must fit in T");
                        (T::from_f64(296.0).expect("Literal must fit in T") + T::from_f64(169.0).expect("Literal must fit in T") * sq6) / T::from_f64(1800.0).expect("Literal must fit in T"),
                        (T::from_f64(88.0).expect("Literal must fit in T") + T::from_f64(7.0).expect("Literal must fit in T") * sq6) / T::from_f64(360.0).expect("Literal must fit in T"),
                        (-T::from_f64(2.0).expect("Literal must fit in T") - T::from_f64(3.0).expect("Literal must fit in T") * sq6) / T::from_f64(225.0).expect("Literal must fit in T");
                        (T::from_f64(16.0).expect("Literal must fit in T") - sq6) / T::from_f64(36.0).expect("Literal must fit in T"),
                        (T::from_f64(16.0).expect("Literal must fit in T") + sq6) / T::from_f64(36.0).expect("Literal must fit in T"),
                        T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(9.0).expect("Literal must fit in T")
                    ],
                    dvector![(16.0 - sq6) / 36.0, (16.0 + sq6) / 36.0, 1.0 / 9.0],
                    dvector![(4.0 - sq6) / 10.0, (4.0 + sq6) / 10.0, 1.0],
                    5,
                )
            }
            _ => panic!("Radau IIA tableaus are only available for 1 to 3 stages"),
        }
    }

    /// The Lobatto IIIA method with the given number of stages. Order $2s - 2$.
    ///
    /// The two-stage member is the trapezoid rule. Note that the first row of $A$
    /// vanishes, so the coefficient matrix is singular.
    ///
    /// # Panics
    ///
    /// Panics if `num_stages` is not 2 or 3.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn lobatto_iiia(num_stages: usize) -> Self {
        match num_stages {
            2 => Self::new(
                // `replace_float_literals` cannot reach into a macro body that mixes
                // `,` and `;` separators, so the literal conversions are spelled out.
                dmatrix![
                    T::from_f64(0.0).expect("Literal must fit in T"),
                    T::from_f64(0.0).expect("Literal must fit in T");
                    T::from_f64(0.5).expect("Literal must fit in T"),
                    T::from_f64(0.5).expect("Literal must fit in T")
                ],
                dvector![0.5, 0.5],
                dvector![0.0, 1.0],
                2,
            ),
            3 => Self::new(
                // `replace_float_literals` cannot reach into a macro body that mixes
                // `,` and `;` separators, so the literal conversions are spelled out.
                dmatrix![
                    T::from_f64(0.0).expect("Literal must fit in T"),
                    T::from_f64(0.0).expect("Literal must fit in T"),
                    T::from_f64(0.0).expect("Literal must fit in T");
                    T::from_f64(5.0).expect("Literal must fit in T") / T::from_f64(24.0).expect("Literal must fit in T"),
                    T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(3.0).expect("Literal must fit in T"),
                    -T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(24.0).expect("Literal must fit in T");
                    T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(6.0).expect("Literal must fit in T"),
                    T::from_f64(2.0).expect("Literal must fit in T") / T::from_f64(3.0).expect("Literal must fit in T"),
                    T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(6.0).expect("Literal must fit in T")
                ],
                dvector![1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0],
                dvector![0.0, 0.5, 1.0],
                4,
            ),
            _ => panic!("Lobatto IIIA tableaus are only available for 2 or 3 stages"),
        }
    }

    /// The L-stable Lobatto IIIC method with the given number of stages. Order $2s - 2$.
    ///
    /// # Panics
    ///
    /// Panics if `num_stages` is not 2 or 3.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn lobatto_iiic(num_stages: usize) -> Self {
        match num_stages {
            2 => Self::new(
                // `replace_float_literals` cannot reach into a macro body that mixes
                // `,` and `;` separators, so the literal conversions are spelled out.
                dmatrix![
                    T::from_f64(0.5).expect("Literal must fit in T"),
                    -T::from_f64(0.5).expect("Literal must fit in T");
                    T::from_f64(0.5).expect("Literal must fit in T"),
                    T::from_f64(0.5).expect("Literal must fit in T")
                ],
                dvector![0.5, 0.5],
                dvector![0.0, 1.0],
                2,
            ),
            3 => Self::new(
                // `replace_float_literals` cannot reach into a macro body that mixes
                // `,` and `;` separators, so the literal conversions are spelled out.
                dmatrix![
                    T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(6.0).expect("Literal must fit in T"),
                    -T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(3.0).expect("Literal must fit in T"),
                    T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(6.0).expect("Literal must fit in T");
                    T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(6.0).expect("Literal must fit in T"),
                    T::from_f64(5.0).expect("Literal must fit in T") / T::from_f64(12.0).expect("Literal must fit in T"),
                    -T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(12.0).expect("Literal must fit in T");
                    T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(6.0).expect("Literal must fit in T"),
                    T::from_f64(2.0).expect("Literal must fit in T") / T::from_f64(3.0).expect("Literal must fit in T"),
                    T::from_f64(1.0).expect("Literal must fit in T") / T::from_f64(6.0).expect("Literal must fit in T")
                ],
                dvector![1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0],
                dvector![0.0, 0.5, 1.0],
                4,
            ),
            _ => panic!("Lobatto IIIC tableaus are only available for 2 or 3 stages"),
        }
    }

    /// The two-stage, L-stable SDIRK method of Alexander with $\gamma = 1 - \sqrt 2 / 2$.
    ///
    /// Order 2, with an embedded first-order weight vector so that the pair can drive
    /// an adaptive stepper.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn sdirk2() -> Self {
        let gamma = 1.0 - 2.0.sqrt() / 2.0;
        Self::new(
            // `replace_float_literals` cannot reach into a macro body that mixes
            // `,` and `;` separators, so the literal conversions are spelled out.
            dmatrix![
                gamma,
                T::from_f64(0.0).expect("Literal must fit in T");
                T::from_f64(1.0).expect("Literal must fit in T") - gamma,
                gamma
            ],
            dvector![1.0 - gamma, gamma],
            dvector![gamma, 1.0],
            2,
        )
        .with_embedded(dvector![1.0, 0.0])
    }
}
