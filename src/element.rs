//! One-dimensional elements for the time direction.
//!
//! A discontinuous Galerkin discretization in time approximates the solution on each
//! step by a polynomial on the unit interval $[0, 1]$ with no continuity requirement
//! across steps. The elements here are nodal Lagrange bases of arbitrary degree, with
//! nodes sorted left to right so that basis function 0 is associated with the left end
//! of the step. The degenerate degree-0 element consists of a single constant basis
//! function whose node sits at the interval midpoint.

use nalgebra::{DMatrix, DVector, Scalar};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

use crate::quadrature::TimeQuadrature;
use crate::Real;

/// Basis values and first derivatives tabulated at a set of points.
///
/// Entry `(i, q)` of each matrix refers to basis function `i` evaluated at point `q`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBasisTable<T: Scalar> {
    values: DMatrix<T>,
    derivatives: DMatrix<T>,
}

impl<T: Scalar> TimeBasisTable<T> {
    pub fn values(&self) -> &DMatrix<T> {
        &self.values
    }

    pub fn derivatives(&self) -> &DMatrix<T> {
        &self.derivatives
    }

    pub fn num_basis_functions(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_points(&self) -> usize {
        self.values.ncols()
    }
}

/// A nodal Lagrange basis on the unit interval, used as a discontinuous element in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeElement<T> {
    nodes: Vec<T>,
}

impl<T> TimeElement<T> {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The polynomial degree of the element.
    pub fn degree(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn nodes(&self) -> &[T] {
        &self.nodes
    }
}

impl<T: Real> TimeElement<T> {
    /// Creates an element with the given interpolation nodes.
    ///
    /// # Panics
    ///
    /// Panics if the nodes are not strictly increasing points in $[0, 1]$.
    pub fn from_nodes(nodes: Vec<T>) -> Self {
        assert!(!nodes.is_empty(), "an element has at least one node");
        assert!(
            nodes.windows(2).all(|w| w[0] < w[1]),
            "nodes must be strictly increasing"
        );
        assert!(
            nodes.iter().all(|x| *x >= T::zero() && *x <= T::one()),
            "nodes must lie in the unit interval"
        );
        Self { nodes }
    }

    /// The degree-`order` element with equispaced nodes, endpoints included.
    ///
    /// For `order == 0` the single node is placed at the interval midpoint.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn lagrange(order: usize) -> Self {
        if order == 0 {
            return Self::from_nodes(vec![0.5]);
        }
        let h = 1.0 / T::from_usize(order).expect("Order must fit in T");
        Self::from_nodes((0..=order).map(|j| h * T::from_usize(j).expect("Order must fit in T")).collect())
    }

    /// The degree-`order` element with Gauss-Lobatto-Legendre nodes.
    ///
    /// Compared to equispaced nodes this keeps the Lebesgue constant small for higher
    /// degrees. For `order == 0` the single node is placed at the interval midpoint.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn lagrange_gauss_lobatto(order: usize) -> Self {
        if order == 0 {
            return Self::from_nodes(vec![0.5]);
        }
        Self::from_nodes(TimeQuadrature::gauss_lobatto(order + 1).points().to_vec())
    }

    /// Evaluates every basis function at the given point.
    pub fn evaluate_basis(&self, x: T) -> DVector<T> {
        let n = self.num_nodes();
        DVector::from_fn(n, |j, _| {
            let mut phi = T::one();
            for m in 0..n {
                if m != j {
                    phi *= (x - self.nodes[m]) / (self.nodes[j] - self.nodes[m]);
                }
            }
            phi
        })
    }

    /// Evaluates the first derivative of every basis function at the given point.
    ///
    /// Uses the product-rule expansion of the Lagrange basis, which is stable at the
    /// interpolation nodes themselves.
    pub fn evaluate_basis_derivatives(&self, x: T) -> DVector<T> {
        let n = self.num_nodes();
        DVector::from_fn(n, |j, _| {
            let mut dphi = T::zero();
            for i in 0..n {
                if i == j {
                    continue;
                }
                let mut term = T::one() / (self.nodes[j] - self.nodes[i]);
                for m in 0..n {
                    if m != j && m != i {
                        term *= (x - self.nodes[m]) / (self.nodes[j] - self.nodes[m]);
                    }
                }
                dphi += term;
            }
            dphi
        })
    }

    /// Tabulates basis values and derivatives at the given points.
    pub fn tabulate(&self, points: &[T]) -> TimeBasisTable<T> {
        let n = self.num_nodes();
        let mut values = DMatrix::zeros(n, points.len());
        let mut derivatives = DMatrix::zeros(n, points.len());
        for (q, &x) in points.iter().enumerate() {
            values.set_column(q, &self.evaluate_basis(x));
            derivatives.set_column(q, &self.evaluate_basis_derivatives(x));
        }
        TimeBasisTable { values, derivatives }
    }
}
