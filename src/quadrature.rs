//! Quadrature rules for the unit time interval $[0, 1]$.
//!
//! A single time step is always mapped onto the reference interval $[0, 1]$, so the
//! rules here are stated on that interval rather than the symmetric interval $[-1, 1]$
//! customary in the quadrature literature. Given `n` points, the Gauss rule integrates
//! polynomials of degree up to `2n - 1` exactly, the Gauss-Lobatto rule up to `2n - 3`.

use std::f64::consts::PI;

use itertools::izip;
use serde::{Deserialize, Serialize};

use crate::Real;

/// Recurrence relation for Legendre polynomials on $[-1, 1]$.
///
/// The derivative formulas divide by $x^2 - 1$, so they are only usable in the
/// open interval $(-1, 1)$. All root finding below only ever evaluates there.
#[derive(Debug, Default)]
pub(crate) struct LegendreRecurrence {
    n: usize,
    x: f64,
    // p_n(x) and p_{n - 1}(x)
    p: f64,
    p_prev: f64,
}

impl LegendreRecurrence {
    pub fn evaluate(n: usize, x: f64) -> Self {
        // m P_m(x) = (2m - 1) x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p = 1.0;
        let mut p_prev = 0.0;
        for m in 1..=n {
            let m = m as f64;
            let p_prev2 = p_prev;
            p_prev = p;
            p = ((2.0 * m - 1.0) * x * p_prev - (m - 1.0) * p_prev2) / m;
        }
        Self { n, x, p, p_prev }
    }

    pub fn value(&self) -> f64 {
        self.p
    }

    pub fn derivative(&self) -> f64 {
        let n = self.n as f64;
        // P_n'(x) = n (x P_n(x) - P_{n - 1}(x)) / (x^2 - 1)
        n * (self.x * self.p - self.p_prev) / (self.x * self.x - 1.0)
    }

    pub fn second_derivative(&self) -> f64 {
        let n = self.n as f64;
        // Legendre's differential equation: (1 - x^2) P_n'' = 2 x P_n' - n (n + 1) P_n
        (2.0 * self.x * self.derivative() - n * (n + 1.0) * self.p) / (1.0 - self.x * self.x)
    }
}

/// A quadrature rule on the unit time interval $[0, 1]$.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeQuadrature<T> {
    weights: Vec<T>,
    points: Vec<T>,
}

impl<T> TimeQuadrature<T> {
    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn points(&self) -> &[T] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl<T: Real> TimeQuadrature<T> {
    /// Creates a rule from explicit points and weights.
    ///
    /// # Panics
    ///
    /// Panics if the lengths differ or if any point lies outside $[0, 1]$.
    pub fn from_points_and_weights(points: Vec<T>, weights: Vec<T>) -> Self {
        assert_eq!(points.len(), weights.len(), "every point must have a weight");
        assert!(
            points.iter().all(|x| *x >= T::zero() && *x <= T::one()),
            "quadrature points must lie in the unit interval"
        );
        Self { weights, points }
    }

    /// The Gauss-Legendre rule with the given number of points, exact for
    /// polynomials of degree `2 * num_points - 1`.
    ///
    /// # Panics
    ///
    /// Panics if zero points are requested.
    pub fn gauss(num_points: usize) -> Self {
        let n = num_points;
        assert!(n > 0, "number of points must be positive");

        // Loosely based on the procedure in
        // Numerical Recipes, The art of Scientific Computing, Third Edition (2007)
        let m = (n + 1) / 2;
        let mut points = Vec::with_capacity(n);
        let mut weights = Vec::with_capacity(n);

        // Only find the first m roots of P_n. The remaining roots follow by symmetry
        for i in 0..m {
            let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            let mut recurrence = LegendreRecurrence::evaluate(n, x);
            loop {
                let dx = -recurrence.value() / recurrence.derivative();
                x += dx;
                recurrence = LegendreRecurrence::evaluate(n, x);
                if dx.abs() <= 1e-15 {
                    break;
                }
            }
            let dp = recurrence.derivative();
            points.push(x);
            weights.push(2.0 / ((1.0 - x * x) * dp * dp));
        }
        for i in m..n {
            let mirror_idx = n - i - 1;
            points.push(-points[mirror_idx]);
            weights.push(weights[mirror_idx]);
        }
        // The roots come out in descending order
        points.reverse();
        weights.reverse();

        Self::convert_from_symmetric(points, weights)
    }

    /// The Gauss-Lobatto-Legendre rule with the given number of points, exact for
    /// polynomials of degree `2 * num_points - 3`. The first and last points coincide
    /// with the interval endpoints.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two points are requested.
    pub fn gauss_lobatto(num_points: usize) -> Self {
        let n = num_points;
        assert!(n >= 2, "a Lobatto rule contains both endpoints");

        let mut points = Vec::with_capacity(n);
        points.push(-1.0);
        // The interior points are the roots of P'_{n - 1}, found by Newton iteration
        // from the Chebyshev-Lobatto points
        for i in (1..n - 1).rev() {
            let mut x = (PI * i as f64 / (n as f64 - 1.0)).cos();
            let mut recurrence = LegendreRecurrence::evaluate(n - 1, x);
            loop {
                let dx = -recurrence.derivative() / recurrence.second_derivative();
                x += dx;
                recurrence = LegendreRecurrence::evaluate(n - 1, x);
                if dx.abs() <= 1e-15 {
                    break;
                }
            }
            points.push(x);
        }
        points.push(1.0);

        // A single weight formula covers interior points and endpoints alike
        let nf = n as f64;
        let weights = points
            .iter()
            .map(|&x| {
                let p = LegendreRecurrence::evaluate(n - 1, x).value();
                2.0 / (nf * (nf - 1.0) * p * p)
            })
            .collect();

        Self::convert_from_symmetric(points, weights)
    }

    /// Integrates the given function with this rule.
    pub fn integrate<F>(&self, f: F) -> T
    where
        F: Fn(T) -> T,
    {
        izip!(&self.weights, &self.points).fold(T::zero(), |acc, (&w, &x)| acc + w * f(x))
    }

    /// Maps an `f64` rule on $[-1, 1]$ onto $[0, 1]$ and converts it to `T`.
    fn convert_from_symmetric(points: Vec<f64>, weights: Vec<f64>) -> Self {
        let convert = |x: f64| T::from_f64(x).expect("Rule data must fit in T");
        Self {
            points: points.iter().map(|&x| convert((x + 1.0) / 2.0)).collect(),
            weights: weights.iter().map(|&w| convert(w / 2.0)).collect(),
        }
    }
}
