use std::ops::{Add, Div, Mul, Neg, Sub};

use nalgebra::Scalar;

use crate::Real;

/// A scalar expression in the time variable $t$ and the step size $\Delta t$.
///
/// Expressions are immutable trees. All manipulation, in particular
/// [`substitute_time`](ScalarExpr::substitute_time), builds new trees and leaves the
/// operands untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarExpr<T: Scalar> {
    /// A constant value.
    Constant(T),
    /// The time variable $t$.
    Time,
    /// The step size $\Delta t$.
    TimeStep,
    Add(Box<ScalarExpr<T>>, Box<ScalarExpr<T>>),
    Sub(Box<ScalarExpr<T>>, Box<ScalarExpr<T>>),
    Mul(Box<ScalarExpr<T>>, Box<ScalarExpr<T>>),
    Div(Box<ScalarExpr<T>>, Box<ScalarExpr<T>>),
}

impl<T: Real> ScalarExpr<T> {
    pub fn constant(value: T) -> Self {
        Self::Constant(value)
    }

    pub fn one() -> Self {
        Self::Constant(T::one())
    }

    pub fn time() -> Self {
        Self::Time
    }

    pub fn time_step() -> Self {
        Self::TimeStep
    }

    /// The stage time $t + c \, \Delta t$ for the given abscissa $c$.
    pub fn stage_time(c: T) -> Self {
        Self::Time + Self::Constant(c) * Self::TimeStep
    }

    /// Whether the expression is the literal constant zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Constant(c) if *c == T::zero())
    }

    /// Evaluates the expression at the given time and step size.
    pub fn evaluate(&self, t: T, dt: T) -> T {
        match self {
            Self::Constant(c) => *c,
            Self::Time => t,
            Self::TimeStep => dt,
            Self::Add(a, b) => a.evaluate(t, dt) + b.evaluate(t, dt),
            Self::Sub(a, b) => a.evaluate(t, dt) - b.evaluate(t, dt),
            Self::Mul(a, b) => a.evaluate(t, dt) * b.evaluate(t, dt),
            Self::Div(a, b) => a.evaluate(t, dt) / b.evaluate(t, dt),
        }
    }

    /// Returns a new expression in which every occurrence of the time variable is
    /// replaced by the given expression.
    pub fn substitute_time(&self, replacement: &ScalarExpr<T>) -> Self {
        let recurse =
            |a: &Self, b: &Self| (Box::new(a.substitute_time(replacement)), Box::new(b.substitute_time(replacement)));
        match self {
            Self::Constant(c) => Self::Constant(*c),
            Self::Time => replacement.clone(),
            Self::TimeStep => Self::TimeStep,
            Self::Add(a, b) => {
                let (a, b) = recurse(a, b);
                Self::Add(a, b)
            }
            Self::Sub(a, b) => {
                let (a, b) = recurse(a, b);
                Self::Sub(a, b)
            }
            Self::Mul(a, b) => {
                let (a, b) = recurse(a, b);
                Self::Mul(a, b)
            }
            Self::Div(a, b) => {
                let (a, b) = recurse(a, b);
                Self::Div(a, b)
            }
        }
    }
}

impl<T: Real> Add for ScalarExpr<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::Add(Box::new(self), Box::new(rhs))
    }
}

impl<T: Real> Sub for ScalarExpr<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::Sub(Box::new(self), Box::new(rhs))
    }
}

impl<T: Real> Mul for ScalarExpr<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::Mul(Box::new(self), Box::new(rhs))
    }
}

impl<T: Real> Div for ScalarExpr<T> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self::Div(Box::new(self), Box::new(rhs))
    }
}

impl<T: Real> Neg for ScalarExpr<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::Constant(-T::one()) * self
    }
}
