//! The seam between the symbolic form layer and an external spatial discretization.
//!
//! A spatial provider (a FEM assembly layer, a finite difference code, a test harness)
//! exposes its discretized operators and time-dependent data through the traits here.
//! The library itself treats operators as opaque: all it ever does is apply them to
//! field coefficient vectors and request their Jacobians.

use eyre::Result;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut, Scalar};
use serde::{Deserialize, Serialize};

use crate::calculus;
use crate::space::FunctionSpace;
use crate::Real;

/// Identifies a spatial operator registered with a [`SemidiscreteSystem`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(usize);

impl OperatorId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Identifies a source term registered with a [`SemidiscreteSystem`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(usize);

impl SourceId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// A possibly nonlinear spatial operator $y = A(t, x)$ acting on field coefficient
/// vectors.
///
/// Implementations report their input and output dimensions eagerly so that forms can
/// be validated at stepper construction, long before the first application.
pub trait SpatialOperator<T: Real> {
    fn input_dimension(&self) -> usize;

    fn output_dimension(&self) -> usize;

    /// Evaluates $y = A(t, x)$.
    fn apply_into(&self, y: DVectorViewMut<T>, t: T, x: DVectorView<T>) -> Result<()>;

    /// Writes the Jacobian $\partial A / \partial x$ at `(t, x)` into the given matrix.
    ///
    /// The default implementation uses central finite differences, so nonlinear
    /// providers only need to supply `apply_into`. Providers with analytic or
    /// assembled Jacobians should override this.
    fn jacobian_into(&self, jacobian: DMatrixViewMut<T>, t: T, x: DVectorView<T>) -> Result<()> {
        let mut x = x.clone_owned();
        let h = calculus::default_finite_difference_resolution::<T>();
        calculus::approximate_jacobian_fd_into(jacobian, |y, x| self.apply_into(y, t, x), &mut x, h)
    }
}

/// A constant-in-time linear operator $y = M x$ backed by a dense matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixOperator<T: Scalar> {
    matrix: DMatrix<T>,
}

impl<T: Scalar> MatrixOperator<T> {
    pub fn new(matrix: DMatrix<T>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }
}

impl<T: Real> SpatialOperator<T> for MatrixOperator<T> {
    fn input_dimension(&self) -> usize {
        self.matrix.ncols()
    }

    fn output_dimension(&self) -> usize {
        self.matrix.nrows()
    }

    fn apply_into(&self, mut y: DVectorViewMut<T>, _t: T, x: DVectorView<T>) -> Result<()> {
        y.gemv(T::one(), &self.matrix, &x, T::zero());
        Ok(())
    }

    fn jacobian_into(&self, mut jacobian: DMatrixViewMut<T>, _t: T, _x: DVectorView<T>) -> Result<()> {
        jacobian.copy_from(&self.matrix);
        Ok(())
    }
}

/// A spatial operator defined by closures, mainly useful for tests and small problems.
pub struct FunctionOperator<F, J> {
    input_dimension: usize,
    output_dimension: usize,
    function: F,
    jacobian: Option<J>,
}

/// The jacobian closure type that [`FunctionOperator::new`] defaults to.
pub type NoJacobian<T> = fn(DMatrixViewMut<T>, T, DVectorView<T>) -> Result<()>;

impl<T: Real, F> FunctionOperator<F, NoJacobian<T>>
where
    F: Fn(DVectorViewMut<T>, T, DVectorView<T>) -> Result<()>,
{
    /// Creates an operator from an application closure; Jacobians fall back to finite
    /// differences.
    pub fn new(input_dimension: usize, output_dimension: usize, function: F) -> Self {
        Self {
            input_dimension,
            output_dimension,
            function,
            jacobian: None,
        }
    }
}

impl<F, J> FunctionOperator<F, J> {
    /// Attaches an analytic Jacobian closure.
    pub fn with_jacobian<T, J2>(self, jacobian: J2) -> FunctionOperator<F, J2>
    where
        T: Real,
        J2: Fn(DMatrixViewMut<T>, T, DVectorView<T>) -> Result<()>,
    {
        FunctionOperator {
            input_dimension: self.input_dimension,
            output_dimension: self.output_dimension,
            function: self.function,
            jacobian: Some(jacobian),
        }
    }
}

impl<T, F, J> SpatialOperator<T> for FunctionOperator<F, J>
where
    T: Real,
    F: Fn(DVectorViewMut<T>, T, DVectorView<T>) -> Result<()>,
    J: Fn(DMatrixViewMut<T>, T, DVectorView<T>) -> Result<()>,
{
    fn input_dimension(&self) -> usize {
        self.input_dimension
    }

    fn output_dimension(&self) -> usize {
        self.output_dimension
    }

    fn apply_into(&self, y: DVectorViewMut<T>, t: T, x: DVectorView<T>) -> Result<()> {
        (self.function)(y, t, x)
    }

    fn jacobian_into(&self, jacobian: DMatrixViewMut<T>, t: T, x: DVectorView<T>) -> Result<()> {
        match &self.jacobian {
            Some(j) => j(jacobian, t, x),
            None => {
                let mut x = x.clone_owned();
                let h = calculus::default_finite_difference_resolution::<T>();
                calculus::approximate_jacobian_fd_into(jacobian, |y, x| self.apply_into(y, t, x), &mut x, h)
            }
        }
    }
}

/// Prescribed time-dependent data, such as a forcing term or boundary values.
pub trait SourceTerm<T: Scalar> {
    fn dimension(&self) -> usize;

    /// Evaluates the data at the given time.
    fn eval_into(&self, out: DVectorViewMut<T>, t: T);
}

/// A source term defined by a closure.
pub struct SourceFunction<F> {
    dimension: usize,
    function: F,
}

impl<F> SourceFunction<F> {
    pub fn new<T>(dimension: usize, function: F) -> Self
    where
        T: Scalar,
        F: Fn(DVectorViewMut<T>, T),
    {
        Self { dimension, function }
    }
}

impl<T, F> SourceTerm<T> for SourceFunction<F>
where
    T: Scalar,
    F: Fn(DVectorViewMut<T>, T),
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn eval_into(&self, out: DVectorViewMut<T>, t: T) {
        (self.function)(out, t)
    }
}

/// The spatial side of a time-dependent problem: a function space together with the
/// registry of operators and sources that give numeric meaning to residual forms.
pub struct SemidiscreteSystem<T: Real> {
    space: FunctionSpace,
    operators: Vec<Box<dyn SpatialOperator<T>>>,
    sources: Vec<Box<dyn SourceTerm<T>>>,
}

impl<T: Real> SemidiscreteSystem<T> {
    pub fn new(space: FunctionSpace) -> Self {
        Self {
            space,
            operators: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn space(&self) -> &FunctionSpace {
        &self.space
    }

    /// Registers a spatial operator and returns its handle.
    pub fn add_operator(&mut self, operator: impl SpatialOperator<T> + 'static) -> OperatorId {
        self.operators.push(Box::new(operator));
        OperatorId(self.operators.len() - 1)
    }

    /// Registers a source term and returns its handle.
    pub fn add_source(&mut self, source: impl SourceTerm<T> + 'static) -> SourceId {
        self.sources.push(Box::new(source));
        SourceId(self.sources.len() - 1)
    }

    pub fn operator(&self, id: OperatorId) -> Option<&dyn SpatialOperator<T>> {
        self.operators.get(id.0).map(|op| op.as_ref())
    }

    pub fn source(&self, id: SourceId) -> Option<&dyn SourceTerm<T>> {
        self.sources.get(id.0).map(|source| source.as_ref())
    }

    pub fn num_operators(&self) -> usize {
        self.operators.len()
    }

    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    /// Evaluates the source with the given handle into a freshly allocated vector.
    pub fn evaluate_source(&self, id: SourceId, t: T) -> Option<DVector<T>> {
        let source = self.source(id)?;
        let mut out = DVector::zeros(source.dimension());
        source.eval_into((&mut out).into(), t);
        Some(out)
    }
}
