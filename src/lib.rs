//! Time stepping for finite element semi-discretizations.
//!
//! `skoll` turns a semi-discrete residual form $F(t, u; v) = 0$ (discrete in space,
//! continuous in time) into fully discrete algebraic systems for a single time step,
//! using either an implicit Runge-Kutta method or a discontinuous Galerkin method in time.
//! The transformation is symbolic: stage unknowns are introduced, the time and solution
//! variables are replaced by stage-dependent expressions, and boundary conditions are
//! lifted onto the stages. Spatial discretization (meshes, bases, assembly of spatial
//! operators) is deliberately left to an external provider; see [`operators`].
//!
//! The main entry points are [`stepper::TimeStepper`],
//! [`stepper::DiscontinuousGalerkinTimeStepper`] and [`stepper::AdaptiveTimeStepper`].

use std::fmt;
use std::fmt::{Display, Formatter};

use nalgebra::RealField;

pub mod bc;
pub mod calculus;
pub mod element;
pub mod form;
pub mod galerkin;
pub mod nullspace;
pub mod operators;
pub mod problem;
pub mod quadrature;
pub mod rk;
pub mod solve;
pub mod space;
pub mod stepper;
pub mod tableau;

pub extern crate nalgebra;

/// Trait alias for real-valued scalar types used by generic `skoll` routines.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Error type for malformed or inconsistent stepper definitions.
///
/// All variants describe problems that are detected eagerly, at construction time,
/// before any step is attempted. They are never produced by `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The product of the splitting factors does not reproduce the tableau matrix.
    InvalidSplitting,
    /// A splitting factor that must be inverted is singular.
    SingularSplittingFactor { factor: &'static str },
    /// Embedded weights are required but the tableau does not carry any.
    MissingEmbeddedWeights,
    /// The step controller exponent 1 / (order - 1) is undefined for this order.
    AdaptiveOrderTooLow { order: usize },
    /// The quadrature rule has too few points for the polynomial degree in time.
    QuadratureTooWeak { num_points: usize, required: usize },
    /// A form term references an operator that is not registered with the system.
    UnknownOperator { operator: usize },
    /// A form term references a source that is not registered with the system.
    UnknownSource { source: usize },
    /// A field index is out of range for the system's function space.
    FieldIndexOutOfRange { field: usize, num_fields: usize },
    /// A constrained degree of freedom is out of range for its field.
    DofIndexOutOfRange { dof: usize, field_dim: usize },
    /// The trial expression of a form term does not match the operator's input dimension.
    OperatorInputMismatch { operator: usize, expected: usize, found: usize },
    /// The operator's output dimension does not match the test field.
    OperatorOutputMismatch { operator: usize, expected: usize, found: usize },
    /// The summands of a field expression do not all have the same dimension.
    SumDimensionMismatch { expected: usize, found: usize },
    /// The boundary data source does not provide one value per constrained dof.
    BoundaryDataDimensionMismatch { bc_index: usize, expected: usize, found: usize },
    /// Null-space components must be given in strictly increasing field order.
    UnsortedNullspaceFields,
    /// A null-space basis vector does not match the dimension of its field.
    NullspaceDimensionMismatch { field: usize, expected: usize, found: usize },
    /// A null-space basis vector is identically zero.
    ZeroNullspaceVector { field: usize },
    /// Differentiated boundary data is required but the condition does not provide any.
    MissingBoundaryDerivative { bc_index: usize },
    /// The mass matrix of the time element could not be factorized, so boundary data
    /// cannot be projected onto the element's basis.
    SingularTimeMassMatrix,
    /// A stage-system form still contains time-derivative leaves.
    UnresolvedTimeDerivative,
    /// A form term references a stage outside the stage layout.
    StageIndexOutOfRange { stage: usize, num_stages: usize },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSplitting => {
                write!(f, "The splitting factors do not multiply back to the tableau matrix")
            }
            Self::SingularSplittingFactor { factor } => {
                write!(f, "The splitting factor {} is singular and cannot be inverted", factor)
            }
            Self::MissingEmbeddedWeights => {
                write!(f, "The tableau carries no embedded weights for error estimation")
            }
            Self::AdaptiveOrderTooLow { order } => {
                write!(
                    f,
                    "Adaptive stepping requires a method of order at least 2, got order {}",
                    order
                )
            }
            Self::QuadratureTooWeak { num_points, required } => {
                write!(
                    f,
                    "The quadrature rule has {} points, but at least {} are required",
                    num_points, required
                )
            }
            Self::UnknownOperator { operator } => {
                write!(f, "The form references unregistered operator {}", operator)
            }
            Self::UnknownSource { source } => {
                write!(f, "The form references unregistered source {}", source)
            }
            Self::FieldIndexOutOfRange { field, num_fields } => {
                write!(
                    f,
                    "Field index {} is out of range for a space with {} fields",
                    field, num_fields
                )
            }
            Self::DofIndexOutOfRange { dof, field_dim } => {
                write!(
                    f,
                    "Constrained dof {} is out of range for a field with {} dofs",
                    dof, field_dim
                )
            }
            Self::OperatorInputMismatch { operator, expected, found } => {
                write!(
                    f,
                    "Operator {} expects input dimension {}, but the trial expression has dimension {}",
                    operator, expected, found
                )
            }
            Self::OperatorOutputMismatch { operator, expected, found } => {
                write!(
                    f,
                    "Operator {} produces output dimension {}, but the test field has dimension {}",
                    operator, expected, found
                )
            }
            Self::SumDimensionMismatch { expected, found } => {
                write!(
                    f,
                    "A sum mixes expressions of dimension {} and {}",
                    expected, found
                )
            }
            Self::BoundaryDataDimensionMismatch { bc_index, expected, found } => {
                write!(
                    f,
                    "Boundary condition {} constrains {} dofs but its data source has dimension {}",
                    bc_index, expected, found
                )
            }
            Self::UnsortedNullspaceFields => {
                write!(f, "Null-space components must be sorted by strictly increasing field index")
            }
            Self::NullspaceDimensionMismatch { field, expected, found } => {
                write!(
                    f,
                    "The null-space basis for field {} has dimension {}, expected {}",
                    field, found, expected
                )
            }
            Self::ZeroNullspaceVector { field } => {
                write!(f, "The null-space basis for field {} is identically zero", field)
            }
            Self::MissingBoundaryDerivative { bc_index } => {
                write!(
                    f,
                    "Boundary condition {} provides no differentiated data, which the chosen \
                     constraint type requires",
                    bc_index
                )
            }
            Self::SingularTimeMassMatrix => {
                write!(f, "The mass matrix of the time element is singular")
            }
            Self::UnresolvedTimeDerivative => {
                write!(f, "The stage-system form still contains time-derivative leaves")
            }
            Self::StageIndexOutOfRange { stage, num_stages } => {
                write!(
                    f,
                    "Stage index {} is out of range for a layout with {} stages",
                    stage, num_stages
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
