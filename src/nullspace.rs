//! Null-space descriptors for singular spatial operators.
//!
//! Pure-Neumann problems and similar formulations have spatial operators with a known
//! null space, typically the constants of one or more fields. The stage systems inherit
//! one copy of each null-space vector per stage; the nonlinear solver deflates its
//! linearized systems with the replicated basis so that Newton updates stay orthogonal
//! to it.

use nalgebra::{DVector, Scalar};

use crate::space::{FunctionSpace, StageLayout};
use crate::{ConfigError, Real};

/// A null-space descriptor for a semi-discrete problem.
///
/// Each component attaches one spatial basis vector to a field. Components must be
/// sorted by strictly increasing field index; fields without a component contribute
/// nothing to the null space.
#[derive(Debug, Clone, PartialEq)]
pub struct Nullspace<T: Scalar> {
    components: Vec<(usize, DVector<T>)>,
}

impl<T: Real> Nullspace<T> {
    pub fn new(components: Vec<(usize, DVector<T>)>) -> Self {
        Self { components }
    }

    /// The null space spanned by the constant vector of the given field, as needed for
    /// a pure-Neumann problem on that field.
    pub fn constants(field: usize, space: &FunctionSpace) -> Self {
        Self::new(vec![(field, DVector::repeat(space.field_dim(field), T::one()))])
    }

    pub fn components(&self) -> &[(usize, DVector<T>)] {
        &self.components
    }

    /// Checks the descriptor against a function space.
    pub fn validate(&self, space: &FunctionSpace) -> Result<(), ConfigError> {
        if !self.components.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err(ConfigError::UnsortedNullspaceFields);
        }
        for (field, basis) in &self.components {
            if *field >= space.num_fields() {
                return Err(ConfigError::FieldIndexOutOfRange {
                    field: *field,
                    num_fields: space.num_fields(),
                });
            }
            if basis.len() != space.field_dim(*field) {
                return Err(ConfigError::NullspaceDimensionMismatch {
                    field: *field,
                    expected: space.field_dim(*field),
                    found: basis.len(),
                });
            }
            if basis.norm() == T::zero() {
                return Err(ConfigError::ZeroNullspaceVector { field: *field });
            }
        }
        Ok(())
    }
}

/// The stage-replicated null-space basis of a stage system.
///
/// Each spatial basis vector is embedded once per stage block of the big space and
/// normalized. Vectors of distinct stages or fields have disjoint support, so the
/// resulting set is orthonormal.
#[derive(Debug, Clone, PartialEq)]
pub struct StageNullspace<T: Scalar> {
    vectors: Vec<DVector<T>>,
}

impl<T: Real> StageNullspace<T> {
    /// Replicates a validated descriptor over all stages of the layout.
    pub fn replicate(nullspace: &Nullspace<T>, layout: &StageLayout) -> Self {
        let mut vectors = Vec::with_capacity(layout.num_stages() * nullspace.components().len());
        for stage in 0..layout.num_stages() {
            for (field, basis) in nullspace.components() {
                let mut big = DVector::zeros(layout.total_dim());
                big.rows_range_mut(layout.block_range(stage, *field)).copy_from(basis);
                let norm = big.norm();
                big /= norm;
                vectors.push(big);
            }
        }
        Self { vectors }
    }

    pub fn vectors(&self) -> &[DVector<T>] {
        &self.vectors
    }

    pub fn num_vectors(&self) -> usize {
        self.vectors.len()
    }
}
