//! Function space descriptors and stage layouts.
//!
//! The library never sees meshes or bases; a spatial discretization is visible only
//! through the number of fields and the length of each field's coefficient vector.
//! A stage system then lives on the *big space*: the original space replicated once
//! per stage, flattened into a single vector.

use nalgebra::{DVector, DVectorView, DVectorViewMut, Scalar};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::Real;

/// Per-field dimensions of a semi-discrete function space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpace {
    field_dims: Vec<usize>,
}

impl FunctionSpace {
    /// Creates a space from the coefficient-vector length of each field.
    ///
    /// # Panics
    ///
    /// Panics if no fields are given.
    pub fn from_field_dims(field_dims: Vec<usize>) -> Self {
        assert!(!field_dims.is_empty(), "a function space has at least one field");
        Self { field_dims }
    }

    /// Convenience constructor for the common single-field case.
    pub fn scalar_field(dim: usize) -> Self {
        Self::from_field_dims(vec![dim])
    }

    pub fn num_fields(&self) -> usize {
        self.field_dims.len()
    }

    pub fn field_dim(&self, field: usize) -> usize {
        self.field_dims[field]
    }

    pub fn field_dims(&self) -> &[usize] {
        &self.field_dims
    }

    /// The summed dimension of all fields.
    pub fn total_dim(&self) -> usize {
        self.field_dims.iter().sum()
    }
}

/// Coefficient vectors for every field of a function space.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemState<T: Scalar> {
    fields: Vec<DVector<T>>,
}

impl<T: Real> SystemState<T> {
    /// The zero state of the given space.
    pub fn zeros(space: &FunctionSpace) -> Self {
        Self {
            fields: space.field_dims().iter().map(|&dim| DVector::zeros(dim)).collect(),
        }
    }

    /// Creates a state from per-field coefficient vectors.
    ///
    /// # Panics
    ///
    /// Panics if no fields are given.
    pub fn from_fields(fields: Vec<DVector<T>>) -> Self {
        assert!(!fields.is_empty(), "a state has at least one field");
        Self { fields }
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, field: usize) -> DVectorView<T> {
        (&self.fields[field]).into()
    }

    pub fn field_mut(&mut self, field: usize) -> DVectorViewMut<T> {
        (&mut self.fields[field]).into()
    }

    /// Whether the state is shaped like a member of the given space.
    pub fn matches_space(&self, space: &FunctionSpace) -> bool {
        self.fields.len() == space.num_fields()
            && self.fields.iter().zip(space.field_dims()).all(|(u, &dim)| u.len() == dim)
    }
}

/// The block layout of a stage-replicated big space.
///
/// The flattening convention is *stage-major, field-minor*: the big vector consists of
/// one contiguous block per stage, and within each stage block one contiguous block per
/// field, in field order. The block of stage $i$ and field $f$ therefore starts at
/// `i * stage_dim + field_offset(f)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLayout {
    num_stages: usize,
    field_offsets: Vec<usize>,
    field_dims: Vec<usize>,
    stage_dim: usize,
}

impl StageLayout {
    /// The layout replicating the given space over `num_stages` stages.
    ///
    /// # Panics
    ///
    /// Panics if `num_stages == 0`.
    pub fn new(num_stages: usize, space: &FunctionSpace) -> Self {
        assert!(num_stages >= 1, "a stage system has at least one stage");
        let field_dims = space.field_dims().to_vec();
        let mut field_offsets = Vec::with_capacity(field_dims.len());
        let mut offset = 0;
        for &dim in &field_dims {
            field_offsets.push(offset);
            offset += dim;
        }
        Self {
            num_stages,
            field_offsets,
            field_dims,
            stage_dim: offset,
        }
    }

    pub fn num_stages(&self) -> usize {
        self.num_stages
    }

    pub fn num_fields(&self) -> usize {
        self.field_dims.len()
    }

    /// The dimension of one stage block, i.e. the total dimension of the original space.
    pub fn stage_dim(&self) -> usize {
        self.stage_dim
    }

    /// The dimension of the big space.
    pub fn total_dim(&self) -> usize {
        self.num_stages * self.stage_dim
    }

    pub fn field_dim(&self, field: usize) -> usize {
        self.field_dims[field]
    }

    /// The offset of the given field within a stage block.
    pub fn field_offset(&self, field: usize) -> usize {
        self.field_offsets[field]
    }

    /// The index range of the `(stage, field)` block in the big vector.
    pub fn block_range(&self, stage: usize, field: usize) -> Range<usize> {
        debug_assert!(stage < self.num_stages);
        let start = stage * self.stage_dim + self.field_offsets[field];
        start..start + self.field_dims[field]
    }

    /// The index range of one entire stage block.
    pub fn stage_range(&self, stage: usize) -> Range<usize> {
        debug_assert!(stage < self.num_stages);
        stage * self.stage_dim..(stage + 1) * self.stage_dim
    }
}
