//! Dirichlet boundary conditions on stage unknowns.
//!
//! A [`DirichletBc`] pins selected degrees of freedom of one field to prescribed
//! time-dependent data. The stage transformations lower each condition into strong
//! constraints on the stage unknowns; [`StageBoundaryCondition`] holds the recipe for
//! computing the constrained target values, which depends on the transformation and
//! must be re-evaluated at the start of every step.

use nalgebra::{DMatrix, DVector, Scalar};
use serde::{Deserialize, Serialize};

use crate::operators::{SemidiscreteSystem, SourceId};
use crate::space::{StageLayout, SystemState};
use crate::{ConfigError, Real};

/// Selects how Dirichlet data is imposed on Runge-Kutta stage unknowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BcType {
    /// Constrain the stage solution values to the boundary data. This is the
    /// appropriate choice for differential-algebraic systems, where the constrained
    /// degrees of freedom carry no time derivative of their own.
    Dae,
    /// Constrain the stage derivative values to the time derivative of the boundary
    /// data. Conditions imposed this way require derivative data, but keep the
    /// stage system consistent with the underlying ODE.
    Ode,
}

/// A Dirichlet condition pinning selected degrees of freedom of one field.
///
/// The data source must evaluate to one value per constrained degree of freedom, in
/// the order the degrees of freedom are listed. ODE-type imposition additionally
/// requires the time derivative of the data as a second source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirichletBc {
    field: usize,
    dofs: Vec<usize>,
    data: SourceId,
    derivative: Option<SourceId>,
}

impl DirichletBc {
    pub fn new(field: usize, dofs: Vec<usize>, data: SourceId) -> Self {
        Self {
            field,
            dofs,
            data,
            derivative: None,
        }
    }

    /// Attaches the time derivative of the boundary data.
    pub fn with_derivative(self, derivative: SourceId) -> Self {
        Self {
            derivative: Some(derivative),
            ..self
        }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn data(&self) -> SourceId {
        self.data
    }

    pub fn derivative(&self) -> Option<SourceId> {
        self.derivative
    }

    pub(crate) fn validate<T: Real>(
        &self,
        bc_index: usize,
        system: &SemidiscreteSystem<T>,
    ) -> Result<(), ConfigError> {
        let space = system.space();
        if self.field >= space.num_fields() {
            return Err(ConfigError::FieldIndexOutOfRange {
                field: self.field,
                num_fields: space.num_fields(),
            });
        }
        let field_dim = space.field_dim(self.field);
        for &dof in &self.dofs {
            if dof >= field_dim {
                return Err(ConfigError::DofIndexOutOfRange { dof, field_dim });
            }
        }
        for id in std::iter::once(self.data).chain(self.derivative) {
            let source = system
                .source(id)
                .ok_or(ConfigError::UnknownSource { source: id.index() })?;
            if source.dimension() != self.dofs.len() {
                return Err(ConfigError::BoundaryDataDimensionMismatch {
                    bc_index,
                    expected: self.dofs.len(),
                    found: source.dimension(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum StageBcKind<T: Scalar> {
    /// Stage solution values $G_i$ are pinned, so the stage unknown targets are
    /// $A_1^{-1} (G - u_0) / \Delta t$.
    Dae { a1_inv: DMatrix<T> },
    /// Stage derivative values $G_i'$ are pinned, so the stage unknown targets are
    /// $A_2 G'$.
    Ode { a2: DMatrix<T> },
    /// Trial coefficients are pinned to the $L^2$-in-time projection of the data,
    /// so the targets are $P S$ with $S$ sampled at the quadrature times.
    Projection { projector: DMatrix<T> },
}

/// A Dirichlet condition lowered onto the stage unknowns of a transformed problem.
///
/// Holds the condition itself together with the sample locations within a step and
/// the matrix that mixes samples into per-stage target values.
#[derive(Debug, Clone, PartialEq)]
pub struct StageBoundaryCondition<T: Scalar> {
    bc: DirichletBc,
    /// The source sampled for the targets: the data itself, or its time derivative
    /// for ODE-type imposition.
    source: SourceId,
    /// Sample locations within the step, as fractions of the step size.
    sample_offsets: DVector<T>,
    kind: StageBcKind<T>,
    num_stages: usize,
}

impl<T: Real> StageBoundaryCondition<T> {
    pub(crate) fn dae(bc: DirichletBc, c: DVector<T>, a1_inv: DMatrix<T>) -> Self {
        let source = bc.data();
        let num_stages = c.len();
        Self {
            bc,
            source,
            sample_offsets: c,
            kind: StageBcKind::Dae { a1_inv },
            num_stages,
        }
    }

    pub(crate) fn ode(bc: DirichletBc, derivative: SourceId, c: DVector<T>, a2: DMatrix<T>) -> Self {
        let num_stages = c.len();
        Self {
            bc,
            source: derivative,
            sample_offsets: c,
            kind: StageBcKind::Ode { a2 },
            num_stages,
        }
    }

    pub(crate) fn projection(
        bc: DirichletBc,
        quadrature_points: DVector<T>,
        projector: DMatrix<T>,
    ) -> Self {
        let source = bc.data();
        let num_stages = projector.nrows();
        Self {
            bc,
            source,
            sample_offsets: quadrature_points,
            kind: StageBcKind::Projection { projector },
            num_stages,
        }
    }

    pub fn bc(&self) -> &DirichletBc {
        &self.bc
    }

    pub fn num_stages(&self) -> usize {
        self.num_stages
    }

    pub fn sample_offsets(&self) -> &DVector<T> {
        &self.sample_offsets
    }

    /// Samples the relevant data source at every sample time of the step starting at
    /// `t` with step size `dt`.
    ///
    /// The returned matrix has one row per constrained degree of freedom and one
    /// column per sample location.
    pub fn sampled_data(
        &self,
        system: &SemidiscreteSystem<T>,
        t: T,
        dt: T,
    ) -> eyre::Result<DMatrix<T>> {
        let source = system
            .source(self.source)
            .ok_or(ConfigError::UnknownSource {
                source: self.source.index(),
            })?;
        let mut samples = DMatrix::zeros(self.bc.dofs().len(), self.sample_offsets.len());
        for (k, &offset) in self.sample_offsets.iter().enumerate() {
            source.eval_into(samples.column_mut(k), t + offset * dt);
        }
        Ok(samples)
    }

    /// Computes the target values of the constrained stage unknowns for a step from
    /// `t` with step size `dt` and previous solution `u0`.
    ///
    /// The returned matrix has one row per constrained degree of freedom and one
    /// column per stage.
    pub fn stage_targets(
        &self,
        system: &SemidiscreteSystem<T>,
        t: T,
        dt: T,
        u0: &SystemState<T>,
    ) -> eyre::Result<DMatrix<T>> {
        let mut samples = self.sampled_data(system, t, dt)?;
        let targets = match &self.kind {
            StageBcKind::Dae { a1_inv } => {
                let u0_field = u0.field(self.bc.field());
                for mut column in samples.column_iter_mut() {
                    for (value, &dof) in column.iter_mut().zip(self.bc.dofs()) {
                        *value -= u0_field[dof];
                    }
                }
                samples * a1_inv.transpose() / dt
            }
            StageBcKind::Ode { a2 } => samples * a2.transpose(),
            StageBcKind::Projection { projector } => samples * projector.transpose(),
        };
        Ok(targets)
    }

    /// Invokes `f` with the index into the stage vector and the target value of
    /// every constrained unknown.
    pub(crate) fn for_each_constraint(
        &self,
        layout: &StageLayout,
        targets: &DMatrix<T>,
        mut f: impl FnMut(usize, T),
    ) {
        for stage in 0..self.num_stages {
            let start = layout.block_range(stage, self.bc.field()).start;
            for (local, &dof) in self.bc.dofs().iter().enumerate() {
                f(start + dof, targets[(local, stage)]);
            }
        }
    }
}
