//! Numeric assembly of stage systems.
//!
//! A [`StageProblem`] binds the symbolic product of a form transformation to the
//! operator registry of a [`SemidiscreteSystem`], turning the coupled form into the
//! nonlinear system $F(w) = 0$ the [`solve`](crate::solve) module iterates on:
//! residual evaluation, dense Jacobian assembly with strong constraint rows, and
//! null-space deflation of the linearized solves.
//!
//! The problem is bound to one step at a time: [`StageProblem::refresh`] fixes
//! $(t, \Delta t, u_0)$ and re-samples all boundary data, and must be called before
//! evaluation.

use itertools::izip;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};

use crate::bc::StageBoundaryCondition;
use crate::form::{FieldExpr, Form};
use crate::nullspace::StageNullspace;
use crate::operators::SemidiscreteSystem;
use crate::solve::{SolveError, StageSystem};
use crate::space::{StageLayout, SystemState};
use crate::{ConfigError, Real};

/// The assembled nonlinear problem of one time step, reused across steps.
pub struct StageProblem<'a, T: Real> {
    system: &'a SemidiscreteSystem<T>,
    form: Form<T>,
    layout: StageLayout,
    bcs: Vec<StageBoundaryCondition<T>>,
    nullspace: Option<StageNullspace<T>>,
    t: T,
    dt: T,
    u0: SystemState<T>,
    bc_targets: Vec<DMatrix<T>>,
    jacobian: DMatrix<T>,
    arg_buf: DVector<T>,
    out_buf: DVector<T>,
    jac_buf: DMatrix<T>,
    source_buf: DVector<T>,
}

impl<'a, T: Real> StageProblem<'a, T> {
    /// Binds a transformed form to a system, validating every registry reference and
    /// dimension eagerly.
    pub fn new(
        system: &'a SemidiscreteSystem<T>,
        form: Form<T>,
        layout: StageLayout,
        bcs: Vec<StageBoundaryCondition<T>>,
        nullspace: Option<StageNullspace<T>>,
    ) -> Result<Self, ConfigError> {
        form.validate(system)?;
        let mut max_in = 0;
        let mut max_out = 0;
        for term in form.terms() {
            if term.trial.has_time_derivative() {
                return Err(ConfigError::UnresolvedTimeDerivative);
            }
            if term.test.stage >= layout.num_stages() {
                return Err(ConfigError::StageIndexOutOfRange {
                    stage: term.test.stage,
                    num_stages: layout.num_stages(),
                });
            }
            if let Some(stage) = term.trial.max_stage_index() {
                if stage >= layout.num_stages() {
                    return Err(ConfigError::StageIndexOutOfRange {
                        stage,
                        num_stages: layout.num_stages(),
                    });
                }
            }
            let operator = system
                .operator(term.operator)
                .ok_or(ConfigError::UnknownOperator {
                    operator: term.operator.index(),
                })?;
            max_in = max_in.max(operator.input_dimension());
            max_out = max_out.max(operator.output_dimension());
        }
        for (bc_index, bc) in bcs.iter().enumerate() {
            bc.bc().validate(bc_index, system)?;
        }
        let n = layout.total_dim();
        Ok(Self {
            system,
            form,
            layout,
            bcs,
            nullspace,
            t: T::zero(),
            dt: T::zero(),
            u0: SystemState::zeros(system.space()),
            bc_targets: Vec::new(),
            jacobian: DMatrix::zeros(n, n),
            arg_buf: DVector::zeros(max_in),
            out_buf: DVector::zeros(max_out),
            jac_buf: DMatrix::zeros(max_out, max_in),
            source_buf: DVector::zeros(max_in),
        })
    }

    pub fn layout(&self) -> &StageLayout {
        &self.layout
    }

    pub fn form(&self) -> &Form<T> {
        &self.form
    }

    pub fn dimension(&self) -> usize {
        self.layout.total_dim()
    }

    /// Re-binds the problem to the step starting at `t` with step size `dt` and
    /// previous solution `u0`, re-sampling all boundary data.
    pub fn refresh(&mut self, t: T, dt: T, u0: &SystemState<T>) -> eyre::Result<()> {
        assert!(
            u0.matches_space(self.system.space()),
            "state must match the system's function space"
        );
        self.t = t;
        self.dt = dt;
        self.u0.clone_from(u0);
        self.bc_targets = self
            .bcs
            .iter()
            .map(|bc| bc.stage_targets(self.system, t, dt, u0))
            .collect::<eyre::Result<_>>()?;
        Ok(())
    }

    /// Overwrites constrained entries of the stage vector with their current targets.
    ///
    /// Useful as an initial guess so that Newton starts on the constraint manifold.
    pub fn apply_constraints(&self, w: &mut DVector<T>) {
        for (bc, targets) in izip!(&self.bcs, &self.bc_targets) {
            bc.for_each_constraint(&self.layout, targets, |index, target| w[index] = target);
        }
    }

    fn assemble_residual(&mut self, f: &mut DVectorViewMut<T>, w: &DVectorView<T>) -> eyre::Result<()> {
        let Self {
            system,
            form,
            layout,
            bcs,
            bc_targets,
            u0,
            t,
            dt,
            arg_buf,
            out_buf,
            source_buf,
            ..
        } = self;
        let (t, dt) = (*t, *dt);
        f.fill(T::zero());
        for term in form.terms() {
            let coefficient = term.coefficient.evaluate(t, dt);
            if coefficient == T::zero() {
                continue;
            }
            let operator = system
                .operator(term.operator)
                .ok_or(ConfigError::UnknownOperator {
                    operator: term.operator.index(),
                })?;
            let (d_in, d_out) = (operator.input_dimension(), operator.output_dimension());
            let mut arg = arg_buf.rows_mut(0, d_in);
            arg.fill(T::zero());
            accumulate_expression(&mut arg, &term.trial, T::one(), w, u0, layout, *system, source_buf, t, dt)?;
            let time = term.time.evaluate(t, dt);
            operator.apply_into(out_buf.rows_mut(0, d_out), time, arg_buf.rows(0, d_in))?;
            f.rows_range_mut(layout.block_range(term.test.stage, term.test.field))
                .axpy(coefficient, &out_buf.rows(0, d_out), T::one());
        }
        for (bc, targets) in izip!(bcs.iter(), bc_targets.iter()) {
            bc.for_each_constraint(layout, targets, |index, target| f[index] = w[index] - target);
        }
        Ok(())
    }

    fn assemble_jacobian(&mut self, w: &DVectorView<T>) -> eyre::Result<()> {
        let Self {
            system,
            form,
            layout,
            bcs,
            bc_targets,
            nullspace,
            u0,
            t,
            dt,
            jacobian,
            arg_buf,
            jac_buf,
            source_buf,
            ..
        } = self;
        let (t, dt) = (*t, *dt);
        jacobian.fill(T::zero());
        for term in form.terms() {
            let coefficient = term.coefficient.evaluate(t, dt);
            if coefficient == T::zero() {
                continue;
            }
            let operator = system
                .operator(term.operator)
                .ok_or(ConfigError::UnknownOperator {
                    operator: term.operator.index(),
                })?;
            let (d_in, d_out) = (operator.input_dimension(), operator.output_dimension());
            let mut arg = arg_buf.rows_mut(0, d_in);
            arg.fill(T::zero());
            accumulate_expression(&mut arg, &term.trial, T::one(), w, u0, layout, *system, source_buf, t, dt)?;
            let time = term.time.evaluate(t, dt);
            operator.jacobian_into(jac_buf.view_mut((0, 0), (d_out, d_in)), time, arg_buf.rows(0, d_in))?;
            let row_range = layout.block_range(term.test.stage, term.test.field);
            for stage in 0..layout.num_stages() {
                for field in 0..layout.num_fields() {
                    let weight = term.trial.stage_weight(stage, field, t, dt);
                    if weight == T::zero() {
                        continue;
                    }
                    let factor = coefficient * weight;
                    let col_range = layout.block_range(stage, field);
                    let mut block = jacobian.view_mut((row_range.start, col_range.start), (d_out, d_in));
                    block.zip_apply(&jac_buf.view((0, 0), (d_out, d_in)), |entry, j| *entry += factor * j);
                }
            }
        }
        if let Some(nullspace) = nullspace {
            for v in nullspace.vectors() {
                jacobian.ger(T::one(), v, v, T::one());
            }
        }
        for (bc, targets) in izip!(bcs.iter(), bc_targets.iter()) {
            bc.for_each_constraint(layout, targets, |index, _| {
                jacobian.row_mut(index).fill(T::zero());
                jacobian[(index, index)] = T::one();
            });
        }
        Ok(())
    }
}

impl<'a, T: Real> StageSystem<T> for StageProblem<'a, T> {
    fn dimension(&self) -> usize {
        self.layout.total_dim()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, w: &DVectorView<T>) -> eyre::Result<()> {
        self.assemble_residual(f, w)
    }

    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        w: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), SolveError> {
        self.assemble_jacobian(w).map_err(SolveError::Assembly)?;
        let lu = self.jacobian.clone().lu();
        sol.copy_from(rhs);
        if !lu.solve_mut(sol) {
            return Err(SolveError::SingularJacobian);
        }
        if let Some(nullspace) = &self.nullspace {
            // Keep Newton updates orthogonal to the deflated directions
            for v in nullspace.vectors() {
                let component = sol.dot(v);
                sol.axpy(-component, v, T::one());
            }
        }
        Ok(())
    }
}

fn accumulate_expression<T: Real>(
    out: &mut DVectorViewMut<T>,
    expr: &FieldExpr<T>,
    scale: T,
    w: &DVectorView<T>,
    u0: &SystemState<T>,
    layout: &StageLayout,
    system: &SemidiscreteSystem<T>,
    source_buf: &mut DVector<T>,
    t: T,
    dt: T,
) -> eyre::Result<()> {
    match expr {
        FieldExpr::PreviousSolution { field } => {
            out.axpy(scale, &u0.field(*field), T::one());
        }
        FieldExpr::TimeDerivative { .. } => {
            unreachable!("time-derivative leaves are rejected at problem construction")
        }
        FieldExpr::Stage { stage, field } => {
            out.axpy(scale, &w.rows_range(layout.block_range(*stage, *field)), T::one());
        }
        FieldExpr::Source { source, time } => {
            let source_term = system.source(*source).ok_or(ConfigError::UnknownSource {
                source: source.index(),
            })?;
            let dim = source_term.dimension();
            source_term.eval_into(source_buf.rows_mut(0, dim), time.evaluate(t, dt));
            out.axpy(scale, &source_buf.rows(0, dim), T::one());
        }
        FieldExpr::Scaled(weight, inner) => {
            accumulate_expression(out, inner, scale * weight.evaluate(t, dt), w, u0, layout, system, source_buf, t, dt)?;
        }
        FieldExpr::Sum(terms) => {
            for term in terms {
                accumulate_expression(out, term, scale, w, u0, layout, system, source_buf, t, dt)?;
            }
        }
    }
    Ok(())
}
