use matrixcompare::assert_scalar_eq;
use nalgebra::dvector;

use skoll::nullspace::{Nullspace, StageNullspace};
use skoll::space::{FunctionSpace, StageLayout};
use skoll::ConfigError;

#[test]
fn constant_nullspace_is_a_vector_of_ones() {
    let space = FunctionSpace::from_field_dims(vec![2, 3]);
    let nullspace = Nullspace::<f64>::constants(1, &space);
    let components = nullspace.components();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].0, 1);
    assert_eq!(&components[0].1, &dvector![1.0, 1.0, 1.0]);
    assert_eq!(nullspace.validate(&space), Ok(()));
}

#[test]
fn nullspace_fields_must_be_sorted() {
    let space = FunctionSpace::from_field_dims(vec![1, 1]);
    let nullspace = Nullspace::new(vec![(1, dvector![1.0]), (0, dvector![1.0])]);
    assert_eq!(nullspace.validate(&space), Err(ConfigError::UnsortedNullspaceFields));
}

#[test]
fn nullspace_components_must_match_the_field_dimension() {
    let space = FunctionSpace::from_field_dims(vec![3]);
    let nullspace = Nullspace::new(vec![(0, dvector![1.0, 1.0])]);
    assert_eq!(
        nullspace.validate(&space),
        Err(ConfigError::NullspaceDimensionMismatch {
            field: 0,
            expected: 3,
            found: 2,
        })
    );
}

#[test]
fn nullspace_components_must_be_nonzero() {
    let space = FunctionSpace::scalar_field(2);
    let nullspace = Nullspace::new(vec![(0, dvector![0.0, 0.0])]);
    assert_eq!(nullspace.validate(&space), Err(ConfigError::ZeroNullspaceVector { field: 0 }));
}

#[test]
fn nullspace_fields_must_exist() {
    let space = FunctionSpace::scalar_field(1);
    let nullspace = Nullspace::new(vec![(2, dvector![1.0])]);
    assert_eq!(
        nullspace.validate(&space),
        Err(ConfigError::FieldIndexOutOfRange {
            field: 2,
            num_fields: 1,
        })
    );
}

#[test]
fn replication_embeds_a_normalized_copy_per_stage() {
    let space = FunctionSpace::scalar_field(2);
    let layout = StageLayout::new(2, &space);
    let nullspace = Nullspace::<f64>::constants(0, &space);
    let replicated = StageNullspace::replicate(&nullspace, &layout);

    assert_eq!(replicated.num_vectors(), 2);
    let vectors = replicated.vectors();
    let expected = 0.5_f64.sqrt();
    for (stage, vector) in vectors.iter().enumerate() {
        assert_eq!(vector.len(), layout.total_dim());
        for (i, &entry) in vector.iter().enumerate() {
            let in_stage_block = layout.stage_range(stage).contains(&i);
            let target = if in_stage_block { expected } else { 0.0 };
            assert_scalar_eq!(entry, target, comp = abs, tol = 1e-15);
        }
    }

    // Distinct stages occupy disjoint blocks, so the replicated basis is orthonormal
    assert_scalar_eq!(vectors[0].dot(&vectors[1]), 0.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(vectors[0].norm(), 1.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(vectors[1].norm(), 1.0, comp = abs, tol = 1e-15);
}
