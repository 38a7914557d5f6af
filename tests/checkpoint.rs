mod common;

use common::{bbox_params, bits, config, ScriptedSolver};
use frcnn_train::{BBoxNormalizationStats, CheckpointManager, Solver, TrainConfig, TrainError};

fn stats(means: Vec<f64>, stds: Vec<f64>) -> BBoxNormalizationStats {
    BBoxNormalizationStats { means, stds }
}

#[test]
fn written_weights_are_denormalized_and_live_weights_restored() {
    let dir = tempfile::tempdir().unwrap();
    let original = bbox_params(8, 3);
    let mut solver = ScriptedSolver::new(|_| 0.01).with_bbox_pred(original.clone());
    let s = BBoxNormalizationStats::precomputed(2, [0.0, 0.0, 0.0, 0.0], [0.1, 0.1, 0.2, 0.2]);
    let mut manager = CheckpointManager::new(&config(dir.path()), Some(s));

    let checkpoint = manager.checkpoint(&mut solver, 300).unwrap();
    assert_eq!(checkpoint.name, "scripted_iter_300");
    assert!(checkpoint.model_path.exists());
    assert!(checkpoint.solver_state_path.exists());

    let saved = solver.saved_models.borrow()[0].1.clone().unwrap();
    assert_eq!(saved.weight.data[0][1], original.weight.data[0][1] * 0.1);
    assert_eq!(saved.weight.data[3][2], original.weight.data[3][2] * 0.2);
    assert_eq!(saved.bias[6], original.bias[6] * 0.2);

    assert_eq!(bits(&solver.bbox_pred().unwrap()), bits(&original));
    assert_eq!(manager.last_checkpoint_iteration(), Some(300));
}

#[test]
fn restoration_is_bit_exact_for_awkward_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let awkward = [
        (vec![0.0; 4], vec![0.0; 4]),
        (vec![1e300, -1e300, 3.3, -0.0], vec![1e-300, 7.77, f64::MAX, -2.5]),
        (vec![f64::NAN, 0.5, f64::INFINITY, 1.0], vec![0.3, f64::NAN, 1.0 / 3.0, f64::NEG_INFINITY]),
    ];
    for (i, (means, stds)) in awkward.into_iter().enumerate() {
        let original = bbox_params(4, 5);
        let mut solver = ScriptedSolver::new(|_| 0.01).with_bbox_pred(original.clone());
        let mut manager = CheckpointManager::new(&config(dir.path()), Some(stats(means, stds)));
        manager.checkpoint(&mut solver, 10 + i as u64).unwrap();
        assert_eq!(bits(&solver.bbox_pred().unwrap()), bits(&original));
    }
}

#[test]
fn parameters_are_restored_when_the_write_fails() {
    let dir = tempfile::tempdir().unwrap();
    let original = bbox_params(4, 2);
    let mut solver = ScriptedSolver::new(|_| 0.01).with_bbox_pred(original.clone());
    solver.fail_model_save = true;
    let s = stats(vec![0.5; 4], vec![3.0; 4]);
    let mut manager = CheckpointManager::new(&config(dir.path()), Some(s));

    let err = manager.checkpoint(&mut solver, 100).unwrap_err();
    assert!(matches!(err, TrainError::Io(_)));
    assert_eq!(bits(&solver.bbox_pred().unwrap()), bits(&original));
    assert_eq!(manager.last_checkpoint_iteration(), None);
}

#[test]
fn transform_is_skipped_without_regression_layer() {
    let dir = tempfile::tempdir().unwrap();
    let mut solver = ScriptedSolver::new(|_| 0.01);
    let s = stats(vec![0.0; 4], vec![0.1; 4]);
    let mut manager = CheckpointManager::new(&config(dir.path()), Some(s));

    manager.checkpoint(&mut solver, 50).unwrap();
    assert_eq!(solver.saved_models.borrow()[0].1, None);
}

#[test]
fn transform_is_skipped_when_targets_are_not_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let original = bbox_params(4, 2);
    let mut solver = ScriptedSolver::new(|_| 0.01).with_bbox_pred(original.clone());
    let cfg = TrainConfig { bbox_normalize_targets: false, ..config(dir.path()) };
    let mut manager = CheckpointManager::new(&cfg, Some(stats(vec![1.0; 4], vec![9.0; 4])));

    manager.checkpoint(&mut solver, 50).unwrap();
    assert_eq!(solver.saved_models.borrow()[0].1, Some(original));
}

#[test]
fn mismatched_statistics_fail_before_touching_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let original = bbox_params(8, 2);
    let mut solver = ScriptedSolver::new(|_| 0.01).with_bbox_pred(original.clone());
    let mut manager = CheckpointManager::new(&config(dir.path()), Some(stats(vec![0.0; 4], vec![1.0; 4])));

    assert!(matches!(
        manager.checkpoint(&mut solver, 50),
        Err(TrainError::ShapeMismatch { .. })
    ));
    assert_eq!(solver.bbox_pred(), Some(original));
    assert!(solver.saved_models.borrow().is_empty());
}

#[test]
fn infix_and_snapshot_dir_shape_the_paths() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = TrainConfig {
        snapshot_infix: "stage1".into(),
        snapshot_dir: dir.path().join("nested").join("snapshots"),
        ..config(dir.path())
    };
    let mut solver = ScriptedSolver::new(|_| 0.01);
    let mut manager = CheckpointManager::new(&cfg, None);

    let cp = manager.checkpoint(&mut solver, 40).unwrap();
    assert_eq!(cp.name, "scripted_stage1_iter_40");
    assert_eq!(cp.model_path, dir.path().join("nested/snapshots/scripted_stage1_iter_40.model"));
    assert_eq!(
        cp.solver_state_path,
        dir.path().join("nested/snapshots/scripted_stage1_iter_40.solverstate")
    );
}
