mod common;

use approx::assert_relative_eq;
use ndarray::{Array1, ArrayD, Axis, array};
use rand::{SeedableRng, rngs::StdRng};

use multitask_gp::{
    ExponentiatedQuadratic, GaussianProcessRegressionModel, Independent,
    MultiTaskGaussianProcessRegressionModel, mean_fn,
};

use common::{grid, grid_observations, repeat, uniform};

const NUM_TASKS: [usize; 3] = [1, 3, 5];

fn kernel() -> ExponentiatedQuadratic {
    ExponentiatedQuadratic::new(0.5, 2.).unwrap()
}

/// Compares a multi-task model over independent tasks against a single-task model whose batch
/// holds one member per task.
fn assert_matches_single_task(
    num_tasks: usize,
    observation_noise_variance: Option<f64>,
    task_means: Option<Array1<f64>>,
    seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let observations = grid_observations(num_tasks);
    let test_points = uniform(&[10, 2], -1., 1., &mut rng);
    let test_observations = uniform(&[10, num_tasks], -20., 20., &mut rng);

    let mut mt = MultiTaskGaussianProcessRegressionModel::builder(
        Independent::new(num_tasks, kernel()).unwrap(),
    )
    .observation_index_points(grid())
    .observations(observations.clone())
    .index_points(test_points.clone())
    .validate_args(true);

    let mut st = GaussianProcessRegressionModel::builder(kernel())
        .observation_index_points(grid())
        .observations(observations.t().to_owned())
        .index_points(test_points)
        .observation_noise_variance(observation_noise_variance.unwrap_or(0.))
        .validate_args(true);

    if let Some(variance) = observation_noise_variance {
        mt = mt.observation_noise_variance(variance);
    }
    if let Some(means) = task_means {
        let per_task = means.clone().insert_axis(Axis(1)).into_dyn();
        mt = mt.mean_fn(mean_fn::constant(means));
        st = st.mean_fn(move |_| per_task.clone());
    }

    let (mt, st) = (mt.build().unwrap(), st.build().unwrap());
    assert_eq!(st.batch_shape(), &[num_tasks]);

    let mt_lp = mt.log_prob(&test_observations).unwrap();
    let st_lp = st.log_prob(&test_observations.t()).unwrap();
    assert_eq!(mt_lp.ndim(), 0);
    assert_eq!(st_lp.shape(), &[num_tasks]);
    assert_relative_eq!(mt_lp.sum(), st_lp.sum(), max_relative = 1e-5);

    let mt_mean = mt.mean().unwrap();
    let st_mean = st.mean().unwrap();
    assert_eq!(mt_mean.shape(), &[10, num_tasks]);
    assert_relative_eq!(
        mt_mean.view(),
        st_mean.t(),
        epsilon = 1e-8,
        max_relative = 1e-5
    );
}

#[test]
fn log_prob_matches_single_task_noiseless() {
    for (i, num_tasks) in NUM_TASKS.into_iter().enumerate() {
        assert_matches_single_task(num_tasks, None, None, i as u64);
    }
}

#[test]
fn log_prob_matches_single_task() {
    for (i, num_tasks) in NUM_TASKS.into_iter().enumerate() {
        assert_matches_single_task(num_tasks, Some(1e-2), None, 10 + i as u64);
    }
}

#[test]
fn non_trivial_mean_matches_single_task() {
    for (i, num_tasks) in NUM_TASKS.into_iter().enumerate() {
        let means = Array1::linspace(1., 3., num_tasks);
        assert_matches_single_task(num_tasks, Some(1e-2), Some(means), 20 + i as u64);
    }
}

#[test]
fn binding_index_points() {
    for (i, num_tasks) in NUM_TASKS.into_iter().enumerate() {
        let mut rng = StdRng::seed_from_u64(30 + i as u64);
        let observations = grid_observations(num_tasks);

        let mt = MultiTaskGaussianProcessRegressionModel::builder(
            Independent::new(num_tasks, kernel()).unwrap(),
        )
        .observation_index_points(grid())
        .observations(observations.clone())
        .observation_noise_variance(1e-2)
        .validate_args(true)
        .build()
        .unwrap();

        let st = GaussianProcessRegressionModel::builder(kernel())
            .observation_index_points(grid())
            .observations(observations.t().to_owned())
            .observation_noise_variance(1e-2)
            .validate_args(true)
            .build()
            .unwrap();

        let test_points = uniform(&[10, 2], -1., 1., &mut rng);
        let test_observations = uniform(&[10, num_tasks], -1., 1., &mut rng);

        let mt_lp = mt.log_prob_at(&test_observations, &test_points).unwrap();
        let st_lp = st
            .log_prob_at(&test_observations.t(), &test_points)
            .unwrap();
        assert_relative_eq!(mt_lp.sum(), st_lp.sum(), max_relative = 1e-5);

        let mt_mean = mt.mean_at(&test_points).unwrap();
        let st_mean = st.mean_at(&test_points).unwrap();
        assert_relative_eq!(
            mt_mean.view(),
            st_mean.t(),
            epsilon = 1e-8,
            max_relative = 1e-5
        );
    }
}

#[test]
fn shapes() {
    for (i, num_tasks) in NUM_TASKS.into_iter().enumerate() {
        let mut rng = StdRng::seed_from_u64(40 + i as u64);

        let amplitude = array![1., 2.].into_shape_with_order((2, 1, 1, 1)).unwrap();
        let length_scale = array![1., 2., 3., 4.]
            .into_shape_with_order((1, 4, 1, 1))
            .unwrap();
        let noise = array![1e-5, 1e-6, 1e-5]
            .into_shape_with_order((1, 1, 3, 1))
            .unwrap();
        let kernel = ExponentiatedQuadratic::new(amplitude, length_scale).unwrap();
        let test_points = uniform(&[5, 2], -6., 6., &mut rng);

        let model = MultiTaskGaussianProcessRegressionModel::builder(
            Independent::new(num_tasks, kernel).unwrap(),
        )
        .observation_index_points(repeat(&grid(), 6))
        .observations(grid_observations(num_tasks))
        .index_points(test_points.clone())
        .observation_noise_variance(noise)
        .predictive_noise_variance(0.)
        .validate_args(true)
        .build()
        .unwrap();

        let batch_shape = vec![2, 4, 3, 6];
        let event_shape = vec![5, num_tasks];
        let sample_shape = [5, 3];

        assert_eq!(model.batch_shape(), batch_shape.as_slice());
        assert_eq!(model.event_shape().unwrap(), event_shape);
        assert_eq!(model.batch_shape_tensor(&test_points).unwrap(), batch_shape);
        assert_eq!(model.event_shape_tensor(&test_points).unwrap(), event_shape);

        let samples = model.sample(&sample_shape, &mut rng).unwrap();
        let full: Vec<usize> = [&sample_shape[..], &batch_shape[..], &event_shape[..]].concat();
        assert_eq!(samples.shape(), full.as_slice());

        let lp = model.log_prob(&samples).unwrap();
        let lp_shape: Vec<usize> = [&sample_shape[..], &batch_shape[..]].concat();
        assert_eq!(lp.shape(), lp_shape.as_slice());
        assert!(lp.iter().all(|v| v.is_finite()));

        let mean_shape: Vec<usize> = [&batch_shape[..], &event_shape[..]].concat();
        assert_eq!(model.mean().unwrap().shape(), mean_shape.as_slice());
    }
}

#[test]
fn mean_shape_broadcasts() {
    let mut rng = StdRng::seed_from_u64(50);
    let means = uniform(&[3], 0., 1., &mut rng);

    let model = MultiTaskGaussianProcessRegressionModel::builder(
        Independent::new(3, ExponentiatedQuadratic::default()).unwrap(),
    )
    .observation_index_points(uniform(&[10, 5], 0., 1., &mut rng))
    .observations(uniform(&[10, 3], 0., 1., &mut rng))
    .index_points(uniform(&[4, 5], 0., 1., &mut rng))
    .mean_fn(move |_| means.clone())
    .observation_noise_variance(1e-2)
    .build()
    .unwrap();

    let index_points = model.index_points().unwrap().to_owned();
    assert_eq!(model.event_shape().unwrap(), vec![4, 3]);
    assert_eq!(model.event_shape_tensor(&index_points).unwrap(), vec![4, 3]);
    let mean: ArrayD<f64> = model.mean().unwrap();
    assert_eq!(mean.shape(), &[4, 3]);
}
