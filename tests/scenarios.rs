use approx::assert_abs_diff_eq;
use nalgebra::Point2;
use raycar::ray::RayError;
use raycar::regression::{train_with, TrainerOptions, TrainingError};
use raycar::{cast_ray, predict, sense, train, Pose, Reading, Sample, SensorOffsets, SteeringLabel, Track};

fn samples(pairs: &[(f64, SteeringLabel, usize)]) -> Vec<Sample> {
    pairs
        .iter()
        .flat_map(|&(value, label, n)| (0..n).map(move |_| Sample::new(Reading::new(vec![value]), label)))
        .collect()
}

#[test]
fn test_center_of_bordered_track_reads_fifty() {
    let track = Track::bordered(100, 100).unwrap();
    let pose = Pose::new(50.0, 50.0, 0.0);
    let offsets = SensorOffsets::new(vec![0.0]).unwrap();

    let reading = sense(&track, &pose, &offsets).unwrap();
    assert_eq!(reading.len(), 1);
    assert_abs_diff_eq!(reading.values()[0], 50.0, epsilon = 1.0);
}

#[test]
fn test_rays_match_straight_line_distance_to_border() {
    let track = Track::bordered(120, 80).unwrap();
    let origin = Point2::new(40.0, 30.0);
    for step in 0..16 {
        let angle = f64::from(step) * std::f64::consts::TAU / 16.0;
        let (dx, dy) = (angle.cos(), angle.sin());
        // Distance to the first border pixel (x = 0 or 119, y = 0 or 79) along the ray.
        let tx = if dx > 1e-9 {
            (119.0 - origin.x) / dx
        } else if dx < -1e-9 {
            (origin.x - 1.0) / -dx
        } else {
            f64::INFINITY
        };
        let ty = if dy > 1e-9 {
            (79.0 - origin.y) / dy
        } else if dy < -1e-9 {
            (origin.y - 1.0) / -dy
        } else {
            f64::INFINITY
        };
        let expected = tx.min(ty);
        let d = cast_ray(&track, origin, angle).unwrap();
        assert!((d - expected).abs() <= 1.5, "angle {angle}: got {d}, expected {expected}");
    }
}

#[test]
fn test_pose_outside_map_reports_no_boundary() {
    let track = Track::bordered(100, 100).unwrap();
    let err = cast_ray(&track, Point2::new(-1.0, 50.0), 0.0).unwrap_err();
    assert_eq!(err, RayError::NoBoundary { angle: 0.0, steps: 0 });
}

#[test]
fn test_end_to_end_single_sensor_with_intercept() {
    let data = samples(&[(1.0, SteeringLabel::Left, 3), (0.5, SteeringLabel::None, 3)]);
    let models = train_with(&data, TrainerOptions { intercept: true }).unwrap();

    assert_eq!(predict(&Reading::new(vec![1.0]), &models).unwrap(), SteeringLabel::Left);
    assert_eq!(predict(&Reading::new(vec![0.5]), &models).unwrap(), SteeringLabel::None);
}

#[test]
fn test_end_to_end_single_sensor_without_intercept() {
    // Through-origin fit: left = 0.8 x, none = 0.4 x, right = 0.
    let data = samples(&[(1.0, SteeringLabel::Left, 3), (0.5, SteeringLabel::None, 3)]);
    let models = train(&data).unwrap();

    assert_eq!(predict(&Reading::new(vec![1.0]), &models).unwrap(), SteeringLabel::Left);
    // 0.5 scores left 0.4 (error 0.6) and none 0.2 (error 0.8).
    assert_eq!(predict(&Reading::new(vec![0.5]), &models).unwrap(), SteeringLabel::Left);
    // Far from the wall only none remains plausible.
    assert_eq!(predict(&Reading::new(vec![2.5]), &models).unwrap(), SteeringLabel::None);
}

#[test]
fn test_training_twice_is_identical() {
    let data = samples(&[
        (0.9, SteeringLabel::Left, 2),
        (0.3, SteeringLabel::Right, 4),
        (0.6, SteeringLabel::None, 3),
    ]);
    assert_eq!(train(&data).unwrap(), train(&data).unwrap());
}

#[test]
fn test_insufficient_data_is_an_error() {
    assert_eq!(train(&[]), Err(TrainingError::Empty));
    let one = vec![Sample::new(Reading::new(vec![0.1, 0.2]), SteeringLabel::Left)];
    assert!(matches!(train(&one), Err(TrainingError::Insufficient { .. })));
}
