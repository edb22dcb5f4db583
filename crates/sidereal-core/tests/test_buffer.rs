use approx::assert_abs_diff_eq;

use sidereal_core::buffer::{ImageBuffer, OperatorStrategy};
use sidereal_core::geometry::IntegerPoint;
use sidereal_core::SiderealError;

mod common;

#[test]
fn test_add_then_subtract_restores() {
    let a = common::noise(1, 37, 21);
    let b = common::noise(2, 37, 21);
    let mut c = a.clone();
    c.add(&b);
    c.subtract(&b);
    for y in 0..21 {
        for x in 0..37 {
            assert_abs_diff_eq!(c.get(0, x, y), a.get(0, x, y), epsilon = 1e-6);
        }
    }
}

#[test]
fn test_parallel_strategy_matches_standard() {
    let a = common::noise(3, 300, 260);
    let b = common::noise(4, 300, 260);

    let mut seq = a.clone();
    seq.multiply(&b);
    seq.subtract_bias_and_scale(0.1, 2.0);

    let mut par = a.clone();
    par.set_strategy(OperatorStrategy::Parallelized);
    par.multiply(&b);
    par.subtract_bias_and_scale(0.1, 2.0);

    assert_eq!(seq.to_array(), par.to_array());
}

#[test]
fn test_mono_term_multiplies_every_plane() {
    let mut color = ImageBuffer::filled(3, 4, 4, 2.0).unwrap();
    let gain = ImageBuffer::filled(1, 4, 4, 1.5).unwrap();
    color.multiply(&gain);
    for p in 0..3 {
        assert_abs_diff_eq!(color.get(p, 3, 3), 3.0);
    }
}

#[test]
fn test_normalize_levels_each_plane() {
    let mut color =
        ImageBuffer::from_fn(3, 8, 8, |p, x, _| (p + 1) as f32 * x as f32).unwrap();
    color.normalize(0.0, false);
    for p in 0..3 {
        let (lo, hi) = color.plane_levels(p);
        assert_abs_diff_eq!(lo, 0.0);
        assert_abs_diff_eq!(hi, 1.0, epsilon = 1e-6);
    }
}

#[test]
fn test_normalize_mono_keeps_plane_ratios() {
    let mut color =
        ImageBuffer::from_fn(3, 8, 8, |p, x, _| (p + 1) as f32 * x as f32).unwrap();
    color.normalize(0.0, true);
    assert_abs_diff_eq!(color.levels().1, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(color.plane_levels(0).1, 1.0 / 3.0, epsilon = 1e-6);
}

#[test]
fn test_normalize_with_factor_scales() {
    let mut b = ImageBuffer::filled(1, 4, 4, 0.5).unwrap();
    b.normalize(3.0, false);
    assert_eq!(b.levels(), (1.5, 1.5));
}

#[test]
fn test_calibrate_with_origin() {
    let mut image = ImageBuffer::filled(1, 4, 4, 10.0).unwrap();
    let dark = ImageBuffer::filled(1, 8, 8, 2.0).unwrap();
    let flat = ImageBuffer::filled(1, 8, 8, 4.0).unwrap();
    image.calibrate(Some(&dark), Some(&flat), IntegerPoint::new(2, 3));
    assert_abs_diff_eq!(image.get(0, 0, 0), 2.0);
    assert_abs_diff_eq!(image.get(0, 3, 3), 2.0);
}

#[test]
fn test_from_vec_checks_length() {
    let result = ImageBuffer::from_vec(vec![0.0; 10], 1, 4, 4, 3);
    assert!(matches!(result, Err(SiderealError::IncompatibleBuffers(_))));
}

#[test]
fn test_from_vec_with_wide_lines() {
    let data: Vec<f32> = (0..18).map(|v| v as f32).collect();
    let b = ImageBuffer::from_vec(data, 1, 5, 6, 3).unwrap();
    assert_eq!(b.width(), 5);
    assert_eq!(b.get(0, 0, 1), 6.0);
    assert_eq!(b.get(0, 4, 2), 16.0);
}

#[test]
fn test_too_many_planes_rejected() {
    assert!(matches!(
        ImageBuffer::new(4, 2, 2),
        Err(SiderealError::InvalidDimensions { planes: 4, .. })
    ));
}

#[test]
fn test_convert_to_planar_roundtrip() {
    let b = common::noise(5, 6, 5);
    let mut plane = vec![0.0f32; 8 * 5];
    b.convert_to_planar(&mut [&mut plane[..]], 8);
    let back = ImageBuffer::from_planar(&[plane.as_slice()], 6, 5, 8).unwrap();
    assert_eq!(back.to_array(), b.to_array());
}

#[test]
fn test_memory_size_counts_padding() {
    let narrow = ImageBuffer::new(3, 5, 2).unwrap();
    let padded = ImageBuffer::new(3, 8, 2).unwrap();
    assert_eq!(narrow.memory_size(), padded.memory_size());
    assert!(narrow.memory_size() >= 3 * 2 * 8 * std::mem::size_of::<f32>());
}
