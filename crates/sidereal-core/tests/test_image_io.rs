use approx::assert_abs_diff_eq;

use sidereal_core::buffer::ImageBuffer;
use sidereal_core::io::image_io::{load_image, save_image, save_png, save_tiff};

mod common;

#[test]
fn test_save_load_roundtrip_tiff() {
    let buffer = ImageBuffer::from_fn(1, 5, 4, |_, x, y| (x + y * 5) as f32 / 19.0).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.tiff");

    save_tiff(&buffer, &path).unwrap();
    let loaded = load_image(&path).unwrap();

    assert_eq!((loaded.width(), loaded.height(), loaded.planes()), (5, 4, 1));
    for y in 0..4 {
        for x in 0..5 {
            assert_abs_diff_eq!(loaded.get(0, x, y), buffer.get(0, x, y), epsilon = 1e-4);
        }
    }
}

#[test]
fn test_color_roundtrip_png() {
    let buffer = ImageBuffer::from_fn(3, 6, 6, |p, x, _| (p as f32 * 0.25) + x as f32 * 0.05)
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("color.png");

    save_png(&buffer, &path).unwrap();
    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded.planes(), 3);
    assert_abs_diff_eq!(loaded.get(2, 3, 1), buffer.get(2, 3, 1), epsilon = 1.0 / 255.0);
}

#[test]
fn test_out_of_range_samples_are_clamped() {
    let buffer = ImageBuffer::from_fn(1, 2, 1, |_, x, _| if x == 0 { -1.0 } else { 2.0 }).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clamped.tif");

    save_image(&buffer, &path).unwrap();
    let loaded = load_image(&path).unwrap();
    assert_abs_diff_eq!(loaded.get(0, 0, 0), 0.0);
    assert_abs_diff_eq!(loaded.get(0, 1, 0), 1.0);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_image(&dir.path().join("absent.png")).is_err());
}

#[test]
fn test_noise_survives_16_bit() {
    let buffer = common::noise(3, 16, 16);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noise.tiff");
    save_image(&buffer, &path).unwrap();
    let loaded = load_image(&path).unwrap();
    assert_abs_diff_eq!(loaded.levels().1, buffer.levels().1, epsilon = 1e-4);
}
