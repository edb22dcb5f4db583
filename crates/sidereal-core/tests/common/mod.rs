#![allow(dead_code)]

use std::sync::Arc;

use sidereal_core::align::AlignmentResult;
use sidereal_core::buffer::ImageBuffer;
use sidereal_core::item::{ImageItem, ImageList, ProcessableItem};

/// Gaussian blobs scattered over the frame, shifted by `(dx, dy)`.
///
/// `textured(w, h, dx, dy)` at `(x, y)` equals `textured(w, h, 0, 0)` at
/// `(x - dx, y - dy)`.
pub fn textured(width: usize, height: usize, dx: f64, dy: f64) -> ImageBuffer {
    const BLOBS: [(f64, f64, f64, f64); 8] = [
        (0.36, 0.40, 1.5, 1.0),
        (0.55, 0.42, 1.2, 0.7),
        (0.45, 0.58, 2.0, 0.9),
        (0.62, 0.63, 1.6, 0.6),
        (0.40, 0.50, 1.0, 0.8),
        (0.60, 0.36, 1.8, 0.5),
        (0.38, 0.64, 1.3, 0.4),
        (0.66, 0.50, 1.5, 0.75),
    ];
    ImageBuffer::from_fn(1, width, height, |_, x, y| {
        let (fx, fy) = (x as f64 - dx, y as f64 - dy);
        let v: f64 = BLOBS
            .iter()
            .map(|&(cx, cy, sigma, amp)| {
                let ddx = fx - cx * width as f64;
                let ddy = fy - cy * height as f64;
                amp * (-(ddx * ddx + ddy * ddy) / (2.0 * sigma * sigma)).exp()
            })
            .sum();
        v as f32
    })
    .unwrap()
}

/// Deterministic white noise in [0, 1).
pub fn noise(seed: u64, width: usize, height: usize) -> ImageBuffer {
    ImageBuffer::from_fn(1, width, height, |_, x, y| {
        let mut h = seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add((y * width + x) as u64);
        h ^= h >> 33;
        h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
        h ^= h >> 33;
        h = h.wrapping_mul(0xC4CE_B9FE_1A85_EC53);
        h ^= h >> 33;
        (h >> 40) as f32 / (1u64 << 24) as f32
    })
    .unwrap()
}

/// One constant single-plane frame per value.
pub fn constant_frames(values: &[f32], width: usize, height: usize) -> Vec<ImageBuffer> {
    values
        .iter()
        .map(|&v| ImageBuffer::filled(1, width, height, v).unwrap())
        .collect()
}

/// List of items already registered with an identity transform.
pub fn aligned_list(images: Vec<ImageBuffer>) -> ImageList {
    let list = ImageList::from_images("frame", images);
    for item in list.items() {
        item.set_alignment(Some(AlignmentResult::identity(1)));
    }
    list
}

pub fn item(name: &str, image: ImageBuffer) -> Arc<dyn ProcessableItem> {
    Arc::new(ImageItem::new(name, image))
}
