use std::path::Path;

use image::{DynamicImage, ImageFormat, Luma, Rgb};

use crate::buffer::ImageBuffer;
use crate::error::{Result, SiderealError};

fn to_u16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Interleave the first `channels` planes of `buffer` row by row.
fn interleave<T>(buffer: &ImageBuffer, channels: usize, convert: fn(f32) -> T) -> Vec<T> {
    let (w, h) = (buffer.width(), buffer.height());
    let mut pixels = Vec::with_capacity(w * h * channels);
    for y in 0..h {
        for x in 0..w {
            for p in 0..channels {
                pixels.push(convert(buffer.get(p.min(buffer.planes() - 1), x, y)));
            }
        }
    }
    pixels
}

fn size_mismatch(buffer: &ImageBuffer) -> SiderealError {
    SiderealError::InvalidDimensions {
        width: buffer.width(),
        height: buffer.height(),
        planes: buffer.planes(),
    }
}

/// Save as 16-bit TIFF; gray for one plane, RGB otherwise.
pub fn save_tiff(buffer: &ImageBuffer, path: &Path) -> Result<()> {
    let (w, h) = (buffer.width() as u32, buffer.height() as u32);
    if buffer.planes() == 1 {
        let pixels = interleave(buffer, 1, to_u16);
        let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w, h, pixels)
            .ok_or_else(|| size_mismatch(buffer))?;
        img.save_with_format(path, ImageFormat::Tiff)?;
    } else {
        let pixels = interleave(buffer, 3, to_u16);
        let img = image::ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(w, h, pixels)
            .ok_or_else(|| size_mismatch(buffer))?;
        img.save_with_format(path, ImageFormat::Tiff)?;
    }
    Ok(())
}

/// Save as 8-bit PNG; gray for one plane, RGB otherwise.
pub fn save_png(buffer: &ImageBuffer, path: &Path) -> Result<()> {
    let (w, h) = (buffer.width() as u32, buffer.height() as u32);
    if buffer.planes() == 1 {
        let img = image::GrayImage::from_raw(w, h, interleave(buffer, 1, to_u8))
            .ok_or_else(|| size_mismatch(buffer))?;
        img.save_with_format(path, ImageFormat::Png)?;
    } else {
        let img = image::RgbImage::from_raw(w, h, interleave(buffer, 3, to_u8))
            .ok_or_else(|| size_mismatch(buffer))?;
        img.save_with_format(path, ImageFormat::Png)?;
    }
    Ok(())
}

/// Save, choosing the format from the file extension (TIFF by default).
pub fn save_image(buffer: &ImageBuffer, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => save_png(buffer, path),
        _ => save_tiff(buffer, path),
    }
}

/// Load an image file into a 1-plane (gray) or 3-plane (color) buffer with
/// samples in [0, 1].
pub fn load_image(path: &Path) -> Result<ImageBuffer> {
    let img = image::open(path)?;
    from_dynamic(&img)
}

pub fn from_dynamic(img: &DynamicImage) -> Result<ImageBuffer> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    if img.color().has_color() {
        let rgb = img.to_rgb32f();
        ImageBuffer::from_fn(3, w, h, |p, x, y| rgb.get_pixel(x as u32, y as u32).0[p])
    } else {
        let gray = img.to_luma32f();
        ImageBuffer::from_fn(1, w, h, |_, x, y| gray.get_pixel(x as u32, y as u32).0[0])
    }
}
