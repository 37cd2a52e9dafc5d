// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for the detector.
//!
//! Every image is zero-padded to a centred square, resized to the network
//! input with nearest-neighbour sampling and written as a planar RGB tensor
//! in `[0, 1]`.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use fast_image_resize::{PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::{DynamicImage, RgbImage};
use ndarray::{Array3, ArrayViewMut3, Axis};

use crate::error::{DetectError, Result};

/// Reciprocal of 255 for normalization.
const INV_255: f32 = 1.0 / 255.0;

/// Padding that centres an image in a square, as `(left, top, right, bottom)`.
///
/// The shorter side receives `diff / 2` before and the remainder after, so an
/// odd difference puts the extra row or column at the bottom or right.
#[must_use]
pub const fn square_padding(width: u32, height: u32) -> (u32, u32, u32, u32) {
    let diff = width.abs_diff(height);
    let pad1 = diff / 2;
    let pad2 = diff - pad1;
    if height <= width {
        (0, pad1, 0, pad2)
    } else {
        (pad1, 0, pad2, 0)
    }
}

/// Zero-pad an image to a square.
#[must_use]
pub fn pad_to_square(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let (left, top, _, _) = square_padding(width, height);
    let side = width.max(height);
    if side == width && side == height {
        return image.clone();
    }

    let mut square = RgbImage::new(side, side);
    image::imageops::replace(&mut square, image, i64::from(left), i64::from(top));
    square
}

/// Resize an RGB image to `size × size` with nearest-neighbour sampling.
///
/// # Errors
///
/// Returns [`DetectError::ImageError`] if the buffer is empty or the resizer fails.
pub fn resize_nearest(image: &RgbImage, size: u32) -> Result<RgbImage> {
    let (src_w, src_h) = image.dimensions();
    if src_w == size && src_h == size {
        return Ok(image.clone());
    }

    let src_image = Image::from_vec_u8(src_w, src_h, image.as_raw().clone(), PixelType::U8x3)
        .map_err(|e| DetectError::ImageError(format!("Failed to wrap source image: {e}")))?;
    let mut dst_image = Image::new(size, size, PixelType::U8x3);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Nearest);
    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| DetectError::ImageError(format!("Failed to resize image: {e}")))?;

    RgbImage::from_raw(size, size, dst_image.into_vec())
        .ok_or_else(|| DetectError::ImageError("Resized buffer has wrong length".to_string()))
}

/// Write an RGB image into a `(3, H, W)` view, normalised to `[0, 1]`.
///
/// # Errors
///
/// Returns [`DetectError::ImageError`] if the view shape does not match the image.
pub fn write_chw(image: &RgbImage, mut out: ArrayViewMut3<'_, f32>) -> Result<()> {
    let (width, height) = image.dimensions();
    if out.shape() != [3, height as usize, width as usize] {
        return Err(DetectError::ImageError(format!(
            "Tensor shape {:?} does not match image {width}x{height}",
            out.shape()
        )));
    }

    for (i, chunk) in image.as_raw().chunks_exact(3).enumerate() {
        let y = i / width as usize;
        let x = i % width as usize;
        for (c, &value) in chunk.iter().enumerate() {
            out[[c, y, x]] = f32::from(value) * INV_255;
        }
    }
    Ok(())
}

/// Preprocess one decoded image into a `(3, S, S)` tensor.
///
/// # Errors
///
/// Returns [`DetectError::ImageError`] if resizing fails.
pub fn preprocess_image(image: &DynamicImage, img_size: usize) -> Result<Array3<f32>> {
    let size = u32::try_from(img_size)
        .map_err(|_| DetectError::ImageError(format!("img_size {img_size} is too large")))?;
    let square = pad_to_square(&image.to_rgb8());
    let resized = resize_nearest(&square, size)?;

    let mut tensor = Array3::zeros((3, img_size, img_size));
    write_chw(&resized, tensor.view_mut())?;
    Ok(tensor)
}

/// Stack per-image `(3, S, S)` tensors into one `(N, 3, S, S)` batch.
///
/// # Errors
///
/// Returns [`DetectError::ImageError`] if the list is empty or shapes differ.
pub fn stack_batch(images: &[Array3<f32>]) -> Result<ndarray::Array4<f32>> {
    let views: Vec<_> = images.iter().map(Array3::view).collect();
    ndarray::stack(Axis(0), &views)
        .map_err(|e| DetectError::ImageError(format!("Failed to stack batch: {e}")))
}

/// Load an image, decoding JPEGs through `jpeg-decoder` first.
///
/// # Errors
///
/// Returns [`DetectError::ImageError`] if neither decoder can read the file.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));

    if is_jpeg {
        if let Some(image) = decode_jpeg(path) {
            return Ok(image);
        }
    }

    image::open(path).map_err(|e| {
        DetectError::ImageError(format!("Failed to load image {}: {e}", path.display()))
    })
}

fn decode_jpeg(path: &Path) -> Option<DynamicImage> {
    let file = File::open(path).ok()?;
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
    let pixels = decoder.decode().ok()?;
    let info = decoder.info()?;
    let (width, height) = (u32::from(info.width), u32::from(info.height));
    match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => {
            image::ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        jpeg_decoder::PixelFormat::L8 => {
            image::ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        _ => None,
    }
}
