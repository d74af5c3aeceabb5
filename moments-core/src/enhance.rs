//! Recognition enhancement filter.
//!
//! A fixed, non-adaptive pipeline that raises the contrast of stamp images and
//! camera frames before matching:
//!
//! 1. Grayscale conversion (ITU-R BT.601 luma weights)
//! 2. Contrast stretch around mid-gray
//! 3. Sobel gradient magnitude (edge map, border pixels stay black)
//! 4. Weighted blend of the contrasted image and the edge map
//!
//! The same filter produces the stored "processed" variant of every stamp and
//! is applied to frames before detection, so both sides of a comparison went
//! through identical preprocessing.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{MomentsError, Result};

/// Filter constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceParams {
    /// Contrast amount fed into the stretch factor formula
    pub contrast: f32,
    /// Weight of the contrasted grayscale image in the final blend
    pub original_weight: f32,
    /// Weight of the edge map in the final blend
    pub edge_weight: f32,
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            contrast: 1.8,
            original_weight: 0.7,
            edge_weight: 0.3,
        }
    }
}

impl EnhanceParams {
    /// Contrast stretch factor: `259(c + 255) / (255(259 - c))`.
    pub fn contrast_factor(&self) -> f32 {
        (259.0 * (self.contrast + 255.0)) / (255.0 * (259.0 - self.contrast))
    }
}

fn clamp_u8(value: f32) -> u8 {
    value.clamp(0.0, 255.0).round() as u8
}

/// Grayscale + contrast stretch, one byte per pixel.
fn contrasted_luma(rgba: &[u8], params: &EnhanceParams) -> Vec<u8> {
    let factor = params.contrast_factor();
    rgba.chunks_exact(4)
        .map(|px| {
            let gray = 0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
            clamp_u8(factor * (gray - 128.0) + 128.0)
        })
        .collect()
}

/// Sobel gradient magnitude clamped to 255. The one-pixel border is left at 0.
fn sobel_magnitude(luma: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut edges = vec![0u8; luma.len()];
    if width < 3 || height < 3 {
        return edges;
    }

    let at = |x: usize, y: usize| i32::from(luma[y * width + x]);

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = -at(x - 1, y - 1) - 2 * at(x - 1, y) - at(x - 1, y + 1)
                + at(x + 1, y - 1)
                + 2 * at(x + 1, y)
                + at(x + 1, y + 1);
            let gy = -at(x - 1, y - 1) - 2 * at(x, y - 1) - at(x + 1, y - 1)
                + at(x - 1, y + 1)
                + 2 * at(x, y + 1)
                + at(x + 1, y + 1);

            let magnitude = ((gx * gx + gy * gy) as f32).sqrt();
            edges[y * width + x] = clamp_u8(magnitude);
        }
    }

    edges
}

/// Run the filter over a raw RGBA buffer (canvas `ImageData` layout).
///
/// The alpha channel is preserved.
pub fn enhance_rgba_in_place(
    rgba: &mut [u8],
    width: u32,
    height: u32,
    params: &EnhanceParams,
) -> Result<()> {
    let (w, h) = (width as usize, height as usize);
    if rgba.len() != w * h * 4 {
        return Err(MomentsError::ImageError(format!(
            "RGBA buffer of {} bytes does not match {}x{} pixels",
            rgba.len(),
            width,
            height
        )));
    }

    let luma = contrasted_luma(rgba, params);
    let edges = sobel_magnitude(&luma, w, h);

    for ((px, &gray), &edge) in rgba.chunks_exact_mut(4).zip(&luma).zip(&edges) {
        let blended = clamp_u8(
            f32::from(gray) * params.original_weight + f32::from(edge) * params.edge_weight,
        );
        px[0] = blended;
        px[1] = blended;
        px[2] = blended;
    }

    Ok(())
}

/// Enhance a decoded image with the default filter constants.
pub fn enhance_image(image: &DynamicImage) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    // Dimensions come from the buffer itself, so the length check cannot fail.
    if let Err(e) = enhance_rgba_in_place(&mut rgba, width, height, &EnhanceParams::default()) {
        tracing::warn!(error = %e, "Enhancement skipped");
    }
    rgba
}

/// Decode an encoded image (JPEG, PNG, GIF or WebP), enhance it and return
/// the result encoded as PNG.
pub fn enhance_bytes(encoded: &[u8]) -> Result<Vec<u8>> {
    let image = image::load_from_memory(encoded)
        .map_err(|e| MomentsError::ImageError(format!("Failed to decode image: {}", e)))?;

    let enhanced = enhance_image(&image);

    let mut out = Cursor::new(Vec::new());
    enhanced
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| MomentsError::ImageError(format!("Failed to encode PNG: {}", e)))?;

    tracing::debug!(
        width = enhanced.width(),
        height = enhanced.height(),
        bytes = out.get_ref().len(),
        "Enhanced image"
    );

    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn uniform(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    #[test]
    fn test_contrast_factor() {
        let factor = EnhanceParams::default().contrast_factor();
        assert!((factor - 1.0141).abs() < 1e-3, "factor was {}", factor);
    }

    #[test]
    fn test_uniform_gray_only_scaled_by_blend_weight() {
        let mut img = uniform(8, 8, 128);
        enhance_rgba_in_place(&mut img, 8, 8, &EnhanceParams::default()).unwrap();

        // 128 * 0.7 = 89.6, no edges anywhere
        for px in img.pixels() {
            assert_eq!(px.0, [90, 90, 90, 255]);
        }
    }

    #[test]
    fn test_vertical_edge_is_highlighted() {
        let mut img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([200, 200, 200, 255])
            }
        });
        enhance_rgba_in_place(&mut img, 10, 10, &EnhanceParams::default()).unwrap();

        // Far from the boundary on the black side nothing changes
        assert_eq!(img.get_pixel(1, 5).0[0], 0);
        // Next to the boundary the edge map lights up the black side
        assert!(img.get_pixel(4, 5).0[0] > 60);
        // Light side: contrast lifts 200 to 201, then 201 * 0.7 + 255 * 0.3
        assert_eq!(img.get_pixel(5, 5).0[0], 217);
        // Far light side is the blended original only
        assert_eq!(img.get_pixel(8, 5).0[0], 141);
    }

    #[test]
    fn test_border_pixels_have_no_edge_contribution() {
        let mut img = RgbaImage::from_fn(6, 6, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([200, 200, 200, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        enhance_rgba_in_place(&mut img, 6, 6, &EnhanceParams::default()).unwrap();

        // Top-left is light: 201 * 0.7 with no edge term
        assert_eq!(img.get_pixel(0, 0).0[0], 141);
        // Top row black pixel stays black
        assert_eq!(img.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn test_alpha_preserved() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([200, 10, 10, 42]));
        enhance_rgba_in_place(&mut img, 4, 4, &EnhanceParams::default()).unwrap();
        assert!(img.pixels().all(|px| px.0[3] == 42));
        assert!(img.pixels().all(|px| px.0[0] == px.0[1] && px.0[1] == px.0[2]));
    }

    #[test]
    fn test_tiny_images_do_not_panic() {
        let mut img = uniform(2, 1, 50);
        assert!(enhance_rgba_in_place(&mut img, 2, 1, &EnhanceParams::default()).is_ok());
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let mut data = vec![0u8; 15];
        assert!(enhance_rgba_in_place(&mut data, 2, 2, &EnhanceParams::default()).is_err());
    }

    #[test]
    fn test_enhance_bytes_outputs_png() {
        let img = DynamicImage::ImageRgba8(uniform(16, 16, 30));
        let mut jpeg = Cursor::new(Vec::new());
        img.to_rgb8().write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();

        let png = enhance_bytes(jpeg.get_ref()).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }

    #[test]
    fn test_enhance_bytes_rejects_garbage() {
        assert!(enhance_bytes(b"definitely not an image").is_err());
    }
}
