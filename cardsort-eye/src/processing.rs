//! Frame scoring, ROI extraction and the preprocessing chain

use crate::config::{PreprocessConfig, Roi};
use crate::error::VisionError;
use image::{imageops, DynamicImage, GrayImage, Luma};

/// Variance of the 4-neighbour Laplacian; higher is sharper
pub fn sharpness(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| gray.get_pixel(x, y)[0] as f64;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut n = 0.0;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
            n += 1.0;
        }
    }

    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Pixel rectangle `(x, y, width, height)` of `roi` in a `width x height` frame
pub fn roi_rect(roi: &Roi, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let x = ((roi.x * width as f64).floor() as u32).min(width);
    let y = ((roi.y * height as f64).floor() as u32).min(height);
    let w = ((roi.width * width as f64).round() as u32).min(width - x);
    let h = ((roi.height * height as f64).round() as u32).min(height - y);
    (x, y, w, h)
}

/// Crop the ROI, clamped to the frame
pub fn extract_roi(image: &DynamicImage, roi: &Roi) -> Result<DynamicImage, VisionError> {
    let (x, y, w, h) = roi_rect(roi, image.width(), image.height());
    if w == 0 || h == 0 {
        return Err(VisionError::Processing(format!(
            "ROI is empty in a {}x{} frame",
            image.width(),
            image.height()
        )));
    }
    Ok(image.crop_imm(x, y, w, h))
}

/// Global histogram equalization
pub fn equalize(gray: &GrayImage) -> GrayImage {
    let mut histogram = [0u64; 256];
    for p in gray.pixels() {
        histogram[p[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let mut cdf = [0u64; 256];
    let mut running = 0;
    for (i, count) in histogram.iter().enumerate() {
        running += count;
        cdf[i] = running;
    }

    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total == cdf_min {
        // Single intensity, nothing to stretch
        return gray.clone();
    }

    let scale = 255.0 / (total - cdf_min) as f64;
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let v = (cdf[i].saturating_sub(cdf_min)) as f64 * scale;
        *entry = v.round().clamp(0.0, 255.0) as u8;
    }

    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p[0] = lut[p[0] as usize];
    }
    out
}

/// Local-mean binarization: a pixel is white when it is brighter than the
/// mean of its `(2r + 1)^2` neighbourhood minus `offset`
pub fn adaptive_threshold(gray: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let (wu, hu) = (w as usize, h as usize);

    // Summed-area table with a zero row and column in front
    let stride = wu + 1;
    let mut integral = vec![0u64; stride * (hu + 1)];
    for y in 0..hu {
        let mut row = 0u64;
        for x in 0..wu {
            row += gray.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    let r = radius as usize;
    GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let x0 = x.saturating_sub(r);
        let y0 = y.saturating_sub(r);
        let x1 = (x + r + 1).min(wu);
        let y1 = (y + r + 1).min(hu);
        let area = ((x1 - x0) * (y1 - y0)) as f64;
        let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
            - integral[y0 * stride + x1]
            - integral[y1 * stride + x0];
        let threshold = sum as f64 / area - offset as f64;
        let value = gray.get_pixel(x as u32, y as u32)[0] as f64;
        if value > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Run the enabled stages: grayscale, denoise, contrast, binarize.
///
/// Every stage after grayscale works on luminance, so enabling any of them
/// implies the grayscale conversion.
///
/// Contrast runs before binarize, not after it. Equalizing a two-level image
/// leaves it unchanged, while equalizing first spreads faint print over the
/// full range that the local threshold compares against.
pub fn preprocess(image: &DynamicImage, config: &PreprocessConfig) -> DynamicImage {
    let needs_luma =
        config.grayscale || config.denoise || config.contrast_enhance || config.adaptive_threshold;
    if !needs_luma {
        return image.clone();
    }

    let mut gray = image.to_luma8();
    if config.denoise {
        gray = imageops::blur(&gray, config.denoise_sigma);
    }
    if config.contrast_enhance {
        gray = equalize(&gray);
    }
    if config.adaptive_threshold {
        gray = adaptive_threshold(&gray, config.block_radius, config.threshold_offset);
    }
    DynamicImage::ImageLuma8(gray)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_sharpness_flat_is_zero() {
        let flat = GrayImage::from_pixel(16, 16, Luma([128]));
        assert_eq!(sharpness(&flat), 0.0);
    }

    #[test]
    fn test_sharpness_prefers_detail() {
        let sharp = checkerboard(16);
        let blurred = imageops::blur(&sharp, 2.0);
        assert!(sharpness(&sharp) > sharpness(&blurred));
    }

    #[test]
    fn test_sharpness_tiny_image() {
        assert_eq!(sharpness(&GrayImage::new(2, 2)), 0.0);
    }

    #[test]
    fn test_roi_rect() {
        let roi = Roi {
            x: 0.5,
            y: 0.25,
            width: 0.25,
            height: 0.5,
        };
        assert_eq!(roi_rect(&roi, 200, 100), (100, 25, 50, 50));
    }

    #[test]
    fn test_extract_roi_clamps() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        let roi = Roi {
            x: 0.8,
            y: 0.8,
            width: 0.5,
            height: 0.5,
        };
        let cropped = extract_roi(&image, &roi).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (2, 2));
    }

    #[test]
    fn test_extract_roi_empty() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        let roi = Roi {
            x: 0.0,
            y: 0.0,
            width: 0.01,
            height: 0.01,
        };
        match extract_roi(&image, &roi) {
            Err(VisionError::Processing(_)) => {}
            other => panic!("Expected processing error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_equalize_stretches_range() {
        let low_contrast = GrayImage::from_fn(8, 8, |x, _| Luma([100 + x as u8]));
        let out = equalize(&low_contrast);
        let min = out.pixels().map(|p| p[0]).min().unwrap();
        let max = out.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_adaptive_threshold_is_binary() {
        let gradient = GrayImage::from_fn(20, 20, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let out = adaptive_threshold(&gradient, 2, 2);
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_adaptive_threshold_dark_text_on_light() {
        let mut image = GrayImage::from_pixel(15, 15, Luma([220]));
        image.put_pixel(7, 7, Luma([20]));
        let out = adaptive_threshold(&image, 3, 2);
        assert_eq!(out.get_pixel(7, 7)[0], 0);
        assert_eq!(out.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_preprocess_outputs_luma() {
        let rgb = DynamicImage::new_rgb8(12, 12);
        let out = preprocess(&rgb, &PreprocessConfig::default());
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        assert_eq!((out.width(), out.height()), (12, 12));
    }

    #[test]
    fn test_contrast_before_binarize_keeps_faint_print() {
        let mut faint = GrayImage::from_pixel(15, 15, Luma([130]));
        faint.put_pixel(7, 7, Luma([126]));
        let config = PreprocessConfig {
            denoise: false,
            block_radius: 3,
            threshold_offset: 10,
            ..PreprocessConfig::default()
        };

        let out = preprocess(&DynamicImage::ImageLuma8(faint.clone()), &config).to_luma8();
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(out.get_pixel(7, 7)[0], 0);
        assert_eq!(out.get_pixel(0, 0)[0], 255);

        // Binarizing first loses the mark and equalizing afterwards cannot bring it back
        let binarized = adaptive_threshold(&faint, 3, 10);
        assert_eq!(binarized.get_pixel(7, 7)[0], 255);
        assert_eq!(equalize(&binarized), binarized);
    }
}
