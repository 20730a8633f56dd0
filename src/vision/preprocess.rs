use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};
use imageproc::contrast::otsu_level;

use crate::geometry::Rect;

/// Crops a rectangle out of an image, clamped to the image bounds.
///
/// Returns `None` if the rectangle lies entirely outside the image.
pub fn crop_rect(img: &RgbaImage, rect: &Rect) -> Option<RgbaImage> {
    let (w, h) = img.dimensions();
    let clamped = rect.clamp_to(w, h)?;
    Some(
        imageops::crop_imm(
            img,
            clamped.x as u32,
            clamped.y as u32,
            clamped.width,
            clamped.height,
        )
        .to_image(),
    )
}

pub fn to_grayscale(img: &RgbaImage) -> GrayImage {
    imageops::grayscale(img)
}

/// Stretches the gray levels so the darkest pixel becomes 0 and the
/// brightest 255. Flat images are returned unchanged.
pub fn normalize_min_max(gray: &GrayImage) -> GrayImage {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max <= min {
        return gray.clone();
    }

    let range = (max - min) as f32;
    let mut output = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let v = ((pixel[0] - min) as f32 * 255.0 / range).round() as u8;
        output.put_pixel(x, y, Luma([v]));
    }
    output
}

/// Resizes by `factor` with bicubic interpolation.
pub fn upscale(gray: &GrayImage, factor: f32) -> GrayImage {
    let w = ((gray.width() as f32 * factor).round() as u32).max(1);
    let h = ((gray.height() as f32 * factor).round() as u32).max(1);
    imageops::resize(gray, w, h, FilterType::CatmullRom)
}

/// Otsu binarization, inverted for Tesseract.
///
/// The game draws light text on dark panels. Pixels brighter than the Otsu
/// level become black (text), everything else white (background).
pub fn binarize_inverted(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    let mut output = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let value = if pixel[0] > level { 0u8 } else { 255u8 };
        output.put_pixel(x, y, Luma([value]));
    }
    output
}

/// Grayscale, contrast stretch, upscale, threshold. Used for card names.
pub fn prepare_name_image(img: &RgbaImage, factor: f32) -> GrayImage {
    let gray = normalize_min_max(&to_grayscale(img));
    binarize_inverted(&upscale(&gray, factor))
}

/// Same as names minus the contrast stretch, which tends to merge digits.
pub fn prepare_price_image(img: &RgbaImage, factor: f32) -> GrayImage {
    let gray = to_grayscale(img);
    binarize_inverted(&upscale(&gray, factor))
}

/// Converts RGB to HSV in OpenCV's 8-bit scale: H in 0..=180, S and V in 0..=255.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let rf = r as f32;
    let gf = g as f32;
    let bf = b as f32;
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta * 255.0 / max } else { 0.0 };

    let h_deg = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };

    [
        (h_deg / 2.0).round().min(180.0) as u8,
        s.round().min(255.0) as u8,
        v.round() as u8,
    ]
}
