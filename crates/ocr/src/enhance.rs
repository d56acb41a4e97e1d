use cardwallet_core::EnhanceSettings;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgba, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnhanceError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode enhanced image: {0}")]
    Encode(String),
    #[error("Enhancement task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

const SHARPEN_KERNEL: [[i32; 3]; 3] = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];

// ── Pixel transforms ──────────────────────────────────────────────────────────

/// Perceptual grayscale followed by a linear contrast stretch around `midpoint`.
pub fn grayscale_contrast(img: &RgbaImage, factor: f32, midpoint: f32) -> RgbaImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        let [r, g, b, a] = p.0;
        let luma = (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)).round();
        let v = clamp_channel(f64::from(factor) * (luma - f64::from(midpoint)) + f64::from(midpoint));
        *p = Rgba([v, v, v, a]);
    }
    out
}

/// 3×3 median per RGB channel. Border pixels keep their input values.
pub fn median_denoise(img: &RgbaImage) -> RgbaImage {
    filter_interior(img, |window| {
        let mut values = [0u8; 9];
        for (slot, v) in values.iter_mut().zip(window.iter().flatten()) {
            *slot = *v;
        }
        values.sort_unstable();
        values[4]
    })
}

/// Multiply every RGB channel by `factor`; alpha is untouched.
pub fn scale_brightness(img: &RgbaImage, factor: f32) -> RgbaImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            p.0[c] = clamp_channel(f64::from(p.0[c]) * f64::from(factor));
        }
    }
    out
}

/// Convolve RGB channels with a 4-neighbour sharpening kernel. Border pixels keep their input values.
pub fn sharpen(img: &RgbaImage) -> RgbaImage {
    filter_interior(img, |window| {
        let mut sum = 0i32;
        for (row, krow) in window.iter().zip(SHARPEN_KERNEL.iter()) {
            for (v, k) in row.iter().zip(krow.iter()) {
                sum += i32::from(*v) * k;
            }
        }
        sum.clamp(0, 255) as u8
    })
}

/// Apply `f` to the 3×3 window of every interior pixel, channel by channel (RGB only).
fn filter_interior(img: &RgbaImage, f: impl Fn(&[[u8; 3]; 3]) -> u8) -> RgbaImage {
    let mut out = img.clone();
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            for c in 0..3 {
                let mut window = [[0u8; 3]; 3];
                for (dy, row) in window.iter_mut().enumerate() {
                    for (dx, slot) in row.iter_mut().enumerate() {
                        *slot = img.get_pixel(x + dx as u32 - 1, y + dy as u32 - 1).0[c];
                    }
                }
                out.get_pixel_mut(x, y).0[c] = f(&window);
            }
        }
    }
    out
}

fn clamp_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// ── Encoded stages ────────────────────────────────────────────────────────────

/// Runs the enhancement stages over encoded image payloads.
///
/// Every stage decodes its input, transforms a fresh buffer and re-encodes it as JPEG.
/// Codec work runs on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct ImageEnhancer {
    settings: EnhanceSettings,
}

impl ImageEnhancer {
    pub fn new(settings: EnhanceSettings) -> Self {
        Self { settings }
    }

    pub async fn contrast_stage(&self, data: Vec<u8>) -> Result<Vec<u8>, EnhanceError> {
        let EnhanceSettings { contrast_factor, contrast_midpoint, .. } = self.settings;
        self.run_stage(data, move |img| grayscale_contrast(img, contrast_factor, contrast_midpoint))
            .await
    }

    pub async fn denoise_stage(&self, data: Vec<u8>) -> Result<Vec<u8>, EnhanceError> {
        self.run_stage(data, median_denoise).await
    }

    pub async fn brightness_stage(&self, data: Vec<u8>, factor: f32) -> Result<Vec<u8>, EnhanceError> {
        self.run_stage(data, move |img| scale_brightness(img, factor)).await
    }

    pub async fn sharpen_stage(&self, data: Vec<u8>) -> Result<Vec<u8>, EnhanceError> {
        self.run_stage(data, sharpen).await
    }

    /// grayscale+contrast → noise removal → brightness → sharpening.
    pub async fn enhance(&self, data: &[u8]) -> Result<Vec<u8>, EnhanceError> {
        let out = self.contrast_stage(data.to_vec()).await?;
        let out = self.denoise_stage(out).await?;
        let out = self.brightness_stage(out, self.settings.brightness_factor).await?;
        self.sharpen_stage(out).await
    }

    /// Enhancement is best-effort: any failure yields the original payload.
    pub async fn enhance_or_original(&self, data: &[u8]) -> Vec<u8> {
        match self.enhance(data).await {
            Ok(enhanced) => enhanced,
            Err(e) => {
                tracing::warn!("Image enhancement failed, using original: {e}");
                data.to_vec()
            }
        }
    }

    async fn run_stage<F>(&self, data: Vec<u8>, transform: F) -> Result<Vec<u8>, EnhanceError>
    where
        F: FnOnce(&RgbaImage) -> RgbaImage + Send + 'static,
    {
        let quality = self.settings.jpeg_quality;
        tokio::task::spawn_blocking(move || {
            let img = image::load_from_memory(&data)?.to_rgba8();
            tracing::debug!(width = img.width(), height = img.height(), "enhancement stage");
            encode_jpeg(transform(&img), quality)
        })
        .await?
    }
}

fn encode_jpeg(img: RgbaImage, quality: u8) -> Result<Vec<u8>, EnhanceError> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| EnhanceError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;
    use std::io::Cursor;

    /// Deterministic, non-uniform test pattern.
    fn pattern(width: u32, height: u32) -> RgbaImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let r = ((x * 37 + y * 11) % 256) as u8;
            let g = ((x * 13 + y * 71) % 256) as u8;
            let b = ((x * y * 29 + 7) % 256) as u8;
            Rgba([r, g, b, 200])
        })
    }

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
        buf
    }

    fn border(img: &RgbaImage) -> Vec<Rgba<u8>> {
        let (w, h) = img.dimensions();
        img.enumerate_pixels()
            .filter(|(x, y, _)| *x == 0 || *y == 0 || *x == w - 1 || *y == h - 1)
            .map(|(_, _, p)| *p)
            .collect()
    }

    // ── grayscale + contrast ──────────────────────────────────────────────────

    #[test]
    fn contrast_uses_luma_weights() {
        let img: RgbaImage = ImageBuffer::from_pixel(1, 1, Rgba([100, 150, 200, 42]));
        let out = grayscale_contrast(&img, 1.5, 128.0);
        // L = round(29.9 + 88.05 + 22.8) = 141; 1.5 * 13 + 128 = 147.5 -> 148
        assert_eq!(out.get_pixel(0, 0).0, [148, 148, 148, 42]);
    }

    #[test]
    fn contrast_clamps_extremes() {
        let dark: RgbaImage = ImageBuffer::from_pixel(1, 1, Rgba([20, 20, 20, 255]));
        let light: RgbaImage = ImageBuffer::from_pixel(1, 1, Rgba([240, 240, 240, 255]));
        assert_eq!(grayscale_contrast(&dark, 1.5, 128.0).get_pixel(0, 0).0[0], 0);
        assert_eq!(grayscale_contrast(&light, 1.5, 128.0).get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn contrast_is_idempotent_on_saturated_image() {
        let img: RgbaImage = ImageBuffer::from_fn(6, 2, |x, _| {
            let v = [0u8, 128, 255][(x % 3) as usize];
            Rgba([v, v, v, 255])
        });
        let once = grayscale_contrast(&img, 1.5, 128.0);
        let twice = grayscale_contrast(&once, 1.5, 128.0);
        assert_eq!(once, twice);
    }

    // ── median ────────────────────────────────────────────────────────────────

    #[test]
    fn median_removes_salt_noise() {
        let mut img: RgbaImage = ImageBuffer::from_pixel(3, 3, Rgba([10, 10, 10, 255]));
        img.put_pixel(1, 1, Rgba([255, 0, 255, 255]));
        let out = median_denoise(&img);
        assert_eq!(out.get_pixel(1, 1).0, [10, 10, 10, 255]);
    }

    #[test]
    fn median_keeps_border() {
        let img = pattern(7, 5);
        assert_eq!(border(&median_denoise(&img)), border(&img));
    }

    #[test]
    fn median_within_neighbourhood_bounds() {
        let img = pattern(9, 8);
        let out = median_denoise(&img);
        for y in 1..7 {
            for x in 1..8 {
                for c in 0..3 {
                    let window: Vec<u8> = (0..3)
                        .flat_map(|dy| (0..3).map(move |dx| (dx, dy)))
                        .map(|(dx, dy)| img.get_pixel(x + dx - 1, y + dy - 1).0[c])
                        .collect();
                    let v = out.get_pixel(x, y).0[c];
                    assert!(v >= *window.iter().min().unwrap());
                    assert!(v <= *window.iter().max().unwrap());
                }
            }
        }
    }

    #[test]
    fn tiny_images_pass_through_filters() {
        let img = pattern(2, 5);
        assert_eq!(median_denoise(&img), img);
        assert_eq!(sharpen(&img), img);
    }

    // ── brightness ────────────────────────────────────────────────────────────

    #[test]
    fn brightness_is_monotonic_and_clamped() {
        let img = pattern(16, 16);
        let out = scale_brightness(&img, 1.1);
        for (before, after) in img.pixels().zip(out.pixels()) {
            for c in 0..3 {
                assert!(after.0[c] >= before.0[c]);
            }
            assert_eq!(after.0[3], before.0[3]);
        }
        let white: RgbaImage = ImageBuffer::from_pixel(1, 1, Rgba([250, 240, 100, 7]));
        assert_eq!(scale_brightness(&white, 1.1).get_pixel(0, 0).0, [255, 255, 110, 7]);
    }

    // ── sharpen ───────────────────────────────────────────────────────────────

    #[test]
    fn sharpen_flat_region_is_unchanged() {
        let img: RgbaImage = ImageBuffer::from_pixel(4, 4, Rgba([90, 90, 90, 255]));
        assert_eq!(sharpen(&img), img);
    }

    #[test]
    fn sharpen_amplifies_centre_and_clamps() {
        let mut img: RgbaImage = ImageBuffer::from_pixel(3, 3, Rgba([100, 100, 100, 255]));
        img.put_pixel(1, 1, Rgba([120, 0, 100, 255]));
        // R: 5*120 - 400 = 200; G: 0 - 400 -> 0; B: 100
        assert_eq!(sharpen(&img).get_pixel(1, 1).0, [200, 0, 100, 255]);
    }

    #[test]
    fn sharpen_keeps_border() {
        let img = pattern(6, 6);
        assert_eq!(border(&sharpen(&img)), border(&img));
    }

    // ── encoded pipeline ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn enhance_produces_jpeg_of_same_size() {
        let enhancer = ImageEnhancer::default();
        let out = enhancer.enhance(&png_bytes(&pattern(12, 9))).await.unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 9));
    }

    #[tokio::test]
    async fn enhanced_output_is_gray() {
        let enhancer = ImageEnhancer::default();
        let out = enhancer.contrast_stage(png_bytes(&pattern(8, 8))).await.unwrap();
        let rgb = image::load_from_memory(&out).unwrap().to_rgb8();
        for p in rgb.pixels() {
            let [r, g, b] = p.0;
            assert!(r.abs_diff(g) <= 2 && g.abs_diff(b) <= 2, "not gray: {:?}", p.0);
        }
    }

    #[tokio::test]
    async fn stage_rejects_malformed_payload() {
        let enhancer = ImageEnhancer::default();
        let err = enhancer.denoise_stage(b"not an image".to_vec()).await.unwrap_err();
        assert!(matches!(err, EnhanceError::Decode(_)));
    }

    #[tokio::test]
    async fn enhance_or_original_falls_back() {
        let enhancer = ImageEnhancer::default();
        let garbage = b"\x00\x01garbage".to_vec();
        assert_eq!(enhancer.enhance_or_original(&garbage).await, garbage);
    }
}
