//! Image preprocessing ahead of OCR
//!
//! Decodes an uploaded image, converts it to grayscale, applies CLAHE
//! (contrast-limited adaptive histogram equalization) and re-encodes the
//! result as PNG. The transform is pure: identical input and parameters
//! always produce identical output, and the output keeps the input's
//! dimensions.

use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;

use crate::config::PreprocessConfig;
use crate::error::{Error, Result};

const HIST_SIZE: usize = 256;

/// CLAHE parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaheParams {
    /// Contrast limit relative to a uniform histogram; `0.0` disables clipping
    pub clip_limit: f32,
    /// Tile columns
    pub tiles_x: u32,
    /// Tile rows
    pub tiles_y: u32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tiles_x: 8,
            tiles_y: 8,
        }
    }
}

impl From<&PreprocessConfig> for ClaheParams {
    fn from(config: &PreprocessConfig) -> Self {
        Self {
            clip_limit: config.clip_limit,
            tiles_x: config.tile_grid.0,
            tiles_y: config.tile_grid.1,
        }
    }
}

/// A preprocessed image ready for the OCR engine
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Lossless single-channel PNG
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Grayscale + CLAHE preprocessor
#[derive(Debug, Clone)]
pub struct Preprocessor {
    clahe: Option<ClaheParams>,
}

impl Preprocessor {
    /// Build from configuration
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            clahe: config.enabled.then(|| ClaheParams::from(config)),
        }
    }

    /// Preprocessor with explicit CLAHE parameters (`None` = grayscale only)
    pub fn with_params(clahe: Option<ClaheParams>) -> Self {
        Self { clahe }
    }

    /// Active CLAHE parameters
    pub fn clahe(&self) -> Option<&ClaheParams> {
        self.clahe.as_ref()
    }

    /// Decode, convert and enhance an encoded image
    pub fn prepare(&self, bytes: &[u8]) -> Result<PreparedImage> {
        let gray = decode_grayscale(bytes)?;
        let enhanced = match &self.clahe {
            Some(params) => apply_clahe(&gray, params),
            None => gray,
        };

        Ok(PreparedImage {
            width: enhanced.width(),
            height: enhanced.height(),
            png: encode_png(&enhanced)?,
        })
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::with_params(Some(ClaheParams::default()))
    }
}

/// Decode image bytes into an 8-bit grayscale buffer
///
/// Uses the BT.601 luma weights so results match common OCR tooling.
pub fn decode_grayscale(bytes: &[u8]) -> Result<GrayImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| Error::image_decode(format!("Failed to decode image: {}", e)))?;
    let rgb = decoded.to_rgb8();

    let mut gray = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000;
        gray.put_pixel(x, y, Luma([luma as u8]));
    }
    Ok(gray)
}

/// Encode a grayscale image as PNG
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| Error::image_decode(format!("PNG encoding failed: {}", e)))?;
    Ok(cursor.into_inner())
}

/// Tile layout over an image
///
/// Tiles are sized by ceiling division; the grid shrinks for images smaller
/// than the requested grid so every tile holds at least one pixel.
#[derive(Debug, Clone, Copy)]
struct TileGrid {
    tiles_x: u32,
    tiles_y: u32,
    tile_w: u32,
    tile_h: u32,
}

impl TileGrid {
    fn new(width: u32, height: u32, tiles_x: u32, tiles_y: u32) -> Self {
        let (tiles_x, tile_w) = Self::axis(width, tiles_x);
        let (tiles_y, tile_h) = Self::axis(height, tiles_y);
        Self {
            tiles_x,
            tiles_y,
            tile_w,
            tile_h,
        }
    }

    fn axis(len: u32, requested: u32) -> (u32, u32) {
        let tiles = requested.clamp(1, len);
        let size = len.div_ceil(tiles);
        (len.div_ceil(size), size)
    }
}

/// Contrast-limited adaptive histogram equalization
///
/// Follows OpenCV's algorithm: per-tile clipped histograms, uniform
/// redistribution of the clipped excess, and bilinear interpolation between
/// the four nearest tile mappings.
pub fn apply_clahe(src: &GrayImage, params: &ClaheParams) -> GrayImage {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return src.clone();
    }

    let grid = TileGrid::new(width, height, params.tiles_x, params.tiles_y);
    let mut luts = Vec::with_capacity((grid.tiles_x * grid.tiles_y) as usize);

    for ty in 0..grid.tiles_y {
        for tx in 0..grid.tiles_x {
            let x0 = tx * grid.tile_w;
            let y0 = ty * grid.tile_h;
            let x1 = (x0 + grid.tile_w).min(width);
            let y1 = (y0 + grid.tile_h).min(height);

            let mut hist = [0u32; HIST_SIZE];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[src.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            luts.push(tile_lut(&mut hist, area, params.clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * grid.tiles_x + tx) as usize];
    let inv_tw = 1.0 / grid.tile_w as f32;
    let inv_th = 1.0 / grid.tile_h as f32;

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let (ty1, ty2, ya) = neighbours(y as f32 * inv_th - 0.5, grid.tiles_y);
        for x in 0..width {
            let (tx1, tx2, xa) = neighbours(x as f32 * inv_tw - 0.5, grid.tiles_x);
            let v = src.get_pixel(x, y)[0] as usize;

            let top = lut_at(tx1, ty1)[v] as f32 * (1.0 - xa) + lut_at(tx2, ty1)[v] as f32 * xa;
            let bottom = lut_at(tx1, ty2)[v] as f32 * (1.0 - xa) + lut_at(tx2, ty2)[v] as f32 * xa;
            let value = top * (1.0 - ya) + bottom * ya;

            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

/// Neighbouring tile indices and interpolation weight for a tile-space coordinate
fn neighbours(coord: f32, tiles: u32) -> (u32, u32, f32) {
    let first = coord.floor();
    let weight = coord - first;
    let last = tiles as i64 - 1;
    let t1 = (first as i64).clamp(0, last) as u32;
    let t2 = (first as i64 + 1).clamp(0, last) as u32;
    (t1, t2, weight)
}

/// Clip a tile histogram and turn it into an equalization lookup table
fn tile_lut(hist: &mut [u32; HIST_SIZE], area: u32, clip_limit: f32) -> [u8; HIST_SIZE] {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / HIST_SIZE as f32) as u32).max(1);

        let mut clipped = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                clipped += *bin - limit;
                *bin = limit;
            }
        }

        let batch = clipped / HIST_SIZE as u32;
        let mut residual = clipped - batch * HIST_SIZE as u32;
        for bin in hist.iter_mut() {
            *bin += batch;
        }

        if residual > 0 {
            let step = (HIST_SIZE / residual as usize).max(1);
            let mut i = 0;
            while i < HIST_SIZE && residual > 0 {
                hist[i] += 1;
                i += step;
                residual -= 1;
            }
        }
    }

    let scale = (HIST_SIZE - 1) as f32 / area as f32;
    let mut lut = [0u8; HIST_SIZE];
    let mut sum = 0u32;
    for (i, count) in hist.iter().enumerate() {
        sum += count;
        lut[i] = (sum as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, DynamicImage, Rgb, RgbImage};

    fn encode_rgb(img: RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, format)
            .unwrap();
        cursor.into_inner()
    }

    fn low_contrast_gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let v = 100 + (x * 20 / width) as u8;
            Rgb([v, v, v])
        })
    }

    #[test]
    fn test_prepare_keeps_dimensions_and_is_grayscale() {
        let bytes = encode_rgb(low_contrast_gradient(37, 23), ImageFormat::Png);
        let prepared = Preprocessor::default().prepare(&bytes).unwrap();

        assert_eq!((prepared.width, prepared.height), (37, 23));

        let decoded = image::load_from_memory(&prepared.png).unwrap();
        assert_eq!(decoded.color(), ColorType::L8);
        assert_eq!((decoded.width(), decoded.height()), (37, 23));
    }

    #[test]
    fn test_prepare_accepts_jpeg() {
        let bytes = encode_rgb(low_contrast_gradient(64, 48), ImageFormat::Jpeg);
        let prepared = Preprocessor::default().prepare(&bytes).unwrap();
        assert_eq!((prepared.width, prepared.height), (64, 48));
    }

    #[test]
    fn test_prepare_is_deterministic() {
        let bytes = encode_rgb(low_contrast_gradient(50, 40), ImageFormat::Png);
        let pre = Preprocessor::default();
        assert_eq!(pre.prepare(&bytes).unwrap().png, pre.prepare(&bytes).unwrap().png);
    }

    #[test]
    fn test_malformed_bytes_fail_to_decode() {
        let err = Preprocessor::default().prepare(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::ImageDecode(_)));

        let err = Preprocessor::default().prepare(&[]).unwrap_err();
        assert!(matches!(err, Error::ImageDecode(_)));
    }

    #[test]
    fn test_grayscale_weights() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let gray = decode_grayscale(&encode_rgb(img, ImageFormat::Png)).unwrap();
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
    }

    #[test]
    fn test_clahe_uniform_image_stays_uniform() {
        let src = GrayImage::from_pixel(64, 64, Luma([120]));
        let out = apply_clahe(&src, &ClaheParams::default());
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        let src = GrayImage::from_fn(256, 256, |x, y| Luma([100 + ((x + y * 7) % 20) as u8]));
        let out = apply_clahe(&src, &ClaheParams::default());

        let range = |img: &GrayImage| {
            let min = img.pixels().map(|p| p[0]).min().unwrap();
            let max = img.pixels().map(|p| p[0]).max().unwrap();
            max - min
        };
        assert!(range(&out) > range(&src));
    }

    #[test]
    fn test_clahe_handles_tiny_and_uneven_images() {
        for (w, h) in [(1, 1), (3, 5), (10, 10), (17, 9)] {
            let src = GrayImage::from_fn(w, h, |x, y| Luma([((x * 31 + y * 17) % 256) as u8]));
            let out = apply_clahe(&src, &ClaheParams::default());
            assert_eq!(out.dimensions(), (w, h));
        }
    }

    #[test]
    fn test_tile_grid_never_has_empty_tiles() {
        let grid = TileGrid::new(10, 3, 8, 8);
        assert!((grid.tiles_x - 1) * grid.tile_w < 10);
        assert!((grid.tiles_y - 1) * grid.tile_h < 3);
        assert_eq!(grid.tiles_y, 3);
    }

    #[test]
    fn test_disabled_clahe_is_plain_grayscale() {
        let bytes = encode_rgb(low_contrast_gradient(16, 16), ImageFormat::Png);
        let prepared = Preprocessor::with_params(None).prepare(&bytes).unwrap();
        let decoded = image::load_from_memory(&prepared.png).unwrap().to_luma8();
        assert_eq!(decoded, decode_grayscale(&bytes).unwrap());
    }
}
