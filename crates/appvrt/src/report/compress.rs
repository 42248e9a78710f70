use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::codec;

pub const DEFAULT_SCALE: f64 = 1.0;
pub const DEFAULT_QUALITY: u8 = 80;

/// Downscale/re-encode settings for report images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSettings {
    /// 1.0 disables compression.
    pub scale: f64,
    /// 1-100. JPEG quality, or palette size for lossless output.
    pub quality: u8,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl CompressionSettings {
    pub fn enabled(&self) -> bool {
        self.scale > 0.0 && self.scale < 1.0
    }

    /// Palette size for lossless output: quality maps linearly onto 8..=256 colours.
    pub fn palette_colors(&self) -> usize {
        let q = f64::from(self.quality.clamp(1, 100)) / 100.0;
        ((q * 256.0).round() as usize).clamp(8, 256)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOutcome {
    /// Compression disabled.
    Skipped,
    /// Re-encoded output was not smaller; original bytes untouched.
    KeptOriginal { size: u64 },
    Replaced { before: u64, after: u64 },
}

/// Downscale and re-encode `bytes`, keeping the format family: JPEG stays
/// lossy JPEG, WebP stays (lossless) WebP, everything else becomes a
/// palette-reduced PNG.
pub fn compress_bytes(bytes: &[u8], format: ImageFormat, settings: &CompressionSettings) -> Result<Vec<u8>> {
    let img = codec::decode(bytes)?;
    let scaled = codec::scale_down(&img, settings.scale);
    match format {
        ImageFormat::Jpeg => encode_jpeg(&scaled, settings.quality),
        ImageFormat::WebP => encode_webp(&scaled.to_rgba8()),
        _ => encode_palette_png(&scaled.to_rgba8(), settings.palette_colors()),
    }
}

/// Compress the image at `path` in place. The file is only replaced when
/// the new encoding is strictly smaller.
pub fn compress_file(path: &Path, settings: &CompressionSettings) -> Result<CompressOutcome> {
    if !settings.enabled() {
        return Ok(CompressOutcome::Skipped);
    }

    let original = codec::read_bytes(path)?;
    let format = codec::detect_format(&original, path)
        .with_context(|| format!("Unknown image format: {}", path.display()))?;
    let candidate = compress_bytes(&original, format, settings)
        .with_context(|| format!("Failed to compress {}", path.display()))?;

    let before = original.len() as u64;
    let after = candidate.len() as u64;
    if after >= before {
        return Ok(CompressOutcome::KeptOriginal { size: before });
    }

    std::fs::write(path, &candidate).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(CompressOutcome::Replaced { before, after })
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    img.to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)))
        .context("Failed to encode JPEG")?;
    Ok(out)
}

fn encode_webp(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    img.write_with_encoder(WebPEncoder::new_lossless(&mut out))
        .context("Failed to encode WebP")?;
    Ok(out)
}

fn encode_palette_png(img: &RgbaImage, colors: usize) -> Result<Vec<u8>> {
    let (width, height) = img.dimensions();
    let quant = color_quant::NeuQuant::new(10, colors, img.as_raw());

    let mut palette = Vec::with_capacity(colors * 3);
    let mut trns = Vec::with_capacity(colors);
    for c in quant.color_map_rgba().chunks_exact(4) {
        palette.extend_from_slice(&c[..3]);
        trns.push(c[3]);
    }
    let indices: Vec<u8> = img
        .pixels()
        .map(|p| quant.index_of(&p.0) as u8)
        .collect();

    let mut output = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut output, width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_palette(palette);
        if trns.iter().any(|&a| a < 255) {
            encoder.set_trns(trns);
        }

        let mut writer = encoder
            .write_header()
            .context("Failed to write PNG header")?;
        writer
            .write_image_data(&indices)
            .context("Failed to write PNG data")?;
        writer.finish().context("Failed to finish PNG")?;
    }

    Ok(output)
}
