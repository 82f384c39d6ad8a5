//! Homework photo validation and preparation
//!
//! Photos are checked when picked (`validate_image`) and prepared right
//! before upload: strict format check, size limit, then downscaling and
//! JPEG re-encoding so phone-camera shots stay small.

use crate::api::types::ImageUpload;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use std::io::Cursor;
use std::path::Path;

/// Largest photo accepted for upload
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Longest side of a prepared photo, in pixels
pub const MAX_DIMENSION: u32 = 1920;

/// Size a prepared photo should fit in when quality allows
pub const TARGET_BYTES: usize = 1024 * 1024;

/// Photos whose shorter side is below this are probably too blurry to read
pub const BLURRY_MIN_SIDE: u32 = 500;

const JPEG_QUALITY: u8 = 80;
const MIN_JPEG_QUALITY: u8 = 40;

/// Types the backend can read reliably
const SUPPORTED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("请选择图片文件")]
    NotAnImage,

    #[error("不支持的图片格式，请使用 JPG、PNG 或 WebP")]
    UnsupportedFormat,

    #[error("图片太大了，请选择小于 10MB 的图片")]
    TooLarge,

    #[error("图片压缩失败，请重试")]
    CompressionFailed,

    #[error("无法读取图片尺寸")]
    UnreadableDimensions,
}

/// Check a photo when it is picked
pub fn validate_image(image: &ImageUpload) -> Result<(), ImageError> {
    if !image.mime_type.starts_with("image/") {
        return Err(ImageError::NotAnImage);
    }
    if !is_valid_image_size(image.size(), MAX_IMAGE_BYTES) {
        return Err(ImageError::TooLarge);
    }
    Ok(())
}

/// Whether `mime_type` is one of the well-supported formats
pub fn is_valid_image_type(mime_type: &str) -> bool {
    SUPPORTED_TYPES.contains(&mime_type)
}

pub fn is_valid_image_size(size: u64, max_bytes: u64) -> bool {
    size <= max_bytes
}

/// Width and height read from the image header
pub fn image_dimensions(image: &ImageUpload) -> Result<(u32, u32), ImageError> {
    ImageReader::new(Cursor::new(&image.bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok())
        .ok_or(ImageError::UnreadableDimensions)
}

/// Rough blur heuristic based on resolution alone
///
/// Unreadable images are not reported as blurry.
pub fn is_likely_blurry(image: &ImageUpload) -> bool {
    image_dimensions(image)
        .map(|(width, height)| width.min(height) < BLURRY_MIN_SIDE)
        .unwrap_or(false)
}

/// Downscale to `MAX_DIMENSION` and re-encode as JPEG
///
/// Quality starts at 80 and drops in steps until the result fits in
/// `TARGET_BYTES` or the quality floor is reached.
pub fn compress_image(image: &ImageUpload) -> Result<ImageUpload, ImageError> {
    let decoded = image::load_from_memory(&image.bytes).map_err(|e| {
        tracing::error!("Image compression failed: {}", e);
        ImageError::CompressionFailed
    })?;

    let resized = if decoded.width().max(decoded.height()) > MAX_DIMENSION {
        decoded.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Triangle)
    } else {
        decoded
    };
    let rgb = resized.to_rgb8();

    let mut quality = JPEG_QUALITY;
    let bytes = loop {
        let bytes = encode_jpeg(&rgb, quality)?;
        if bytes.len() <= TARGET_BYTES || quality <= MIN_JPEG_QUALITY {
            break bytes;
        }
        quality -= 10;
    };

    tracing::info!("Image compressed: {} -> {} bytes", image.size(), bytes.len());
    Ok(ImageUpload::new(jpeg_file_name(&image.file_name), "image/jpeg", bytes))
}

/// Full pre-upload pipeline: format, size, then compression
pub fn prepare_image_for_upload(image: &ImageUpload) -> Result<ImageUpload, ImageError> {
    if !is_valid_image_type(&image.mime_type) {
        return Err(ImageError::UnsupportedFormat);
    }
    if !is_valid_image_size(image.size(), MAX_IMAGE_BYTES) {
        return Err(ImageError::TooLarge);
    }
    if is_likely_blurry(image) {
        tracing::warn!("Photo {} is low resolution and may be blurry", image.file_name);
    }
    compress_image(image)
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(rgb)
        .map_err(|e| {
            tracing::error!("Image compression failed: {}", e);
            ImageError::CompressionFailed
        })?;
    Ok(out)
}

fn jpeg_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("photo");
    format!("{}.jpg", stem)
}
