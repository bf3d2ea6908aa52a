//! Raster image conversion for uploads

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use crate::error::{MediaError, Result};

/// Quality for lossy outputs (JPEG, WEBP).
pub const LOSSY_QUALITY: u8 = 80;

pub const CONVERTED_SUFFIX: &str = " (converted_with_toolverse)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutputFormat {
    Png,
    Jpeg,
    Webp,
    Bmp,
    Tiff,
}

impl ImageOutputFormat {
    /// Accepts exactly the names the conversion form offers.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "png" => Some(ImageOutputFormat::Png),
            "jpg" => Some(ImageOutputFormat::Jpeg),
            "webp" => Some(ImageOutputFormat::Webp),
            "bmp" => Some(ImageOutputFormat::Bmp),
            "tiff" => Some(ImageOutputFormat::Tiff),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageOutputFormat::Png => "png",
            ImageOutputFormat::Jpeg => "jpg",
            ImageOutputFormat::Webp => "webp",
            ImageOutputFormat::Bmp => "bmp",
            ImageOutputFormat::Tiff => "tiff",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageOutputFormat::Png => "image/png",
            ImageOutputFormat::Jpeg => "image/jpeg",
            ImageOutputFormat::Webp => "image/webp",
            ImageOutputFormat::Bmp => "image/bmp",
            ImageOutputFormat::Tiff => "image/tiff",
        }
    }
}

/// Whether the upload's magic bytes identify it as an image at all.
pub fn looks_like_image(data: &[u8]) -> bool {
    infer::is_image(data)
}

/// Decode `data` and re-encode it as `format`.
pub fn convert(data: &[u8], format: ImageOutputFormat) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data)?;
    encode(&img, format)
}

pub fn encode(img: &DynamicImage, format: ImageOutputFormat) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());

    match format {
        ImageOutputFormat::Webp => {
            // Direct libwebp FFI encoding (the image crate only writes lossless)
            let rgba = img.to_rgba8();
            let encoded = webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height())
                .encode(LOSSY_QUALITY as f32);
            return Ok(encoded.to_vec());
        }
        ImageOutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buf, LOSSY_QUALITY);
            rgb.write_with_encoder(encoder)?;
        }
        ImageOutputFormat::Bmp => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_to(&mut buf, ImageFormat::Bmp)?;
        }
        ImageOutputFormat::Png => {
            img.write_to(&mut buf, ImageFormat::Png)?;
        }
        ImageOutputFormat::Tiff => {
            img.write_to(&mut buf, ImageFormat::Tiff)?;
        }
    }

    let bytes = buf.into_inner();
    if bytes.is_empty() {
        return Err(MediaError::Internal(format!(
            "{} encoder produced no data",
            format.extension()
        )));
    }
    Ok(bytes)
}

/// `photo.heic` → `photo (converted_with_toolverse).png`
pub fn converted_file_name(original: &str, format: ImageOutputFormat) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("image");
    format!("{}{}.{}", stem, CONVERTED_SUFFIX, format.extension())
}
