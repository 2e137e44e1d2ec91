//! Page image decoding, format conversion and resizing.
//!
//! JPEG XL pages are decoded through jxl-rs; everything else goes through
//! the image crate.

use crate::error::{AppError, Result};
use image::DynamicImage;

/// Output formats supported for page conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// PNG output.
    Png,
    /// JPEG output.
    Jpeg,
}

impl OutputFormat {
    /// Parse a client-supplied format name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            _ => None,
        }
    }

    /// Output format matching a page's native media type, if any.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "image/png" => Some(OutputFormat::Png),
            "image/jpeg" => Some(OutputFormat::Jpeg),
            _ => None,
        }
    }

    /// MIME type of the encoded output.
    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    fn image_format(&self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// Check if data is a JPEG XL file by examining its signature.
pub fn is_jxl(data: &[u8]) -> bool {
    use jxl::api::{JxlSignatureType, ProcessingResult, check_signature};

    match check_signature(data) {
        ProcessingResult::Complete { result } => matches!(
            result,
            Some(JxlSignatureType::Codestream) | Some(JxlSignatureType::Container)
        ),
        ProcessingResult::NeedsMoreInput { .. } => false,
    }
}

/// Decode a JPEG XL image to RGBA8 pixel data.
///
/// Returns (width, height, rgba_data) on success.
fn decode_jxl(data: &[u8]) -> Result<(u32, u32, Vec<u8>)> {
    use jxl::api::{
        JxlColorType, JxlDataFormat, JxlDecoder, JxlDecoderOptions, JxlOutputBuffer,
        JxlPixelFormat, ProcessingResult,
    };
    use jxl::headers::extra_channels::ExtraChannel;
    use jxl::image::{OwnedRawImage, Rect};

    let options = JxlDecoderOptions::default();
    let decoder = JxlDecoder::<jxl::api::states::Initialized>::new(options);

    let mut input = data;
    let mut decoder = match decoder.process(&mut input) {
        Ok(ProcessingResult::Complete { result }) => result,
        Ok(ProcessingResult::NeedsMoreInput { .. }) => {
            return Err(AppError::Conversion("Incomplete JXL data".into()));
        }
        Err(e) => {
            return Err(AppError::Conversion(format!("JXL header error: {}", e)));
        }
    };

    let info = decoder.basic_info();
    let (width, height) = info.size;

    let has_alpha = info
        .extra_channels
        .iter()
        .any(|ec| ec.ec_type == ExtraChannel::Alpha);

    let color_type = if has_alpha {
        JxlColorType::Rgba
    } else {
        JxlColorType::Rgb
    };
    let samples_per_pixel = color_type.samples_per_pixel();

    let pixel_format = JxlPixelFormat {
        color_type,
        color_data_format: Some(JxlDataFormat::U8 { bit_depth: 8 }),
        extra_channel_format: vec![],
    };
    decoder.set_pixel_format(pixel_format);

    let decoder = match decoder.process(&mut input) {
        Ok(ProcessingResult::Complete { result }) => result,
        Ok(ProcessingResult::NeedsMoreInput { .. }) => {
            return Err(AppError::Conversion("Incomplete JXL frame data".into()));
        }
        Err(e) => {
            return Err(AppError::Conversion(format!("JXL frame error: {}", e)));
        }
    };

    // For U8 output: bytes_per_row = width * samples_per_pixel
    let bytes_per_row = width * samples_per_pixel;
    let mut raw_image =
        OwnedRawImage::new_zeroed_with_padding((bytes_per_row, height), (0, 0), (0, 0))
            .map_err(|e| AppError::Internal(format!("Failed to create image buffer: {}", e)))?;

    let rect = Rect {
        origin: (0, 0),
        size: (bytes_per_row, height),
    };

    let mut buffers = vec![JxlOutputBuffer::from_image_rect_mut(
        raw_image.get_rect_mut(rect),
    )];

    match decoder.process(&mut input, &mut buffers) {
        Ok(ProcessingResult::Complete { .. }) => {}
        Ok(ProcessingResult::NeedsMoreInput { .. }) => {
            return Err(AppError::Conversion("Incomplete JXL pixel data".into()));
        }
        Err(e) => {
            return Err(AppError::Conversion(format!("JXL decode error: {}", e)));
        }
    };

    let mut output_data = Vec::with_capacity(bytes_per_row * height);
    for y in 0..height {
        output_data.extend_from_slice(raw_image.row(y));
    }

    // RGB output gets an opaque alpha channel appended.
    let rgba_data = if has_alpha {
        output_data
    } else {
        let mut rgba = Vec::with_capacity(width * height * 4);
        for chunk in output_data.chunks(3) {
            rgba.extend_from_slice(chunk);
            rgba.push(255);
        }
        rgba
    };

    Ok((width as u32, height as u32, rgba_data))
}

/// Decode page bytes into a DynamicImage, with JXL support.
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    if is_jxl(data) {
        let (width, height, rgba_data) = decode_jxl(data)?;
        return image::RgbaImage::from_raw(width, height, rgba_data)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| AppError::Conversion("Failed to create image from JXL data".into()));
    }

    image::load_from_memory(data)
        .map_err(|e| AppError::Conversion(format!("Failed to decode image: {}", e)))
}

fn encode(img: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>> {
    // JPEG cannot carry alpha.
    let img = match format {
        OutputFormat::Jpeg if img.color().has_alpha() => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img.clone(),
    };

    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), format.image_format())
        .map_err(|e| AppError::Conversion(format!("Failed to encode image: {}", e)))?;
    Ok(out)
}

/// Convert and/or resize page bytes per the page-serving contract.
///
/// Without a requested conversion or resize the native bytes pass through
/// untouched. A conversion matching the native format is a no-op. Resizing
/// is proportional and applied after conversion; a resized page whose
/// native format is not encodable comes back as PNG.
pub fn convert_page(
    data: Vec<u8>,
    native_media_type: &str,
    convert_to: Option<OutputFormat>,
    resize_to: Option<u32>,
) -> Result<(Vec<u8>, String)> {
    let target = convert_to.filter(|t| t.media_type() != native_media_type);

    if target.is_none() && resize_to.is_none() {
        return Ok((data, native_media_type.to_string()));
    }

    let mut img = decode(&data)?;
    if let Some(size) = resize_to {
        img = img.thumbnail(size, size);
    }

    let format = target
        .or_else(|| OutputFormat::from_media_type(native_media_type))
        .unwrap_or(OutputFormat::Png);

    let out = encode(&img, format)?;
    Ok((out, format.media_type().to_string()))
}

/// Downscale page bytes into a PNG thumbnail fitting within `size` pixels
/// in both dimensions, preserving aspect ratio.
pub fn thumbnail(data: &[u8], size: u32) -> Result<Vec<u8>> {
    let img = decode(data)?;
    let thumb = img.thumbnail(size, size);
    encode(&thumb, OutputFormat::Png)
}
