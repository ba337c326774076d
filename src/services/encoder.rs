//! Frame encoding for the inference request: decoded image -> JPEG bytes -> base64 text.

use base64::{engine::general_purpose, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::error::{ClassificationError, DeviceError};

/// Strips an optional `data:<mime>;base64,` prefix and decodes the payload.
pub fn decode_data_url(input: &str) -> Result<Vec<u8>, DeviceError> {
    let trimmed = input.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(""),
        None => trimmed,
    };

    if payload.is_empty() {
        return Err(DeviceError::EmptyFrame);
    }

    Ok(from_transport(payload)?)
}

/// Decodes uploaded bytes (JPEG, PNG) into a raster image.
pub fn decode_frame(bytes: &[u8]) -> Result<DynamicImage, DeviceError> {
    if bytes.is_empty() {
        return Err(DeviceError::EmptyFrame);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Lossy JPEG compression. Alpha is dropped since JPEG has no alpha channel.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ClassificationError> {
    let rgb = image.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(&rgb)?;
    Ok(jpeg)
}

pub fn to_transport(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub fn from_transport(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(text.trim())
}

/// JPEG-compresses the frame and returns it as base64 text for a JSON body.
pub fn encode_frame(image: &DynamicImage, quality: u8) -> Result<String, ClassificationError> {
    let jpeg = encode_jpeg(image, quality)?;
    log::debug!("📊 JPEG frame size: {} bytes", jpeg.len());
    Ok(to_transport(&jpeg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, RgbaImage};
    use std::io::Cursor;

    fn test_image() -> DynamicImage {
        let img = RgbImage::from_fn(32, 24, |x, y| Rgb([(x * 8) as u8, (y * 10) as u8, 128]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_transport_round_trip_preserves_jpeg_bytes() {
        let jpeg = encode_jpeg(&test_image(), 85).unwrap();
        let text = to_transport(&jpeg);

        assert_eq!(from_transport(&text).unwrap(), jpeg);
    }

    #[test]
    fn test_encode_frame_produces_decodable_jpeg() {
        let text = encode_frame(&test_image(), 90).unwrap();
        let bytes = from_transport(&text).unwrap();

        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn test_encode_drops_alpha() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(8, 8));
        assert!(encode_jpeg(&rgba, 80).is_ok());
    }

    #[test]
    fn test_decode_data_url_png() {
        let mut png = Vec::new();
        test_image()
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let url = format!("data:image/png;base64,{}", to_transport(&png));

        let bytes = decode_data_url(&url).unwrap();
        assert_eq!(bytes, png);
        assert_eq!(decode_frame(&bytes).unwrap().width(), 32);
    }

    #[test]
    fn test_decode_data_url_accepts_bare_base64() {
        assert_eq!(decode_data_url("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_rejects_empty_and_garbage() {
        assert!(matches!(decode_data_url(""), Err(DeviceError::EmptyFrame)));
        assert!(matches!(
            decode_data_url("data:image/jpeg;base64,"),
            Err(DeviceError::EmptyFrame)
        ));
        assert!(matches!(decode_data_url("not base64!"), Err(DeviceError::BadEncoding(_))));
        assert!(matches!(decode_frame(b"hello"), Err(DeviceError::Undecodable(_))));
    }
}
