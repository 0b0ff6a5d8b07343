//! Quality-parameterized image codec
//!
//! Quality 1-99 encodes JPEG (alpha stripped, restored opaque on decode);
//! quality 100 selects lossless PNG so that buffers needing exact round
//! trips, like the cloud color plane, can share the same codec path.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::CodecError;

/// Quality value selecting the lossless path
pub const LOSSLESS_QUALITY: u8 = 100;

fn image_error(operation: &'static str, e: impl std::fmt::Display) -> CodecError {
    CodecError::Image {
        operation,
        message: e.to_string(),
    }
}

fn encode(
    width: usize,
    height: usize,
    data: &[u8],
    color: ExtendedColorType,
    quality: u8,
    operation: &'static str,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Cursor::new(Vec::new());
    if quality >= LOSSLESS_QUALITY {
        PngEncoder::new(&mut out)
            .write_image(data, width as u32, height as u32, color)
            .map_err(|e| image_error(operation, e))?;
    } else {
        JpegEncoder::new_with_quality(&mut out, quality.max(1))
            .write_image(data, width as u32, height as u32, color)
            .map_err(|e| image_error(operation, e))?;
    }
    Ok(out.into_inner())
}

/// Encode an RGBA buffer at the given quality
///
/// JPEG carries no alpha, so the lossy path stores RGB and decode restores
/// alpha = 255.
pub fn encode_rgba(
    width: usize,
    height: usize,
    rgba: &[u8],
    quality: u8,
) -> Result<Vec<u8>, CodecError> {
    if rgba.len() != width * height * 4 {
        return Err(CodecError::Geometry {
            context: "encode_rgba",
            expected: width * height * 4,
            actual: rgba.len(),
        });
    }
    if quality >= LOSSLESS_QUALITY {
        encode(
            width,
            height,
            rgba,
            ExtendedColorType::Rgba8,
            quality,
            "encode_rgba",
        )
    } else {
        let rgb: Vec<u8> = rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        encode(
            width,
            height,
            &rgb,
            ExtendedColorType::Rgb8,
            quality,
            "encode_rgba",
        )
    }
}

/// Encode a packed RGB buffer at the given quality
pub fn encode_rgb(
    width: usize,
    height: usize,
    rgb: &[u8],
    quality: u8,
) -> Result<Vec<u8>, CodecError> {
    if rgb.len() != width * height * 3 {
        return Err(CodecError::Geometry {
            context: "encode_rgb",
            expected: width * height * 3,
            actual: rgb.len(),
        });
    }
    encode(
        width,
        height,
        rgb,
        ExtendedColorType::Rgb8,
        quality,
        "encode_rgb",
    )
}

/// Encode an 8-bit gray buffer at the given quality
pub fn encode_gray(
    width: usize,
    height: usize,
    gray: &[u8],
    quality: u8,
) -> Result<Vec<u8>, CodecError> {
    if gray.len() != width * height {
        return Err(CodecError::Geometry {
            context: "encode_gray",
            expected: width * height,
            actual: gray.len(),
        });
    }
    encode(
        width,
        height,
        gray,
        ExtendedColorType::L8,
        quality,
        "encode_gray",
    )
}

/// Decode an image-codec payload into RGBA8
pub fn decode_rgba(data: &[u8]) -> Result<(usize, usize, Vec<u8>), CodecError> {
    let decoded =
        image::load_from_memory(data).map_err(|e| image_error("decode_rgba", e))?;
    let (w, h) = (decoded.width() as usize, decoded.height() as usize);
    Ok((w, h, decoded.into_rgba8().into_raw()))
}

/// Decode an image-codec payload into packed RGB8
pub fn decode_rgb(data: &[u8]) -> Result<(usize, usize, Vec<u8>), CodecError> {
    let decoded = image::load_from_memory(data).map_err(|e| image_error("decode_rgb", e))?;
    let (w, h) = (decoded.width() as usize, decoded.height() as usize);
    Ok((w, h, decoded.into_rgb8().into_raw()))
}

/// Decode an image-codec payload into 8-bit gray
pub fn decode_gray(data: &[u8]) -> Result<(usize, usize, Vec<u8>), CodecError> {
    let decoded = image::load_from_memory(data).map_err(|e| image_error("decode_gray", e))?;
    let (w, h) = (decoded.width() as usize, decoded.height() as usize);
    Ok((w, h, decoded.into_luma8().into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_rgba(w: usize, h: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(w * h * 4);
        for y in 0..h {
            for x in 0..w {
                out.extend_from_slice(&[
                    (x * 255 / w.max(1)) as u8,
                    (y * 255 / h.max(1)) as u8,
                    128,
                    255,
                ]);
            }
        }
        out
    }

    #[test]
    fn test_jpeg_produces_jpeg_magic() {
        let rgba = gradient_rgba(32, 32);
        let jpeg = encode_rgba(32, 32, &rgba, 85).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_lossless_quality_produces_png_and_exact_roundtrip() {
        let rgba = gradient_rgba(16, 8);
        let png = encode_rgba(16, 8, &rgba, LOSSLESS_QUALITY).unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);

        let (w, h, decoded) = decode_rgba(&png).unwrap();
        assert_eq!((w, h), (16, 8));
        assert_eq!(decoded, rgba);
    }

    #[test]
    fn test_jpeg_roundtrip_close_and_opaque() {
        let rgba = gradient_rgba(32, 32);
        let jpeg = encode_rgba(32, 32, &rgba, 90).unwrap();
        let (w, h, decoded) = decode_rgba(&jpeg).unwrap();
        assert_eq!((w, h), (32, 32));
        for px in decoded.chunks_exact(4) {
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn test_gray_roundtrip_lossless() {
        let gray: Vec<u8> = (0..64u8).collect();
        let png = encode_gray(8, 8, &gray, LOSSLESS_QUALITY).unwrap();
        let (_, _, decoded) = decode_gray(&png).unwrap();
        assert_eq!(decoded, gray);
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        assert!(encode_rgba(4, 4, &[0u8; 10], 80).is_err());
        assert!(encode_gray(4, 4, &[0u8; 10], 80).is_err());
    }

    #[test]
    fn test_garbage_payload_rejected() {
        assert!(decode_rgba(&[0u8; 32]).is_err());
    }
}
