//! Raw color normalization into RGBA8
//!
//! Supported encodings: planar 4:2:0 (NV12), packed 4:2:2 (YUY2),
//! motion-JPEG and packed BGRA. Output lands in a reusable scratch buffer;
//! a failed conversion leaves it empty and downstream treats the cycle as
//! color-less.

use contracts::{ColorFormat, ImageBuffer, ModeInfo, Rgba8};
use image::ImageFormat;
use rayon::prelude::*;

use crate::ProcessingError;

/// BT.601 YCbCr -> RGBA8
#[inline]
fn yuv_to_rgba(y: f32, u: f32, v: f32) -> Rgba8 {
    let r = y + 1.402 * (v - 128.0);
    let g = y - 0.344_136 * (u - 128.0) - 0.714_136 * (v - 128.0);
    let b = y + 1.772 * (u - 128.0);
    [
        r.clamp(0.0, 255.0) as u8,
        g.clamp(0.0, 255.0) as u8,
        b.clamp(0.0, 255.0) as u8,
        255,
    ]
}

/// Normalizes raw color encodings into RGBA8
pub struct ColorConverter {
    scratch: ImageBuffer<Rgba8>,
}

impl Default for ColorConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorConverter {
    pub fn new() -> Self {
        Self {
            scratch: ImageBuffer::new(),
        }
    }

    /// Last successfully converted image; empty if the last cycle failed
    pub fn output(&self) -> &ImageBuffer<Rgba8> {
        &self.scratch
    }

    /// Mark the scratch image absent, for cycles without a color capture
    pub fn reset(&mut self) {
        self.scratch.reset();
    }

    /// Convert one raw color buffer into the scratch RGBA image
    pub fn convert(
        &mut self,
        raw: &[u8],
        mode: &ModeInfo,
    ) -> Result<&ImageBuffer<Rgba8>, ProcessingError> {
        self.scratch.reset();

        let (w, h) = (mode.color_width, mode.color_height);
        match mode.color_format {
            ColorFormat::Nv12 => self.convert_nv12(raw, w, h)?,
            ColorFormat::Yuy2 => self.convert_yuy2(raw, w, h)?,
            ColorFormat::Mjpeg => self.convert_mjpeg(raw, w, h)?,
            ColorFormat::Bgra => self.convert_bgra(raw, w, h)?,
        }
        Ok(&self.scratch)
    }

    fn convert_nv12(&mut self, raw: &[u8], w: usize, h: usize) -> Result<(), ProcessingError> {
        let expected = w * h + w * h / 2;
        if raw.len() < expected {
            return Err(ProcessingError::MalformedColorBuffer {
                format: ColorFormat::Nv12,
                expected,
                actual: raw.len(),
            });
        }

        let (y_plane, uv_plane) = raw.split_at(w * h);
        self.scratch.resize(w, h);
        self.scratch
            .data
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(row, out)| {
                let uv_row = &uv_plane[(row / 2) * w..];
                for (col, px) in out.iter_mut().enumerate() {
                    let y = y_plane[row * w + col] as f32;
                    let u = uv_row[(col / 2) * 2] as f32;
                    let v = uv_row[(col / 2) * 2 + 1] as f32;
                    *px = yuv_to_rgba(y, u, v);
                }
            });
        Ok(())
    }

    fn convert_yuy2(&mut self, raw: &[u8], w: usize, h: usize) -> Result<(), ProcessingError> {
        // 4 bytes per chunk of 2 pixels: Y0 U Y1 V
        let expected = w * h * 2;
        if raw.len() < expected {
            return Err(ProcessingError::MalformedColorBuffer {
                format: ColorFormat::Yuy2,
                expected,
                actual: raw.len(),
            });
        }

        self.scratch.resize(w, h);
        self.scratch
            .data
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(row, out)| {
                let src_row = &raw[row * w * 2..];
                for (pair, px_pair) in out.chunks_mut(2).enumerate() {
                    let chunk = &src_row[pair * 4..pair * 4 + 4];
                    let (u, v) = (chunk[1] as f32, chunk[3] as f32);
                    px_pair[0] = yuv_to_rgba(chunk[0] as f32, u, v);
                    if let Some(second) = px_pair.get_mut(1) {
                        *second = yuv_to_rgba(chunk[2] as f32, u, v);
                    }
                }
            });
        Ok(())
    }

    fn convert_mjpeg(&mut self, raw: &[u8], w: usize, h: usize) -> Result<(), ProcessingError> {
        let decoded = image::load_from_memory_with_format(raw, ImageFormat::Jpeg)
            .map_err(|e| ProcessingError::MjpegDecode(e.to_string()))?;

        if decoded.width() as usize != w || decoded.height() as usize != h {
            return Err(ProcessingError::MjpegGeometry {
                expected_w: w,
                expected_h: h,
                actual_w: decoded.width() as usize,
                actual_h: decoded.height() as usize,
            });
        }

        let rgba = decoded.to_rgba8();
        self.scratch.resize(w, h);
        for (px, chunk) in self.scratch.data.iter_mut().zip(rgba.as_raw().chunks(4)) {
            *px = [chunk[0], chunk[1], chunk[2], chunk[3]];
        }
        Ok(())
    }

    fn convert_bgra(&mut self, raw: &[u8], w: usize, h: usize) -> Result<(), ProcessingError> {
        let expected = w * h * 4;
        if raw.len() < expected {
            return Err(ProcessingError::MalformedColorBuffer {
                format: ColorFormat::Bgra,
                expected,
                actual: raw.len(),
            });
        }

        self.scratch.resize(w, h);
        self.scratch
            .data
            .par_iter_mut()
            .zip(raw.par_chunks(4))
            .for_each(|(px, bgra)| {
                *px = [bgra[2], bgra[1], bgra[0], bgra[3]];
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CaptureMode;

    fn mode_with(format: ColorFormat, w: usize, h: usize) -> ModeInfo {
        let mut info = CaptureMode::NarrowFov720p.info(30);
        info.color_format = format;
        info.color_width = w;
        info.color_height = h;
        info
    }

    #[test]
    fn test_nv12_2x2_known_values() {
        // 2x2 luma plane plus one shared chroma pair
        let raw = [120u8, 60, 200, 30, 100, 180];
        let mode = mode_with(ColorFormat::Nv12, 2, 2);

        let mut converter = ColorConverter::new();
        let out = converter.convert(&raw, &mode).unwrap();
        assert_eq!(out.len(), 4);

        for (px, y) in out.data.iter().zip([120.0f32, 60.0, 200.0, 30.0]) {
            let expected = yuv_to_rgba(y, 100.0, 180.0);
            for c in 0..3 {
                assert!(
                    (px[c] as i16 - expected[c] as i16).abs() <= 2,
                    "channel {c}: {} vs {}",
                    px[c],
                    expected[c]
                );
            }
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn test_neutral_chroma_is_grayscale() {
        // U = V = 128 leaves luma untouched
        let raw = [50u8, 100, 150, 250, 128, 128];
        let mode = mode_with(ColorFormat::Nv12, 2, 2);

        let mut converter = ColorConverter::new();
        let out = converter.convert(&raw, &mode).unwrap();
        for (px, y) in out.data.iter().zip([50u8, 100, 150, 250]) {
            for c in 0..3 {
                assert!((px[c] as i16 - y as i16).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_bgra_swaps_channels() {
        let raw = [10u8, 20, 30, 40];
        let mode = mode_with(ColorFormat::Bgra, 1, 1);

        let mut converter = ColorConverter::new();
        let out = converter.convert(&raw, &mode).unwrap();
        assert_eq!(out.data[0], [30, 20, 10, 40]);
    }

    #[test]
    fn test_yuy2_shares_chroma_per_pair() {
        let raw = [90u8, 128, 200, 128];
        let mode = mode_with(ColorFormat::Yuy2, 2, 1);

        let mut converter = ColorConverter::new();
        let out = converter.convert(&raw, &mode).unwrap();
        assert!((out.data[0][0] as i16 - 90).abs() <= 1);
        assert!((out.data[1][0] as i16 - 200).abs() <= 1);
    }

    #[test]
    fn test_truncated_buffer_rejected_and_output_empty() {
        let mode = mode_with(ColorFormat::Nv12, 4, 4);
        let mut converter = ColorConverter::new();
        let err = converter.convert(&[0u8; 8], &mode);
        assert!(err.is_err());
        assert!(converter.output().is_empty());
    }

    #[test]
    fn test_mjpeg_garbage_rejected() {
        let mode = mode_with(ColorFormat::Mjpeg, 4, 4);
        let mut converter = ColorConverter::new();
        assert!(converter.convert(&[0xFFu8; 64], &mode).is_err());
    }
}
