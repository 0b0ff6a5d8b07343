//! Per-buffer frame compression and decompression
//!
//! Depth and infra go through the integer codec; color buffers through the
//! image codec; the colored cloud is flattened into coordinate planes plus
//! a synthetic color rectangle. Codec failures are logged with their
//! component and operation and leave that single output empty.

use bytemuck::cast_slice;
use contracts::{
    CaptureMode, CompressedCloud, CompressedFrame, CompressedImage, CompressionMode,
    CompressionSelection, Frame, ImageBuffer, Rgba8,
};
use tracing::error;

use crate::{
    decode_gray, decode_rgb, decode_rgba, decode_u16, encode_gray, encode_rgba, encode_u16,
    flatten_cloud, image_codec::encode_rgb, unflatten_cloud, LOSSLESS_QUALITY,
};

/// Widest synthetic rectangle used for the cloud color plane
const CLOUD_COLOR_MAX_WIDTH: usize = 1024;

/// Compresses frames buffer by buffer and mirrors them back
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }

    /// Build the wire/storage form of a frame.
    ///
    /// Every buffer is independent: deselected or absent inputs yield empty
    /// payloads, and a codec failure empties only its own output.
    pub fn compress(
        &self,
        frame: &Frame,
        selection: &CompressionSelection,
        valid_vertices: usize,
    ) -> CompressedFrame {
        let mut out = CompressedFrame {
            id_capture: frame.id_capture,
            after_capture_ts: frame.after_capture_ts,
            received_ts: frame.received_ts,
            mode: frame.mode,
            valid_vertices_count: valid_vertices,
            ..Default::default()
        };

        if selection.calibration && !frame.calibration.is_empty() {
            out.calibration = frame.calibration.clone();
        }

        if selection.depth && !frame.depth.is_empty() {
            out.depth = CompressedImage {
                width: frame.depth.width,
                height: frame.depth.height,
                mode: CompressionMode::IntegerCodec,
                data: encode_u16(&frame.depth.data),
            };
        }

        if selection.infra && !frame.infra.is_empty() {
            out.infra = CompressedImage {
                width: frame.infra.width,
                height: frame.infra.height,
                mode: CompressionMode::IntegerCodec,
                data: encode_u16(&frame.infra.data),
            };
        }

        if selection.color && !frame.rgba_color.is_empty() {
            out.color = compress_rgba_image(&frame.rgba_color, selection.jpeg_quality, "color");
        }

        if selection.depth_sized_color && !frame.rgba_depth_sized_color.is_empty() {
            out.depth_sized_color = compress_rgba_image(
                &frame.rgba_depth_sized_color,
                selection.jpeg_quality,
                "depth_sized_color",
            );
        }

        if selection.bodies_id_map && !frame.gray_bodies_id_map.is_empty() {
            let map = &frame.gray_bodies_id_map;
            match encode_gray(map.width, map.height, &map.data, selection.jpeg_quality) {
                Ok(data) => {
                    out.bodies_id_map = CompressedImage {
                        width: map.width,
                        height: map.height,
                        mode: CompressionMode::ImageCodec,
                        data,
                    };
                }
                Err(e) => error!(component = "frame_codec", operation = "bodies_id_map", error = %e, "compression failed"),
            }
        }

        if selection.cloud && !frame.cloud.is_empty() {
            out.cloud = compress_cloud(frame);
        }

        if selection.imu {
            out.imu = frame.imu;
        }
        if selection.audio && !frame.audio.is_empty() {
            out.audio = frame.audio.clone();
        }
        if selection.bodies_id_map {
            out.body_ids = frame.body_ids.clone();
        }

        out
    }

    /// Mirror a compressed frame back into its displayable form.
    ///
    /// Missing or empty payloads yield empty output buffers, never errors.
    pub fn decompress(&self, cframe: &CompressedFrame) -> Frame {
        let mut frame = Frame {
            id_capture: cframe.id_capture,
            after_capture_ts: cframe.after_capture_ts,
            received_ts: cframe.received_ts,
            mode: cframe.mode,
            calibration: cframe.calibration.clone(),
            imu: cframe.imu,
            audio: cframe.audio.clone(),
            body_ids: cframe.body_ids.clone(),
            ..Default::default()
        };

        if !cframe.depth.is_empty() {
            frame.depth = decompress_u16_image(&cframe.depth, "depth");
        }
        if !cframe.infra.is_empty() {
            frame.infra = decompress_u16_image(&cframe.infra, "infra");
        }
        if !cframe.color.is_empty() {
            frame.rgba_color = decompress_rgba_image(&cframe.color, "color");
        }
        if !cframe.depth_sized_color.is_empty() {
            frame.rgba_depth_sized_color =
                decompress_rgba_image(&cframe.depth_sized_color, "depth_sized_color");
        }
        if !cframe.bodies_id_map.is_empty() {
            match decode_gray(&cframe.bodies_id_map.data) {
                Ok((w, h, data)) => frame.gray_bodies_id_map = ImageBuffer::from_data(w, h, data),
                Err(e) => error!(component = "frame_codec", operation = "bodies_id_map", error = %e, "decompression failed"),
            }
        }
        if !cframe.cloud.is_empty() {
            decompress_cloud(cframe, &mut frame);
        }

        frame
    }
}

fn compress_rgba_image(
    image: &ImageBuffer<Rgba8>,
    quality: u8,
    operation: &'static str,
) -> CompressedImage {
    match encode_rgba(image.width, image.height, cast_slice(&image.data), quality) {
        Ok(data) => CompressedImage {
            width: image.width,
            height: image.height,
            mode: CompressionMode::ImageCodec,
            data,
        },
        Err(e) => {
            error!(component = "frame_codec", operation, error = %e, "compression failed");
            CompressedImage::default()
        }
    }
}

fn decompress_rgba_image(payload: &CompressedImage, operation: &'static str) -> ImageBuffer<Rgba8> {
    match decode_rgba(&payload.data) {
        Ok((w, h, data)) => {
            let pixels: Vec<Rgba8> = data
                .chunks_exact(4)
                .map(|px| [px[0], px[1], px[2], px[3]])
                .collect();
            ImageBuffer::from_data(w, h, pixels)
        }
        Err(e) => {
            error!(component = "frame_codec", operation, error = %e, "decompression failed");
            ImageBuffer::new()
        }
    }
}

fn decompress_u16_image(payload: &CompressedImage, operation: &'static str) -> ImageBuffer<u16> {
    match decode_u16(&payload.data) {
        Ok(data) if data.len() == payload.width * payload.height => {
            ImageBuffer::from_data(payload.width, payload.height, data)
        }
        Ok(data) => {
            error!(
                component = "frame_codec",
                operation,
                expected = payload.width * payload.height,
                actual = data.len(),
                "decoded element count disagrees with geometry"
            );
            ImageBuffer::new()
        }
        Err(e) => {
            error!(component = "frame_codec", operation, error = %e, "decompression failed");
            ImageBuffer::new()
        }
    }
}

fn compress_cloud(frame: &Frame) -> CompressedCloud {
    let merged = frame.mode == CaptureMode::Merged;
    let (coords, rgb) = flatten_cloud(&frame.cloud, merged);

    let count = frame.cloud.len();
    let width = count.min(CLOUD_COLOR_MAX_WIDTH).max(1);
    let height = count.div_ceil(width);

    let mut padded = rgb;
    padded.resize(width * height * 3, 0);

    match encode_rgb(width, height, &padded, LOSSLESS_QUALITY) {
        Ok(data) => CompressedCloud {
            coords: encode_u16(&coords),
            colors: CompressedImage {
                width,
                height,
                mode: CompressionMode::ImageCodec,
                data,
            },
        },
        Err(e) => {
            error!(component = "frame_codec", operation = "cloud", error = %e, "compression failed");
            CompressedCloud::default()
        }
    }
}

fn decompress_cloud(cframe: &CompressedFrame, frame: &mut Frame) {
    let count = cframe.valid_vertices_count;
    let merged = cframe.mode == CaptureMode::Merged;

    let coords = match decode_u16(&cframe.cloud.coords) {
        Ok(coords) => coords,
        Err(e) => {
            error!(component = "frame_codec", operation = "cloud", error = %e, "decompression failed");
            return;
        }
    };

    let rgb = match decode_rgb(&cframe.cloud.colors.data) {
        Ok((_, _, rgb)) => rgb,
        Err(e) => {
            error!(component = "frame_codec", operation = "cloud_colors", error = %e, "decompression failed");
            return;
        }
    };

    unflatten_cloud(&coords, &rgb, count, merged, &mut frame.cloud);
}
