//! CompressedFrame wire/storage layout
//!
//! Fixed header (ids, timestamps, mode, valid-vertex count) followed by a
//! presence bitmap and one length-prefixed section per present field. All
//! integers are little-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::{
    AudioFrames, CaptureMode, CompressedFrame, CompressedImage, CompressionMode, ImuSample,
};

use crate::CodecError;

const PRESENT_CALIBRATION: u16 = 1 << 0;
const PRESENT_COLOR: u16 = 1 << 1;
const PRESENT_DEPTH_SIZED_COLOR: u16 = 1 << 2;
const PRESENT_DEPTH: u16 = 1 << 3;
const PRESENT_INFRA: u16 = 1 << 4;
const PRESENT_CLOUD: u16 = 1 << 5;
const PRESENT_IMU: u16 = 1 << 6;
const PRESENT_AUDIO: u16 = 1 << 7;
const PRESENT_BODIES_ID_MAP: u16 = 1 << 8;
const PRESENT_BODY_IDS: u16 = 1 << 9;

fn put_image(buf: &mut BytesMut, image: &CompressedImage) {
    buf.put_u32_le(image.width as u32);
    buf.put_u32_le(image.height as u32);
    buf.put_u8(image.mode as u8);
    buf.put_u32_le(image.data.len() as u32);
    buf.put_slice(&image.data);
}

fn get_image(buf: &mut &[u8]) -> Result<CompressedImage, CodecError> {
    if buf.remaining() < 13 {
        return Err(CodecError::Truncated {
            context: "image section header",
        });
    }
    let width = buf.get_u32_le() as usize;
    let height = buf.get_u32_le() as usize;
    let mode_tag = buf.get_u8();
    let mode = CompressionMode::from_u8(mode_tag).ok_or(CodecError::UnknownTag {
        field: "compression mode",
        value: mode_tag,
    })?;
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return Err(CodecError::Truncated {
            context: "image section payload",
        });
    }
    let data = buf[..len].to_vec();
    buf.advance(len);
    Ok(CompressedImage {
        width,
        height,
        mode,
        data,
    })
}

fn put_bytes(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32_le(data.len() as u32);
    buf.put_slice(data);
}

fn get_bytes(buf: &mut &[u8], context: &'static str) -> Result<Vec<u8>, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Truncated { context });
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return Err(CodecError::Truncated { context });
    }
    let data = buf[..len].to_vec();
    buf.advance(len);
    Ok(data)
}

/// Serialize a compressed frame into its wire form
pub fn encode_frame(frame: &CompressedFrame) -> Bytes {
    let mut presence = 0u16;
    if !frame.calibration.is_empty() {
        presence |= PRESENT_CALIBRATION;
    }
    if !frame.color.is_empty() {
        presence |= PRESENT_COLOR;
    }
    if !frame.depth_sized_color.is_empty() {
        presence |= PRESENT_DEPTH_SIZED_COLOR;
    }
    if !frame.depth.is_empty() {
        presence |= PRESENT_DEPTH;
    }
    if !frame.infra.is_empty() {
        presence |= PRESENT_INFRA;
    }
    if !frame.cloud.is_empty() {
        presence |= PRESENT_CLOUD;
    }
    if frame.imu.is_some() {
        presence |= PRESENT_IMU;
    }
    if !frame.audio.is_empty() {
        presence |= PRESENT_AUDIO;
    }
    if !frame.bodies_id_map.is_empty() {
        presence |= PRESENT_BODIES_ID_MAP;
    }
    if !frame.body_ids.is_empty() {
        presence |= PRESENT_BODY_IDS;
    }

    let mut buf = BytesMut::with_capacity(64);
    buf.put_i32_le(frame.id_capture);
    buf.put_i64_le(frame.after_capture_ts);
    buf.put_i64_le(frame.received_ts);
    buf.put_u8(frame.mode as u8);
    buf.put_u32_le(frame.valid_vertices_count as u32);
    buf.put_u16_le(presence);

    if presence & PRESENT_CALIBRATION != 0 {
        put_bytes(&mut buf, &frame.calibration);
    }
    if presence & PRESENT_COLOR != 0 {
        put_image(&mut buf, &frame.color);
    }
    if presence & PRESENT_DEPTH_SIZED_COLOR != 0 {
        put_image(&mut buf, &frame.depth_sized_color);
    }
    if presence & PRESENT_DEPTH != 0 {
        put_image(&mut buf, &frame.depth);
    }
    if presence & PRESENT_INFRA != 0 {
        put_image(&mut buf, &frame.infra);
    }
    if presence & PRESENT_CLOUD != 0 {
        put_bytes(&mut buf, &frame.cloud.coords);
        put_image(&mut buf, &frame.cloud.colors);
    }
    if presence & PRESENT_IMU != 0 {
        let imu = frame.imu.unwrap_or_default();
        for v in imu.accelerometer.iter().chain(imu.gyroscope.iter()) {
            buf.put_f32_le(*v);
        }
        buf.put_f32_le(imu.temperature);
        buf.put_i64_le(imu.acc_timestamp_ns);
        buf.put_i64_le(imu.gyr_timestamp_ns);
    }
    if presence & PRESENT_AUDIO != 0 {
        buf.put_u32_le(frame.audio.channels as u32);
        buf.put_u32_le(frame.audio.samples.len() as u32);
        for sample in &frame.audio.samples {
            buf.put_f32_le(*sample);
        }
    }
    if presence & PRESENT_BODIES_ID_MAP != 0 {
        put_image(&mut buf, &frame.bodies_id_map);
    }
    if presence & PRESENT_BODY_IDS != 0 {
        buf.put_u32_le(frame.body_ids.len() as u32);
        for id in &frame.body_ids {
            buf.put_u32_le(*id);
        }
    }

    buf.freeze()
}

/// Parse a wire payload back into a compressed frame
pub fn decode_frame(data: &[u8]) -> Result<CompressedFrame, CodecError> {
    let mut buf = data;
    if buf.remaining() < 4 + 8 + 8 + 1 + 4 + 2 {
        return Err(CodecError::Truncated {
            context: "frame header",
        });
    }

    let mut frame = CompressedFrame {
        id_capture: buf.get_i32_le(),
        after_capture_ts: buf.get_i64_le(),
        received_ts: buf.get_i64_le(),
        ..Default::default()
    };

    let mode_tag = buf.get_u8();
    frame.mode = CaptureMode::from_u8(mode_tag).ok_or(CodecError::UnknownTag {
        field: "capture mode",
        value: mode_tag,
    })?;
    frame.valid_vertices_count = buf.get_u32_le() as usize;
    let presence = buf.get_u16_le();

    if presence & PRESENT_CALIBRATION != 0 {
        frame.calibration = Bytes::from(get_bytes(&mut buf, "calibration")?);
    }
    if presence & PRESENT_COLOR != 0 {
        frame.color = get_image(&mut buf)?;
    }
    if presence & PRESENT_DEPTH_SIZED_COLOR != 0 {
        frame.depth_sized_color = get_image(&mut buf)?;
    }
    if presence & PRESENT_DEPTH != 0 {
        frame.depth = get_image(&mut buf)?;
    }
    if presence & PRESENT_INFRA != 0 {
        frame.infra = get_image(&mut buf)?;
    }
    if presence & PRESENT_CLOUD != 0 {
        frame.cloud.coords = get_bytes(&mut buf, "cloud coords")?;
        frame.cloud.colors = get_image(&mut buf)?;
    }
    if presence & PRESENT_IMU != 0 {
        if buf.remaining() < 7 * 4 + 2 * 8 {
            return Err(CodecError::Truncated { context: "imu" });
        }
        let mut imu = ImuSample::default();
        for v in imu
            .accelerometer
            .iter_mut()
            .chain(imu.gyroscope.iter_mut())
        {
            *v = buf.get_f32_le();
        }
        imu.temperature = buf.get_f32_le();
        imu.acc_timestamp_ns = buf.get_i64_le();
        imu.gyr_timestamp_ns = buf.get_i64_le();
        frame.imu = Some(imu);
    }
    if presence & PRESENT_AUDIO != 0 {
        if buf.remaining() < 8 {
            return Err(CodecError::Truncated { context: "audio" });
        }
        let channels = buf.get_u32_le() as usize;
        let count = buf.get_u32_le() as usize;
        if buf.remaining() < count * 4 {
            return Err(CodecError::Truncated { context: "audio" });
        }
        let mut audio = AudioFrames {
            channels,
            samples: Vec::with_capacity(count),
        };
        for _ in 0..count {
            audio.samples.push(buf.get_f32_le());
        }
        frame.audio = audio;
    }
    if presence & PRESENT_BODIES_ID_MAP != 0 {
        frame.bodies_id_map = get_image(&mut buf)?;
    }
    if presence & PRESENT_BODY_IDS != 0 {
        if buf.remaining() < 4 {
            return Err(CodecError::Truncated { context: "body ids" });
        }
        let count = buf.get_u32_le() as usize;
        if buf.remaining() < count * 4 {
            return Err(CodecError::Truncated { context: "body ids" });
        }
        frame.body_ids = (0..count).map(|_| buf.get_u32_le()).collect();
    }

    Ok(frame)
}
