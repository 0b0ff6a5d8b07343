//! Flattened colored-cloud layout
//!
//! Vertices are quantized to millimetres and bias-offset into u16 planes
//! laid out XXYYZZ; colors become a packed RGB plane. Camera-relative
//! frames negate X/Y and bias by +4096; the merged/world variant keeps the
//! axis signs and biases all three coordinates by +32768.

use contracts::PointCloud;
use nalgebra::Vector3;

/// Coordinate bias for camera-relative clouds
pub const CAMERA_BIAS_MM: f32 = 4096.0;

/// Coordinate bias for merged/world clouds
pub const WORLD_BIAS_MM: f32 = 32768.0;

/// Flatten a cloud into u16 coordinate planes (XXYYZZ) and an RGB plane
pub fn flatten_cloud(cloud: &PointCloud, merged: bool) -> (Vec<u16>, Vec<u8>) {
    let n = cloud.len();
    let mut coords = vec![0u16; n * 3];
    let mut rgb = vec![0u8; n * 3];

    for (id, v) in cloud.vertices.iter().enumerate() {
        let (x, y, z) = if merged {
            (
                v.x * 1000.0 + WORLD_BIAS_MM,
                v.y * 1000.0 + WORLD_BIAS_MM,
                v.z * 1000.0 + WORLD_BIAS_MM,
            )
        } else {
            (
                -v.x * 1000.0 + CAMERA_BIAS_MM,
                -v.y * 1000.0 + CAMERA_BIAS_MM,
                v.z * 1000.0,
            )
        };
        coords[id] = x.round().clamp(0.0, 65535.0) as u16;
        coords[n + id] = y.round().clamp(0.0, 65535.0) as u16;
        coords[2 * n + id] = z.round().clamp(0.0, 65535.0) as u16;
    }

    for (id, c) in cloud.colors.iter().enumerate() {
        rgb[3 * id] = (c.x * 255.0).round().clamp(0.0, 255.0) as u8;
        rgb[3 * id + 1] = (c.y * 255.0).round().clamp(0.0, 255.0) as u8;
        rgb[3 * id + 2] = (c.z * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    (coords, rgb)
}

/// Rebuild a cloud from flattened planes.
///
/// Normals are not carried on the wire; the output cloud gets zero normals
/// of matching length to preserve the parallel-array invariant.
pub fn unflatten_cloud(coords: &[u16], rgb: &[u8], count: usize, merged: bool, out: &mut PointCloud) {
    out.clear();
    if coords.len() < count * 3 || rgb.len() < count * 3 {
        return;
    }

    out.vertices.reserve(count);
    out.colors.reserve(count);
    for id in 0..count {
        let (xu, yu, zu) = (
            coords[id] as f32,
            coords[count + id] as f32,
            coords[2 * count + id] as f32,
        );
        let vertex = if merged {
            Vector3::new(
                (xu - WORLD_BIAS_MM) * 1e-3,
                (yu - WORLD_BIAS_MM) * 1e-3,
                (zu - WORLD_BIAS_MM) * 1e-3,
            )
        } else {
            Vector3::new(
                -(xu - CAMERA_BIAS_MM) * 1e-3,
                -(yu - CAMERA_BIAS_MM) * 1e-3,
                zu * 1e-3,
            )
        };
        out.vertices.push(vertex);
        out.colors.push(Vector3::new(
            rgb[3 * id] as f32 / 255.0,
            rgb[3 * id + 1] as f32 / 255.0,
            rgb[3 * id + 2] as f32 / 255.0,
        ));
    }
    out.normals.resize(count, Vector3::zeros());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cloud(n: usize) -> PointCloud {
        let mut cloud = PointCloud::default();
        for i in 0..n {
            let t = i as f32;
            cloud.vertices.push(Vector3::new(
                (t * 0.013) % 2.0 - 1.0,
                (t * 0.007) % 1.5 - 0.75,
                1.0 + (t * 0.011) % 2.5,
            ));
            cloud.colors.push(Vector3::new(
                (i % 256) as f32 / 255.0,
                ((i * 7) % 256) as f32 / 255.0,
                ((i * 13) % 256) as f32 / 255.0,
            ));
            cloud.normals.push(Vector3::zeros());
        }
        cloud
    }

    #[test]
    fn test_camera_roundtrip_within_1mm_colors_exact() {
        let cloud = sample_cloud(256);
        let (coords, rgb) = flatten_cloud(&cloud, false);

        let mut back = PointCloud::default();
        unflatten_cloud(&coords, &rgb, 256, false, &mut back);

        assert_eq!(back.len(), 256);
        for (a, b) in cloud.vertices.iter().zip(back.vertices.iter()) {
            assert!((a - b).norm() <= 1.0e-3 * 1.8, "{a:?} vs {b:?}");
            assert!((a.x - b.x).abs() <= 1.0e-3);
            assert!((a.y - b.y).abs() <= 1.0e-3);
            assert!((a.z - b.z).abs() <= 1.0e-3);
        }
        for (a, b) in cloud.colors.iter().zip(back.colors.iter()) {
            assert_eq!(
                (a * 255.0).map(|c| c.round()),
                (b * 255.0).map(|c| c.round())
            );
        }
    }

    #[test]
    fn test_world_bias_keeps_axis_signs() {
        let mut cloud = PointCloud::default();
        cloud.vertices.push(Vector3::new(-2.5, 3.5, -1.0));
        cloud.colors.push(Vector3::new(0.5, 0.5, 0.5));
        cloud.normals.push(Vector3::zeros());

        let (coords, rgb) = flatten_cloud(&cloud, true);
        let mut back = PointCloud::default();
        unflatten_cloud(&coords, &rgb, 1, true, &mut back);

        let v = back.vertices[0];
        assert!((v.x + 2.5).abs() < 1.0e-3);
        assert!((v.y - 3.5).abs() < 1.0e-3);
        assert!((v.z + 1.0).abs() < 1.0e-3);
    }

    #[test]
    fn test_short_planes_yield_empty_cloud() {
        let mut out = PointCloud::default();
        unflatten_cloud(&[0u16; 5], &[0u8; 5], 10, false, &mut out);
        assert!(out.is_empty());
    }
}
