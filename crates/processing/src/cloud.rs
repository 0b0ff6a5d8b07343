//! Colored, normal-bearing point cloud reconstruction
//!
//! Projects every valid depth pixel into 3D through the device unprojection
//! capability, normalizes the axis convention (negate X/Y, keep Z) and
//! scales millimetres to metres.

use contracts::{CloudColorMode, ModeInfo, PointCloud, Rgba8, Unprojector};
use nalgebra::Vector3;
use rayon::prelude::*;

use crate::DepthIndices;

/// 5-stop hue gradient used for depth-derived colors, blue to red
pub const DEPTH_GRADIENT: [[f32; 3]; 5] = [
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [1.0, 0.0, 0.0],
];

/// Gradient color for a depth value, linearly interpolated between stops
pub fn depth_gradient_color(depth_mm: f32, min_mm: f32, span_mm: f32) -> Vector3<f32> {
    let t = if span_mm > 0.0 {
        ((depth_mm - min_mm) / span_mm).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let scaled = t * (DEPTH_GRADIENT.len() - 1) as f32;
    let idx = (scaled as usize).min(DEPTH_GRADIENT.len() - 2);
    let frac = scaled - idx as f32;

    let a = DEPTH_GRADIENT[idx];
    let b = DEPTH_GRADIENT[idx + 1];
    Vector3::new(
        a[0] * (1.0 - frac) + b[0] * frac,
        a[1] * (1.0 - frac) + b[1] * frac,
        a[2] * (1.0 - frac) + b[2] * frac,
    )
}

/// Rebuilds the colored point cloud from the filtered depth image
#[derive(Debug, Default)]
pub struct CloudReconstructor;

impl CloudReconstructor {
    pub fn new() -> Self {
        Self
    }

    /// Fill `cloud` from the current vertex correspondence.
    ///
    /// Array lengths equal the valid-vertex count of the last filter pass.
    pub fn reconstruct(
        &self,
        mode: &ModeInfo,
        indices: &DepthIndices,
        depth: &[u16],
        depth_sized_color: Option<&[Rgba8]>,
        color_mode: CloudColorMode,
        unprojector: &dyn Unprojector,
        cloud: &mut PointCloud,
    ) {
        let pixels = &indices.vertex_pixels;
        let width = indices.width();
        if pixels.is_empty() || width == 0 {
            cloud.clear();
            return;
        }

        pixels
            .par_iter()
            .map(|&id| {
                let id = id as usize;
                let (x, y) = (id % width, id / width);
                match unprojector.unproject(x, y, depth[id]) {
                    Some(p) => Vector3::new(-p.x, -p.y, p.z) * 1e-3,
                    None => Vector3::zeros(),
                }
            })
            .collect_into_vec(&mut cloud.vertices);

        let use_image_colors = matches!(color_mode, CloudColorMode::DepthSizedColor)
            && depth_sized_color.is_some_and(|c| c.len() == depth.len());
        let range_min = mode.depth_range_mm[0];
        let range_span = mode.depth_range_span();

        pixels
            .par_iter()
            .map(|&id| {
                let id = id as usize;
                if use_image_colors {
                    let px = depth_sized_color.map(|c| c[id]).unwrap_or_default();
                    Vector3::new(px[0] as f32, px[1] as f32, px[2] as f32) / 255.0
                } else {
                    depth_gradient_color(depth[id] as f32, range_min, range_span)
                }
            })
            .collect_into_vec(&mut cloud.colors);

        self.compute_normals(indices, cloud);
    }

    /// Normal per vertex: normalized sum of up to 4 cross products between
    /// vectors to the axis-adjacent valid neighbor vertices, walked in
    /// cyclic order. A zero-length accumulator stays the zero vector.
    fn compute_normals(&self, indices: &DepthIndices, cloud: &mut PointCloud) {
        let pixels = &indices.vertex_pixels;
        let correspondence = &indices.vertex_correspondence;
        let vertices = &cloud.vertices;

        (0..vertices.len())
            .into_par_iter()
            .map(|vertex_id| {
                let id = pixels[vertex_id] as usize;
                // [B, D, E, G] = top, left, right, bottom
                let n4 = indices.neighbours_4[id];
                let vertex = vertices[vertex_id];

                let neighbor = |k: usize| -> Option<Vector3<f32>> {
                    let n = n4[k];
                    if n < 0 {
                        return None;
                    }
                    let c = correspondence[n as usize];
                    if c < 0 {
                        None
                    } else {
                        Some(vertices[c as usize])
                    }
                };

                let top = neighbor(0);
                let left = neighbor(1);
                let right = neighbor(2);
                let bottom = neighbor(3);

                let mut normal = Vector3::zeros();
                for (p, q) in [
                    (right, top),
                    (top, left),
                    (left, bottom),
                    (bottom, right),
                ] {
                    if let (Some(p), Some(q)) = (p, q) {
                        normal += (p - vertex).cross(&(q - vertex));
                    }
                }

                let length = normal.norm();
                if length > 0.0 {
                    normal / length
                } else {
                    Vector3::zeros()
                }
            })
            .collect_into_vec(&mut cloud.normals);
    }
}
