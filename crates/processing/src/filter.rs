//! Multi-stage depth validity-mask computation
//!
//! Stages run in a fixed order, each consuming a frozen snapshot of the mask
//! produced by the previous stage. Stages 1-4 are data-parallel; the
//! largest-component stage is a sequential flood fill.

use contracts::{Connectivity, FilterSettings, ModeInfo, Rgba8, INVALID_INFRA_VALUE};
use rayon::prelude::*;
use std::collections::VecDeque;

use crate::{DepthIndices, ProcessingError};

/// Standard RGB -> HSV, hue in [0, 360), s/v in [0, 1]
fn rgb_to_hsv(rgb: [u8; 3]) -> [f32; 3] {
    let r = rgb[0] as f32 / 255.0;
    let g = rgb[1] as f32 / 255.0;
    let b = rgb[2] as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    if h < 0.0 {
        h += 360.0;
    }

    let s = if max == 0.0 { 0.0 } else { delta / max };
    [h, s, max]
}

/// Outcome of one filter pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterReport {
    /// Pixels surviving all stages
    pub valid_count: usize,
    /// Centroid pixel id of the retained component, when stage 5 ran
    pub centroid_id: Option<usize>,
}

/// Depth validity-mask engine with reusable scratch buffers
#[derive(Debug, Default)]
pub struct DepthFilterEngine {
    depth_mask: Vec<u8>,
    scratch_mask: Vec<u8>,
    zones: Vec<i32>,
    queue: VecDeque<usize>,
}

impl DepthFilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validity mask of the last pass (1 = valid)
    pub fn mask(&self) -> &[u8] {
        &self.depth_mask
    }

    /// Run all enabled stages over one depth buffer.
    ///
    /// Invalidated pixels get the mode sentinel written into `depth`; the
    /// dense vertex correspondence is rebuilt into `indices`.
    pub fn apply(
        &mut self,
        mode: &ModeInfo,
        settings: &FilterSettings,
        indices: &mut DepthIndices,
        depth: &mut [u16],
        depth_sized_color: Option<&mut [Rgba8]>,
        infra: Option<&mut [u16]>,
    ) -> Result<FilterReport, ProcessingError> {
        let size = indices.len();
        if depth.len() != size {
            return Err(ProcessingError::BufferMismatch {
                operation: "filter_depth",
                expected: size,
                actual: depth.len(),
            });
        }
        if let Some(color) = depth_sized_color.as_deref() {
            if color.len() != size {
                return Err(ProcessingError::BufferMismatch {
                    operation: "filter_depth_sized_color",
                    expected: size,
                    actual: color.len(),
                });
            }
        }
        if let Some(ir) = infra.as_deref() {
            if ir.len() != size {
                return Err(ProcessingError::BufferMismatch {
                    operation: "filter_infra",
                    expected: size,
                    actual: ir.len(),
                });
            }
        }

        self.depth_mask.clear();
        self.depth_mask.resize(size, 1);
        self.scratch_mask.resize(size, 0);

        self.stage_bounds(mode, settings, indices, depth, depth_sized_color.as_deref());

        if settings.local_diff_enabled {
            self.stage_local_diff(settings, indices, depth);
        }
        if settings.min_neighbours_enabled {
            self.stage_min_neighbours(settings, indices);
        }
        if settings.erosion_enabled {
            self.stage_erode(settings, indices);
        }

        let centroid_id = if settings.keep_largest_component {
            self.stage_largest_component(indices)
        } else {
            None
        };

        let valid_count = self.finalize(mode, indices, depth);

        let sentinel = mode.depth_sentinel;
        if settings.invalidate_color_from_depth {
            if let Some(color) = depth_sized_color {
                color
                    .par_iter_mut()
                    .zip(depth.par_iter())
                    .for_each(|(px, &d)| {
                        if d == sentinel {
                            *px = [0, 0, 0, 0];
                        }
                    });
            }
        }
        if settings.invalidate_infra_from_depth {
            if let Some(ir) = infra {
                ir.par_iter_mut().zip(depth.par_iter()).for_each(|(v, &d)| {
                    if d == sentinel {
                        *v = INVALID_INFRA_VALUE;
                    }
                });
            }
        }

        Ok(FilterReport {
            valid_count,
            centroid_id,
        })
    }

    /// Stage 1: sentinel, depth bounds, crop box, HSV color distance
    fn stage_bounds(
        &mut self,
        mode: &ModeInfo,
        settings: &FilterSettings,
        indices: &DepthIndices,
        depth: &[u16],
        depth_sized_color: Option<&[Rgba8]>,
    ) {
        let range = mode.depth_range_mm;
        let span = mode.depth_range_span();
        let min_d = range[0] + settings.min_depth_f * span;
        let max_d = range[0] + settings.max_depth_f * span;
        let min_x = indices.width() as f32 * settings.min_width_f;
        let max_x = indices.width() as f32 * settings.max_width_f;
        let min_y = indices.height() as f32 * settings.min_height_f;
        let max_y = indices.height() as f32 * settings.max_height_f;
        let sentinel = mode.depth_sentinel;

        let target_hsv = rgb_to_hsv(settings.filter_color);
        let max_diff = settings.max_diff_hsv;
        let color = if settings.filter_depth_with_color {
            depth_sized_color
        } else {
            None
        };

        self.depth_mask
            .par_iter_mut()
            .zip(indices.coords.par_iter())
            .for_each(|(mask, &(id, x, y))| {
                let id = id as usize;
                let d = depth[id];
                if d == sentinel {
                    *mask = 0;
                    return;
                }

                let (xf, yf) = (x as f32, y as f32);
                if xf < min_x || xf > max_x || yf < min_y || yf > max_y {
                    *mask = 0;
                    return;
                }

                let dmm = d as f32;
                if dmm < min_d || dmm > max_d {
                    *mask = 0;
                    return;
                }

                if let Some(color) = color {
                    let px = color[id];
                    let hsv = rgb_to_hsv([px[0], px[1], px[2]]);
                    if (hsv[0] - target_hsv[0]).abs() > max_diff[0]
                        || (hsv[1] - target_hsv[1]).abs() > max_diff[1]
                        || (hsv[2] - target_hsv[2]).abs() > max_diff[2]
                    {
                        *mask = 0;
                    }
                }
            });
    }

    /// Stage 2: mean absolute depth difference to currently-valid neighbors.
    /// Border pixels have no full neighborhood and are invalidated.
    fn stage_local_diff(
        &mut self,
        settings: &FilterSettings,
        indices: &DepthIndices,
        depth: &[u16],
    ) {
        let mask = &self.depth_mask;
        let max_diff = settings.max_local_diff;
        let connectivity = settings.local_diff_connectivity;

        self.scratch_mask
            .par_iter_mut()
            .enumerate()
            .for_each(|(id, keep)| {
                *keep = 0;
                let n8 = &indices.neighbours_8[id];
                // interior iff both opposite corners exist
                if n8[0] < 0 || n8[7] < 0 {
                    return;
                }
                if mask[id] == 0 {
                    return;
                }

                let current = depth[id] as f32;
                let neighbors: &[i32] = match connectivity {
                    Connectivity::Four => &indices.neighbours_4[id],
                    Connectivity::Eight => n8,
                };

                let mut sum = 0.0f32;
                let mut count = 0u32;
                for &n in neighbors {
                    let n = n as usize;
                    if mask[n] == 1 {
                        sum += (depth[n] as f32 - current).abs();
                        count += 1;
                    }
                }
                if count > 0 && sum / count as f32 <= max_diff {
                    *keep = 1;
                }
            });

        self.merge_keep_mask();
    }

    /// Stage 3: too few valid neighbors. Border pixels are left alone.
    fn stage_min_neighbours(&mut self, settings: &FilterSettings, indices: &DepthIndices) {
        for _ in 0..settings.min_neighbours_loops {
            let mask = &self.depth_mask;
            let min_count = settings.min_neighbours_count as u32;
            let connectivity = settings.min_neighbours_connectivity;

            self.scratch_mask
                .par_iter_mut()
                .enumerate()
                .for_each(|(id, keep)| {
                    *keep = 1;
                    let n8 = &indices.neighbours_8[id];
                    if n8[0] < 0 || n8[7] < 0 {
                        return;
                    }
                    if mask[id] == 0 {
                        return;
                    }

                    let neighbors: &[i32] = match connectivity {
                        Connectivity::Four => &indices.neighbours_4[id],
                        Connectivity::Eight => n8,
                    };
                    let count = neighbors.iter().filter(|&&n| mask[n as usize] == 1).count();
                    if (count as u32) < min_count {
                        *keep = 0;
                    }
                });

            self.merge_keep_mask();
        }
    }

    /// Stage 4: erosion, a pixel survives only with a fully valid
    /// neighborhood. Border pixels are invalidated.
    fn stage_erode(&mut self, settings: &FilterSettings, indices: &DepthIndices) {
        for _ in 0..settings.erosion_loops {
            let mask = &self.depth_mask;
            let connectivity = settings.erosion_connectivity;

            self.scratch_mask
                .par_iter_mut()
                .enumerate()
                .for_each(|(id, keep)| {
                    *keep = 0;
                    let n8 = &indices.neighbours_8[id];
                    if n8[0] < 0 || n8[7] < 0 {
                        return;
                    }
                    if mask[id] == 0 {
                        return;
                    }

                    let neighbors: &[i32] = match connectivity {
                        Connectivity::Four => &indices.neighbours_4[id],
                        Connectivity::Eight => n8,
                    };
                    if neighbors.iter().all(|&n| mask[n as usize] == 1) {
                        *keep = 1;
                    }
                });

            self.merge_keep_mask();
        }
    }

    fn merge_keep_mask(&mut self) {
        self.depth_mask
            .par_iter_mut()
            .zip(self.scratch_mask.par_iter())
            .for_each(|(mask, &keep)| {
                if keep == 0 {
                    *mask = 0;
                }
            });
    }

    /// Stage 5: keep only the biggest 8-connected valid component.
    /// Sequential by necessity; breadth-first with an explicit queue.
    fn stage_largest_component(&mut self, indices: &DepthIndices) -> Option<usize> {
        let size = indices.len();
        self.zones.clear();
        self.zones.resize(size, 0);

        let mut current_zone = 1i32;
        let mut biggest_zone = 0i32;
        let mut biggest_size = 0usize;

        for start in 0..size {
            if self.zones[start] != 0 || self.depth_mask[start] == 0 {
                continue;
            }

            let mut count = 0usize;
            self.queue.clear();
            self.queue.push_back(start);

            while let Some(id) = self.queue.pop_front() {
                if self.zones[id] != 0 || self.depth_mask[id] == 0 {
                    continue;
                }
                self.zones[id] = current_zone;
                count += 1;

                for &n in &indices.neighbours_8[id] {
                    if n >= 0 {
                        self.queue.push_back(n as usize);
                    }
                }
            }

            if count > biggest_size {
                biggest_size = count;
                biggest_zone = current_zone;
            }
            current_zone += 1;
        }

        if biggest_zone == 0 {
            return None;
        }

        let mut sum_x = 0usize;
        let mut sum_y = 0usize;
        let mut kept = 0usize;
        for &(id, x, y) in &indices.coords {
            let id = id as usize;
            if self.zones[id] != biggest_zone {
                self.depth_mask[id] = 0;
            }
            if self.depth_mask[id] == 1 {
                sum_x += x as usize;
                sum_y += y as usize;
                kept += 1;
            }
        }
        if kept == 0 {
            return None;
        }
        Some((sum_y / kept) * indices.width() + sum_x / kept)
    }

    /// Stage 6: write sentinels, recount, rebuild the dense correspondence
    fn finalize(&mut self, mode: &ModeInfo, indices: &mut DepthIndices, depth: &mut [u16]) -> usize {
        indices.vertex_pixels.clear();
        let mut valid = 0i32;
        for (id, d) in depth.iter_mut().enumerate() {
            if self.depth_mask[id] == 0 {
                *d = mode.depth_sentinel;
                indices.vertex_correspondence[id] = -1;
            } else {
                indices.vertex_correspondence[id] = valid;
                indices.vertex_pixels.push(id as u32);
                valid += 1;
            }
        }
        valid as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CaptureMode;

    fn test_mode(w: usize, h: usize) -> ModeInfo {
        let mut info = CaptureMode::NarrowFov720p.info(30);
        info.depth_width = w;
        info.depth_height = h;
        info.infra_width = w;
        info.infra_height = h;
        info.depth_range_mm = [0.0, 4000.0];
        info
    }

    fn passthrough_settings() -> FilterSettings {
        FilterSettings {
            local_diff_enabled: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_bounds_stage_property() {
        let mode = test_mode(8, 8);
        let settings = FilterSettings {
            min_depth_f: 0.25,
            max_depth_f: 0.75,
            min_width_f: 0.25,
            max_width_f: 0.75,
            min_height_f: 0.25,
            max_height_f: 0.75,
            ..passthrough_settings()
        };

        let mut indices = DepthIndices::new();
        indices.build(8, 8);
        let mut depth: Vec<u16> = (0..64).map(|i| (i as u16) * 70).collect();

        let mut engine = DepthFilterEngine::new();
        let report = engine
            .apply(&mode, &settings, &mut indices, &mut depth, None, None)
            .unwrap();

        assert!(report.valid_count > 0);
        for &(id, x, y) in &indices.coords {
            let d = depth[id as usize];
            if d != mode.depth_sentinel {
                assert!((1000.0..=3000.0).contains(&(d as f32)));
                assert!((2.0..=6.0).contains(&(x as f32)));
                assert!((2.0..=6.0).contains(&(y as f32)));
            }
        }
    }

    #[test]
    fn test_flood_fill_keeps_biggest_region() {
        // 5x5 grid: a 3-pixel region top-left, a 7-pixel region bottom-right
        let mode = test_mode(5, 5);
        let settings = FilterSettings {
            keep_largest_component: true,
            ..passthrough_settings()
        };

        let mut depth = vec![0u16; 25];
        let small = [0usize, 1, 5];
        let big = [13usize, 14, 17, 18, 19, 23, 24];
        for &id in small.iter().chain(big.iter()) {
            depth[id] = 1500;
        }

        let mut indices = DepthIndices::new();
        indices.build(5, 5);
        let mut engine = DepthFilterEngine::new();
        let report = engine
            .apply(&mode, &settings, &mut indices, &mut depth, None, None)
            .unwrap();

        assert_eq!(report.valid_count, 7);
        for &id in &small {
            assert_eq!(depth[id], mode.depth_sentinel);
        }
        for &id in &big {
            assert_eq!(depth[id], 1500);
        }
        assert!(report.centroid_id.is_some());
    }

    #[test]
    fn test_largest_component_is_idempotent() {
        let mode = test_mode(6, 6);
        let settings = FilterSettings {
            keep_largest_component: true,
            ..passthrough_settings()
        };

        let mut depth = vec![0u16; 36];
        for id in [0, 1, 6, 7, 20, 21, 26, 27, 33] {
            depth[id] = 2000;
        }

        let mut indices = DepthIndices::new();
        indices.build(6, 6);
        let mut engine = DepthFilterEngine::new();

        let first = engine
            .apply(&mode, &settings, &mut indices, &mut depth, None, None)
            .unwrap();
        let after_first = depth.clone();

        let second = engine
            .apply(&mode, &settings, &mut indices, &mut depth, None, None)
            .unwrap();

        assert_eq!(first.valid_count, second.valid_count);
        assert_eq!(after_first, depth);
    }

    #[test]
    fn test_local_diff_rejects_outliers() {
        let mode = test_mode(5, 5);
        let settings = FilterSettings {
            local_diff_enabled: true,
            max_local_diff: 50.0,
            local_diff_connectivity: Connectivity::Four,
            ..Default::default()
        };

        let mut depth = vec![1000u16; 25];
        depth[12] = 3000; // spike in the middle

        let mut indices = DepthIndices::new();
        indices.build(5, 5);
        let mut engine = DepthFilterEngine::new();
        let report = engine
            .apply(&mode, &settings, &mut indices, &mut depth, None, None)
            .unwrap();

        // the spike dies, and so do the four pixels averaging against it
        assert_eq!(depth[12], mode.depth_sentinel);
        assert_eq!(depth[7], mode.depth_sentinel);
        assert_eq!(depth[11], mode.depth_sentinel);
        // diagonal interior pixels never see the spike under 4-connectivity
        assert_eq!(depth[6], 1000);
        // borders have no full neighborhood under this stage
        assert_eq!(report.valid_count, 4);
    }

    #[test]
    fn test_erosion_peels_region_edge() {
        let mode = test_mode(7, 7);
        let settings = FilterSettings {
            erosion_enabled: true,
            erosion_loops: 1,
            erosion_connectivity: Connectivity::Eight,
            ..passthrough_settings()
        };

        // 5x5 valid block centered in a 7x7 grid
        let mut depth = vec![0u16; 49];
        for y in 1..6 {
            for x in 1..6 {
                depth[y * 7 + x] = 1200;
            }
        }

        let mut indices = DepthIndices::new();
        indices.build(7, 7);
        let mut engine = DepthFilterEngine::new();
        let report = engine
            .apply(&mode, &settings, &mut indices, &mut depth, None, None)
            .unwrap();

        // only the inner 3x3 survives
        assert_eq!(report.valid_count, 9);
        assert_eq!(depth[3 * 7 + 3], 1200);
        assert_eq!(depth[7 + 1], mode.depth_sentinel);
    }

    #[test]
    fn test_correspondence_matches_valid_count() {
        let mode = test_mode(4, 4);
        let settings = passthrough_settings();

        let mut depth = vec![0u16; 16];
        depth[5] = 900;
        depth[6] = 900;
        depth[10] = 900;

        let mut indices = DepthIndices::new();
        indices.build(4, 4);
        let mut engine = DepthFilterEngine::new();
        let report = engine
            .apply(&mode, &settings, &mut indices, &mut depth, None, None)
            .unwrap();

        assert_eq!(report.valid_count, 3);
        assert_eq!(indices.vertex_pixels, vec![5, 6, 10]);
        assert_eq!(indices.vertex_correspondence[5], 0);
        assert_eq!(indices.vertex_correspondence[6], 1);
        assert_eq!(indices.vertex_correspondence[10], 2);
        assert_eq!(indices.vertex_correspondence[0], -1);
    }

    #[test]
    fn test_color_invalidation_follows_mask() {
        let mode = test_mode(3, 3);
        let settings = FilterSettings {
            invalidate_color_from_depth: true,
            ..passthrough_settings()
        };

        let mut depth = vec![0u16; 9];
        depth[4] = 1000;
        let mut color = vec![[200u8, 200, 200, 255]; 9];

        let mut indices = DepthIndices::new();
        indices.build(3, 3);
        let mut engine = DepthFilterEngine::new();
        engine
            .apply(
                &mode,
                &settings,
                &mut indices,
                &mut depth,
                Some(&mut color),
                None,
            )
            .unwrap();

        assert_eq!(color[4], [200, 200, 200, 255]);
        assert_eq!(color[0], [0, 0, 0, 0]);
    }

    #[test]
    fn test_hsv_conversion_reference_points() {
        assert_eq!(rgb_to_hsv([255, 0, 0])[0], 0.0);
        assert_eq!(rgb_to_hsv([0, 255, 0])[0], 120.0);
        assert_eq!(rgb_to_hsv([0, 0, 255])[0], 240.0);
        let gray = rgb_to_hsv([128, 128, 128]);
        assert_eq!(gray[0], 0.0);
        assert_eq!(gray[1], 0.0);
    }
}
