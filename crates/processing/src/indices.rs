//! Precomputed per-resolution pixel adjacency graph
//!
//! Built once per configuration and rebuilt only when the depth resolution
//! changes, never per frame. Neighbor ids use -1 at image borders.

/// Neighbor layout around pixel I:
///
/// ```text
/// A B C
/// D I E
/// F G H
/// ```
#[derive(Debug, Default)]
pub struct DepthIndices {
    width: usize,
    height: usize,

    /// Horizontal pair [D, E] per pixel
    pub neighbours_2h: Vec<[i32; 2]>,
    /// Vertical pair [B, G] per pixel
    pub neighbours_2v: Vec<[i32; 2]>,
    /// Orthogonal neighbors [B, D, E, G] per pixel
    pub neighbours_4: Vec<[i32; 4]>,
    /// All neighbors [A, B, C, D, E, F, G, H] per pixel
    pub neighbours_8: Vec<[i32; 8]>,
    /// Pixels whose 8 neighbors are all in bounds
    pub no_border_ids: Vec<u32>,
    /// (id, x, y) per pixel
    pub coords: Vec<(u32, u32, u32)>,

    /// Depth pixel id -> vertex index, -1 for invalid pixels.
    /// Rebuilt by the filter engine's finalize step each cycle.
    pub vertex_correspondence: Vec<i32>,
    /// Vertex index -> depth pixel id, dense companion of the above
    pub vertex_pixels: Vec<u32>,
}

impl DepthIndices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel count of the indexed resolution
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the adjacency graph for a resolution. Idempotent; a no-op when
    /// the resolution is unchanged.
    pub fn build(&mut self, width: usize, height: usize) {
        if self.width == width && self.height == height && !self.coords.is_empty() {
            return;
        }
        tracing::debug!(width, height, "building depth indices");

        self.width = width;
        self.height = height;

        let size = width * height;
        let w = width as i32;

        self.neighbours_2h.clear();
        self.neighbours_2h.reserve(size);
        self.neighbours_2v.clear();
        self.neighbours_2v.reserve(size);
        self.neighbours_4.clear();
        self.neighbours_4.reserve(size);
        self.neighbours_8.clear();
        self.neighbours_8.reserve(size);
        self.no_border_ids.clear();
        self.no_border_ids
            .reserve(width.saturating_sub(2) * height.saturating_sub(2));
        self.coords.clear();
        self.coords.reserve(size);

        self.vertex_correspondence.clear();
        self.vertex_correspondence.resize(size, -1);
        self.vertex_pixels.clear();

        let mut id: i32 = 0;
        for y in 0..height {
            for x in 0..width {
                let not_left = x > 0;
                let not_right = x < width - 1;
                let not_top = y > 0;
                let not_bottom = y < height - 1;

                let id_a = if not_left && not_top { id - w - 1 } else { -1 };
                let id_b = if not_top { id - w } else { -1 };
                let id_c = if not_right && not_top { id - w + 1 } else { -1 };
                let id_d = if not_left { id - 1 } else { -1 };
                let id_e = if not_right { id + 1 } else { -1 };
                let id_f = if not_left && not_bottom { id + w - 1 } else { -1 };
                let id_g = if not_bottom { id + w } else { -1 };
                let id_h = if not_right && not_bottom { id + w + 1 } else { -1 };

                self.neighbours_2h.push([id_d, id_e]);
                self.neighbours_2v.push([id_b, id_g]);
                self.neighbours_4.push([id_b, id_d, id_e, id_g]);
                self.neighbours_8
                    .push([id_a, id_b, id_c, id_d, id_e, id_f, id_g, id_h]);

                if not_left && not_right && not_top && not_bottom {
                    self.no_border_ids.push(id as u32);
                }
                self.coords.push((id as u32, x as u32, y as u32));
                id += 1;
            }
        }
    }
}
