//! Tagged image buffers shared by frames and engines

use serde::{Deserialize, Serialize};

/// Packed 8-bit RGB pixel
pub type Rgb8 = [u8; 3];

/// Packed 8-bit RGBA pixel
pub type Rgba8 = [u8; 4];

/// Width/height-tagged pixel buffer
///
/// An empty buffer (zero pixels) means "absent for this cycle"; engines and
/// codecs treat absence as non-fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageBuffer<T> {
    pub width: usize,
    pub height: usize,
    pub data: Vec<T>,
}

impl<T: Copy + Default> ImageBuffer<T> {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    /// Allocate a buffer of `width * height` default pixels
    pub fn sized(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }

    pub fn from_data(width: usize, height: usize, data: Vec<T>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resize for a new geometry, reusing the allocation
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data.resize(width * height, T::default());
    }

    /// Mark the buffer absent without releasing the allocation
    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.data.clear();
    }
}
