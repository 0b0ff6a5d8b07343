//! Runtime settings records
//!
//! Plain records snapshotted by the pipeline thread at cycle start so that
//! mid-cycle changes never apply partially. Config-file loading lives in
//! `config_loader`; these are the validated in-memory forms.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Neighbor adjacency used by the mask stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Orthogonal neighbors only
    Four,
    /// Orthogonal + diagonal neighbors
    #[default]
    Eight,
}

/// Where cloud vertex colors come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudColorMode {
    /// Sample the depth-sized color image
    #[default]
    DepthSizedColor,
    /// 5-stop hue gradient over the normalized depth range
    DepthGradient,
}

/// Thresholds and flags for every depth filter stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FilterSettings {
    /// Fractional depth bounds within the mode range
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_depth_f: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_depth_f: f32,

    /// Fractional crop box
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_width_f: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_width_f: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_height_f: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_height_f: f32,

    /// HSV distance filter against a target color
    pub filter_depth_with_color: bool,
    /// Target color, packed RGB
    pub filter_color: [u8; 3],
    /// Max per-channel HSV distance (hue in degrees, s/v in [0,1])
    pub max_diff_hsv: [f32; 3],

    /// Mean-absolute-difference filter against valid neighbors
    pub local_diff_enabled: bool,
    /// Threshold in millimetres
    #[validate(range(min = 0.0))]
    pub max_local_diff: f32,
    pub local_diff_connectivity: Connectivity,

    /// Invalidate pixels with too few valid neighbors
    pub min_neighbours_enabled: bool,
    #[validate(range(min = 1))]
    pub min_neighbours_loops: u8,
    pub min_neighbours_count: u8,
    pub min_neighbours_connectivity: Connectivity,

    /// Invalidate pixels with any invalid neighbor
    pub erosion_enabled: bool,
    #[validate(range(min = 1))]
    pub erosion_loops: u8,
    pub erosion_connectivity: Connectivity,

    /// Keep only the biggest 8-connected valid component
    pub keep_largest_component: bool,

    /// Blank depth-sized color pixels whose depth is the sentinel
    pub invalidate_color_from_depth: bool,
    /// Blank infra pixels whose depth is the sentinel
    pub invalidate_infra_from_depth: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_depth_f: 0.0,
            max_depth_f: 1.0,
            min_width_f: 0.0,
            max_width_f: 1.0,
            min_height_f: 0.0,
            max_height_f: 1.0,
            filter_depth_with_color: false,
            filter_color: [0, 255, 0],
            max_diff_hsv: [40.0, 0.5, 0.5],
            local_diff_enabled: true,
            max_local_diff: 10.0,
            local_diff_connectivity: Connectivity::Four,
            min_neighbours_enabled: false,
            min_neighbours_loops: 1,
            min_neighbours_count: 1,
            min_neighbours_connectivity: Connectivity::Four,
            erosion_enabled: false,
            erosion_loops: 1,
            erosion_connectivity: Connectivity::Eight,
            keep_largest_component: false,
            invalidate_color_from_depth: false,
            invalidate_infra_from_depth: false,
        }
    }
}

/// Which substreams to read from the device each cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSelection {
    pub color: bool,
    pub depth: bool,
    pub infra: bool,
    pub imu: bool,
    pub audio: bool,
    pub bodies: bool,
}

impl Default for CaptureSelection {
    fn default() -> Self {
        Self {
            color: true,
            depth: true,
            infra: false,
            imu: false,
            audio: false,
            bodies: false,
        }
    }
}

/// Which buffers the local frame carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSelection {
    pub color_image: bool,
    pub depth_sized_color_image: bool,
    pub depth: bool,
    /// Gradient visualization of the depth image
    pub depth_image: bool,
    pub infra: bool,
    /// Grayscale visualization of the infra image
    pub infra_image: bool,
    pub cloud: bool,
    pub bodies_id_map: bool,
    pub imu: bool,
    pub audio: bool,
    pub calibration: bool,
    pub cloud_color_mode: CloudColorMode,
}

impl GenerationSelection {
    /// At least one buffer selected
    pub fn has_data_to_generate(&self) -> bool {
        self.color_image
            || self.depth_sized_color_image
            || self.depth
            || self.depth_image
            || self.infra
            || self.infra_image
            || self.cloud
            || self.bodies_id_map
            || self.imu
            || self.audio
            || self.calibration
    }
}

impl Default for GenerationSelection {
    fn default() -> Self {
        Self {
            color_image: true,
            depth_sized_color_image: true,
            depth: true,
            depth_image: true,
            infra: false,
            infra_image: false,
            cloud: true,
            bodies_id_map: false,
            imu: false,
            audio: false,
            calibration: true,
            cloud_color_mode: CloudColorMode::DepthSizedColor,
        }
    }
}

/// Which buffers the compressed frame carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CompressionSelection {
    pub color: bool,
    pub depth_sized_color: bool,
    pub depth: bool,
    pub infra: bool,
    pub cloud: bool,
    pub bodies_id_map: bool,
    pub imu: bool,
    pub audio: bool,
    pub calibration: bool,
    /// Image codec quality, 1-100 (100 = lossless)
    #[validate(range(min = 1, max = 100))]
    pub jpeg_quality: u8,
    pub cloud_color_mode: CloudColorMode,
}

impl CompressionSelection {
    /// At least one buffer selected
    pub fn has_data_to_compress(&self) -> bool {
        self.color
            || self.depth_sized_color
            || self.depth
            || self.infra
            || self.cloud
            || self.bodies_id_map
            || self.imu
            || self.audio
            || self.calibration
    }
}

impl Default for CompressionSelection {
    fn default() -> Self {
        Self {
            color: false,
            depth_sized_color: true,
            depth: true,
            infra: false,
            cloud: false,
            bodies_id_map: false,
            imu: false,
            audio: false,
            calibration: true,
            jpeg_quality: 80,
            cloud_color_mode: CloudColorMode::DepthSizedColor,
        }
    }
}

/// Substream reads plus local/compressed output selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSelectionSettings {
    pub capture: CaptureSelection,
    pub generation: GenerationSelection,
    pub compression: CompressionSelection,
}

/// Emission delay and buffering policy, per output channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DelaySettings {
    /// Frames are released once `now - capture_ts >= delay_ms`
    #[validate(range(min = 0))]
    pub delay_ms: i64,
    /// Delay buffer capacity; oldest entries are dropped on overflow
    #[validate(range(min = 1))]
    pub buffer_capacity: usize,
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            buffer_capacity: 30,
        }
    }
}

/// Device color-control settings, applied by the adapter at cycle start
///
/// Adapters ignore controls their hardware does not expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSettings {
    pub auto_exposure: bool,
    /// Manual exposure time in microseconds
    pub exposure_us: i32,
    pub auto_white_balance: bool,
    /// Manual white balance in kelvin
    pub white_balance_k: u16,
    pub brightness: u8,
    pub contrast: u8,
    pub saturation: u8,
    pub sharpness: u8,
    pub gain: u8,
    pub backlight_compensation: bool,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            auto_exposure: true,
            exposure_us: 33_000,
            auto_white_balance: true,
            white_balance_k: 4500,
            brightness: 128,
            contrast: 5,
            saturation: 5,
            sharpness: 2,
            gain: 0,
            backlight_compensation: false,
        }
    }
}

/// Everything the pipeline snapshots at cycle start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub filters: FilterSettings,
    pub data: DataSelectionSettings,
    pub delay: DelaySettings,
    pub color: ColorSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_defaults_are_valid() {
        assert!(FilterSettings::default().validate().is_ok());
        assert!(CompressionSelection::default().validate().is_ok());
        assert!(DelaySettings::default().validate().is_ok());
    }

    #[test]
    fn test_quality_out_of_range_rejected() {
        let selection = CompressionSelection {
            jpeg_quality: 0,
            ..Default::default()
        };
        assert!(selection.validate().is_err());
    }

    #[test]
    fn test_settings_serde_roundtrip() {
        let settings = PipelineSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: PipelineSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_empty_selection_has_nothing_to_do() {
        let generation = GenerationSelection {
            color_image: false,
            depth_sized_color_image: false,
            depth: false,
            depth_image: false,
            infra: false,
            infra_image: false,
            cloud: false,
            bodies_id_map: false,
            imu: false,
            audio: false,
            calibration: false,
            ..Default::default()
        };
        assert!(!generation.has_data_to_generate());
        assert!(GenerationSelection::default().has_data_to_generate());
    }
}
