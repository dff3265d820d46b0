use super::rect::Region;
use glam::{IVec2, UVec2};
use serde::{Deserialize, Serialize};

/// Errors raised by a [`BinPackingStrategy`].
///
/// `DoesNotFit` is a configuration problem and must not be retried with the
/// same inputs. The remaining variants are integrity errors caused by a caller
/// breaking the `reset -> prepare_for_batch -> allocate` contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackError {
    #[error(
        "{count} rectangles do not fit in a {max_width}x{max_height} atlas; \
         raise the atlas bound or reduce the number of visible sprites"
    )]
    DoesNotFit {
        count: usize,
        max_width: u32,
        max_height: u32,
    },
    #[error("negative rectangle size {width}x{height}")]
    NegativeSize { width: i32, height: i32 },
    #[error("allocate called more often than the {prepared} prepared sizes")]
    Exhausted { prepared: usize },
    #[error(
        "allocation {index} expected {expected_width}x{expected_height}, got {width}x{height}"
    )]
    SlotMismatch {
        index: usize,
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
    #[error("prepare_for_batch called again without reset")]
    NotReset,
}

/// Free-rectangle scoring rule used when placing the next rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    #[default]
    BestShortSideFit,
    BestLongSideFit,
    BestAreaFit,
    BottomLeft,
    ContactPoint,
}

/// How the final bin is derived from the placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeMode {
    /// Smallest bounding bin found over a set of candidate widths.
    #[default]
    Smart,
    /// Smart result rounded up to powers of two, within the bound.
    PowerOfTwo,
    /// Smart result grown to a square, within the bound.
    Square,
    /// Always the full `max_width x max_height` bound.
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackerConfig {
    #[serde(default = "PackerConfig::default_max_dimension")]
    pub max_width: u32,
    #[serde(default = "PackerConfig::default_max_dimension")]
    pub max_height: u32,
    #[serde(default = "PackerConfig::default_padding")]
    pub padding: u32,
    #[serde(default)]
    pub allow_rotation: bool,
    #[serde(default)]
    pub heuristic: Heuristic,
    #[serde(default)]
    pub size_mode: SizeMode,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_width: Self::default_max_dimension(),
            max_height: Self::default_max_dimension(),
            padding: Self::default_padding(),
            allow_rotation: false,
            heuristic: Heuristic::default(),
            size_mode: SizeMode::default(),
        }
    }
}

impl PackerConfig {
    pub const fn default_max_dimension() -> u32 {
        4096
    }

    pub const fn default_padding() -> u32 {
        1
    }

    pub fn max_size(&self) -> UVec2 {
        UVec2::new(self.max_width, self.max_height)
    }
}

/// Packing diagnostics. Never used for correctness.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PackerStats {
    pub allocated: usize,
    pub used_pixels: u64,
    pub total_pixels: u64,
    pub efficiency: f32,
    pub aspect_ratio: f32,
}

impl PackerStats {
    pub fn new(allocated: usize, used_pixels: u64, canvas: UVec2) -> Self {
        let total_pixels = canvas.x as u64 * canvas.y as u64;
        let efficiency = if total_pixels == 0 {
            0.0
        } else {
            (used_pixels as f64 / total_pixels as f64) as f32
        };
        let aspect_ratio = if canvas.y == 0 {
            0.0
        } else {
            canvas.x as f32 / canvas.y as f32
        };
        Self {
            allocated,
            used_pixels,
            total_pixels,
            efficiency,
            aspect_ratio,
        }
    }
}

/// Batch bin-packing contract used by the renderer.
///
/// Call order per repack is `reset`, `prepare_for_batch`, then exactly one
/// `allocate` per prepared size in the same order the sizes were supplied.
pub trait BinPackingStrategy {
    fn reset(&mut self);

    /// Solves the whole batch at once, choosing the smallest bin within the
    /// configured maximum bound.
    fn prepare_for_batch(&mut self, sizes: &[IVec2]) -> Result<(), PackError>;

    /// Returns the next precomputed region.
    fn allocate(&mut self, width: i32, height: i32) -> Result<Region, PackError>;

    /// Bin chosen by the last successful `prepare_for_batch`.
    fn canvas_dimensions(&self) -> UVec2;

    fn stats(&self) -> PackerStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_handle_empty_canvas() {
        let stats = PackerStats::new(0, 0, UVec2::ZERO);
        assert_eq!(stats.efficiency, 0.0);
        assert_eq!(stats.aspect_ratio, 0.0);
    }

    #[test]
    fn stats_compute_efficiency_and_aspect() {
        let stats = PackerStats::new(2, 50, UVec2::new(20, 10));
        assert_eq!(stats.total_pixels, 200);
        assert!((stats.efficiency - 0.25).abs() < 1e-6);
        assert!((stats.aspect_ratio - 2.0).abs() < 1e-6);
    }

    #[test]
    fn config_fields_default_when_missing() {
        let config: PackerConfig = serde_json::from_str(r#"{ "max_width": 512 }"#).unwrap();
        assert_eq!(config.max_width, 512);
        assert_eq!(config.max_height, 4096);
        assert_eq!(config.padding, 1);
        assert_eq!(config.heuristic, Heuristic::BestShortSideFit);
        assert_eq!(config.size_mode, SizeMode::Smart);
    }
}
