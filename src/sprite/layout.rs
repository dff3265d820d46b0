use glam::{Affine2, Mat2, Vec2};
use serde::{Deserialize, Serialize};

/// How a payload's intrinsic bounds are scaled into its backing region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fit {
    #[default]
    Contain,
    Cover,
    Fill,
    FitWidth,
    FitHeight,
    ScaleDown,
    None,
}

/// Where scaled content sits inside its frame; each axis runs from -1 (start)
/// to 1 (end).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub x: f32,
    pub y: f32,
}

impl Alignment {
    pub const TOP_LEFT: Self = Self::new(-1.0, -1.0);
    pub const TOP_CENTER: Self = Self::new(0.0, -1.0);
    pub const TOP_RIGHT: Self = Self::new(1.0, -1.0);
    pub const CENTER_LEFT: Self = Self::new(-1.0, 0.0);
    pub const CENTER: Self = Self::new(0.0, 0.0);
    pub const CENTER_RIGHT: Self = Self::new(1.0, 0.0);
    pub const BOTTOM_LEFT: Self = Self::new(-1.0, 1.0);
    pub const BOTTOM_CENTER: Self = Self::new(0.0, 1.0);
    pub const BOTTOM_RIGHT: Self = Self::new(1.0, 1.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y).clamp(Vec2::NEG_ONE, Vec2::ONE)
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Fit and alignment a sprite requests for its payload.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpriteLayout {
    pub fit: Fit,
    pub alignment: Alignment,
}

impl SpriteLayout {
    pub const fn new(fit: Fit, alignment: Alignment) -> Self {
        Self { fit, alignment }
    }

    /// Maps content space (`0..content`) into frame space (`0..frame`).
    pub fn transform(&self, content: Vec2, frame: Vec2) -> Affine2 {
        if content.x <= 0.0 || content.y <= 0.0 {
            return Affine2::IDENTITY;
        }

        let ratio = frame / content;
        let scale = match self.fit {
            Fit::Fill => ratio,
            Fit::Contain => Vec2::splat(ratio.min_element()),
            Fit::Cover => Vec2::splat(ratio.max_element()),
            Fit::FitWidth => Vec2::splat(ratio.x),
            Fit::FitHeight => Vec2::splat(ratio.y),
            Fit::ScaleDown => Vec2::splat(ratio.min_element().min(1.0)),
            Fit::None => Vec2::ONE,
        };

        let offset = (frame - content * scale) * (self.alignment.as_vec2() + Vec2::ONE) * 0.5;
        Affine2::from_mat2_translation(Mat2::from_diagonal(scale), offset)
    }
}
