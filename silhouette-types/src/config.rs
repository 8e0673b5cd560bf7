use std::ops::RangeInclusive;

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::CameraHandle;

/// One of the fixed outline colors an object can be assigned to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ColorGroup {
    #[default]
    A,
    B,
    C,
}

impl ColorGroup {
    /// All groups, in priority order.
    pub const ALL: [Self; 3] = [Self::A, Self::B, Self::C];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// What a draw writes into the outline buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutlineChannel {
    Group(ColorGroup),
    /// Clears the covered region back to background.
    Erase,
}

impl OutlineChannel {
    /// Number of distinct channels. Also the number of shared draw materials.
    pub const COUNT: usize = 4;

    pub const fn from_tag(group: ColorGroup, erase: bool) -> Self {
        if erase {
            Self::Erase
        } else {
            Self::Group(group)
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Group(group) => group.index(),
            Self::Erase => 3,
        }
    }

    /// Color written into the outline buffer for this channel.
    pub fn buffer_color(self) -> Vec4 {
        match self {
            Self::Group(ColorGroup::A) => Vec4::new(1.0, 0.0, 0.0, 1.0),
            Self::Group(ColorGroup::B) => Vec4::new(0.0, 1.0, 0.0, 1.0),
            Self::Group(ColorGroup::C) => Vec4::new(0.0, 0.0, 1.0, 1.0),
            Self::Erase => Vec4::ZERO,
        }
    }

    pub const fn is_erase(self) -> bool {
        matches!(self, Self::Erase)
    }
}

/// Face culling applied when drawing into the outline buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    Back,
    Off,
}

/// Per-compositor configuration of the outline effect.
///
/// Mutated by the host between frames. Colors are linear RGBA; they are squared
/// on their way into the shader uniforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    /// Line thickness in texels at 360 pixels of screen height.
    pub line_thickness: f32,
    pub line_intensity: f32,
    /// How much of the group color is blended over the inside of an outlined
    /// region.
    pub fill_amount: f32,
    pub line_color_a: Vec4,
    pub line_color_b: Vec4,
    pub line_color_c: Vec4,
    /// Add light instead of darkening the destination.
    pub additive_rendering: bool,
    pub backface_culling: bool,
    /// Sample the diagonal neighbors as well.
    pub corner_outlines: bool,
    /// Separate adjacent regions of different groups with a line.
    pub add_lines_between_colors: bool,
    pub scale_with_screen_size: bool,
    pub alpha_cutoff: f32,
    pub flip_y: bool,
    /// Camera the effect mirrors. When unset, the compositor's attached camera
    /// is used, then the host's default camera.
    #[serde(skip)]
    pub source_camera: Option<CameraHandle>,
}

impl OutlineConfig {
    pub const LINE_THICKNESS_RANGE: RangeInclusive<f32> = 1.0..=6.0;
    pub const LINE_INTENSITY_RANGE: RangeInclusive<f32> = 0.0..=10.0;
    pub const FILL_AMOUNT_RANGE: RangeInclusive<f32> = 0.0..=1.0;
    pub const ALPHA_CUTOFF_RANGE: RangeInclusive<f32> = 0.1..=0.9;

    pub fn line_color(&self, group: ColorGroup) -> Vec4 {
        match group {
            ColorGroup::A => self.line_color_a,
            ColorGroup::B => self.line_color_b,
            ColorGroup::C => self.line_color_c,
        }
    }

    pub fn set_line_color(&mut self, group: ColorGroup, color: Vec4) {
        match group {
            ColorGroup::A => self.line_color_a = color,
            ColorGroup::B => self.line_color_b = color,
            ColorGroup::C => self.line_color_c = color,
        }
    }

    pub fn cull_mode(&self) -> CullMode {
        if self.backface_culling {
            CullMode::Back
        } else {
            CullMode::Off
        }
    }

    /// Clamps every ranged field into its documented range, returning true if
    /// any field had to change. NaN fields fall back to their default.
    pub fn clamp_to_ranges(&mut self) -> bool {
        let defaults = Self::default();
        let mut changed = false;
        for (value, range, default) in [
            (
                &mut self.line_thickness,
                Self::LINE_THICKNESS_RANGE,
                defaults.line_thickness,
            ),
            (
                &mut self.line_intensity,
                Self::LINE_INTENSITY_RANGE,
                defaults.line_intensity,
            ),
            (&mut self.fill_amount, Self::FILL_AMOUNT_RANGE, defaults.fill_amount),
            (&mut self.alpha_cutoff, Self::ALPHA_CUTOFF_RANGE, defaults.alpha_cutoff),
        ] {
            let clamped = if value.is_nan() {
                default
            } else {
                value.clamp(*range.start(), *range.end())
            };
            if clamped != *value {
                *value = clamped;
                changed = true;
            }
        }
        changed
    }
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            line_thickness: 1.25,
            line_intensity: 0.5,
            fill_amount: 0.2,
            line_color_a: Vec4::new(1.0, 0.0, 0.0, 1.0),
            line_color_b: Vec4::new(0.0, 1.0, 0.0, 1.0),
            line_color_c: Vec4::new(0.0, 0.0, 1.0, 1.0),
            additive_rendering: false,
            backface_culling: true,
            corner_outlines: false,
            add_lines_between_colors: false,
            scale_with_screen_size: true,
            alpha_cutoff: 0.5,
            flip_y: false,
            source_camera: None,
        }
    }
}
