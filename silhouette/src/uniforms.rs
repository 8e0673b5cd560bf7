//! The uniform block the composite shader reads.

use glam::{UVec2, Vec2, Vec4};
use silhouette_types::{ColorGroup, OutlineConfig, SourceCamera};

/// Screen height at which `line_thickness` is measured in texels.
pub const REFERENCE_SCREEN_HEIGHT: f32 = 360.0;

/// Uniform block of the composite passes. Must match `OutlineUniforms` in
/// `outline_composite.wgsl`.
#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(C, align(16))]
pub struct OutlineUniforms {
    /// Line colors of the three groups, squared component-wise.
    pub line_colors: [Vec4; 3],
    /// Line thickness in uv units.
    pub line_thickness: Vec2,
    pub line_intensity: f32,
    pub fill_amount: f32,
    pub alpha_cutoff: f32,
    pub flip_y: u32,
    /// 1 when edges darken the destination, 0 when they add light.
    pub dark: u32,
    pub corner_outlines: u32,
    /// Rings sampled between the center and the full line thickness.
    pub sample_steps: u32,
    /// Line thickness in texels.
    pub thickness_texels: f32,
    pub _padding: [u32; 2],
}

unsafe impl bytemuck::Zeroable for OutlineUniforms {}
unsafe impl bytemuck::Pod for OutlineUniforms {}

impl OutlineUniforms {
    /// Build the block for a source camera. Line thickness is normalized against
    /// the stereo eye texture when the camera renders into one.
    pub fn new(config: &OutlineConfig, source: &SourceCamera) -> Self {
        profiling::scope!("OutlineUniforms::new");

        let scale = thickness_scale(config, source.resolution.y);
        let dims = source.stereo_eye_resolution.unwrap_or(source.resolution).max(UVec2::ONE);

        Self {
            line_colors: ColorGroup::ALL.map(|group| squared(config.line_color(group))),
            line_thickness: Vec2::splat(scale) / dims.as_vec2(),
            line_intensity: config.line_intensity,
            fill_amount: config.fill_amount,
            alpha_cutoff: config.alpha_cutoff,
            flip_y: config.flip_y as u32,
            dark: !config.additive_rendering as u32,
            corner_outlines: config.corner_outlines as u32,
            sample_steps: scale.ceil().max(1.0) as u32,
            thickness_texels: scale,
            _padding: [0; 2],
        }
    }

    pub fn line_color(&self, group: ColorGroup) -> Vec4 {
        self.line_colors[group.index()]
    }
}

impl Default for OutlineUniforms {
    fn default() -> Self {
        Self::new(&OutlineConfig::default(), &SourceCamera::new(Default::default(), UVec2::ONE))
    }
}

/// Line thickness in texels for a screen of the given height.
pub fn thickness_scale(config: &OutlineConfig, screen_height: u32) -> f32 {
    if config.scale_with_screen_size {
        (screen_height as f32 / REFERENCE_SCREEN_HEIGHT).max(1.0) * config.line_thickness
    } else {
        config.line_thickness
    }
}

/// Component-wise square, alpha included.
pub fn squared(color: Vec4) -> Vec4 {
    color * color
}

#[cfg(test)]
mod test {
    use silhouette_types::Camera;

    use super::*;

    fn source(width: u32, height: u32) -> SourceCamera {
        SourceCamera::new(Camera::default(), UVec2::new(width, height))
    }

    #[test]
    fn layout_matches_shader() {
        assert_eq!(std::mem::size_of::<OutlineUniforms>(), 96);
        assert_eq!(std::mem::align_of::<OutlineUniforms>(), 16);
    }

    #[test]
    fn reference_height_scale() {
        let config = OutlineConfig::default();
        let uniforms = OutlineUniforms::new(&config, &source(640, 360));

        assert_eq!(uniforms.thickness_texels, 1.25);
        assert_eq!(uniforms.sample_steps, 2);
        assert_eq!(uniforms.line_thickness, Vec2::new(1.25 / 640.0, 1.25 / 360.0));
    }

    #[test]
    fn small_screens_never_shrink_lines() {
        let mut config = OutlineConfig::default();
        assert_eq!(thickness_scale(&config, 100), 1.25);
        assert_eq!(thickness_scale(&config, 720), 2.5);

        config.scale_with_screen_size = false;
        assert_eq!(thickness_scale(&config, 720), 1.25);
    }

    #[test]
    fn colors_are_squared_and_flags_mapped() {
        let mut config = OutlineConfig::default();
        config.line_color_b = Vec4::new(0.5, 0.5, 0.5, 0.5);
        config.additive_rendering = true;
        config.flip_y = true;
        let uniforms = OutlineUniforms::new(&config, &source(100, 100));

        assert_eq!(uniforms.line_color(ColorGroup::B), Vec4::splat(0.25));
        assert_eq!(uniforms.dark, 0);
        assert_eq!(uniforms.flip_y, 1);
    }

    #[test]
    fn stereo_eye_normalizes_thickness() {
        let config = OutlineConfig::default();
        let mut camera = source(1000, 720);
        camera.stereo_eye_resolution = Some(UVec2::new(500, 720));
        let uniforms = OutlineUniforms::new(&config, &camera);

        assert_eq!(uniforms.thickness_texels, 2.5);
        assert_eq!(uniforms.line_thickness, Vec2::new(2.5 / 500.0, 2.5 / 720.0));
    }
}
