//! CPU rendition of the two full-screen composite passes.
//!
//! `outline_composite.wgsl` implements the same contract on the GPU; every
//! constant and sampling rule here must stay in sync with it.

use glam::{IVec2, UVec2, Vec2, Vec4, Vec4Swizzles};
use silhouette_types::ColorGroup;

use crate::uniforms::OutlineUniforms;

/// Samples with a channel above this are considered set.
pub const CLASSIFY_THRESHOLD: f32 = 0.95;

const AXIS_DIRECTIONS: [Vec2; 4] = [
    Vec2::new(1.0, 0.0),
    Vec2::new(-1.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(0.0, -1.0),
];
const ALL_DIRECTIONS: [Vec2; 8] = [
    Vec2::new(1.0, 0.0),
    Vec2::new(-1.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(0.0, -1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(-1.0, 1.0),
    Vec2::new(1.0, -1.0),
    Vec2::new(-1.0, -1.0),
];

/// Neighbor directions sampled around each pixel.
pub fn directions(corner_outlines: bool) -> &'static [Vec2] {
    if corner_outlines {
        &ALL_DIRECTIONS
    } else {
        &AXIS_DIRECTIONS
    }
}

/// Group an outline buffer sample belongs to, or `None` for background.
pub fn classify(sample: Vec4) -> Option<ColorGroup> {
    if sample.w <= CLASSIFY_THRESHOLD {
        None
    } else if sample.x > CLASSIFY_THRESHOLD {
        Some(ColorGroup::A)
    } else if sample.y > CLASSIFY_THRESHOLD {
        Some(ColorGroup::B)
    } else if sample.z > CLASSIFY_THRESHOLD {
        Some(ColorGroup::C)
    } else {
        None
    }
}

fn texel_count(size: UVec2) -> usize {
    size.x as usize * size.y as usize
}

/// Linear float RGBA image. Row 0 is the top row.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorImage {
    size: UVec2,
    pixels: Vec<Vec4>,
}

impl ColorImage {
    pub fn new(size: UVec2) -> Self {
        Self::filled(size, Vec4::ZERO)
    }

    pub fn filled(size: UVec2, color: Vec4) -> Self {
        Self {
            size,
            pixels: vec![color; texel_count(size)],
        }
    }

    /// Wraps existing pixels, returning `None` when the count does not match.
    pub fn from_pixels(size: UVec2, pixels: Vec<Vec4>) -> Option<Self> {
        let expected = (size.x as usize).checked_mul(size.y as usize)?;
        (pixels.len() == expected).then_some(Self { size, pixels })
    }

    /// Unpacks tightly packed RGBA8 data.
    pub fn from_rgba8(size: UVec2, data: &[u8]) -> Option<Self> {
        let pixels = data
            .chunks_exact(4)
            .map(|c| Vec4::new(c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32) / 255.0)
            .collect();
        Self::from_pixels(size, pixels)
    }

    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| (p.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round().to_array().map(|c| c as u8))
            .collect()
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    pub fn fill(&mut self, color: Vec4) {
        self.pixels.fill(color);
    }

    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[self.offset(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, color: Vec4) {
        let offset = self.offset(x, y);
        self.pixels[offset] = color;
    }

    /// Fill the half-open pixel rectangle `min..max`, clipped to the image.
    pub fn fill_rect(&mut self, min: UVec2, max: UVec2, color: Vec4) {
        let max = max.min(self.size);
        for y in min.y..max.y {
            for x in min.x..max.x {
                self.set(x, y, color);
            }
        }
    }

    /// Nearest sample with clamp-to-edge addressing.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if self.pixels.is_empty() {
            return Vec4::ZERO;
        }
        let max = (self.size - UVec2::ONE).as_ivec2();
        let texel = (uv * self.size.as_vec2()).floor().as_ivec2().clamp(IVec2::ZERO, max);
        self.get(texel.x as u32, texel.y as u32)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y * self.size.x + x) as usize
    }
}

fn pixel_uv(x: u32, y: u32, size: UVec2) -> Vec2 {
    (Vec2::new(x as f32, y as f32) + 0.5) / size.as_vec2()
}

/// Pass 0: clear every pixel whose neighbors cover two or more groups, leaving
/// a gap between abutting regions of different colors.
pub fn separate_colors(outline: &ColorImage, uniforms: &OutlineUniforms) -> ColorImage {
    profiling::scope!("separate_colors");

    let size = outline.size();
    let texel = Vec2::ONE / size.as_vec2();
    let directions = directions(uniforms.corner_outlines != 0);
    let mut output = ColorImage::new(size);

    for y in 0..size.y {
        for x in 0..size.x {
            let uv = pixel_uv(x, y, size);
            let mut seen = [false; 3];
            for &dir in directions {
                if let Some(group) = classify(outline.sample(uv + dir * texel)) {
                    seen[group.index()] = true;
                }
            }
            let distinct = seen.iter().filter(|&&s| s).count();
            let color = if distinct >= 2 { Vec4::ZERO } else { outline.sample(uv) };
            output.set(x, y, color);
        }
    }

    output
}

/// Pass 1: detect edges in the outline buffer and blend lines and fill onto
/// `source`.
pub fn composite(source: &ColorImage, outline: &ColorImage, uniforms: &OutlineUniforms) -> ColorImage {
    profiling::scope!("composite");

    let size = source.size();
    let mut output = ColorImage::new(size);
    for y in 0..size.y {
        for x in 0..size.x {
            let src = source.get(x, y);
            let color = shade(src, outline, pixel_uv(x, y, size), uniforms);
            output.set(x, y, color);
        }
    }
    output
}

/// Edge group of a pixel: the highest priority group found in the sampled
/// neighborhood that differs from the center's group.
fn edge_group(
    outline: &ColorImage,
    uv: Vec2,
    center: Option<ColorGroup>,
    uniforms: &OutlineUniforms,
) -> Option<ColorGroup> {
    let directions = directions(uniforms.corner_outlines != 0);
    let steps = uniforms.sample_steps.max(1);
    let mut found: Option<ColorGroup> = None;

    for step in 1..=steps {
        let reach = uniforms.line_thickness * (step as f32 / steps as f32);
        for &dir in directions {
            let group = classify(outline.sample(uv + dir * reach));
            if let Some(group) = group.filter(|&g| Some(g) != center) {
                found = Some(found.map_or(group, |f| f.min(group)));
            }
        }
    }
    found
}

fn shade(src: Vec4, outline: &ColorImage, uv: Vec2, uniforms: &OutlineUniforms) -> Vec4 {
    let outline_uv = if uniforms.flip_y != 0 {
        Vec2::new(uv.x, 1.0 - uv.y)
    } else {
        uv
    };
    let center = classify(outline.sample(outline_uv));

    if let Some(group) = edge_group(outline, outline_uv, center, uniforms) {
        let line = uniforms.line_color(group);
        let light = line.xyz() * uniforms.line_intensity * line.w;
        let rgb = if uniforms.dark != 0 {
            src.xyz() * (1.0 - line.w) + light
        } else {
            src.xyz() + light
        };
        return rgb.extend(src.w);
    }

    if let Some(group) = center {
        let fill = uniforms.line_color(group).xyz();
        return src.xyz().lerp(fill, uniforms.fill_amount).extend(src.w);
    }

    src
}

#[cfg(test)]
mod test {
    use silhouette_types::{Camera, OutlineChannel, OutlineConfig, SourceCamera};

    use super::*;

    const SRC: Vec4 = Vec4::new(0.2, 0.4, 0.6, 1.0);

    fn uniforms(config: &OutlineConfig, size: UVec2) -> OutlineUniforms {
        OutlineUniforms::new(config, &SourceCamera::new(Camera::default(), size))
    }

    fn unscaled(thickness: f32) -> OutlineConfig {
        OutlineConfig {
            line_thickness: thickness,
            scale_with_screen_size: false,
            ..OutlineConfig::default()
        }
    }

    fn group(g: ColorGroup) -> Vec4 {
        OutlineChannel::Group(g).buffer_color()
    }

    fn assert_close(a: Vec4, b: Vec4) {
        assert!(a.abs_diff_eq(b, 1e-5), "{a} != {b}");
    }

    #[test]
    fn pixel_count_does_not_wrap() {
        // 65536 * 65537 wraps to 65536 in 32 bits.
        let size = UVec2::new(65536, 65537);
        assert!(ColorImage::from_pixels(size, vec![Vec4::ZERO; 65536]).is_none());
        assert_eq!(texel_count(size), 65536 * 65537);
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(classify(Vec4::new(1.0, 0.0, 0.0, 1.0)), Some(ColorGroup::A));
        assert_eq!(classify(Vec4::new(1.0, 1.0, 0.0, 1.0)), Some(ColorGroup::A));
        assert_eq!(classify(Vec4::new(0.0, 0.96, 0.0, 1.0)), Some(ColorGroup::B));
        assert_eq!(classify(Vec4::new(0.0, 0.0, 1.0, 0.95)), None);
        assert_eq!(classify(Vec4::new(0.5, 0.5, 0.5, 1.0)), None);
    }

    #[test]
    fn interior_pixels_get_fill() {
        let size = UVec2::new(16, 16);
        let mut outline = ColorImage::new(size);
        outline.fill_rect(UVec2::new(4, 4), UVec2::new(12, 12), group(ColorGroup::A));
        let config = unscaled(1.0);
        let u = uniforms(&config, size);

        let out = composite(&ColorImage::filled(size, SRC), &outline, &u);

        let color = u.line_color(ColorGroup::A);
        let expected = SRC.xyz().lerp(color.xyz(), config.fill_amount).extend(1.0);
        assert_close(out.get(8, 8), expected);
        // Far from any region the source is untouched.
        assert_eq!(out.get(0, 0), SRC);
    }

    #[test]
    fn abutting_groups_produce_one_column_per_side() {
        let size = UVec2::new(16, 8);
        let mut outline = ColorImage::new(size);
        outline.fill_rect(UVec2::new(0, 0), UVec2::new(8, 8), group(ColorGroup::A));
        outline.fill_rect(UVec2::new(8, 0), UVec2::new(16, 8), group(ColorGroup::B));
        let config = unscaled(1.0);
        let u = uniforms(&config, size);
        let out = composite(&ColorImage::filled(size, SRC), &outline, &u);

        let edge = |g: ColorGroup| {
            let line = u.line_color(g);
            (SRC.xyz() * (1.0 - line.w) + line.xyz() * u.line_intensity * line.w).extend(1.0)
        };
        let fill = |g: ColorGroup| SRC.xyz().lerp(u.line_color(g).xyz(), u.fill_amount).extend(1.0);

        let y = 4;
        assert_close(out.get(6, y), fill(ColorGroup::A));
        assert_close(out.get(7, y), edge(ColorGroup::B));
        assert_close(out.get(8, y), edge(ColorGroup::A));
        assert_close(out.get(9, y), fill(ColorGroup::B));
    }

    #[test]
    fn additive_adds_light() {
        let size = UVec2::new(8, 8);
        let mut outline = ColorImage::new(size);
        outline.fill_rect(UVec2::new(4, 0), UVec2::new(8, 8), group(ColorGroup::C));
        let mut config = unscaled(1.0);
        config.additive_rendering = true;
        config.line_intensity = 2.0;
        let u = uniforms(&config, size);

        let out = composite(&ColorImage::filled(size, SRC), &outline, &u);
        let line = u.line_color(ColorGroup::C);
        assert_close(out.get(3, 2), (SRC.xyz() + line.xyz() * 2.0 * line.w).extend(1.0));
    }

    #[test]
    fn thickness_widens_edge() {
        let size = UVec2::new(16, 4);
        let mut outline = ColorImage::new(size);
        outline.fill_rect(UVec2::new(8, 0), UVec2::new(16, 4), group(ColorGroup::A));
        let u = uniforms(&unscaled(3.0), size);
        let out = composite(&ColorImage::filled(size, SRC), &outline, &u);

        for x in 5..8 {
            assert_ne!(out.get(x, 1), SRC, "column {x} should be an edge");
        }
        assert_eq!(out.get(4, 1), SRC);
    }

    #[test]
    fn flip_y_mirrors_lookup() {
        let size = UVec2::new(8, 8);
        let mut outline = ColorImage::new(size);
        outline.fill_rect(UVec2::new(0, 0), UVec2::new(8, 2), group(ColorGroup::A));
        let mut config = unscaled(1.0);
        config.fill_amount = 1.0;
        config.flip_y = true;
        let u = uniforms(&config, size);

        let out = composite(&ColorImage::filled(size, SRC), &outline, &u);
        assert_eq!(out.get(3, 0), SRC);
        assert_close(out.get(3, 7), u.line_color(ColorGroup::A).xyz().extend(1.0));
    }

    #[test]
    fn corner_outlines_reach_diagonals() {
        let size = UVec2::new(8, 8);
        let mut outline = ColorImage::new(size);
        outline.set(4, 4, group(ColorGroup::B));
        let mut config = unscaled(1.0);
        let out = composite(&ColorImage::filled(size, SRC), &outline, &uniforms(&config, size));
        assert_eq!(out.get(3, 3), SRC);

        config.corner_outlines = true;
        let out = composite(&ColorImage::filled(size, SRC), &outline, &uniforms(&config, size));
        assert_ne!(out.get(3, 3), SRC);
    }

    #[test]
    fn separation_clears_shared_border() {
        let size = UVec2::new(8, 4);
        let mut outline = ColorImage::new(size);
        outline.fill_rect(UVec2::new(0, 0), UVec2::new(4, 4), group(ColorGroup::A));
        outline.fill_rect(UVec2::new(4, 0), UVec2::new(8, 4), group(ColorGroup::C));
        let u = uniforms(&unscaled(1.0), size);

        let separated = separate_colors(&outline, &u);
        assert_eq!(separated.get(2, 1), group(ColorGroup::A));
        assert_eq!(separated.get(3, 1), Vec4::ZERO);
        assert_eq!(separated.get(4, 1), Vec4::ZERO);
        assert_eq!(separated.get(5, 1), group(ColorGroup::C));
    }

    #[test]
    fn rgba8_round_trip_clamps() {
        let size = UVec2::new(2, 1);
        let image = ColorImage::from_pixels(size, vec![Vec4::new(2.0, -1.0, 0.5, 1.0), Vec4::ONE]).unwrap();
        assert_eq!(image.to_rgba8(), vec![255, 0, 128, 255, 255, 255, 255, 255]);
        assert!(ColorImage::from_rgba8(UVec2::new(3, 1), &[0; 8]).is_none());
    }
}
