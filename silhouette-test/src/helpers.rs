use std::{fs::create_dir_all, path::Path};

use anyhow::{bail, Context, Result};
use glam::{Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
use silhouette::{compose::ColorImage, types::ColorGroup, types::Texture, OutlineUniforms};

/// Corners of the [-1, 1] plane, counter clockwise from the bottom left.
pub const QUAD_POSITIONS: [Vec3; 4] = [
    Vec3::new(-1.0, -1.0, 0.0),
    Vec3::new(-1.0, 1.0, 0.0),
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::new(1.0, -1.0, 0.0),
];

/// Row 0 of a texture maps to the top edge of the plane.
pub const QUAD_TEXTURE_COORDINATES: [Vec2; 4] = [
    Vec2::new(0.0, 1.0),
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
];

/// Clockwise as seen by the camera, so front facing for left handed hosts.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Maps the [-1, 1] plane onto the pixels `min..max` of a camera with a raw
/// identity projection.
pub fn pixel_rect_transform(min: UVec2, max: UVec2, resolution: UVec2) -> Mat4 {
    let resolution = resolution.max(UVec2::ONE).as_vec2();
    let to_ndc = |p: Vec2| Vec2::new(p.x / resolution.x * 2.0 - 1.0, 1.0 - p.y / resolution.y * 2.0);

    let a = to_ndc(min.as_vec2());
    let b = to_ndc(max.as_vec2());
    let center = (a + b) * 0.5;
    let half = (b - a).abs() * 0.5;
    Mat4::from_translation(center.extend(0.5)) * Mat4::from_scale(half.extend(1.0))
}

/// Opaque white texture whose texels carry the given alphas, row-major.
pub fn alpha_texture(size: UVec2, alphas: &[u8]) -> Texture {
    Texture {
        label: Some("alpha test texture".to_owned()),
        size,
        data: alphas.iter().flat_map(|&a| [255, 255, 255, a]).collect(),
    }
}

/// What a fill pixel of `group` looks like over `src`.
pub fn fill_color(src: Vec4, uniforms: &OutlineUniforms, group: ColorGroup) -> Vec4 {
    src.xyz()
        .lerp(uniforms.line_color(group).xyz(), uniforms.fill_amount)
        .extend(src.w)
}

/// What an edge pixel of `group` looks like over `src` in dark mode.
pub fn dark_edge_color(src: Vec4, uniforms: &OutlineUniforms, group: ColorGroup) -> Vec4 {
    let line = uniforms.line_color(group);
    (src.xyz() * (1.0 - line.w) + line.xyz() * uniforms.line_intensity * line.w).extend(src.w)
}

/// Fails with the pixel values, saving the image under `tests/results` for
/// inspection.
pub fn check_pixel(image: &ColorImage, pixel: UVec2, expected: Vec4, tolerance: f32, name: &str) -> Result<()> {
    let actual = image.get(pixel.x, pixel.y);
    if actual.abs_diff_eq(expected, tolerance) {
        return Ok(());
    }
    save_failure(image, name)?;
    bail!("{name}: pixel {pixel} is {actual}, expected {expected}");
}

/// Compares every pixel of `actual` against `expected` clamped to what an 8
/// bit target can hold. Fails with the first mismatch and the mismatch count.
pub fn check_image(actual: &ColorImage, expected: &ColorImage, tolerance: f32, name: &str) -> Result<()> {
    if actual.size() != expected.size() {
        bail!("{name}: image is {}, expected {}", actual.size(), expected.size());
    }

    let size = actual.size();
    let mut first = None;
    let mut mismatches = 0;
    for y in 0..size.y {
        for x in 0..size.x {
            let want = expected.get(x, y).clamp(Vec4::ZERO, Vec4::ONE);
            let got = actual.get(x, y);
            if !got.abs_diff_eq(want, tolerance) {
                mismatches += 1;
                first.get_or_insert((UVec2::new(x, y), got, want));
            }
        }
    }

    if let Some((pixel, got, want)) = first {
        save_failure(actual, name)?;
        bail!("{name}: {mismatches} pixels differ, first at {pixel} is {got}, expected {want}");
    }
    Ok(())
}

pub fn save_failure(image: &ColorImage, name: &str) -> Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let path = Path::new("tests/results").join(format!("{name}-failure.png"));
        let parent = path.parent().context("Path given had no parent")?;
        create_dir_all(parent).context("Could not create parent directory")?;

        let size = image.size();
        let rgba = image::RgbaImage::from_raw(size.x, size.y, image.to_rgba8())
            .context("Failed to create image from outline output")?;
        rgba.save(&path).context("Could not save image")?;
    }
    Ok(())
}
