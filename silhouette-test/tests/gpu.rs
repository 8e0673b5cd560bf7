use anyhow::Context;
use glam::{Mat4, UVec2, Vec3, Vec4};
use silhouette::{
    compose,
    types::{Camera, CameraProjection, ColorGroup, OutlineChannel, OutlineConfig, Skeleton, SourceCamera},
    CameraSet, OutlineCompositor, OutlineError, TagRegistry, OUTLINE_COMPOSITE_SHADER,
};
use silhouette_routine::OUTLINE_FORMAT;
use silhouette_test::{
    alpha_texture, check_image, check_pixel, fill_color, no_gpu_return, test_attr, GpuFrame, GpuTestRunner,
    SceneQuad,
};

const SIZE: UVec2 = UVec2::new(64, 64);
const TOLERANCE: f32 = 2.0 / 255.0;

fn unscaled(thickness: f32) -> OutlineConfig {
    OutlineConfig {
        line_thickness: thickness,
        scale_with_screen_size: false,
        ..OutlineConfig::default()
    }
}

fn marked(group: ColorGroup) -> Vec4 {
    OutlineChannel::Group(group).buffer_color()
}

/// The draw pass must mark exactly the texels the software rasterizer marks.
fn check_draw_pass(frame: &GpuFrame, name: &str) -> anyhow::Result<()> {
    check_image(&frame.outline, &frame.software_outline, TOLERANCE, &format!("{name}-outline"))
}

/// Composite straight from the outline buffer.
fn check_composite(frame: &GpuFrame, name: &str) -> anyhow::Result<()> {
    let expected = compose::composite(&frame.source, &frame.outline, &frame.uniforms);
    check_image(&frame.image, &expected, TOLERANCE, &format!("{name}-composite"))
}

#[test_attr]
pub async fn gpu_composite_matches_software() -> anyhow::Result<()> {
    let gpu = no_gpu_return!(GpuTestRunner::new().await);
    let quads = [SceneQuad::new(UVec2::splat(16), UVec2::splat(48), ColorGroup::A)];
    let frame = gpu.render_scene(SIZE, unscaled(1.0), &quads).await?;

    check_pixel(&frame.outline, UVec2::splat(32), marked(ColorGroup::A), TOLERANCE, "gpu-outline-inside")?;
    check_pixel(&frame.outline, UVec2::splat(4), Vec4::ZERO, TOLERANCE, "gpu-outline-outside")?;
    check_draw_pass(&frame, "gpu-default")?;
    check_composite(&frame, "gpu-default")
}

#[test_attr]
pub async fn gpu_separation_pass_matches_software() -> anyhow::Result<()> {
    let gpu = no_gpu_return!(GpuTestRunner::new().await);
    let config = OutlineConfig {
        add_lines_between_colors: true,
        ..unscaled(1.0)
    };
    let quads = [
        SceneQuad::new(UVec2::new(8, 16), UVec2::new(32, 48), ColorGroup::A),
        SceneQuad::new(UVec2::new(32, 16), UVec2::new(56, 48), ColorGroup::B),
    ];
    let frame = gpu.render_scene(SIZE, config, &quads).await?;

    check_draw_pass(&frame, "gpu-separation")?;

    let separated = compose::separate_colors(&frame.outline, &frame.uniforms);
    check_image(&frame.extra, &separated, TOLERANCE, "gpu-separation-extra")?;
    // Both sides of the shared border become the gap.
    check_pixel(&frame.extra, UVec2::new(31, 32), Vec4::ZERO, TOLERANCE, "gpu-separation-gap-a")?;
    check_pixel(&frame.extra, UVec2::new(32, 32), Vec4::ZERO, TOLERANCE, "gpu-separation-gap-b")?;

    let expected = compose::composite(&frame.source, &frame.extra, &frame.uniforms);
    check_image(&frame.image, &expected, TOLERANCE, "gpu-separation-composite")
}

#[test_attr]
pub async fn gpu_flip_y_matches_software() -> anyhow::Result<()> {
    let gpu = no_gpu_return!(GpuTestRunner::new().await);
    let config = OutlineConfig {
        flip_y: true,
        ..unscaled(1.0)
    };
    let quads = [SceneQuad::new(UVec2::new(16, 4), UVec2::new(48, 20), ColorGroup::C)];
    let frame = gpu.render_scene(SIZE, config, &quads).await?;

    check_draw_pass(&frame, "gpu-flip")?;
    check_composite(&frame, "gpu-flip")?;

    // The quad sits at the top of the buffer, so its fill lands at the bottom.
    let mirrored = UVec2::new(32, SIZE.y - 1 - 12);
    let fill = fill_color(frame.source.get(32, 12), &frame.uniforms, ColorGroup::C);
    check_pixel(&frame.image, mirrored, fill, TOLERANCE, "gpu-flip-mirrored")?;
    check_pixel(&frame.image, UVec2::new(32, 12), frame.source.get(32, 12), TOLERANCE, "gpu-flip-original")
}

#[test_attr]
pub async fn gpu_corner_outlines_and_additive_match_software() -> anyhow::Result<()> {
    let gpu = no_gpu_return!(GpuTestRunner::new().await);
    let config = OutlineConfig {
        corner_outlines: true,
        additive_rendering: true,
        line_intensity: 2.0,
        ..unscaled(2.0)
    };
    // A and B touch only at a corner; C stands alone.
    let quads = [
        SceneQuad::new(UVec2::new(8, 8), UVec2::new(24, 24), ColorGroup::A),
        SceneQuad::new(UVec2::new(24, 24), UVec2::new(40, 40), ColorGroup::B),
        SceneQuad::new(UVec2::new(44, 8), UVec2::new(60, 56), ColorGroup::C),
    ];
    let frame = gpu.render_scene(SIZE, config, &quads).await?;

    check_draw_pass(&frame, "gpu-corners")?;
    check_composite(&frame, "gpu-corners")
}

#[test_attr]
pub async fn gpu_alpha_test_matches_software() -> anyhow::Result<()> {
    let gpu = no_gpu_return!(GpuTestRunner::new().await);
    // Transparent top left and bottom right quarters.
    let checker = alpha_texture(UVec2::new(2, 2), &[0, 255, 255, 0]);
    let quads = [SceneQuad::new(UVec2::splat(16), UVec2::splat(48), ColorGroup::B).with_texture(checker)];
    let frame = gpu.render_scene(SIZE, unscaled(1.0), &quads).await?;

    check_pixel(&frame.outline, UVec2::new(20, 20), Vec4::ZERO, TOLERANCE, "gpu-alpha-cut")?;
    check_pixel(&frame.outline, UVec2::new(44, 44), Vec4::ZERO, TOLERANCE, "gpu-alpha-cut-opposite")?;
    check_pixel(&frame.outline, UVec2::new(44, 20), marked(ColorGroup::B), TOLERANCE, "gpu-alpha-kept")?;
    check_draw_pass(&frame, "gpu-alpha")?;
    check_composite(&frame, "gpu-alpha")
}

#[test_attr]
pub async fn gpu_erase_matches_software() -> anyhow::Result<()> {
    let gpu = no_gpu_return!(GpuTestRunner::new().await);
    // Registered before the colored quad it cuts into.
    let quads = [
        SceneQuad::new(UVec2::new(24, 0), UVec2::new(40, 64), ColorGroup::A).erase(),
        SceneQuad::new(UVec2::new(8, 16), UVec2::new(56, 48), ColorGroup::A),
    ];
    let frame = gpu.render_scene(SIZE, unscaled(1.0), &quads).await?;

    check_pixel(&frame.outline, UVec2::new(32, 32), Vec4::ZERO, TOLERANCE, "gpu-erased")?;
    check_draw_pass(&frame, "gpu-erase")?;
    check_composite(&frame, "gpu-erase")
}

#[test_attr]
pub async fn gpu_skinned_mesh_matches_software() -> anyhow::Result<()> {
    let gpu = no_gpu_return!(GpuTestRunner::new().await);
    // Two model units is one quad width: the right edge moves 16 pixels.
    let skeleton = Skeleton {
        joint_deltas: vec![Mat4::IDENTITY, Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0))],
    };
    let quads = [SceneQuad::new(UVec2::new(16, 24), UVec2::new(32, 40), ColorGroup::B).with_skeleton(skeleton)];
    let frame = gpu.render_scene(SIZE, unscaled(1.0), &quads).await?;

    check_pixel(&frame.outline, UVec2::new(20, 32), marked(ColorGroup::B), TOLERANCE, "gpu-skin-rest")?;
    check_pixel(&frame.outline, UVec2::new(44, 32), marked(ColorGroup::B), TOLERANCE, "gpu-skin-posed")?;
    check_pixel(&frame.outline, UVec2::new(52, 32), Vec4::ZERO, TOLERANCE, "gpu-skin-beyond")?;
    check_draw_pass(&frame, "gpu-skin")?;
    check_composite(&frame, "gpu-skin")
}

#[test_attr]
pub async fn shader_library_edits_rebuild_pipelines() -> anyhow::Result<()> {
    let gpu = no_gpu_return!(GpuTestRunner::new().await);

    let mut cameras = CameraSet::new();
    cameras.add(SourceCamera::new(
        Camera {
            projection: CameraProjection::Raw(Mat4::IDENTITY),
            view: Mat4::IDENTITY,
        },
        SIZE,
    ));
    let registry = TagRegistry::new();
    let mut compositor = OutlineCompositor::new(gpu.backend(), unscaled(1.0));
    compositor.on_activate(&cameras)?;
    compositor.on_frame_begin(&registry, &cameras)?;

    let composite_source = compositor
        .backend_mut()
        .library_mut()
        .remove_shader(OUTLINE_COMPOSITE_SHADER)
        .context("Composite shader is builtin")?;
    let err = compositor.on_frame_begin(&registry, &cameras).unwrap_err();
    assert!(matches!(err, OutlineError::MissingAsset { ref name } if name == OUTLINE_COMPOSITE_SHADER));
    assert!(compositor.is_active());

    compositor
        .backend_mut()
        .library_mut()
        .add_shader(OUTLINE_COMPOSITE_SHADER, &composite_source);
    compositor.on_frame_begin(&registry, &cameras)?;

    let backend = compositor.backend_mut();
    let source = backend.create_color_target("host frame", SIZE, OUTLINE_FORMAT);
    let destination = backend.create_color_target("host destination", SIZE, OUTLINE_FORMAT);
    compositor.on_composite(source, destination)?;

    Ok(())
}

#[test_attr]
pub async fn imported_views_are_not_readable() -> anyhow::Result<()> {
    let gpu = no_gpu_return!(GpuTestRunner::new().await);
    let mut backend = gpu.backend();

    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("host swapchain stand-in"),
        size: wgpu::Extent3d {
            width: SIZE.x,
            height: SIZE.y,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OUTLINE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let imported = backend.import_view("host frame", view, OUTLINE_FORMAT, SIZE);

    let err = backend.read_target(imported).await.unwrap_err();
    assert!(matches!(err, OutlineError::ImportedTarget(handle) if handle == imported));
    let err = backend
        .write_target(imported, &compose::ColorImage::new(SIZE))
        .unwrap_err();
    assert!(matches!(err, OutlineError::ImportedTarget(handle) if handle == imported));

    Ok(())
}
