use glam::{UVec2, Vec4};
use silhouette::{
    types::{Camera, ColorGroup, OutlineChannel, OutlineConfig, SourceCamera},
    CameraSet, OutlineBackend, OutlineCompositor, OutlineError, OutlinePulse, SoftwareBackend, TagRegistry,
    OUTLINE_BUFFER_SHADER, OUTLINE_COMPOSITE_SHADER,
};
use silhouette_test::{alpha_texture, check_pixel, test_attr, TestRunner};

#[test_attr]
pub async fn buffers_follow_source_resolution() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().resolution(UVec2::splat(32)).build()?;

    let sequence = [
        (UVec2::new(32, 32), false),
        (UVec2::new(64, 16), true),
        (UVec2::new(64, 16), false),
        (UVec2::new(17, 9), true),
        (UVec2::new(32, 32), true),
    ];
    for (resolution, resized) in sequence {
        runner.resize(resolution);
        let report = runner.frame_begin()?;
        assert_eq!(report.resolution, resolution);
        assert_eq!(report.resized, resized, "at {resolution}");

        let buffers = *runner.compositor.buffers().expect("active compositor has buffers");
        assert_eq!(buffers.resolution, resolution);
        let backend = runner.compositor.backend();
        assert_eq!(backend.render_target_resolution(buffers.outline), Some(resolution));
        assert_eq!(backend.render_target_resolution(buffers.extra), Some(resolution));
        assert_eq!(backend.render_target_count(), 2);
    }

    Ok(())
}

#[test_attr]
pub async fn zero_sized_source_gets_one_texel_buffers() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().build()?;
    runner.resize(UVec2::ZERO);
    let report = runner.frame_begin()?;
    assert_eq!(report.resolution, UVec2::ONE);

    Ok(())
}

#[test_attr]
pub async fn missing_shader_fails_activation() -> anyhow::Result<()> {
    for missing in [OUTLINE_BUFFER_SHADER, OUTLINE_COMPOSITE_SHADER] {
        let mut backend = SoftwareBackend::new();
        backend.remove_asset(missing);
        let mut cameras = CameraSet::new();
        cameras.add(SourceCamera::new(Camera::default(), UVec2::splat(16)));

        let mut compositor = OutlineCompositor::new(backend, OutlineConfig::default());
        let err = compositor.on_activate(&cameras).unwrap_err();
        assert!(matches!(err, OutlineError::MissingAsset { ref name } if name == missing));

        assert!(!compositor.is_active());
        assert!(compositor.buffers().is_none());
        assert_eq!(compositor.backend().material_count(), 0);
        assert_eq!(compositor.backend().render_target_count(), 0);
    }

    let err = TestRunner::builder()
        .without_asset(OUTLINE_COMPOSITE_SHADER)
        .build()
        .err()
        .expect("activation must fail");
    assert!(matches!(
        err.downcast_ref::<OutlineError>(),
        Some(OutlineError::MissingAsset { .. })
    ));

    Ok(())
}

#[test_attr]
pub async fn shader_changes_while_active_recover() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().build()?;
    runner.add_quad(UVec2::new(8, 8), UVec2::new(24, 24), ColorGroup::A);
    runner.render_frame()?;

    runner.backend().remove_asset(OUTLINE_BUFFER_SHADER);
    let err = runner.frame_begin().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OutlineError>(),
        Some(OutlineError::MissingAsset { name }) if name == OUTLINE_BUFFER_SHADER
    ));
    assert!(runner.compositor.is_active());

    // Once the asset is back, frames render again without reactivation.
    runner.backend().add_asset(OUTLINE_BUFFER_SHADER);
    runner.render_frame()?;
    let marked = OutlineChannel::Group(ColorGroup::A).buffer_color();
    check_pixel(runner.outline_buffer()?, UVec2::splat(16), marked, 0.0, "shader-restored")?;
    check_pixel(runner.outline_buffer()?, UVec2::splat(2), Vec4::ZERO, 0.0, "shader-restored-outside")?;

    Ok(())
}

#[test_attr]
pub async fn frame_methods_require_activation() -> anyhow::Result<()> {
    let mut cameras = CameraSet::new();
    cameras.add(SourceCamera::new(Camera::default(), UVec2::splat(16)));
    let mut backend = SoftwareBackend::new();
    let frame = backend.create_render_target(&silhouette::RenderTargetDescriptor {
        label: "host frame".into(),
        resolution: UVec2::splat(16),
    });

    let mut compositor = OutlineCompositor::new(backend, OutlineConfig::default());
    let registry = TagRegistry::new();
    assert!(matches!(
        compositor.on_frame_begin(&registry, &cameras),
        Err(OutlineError::Inactive)
    ));
    assert!(matches!(compositor.on_composite(frame, frame), Err(OutlineError::Inactive)));

    Ok(())
}

#[test_attr]
pub async fn teardown_releases_everything() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().build()?;
    let texture = runner.add_texture(alpha_texture(UVec2::new(1, 1), &[255]));
    runner.add_textured_quad(UVec2::new(4, 4), UVec2::new(12, 12), texture, silhouette::types::ColorGroup::A);
    runner.add_quad(UVec2::new(16, 16), UVec2::new(24, 24), silhouette::types::ColorGroup::B);
    runner.render_frame()?;

    // Four shared materials plus the textured one.
    assert_eq!(runner.compositor.backend().material_count(), 5);
    assert_eq!(runner.compositor.backend().render_target_count(), 2);

    runner.compositor.on_teardown();
    assert!(!runner.compositor.is_active());
    assert_eq!(runner.compositor.backend().material_count(), 0);
    assert_eq!(runner.compositor.backend().render_target_count(), 0);
    assert_eq!(runner.compositor.materials().cached_len(), 0);
    assert!(runner.compositor.auxiliary_camera().target().is_none());

    runner.compositor.on_teardown();
    assert!(matches!(
        runner.compositor.on_frame_begin(&runner.registry, &runner.cameras),
        Err(OutlineError::Inactive)
    ));

    // Reactivation starts from scratch.
    runner.compositor.on_activate(&runner.cameras)?;
    runner.frame_begin()?;
    assert_eq!(runner.compositor.backend().material_count(), 5);

    Ok(())
}

#[test_attr]
pub async fn pulse_reaches_uniforms() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().build()?;
    let mut pulse = OutlinePulse::new();

    pulse.update(runner.compositor.config_mut(), 0.5);
    runner.compositor.apply_config();

    let alpha = runner.compositor.config().line_color_a.w;
    assert_eq!(alpha, 0.5);
    assert_eq!(
        runner.compositor.uniforms().line_color(silhouette::types::ColorGroup::A).w,
        0.25
    );

    Ok(())
}

#[test_attr]
pub async fn out_of_range_config_is_clamped() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().build()?;
    runner.compositor.config_mut().line_thickness = 40.0;
    runner.compositor.config_mut().fill_amount = -1.0;
    runner.frame_begin()?;

    assert_eq!(runner.compositor.config().line_thickness, 6.0);
    assert_eq!(runner.compositor.config().fill_amount, 0.0);
    assert_eq!(runner.compositor.uniforms().fill_amount, 0.0);

    Ok(())
}
