use std::sync::Arc;

use glam::UVec2;
use silhouette::{
    types::{ColorGroup, SurfaceMaterial},
    TaggedObject,
};
use silhouette_test::{test_attr, TestRunner};

#[test_attr]
pub async fn unregister_restores_membership() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().build()?;
    let kept = runner.add_quad(UVec2::new(4, 4), UVec2::new(12, 12), ColorGroup::A);
    let before: Vec<_> = runner.registry.all().iter().map(|object| object.id()).collect();

    let extra = Arc::new(TaggedObject::null(ColorGroup::B));
    assert!(runner.registry.register(Arc::clone(&extra)));
    assert!(runner.registry.contains(extra.id()));
    assert!(runner.registry.unregister(extra.id()).is_some());

    let after: Vec<_> = runner.registry.all().iter().map(|object| object.id()).collect();
    assert_eq!(before, after);
    assert!(runner.registry.contains(kept.id()));

    Ok(())
}

#[test_attr]
pub async fn double_registration_draws_once() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().build()?;
    let object = runner.add_quad(UVec2::new(4, 4), UVec2::new(12, 12), ColorGroup::A);

    assert!(!runner.registry.register(Arc::clone(&object)));
    assert_eq!(runner.registry.len(), 1);

    let report = runner.frame_begin()?;
    assert_eq!(report.drawn_objects, 1);
    assert_eq!(report.draws, 1);

    Ok(())
}

#[test_attr]
pub async fn unregistering_mid_iteration_keeps_snapshot() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().build()?;
    let a = runner.add_quad(UVec2::new(0, 0), UVec2::new(8, 8), ColorGroup::A);
    let b = runner.add_quad(UVec2::new(8, 8), UVec2::new(16, 16), ColorGroup::B);
    let c = runner.add_quad(UVec2::new(16, 16), UVec2::new(24, 24), ColorGroup::C);

    let snapshot = runner.registry.all();
    let mut seen = Vec::new();
    for object in &snapshot {
        seen.push(object.id());
        if object.id() == b.id() {
            runner.registry.unregister(a.id());
            runner.registry.unregister(c.id());
        }
    }
    assert_eq!(seen, vec![a.id(), b.id(), c.id()]);
    assert_eq!(snapshot.len(), 3);
    assert_eq!(runner.registry.len(), 1);

    let report = runner.frame_begin()?;
    assert_eq!(report.draws, 1);
    let drawn: Vec<_> = runner
        .compositor
        .backend()
        .last_draws()
        .iter()
        .map(|draw| draw.object)
        .collect();
    assert_eq!(drawn, vec![b.id()]);

    Ok(())
}

#[test_attr]
pub async fn malformed_objects_are_skipped() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().build()?;
    runner.add_quad(UVec2::new(4, 4), UVec2::new(12, 12), ColorGroup::A);
    runner.registry.register(Arc::new(TaggedObject::null(ColorGroup::B)));
    let no_surfaces = runner.quad(UVec2::new(0, 0), UVec2::new(2, 2), Vec::<SurfaceMaterial>::new());
    runner.add_object(no_surfaces, ColorGroup::C, false);

    let report = runner.frame_begin()?;
    assert_eq!(report.drawn_objects, 1);
    assert_eq!(report.skipped, 2);

    Ok(())
}
