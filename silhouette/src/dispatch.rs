use silhouette_types::{CullMode, LayerMask};

use crate::{
    backend::{DrawCommand, OutlineBackend},
    material::MaterialCache,
    registry::TagSnapshot,
    OutlineResult,
};

/// What happened to the tagged objects during one dispatch.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    /// Objects that produced at least one draw.
    pub drawn_objects: usize,
    pub draws: usize,
    /// Objects on a layer the source camera does not render.
    pub culled: usize,
    /// Malformed objects: no renderable, no mesh, no submeshes or no surfaces.
    pub skipped: usize,
}

/// Turns the tagged objects into draw commands for the outline buffer.
#[derive(Debug, Default)]
pub struct DrawDispatcher {
    commands: Vec<DrawCommand>,
}

impl DrawDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the draw list from `snapshot`.
    ///
    /// Every surface of an object draws every submesh of the object with the
    /// surface's material. Erase draws are ordered after all colored draws so
    /// erasure does not depend on registration order.
    pub fn dispatch<B: OutlineBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        materials: &mut MaterialCache,
        snapshot: &TagSnapshot,
        culling_mask: LayerMask,
        cull_mode: CullMode,
    ) -> OutlineResult<DispatchStats> {
        profiling::scope!("DrawDispatcher::dispatch");

        self.commands.clear();
        let mut stats = DispatchStats::default();

        for object in snapshot {
            let Some(renderable) = object.renderable() else {
                log::trace!("Skipping {:?}: renderable is gone", object.id());
                stats.skipped += 1;
                continue;
            };
            if !culling_mask.contains_layer(renderable.layer()) {
                stats.culled += 1;
                continue;
            }
            let Some(mesh) = renderable.mesh() else {
                log::debug!("Skipping {:?}: no mesh", object.id());
                stats.skipped += 1;
                continue;
            };
            let submesh_count = renderable.submesh_count();
            if submesh_count == 0 {
                log::debug!("Skipping {:?}: mesh has no submeshes", object.id());
                stats.skipped += 1;
                continue;
            }
            let surfaces = match object.surface_materials() {
                Some(surfaces) if !surfaces.is_empty() => surfaces,
                _ => {
                    log::debug!("Skipping {:?}: no surface materials", object.id());
                    stats.skipped += 1;
                    continue;
                }
            };

            let channel = object.channel();
            let transform = renderable.transform();
            for surface in surfaces.iter() {
                let material = materials.resolve(backend, surface, channel, cull_mode)?;
                self.commands.extend((0..submesh_count).map(|submesh| DrawCommand {
                    object: object.id(),
                    mesh,
                    submesh,
                    transform,
                    material: material.handle,
                    channel,
                }));
            }
            stats.drawn_objects += 1;
        }

        // Stable, so colored draws keep their relative order.
        self.commands.sort_by_key(|command| command.channel.is_erase());
        stats.draws = self.commands.len();

        Ok(stats)
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }
}
