//! Draw materials used to render tagged objects into the outline buffer.

use silhouette_types::{ColorGroup, CullMode, MaterialHandle, OutlineChannel, SurfaceMaterial, TextureHandle};

use crate::{
    backend::{DrawMaterialDescriptor, OutlineBackend},
    util::typedefs::FastHashMap,
    OutlineResult,
};

/// A backend material bound to one outline channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DrawMaterial {
    pub handle: MaterialHandle,
    pub channel: OutlineChannel,
    pub base_texture: Option<TextureHandle>,
    pub cull_mode: CullMode,
}

impl DrawMaterial {
    fn create<B: OutlineBackend + ?Sized>(
        backend: &mut B,
        channel: OutlineChannel,
        base_texture: Option<TextureHandle>,
        cull_mode: CullMode,
    ) -> OutlineResult<Self> {
        let handle = backend.create_draw_material(&DrawMaterialDescriptor {
            channel,
            base_texture,
            cull_mode,
        })?;
        Ok(Self {
            handle,
            channel,
            base_texture,
            cull_mode,
        })
    }

    fn apply_cull_mode<B: OutlineBackend + ?Sized>(&mut self, backend: &mut B, cull_mode: CullMode) {
        if self.cull_mode != cull_mode {
            backend.set_material_cull_mode(self.handle, cull_mode);
            self.cull_mode = cull_mode;
        }
    }
}

/// Owns every draw material a compositor creates.
///
/// Untextured surfaces share one material per channel. Textured surfaces get a
/// material per `(texture, channel)` pair which lives until [`clear`] or
/// [`teardown`]; the cache never evicts on its own.
///
/// [`clear`]: MaterialCache::clear
/// [`teardown`]: MaterialCache::teardown
#[derive(Debug, Default)]
pub struct MaterialCache {
    shared: [Option<DrawMaterial>; OutlineChannel::COUNT],
    textured: FastHashMap<(TextureHandle, OutlineChannel), DrawMaterial>,
}

impl MaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the four shared materials. Fails if the backend cannot create
    /// materials at all, which is fatal to activation.
    pub fn create_shared<B: OutlineBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        cull_mode: CullMode,
    ) -> OutlineResult<()> {
        profiling::scope!("MaterialCache::create_shared");

        let channels = ColorGroup::ALL.map(OutlineChannel::Group);
        for channel in channels.into_iter().chain([OutlineChannel::Erase]) {
            if self.shared[channel.index()].is_none() {
                self.shared[channel.index()] = Some(DrawMaterial::create(backend, channel, None, cull_mode)?);
            }
        }
        Ok(())
    }

    /// Material for one surface of an object drawing into `channel`, with the
    /// cull mode applied.
    pub fn resolve<B: OutlineBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        surface: &SurfaceMaterial,
        channel: OutlineChannel,
        cull_mode: CullMode,
    ) -> OutlineResult<DrawMaterial> {
        let key = surface.base_texture.map(|texture| (texture, channel));
        let existing = match key {
            Some(key) => self.textured.get_mut(&key),
            None => self.shared[channel.index()].as_mut(),
        };
        if let Some(material) = existing {
            material.apply_cull_mode(backend, cull_mode);
            return Ok(*material);
        }

        let material = DrawMaterial::create(backend, channel, surface.base_texture, cull_mode)?;
        match key {
            Some(key) => {
                log::trace!("Created outline material for texture {:?} in {:?}", key.0, channel);
                self.textured.insert(key, material);
            }
            None => self.shared[channel.index()] = Some(material),
        }
        Ok(material)
    }

    pub fn shared(&self, channel: OutlineChannel) -> Option<DrawMaterial> {
        self.shared[channel.index()]
    }

    pub fn cached(&self, texture: TextureHandle, channel: OutlineChannel) -> Option<DrawMaterial> {
        self.textured.get(&(texture, channel)).copied()
    }

    /// Number of texture keyed materials.
    pub fn cached_len(&self) -> usize {
        self.textured.len()
    }

    /// Destroy all texture keyed materials. Shared materials are kept.
    pub fn clear<B: OutlineBackend + ?Sized>(&mut self, backend: &mut B) {
        profiling::scope!("MaterialCache::clear");

        for (_, material) in self.textured.drain() {
            backend.destroy_draw_material(material.handle);
        }
    }

    /// Destroy every material this cache created.
    pub fn teardown<B: OutlineBackend + ?Sized>(&mut self, backend: &mut B) {
        profiling::scope!("MaterialCache::teardown");

        self.clear(backend);
        for material in self.shared.iter_mut().filter_map(Option::take) {
            backend.destroy_draw_material(material.handle);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::SoftwareBackend;

    const A: OutlineChannel = OutlineChannel::Group(ColorGroup::A);
    const B: OutlineChannel = OutlineChannel::Group(ColorGroup::B);

    fn ready_backend() -> SoftwareBackend {
        let mut backend = SoftwareBackend::new();
        backend.prepare().unwrap();
        backend
    }

    #[test]
    fn same_texture_and_group_share_material() {
        let mut backend = ready_backend();
        let mut cache = MaterialCache::new();
        let surface = SurfaceMaterial::textured(TextureHandle::new(1));

        let first = cache.resolve(&mut backend, &surface, A, CullMode::Back).unwrap();
        let second = cache.resolve(&mut backend, &surface, A, CullMode::Back).unwrap();
        let other_group = cache.resolve(&mut backend, &surface, B, CullMode::Back).unwrap();
        let erase = cache
            .resolve(&mut backend, &surface, OutlineChannel::Erase, CullMode::Back)
            .unwrap();

        assert_eq!(first.handle, second.handle);
        assert_ne!(first.handle, other_group.handle);
        assert_ne!(first.handle, erase.handle);
        assert_eq!(cache.cached_len(), 3);
        assert_eq!(backend.material_count(), 3);
    }

    #[test]
    fn untextured_surfaces_use_shared_materials() {
        let mut backend = ready_backend();
        let mut cache = MaterialCache::new();
        cache.create_shared(&mut backend, CullMode::Back).unwrap();

        let material = cache
            .resolve(&mut backend, &SurfaceMaterial::UNTEXTURED, B, CullMode::Back)
            .unwrap();
        assert_eq!(Some(material), cache.shared(B));
        assert_eq!(cache.cached_len(), 0);
        assert_eq!(backend.material_count(), OutlineChannel::COUNT);
    }

    #[test]
    fn cull_mode_follows_config() {
        let mut backend = ready_backend();
        let mut cache = MaterialCache::new();
        let surface = SurfaceMaterial::textured(TextureHandle::new(4));

        let material = cache.resolve(&mut backend, &surface, A, CullMode::Back).unwrap();
        let updated = cache.resolve(&mut backend, &surface, A, CullMode::Off).unwrap();

        assert_eq!(material.handle, updated.handle);
        assert_eq!(backend.material(updated.handle).unwrap().cull_mode, CullMode::Off);
    }

    #[test]
    fn teardown_releases_everything() {
        let mut backend = ready_backend();
        let mut cache = MaterialCache::new();
        cache.create_shared(&mut backend, CullMode::Back).unwrap();
        for texture in 0..3 {
            let surface = SurfaceMaterial::textured(TextureHandle::new(texture));
            cache.resolve(&mut backend, &surface, A, CullMode::Back).unwrap();
        }
        assert_eq!(backend.material_count(), 7);

        cache.clear(&mut backend);
        assert_eq!(backend.material_count(), 4);
        cache.teardown(&mut backend);
        assert_eq!(backend.material_count(), 0);
        assert!(cache.shared(A).is_none());
    }
}
