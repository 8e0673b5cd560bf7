//! Set of objects that currently receive an outline.
//!
//! Membership in a [`TagRegistry`] is what makes an object visible to the
//! outline pass; the objects themselves are owned by the host. The draw loop
//! never iterates the registry directly, it iterates a [`TagSnapshot`] taken
//! at the start of the frame.

use std::{
    hash::BuildHasherDefault,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use glam::Mat4;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHasher;
use silhouette_types::{ColorGroup, MeshKind, OutlineChannel, SurfaceMaterial};
use smallvec::SmallVec;

/// Surface list of a renderable. Most objects have a handful of surfaces.
pub type SurfaceList = SmallVec<[SurfaceMaterial; 4]>;

/// Host object that can be drawn into the outline buffer.
pub trait Renderable: Send + Sync {
    /// Mesh to draw. `None` means the object currently has nothing to draw.
    fn mesh(&self) -> Option<MeshKind>;

    /// Number of sub-surfaces of the mesh.
    fn submesh_count(&self) -> u32;

    /// Scene layer, tested against the source camera's culling mask.
    fn layer(&self) -> u8 {
        0
    }

    /// Model to world transform.
    fn transform(&self) -> Mat4;

    /// The surface materials shared by every instance of this renderable.
    fn shared_materials(&self) -> SurfaceList;
}

/// Plain [`Renderable`] for hosts without their own object type.
#[derive(Debug)]
pub struct ObjectRenderable {
    mesh: Option<MeshKind>,
    submesh_count: u32,
    layer: u8,
    transform: RwLock<Mat4>,
    materials: SurfaceList,
}

impl ObjectRenderable {
    pub fn new(mesh: MeshKind, submesh_count: u32, materials: impl IntoIterator<Item = SurfaceMaterial>) -> Self {
        Self {
            mesh: Some(mesh),
            submesh_count,
            layer: 0,
            transform: RwLock::new(Mat4::IDENTITY),
            materials: materials.into_iter().collect(),
        }
    }

    /// A renderable without a mesh.
    pub fn empty() -> Self {
        Self {
            mesh: None,
            submesh_count: 0,
            layer: 0,
            transform: RwLock::new(Mat4::IDENTITY),
            materials: SurfaceList::new(),
        }
    }

    pub fn with_layer(mut self, layer: u8) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_transform(self, transform: Mat4) -> Self {
        *self.transform.write() = transform;
        self
    }

    pub fn set_transform(&self, transform: Mat4) {
        *self.transform.write() = transform;
    }
}

impl Renderable for ObjectRenderable {
    fn mesh(&self) -> Option<MeshKind> {
        self.mesh
    }

    fn submesh_count(&self) -> u32 {
        self.submesh_count
    }

    fn layer(&self) -> u8 {
        self.layer
    }

    fn transform(&self) -> Mat4 {
        *self.transform.read()
    }

    fn shared_materials(&self) -> SurfaceList {
        self.materials.clone()
    }
}

/// Identity of a [`TaggedObject`], allocated when the object is created.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Copy, Clone)]
struct TagAttributes {
    group: ColorGroup,
    erase: bool,
}

/// One scene entity that receives an outline.
pub struct TaggedObject {
    id: ObjectId,
    renderable: Option<Arc<dyn Renderable>>,
    attributes: RwLock<TagAttributes>,
    surface_cache: Mutex<Option<Arc<[SurfaceMaterial]>>>,
}

impl TaggedObject {
    pub fn new(renderable: Arc<dyn Renderable>, group: ColorGroup) -> Self {
        Self::from_parts(Some(renderable), group)
    }

    /// A tag whose renderable has gone away. Registering it is allowed; the
    /// dispatcher skips it.
    pub fn null(group: ColorGroup) -> Self {
        Self::from_parts(None, group)
    }

    fn from_parts(renderable: Option<Arc<dyn Renderable>>, group: ColorGroup) -> Self {
        Self {
            id: ObjectId::next(),
            renderable,
            attributes: RwLock::new(TagAttributes { group, erase: false }),
            surface_cache: Mutex::new(None),
        }
    }

    pub fn with_erase(self, erase: bool) -> Self {
        self.attributes.write().erase = erase;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn renderable(&self) -> Option<&Arc<dyn Renderable>> {
        self.renderable.as_ref()
    }

    pub fn color_group(&self) -> ColorGroup {
        self.attributes.read().group
    }

    pub fn set_color_group(&self, group: ColorGroup) {
        self.attributes.write().group = group;
    }

    pub fn erase(&self) -> bool {
        self.attributes.read().erase
    }

    pub fn set_erase(&self, erase: bool) {
        self.attributes.write().erase = erase;
    }

    /// Channel this object draws into this frame.
    pub fn channel(&self) -> OutlineChannel {
        let attributes = *self.attributes.read();
        OutlineChannel::from_tag(attributes.group, attributes.erase)
    }

    /// Cached surface materials, populated from the renderable on first access.
    pub fn surface_materials(&self) -> Option<Arc<[SurfaceMaterial]>> {
        let renderable = self.renderable.as_ref()?;
        let mut cache = self.surface_cache.lock();
        let materials = cache.get_or_insert_with(|| renderable.shared_materials().into_iter().collect());
        Some(Arc::clone(materials))
    }

    /// Forget the cached surface materials. The next access repopulates them.
    pub fn invalidate_cache(&self) {
        *self.surface_cache.lock() = None;
    }
}

impl std::fmt::Debug for TaggedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let attributes = *self.attributes.read();
        f.debug_struct("TaggedObject")
            .field("id", &self.id)
            .field("null", &self.renderable.is_none())
            .field("group", &attributes.group)
            .field("erase", &attributes.erase)
            .finish()
    }
}

/// Immutable view of the registry taken at one point in time.
///
/// Later registrations and removals do not affect an existing snapshot.
#[derive(Debug, Clone)]
pub struct TagSnapshot {
    objects: Arc<[Arc<TaggedObject>]>,
}

impl TagSnapshot {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<TaggedObject>> {
        self.objects.iter()
    }
}

impl<'a> IntoIterator for &'a TagSnapshot {
    type Item = &'a Arc<TaggedObject>;
    type IntoIter = std::slice::Iter<'a, Arc<TaggedObject>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The set of currently tagged objects.
///
/// Mutation requires `&mut self`; hosts that register from several threads
/// must synchronize externally.
#[derive(Debug, Default)]
pub struct TagRegistry {
    objects: IndexMap<ObjectId, Arc<TaggedObject>, BuildHasherDefault<FxHasher>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the object. Returns false if it was already registered.
    pub fn register(&mut self, object: Arc<TaggedObject>) -> bool {
        profiling::scope!("TagRegistry::register");

        let id = object.id();
        if self.objects.contains_key(&id) {
            log::trace!("Object {:?} is already tagged", id);
            return false;
        }
        self.objects.insert(id, object);
        true
    }

    /// Removes the object, returning it if it was registered.
    pub fn unregister(&mut self, id: ObjectId) -> Option<Arc<TaggedObject>> {
        profiling::scope!("TagRegistry::unregister");

        self.objects.shift_remove(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Arc<TaggedObject>> {
        self.objects.get(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Snapshot of the current members.
    pub fn all(&self) -> TagSnapshot {
        TagSnapshot {
            objects: self.objects.values().cloned().collect(),
        }
    }

    /// Surface materials of a registered object, or `None` for unknown objects
    /// and objects without a renderable.
    pub fn surface_materials(&self, id: ObjectId) -> Option<Arc<[SurfaceMaterial]>> {
        self.objects.get(&id)?.surface_materials()
    }

    pub fn invalidate_cache(&self, id: ObjectId) {
        if let Some(object) = self.objects.get(&id) {
            object.invalidate_cache();
        }
    }
}
