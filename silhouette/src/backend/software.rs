use glam::{Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
use silhouette_types::{
    CullMode, Handedness, MaterialHandle, Mesh, MeshHandle, RenderTargetHandle, Skeleton, SkeletonHandle, Texture,
    TextureHandle,
};

use crate::{
    backend::{
        CompositePass, DrawCommand, DrawMaterialDescriptor, OutlineBackend, RenderTargetDescriptor,
        OUTLINE_BUFFER_SHADER, OUTLINE_COMPOSITE_SHADER,
    },
    camera::OutlineCameraState,
    compose::{self, ColorImage},
    uniforms::OutlineUniforms,
    util::{
        freelist::{FreelistIndex, FreelistVec},
        typedefs::FastHashSet,
    },
    OutlineError, OutlineResult,
};

#[derive(Debug)]
struct SoftwareTarget {
    label: String,
    color: ColorImage,
}

#[derive(Debug, Default)]
struct SceneStore {
    meshes: FreelistVec<Mesh>,
    textures: FreelistVec<Texture>,
    skeletons: FreelistVec<Skeleton>,
    materials: FreelistVec<DrawMaterialDescriptor>,
}

/// Reference [`OutlineBackend`] that renders on the CPU.
///
/// Holds its own meshes, textures, skeletons and images. Triangles are
/// rasterized with perspective correct texture coordinates; triangles with a
/// vertex behind the camera are dropped rather than clipped.
#[derive(Debug)]
pub struct SoftwareBackend {
    assets: FastHashSet<String>,
    prepared: bool,
    scene: SceneStore,
    targets: FreelistVec<SoftwareTarget>,
    uniforms: OutlineUniforms,
    last_draws: Vec<DrawCommand>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            assets: [OUTLINE_BUFFER_SHADER, OUTLINE_COMPOSITE_SHADER]
                .into_iter()
                .map(String::from)
                .collect(),
            prepared: false,
            scene: SceneStore::default(),
            targets: FreelistVec::new(),
            uniforms: OutlineUniforms::default(),
            last_draws: Vec::new(),
        }
    }

    /// Make a shader asset unavailable, as if it were never shipped.
    pub fn remove_asset(&mut self, name: &str) {
        self.assets.remove(name);
        self.prepared = false;
    }

    /// Make a removed shader asset available again.
    pub fn add_asset(&mut self, name: &str) {
        self.assets.insert(name.to_owned());
    }

    fn require(&self, name: &str) -> OutlineResult<()> {
        if self.assets.contains(name) {
            Ok(())
        } else {
            Err(OutlineError::MissingAsset { name: name.to_owned() })
        }
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> OutlineResult<MeshHandle> {
        profiling::scope!("SoftwareBackend::add_mesh");

        mesh.validate()?;
        Ok(MeshHandle::new(self.scene.meshes.push(mesh).0))
    }

    pub fn remove_mesh(&mut self, handle: MeshHandle) -> Option<Mesh> {
        self.scene.meshes.remove(FreelistIndex(handle.idx))
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureHandle {
        TextureHandle::new(self.scene.textures.push(texture).0)
    }

    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> SkeletonHandle {
        SkeletonHandle::new(self.scene.skeletons.push(skeleton).0)
    }

    /// Replace the pose of a skeleton. Returns false for unknown handles.
    pub fn set_skeleton(&mut self, handle: SkeletonHandle, skeleton: Skeleton) -> bool {
        match self.scene.skeletons.get_mut(FreelistIndex(handle.idx)) {
            Some(slot) => {
                *slot = skeleton;
                true
            }
            None => false,
        }
    }

    /// Import a host image (a rendered frame or a destination) as a target.
    pub fn import_image(&mut self, label: &str, image: ColorImage) -> RenderTargetHandle {
        let index = self.targets.push(SoftwareTarget {
            label: label.to_owned(),
            color: image,
        });
        RenderTargetHandle::new(index.0)
    }

    pub fn image(&self, target: RenderTargetHandle) -> Option<&ColorImage> {
        Some(&self.targets.get(FreelistIndex(target.idx))?.color)
    }

    pub fn image_mut(&mut self, target: RenderTargetHandle) -> Option<&mut ColorImage> {
        Some(&mut self.targets.get_mut(FreelistIndex(target.idx))?.color)
    }

    pub fn target_label(&self, target: RenderTargetHandle) -> Option<&str> {
        Some(&self.targets.get(FreelistIndex(target.idx))?.label)
    }

    pub fn material(&self, material: MaterialHandle) -> Option<&DrawMaterialDescriptor> {
        self.scene.materials.get(FreelistIndex(material.idx))
    }

    pub fn material_count(&self) -> usize {
        self.scene.materials.len()
    }

    pub fn render_target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn uniforms(&self) -> &OutlineUniforms {
        &self.uniforms
    }

    /// Draw commands of the most recent `render_camera` call.
    pub fn last_draws(&self) -> &[DrawCommand] {
        &self.last_draws
    }
}

impl SceneStore {
    fn draw(&self, camera: &OutlineCameraState, draw: &DrawCommand, alpha_cutoff: f32, output: &mut ColorImage) {
        let Some(material) = self.materials.get(FreelistIndex(draw.material.idx)) else {
            log::warn!("Draw of object {:?} uses unknown material {:?}", draw.object, draw.material);
            return;
        };
        let Some(mesh) = self.meshes.get(FreelistIndex(draw.mesh.mesh().idx)) else {
            log::warn!("Draw of object {:?} uses unknown mesh {:?}", draw.object, draw.mesh);
            return;
        };
        let Some(indices) = mesh.submesh_indices(draw.submesh) else {
            log::debug!("Object {:?} has no submesh {}", draw.object, draw.submesh);
            return;
        };
        let skeleton = draw
            .mesh
            .skeleton()
            .and_then(|handle| self.skeletons.get(FreelistIndex(handle.idx)));
        let texture = material
            .base_texture
            .and_then(|handle| self.textures.get(FreelistIndex(handle.idx)));

        let model_view_proj = camera.view_proj * draw.transform;
        let clip: Vec<Vec4> = (0..mesh.vertex_count())
            .map(|v| model_view_proj * skin(mesh, skeleton, v).extend(1.0))
            .collect();

        let raster = Raster {
            size: output.size(),
            handedness: camera.handedness,
            cull_mode: material.cull_mode,
            color: material.channel.buffer_color(),
            texture,
            alpha_cutoff,
        };
        for triangle in indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
            raster.triangle(
                [clip[a], clip[b], clip[c]],
                [
                    mesh.vertex_texture_coordinates[a],
                    mesh.vertex_texture_coordinates[b],
                    mesh.vertex_texture_coordinates[c],
                ],
                output,
            );
        }
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear blend skinning of one vertex. Joints missing from the skeleton do
/// not move the vertex.
fn skin(mesh: &Mesh, skeleton: Option<&Skeleton>, vertex: usize) -> Vec3 {
    let position = mesh.vertex_positions[vertex];
    let Some(skeleton) = skeleton else {
        return position;
    };
    let joints = mesh.vertex_joint_indices[vertex];
    let weights = mesh.vertex_joint_weights[vertex].to_array();

    let matrix = joints.iter().zip(weights).fold(Mat4::ZERO, |acc, (&joint, weight)| {
        let joint = skeleton.joint_deltas.get(joint as usize).copied().unwrap_or(Mat4::IDENTITY);
        acc + joint * weight
    });
    matrix.transform_point3(position)
}

struct Raster<'a> {
    size: UVec2,
    handedness: Handedness,
    cull_mode: CullMode,
    color: Vec4,
    texture: Option<&'a Texture>,
    alpha_cutoff: f32,
}

impl Raster<'_> {
    fn triangle(&self, clip: [Vec4; 3], uvs: [Vec2; 3], output: &mut ColorImage) {
        if clip.iter().any(|c| c.w <= f32::EPSILON) {
            return;
        }
        let ndc = clip.map(|c| c.xy() / c.w);

        // Counter clockwise in y-up ndc is positive.
        let ndc_area = (ndc[1] - ndc[0]).perp_dot(ndc[2] - ndc[0]);
        if ndc_area == 0.0 {
            return;
        }
        let front_facing = match self.handedness {
            Handedness::Left => ndc_area < 0.0,
            Handedness::Right => ndc_area > 0.0,
        };
        if self.cull_mode == CullMode::Back && !front_facing {
            return;
        }

        let size = self.size.as_vec2();
        let screen = ndc.map(|p| Vec2::new(p.x * 0.5 + 0.5, 0.5 - p.y * 0.5) * size);
        let inv_w = clip.map(|c| 1.0 / c.w);

        let min = screen[0].min(screen[1]).min(screen[2]).floor().max(Vec2::ZERO);
        let max = screen[0].max(screen[1]).max(screen[2]).ceil().min(size);
        let area = edge(screen[0], screen[1], screen[2]);

        for y in min.y as u32..max.y as u32 {
            for x in min.x as u32..max.x as u32 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let weights = Vec3::new(
                    edge(screen[1], screen[2], p),
                    edge(screen[2], screen[0], p),
                    edge(screen[0], screen[1], p),
                ) / area;
                if weights.min_element() < 0.0 {
                    continue;
                }
                if let Some(texture) = self.texture {
                    let persp = weights * Vec3::from(inv_w);
                    let uv = (uvs[0] * persp.x + uvs[1] * persp.y + uvs[2] * persp.z) / (persp.x + persp.y + persp.z);
                    if texel_alpha(texture, uv) < self.alpha_cutoff {
                        continue;
                    }
                }
                output.set(x, y, self.color);
            }
        }
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b - a).perp_dot(p - a)
}

fn texel_alpha(texture: &Texture, uv: Vec2) -> f32 {
    let texel = (uv * texture.size.as_vec2()).floor();
    texture.alpha_at(texel.x as i32, texel.y as i32)
}

impl OutlineBackend for SoftwareBackend {
    fn prepare(&mut self) -> OutlineResult<()> {
        profiling::scope!("SoftwareBackend::prepare");

        self.require(OUTLINE_BUFFER_SHADER)?;
        self.require(OUTLINE_COMPOSITE_SHADER)?;
        self.prepared = true;
        Ok(())
    }

    fn create_render_target(&mut self, desc: &RenderTargetDescriptor) -> RenderTargetHandle {
        let index = self.targets.push(SoftwareTarget {
            label: desc.label.clone(),
            color: ColorImage::new(desc.resolution),
        });
        RenderTargetHandle::new(index.0)
    }

    fn release_render_target(&mut self, target: RenderTargetHandle) {
        if self.targets.remove(FreelistIndex(target.idx)).is_none() {
            log::warn!("Released unknown render target {:?}", target);
        }
    }

    fn render_target_resolution(&self, target: RenderTargetHandle) -> Option<UVec2> {
        Some(self.targets.get(FreelistIndex(target.idx))?.color.size())
    }

    fn create_draw_material(&mut self, desc: &DrawMaterialDescriptor) -> OutlineResult<MaterialHandle> {
        self.require(OUTLINE_BUFFER_SHADER)?;
        Ok(MaterialHandle::new(self.scene.materials.push(*desc).0))
    }

    fn set_material_cull_mode(&mut self, material: MaterialHandle, cull_mode: CullMode) {
        if let Some(desc) = self.scene.materials.get_mut(FreelistIndex(material.idx)) {
            desc.cull_mode = cull_mode;
        }
    }

    fn destroy_draw_material(&mut self, material: MaterialHandle) {
        self.scene.materials.remove(FreelistIndex(material.idx));
    }

    fn write_uniforms(&mut self, uniforms: &OutlineUniforms) {
        self.uniforms = *uniforms;
    }

    fn render_camera(&mut self, camera: &OutlineCameraState, draws: &[DrawCommand]) -> OutlineResult<()> {
        profiling::scope!("SoftwareBackend::render_camera");

        if !self.prepared {
            self.prepare()?;
        }
        let handle = camera.target.ok_or(OutlineError::Inactive)?;
        let target = self
            .targets
            .get_mut(FreelistIndex(handle.idx))
            .ok_or(OutlineError::UnknownRenderTarget(handle))?;

        // Outline draws neither test nor write depth, so only color is cleared.
        target.color.fill(camera.clear_color);
        for draw in draws {
            self.scene.draw(camera, draw, self.uniforms.alpha_cutoff, &mut target.color);
        }

        self.last_draws.clear();
        self.last_draws.extend_from_slice(draws);
        Ok(())
    }

    fn blit(
        &mut self,
        pass: CompositePass,
        source: RenderTargetHandle,
        outline: RenderTargetHandle,
        destination: RenderTargetHandle,
    ) -> OutlineResult<()> {
        profiling::scope!("SoftwareBackend::blit");

        self.require(OUTLINE_COMPOSITE_SHADER)?;
        let image = |handle: RenderTargetHandle| self.image(handle).ok_or(OutlineError::UnknownRenderTarget(handle));

        let result = match pass {
            CompositePass::SeparateColors => compose::separate_colors(image(outline)?, &self.uniforms),
            CompositePass::Composite => compose::composite(image(source)?, image(outline)?, &self.uniforms),
        };

        let target = self
            .image_mut(destination)
            .ok_or(OutlineError::UnknownRenderTarget(destination))?;
        *target = result;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const QUAD: [Vec2; 4] = [
        Vec2::new(-1.0, -1.0),
        Vec2::new(-1.0, 1.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(1.0, -1.0),
    ];
    const QUAD_UVS: [Vec2; 4] = [
        Vec2::new(0.0, 1.0),
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
    ];

    /// Left texel transparent, right texel opaque.
    fn half_cutout() -> Texture {
        Texture {
            label: None,
            size: UVec2::new(2, 1),
            data: vec![0, 0, 0, 0, 255, 255, 255, 255],
        }
    }

    fn draw_quad(texture: &Texture, w: f32) -> ColorImage {
        let raster = Raster {
            size: UVec2::new(4, 4),
            handedness: Handedness::Left,
            cull_mode: CullMode::Off,
            color: Vec4::ONE,
            texture: Some(texture),
            alpha_cutoff: 0.5,
        };
        let clip = QUAD.map(|p| (p * w).extend(0.0).extend(w));
        let mut output = ColorImage::new(raster.size);
        for [a, b, c] in [[0, 1, 2], [0, 2, 3]] {
            raster.triangle(
                [clip[a], clip[b], clip[c]],
                [QUAD_UVS[a], QUAD_UVS[b], QUAD_UVS[c]],
                &mut output,
            );
        }
        output
    }

    #[test]
    fn alpha_test_follows_texture_coordinates() {
        let texture = half_cutout();
        // Equal w on every vertex must not change coordinates after the
        // perspective divide.
        for w in [1.0, 2.0, 0.25] {
            let output = draw_quad(&texture, w);
            for y in 0..4 {
                for x in 0..2 {
                    assert_eq!(output.get(x, y), Vec4::ZERO, "w {w} pixel ({x}, {y})");
                }
                for x in 2..4 {
                    assert_eq!(output.get(x, y), Vec4::ONE, "w {w} pixel ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn triangles_behind_the_camera_are_dropped() {
        let output = draw_quad(&half_cutout(), -1.0);
        assert!(output.pixels().iter().all(|&p| p == Vec4::ZERO));
    }
}
