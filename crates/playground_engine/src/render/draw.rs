//! Draw command recording for the selected pipeline variant
//!
//! Recording goes through [`DrawRecorder`], which the Vulkan render pass
//! implements. What gets drawn depends only on the variant and the scene data.

use ash::vk;
use nalgebra::{Matrix4, Perspective3, Rotation3, Translation3, Vector3};

use super::mesh::Mesh;
use super::variant::PipelineVariant;

/// Camera distance along -Z
const CAMERA_Z: f32 = -2.0;
/// Vertical field of view, degrees
const FOV_Y_DEGREES: f32 = 70.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 200.0;
/// Model spin per frame, degrees
const SPIN_DEGREES_PER_FRAME: f32 = 0.4;

/// Commands that can be issued inside an open render pass
pub trait DrawRecorder {
    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);

    /// Bind a vertex buffer at binding 0, offset 0
    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer);

    /// Push constants at offset 0
    fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, bytes: &[u8]);

    /// Non-indexed draw
    fn draw(&mut self, vertex_count: u32, instance_count: u32);
}

/// A built pipeline and the layout it was created with
///
/// A null pipeline means the build failed; such a variant draws nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariantPipeline {
    /// Pipeline handle, possibly null
    pub pipeline: vk::Pipeline,
    /// Layout handle
    pub layout: vk::PipelineLayout,
}

impl VariantPipeline {
    /// True when the pipeline was built
    pub fn is_usable(&self) -> bool {
        self.pipeline != vk::Pipeline::null()
    }
}

/// What a draw needs from an uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshDraw {
    /// Vertex buffer; `None` when the mesh was never uploaded
    pub buffer: Option<vk::Buffer>,
    /// Vertices to draw
    pub vertex_count: u32,
}

impl MeshDraw {
    /// Drawable when there is a buffer with at least one vertex
    pub fn is_drawable(&self) -> bool {
        self.buffer.is_some() && self.vertex_count > 0
    }
}

impl From<&Mesh> for MeshDraw {
    fn from(mesh: &Mesh) -> Self {
        Self {
            buffer: mesh.vertex_buffer.map(|b| b.buffer),
            vertex_count: mesh.vertex_count(),
        }
    }
}

/// Push-constant block of the mesh shader: `vec4 data; mat4 render_matrix;`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshPushConstants {
    /// Unused by the shader, kept for layout
    pub data: [f32; 4],
    /// Column-major projection * view * model
    pub render_matrix: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for MeshPushConstants {}
unsafe impl bytemuck::Zeroable for MeshPushConstants {}

impl MeshPushConstants {
    /// Size of the block in bytes
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    /// The vertex-stage range covering the whole block
    pub fn range() -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: Self::SIZE,
        }
    }

    /// Constants for `frame_number` at the given aspect ratio
    pub fn for_frame(frame_number: u64, aspect: f32) -> Self {
        Self {
            data: [0.0; 4],
            render_matrix: mesh_transform(frame_number, aspect).into(),
        }
    }
}

/// Projection * view * model for the spinning mesh
///
/// Camera at z = -2 looking down +Z; the projection's Y axis is flipped to
/// match Vulkan's downward clip-space Y.
pub fn mesh_transform(frame_number: u64, aspect: f32) -> Matrix4<f32> {
    let view = Translation3::new(0.0, 0.0, CAMERA_Z).to_homogeneous();

    let mut projection = Perspective3::new(aspect, FOV_Y_DEGREES.to_radians(), Z_NEAR, Z_FAR).to_homogeneous();
    projection[(1, 1)] *= -1.0;

    let angle = (frame_number as f32 * SPIN_DEGREES_PER_FRAME).to_radians();
    let model = Rotation3::from_axis_angle(&Vector3::y_axis(), angle).to_homogeneous();

    projection * view * model
}

/// Everything needed to record one frame's draws
#[derive(Debug, Clone, Copy)]
pub struct DrawScene<'a> {
    /// Variant to draw
    pub variant: PipelineVariant,
    /// One entry per variant, indexed by [`PipelineVariant::index`]
    pub pipelines: &'a [VariantPipeline],
    /// The built-in triangle
    pub triangle: MeshDraw,
    /// The loaded mesh
    pub mesh: MeshDraw,
    /// Frame being recorded
    pub frame_number: u64,
    /// Render extent width / height
    pub aspect: f32,
}

/// Record the selected variant's draws into `recorder`
///
/// Variants whose pipeline failed to build, or whose mesh was never uploaded,
/// record nothing.
pub fn record_variant_draws<R: DrawRecorder>(recorder: &mut R, scene: &DrawScene<'_>) {
    let Some(pipeline) = scene.pipelines.get(scene.variant.index()).copied() else {
        log::warn!("No pipeline slot for {:?}", scene.variant);
        return;
    };
    if !pipeline.is_usable() {
        log::trace!("Skipping {:?}: pipeline not built", scene.variant);
        return;
    }

    match scene.variant {
        PipelineVariant::FlatTriangle => {
            let Some(buffer) = scene.triangle.buffer.filter(|_| scene.triangle.is_drawable()) else {
                return;
            };
            recorder.bind_pipeline(pipeline.pipeline);
            recorder.bind_vertex_buffer(buffer);
            recorder.draw(scene.triangle.vertex_count, 1);
        }
        PipelineVariant::ColoredTriangle => {
            recorder.bind_pipeline(pipeline.pipeline);
            recorder.draw(3, 1);
        }
        PipelineVariant::PushConstantMesh => {
            let mesh = if scene.mesh.is_drawable() { scene.mesh } else { scene.triangle };
            let Some(buffer) = mesh.buffer.filter(|_| mesh.is_drawable()) else {
                return;
            };

            let constants = MeshPushConstants::for_frame(scene.frame_number, scene.aspect);
            recorder.bind_pipeline(pipeline.pipeline);
            recorder.bind_vertex_buffer(buffer);
            recorder.push_constants(pipeline.layout, vk::ShaderStageFlags::VERTEX, bytemuck::bytes_of(&constants));
            recorder.draw(mesh.vertex_count, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ash::vk::Handle;
    use nalgebra::Vector4;

    #[derive(Debug, Clone, PartialEq)]
    enum Command {
        BindPipeline(vk::Pipeline),
        BindVertexBuffer(vk::Buffer),
        PushConstants(vk::ShaderStageFlags, Vec<u8>),
        Draw(u32, u32),
    }

    #[derive(Default)]
    struct MockRecorder {
        commands: Vec<Command>,
    }

    impl DrawRecorder for MockRecorder {
        fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
            self.commands.push(Command::BindPipeline(pipeline));
        }

        fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
            self.commands.push(Command::BindVertexBuffer(buffer));
        }

        fn push_constants(&mut self, _layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, bytes: &[u8]) {
            self.commands.push(Command::PushConstants(stages, bytes.to_vec()));
        }

        fn draw(&mut self, vertex_count: u32, instance_count: u32) {
            self.commands.push(Command::Draw(vertex_count, instance_count));
        }
    }

    fn pipelines() -> Vec<VariantPipeline> {
        (1..=3)
            .map(|i| VariantPipeline {
                pipeline: vk::Pipeline::from_raw(i),
                layout: vk::PipelineLayout::from_raw(10 + i),
            })
            .collect()
    }

    fn scene<'a>(variant: PipelineVariant, pipelines: &'a [VariantPipeline], mesh: MeshDraw) -> DrawScene<'a> {
        DrawScene {
            variant,
            pipelines,
            triangle: MeshDraw {
                buffer: Some(vk::Buffer::from_raw(100)),
                vertex_count: 3,
            },
            mesh,
            frame_number: 0,
            aspect: 1700.0 / 900.0,
        }
    }

    fn draws(commands: &[Command]) -> Vec<(u32, u32)> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw(v, i) => Some((*v, *i)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_flat_triangle_draws_once_without_push_constants() {
        let pipelines = pipelines();
        let mut recorder = MockRecorder::default();

        record_variant_draws(&mut recorder, &scene(PipelineVariant::FlatTriangle, &pipelines, MeshDraw::default()));

        assert_eq!(
            recorder.commands,
            vec![
                Command::BindPipeline(vk::Pipeline::from_raw(1)),
                Command::BindVertexBuffer(vk::Buffer::from_raw(100)),
                Command::Draw(3, 1),
            ]
        );
    }

    #[test]
    fn test_colored_triangle_needs_no_vertex_buffer() {
        let pipelines = pipelines();
        let mut recorder = MockRecorder::default();

        record_variant_draws(&mut recorder, &scene(PipelineVariant::ColoredTriangle, &pipelines, MeshDraw::default()));

        assert_eq!(
            recorder.commands,
            vec![Command::BindPipeline(vk::Pipeline::from_raw(2)), Command::Draw(3, 1)]
        );
    }

    #[test]
    fn test_null_pipeline_records_nothing() {
        let mut pipelines = pipelines();
        pipelines[0].pipeline = vk::Pipeline::null();
        let mut recorder = MockRecorder::default();

        record_variant_draws(&mut recorder, &scene(PipelineVariant::FlatTriangle, &pipelines, MeshDraw::default()));

        assert!(recorder.commands.is_empty());
    }

    #[test]
    fn test_push_constant_mesh_draws_loaded_mesh() {
        let pipelines = pipelines();
        let mesh = MeshDraw {
            buffer: Some(vk::Buffer::from_raw(200)),
            vertex_count: 2904,
        };
        let mut recorder = MockRecorder::default();

        record_variant_draws(&mut recorder, &scene(PipelineVariant::PushConstantMesh, &pipelines, mesh));

        assert_eq!(draws(&recorder.commands), vec![(2904, 1)]);
        assert!(recorder
            .commands
            .contains(&Command::BindVertexBuffer(vk::Buffer::from_raw(200))));

        let pushed: Vec<&Command> = recorder
            .commands
            .iter()
            .filter(|c| matches!(c, Command::PushConstants(..)))
            .collect();
        assert_eq!(pushed.len(), 1);
        if let Command::PushConstants(stages, bytes) = pushed[0] {
            assert_eq!(*stages, vk::ShaderStageFlags::VERTEX);
            assert_eq!(bytes.len(), 80);
        }
    }

    #[test]
    fn test_push_constant_mesh_falls_back_to_triangle() {
        let pipelines = pipelines();
        let mut recorder = MockRecorder::default();

        record_variant_draws(&mut recorder, &scene(PipelineVariant::PushConstantMesh, &pipelines, MeshDraw::default()));

        assert_eq!(draws(&recorder.commands), vec![(3, 1)]);
        assert!(recorder
            .commands
            .contains(&Command::BindVertexBuffer(vk::Buffer::from_raw(100))));
    }

    #[test]
    fn test_missing_triangle_buffer_records_nothing() {
        let pipelines = pipelines();
        let mut scene = scene(PipelineVariant::FlatTriangle, &pipelines, MeshDraw::default());
        scene.triangle.buffer = None;
        let mut recorder = MockRecorder::default();

        record_variant_draws(&mut recorder, &scene);

        assert!(recorder.commands.is_empty());
    }

    #[test]
    fn test_push_constant_layout() {
        assert_eq!(MeshPushConstants::SIZE, 80);
        assert_eq!(std::mem::offset_of!(MeshPushConstants, render_matrix), 16);

        let range = MeshPushConstants::range();
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::VERTEX);
        assert_eq!(range.offset, 0);
        assert_eq!(range.size, 80);
    }

    #[test]
    fn test_transform_places_origin_in_front_of_camera() {
        let mvp = mesh_transform(0, 1700.0 / 900.0);
        let clip = mvp * Vector4::new(0.0, 0.0, 0.0, 1.0);

        // Origin sits 2 units in front of the camera: centered, inside the depth range
        assert_relative_eq!(clip.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(clip.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(clip.w, 2.0, epsilon = 1e-5);
        let ndc_z = clip.z / clip.w;
        assert!((-1.0..=1.0).contains(&ndc_z));
    }

    #[test]
    fn test_transform_flips_y() {
        let mvp = mesh_transform(0, 1.0);
        let clip = mvp * Vector4::new(0.0, 1.0, 0.0, 1.0);
        assert!(clip.y < 0.0);
    }

    #[test]
    fn test_model_spins_about_y() {
        // 225 frames * 0.4° = 90°: +X swings onto the Z axis, Y is untouched
        let a = mesh_transform(0, 1.0) * Vector4::new(0.0, 0.5, 0.0, 1.0);
        let b = mesh_transform(225, 1.0) * Vector4::new(0.0, 0.5, 0.0, 1.0);
        assert_relative_eq!(a, b, epsilon = 1e-5);

        let x_axis = mesh_transform(225, 1.0) * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(x_axis.x, 0.0, epsilon = 1e-5);
    }
}
