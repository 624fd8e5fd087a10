//! Mesh representation for the playground
//!
//! Vertices are position/normal/color triples laid out `#[repr(C)]` so the
//! vertex slice can be copied into GPU memory byte for byte. OBJ files are
//! decoded by `tobj`; this module only flattens its output into vertices.

use ash::vk;
use std::path::Path;
use thiserror::Error;

use super::vulkan::buffer::AllocatedBuffer;

/// Mesh loading errors
#[derive(Error, Debug)]
pub enum MeshError {
    /// The OBJ importer rejected the file
    #[error("Failed to load OBJ '{path}': {source}")]
    Obj {
        /// File that failed to load
        path: String,
        /// Importer error
        #[source]
        source: tobj::LoadError,
    },

    /// Index data referenced a vertex that does not exist
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// One vertex: position, normal and color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Linear RGB color
    pub color: [f32; 3],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

/// Vertex input state for pipeline creation
#[derive(Debug, Clone, Default)]
pub struct VertexInputDescription {
    /// Buffer bindings
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    /// Per-location attributes
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Create flags
    pub flags: vk::PipelineVertexInputStateCreateFlags,
}

impl Vertex {
    /// Build a vertex from its three attributes
    pub const fn new(position: [f32; 3], normal: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }

    /// Binding 0, per-vertex rate, three `vec3` attributes at locations 0..=2
    pub fn vertex_description() -> VertexInputDescription {
        let main_binding = vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        };

        let attribute = |location: u32, offset: usize| vk::VertexInputAttributeDescription {
            location,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset as u32,
        };

        VertexInputDescription {
            bindings: vec![main_binding],
            attributes: vec![
                attribute(0, std::mem::offset_of!(Vertex, position)),
                attribute(1, std::mem::offset_of!(Vertex, normal)),
                attribute(2, std::mem::offset_of!(Vertex, color)),
            ],
            flags: vk::PipelineVertexInputStateCreateFlags::empty(),
        }
    }
}

/// CPU vertices plus the GPU buffer they were uploaded into
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Triangle list vertices; written once, never mutated after upload
    pub vertices: Vec<Vertex>,
    /// Set by the upload step
    pub vertex_buffer: Option<AllocatedBuffer>,
}

impl Mesh {
    /// Wrap an existing vertex list
    pub fn from_vertices(vertices: Vec<Vertex>) -> Self {
        Self {
            vertices,
            vertex_buffer: None,
        }
    }

    /// The flat green triangle drawn by the first pipeline variant
    pub fn triangle() -> Self {
        const GREEN: [f32; 3] = [0.0, 1.0, 0.0];
        const NORMAL: [f32; 3] = [0.0, 0.0, 0.0];

        Self::from_vertices(vec![
            Vertex::new([0.0, -1.0, 0.0], NORMAL, GREEN),
            Vertex::new([1.0, 1.0, 0.0], NORMAL, GREEN),
            Vertex::new([-1.0, 1.0, 0.0], NORMAL, GREEN),
        ])
    }

    /// Decode an OBJ file into a flat, triangulated vertex list
    ///
    /// Normals double as colors. Missing or broken materials are only warnings.
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Self, MeshError> {
        let path = path.as_ref();
        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };

        let (models, materials) = tobj::load_obj(path, &options).map_err(|source| MeshError::Obj {
            path: path.display().to_string(),
            source,
        })?;

        if let Err(warning) = materials {
            log::warn!("{}: {}", path.display(), warning);
        }

        let mut vertices = Vec::new();
        for model in &models {
            let mesh = &model.mesh;
            if mesh.normals.is_empty() {
                log::warn!("{}: shape '{}' has no normals", path.display(), model.name);
            }

            for &index in &mesh.indices {
                let i = index as usize;
                let position = read_vec3(&mesh.positions, i).ok_or_else(|| {
                    MeshError::InvalidFormat(format!("position index {} out of bounds", i))
                })?;
                let normal = read_vec3(&mesh.normals, i).unwrap_or([0.0, 1.0, 0.0]);

                vertices.push(Vertex::new(position, normal, normal));
            }
        }

        log::info!("Loaded {} vertices from {}", vertices.len(), path.display());
        Ok(Self::from_vertices(vertices))
    }

    /// Number of vertices to draw
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }
}

fn read_vec3(data: &[f32], index: usize) -> Option<[f32; 3]> {
    data.get(3 * index..3 * index + 3).map(|v| [v[0], v[1], v[2]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_obj(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("playground_{}_{}.obj", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_vertex_layout_matches_description() {
        let description = Vertex::vertex_description();

        assert_eq!(std::mem::size_of::<Vertex>(), 36);
        assert_eq!(description.bindings.len(), 1);
        assert_eq!(description.bindings[0].stride, 36);

        let offsets: Vec<u32> = description.attributes.iter().map(|a| a.offset).collect();
        let locations: Vec<u32> = description.attributes.iter().map(|a| a.location).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        assert_eq!(locations, vec![0, 1, 2]);
    }

    #[test]
    fn test_triangle_is_flat_green() {
        let mesh = Mesh::triangle();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.vertices[0].position, [0.0, -1.0, 0.0]);
        assert_eq!(mesh.vertices[1].position, [1.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[2].position, [-1.0, 1.0, 0.0]);
        assert!(mesh.vertices.iter().all(|v| v.color == [0.0, 1.0, 0.0]));
        assert!(mesh.vertex_buffer.is_none());
    }

    #[test]
    fn test_load_obj_triangulates_and_colors_by_normal() {
        let path = write_temp_obj(
            "quad",
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1 4//1\n",
        );

        let mesh = Mesh::load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();

        // One quad becomes two triangles
        assert_eq!(mesh.vertex_count(), 6);
        for vertex in &mesh.vertices {
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
            assert_eq!(vertex.color, vertex.normal);
        }
    }

    #[test]
    fn test_load_obj_without_normals_uses_up_vector() {
        let path = write_temp_obj("no_normals", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");

        let mesh = Mesh::load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[1].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_missing_obj_is_an_error() {
        let result = Mesh::load_obj("definitely/not/here.obj");
        assert!(matches!(result, Err(MeshError::Obj { .. })));
    }
}
