//! Graphics pipeline construction
//!
//! [`PipelineBuilder`] owns every piece of fixed-function state as plain data
//! and only assembles the Vulkan create-info structs inside [`PipelineBuilder::build`].
//! The same builder is reconfigured and rebuilt once per pipeline variant.

use ash::{vk, Device};
use std::ffi::CStr;
use thiserror::Error;

use crate::render::mesh::VertexInputDescription;
use crate::render::DeletionQueue;
use super::context::{VulkanError, VulkanResult};

const ENTRY_POINT: &CStr = c"main";

/// Pipeline construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No shader stages were configured
    #[error("Pipeline has no shader stages")]
    NoShaderStages,

    /// A stage refers to a shader module that failed to load
    #[error("Shader stage {stage:?} has no module")]
    MissingShaderStage {
        /// Stage with the null module
        stage: vk::ShaderStageFlags,
    },

    /// The driver rejected the pipeline
    #[error("Pipeline creation failed: {0}")]
    Creation(vk::Result),
}

/// One programmable stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStage {
    /// Stage bit
    pub stage: vk::ShaderStageFlags,
    /// Module handle; null when loading failed
    pub module: vk::ShaderModule,
}

/// Fixed-function and shader state for a graphics pipeline
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// Programmable stages, in submission order
    pub shader_stages: Vec<ShaderStage>,
    /// Vertex bindings and attributes; empty for shader-generated geometry
    pub vertex_input: VertexInputDescription,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Fill mode
    pub polygon_mode: vk::PolygonMode,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
    /// Front-face winding
    pub front_face: vk::FrontFace,
    /// Sample count
    pub samples: vk::SampleCountFlags,
    /// Per-attachment blend state, one per color attachment
    pub color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    /// Fixed viewport
    pub viewport: vk::Viewport,
    /// Fixed scissor
    pub scissor: vk::Rect2D,
    /// Layout the pipeline is created against
    pub layout: vk::PipelineLayout,
}

impl PipelineBuilder {
    /// Default state covering the whole `extent`: filled triangle lists, no culling, no blending
    pub fn new(extent: vk::Extent2D) -> Self {
        Self {
            shader_stages: Vec::new(),
            vertex_input: VertexInputDescription::default(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            samples: vk::SampleCountFlags::TYPE_1,
            color_blend_attachment: vk::PipelineColorBlendAttachmentState {
                blend_enable: vk::FALSE,
                color_write_mask: vk::ColorComponentFlags::RGBA,
                ..Default::default()
            },
            viewport: vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            layout: vk::PipelineLayout::null(),
        }
    }

    /// Replace the stages with a vertex/fragment pair
    ///
    /// `None` modules are kept as null stages so the build reports them.
    pub fn set_shaders(&mut self, vertex: Option<vk::ShaderModule>, fragment: Option<vk::ShaderModule>) -> &mut Self {
        self.shader_stages = vec![
            ShaderStage {
                stage: vk::ShaderStageFlags::VERTEX,
                module: vertex.unwrap_or_else(vk::ShaderModule::null),
            },
            ShaderStage {
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fragment.unwrap_or_else(vk::ShaderModule::null),
            },
        ];
        self
    }

    /// Replace the vertex input description
    pub fn set_vertex_input(&mut self, vertex_input: VertexInputDescription) -> &mut Self {
        self.vertex_input = vertex_input;
        self
    }

    /// Replace the pipeline layout
    pub fn set_layout(&mut self, layout: vk::PipelineLayout) -> &mut Self {
        self.layout = layout;
        self
    }

    /// Check every stage has a module
    pub fn validate_stages(&self) -> Result<(), PipelineError> {
        if self.shader_stages.is_empty() {
            return Err(PipelineError::NoShaderStages);
        }
        match self.shader_stages.iter().find(|s| s.module == vk::ShaderModule::null()) {
            Some(missing) => Err(PipelineError::MissingShaderStage { stage: missing.stage }),
            None => Ok(()),
        }
    }

    /// Build against `render_pass` subpass 0
    pub fn try_build(&self, device: &Device, render_pass: vk::RenderPass) -> Result<vk::Pipeline, PipelineError> {
        self.validate_stages()?;

        let stages: Vec<vk::PipelineShaderStageCreateInfo> = self
            .shader_stages
            .iter()
            .map(|s| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(s.stage)
                    .module(s.module)
                    .name(ENTRY_POINT)
                    .build()
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .flags(self.vertex_input.flags)
            .vertex_binding_descriptions(&self.vertex_input.bindings)
            .vertex_attribute_descriptions(&self.vertex_input.attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(self.topology)
            .primitive_restart_enable(false);

        let viewports = [self.viewport];
        let scissors = [self.scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(self.samples)
            .min_sample_shading(1.0);

        let color_blend_attachments = [self.color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(self.layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, err)| PipelineError::Creation(err))?
        };

        pipelines
            .into_iter()
            .next()
            .ok_or(PipelineError::Creation(vk::Result::ERROR_UNKNOWN))
    }

    /// Like [`PipelineBuilder::try_build`], but logs failures and returns a null pipeline
    pub fn build(&self, device: &Device, render_pass: vk::RenderPass) -> vk::Pipeline {
        match self.try_build(device, render_pass) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                log::error!("Failed to build pipeline: {}", e);
                vk::Pipeline::null()
            }
        }
    }
}

/// Create a pipeline layout with the given push-constant ranges and queue its destruction
pub fn create_pipeline_layout(
    device: &Device,
    push_constant_ranges: &[vk::PushConstantRange],
    deletion_queue: &mut DeletionQueue,
) -> VulkanResult<vk::PipelineLayout> {
    let layout_info = vk::PipelineLayoutCreateInfo::builder().push_constant_ranges(push_constant_ranges);

    let layout = unsafe {
        device
            .create_pipeline_layout(&layout_info, None)
            .map_err(VulkanError::Api)?
    };

    let owner = device.clone();
    deletion_queue.push(move || unsafe {
        owner.destroy_pipeline_layout(layout, None);
    });

    Ok(layout)
}
