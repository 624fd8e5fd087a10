//! Pipeline variants and the selector cycling through them

use serde::{Deserialize, Serialize};

/// The fixed set of pipelines the engine builds at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineVariant {
    /// Triangle mesh through the mesh vertex layout, flat color
    FlatTriangle,
    /// Triangle generated in the vertex shader, per-vertex colors
    ColoredTriangle,
    /// OBJ mesh transformed by a push-constant MVP matrix
    PushConstantMesh,
}

impl PipelineVariant {
    /// All variants in selection order
    pub const ALL: [PipelineVariant; 3] = [
        PipelineVariant::FlatTriangle,
        PipelineVariant::ColoredTriangle,
        PipelineVariant::PushConstantMesh,
    ];

    /// Number of variants
    pub const COUNT: usize = Self::ALL.len();

    /// Position in [`PipelineVariant::ALL`]
    pub fn index(self) -> usize {
        match self {
            Self::FlatTriangle => 0,
            Self::ColoredTriangle => 1,
            Self::PushConstantMesh => 2,
        }
    }

    /// Variant at `index`, wrapping out-of-range indices
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::COUNT]
    }
}

/// Which variant is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSelector {
    selected: PipelineVariant,
}

impl VariantSelector {
    /// Start at `initial`
    pub fn new(initial: PipelineVariant) -> Self {
        Self { selected: initial }
    }

    /// Currently selected variant
    pub fn selected(&self) -> PipelineVariant {
        self.selected
    }

    /// Move to the next variant, wrapping after the last
    pub fn advance(&mut self) -> PipelineVariant {
        self.selected = PipelineVariant::from_index(self.selected.index() + 1);
        log::info!("Switched to pipeline variant {:?}", self.selected);
        self.selected
    }
}

impl Default for VariantSelector {
    fn default() -> Self {
        Self::new(PipelineVariant::FlatTriangle)
    }
}
