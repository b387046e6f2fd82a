//! Core sculpting types.
//!
//! The tool set is closed: every tool the dispatcher knows is a [`ToolKind`]
//! variant, and GUI indices are converted through [`ToolKind::from_index`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Sculpting tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ToolKind {
    /// Raise the surface along the ring's area normal
    #[default]
    Brush = 0,
    /// Carve a groove, pinching toward the center
    Crease = 1,
    /// Drag the ring along with the pointer
    Drag = 2,
    /// Pull vertices toward the ring's average plane
    Flatten = 3,
    /// Push vertices along their own normals
    Inflate = 4,
    /// Paint color, roughness and metalness
    Paint = 5,
    /// Pull vertices toward the brush center
    Pinch = 6,
    /// Rotate the ring around the area normal
    Twist = 7,
    /// Scale the ring around the brush center
    LocalScale = 8,
    /// Move the ring picked at gesture start
    Move = 9,
    /// Laplacian smoothing
    Smooth = 10,
    /// Paint the protective mask
    Masking = 11,
    /// Translate, rotate or scale the selection
    Transform = 12,
    /// Select vertices, edges or faces
    ElementSelect = 13,
}

impl ToolKind {
    pub const COUNT: usize = 14;

    pub const ALL: [ToolKind; Self::COUNT] = [
        ToolKind::Brush,
        ToolKind::Crease,
        ToolKind::Drag,
        ToolKind::Flatten,
        ToolKind::Inflate,
        ToolKind::Paint,
        ToolKind::Pinch,
        ToolKind::Twist,
        ToolKind::LocalScale,
        ToolKind::Move,
        ToolKind::Smooth,
        ToolKind::Masking,
        ToolKind::Transform,
        ToolKind::ElementSelect,
    ];

    /// Look up a tool by its GUI index.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Brush => "brush",
            ToolKind::Crease => "crease",
            ToolKind::Drag => "drag",
            ToolKind::Flatten => "flatten",
            ToolKind::Inflate => "inflate",
            ToolKind::Paint => "paint",
            ToolKind::Pinch => "pinch",
            ToolKind::Twist => "twist",
            ToolKind::LocalScale => "local scale",
            ToolKind::Move => "move",
            ToolKind::Smooth => "smooth",
            ToolKind::Masking => "masking",
            ToolKind::Transform => "transform",
            ToolKind::ElementSelect => "element select",
        }
    }

    /// Tool writes colors/materials instead of positions.
    pub fn edits_colors(self) -> bool {
        matches!(
            self,
            ToolKind::Paint | ToolKind::Masking | ToolKind::ElementSelect
        )
    }

    /// Tool mirrors its edits across the symmetry plane when enabled.
    pub fn supports_symmetry(self) -> bool {
        !matches!(self, ToolKind::Transform | ToolKind::ElementSelect)
    }

    /// Influence is scaled by `1 - selection`.
    pub fn respects_mask(self) -> bool {
        !matches!(self, ToolKind::Masking | ToolKind::ElementSelect)
    }

    /// Tool re-picks under the pointer on every sample. Other tools keep the
    /// center picked at gesture start.
    pub fn follows_pointer(self) -> bool {
        matches!(
            self,
            ToolKind::Brush
                | ToolKind::Crease
                | ToolKind::Flatten
                | ToolKind::Inflate
                | ToolKind::Paint
                | ToolKind::Pinch
                | ToolKind::Smooth
                | ToolKind::Masking
        )
    }
}

/// One pointer sample fed to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SculptSample {
    /// Pointer position in screen pixels
    pub mouse: Vec2,
    /// Tablet pressure (0.0 to 1.0), 1.0 for mice
    pub pressure: f32,
}

impl SculptSample {
    pub fn new(mouse: Vec2) -> Self {
        Self {
            mouse,
            pressure: 1.0,
        }
    }

    pub fn with_pressure(mouse: Vec2, pressure: f32) -> Self {
        Self {
            mouse,
            pressure: pressure.clamp(0.0, 1.0),
        }
    }
}

/// Element kind targeted by the selection tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    #[default]
    Vertex,
    Edge,
    Face,
}

/// How a picked element combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionAction {
    #[default]
    Replace,
    Add,
    Remove,
}

/// Operation applied by the transform tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransformMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}
