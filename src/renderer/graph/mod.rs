//! Render Pass Graph
//!
//! Passes are declared independently of execution order and instantiated
//! later:
//! - `descriptor`: immutable render buffer descriptions
//! - `declaration`: pass declarations (slots, aliases, operator kind)
//! - `compile`: declaration + resolved resources -> operator
//! - `graph`: reference scheduler (ordering, culling, aliasing, execution)
//! - `node`: the operator lifecycle trait
//! - `passes`: light accumulation, tone mapping, volumetric geometry

pub mod compile;
pub mod context;
pub mod declaration;
pub mod descriptor;
pub mod graph;
pub mod node;
pub mod passes;
pub mod shadow_utils;
pub mod view_vectors;

pub use compile::{ResolvedBindings, ResolvedResource, compile};
pub use context::{AuxiliaryTextures, CompileContext, FrameContext};
pub use declaration::{AliasBinding, PassDeclaration, PassKind, SlotName};
pub use descriptor::{
    ColorSpaceTag, RenderBufferDescriptor, RenderBufferFormat, RenderBufferId, RenderBufferShape,
};
pub use graph::{FrameGraph, GraphImports};
pub use node::RenderOperator;
pub use view_vectors::{
    ViewVectors, compute_view_vector_coef_from_projection_matrix, far_depth_from_projection_matrix,
};
