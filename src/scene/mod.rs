//! Scene graph data consumed by the passes.
//!
//! - Scene: ordered object tree with deterministic traversal
//! - Light: closed light-type enumeration, directional lights own their shadow camera
//! - Camera: view/projection state of the current viewpoint
//! - Mesh/Material: just enough for material-filtered forward passes

pub mod camera;
pub mod light;
pub mod mesh;
pub mod scene;

pub use camera::{Camera, ProjectionType};
pub use light::{DirectionalLight, Light, LightKind, PointLight, ShadowCamera};
pub use mesh::{Material, Mesh, ShadingModel};
pub use scene::{Node, SceneObject, Scene};

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeKey;
    pub struct MeshKey;
    pub struct LightKey;
}
