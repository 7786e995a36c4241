//! Pass components and their operators.

pub mod light;
pub mod tone_mapping;
pub mod volumetric;

pub use light::{
    LightAccumulationState, LightPassConfig, LightPassInput, LightPassOperator, LightPassOutput,
    LightPassPhase, LightRenderer,
};
pub use tone_mapping::{
    ToneMappingFilter, ToneMappingOperator, ToneMappingParams, ToneMappingPassConfig,
};
pub use volumetric::{
    SimpleVolumetricRenderer, VolumetricOperator, VolumetricPassConfig, VolumetricPassInput,
    VolumetricPassOutput,
};
