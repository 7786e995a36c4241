//! Pass Declarations
//!
//! A [`PassDeclaration`] describes a pass without running anything: which
//! buffers it reads, which it writes, which writes may alias a read, and a
//! [`PassKind`] carrying the parameters its operator will be built from.
//! Declarations are plain values; turning one into a live operator is the job
//! of [`compile`](super::compile::compile) once the graph has resolved every
//! slot to a physical resource.

use std::borrow::Cow;

use smallvec::SmallVec;

use super::descriptor::{RenderBufferDescriptor, RenderBufferId};
use super::passes::light::LightPassConfig;
use super::passes::tone_mapping::ToneMappingPassConfig;
use super::passes::volumetric::VolumetricPassConfig;

/// Name of an input or output slot of a pass.
pub type SlotName = &'static str;

/// Declares that `output` may share physical storage with `input`
/// (in-place effects).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasBinding {
    pub input: SlotName,
    pub output: SlotName,
}

/// Which operator a declaration instantiates, with its build-time parameters.
#[derive(Debug, Clone)]
pub enum PassKind {
    Light(LightPassConfig),
    ToneMapping(ToneMappingPassConfig),
    Volumetric(VolumetricPassConfig),
}

#[derive(Debug, Clone)]
pub struct PassDeclaration {
    pub name: Cow<'static, str>,
    /// `None` marks an input the pass must do without.
    pub inputs: SmallVec<[(SlotName, Option<RenderBufferDescriptor>); 8]>,
    pub outputs: SmallVec<[(SlotName, RenderBufferDescriptor); 2]>,
    pub optional_outputs: SmallVec<[SlotName; 2]>,
    pub alias_bindings: SmallVec<[AliasBinding; 1]>,
    pub kind: PassKind,
}

impl PassDeclaration {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, kind: PassKind) -> Self {
        Self {
            name: name.into(),
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
            optional_outputs: SmallVec::new(),
            alias_bindings: SmallVec::new(),
            kind,
        }
    }

    #[must_use]
    pub fn with_input(mut self, slot: SlotName, descriptor: &RenderBufferDescriptor) -> Self {
        self.inputs.push((slot, Some(descriptor.clone())));
        self
    }

    /// Adds an input that may be absent.
    #[must_use]
    pub fn with_optional_input(
        mut self,
        slot: SlotName,
        descriptor: Option<&RenderBufferDescriptor>,
    ) -> Self {
        self.inputs.push((slot, descriptor.cloned()));
        self
    }

    #[must_use]
    pub fn with_output(mut self, slot: SlotName, descriptor: &RenderBufferDescriptor) -> Self {
        self.outputs.push((slot, descriptor.clone()));
        self
    }

    /// Marks an output the graph may leave unallocated when nothing reads it.
    #[must_use]
    pub fn with_optional_output(mut self, slot: SlotName) -> Self {
        self.optional_outputs.push(slot);
        self
    }

    #[must_use]
    pub fn with_alias(mut self, input: SlotName, output: SlotName) -> Self {
        self.alias_bindings.push(AliasBinding { input, output });
        self
    }

    /// Descriptor bound to an input slot; `None` if the slot is absent or
    /// was declared without a buffer.
    #[must_use]
    pub fn input(&self, slot: &str) -> Option<&RenderBufferDescriptor> {
        self.inputs
            .iter()
            .find(|(name, _)| *name == slot)
            .and_then(|(_, desc)| desc.as_ref())
    }

    #[must_use]
    pub fn has_input_slot(&self, slot: &str) -> bool {
        self.inputs.iter().any(|(name, _)| *name == slot)
    }

    #[must_use]
    pub fn output(&self, slot: &str) -> Option<&RenderBufferDescriptor> {
        self.outputs
            .iter()
            .find(|(name, _)| *name == slot)
            .map(|(_, desc)| desc)
    }

    #[must_use]
    pub fn is_optional_output(&self, slot: &str) -> bool {
        self.optional_outputs.contains(&slot)
    }

    /// Input slot the given output may alias, if any.
    #[must_use]
    pub fn alias_source(&self, output: &str) -> Option<SlotName> {
        self.alias_bindings
            .iter()
            .find(|binding| binding.output == output)
            .map(|binding| binding.input)
    }

    /// Ids of every buffer this pass reads.
    pub fn input_ids(&self) -> impl Iterator<Item = RenderBufferId> + '_ {
        self.inputs
            .iter()
            .filter_map(|(_, desc)| desc.as_ref().map(RenderBufferDescriptor::id))
    }

    /// Ids of every buffer this pass writes.
    pub fn output_ids(&self) -> impl Iterator<Item = RenderBufferId> + '_ {
        self.outputs.iter().map(|(_, desc)| desc.id())
    }
}
