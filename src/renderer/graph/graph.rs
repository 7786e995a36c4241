//! Frame Graph
//!
//! Reference scheduler turning a list of [`PassDeclaration`]s into operators
//! that run every frame.
//!
//! # Compile steps
//! 1. Map every declared output to its producing pass
//! 2. Walk backwards from the requested final outputs; passes that do not
//!    contribute are culled
//! 3. Order the surviving passes topologically along producer -> consumer
//!    edges, declaration order breaking ties
//! 4. Resolve each pass's slots: imports, upstream outputs, aliases, fresh
//!    allocations
//! 5. Build every operator through [`compile`]
//!
//! A resize is handled by [`FrameGraph::dispose`] followed by a new compile;
//! partial teardown is not supported.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::errors::{Result, UmbraError};
use crate::renderer::core::{GpuDevice, RenderTargetService, TextureResource};

use super::compile::{ResolvedBindings, ResolvedResource, compile};
use super::context::{CompileContext, FrameContext};
use super::declaration::PassDeclaration;
use super::descriptor::{
    RenderBufferDescriptor, RenderBufferFormat, RenderBufferId, RenderBufferShape,
};
use super::node::RenderOperator;

/// Resources owned outside the graph, keyed by the descriptors that name them.
#[derive(Debug, Default, Clone)]
pub struct GraphImports {
    entries: FxHashMap<RenderBufferId, ResolvedResource>,
}

impl GraphImports {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import_texture(
        &mut self,
        descriptor: &RenderBufferDescriptor,
        texture: TextureResource,
    ) -> &mut Self {
        if !descriptor.has_size(texture.width, texture.height) {
            log::warn!(
                "Imported texture for '{}' is {}x{}, descriptor says {}x{}",
                descriptor.name(),
                texture.width,
                texture.height,
                descriptor.width(),
                descriptor.height()
            );
        }
        self.entries
            .insert(descriptor.id(), ResolvedResource::Texture(texture));
        self
    }

    /// Binds a shadow map descriptor to the shadow map service.
    pub fn import_shadow_maps(&mut self, descriptor: &RenderBufferDescriptor) -> &mut Self {
        self.entries
            .insert(descriptor.id(), ResolvedResource::ShadowMaps);
        self
    }

    #[must_use]
    pub fn get(&self, id: RenderBufferId) -> Option<ResolvedResource> {
        self.entries.get(&id).copied()
    }
}

struct CompiledPass {
    name: String,
    operator: Box<dyn RenderOperator>,
}

/// A compiled, executable set of operators.
pub struct FrameGraph {
    passes: Vec<CompiledPass>,
    resources: FxHashMap<RenderBufferId, ResolvedResource>,
    owned: Vec<TextureResource>,
}

impl FrameGraph {
    /// Compiles `declarations` into a graph producing `final_outputs`.
    ///
    /// On failure every operator and texture created so far is released
    /// before the error is returned.
    pub fn compile(
        declarations: &[PassDeclaration],
        final_outputs: &[&RenderBufferDescriptor],
        imports: &GraphImports,
        targets: &mut dyn RenderTargetService,
        ctx: &mut CompileContext<'_>,
    ) -> Result<Self> {
        // --- 1. producers ---
        let mut producers: FxHashMap<RenderBufferId, usize> = FxHashMap::default();
        for (index, decl) in declarations.iter().enumerate() {
            for (_, desc) in &decl.outputs {
                if let Some(previous) = producers.insert(desc.id(), index) {
                    log::warn!(
                        "'{}' is written by both '{}' and '{}'; keeping the first",
                        desc.name(),
                        declarations[previous].name,
                        decl.name
                    );
                    producers.insert(desc.id(), previous);
                }
            }
        }

        // --- 2. culling ---
        let mut live = vec![false; declarations.len()];
        let mut stack: Vec<usize> = Vec::new();
        for output in final_outputs {
            let Some(&producer) = producers.get(&output.id()) else {
                return Err(UmbraError::MissingProducer {
                    name: output.name().to_owned(),
                });
            };
            stack.push(producer);
        }
        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut live[index], true) {
                continue;
            }
            for id in declarations[index].input_ids() {
                if let Some(&producer) = producers.get(&id) {
                    if !live[producer] {
                        stack.push(producer);
                    }
                }
            }
        }

        // --- 3. ordering ---
        let order = topological_order(declarations, &producers, &live)?;

        let culled: Vec<&str> = declarations
            .iter()
            .zip(&live)
            .filter(|(_, live)| !**live)
            .map(|(decl, _)| &*decl.name)
            .collect();
        log::debug!(
            "Frame graph order: [{}], culled: {:?}",
            order
                .iter()
                .map(|&i| &*declarations[i].name)
                .collect::<Vec<_>>()
                .join(" -> "),
            culled
        );

        // --- 4 & 5. resolve and build ---
        let final_ids: FxHashSet<RenderBufferId> =
            final_outputs.iter().map(|desc| desc.id()).collect();

        let mut graph = Self {
            passes: Vec::with_capacity(order.len()),
            resources: FxHashMap::default(),
            owned: Vec::new(),
        };

        for (position, &index) in order.iter().enumerate() {
            let decl = &declarations[index];
            let later = &order[position + 1..];
            let result = graph.resolve_pass(decl, declarations, later, &final_ids, imports, targets);
            let bindings = match result {
                Ok(bindings) => bindings,
                Err(err) => {
                    graph.dispose(ctx.device, targets);
                    return Err(err);
                }
            };
            match compile(decl, &bindings, ctx) {
                Ok(operator) => graph.passes.push(CompiledPass {
                    name: decl.name.to_string(),
                    operator,
                }),
                Err(err) => {
                    log::error!("Failed to compile pass '{}': {err}", decl.name);
                    graph.dispose(ctx.device, targets);
                    return Err(err);
                }
            }
        }

        Ok(graph)
    }

    fn resolve_pass(
        &mut self,
        decl: &PassDeclaration,
        declarations: &[PassDeclaration],
        later: &[usize],
        final_ids: &FxHashSet<RenderBufferId>,
        imports: &GraphImports,
        targets: &mut dyn RenderTargetService,
    ) -> Result<ResolvedBindings> {
        let mut bindings = ResolvedBindings::new(decl.name.clone());

        for (slot, desc) in &decl.inputs {
            let resource = match desc {
                None => ResolvedResource::Absent,
                Some(desc) => self.lookup(desc, imports)?,
            };
            bindings.bind_input(*slot, resource);
        }

        let read_later = |id: RenderBufferId| {
            later
                .iter()
                .any(|&i| declarations[i].input_ids().any(|input| input == id))
        };

        for (slot, desc) in &decl.outputs {
            let resource = if desc.format() == RenderBufferFormat::ShadowMaps {
                ResolvedResource::ShadowMaps
            } else if decl.is_optional_output(slot)
                && !read_later(desc.id())
                && !final_ids.contains(&desc.id())
            {
                ResolvedResource::Absent
            } else if let Some(texture) =
                self.try_alias(decl, slot, desc, imports, &read_later, final_ids)
            {
                ResolvedResource::Texture(texture)
            } else {
                let texture = targets.allocate(desc)?;
                self.owned.push(texture);
                ResolvedResource::Texture(texture)
            };
            self.resources.insert(desc.id(), resource);
            bindings.bind_output(*slot, resource);
        }

        Ok(bindings)
    }

    fn lookup(
        &self,
        desc: &RenderBufferDescriptor,
        imports: &GraphImports,
    ) -> Result<ResolvedResource> {
        if let Some(resource) = self.resources.get(&desc.id()) {
            return Ok(*resource);
        }
        if let Some(resource) = imports.get(desc.id()) {
            return Ok(resource);
        }
        if desc.format() == RenderBufferFormat::ShadowMaps {
            return Ok(ResolvedResource::ShadowMaps);
        }
        Err(UmbraError::MissingImport {
            name: desc.name().to_owned(),
        })
    }

    /// Storage of the aliased input when `slot` may reuse it.
    ///
    /// The input must be graph-owned, of identical shape, and neither read by
    /// a later pass nor requested as a final output.
    fn try_alias(
        &self,
        decl: &PassDeclaration,
        slot: &str,
        desc: &RenderBufferDescriptor,
        imports: &GraphImports,
        read_later: &dyn Fn(RenderBufferId) -> bool,
        final_ids: &FxHashSet<RenderBufferId>,
    ) -> Option<TextureResource> {
        let input_slot = decl.alias_source(slot)?;
        let input = decl.input(input_slot)?;

        if input.shape() != desc.shape() {
            log::log!(
                alias_mismatch_level(&input.shape(), &desc.shape()),
                "Pass '{}': '{}' cannot alias '{}' (shape {:?} vs {:?}), allocating",
                decl.name,
                desc.name(),
                input.name(),
                desc.shape(),
                input.shape()
            );
            return None;
        }
        if imports.get(input.id()).is_some()
            || read_later(input.id())
            || final_ids.contains(&input.id())
        {
            log::debug!(
                "Pass '{}': '{}' still needed, '{}' gets its own storage",
                decl.name,
                input.name(),
                desc.name()
            );
            return None;
        }

        let texture = self.resources.get(&input.id())?.texture()?;
        log::debug!(
            "Pass '{}': '{}' aliases '{}'",
            decl.name,
            desc.name(),
            input.name()
        );
        Some(texture)
    }

    /// Runs one frame: every `before_render`, then every `perform`, then
    /// every `after_render`, each in execution order.
    pub fn render_frame(&mut self, ctx: &mut FrameContext<'_>) {
        for pass in &mut self.passes {
            pass.operator.before_render(ctx);
        }
        for pass in &mut self.passes {
            log::trace!("perform '{}'", pass.name);
            pass.operator.perform(ctx);
        }
        for pass in &mut self.passes {
            pass.operator.after_render(ctx);
        }
    }

    /// Pass names in execution order.
    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|pass| pass.name.as_str())
    }

    #[inline]
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// What `descriptor` resolved to, if it was part of the compiled graph.
    #[must_use]
    pub fn resource(&self, descriptor: &RenderBufferDescriptor) -> Option<ResolvedResource> {
        self.resources.get(&descriptor.id()).copied()
    }

    #[must_use]
    pub fn texture(&self, descriptor: &RenderBufferDescriptor) -> Option<TextureResource> {
        self.resource(descriptor).and_then(|r| r.texture())
    }

    /// Disposes every operator, then releases every texture the graph
    /// allocated.
    pub fn dispose(self, device: &mut dyn GpuDevice, targets: &mut dyn RenderTargetService) {
        for pass in self.passes {
            log::debug!("Disposing pass '{}'", pass.name);
            pass.operator.dispose(device);
        }
        for texture in self.owned {
            targets.release(texture);
        }
    }
}

/// Log level for an alias that cannot be honoured: warn on a size
/// mismatch, debug when only format or color space differ.
fn alias_mismatch_level(input: &RenderBufferShape, output: &RenderBufferShape) -> log::Level {
    if (input.width, input.height) == (output.width, output.height) {
        log::Level::Debug
    } else {
        log::Level::Warn
    }
}

/// Kahn's algorithm over the live passes; the lowest declaration index is
/// always emitted first among ready passes.
fn topological_order(
    declarations: &[PassDeclaration],
    producers: &FxHashMap<RenderBufferId, usize>,
    live: &[bool],
) -> Result<Vec<usize>> {
    let count = declarations.len();
    let mut in_degree = vec![0usize; count];
    let mut consumers: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); count];

    for (index, decl) in declarations.iter().enumerate() {
        if !live[index] {
            continue;
        }
        let mut seen: SmallVec<[usize; 8]> = SmallVec::new();
        for id in decl.input_ids() {
            if let Some(&producer) = producers.get(&id) {
                if !seen.contains(&producer) {
                    seen.push(producer);
                    consumers[producer].push(index);
                    in_degree[index] += 1;
                }
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
        .filter(|&i| live[i] && in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(count);

    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        for &consumer in &consumers[index] {
            in_degree[consumer] -= 1;
            if in_degree[consumer] == 0 {
                ready.push(Reverse(consumer));
            }
        }
    }

    let live_count = live.iter().filter(|l| **l).count();
    if order.len() < live_count {
        let passes = (0..count)
            .filter(|&i| live[i] && in_degree[i] > 0)
            .map(|i| declarations[i].name.to_string())
            .collect();
        return Err(UmbraError::DependencyCycle { passes });
    }

    Ok(order)
}
