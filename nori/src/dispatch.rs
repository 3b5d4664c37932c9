//! Per-draw replay of a compiled [`BindingTable`] onto a command stream.
//!
//! The dispatcher never allocates and never re-derives the key matching done
//! at compile time: every descriptor set is a flat walk over its boxed slice of
//! [`BindingOperation`]s, and every operation turns into exactly one bind call.
//!
//! Inconsistencies between a table and the descriptor sets handed to it are
//! invariant violations and panic. Retrying the draw with the same inputs would
//! hit the same condition, so recovery belongs to whoever rebuilds the
//! pipeline.

use std::{fmt, sync::Arc};

use crate::{BindingOperation, BindingTable, ResourceClass, SetBindings, ShaderStage};

/// Resource object types of a graphics backend.
pub trait Backend {
    type Buffer;
    type Sampler;
    type View;
}

/// A resource object stored in a descriptor heap.
pub enum HeapObject<B: Backend> {
    Buffer(B::Buffer),
    Sampler(B::Sampler),
    /// A texture or buffer view, bindable as read-only or read-write.
    View(B::View),
}

impl<B: Backend> HeapObject<B> {
    pub fn kind(&self) -> &'static str {
        match self {
            HeapObject::Buffer(_) => "buffer",
            HeapObject::Sampler(_) => "sampler",
            HeapObject::View(_) => "view",
        }
    }
}

impl<B> Clone for HeapObject<B>
where
    B: Backend,
    B::Buffer: Clone,
    B::Sampler: Clone,
    B::View: Clone,
{
    fn clone(&self) -> Self {
        match self {
            HeapObject::Buffer(buffer) => HeapObject::Buffer(buffer.clone()),
            HeapObject::Sampler(sampler) => HeapObject::Sampler(sampler.clone()),
            HeapObject::View(view) => HeapObject::View(view.clone()),
        }
    }
}

impl<B> fmt::Debug for HeapObject<B>
where
    B: Backend,
    B::Buffer: fmt::Debug,
    B::Sampler: fmt::Debug,
    B::View: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapObject::Buffer(buffer) => f.debug_tuple("Buffer").field(buffer).finish(),
            HeapObject::Sampler(sampler) => f.debug_tuple("Sampler").field(sampler).finish(),
            HeapObject::View(view) => f.debug_tuple("View").field(view).finish(),
        }
    }
}

/// A descriptor set instance: a window into a shared heap of resource objects.
///
/// Entry `i` of the set lives at `start_offset + i` in the heap. Empty heap
/// slots are `None` and unbind the corresponding stage slot.
pub struct DescriptorSet<B: Backend> {
    heap_objects: Arc<[Option<HeapObject<B>>]>,
    start_offset: usize,
}

impl<B: Backend> DescriptorSet<B> {
    pub fn new(heap_objects: Arc<[Option<HeapObject<B>>]>, start_offset: usize) -> Self {
        Self {
            heap_objects,
            start_offset,
        }
    }

    /// A set owning its own heap, starting at offset zero.
    pub fn from_objects(heap_objects: Vec<Option<HeapObject<B>>>) -> Self {
        Self::new(heap_objects.into(), 0)
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn heap_objects(&self) -> &[Option<HeapObject<B>>] {
        &self.heap_objects
    }

    /// Resource object backing `entry_index`.
    ///
    /// Panics if the heap does not cover the entry, which means the set was
    /// not built from the layout the table was compiled against.
    #[inline]
    pub fn heap_object(&self, entry_index: usize) -> Option<&HeapObject<B>> {
        self.heap_objects[self.start_offset + entry_index].as_ref()
    }
}

impl<B: Backend> Clone for DescriptorSet<B> {
    fn clone(&self) -> Self {
        Self {
            heap_objects: Arc::clone(&self.heap_objects),
            start_offset: self.start_offset,
        }
    }
}

impl<B: Backend> fmt::Debug for DescriptorSet<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorSet")
            .field("start_offset", &self.start_offset)
            .field("heap_len", &self.heap_objects.len())
            .finish()
    }
}

/// Per-stage binding entry points of a command list.
///
/// Passing `None` clears the slot.
pub trait CommandStream<B: Backend> {
    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&B::Buffer>);

    fn set_sampler_state(&mut self, stage: ShaderStage, slot: u32, sampler: Option<&B::Sampler>);

    fn set_shader_resource_view(&mut self, stage: ShaderStage, slot: u32, view: Option<&B::View>);

    fn set_unordered_access_view(&mut self, stage: ShaderStage, slot: u32, view: Option<&B::View>);
}

impl<S> BindingTable<S> {
    /// Issues the bind calls recorded in this table.
    ///
    /// `descriptor_sets` must hold one set per table slot, in the same order
    /// as the layouts the table was compiled from.
    ///
    /// # Panics
    ///
    /// - if the number of descriptor sets differs from the table's set count,
    /// - if an operation carries a class other than constant buffer, sampler,
    ///   shader resource view or unordered access view,
    /// - if a heap object has the wrong kind for its operation.
    pub fn apply<B, C>(&self, stream: &mut C, descriptor_sets: &[DescriptorSet<B>])
    where
        B: Backend<Sampler = S>,
        C: CommandStream<B> + ?Sized,
    {
        assert_eq!(
            descriptor_sets.len(),
            self.set_count(),
            "binding table was compiled for {} descriptor sets but {} were supplied",
            self.set_count(),
            descriptor_sets.len()
        );

        for (bindings, descriptor_set) in self.sets().iter().zip(descriptor_sets) {
            let SetBindings::Operations(operations) = bindings else {
                continue;
            };

            for operation in operations.iter() {
                apply_operation(stream, descriptor_set, operation);
            }
        }
    }
}

#[inline]
fn apply_operation<B, C>(stream: &mut C, set: &DescriptorSet<B>, operation: &BindingOperation<B::Sampler>)
where
    B: Backend,
    C: CommandStream<B> + ?Sized,
{
    let BindingOperation {
        entry_index,
        class,
        stage,
        slot,
        ..
    } = *operation;

    match class {
        ResourceClass::ConstantBuffer => {
            let buffer = match set.heap_object(entry_index) {
                None => None,
                Some(HeapObject::Buffer(buffer)) => Some(buffer),
                Some(other) => wrong_heap_object(operation, other.kind()),
            };
            stream.set_constant_buffer(stage, slot, buffer);
        }
        ResourceClass::Sampler => {
            // Immutable samplers take precedence; the heap is not consulted.
            let sampler = match &operation.immutable_sampler {
                Some(sampler) => Some(sampler),
                None => match set.heap_object(entry_index) {
                    None => None,
                    Some(HeapObject::Sampler(sampler)) => Some(sampler),
                    Some(other) => wrong_heap_object(operation, other.kind()),
                },
            };
            stream.set_sampler_state(stage, slot, sampler);
        }
        ResourceClass::ShaderResourceView => {
            stream.set_shader_resource_view(stage, slot, view(set, operation));
        }
        ResourceClass::UnorderedAccessView => {
            stream.set_unordered_access_view(stage, slot, view(set, operation));
        }
        ResourceClass::Scalar
        | ResourceClass::Vector
        | ResourceClass::MatrixRows
        | ResourceClass::MatrixColumns
        | ResourceClass::Object
        | ResourceClass::Struct
        | ResourceClass::TextureBuffer => {
            panic!(
                "cannot bind resource class {class:?} (entry {entry_index}, {stage} slot {slot}); \
                 the binding table does not match its shader reflection"
            )
        }
    }
}

#[inline]
fn view<'a, B: Backend>(set: &'a DescriptorSet<B>, operation: &BindingOperation<B::Sampler>) -> Option<&'a B::View> {
    match set.heap_object(operation.entry_index) {
        None => None,
        Some(HeapObject::View(view)) => Some(view),
        Some(other) => wrong_heap_object(operation, other.kind()),
    }
}

#[cold]
#[track_caller]
fn wrong_heap_object<S>(operation: &BindingOperation<S>, found: &'static str) -> ! {
    panic!(
        "descriptor entry {} holds a {found}, which cannot be bound as {:?} at {} slot {}",
        operation.entry_index, operation.class, operation.stage, operation.slot
    )
}
