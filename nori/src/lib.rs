pub mod binder;
pub mod compiler;
pub mod dispatch;
pub mod error;
pub mod profiling;

use std::{fmt, fs};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub use binder::*;
pub use compiler::*;
pub use dispatch::*;
pub use error::*;

/// Programmable pipeline stage that a reflected resource is bound to.
///
/// `None` marks declarations the shader compiler kept in the reflection data
/// even though no stage reads them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    None,
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderStage {
    pub fn is_none(self) -> bool {
        self == ShaderStage::None
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Kind of parameter reported by shader reflection.
///
/// Only `ConstantBuffer`, `Sampler`, `ShaderResourceView` and
/// `UnorderedAccessView` can be bound through a command stream. The remaining
/// classes describe values living inside constant buffers and never reach a
/// descriptor set in a well-formed pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Scalar,
    Vector,
    MatrixRows,
    MatrixColumns,
    Object,
    Struct,
    ConstantBuffer,
    TextureBuffer,
    ShaderResourceView,
    UnorderedAccessView,
    Sampler,
}

impl ResourceClass {
    /// Whether the dispatcher knows how to bind this class.
    pub fn is_bindable(self) -> bool {
        matches!(
            self,
            ResourceClass::ConstantBuffer
                | ResourceClass::Sampler
                | ResourceClass::ShaderResourceView
                | ResourceClass::UnorderedAccessView
        )
    }
}

/// Opaque key shared by a shader declaration and the layout entry that feeds it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single resource declaration discovered by shader reflection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceBinding {
    pub key: ResourceKey,
    pub stage: ShaderStage,
    pub class: ResourceClass,
    pub slot: u32,
}

impl ResourceBinding {
    pub fn new(key: impl Into<ResourceKey>, stage: ShaderStage, class: ResourceClass, slot: u32) -> Self {
        Self {
            key: key.into(),
            stage,
            class,
            slot,
        }
    }
}

/// Every resource binding reflected from a compiled shader program, in
/// reflection order.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShaderReflection {
    #[serde(default)]
    pub resource_bindings: Vec<ResourceBinding>,
}

impl ShaderReflection {
    pub fn new(resource_bindings: Vec<ResourceBinding>) -> Self {
        Self { resource_bindings }
    }

    pub fn load_from_json(path: &str) -> Result<Self, NoriError> {
        read_json(path)
    }
}

/// A declared slot of a descriptor-set layout.
///
/// `S` is the backend's sampler type; an entry carrying one has its sampler
/// fixed when the layout is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayoutEntry<S> {
    pub key: ResourceKey,
    pub immutable_sampler: Option<S>,
}

impl<S> LayoutEntry<S> {
    pub fn new(key: impl Into<ResourceKey>) -> Self {
        Self {
            key: key.into(),
            immutable_sampler: None,
        }
    }

    pub fn with_immutable_sampler(key: impl Into<ResourceKey>, sampler: S) -> Self {
        Self {
            key: key.into(),
            immutable_sampler: Some(sampler),
        }
    }
}

/// Ordered entries of one descriptor set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorSetLayout<S> {
    pub entries: Vec<LayoutEntry<S>>,
}

impl<S> Default for DescriptorSetLayout<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<S> DescriptorSetLayout<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, key: impl Into<ResourceKey>) -> Self {
        self.entries.push(LayoutEntry::new(key));
        self
    }

    pub fn sampler_entry(mut self, key: impl Into<ResourceKey>, sampler: S) -> Self {
        self.entries
            .push(LayoutEntry::with_immutable_sampler(key, sampler));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The descriptor-set layouts of a pipeline, indexed by set.
///
/// A `None` layout stands for a set index the pipeline leaves unused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorSetLayouts<S> {
    pub layouts: Vec<Option<DescriptorSetLayout<S>>>,
}

impl<S> Default for DescriptorSetLayouts<S> {
    fn default() -> Self {
        Self {
            layouts: Vec::new(),
        }
    }
}

impl<S> DescriptorSetLayouts<S> {
    pub fn new(layouts: Vec<Option<DescriptorSetLayout<S>>>) -> Self {
        Self { layouts }
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

impl<S: DeserializeOwned> DescriptorSetLayouts<S> {
    pub fn load_from_json(path: &str) -> Result<Self, NoriError> {
        read_json(path)
    }
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, NoriError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
