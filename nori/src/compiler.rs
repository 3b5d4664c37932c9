use std::{fmt, fs, path::Path};

use bincode::Options;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{DescriptorSetLayouts, NoriError, ResourceClass, ShaderReflection, ShaderStage};

/// Version written in front of every serialized binding table.
pub const TABLE_FORMAT_VERSION: u32 = 1;

/// Upper bound on the size of a serialized binding table.
pub const MAX_ARTIFACT_BYTES: u64 = 64 * 1024 * 1024;

fn artifact_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_ARTIFACT_BYTES)
}

/// One precompiled bind call: which entry of the descriptor set feeds which
/// stage/slot, and as what class of resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BindingOperation<S> {
    pub entry_index: usize,
    pub class: ResourceClass,
    pub stage: ShaderStage,
    pub slot: u32,
    pub immutable_sampler: Option<S>,
}

impl<S: fmt::Display> fmt::Display for BindingOperation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry {} -> {} slot {} ({:?})",
            self.entry_index, self.stage, self.slot, self.class
        )?;
        if let Some(sampler) = &self.immutable_sampler {
            write!(f, " [immutable sampler {sampler}]")?;
        }
        Ok(())
    }
}

/// Compiled operations for a single descriptor set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SetBindings<S> {
    /// Nothing in this set is consumed by the shader.
    NoOp,
    Operations(Box<[BindingOperation<S>]>),
}

impl<S> SetBindings<S> {
    pub fn is_noop(&self) -> bool {
        matches!(self, SetBindings::NoOp)
    }

    pub fn operations(&self) -> &[BindingOperation<S>] {
        match self {
            SetBindings::NoOp => &[],
            SetBindings::Operations(operations) => operations,
        }
    }
}

/// Immutable plan mapping descriptor-set entries onto shader stage slots.
///
/// A table has exactly one slot per descriptor-set layout it was compiled
/// from. It never changes after [`BindingTable::compile`] returns and can be
/// shared by any number of threads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BindingTable<S> {
    sets: Box<[SetBindings<S>]>,
}

impl<S: Clone> BindingTable<S> {
    /// Matches every layout entry against the reflected resource bindings.
    ///
    /// Layout entries and reflection bindings are both walked in input order,
    /// so compiling the same inputs twice yields identical tables. Entries
    /// the shader does not use are skipped; an entry used by several stages
    /// yields one operation per stage.
    pub fn compile(layouts: &DescriptorSetLayouts<S>, reflection: &ShaderReflection) -> Self {
        let mut operation_count = 0;

        let sets: Box<[SetBindings<S>]> = layouts
            .layouts
            .iter()
            .enumerate()
            .map(|(set_index, layout)| {
                let Some(layout) = layout else {
                    return SetBindings::NoOp;
                };

                let mut operations = Vec::new();
                for (entry_index, entry) in layout.entries.iter().enumerate() {
                    let matched_before = operations.len();

                    for binding in &reflection.resource_bindings {
                        if binding.stage.is_none() || binding.key != entry.key {
                            continue;
                        }

                        operations.push(BindingOperation {
                            entry_index,
                            class: binding.class,
                            stage: binding.stage,
                            slot: binding.slot,
                            immutable_sampler: entry.immutable_sampler.clone(),
                        });
                    }

                    if operations.len() == matched_before {
                        log::trace!(
                            "set {set_index} entry {entry_index} ({}) is not used by the shader",
                            entry.key
                        );
                    }
                }

                operation_count += operations.len();
                if operations.is_empty() {
                    SetBindings::NoOp
                } else {
                    SetBindings::Operations(operations.into_boxed_slice())
                }
            })
            .collect();

        log::debug!(
            "compiled binding table: {} sets, {} operations",
            sets.len(),
            operation_count
        );

        Self { sets }
    }
}

impl<S> BindingTable<S> {
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    pub fn set(&self, index: usize) -> Option<&SetBindings<S>> {
        self.sets.get(index)
    }

    pub fn sets(&self) -> &[SetBindings<S>] {
        &self.sets
    }

    pub fn operation_count(&self) -> usize {
        self.sets.iter().map(|set| set.operations().len()).sum()
    }
}

impl<S: Serialize> BindingTable<S> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, NoriError> {
        Ok(artifact_options().serialize(&(TABLE_FORMAT_VERSION, self))?)
    }

    pub fn save_to_disk(&self, path: &str) -> Result<(), NoriError> {
        let path = Path::new(path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let bytes = self.to_bytes()?;
        fs::write(path, bytes)?;

        Ok(())
    }
}

impl<S: DeserializeOwned> BindingTable<S> {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NoriError> {
        let found: u32 = artifact_options().deserialize(bytes)?;
        if found != TABLE_FORMAT_VERSION {
            return Err(NoriError::IncompatibleArtifact {
                expected: TABLE_FORMAT_VERSION,
                found,
            });
        }

        let (_, table): (u32, Self) = artifact_options().deserialize(bytes)?;
        Ok(table)
    }

    pub fn load_from_disk(path: &str) -> Result<Self, NoriError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
