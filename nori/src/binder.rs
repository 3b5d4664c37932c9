use std::sync::LazyLock;

use crate::{
    Backend, BindingTable, CommandStream, DescriptorSet, DescriptorSetLayouts, ShaderReflection,
    profiling::{ProfilingCustomValue, Profiler, ProfilingKey},
};

/// Profiling key under which [`ResourceBinder::compile`] reports.
pub const COMPILE_PROFILING_KEY: &str = "nori.compile";

static COMPILE_KEY: LazyLock<ProfilingKey> =
    LazyLock::new(|| ProfilingKey::new(COMPILE_PROFILING_KEY));

/// The binding state a pipeline object owns: its compiled table.
///
/// Built once when the pipeline is built, then shared read-only by every
/// draw that uses the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinder<S> {
    table: BindingTable<S>,
}

impl<S: Clone> ResourceBinder<S> {
    /// Compiles the binding table, inside a `nori.compile` profiling scope
    /// when a profiler is given and has that key enabled. The scope's End
    /// event carries the set count and the operation count.
    pub fn compile(
        layouts: &DescriptorSetLayouts<S>,
        reflection: &ShaderReflection,
        profiler: Option<&Profiler>,
    ) -> Self {
        let mut scope = profiler
            .filter(|profiler| profiler.is_enabled(&COMPILE_KEY))
            .map(|profiler| {
                log::debug!("compiling binding table under profiling key {COMPILE_PROFILING_KEY}");
                profiler.begin(&COMPILE_KEY)
            });

        let table = BindingTable::compile(layouts, reflection);

        if let Some(scope) = scope.as_mut() {
            scope.end_values(
                None,
                &[
                    ProfilingCustomValue::Long(table.set_count() as i64),
                    ProfilingCustomValue::Long(table.operation_count() as i64),
                ],
            );
        }

        Self { table }
    }
}

impl<S> ResourceBinder<S> {
    pub fn table(&self) -> &BindingTable<S> {
        &self.table
    }

    pub fn into_table(self) -> BindingTable<S> {
        self.table
    }

    /// Binds this draw's descriptor sets. See [`BindingTable::apply`].
    #[inline]
    pub fn bind_resources<B, C>(&self, stream: &mut C, descriptor_sets: &[DescriptorSet<B>])
    where
        B: Backend<Sampler = S>,
        C: CommandStream<B> + ?Sized,
    {
        self.table.apply(stream, descriptor_sets);
    }
}
