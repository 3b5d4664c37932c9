use std::sync::Arc;

use nori::{
    Backend, BindingTable, CommandStream, DescriptorSet, DescriptorSetLayout, DescriptorSetLayouts,
    HeapObject, ResourceBinding, ResourceClass, ShaderReflection, ShaderStage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TestBackend;

impl Backend for TestBackend {
    type Buffer = &'static str;
    type Sampler = String;
    type View = &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Bind {
    ConstantBuffer(ShaderStage, u32, Option<&'static str>),
    Sampler(ShaderStage, u32, Option<String>),
    ShaderResource(ShaderStage, u32, Option<&'static str>),
    UnorderedAccess(ShaderStage, u32, Option<&'static str>),
}

#[derive(Debug, Default)]
struct RecordingStream {
    binds: Vec<Bind>,
}

impl CommandStream<TestBackend> for RecordingStream {
    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&&'static str>) {
        self.binds
            .push(Bind::ConstantBuffer(stage, slot, buffer.copied()));
    }

    fn set_sampler_state(&mut self, stage: ShaderStage, slot: u32, sampler: Option<&String>) {
        self.binds
            .push(Bind::Sampler(stage, slot, sampler.cloned()));
    }

    fn set_shader_resource_view(&mut self, stage: ShaderStage, slot: u32, view: Option<&&'static str>) {
        self.binds
            .push(Bind::ShaderResource(stage, slot, view.copied()));
    }

    fn set_unordered_access_view(&mut self, stage: ShaderStage, slot: u32, view: Option<&&'static str>) {
        self.binds
            .push(Bind::UnorderedAccess(stage, slot, view.copied()));
    }
}

type Heap = Vec<Option<HeapObject<TestBackend>>>;

fn end_to_end_table() -> BindingTable<String> {
    let layouts = DescriptorSetLayouts::new(vec![Some(
        DescriptorSetLayout::new().entry("A").entry("B"),
    )]);
    let reflection = ShaderReflection::new(vec![
        ResourceBinding::new("A", ShaderStage::Pixel, ResourceClass::ShaderResourceView, 0),
        ResourceBinding::new("B", ShaderStage::Vertex, ResourceClass::ConstantBuffer, 0),
        ResourceBinding::new("A", ShaderStage::None, ResourceClass::Sampler, 1),
    ]);

    BindingTable::compile(&layouts, &reflection)
}

fn table_for(layout: DescriptorSetLayout<String>, bindings: Vec<ResourceBinding>) -> BindingTable<String> {
    BindingTable::compile(
        &DescriptorSetLayouts::new(vec![Some(layout)]),
        &ShaderReflection::new(bindings),
    )
}

#[test]
fn dispatches_end_to_end_scenario_from_heap_offset() {
    let table = end_to_end_table();

    let mut heap: Heap = vec![None; 12];
    heap[10] = Some(HeapObject::View("albedo"));
    heap[11] = Some(HeapObject::Buffer("per_view"));
    let set = DescriptorSet::new(Arc::from(heap), 10);

    let mut stream = RecordingStream::default();
    table.apply(&mut stream, &[set]);

    assert_eq!(
        stream.binds,
        vec![
            Bind::ShaderResource(ShaderStage::Pixel, 0, Some("albedo")),
            Bind::ConstantBuffer(ShaderStage::Vertex, 0, Some("per_view")),
        ]
    );
}

#[test]
fn skips_noop_sets_without_touching_the_stream() {
    let layouts = DescriptorSetLayouts::<String>::new(vec![None, Some(DescriptorSetLayout::new())]);
    let table = BindingTable::compile(&layouts, &ShaderReflection::default());

    // Empty heaps: any read would be out of bounds.
    let sets = vec![
        DescriptorSet::<TestBackend>::from_objects(Vec::new()),
        DescriptorSet::<TestBackend>::from_objects(Vec::new()),
    ];

    let mut stream = RecordingStream::default();
    table.apply(&mut stream, &sets);

    assert!(stream.binds.is_empty());
}

#[test]
fn binds_immutable_sampler_without_reading_the_heap() {
    let table = table_for(
        DescriptorSetLayout::new().sampler_entry("LinearWrap", "linear_wrap".to_string()),
        vec![
            ResourceBinding::new("LinearWrap", ShaderStage::Vertex, ResourceClass::Sampler, 0),
            ResourceBinding::new("LinearWrap", ShaderStage::Pixel, ResourceClass::Sampler, 3),
        ],
    );

    // The heap does not even cover entry 0.
    let set = DescriptorSet::<TestBackend>::from_objects(Vec::new());

    let mut stream = RecordingStream::default();
    table.apply(&mut stream, &[set]);

    assert_eq!(
        stream.binds,
        vec![
            Bind::Sampler(ShaderStage::Vertex, 0, Some("linear_wrap".to_string())),
            Bind::Sampler(ShaderStage::Pixel, 3, Some("linear_wrap".to_string())),
        ]
    );
}

#[test]
fn binds_heap_sampler_when_layout_has_none() {
    let table = table_for(
        DescriptorSetLayout::new().entry("Anisotropic"),
        vec![ResourceBinding::new(
            "Anisotropic",
            ShaderStage::Pixel,
            ResourceClass::Sampler,
            1,
        )],
    );
    let set = DescriptorSet::<TestBackend>::from_objects(vec![Some(HeapObject::Sampler(
        "aniso_16x".to_string(),
    ))]);

    let mut stream = RecordingStream::default();
    table.apply(&mut stream, &[set]);

    assert_eq!(
        stream.binds,
        vec![Bind::Sampler(ShaderStage::Pixel, 1, Some("aniso_16x".to_string()))]
    );
}

#[test]
fn binds_read_write_views() {
    let table = table_for(
        DescriptorSetLayout::new().entry("Particles"),
        vec![ResourceBinding::new(
            "Particles",
            ShaderStage::Compute,
            ResourceClass::UnorderedAccessView,
            2,
        )],
    );
    let set = DescriptorSet::<TestBackend>::from_objects(vec![Some(HeapObject::View("particles"))]);

    let mut stream = RecordingStream::default();
    table.apply(&mut stream, &[set]);

    assert_eq!(
        stream.binds,
        vec![Bind::UnorderedAccess(ShaderStage::Compute, 2, Some("particles"))]
    );
}

#[test]
fn clears_slots_for_empty_heap_entries() {
    let table = table_for(
        DescriptorSetLayout::new().entry("Shadow").entry("PerObject"),
        vec![
            ResourceBinding::new("Shadow", ShaderStage::Pixel, ResourceClass::ShaderResourceView, 4),
            ResourceBinding::new("PerObject", ShaderStage::Vertex, ResourceClass::ConstantBuffer, 1),
        ],
    );
    let set = DescriptorSet::<TestBackend>::from_objects(vec![None, None]);

    let mut stream = RecordingStream::default();
    table.apply(&mut stream, &[set]);

    assert_eq!(
        stream.binds,
        vec![
            Bind::ShaderResource(ShaderStage::Pixel, 4, None),
            Bind::ConstantBuffer(ShaderStage::Vertex, 1, None),
        ]
    );
}

#[test]
fn dispatches_sets_in_table_order() {
    let layouts = DescriptorSetLayouts::new(vec![
        Some(DescriptorSetLayout::new().entry("PerFrame")),
        None,
        Some(DescriptorSetLayout::new().entry("Material")),
    ]);
    let reflection = ShaderReflection::new(vec![
        ResourceBinding::new("Material", ShaderStage::Pixel, ResourceClass::ConstantBuffer, 2),
        ResourceBinding::new("PerFrame", ShaderStage::Vertex, ResourceClass::ConstantBuffer, 0),
    ]);
    let table = BindingTable::compile(&layouts, &reflection);

    let shared: Arc<[Option<HeapObject<TestBackend>>]> = Arc::from(vec![
        Some(HeapObject::Buffer("per_frame")),
        Some(HeapObject::Buffer("material")),
    ]);
    let sets = vec![
        DescriptorSet::new(Arc::clone(&shared), 0),
        DescriptorSet::from_objects(Vec::new()),
        DescriptorSet::new(shared, 1),
    ];

    let mut stream = RecordingStream::default();
    table.apply(&mut stream, &sets);

    assert_eq!(
        stream.binds,
        vec![
            Bind::ConstantBuffer(ShaderStage::Vertex, 0, Some("per_frame")),
            Bind::ConstantBuffer(ShaderStage::Pixel, 2, Some("material")),
        ]
    );
}

#[test]
fn shares_one_table_across_threads() {
    let table = end_to_end_table();
    let set = DescriptorSet::<TestBackend>::from_objects(vec![
        Some(HeapObject::View("albedo")),
        Some(HeapObject::Buffer("per_view")),
    ]);

    let recorded: Vec<Vec<Bind>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let mut stream = RecordingStream::default();
                    table.apply(&mut stream, std::slice::from_ref(&set));
                    stream.binds
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert!(recorded.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(recorded[0].len(), 2);
}

#[test]
#[should_panic(expected = "cannot bind resource class Struct")]
fn panics_on_unbindable_resource_class() {
    let table = table_for(
        DescriptorSetLayout::new().entry("Lighting"),
        vec![ResourceBinding::new(
            "Lighting",
            ShaderStage::Pixel,
            ResourceClass::Struct,
            0,
        )],
    );
    let set = DescriptorSet::<TestBackend>::from_objects(vec![Some(HeapObject::Buffer("lighting"))]);

    let mut stream = RecordingStream::default();
    table.apply(&mut stream, &[set]);
}

#[test]
#[should_panic(expected = "compiled for 1 descriptor sets but 2 were supplied")]
fn panics_on_descriptor_set_count_mismatch() {
    let table = end_to_end_table();
    let sets = vec![
        DescriptorSet::<TestBackend>::from_objects(vec![None, None]),
        DescriptorSet::<TestBackend>::from_objects(vec![None, None]),
    ];

    let mut stream = RecordingStream::default();
    table.apply(&mut stream, &sets);
}

#[test]
#[should_panic(expected = "holds a sampler")]
fn panics_on_heap_object_of_wrong_kind() {
    let table = table_for(
        DescriptorSetLayout::new().entry("PerView"),
        vec![ResourceBinding::new(
            "PerView",
            ShaderStage::Vertex,
            ResourceClass::ConstantBuffer,
            0,
        )],
    );
    let set = DescriptorSet::<TestBackend>::from_objects(vec![Some(HeapObject::Sampler(
        "oops".to_string(),
    ))]);

    let mut stream = RecordingStream::default();
    table.apply(&mut stream, &[set]);
}
