mod allocation;
pub mod barrier;
mod buffer;
mod commands;
mod dynamic;
mod layout;
mod pipeline;
mod resources;
mod scaling;
mod shader;
mod spirv;

pub use allocation::{
    Allocation, AllocationKind, DeviceLocalMemory, DeviceTransferDst, DeviceTransferSrc,
    HostTransferDst, HostTransferSrc, HostVisible,
};

pub use buffer::{
    BufferRole, ComputeBuffer, DeviceLocal, DeviceToHost, HostToDevice, Transferable,
};

pub use commands::CommandContext;

pub use dynamic::DynamicResources;

pub use layout::{DynamicLayout, Layout, StaticLayout, TypedLayout};

pub use pipeline::ComputePipeline;

pub use resources::{
    ComputeResources, PrepareStage, ResourceSet, descriptor_pool_sizes,
    descriptor_set_layout_bindings, max_descriptor_sets, try_for_each_buffer,
    try_for_each_buffer_mut, validate_resource_set,
};

pub use scaling::ScalingPolicy;

pub use shader::ComputeShader;

pub use spirv::ShaderCode;
