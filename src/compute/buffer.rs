use std::fmt;

use ash::vk;

use crate::vulkan::Device;

use super::{
    Allocation, AllocationKind, DeviceLocalMemory, DeviceTransferDst, DeviceTransferSrc,
    HostTransferDst, HostTransferSrc, Layout, ScalingPolicy, TypedLayout,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    DeviceLocal,
    HostToDevice,
    DeviceToHost,
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DeviceLocal => "device-local",
            Self::HostToDevice => "host-to-device",
            Self::DeviceToHost => "device-to-host",
        };
        f.write_str(name)
    }
}

/// A buffer as seen by [`ComputeResources`](super::ComputeResources).
///
/// Descriptor metadata always describes the device-side allocation, the one
/// the compute shader reads and writes.
pub trait ComputeBuffer {
    fn role(&self) -> BufferRole;

    fn layout(&self) -> &dyn Layout;

    fn bind(&mut self, scaling: ScalingPolicy);

    fn allocate_buffers(&mut self, device: &Device) -> anyhow::Result<()>;

    fn deallocate_buffers(&mut self, device: &Device);

    fn is_allocated(&self) -> bool;

    fn descriptor_pool_size(&self) -> anyhow::Result<vk::DescriptorPoolSize>;

    fn descriptor_set_layout_binding(
        &self,
        set_index: u32,
    ) -> anyhow::Result<Option<vk::DescriptorSetLayoutBinding<'static>>>;

    fn buffer_info(&self) -> anyhow::Result<Vec<vk::DescriptorBufferInfo>>;

    /// Index of the descriptor set this buffer lives in.
    fn max_descriptor_sets(&self) -> u32 {
        self.layout().set()
    }

    fn record_host_to_device(
        &self,
        _device: &ash::Device,
        _cmd: vk::CommandBuffer,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn record_device_to_host(
        &self,
        _device: &ash::Device,
        _cmd: vk::CommandBuffer,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn debug_name(&self) -> String {
        format!("{} {}", self.role(), self.layout())
    }
}

/// Buffer only ever touched by the compute shader.
pub struct DeviceLocal<L> {
    layout: L,
    allocation: Allocation<DeviceLocalMemory>,
}

impl<L: TypedLayout> DeviceLocal<L> {
    pub fn new(layout: L) -> Self {
        Self {
            layout,
            allocation: Allocation::new(),
        }
    }

    pub fn allocation(&self) -> &Allocation<DeviceLocalMemory> {
        &self.allocation
    }
}

impl<L: TypedLayout> ComputeBuffer for DeviceLocal<L> {
    fn role(&self) -> BufferRole {
        BufferRole::DeviceLocal
    }

    fn layout(&self) -> &dyn Layout {
        &self.layout
    }

    fn bind(&mut self, scaling: ScalingPolicy) {
        self.allocation.bind(scaling);
    }

    fn allocate_buffers(&mut self, device: &Device) -> anyhow::Result<()> {
        let name = self.debug_name();
        self.allocation.allocate_buffers(device, &self.layout, &name)
    }

    fn deallocate_buffers(&mut self, device: &Device) {
        self.allocation.deallocate_buffers(device);
    }

    fn is_allocated(&self) -> bool {
        self.allocation.is_allocated()
    }

    fn descriptor_pool_size(&self) -> anyhow::Result<vk::DescriptorPoolSize> {
        self.allocation.descriptor_pool_size()
    }

    fn descriptor_set_layout_binding(
        &self,
        set_index: u32,
    ) -> anyhow::Result<Option<vk::DescriptorSetLayoutBinding<'static>>> {
        self.allocation
            .descriptor_set_layout_binding(set_index, &self.layout)
    }

    fn buffer_info(&self) -> anyhow::Result<Vec<vk::DescriptorBufferInfo>> {
        self.allocation.buffer_info()
    }
}

/// Source and destination allocations of one layout, allocated together.
pub struct Transferable<S, D, L> {
    layout: L,
    source: Allocation<S>,
    destination: Allocation<D>,
}

pub type HostToDevice<L> = Transferable<HostTransferSrc, DeviceTransferDst, L>;

pub type DeviceToHost<L> = Transferable<DeviceTransferSrc, HostTransferDst, L>;

impl<S: AllocationKind, D: AllocationKind, L: TypedLayout> Transferable<S, D, L> {
    pub fn new(layout: L) -> Self {
        Self {
            layout,
            source: Allocation::new(),
            destination: Allocation::new(),
        }
    }

    pub fn typed_layout(&self) -> &L {
        &self.layout
    }

    pub fn source(&self) -> &Allocation<S> {
        &self.source
    }

    pub fn destination(&self) -> &Allocation<D> {
        &self.destination
    }

    fn bind_both(&mut self, scaling: ScalingPolicy) {
        self.source.bind(scaling);
        self.destination.bind(scaling);
    }

    fn allocate_both(&mut self, device: &Device, name: &str) -> anyhow::Result<()> {
        self.source
            .allocate_buffers(device, &self.layout, &format!("{name} src"))?;
        self.destination
            .allocate_buffers(device, &self.layout, &format!("{name} dst"))
    }

    fn deallocate_both(&mut self, device: &Device) {
        self.source.deallocate_buffers(device);
        self.destination.deallocate_buffers(device);
    }

    fn record_copy(&self, device: &ash::Device, cmd: vk::CommandBuffer) -> anyhow::Result<()> {
        self.source.record_copy_buffer(&self.destination, device, cmd)
    }
}

impl<L: TypedLayout> HostToDevice<L> {
    /// Writes input data straight into the mapped staging buffers.
    pub fn fill_buffers(
        &mut self,
        device: &Device,
        fill: impl FnMut(u32, &mut [L::Item], &L),
    ) -> anyhow::Result<()> {
        self.source.fill_buffers(device, &self.layout, fill)
    }
}

impl<L: TypedLayout> DeviceToHost<L> {
    pub fn read_buffers(
        &mut self,
        device: &Device,
        read: impl FnMut(u32, &[L::Item], &L),
    ) -> anyhow::Result<()> {
        self.destination.read_buffers(device, &self.layout, read)
    }

    /// Copies every batch element out of mapped memory, in batch order.
    pub fn read_to_vec(&mut self, device: &Device) -> anyhow::Result<Vec<Vec<L::Item>>> {
        let batch_size = self.destination.scaling()?.batch_size() as usize;
        let mut out = vec![Vec::new(); batch_size];
        self.read_buffers(device, |batch_index, items, _| {
            out[batch_index as usize] = items.to_vec();
        })?;
        Ok(out)
    }
}

impl<L: TypedLayout> ComputeBuffer for HostToDevice<L> {
    fn role(&self) -> BufferRole {
        BufferRole::HostToDevice
    }

    fn layout(&self) -> &dyn Layout {
        &self.layout
    }

    fn bind(&mut self, scaling: ScalingPolicy) {
        self.bind_both(scaling);
    }

    fn allocate_buffers(&mut self, device: &Device) -> anyhow::Result<()> {
        let name = self.debug_name();
        self.allocate_both(device, &name)
    }

    fn deallocate_buffers(&mut self, device: &Device) {
        self.deallocate_both(device);
    }

    fn is_allocated(&self) -> bool {
        self.source.is_allocated() && self.destination.is_allocated()
    }

    fn descriptor_pool_size(&self) -> anyhow::Result<vk::DescriptorPoolSize> {
        self.destination.descriptor_pool_size()
    }

    fn descriptor_set_layout_binding(
        &self,
        set_index: u32,
    ) -> anyhow::Result<Option<vk::DescriptorSetLayoutBinding<'static>>> {
        self.destination
            .descriptor_set_layout_binding(set_index, &self.layout)
    }

    fn buffer_info(&self) -> anyhow::Result<Vec<vk::DescriptorBufferInfo>> {
        self.destination.buffer_info()
    }

    fn record_host_to_device(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
    ) -> anyhow::Result<()> {
        self.record_copy(device, cmd)
    }
}

impl<L: TypedLayout> ComputeBuffer for DeviceToHost<L> {
    fn role(&self) -> BufferRole {
        BufferRole::DeviceToHost
    }

    fn layout(&self) -> &dyn Layout {
        &self.layout
    }

    fn bind(&mut self, scaling: ScalingPolicy) {
        self.bind_both(scaling);
    }

    fn allocate_buffers(&mut self, device: &Device) -> anyhow::Result<()> {
        let name = self.debug_name();
        self.allocate_both(device, &name)
    }

    fn deallocate_buffers(&mut self, device: &Device) {
        self.deallocate_both(device);
    }

    fn is_allocated(&self) -> bool {
        self.source.is_allocated() && self.destination.is_allocated()
    }

    fn descriptor_pool_size(&self) -> anyhow::Result<vk::DescriptorPoolSize> {
        self.source.descriptor_pool_size()
    }

    fn descriptor_set_layout_binding(
        &self,
        set_index: u32,
    ) -> anyhow::Result<Option<vk::DescriptorSetLayoutBinding<'static>>> {
        self.source
            .descriptor_set_layout_binding(set_index, &self.layout)
    }

    fn buffer_info(&self) -> anyhow::Result<Vec<vk::DescriptorBufferInfo>> {
        self.source.buffer_info()
    }

    fn record_device_to_host(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
    ) -> anyhow::Result<()> {
        self.record_copy(device, cmd)
    }
}
