use std::marker::PhantomData;

use anyhow::Context;
use ash::vk;
use vk_mem::Alloc;

use crate::{error::StateError, vulkan::Device};

use super::{Layout, ScalingPolicy, TypedLayout};

/// Usage and memory profile of one family of physical buffers.
pub trait AllocationKind {
    const NAME: &'static str;

    fn usage() -> vk::BufferUsageFlags;

    fn flags() -> vk_mem::AllocationCreateFlags;
}

/// Kinds whose memory stays persistently mapped on the host.
pub trait HostVisible: AllocationKind {}

/// Staging-in: written sequentially by the host, read by transfers.
pub struct HostTransferSrc;

/// Device memory written by a host-to-device copy.
pub struct DeviceTransferDst;

/// Device memory only touched by shaders.
pub struct DeviceLocalMemory;

/// Device memory read by a device-to-host copy.
pub struct DeviceTransferSrc;

/// Staging-out: filled by transfers, read randomly by the host.
pub struct HostTransferDst;

impl AllocationKind for HostTransferSrc {
    const NAME: &'static str = "host transfer src";

    fn usage() -> vk::BufferUsageFlags {
        vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::STORAGE_BUFFER
    }

    fn flags() -> vk_mem::AllocationCreateFlags {
        vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE
            | vk_mem::AllocationCreateFlags::MAPPED
    }
}

impl HostVisible for HostTransferSrc {}

impl AllocationKind for DeviceTransferDst {
    const NAME: &'static str = "device transfer dst";

    fn usage() -> vk::BufferUsageFlags {
        vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::STORAGE_BUFFER
    }

    fn flags() -> vk_mem::AllocationCreateFlags {
        vk_mem::AllocationCreateFlags::DEDICATED_MEMORY
    }
}

impl AllocationKind for DeviceLocalMemory {
    const NAME: &'static str = "device local";

    fn usage() -> vk::BufferUsageFlags {
        vk::BufferUsageFlags::STORAGE_BUFFER
    }

    fn flags() -> vk_mem::AllocationCreateFlags {
        vk_mem::AllocationCreateFlags::DEDICATED_MEMORY
    }
}

impl AllocationKind for DeviceTransferSrc {
    const NAME: &'static str = "device transfer src";

    fn usage() -> vk::BufferUsageFlags {
        vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::STORAGE_BUFFER
    }

    fn flags() -> vk_mem::AllocationCreateFlags {
        vk_mem::AllocationCreateFlags::DEDICATED_MEMORY
    }
}

impl AllocationKind for HostTransferDst {
    const NAME: &'static str = "host transfer dst";

    fn usage() -> vk::BufferUsageFlags {
        vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::STORAGE_BUFFER
    }

    fn flags() -> vk_mem::AllocationCreateFlags {
        vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM | vk_mem::AllocationCreateFlags::MAPPED
    }
}

impl HostVisible for HostTransferDst {}

/// Physical buffers backing one layout under one scaling policy.
///
/// `buffers`, `allocations` and `allocation_infos` always have the same length,
/// non-zero only between [`allocate_buffers`](Self::allocate_buffers) and
/// [`deallocate_buffers`](Self::deallocate_buffers).
pub struct Allocation<K> {
    scaling: Option<ScalingPolicy>,
    buffer_size: vk::DeviceSize,
    buffers: Vec<vk::Buffer>,
    allocations: Vec<vk_mem::Allocation>,
    allocation_infos: Vec<vk_mem::AllocationInfo>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Default for Allocation<K> {
    fn default() -> Self {
        Self {
            scaling: None,
            buffer_size: 0,
            buffers: Vec::new(),
            allocations: Vec::new(),
            allocation_infos: Vec::new(),
            _kind: PhantomData,
        }
    }
}

impl<K: AllocationKind> Allocation<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, scaling: ScalingPolicy) {
        self.scaling = Some(scaling);
    }

    pub fn scaling(&self) -> anyhow::Result<ScalingPolicy> {
        Ok(self.scaling.ok_or(StateError::NotBound)?)
    }

    pub fn is_allocated(&self) -> bool {
        !self.buffers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn buffers(&self) -> &[vk::Buffer] {
        &self.buffers
    }

    pub fn allocations(&self) -> &[vk_mem::Allocation] {
        &self.allocations
    }

    pub fn allocation_infos(&self) -> &[vk_mem::AllocationInfo] {
        &self.allocation_infos
    }

    /// Size of every physical buffer, zero while unallocated.
    pub fn buffer_size(&self) -> vk::DeviceSize {
        self.buffer_size
    }

    pub fn allocate_buffers(
        &mut self,
        device: &Device,
        layout: &dyn Layout,
        debug_name: &str,
    ) -> anyhow::Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("alloc").entered();

        let scaling = self.scaling()?;
        if self.is_allocated() {
            return Err(StateError::AlreadyAllocated.into());
        }

        let size = scaling.allocation_total_size_bytes(layout.total_size_bytes());
        let count = scaling.allocation_buffer_count() as usize;
        self.buffers.reserve(count);
        self.allocations.reserve(count);
        self.allocation_infos.reserve(count);
        self.buffer_size = size;

        let allocator = device.allocator();
        for i in 0..count {
            let (buffer, allocation) = with_buffer_create_info::<K, _>(size, |bci, aci| unsafe {
                allocator.create_buffer(bci, aci)
            })
            .with_context(|| {
                format!("failed to create {} buffer #{i} of {size} bytes", K::NAME)
            })?;
            let info = allocator.get_allocation_info(&allocation);

            self.buffers.push(buffer);
            self.allocations.push(allocation);
            self.allocation_infos.push(info);

            device
                .context()
                .name_object(buffer, format!("{debug_name}[{i}]"))?;
        }

        log::trace!(
            "Allocated {count} {} buffer(s) of {size} bytes for {debug_name}",
            K::NAME
        );
        Ok(())
    }

    /// Destroys every buffer. Does nothing when nothing is allocated.
    pub fn deallocate_buffers(&mut self, device: &Device) {
        if !self.is_allocated() {
            return;
        }
        log::trace!("Destroying {} {} buffer(s)", self.buffers.len(), K::NAME);

        let allocator = device.allocator();
        for (buffer, mut allocation) in self.buffers.drain(..).zip(self.allocations.drain(..)) {
            unsafe {
                allocator.destroy_buffer(buffer, &mut allocation);
            }
        }
        self.allocation_infos.clear();
        self.buffer_size = 0;
    }

    pub fn descriptor_count(&self) -> anyhow::Result<u32> {
        Ok(self.scaling()?.allocation_buffer_count())
    }

    /// The binding this allocation contributes to set `set_index`, if any.
    pub fn descriptor_set_layout_binding(
        &self,
        set_index: u32,
        layout: &dyn Layout,
    ) -> anyhow::Result<Option<vk::DescriptorSetLayoutBinding<'static>>> {
        if layout.set() != set_index {
            return Ok(None);
        }
        Ok(Some(
            vk::DescriptorSetLayoutBinding::default()
                .binding(layout.binding())
                .descriptor_count(self.descriptor_count()?)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .stage_flags(vk::ShaderStageFlags::COMPUTE),
        ))
    }

    pub fn descriptor_pool_size(&self) -> anyhow::Result<vk::DescriptorPoolSize> {
        Ok(vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::STORAGE_BUFFER)
            .descriptor_count(self.descriptor_count()?))
    }

    /// One descriptor per physical buffer, each covering the whole buffer.
    pub fn buffer_info(&self) -> anyhow::Result<Vec<vk::DescriptorBufferInfo>> {
        if !self.is_allocated() {
            return Err(StateError::NotAllocated.into());
        }
        Ok(self
            .buffers
            .iter()
            .map(|buffer| {
                vk::DescriptorBufferInfo::default()
                    .buffer(*buffer)
                    .offset(0)
                    .range(self.buffer_size)
            })
            .collect())
    }

    /// Records `self[i] -> destination[i]` for every physical buffer.
    pub fn record_copy_buffer<D: AllocationKind>(
        &self,
        destination: &Allocation<D>,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
    ) -> anyhow::Result<()> {
        if !self.is_allocated() || !destination.is_allocated() {
            return Err(StateError::NotAllocated.into());
        }
        if self.buffers.len() != destination.buffers.len()
            || self.buffer_size != destination.buffer_size
        {
            anyhow::bail!(
                "copy {} -> {} between mismatched allocations ({} x {} bytes vs {} x {} bytes)",
                K::NAME,
                D::NAME,
                self.buffers.len(),
                self.buffer_size,
                destination.buffers.len(),
                destination.buffer_size
            );
        }

        let region = vk::BufferCopy::default().size(self.buffer_size);
        for (src, dst) in self.buffers.iter().zip(destination.buffers.iter()) {
            unsafe {
                device.cmd_copy_buffer(cmd, *src, *dst, std::slice::from_ref(&region));
            }
        }
        Ok(())
    }

    /// Hands every batch slice of mapped memory to `fill`, then flushes.
    ///
    /// `fill` receives the batch index and a typed view of that element's
    /// slice. With buffer arrays the batch index equals the buffer index.
    pub fn fill_buffers<L>(
        &mut self,
        device: &Device,
        layout: &L,
        mut fill: impl FnMut(u32, &mut [L::Item], &L),
    ) -> anyhow::Result<()>
    where
        K: HostVisible,
        L: TypedLayout + ?Sized,
    {
        self.for_each_slice(layout, |batch_index, bytes| {
            let items = bytemuck::try_cast_slice_mut(bytes).map_err(|e| {
                anyhow::anyhow!("mapped {} memory is not a valid item view: {e}", K::NAME)
            })?;
            fill(batch_index, items, layout);
            Ok(())
        })?;

        let allocator = device.allocator();
        for allocation in &self.allocations {
            allocator
                .flush_allocation(allocation, 0, vk::WHOLE_SIZE)
                .with_context(|| format!("failed to flush {} allocation", K::NAME))?;
        }
        Ok(())
    }

    /// Invalidates mapped memory, then hands every batch slice to `read`.
    pub fn read_buffers<L>(
        &mut self,
        device: &Device,
        layout: &L,
        mut read: impl FnMut(u32, &[L::Item], &L),
    ) -> anyhow::Result<()>
    where
        K: HostVisible,
        L: TypedLayout + ?Sized,
    {
        let allocator = device.allocator();
        for allocation in &self.allocations {
            allocator
                .invalidate_allocation(allocation, 0, vk::WHOLE_SIZE)
                .with_context(|| format!("failed to invalidate {} allocation", K::NAME))?;
        }

        self.for_each_slice(layout, |batch_index, bytes| {
            let items = bytemuck::try_cast_slice(bytes).map_err(|e| {
                anyhow::anyhow!("mapped {} memory is not a valid item view: {e}", K::NAME)
            })?;
            read(batch_index, items, layout);
            Ok(())
        })
    }

    fn for_each_slice<L: Layout + ?Sized>(
        &mut self,
        layout: &L,
        mut visit: impl FnMut(u32, &mut [u8]) -> anyhow::Result<()>,
    ) -> anyhow::Result<()>
    where
        K: HostVisible,
    {
        let scaling = self.scaling()?;
        if !self.is_allocated() {
            return Err(StateError::NotAllocated.into());
        }

        let slice_bytes = layout.total_size_bytes() as usize;
        let slices = scaling.slices_per_buffer();
        for (buffer_index, info) in self.allocation_infos.iter().enumerate() {
            let mapped = info.mapped_data as *mut u8;
            if mapped.is_null() {
                anyhow::bail!("{} buffer #{buffer_index} is not host mapped", K::NAME);
            }
            for slice in 0..slices {
                let batch_index = buffer_index as u32 * slices + slice;
                // Mapped range stays valid until deallocate_buffers, which needs &mut self.
                let bytes = unsafe {
                    std::slice::from_raw_parts_mut(
                        mapped.add(slice as usize * slice_bytes),
                        slice_bytes,
                    )
                };
                visit(batch_index, bytes)?;
            }
        }
        Ok(())
    }
}

impl<K> Drop for Allocation<K> {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            log::warn!(
                "Allocation dropped with {} live buffer(s); they are leaked",
                self.buffers.len()
            );
        }
    }
}

fn with_buffer_create_info<K: AllocationKind, R>(
    size: vk::DeviceSize,
    f: impl FnOnce(&vk::BufferCreateInfo, &vk_mem::AllocationCreateInfo) -> R,
) -> R {
    let bci = vk::BufferCreateInfo::default()
        .size(size)
        .usage(K::usage())
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let aci = vk_mem::AllocationCreateInfo {
        usage: vk_mem::MemoryUsage::Auto,
        flags: K::flags(),
        ..Default::default()
    };
    f(&bci, &aci)
}
