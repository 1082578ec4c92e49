use std::{collections::HashSet, fmt};

use anyhow::Context;
use ash::vk;
use smallvec::SmallVec;

use crate::{
    error::{ConfigError, StateError},
    vulkan::Device,
};

use super::{
    CommandContext, ComputeBuffer, ComputePipeline, ScalingPolicy, ShaderCode,
    barrier::{TRANSFER_IN, TRANSFER_OUT, memory_barrier},
};

/// The buffers owned by one compute task.
///
/// Implementations visit every buffer exactly once, in declaration order:
/// inputs, then device-locals, then outputs.
pub trait ResourceSet {
    fn for_each_buffer(&self, visit: &mut dyn FnMut(&dyn ComputeBuffer));

    fn for_each_buffer_mut(&mut self, visit: &mut dyn FnMut(&mut dyn ComputeBuffer));
}

/// Visits every buffer, stopping at the first error.
pub fn try_for_each_buffer<S: ResourceSet + ?Sized>(
    set: &S,
    mut f: impl FnMut(&dyn ComputeBuffer) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let mut result = Ok(());
    set.for_each_buffer(&mut |buffer| {
        if result.is_ok() {
            result = f(buffer);
        }
    });
    result
}

pub fn try_for_each_buffer_mut<S: ResourceSet + ?Sized>(
    set: &mut S,
    mut f: impl FnMut(&mut dyn ComputeBuffer) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let mut result = Ok(());
    set.for_each_buffer_mut(&mut |buffer| {
        if result.is_ok() {
            result = f(buffer);
        }
    });
    result
}

/// Rejects empty layouts and (set, binding) pairs used twice.
pub fn validate_resource_set<S: ResourceSet + ?Sized>(
    set: &S,
    scaling: ScalingPolicy,
) -> Result<(), ConfigError> {
    if scaling.batch_size() == 0 {
        return Err(ConfigError::ZeroBatchSize);
    }
    let mut seen = HashSet::new();
    let mut result = Ok(());
    set.for_each_buffer(&mut |buffer| {
        if result.is_err() {
            return;
        }
        let layout = buffer.layout();
        let slot = (layout.set(), layout.binding());
        if layout.total_size_bytes() == 0 {
            result = Err(ConfigError::EmptyLayout {
                set: slot.0,
                binding: slot.1,
            });
        } else if !seen.insert(slot) {
            result = Err(ConfigError::DuplicateBinding {
                set: slot.0,
                binding: slot.1,
            });
        }
    });
    result
}

/// Number of descriptor sets needed: highest set index plus one.
pub fn max_descriptor_sets<S: ResourceSet + ?Sized>(set: &S) -> u32 {
    let mut max = None;
    set.for_each_buffer(&mut |buffer| {
        let index = buffer.max_descriptor_sets();
        max = Some(max.map_or(index, |m: u32| m.max(index)));
    });
    max.map_or(0, |m| m + 1)
}

/// Pool sizes summed per descriptor type over every buffer.
pub fn descriptor_pool_sizes<S: ResourceSet + ?Sized>(
    set: &S,
) -> anyhow::Result<SmallVec<[vk::DescriptorPoolSize; 2]>> {
    let mut sizes: SmallVec<[vk::DescriptorPoolSize; 2]> = SmallVec::new();
    try_for_each_buffer(set, |buffer| {
        let size = buffer.descriptor_pool_size()?;
        match sizes.iter_mut().find(|s| s.ty == size.ty) {
            Some(existing) => existing.descriptor_count += size.descriptor_count,
            None => sizes.push(size),
        }
        Ok(())
    })?;
    Ok(sizes)
}

/// Bindings contributed to descriptor set `set_index`, in visit order.
pub fn descriptor_set_layout_bindings<S: ResourceSet + ?Sized>(
    set: &S,
    set_index: u32,
) -> anyhow::Result<SmallVec<[vk::DescriptorSetLayoutBinding<'static>; 8]>> {
    let mut bindings = SmallVec::new();
    try_for_each_buffer(set, |buffer| {
        if let Some(binding) = buffer.descriptor_set_layout_binding(set_index)? {
            bindings.push(binding);
        }
        Ok(())
    })?;
    Ok(bindings)
}

/// Progress of [`ComputeResources::prepare`]. Each stage is entered once, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrepareStage {
    Unprepared,
    Bound,
    Allocated,
    DescriptorPoolCreated,
    DescriptorSetLayoutsCreated,
    DescriptorSetsAllocated,
    DescriptorSetsUpdated,
    PipelineCreated,
    CommandBufferCreated,
    Recorded,
}

impl fmt::Display for PrepareStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// GPU objects required to run one compute task over a [`ResourceSet`].
pub struct ComputeResources<S> {
    buffers: S,
    scaling: Option<ScalingPolicy>,
    stage: PrepareStage,
    descriptor_pool: vk::DescriptorPool,
    descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    pipeline: Option<ComputePipeline>,
    commands: Option<CommandContext>,
}

impl<S: ResourceSet> ComputeResources<S> {
    pub fn new(buffers: S) -> Self {
        Self {
            buffers,
            scaling: None,
            stage: PrepareStage::Unprepared,
            descriptor_pool: vk::DescriptorPool::null(),
            descriptor_set_layouts: Vec::new(),
            descriptor_sets: Vec::new(),
            pipeline: None,
            commands: None,
        }
    }

    pub fn buffers(&self) -> &S {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut S {
        &mut self.buffers
    }

    pub fn stage(&self) -> PrepareStage {
        self.stage
    }

    pub fn scaling(&self) -> Option<ScalingPolicy> {
        self.scaling
    }

    pub fn descriptor_set_layouts(&self) -> &[vk::DescriptorSetLayout] {
        &self.descriptor_set_layouts
    }

    pub fn descriptor_sets(&self) -> &[vk::DescriptorSet] {
        &self.descriptor_sets
    }

    pub fn pipeline(&self) -> Option<&ComputePipeline> {
        self.pipeline.as_ref()
    }

    pub fn command_buffer(&self) -> Option<vk::CommandBuffer> {
        self.commands.as_ref().map(|c| c.command_buffer)
    }

    /// Propagates the scaling policy into every buffer.
    ///
    /// Allowed again until buffers are allocated.
    pub fn bind(&mut self, scaling: ScalingPolicy) -> anyhow::Result<()> {
        if self.stage > PrepareStage::Bound {
            return Err(StateError::AlreadyPrepared.into());
        }
        self.buffers
            .for_each_buffer_mut(&mut |buffer| buffer.bind(scaling));
        self.scaling = Some(scaling);
        self.advance(PrepareStage::Bound);
        Ok(())
    }

    /// Runs every preparation stage and records the command buffer.
    ///
    /// A failure leaves the objects built so far in place; [`destroy`](Self::destroy)
    /// releases them.
    pub fn prepare(
        &mut self,
        device: &Device,
        scaling: ScalingPolicy,
        code: &ShaderCode,
    ) -> anyhow::Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("prepare").entered();

        if self.stage > PrepareStage::Bound {
            return Err(StateError::AlreadyPrepared.into());
        }
        validate_resource_set(&self.buffers, scaling)?;
        log::debug!("Preparing compute resources ({scaling})");

        self.bind(scaling)?;

        try_for_each_buffer_mut(&mut self.buffers, |buffer| {
            buffer
                .allocate_buffers(device)
                .with_context(|| format!("failed to allocate {}", buffer.debug_name()))
        })?;
        self.advance(PrepareStage::Allocated);

        self.create_descriptor_pool(device)?;
        self.advance(PrepareStage::DescriptorPoolCreated);

        self.create_descriptor_set_layouts(device)?;
        self.advance(PrepareStage::DescriptorSetLayoutsCreated);

        self.allocate_descriptor_sets(device)?;
        self.advance(PrepareStage::DescriptorSetsAllocated);

        self.update_descriptor_sets(device)?;
        self.advance(PrepareStage::DescriptorSetsUpdated);

        self.pipeline = Some(
            ComputePipeline::new(device.context(), code, &self.descriptor_set_layouts)
                .context("failed to create compute pipeline")?,
        );
        self.advance(PrepareStage::PipelineCreated);

        self.commands = Some(
            CommandContext::new(device.logical(), device.queue_family_index())
                .context("failed to create command context")?,
        );
        self.advance(PrepareStage::CommandBufferCreated);

        self.record_commands(device, scaling)
            .context("failed to record compute commands")?;
        self.advance(PrepareStage::Recorded);

        Ok(())
    }

    /// Submits the recorded command buffer and waits for it to complete.
    pub fn submit(&self, device: &Device) -> anyhow::Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("submit").entered();

        let commands = match (&self.commands, self.stage) {
            (Some(commands), PrepareStage::Recorded) => commands,
            _ => return Err(StateError::NotPrepared.into()),
        };
        device.submit_and_wait(commands.command_buffer, commands.fence)
    }

    /// Releases every GPU object in reverse creation order.
    ///
    /// The device must not be executing the command buffer.
    pub fn destroy(&mut self, device: &Device) {
        let logical = device.logical();
        log::trace!("Destroying compute resources (stage {})", self.stage);

        if let Some(mut commands) = self.commands.take() {
            commands.destroy(logical);
        }
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.destroy(logical);
        }
        if self.descriptor_pool != vk::DescriptorPool::null() {
            log::trace!("Destroying descriptor pool");
            unsafe { logical.destroy_descriptor_pool(self.descriptor_pool, None) };
            self.descriptor_pool = vk::DescriptorPool::null();
        }
        self.descriptor_sets.clear();
        for layout in self.descriptor_set_layouts.drain(..) {
            unsafe { logical.destroy_descriptor_set_layout(layout, None) };
        }
        self.buffers
            .for_each_buffer_mut(&mut |buffer| buffer.deallocate_buffers(device));

        self.scaling = None;
        self.stage = PrepareStage::Unprepared;
    }

    fn advance(&mut self, stage: PrepareStage) {
        log::debug!("Compute resources: {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn create_descriptor_pool(&mut self, device: &Device) -> anyhow::Result<()> {
        let max_sets = max_descriptor_sets(&self.buffers);
        if max_sets == 0 {
            return Ok(());
        }
        let pool_sizes = descriptor_pool_sizes(&self.buffers)?;

        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&pool_sizes)
            .max_sets(max_sets);
        self.descriptor_pool = unsafe {
            device
                .logical()
                .create_descriptor_pool(&pool_info, None)
                .context("failed to create descriptor pool")?
        };
        log::trace!("Created descriptor pool ({max_sets} set(s), {pool_sizes:?})");
        Ok(())
    }

    fn create_descriptor_set_layouts(&mut self, device: &Device) -> anyhow::Result<()> {
        for set_index in 0..max_descriptor_sets(&self.buffers) {
            let bindings = descriptor_set_layout_bindings(&self.buffers, set_index)?;
            let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            let layout = unsafe {
                device
                    .logical()
                    .create_descriptor_set_layout(&info, None)
                    .with_context(|| {
                        format!("failed to create descriptor set layout for set {set_index}")
                    })?
            };
            self.descriptor_set_layouts.push(layout);
            device
                .context()
                .name_object(layout, format!("descriptor set layout {set_index}"))?;
        }
        Ok(())
    }

    fn allocate_descriptor_sets(&mut self, device: &Device) -> anyhow::Result<()> {
        if self.descriptor_set_layouts.is_empty() {
            return Ok(());
        }
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&self.descriptor_set_layouts);
        self.descriptor_sets = unsafe {
            device
                .logical()
                .allocate_descriptor_sets(&alloc_info)
                .context("failed to allocate descriptor sets")?
        };
        Ok(())
    }

    fn update_descriptor_sets(&mut self, device: &Device) -> anyhow::Result<()> {
        let mut infos: Vec<(u32, u32, Vec<vk::DescriptorBufferInfo>)> = Vec::new();
        try_for_each_buffer(&self.buffers, |buffer| {
            let layout = buffer.layout();
            infos.push((layout.set(), layout.binding(), buffer.buffer_info()?));
            Ok(())
        })?;

        let mut writes = Vec::with_capacity(infos.len());
        for (set, binding, buffer_info) in infos.iter() {
            let dst_set = *self
                .descriptor_sets
                .get(*set as usize)
                .with_context(|| format!("no descriptor set allocated for set {set}"))?;
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(dst_set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                    .buffer_info(buffer_info),
            );
        }

        unsafe { device.logical().update_descriptor_sets(&writes, &[]) };
        log::trace!("Wrote {} descriptor binding(s)", writes.len());
        Ok(())
    }

    fn record_commands(&self, device: &Device, scaling: ScalingPolicy) -> anyhow::Result<()> {
        let commands = self
            .commands
            .as_ref()
            .context("command buffer missing")?;
        let pipeline = self.pipeline.as_ref().context("pipeline missing")?;
        let logical = device.logical();
        let cmd = commands.command_buffer;
        let synchronization2 = device.supports_synchronization2();

        commands.begin(logical)?;
        unsafe {
            logical.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, pipeline.pipeline);
            if !self.descriptor_sets.is_empty() {
                logical.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::COMPUTE,
                    pipeline.layout,
                    0,
                    &self.descriptor_sets,
                    &[],
                );
            }
        }

        let (src, dst) = TRANSFER_IN[0];
        memory_barrier(logical, cmd, src, dst, synchronization2);
        try_for_each_buffer(&self.buffers, |buffer| {
            buffer
                .record_host_to_device(logical, cmd)
                .with_context(|| format!("failed to record copy for {}", buffer.debug_name()))
        })?;
        let (src, dst) = TRANSFER_IN[1];
        memory_barrier(logical, cmd, src, dst, synchronization2);

        unsafe { logical.cmd_dispatch(cmd, scaling.batch_size(), 1, 1) };

        let (src, dst) = TRANSFER_OUT[0];
        memory_barrier(logical, cmd, src, dst, synchronization2);
        try_for_each_buffer(&self.buffers, |buffer| {
            buffer
                .record_device_to_host(logical, cmd)
                .with_context(|| format!("failed to record copy for {}", buffer.debug_name()))
        })?;
        let (src, dst) = TRANSFER_OUT[1];
        memory_barrier(logical, cmd, src, dst, synchronization2);

        commands.end(logical)
    }
}

impl<S> Drop for ComputeResources<S> {
    fn drop(&mut self) {
        if self.commands.is_some()
            || self.pipeline.is_some()
            || self.descriptor_pool != vk::DescriptorPool::null()
            || !self.descriptor_set_layouts.is_empty()
        {
            log::warn!(
                "ComputeResources dropped at stage {} without destroy(); GPU objects leaked",
                self.stage
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{DeviceLocal, DeviceToHost, HostToDevice, StaticLayout};

    struct ThereAndBack {
        input: HostToDevice<StaticLayout<u32>>,
        temporary: DeviceLocal<StaticLayout<u32>>,
        output: DeviceToHost<StaticLayout<u32>>,
    }

    impl ThereAndBack {
        fn new(item_count: u64) -> Self {
            Self {
                input: HostToDevice::new(StaticLayout::new(item_count, 0, 0)),
                temporary: DeviceLocal::new(StaticLayout::new(item_count, 0, 1)),
                output: DeviceToHost::new(StaticLayout::new(item_count, 0, 2)),
            }
        }
    }

    impl ResourceSet for ThereAndBack {
        fn for_each_buffer(&self, visit: &mut dyn FnMut(&dyn ComputeBuffer)) {
            visit(&self.input);
            visit(&self.temporary);
            visit(&self.output);
        }

        fn for_each_buffer_mut(&mut self, visit: &mut dyn FnMut(&mut dyn ComputeBuffer)) {
            visit(&mut self.input);
            visit(&mut self.temporary);
            visit(&mut self.output);
        }
    }

    #[test]
    fn three_bindings_in_one_set() {
        let mut resources = ComputeResources::new(ThereAndBack::new(8));
        resources
            .bind(ScalingPolicy::LargeBuffer { batch_size: 4 })
            .unwrap();
        assert_eq!(resources.stage(), PrepareStage::Bound);

        assert_eq!(max_descriptor_sets(resources.buffers()), 1);
        let bindings = descriptor_set_layout_bindings(resources.buffers(), 0).unwrap();
        let slots: Vec<_> = bindings.iter().map(|b| b.binding).collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert!(descriptor_set_layout_bindings(resources.buffers(), 1)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn visits_in_declaration_order() {
        let set = ThereAndBack::new(8);
        let mut roles = Vec::new();
        set.for_each_buffer(&mut |buffer| roles.push(buffer.role()));
        assert_eq!(
            roles,
            vec![
                crate::compute::BufferRole::HostToDevice,
                crate::compute::BufferRole::DeviceLocal,
                crate::compute::BufferRole::DeviceToHost
            ]
        );
    }

    #[test]
    fn pool_sizes_sum_over_buffers() {
        let mut set = ThereAndBack::new(8);
        let scaling = ScalingPolicy::BufferArray { batch_size: 5 };
        set.for_each_buffer_mut(&mut |buffer| buffer.bind(scaling));

        let sizes = descriptor_pool_sizes(&set).unwrap();
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].ty, vk::DescriptorType::STORAGE_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 15);
    }

    #[test]
    fn unbound_buffers_fail_collection() {
        let set = ThereAndBack::new(8);
        let err = descriptor_pool_sizes(&set).unwrap_err();
        assert_eq!(err.downcast_ref::<StateError>(), Some(&StateError::NotBound));
    }

    #[test]
    fn validation_rejects_bad_sets() {
        let scaling = ScalingPolicy::LargeBuffer { batch_size: 1 };
        assert!(validate_resource_set(&ThereAndBack::new(8), scaling).is_ok());
        assert_eq!(
            validate_resource_set(&ThereAndBack::new(0), scaling),
            Err(ConfigError::EmptyLayout { set: 0, binding: 0 })
        );
        assert_eq!(
            validate_resource_set(
                &ThereAndBack::new(8),
                ScalingPolicy::BufferArray { batch_size: 0 }
            ),
            Err(ConfigError::ZeroBatchSize)
        );

        let mut set = ThereAndBack::new(8);
        set.output = DeviceToHost::new(StaticLayout::new(8, 0, 1));
        assert_eq!(
            validate_resource_set(&set, scaling),
            Err(ConfigError::DuplicateBinding { set: 0, binding: 1 })
        );
    }

    #[test]
    fn rebind_before_allocation_replaces_policy() {
        let mut resources = ComputeResources::new(ThereAndBack::new(8));
        resources
            .bind(ScalingPolicy::BufferArray { batch_size: 2 })
            .unwrap();
        resources
            .bind(ScalingPolicy::LargeBuffer { batch_size: 2 })
            .unwrap();
        assert_eq!(
            resources.scaling(),
            Some(ScalingPolicy::LargeBuffer { batch_size: 2 })
        );
        assert_eq!(resources.stage(), PrepareStage::Bound);
        assert_eq!(resources.command_buffer(), None);
    }
}
