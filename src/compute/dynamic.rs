use super::{ComputeBuffer, DeviceLocal, DeviceToHost, DynamicLayout, HostToDevice, ResourceSet};

/// Resource set whose buffers are only known at run time.
#[derive(Default)]
pub struct DynamicResources {
    pub inputs: Vec<HostToDevice<DynamicLayout>>,
    pub device_locals: Vec<DeviceLocal<DynamicLayout>>,
    pub outputs: Vec<DeviceToHost<DynamicLayout>>,
}

impl DynamicResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, layout: DynamicLayout) -> Self {
        self.inputs.push(HostToDevice::new(layout));
        self
    }

    pub fn with_device_local(mut self, layout: DynamicLayout) -> Self {
        self.device_locals.push(DeviceLocal::new(layout));
        self
    }

    pub fn with_output(mut self, layout: DynamicLayout) -> Self {
        self.outputs.push(DeviceToHost::new(layout));
        self
    }

    pub fn len(&self) -> usize {
        self.inputs.len() + self.device_locals.len() + self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceSet for DynamicResources {
    fn for_each_buffer(&self, visit: &mut dyn FnMut(&dyn ComputeBuffer)) {
        for input in &self.inputs {
            visit(input);
        }
        for local in &self.device_locals {
            visit(local);
        }
        for output in &self.outputs {
            visit(output);
        }
    }

    fn for_each_buffer_mut(&mut self, visit: &mut dyn FnMut(&mut dyn ComputeBuffer)) {
        for input in &mut self.inputs {
            visit(input);
        }
        for local in &mut self.device_locals {
            visit(local);
        }
        for output in &mut self.outputs {
            visit(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::compute::{
        BufferRole, ScalingPolicy, descriptor_pool_sizes, descriptor_set_layout_bindings,
        max_descriptor_sets,
    };

    fn bound(mut resources: DynamicResources, scaling: ScalingPolicy) -> DynamicResources {
        resources.for_each_buffer_mut(&mut |buffer| buffer.bind(scaling));
        resources
    }

    fn storage_count(resources: &DynamicResources) -> u32 {
        let sizes = descriptor_pool_sizes(resources).unwrap();
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].ty, vk::DescriptorType::STORAGE_BUFFER);
        sizes[0].descriptor_count
    }

    #[test]
    fn pool_size_one_buffer() {
        let resources = bound(
            DynamicResources::new().with_input(DynamicLayout::of::<f32>(16, 0, 0)),
            ScalingPolicy::BufferArray { batch_size: 3 },
        );
        assert_eq!(storage_count(&resources), 3);
        assert_eq!(max_descriptor_sets(&resources), 1);
    }

    #[test]
    fn pool_size_two_buffers() {
        let resources = bound(
            DynamicResources::new()
                .with_input(DynamicLayout::of::<f32>(16, 0, 0))
                .with_output(DynamicLayout::of::<f32>(4, 0, 1)),
            ScalingPolicy::LargeBuffer { batch_size: 8 },
        );
        assert_eq!(storage_count(&resources), 2);
    }

    #[test]
    fn pool_size_four_buffers_across_sets() {
        let resources = bound(
            DynamicResources::new()
                .with_input(DynamicLayout::of::<f64>(16, 0, 0))
                .with_device_local(DynamicLayout::of::<f64>(16, 0, 1))
                .with_device_local(DynamicLayout::of::<f64>(16, 1, 0))
                .with_output(DynamicLayout::of::<f64>(2, 2, 0)),
            ScalingPolicy::BufferArray { batch_size: 4 },
        );
        assert_eq!(storage_count(&resources), 16);
        assert_eq!(max_descriptor_sets(&resources), 3);

        let per_set: Vec<_> = (0..3)
            .map(|set| descriptor_set_layout_bindings(&resources, set).unwrap().len())
            .collect();
        assert_eq!(per_set, vec![2, 1, 1]);
    }

    #[test]
    fn visit_order_is_inputs_locals_outputs() {
        let resources = DynamicResources::new()
            .with_output(DynamicLayout::of::<u32>(1, 0, 2))
            .with_device_local(DynamicLayout::of::<u32>(1, 0, 1))
            .with_input(DynamicLayout::of::<u32>(1, 0, 0));
        let mut roles = Vec::new();
        resources.for_each_buffer(&mut |buffer| roles.push(buffer.role()));
        assert_eq!(
            roles,
            vec![
                BufferRole::HostToDevice,
                BufferRole::DeviceLocal,
                BufferRole::DeviceToHost
            ]
        );
        assert_eq!(resources.len(), 3);
        assert!(DynamicResources::new().is_empty());
    }
}
