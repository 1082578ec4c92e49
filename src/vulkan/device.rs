use std::sync::Arc;

use anyhow::Context;
use ash::vk;

use super::physical::PhysicalDeviceSelection;

/// Creates the logical device with a single compute/transfer queue.
///
/// Only the optional features detected on the physical device are enabled.
pub fn create_logical_device(
    instance: &ash::Instance,
    selection: &PhysicalDeviceSelection,
) -> anyhow::Result<(Arc<ash::Device>, vk::Queue)> {
    let queue_priorities = [1.0f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(selection.queue_family_index)
        .queue_priorities(&queue_priorities)];

    let capabilities = selection.capabilities;
    let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::default()
        .shader_storage_buffer_array_non_uniform_indexing(
            capabilities.buffer_array_non_uniform_indexing,
        );
    let mut features13 =
        vk::PhysicalDeviceVulkan13Features::default().synchronization2(capabilities.synchronization2);

    let device_features = vk::PhysicalDeviceFeatures::default();
    let mut device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_features(&device_features);
    if capabilities.buffer_array_non_uniform_indexing {
        device_create_info = device_create_info.push_next(&mut indexing);
    }
    if capabilities.synchronization2 {
        device_create_info = device_create_info.push_next(&mut features13);
    }

    let device = Arc::new(unsafe {
        instance
            .create_device(selection.physical_device, &device_create_info, None)
            .context("failed to create logical device.")?
    });
    let queue = unsafe { device.get_device_queue(selection.queue_family_index, 0) };

    log::trace!("Created logical device");

    Ok((device, queue))
}
