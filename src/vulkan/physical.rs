use anyhow::Context;
use ash::vk;

use crate::error::DeviceError;

use super::instance::version_to_string;

/// Optional hardware features the compute core adapts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Effective API version, the lower of instance and device versions.
    pub api_version: u32,
    /// `shaderStorageBufferArrayNonUniformIndexing`, enables buffer-array scaling.
    pub buffer_array_non_uniform_indexing: bool,
    pub synchronization2: bool,
}

pub struct PhysicalDeviceSelection {
    pub physical_device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub queue_family_index: u32,
    pub capabilities: DeviceCapabilities,
}

pub fn pick_physical_device(
    instance: &ash::Instance,
    instance_api_version: u32,
    device_id: Option<u32>,
) -> anyhow::Result<PhysicalDeviceSelection> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .context("failed to enumerate physical devices")?
    };

    for device in devices.iter() {
        let props = unsafe { instance.get_physical_device_properties(*device) };
        log::debug!(
            "Found physical device {:?} (id {}, api {})",
            props.device_name_as_c_str().unwrap_or_default(),
            props.device_id,
            version_to_string(props.api_version)
        );
    }

    let candidate = match device_id {
        Some(id) => {
            let device = devices
                .into_iter()
                .find(|device| {
                    let props = unsafe { instance.get_physical_device_properties(*device) };
                    props.device_id == id
                })
                .ok_or(DeviceError::DeviceNotFound(id))?;

            let props = unsafe { instance.get_physical_device_properties(device) };
            if props.api_version < vk::API_VERSION_1_2 {
                return Err(DeviceError::InsufficientVersion {
                    found: version_to_string(props.api_version),
                }
                .into());
            }
            let queue_family_index =
                find_compute_queue_family(instance, device).ok_or(DeviceError::NoComputeQueue)?;
            (device, props, queue_family_index)
        }
        None => devices
            .into_iter()
            .find_map(|device| {
                let props = unsafe { instance.get_physical_device_properties(device) };
                if props.api_version < vk::API_VERSION_1_2 {
                    return None;
                }
                let queue_family_index = find_compute_queue_family(instance, device)?;
                Some((device, props, queue_family_index))
            })
            .ok_or(DeviceError::NoDevices)?,
    };

    let (physical_device, properties, queue_family_index) = candidate;
    let capabilities = query_capabilities(
        instance,
        physical_device,
        properties.api_version.min(instance_api_version),
    );

    log::debug!(
        "Selected physical device: {:?} (queue family {}, {:?})",
        properties.device_name_as_c_str().unwrap_or_default(),
        queue_family_index,
        capabilities
    );

    Ok(PhysicalDeviceSelection {
        physical_device,
        properties,
        queue_family_index,
        capabilities,
    })
}

/// First queue family supporting both compute and transfer.
fn find_compute_queue_family(instance: &ash::Instance, device: vk::PhysicalDevice) -> Option<u32> {
    let props = unsafe { instance.get_physical_device_queue_family_properties(device) };
    props
        .iter()
        .enumerate()
        .filter(|(_, family)| family.queue_count > 0)
        .find(|(_, family)| {
            family
                .queue_flags
                .contains(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)
        })
        .map(|(index, _)| index as u32)
}

fn query_capabilities(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    api_version: u32,
) -> DeviceCapabilities {
    let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
    let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
    let supports13 = api_version >= vk::API_VERSION_1_3;

    {
        let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut indexing);
        if supports13 {
            features2 = features2.push_next(&mut features13);
        }
        unsafe { instance.get_physical_device_features2(device, &mut features2) };
    }

    DeviceCapabilities {
        api_version,
        buffer_array_non_uniform_indexing: indexing.shader_storage_buffer_array_non_uniform_indexing
            == vk::TRUE,
        synchronization2: supports13 && features13.synchronization2 == vk::TRUE,
    }
}
