use std::{
    mem::ManuallyDrop,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use ash::{ext::debug_utils, vk};

use crate::{compute::ScalingPolicy, error::DeviceError};

use super::{
    DeviceContext,
    debug::setup_debug_messenger,
    device::create_logical_device,
    instance::{create_instance, version_to_string},
    physical::{DeviceCapabilities, PhysicalDeviceSelection, pick_physical_device},
};

const VALIDATION_ENV: &str = "VIBWA_VALIDATION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOptions {
    /// `deviceID` reported by the driver; the first suitable device when unset.
    pub device_id: Option<u32>,
    pub validation: bool,
    pub application_name: String,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        let validation = match std::env::var(VALIDATION_ENV).as_deref() {
            Ok("0") | Ok("false") => false,
            Ok("1") | Ok("true") => true,
            _ => cfg!(debug_assertions),
        };
        Self {
            device_id: None,
            validation,
            application_name: "vibwa".to_string(),
        }
    }
}

impl DeviceOptions {
    pub fn device_id(mut self, device_id: u32) -> Self {
        self.device_id = Some(device_id);
        self
    }

    pub fn validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }
}

/// Compute-capable hardware context shared by every task created against it.
///
/// Objects created from a `Device` must be destroyed before the last
/// reference to it is released.
pub struct Device {
    allocator: ManuallyDrop<vk_mem::Allocator>,
    context: DeviceContext,
    queue: Mutex<vk::Queue>,
    queue_family_index: u32,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    capabilities: DeviceCapabilities,
    debug_messenger: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    instance: ash::Instance,
    _entry: ash::Entry,
}

impl Device {
    pub fn create(options: DeviceOptions) -> anyhow::Result<Arc<Self>> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| DeviceError::LoaderUnavailable(e.to_string()))?;

        let loader_version = unsafe { entry.try_enumerate_instance_version() }
            .context("failed to query instance version")?
            .unwrap_or(vk::API_VERSION_1_0);
        if loader_version < vk::API_VERSION_1_2 {
            return Err(DeviceError::InsufficientVersion {
                found: version_to_string(loader_version),
            }
            .into());
        }
        let api_version = if loader_version >= vk::API_VERSION_1_3 {
            vk::API_VERSION_1_3
        } else {
            vk::API_VERSION_1_2
        };

        let (instance, validation) = create_instance(
            &entry,
            &options.application_name,
            api_version,
            options.validation,
        )
        .context("failed to create instance")?;
        let debug_messenger = if validation {
            setup_debug_messenger(&entry, &instance)
        } else {
            None
        };

        let parts = match create_device_parts(&instance, api_version, options.device_id) {
            Ok(parts) => parts,
            Err(e) => {
                unsafe { destroy_instance(&instance, &debug_messenger) };
                return Err(e);
            }
        };
        let (selection, logical, queue, allocator) = parts;

        let debug_utils = validation
            .then(|| Arc::new(debug_utils::Device::new(&instance, &logical)));
        let context = DeviceContext {
            device: logical,
            debug_utils,
        };

        log::debug!(
            "Created device {:?} (buffer array scaling: {}, synchronization2: {})",
            selection.properties.device_name_as_c_str().unwrap_or_default(),
            selection.capabilities.buffer_array_non_uniform_indexing,
            selection.capabilities.synchronization2
        );

        Ok(Arc::new(Self {
            allocator: ManuallyDrop::new(allocator),
            context,
            queue: Mutex::new(queue),
            queue_family_index: selection.queue_family_index,
            physical_device: selection.physical_device,
            properties: selection.properties,
            capabilities: selection.capabilities,
            debug_messenger,
            instance,
            _entry: entry,
        }))
    }

    pub fn logical(&self) -> &ash::Device {
        &self.context.device
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    pub fn api_version(&self) -> u32 {
        self.capabilities.api_version
    }

    pub fn supports_buffer_array_scaling(&self) -> bool {
        self.capabilities.buffer_array_non_uniform_indexing
    }

    pub fn supports_synchronization2(&self) -> bool {
        self.capabilities.synchronization2
    }

    /// Buffer arrays when the device can index them non-uniformly, one large buffer otherwise.
    pub fn optimal_scaling_policy(&self, batch_size: u32) -> ScalingPolicy {
        if self.supports_buffer_array_scaling() {
            ScalingPolicy::BufferArray { batch_size }
        } else {
            ScalingPolicy::LargeBuffer { batch_size }
        }
    }

    /// Submits one command buffer and blocks until `fence` signals.
    pub fn submit_and_wait(&self, cmd: vk::CommandBuffer, fence: vk::Fence) -> anyhow::Result<()> {
        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let device = self.logical();

        {
            let queue = self
                .queue
                .lock()
                .map_err(|_| anyhow::anyhow!("queue mutex poisoned"))?;
            unsafe {
                device
                    .reset_fences(&[fence])
                    .context("failed to reset submission fence")?;
                device
                    .queue_submit(*queue, &[submit_info], fence)
                    .context("failed to submit compute command buffer")?;
            }
        }

        unsafe {
            device
                .wait_for_fences(&[fence], true, u64::MAX)
                .context("failed waiting for fences")?;
        }
        Ok(())
    }

    pub fn wait_idle(&self) -> anyhow::Result<()> {
        unsafe {
            self.logical()
                .device_wait_idle()
                .context("failed to wait for device idle")
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        log::trace!("Destroying Device");
        if let Err(e) = self.wait_idle() {
            log::warn!("{e:?}");
        }
        log::trace!("  Destroying Allocator");
        unsafe {
            ManuallyDrop::drop(&mut self.allocator);
        }
        log::trace!("  Destroying logical device");
        unsafe {
            self.context.device.destroy_device(None);
            destroy_instance(&self.instance, &self.debug_messenger);
        }
        log::trace!("Device Destroyed");
    }
}

type DeviceParts = (
    PhysicalDeviceSelection,
    Arc<ash::Device>,
    vk::Queue,
    vk_mem::Allocator,
);

fn create_device_parts(
    instance: &ash::Instance,
    api_version: u32,
    device_id: Option<u32>,
) -> anyhow::Result<DeviceParts> {
    let selection = pick_physical_device(instance, api_version, device_id)
        .context("failed to pick physical device")?;
    let (logical, queue) = create_logical_device(instance, &selection)
        .context("failed to create logical device")?;

    let mut info =
        vk_mem::AllocatorCreateInfo::new(instance, &logical, selection.physical_device);
    info.vulkan_api_version = selection.capabilities.api_version;
    let allocator = match unsafe { vk_mem::Allocator::new(info) } {
        Ok(allocator) => allocator,
        Err(e) => {
            unsafe { logical.destroy_device(None) };
            return Err(anyhow::anyhow!("failed to create memory allocator: {e:?}"));
        }
    };

    Ok((selection, logical, queue, allocator))
}

unsafe fn destroy_instance(
    instance: &ash::Instance,
    debug_messenger: &Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
) {
    if let Some((debug_utils, messenger)) = debug_messenger {
        log::trace!("  Destroying debug messenger");
        unsafe { debug_utils.destroy_debug_utils_messenger(*messenger, None) };
    }
    log::trace!("  Destroying Instance");
    unsafe { instance.destroy_instance(None) };
}
