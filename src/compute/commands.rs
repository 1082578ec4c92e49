use anyhow::Context;
use ash::vk;

/// Command pool with one primary command buffer and its submission fence.
pub struct CommandContext {
    pub command_buffer: vk::CommandBuffer,
    pub fence: vk::Fence,
    command_pool: vk::CommandPool,
}

impl CommandContext {
    pub fn new(device: &ash::Device, queue_family: u32) -> anyhow::Result<Self> {
        let command_pool = {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            unsafe {
                device
                    .create_command_pool(&pool_info, None)
                    .context("failed to create compute command pool")?
            }
        };

        let command_buffer = {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            match unsafe { device.allocate_command_buffers(&alloc_info) } {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    unsafe { device.destroy_command_pool(command_pool, None) };
                    return Err(e).context("failed to allocate compute command buffer");
                }
            }
        };

        let fence = match create_fence(device) {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(e);
            }
        };

        log::trace!("Created command pool on queue family {queue_family}");
        Ok(Self {
            command_buffer,
            fence,
            command_pool,
        })
    }

    pub fn begin(&self, device: &ash::Device) -> anyhow::Result<()> {
        unsafe {
            device
                .begin_command_buffer(self.command_buffer, &vk::CommandBufferBeginInfo::default())
                .context("failed to begin compute command buffer")
        }
    }

    pub fn end(&self, device: &ash::Device) -> anyhow::Result<()> {
        unsafe {
            device
                .end_command_buffer(self.command_buffer)
                .context("failed to end compute command buffer")
        }
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        log::trace!("Destroying command pool");
        unsafe {
            device.destroy_fence(self.fence, None);
            device.destroy_command_pool(self.command_pool, None);
        }
    }
}

fn create_fence(device: &ash::Device) -> anyhow::Result<vk::Fence> {
    unsafe {
        device
            .create_fence(&vk::FenceCreateInfo::default(), None)
            .context("failed to create fence")
    }
}
