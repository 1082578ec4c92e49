use anyhow::Context;
use ash::vk;

use crate::vulkan::DeviceContext;

use super::ShaderCode;

/// Compute pipeline together with the layout and module it was built from.
pub struct ComputePipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    module: vk::ShaderModule,
}

impl ComputePipeline {
    pub fn new(
        context: &DeviceContext,
        code: &ShaderCode,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> anyhow::Result<Self> {
        let device = &context.device;
        let module = create_shader_module(device, code)?;

        let layout = match unsafe {
            device.create_pipeline_layout(
                &vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts),
                None,
            )
        } {
            Ok(layout) => layout,
            Err(e) => {
                unsafe { device.destroy_shader_module(module, None) };
                return Err(e).context("failed to create compute pipeline layout");
            }
        };

        let entry = code.entry_point_cstring()?;
        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module)
            .name(&entry);
        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(layout);

        let pipeline = match unsafe {
            device.create_compute_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
        } {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe {
                    device.destroy_pipeline_layout(layout, None);
                    device.destroy_shader_module(module, None);
                }
                return Err(anyhow::anyhow!(
                    "failed to create compute pipeline ({}): {e:?}",
                    code.entry_point()
                ));
            }
        };

        context.name_object(pipeline, format!("compute pipeline ({})", code.entry_point()))?;
        context.name_object(layout, "compute pipeline layout")?;
        log::trace!(
            "Created compute pipeline ({}, {} set layout(s))",
            code.entry_point(),
            set_layouts.len()
        );

        Ok(Self {
            pipeline,
            layout,
            module,
        })
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        log::trace!("Destroying compute pipeline");
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
            device.destroy_shader_module(self.module, None);
        }
    }
}

fn create_shader_module(device: &ash::Device, code: &ShaderCode) -> anyhow::Result<vk::ShaderModule> {
    unsafe {
        device
            .create_shader_module(
                &vk::ShaderModuleCreateInfo::default().code(code.words()),
                None,
            )
            .context("failed to create shader module")
    }
}
