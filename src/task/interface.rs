use std::sync::Arc;

use crate::vulkan::{Device, DeviceOptions};

use super::{
    AnyTaskConfigurator, PrecisionType, Scalar, TaskConfigurator, TaskHandle, algorithm_for,
};

/// Entry point for submitting tasks to one compute device.
#[derive(Clone)]
pub struct ComputeDeviceInterface {
    device: Arc<Device>,
}

impl ComputeDeviceInterface {
    pub fn new(device: Arc<Device>) -> Self {
        Self { device }
    }

    pub fn create(options: DeviceOptions) -> anyhow::Result<Self> {
        Ok(Self::new(Device::create(options)?))
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn task_configurator<F: Scalar>(&self) -> TaskConfigurator<F> {
        TaskConfigurator::new()
    }

    pub fn task_configurator_for(&self, precision: PrecisionType) -> AnyTaskConfigurator {
        AnyTaskConfigurator::new(precision)
    }

    /// Validates `configurator` and starts the task on a worker thread.
    ///
    /// Configuration errors are returned here, before any thread or GPU object exists.
    pub fn submit_task<F: Scalar>(
        &self,
        configurator: &TaskConfigurator<F>,
    ) -> anyhow::Result<TaskHandle<F>> {
        let task = configurator.validate()?;
        log::debug!(
            "Submitting {} task ({}, group size {})",
            task.algorithm_config.name(),
            F::PRECISION,
            task.hardware_config.group_size
        );

        let algorithm = algorithm_for(task);
        let device = self.device.clone();
        TaskHandle::spawn(move |stop| algorithm.run(&device, &stop))
    }
}
