use std::sync::Arc;

use crate::{error::StateError, vulkan::Device};

use super::{ComputeResources, PrepareStage, ResourceSet, ScalingPolicy, ShaderCode};

/// One compute task: a resource set bound to a device and a scaling policy.
///
/// Dropping the shader releases its GPU objects while the device is still alive.
pub struct ComputeShader<S: ResourceSet> {
    resources: ComputeResources<S>,
    scaling: ScalingPolicy,
    device: Arc<Device>,
}

impl<S: ResourceSet> ComputeShader<S> {
    pub fn new(device: Arc<Device>, scaling: ScalingPolicy, buffers: S) -> Self {
        Self {
            resources: ComputeResources::new(buffers),
            scaling,
            device,
        }
    }

    /// Uses the device's preferred scaling policy for `batch_size`.
    pub fn with_optimal_scaling(device: Arc<Device>, batch_size: u32, buffers: S) -> Self {
        let scaling = device.optimal_scaling_policy(batch_size);
        Self::new(device, scaling, buffers)
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn scaling(&self) -> ScalingPolicy {
        self.scaling
    }

    pub fn resources(&self) -> &ComputeResources<S> {
        &self.resources
    }

    pub fn is_prepared(&self) -> bool {
        self.resources.stage() == PrepareStage::Recorded
    }

    /// Device plus mutable buffers, for filling inputs and reading outputs.
    pub fn split_mut(&mut self) -> (&Device, &mut S) {
        (&self.device, self.resources.buffers_mut())
    }

    pub fn prepare(&mut self, code: &ShaderCode) -> anyhow::Result<()> {
        self.resources.prepare(&self.device, self.scaling, code)
    }

    pub fn run(&self) -> anyhow::Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("run").entered();

        if !self.is_prepared() {
            return Err(StateError::NotPrepared.into());
        }
        log::debug!("Running compute shader ({})", self.scaling);
        self.resources.submit(&self.device)
    }
}

impl<S: ResourceSet> Drop for ComputeShader<S> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::warn!("{e:?}");
        }
        self.resources.destroy(&self.device);
    }
}
