use std::sync::Arc;

use anyhow::Context;

use crate::{
    compute::{ComputeShader, DynamicLayout, DynamicResources, HostToDevice},
    error::ConfigError,
    vulkan::Device,
};

use super::{AlgorithmConfig, Scalar, StopToken, TaskSpec, VibwaAlgorithmConfig};

/// Per-curve results of a finished task, in batch order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskResults<F> {
    pub levels: Vec<Vec<F>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<F> {
    Completed(TaskResults<F>),
    Cancelled,
}

impl<F> TaskOutcome<F> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }

    pub fn into_results(self) -> Option<TaskResults<F>> {
        match self {
            TaskOutcome::Completed(results) => Some(results),
            TaskOutcome::Cancelled => None,
        }
    }
}

/// Work executed on a task's worker thread.
pub trait Algorithm<F>: Send {
    fn name(&self) -> &'static str;

    fn run(&self, device: &Arc<Device>, stop: &StopToken) -> anyhow::Result<TaskOutcome<F>>;
}

/// Builds the algorithm selected by a task.
pub fn algorithm_for<F: Scalar>(task: TaskSpec<F>) -> Box<dyn Algorithm<F>> {
    match &task.algorithm_config {
        AlgorithmConfig::Vibwa(_) => Box::new(VibwaAlgorithm { task }),
    }
}

pub struct VibwaAlgorithm<F> {
    task: TaskSpec<F>,
}

impl<F: Scalar> VibwaAlgorithm<F> {
    fn config(&self) -> &VibwaAlgorithmConfig<F> {
        match &self.task.algorithm_config {
            AlgorithmConfig::Vibwa(config) => config,
        }
    }

    /// Loads the curves and checks them against the buffer sizes.
    fn load_potentials(&self) -> anyhow::Result<Vec<Vec<F>>> {
        let hardware = &self.task.hardware_config;
        let curves = self
            .task
            .potential_source
            .load()
            .context("failed to load potentials")?;

        if curves.len() > hardware.group_size as usize {
            return Err(ConfigError::TooManyPotentials {
                provided: curves.len(),
                group_size: hardware.group_size,
            }
            .into());
        }
        let capacity = hardware.potential_buffer_size as u64;
        if let Some((index, curve)) = curves
            .iter()
            .enumerate()
            .find(|(_, curve)| curve.len() as u64 > capacity)
        {
            return Err(ConfigError::PotentialTooLong {
                index,
                len: curve.len(),
                capacity,
            }
            .into());
        }
        if curves.len() < hardware.group_size as usize {
            log::warn!(
                "{} potential curve(s) for group size {}; remaining batch elements are zero-filled",
                curves.len(),
                hardware.group_size
            );
        }
        Ok(curves)
    }
}

impl<F: Scalar> Algorithm<F> for VibwaAlgorithm<F> {
    fn name(&self) -> &'static str {
        "vibwa"
    }

    fn run(&self, device: &Arc<Device>, stop: &StopToken) -> anyhow::Result<TaskOutcome<F>> {
        if stop.stop_requested() {
            return Ok(TaskOutcome::Cancelled);
        }
        let config = self.config();
        let curves = self.load_potentials()?;
        let resources = config.resources(&self.task.hardware_config)?;

        let mut shader = ComputeShader::with_optimal_scaling(
            device.clone(),
            self.task.hardware_config.group_size,
            resources,
        );
        shader
            .prepare(&config.shader)
            .context("failed to prepare vibwa shader")?;

        {
            let (device, buffers) = shader.split_mut();
            fill_inputs(device, buffers, &curves, &config.shader_parameters())?;
        }

        if !stop.begin_submission() {
            log::debug!("Vibwa task cancelled before submission");
            return Ok(TaskOutcome::Cancelled);
        }
        shader.run()?;

        let (device, buffers) = shader.split_mut();
        let output = buffers
            .outputs
            .first_mut()
            .context("vibwa resources have no output buffer")?;
        let levels = output
            .read_to_vec(device)?
            .iter()
            .map(|bytes| levels_from_bytes(bytes))
            .collect();

        Ok(TaskOutcome::Completed(TaskResults { levels }))
    }
}

/// Copies mapped output bytes into scalars; the source need not be aligned for `F`.
fn levels_from_bytes<F: Scalar>(bytes: &[u8]) -> Vec<F> {
    bytemuck::pod_collect_to_vec::<u8, F>(bytes)
}

fn fill_inputs<F: Scalar>(
    device: &Device,
    buffers: &mut DynamicResources,
    curves: &[Vec<F>],
    parameters: &[F],
) -> anyhow::Result<()> {
    let [potentials, params] = buffers.inputs.as_mut_slice() else {
        anyhow::bail!("vibwa resources expect exactly two inputs");
    };

    fill_bytes(device, potentials, |batch_index| {
        curves
            .get(batch_index as usize)
            .map(|curve| bytemuck::cast_slice(curve.as_slice()))
    })?;
    fill_bytes(device, params, |_| Some(bytemuck::cast_slice(parameters)))
}

/// Writes `data(batch_index)` at the start of each batch slice and zeroes the rest.
fn fill_bytes<'a>(
    device: &Device,
    buffer: &mut HostToDevice<DynamicLayout>,
    data: impl Fn(u32) -> Option<&'a [u8]>,
) -> anyhow::Result<()> {
    buffer.fill_buffers(device, |batch_index, bytes, _| {
        let src = data(batch_index).unwrap_or_default();
        let n = src.len().min(bytes.len());
        bytes[..n].copy_from_slice(&src[..n]);
        bytes[n..].fill(0);
    })
}
