use std::sync::Arc;

use crate::{
    compute::{DynamicLayout, DynamicResources, ShaderCode},
    error::ConfigError,
};

use super::Scalar;

/// Sizing of one task on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareConfig {
    /// Points per potential curve and per work buffer.
    pub potential_buffer_size: u32,
    /// Batch size: curves processed by one dispatch.
    pub group_size: u32,
    /// Accepted and carried with the task, never read. Device memory is sized from
    /// the layouts and the scaling policy instead.
    pub allocation_block_size: u32,
}

impl HardwareConfig {
    pub fn new(potential_buffer_size: u32, group_size: u32, allocation_block_size: u32) -> Self {
        Self {
            potential_buffer_size,
            group_size,
            allocation_block_size,
        }
    }
}

pub const POTENTIAL_BINDING: u32 = 0;
pub const WORK_BINDINGS: std::ops::RangeInclusive<u32> = 1..=5;
pub const LEVELS_BINDING: u32 = 6;
pub const PARAMETERS_BINDING: u32 = 7;

/// Number of values in the parameter block handed to the shader.
pub const PARAMETER_COUNT: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct VibwaAlgorithmConfig<F> {
    pub mass_atom_0: F,
    pub mass_atom_1: F,
    pub integration_step: F,
    pub min_distance_to_asymptote: F,
    pub min_level: u32,
    pub max_level: u32,
    pub shader: Arc<ShaderCode>,
}

impl<F: Scalar> VibwaAlgorithmConfig<F> {
    /// Vibrational levels computed per curve.
    pub fn level_count(&self) -> Result<u32, ConfigError> {
        if self.min_level > self.max_level {
            return Err(ConfigError::InvalidLevelRange {
                min: self.min_level,
                max: self.max_level,
            });
        }
        Ok(self.max_level - self.min_level + 1)
    }

    /// Scalars bound at [`PARAMETERS_BINDING`], shared by every batch element.
    pub fn shader_parameters(&self) -> [F; PARAMETER_COUNT] {
        [
            self.mass_atom_0,
            self.mass_atom_1,
            self.integration_step,
            self.min_distance_to_asymptote,
            F::from_f64(self.min_level as f64),
            F::from_f64(self.max_level as f64),
        ]
    }

    /// Buffers the Vibwa shader expects, all in descriptor set 0.
    pub fn resources(&self, hardware: &HardwareConfig) -> Result<DynamicResources, ConfigError> {
        let points = hardware.potential_buffer_size as u64;
        let mut resources = DynamicResources::new()
            .with_input(DynamicLayout::of::<F>(points, 0, POTENTIAL_BINDING))
            .with_input(DynamicLayout::of::<F>(
                PARAMETER_COUNT as u64,
                0,
                PARAMETERS_BINDING,
            ));
        for binding in WORK_BINDINGS {
            resources = resources.with_device_local(DynamicLayout::of::<F>(points, 0, binding));
        }
        let levels = self.level_count()? as u64;
        Ok(resources.with_output(DynamicLayout::of::<F>(levels, 0, LEVELS_BINDING)))
    }
}

/// Algorithm selected for a task.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgorithmConfig<F> {
    Vibwa(VibwaAlgorithmConfig<F>),
}

impl<F: Scalar> AlgorithmConfig<F> {
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmConfig::Vibwa(_) => "vibwa",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            AlgorithmConfig::Vibwa(config) => {
                config.level_count()?;
                if !config.shader.has_instructions() {
                    return Err(ConfigError::MissingShader);
                }
                Ok(())
            }
        }
    }
}
