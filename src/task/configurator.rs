use std::{path::PathBuf, sync::Arc};

use crate::{compute::ShaderCode, error::ConfigError};

use super::{
    AlgorithmConfig, HardwareConfig, MorsePotentialConfig, MorsePotentialGenerator,
    POTENTIAL_BINDING, PotentialFileLoader, PotentialSource, PrecisionType, Scalar,
    VibwaAlgorithmConfig,
};

/// Collects everything a task needs before it can be submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfigurator<F> {
    hardware_config: Option<HardwareConfig>,
    potential_source: Option<PotentialSource<F>>,
    algorithm_config: Option<AlgorithmConfig<F>>,
}

/// A fully configured task, as handed to the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec<F> {
    pub hardware_config: HardwareConfig,
    pub potential_source: PotentialSource<F>,
    pub algorithm_config: AlgorithmConfig<F>,
}

impl<F> Default for TaskConfigurator<F> {
    fn default() -> Self {
        Self {
            hardware_config: None,
            potential_source: None,
            algorithm_config: None,
        }
    }
}

impl<F: Scalar> TaskConfigurator<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn precision(&self) -> PrecisionType {
        F::PRECISION
    }

    pub fn set_hardware_config(&mut self, config: HardwareConfig) -> &mut Self {
        self.hardware_config = Some(config);
        self
    }

    pub fn set_potential_source(&mut self, source: PotentialSource<F>) -> &mut Self {
        self.potential_source = Some(source);
        self
    }

    pub fn set_morse_potential(&mut self, configs: Vec<MorsePotentialConfig<F>>) -> &mut Self {
        self.set_potential_source(PotentialSource::MorseGenerator(
            MorsePotentialGenerator::new(configs),
        ))
    }

    pub fn set_potential_files<P: Into<PathBuf>>(
        &mut self,
        file_names: impl IntoIterator<Item = P>,
    ) -> &mut Self {
        self.set_potential_source(PotentialSource::FileLoader(PotentialFileLoader::new(
            file_names,
        )))
    }

    pub fn set_algorithm_config(&mut self, config: AlgorithmConfig<F>) -> &mut Self {
        self.algorithm_config = Some(config);
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_vibwa_algorithm(
        &mut self,
        mass_atom_0: F,
        mass_atom_1: F,
        integration_step: F,
        min_distance_to_asymptote: F,
        min_level: u32,
        max_level: u32,
        shader: Arc<ShaderCode>,
    ) -> &mut Self {
        self.set_algorithm_config(AlgorithmConfig::Vibwa(VibwaAlgorithmConfig {
            mass_atom_0,
            mass_atom_1,
            integration_step,
            min_distance_to_asymptote,
            min_level,
            max_level,
            shader,
        }))
    }

    pub fn hardware_config(&self) -> Option<&HardwareConfig> {
        self.hardware_config.as_ref()
    }

    pub fn potential_source(&self) -> Option<&PotentialSource<F>> {
        self.potential_source.as_ref()
    }

    pub fn algorithm_config(&self) -> Option<&AlgorithmConfig<F>> {
        self.algorithm_config.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.hardware_config.is_some()
            && self.potential_source.is_some()
            && self.algorithm_config.is_some()
    }

    /// Snapshot of the configuration, checked for everything knowable without a device.
    pub fn validate(&self) -> Result<TaskSpec<F>, ConfigError> {
        let (Some(hardware_config), Some(potential_source), Some(algorithm_config)) = (
            self.hardware_config,
            self.potential_source.as_ref(),
            self.algorithm_config.as_ref(),
        ) else {
            return Err(ConfigError::NotConfigured);
        };

        if hardware_config.group_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if hardware_config.potential_buffer_size == 0 {
            return Err(ConfigError::EmptyLayout {
                set: 0,
                binding: POTENTIAL_BINDING,
            });
        }
        if potential_source.len() > hardware_config.group_size as usize {
            return Err(ConfigError::TooManyPotentials {
                provided: potential_source.len(),
                group_size: hardware_config.group_size,
            });
        }
        // File curves are only sized once loaded on the worker.
        if let PotentialSource::MorseGenerator(generator) = potential_source {
            let capacity = hardware_config.potential_buffer_size as u64;
            if let Some((index, config)) = generator
                .configs
                .iter()
                .enumerate()
                .find(|(_, config)| config.point_count as u64 > capacity)
            {
                return Err(ConfigError::PotentialTooLong {
                    index,
                    len: config.point_count as usize,
                    capacity,
                });
            }
        }
        algorithm_config.validate()?;

        Ok(TaskSpec {
            hardware_config,
            potential_source: potential_source.clone(),
            algorithm_config: algorithm_config.clone(),
        })
    }
}

/// A task configurator whose precision is chosen at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyTaskConfigurator {
    Float32(TaskConfigurator<f32>),
    Float64(TaskConfigurator<f64>),
}

impl AnyTaskConfigurator {
    pub fn new(precision: PrecisionType) -> Self {
        match precision {
            PrecisionType::Float32 => AnyTaskConfigurator::Float32(TaskConfigurator::new()),
            PrecisionType::Float64 => AnyTaskConfigurator::Float64(TaskConfigurator::new()),
        }
    }

    pub fn precision(&self) -> PrecisionType {
        match self {
            AnyTaskConfigurator::Float32(_) => PrecisionType::Float32,
            AnyTaskConfigurator::Float64(_) => PrecisionType::Float64,
        }
    }

    pub fn is_configured(&self) -> bool {
        match self {
            AnyTaskConfigurator::Float32(c) => c.is_configured(),
            AnyTaskConfigurator::Float64(c) => c.is_configured(),
        }
    }

    pub fn set_hardware_config(&mut self, config: HardwareConfig) -> &mut Self {
        match self {
            AnyTaskConfigurator::Float32(c) => {
                c.set_hardware_config(config);
            }
            AnyTaskConfigurator::Float64(c) => {
                c.set_hardware_config(config);
            }
        }
        self
    }

    pub fn set_potential_files<P: Into<PathBuf>>(
        &mut self,
        file_names: impl IntoIterator<Item = P>,
    ) -> &mut Self {
        match self {
            AnyTaskConfigurator::Float32(c) => {
                c.set_potential_files(file_names);
            }
            AnyTaskConfigurator::Float64(c) => {
                c.set_potential_files(file_names);
            }
        }
        self
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut TaskConfigurator<f32>> {
        match self {
            AnyTaskConfigurator::Float32(c) => Some(c),
            AnyTaskConfigurator::Float64(_) => None,
        }
    }

    pub fn as_f64_mut(&mut self) -> Option<&mut TaskConfigurator<f64>> {
        match self {
            AnyTaskConfigurator::Float64(c) => Some(c),
            AnyTaskConfigurator::Float32(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shader() -> Arc<ShaderCode> {
        Arc::new(
            ShaderCode::from_words(vec![0x0723_0203, 0x0001_0000, 0, 1, 0, 0x0002_0011, 1])
                .unwrap(),
        )
    }

    fn morse() -> MorsePotentialConfig<f64> {
        MorsePotentialConfig {
            dissociation_energy: 1.0,
            equilibrium_bond_distance: 1.0,
            well_width: 1.0,
            min_r: 0.5,
            max_r: 4.0,
            point_count: 32,
        }
    }

    type Step = fn(&mut TaskConfigurator<f64>);

    fn steps() -> [Step; 3] {
        [
            |c| {
                c.set_hardware_config(HardwareConfig::new(32, 4, 16));
            },
            |c| {
                c.set_morse_potential(vec![morse()]);
            },
            |c| {
                c.set_vibwa_algorithm(1.0, 1.0, 0.01, 10.0, 0, 3, shader());
            },
        ]
    }

    #[test]
    fn configured_only_after_all_three_in_any_order() {
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let steps = steps();
        for order in orders {
            let mut configurator = TaskConfigurator::new();
            for (applied, &step) in order.iter().enumerate() {
                assert!(!configurator.is_configured(), "order {order:?} at {applied}");
                steps[step](&mut configurator);
            }
            assert!(configurator.is_configured(), "order {order:?}");
        }
    }

    #[test]
    fn getters_reflect_setters() {
        let mut configurator = TaskConfigurator::<f64>::new();
        assert!(configurator.hardware_config().is_none());
        configurator.set_hardware_config(HardwareConfig::new(32, 4, 16));
        assert_eq!(configurator.hardware_config().map(|h| h.group_size), Some(4));
        configurator.set_potential_files(["a.txt", "b.txt"]);
        assert_eq!(configurator.potential_source().map(PotentialSource::len), Some(2));
        assert_eq!(configurator.precision(), PrecisionType::Float64);
    }

    #[test]
    fn validate_rejects_incomplete_and_inconsistent() {
        let mut configurator = TaskConfigurator::<f64>::new();
        assert_eq!(configurator.validate(), Err(ConfigError::NotConfigured));

        configurator
            .set_hardware_config(HardwareConfig::new(32, 1, 16))
            .set_morse_potential(vec![morse(), morse()])
            .set_vibwa_algorithm(1.0, 1.0, 0.01, 10.0, 0, 3, shader());
        assert_eq!(
            configurator.validate(),
            Err(ConfigError::TooManyPotentials {
                provided: 2,
                group_size: 1
            })
        );

        configurator.set_hardware_config(HardwareConfig::new(32, 2, 16));
        let spec = configurator.validate().unwrap();
        assert_eq!(spec.hardware_config.group_size, 2);

        configurator.set_vibwa_algorithm(1.0, 1.0, 0.01, 10.0, 4, 3, shader());
        assert_eq!(
            configurator.validate(),
            Err(ConfigError::InvalidLevelRange { min: 4, max: 3 })
        );
    }

    #[test]
    fn validate_rejects_buffer_sizes_before_submission() {
        let mut configurator = TaskConfigurator::<f64>::new();
        configurator
            .set_hardware_config(HardwareConfig::new(0, 2, 16))
            .set_morse_potential(vec![morse()])
            .set_vibwa_algorithm(1.0, 1.0, 0.01, 10.0, 0, 3, shader());
        assert_eq!(
            configurator.validate(),
            Err(ConfigError::EmptyLayout {
                set: 0,
                binding: POTENTIAL_BINDING
            })
        );

        let long = MorsePotentialConfig {
            point_count: 40,
            ..morse()
        };
        configurator
            .set_hardware_config(HardwareConfig::new(32, 2, 16))
            .set_morse_potential(vec![morse(), long]);
        assert_eq!(
            configurator.validate(),
            Err(ConfigError::PotentialTooLong {
                index: 1,
                len: 40,
                capacity: 32
            })
        );

        configurator.set_potential_files(["a.txt", "b.txt"]);
        assert!(configurator.validate().is_ok());
    }

    #[test]
    fn any_configurator_dispatches_on_precision() {
        let mut any = AnyTaskConfigurator::new(PrecisionType::Float32);
        assert_eq!(any.precision(), PrecisionType::Float32);
        assert!(any.as_f64_mut().is_none());
        any.set_hardware_config(HardwareConfig::new(8, 1, 8))
            .set_potential_files(["curve.txt"]);
        assert!(!any.is_configured());
        if let Some(c) = any.as_f32_mut() {
            c.set_vibwa_algorithm(1.0, 1.0, 0.1, 1.0, 0, 0, shader());
        }
        assert!(any.is_configured());
    }
}
