mod algorithm;
mod config;
mod configurator;
mod control;
mod handle;
mod interface;
mod potential;
mod precision;

pub use algorithm::{Algorithm, TaskOutcome, TaskResults, VibwaAlgorithm, algorithm_for};

pub use config::{
    AlgorithmConfig, HardwareConfig, LEVELS_BINDING, PARAMETER_COUNT, PARAMETERS_BINDING,
    POTENTIAL_BINDING, VibwaAlgorithmConfig, WORK_BINDINGS,
};

pub use configurator::{AnyTaskConfigurator, TaskConfigurator, TaskSpec};

pub use control::{StopToken, SubmissionGate, TaskControl, TaskPhase};

pub use handle::TaskHandle;

pub use interface::ComputeDeviceInterface;

pub use potential::{
    MorsePotentialConfig, MorsePotentialGenerator, PotentialFileLoader, PotentialSource,
    parse_potential,
};

pub use precision::{PrecisionType, Scalar};
