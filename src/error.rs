use std::path::PathBuf;

use thiserror::Error;

/// Rejections raised before any GPU object is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("TaskConfigurator wasn't fully configured before submitting for execution.")]
    NotConfigured,
    #[error("Invalid PrecisionType literal in string: \"{0}\"")]
    InvalidPrecision(String),
    #[error("binding (set {set}, binding {binding}) is declared more than once")]
    DuplicateBinding { set: u32, binding: u32 },
    #[error("layout at (set {set}, binding {binding}) has zero size")]
    EmptyLayout { set: u32, binding: u32 },
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("invalid level range: min level {min} is above max level {max}")]
    InvalidLevelRange { min: u32, max: u32 },
    #[error("{provided} potential curves provided but group size is {group_size}")]
    TooManyPotentials { provided: usize, group_size: u32 },
    #[error("potential curve #{index} has {len} points, buffer holds {capacity}")]
    PotentialTooLong {
        index: usize,
        len: usize,
        capacity: u64,
    },
    #[error("{}:{line}: invalid potential value {token:?}", path.display())]
    InvalidPotentialValue {
        path: PathBuf,
        line: usize,
        token: String,
    },
    #[error("no compiled shader supplied")]
    MissingShader,
}

/// Failures detected while creating a [`Device`](crate::vulkan::Device).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("failed to load the Vulkan loader: {0}")]
    LoaderUnavailable(String),
    #[error(
        "Insufficient Vulkan version {found} (Vulkan 1.2 required) try updating your drivers or SDK."
    )]
    InsufficientVersion { found: String },
    #[error("No devices available.")]
    NoDevices,
    #[error("Device with ID {0} not found")]
    DeviceNotFound(u32),
    #[error("device has no queue family supporting both compute and transfer")]
    NoComputeQueue,
}

/// Lifecycle misuse of resources, shaders and task handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("resources were already prepared")]
    AlreadyPrepared,
    #[error("buffer is not bound to a scaling policy")]
    NotBound,
    #[error("buffers are already allocated")]
    AlreadyAllocated,
    #[error("buffers are not allocated")]
    NotAllocated,
    #[error("shader must be prepared before it can run")]
    NotPrepared,
    #[error("task result was already consumed")]
    ResultConsumed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_reported_text() {
        assert_eq!(
            ConfigError::InvalidPrecision("float16".into()).to_string(),
            "Invalid PrecisionType literal in string: \"float16\""
        );
        assert_eq!(
            DeviceError::DeviceNotFound(7).to_string(),
            "Device with ID 7 not found"
        );
        assert_eq!(DeviceError::NoDevices.to_string(), "No devices available.");
    }

    #[test]
    fn errors_survive_anyhow_roundtrip() {
        let err: anyhow::Error = ConfigError::NotConfigured.into();
        let err = err.context("failed to submit task");
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::NotConfigured)
        );
    }
}
