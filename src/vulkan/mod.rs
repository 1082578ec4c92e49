mod context;
mod debug;
mod device;
mod device_context;
mod instance;
mod physical;

pub use context::{Device, DeviceOptions};

pub use device_context::DeviceContext;

pub use instance::version_to_string;

pub use physical::DeviceCapabilities;
