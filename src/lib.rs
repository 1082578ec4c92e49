pub mod compute;
pub mod error;
pub mod task;
pub mod vulkan;
