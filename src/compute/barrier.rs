use std::fmt;

use ash::vk;

/// A point in the pipeline plus the memory access performed there.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

impl MemoryState {
    pub const HOST_WRITE: MemoryState = MemoryState {
        stage: vk::PipelineStageFlags2::HOST,
        access: vk::AccessFlags2::HOST_WRITE,
    };

    pub const TRANSFER_READ: MemoryState = MemoryState {
        stage: vk::PipelineStageFlags2::TRANSFER,
        access: vk::AccessFlags2::TRANSFER_READ,
    };

    pub const TRANSFER_WRITE: MemoryState = MemoryState {
        stage: vk::PipelineStageFlags2::TRANSFER,
        access: vk::AccessFlags2::TRANSFER_WRITE,
    };

    pub const SHADER_READ: MemoryState = MemoryState {
        stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
        access: vk::AccessFlags2::SHADER_READ,
    };

    pub const SHADER_WRITE: MemoryState = MemoryState {
        stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
        access: vk::AccessFlags2::SHADER_WRITE,
    };

    pub const HOST_READ: MemoryState = MemoryState {
        stage: vk::PipelineStageFlags2::HOST,
        access: vk::AccessFlags2::HOST_READ,
    };

    /// Legacy stage mask. Every state above only uses bits shared by both flag sets.
    fn stage_v1(&self) -> vk::PipelineStageFlags {
        vk::PipelineStageFlags::from_raw(self.stage.as_raw() as u32)
    }

    fn access_v1(&self) -> vk::AccessFlags {
        vk::AccessFlags::from_raw(self.access.as_raw() as u32)
    }
}

impl fmt::Display for MemoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", stage_str(self.stage), access_str(self.access))
    }
}

/// The memory dependencies recorded around one dispatch, in order.
pub const TRANSFER_IN: [(MemoryState, MemoryState); 2] = [
    (MemoryState::HOST_WRITE, MemoryState::TRANSFER_READ),
    (MemoryState::TRANSFER_WRITE, MemoryState::SHADER_READ),
];

pub const TRANSFER_OUT: [(MemoryState, MemoryState); 2] = [
    (MemoryState::SHADER_WRITE, MemoryState::TRANSFER_READ),
    (MemoryState::TRANSFER_WRITE, MemoryState::HOST_READ),
];

/// Global memory barrier between `src` and `dst`.
pub fn memory_barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: MemoryState,
    dst: MemoryState,
    synchronization2: bool,
) {
    log_memory_transition(src, dst);
    if synchronization2 {
        let barrier = vk::MemoryBarrier2::default()
            .src_stage_mask(src.stage)
            .src_access_mask(src.access)
            .dst_stage_mask(dst.stage)
            .dst_access_mask(dst.access);
        let dep_info = vk::DependencyInfo::default().memory_barriers(std::slice::from_ref(&barrier));
        unsafe {
            device.cmd_pipeline_barrier2(cmd, &dep_info);
        }
    } else {
        let barrier = vk::MemoryBarrier::default()
            .src_access_mask(src.access_v1())
            .dst_access_mask(dst.access_v1());
        unsafe {
            device.cmd_pipeline_barrier(
                cmd,
                src.stage_v1(),
                dst.stage_v1(),
                vk::DependencyFlags::empty(),
                std::slice::from_ref(&barrier),
                &[],
                &[],
            );
        }
    }
}

pub fn log_memory_transition(src: MemoryState, dst: MemoryState) {
    log::trace!(
        "memory barrier\n     stage:  {} -> {}\n     access: {} -> {}",
        stage_str(src.stage),
        stage_str(dst.stage),
        access_str(src.access),
        access_str(dst.access)
    );
}

fn stage_str(stage: vk::PipelineStageFlags2) -> String {
    let mut stages = Vec::new();
    if stage.contains(vk::PipelineStageFlags2::HOST) {
        stages.push("HOST");
    }
    if stage.contains(vk::PipelineStageFlags2::TRANSFER) {
        stages.push("TRANSFER");
    }
    if stage.contains(vk::PipelineStageFlags2::COMPUTE_SHADER) {
        stages.push("COMPUTE_SHADER");
    }
    if stage.contains(vk::PipelineStageFlags2::ALL_COMMANDS) {
        stages.push("ALL_COMMANDS");
    }
    if stages.is_empty() {
        stages.push("NONE");
    }
    stages.join(" | ")
}

fn access_str(access: vk::AccessFlags2) -> String {
    let mut access_flags = Vec::new();
    if access.contains(vk::AccessFlags2::HOST_WRITE) {
        access_flags.push("HOST_WRITE");
    }
    if access.contains(vk::AccessFlags2::HOST_READ) {
        access_flags.push("HOST_READ");
    }
    if access.contains(vk::AccessFlags2::TRANSFER_READ) {
        access_flags.push("TRANSFER_READ");
    }
    if access.contains(vk::AccessFlags2::TRANSFER_WRITE) {
        access_flags.push("TRANSFER_WRITE");
    }
    if access.contains(vk::AccessFlags2::SHADER_READ) {
        access_flags.push("SHADER_READ");
    }
    if access.contains(vk::AccessFlags2::SHADER_WRITE) {
        access_flags.push("SHADER_WRITE");
    }
    if access_flags.is_empty() {
        access_flags.push("NONE");
    }
    access_flags.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_masks_match() {
        assert_eq!(MemoryState::HOST_WRITE.stage_v1(), vk::PipelineStageFlags::HOST);
        assert_eq!(MemoryState::HOST_WRITE.access_v1(), vk::AccessFlags::HOST_WRITE);
        assert_eq!(
            MemoryState::SHADER_READ.stage_v1(),
            vk::PipelineStageFlags::COMPUTE_SHADER
        );
        assert_eq!(MemoryState::SHADER_WRITE.access_v1(), vk::AccessFlags::SHADER_WRITE);
        assert_eq!(MemoryState::TRANSFER_READ.access_v1(), vk::AccessFlags::TRANSFER_READ);
        assert_eq!(MemoryState::HOST_READ.access_v1(), vk::AccessFlags::HOST_READ);
    }

    #[test]
    fn sequence_chains_through_transfer_and_compute() {
        assert_eq!(TRANSFER_IN[0].1, MemoryState::TRANSFER_READ);
        assert_eq!(TRANSFER_IN[1].0.stage, TRANSFER_IN[0].1.stage);
        assert_eq!(TRANSFER_OUT[0].0, MemoryState::SHADER_WRITE);
        assert_eq!(TRANSFER_OUT[1].1, MemoryState::HOST_READ);
    }

    #[test]
    fn display() {
        assert_eq!(
            MemoryState::TRANSFER_WRITE.to_string(),
            "TRANSFER / TRANSFER_WRITE"
        );
    }
}
