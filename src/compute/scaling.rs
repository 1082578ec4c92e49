use std::fmt;

/// How a logical layout is spread over physical buffers for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalingPolicy {
    /// One buffer per batch element, bound as a descriptor array.
    BufferArray { batch_size: u32 },
    /// One buffer holding every batch element back to back.
    LargeBuffer { batch_size: u32 },
}

impl ScalingPolicy {
    pub fn batch_size(&self) -> u32 {
        match *self {
            Self::BufferArray { batch_size } | Self::LargeBuffer { batch_size } => batch_size,
        }
    }

    /// Size in bytes of every physical buffer for a layout of `logical_total_bytes`.
    pub fn allocation_total_size_bytes(&self, logical_total_bytes: u64) -> u64 {
        match *self {
            Self::BufferArray { .. } => logical_total_bytes,
            Self::LargeBuffer { batch_size } => logical_total_bytes * batch_size as u64,
        }
    }

    /// Number of physical buffers, also the descriptor count of the binding.
    pub fn allocation_buffer_count(&self) -> u32 {
        match *self {
            Self::BufferArray { batch_size } => batch_size,
            Self::LargeBuffer { .. } => 1,
        }
    }

    /// Batch elements stored in each physical buffer.
    pub fn slices_per_buffer(&self) -> u32 {
        match *self {
            Self::BufferArray { .. } => 1,
            Self::LargeBuffer { batch_size } => batch_size,
        }
    }

    /// Maps a batch element to (buffer index, byte offset inside that buffer).
    pub fn slice_location(&self, batch_index: u32, logical_total_bytes: u64) -> (u32, u64) {
        match *self {
            Self::BufferArray { .. } => (batch_index, 0),
            Self::LargeBuffer { .. } => (0, batch_index as u64 * logical_total_bytes),
        }
    }

    /// Preprocessor definitions a shader compiled for this policy expects.
    pub fn implied_macro_defs(&self) -> Vec<(&'static str, String)> {
        let mut defs = Vec::with_capacity(2);
        if let Self::BufferArray { .. } = self {
            defs.push(("SCALING_BUFFER_ARRAY", String::new()));
        }
        defs.push(("BATCH_SIZE", self.batch_size().to_string()));
        defs
    }
}

impl fmt::Display for ScalingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferArray { batch_size } => write!(f, "BufferArray(batch={batch_size})"),
            Self::LargeBuffer { batch_size } => write!(f, "LargeBuffer(batch={batch_size})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Layout, StaticLayout};

    #[test]
    fn concrete_scenario() {
        let layout = StaticLayout::<u32>::new(128, 0, 0);

        let large = ScalingPolicy::LargeBuffer { batch_size: 16 };
        assert_eq!(large.allocation_buffer_count(), 1);
        assert_eq!(large.allocation_total_size_bytes(layout.total_size_bytes()), 8192);

        let array = ScalingPolicy::BufferArray { batch_size: 16 };
        assert_eq!(array.allocation_buffer_count(), 16);
        assert_eq!(array.allocation_total_size_bytes(layout.total_size_bytes()), 512);
    }

    #[test]
    fn total_bytes_match_batch() {
        for _ in 0..256 {
            let batch_size = fastrand::u32(1..4096);
            let logical = fastrand::u64(1..1 << 20);

            let array = ScalingPolicy::BufferArray { batch_size };
            assert_eq!(array.allocation_buffer_count(), batch_size);
            assert_eq!(array.allocation_total_size_bytes(logical), logical);

            let large = ScalingPolicy::LargeBuffer { batch_size };
            assert_eq!(large.allocation_buffer_count(), 1);
            assert_eq!(large.allocation_total_size_bytes(logical), logical * batch_size as u64);

            for policy in [array, large] {
                let total = policy.allocation_buffer_count() as u64
                    * policy.allocation_total_size_bytes(logical);
                assert_eq!(total, logical * batch_size as u64);
                assert_eq!(
                    policy.allocation_buffer_count() * policy.slices_per_buffer(),
                    batch_size
                );
            }
        }
    }

    #[test]
    fn slice_locations() {
        let array = ScalingPolicy::BufferArray { batch_size: 4 };
        assert_eq!(array.slice_location(3, 64), (3, 0));

        let large = ScalingPolicy::LargeBuffer { batch_size: 4 };
        assert_eq!(large.slice_location(0, 64), (0, 0));
        assert_eq!(large.slice_location(3, 64), (0, 192));
    }

    #[test]
    fn macro_defs() {
        let array = ScalingPolicy::BufferArray { batch_size: 8 };
        assert_eq!(
            array.implied_macro_defs(),
            vec![
                ("SCALING_BUFFER_ARRAY", String::new()),
                ("BATCH_SIZE", "8".to_string())
            ]
        );

        let large = ScalingPolicy::LargeBuffer { batch_size: 2 };
        assert_eq!(large.implied_macro_defs(), vec![("BATCH_SIZE", "2".to_string())]);
    }
}
