use std::{fmt, marker::PhantomData};

/// Shape of one logical data block and the descriptor slot it binds to.
///
/// A layout describes a single batch element. The scaling policy decides how
/// many of these blocks end up in each physical buffer.
pub trait Layout {
    fn item_count(&self) -> u64;

    fn item_size(&self) -> u64;

    fn set(&self) -> u32;

    fn binding(&self) -> u32;

    fn total_size_bytes(&self) -> u64 {
        self.item_count() * self.item_size()
    }
}

/// A layout whose items can be viewed as a typed slice in mapped memory.
pub trait TypedLayout: Layout {
    type Item: bytemuck::Pod;
}

/// Layout with the item size taken from `T`.
pub struct StaticLayout<T> {
    item_count: u64,
    set: u32,
    binding: u32,
    _item: PhantomData<fn() -> T>,
}

impl<T: bytemuck::Pod> StaticLayout<T> {
    pub fn new(item_count: u64, set: u32, binding: u32) -> Self {
        Self {
            item_count,
            set,
            binding,
            _item: PhantomData,
        }
    }
}

impl<T> Clone for StaticLayout<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StaticLayout<T> {}

impl<T> fmt::Debug for StaticLayout<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticLayout")
            .field("item", &std::any::type_name::<T>())
            .field("item_count", &self.item_count)
            .field("set", &self.set)
            .field("binding", &self.binding)
            .finish()
    }
}

impl<T: bytemuck::Pod> Layout for StaticLayout<T> {
    fn item_count(&self) -> u64 {
        self.item_count
    }

    fn item_size(&self) -> u64 {
        size_of::<T>() as u64
    }

    fn set(&self) -> u32 {
        self.set
    }

    fn binding(&self) -> u32 {
        self.binding
    }
}

impl<T: bytemuck::Pod> TypedLayout for StaticLayout<T> {
    type Item = T;
}

/// Layout with an item size only known at run time. Views are raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicLayout {
    pub item_count: u64,
    pub item_size: u64,
    pub set: u32,
    pub binding: u32,
}

impl DynamicLayout {
    pub fn new(item_count: u64, item_size: u64, set: u32, binding: u32) -> Self {
        Self {
            item_count,
            item_size,
            set,
            binding,
        }
    }

    /// Dynamic layout sized for `item_count` values of `T`.
    pub fn of<T: bytemuck::Pod>(item_count: u64, set: u32, binding: u32) -> Self {
        Self::new(item_count, size_of::<T>() as u64, set, binding)
    }
}

impl Layout for DynamicLayout {
    fn item_count(&self) -> u64 {
        self.item_count
    }

    fn item_size(&self) -> u64 {
        self.item_size
    }

    fn set(&self) -> u32 {
        self.set
    }

    fn binding(&self) -> u32 {
        self.binding
    }
}

impl TypedLayout for DynamicLayout {
    type Item = u8;
}

impl fmt::Display for dyn Layout + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "set={} binding={} ({} x {} bytes)",
            self.set(),
            self.binding(),
            self.item_count(),
            self.item_size()
        )
    }
}
