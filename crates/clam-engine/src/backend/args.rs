use super::DeviceError;

/// A scalar kernel argument. Every variant occupies one 32-bit word.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ArgValue {
    U32(u32),
    I32(i32),
    F32(f32),
}

impl ArgValue {
    /// Raw word as seen by the kernel (`f32` is bit-cast).
    pub fn to_word(self) -> u32 {
        match self {
            Self::U32(v) => v,
            Self::I32(v) => v as u32,
            Self::F32(v) => v.to_bits(),
        }
    }
}

impl From<u32> for ArgValue {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<f32> for ArgValue {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

/// Positional kernel arguments for one launch.
///
/// Slot 0 is the output buffer and is bound by the dispatch coordinator
/// itself; this block holds slots 1 and up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelArgs {
    // slots[i] is argument i + 1
    slots: Vec<Option<ArgValue>>,
}

impl KernelArgs {
    /// Index of the output buffer argument.
    pub const BUFFER_SLOT: u32 = 0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `value` to argument `index`, replacing any previous value.
    pub fn set(&mut self, index: u32, value: impl Into<ArgValue>) {
        if index == Self::BUFFER_SLOT {
            log::warn!("kernel argument 0 is reserved for the output buffer; ignored");
            return;
        }
        let slot = index as usize - 1;
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, None);
        }
        self.slots[slot] = Some(value.into());
    }

    pub fn get(&self, index: u32) -> Option<ArgValue> {
        if index == Self::BUFFER_SLOT {
            return None;
        }
        self.slots.get(index as usize - 1).copied().flatten()
    }

    /// Argument count including the buffer slot.
    pub fn len(&self) -> u32 {
        self.slots.len() as u32 + 1
    }

    /// Argument words for slots `1..len()`.
    ///
    /// Every slot up to the highest bound one must be set.
    pub fn words(&self) -> Result<Vec<u32>, DeviceError> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.map(ArgValue::to_word)
                    .ok_or(DeviceError::UnsetArgument(i as u32 + 1))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_follow_slot_order() {
        let mut args = KernelArgs::new();
        args.set(2, 7u32);
        args.set(1, -1i32);
        args.set(3, 1.5f32);
        assert_eq!(args.len(), 4);
        assert_eq!(args.words().unwrap(), vec![u32::MAX, 7, 1.5f32.to_bits()]);
    }

    #[test]
    fn gap_is_reported() {
        let mut args = KernelArgs::new();
        args.set(1, 1u32);
        args.set(3, 3u32);
        assert_eq!(args.words(), Err(DeviceError::UnsetArgument(2)));
    }

    #[test]
    fn buffer_slot_is_reserved() {
        let mut args = KernelArgs::new();
        args.set(0, 5u32);
        assert_eq!(args.len(), 1);
        assert_eq!(args.get(0), None);
        assert!(args.words().unwrap().is_empty());
    }

    #[test]
    fn set_overwrites() {
        let mut args = KernelArgs::new();
        args.set(1, 1u32);
        args.set(1, 2u32);
        assert_eq!(args.get(1), Some(ArgValue::U32(2)));
    }
}
