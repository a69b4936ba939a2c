//! Command frames written to the COMMAND register.
//!
//! A frame is the opcode followed by up to seven parameter bytes, sent as a
//! single contiguous write starting at COMMAND. Frames are fully assembled in
//! memory before anything touches the bus.

use heapless::Vec;

/// Opcode plus the largest parameter block of any revision.
pub(crate) const MAX_FRAME_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandFrame {
    bytes: Vec<u8, MAX_FRAME_LEN>,
    overflow: bool,
}

impl CommandFrame {
    pub fn new(opcode: u8) -> Self {
        let mut bytes = Vec::new();
        // Capacity is non-zero, the first push cannot fail.
        let _ = bytes.push(opcode);
        Self { bytes, overflow: false }
    }

    pub fn param(mut self, value: u8) -> Self {
        if self.bytes.push(value).is_err() {
            self.overflow = true;
        }
        self
    }

    /// Append a 16-bit parameter, little-endian.
    pub fn param_u16(self, value: u16) -> Self {
        let [lo, hi] = value.to_le_bytes();
        self.param(lo).param(hi)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes the caller tried to put into the frame.
    ///
    /// Exceeds [`MAX_FRAME_LEN`] if parameters were dropped, so length checks
    /// against the register span still catch an oversized frame.
    pub fn requested_len(&self) -> usize {
        if self.overflow {
            MAX_FRAME_LEN + 1
        } else {
            self.bytes.len()
        }
    }

    /// Number of parameter bytes after the opcode.
    pub fn param_len(&self) -> usize {
        self.requested_len() - 1
    }
}

/// Pack one bit per channel, bit `i` set when `flags[i]` is true.
pub(crate) fn channel_mask(flags: &[bool]) -> u8 {
    flags
        .iter()
        .take(8)
        .enumerate()
        .fold(0u8, |mask, (i, &set)| if set { mask | (1 << i) } else { mask })
}

/// Unpack a channel bitmask into per-channel flags.
pub(crate) fn mask_to_flags(mask: u8) -> [bool; 8] {
    let mut flags = [false; 8];
    for (i, flag) in flags.iter_mut().enumerate() {
        *flag = mask & (1 << i) != 0;
    }
    flags
}
