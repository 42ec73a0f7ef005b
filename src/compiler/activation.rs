// Activation record layout
//
// +--------------------+ <- CF (frame base)
// | RV   return value  |  0
// | RA   return addr   |  4
// | PSP  saved SP      |  8
// | PCF  saved CF      | 12
// +--------------------+
// | parameters         | 16, 20, ...  (declaration order)
// | locals, temps      |
// +--------------------+ <- SP after the prologue
//
// Offsets are relative to the frame base; the frame pointer is only added
// when an operand is resolved.

use crate::compiler::config::WORD_SIZE;
use crate::compiler::error::CompilerError;

pub const RV_OFFSET: u32 = 0;
pub const RA_OFFSET: u32 = 4;
pub const PSP_OFFSET: u32 = 8;
pub const PCF_OFFSET: u32 = 12;
pub const HEADER_SIZE: u32 = 16;

/// Highest end address any allocation may reach; operands carry addresses as `i32`
pub const ADDRESS_LIMIT: u32 = i32::MAX as u32;

/// Declared variables and arrays must end below this, which leaves the rest of
/// the address range to temporaries
pub const DECLARED_LIMIT: u32 = 1 << 30;

/// End address of `words` words placed at `start`, if it stays within `limit`
pub fn segment_end(start: u32, words: u32, limit: u32) -> Option<u32> {
    words
        .checked_mul(WORD_SIZE)
        .and_then(|bytes| start.checked_add(bytes))
        .filter(|end| *end <= limit)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRecord {
    next_offset: u32,
    finalized: bool,
}

impl Default for ActivationRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationRecord {
    pub fn new() -> Self {
        ActivationRecord {
            next_offset: HEADER_SIZE,
            finalized: false,
        }
    }

    /// Bump-allocate `words` words and return the offset of the first one
    pub fn allocate(&mut self, words: u32) -> Result<u32, CompilerError> {
        if self.finalized {
            return Err(CompilerError::internal(
                "allocation in an activation record that is already finalized",
            ));
        }
        let offset = self.next_offset;
        self.next_offset = segment_end(offset, words, ADDRESS_LIMIT).ok_or_else(|| {
            CompilerError::internal("activation record exceeds the address range")
        })?;
        Ok(offset)
    }

    /// Whether a declaration of `words` words still fits in this record
    pub fn fits(&self, words: u32) -> bool {
        segment_end(self.next_offset, words, DECLARED_LIMIT).is_some()
    }

    /// Bytes allocated past the header
    pub fn frame_size(&self) -> u32 {
        self.next_offset - HEADER_SIZE
    }

    /// Total bytes including the header
    pub fn len(&self) -> u32 {
        self.next_offset
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Freeze the layout; the frame size is final from here on.
    pub fn finalize(&mut self) -> Result<(), CompilerError> {
        if self.finalized {
            return Err(CompilerError::internal("activation record finalized twice"));
        }
        self.finalized = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_allocation_starts_after_header() {
        let mut record = ActivationRecord::new();
        assert_eq!(record.allocate(1).unwrap(), 16);
        assert_eq!(record.allocate(1).unwrap(), 20);
        assert_eq!(record.allocate(10).unwrap(), 24);
        assert_eq!(record.allocate(1).unwrap(), 64);
        assert_eq!(record.frame_size(), 52);
        assert_eq!(record.len(), 68);
    }

    #[test]
    fn test_empty_frame() {
        let record = ActivationRecord::new();
        assert_eq!(record.frame_size(), 0);
        assert_eq!(record.len(), HEADER_SIZE);
    }

    #[test]
    fn test_oversized_allocation_is_an_error() {
        let mut record = ActivationRecord::new();
        assert!(!record.fits(2_000_000_000));
        assert!(record.fits(1000));
        assert!(record.allocate(u32::MAX).is_err());
        // A failed allocation leaves the layout untouched
        assert_eq!(record.len(), HEADER_SIZE);
    }

    #[test]
    fn test_finalize_twice_is_fatal() {
        let mut record = ActivationRecord::new();
        record.allocate(2).unwrap();
        record.finalize().unwrap();
        assert!(record.finalize().is_err());
        assert!(record.allocate(1).is_err());
        assert_eq!(record.frame_size(), 8);
    }
}
