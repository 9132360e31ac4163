//! Bounds-checked views over raw counter reports
//!
//! Reports are fixed-stride byte buffers. Multi-byte fields are little-endian
//! and may sit at any byte offset, so every read copies through a fixed-size
//! array instead of reinterpreting pointers.

use crate::error::{CalcError, Result};

// ============================================================================
// Single Report
// ============================================================================

/// Read-only view of one raw report
#[derive(Debug, Clone, Copy)]
pub struct ReportView<'a> {
    bytes: &'a [u8],
}

impl<'a> ReportView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    fn field<const N: usize>(&self, offset: u32) -> Result<[u8; N]> {
        let start = offset as usize;
        let range_err = || CalcError::ReportRange {
            offset: start,
            width: N,
            len: self.bytes.len(),
        };
        let end = start.checked_add(N).ok_or_else(range_err)?;
        let slice = self.bytes.get(start..end).ok_or_else(range_err)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn read_u8(&self, offset: u32) -> Result<u8> {
        self.field::<1>(offset).map(|b| b[0])
    }

    pub fn read_u16(&self, offset: u32) -> Result<u16> {
        self.field::<2>(offset).map(u16::from_le_bytes)
    }

    pub fn read_u32(&self, offset: u32) -> Result<u32> {
        self.field::<4>(offset).map(u32::from_le_bytes)
    }

    pub fn read_u64(&self, offset: u32) -> Result<u64> {
        self.field::<8>(offset).map(u64::from_le_bytes)
    }

    pub fn read_f32(&self, offset: u32) -> Result<f32> {
        self.field::<4>(offset).map(f32::from_le_bytes)
    }

    /// Read a 40-bit counter split into a 32-bit low part and one extension byte
    pub fn read_u40(&self, offset: u32, ext_offset: u32) -> Result<u64> {
        let low = self.read_u32(offset)?;
        let high = self.read_u8(ext_offset)?;
        Ok(u64::from(low) | (u64::from(high) << 32))
    }

    /// Extract `bit_count` bits starting at `bit_offset` of the 32-bit word at `offset`
    ///
    /// The field must fit inside that single word.
    pub fn read_bitfield(&self, offset: u32, bit_offset: u32, bit_count: u32) -> Result<u64> {
        validate_bitfield(bit_offset, bit_count)?;
        let word = self.read_u32(offset)?;
        Ok(u64::from(extract_bits_u32(word, bit_offset, bit_count)))
    }
}

/// Check that a bitfield stays inside one 32-bit word
pub fn validate_bitfield(bit_offset: u32, bit_count: u32) -> Result<()> {
    let fits = bit_offset
        .checked_add(bit_count)
        .is_some_and(|end| end <= 32);
    if bit_count == 0 || !fits {
        return Err(CalcError::InvalidBitfield {
            bit_offset,
            bit_count,
        });
    }
    Ok(())
}

/// Extract a bit range from a word (LSB-first)
#[inline]
pub fn extract_bits_u32(word: u32, bit_offset: u32, bit_count: u32) -> u32 {
    debug_assert!(bit_count > 0 && bit_offset + bit_count <= 32);
    let mask = if bit_count == 32 {
        u32::MAX
    } else {
        (1u32 << bit_count) - 1
    };
    (word >> bit_offset) & mask
}

// ============================================================================
// Report Batch
// ============================================================================

/// A buffer of `count` consecutive reports of `stride` bytes each
#[derive(Debug, Clone, Copy)]
pub struct ReportBatch<'a> {
    data: &'a [u8],
    stride: usize,
    count: usize,
}

impl<'a> ReportBatch<'a> {
    pub fn new(data: &'a [u8], stride: usize, count: usize) -> Result<Self> {
        if stride == 0 {
            return Err(CalcError::invalid_parameter("report stride must be non-zero"));
        }
        let needed = stride
            .checked_mul(count)
            .ok_or_else(|| CalcError::invalid_parameter("report batch size overflows"))?;
        if needed > data.len() {
            return Err(CalcError::SizeMismatch {
                expected: needed,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            stride,
            count,
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes of the report at `index`
    pub fn report(&self, index: usize) -> Result<&'a [u8]> {
        if index >= self.count {
            return Err(CalcError::invalid_parameter(format!(
                "report index {} out of range ({} reports)",
                index, self.count
            )));
        }
        let data = self.data;
        let start = index * self.stride;
        Ok(&data[start..start + self.stride])
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let data = self.data;
        let stride = self.stride;
        data[..stride * self.count].chunks_exact(stride)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_reads() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        let view = ReportView::new(&bytes);
        assert_eq!(view.read_u8(0).unwrap(), 0x01);
        assert_eq!(view.read_u16(1).unwrap(), 0x0302);
        assert_eq!(view.read_u32(0).unwrap(), 0x0403_0201);
        assert_eq!(view.read_u64(1).unwrap(), 0x0908_0706_0504_0302);
    }

    #[test]
    fn test_read_past_end_is_range_error() {
        let bytes = [0u8; 6];
        let view = ReportView::new(&bytes);
        assert_eq!(
            view.read_u32(4),
            Err(CalcError::ReportRange {
                offset: 4,
                width: 4,
                len: 6
            })
        );
        assert!(view.read_u8(u32::MAX).is_err());
    }

    #[test]
    fn test_read_u40_combines_extension_byte() {
        let mut bytes = [0u8; 8];
        bytes[0..4].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        bytes[6] = 0x7a;
        let view = ReportView::new(&bytes);
        assert_eq!(view.read_u40(0, 6).unwrap(), 0x7a_dead_beef);
    }

    #[test]
    fn test_bitfield_extraction() {
        let bytes = 0b1111_1111_0000_0000_0000_0000_1011_0000u32.to_le_bytes();
        let view = ReportView::new(&bytes);
        assert_eq!(view.read_bitfield(0, 4, 3).unwrap(), 0b011);
        assert_eq!(view.read_bitfield(0, 24, 8).unwrap(), 0xff);
        assert_eq!(view.read_bitfield(0, 0, 32).unwrap(), 0xff00_00b0);
    }

    #[test]
    fn test_bitfield_must_fit_single_word() {
        let bytes = [0u8; 8];
        let view = ReportView::new(&bytes);
        assert!(matches!(
            view.read_bitfield(0, 30, 4),
            Err(CalcError::InvalidBitfield { .. })
        ));
        assert!(view.read_bitfield(0, 0, 0).is_err());
        assert!(view.read_bitfield(0, 0, 33).is_err());
    }

    #[test]
    fn test_batch_slices_reports() {
        let data: Vec<u8> = (0..12).collect();
        let batch = ReportBatch::new(&data, 4, 3).unwrap();
        assert_eq!(batch.report(1).unwrap(), &[4, 5, 6, 7]);
        assert_eq!(batch.iter().count(), 3);
        assert!(batch.report(3).is_err());
    }

    #[test]
    fn test_batch_rejects_short_buffer() {
        let data = [0u8; 10];
        assert!(matches!(
            ReportBatch::new(&data, 4, 3),
            Err(CalcError::SizeMismatch {
                expected: 12,
                actual: 10
            })
        ));
        assert!(ReportBatch::new(&data, 0, 1).is_err());
    }
}
