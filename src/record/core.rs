use byteorder::{ByteOrder, LittleEndian};
use std::io::Write;

use crate::error::{DecodeError, Result, ValidationError};

/// Size of the fixed record core in bytes
pub const SIZE_CORE: usize = 32;

pub const FLAG_PAIRED: u16 = 0x1;
pub const FLAG_PROPER_PAIR: u16 = 0x2;
pub const FLAG_UNMAPPED: u16 = 0x4;
pub const FLAG_MATE_UNMAPPED: u16 = 0x8;
pub const FLAG_REVERSE: u16 = 0x10;
pub const FLAG_MATE_REVERSE: u16 = 0x20;
pub const FLAG_FIRST: u16 = 0x40;
pub const FLAG_LAST: u16 = 0x80;
pub const FLAG_SECONDARY: u16 = 0x100;
pub const FLAG_FAIL: u16 = 0x200;
pub const FLAG_DUPLICATE: u16 = 0x400;
pub const FLAG_SUPPLEMENTARY: u16 = 0x800;

/// Fixed-size portion of an alignment record
///
/// Positions are stored 0-based, as they appear on the wire. The byte lengths of the variable
/// sections that follow the core are derived from `l_read_name`, `n_cigar` and `l_seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamCore {
    /// Reference sequence index, `-1` when unplaced
    ///
    /// 4 bytes
    pub tid: i32,

    /// 0-based leftmost position, `-1` when unplaced
    ///
    /// 4 bytes
    pub pos: i32,

    /// Length of the read name including its null terminator
    ///
    /// 1 byte
    pub l_read_name: u8,

    /// Mapping quality
    ///
    /// 1 byte
    pub mapq: u8,

    /// Spatial index bin
    ///
    /// 2 bytes
    pub bin: u16,

    /// Number of cigar operations
    ///
    /// 2 bytes
    pub n_cigar: u16,

    /// Bitwise SAM flags
    ///
    /// 2 bytes
    pub flag: u16,

    /// Number of bases
    ///
    /// 4 bytes
    pub l_seq: u32,

    /// Reference index of the mate
    ///
    /// 4 bytes
    pub mate_tid: i32,

    /// 0-based leftmost position of the mate
    ///
    /// 4 bytes
    pub mate_pos: i32,

    /// Observed template length
    ///
    /// 4 bytes
    pub insert_size: i32,
}
impl Default for SamCore {
    fn default() -> Self {
        Self {
            tid: -1,
            pos: -1,
            l_read_name: 0,
            mapq: 0,
            bin: 0,
            n_cigar: 0,
            flag: 0,
            l_seq: 0,
            mate_tid: -1,
            mate_pos: -1,
            insert_size: 0,
        }
    }
}
impl SamCore {
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < SIZE_CORE {
            return Err(DecodeError::UnexpectedEndOfRecord {
                needed: SIZE_CORE,
                available: buffer.len(),
            }
            .into());
        }
        Ok(Self {
            tid: LittleEndian::read_i32(&buffer[0..4]),
            pos: LittleEndian::read_i32(&buffer[4..8]),
            l_read_name: buffer[8],
            mapq: buffer[9],
            bin: LittleEndian::read_u16(&buffer[10..12]),
            n_cigar: LittleEndian::read_u16(&buffer[12..14]),
            flag: LittleEndian::read_u16(&buffer[14..16]),
            l_seq: LittleEndian::read_u32(&buffer[16..20]),
            mate_tid: LittleEndian::read_i32(&buffer[20..24]),
            mate_pos: LittleEndian::read_i32(&buffer[24..28]),
            insert_size: LittleEndian::read_i32(&buffer[28..32]),
        })
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buffer = [0u8; SIZE_CORE];
        LittleEndian::write_i32(&mut buffer[0..4], self.tid);
        LittleEndian::write_i32(&mut buffer[4..8], self.pos);
        buffer[8] = self.l_read_name;
        buffer[9] = self.mapq;
        LittleEndian::write_u16(&mut buffer[10..12], self.bin);
        LittleEndian::write_u16(&mut buffer[12..14], self.n_cigar);
        LittleEndian::write_u16(&mut buffer[14..16], self.flag);
        LittleEndian::write_u32(&mut buffer[16..20], self.l_seq);
        LittleEndian::write_i32(&mut buffer[20..24], self.mate_tid);
        LittleEndian::write_i32(&mut buffer[24..28], self.mate_pos);
        LittleEndian::write_i32(&mut buffer[28..32], self.insert_size);
        writer.write_all(&buffer)?;
        Ok(())
    }
}

/// Getters and setters for the bitwise SAM flags
///
/// Implementors only provide access to the raw flag word.
pub trait SamFlags {
    fn flag(&self) -> u16;
    fn set_flag(&mut self, flag: u16);

    #[inline]
    fn has_flag(&self, mask: u16) -> bool {
        self.flag() & mask != 0
    }
    #[inline]
    fn toggle_flag(&mut self, mask: u16, on: bool) {
        let flag = if on {
            self.flag() | mask
        } else {
            self.flag() & !mask
        };
        self.set_flag(flag);
    }

    fn paired(&self) -> bool {
        self.has_flag(FLAG_PAIRED)
    }
    fn properly_paired(&self) -> bool {
        self.has_flag(FLAG_PROPER_PAIR)
    }
    fn unmapped(&self) -> bool {
        self.has_flag(FLAG_UNMAPPED)
    }
    fn mate_unmapped(&self) -> bool {
        self.has_flag(FLAG_MATE_UNMAPPED)
    }
    fn reverse(&self) -> bool {
        self.has_flag(FLAG_REVERSE)
    }
    fn mate_reverse(&self) -> bool {
        self.has_flag(FLAG_MATE_REVERSE)
    }
    fn first(&self) -> bool {
        self.has_flag(FLAG_FIRST)
    }
    fn last(&self) -> bool {
        self.has_flag(FLAG_LAST)
    }
    fn secondary(&self) -> bool {
        self.has_flag(FLAG_SECONDARY)
    }
    fn fail(&self) -> bool {
        self.has_flag(FLAG_FAIL)
    }
    fn duplicate(&self) -> bool {
        self.has_flag(FLAG_DUPLICATE)
    }
    fn supplementary(&self) -> bool {
        self.has_flag(FLAG_SUPPLEMENTARY)
    }

    fn set_paired(&mut self) {
        self.toggle_flag(FLAG_PAIRED, true);
    }
    fn set_not_paired(&mut self) {
        self.toggle_flag(FLAG_PAIRED, false);
    }
    fn set_properly_paired(&mut self) {
        self.toggle_flag(FLAG_PROPER_PAIR, true);
    }
    fn set_not_properly_paired(&mut self) {
        self.toggle_flag(FLAG_PROPER_PAIR, false);
    }
    fn set_unmapped(&mut self) {
        self.toggle_flag(FLAG_UNMAPPED, true);
    }
    fn set_not_unmapped(&mut self) {
        self.toggle_flag(FLAG_UNMAPPED, false);
    }
    fn set_mate_unmapped(&mut self) {
        self.toggle_flag(FLAG_MATE_UNMAPPED, true);
    }
    fn set_not_mate_unmapped(&mut self) {
        self.toggle_flag(FLAG_MATE_UNMAPPED, false);
    }
    fn set_reverse(&mut self) {
        self.toggle_flag(FLAG_REVERSE, true);
    }
    fn set_not_reverse(&mut self) {
        self.toggle_flag(FLAG_REVERSE, false);
    }
    fn set_mate_reverse(&mut self) {
        self.toggle_flag(FLAG_MATE_REVERSE, true);
    }
    fn set_not_mate_reverse(&mut self) {
        self.toggle_flag(FLAG_MATE_REVERSE, false);
    }
    fn set_first(&mut self) {
        self.toggle_flag(FLAG_FIRST, true);
    }
    fn set_not_first(&mut self) {
        self.toggle_flag(FLAG_FIRST, false);
    }
    fn set_last(&mut self) {
        self.toggle_flag(FLAG_LAST, true);
    }
    fn set_not_last(&mut self) {
        self.toggle_flag(FLAG_LAST, false);
    }
    fn set_secondary(&mut self) {
        self.toggle_flag(FLAG_SECONDARY, true);
    }
    fn set_not_secondary(&mut self) {
        self.toggle_flag(FLAG_SECONDARY, false);
    }
    fn set_fail(&mut self) {
        self.toggle_flag(FLAG_FAIL, true);
    }
    fn set_not_fail(&mut self) {
        self.toggle_flag(FLAG_FAIL, false);
    }
    fn set_duplicate(&mut self) {
        self.toggle_flag(FLAG_DUPLICATE, true);
    }
    fn set_not_duplicate(&mut self) {
        self.toggle_flag(FLAG_DUPLICATE, false);
    }
    fn set_supplementary(&mut self) {
        self.toggle_flag(FLAG_SUPPLEMENTARY, true);
    }
    fn set_not_supplementary(&mut self) {
        self.toggle_flag(FLAG_SUPPLEMENTARY, false);
    }
}

impl SamFlags for SamCore {
    fn flag(&self) -> u16 {
        self.flag
    }
    fn set_flag(&mut self, flag: u16) {
        self.flag = flag;
    }
}

/// Computes the spatial index bin of a 0-based, half-open interval
///
/// `min_shift` is the width of the smallest bin in bits and `n_lvls` the depth of the binning
/// scheme; alignment records use `(14, 5)`.
/// Converts a 1-based position into the 0-based core field, where `0` becomes `-1`
///
/// # Errors
///
/// Returns [`ValidationError::PositionOutOfRange`] if the position exceeds `i32::MAX`.
pub(crate) fn zero_based_position(start: u32) -> Result<i32> {
    i32::try_from(start)
        .map(|pos| pos - 1)
        .map_err(|_| ValidationError::PositionOutOfRange(start).into())
}

/// Converts a 0-based core position back to 1-based, clamping below at `0`
pub(crate) fn one_based_position(pos: i32) -> u32 {
    u32::try_from(pos.saturating_add(1)).unwrap_or(0)
}

pub fn reg2bin(beg: i64, end: i64, min_shift: u32, n_lvls: u32) -> u32 {
    let end = end - 1;
    let mut shift = min_shift;
    let mut t = ((1i64 << (n_lvls * 3)) - 1) / 7;
    let mut level = n_lvls;
    while level > 0 {
        if beg >> shift == end >> shift {
            return (t + (beg >> shift)) as u32;
        }
        level -= 1;
        shift += 3;
        t -= 1 << (level * 3);
    }
    0
}
