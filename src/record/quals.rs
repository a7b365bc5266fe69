use std::fmt;

use super::RecordHandle;
use crate::error::{FieldError, Result};

/// View of the per-base qualities stored in a record, one byte per base
#[derive(Debug, Clone)]
pub struct BaseQuals {
    record: RecordHandle,
    offset: usize,
    num_quals: usize,
}
impl BaseQuals {
    pub(crate) fn new(record: RecordHandle) -> Self {
        let (offset, num_quals) = record.with(|r| (r.quals_offset(), r.core.l_seq as usize));
        Self {
            record,
            offset,
            num_quals,
        }
    }

    pub fn len(&self) -> usize {
        self.num_quals
    }

    pub fn is_empty(&self) -> bool {
        self.num_quals == 0
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.num_quals {
            return Err(FieldError::IndexOutOfRange {
                index,
                size: self.num_quals,
            }
            .into());
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<u8> {
        self.check_index(index)?;
        Ok(self.record.with(|r| r.data[self.offset + index]))
    }

    pub fn set(&mut self, index: usize, qual: u8) -> Result<()> {
        self.check_index(index)?;
        let pos = self.offset + index;
        self.record.with_mut(|r| r.data[pos] = qual);
        Ok(())
    }

    /// Copies the qualities out of the record
    pub fn to_vec(&self) -> Vec<u8> {
        self.record
            .with(|r| r.data[self.offset..self.offset + self.num_quals].to_vec())
    }
}
impl PartialEq for BaseQuals {
    fn eq(&self, other: &Self) -> bool {
        self.to_vec() == other.to_vec()
    }
}
/// Space separated numeric qualities, e.g. `30 30 12`
impl fmt::Display for BaseQuals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut itoa_buf = itoa::Buffer::new();
        for (idx, qual) in self.to_vec().into_iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            f.write_str(itoa_buf.format(qual))?;
        }
        Ok(())
    }
}
