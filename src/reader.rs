use byteorder::{ByteOrder, LittleEndian};
use std::{
    io::{ErrorKind, Read},
    rc::Rc,
};

use crate::{
    error::{ReadError, Result},
    header::SamHeader,
    record::{RawRecord, Sam, SIZE_CORE},
};

/// Sequential reader over an uncompressed alignment record stream
///
/// The header is read at construction; every record then comes framed by its `u32` block size.
#[derive(Debug)]
pub struct SamReader<R: Read> {
    inner: R,
    header: Rc<SamHeader>,
    buffer: Vec<u8>,
    n_processed: usize,
}
impl<R: Read> SamReader<R> {
    /// Creates a reader and consumes the stream header
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be read or is invalid.
    pub fn new(mut inner: R) -> Result<Self> {
        let header = SamHeader::from_reader(&mut inner)?;
        log::debug!(
            "Opened record stream with {} reference sequences",
            header.n_references()
        );
        Ok(Self {
            inner,
            header: Rc::new(header),
            buffer: Vec::new(),
            n_processed: 0,
        })
    }

    /// Reads the next block size, distinguishing a clean end of stream from a truncated one
    fn next_block_size(&mut self) -> Result<Option<u32>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            4 => Ok(Some(LittleEndian::read_u32(&buf))),
            _ => Err(ReadError::UnexpectedEndOfStream(self.n_processed).into()),
        }
    }

    /// Reads the next record
    ///
    /// Returns `None` at the end of the stream.
    pub fn next_record(&mut self) -> Option<Result<Sam>> {
        let block_size = match self.next_block_size() {
            Ok(Some(block_size)) => block_size,
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };
        if (block_size as usize) < SIZE_CORE {
            return Some(Err(ReadError::InvalidBlockSize(block_size).into()));
        }

        // the block grows with the bytes actually present, never with the declared size
        self.buffer.clear();
        let limit = u64::from(block_size);
        match self.inner.by_ref().take(limit).read_to_end(&mut self.buffer) {
            Ok(n) if n as u64 == limit => {}
            Ok(_) => return Some(Err(ReadError::UnexpectedEndOfStream(self.n_processed).into())),
            Err(e) => return Some(Err(e.into())),
        }
        let record = match RawRecord::from_bytes(&self.buffer) {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };

        self.n_processed += 1;
        log::trace!("Read record {} ({} bytes)", self.n_processed, block_size);
        Some(Ok(Sam::new(Rc::clone(&self.header), record)))
    }

    pub fn header(&self) -> Rc<SamHeader> {
        Rc::clone(&self.header)
    }

    /// Number of records read so far
    pub fn n_processed(&self) -> usize {
        self.n_processed
    }
}
impl<R: Read> Iterator for SamReader<R> {
    type Item = Result<Sam>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::{header::Reference, Error, SamBuilder, SamWriter};
    use anyhow::Result;

    fn stream(n_records: usize) -> Result<Vec<u8>> {
        let header = Rc::new(SamHeader::new("", vec![Reference::new("chr1", 500)]));
        let mut writer = SamWriter::new(Vec::new(), Rc::clone(&header))?;
        let mut builder = SamBuilder::new(header, true);
        builder
            .set_chromosome(0)?
            .set_cigar_str("4M")?
            .set_bases_str("ACGT")?
            .set_base_quals_slice(&[1, 2, 3, 4])?;
        for idx in 0..n_records {
            builder
                .set_name(&format!("read{idx}"))?
                .set_alignment_start(idx as u32 + 1)?;
            writer.write_record(&builder.build()?)?;
        }
        Ok(writer.into_inner())
    }

    #[test]
    fn test_read_all_records() -> Result<()> {
        let bytes = stream(3)?;
        let mut reader = SamReader::new(bytes.as_slice())?;
        let names = reader
            .by_ref()
            .map(|r| r.map(|sam| sam.name()))
            .collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(names, vec!["read0", "read1", "read2"]);
        assert_eq!(reader.n_processed(), 3);
        assert!(reader.next_record().is_none());
        Ok(())
    }

    #[test]
    fn test_empty_stream() -> Result<()> {
        let bytes = stream(0)?;
        let mut reader = SamReader::new(bytes.as_slice())?;
        assert!(reader.next_record().is_none());
        Ok(())
    }

    #[test]
    fn test_truncated_record() -> Result<()> {
        let mut bytes = stream(2)?;
        bytes.truncate(bytes.len() - 5);
        let mut reader = SamReader::new(bytes.as_slice())?;
        assert!(reader.next_record().is_some_and(|r| r.is_ok()));
        assert!(matches!(
            reader.next_record(),
            Some(Err(Error::ReadError(ReadError::UnexpectedEndOfStream(1))))
        ));
        Ok(())
    }

    #[test]
    fn test_partial_block_size() -> Result<()> {
        let mut bytes = stream(1)?;
        bytes.extend_from_slice(&[0x40, 0x00]);
        let mut reader = SamReader::new(bytes.as_slice())?;
        assert!(reader.next_record().is_some_and(|r| r.is_ok()));
        assert!(matches!(
            reader.next_record(),
            Some(Err(Error::ReadError(ReadError::UnexpectedEndOfStream(1))))
        ));
        Ok(())
    }

    #[test]
    fn test_oversized_block_size() -> Result<()> {
        let mut bytes = stream(0)?;
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 40]);
        let mut reader = SamReader::new(bytes.as_slice())?;
        assert!(matches!(
            reader.next_record(),
            Some(Err(Error::ReadError(ReadError::UnexpectedEndOfStream(0))))
        ));
        Ok(())
    }

    #[test]
    fn test_invalid_block_size() -> Result<()> {
        let mut bytes = stream(0)?;
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        let mut reader = SamReader::new(bytes.as_slice())?;
        assert!(matches!(
            reader.next_record(),
            Some(Err(Error::ReadError(ReadError::InvalidBlockSize(8))))
        ));
        Ok(())
    }
}
