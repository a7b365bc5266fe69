use byteorder::{LittleEndian, WriteBytesExt};
use std::{io::Write, rc::Rc};

use crate::{error::Result, header::SamHeader, record::Sam};

/// Writer producing an uncompressed alignment record stream
pub struct SamWriter<W: Write> {
    /// Inner writer
    inner: W,

    /// Header written at the start of the stream
    header: Rc<SamHeader>,

    /// Number of records written
    records_written: usize,
}
impl<W: Write> SamWriter<W> {
    /// Creates a writer and writes the stream header
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(mut inner: W, header: Rc<SamHeader>) -> Result<Self> {
        header.write_bytes(&mut inner)?;
        Ok(Self {
            inner,
            header,
            records_written: 0,
        })
    }

    /// Writes a record framed by its block size
    pub fn write_record(&mut self, record: &Sam) -> Result<()> {
        record.handle().with(|raw| -> Result<()> {
            self.inner
                .write_u32::<LittleEndian>(raw.block_size() as u32)?;
            raw.core.write_bytes(&mut self.inner)?;
            self.inner.write_all(&raw.data)?;
            Ok(())
        })?;
        self.records_written += 1;
        log::trace!("Wrote record {}", self.records_written);
        Ok(())
    }

    pub fn header(&self) -> Rc<SamHeader> {
        Rc::clone(&self.header)
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::{header::Reference, SamBuilder, SamReader};
    use anyhow::Result;

    #[test]
    fn test_write_counts_and_frames() -> Result<()> {
        let header = Rc::new(SamHeader::new("@HD\tVN:1.6\n", vec![Reference::new("chr1", 10)]));
        let mut builder = SamBuilder::new(Rc::clone(&header), true);
        builder
            .set_name("r")?
            .set_chromosome(0)?
            .set_alignment_start(1)?
            .set_cigar_str("2M")?
            .set_bases_str("AC")?
            .set_base_quals_slice(&[9, 9])?;
        let record = builder.build()?;

        let mut writer = SamWriter::new(Vec::new(), header)?;
        writer.write_record(&record)?;
        writer.write_record(&record)?;
        writer.flush()?;
        assert_eq!(writer.records_written(), 2);

        let bytes = writer.into_inner();
        let mut reader = SamReader::new(bytes.as_slice())?;
        assert_eq!(reader.header().text, "@HD\tVN:1.6\n");
        for parsed in reader.by_ref() {
            assert_eq!(parsed?.to_raw(), record.to_raw());
        }
        assert_eq!(reader.n_processed(), 2);
        Ok(())
    }
}
