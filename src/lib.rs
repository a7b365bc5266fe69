//! # htsrecord
//!
//! Value-oriented access to binary alignment records and a multi-source variant merge.
//!
//! ## Alignment records
//!
//! A [`Sam`] record wraps the packed binary form of an alignment (a fixed 32-byte core
//! followed by the read name, cigar, 4-bit bases, qualities and aux tags). Accessors decode
//! fields on demand and the [`Cigar`], [`ReadBases`] and [`BaseQuals`] views edit the packed
//! bytes in place. New records are assembled with a [`SamBuilder`], and a stream of records
//! can be written and read back with [`SamWriter`] and [`SamReader`].
//!
//! ## Variant merging
//!
//! A [`MultipleVariantReader`] combines several sorted [`VariantSource`]s, yielding every
//! variant that shares a location as one batch. The [`ReferenceBlockSplittingVariantIterator`]
//! additionally cuts reference blocks so that all records in a batch cover the same span. The
//! [`VariantHeaderMerger`] tracks how fields and samples of every source map onto the merged
//! header through [`MergedLut`] lookup tables.

mod builder;
mod codec;
mod error;
mod field;
mod header;
mod header_merger;
mod lut;
mod merge;
mod reader;
mod record;
mod tags;
mod variant;
mod writer;

pub use builder::{DataField, SamBuilder};
pub use codec::{decode_float, decode_integer, decode_string, size_for_type, ValueType};
pub use error::{
    BuilderError, DecodeError, Error, FieldError, HeaderError, ParseError, ReadError, Result,
    ValidationError,
};
pub use field::{IndividualField, SharedField};
pub use header::{Reference, SamHeader, MAGIC};
pub use header_merger::{MergerLayout, VariantHeaderMerger};
pub use lut::{AllelesLut, LutLayout, MergedLut, DEFAULT_NUM_ALLELES, LUT_MISSING_VALUE};
pub use merge::{
    MultipleVariantIterator, MultipleVariantReader, ReferenceBlockSplittingVariantIterator,
    VariantBatch,
};
pub use reader::SamReader;
pub use record::{
    cigar_op, cigar_oplen, cigar_to_string, make_cigar_element, reg2bin, Base, BaseQuals, Cigar,
    CigarElement, CigarOperator, RawRecord, ReadBases, Sam, SamCore, SamFlags, FLAG_DUPLICATE,
    FLAG_FAIL, FLAG_FIRST, FLAG_LAST, FLAG_MATE_REVERSE, FLAG_MATE_UNMAPPED, FLAG_PAIRED,
    FLAG_PROPER_PAIR, FLAG_REVERSE, FLAG_SECONDARY, FLAG_SUPPLEMENTARY, FLAG_UNMAPPED,
    MATE_CIGAR_TAG, MAX_CIGAR_OPLEN, SIZE_CORE,
};
pub use tags::{
    NumericArrayTag, NumericArrayValues, SamTag, SamTagType, TagEntry, TagSet, TagTable,
    TAG_NAME_LENGTH,
};
pub use variant::{
    FieldCategory, HeaderField, Variant, VariantHeader, VariantSource, VecSource, MISSING_ALLELE,
};
pub use writer::SamWriter;

#[cfg(test)]
mod testing {

    use super::*;
    use anyhow::Result;
    use rand::{rngs::SmallRng, Rng, SeedableRng};
    use std::{io::Cursor, rc::Rc};

    const BASES: [Base; 5] = [Base::A, Base::C, Base::G, Base::T, Base::N];

    fn header() -> Rc<SamHeader> {
        Rc::new(SamHeader::new(
            "@HD\tVN:1.6\tSO:coordinate\n".to_string(),
            vec![Reference::new("chr1", 248_956_422), Reference::new("chr2", 242_193_529)],
        ))
    }

    fn build(name: &str, cigar: &str, bases: &str) -> Result<Sam> {
        let quals: Vec<u8> = (0..bases.len()).map(|i| (i % 40) as u8).collect();
        let mut builder = SamBuilder::new(header(), true);
        builder
            .set_name(name)?
            .set_chromosome(1)?
            .set_alignment_start(1_000)?
            .set_cigar_str(cigar)?
            .set_bases_str(bases)?
            .set_base_quals_slice(&quals)?
            .add_integer_tag("NM", 2)?
            .add_string_tag("RG", "group1")?;
        Ok(builder.build()?)
    }

    #[test]
    fn test_write_read_round_trip() -> Result<()> {
        let records = vec![
            build("read1", "5M", "ACGTN")?,
            build("read2", "2S3M1I2M", "AACGTACG")?,
            build("read3", "1M", "T")?,
        ];

        let mut writer = SamWriter::new(Cursor::new(Vec::new()), header())?;
        for record in &records {
            writer.write_record(record)?;
        }
        assert_eq!(writer.records_written(), 3);
        let buffer = writer.into_inner().into_inner();

        let mut reader = SamReader::new(buffer.as_slice())?;
        assert_eq!(*reader.header(), *header());
        let decoded = reader.by_ref().collect::<crate::Result<Vec<_>>>()?;
        assert_eq!(decoded.len(), records.len());
        for (expected, actual) in records.iter().zip(&decoded) {
            assert_eq!(expected.to_raw(), actual.to_raw());
            assert_eq!(expected.name(), actual.name());
            assert_eq!(actual.header().reference_name(actual.chromosome()), Some("chr2"));
            assert_eq!(
                actual.string_tag("RG")?.map(SamTag::into_value),
                Some("group1".to_string())
            );
        }
        assert_eq!(reader.n_processed(), 3);
        Ok(())
    }

    #[test]
    fn test_random_bases_round_trip() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..50 {
            let len = rng.random_range(1..200);
            let bases: Vec<Base> = (0..len)
                .map(|_| BASES[rng.random_range(0..BASES.len())])
                .collect();
            let quals: Vec<u8> = (0..len).map(|_| rng.random_range(0..60)).collect();

            let mut builder = SamBuilder::new(header(), true);
            builder
                .set_name("random")?
                .set_cigar_str(&format!("{len}M"))?
                .set_bases_slice(&bases)?
                .set_base_quals_slice(&quals)?;
            let record = builder.build()?;

            assert_eq!(record.bases().bases(), bases);
            assert_eq!(record.base_quals().to_vec(), quals);
            assert_eq!(record.cigar().query_length(), len);
        }
        Ok(())
    }

    #[test]
    fn test_odd_length_bases() -> Result<()> {
        let record = build("odd", "3M", "ACG")?;
        let bases = record.bases();
        assert_eq!(bases.len(), 3);
        assert_eq!(bases.to_string(), "ACG");
        assert!(bases.get(3).is_err());
        Ok(())
    }

    #[test]
    fn test_cigar_string_round_trip() -> Result<()> {
        for text in ["10M", "2S5M2D3M1H", "3M1I4M2N5M", "1=1X1P1B"] {
            let elements = Cigar::parse_string(text)?;
            assert_eq!(cigar_to_string(&elements), text);
        }
        Ok(())
    }

    #[test]
    fn test_edit_shared_record() -> Result<()> {
        let record = build("shared", "4M", "ACGT")?;
        let alias = record.share();
        let copy = record.clone();

        let mut bases = record.bases();
        bases.set(0, Base::T)?;
        assert_eq!(alias.bases().to_string(), "TCGT");
        assert_eq!(copy.bases().to_string(), "ACGT");
        Ok(())
    }
}
