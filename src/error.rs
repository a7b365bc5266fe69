/// Custom Result type for htsrecord operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the htsrecord library, encompassing all possible error cases
/// that can occur while decoding, building, reading, writing, or merging records.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors raised while decoding a binary byte stream
    DecodeError(#[from] DecodeError),
    /// Errors raised when accessing a packed field
    FieldError(#[from] FieldError),
    /// Errors detected by the record builder at build time
    ValidationError(#[from] ValidationError),
    /// Errors raised when parsing string-form input
    ParseError(#[from] ParseError),
    /// Errors related to the lifecycle of the record builder
    BuilderError(#[from] BuilderError),
    /// Errors related to record stream and variant headers
    HeaderError(#[from] HeaderError),
    /// Errors that occur during read operations
    ReadError(#[from] ReadError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}

/// Errors raised while walking a packed record or aux tag stream
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The aux tag type code is not recognized, so the stream cannot be skipped safely
    ///
    /// # Arguments
    /// * `char` - The type code that was found
    #[error("Unsupported aux tag type: {0:?}")]
    UnsupportedTagType(char),

    /// The element type of a numeric array tag is not recognized
    ///
    /// # Arguments
    /// * `char` - The element type code that was found
    #[error("Unsupported numeric array element type: {0:?}")]
    InvalidArraySubtype(char),

    /// A packed cigar element carries an operator code outside of `0..=9`
    ///
    /// # Arguments
    /// * `u32` - The operator code that was found
    #[error("Invalid cigar operator code: {0}")]
    InvalidCigarOperatorCode(u32),

    /// A value extends past the end of the buffer
    ///
    /// # Fields
    /// * `needed` - The byte offset required to finish reading the value
    /// * `available` - The number of bytes in the buffer
    #[error("Unexpected end of record: needed {needed} bytes but only {available} available")]
    UnexpectedEndOfRecord { needed: usize, available: usize },

    /// A string or hex value is missing its null terminator
    ///
    /// # Arguments
    /// * `usize` - The byte offset where the value started
    #[error("Missing null terminator for value starting at byte {0}")]
    MissingNullTerminator(usize),
}

/// Errors raised by field views and the field codec
#[derive(thiserror::Error, Debug)]
pub enum FieldError {
    /// Attempted to access an element beyond the end of a field view
    ///
    /// # Fields
    /// * `index` - The requested element index
    /// * `size` - The number of elements in the view
    #[error("Index {index} out of range for field of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    /// Requested a decode that does not match the underlying value type
    ///
    /// # Fields
    /// * `requested` - The type the caller asked for
    /// * `found` - The type stored in the buffer
    #[error("Requested a {requested} value but the underlying type is {found}")]
    TypeMismatch {
        requested: &'static str,
        found: &'static str,
    },

    /// A computation needs an aux tag that the record does not carry
    ///
    /// # Arguments
    /// * `String` - The name of the missing tag
    #[error("Record does not carry the required tag {0}")]
    MissingTag(String),
}

/// Logical inconsistencies detected by the record builder
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    /// A field required to build a record was never set or is empty
    ///
    /// # Arguments
    /// * `&'static str` - The name of the missing field
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// The query length implied by the cigar does not match the number of bases
    ///
    /// # Fields
    /// * `cigar` - The number of read bases consumed by the cigar
    /// * `bases` - The number of bases set on the record
    #[error("Cigar consumes {cigar} read bases but the record has {bases} bases")]
    CigarLengthMismatch { cigar: usize, bases: usize },

    /// The number of bases does not match the number of base qualities
    ///
    /// # Fields
    /// * `bases` - The number of bases set on the record
    /// * `quals` - The number of base qualities set on the record
    #[error("Number of bases ({bases}) does not match the number of base qualities ({quals})")]
    BaseQualLengthMismatch { bases: usize, quals: usize },

    /// An aux tag name is not exactly two characters long
    ///
    /// # Arguments
    /// * `String` - The offending tag name
    #[error("Invalid aux tag name: {0:?} (tag names must be exactly 2 characters)")]
    InvalidTagName(String),

    /// An integer aux tag value cannot be stored in 32 bits
    ///
    /// # Fields
    /// * `name` - The tag name
    /// * `value` - The value that was requested
    #[error("Integer tag {name} value {value} is outside of the 32-bit range")]
    IntegerTagRange { name: String, value: i64 },

    /// A numeric array value does not fit the declared element type
    ///
    /// # Fields
    /// * `value` - The value that was requested
    /// * `element_type` - The name of the declared element type
    #[error("Array value {value} does not fit the {element_type} element type")]
    ArrayValueRange {
        value: i64,
        element_type: &'static str,
    },

    /// A string or hex tag value cannot be stored as a null-terminated value
    ///
    /// # Fields
    /// * `name` - The tag name
    /// * `reason` - What is wrong with the value
    #[error("Invalid value for tag {name}: {reason}")]
    InvalidTagValue { name: String, reason: &'static str },

    /// Per-sample field values do not split evenly across samples
    ///
    /// # Fields
    /// * `n_values` - The total number of values provided
    /// * `values_per_sample` - The number of values each sample should carry
    #[error("{n_values} values cannot be split into groups of {values_per_sample} per sample")]
    IndividualFieldShape {
        n_values: usize,
        values_per_sample: usize,
    },

    /// A 1-based position cannot be stored in the signed 32-bit core field
    ///
    /// # Arguments
    /// * `u32` - The 1-based position that was requested
    #[error("Position {0} exceeds the maximum of 2147483647")]
    PositionOutOfRange(u32),

    /// The read name does not fit the one-byte name length of the core
    ///
    /// # Arguments
    /// * `usize` - The length of the name in bytes
    #[error("Read name of {0} bytes exceeds the maximum of 254")]
    NameTooLong(usize),

    /// The cigar has more elements than the core can count
    ///
    /// # Arguments
    /// * `usize` - The number of cigar elements
    #[error("Cigar has {0} elements, exceeding the maximum of 65535")]
    TooManyCigarElements(usize),
}

/// Errors raised when parsing string-form field representations
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    /// The cigar string contained no operators
    ///
    /// # Arguments
    /// * `String` - The input string
    #[error("Cigar string {0:?} does not contain any operator")]
    EmptyCigar(String),

    /// The cigar string contained an unknown operator character
    ///
    /// # Arguments
    /// * `char` - The unrecognized operator
    #[error("Unrecognized cigar operator: {0:?}")]
    InvalidCigarOperator(char),

    /// The cigar string contained an operator without a valid run length
    ///
    /// # Arguments
    /// * `String` - The input string
    #[error("Invalid cigar run length in {0:?}")]
    InvalidCigarLength(String),

    /// The base string contained a character outside of the supported alphabet
    ///
    /// # Arguments
    /// * `char` - The unrecognized base
    #[error("Invalid base: {0:?}")]
    InvalidBase(char),
}

/// Errors related to the lifecycle of the record builder
#[derive(thiserror::Error, Debug)]
pub enum BuilderError {
    /// The builder was used after its buffers were moved out by a one-time build
    #[error("Record builder used after build_once consumed its buffers")]
    UseAfterConsume,
}

/// Errors specific to record stream headers and variant header compatibility
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic number in the header does not match the expected value
    ///
    /// # Arguments
    /// * `[u8; 4]` - The invalid magic bytes that were found
    #[error("Invalid magic number: {0:?}")]
    InvalidMagicNumber([u8; 4]),

    /// The size of the data does not match what was specified in the header
    ///
    /// # Arguments
    /// * First `usize` - The actual number of bytes provided
    /// * Second `usize` - The expected number of bytes according to the header
    #[error("Invalid number of bytes provided: {0}. Expected: {1}")]
    InvalidSize(usize, usize),

    /// Two inputs of a multi-source reader declare incompatible chromosome sets
    ///
    /// # Fields
    /// * `source_idx` - The index of the incompatible input
    /// * `reason` - Description of the first difference found
    #[error("Header of input {source_idx} is incompatible: {reason}")]
    Incompatible { source_idx: usize, reason: String },
}

/// Errors that can occur while reading record streams
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The stream ended in the middle of a record
    ///
    /// # Arguments
    /// * `usize` - The number of records successfully read before the truncation
    #[error("Unexpected end of stream after {0} records")]
    UnexpectedEndOfStream(usize),

    /// The record block size is smaller than the fixed core
    ///
    /// # Arguments
    /// * `u32` - The block size that was read
    #[error("Invalid record block size: {0}")]
    InvalidBlockSize(u32),

    /// Attempted to access an input source beyond the available range
    ///
    /// # Arguments
    /// * First `usize` - The requested source index
    /// * Second `usize` - The number of sources
    #[error("Requested source index ({0}) is out of range ({1})")]
    SourceOutOfRange(usize, usize),
}
