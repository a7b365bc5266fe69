//! Typed per-site and per-sample values carried by a [`Variant`](crate::Variant)
//!
//! Values are stored packed in their declared [`ValueType`] and read back through the
//! [`crate::codec`] decoders. A field is identified by its index in the id dictionary of the
//! header it was built against.

use crate::{
    codec::{decode_float, decode_integer, decode_string, encode_integer, size_for_type, ValueType},
    error::{FieldError, Result, ValidationError},
};

/// Packs integers with the representation of `value_type`, rejecting values it cannot hold
fn pack_integers(value_type: ValueType, values: &[i64]) -> Result<Vec<u8>> {
    let (min, max) = value_type.integer_range().ok_or(FieldError::TypeMismatch {
        requested: "integer",
        found: value_type.name(),
    })?;
    let mut data = Vec::with_capacity(values.len() * size_for_type(value_type).unwrap_or(0));
    for &value in values {
        if value < min || value > max {
            return Err(ValidationError::ArrayValueRange {
                value,
                element_type: value_type.name(),
            }
            .into());
        }
        encode_integer(&mut data, value, value_type);
    }
    Ok(data)
}

fn pack_floats(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn check_index(index: usize, size: usize) -> Result<()> {
    if index >= size {
        return Err(FieldError::IndexOutOfRange { index, size }.into());
    }
    Ok(())
}

/// A per-site (INFO) field: one list of values shared by every sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedField {
    field_idx: usize,
    value_type: ValueType,
    n_values: usize,
    data: Vec<u8>,
}
impl SharedField {
    /// Creates an integer field stored with the given integer type
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::TypeMismatch`] if `value_type` is not an integer type, and
    /// [`ValidationError::ArrayValueRange`] if a value does not fit it.
    pub fn integers(field_idx: usize, value_type: ValueType, values: &[i64]) -> Result<Self> {
        Ok(Self {
            field_idx,
            value_type,
            n_values: values.len(),
            data: pack_integers(value_type, values)?,
        })
    }

    pub fn floats(field_idx: usize, values: &[f32]) -> Self {
        Self {
            field_idx,
            value_type: ValueType::Float,
            n_values: values.len(),
            data: pack_floats(values),
        }
    }

    /// Creates a string field; the value is stored as a single element
    pub fn string(field_idx: usize, value: &str) -> Self {
        Self {
            field_idx,
            value_type: ValueType::String,
            n_values: 1,
            data: value.as_bytes().to_vec(),
        }
    }

    /// Index of the field id in the header dictionary
    pub fn field_idx(&self) -> usize {
        self.field_idx
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn len(&self) -> usize {
        self.n_values
    }

    pub fn is_empty(&self) -> bool {
        self.n_values == 0
    }

    /// Decodes value `index` as an integer
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::IndexOutOfRange`] past the last value and
    /// [`FieldError::TypeMismatch`] for string fields.
    pub fn integer(&self, index: usize) -> Result<i64> {
        check_index(index, self.n_values)?;
        decode_integer(&self.data, index, self.element_width(), self.value_type)
    }

    /// Decodes value `index` as a floating point number
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::IndexOutOfRange`] past the last value and
    /// [`FieldError::TypeMismatch`] for string fields.
    pub fn float(&self, index: usize) -> Result<f64> {
        check_index(index, self.n_values)?;
        decode_float(&self.data, index, self.element_width(), self.value_type)
    }

    /// Returns the value of a string field
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::TypeMismatch`] for numeric fields.
    pub fn string_value(&self) -> Result<&str> {
        decode_string(&self.data, 0, self.data.len(), self.value_type)
    }

    fn element_width(&self) -> usize {
        size_for_type(self.value_type).unwrap_or(self.data.len())
    }
}

/// A per-sample (FORMAT) field: the same number of values for every sample
///
/// Values are laid out sample after sample. String values are null padded to the width of
/// the longest one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndividualField {
    field_idx: usize,
    value_type: ValueType,
    values_per_sample: usize,
    element_width: usize,
    n_samples: usize,
    data: Vec<u8>,
}
impl IndividualField {
    /// Creates an integer field from values laid out sample after sample
    ///
    /// # Arguments
    ///
    /// * `field_idx` - Index of the field id in the header dictionary
    /// * `value_type` - The integer representation to store the values with
    /// * `values_per_sample` - Number of values each sample carries
    /// * `values` - All values, sample after sample
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::IndividualFieldShape`] if `values` does not split evenly
    /// across samples, and the errors of [`SharedField::integers`] for the values themselves.
    pub fn integers(
        field_idx: usize,
        value_type: ValueType,
        values_per_sample: usize,
        values: &[i64],
    ) -> Result<Self> {
        let n_samples = n_samples(values.len(), values_per_sample)?;
        Ok(Self {
            field_idx,
            value_type,
            values_per_sample,
            element_width: size_for_type(value_type).unwrap_or(0),
            n_samples,
            data: pack_integers(value_type, values)?,
        })
    }

    /// Creates a float field from values laid out sample after sample
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::IndividualFieldShape`] if `values` does not split evenly
    /// across samples.
    pub fn floats(field_idx: usize, values_per_sample: usize, values: &[f32]) -> Result<Self> {
        let n_samples = n_samples(values.len(), values_per_sample)?;
        Ok(Self {
            field_idx,
            value_type: ValueType::Float,
            values_per_sample,
            element_width: 4,
            n_samples,
            data: pack_floats(values),
        })
    }

    /// Creates a string field holding one value per sample
    pub fn strings(field_idx: usize, values: &[&str]) -> Self {
        let element_width = values.iter().map(|v| v.len()).max().unwrap_or(0);
        let mut data = Vec::with_capacity(element_width * values.len());
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.resize(data.len() + element_width - value.len(), 0);
        }
        Self {
            field_idx,
            value_type: ValueType::String,
            values_per_sample: 1,
            element_width,
            n_samples: values.len(),
            data,
        }
    }

    /// Index of the field id in the header dictionary
    pub fn field_idx(&self) -> usize {
        self.field_idx
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn values_per_sample(&self) -> usize {
        self.values_per_sample
    }

    /// Decodes value `index` of `sample` as an integer
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::IndexOutOfRange`] if the sample or value index is out of range,
    /// and [`FieldError::TypeMismatch`] for string fields.
    pub fn integer(&self, sample: usize, index: usize) -> Result<i64> {
        let element = self.element_index(sample, index)?;
        decode_integer(&self.data, element, self.element_width, self.value_type)
    }

    /// Decodes value `index` of `sample` as a floating point number
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::IndexOutOfRange`] if the sample or value index is out of range,
    /// and [`FieldError::TypeMismatch`] for string fields.
    pub fn float(&self, sample: usize, index: usize) -> Result<f64> {
        let element = self.element_index(sample, index)?;
        decode_float(&self.data, element, self.element_width, self.value_type)
    }

    /// Returns the string value of `sample`
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::IndexOutOfRange`] for an unknown sample and
    /// [`FieldError::TypeMismatch`] for numeric fields.
    pub fn string(&self, sample: usize) -> Result<&str> {
        check_index(sample, self.n_samples)?;
        decode_string(&self.data, sample, self.element_width, self.value_type)
    }

    fn element_index(&self, sample: usize, index: usize) -> Result<usize> {
        check_index(sample, self.n_samples)?;
        check_index(index, self.values_per_sample)?;
        Ok(sample * self.values_per_sample + index)
    }
}

fn n_samples(n_values: usize, values_per_sample: usize) -> Result<usize> {
    if values_per_sample == 0 || n_values % values_per_sample != 0 {
        return Err(ValidationError::IndividualFieldShape {
            n_values,
            values_per_sample,
        }
        .into());
    }
    Ok(n_values / values_per_sample)
}
