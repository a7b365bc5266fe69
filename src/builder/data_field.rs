/// One variable-length component of a record under construction
///
/// The byte length and the logical element count are tracked separately because they differ
/// for packed components (4 bytes per cigar element, half a byte per base).
///
/// A field that was never set is distinct from a field set to zero elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataField {
    data: Vec<u8>,
    num_elements: usize,
    set: bool,
}
impl DataField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a field holding a copy of `source`
    pub fn from_slice(source: &[u8], num_elements: usize) -> Self {
        let mut field = Self::new();
        field.update(source, num_elements);
        field
    }

    /// Replaces the contents with a copy of `source`
    ///
    /// The existing allocation is reused when it is large enough.
    pub fn update(&mut self, source: &[u8], num_elements: usize) {
        self.data.clear();
        self.data.extend_from_slice(source);
        self.num_elements = num_elements;
        self.set = true;
    }

    /// Replaces the contents with an already allocated buffer, without copying
    pub fn update_owned(&mut self, data: Vec<u8>, num_elements: usize) {
        self.data = data;
        self.num_elements = num_elements;
        self.set = true;
    }

    /// Copies the field into `destination` at `cursor` and returns the advanced cursor
    ///
    /// `destination` must have room for [`DataField::num_bytes`] bytes past `cursor`.
    pub fn copy_into(&self, destination: &mut [u8], cursor: usize) -> usize {
        let end = cursor + self.data.len();
        destination[cursor..end].copy_from_slice(&self.data);
        end
    }

    /// Moves the buffer out of the field, leaving it unset
    pub(crate) fn take(&mut self) -> Vec<u8> {
        self.num_elements = 0;
        self.set = false;
        std::mem::take(&mut self.data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn num_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// True when the field holds no elements, whether or not it was set
    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }

    pub fn is_set(&self) -> bool {
        self.set
    }
}
