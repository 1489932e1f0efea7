use core::fmt;

use smallvec::SmallVec;

use crate::DataType;

/// A field of a [`StructType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructField {
    pub offset: u32,
    pub ty: DataType,
}

/// A structured aggregate type.
///
/// Struct-typed memory bases are never register- or VPM-per-QPU-lowerable (§4.4): they always
/// fall to `RAM_READ_WRITE_VPM`. The `packed` flag is retained purely for offset computation
/// fidelity when the classifier needs to reason about a struct-pointer alias (the 64-bit read
/// split rule, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructType {
    pub packed: bool,
    pub fields: SmallVec<[StructField; 4]>,
}

impl StructType {
    pub fn new(packed: bool, fields: impl IntoIterator<Item = StructField>) -> Self {
        Self {
            packed,
            fields: fields.into_iter().collect(),
        }
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "struct{{{}field}}", if self.packed { "packed, " } else { "" })
    }
}
