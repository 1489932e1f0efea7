//! The type system used to describe values and memory locations in the QPU backend's IR.
//!
//! Grounded on the shape of `midenc-hir-type`'s `Type` enum, but cut down to the scalar/vector/
//! pointer/array/struct/image split named in the memory-access-planner specification: there is no
//! function type or Wasm-canonical-ABI `List` here, since those belong to the (out-of-scope)
//! front end.

mod array_type;
mod image_type;
mod pointer_type;
mod struct_type;

pub use self::{
    array_type::ArrayType,
    image_type::{ImageFlags, ImageType},
    pointer_type::{AddressSpace, PointerType},
    struct_type::{StructField, StructType},
};

use core::fmt;

/// The number of SIMD lanes in a QPU vector register.
pub const NATIVE_VECTOR_SIZE: u8 = 16;

/// A scalar integer type: a bit-width plus a signedness flag.
///
/// This purposefully does not model floating point distinctly from the scalar width/signedness
/// pair; IEEE conformance beyond what the native ALU enumerates is out of scope, so floats are
/// represented as an unsigned scalar of the matching width with
/// [`ScalarType::is_float`] set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalarType {
    pub bits: u8,
    pub signed: bool,
    pub is_float: bool,
}

impl ScalarType {
    pub const fn int(bits: u8, signed: bool) -> Self {
        Self {
            bits,
            signed,
            is_float: false,
        }
    }

    pub const fn float(bits: u8) -> Self {
        Self {
            bits,
            signed: true,
            is_float: true,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_float {
            write!(f, "f{}", self.bits)
        } else if self.signed {
            write!(f, "i{}", self.bits)
        } else {
            write!(f, "u{}", self.bits)
        }
    }
}

pub const I8: ScalarType = ScalarType::int(8, true);
pub const U8: ScalarType = ScalarType::int(8, false);
pub const I16: ScalarType = ScalarType::int(16, true);
pub const U16: ScalarType = ScalarType::int(16, false);
pub const I32: ScalarType = ScalarType::int(32, true);
pub const U32: ScalarType = ScalarType::int(32, false);
pub const I64: ScalarType = ScalarType::int(64, true);
pub const U64: ScalarType = ScalarType::int(64, false);
pub const F32: ScalarType = ScalarType::float(32);

/// The type of a [`crate::Value`] or a memory location's pointee.
///
/// A `DataType` is either a scalar, a fixed-width vector of scalars (1 to
/// [`NATIVE_VECTOR_SIZE`] lanes), or one of the complex types a pointer may refer to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    /// A single scalar of the given width/signedness.
    Scalar(ScalarType),
    /// A vector of `len` lanes (2..=16) of the given scalar type.
    Vector(ScalarType, u8),
    Pointer(PointerType),
    Array(ArrayType),
    Struct(StructType),
    Image(ImageType),
}

impl DataType {
    pub fn scalar(ty: ScalarType) -> Self {
        Self::Scalar(ty)
    }

    pub fn vector(ty: ScalarType, len: u8) -> Self {
        assert!((2..=NATIVE_VECTOR_SIZE).contains(&len), "vector length out of range");
        Self::Vector(ty, len)
    }

    pub fn pointer(address_space: AddressSpace, pointee: DataType) -> Self {
        Self::Pointer(PointerType::new(address_space, pointee))
    }

    /// True for a bare scalar (not a vector, pointer, array, struct, or image).
    pub fn is_scalar_type(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    /// True for a scalar or vector type, i.e. something that fits directly into one QPU register.
    ///
    /// Grounded on VC4C's `Type::isSimpleType()` check used by `canLowerToRegisterReadWrite`.
    pub fn is_simple_type(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Vector(_, _))
    }

    pub fn get_pointer_type(&self) -> Option<&PointerType> {
        match self {
            Self::Pointer(p) => Some(p),
            _ => None,
        }
    }

    pub fn get_array_type(&self) -> Option<&ArrayType> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn get_struct_type(&self) -> Option<&StructType> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// The element type this value is ultimately composed of: a scalar's own type, a vector's
    /// lane type, or an array's element type. Pointers/structs/images have no single element
    /// type and return `None`.
    pub fn element_type(&self) -> Option<&ScalarType> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::Vector(s, _) => Some(s),
            _ => None,
        }
    }

    /// The bit width of a scalar or a vector lane; `None` for complex types.
    pub fn scalar_bit_count(&self) -> Option<u8> {
        self.element_type().map(|s| s.bits)
    }

    /// Produce the vector type with `len` lanes of this scalar type.
    ///
    /// Grounded on VC4C's `ScalarType::toVectorType`, used by the small-array-to-register
    /// conversion.
    ///
    /// Idempotent: calling this on an already-converted vector type of the same scalar/width
    /// returns an identical type.
    pub fn to_vector_type(scalar: ScalarType, len: u8) -> DataType {
        if len == 1 {
            DataType::Scalar(scalar)
        } else {
            DataType::vector(scalar, len)
        }
    }

    /// Tries to convert a pointer-to-array type into a single vector register type.
    ///
    /// Succeeds iff the array has at most [`NATIVE_VECTOR_SIZE`] elements, each a scalar of
    /// bit-width <= 32.
    pub fn convert_small_array_to_register(&self) -> Option<DataType> {
        let array = self.get_array_type()?;
        if array.size as u8 as u32 != array.size || array.size > NATIVE_VECTOR_SIZE as u32 {
            return None;
        }
        let element = array.element_type();
        let scalar = element.element_type()?;
        if scalar.bits > 32 {
            return None;
        }
        Some(Self::to_vector_type(*scalar, array.size as u8))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Vector(s, n) => write!(f, "{s}x{n}"),
            Self::Pointer(p) => write!(f, "{p}"),
            Self::Array(a) => write!(f, "{a}"),
            Self::Struct(s) => write!(f, "{s}"),
            Self::Image(i) => write!(f, "{i}"),
        }
    }
}
