use core::fmt;

use crate::DataType;

/// The OpenCL-C address space a pointer type resides in.
///
/// `Private` never appears as a kernel parameter's address space (that is what
/// `StackAllocation` locals are for), but it is a legal annotation on a pointer type used
/// internally when lowering a stack allocation's address.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressSpace {
    Private,
    Global,
    Local,
    Constant,
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Private => "private",
            Self::Global => "global",
            Self::Local => "local",
            Self::Constant => "constant",
        };
        f.write_str(s)
    }
}

/// A pointer to a value in a given address space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointerType {
    pub address_space: AddressSpace,
    pub pointee: Box<DataType>,
}

impl PointerType {
    pub fn new(address_space: AddressSpace, pointee: DataType) -> Self {
        Self {
            address_space,
            pointee: Box::new(pointee),
        }
    }

    pub fn pointee(&self) -> &DataType {
        &self.pointee
    }
}

impl fmt::Display for PointerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}* {}", self.pointee, self.address_space)
    }
}
