use core::fmt;

/// Flags describing how an image type is accessed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageFlags {
    pub read_only: bool,
    pub write_only: bool,
    pub sampled: bool,
}

/// An OpenCL-C image type. Images are opaque to the memory planner: they are never classified by
/// [`crate::DataType`]'s register/VPM/DMA realizations, they exist purely so the IR model can
/// represent kernel parameters of image type without losing that information upstream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageType {
    pub dimensions: u8,
    pub flags: ImageFlags,
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image{}d", self.dimensions)
    }
}
