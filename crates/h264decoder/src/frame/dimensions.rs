//! Declares the [Dimensions] type, the geometry of a decoded [super::Frame].

use std::fmt::{self, Display, Formatter};
use std::num::NonZeroU32;

/// A width and a height in pixels, both guaranteed to be non-zero.
///
/// # Example
///
/// [From<(u32, u32)>] is implemented for [Dimensions]. If either side is `0`,
/// the thread will panic. [Into::into] should really only be used if you're
/// providing the side lengths as literals (e.g. `(352, 288).into()`).
///
/// ```
/// use h264decoder::Dimensions;
///
/// let d: Dimensions = (352, 288).into();
/// assert_eq!(d.width(), 352);
/// assert_eq!(d.height(), 288);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    width: NonZeroU32,
    height: NonZeroU32,
}

impl Dimensions {
    /// Construct from a width and a height.
    ///
    /// This function will return [None] if the width or height are 0.
    pub const fn new(width: u32, height: u32) -> Option<Self> {
        let Some(width) = NonZeroU32::new(width) else {
            return None;
        };
        let Some(height) = NonZeroU32::new(height) else {
            return None;
        };

        Some(Self::from_non_zero(width, height))
    }

    /// Construct from a non-zero width and a height. Unlike [Self::new], this
    /// always succeeds.
    pub const fn from_non_zero(width: NonZeroU32, height: NonZeroU32) -> Self {
        Self { width, height }
    }

    /// The dimensions' width. This will never be `0`.
    pub const fn width(&self) -> u32 {
        self.width.get()
    }

    /// The dimensions' height. This will never be `0`.
    pub const fn height(&self) -> u32 {
        self.height.get()
    }

    /// The number of pixels in a picture with these dimensions.
    pub const fn area(&self) -> usize {
        self.width.get() as usize * self.height.get() as usize
    }

    /// The number of bytes in one row of packed RGB24 pixels (no padding).
    pub const fn packed_row_len(&self) -> usize {
        self.width.get() as usize * 3
    }
}

/// When displayed, [Dimensions] will look like `WxH` (e.g. `352x288`).
impl Display for Dimensions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// If either side is `0`, the thread will panic.
impl From<(u32, u32)> for Dimensions {
    fn from(dimensions: (u32, u32)) -> Self {
        Self::new(dimensions.0, dimensions.1).expect("Both sides must be non-zero.")
    }
}

impl From<Dimensions> for (u32, u32) {
    fn from(dimensions: Dimensions) -> Self {
        (dimensions.width(), dimensions.height())
    }
}
