//! This module exports [Frame], a decoded picture converted to packed RGB24,
//! and its [Dimensions].

mod dimensions;

pub use dimensions::*;

/// A decoded picture in packed RGB24 (8 bits per channel, `R G B` order).
///
/// Rows may be padded: row `y` starts at byte `y * row_stride` and only the
/// first `width * 3` bytes of it are pixels. See [Self::row] and
/// [Self::to_packed] for padding-free access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    dimensions: Dimensions,
    row_stride: usize,
}

impl Frame {
    /// Construct from pixel data and its layout.
    ///
    /// [None] is returned if a side is `0`, if `row_stride` is shorter than a
    /// packed row, or if `data` isn't exactly `row_stride * height` bytes long.
    pub fn new(data: Vec<u8>, width: u32, height: u32, row_stride: usize) -> Option<Self> {
        let dimensions = Dimensions::new(width, height)?;

        if row_stride < dimensions.packed_row_len()
            || data.len() != row_stride * dimensions.height() as usize
        {
            return None;
        }

        Some(Self {
            data,
            dimensions,
            row_stride,
        })
    }

    /// The raw pixel data, padding included.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the raw pixel data, padding included.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width()
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The number of bytes between the starts of consecutive rows. This is at
    /// least `width * 3`.
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// The visible pixels of row `y` (padding stripped), or [None] if `y` is
    /// out of bounds.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height() {
            return None;
        }

        let start = y as usize * self.row_stride;
        Some(&self.data[start..start + self.dimensions.packed_row_len()])
    }

    /// The `[r, g, b]` value of the pixel at `(x, y)`, or [None] if it's out of
    /// bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width() {
            return None;
        }

        let start = x as usize * 3;
        let row = self.row(y)?;
        Some([row[start], row[start + 1], row[start + 2]])
    }

    /// Copy the pixels into a new buffer without any row padding
    /// (`width * height * 3` bytes).
    pub fn to_packed(&self) -> Vec<u8> {
        if self.row_stride == self.dimensions.packed_row_len() {
            return self.data.clone();
        }

        (0..self.height())
            .filter_map(|y| self.row(y))
            .flatten()
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 2x2 frame with 2 bytes of padding per row.
    fn padded_frame() -> Frame {
        #[rustfmt::skip]
        let data = vec![
            1, 2, 3,    4, 5, 6,    0, 0,
            7, 8, 9,    10, 11, 12, 0, 0,
        ];
        Frame::new(data, 2, 2, 8).unwrap()
    }

    #[test]
    fn bad_layouts_are_rejected() {
        assert!(Frame::new(vec![0; 12], 2, 2, 5).is_none());
        assert!(Frame::new(vec![0; 11], 2, 2, 6).is_none());
        assert!(Frame::new(vec![], 0, 2, 6).is_none());
        assert!(Frame::new(vec![0; 12], 2, 2, 6).is_some());
    }

    #[test]
    fn rows_and_pixels_skip_padding() {
        let frame = padded_frame();

        assert_eq!(frame.row(1), Some(&[7, 8, 9, 10, 11, 12][..]));
        assert_eq!(frame.row(2), None);
        assert_eq!(frame.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(frame.pixel(2, 0), None);
    }

    #[test]
    fn packing_strips_padding() {
        let frame = padded_frame();
        assert_eq!(frame.to_packed(), (1..=12).collect::<Vec<u8>>());

        let packed = Frame::new(frame.to_packed(), 2, 2, 6).unwrap();
        assert_eq!(packed.to_packed(), packed.data());
    }
}
