// image.rs — Single-plane pixel buffer, generic over integer sample depth.
//
// CLAHE works on histograms, so the only pixel types that make sense are
// the integer depths whose values can index a histogram directly:
//
//   u8  → 256 bins
//   u16 → 65536 bins
//
// The `Pixel` trait captures exactly that: how many bins a depth needs,
// how a sample maps to a bin, and how a bin maps back to a sample.
// Multi-channel data is stored as several planes (see mat.rs), so an
// Image<T> is always one channel, row-major, tightly packed.

use std::fmt;

// ---------------------------------------------------------------------------
// Pixel Trait
// ---------------------------------------------------------------------------

/// Sample depth tag, used when a buffer's depth is only known at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Depth {
    U8,
    U16,
}

impl Depth {
    /// Name used in the dynamic image format (`"u8"` / `"u16"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Depth::U8 => "u8",
            Depth::U16 => "u16",
        }
    }

    /// Parse a depth name; the inverse of [`Depth::as_str`].
    pub fn parse(name: &str) -> Option<Depth> {
        match name {
            "u8" => Some(Depth::U8),
            "u16" => Some(Depth::U16),
            _ => None,
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for integer sample types that can be histogram-equalized.
pub trait Pixel: Copy + Default + Send + Sync + Ord + fmt::Debug + 'static {
    /// Number of histogram bins (one per representable value).
    const BINS: usize;
    /// Runtime tag for this depth.
    const DEPTH: Depth;

    /// Histogram bin of this sample.
    fn bin(self) -> usize;

    /// Sample for a bin index. Out-of-range indices saturate.
    fn from_bin(bin: usize) -> Self;
}

impl Pixel for u8 {
    const BINS: usize = 256;
    const DEPTH: Depth = Depth::U8;

    #[inline]
    fn bin(self) -> usize {
        self as usize
    }

    #[inline]
    fn from_bin(bin: usize) -> Self {
        bin.min(u8::MAX as usize) as u8
    }
}

impl Pixel for u16 {
    const BINS: usize = 65536;
    const DEPTH: Depth = Depth::U16;

    #[inline]
    fn bin(self) -> usize {
        self as usize
    }

    #[inline]
    fn from_bin(bin: usize) -> Self {
        bin.min(u16::MAX as usize) as u16
    }
}

// ---------------------------------------------------------------------------
// Image<T>
// ---------------------------------------------------------------------------

/// A 2D single-channel image with runtime dimensions.
#[derive(Clone, PartialEq, Eq)]
pub struct Image<T: Pixel> {
    /// Row-major samples, `width * height` long.
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Pixel> Image<T> {
    /// Create a zero-initialized image.
    pub fn new(width: usize, height: usize) -> Self {
        Image {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    /// Create an image from an existing sample vector.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image { data, width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// True if the image has no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Get the sample at (x, y). x is column, y is row.
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    /// Set the sample at (x, y).
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.bounds_check(x, y);
        self.data[y * self.width + x] = value;
    }

    /// Borrow a single row.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// Mutable borrow of a single row.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Iterate over all pixels as `(x, y, value)` tuples.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let w = self.width.max(1);
        self.data
            .iter()
            .enumerate()
            .map(move |(i, &v)| (i % w, i / w, v))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Resize in place to `width × height`, zeroing the contents.
    /// Reuses the allocation when the pixel count does not grow.
    pub fn reshape(&mut self, width: usize, height: usize) {
        self.data.clear();
        self.data.resize(width * height, T::default());
        self.width = width;
        self.height = height;
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for image {}×{}",
            self.width,
            self.height,
        );
    }
}

// Debug output stays readable for test failures on small images.
impl<T: Pixel> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Image<{}> {{ {}×{} }}", T::DEPTH, self.width, self.height)?;
        for y in 0..self.height.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(16) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self.get(x, y))?;
            }
            if self.width > 16 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}

impl<T: Pixel> std::ops::Index<(usize, usize)> for Image<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        self.bounds_check(x, y);
        &self.data[y * self.width + x]
    }
}

impl<T: Pixel> std::ops::IndexMut<(usize, usize)> for Image<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }
}
