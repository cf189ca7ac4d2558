// mat.rs — Multi-plane image buffer handed to the equalizer.
//
// A Mat is one or more planes of identical geometry and depth. Colour data
// is stored planar (one Image per channel) rather than interleaved, so each
// channel can be equalized as an independent Image<T>.
//
//   Mat::U8  [ plane 0 ][ plane 1 ][ plane 2 ]    e.g. RGB
//   Mat::U16 [ plane 0 ]                          e.g. 16-bit grayscale

use crate::error::{ClaheError, Result};
use crate::image::{Depth, Image, Pixel};

/// A 2-D buffer of one or more same-sized planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mat {
    U8(Vec<Image<u8>>),
    U16(Vec<Image<u16>>),
}

impl Default for Mat {
    /// An empty single-plane 8-bit buffer; the usual "fresh destination".
    fn default() -> Self {
        Mat::U8(vec![Image::new(0, 0)])
    }
}

impl Mat {
    /// Wrap a single 8-bit plane.
    pub fn gray8(image: Image<u8>) -> Self {
        Mat::U8(vec![image])
    }

    /// Wrap a single 16-bit plane.
    pub fn gray16(image: Image<u16>) -> Self {
        Mat::U16(vec![image])
    }

    /// Build an 8-bit Mat from planes, checking they agree on geometry.
    pub fn from_planes_u8(planes: Vec<Image<u8>>) -> Result<Self> {
        check_planes(&planes)?;
        Ok(Mat::U8(planes))
    }

    /// Build a 16-bit Mat from planes, checking they agree on geometry.
    pub fn from_planes_u16(planes: Vec<Image<u16>>) -> Result<Self> {
        check_planes(&planes)?;
        Ok(Mat::U16(planes))
    }

    /// Split interleaved samples (`c0 c1 c2 c0 c1 c2 ...`) into planes.
    pub fn from_interleaved<T: Pixel>(
        width: usize,
        height: usize,
        channels: usize,
        data: &[T],
    ) -> Result<Vec<Image<T>>> {
        if channels == 0 {
            return Err(ClaheError::ImageConversion(
                "image must have at least one channel".into(),
            ));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(|| ClaheError::ImageConversion("image dimensions overflow".into()))?;
        if data.len() != expected {
            return Err(ClaheError::ImageConversion(format!(
                "image data has {} samples, expected {width}x{height}x{channels} = {expected}",
                data.len()
            )));
        }
        let planes = (0..channels)
            .map(|c| {
                let samples = data.iter().skip(c).step_by(channels).copied().collect();
                Image::from_vec(width, height, samples)
            })
            .collect();
        Ok(planes)
    }

    pub fn depth(&self) -> Depth {
        match self {
            Mat::U8(_) => Depth::U8,
            Mat::U16(_) => Depth::U16,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Mat::U8(p) => p.len(),
            Mat::U16(p) => p.len(),
        }
    }

    pub fn width(&self) -> usize {
        match self {
            Mat::U8(p) => p.first().map_or(0, Image::width),
            Mat::U16(p) => p.first().map_or(0, Image::width),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Mat::U8(p) => p.first().map_or(0, Image::height),
            Mat::U16(p) => p.first().map_or(0, Image::height),
        }
    }

    /// Merge planes back into interleaved samples, widened to u16.
    pub fn to_interleaved(&self) -> Vec<u16> {
        match self {
            Mat::U8(p) => interleave(p).into_iter().map(u16::from).collect(),
            Mat::U16(p) => interleave(p),
        }
    }
}

/// Interleave same-sized planes into one row-major sample vector.
pub fn interleave<T: Pixel>(planes: &[Image<T>]) -> Vec<T> {
    let Some(first) = planes.first() else {
        return Vec::new();
    };
    let n = first.width() * first.height();
    let mut out = Vec::with_capacity(n * planes.len());
    for i in 0..n {
        for plane in planes {
            out.push(plane.as_slice()[i]);
        }
    }
    out
}

fn check_planes<T: Pixel>(planes: &[Image<T>]) -> Result<()> {
    let Some(first) = planes.first() else {
        return Err(ClaheError::ImageConversion(
            "image must have at least one channel".into(),
        ));
    };
    let mismatched = planes
        .iter()
        .any(|p| p.width() != first.width() || p.height() != first.height());
    if mismatched {
        return Err(ClaheError::ImageConversion(
            "all planes must share the same dimensions".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_roundtrip() {
        let data: Vec<u8> = vec![1, 10, 2, 20, 3, 30, 4, 40];
        let planes = Mat::from_interleaved(2, 2, 2, &data).unwrap();
        assert_eq!(planes[0].as_slice(), &[1, 2, 3, 4]);
        assert_eq!(planes[1].as_slice(), &[10, 20, 30, 40]);
        assert_eq!(interleave(&planes), data);
    }

    #[test]
    fn test_interleaved_length_checked() {
        let err = Mat::from_interleaved::<u8>(2, 2, 3, &[0; 11]).unwrap_err();
        assert!(matches!(err, ClaheError::ImageConversion(_)));
    }

    #[test]
    fn test_interleaved_dimension_overflow() {
        let err = Mat::from_interleaved::<u8>(usize::MAX, 2, 1, &[]).unwrap_err();
        assert_eq!(err, ClaheError::ImageConversion("image dimensions overflow".into()));
    }

    #[test]
    fn test_plane_geometry_checked() {
        let planes = vec![Image::<u8>::new(2, 2), Image::new(3, 2)];
        assert!(Mat::from_planes_u8(planes).is_err());
        assert!(Mat::from_planes_u16(Vec::new()).is_err());
    }

    #[test]
    fn test_accessors() {
        let m = Mat::gray16(Image::new(5, 3));
        assert_eq!(m.depth(), Depth::U16);
        assert_eq!((m.width(), m.height(), m.channels()), (5, 3, 1));
    }
}
