// equalizer.rs — The equalizer capability and its owning handle.
//
// `Equalizer` is the seam between argument handling and the algorithm:
// anything that can equalize a Mat and hold a clip limit and tile grid
// can sit behind a `Clahe`. The crate ships `CpuClahe` (histeq.rs).
//
// `Clahe<E>` owns its equalizer outright. Mutation goes through
// `&mut self`, so the borrow checker rules out concurrent use of one
// handle; the equalizer and its scratch memory are released on drop.

use log::debug;

use crate::args::{self, ClaheParams, TileGridSize};
use crate::error::Result;
use crate::histeq::CpuClahe;
use crate::mat::Mat;

/// Capabilities of a CLAHE implementation.
pub trait Equalizer {
    /// Equalize `src` into `dst`. `dst` is recreated to match `src`'s
    /// depth, geometry and channel count.
    fn apply(&mut self, src: &Mat, dst: &mut Mat) -> Result<()>;

    fn set_clip_limit(&mut self, clip_limit: f64);

    fn clip_limit(&self) -> f64;

    fn set_tiles_grid_size(&mut self, size: TileGridSize);

    fn tiles_grid_size(&self) -> TileGridSize;

    /// Release any cached internal buffers.
    fn collect_garbage(&mut self);
}

/// Owned CLAHE handle.
#[derive(Debug, Clone)]
pub struct Clahe<E: Equalizer = CpuClahe> {
    inner: E,
}

impl Clahe<CpuClahe> {
    /// Create a CPU-backed handle. Parameters are clamped
    /// (clip ≥ 0, grid ≥ 1).
    pub fn new(clip_limit: f64, tile_grid: TileGridSize) -> Self {
        let clip_limit = args::sanitize_clip_limit(clip_limit);
        let tile_grid = tile_grid.sanitized();
        debug!(
            "creating CLAHE: clip_limit={clip_limit}, tile_grid={}x{}",
            tile_grid.width, tile_grid.height
        );
        Clahe {
            inner: CpuClahe::new(clip_limit, tile_grid),
        }
    }

    /// Create a CPU-backed handle from resolved parameters.
    pub fn from_params(params: ClaheParams) -> Self {
        Self::new(params.clip_limit, params.tile_grid)
    }
}

impl Default for Clahe<CpuClahe> {
    fn default() -> Self {
        Self::from_params(ClaheParams::default())
    }
}

impl<E: Equalizer> Clahe<E> {
    /// Wrap an already-configured equalizer. Its parameters are
    /// re-applied so the clamping invariants hold.
    pub fn with_equalizer(mut inner: E) -> Self {
        let clip = inner.clip_limit();
        let grid = inner.tiles_grid_size();
        inner.set_clip_limit(args::sanitize_clip_limit(clip));
        inner.set_tiles_grid_size(grid.sanitized());
        Clahe { inner }
    }

    /// Equalize `src` into a freshly allocated buffer.
    pub fn apply(&mut self, src: &Mat) -> Result<Mat> {
        let mut dst = Mat::default();
        self.inner.apply(src, &mut dst)?;
        Ok(dst)
    }

    /// Equalize `src` into `dst`, reusing its allocation where possible.
    pub fn apply_into(&mut self, src: &Mat, dst: &mut Mat) -> Result<()> {
        self.inner.apply(src, dst)
    }

    pub fn set_clip_limit(&mut self, clip_limit: f64) -> &mut Self {
        let clip_limit = args::sanitize_clip_limit(clip_limit);
        debug!("set clip_limit={clip_limit}");
        self.inner.set_clip_limit(clip_limit);
        self
    }

    pub fn clip_limit(&self) -> f64 {
        self.inner.clip_limit()
    }

    pub fn set_tiles_grid_size(&mut self, size: TileGridSize) -> &mut Self {
        let size = size.sanitized();
        debug!("set tiles_grid_size={}x{}", size.width, size.height);
        self.inner.set_tiles_grid_size(size);
        self
    }

    pub fn tiles_grid_size(&self) -> TileGridSize {
        self.inner.tiles_grid_size()
    }

    pub fn collect_garbage(&mut self) -> &mut Self {
        self.inner.collect_garbage();
        self
    }

    /// Borrow the underlying equalizer.
    pub fn equalizer(&self) -> &E {
        &self.inner
    }

    /// Consume the handle, returning the equalizer.
    pub fn into_inner(self) -> E {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;

    /// Records calls so forwarding can be checked without running CLAHE.
    #[derive(Default)]
    struct Recording {
        clip: f64,
        grid: TileGridSize,
        applied: usize,
        collected: usize,
    }

    impl Equalizer for Recording {
        fn apply(&mut self, src: &Mat, dst: &mut Mat) -> Result<()> {
            self.applied += 1;
            *dst = src.clone();
            Ok(())
        }
        fn set_clip_limit(&mut self, clip_limit: f64) {
            self.clip = clip_limit;
        }
        fn clip_limit(&self) -> f64 {
            self.clip
        }
        fn set_tiles_grid_size(&mut self, size: TileGridSize) {
            self.grid = size;
        }
        fn tiles_grid_size(&self) -> TileGridSize {
            self.grid
        }
        fn collect_garbage(&mut self) {
            self.collected += 1;
        }
    }

    #[test]
    fn test_new_clamps() {
        let c = Clahe::new(-3.0, TileGridSize { width: 0, height: 0 });
        assert_eq!(c.clip_limit(), 0.0);
        assert_eq!(c.tiles_grid_size(), TileGridSize::new(1, 1));
    }

    #[test]
    fn test_default_parameters() {
        let c = Clahe::default();
        assert_eq!(c.clip_limit(), 40.0);
        assert_eq!(c.tiles_grid_size(), TileGridSize::square(8));
    }

    #[test]
    fn test_setters_chain_and_clamp() {
        let mut c = Clahe::default();
        c.set_clip_limit(-1.0).set_tiles_grid_size(TileGridSize { width: 0, height: 5 });
        assert_eq!(c.clip_limit(), 0.0);
        assert_eq!(c.tiles_grid_size(), TileGridSize::new(1, 5));
    }

    #[test]
    fn test_forwards_to_equalizer() {
        let mut c = Clahe::with_equalizer(Recording {
            clip: -2.0,
            ..Default::default()
        });
        assert_eq!(c.clip_limit(), 0.0);

        let src = Mat::gray8(Image::from_vec(2, 1, vec![1, 2]));
        let out = c.apply(&src).unwrap();
        assert_eq!(out, src);
        c.collect_garbage();

        let rec = c.into_inner();
        assert_eq!(rec.applied, 1);
        assert_eq!(rec.collected, 1);
    }
}
