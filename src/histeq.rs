// histeq.rs — Histogram equalization on the CPU.
//
// Two variants:
//
// 1. GLOBAL histogram equalization: one histogram over the whole image,
//    one CDF, one remap. Used as a reference point in tests and benches.
//
// 2. CLAHE (Contrast Limited Adaptive Histogram Equalization): split the
//    image into a grid of tiles, equalize each tile with a clipped
//    histogram, then bilinearly interpolate between the four nearest tile
//    lookup tables so tile seams don't show.
//
// The tile grid is a COUNT of tiles (8×8 means 64 tiles regardless of
// image size), not a tile size in pixels. Tile boundaries are spread
// evenly with integer division, so every tile is non-empty as long as the
// grid is no larger than the image; larger grids are capped to the image.
//
// Layout of the per-tile lookup tables (the scratch buffer):
//
//   luts = [ tile(0,0): BINS entries ][ tile(1,0) ] ... [ tile(cols-1,rows-1) ]
//
// For u16 that is 65536 entries per tile, which is why CpuClahe keeps the
// buffer between calls and releases it only on collect_garbage().

use log::{debug, trace};

use crate::args::{sanitize_clip_limit, TileGridSize, DEFAULT_CLIP_LIMIT, DEFAULT_TILE_GRID};
use crate::equalizer::Equalizer;
use crate::error::Result;
use crate::image::{Image, Pixel};
use crate::mat::Mat;

// ============================================================
// Global histogram equalization
// ============================================================

/// Apply global histogram equalization to a single plane.
///
/// Algorithm (Gonzalez & Woods):
///   1. Compute the histogram.
///   2. Build the cumulative distribution function (CDF).
///   3. Remap: output[i] = round(CDF[input[i]] * (BINS - 1)).
pub fn equalize_histogram<T: Pixel>(image: &Image<T>) -> Image<T> {
    let n = image.width() * image.height();
    if n == 0 {
        return Image::new(image.width(), image.height());
    }

    let mut hist = vec![0u32; T::BINS];
    for &v in image.as_slice() {
        hist[v.bin()] += 1;
    }

    let mut lut = vec![T::default(); T::BINS];
    build_lut(&hist, n, &mut lut);

    let data = image.as_slice().iter().map(|v| lut[v.bin()]).collect();
    Image::from_vec(image.width(), image.height(), data)
}

/// Fill `lut` from a histogram and total pixel count.
fn build_lut<T: Pixel>(hist: &[u32], total: usize, lut: &mut [T]) {
    let max_val = (T::BINS - 1) as f64;

    // First non-zero CDF value; skipping it stretches the darkest
    // occupied bin down to 0.
    let mut cdf_min = 0u64;
    let mut running = 0u64;
    for &h in hist {
        running += h as u64;
        if running > 0 {
            cdf_min = running;
            break;
        }
    }

    let denom = total as f64 - cdf_min as f64;
    if denom <= 0.0 {
        // Degenerate: every pixel in one bin.
        lut.iter_mut().for_each(|v| *v = T::default());
        return;
    }

    let mut cdf = 0u64;
    for (entry, &h) in lut.iter_mut().zip(hist) {
        cdf += h as u64;
        let val = (cdf as f64 - cdf_min as f64) / denom * max_val;
        *entry = T::from_bin(val.round().clamp(0.0, max_val) as usize);
    }
}

/// Clip histogram bins and redistribute the excess evenly.
///
/// The clip limit is a multiplier on the "uniform" bin count
/// (total_pixels / BINS). The resulting bin ceiling is never below 1.
fn clip_histogram(hist: &mut [u32], total_pixels: usize, clip_limit: f64) {
    let bins = hist.len();
    let clip_val = ((total_pixels as f64 / bins as f64) * clip_limit).ceil().max(1.0);
    let clip_val = clip_val.min(u32::MAX as f64) as u32;

    let mut excess = 0u64;
    for bin in hist.iter_mut() {
        if *bin > clip_val {
            excess += (*bin - clip_val) as u64;
            *bin = clip_val;
        }
    }

    let per_bin = (excess / bins as u64) as u32;
    let remainder = (excess % bins as u64) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += per_bin;
        if i < remainder {
            *bin += 1;
        }
    }
}

// ============================================================
// CLAHE
// ============================================================

/// Interpolation coordinates along one axis: the two neighbouring tile
/// indices and the weight of the second.
#[derive(Debug, Clone, Copy)]
struct AxisWeight {
    t0: usize,
    t1: usize,
    a: f32,
}

/// Precompute tile neighbours for every coordinate along an axis of
/// `len` pixels split into `tiles` tiles.
fn axis_weights(len: usize, tiles: usize) -> Vec<AxisWeight> {
    let tile_len = len as f32 / tiles as f32;
    (0..len)
        .map(|i| {
            // Position in "tile centre" units: tile t's centre sits at t.
            let f = (i as f32 + 0.5) / tile_len - 0.5;
            if f <= 0.0 {
                return AxisWeight { t0: 0, t1: 0, a: 0.0 };
            }
            let t0 = (f.floor() as usize).min(tiles - 1);
            let t1 = (t0 + 1).min(tiles - 1);
            let a = if t0 == t1 { 0.0 } else { f - t0 as f32 };
            AxisWeight { t0, t1, a }
        })
        .collect()
}

/// Upper bound on lookup-table entries across all tiles (32 MiB of u16).
pub const MAX_LUT_ENTRIES: usize = 1 << 24;

/// Tile counts actually used for a `w × h` plane: each axis capped to the
/// image dimension, then both shrunk together until the per-tile lookup
/// tables fit in `MAX_LUT_ENTRIES`.
fn effective_grid(w: usize, h: usize, grid: TileGridSize, bins: usize) -> (usize, usize) {
    let mut cols = (grid.width as usize).clamp(1, w.max(1));
    let mut rows = (grid.height as usize).clamp(1, h.max(1));
    let max_tiles = (MAX_LUT_ENTRIES / bins).max(1);
    if cols.saturating_mul(rows) > max_tiles {
        let scale = (max_tiles as f64 / (cols as f64 * rows as f64)).sqrt();
        cols = ((cols as f64 * scale) as usize).max(1);
        rows = ((rows as f64 * scale) as usize).max(1);
        while cols * rows > max_tiles {
            if cols >= rows {
                cols -= 1;
            } else {
                rows -= 1;
            }
        }
        debug!("tile grid {}x{} capped to {cols}x{rows}", grid.width, grid.height);
    }
    (cols, rows)
}

/// Apply CLAHE to one plane, writing into `dst` and reusing `luts` as
/// scratch space for the per-tile lookup tables.
///
/// `dst` is reshaped to the source geometry. A `clip_limit` of 0 disables
/// clipping (plain adaptive histogram equalization).
///
/// Reference: Zuiderveld (1994), "Contrast Limited Adaptive Histogram
/// Equalization", Graphics Gems IV.
pub fn equalize_clahe_into<T: Pixel>(
    src: &Image<T>,
    dst: &mut Image<T>,
    grid: TileGridSize,
    clip_limit: f64,
    luts: &mut Vec<T>,
) {
    let w = src.width();
    let h = src.height();
    dst.reshape(w, h);
    if w == 0 || h == 0 {
        return;
    }

    let bins = T::BINS;
    let (cols, rows) = effective_grid(w, h, grid, bins);

    luts.clear();
    luts.resize(cols * rows * bins, T::default());
    let mut hist = vec![0u32; bins];

    for ty in 0..rows {
        let y0 = ty * h / rows;
        let y1 = (ty + 1) * h / rows;
        for tx in 0..cols {
            let x0 = tx * w / cols;
            let x1 = (tx + 1) * w / cols;
            let tile_pixels = (x1 - x0) * (y1 - y0);

            hist.iter_mut().for_each(|b| *b = 0);
            for y in y0..y1 {
                for &v in &src.row(y)[x0..x1] {
                    hist[v.bin()] += 1;
                }
            }

            if clip_limit > 0.0 {
                clip_histogram(&mut hist, tile_pixels, clip_limit);
            }

            let start = (ty * cols + tx) * bins;
            build_lut(&hist, tile_pixels, &mut luts[start..start + bins]);
        }
    }

    let xw = axis_weights(w, cols);
    let yw = axis_weights(h, rows);
    let lut_at = |tx: usize, ty: usize, bin: usize| {
        luts[(ty * cols + tx) * bins + bin].bin() as f32
    };

    for (y, wy) in yw.iter().enumerate() {
        let src_row = src.row(y);
        let dst_row = dst.row_mut(y);
        for ((out, &v), wx) in dst_row.iter_mut().zip(src_row).zip(&xw) {
            let b = v.bin();
            let v00 = lut_at(wx.t0, wy.t0, b);
            let v10 = lut_at(wx.t1, wy.t0, b);
            let v01 = lut_at(wx.t0, wy.t1, b);
            let v11 = lut_at(wx.t1, wy.t1, b);

            let val = v00 * (1.0 - wx.a) * (1.0 - wy.a)
                + v10 * wx.a * (1.0 - wy.a)
                + v01 * (1.0 - wx.a) * wy.a
                + v11 * wx.a * wy.a;

            *out = T::from_bin(val.round().max(0.0) as usize);
        }
    }
}

/// Convenience wrapper: CLAHE on one plane into a fresh image.
pub fn equalize_clahe<T: Pixel>(src: &Image<T>, grid: TileGridSize, clip_limit: f64) -> Image<T> {
    let mut dst = Image::new(0, 0);
    let mut luts = Vec::new();
    equalize_clahe_into(src, &mut dst, grid, clip_limit, &mut luts);
    dst
}

// ============================================================
// CpuClahe, the Equalizer implementation
// ============================================================

/// CPU CLAHE equalizer.
///
/// Holds its parameters plus per-depth scratch buffers for the tile lookup
/// tables. The buffers grow to fit the largest grid seen and are only freed
/// by [`Equalizer::collect_garbage`].
#[derive(Debug, Clone)]
pub struct CpuClahe {
    clip_limit: f64,
    tile_grid: TileGridSize,
    luts_u8: Vec<u8>,
    luts_u16: Vec<u16>,
}

impl CpuClahe {
    pub fn new(clip_limit: f64, tile_grid: TileGridSize) -> Self {
        CpuClahe {
            clip_limit: sanitize_clip_limit(clip_limit),
            tile_grid: tile_grid.sanitized(),
            luts_u8: Vec::new(),
            luts_u16: Vec::new(),
        }
    }

    /// Bytes currently held by the lookup-table scratch buffers.
    pub fn scratch_bytes(&self) -> usize {
        self.luts_u8.capacity() + self.luts_u16.capacity() * std::mem::size_of::<u16>()
    }
}

impl Default for CpuClahe {
    fn default() -> Self {
        CpuClahe::new(DEFAULT_CLIP_LIMIT, DEFAULT_TILE_GRID)
    }
}

/// Equalize every plane of `src` into `dst`, reusing `dst`'s planes.
fn apply_planes<T: Pixel>(
    src: &[Image<T>],
    dst: &mut Vec<Image<T>>,
    grid: TileGridSize,
    clip_limit: f64,
    luts: &mut Vec<T>,
) {
    dst.truncate(src.len());
    while dst.len() < src.len() {
        dst.push(Image::new(0, 0));
    }
    for (s, d) in src.iter().zip(dst.iter_mut()) {
        equalize_clahe_into(s, d, grid, clip_limit, luts);
    }
}

impl Equalizer for CpuClahe {
    fn apply(&mut self, src: &Mat, dst: &mut Mat) -> Result<()> {
        trace!(
            "clahe apply: {}x{}x{} {} grid={}x{} clip={}",
            src.width(),
            src.height(),
            src.channels(),
            src.depth(),
            self.tile_grid.width,
            self.tile_grid.height,
            self.clip_limit
        );

        // A destination of the wrong depth is replaced, not rejected.
        if dst.depth() != src.depth() {
            *dst = match src {
                Mat::U8(_) => Mat::U8(Vec::new()),
                Mat::U16(_) => Mat::U16(Vec::new()),
            };
        }

        match (src, dst) {
            (Mat::U8(s), Mat::U8(d)) => {
                apply_planes(s, d, self.tile_grid, self.clip_limit, &mut self.luts_u8)
            }
            (Mat::U16(s), Mat::U16(d)) => {
                apply_planes(s, d, self.tile_grid, self.clip_limit, &mut self.luts_u16)
            }
            _ => unreachable!("destination depth was matched to the source above"),
        }
        Ok(())
    }

    fn set_clip_limit(&mut self, clip_limit: f64) {
        self.clip_limit = sanitize_clip_limit(clip_limit);
    }

    fn clip_limit(&self) -> f64 {
        self.clip_limit
    }

    fn set_tiles_grid_size(&mut self, size: TileGridSize) {
        self.tile_grid = size.sanitized();
    }

    fn tiles_grid_size(&self) -> TileGridSize {
        self.tile_grid
    }

    fn collect_garbage(&mut self) {
        self.luts_u8 = Vec::new();
        self.luts_u16 = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: usize, h: usize) -> Image<u8> {
        let mut img = Image::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.set(x, y, ((x * 4) % 256) as u8);
            }
        }
        img
    }

    fn range(img: &Image<u8>) -> u8 {
        let lo = img.as_slice().iter().copied().min().unwrap_or(0);
        let hi = img.as_slice().iter().copied().max().unwrap_or(0);
        hi - lo
    }

    #[test]
    fn test_global_uniform_input() {
        // Each value appears once; CDF is linear → output ≈ input.
        let img = Image::from_vec(256, 1, (0..=255u8).collect());
        let out = equalize_histogram(&img);
        for x in 0..256 {
            let diff = (out.get(x, 0) as i32 - x as i32).abs();
            assert!(diff <= 1, "pixel {x}: expected ~{x}, got {}", out.get(x, 0));
        }
    }

    #[test]
    fn test_global_constant_image() {
        let img = Image::from_vec(10, 10, vec![128u8; 100]);
        let out = equalize_histogram(&img);
        let v = out.get(0, 0);
        assert!(out.as_slice().iter().all(|&p| p == v));
    }

    #[test]
    fn test_global_preserves_ordering() {
        let img = Image::from_vec(5, 1, vec![10u8, 50, 100, 150, 200]);
        let out = equalize_histogram(&img);
        for i in 1..5 {
            assert!(out.get(i, 0) >= out.get(i - 1, 0), "monotonicity violated at {i}");
        }
    }

    #[test]
    fn test_global_u16_stretches() {
        let img = Image::from_vec(4, 1, vec![1000u16, 1001, 1002, 1003]);
        let out = equalize_histogram(&img);
        assert_eq!(out.get(0, 0), 0);
        assert_eq!(out.get(3, 0), u16::MAX);
    }

    #[test]
    fn test_clip_preserves_count() {
        let mut hist = vec![0u32; 256];
        hist[10] = 1000;
        hist[20] = 24;
        clip_histogram(&mut hist, 1024, 2.0);
        assert_eq!(hist.iter().sum::<u32>(), 1024);
        assert!(hist[10] <= 8 + 4, "bin not clipped: {}", hist[10]);
    }

    #[test]
    fn test_axis_weights_edges() {
        let w = axis_weights(16, 2);
        // Left border clamps to the first tile.
        assert_eq!((w[0].t0, w[0].t1), (0, 0));
        // Right border clamps to the last tile.
        assert_eq!((w[15].t0, w[15].t1), (1, 1));
        // Between centres weights are in [0, 1).
        assert!(w[8].a > 0.0 && w[8].a < 1.0);
    }

    #[test]
    fn test_clahe_basic() {
        let img = gradient(64, 64);
        let out = equalize_clahe(&img, TileGridSize::square(4), 2.0);
        assert_eq!((out.width(), out.height()), (64, 64));
    }

    #[test]
    fn test_clahe_bimodal_expands_range() {
        let w = 64;
        let h = 32;
        let mut img = Image::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let base = if x < w / 2 { 30 } else { 200 };
                img.set(x, y, base + ((x + y * 7) % 20) as u8);
            }
        }
        let out = equalize_clahe(&img, TileGridSize::new(4, 2), 2.0);
        assert!(range(&out) > 50, "clahe range too small: {}", range(&out));
    }

    #[test]
    fn test_clahe_non_divisible_and_oversized_grid() {
        let img = Image::from_vec(10, 7, vec![128u8; 70]);
        let out = equalize_clahe(&img, TileGridSize::new(3, 3), 3.0);
        assert_eq!((out.width(), out.height()), (10, 7));

        // More tiles than pixels is capped to the image.
        let out = equalize_clahe(&img, TileGridSize::new(64, 64), 3.0);
        assert_eq!((out.width(), out.height()), (10, 7));
    }

    #[test]
    fn test_clahe_empty_image() {
        let img: Image<u8> = Image::new(0, 5);
        let out = equalize_clahe(&img, DEFAULT_TILE_GRID, 2.0);
        assert_eq!((out.width(), out.height()), (0, 5));
    }

    #[test]
    fn test_clahe_single_tile_matches_global_without_clip() {
        let img = gradient(32, 8);
        let global = equalize_histogram(&img);
        let clahe = equalize_clahe(&img, TileGridSize::square(1), 0.0);
        assert_eq!(global, clahe);
    }

    #[test]
    fn test_cpu_clahe_replaces_wrong_depth_destination() {
        let mut eq = CpuClahe::default();
        let src = Mat::gray16(Image::from_vec(4, 4, (0..16u16).map(|v| v * 1000).collect()));
        let mut dst = Mat::gray8(Image::new(2, 2));
        eq.apply(&src, &mut dst).unwrap();
        assert_eq!(dst.depth(), src.depth());
        assert_eq!((dst.width(), dst.height()), (4, 4));
    }

    #[test]
    fn test_cpu_clahe_collect_garbage_frees_scratch() {
        let mut eq = CpuClahe::new(2.0, TileGridSize::square(2));
        let src = Mat::gray8(gradient(16, 16));
        let mut dst = Mat::default();
        eq.apply(&src, &mut dst).unwrap();
        assert!(eq.scratch_bytes() > 0);
        eq.collect_garbage();
        assert_eq!(eq.scratch_bytes(), 0);
    }

    #[test]
    fn test_effective_grid_caps_lut_budget() {
        assert_eq!(effective_grid(640, 480, TileGridSize::square(8), 256), (8, 8));
        assert_eq!(effective_grid(5, 3, TileGridSize::square(8), 256), (5, 3));

        let (cols, rows) = effective_grid(256, 256, TileGridSize::square(256), 65536);
        assert!(cols * rows * 65536 <= MAX_LUT_ENTRIES);
        assert_eq!((cols, rows), (16, 16));

        let (cols, rows) = effective_grid(4096, 2, TileGridSize::new(4096, 2), 65536);
        assert!(cols * rows * 65536 <= MAX_LUT_ENTRIES);
        assert!(cols >= 1 && rows >= 1);
    }

    #[test]
    fn test_cpu_clahe_dense_u16_grid_stays_bounded() {
        let data: Vec<u16> = (0..256 * 256).map(|i| (i % 4096) as u16 * 16).collect();
        let src = Mat::gray16(Image::from_vec(256, 256, data));
        let mut eq = CpuClahe::new(2.0, TileGridSize::square(256));
        let mut dst = Mat::default();
        eq.apply(&src, &mut dst).unwrap();
        assert_eq!((dst.width(), dst.height()), (256, 256));
        assert!(eq.scratch_bytes() <= MAX_LUT_ENTRIES * 2);
    }

    #[test]
    fn test_cpu_clahe_setters_sanitize() {
        let mut eq = CpuClahe::default();
        eq.set_clip_limit(-1.0);
        assert_eq!(eq.clip_limit(), 0.0);
        eq.set_tiles_grid_size(TileGridSize { width: 0, height: 3 });
        assert_eq!(eq.tiles_grid_size(), TileGridSize::new(1, 3));
    }
}
