// args.rs — Normalizing dynamic call arguments into CLAHE parameters.
//
// Callers hand us loosely-typed values (serde_json::Value) shaped however
// is convenient for them:
//
//   clahe(2.5)                                   bare clip limit
//   clahe([4, 4])                                grid as an ordered pair
//   clahe({ width: 4, height: 4 })               grid as named fields
//   clahe({ clipLimit: 2.5, tileGridSize: 4 })   options object
//   clahe(2.5, { tileGridSize: [4, 6] })         clip + nested grid
//
// Every value is first classified into a `SizeArg` by one ordered match,
// then resolved. Classification never fails; resolution decides whether a
// variant is acceptable at a given call site.
//
// Resolved values are always sanitized: clip limit ≥ 0, grid components ≥ 1.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ArgumentError;

/// Clip limit used when the caller gives none.
pub const DEFAULT_CLIP_LIMIT: f64 = 40.0;

/// Tile grid used when the caller gives none.
pub const DEFAULT_TILE_GRID: TileGridSize = TileGridSize { width: 8, height: 8 };

/// Number of tiles the image is split into, horizontally and vertically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileGridSize {
    pub width: u32,
    pub height: u32,
}

impl TileGridSize {
    /// Build a grid, clamping each component to at least 1.
    pub fn new(width: u32, height: u32) -> Self {
        TileGridSize {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Square grid `n × n`.
    pub fn square(n: u32) -> Self {
        Self::new(n, n)
    }

    /// Build a grid from floating-point components: round to nearest,
    /// then clamp to `1..=u32::MAX`. NaN becomes 1.
    pub fn from_f64(width: f64, height: f64) -> Self {
        TileGridSize {
            width: round_component(width),
            height: round_component(height),
        }
    }

    /// Clamp both components to at least 1.
    pub fn sanitized(self) -> Self {
        Self::new(self.width, self.height)
    }
}

impl Default for TileGridSize {
    fn default() -> Self {
        DEFAULT_TILE_GRID
    }
}

impl From<(u32, u32)> for TileGridSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

// `as` from float saturates and maps NaN to 0, so the final max(1)
// covers NaN, negatives and zero together.
fn round_component(v: f64) -> u32 {
    (v.round() as u32).max(1)
}

/// Clamp a clip limit to be non-negative. NaN becomes 0.
pub fn sanitize_clip_limit(clip_limit: f64) -> f64 {
    if clip_limit.is_nan() {
        0.0
    } else {
        clip_limit.max(0.0)
    }
}

// ---------------------------------------------------------------------------
// SizeArg: the accepted shapes of a tile-grid argument
// ---------------------------------------------------------------------------

/// A tile-grid argument after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum SizeArg {
    /// `[w, h, ...]`: at least two numeric leading elements.
    Pair(f64, f64),
    /// `{ width?, height? }`: at least one of the keys present.
    NamedFields { width: Option<f64>, height: Option<f64> },
    /// `{ tileGridSize: <inner> }`.
    Nested(Box<SizeArg>),
    /// A bare number: square grid.
    Scalar(f64),
    /// `null`.
    Absent,
    /// Anything else.
    Unrecognized,
}

impl SizeArg {
    /// Classify a dynamic value. Checks run in a fixed order: pair,
    /// named fields, nested, scalar.
    pub fn classify(value: &Value) -> SizeArg {
        match value {
            Value::Array(items) => match (items.first(), items.get(1)) {
                (Some(Value::Number(w)), Some(Value::Number(h))) => {
                    match (w.as_f64(), h.as_f64()) {
                        (Some(w), Some(h)) => SizeArg::Pair(w, h),
                        _ => SizeArg::Unrecognized,
                    }
                }
                _ => SizeArg::Unrecognized,
            },
            Value::Object(map) if map.contains_key("width") || map.contains_key("height") => {
                SizeArg::NamedFields {
                    width: map.get("width").and_then(Value::as_f64),
                    height: map.get("height").and_then(Value::as_f64),
                }
            }
            Value::Object(map) => match map.get("tileGridSize") {
                Some(inner) => SizeArg::Nested(Box::new(SizeArg::classify(inner))),
                None => SizeArg::Unrecognized,
            },
            Value::Number(n) => n.as_f64().map_or(SizeArg::Unrecognized, SizeArg::Scalar),
            Value::Null => SizeArg::Absent,
            _ => SizeArg::Unrecognized,
        }
    }

    /// Resolve to a grid, filling missing named fields from `default`.
    /// Returns `None` for shapes that do not describe a grid.
    pub fn resolve(&self, default: TileGridSize) -> Option<TileGridSize> {
        match self {
            SizeArg::Pair(w, h) => Some(TileGridSize::from_f64(*w, *h)),
            SizeArg::NamedFields { width, height } => Some(TileGridSize::from_f64(
                width.unwrap_or(default.width as f64),
                height.unwrap_or(default.height as f64),
            )),
            SizeArg::Nested(inner) => inner.resolve(default),
            SizeArg::Scalar(n) => Some(TileGridSize::from_f64(*n, *n)),
            SizeArg::Absent | SizeArg::Unrecognized => None,
        }
    }
}

/// Resolve a tile-grid size from any accepted shape.
pub fn resolve_size(input: &Value, default: TileGridSize) -> Option<TileGridSize> {
    SizeArg::classify(input).resolve(default)
}

/// Resolve a clip limit: `null` keeps `current`, a number replaces it,
/// anything else is rejected. The result is not clamped.
pub fn resolve_clip_limit(input: &Value, current: f64) -> Option<f64> {
    match input {
        Value::Null => Some(current),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Constructor dispatch
// ---------------------------------------------------------------------------

/// How the constructor treats an options object whose size cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgPolicy {
    /// A size named in an options object must parse, the same as a
    /// size passed as the second argument.
    #[default]
    Strict,
    /// An unparsable size inside an options object keeps the default.
    Legacy,
}

/// Canonical constructor parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaheParams {
    pub clip_limit: f64,
    pub tile_grid: TileGridSize,
}

impl Default for ClaheParams {
    fn default() -> Self {
        ClaheParams {
            clip_limit: DEFAULT_CLIP_LIMIT,
            tile_grid: DEFAULT_TILE_GRID,
        }
    }
}

impl ClaheParams {
    fn sanitized(self) -> Self {
        ClaheParams {
            clip_limit: sanitize_clip_limit(self.clip_limit),
            tile_grid: self.tile_grid.sanitized(),
        }
    }
}

/// Resolve constructor arguments with the default (strict) policy.
pub fn resolve_constructor_args(args: &[Value]) -> Result<ClaheParams, ArgumentError> {
    resolve_constructor_args_with(args, ArgPolicy::default())
}

/// Resolve constructor arguments.
///
/// Accepted call shapes:
/// - `()` → defaults
/// - `(options)` → `clipLimit` plus `width`/`height` or `tileGridSize`
/// - `(clipLimit)` or `(size)` → whichever the value parses as, clip first
/// - any of the above followed by `size`
pub fn resolve_constructor_args_with(
    args: &[Value],
    policy: ArgPolicy,
) -> Result<ClaheParams, ArgumentError> {
    let mut params = ClaheParams::default();

    match args.first() {
        None => {}
        Some(Value::Object(opts)) => {
            if let Some(clip) = opts.get("clipLimit") {
                params.clip_limit = resolve_clip_limit(clip, params.clip_limit)
                    .ok_or(ArgumentError::InvalidConstructorArgs)?;
            }

            let first = &args[0];
            let names_size = opts.contains_key("width")
                || opts.contains_key("height")
                || opts.contains_key("tileGridSize");
            match resolve_size(first, params.tile_grid) {
                Some(grid) => params.tile_grid = grid,
                None if names_size && policy == ArgPolicy::Strict => {
                    return Err(ArgumentError::TileGridSize);
                }
                None if names_size => {
                    warn!(
                        "ignoring unparsable tileGridSize in options; keeping {:?}",
                        params.tile_grid
                    );
                }
                None => {}
            }
        }
        Some(first) => {
            if let Some(clip) = resolve_clip_limit(first, params.clip_limit) {
                params.clip_limit = clip;
            } else if let Some(grid) = resolve_size(first, params.tile_grid) {
                params.tile_grid = grid;
            } else {
                return Err(ArgumentError::InvalidConstructorArgs);
            }
        }
    }

    // A second argument, `null` included, must describe a grid.
    if let Some(size) = args.get(1) {
        params.tile_grid =
            resolve_size(size, params.tile_grid).ok_or(ArgumentError::TileGridSize)?;
    }

    let params = params.sanitized();
    debug!(
        "resolved CLAHE arguments: clip_limit={}, tile_grid={}x{}",
        params.clip_limit, params.tile_grid.width, params.tile_grid.height
    );
    Ok(params)
}
