// binding.rs — The CLAHE object as seen from a dynamically-typed caller.
//
// Every entry point takes and returns serde_json::Value, so the object can
// be driven from a script bridge, a JSON-RPC handler or a test table with
// the same call shapes:
//
//   let mut clahe = ClaheObject::construct(&[json!(2.0), json!([4, 4])])?;
//   let out = clahe.apply(&image, None)?;
//   clahe.set_clip_limit(&json!(3.0))?.set_tiles_grid_size(&json!(6))?;
//
// The object owns a `Clahe` handle. A failed constructor builds nothing; a
// failed setter leaves the handle untouched.

use serde_json::{json, Value};

use crate::args::{self, ArgPolicy, TileGridSize, DEFAULT_TILE_GRID};
use crate::convert;
use crate::equalizer::{Clahe, Equalizer};
use crate::error::{ArgumentError, Result};
use crate::histeq::CpuClahe;
use crate::settings::ClaheConfig;

/// Names of the read-only properties.
pub const PROP_CLIP_LIMIT: &str = "clipLimit";
pub const PROP_TILES_GRID_SIZE: &str = "tilesGridSize";

/// A constructible CLAHE object driven by dynamic values.
#[derive(Debug)]
pub struct ClaheObject<E: Equalizer = CpuClahe> {
    handle: Clahe<E>,
}

impl ClaheObject<CpuClahe> {
    /// Construct from zero, one or two arguments.
    pub fn construct(args: &[Value]) -> Result<Self> {
        Self::construct_with_policy(args, ArgPolicy::default())
    }

    /// Construct, choosing how an unparsable size in an options object
    /// is treated.
    pub fn construct_with_policy(args: &[Value], policy: ArgPolicy) -> Result<Self> {
        let params = args::resolve_constructor_args_with(args, policy)?;
        Ok(ClaheObject {
            handle: Clahe::from_params(params),
        })
    }

    /// Construct using the argument policy from a loaded configuration.
    pub fn construct_with_config(args: &[Value], config: &ClaheConfig) -> Result<Self> {
        Self::construct_with_policy(args, config.policy)
    }
}

impl<E: Equalizer> ClaheObject<E> {
    /// Wrap an existing handle.
    pub fn from_handle(handle: Clahe<E>) -> Self {
        ClaheObject { handle }
    }

    /// Equalize `src`.
    ///
    /// With a destination, the result is written into it and also
    /// returned. A `null` destination counts as none. Either argument
    /// failing to convert is an ImageConversion error, and `dst` is left
    /// untouched in that case.
    pub fn apply(&mut self, src: &Value, dst: Option<&mut Value>) -> Result<Value> {
        let src = convert::mat_from_value(src)?;
        match dst {
            Some(dst) if !dst.is_null() => {
                let mut out = convert::mat_from_value(dst)?;
                self.handle.apply_into(&src, &mut out)?;
                *dst = convert::mat_to_value(&out);
                Ok(dst.clone())
            }
            _ => {
                let out = self.handle.apply(&src)?;
                Ok(convert::mat_to_value(&out))
            }
        }
    }

    /// Set the clip limit from a number; negative values clamp to 0.
    pub fn set_clip_limit(&mut self, value: &Value) -> Result<&mut Self> {
        let clip = value.as_f64().ok_or(ArgumentError::ClipLimit)?;
        self.handle.set_clip_limit(clip);
        Ok(self)
    }

    pub fn get_clip_limit(&self) -> Value {
        json!(self.handle.clip_limit())
    }

    /// Set the tile grid from any accepted size shape. Named fields that
    /// are missing fall back to the default grid, not the current one.
    pub fn set_tiles_grid_size(&mut self, value: &Value) -> Result<&mut Self> {
        let grid = args::resolve_size(value, DEFAULT_TILE_GRID)
            .ok_or(ArgumentError::TilesGridSize)?;
        self.handle.set_tiles_grid_size(grid);
        Ok(self)
    }

    /// Current grid as `{ "width": w, "height": h }`.
    pub fn get_tiles_grid_size(&self) -> Value {
        size_value(self.handle.tiles_grid_size())
    }

    /// Read-only property access; `None` for unknown names.
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            PROP_CLIP_LIMIT => Some(self.get_clip_limit()),
            PROP_TILES_GRID_SIZE => Some(self.get_tiles_grid_size()),
            _ => None,
        }
    }

    pub fn collect_garbage(&mut self) -> &mut Self {
        self.handle.collect_garbage();
        self
    }

    pub fn handle(&self) -> &Clahe<E> {
        &self.handle
    }

    pub fn into_handle(self) -> Clahe<E> {
        self.handle
    }
}

fn size_value(size: TileGridSize) -> Value {
    json!({ "width": size.width, "height": size.height })
}
