// clahe-kit: a CLAHE equalizer object driven by dynamically-typed arguments
//
// Arguments arrive as serde_json values, are normalized into a clip limit
// and a tile grid (args), configure an owned equalizer handle (equalizer,
// histeq) and results go back out as values (binding, convert).
//
// Reference: Zuiderveld, "Contrast Limited Adaptive Histogram
// Equalization", Graphics Gems IV (1994)

pub mod error;
pub mod image;
pub mod mat;
pub mod args;
pub mod histeq;
pub mod equalizer;
pub mod convert;
pub mod settings;
pub mod binding;

pub use args::{ArgPolicy, ClaheParams, SizeArg, TileGridSize};
pub use binding::ClaheObject;
pub use equalizer::{Clahe, Equalizer};
pub use error::{ArgumentError, ClaheError};
pub use histeq::CpuClahe;
pub use mat::Mat;
