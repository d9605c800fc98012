pub mod error;
pub mod label;
pub mod shape;

pub use crate::error::{ClassifyError, ErrorKind};
pub use crate::label::SirenClass;
pub use crate::shape::{INPUT_SHAPE, N_CHANNELS, N_FRAMES, N_MELS, SAMPLE_RATE};
