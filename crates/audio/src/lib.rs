pub mod dsp;
pub mod io;
pub mod mel;
pub mod resample;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use dsp::downmix_interleaved;
pub use io::{AudioClip, AudioDecoder};
pub use mel::{FixedLengthSpectrogram, MelSpectrogram, SpectrogramConfig, SpectrogramExtractor};
pub use resample::resample;
