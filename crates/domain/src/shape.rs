//! Fixed dimensions the exported classifier was trained with.

/// Sample rate every clip is resampled to before feature extraction.
pub const SAMPLE_RATE: u32 = 44_100;

/// Number of mel bands in the spectrogram.
pub const N_MELS: usize = 84;

/// Number of time frames kept after padding or truncation.
pub const N_FRAMES: usize = 117;

/// The single-channel spectrogram is replicated into this many channels.
pub const N_CHANNELS: usize = 3;

/// `(batch, channels, mels, frames)` accepted by the model.
pub const INPUT_SHAPE: [usize; 4] = [1, N_CHANNELS, N_MELS, N_FRAMES];
