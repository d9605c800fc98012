use ndarray::{Array4, ArrayView2};
use siren_audio::FixedLengthSpectrogram;
use siren_domain::{ClassifyError, N_CHANNELS, N_FRAMES, N_MELS};

/// `(1, channels, mels, frames)` model input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    pub fn shape(&self) -> [usize; 4] {
        let (batch, channels, mels, frames) = self.data.dim();
        [batch, channels, mels, frames]
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }

    pub fn channel(&self, index: usize) -> Option<ArrayView2<'_, f32>> {
        if index >= self.data.dim().1 {
            return None;
        }
        Some(self.data.slice(ndarray::s![0, index, .., ..]))
    }
}

/// Replicates a single spectrogram into the channel layout the model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorBuilder {
    channels: usize,
    mels: usize,
    frames: usize,
}

impl TensorBuilder {
    pub fn new(channels: usize, mels: usize, frames: usize) -> Self {
        Self {
            channels,
            mels,
            frames,
        }
    }

    pub fn build(&self, spectrogram: &FixedLengthSpectrogram) -> Result<InputTensor, ClassifyError> {
        let (mels, frames) = spectrogram.shape();
        if (mels, frames) != (self.mels, self.frames) {
            return Err(ClassifyError::shape(&[self.mels, self.frames], &[mels, frames]));
        }
        let data = spectrogram
            .values()
            .broadcast((1, self.channels, self.mels, self.frames))
            .ok_or_else(|| ClassifyError::shape(&[self.mels, self.frames], &[mels, frames]))?
            .to_owned();
        Ok(InputTensor { data })
    }
}

impl Default for TensorBuilder {
    fn default() -> Self {
        Self::new(N_CHANNELS, N_MELS, N_FRAMES)
    }
}
