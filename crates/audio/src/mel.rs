//! Mel spectrogram features.
//!
//! Frames are centered (zero padding of `n_fft / 2` on both sides), windowed
//! with a periodic Hann window and projected onto a Slaney-scale filter bank
//! with Slaney area normalisation. Power is converted to decibels relative to
//! the loudest cell of the same clip, then the time axis is forced to a fixed
//! number of frames.

use std::fmt;
use std::sync::Arc;

use ndarray::linalg::general_mat_vec_mul;
use ndarray::{s, Array1, Array2};
use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use siren_domain::{ClassifyError, N_FRAMES, N_MELS, SAMPLE_RATE};
use tracing::{debug, instrument};

use crate::io::AudioClip;
use crate::resample::resample;

/// Floor applied to power values before taking the logarithm.
const AMIN: f32 = 1e-10;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpectrogramConfig {
    pub sample_rate: u32,
    pub n_mels: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    /// Width of the time axis after padding or truncation.
    pub frames: usize,
    /// Dynamic range kept below the peak, in dB. `None` disables clipping.
    pub top_db: Option<f32>,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            n_mels: N_MELS,
            n_fft: 2048,
            hop_length: 512,
            frames: N_FRAMES,
            top_db: Some(80.0),
        }
    }
}

impl SpectrogramConfig {
    pub fn n_freqs(&self) -> usize {
        self.n_fft / 2 + 1
    }

    fn validate(&self) -> Result<(), ClassifyError> {
        if self.n_fft < 2 || self.n_fft % 2 != 0 {
            return Err(ClassifyError::shape(&[2], &[self.n_fft]));
        }
        if self.hop_length == 0 || self.n_mels == 0 || self.frames == 0 || self.sample_rate == 0 {
            return Err(ClassifyError::shape(
                &[N_MELS, N_FRAMES],
                &[self.n_mels, self.frames],
            ));
        }
        Ok(())
    }
}

/// `(n_mels, frames)` grid; power values until [`MelSpectrogram::into_db`].
#[derive(Debug, Clone, PartialEq)]
pub struct MelSpectrogram {
    data: Array2<f32>,
}

impl MelSpectrogram {
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.data
    }

    /// Converts power to dB using this spectrogram's own maximum as 0 dB.
    pub fn into_db(mut self, top_db: Option<f32>) -> Self {
        power_to_db(&mut self.data, top_db);
        self
    }

    /// Truncates from the end or zero-pads at the end to exactly `frames`.
    pub fn fix_length(self, frames: usize) -> FixedLengthSpectrogram {
        let (rows, cols) = self.data.dim();
        let data = if cols >= frames {
            self.data.slice(s![.., ..frames]).to_owned()
        } else {
            let mut padded = Array2::zeros((rows, frames));
            padded.slice_mut(s![.., ..cols]).assign(&self.data);
            padded
        };
        FixedLengthSpectrogram { data }
    }
}

/// Spectrogram whose time axis has been forced to a fixed width.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedLengthSpectrogram {
    data: Array2<f32>,
}

impl FixedLengthSpectrogram {
    /// Wraps an existing `(mels, frames)` array without checking its shape.
    pub fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array2<f32> {
        self.data
    }
}

/// Turns clips into fixed-size dB mel spectrograms.
#[derive(Clone)]
pub struct SpectrogramExtractor {
    config: SpectrogramConfig,
    window: Vec<f32>,
    filters: Array2<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl fmt::Debug for SpectrogramExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrogramExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SpectrogramExtractor {
    pub fn new(config: SpectrogramConfig) -> Result<Self, ClassifyError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SpectrogramConfig) -> Self {
        let window = hann_window(config.n_fft);
        let filters = mel_filterbank(
            config.sample_rate,
            config.n_fft,
            config.n_mels,
            0.0,
            config.sample_rate as f64 / 2.0,
        );
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(config.n_fft);
        Self {
            config,
            window,
            filters,
            fft,
        }
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    /// `(n_mels, n_fft / 2 + 1)` filter bank weights.
    pub fn filters(&self) -> &Array2<f32> {
        &self.filters
    }

    /// Full pipeline: mel power, dB relative to the clip peak, fixed width.
    #[instrument(skip(self, clip), fields(samples = clip.samples.len(), sample_rate = clip.sample_rate))]
    pub fn extract(&self, clip: &AudioClip) -> Result<FixedLengthSpectrogram, ClassifyError> {
        let samples = if clip.sample_rate == self.config.sample_rate {
            std::borrow::Cow::Borrowed(clip.samples.as_slice())
        } else {
            std::borrow::Cow::Owned(resample(
                &clip.samples,
                clip.sample_rate,
                self.config.sample_rate,
            )?)
        };
        let mel = self.mel_spectrogram(&samples)?;
        debug!(frames = mel.shape().1, target = self.config.frames, "mel spectrogram computed");
        Ok(mel.into_db(self.config.top_db).fix_length(self.config.frames))
    }

    /// Mel power spectrogram of `samples`, assumed to be at the configured rate.
    ///
    /// Each centered frame is projected onto the filter bank as soon as its
    /// power spectrum is known, so only the `(n_mels, frames)` result is held.
    pub fn mel_spectrogram(&self, samples: &[f32]) -> Result<MelSpectrogram, ClassifyError> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let pad = n_fft / 2;

        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);
        let n_frames = 1 + (padded.len() - n_fft) / hop;

        let mut data = Array2::<f32>::zeros((self.config.n_mels, n_frames));
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut power = Array1::<f32>::zeros(self.config.n_freqs());
        for frame in 0..n_frames {
            let start = frame * hop;
            for ((slot, sample), w) in input
                .iter_mut()
                .zip(&padded[start..start + n_fft])
                .zip(&self.window)
            {
                *slot = sample * w;
            }
            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|err| ClassifyError::inference(format!("fft failed: {err}")))?;
            for (cell, bin) in power.iter_mut().zip(&spectrum) {
                *cell = bin.norm_sqr();
            }
            general_mat_vec_mul(1.0, &self.filters, &power, 0.0, &mut data.column_mut(frame));
        }
        Ok(MelSpectrogram { data })
    }
}

impl Default for SpectrogramExtractor {
    fn default() -> Self {
        Self::build(SpectrogramConfig::default())
    }
}

/// In-place `10 * log10(S / max(S))`, floored at `amin` and clipped to `top_db`.
pub fn power_to_db(power: &mut Array2<f32>, top_db: Option<f32>) {
    let reference = power.iter().fold(0.0f32, |acc, &v| acc.max(v.abs()));
    let ref_db = 10.0 * reference.max(AMIN).log10();
    power.mapv_inplace(|v| 10.0 * v.max(AMIN).log10() - ref_db);
    if let Some(top_db) = top_db {
        let peak = power.iter().fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        let floor = peak - top_db;
        power.mapv_inplace(|v| v.max(floor));
    }
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / size as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// `n_mels + 2` band edges evenly spaced on the mel scale, in Hz.
fn mel_band_edges(n_mels: usize, fmin: f64, fmax: f64) -> Vec<f64> {
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect()
}

/// Triangular filters with Slaney area normalisation, `(n_mels, n_fft / 2 + 1)`.
pub fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f64,
    fmax: f64,
) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;
    let edges = mel_band_edges(n_mels, fmin, fmax);
    let mut weights = Array2::<f32>::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
        let enorm = 2.0 / (right - left);
        for k in 0..n_freqs {
            let freq = k as f64 * sample_rate as f64 / n_fft as f64;
            let lower = (freq - left) / (center - left);
            let upper = (right - freq) / (right - center);
            weights[[m, k]] = (lower.min(upper).max(0.0) * enorm) as f32;
        }
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn tone(freq: f32, seconds: f32) -> AudioClip {
        let len = (SAMPLE_RATE as f32 * seconds) as usize;
        let samples = (0..len)
            .map(|i| 0.8 * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        AudioClip::new(samples, SAMPLE_RATE)
    }

    #[test]
    fn slaney_scale_is_linear_below_one_khz() {
        assert_abs_diff_eq!(hz_to_mel(0.0), 0.0);
        assert_abs_diff_eq!(hz_to_mel(500.0), 7.5, epsilon = 1e-9);
        assert_abs_diff_eq!(hz_to_mel(1000.0), 15.0, epsilon = 1e-9);
        for hz in [50.0, 999.0, 4000.0, 22_050.0] {
            assert_abs_diff_eq!(mel_to_hz(hz_to_mel(hz)), hz, epsilon = 1e-6);
        }
    }

    #[test]
    fn filterbank_covers_every_band() {
        let filters = mel_filterbank(SAMPLE_RATE, 2048, N_MELS, 0.0, 22_050.0);
        assert_eq!(filters.dim(), (N_MELS, 1025));
        assert!(filters.iter().all(|w| *w >= 0.0));
        for row in filters.rows() {
            assert!(row.iter().any(|w| *w > 0.0));
        }
    }

    #[test]
    fn hann_window_is_periodic() {
        let window = hann_window(8);
        assert_abs_diff_eq!(window[0], 0.0);
        assert_abs_diff_eq!(window[4], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(window[1], window[7], epsilon = 1e-6);
    }

    #[test]
    fn frame_count_follows_centered_stft() {
        let extractor = SpectrogramExtractor::default();
        let mel = extractor.mel_spectrogram(&tone(440.0, 2.0).samples).unwrap();
        assert_eq!(mel.shape(), (N_MELS, 1 + 88_200 / 512));
    }

    #[test]
    fn per_frame_projection_matches_dense_product() {
        let config = SpectrogramConfig {
            sample_rate: 8_000,
            n_mels: 16,
            n_fft: 256,
            hop_length: 64,
            ..Default::default()
        };
        let extractor = SpectrogramExtractor::new(config).unwrap();
        let samples: Vec<f32> = (0..2_000)
            .map(|i| (i as f32 * 0.37).sin() * (1.0 + (i % 7) as f32 * 0.1))
            .collect();
        let streamed = extractor.mel_spectrogram(&samples).unwrap();

        let mut padded = vec![0.0f32; samples.len() + 256];
        padded[128..128 + samples.len()].copy_from_slice(&samples);
        let frames = 1 + (padded.len() - 256) / 64;
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(256);
        let window = hann_window(256);
        let mut power = Array2::<f32>::zeros((129, frames));
        for frame in 0..frames {
            let mut input: Vec<f32> = padded[frame * 64..frame * 64 + 256]
                .iter()
                .zip(&window)
                .map(|(s, w)| s * w)
                .collect();
            let mut spectrum = fft.make_output_vec();
            fft.process(&mut input, &mut spectrum).unwrap();
            for (cell, bin) in power.column_mut(frame).iter_mut().zip(&spectrum) {
                *cell = bin.norm_sqr();
            }
        }
        let dense = extractor.filters().dot(&power);

        assert_eq!(streamed.shape(), dense.dim());
        for (x, y) in streamed.values().iter().zip(dense.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-3 * y.abs().max(1.0));
        }
    }

    #[test]
    fn output_shape_is_fixed_for_any_duration() {
        let extractor = SpectrogramExtractor::default();
        for seconds in [0.01, 0.5, 1.0, 2.0, 4.0] {
            let fixed = extractor.extract(&tone(880.0, seconds)).unwrap();
            assert_eq!(fixed.shape(), (N_MELS, N_FRAMES), "{seconds}s clip");
        }
    }

    #[test]
    fn empty_clip_yields_zeros() {
        let extractor = SpectrogramExtractor::default();
        let fixed = extractor
            .extract(&AudioClip::new(Vec::new(), SAMPLE_RATE))
            .unwrap();
        assert_eq!(fixed.shape(), (N_MELS, N_FRAMES));
        assert!(fixed.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn silent_clip_is_finite() {
        let extractor = SpectrogramExtractor::default();
        let fixed = extractor
            .extract(&AudioClip::new(vec![0.0; SAMPLE_RATE as usize], SAMPLE_RATE))
            .unwrap();
        assert_eq!(fixed.shape(), (N_MELS, N_FRAMES));
        assert!(fixed.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn db_is_relative_to_clip_peak() {
        let extractor = SpectrogramExtractor::default();
        let fixed = extractor.extract(&tone(1000.0, 1.0)).unwrap();
        let values = fixed.values();
        let max = values.iter().fold(f32::NEG_INFINITY, |a, &v| a.max(v));
        let min = values.iter().fold(f32::INFINITY, |a, &v| a.min(v));
        assert_abs_diff_eq!(max, 0.0, epsilon = 1e-4);
        assert!(min >= -80.0 - 1e-3);
    }

    #[test]
    fn loudness_does_not_change_features() {
        let extractor = SpectrogramExtractor::default();
        let loud = tone(1000.0, 1.0);
        let quiet = AudioClip::new(
            loud.samples.iter().map(|s| s * 0.5).collect(),
            SAMPLE_RATE,
        );
        let a = extractor.extract(&loud).unwrap();
        let b = extractor.extract(&quiet).unwrap();
        for (x, y) in a.values().iter().zip(b.values().iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-2);
        }
    }

    #[test]
    fn tone_energy_lands_in_matching_band() {
        let extractor = SpectrogramExtractor::default();
        let fixed = extractor.extract(&tone(1000.0, 1.0)).unwrap();
        let column = fixed.values().column(40);
        let (band, _) = column
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        let edges = mel_band_edges(N_MELS, 0.0, 22_050.0);
        assert!(edges[band] <= 1000.0 && 1000.0 <= edges[band + 2], "band {band}");
    }

    #[test]
    fn long_clips_are_truncated_from_the_end() {
        let extractor = SpectrogramExtractor::default();
        let clip = tone(660.0, 3.0);
        let full = extractor
            .mel_spectrogram(&clip.samples)
            .unwrap()
            .into_db(Some(80.0));
        let fixed = extractor.extract(&clip).unwrap();
        assert!(full.shape().1 > N_FRAMES);
        assert_eq!(fixed.values(), &full.values().slice(s![.., ..N_FRAMES]).to_owned());
    }

    #[test]
    fn short_clips_are_zero_padded_at_the_end() {
        let extractor = SpectrogramExtractor::default();
        let clip = tone(660.0, 0.5);
        let natural = 1 + clip.samples.len() / 512;
        let fixed = extractor.extract(&clip).unwrap();
        let tail = fixed.values().slice(s![.., natural..]);
        assert!(tail.iter().all(|v| *v == 0.0));
        assert!(fixed.values().slice(s![.., ..natural]).iter().any(|v| *v < -1.0));
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = SpectrogramExtractor::default();
        let clip = tone(523.0, 1.5);
        assert_eq!(
            extractor.extract(&clip).unwrap(),
            extractor.extract(&clip).unwrap()
        );
    }

    #[test]
    fn foreign_rate_is_resampled_first() {
        let extractor = SpectrogramExtractor::default();
        let clip = AudioClip::new(vec![0.1; 22_050], 22_050);
        let fixed = extractor.extract(&clip).unwrap();
        assert_eq!(fixed.shape(), (N_MELS, N_FRAMES));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SpectrogramConfig {
            hop_length: 0,
            ..Default::default()
        };
        assert!(SpectrogramExtractor::new(config).is_err());
    }
}
