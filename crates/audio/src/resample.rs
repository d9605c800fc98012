//! Sample-rate conversion with rubato's sinc resampler.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use siren_domain::ClassifyError;
use tracing::debug;

/// Resamples a mono signal from `from_rate` to `to_rate`.
///
/// The output always holds `ceil(len * to_rate / from_rate)` samples with the
/// filter delay removed, so the result lines up with the input in time.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, ClassifyError> {
    if from_rate == 0 || to_rate == 0 {
        return Err(ClassifyError::decode(format!(
            "invalid sample rate conversion {from_rate} Hz -> {to_rate} Hz"
        )));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let expected = (samples.len() as f64 * ratio).ceil() as usize;
    debug!(from_rate, to_rate, input_len = samples.len(), expected, "resampling");

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|err| ClassifyError::decode(format!("resampler setup failed: {err}")))?;
    let delay = resampler.output_delay();

    let input = [samples];
    let mut output = resampler
        .process(&input[..], None)
        .map_err(|err| ClassifyError::decode(format!("resampling failed: {err}")))?
        .into_iter()
        .next()
        .unwrap_or_default();

    // flush the filter tail until the delayed signal is fully out
    while output.len() < expected + delay {
        let tail = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|err| ClassifyError::decode(format!("resampling failed: {err}")))?
            .into_iter()
            .next()
            .unwrap_or_default();
        if tail.is_empty() {
            break;
        }
        output.extend(tail);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * seconds) as usize;
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 44_100, 44_100).unwrap(), input);
    }

    #[test]
    fn upsampling_scales_length() {
        let input = sine(440.0, 22_050, 0.5);
        let output = resample(&input, 22_050, 44_100).unwrap();
        assert_eq!(output.len(), input.len() * 2);
        assert!(output.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn downsampling_preserves_amplitude() {
        let input = sine(440.0, 48_000, 0.5);
        let output = resample(&input, 48_000, 44_100).unwrap();
        assert_eq!(output.len(), 22_050);
        let middle = &output[5_000..15_000];
        let peak = middle.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.8 && peak < 1.2, "peak {peak}");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(resample(&[], 8_000, 44_100).unwrap().is_empty());
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(resample(&[0.0; 16], 0, 44_100).is_err());
    }
}
