use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use siren_domain::{ClassifyError, SAMPLE_RATE};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::dsp::downmix_interleaved;
use crate::resample::resample;

/// Mono waveform at a known sample rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioClip {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decodes audio files and brings them to a single channel at `target_rate`.
#[derive(Debug, Clone, Copy)]
pub struct AudioDecoder {
    target_rate: u32,
}

impl AudioDecoder {
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Decodes `path`, down-mixes to mono and resamples to the target rate.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<AudioClip, ClassifyError> {
        let native = Self::decode_native(path)?;
        let samples = resample(&native.samples, native.sample_rate, self.target_rate)?;
        Ok(AudioClip::new(samples, self.target_rate))
    }

    /// Decodes `path` to mono at whatever rate the file was stored with.
    pub fn decode_native<P: AsRef<Path>>(path: P) -> Result<AudioClip, ClassifyError> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .map_err(|err| ClassifyError::decode(format!("open {:?}: {err}", path_ref)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|err| ClassifyError::decode(err.to_string()))?;
        let mut format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ClassifyError::decode("no audio track found"))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|err| ClassifyError::decode(err.to_string()))?;

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphError::ResetRequired) => break,
                Err(err) => return Err(ClassifyError::decode(err.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate.get_or_insert(spec.rate);
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend(downmix_interleaved(
                        buffer.samples(),
                        spec.channels.count(),
                    ));
                }
                Err(SymphError::DecodeError(reason)) => {
                    // skip undecodable packet
                    warn!(reason, "skipping undecodable packet");
                }
                Err(err) => return Err(ClassifyError::decode(err.to_string())),
            }
        }

        let sample_rate =
            sample_rate.ok_or_else(|| ClassifyError::decode("stream has no sample rate"))?;
        debug!(
            path = ?path_ref,
            sample_rate,
            sample_count = samples.len(),
            "decoded audio"
        );
        Ok(AudioClip::new(samples, sample_rate))
    }
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::pcm16_wav;
    use siren_domain::ErrorKind;
    use std::io::Write;

    /// Both AAC fixtures hold this many silent 1024-sample frames.
    const AAC_FIXTURE_FRAMES: usize = 44;

    fn write_temp(bytes: &[u8], suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn audio_decoder_handles_missing_file() {
        let err = AudioDecoder::default().open("does-not-exist.wav").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn text_file_is_decode_error() {
        let file = write_temp(b"definitely not audio, just some text", ".wav");
        let err = AudioDecoder::default().open(file.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn decodes_mono_wav() {
        let samples: Vec<f32> = (0..4_410).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect();
        let file = write_temp(&pcm16_wav(&samples, 44_100, 1).unwrap(), ".wav");
        let clip = AudioDecoder::default().open(file.path()).unwrap();
        assert_eq!(clip.sample_rate, 44_100);
        assert_eq!(clip.samples.len(), samples.len());
        approx::assert_abs_diff_eq!(clip.samples[25], samples[25], epsilon = 1e-3);
    }

    #[test]
    fn stereo_is_downmixed() {
        let interleaved: Vec<f32> = (0..2_000)
            .flat_map(|_| [0.5f32, -0.5f32])
            .collect();
        let file = write_temp(&pcm16_wav(&interleaved, 44_100, 2).unwrap(), ".wav");
        let clip = AudioDecoder::default().open(file.path()).unwrap();
        assert_eq!(clip.samples.len(), 2_000);
        assert!(clip.samples.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn other_rates_are_resampled() {
        let samples = vec![0.25f32; 22_050];
        let file = write_temp(&pcm16_wav(&samples, 22_050, 1).unwrap(), ".wav");
        let clip = AudioDecoder::default().open(file.path()).unwrap();
        assert_eq!(clip.sample_rate, 44_100);
        assert_eq!(clip.samples.len(), 44_100);
        approx::assert_abs_diff_eq!(clip.duration_secs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn mp4_aac_under_wav_name_is_decoded() {
        // Phone recorders post MPEG-4/AAC audio named `recording.wav`.
        let file = write_temp(include_bytes!("../tests/fixtures/silence-lc.m4a"), ".wav");
        let clip = AudioDecoder::default().open(file.path()).unwrap();
        assert_eq!(clip.sample_rate, 44_100);
        assert_eq!(clip.samples.len(), AAC_FIXTURE_FRAMES * 1024);
        assert!(clip.samples.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn mp4_aac_with_matching_extension_is_decoded() {
        let file = write_temp(include_bytes!("../tests/fixtures/silence-lc.m4a"), ".m4a");
        let clip = AudioDecoder::decode_native(file.path()).unwrap();
        assert_eq!(clip.sample_rate, 44_100);
        assert_eq!(clip.samples.len(), AAC_FIXTURE_FRAMES * 1024);
    }

    #[test]
    fn adts_stream_under_wav_name_is_decoded() {
        let file = write_temp(include_bytes!("../tests/fixtures/silence-lc.aac"), ".wav");
        let clip = AudioDecoder::default().open(file.path()).unwrap();
        assert_eq!(clip.sample_rate, 44_100);
        assert_eq!(clip.samples.len(), AAC_FIXTURE_FRAMES * 1024);
    }
}
