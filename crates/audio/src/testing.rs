//! WAV fixtures shared by the test suites of this workspace.

use std::f32::consts::PI;
use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

/// Encodes interleaved samples in `[-1, 1]` as a 16-bit PCM WAV file.
pub fn pcm16_wav(samples: &[f32], sample_rate: u32, channels: u16) -> hound::Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Mono wailing tone: a carrier swept between 400 and 1000 Hz twice a second.
pub fn siren_sweep(seconds: f32, sample_rate: u32) -> Vec<f32> {
    (0..(sample_rate as f32 * seconds) as usize)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let freq = 700.0 + 300.0 * (2.0 * PI * 2.0 * t).sin();
            (2.0 * PI * freq * t).sin() * 0.37
        })
        .collect()
}
