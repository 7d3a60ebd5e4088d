use anyhow::Context;
use std::io::Cursor;
use std::path::Path;
use tokio::process::Command;

use crate::Result;

pub mod planner;
pub mod silence;

pub use planner::{plan_chunks, ChunkSpan};
pub use silence::{find_cut_point, SilenceParams};

/// Canonical sample rate for all pipeline audio.
pub const SAMPLE_RATE: u32 = 16_000;

/// Decoded source audio in the canonical format: mono, 16 kHz, 16-bit PCM.
///
/// Created once per input file and read-only afterwards; chunk slicing borrows
/// sub-ranges instead of copying.
pub struct AudioStream {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioStream {
    pub fn from_samples(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Loads `source` by decoding it to a canonical WAV at `canonical_wav`.
    /// The decoded file doubles as a cache: when it already exists the ffmpeg
    /// step is skipped and the samples are read straight from it.
    pub async fn load(source: &Path, canonical_wav: &Path) -> Result<Self> {
        if !canonical_wav.exists() {
            decode_to_canonical_wav(source, canonical_wav).await?;
        } else {
            tracing::debug!("using cached decoded audio: {}", canonical_wav.display());
        }

        Self::read_wav(canonical_wav)
    }

    fn read_wav(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open decoded audio {}", path.display()))?;
        let spec = reader.spec();

        if spec.channels != 1 || spec.sample_rate != SAMPLE_RATE || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "decoded audio {} is not mono 16 kHz 16-bit PCM (got {} ch, {} Hz, {} bit)",
                path.display(),
                spec.channels,
                spec.sample_rate,
                spec.bits_per_sample
            );
        }

        let samples = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to read audio samples")?;

        Ok(Self::from_samples(samples, spec.sample_rate))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / u64::from(self.sample_rate)
    }

    /// Borrows the samples covering `[start_ms, start_ms + length_ms)`,
    /// clamped to the stream end.
    pub fn slice_ms(&self, start_ms: u64, length_ms: u64) -> &[i16] {
        let lo = self.sample_index(start_ms).min(self.samples.len());
        let hi = self
            .sample_index(start_ms + length_ms)
            .min(self.samples.len());
        &self.samples[lo..hi]
    }

    fn sample_index(&self, ms: u64) -> usize {
        (ms * u64::from(self.sample_rate) / 1000) as usize
    }
}

/// Decodes any ffmpeg-readable media file into the canonical WAV format.
/// Writes to a temp path first so an interrupted decode never leaves a
/// readable half-written file behind.
async fn decode_to_canonical_wav(source: &Path, dest: &Path) -> Result<()> {
    tracing::info!(
        "decoding {} to mono {} Hz WAV",
        source.display(),
        SAMPLE_RATE
    );

    if let Some(parent) = dest.parent() {
        fs_err::create_dir_all(parent)?;
    }
    let tmp = dest.with_extension("wav.tmp");

    let output = Command::new("ffmpeg")
        .args([
            "-i",
            &source.to_string_lossy(),
            "-vn", // No video
            "-ac",
            "1",
            "-ar",
            "16000",
            "-acodec",
            "pcm_s16le",
            "-f",
            "wav",
            "-y", // Overwrite output file
            &tmp.to_string_lossy(),
        ])
        .output()
        .await?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffmpeg failed to decode {}: {}", source.display(), error);
    }

    fs_err::rename(&tmp, dest)?;
    Ok(())
}

/// Encodes samples as an in-memory WAV file in the canonical format, ready to
/// be persisted or sent to the speech service.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_follows_sample_count() {
        let audio = AudioStream::from_samples(vec![0; 16_000], SAMPLE_RATE);
        assert_eq!(audio.duration_ms(), 1000);

        let audio = AudioStream::from_samples(vec![0; 24_000], SAMPLE_RATE);
        assert_eq!(audio.duration_ms(), 1500);
    }

    #[test]
    fn slicing_clamps_to_stream_end() {
        let audio = AudioStream::from_samples((0..16_000).map(|i| i as i16).collect(), SAMPLE_RATE);

        assert_eq!(audio.slice_ms(0, 100).len(), 1600);
        assert_eq!(audio.slice_ms(900, 500).len(), 1600);
        assert_eq!(audio.slice_ms(2000, 100).len(), 0);
    }

    #[test]
    fn encoded_wav_round_trips_through_hound() {
        let samples: Vec<i16> = vec![0, 1000, -1000, i16::MAX, i16::MIN];
        let bytes = encode_wav(&samples, SAMPLE_RATE).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }
}
