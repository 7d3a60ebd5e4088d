//! Walks the audio duration and decides where each transcription chunk ends.

use super::silence::{self, SilenceParams};
use super::AudioStream;

/// One planned slice of the source audio.
///
/// Spans are contiguous, non-overlapping, ordered by index (1-based), and
/// together cover the whole stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub index: u32,
    pub start_ms: u64,
    pub length_ms: u64,
}

impl ChunkSpan {
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.length_ms
    }
}

/// Plans chunk boundaries over the full stream. Each step looks for a pause
/// near the end of the next `target_chunk_ms` of audio and cuts at its
/// midpoint; when no pause qualifies, a fixed-length chunk is emitted instead.
/// The plan is a pure function of the samples and parameters, so repeated runs
/// over the same input line up with previously cached chunk artifacts.
pub fn plan_chunks(
    audio: &AudioStream,
    target_chunk_ms: u64,
    params: &SilenceParams,
) -> Vec<ChunkSpan> {
    let total_ms = audio.duration_ms();
    let mut spans = Vec::new();
    let mut current = 0u64;

    while current < total_ms {
        let nominal_end = (current + target_chunk_ms).min(total_ms);
        let window = audio.slice_ms(current, nominal_end - current);

        let length = match silence::find_cut_point(window, audio.sample_rate(), params) {
            // A cut at offset zero would not advance the cursor; fall back to
            // a fixed-length chunk so the plan always makes progress.
            Some(midpoint) if midpoint > 0 => midpoint,
            _ => target_chunk_ms.min(total_ms - current),
        };

        spans.push(ChunkSpan {
            index: spans.len() as u32 + 1,
            start_ms: current,
            length_ms: length,
        });
        current += length;
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SAMPLE_RATE;

    fn stream(segments: &[(u64, i16)]) -> AudioStream {
        let mut samples = Vec::new();
        for &(ms, amplitude) in segments {
            let count = (ms * u64::from(SAMPLE_RATE) / 1000) as usize;
            samples.extend((0..count).map(|i| if i % 2 == 0 { amplitude } else { -amplitude }));
        }
        AudioStream::from_samples(samples, SAMPLE_RATE)
    }

    fn assert_covers(spans: &[ChunkSpan], total_ms: u64) {
        let mut cursor = 0;
        for (i, span) in spans.iter().enumerate() {
            assert_eq!(span.index, i as u32 + 1);
            assert_eq!(span.start_ms, cursor, "spans must be contiguous");
            assert!(span.length_ms > 0);
            cursor = span.end_ms();
        }
        assert_eq!(cursor, total_ms, "spans must cover the whole stream");
    }

    #[test]
    fn short_audio_without_silence_is_one_chunk() {
        let audio = stream(&[(30_000, 8000)]);
        let spans = plan_chunks(&audio, 60_000, &SilenceParams::default());

        assert_eq!(
            spans,
            vec![ChunkSpan {
                index: 1,
                start_ms: 0,
                length_ms: 30_000
            }]
        );
    }

    #[test]
    fn cuts_at_pause_near_target_length() {
        // 150s of speech-level tone with one 2s pause centered at 58s.
        let audio = stream(&[(57_000, 8000), (2_000, 0), (91_000, 8000)]);
        let spans = plan_chunks(&audio, 60_000, &SilenceParams::default());

        assert_covers(&spans, 150_000);
        // First cut lands at the pause midpoint; the short leftover of the
        // pause then becomes its own small chunk before fixed-length chunks
        // resume over the pause-free remainder.
        assert_eq!(spans[0], ChunkSpan { index: 1, start_ms: 0, length_ms: 58_000 });
        assert_eq!(spans[1], ChunkSpan { index: 2, start_ms: 58_000, length_ms: 500 });
        assert_eq!(spans[2], ChunkSpan { index: 3, start_ms: 58_500, length_ms: 60_000 });
        assert_eq!(spans[3], ChunkSpan { index: 4, start_ms: 118_500, length_ms: 31_500 });
        assert_eq!(spans.len(), 4);
    }

    #[test]
    fn silence_free_audio_falls_back_to_fixed_chunks() {
        let audio = stream(&[(150_000, 8000)]);
        let spans = plan_chunks(&audio, 60_000, &SilenceParams::default());

        assert_covers(&spans, 150_000);
        assert_eq!(
            spans.iter().map(|s| s.length_ms).collect::<Vec<_>>(),
            vec![60_000, 60_000, 30_000]
        );
    }

    #[test]
    fn plan_is_deterministic() {
        let audio = stream(&[(20_000, 8000), (1_500, 0), (40_000, 8000), (1_200, 0), (10_000, 8000)]);
        let params = SilenceParams::default();

        let first = plan_chunks(&audio, 60_000, &params);
        let second = plan_chunks(&audio, 60_000, &params);

        assert_eq!(first, second);
        assert_covers(&first, audio.duration_ms());
    }

    #[test]
    fn empty_stream_plans_nothing() {
        let audio = AudioStream::from_samples(Vec::new(), SAMPLE_RATE);
        assert!(plan_chunks(&audio, 60_000, &SilenceParams::default()).is_empty());
    }
}
