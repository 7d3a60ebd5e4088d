//! Locates low-energy intervals to use as chunk cut points.

/// Energy is measured over frames of this many milliseconds.
const FRAME_MS: u64 = 10;

/// Full-scale amplitude for 16-bit samples, the 0 dBFS reference.
const FULL_SCALE: f64 = 32768.0;

/// Tuning for silence detection.
#[derive(Debug, Clone)]
pub struct SilenceParams {
    /// Minimum length a low-energy run must reach to count as silence
    pub min_silence_ms: u64,

    /// Frames below this dBFS level are considered silent
    pub threshold_db: f64,

    /// Size of the windows scanned backward from the range end
    pub scan_window_ms: u64,
}

impl Default for SilenceParams {
    fn default() -> Self {
        Self {
            min_silence_ms: 1000,
            threshold_db: -16.0,
            scan_window_ms: 5000,
        }
    }
}

/// Finds a cut point inside `samples`, scanning backward from the end in
/// `scan_window_ms` windows so the cut lands as close to the nominal chunk end
/// as a real pause allows. Returns the midpoint of the last silent interval in
/// the first window that contains one, as a millisecond offset from the start
/// of `samples`, or `None` when the whole range has no qualifying silence.
pub fn find_cut_point(samples: &[i16], sample_rate: u32, params: &SilenceParams) -> Option<u64> {
    let total_ms = duration_ms(samples.len(), sample_rate);
    let mut window_end = total_ms;

    while window_end > 0 {
        let window_start = window_end.saturating_sub(params.scan_window_ms);
        let lo = sample_index(window_start, sample_rate).min(samples.len());
        let hi = sample_index(window_end, sample_rate).min(samples.len());

        let runs = silent_ranges(&samples[lo..hi], sample_rate, params);
        if let Some(&(run_start, run_end)) = runs.last() {
            return Some(window_start + (run_start + run_end) / 2);
        }

        window_end = window_start;
    }

    None
}

/// Contiguous runs of silent frames at least `min_silence_ms` long, as
/// `(start_ms, end_ms)` offsets relative to the slice start.
fn silent_ranges(samples: &[i16], sample_rate: u32, params: &SilenceParams) -> Vec<(u64, u64)> {
    let frame_len = sample_index(FRAME_MS, sample_rate).max(1);
    let total_ms = duration_ms(samples.len(), sample_rate);

    let mut runs = Vec::new();
    let mut run_start: Option<u64> = None;

    for (i, frame) in samples.chunks(frame_len).enumerate() {
        let frame_start = i as u64 * FRAME_MS;

        if dbfs(frame) < params.threshold_db {
            if run_start.is_none() {
                run_start = Some(frame_start);
            }
        } else if let Some(start) = run_start.take() {
            if frame_start - start >= params.min_silence_ms {
                runs.push((start, frame_start));
            }
        }
    }

    if let Some(start) = run_start {
        if total_ms - start >= params.min_silence_ms {
            runs.push((start, total_ms));
        }
    }

    runs
}

/// RMS level of a frame relative to full scale, in dBFS.
fn dbfs(frame: &[i16]) -> f64 {
    if frame.is_empty() {
        return f64::NEG_INFINITY;
    }

    let sum_squares: f64 = frame
        .iter()
        .map(|&sample| {
            let value = f64::from(sample);
            value * value
        })
        .sum();
    let rms = (sum_squares / frame.len() as f64).sqrt();

    if rms == 0.0 {
        return f64::NEG_INFINITY;
    }

    20.0 * (rms / FULL_SCALE).log10()
}

fn duration_ms(sample_count: usize, sample_rate: u32) -> u64 {
    sample_count as u64 * 1000 / u64::from(sample_rate)
}

fn sample_index(ms: u64, sample_rate: u32) -> usize {
    (ms * u64::from(sample_rate) / 1000) as usize
}
