//! Whole-clip spectral analysis built on a short-time Fourier transform.

use super::{DB_FLOOR, Spectrogram, apply_window, power_to_db};
use realfft::RealFftPlanner;
use rustfft::num_complex::Complex32;
use serde::{Deserialize, Serialize};

pub const MIN_WINDOW_SIZE: usize = 256;
pub const MAX_WINDOW_SIZE: usize = 16_384;

/// Configuration for STFT analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    /// Analysis window length in samples (power of two for radix-2 implementations).
    pub window_size: usize,
    /// Hop between successive frames, at most one window.
    pub hop_size: usize,
    /// Window function applied before the transform to reduce spectral leakage.
    pub window: WindowKind,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 256,
            window: WindowKind::Hann,
        }
    }
}

impl SpectrogramConfig {
    pub(crate) fn normalized(mut self) -> Self {
        self.window_size = self
            .window_size
            .next_power_of_two()
            .clamp(MIN_WINDOW_SIZE, MAX_WINDOW_SIZE);
        self.hop_size = self.hop_size.clamp(1, self.window_size);
        self
    }

    /// Magnitude bins per frame: `window_size / 2 + 1`.
    pub fn bins(&self) -> usize {
        self.window_size / 2 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
}

impl WindowKind {
    fn coefficients(self, len: usize) -> Vec<f32> {
        match self {
            WindowKind::Rectangular => vec![1.0; len],
            WindowKind::Hann => (0..len)
                .map(|n| {
                    let phase = (n as f32) * core::f32::consts::TAU / (len as f32);
                    0.5 * (1.0 - phase.cos())
                })
                .collect(),
            WindowKind::Hamming => (0..len)
                .map(|n| {
                    let phase = (n as f32) * core::f32::consts::TAU / (len as f32);
                    0.54 - 0.46 * phase.cos()
                })
                .collect(),
            WindowKind::Blackman => {
                let a0 = 0.42;
                let a1 = 0.5;
                let a2 = 0.08;
                (0..len)
                    .map(|n| {
                        let phase = (n as f32) * core::f32::consts::TAU / (len as f32);
                        a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
                    })
                    .collect()
            }
        }
    }
}

/// Compute dB magnitude spectra for every hop position of `samples`.
///
/// Clips shorter than one window are zero-padded to a single frame; trailing
/// samples that cannot fill another full window are dropped. Pure and
/// stateless: identical input always yields identical output.
pub fn analyze(samples: &[f32], config: &SpectrogramConfig) -> Spectrogram {
    let size = config.window_size;
    let hop = config.hop_size;
    let bins = config.bins();

    let window = config.window.coefficients(size);
    let fft = RealFftPlanner::<f32>::new().plan_fft_forward(size);
    let mut input = vec![0.0f32; size];
    let mut output = vec![Complex32::default(); bins];
    let mut scratch = vec![Complex32::default(); fft.get_scratch_len()];
    let mut frame_db = vec![DB_FLOOR; bins];

    let frame_count = if samples.len() < size {
        1
    } else {
        (samples.len() - size) / hop + 1
    };
    let mut spectrogram = Spectrogram::with_capacity(bins, frame_count);

    let scale = 1.0 / size as f32;
    let scale_sq = scale * scale;

    for frame in 0..frame_count {
        let start = frame * hop;
        let available = (samples.len() - start).min(size);
        input[..available].copy_from_slice(&samples[start..start + available]);
        input[available..].fill(0.0);
        apply_window(&mut input, &window);

        if fft
            .process_with_scratch(&mut input, &mut output, &mut scratch)
            .is_err()
        {
            frame_db.fill(DB_FLOOR);
        } else {
            for (value, spectrum) in frame_db.iter_mut().zip(output.iter()) {
                let power = spectrum.norm_sqr() * scale_sq;
                *value = power_to_db(power, DB_FLOOR);
            }
        }
        spectrogram.push_frame(&frame_db);
    }

    spectrogram
}
