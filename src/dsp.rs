//! Fingerprinting DSP pipeline: spectral analysis, peak extraction and
//! pairwise constellation hashing.

pub mod fingerprint;
pub mod peaks;
pub mod spectrogram;

use crate::error::Error;

/// Floor value (dB) below which magnitudes are clamped.
pub const DB_FLOOR: f32 = -140.0;

// Minimum power value to avoid log(0) in dB conversions.
const POWER_EPSILON: f32 = 1.0e-20;

// Natural log to decibel conversion factor: 10 / ln(10) ~= 4.342944819.
const LN_TO_DB: f32 = 4.342_944_8;

/// A mono PCM clip at a fixed sample rate.
///
/// Supplied by an external capture or decoding collaborator; the engine never
/// parses compressed audio itself.
#[derive(Debug, Clone, Copy)]
pub struct AudioClip<'a> {
    pub samples: &'a [f32],
    pub sample_rate: u32,
}

impl<'a> AudioClip<'a> {
    pub fn new(samples: &'a [f32], sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate.max(1) as f32
    }

    // Empty buffers and rate mismatches are rejected up front; retrying a
    // deterministic input changes nothing.
    pub(crate) fn validate(&self, expected_rate: u32) -> Result<(), Error> {
        if self.samples.is_empty() {
            return Err(Error::EmptyBuffer);
        }
        if self.sample_rate != expected_rate {
            return Err(Error::UnsupportedSampleRate {
                got: self.sample_rate,
                expected: expected_rate,
            });
        }
        Ok(())
    }
}

/// Magnitude spectra for a whole clip, one row of `bins` dB values per
/// analysis frame. Row-major, frame index outermost.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    bins: usize,
    magnitudes_db: Vec<f32>,
}

impl Spectrogram {
    pub(crate) fn with_capacity(bins: usize, frames: usize) -> Self {
        Self {
            bins,
            magnitudes_db: Vec::with_capacity(bins * frames),
        }
    }

    pub(crate) fn push_frame(&mut self, frame: &[f32]) {
        debug_assert_eq!(frame.len(), self.bins);
        self.magnitudes_db.extend_from_slice(frame);
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn frames(&self) -> usize {
        if self.bins == 0 {
            0
        } else {
            self.magnitudes_db.len() / self.bins
        }
    }

    pub fn frame(&self, index: usize) -> &[f32] {
        &self.magnitudes_db[index * self.bins..(index + 1) * self.bins]
    }
}

// Convert power (magnitude squared) to decibels with a custom floor.
#[inline(always)]
pub fn power_to_db(power: f32, floor: f32) -> f32 {
    if power > POWER_EPSILON {
        (power.ln() * LN_TO_DB).max(floor)
    } else {
        floor
    }
}

#[inline]
pub(crate) fn apply_window(buffer: &mut [f32], window: &[f32]) {
    debug_assert_eq!(buffer.len(), window.len());
    for (sample, coeff) in buffer.iter_mut().zip(window.iter()) {
        *sample *= *coeff;
    }
}
