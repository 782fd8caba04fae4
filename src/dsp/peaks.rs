//! Constellation extraction: locally dominant time-frequency peaks.

use super::Spectrogram;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Configuration for peak picking over the spectrogram tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Tile extent along the time axis, in frames.
    pub tile_frames: usize,
    /// Tile extent along the frequency axis, in bins.
    pub tile_bins: usize,
    /// How far (dB) a tile maximum must rise above the tile mean to count as
    /// locally dominant.
    pub min_prominence_db: f32,
    /// Absolute floor (dB); anything quieter is background.
    pub min_magnitude_db: f32,
    /// Cap on peaks kept per analysis frame.
    pub max_peaks_per_frame: usize,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            tile_frames: 8,
            tile_bins: 8,
            min_prominence_db: 6.0,
            min_magnitude_db: -80.0,
            max_peaks_per_frame: 5,
        }
    }
}

impl PeakConfig {
    pub(crate) fn normalized(mut self) -> Self {
        self.tile_frames = self.tile_frames.max(1);
        self.tile_bins = self.tile_bins.max(1);
        self.min_prominence_db = self.min_prominence_db.max(0.0);
        self.max_peaks_per_frame = self.max_peaks_per_frame.max(1);
        self
    }
}

/// One locally dominant point of the spectrogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub bin: u16,
    pub frame: u32,
    pub magnitude_db: f32,
}

/// Extract the peak constellation, time-ordered.
///
/// An empty spectrogram (or all-silence input) yields an empty list; whether
/// that is an error is decided downstream.
pub fn extract_peaks(spectrogram: &Spectrogram, config: &PeakConfig) -> Vec<Peak> {
    let frames = spectrogram.frames();
    let bins = spectrogram.bins();
    if frames == 0 || bins == 0 {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    let mut t0 = 0;
    while t0 < frames {
        let t1 = (t0 + config.tile_frames).min(frames);
        let mut f0 = 0;
        while f0 < bins {
            let f1 = (f0 + config.tile_bins).min(bins);
            if let Some(peak) = tile_maximum(spectrogram, t0, t1, f0, f1, config) {
                peaks.push(peak);
            }
            f0 = f1;
        }
        t0 = t1;
    }

    cap_per_frame(&mut peaks, config.max_peaks_per_frame);
    peaks
}

// Scan order is frame-major ascending with strict `>`, so ties resolve to the
// earliest frame and lowest bin.
fn tile_maximum(
    spectrogram: &Spectrogram,
    t0: usize,
    t1: usize,
    f0: usize,
    f1: usize,
    config: &PeakConfig,
) -> Option<Peak> {
    let mut best = f32::NEG_INFINITY;
    let mut best_frame = t0;
    let mut best_bin = f0;
    let mut sum = 0.0f64;

    for t in t0..t1 {
        let row = spectrogram.frame(t);
        for (f, &value) in row[f0..f1].iter().enumerate() {
            sum += value as f64;
            if value > best {
                best = value;
                best_frame = t;
                best_bin = f0 + f;
            }
        }
    }

    let cells = ((t1 - t0) * (f1 - f0)) as f64;
    let mean = (sum / cells) as f32;
    let dominant = best >= config.min_magnitude_db && best - mean >= config.min_prominence_db;
    dominant.then(|| Peak {
        bin: best_bin as u16,
        frame: best_frame as u32,
        magnitude_db: best,
    })
}

// Keep at most `cap` peaks per frame, by descending magnitude with ascending
// bin as the tie-break, then restore time order.
fn cap_per_frame(peaks: &mut Vec<Peak>, cap: usize) {
    peaks.sort_by(|a, b| {
        a.frame
            .cmp(&b.frame)
            .then(
                b.magnitude_db
                    .partial_cmp(&a.magnitude_db)
                    .unwrap_or(Ordering::Equal),
            )
            .then(a.bin.cmp(&b.bin))
    });

    let mut current = None;
    let mut kept = 0usize;
    peaks.retain(|peak| {
        if current != Some(peak.frame) {
            current = Some(peak.frame);
            kept = 0;
        }
        kept += 1;
        kept <= cap
    });

    peaks.sort_by(|a, b| a.frame.cmp(&b.frame).then(a.bin.cmp(&b.bin)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::DB_FLOOR;

    fn flat_spectrogram(bins: usize, frames: usize, level_db: f32) -> Spectrogram {
        let mut sg = Spectrogram::with_capacity(bins, frames);
        let row = vec![level_db; bins];
        for _ in 0..frames {
            sg.push_frame(&row);
        }
        sg
    }

    fn spike(sg_bins: usize, frames: usize, hits: &[(usize, usize, f32)]) -> Spectrogram {
        let mut sg = Spectrogram::with_capacity(sg_bins, frames);
        for t in 0..frames {
            let mut row = vec![DB_FLOOR; sg_bins];
            for &(frame, bin, db) in hits {
                if frame == t {
                    row[bin] = db;
                }
            }
            sg.push_frame(&row);
        }
        sg
    }

    #[test]
    fn silence_yields_no_peaks() {
        let sg = flat_spectrogram(64, 32, DB_FLOOR);
        assert!(extract_peaks(&sg, &PeakConfig::default()).is_empty());
    }

    #[test]
    fn uniform_energy_is_not_locally_dominant() {
        let sg = flat_spectrogram(64, 32, -20.0);
        assert!(extract_peaks(&sg, &PeakConfig::default()).is_empty());
    }

    #[test]
    fn isolated_spike_is_found() {
        let sg = spike(64, 16, &[(5, 33, -10.0)]);
        let peaks = extract_peaks(&sg, &PeakConfig::default());
        assert_eq!(peaks.len(), 1);
        assert_eq!((peaks[0].frame, peaks[0].bin), (5, 33));
    }

    #[test]
    fn quiet_spike_below_floor_is_rejected() {
        let sg = spike(64, 16, &[(5, 33, -100.0)]);
        assert!(extract_peaks(&sg, &PeakConfig::default()).is_empty());
    }

    #[test]
    fn per_frame_cap_prefers_louder_peaks() {
        // Three spikes on one frame, each in its own frequency tile.
        let sg = spike(64, 8, &[(2, 4, -30.0), (2, 20, -10.0), (2, 36, -20.0)]);
        let config = PeakConfig {
            max_peaks_per_frame: 2,
            ..PeakConfig::default()
        };
        let peaks = extract_peaks(&sg, &config);
        assert_eq!(peaks.len(), 2);
        let bins: Vec<u16> = peaks.iter().map(|p| p.bin).collect();
        assert_eq!(bins, vec![20, 36]);
    }

    #[test]
    fn output_is_time_ordered() {
        let sg = spike(64, 32, &[(20, 10, -10.0), (3, 50, -10.0), (11, 30, -10.0)]);
        let peaks = extract_peaks(&sg, &PeakConfig::default());
        let frames: Vec<u32> = peaks.iter().map(|p| p.frame).collect();
        assert_eq!(frames, vec![3, 11, 20]);
    }
}
