//! Audio fingerprinting and matching core.
//!
//! Turns mono PCM clips into sparse constellation fingerprints, persists them
//! for reverse lookup, and identifies query clips by offset-aligned hash
//! voting. Capture, format decoding and any serving layer live outside this
//! crate; everything here consumes plain sample buffers and produces ranked
//! match results.

pub mod config;
pub mod dsp;
pub mod error;
pub mod matcher;
pub mod store;

pub use config::EngineConfig;
pub use dsp::fingerprint::Fingerprint;
pub use dsp::{AudioClip, Spectrogram};
pub use error::Error;
pub use matcher::{MatchCandidate, MatchConfig, MatchOutcome};
pub use store::memory::MemoryStore;
pub use store::sqlite::SqliteStore;
pub use store::{FingerprintStore, Song, SongId};

use tracing::{debug, info};

/// Fingerprinting engine bound to a store backend.
///
/// The store handle is injected so one contract covers in-memory and on-disk
/// corpora alike. Ingestion needs `&mut`; queries share `&self`.
pub struct Engine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: FingerprintStore> Engine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Run the full pipeline on one clip: spectrogram → constellation →
    /// hash records. Shared verbatim between ingestion and query.
    pub fn fingerprint(&self, clip: &AudioClip<'_>) -> Result<Vec<Fingerprint>, Error> {
        clip.validate(self.config.sample_rate)?;
        let spectrogram = dsp::spectrogram::analyze(clip.samples, &self.config.spectrogram);
        let peaks = dsp::peaks::extract_peaks(&spectrogram, &self.config.peaks);
        let records = dsp::fingerprint::hash_peaks(&peaks, &self.config.fingerprint);
        debug!(
            "[pipeline] {} frames -> {} peaks -> {} hashes",
            spectrogram.frames(),
            peaks.len(),
            records.len()
        );
        if records.is_empty() {
            return Err(Error::InsufficientFingerprints);
        }
        Ok(records)
    }

    /// Register a reference track: fingerprint the clip, then commit the song
    /// row and all its records together or not at all.
    pub fn ingest(&mut self, name: &str, path: &str, clip: &AudioClip<'_>) -> Result<SongId, Error> {
        let records = self.fingerprint(clip)?;
        let song_id = self.store.insert_track(name, path, &records)?;
        info!(
            "[ingest] '{name}' -> song {song_id} ({} records, {:.1} s)",
            records.len(),
            clip.duration_seconds()
        );
        Ok(song_id)
    }

    /// Identify a query clip against the store's current snapshot.
    pub fn identify(&self, clip: &AudioClip<'_>) -> Result<MatchOutcome, Error> {
        let records = self.fingerprint(clip)?;
        let outcome = matcher::rank(&self.store, &records, &self.config.matching)?;
        match outcome.best() {
            Some(best) => info!(
                "[identify] song {} '{}' (score {}, offset {})",
                best.song.id, best.song.name, best.score, best.offset
            ),
            None => info!("[identify] no candidate above threshold"),
        }
        Ok(outcome)
    }
}
