//! Fingerprint persistence: a hash-indexed mapping contract shared by the
//! in-memory and SQLite backends.
//!
//! Writes take `&mut self` and reads take `&self`, so the single-writer /
//! multiple-reader discipline is enforced by the borrow checker; callers that
//! share a store across threads wrap it in the lock of their choice.

pub mod memory;
pub mod sqlite;

use crate::dsp::fingerprint::Fingerprint;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity of an ingested track.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SongId(pub i64);

impl std::fmt::Display for SongId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata for one ingested track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub name: String,
    pub path: String,
}

/// Reverse-lookup result: every stored `(song, anchor frame)` pair per key.
pub type LookupHits = HashMap<u64, Vec<(SongId, u32)>>;

/// Storage contract for songs and their hash records.
///
/// Records are append-only: inserted in bulk, never mutated, removed only by
/// deleting the whole song.
pub trait FingerprintStore {
    /// Allocate a new song identity.
    fn create_song(&mut self, name: &str, path: &str) -> Result<SongId, Error>;

    /// Bulk-append hash records for an existing song.
    fn insert_fingerprints(
        &mut self,
        song_id: SongId,
        records: &[Fingerprint],
    ) -> Result<(), Error>;

    /// Atomic ingestion: the song row and all its records become visible
    /// together, or not at all.
    fn insert_track(
        &mut self,
        name: &str,
        path: &str,
        records: &[Fingerprint],
    ) -> Result<SongId, Error>;

    /// Batched reverse lookup over the hash index; cost scales with the number
    /// of colliding records, not the corpus size. Keys with no stored match
    /// are absent from the result.
    fn lookup(&self, keys: &[u64]) -> Result<LookupHits, Error>;

    /// Metadata for one song, if it exists.
    fn song(&self, id: SongId) -> Result<Option<Song>, Error>;

    /// Drop a song and every record referencing it.
    fn delete_song(&mut self, id: SongId) -> Result<(), Error>;
}
