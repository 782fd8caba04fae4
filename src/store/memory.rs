//! In-memory store backend, for tests and scratch corpora.

use super::{FingerprintStore, LookupHits, Song, SongId};
use crate::dsp::fingerprint::Fingerprint;
use crate::error::Error;
use std::collections::HashMap;

#[derive(Debug)]
pub struct MemoryStore {
    next_id: i64,
    songs: HashMap<SongId, Song>,
    index: HashMap<u64, Vec<(SongId, u32)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    pub fn record_count(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            next_id: 1,
            songs: HashMap::new(),
            index: HashMap::new(),
        }
    }
}

impl FingerprintStore for MemoryStore {
    fn create_song(&mut self, name: &str, path: &str) -> Result<SongId, Error> {
        let id = SongId(self.next_id);
        self.next_id += 1;
        self.songs.insert(
            id,
            Song {
                id,
                name: name.to_owned(),
                path: path.to_owned(),
            },
        );
        Ok(id)
    }

    fn insert_fingerprints(
        &mut self,
        song_id: SongId,
        records: &[Fingerprint],
    ) -> Result<(), Error> {
        if !self.songs.contains_key(&song_id) {
            return Err(Error::UnknownSong(song_id));
        }
        for record in records {
            self.index
                .entry(record.key)
                .or_default()
                .push((song_id, record.anchor));
        }
        Ok(())
    }

    // In-process maps cannot fail between the two steps, so the composition
    // is atomic as-is.
    fn insert_track(
        &mut self,
        name: &str,
        path: &str,
        records: &[Fingerprint],
    ) -> Result<SongId, Error> {
        let id = self.create_song(name, path)?;
        self.insert_fingerprints(id, records)?;
        Ok(id)
    }

    fn lookup(&self, keys: &[u64]) -> Result<LookupHits, Error> {
        let mut hits = LookupHits::new();
        for &key in keys {
            if let Some(list) = self.index.get(&key) {
                hits.insert(key, list.clone());
            }
        }
        Ok(hits)
    }

    fn song(&self, id: SongId) -> Result<Option<Song>, Error> {
        Ok(self.songs.get(&id).cloned())
    }

    fn delete_song(&mut self, id: SongId) -> Result<(), Error> {
        self.songs.remove(&id);
        self.index.retain(|_, list| {
            list.retain(|&(song, _)| song != id);
            !list.is_empty()
        });
        Ok(())
    }
}
