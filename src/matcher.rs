//! Offset-histogram match scoring.
//!
//! Hashes that really come from the same recording agree on one query-versus-
//! stored time shift; coincidental collisions scatter across many shifts and
//! never accumulate. A song's score is therefore the count in the tallest bin
//! of its offset histogram.

use crate::dsp::fingerprint::Fingerprint;
use crate::error::Error;
use crate::store::{FingerprintStore, Song, SongId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Configuration for ranking and the accept threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Fewest aligned hashes the best candidate needs; below this the result
    /// is an explicit not-found rather than a low-confidence guess.
    pub min_score: usize,
    /// How many ranked candidates to return.
    pub top_k: usize,
    /// Histogram bin width in frames; widths above 1 tolerate timing jitter
    /// at the cost of offset resolution.
    pub offset_bin_width: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_score: 5,
            top_k: 5,
            offset_bin_width: 1,
        }
    }
}

impl MatchConfig {
    pub(crate) fn normalized(mut self) -> Self {
        self.min_score = self.min_score.max(1);
        self.top_k = self.top_k.max(1);
        self.offset_bin_width = self.offset_bin_width.max(1);
        self
    }
}

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub song: Song,
    /// Hashes agreeing on the winning time alignment.
    pub score: usize,
    /// Stored-minus-query frame shift of that alignment: querying an excerpt
    /// that starts at stored frame T reports offset T.
    pub offset: i64,
}

/// Result of a query: ranked candidates, or an explicit no-match.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Ranked(Vec<MatchCandidate>),
    NotFound,
}

impl MatchOutcome {
    pub fn best(&self) -> Option<&MatchCandidate> {
        match self {
            MatchOutcome::Ranked(candidates) => candidates.first(),
            MatchOutcome::NotFound => None,
        }
    }
}

/// Score a query hash set against the store's current snapshot.
///
/// Stateless: nothing is retained between invocations, and a query has no
/// side effects on the store.
pub fn rank<S: FingerprintStore>(
    store: &S,
    query: &[Fingerprint],
    config: &MatchConfig,
) -> Result<MatchOutcome, Error> {
    let mut keys: Vec<u64> = query.iter().map(|record| record.key).collect();
    keys.sort_unstable();
    keys.dedup();
    let hits = store.lookup(&keys)?;

    let bin = i64::from(config.offset_bin_width.max(1));
    let mut histograms: HashMap<SongId, HashMap<i64, usize>> = HashMap::new();
    for record in query {
        let Some(matches) = hits.get(&record.key) else {
            continue;
        };
        for &(song_id, anchor) in matches {
            let offset = i64::from(anchor) - i64::from(record.anchor);
            *histograms
                .entry(song_id)
                .or_default()
                .entry(offset.div_euclid(bin))
                .or_insert(0) += 1;
        }
    }

    // Tallest histogram bin per song; equal bins resolve to the smaller
    // offset so ranking never depends on map iteration order.
    let mut candidates: Vec<(SongId, usize, i64)> = histograms
        .into_iter()
        .filter_map(|(song_id, histogram)| {
            histogram
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(slot, count)| (song_id, count, slot * bin))
        })
        .collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    debug!(
        "[match] {} candidate songs from {} distinct keys",
        candidates.len(),
        keys.len()
    );

    match candidates.first() {
        Some(&(_, best_score, _)) if best_score >= config.min_score => {}
        _ => return Ok(MatchOutcome::NotFound),
    }

    let mut ranked = Vec::with_capacity(config.top_k.min(candidates.len()));
    for (song_id, score, offset) in candidates.into_iter().take(config.top_k) {
        let song = store.song(song_id)?.ok_or(Error::UnknownSong(song_id))?;
        ranked.push(MatchCandidate {
            song,
            score,
            offset,
        });
    }
    Ok(MatchOutcome::Ranked(ranked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn record(key: u64, anchor: u32) -> Fingerprint {
        Fingerprint { key, anchor }
    }

    fn config(min_score: usize) -> MatchConfig {
        MatchConfig {
            min_score,
            ..MatchConfig::default()
        }
    }

    // Query hashes at anchors 0..n with keys 100..100+n.
    fn query(n: u32) -> Vec<Fingerprint> {
        (0..n).map(|i| record(100 + u64::from(i), i)).collect()
    }

    #[test]
    fn aligned_hashes_outscore_scattered_ones() {
        let mut store = MemoryStore::new();
        // Song A: same keys shifted by a constant 10 frames.
        let aligned: Vec<Fingerprint> = (0..6).map(|i| record(100 + u64::from(i), i + 10)).collect();
        let a = store.insert_track("aligned", "/a", &aligned).unwrap();
        // Song B: same keys at incoherent anchors.
        let scattered: Vec<Fingerprint> = [(100u64, 50u32), (101, 3), (102, 71), (103, 24), (104, 90), (105, 61)]
            .iter()
            .map(|&(k, t)| record(k, t))
            .collect();
        let b = store.insert_track("scattered", "/b", &scattered).unwrap();

        let outcome = rank(&store, &query(6), &config(2)).unwrap();
        let MatchOutcome::Ranked(candidates) = outcome else {
            panic!("expected ranked outcome");
        };
        assert_eq!(candidates[0].song.id, a);
        assert_eq!(candidates[0].score, 6);
        assert_eq!(candidates[0].offset, 10);
        let runner_up = candidates.iter().find(|c| c.song.id == b).unwrap();
        assert_eq!(runner_up.score, 1);
    }

    #[test]
    fn below_threshold_is_not_found() {
        let mut store = MemoryStore::new();
        let aligned: Vec<Fingerprint> = (0..3).map(|i| record(100 + u64::from(i), i + 4)).collect();
        store.insert_track("a", "/a", &aligned).unwrap();

        assert_eq!(
            rank(&store, &query(3), &config(4)).unwrap(),
            MatchOutcome::NotFound
        );
    }

    #[test]
    fn empty_store_is_not_found() {
        let store = MemoryStore::new();
        assert_eq!(
            rank(&store, &query(5), &config(1)).unwrap(),
            MatchOutcome::NotFound
        );
    }

    #[test]
    fn equal_scores_rank_by_ascending_song_id() {
        let mut store = MemoryStore::new();
        let aligned: Vec<Fingerprint> = (0..4).map(|i| record(100 + u64::from(i), i + 7)).collect();
        let first = store.insert_track("one", "/1", &aligned).unwrap();
        let second = store.insert_track("two", "/2", &aligned).unwrap();
        assert!(first < second);

        let MatchOutcome::Ranked(candidates) = rank(&store, &query(4), &config(2)).unwrap() else {
            panic!("expected ranked outcome");
        };
        assert_eq!(candidates[0].song.id, first);
        assert_eq!(candidates[1].song.id, second);
        assert_eq!(candidates[0].score, candidates[1].score);
    }

    #[test]
    fn negative_offsets_are_reported() {
        // Query clip starts before the stored excerpt: stored anchors are
        // smaller than query anchors.
        let mut store = MemoryStore::new();
        let stored: Vec<Fingerprint> = (0..5).map(|i| record(100 + u64::from(i), i)).collect();
        let a = store.insert_track("a", "/a", &stored).unwrap();

        let shifted: Vec<Fingerprint> = (0..5).map(|i| record(100 + u64::from(i), i + 20)).collect();
        let MatchOutcome::Ranked(candidates) = rank(&store, &shifted, &config(2)).unwrap() else {
            panic!("expected ranked outcome");
        };
        assert_eq!(candidates[0].song.id, a);
        assert_eq!(candidates[0].offset, -20);
    }

    #[test]
    fn wide_offset_bins_absorb_jitter() {
        let mut store = MemoryStore::new();
        // Anchors wobble by one frame around a 10-frame shift.
        let jittered: Vec<Fingerprint> = [(100u64, 10u32), (101, 12), (102, 11), (103, 13)]
            .iter()
            .map(|&(k, t)| record(k, t))
            .collect();
        store.insert_track("a", "/a", &jittered).unwrap();

        let exact = config(4);
        assert_eq!(rank(&store, &query(4), &exact).unwrap(), MatchOutcome::NotFound);

        let tolerant = MatchConfig {
            min_score: 4,
            offset_bin_width: 4,
            ..MatchConfig::default()
        };
        let MatchOutcome::Ranked(candidates) = rank(&store, &query(4), &tolerant).unwrap() else {
            panic!("expected ranked outcome");
        };
        assert_eq!(candidates[0].score, 4);
    }

    #[test]
    fn top_k_limits_returned_candidates() {
        let mut store = MemoryStore::new();
        for song in 0..4 {
            let aligned: Vec<Fingerprint> = (0..3)
                .map(|i| record(100 + u64::from(i), i + song))
                .collect();
            store
                .insert_track(&format!("s{song}"), "/s", &aligned)
                .unwrap();
        }
        let cfg = MatchConfig {
            min_score: 1,
            top_k: 2,
            ..MatchConfig::default()
        };
        let MatchOutcome::Ranked(candidates) = rank(&store, &query(3), &cfg).unwrap() else {
            panic!("expected ranked outcome");
        };
        assert_eq!(candidates.len(), 2);
    }
}
