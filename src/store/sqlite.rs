//! SQLite store backend.
//!
//! Schema: `songs(id, name, path)` and `fingerprints(hash, song_id, offset)`
//! with an index on `hash` for reverse lookup. Keys are stored as `i64` via
//! bit-cast; offsets are anchor frame indices.

use super::{FingerprintStore, LookupHits, Song, SongId};
use crate::dsp::fingerprint::Fingerprint;
use crate::error::Error;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS songs (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    path TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS fingerprints (
    hash INTEGER NOT NULL,
    song_id INTEGER NOT NULL REFERENCES songs(id),
    offset INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_hash ON fingerprints(hash);
";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) an on-disk store.
    pub fn open(path: &Path) -> Result<Self, Error> {
        Self::from_connection(Connection::open(path).map_err(Error::store)?)
    }

    /// Private in-memory database; same contract, nothing touches disk.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::from_connection(Connection::open_in_memory().map_err(Error::store)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(Error::store)?;
        conn.execute_batch(SCHEMA).map_err(Error::store)?;
        Ok(Self { conn })
    }
}

fn insert_records(
    tx: &Transaction<'_>,
    song_id: SongId,
    records: &[Fingerprint],
) -> Result<(), Error> {
    let exists: bool = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM songs WHERE id = ?1)",
            params![song_id.0],
            |row| row.get(0),
        )
        .map_err(Error::store)?;
    if !exists {
        return Err(Error::UnknownSong(song_id));
    }

    let mut stmt = tx
        .prepare_cached("INSERT INTO fingerprints (hash, song_id, offset) VALUES (?1, ?2, ?3)")
        .map_err(Error::store)?;
    for record in records {
        stmt.execute(params![record.key as i64, song_id.0, i64::from(record.anchor)])
            .map_err(Error::store)?;
    }
    Ok(())
}

impl FingerprintStore for SqliteStore {
    fn create_song(&mut self, name: &str, path: &str) -> Result<SongId, Error> {
        self.conn
            .execute(
                "INSERT INTO songs (name, path) VALUES (?1, ?2)",
                params![name, path],
            )
            .map_err(Error::store)?;
        Ok(SongId(self.conn.last_insert_rowid()))
    }

    fn insert_fingerprints(
        &mut self,
        song_id: SongId,
        records: &[Fingerprint],
    ) -> Result<(), Error> {
        let tx = self.conn.transaction().map_err(Error::store)?;
        insert_records(&tx, song_id, records)?;
        tx.commit().map_err(Error::store)
    }

    // One transaction covers the song row and all of its records; a failure
    // anywhere rolls the whole ingestion back.
    fn insert_track(
        &mut self,
        name: &str,
        path: &str,
        records: &[Fingerprint],
    ) -> Result<SongId, Error> {
        let tx = self.conn.transaction().map_err(Error::store)?;
        tx.execute(
            "INSERT INTO songs (name, path) VALUES (?1, ?2)",
            params![name, path],
        )
        .map_err(Error::store)?;
        let song_id = SongId(tx.last_insert_rowid());
        insert_records(&tx, song_id, records)?;
        tx.commit().map_err(Error::store)?;

        debug!("[store] committed song {song_id} with {} records", records.len());
        Ok(song_id)
    }

    fn lookup(&self, keys: &[u64]) -> Result<LookupHits, Error> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT song_id, offset FROM fingerprints WHERE hash = ?1")
            .map_err(Error::store)?;

        let mut hits = LookupHits::new();
        for &key in keys {
            let rows = stmt
                .query_map(params![key as i64], |row| {
                    Ok((SongId(row.get(0)?), row.get::<_, i64>(1)? as u32))
                })
                .map_err(Error::store)?;
            let mut list = Vec::new();
            for row in rows {
                list.push(row.map_err(Error::store)?);
            }
            if !list.is_empty() {
                hits.insert(key, list);
            }
        }
        Ok(hits)
    }

    fn song(&self, id: SongId) -> Result<Option<Song>, Error> {
        self.conn
            .query_row(
                "SELECT id, name, path FROM songs WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok(Song {
                        id: SongId(row.get(0)?),
                        name: row.get(1)?,
                        path: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Error::store)
    }

    fn delete_song(&mut self, id: SongId) -> Result<(), Error> {
        let tx = self.conn.transaction().map_err(Error::store)?;
        tx.execute(
            "DELETE FROM fingerprints WHERE song_id = ?1",
            params![id.0],
        )
        .map_err(Error::store)?;
        tx.execute("DELETE FROM songs WHERE id = ?1", params![id.0])
            .map_err(Error::store)?;
        tx.commit().map_err(Error::store)
    }
}
