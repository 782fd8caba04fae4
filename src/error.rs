//! Error taxonomy for the fingerprinting core.
//!
//! "No match" is not an error: the match engine reports it as an explicit
//! [`MatchOutcome::NotFound`](crate::matcher::MatchOutcome) so callers cannot
//! conflate it with a failure.

use crate::store::SongId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The clip had no samples at all.
    #[error("audio buffer is empty")]
    EmptyBuffer,

    /// The clip's rate disagrees with the engine's configured rate; resampling
    /// belongs to the decoding collaborator.
    #[error("unsupported sample rate {got} Hz, engine expects {expected} Hz")]
    UnsupportedSampleRate { got: u32, expected: u32 },

    /// The pipeline produced no usable hash records, e.g. for silence or a
    /// clip far shorter than one analysis window.
    #[error("clip yielded no usable fingerprint material")]
    InsufficientFingerprints,

    /// Persistence I/O failed during lookup or insert. Retry and backoff
    /// policy belongs to the caller.
    #[error("fingerprint store unavailable: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A fingerprint insert referenced a song the store does not know.
    #[error("song {0} does not exist in the store")]
    UnknownSong(SongId),
}

impl Error {
    /// Wrap a backend failure as a store error.
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }
}
