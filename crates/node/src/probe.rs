//! External act-request probe.

use pollchain_types::Action;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Filesystem channel for vote requests.
///
/// Dropping a file at the probed path casts its first byte as a vote. The
/// file is removed after a successful read, so one file is one vote.
pub struct ActProbe {
    path: PathBuf,
}

impl ActProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ActProbe { path: path.into() }
    }

    /// Consume a pending act request, if any.
    pub fn poll(&mut self) -> Option<Action> {
        let bytes = fs::read(&self.path).ok()?;

        if let Err(error) = fs::remove_file(&self.path) {
            // Leaving the file behind would re-cast the vote every
            // iteration; skip this request and retry next time.
            debug!(path = %self.path.display(), %error, "could not consume act request");
            return None;
        }

        let vote = Action(*bytes.first()?);
        info!(path = %self.path.display(), %vote, "registered act request");
        Some(vote)
    }
}
