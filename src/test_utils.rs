//! Shared helpers for tests.

use std::sync::Mutex;

use crate::hooks::ReindexApi;

/// A [`ReindexApi`] that records every trigger call for assertions.
#[derive(Default)]
pub struct RecordingReindex {
    pub calls: Mutex<Vec<(String, String, String)>>,
}

impl RecordingReindex {
    /// Returns the recorded (owner, repo, origin) triples.
    pub fn recorded(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ReindexApi for RecordingReindex {
    fn trigger_reindex(&self, owner: &str, repo: &str, origin: &str) {
        self.calls.lock().unwrap().push((
            owner.to_string(),
            repo.to_string(),
            origin.to_string(),
        ));
    }
}
