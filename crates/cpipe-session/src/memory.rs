//! memory.rs: stockage en mémoire (table concurrente)

use cpipe_compiler::Session;
use cpipe_core::{PipelineError, PipelineResult};
use dashmap::DashMap;

use crate::{check_id, SessionStore};

#[derive(Debug, Clone)]
struct Entry {
    source: String,
    session: Session,
    artifacts: Vec<(String, Vec<u8>)>,
}

/// Sessions gardées en mémoire, perdues à l'arrêt du processus.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    /// Nombre de sessions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Vide ?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source d'une session.
    pub fn source(&self, id: &str) -> Option<String> {
        self.entries.get(id).map(|e| e.source.clone())
    }

    /// Artefact déposé via `put_artifact`.
    pub fn artifact(&self, id: &str, name: &str) -> Option<Vec<u8>> {
        let entry = self.entries.get(id)?;
        entry.artifacts.iter().find(|(n, _)| n == name).map(|(_, b)| b.clone())
    }
}

impl SessionStore for MemoryStore {
    fn put(&self, source: &str, session: &Session) -> PipelineResult<()> {
        check_id(&session.session_id)?;
        self.entries.insert(
            session.session_id.clone(),
            Entry { source: source.to_owned(), session: session.clone(), artifacts: Vec::new() },
        );
        Ok(())
    }

    fn get(&self, id: &str) -> PipelineResult<Session> {
        check_id(id)?;
        self.entries
            .get(id)
            .map(|e| e.session.clone())
            .ok_or_else(|| PipelineError::SessionNotFound(id.to_owned()))
    }

    fn get_source(&self, id: &str) -> PipelineResult<String> {
        check_id(id)?;
        self.source(id).ok_or_else(|| PipelineError::SessionNotFound(id.to_owned()))
    }

    fn put_artifact(&self, id: &str, name: &str, bytes: &[u8]) -> PipelineResult<()> {
        check_id(id)?;
        let mut entry = self.entries.get_mut(id).ok_or_else(|| PipelineError::SessionNotFound(id.to_owned()))?;
        entry.artifacts.retain(|(n, _)| n != name);
        entry.artifacts.push((name.to_owned(), bytes.to_vec()));
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
