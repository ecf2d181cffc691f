//! cpipe-session: stockage des sessions de compilation
//!
//! Fournit :
//! - [`SessionStore`] : trait de stockage (écrit une fois, relu ensuite)
//! - [`FsStore`] : un répertoire par session (`source.c`, `result.json`),
//!   écritures atomiques (fichier temporaire + rename)
//! - [`MemoryStore`] : table concurrente en mémoire (tests, serveur sans disque)
//! - [`Sessions`] : façade `create`/`load` qui alloue l'id, tire les durées
//!   et enregistre le document
//!
//! Points clés :
//! - Ids `compile_<32 hex>` (uuid v4), sans collision entre créations concurrentes.
//! - Un id qui n'a pas cette forme vaut `SessionNotFound` sans toucher au disque.
//! - Un document présent mais illisible vaut `StorageFailure`, jamais une lecture partielle.
//! - Aucune purge : les sessions restent tant que le stockage vit.

#![deny(missing_docs)]

mod fs;
mod memory;

use std::sync::Arc;

use cpipe_compiler::{Compiler, Session};
use cpipe_core::{PipelineError, PipelineResult};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Préfixe des identifiants de session.
pub const ID_PREFIX: &str = "compile_";

/// Nom du fichier source dans un répertoire de session.
pub const SOURCE_FILE: &str = "source.c";

/// Nom du document de session.
pub const RESULT_FILE: &str = "result.json";

/* ─────────────────────────── Ids ─────────────────────────── */

/// Nouvel identifiant `compile_<32 hex>`.
pub fn new_session_id() -> String {
    format!("{ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// Forme acceptée : préfixe puis 1 à 64 caractères alphanumériques ASCII.
/// Exclut donc séparateurs de chemin, `..` et id vide.
pub fn is_valid_id(id: &str) -> bool {
    id.strip_prefix(ID_PREFIX)
        .is_some_and(|rest| (1..=64).contains(&rest.len()) && rest.bytes().all(|b| b.is_ascii_alphanumeric()))
}

/// `SessionNotFound` si l'id n'a pas la bonne forme.
pub(crate) fn check_id(id: &str) -> PipelineResult<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        tracing::debug!(id, "rejected malformed session id");
        Err(PipelineError::SessionNotFound(id.to_owned()))
    }
}

/* ─────────────────────────── Trait ─────────────────────────── */

/// Backend de stockage des sessions.
pub trait SessionStore: Send + Sync {
    /// Enregistre le source et le document. Visible par `get` dès le retour.
    fn put(&self, source: &str, session: &Session) -> PipelineResult<()>;

    /// Relit un document.
    fn get(&self, id: &str) -> PipelineResult<Session>;

    /// Relit le source tel que soumis.
    fn get_source(&self, id: &str) -> PipelineResult<String>;

    /// Dépose un artefact (ex. l'archive zip) à côté du document.
    fn put_artifact(&self, id: &str, name: &str, bytes: &[u8]) -> PipelineResult<()>;

    /// Nom court du backend (logs).
    fn backend(&self) -> &'static str;
}

/* ─────────────────────────── Façade ─────────────────────────── */

/// Façade de création/lecture.
///
/// Seul état mutable partagé : le générateur aléatoire des durées, tenu
/// le temps d'une compilation simulée.
pub struct Sessions {
    store: Arc<dyn SessionStore>,
    compiler: Compiler,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for Sessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sessions").field("backend", &self.store.backend()).finish_non_exhaustive()
    }
}

impl Sessions {
    /// Façade sur `store`. `seed` fixe les durées ; `None` = entropie système.
    pub fn new(store: Arc<dyn SessionStore>, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { store, compiler: Compiler::default(), rng: Mutex::new(rng) }
    }

    /// Façade en mémoire.
    pub fn in_memory(seed: Option<u64>) -> Self {
        Self::new(Arc::new(MemoryStore::default()), seed)
    }

    /// Remplace le compilateur (plages de durées).
    #[must_use]
    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Compile, enregistre et renvoie le document.
    pub fn create(&self, source: &str) -> PipelineResult<Session> {
        let id = new_session_id();
        let session = {
            let mut rng = self.rng.lock();
            self.compiler.compile(&id, source, &mut *rng)?
        };
        self.store.put(source, &session)?;
        tracing::info!(session = %id, backend = self.store.backend(), bytes = source.len(), "session created");
        Ok(session)
    }

    /// Relit un document.
    pub fn load(&self, id: &str) -> PipelineResult<Session> {
        self.store.get(id)
    }

    /// Source soumis à la création de la session.
    pub fn source(&self, id: &str) -> PipelineResult<String> {
        self.store.get_source(id)
    }

    /// Backend sous-jacent.
    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn id_shape() {
        let id = new_session_id();
        assert!(id.starts_with("compile_"));
        assert_eq!(id.len(), "compile_".len() + 32);
        assert!(is_valid_id(&id));
        for bad in ["", "compile_", "compile_../x", "compile_a/b", "x_abc", "compile_a.b", "../compile_a"] {
            assert!(!is_valid_id(bad), "{bad}");
        }
    }

    #[test]
    fn create_then_load() {
        let s = Sessions::in_memory(Some(1));
        let doc = s.create("int main(){return 0;}").unwrap();
        assert_eq!(s.load(&doc.session_id).unwrap(), doc);
        assert_eq!(s.source(&doc.session_id).unwrap(), "int main(){return 0;}");
        assert_eq!(s.create("   "), Err(PipelineError::EmptyInput));
    }

    #[test]
    fn unknown_or_malformed_ids_are_not_found() {
        let s = Sessions::in_memory(None);
        assert!(matches!(s.load("compile_deadbeef"), Err(PipelineError::SessionNotFound(_))));
        assert!(matches!(s.load("../../etc/passwd"), Err(PipelineError::SessionNotFound(_))));
        assert!(matches!(s.source("compile_deadbeef"), Err(PipelineError::SessionNotFound(_))));
    }

    #[test]
    fn concurrent_creations_get_distinct_ids() {
        let s = Sessions::in_memory(Some(5));
        let ids: Vec<String> = std::thread::scope(|scope| {
            let hs: Vec<_> =
                (0..8).map(|_| scope.spawn(|| s.create("int a = 5;").unwrap().session_id)).collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let mut uniq = ids.clone();
        uniq.sort();
        uniq.dedup();
        assert_eq!(uniq.len(), ids.len());
        for id in &ids {
            assert_eq!(&s.load(id).unwrap().session_id, id);
        }
    }

    #[test]
    fn same_seed_same_durations() {
        let d = |seed| {
            let s = Sessions::in_memory(Some(seed));
            s.create("int a;").unwrap().stages.iter().map(|st| st.duration).collect::<Vec<_>>()
        };
        assert_eq!(d(11), d(11));
    }
}
