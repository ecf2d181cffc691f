//! fs.rs: stockage disque : `<root>/<id>/{source.c,result.json,…}`

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use cpipe_compiler::Session;
use cpipe_core::{PipelineError, PipelineResult};

use crate::{check_id, SessionStore, RESULT_FILE, SOURCE_FILE};

/// Un répertoire par session sous `root`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Ouvre (et crée au besoin) la racine de données.
    pub fn open(root: impl Into<PathBuf>) -> PipelineResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| fail("create data dir", &root, &e))?;
        Ok(Self { root })
    }

    /// Racine de données.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Répertoire d'une session (id supposé valide).
    pub fn session_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

impl SessionStore for FsStore {
    fn put(&self, source: &str, session: &Session) -> PipelineResult<()> {
        check_id(&session.session_id)?;
        let dir = self.session_dir(&session.session_id);
        fs::create_dir_all(&dir).map_err(|e| fail("create session dir", &dir, &e))?;

        let src_path = dir.join(SOURCE_FILE);
        write_bytes_atomic(&src_path, source.as_bytes()).map_err(|e| fail("write", &src_path, &e))?;

        let json = serde_json::to_vec_pretty(session).map_err(PipelineError::storage)?;
        // le document arrive en dernier : sa présence vaut session complète
        let doc_path = dir.join(RESULT_FILE);
        write_bytes_atomic(&doc_path, &json).map_err(|e| fail("write", &doc_path, &e))?;
        tracing::debug!(path = %doc_path.display(), bytes = json.len(), "session stored");
        Ok(())
    }

    fn get(&self, id: &str) -> PipelineResult<Session> {
        check_id(id)?;
        let path = self.session_dir(id).join(RESULT_FILE);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(PipelineError::SessionNotFound(id.to_owned())),
            Err(e) => return Err(fail("read", &path, &e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "corrupt session document");
            PipelineError::storage(e)
        })
    }

    fn get_source(&self, id: &str) -> PipelineResult<String> {
        check_id(id)?;
        let path = self.session_dir(id).join(SOURCE_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PipelineError::SessionNotFound(id.to_owned())),
            Err(e) => Err(fail("read", &path, &e)),
        }
    }

    fn put_artifact(&self, id: &str, name: &str, bytes: &[u8]) -> PipelineResult<()> {
        check_id(id)?;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(PipelineError::invalid(format!("bad artifact name: {name}")));
        }
        let dir = self.session_dir(id);
        if !dir.join(RESULT_FILE).is_file() {
            return Err(PipelineError::SessionNotFound(id.to_owned()));
        }
        let path = dir.join(name);
        write_bytes_atomic(&path, bytes).map_err(|e| fail("write", &path, &e))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "artifact stored");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "fs"
    }
}

fn fail(what: &str, path: &Path, err: &io::Error) -> PipelineError {
    tracing::error!(path = %path.display(), error = %err, "{what} failed");
    PipelineError::storage(format!("{what} {}: {err}", path.display()))
}

/// Écriture atomique : temporaire unique dans le même répertoire, puis rename.
fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "path without parent"))?;
    let base = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
    let (tmp, file) = create_unique_tmp(parent, &base)?;
    let res = fill_and_rename(file, &tmp, path, bytes);
    if res.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    res
}

fn fill_and_rename(file: File, tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut w = BufWriter::new(file);
    w.write_all(bytes)?;
    w.flush()?;
    w.get_ref().sync_all()?;
    drop(w);
    fs::rename(tmp, path)
}

fn create_unique_tmp(dir: &Path, base: &str) -> io::Result<(PathBuf, File)> {
    let mut i = 0u32;
    loop {
        let candidate = dir.join(format!(".{base}.tmp{i}"));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(f) => return Ok((candidate, f)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && i < 1024 => i += 1,
            Err(e) => return Err(e),
        }
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
