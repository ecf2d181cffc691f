//! cpipe-cli: bibliothèque interne du binaire `cpipe`
//!
//! Le parsing d'arguments reste dans `main.rs` ; ici, des tâches typées
//! exécutées contre le stockage disque des sessions (`--data-dir`).
//!
//! Points clés :
//! - `compile` crée une session et affiche son résumé (ou le document JSON)
//! - `step`, `visualize`, `export` relisent une session existante
//! - sorties écrites dans un `Write` fourni (testable), fichiers écrits atomiquement
//! - traces (`feature = "trace"`) et couleurs (`feature = "color"`) optionnelles

#![deny(unused_must_use)]
#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use cpipe_compiler::Session;
use cpipe_session::{FsStore, SessionStore, Sessions};
use cpipe_step::StepAction;
use cpipe_tools::{Artifact, Format, View};

#[cfg(feature = "color")]
use owo_colors::{OwoColorize, Stream, Style};

// ───────────────────────────── Types publics ─────────────────────────────

/// Commande haut-niveau (sans parsing CLI, réservé à main.rs).
#[derive(Clone, Debug)]
pub enum Command {
    /// Compile un source et enregistre la session.
    Compile(CompileTask),
    /// Un pas de navigation.
    Step(StepTask),
    /// Données de scène 3D.
    Visualize(VisualizeTask),
    /// Rendu téléchargeable.
    Export(ExportTask),
}

/// Réglages communs.
#[derive(Clone, Debug)]
pub struct Env {
    /// Racine des sessions.
    pub data_dir: PathBuf,
    /// Graine des durées simulées.
    pub seed: Option<u64>,
}

impl Default for Env {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("tmp"), seed: None }
    }
}

/// `cpipe compile`.
#[derive(Clone, Debug, Default)]
pub struct CompileTask {
    /// Fichier source ou stdin.
    pub input: Input,
    /// Document JSON complet au lieu du résumé.
    pub json: bool,
}

/// `cpipe step`.
#[derive(Clone, Debug)]
pub struct StepTask {
    /// Session.
    pub session_id: String,
    /// Étape courante.
    pub step: i64,
    /// Action.
    pub action: StepAction,
}

/// `cpipe visualize`.
#[derive(Clone, Debug)]
pub struct VisualizeTask {
    /// Session.
    pub session_id: String,
    /// Vue.
    pub view: View,
}

/// `cpipe export`.
#[derive(Clone, Debug)]
pub struct ExportTask {
    /// Session.
    pub session_id: String,
    /// Artefact.
    pub artifact: Artifact,
    /// Format.
    pub format: Format,
    /// Destination.
    pub output: Output,
}

/// Entrée texte : fichier ou `-` (stdin).
#[derive(Clone, Debug, Default)]
pub enum Input {
    /// Fichier.
    Path(PathBuf),
    /// Entrée standard.
    #[default]
    Stdin,
}

/// Destination d'un export.
#[derive(Clone, Debug, Default)]
pub enum Output {
    /// Sortie standard (texte), nom proposé dans le répertoire courant (archive).
    #[default]
    Auto,
    /// Fichier explicite.
    Path(PathBuf),
}

// ───────────────────────────── Initialisation ─────────────────────────────

/// Initialise le logger selon la feature `trace`.
pub fn init_logger() {
    #[cfg(feature = "trace")]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .format_timestamp_secs()
            .try_init();
    }
}

// ───────────────────────────── Exécution ─────────────────────────────

/// Exécute une commande sur la sortie standard. Retourne un code de sortie.
pub fn execute(cmd: Command, env: &Env) -> Result<i32> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute_to(cmd, env, &mut out)
}

/// Exécute une commande en écrivant le résultat dans `out`.
pub fn execute_to(cmd: Command, env: &Env, out: &mut dyn Write) -> Result<i32> {
    let store = Arc::new(
        FsStore::open(&env.data_dir).with_context(|| format!("data dir: {}", display(&env.data_dir)))?,
    );
    let sessions = Sessions::new(store.clone(), env.seed);
    match cmd {
        Command::Compile(t) => compile_entry(&t, &sessions, out),
        Command::Step(t) => {
            let session = load(&sessions, &t.session_id)?;
            let view = cpipe_step::navigate(&session, t.step, t.action)?;
            print_json(out, &view)?;
            Ok(0)
        }
        Command::Visualize(t) => {
            let session = load(&sessions, &t.session_id)?;
            print_json(out, &cpipe_tools::visualize(&session, t.view))?;
            Ok(0)
        }
        Command::Export(t) => export_entry(t, &sessions, store.as_ref(), out),
    }
}

fn compile_entry(task: &CompileTask, sessions: &Sessions, out: &mut dyn Write) -> Result<i32> {
    let source = read_source(&task.input)?;
    let session = sessions.create(&source)?;
    if task.json {
        print_json(out, &session)?;
    } else {
        for (i, st) in session.stages.iter().enumerate() {
            writeln!(out, "  [{i}] {:<20} {:>4} ms", st.name, st.duration)?;
        }
        writeln!(out, "{}", session.session_id)?;
    }
    status_ok(
        "compiled",
        &format!("{} tokens, {} ms simulated", session.outputs.tokens.len(), session.total_duration()),
    );
    Ok(0)
}

fn export_entry(task: ExportTask, sessions: &Sessions, store: &dyn SessionStore, out: &mut dyn Write) -> Result<i32> {
    let session = load(sessions, &task.session_id)?;
    let download = if task.artifact == Artifact::Source {
        cpipe_tools::export_source(&sessions.source(&session.session_id)?)
    } else {
        cpipe_tools::export(&session, task.artifact, task.format)?
    };
    if task.artifact == Artifact::All {
        store.put_artifact(&session.session_id, &download.filename, &download.bytes)?;
    }
    let target = match task.output {
        Output::Path(p) if p.as_os_str() != "-" => Some(p),
        Output::Path(_) => None,
        Output::Auto if task.artifact == Artifact::All => Some(PathBuf::from(&download.filename)),
        Output::Auto => None,
    };
    match target {
        Some(path) => {
            write_bytes_atomic(&path, &download.bytes)?;
            status_info("wrote", &format!("{} ({} bytes, {})", display(&path), download.bytes.len(), download.mime));
        }
        None => out.write_all(&download.bytes)?,
    }
    Ok(0)
}

fn load(sessions: &Sessions, id: &str) -> Result<Session> {
    sessions.load(id).with_context(|| format!("session {id}"))
}

fn print_json<T: serde::Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

// ───────────────────────────── Utilitaires E/S ─────────────────────────────

fn read_source(input: &Input) -> Result<String> {
    let mut s = String::new();
    match input {
        Input::Stdin => {
            io::stdin().read_to_string(&mut s)?;
        }
        Input::Path(p) => {
            File::open(p).with_context(|| format!("opening {}", display(p)))?.read_to_string(&mut s)?;
        }
    }
    Ok(s)
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let base = path.file_name().ok_or_else(|| anyhow!("output path without file name: {}", display(path)))?;
    let (tmp, file) = unique_tmp(parent, &base.to_string_lossy())?;
    let written = (|| -> io::Result<()> {
        let mut w = BufWriter::new(file);
        w.write_all(bytes)?;
        w.flush()?;
        drop(w);
        fs::rename(&tmp, path)
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("writing {}", display(path)));
    }
    #[cfg(feature = "trace")]
    log::debug!("wrote {} bytes to {}", bytes.len(), display(path));
    Ok(())
}

fn unique_tmp(dir: &Path, base: &str) -> Result<(PathBuf, File)> {
    for i in 0..1024u32 {
        let candidate = dir.join(format!(".{base}.tmp{i}"));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(f) => return Ok((candidate, f)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e).with_context(|| format!("creating {}", display(&candidate))),
        }
    }
    Err(anyhow!("no free temporary name in {}", display(dir)))
}

fn display(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

// ───────────────────────────── Sorties jolies ─────────────────────────────

/// Force (`Some`) ou rend à la détection du terminal (`None`) la couleur
/// des lignes de statut.
pub fn set_color(enabled: Option<bool>) {
    #[cfg(feature = "color")]
    {
        match enabled {
            Some(on) => owo_colors::set_override(on),
            None => owo_colors::unset_override(),
        }
    }
    #[cfg(not(feature = "color"))]
    {
        let _ = enabled;
    }
}

#[cfg(feature = "color")]
fn paint(tag: &str, style: Style) -> String {
    tag.if_supports_color(Stream::Stderr, |t| t.style(style)).to_string()
}

fn status_ok(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    let tag = paint(tag, Style::new().green().bold());
    eprintln!("{tag} {msg}");
}

fn status_info(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    let tag = paint(tag, Style::new().blue().bold());
    eprintln!("{tag} {msg}");
}

// ───────────────────────────── Tests ─────────────────────────────
