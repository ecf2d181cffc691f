//! `cpipe`: CLI du pipeline de compilation pédagogique
//!
//! Ici uniquement : parsing d'arguments, initialisation (logger, couleur),
//! puis délégation à `cpipe_cli` (lib).
//!
//! Codes de sortie : 0 succès, 2 requête invalide (session inconnue, étape
//! hors table, format non supporté…), 1 autre échec.

#![forbid(unsafe_code)]

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use cpipe_core::PipelineError;
use cpipe_step::StepAction;

use cpipe_cli as cli;

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "cpipe", version, about = "cpipe: simulated C compiler pipeline, step by step", long_about = None)]
struct Opt {
    /// Augmente la verbosité (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    quiet: bool,

    /// Couleur des messages d'état
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,

    /// Répertoire des sessions
    #[arg(long = "data-dir", env = "CPIPE_DATA_DIR", default_value = "tmp", global = true)]
    data_dir: PathBuf,

    /// Graine des durées simulées
    #[arg(long, env = "CPIPE_SEED", global = true)]
    seed: Option<u64>,

    /// Sous-commandes
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compiler une source et enregistrer la session
    Compile {
        /// Fichier source (ou - pour stdin)
        input: Option<PathBuf>,
        /// Afficher le document complet (JSON)
        #[arg(long)]
        json: bool,
    },

    /// Naviguer d'une étape (next, prev, jump)
    Step {
        /// Identifiant de session
        session: String,
        /// Étape courante
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        step: i64,
        /// Action (next par défaut)
        #[arg(long)]
        action: Option<String>,
        /// Cible d'un jump
        #[arg(long, allow_negative_numbers = true)]
        to: Option<i64>,
    },

    /// Données de scène 3D d'une vue
    Visualize {
        /// Identifiant de session
        session: String,
        /// Vue : all, lexical, syntax, semantic, ir, optimization, codegen
        #[arg(long, default_value = "all")]
        stage: String,
    },

    /// Exporter un artefact (tokens, ast, ir, asm, cfg, all)
    Export {
        /// Identifiant de session
        session: String,
        /// Artefact : tokens, ast, ir, asm, cfg, all, source
        #[arg(long = "type")]
        artifact: String,
        /// Format : json, txt, dot, png
        #[arg(long, default_value = "json")]
        format: String,
        /// Fichier de sortie (- pour stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ──────────────────────────── Logger / Couleur ────────────────────────────

fn init_telemetry(verbose: u8, quiet: bool) {
    #[cfg(feature = "trace")]
    {
        let level = if quiet {
            "error"
        } else {
            match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        };
        std::env::set_var("RUST_LOG", std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string()));
        cli::init_logger();
    }
    #[cfg(not(feature = "trace"))]
    let _ = (verbose, quiet);
}

fn init_color(choice: ColorChoice) {
    match choice {
        ColorChoice::Auto => cli::set_color(None),
        ColorChoice::Always => {
            std::env::set_var("CLICOLOR_FORCE", "1");
            std::env::remove_var("NO_COLOR");
            cli::set_color(Some(true));
        }
        ColorChoice::Never => {
            std::env::set_var("NO_COLOR", "1");
            std::env::remove_var("CLICOLOR_FORCE");
            cli::set_color(Some(false));
        }
    }
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            let client = e.chain().any(|c| c.downcast_ref::<PipelineError>().is_some_and(PipelineError::is_client_error));
            ExitCode::from(if client { 2 } else { 1 })
        }
    }
}

fn real_main() -> Result<u8> {
    let opt = Opt::parse();

    init_color(opt.color);
    init_telemetry(opt.verbose, opt.quiet);

    use cli::{Command as C, CompileTask, ExportTask, Input, Output, StepTask, VisualizeTask};

    let command = match opt.cmd {
        Command::Compile { input, json } => {
            let input = match input {
                Some(p) if p.as_os_str() != "-" => Input::Path(p),
                _ => Input::Stdin,
            };
            C::Compile(CompileTask { input, json })
        }
        Command::Step { session, step, action, to } => {
            let action = StepAction::parse(action.as_deref(), to)?;
            C::Step(StepTask { session_id: session, step, action })
        }
        Command::Visualize { session, stage } => C::Visualize(VisualizeTask { session_id: session, view: stage.parse()? }),
        Command::Export { session, artifact, format, output } => {
            let artifact: cpipe_tools::Artifact = artifact.parse()?;
            let format = if matches!(artifact, cpipe_tools::Artifact::All | cpipe_tools::Artifact::Source) {
                format.parse().unwrap_or_default()
            } else {
                format.parse()?
            };
            let output = output.map_or(Output::Auto, Output::Path);
            C::Export(ExportTask { session_id: session, artifact, format, output })
        }
    };

    let env = cli::Env { data_dir: opt.data_dir, seed: opt.seed };
    let code = cli::execute(command, &env).context("command failed")?;
    Ok(u8::try_from(code).unwrap_or(1))
}
