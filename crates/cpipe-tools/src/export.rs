//! export.rs: rendus téléchargeables d'une session
//!
//! Combinaisons acceptées :
//!
//! | artefact | json | txt | dot |
//! |----------|------|-----|-----|
//! | tokens   | oui  | oui |     |
//! | ast      | oui  | oui | oui |
//! | ir       | oui  | oui |     |
//! | asm      | oui  | oui |     |
//! | cfg      | oui  | oui | oui |
//!
//! `png` n'est jamais rendu. `all` produit toujours l'archive zip (six
//! entrées), quel que soit le format demandé. `source` rend le fichier C
//! soumis, tel quel ; il vient du stockage, pas du document (voir
//! [`export_source`]).

use std::fmt::{self, Write as _};
use std::io::{Cursor, Write as _};
use std::str::FromStr;

use chrono::NaiveDateTime;
use cpipe_ast::Node;
use cpipe_compiler::Session;
use cpipe_core::{PipelineError, PipelineResult, Token};
use cpipe_ir::cfg::escape;
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Nom de l'archive `all`.
pub const BUNDLE_NAME: &str = "compilation_results.zip";

/// Entrées de l'archive, dans l'ordre d'écriture.
pub const BUNDLE_ENTRIES: [&str; 6] = ["tokens.json", "ast.json", "ir.json", "assembly.txt", "cfg.dot", "summary.json"];

/* ─────────────────────────── Paramètres ─────────────────────────── */

/// Artefact demandé.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// Liste des jetons.
    Tokens,
    /// Arbre syntaxique.
    Ast,
    /// Code intermédiaire.
    Ir,
    /// Assembleur.
    Asm,
    /// Graphe de flot de contrôle.
    Cfg,
    /// Archive complète.
    All,
    /// Source C soumis.
    Source,
}

impl Artifact {
    /// Nom de paramètre (`tokens`, `ast`, …).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::Ast => "ast",
            Self::Ir => "ir",
            Self::Asm => "asm",
            Self::Cfg => "cfg",
            Self::All => "all",
            Self::Source => "source",
        }
    }

    const fn file_stem(self) -> &'static str {
        match self {
            Self::Tokens => "tokens_list",
            Self::Ast => "ast_visualization",
            Self::Ir => "intermediate_code",
            Self::Asm => "assembly_code",
            Self::Cfg => "control_flow_graph",
            Self::All => "compilation_results",
            Self::Source => "source_code",
        }
    }
}

impl FromStr for Artifact {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tokens" => Ok(Self::Tokens),
            "ast" => Ok(Self::Ast),
            "ir" => Ok(Self::Ir),
            "asm" => Ok(Self::Asm),
            "cfg" => Ok(Self::Cfg),
            "all" => Ok(Self::All),
            "source" => Ok(Self::Source),
            _ => Err(PipelineError::invalid("Invalid download type")),
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format demandé.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// JSON indenté (défaut).
    #[default]
    Json,
    /// Texte.
    Txt,
    /// Graphviz.
    Dot,
    /// Image (jamais rendue ici).
    Png,
}

impl Format {
    /// Extension (`json`, `txt`, …).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Txt => "txt",
            Self::Dot => "dot",
            Self::Png => "png",
        }
    }

    /// Type MIME du contenu.
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Txt | Self::Dot => "text/plain",
            Self::Png => "image/png",
        }
    }
}

impl FromStr for Format {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "txt" => Ok(Self::Txt),
            "dot" => Ok(Self::Dot),
            "png" => Ok(Self::Png),
            other => Err(PipelineError::invalid(format!("Unsupported format: {other}"))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fichier prêt à servir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Contenu.
    pub bytes: Vec<u8>,
    /// Nom proposé (`Content-Disposition`).
    pub filename: String,
    /// Type MIME.
    pub mime: &'static str,
}

/* ─────────────────────────── Export ─────────────────────────── */

/// Rend `artifact` au format `format`, horodatage local pour l'archive.
pub fn export(session: &Session, artifact: Artifact, format: Format) -> PipelineResult<Download> {
    export_at(session, artifact, format, chrono::Local::now().naive_local())
}

/// Comme [`export`], avec un horodatage fourni (résumé de l'archive).
pub fn export_at(session: &Session, artifact: Artifact, format: Format, now: NaiveDateTime) -> PipelineResult<Download> {
    if artifact == Artifact::All {
        let bytes = bundle(session, now)?;
        tracing::debug!(session = %session.session_id, bytes = bytes.len(), "bundle built");
        return Ok(Download { bytes, filename: BUNDLE_NAME.to_owned(), mime: "application/zip" });
    }

    if artifact == Artifact::Source {
        return Err(PipelineError::invalid("Source is served from the session store"));
    }

    let out = &session.outputs;
    let text = match (artifact, format) {
        (Artifact::Tokens, Format::Json) => pretty(&out.tokens)?,
        (Artifact::Tokens, Format::Txt) => tokens_txt(&out.tokens),
        (Artifact::Ast, Format::Json) => pretty(&out.ast)?,
        (Artifact::Ast, Format::Txt) => out.ast.to_text(),
        (Artifact::Ast, Format::Dot) => ast_dot(&out.ast),
        (Artifact::Ir, Format::Json) => pretty(&out.ir)?,
        (Artifact::Ir, Format::Txt) => cpipe_ir::listing(&out.ir),
        (Artifact::Asm, Format::Json) => pretty(&out.asm)?,
        (Artifact::Asm, Format::Txt) => out.asm.join("\n"),
        (Artifact::Cfg, Format::Json) => pretty(&cpipe_ir::derive_cfg(&out.ir))?,
        (Artifact::Cfg, Format::Txt) => cpipe_ir::derive_cfg(&out.ir).to_text(),
        (Artifact::Cfg, Format::Dot) => cpipe_ir::derive_cfg(&out.ir).to_dot(),
        _ => return Err(PipelineError::invalid(format!("Unsupported format '{format}' for {artifact}"))),
    };

    Ok(Download {
        bytes: text.into_bytes(),
        filename: format!("{}.{}", artifact.file_stem(), format.as_str()),
        mime: format.mime(),
    })
}

/// Source soumis, servi tel quel en `source_code.c` quel que soit le format.
pub fn export_source(source: &str) -> Download {
    Download {
        bytes: source.as_bytes().to_vec(),
        filename: format!("{}.c", Artifact::Source.file_stem()),
        mime: "text/plain",
    }
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> PipelineResult<String> {
    serde_json::to_string_pretty(value).map_err(PipelineError::storage)
}

/// Une ligne par jeton : `%-15s %-20s Line %d`.
pub fn tokens_txt(tokens: &[Token]) -> String {
    let mut s = String::new();
    for t in tokens {
        let _ = writeln!(s, "{:<15} {:<20} Line {}", t.kind.as_str(), t.value, t.line);
    }
    s
}

/// `digraph AST` : un nœud par visite pré-ordre (`node<id>`), une arête parent → enfant.
pub fn ast_dot(ast: &Node) -> String {
    let mut s = String::from("digraph AST {\n  node [shape=box, style=filled, color=lightblue];\n\n");
    for v in ast.preorder() {
        let mut label = v.node.kind().to_owned();
        if let Some(name) = v.node.name() {
            label.push_str("\\n");
            label.push_str(&escape(name));
        }
        if let Some(value) = v.node.value() {
            label.push_str("\\n");
            label.push_str(&escape(&value.to_string()));
        }
        let _ = writeln!(s, "  node{} [label=\"{label}\"];", v.id);
        if let Some(parent) = v.parent {
            let _ = writeln!(s, "  node{parent} -> node{};", v.id);
        }
    }
    s.push_str("}\n");
    s
}

/* ─────────────────────────── Archive ─────────────────────────── */

#[derive(Serialize)]
struct Summary<'a> {
    timestamp: String,
    stages: Vec<&'a str>,
    total_duration: u64,
}

/// Archive zip des six entrées.
pub fn bundle(session: &Session, now: NaiveDateTime) -> PipelineResult<Vec<u8>> {
    let out = &session.outputs;
    let summary = Summary {
        timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        stages: session.stages.iter().map(|s| s.name.as_str()).collect(),
        total_duration: session.total_duration(),
    };
    let contents: [String; 6] = [
        pretty(&out.tokens)?,
        pretty(&out.ast)?,
        pretty(&out.ir)?,
        out.asm.join("\n"),
        cpipe_ir::derive_cfg(&out.ir).to_dot(),
        pretty(&summary)?,
    ];

    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, body) in BUNDLE_ENTRIES.iter().zip(contents) {
        zw.start_file(*name, opts).map_err(PipelineError::storage)?;
        zw.write_all(body.as_bytes()).map_err(PipelineError::storage)?;
    }
    let cursor = zw.finish().map_err(PipelineError::storage)?;
    Ok(cursor.into_inner())
}

/* ─────────────────────────── Tests ─────────────────────────── */
