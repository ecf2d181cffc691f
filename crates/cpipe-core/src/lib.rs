//! cpipe-core: primitives partagées du pipeline
//!
//! Fournit :
//! - `Token` / `TokenKind` : jeton classé produit par le tokenizer
//! - `StageKind` : les six étapes fixes du pipeline simulé (ordre total)
//! - Erreurs `PipelineError` + alias `PipelineResult<T>`
//!
//! Tout ce qui est partagé entre le lexer, le compilateur (fixtures), le store
//! de sessions, la navigation et l'export vit ici.

#![deny(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

/* ─────────────────────────── Résultat commun ─────────────────────────── */

/// Alias résultat commun au pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

/* ─────────────────────────── Jetons ─────────────────────────── */

/// Classe d'un jeton (sérialisée en `SCREAMING_SNAKE_CASE`, ex. `STRING_LITERAL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    /// Mot-clé (`int`, `return`, …).
    Keyword,
    /// Identifiant.
    Identifier,
    /// Opérateur (`=`, `+`, …).
    Operator,
    /// Délimiteur (`;`, `(`, …).
    Delimiter,
    /// Littéral numérique.
    Literal,
    /// Morceau de chaîne (contient un `"`).
    StringLiteral,
}

impl TokenKind {
    /// Nom tel qu'affiché dans les exports (`KEYWORD`, `STRING_LITERAL`…).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "KEYWORD",
            Self::Identifier => "IDENTIFIER",
            Self::Operator => "OPERATOR",
            Self::Delimiter => "DELIMITER",
            Self::Literal => "LITERAL",
            Self::StringLiteral => "STRING_LITERAL",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Jeton classé. L'ordre de production (ligne, puis gauche→droite) est significatif.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Classe du jeton.
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Texte brut.
    pub value: String,
    /// Ligne (1-based).
    pub line: u32,
}

impl Token {
    /// Construit un jeton.
    pub fn new(kind: TokenKind, value: impl Into<String>, line: u32) -> Self {
        Self { kind, value: value.into(), line }
    }
}

/* ─────────────────────────── Étapes ─────────────────────────── */

/// Palette des étapes (index = position dans le pipeline, modulo 6).
pub const STAGE_PALETTE: [&str; 6] = ["#3498db", "#2ecc71", "#e74c3c", "#9b59b6", "#f39c12", "#1abc9c"];

/// Les six étapes du pipeline, dans leur ordre fixe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Analyse lexicale.
    Lexical,
    /// Analyse syntaxique.
    Syntax,
    /// Analyse sémantique.
    Semantic,
    /// Génération d'IR.
    Ir,
    /// Optimisation.
    Optimization,
    /// Génération de code.
    Codegen,
}

impl StageKind {
    /// Nombre d'étapes (invariant : toujours 6).
    pub const COUNT: usize = 6;

    /// Toutes les étapes, dans l'ordre.
    pub const ALL: [Self; Self::COUNT] =
        [Self::Lexical, Self::Syntax, Self::Semantic, Self::Ir, Self::Optimization, Self::Codegen];

    /// Index 0-based dans le pipeline.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Étape à l'index donné.
    pub fn from_index(ix: usize) -> Option<Self> {
        Self::ALL.get(ix).copied()
    }

    /// Nom affiché (`"Lexical Analysis"`, …).
    pub const fn title(self) -> &'static str {
        match self {
            Self::Lexical => "Lexical Analysis",
            Self::Syntax => "Syntax Analysis",
            Self::Semantic => "Semantic Analysis",
            Self::Ir => "IR Generation",
            Self::Optimization => "Optimization",
            Self::Codegen => "Code Generation",
        }
    }

    /// Identifiant court utilisé par les vues (`lexical`, `codegen`, …).
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Syntax => "syntax",
            Self::Semantic => "semantic",
            Self::Ir => "ir",
            Self::Optimization => "optimization",
            Self::Codegen => "codegen",
        }
    }

    /// Couleur de l'étape dans la palette.
    pub const fn color(self) -> &'static str {
        STAGE_PALETTE[self.index() % STAGE_PALETTE.len()]
    }

    /// Inverse de [`StageKind::slug`].
    pub fn from_slug(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == s)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs remontées aux frontières (HTTP, CLI). Le `Display` est le message
/// court montré à l'utilisateur ; le détail éventuel reste dans la variante.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// Compilation demandée sans source.
    #[error("No source code provided")]
    EmptyInput,
    /// Identifiant de session inconnu.
    #[error("Compilation result not found")]
    SessionNotFound(String),
    /// La navigation tombe hors de la table des étapes.
    #[error("Invalid step")]
    InvalidStep(i64),
    /// Artefact, format, vue ou action non supporté.
    #[error("{0}")]
    InvalidRequest(String),
    /// Document illisible/corrompu ou I/O en échec (détail non exposé).
    #[error("Storage failure")]
    StorageFailure(String),
}

impl PipelineError {
    /// Construit une `InvalidRequest`.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Construit une `StorageFailure` à partir de n'importe quelle erreur.
    pub fn storage(err: impl fmt::Display) -> Self {
        Self::StorageFailure(err.to_string())
    }

    /// Vrai si l'erreur vient de la requête (et non du serveur).
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::StorageFailure(_))
    }

    /// Nom stable de la variante (logs, JSON).
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::SessionNotFound(_) => "session_not_found",
            Self::InvalidStep(_) => "invalid_step",
            Self::InvalidRequest(_) => "invalid_request",
            Self::StorageFailure(_) => "storage_failure",
        }
    }
}

/* ─────────────────────────── Prélude ─────────────────────────── */

/// Prélude pratique pour importer les types clés du crate.
pub mod prelude {
    pub use super::{PipelineError, PipelineResult, StageKind, Token, TokenKind, STAGE_PALETTE};
}

/* ─────────────────────────── Tests ─────────────────────────── */
