// src/lib.rs
//! cpipe Compiler: simulation d'un pipeline de compilation C en six étapes
//!
//! - Entrée : texte source quelconque (non vide)
//! - Étape 1 : tokens réels (`cpipe-lexer`)
//! - Étapes 2..6 : sorties figées, voir [`fixtures`]
//! - Chaque étape reçoit une durée simulée tirée dans sa plage
//!
//! La source d'aléa est fournie par l'appelant : même graine, mêmes durées.
//!
//! ```rust
//! use cpipe_compiler::Compiler;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let s = Compiler::default().compile("compile_x", "int main(){return 0;}", &mut rng).unwrap();
//! assert_eq!(s.stages.len(), 6);
//! ```

#![deny(missing_docs)]

pub mod fixtures;

use std::ops::RangeInclusive;

use cpipe_ast::Node;
use cpipe_core::{PipelineError, PipelineResult, StageKind, Token};
use cpipe_ir::Instr;
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use fixtures::{fixture_assembly, fixture_ast, fixture_ir, fixture_optimizations, fixture_symbol_table};

// ─────────────────────────────────────────────────────────────────────────────
// Table des symboles / optimisations
// ─────────────────────────────────────────────────────────────────────────────

/// Entrée de la table des symboles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Nom.
    pub name: String,
    /// Type (`int`, `function`, …).
    #[serde(rename = "type")]
    pub ty: String,
    /// Type de retour (fonctions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Variable initialisée.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialized: Option<bool>,
    /// `global` / `local`.
    pub scope: String,
}

/// Symboles groupés par portée, dans l'ordre de déclaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolTable {
    /// Portée → symboles.
    pub scopes: IndexMap<String, Vec<Symbol>>,
}

impl SymbolTable {
    /// Tous les symboles à plat, avec le nom de leur portée.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.scopes.iter().flat_map(|(scope, syms)| syms.iter().map(move |s| (scope.as_str(), s)))
    }

    /// Nombre total de symboles.
    pub fn len(&self) -> usize {
        self.scopes.values().map(Vec::len).sum()
    }

    /// Aucune entrée.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drapeaux de l'étape d'optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Optimizations {
    /// Repliement de constantes.
    pub constant_folding: bool,
    /// Élimination de code mort.
    pub dead_code_elimination: bool,
    /// Sous-expressions communes.
    pub common_subexpression: bool,
    /// Déroulage de boucles.
    pub loop_unrolling: bool,
}

impl Optimizations {
    /// Paires `(nom, actif)`, dans l'ordre de sérialisation.
    pub const fn flags(&self) -> [(&'static str, bool); 4] {
        [
            ("constant_folding", self.constant_folding),
            ("dead_code_elimination", self.dead_code_elimination),
            ("common_subexpression", self.common_subexpression),
            ("loop_unrolling", self.loop_unrolling),
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Étapes
// ─────────────────────────────────────────────────────────────────────────────

/// État d'une étape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// En attente.
    Pending,
    /// Terminée.
    Completed,
}

/// Charge utile d'une étape. En JSON elle est aplatie dans l'étape sous une
/// clé propre (`tokens`, `ast`, `symbol_table`, `ir_code`, `optimizations`, `assembly`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePayload {
    /// Analyse lexicale.
    Tokens(Vec<Token>),
    /// Analyse syntaxique.
    Ast(Node),
    /// Analyse sémantique.
    SymbolTable(SymbolTable),
    /// Génération d'IR.
    IrCode(Vec<Instr>),
    /// Optimisation.
    Optimizations(Optimizations),
    /// Génération de code.
    Assembly(Vec<String>),
}

impl StagePayload {
    /// Étape correspondant à la variante.
    pub const fn kind(&self) -> StageKind {
        match self {
            Self::Tokens(_) => StageKind::Lexical,
            Self::Ast(_) => StageKind::Syntax,
            Self::SymbolTable(_) => StageKind::Semantic,
            Self::IrCode(_) => StageKind::Ir,
            Self::Optimizations(_) => StageKind::Optimization,
            Self::Assembly(_) => StageKind::Codegen,
        }
    }

    /// Taille grossière : jetons, nœuds, symboles, instructions, drapeaux, lignes.
    pub fn size(&self) -> usize {
        match self {
            Self::Tokens(t) => t.len(),
            Self::Ast(n) => n.count(),
            Self::SymbolTable(s) => s.len(),
            Self::IrCode(i) => i.len(),
            Self::Optimizations(o) => o.flags().len(),
            Self::Assembly(a) => a.len(),
        }
    }
}

/// Une étape du pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Nom affiché (`Lexical Analysis`, …).
    pub name: String,
    /// État.
    pub status: StageStatus,
    /// Durée simulée (ms).
    pub duration: u32,
    /// Charge utile.
    #[serde(flatten)]
    pub payload: StagePayload,
}

impl Stage {
    /// Étape terminée.
    pub fn completed(duration: u32, payload: StagePayload) -> Self {
        Self { name: payload.kind().title().to_owned(), status: StageStatus::Completed, duration, payload }
    }

    /// Étape correspondant à la charge utile.
    pub const fn kind(&self) -> StageKind {
        self.payload.kind()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Sorties exposées pour le téléchargement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outputs {
    /// Jetons.
    pub tokens: Vec<Token>,
    /// AST.
    pub ast: Node,
    /// IR.
    pub ir: Vec<Instr>,
    /// Assembleur.
    pub asm: Vec<String>,
}

/// Document d'une compilation (écrit une fois, relu ensuite).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Identifiant `compile_…`.
    pub session_id: String,
    /// Toujours vrai pour un document stocké.
    pub success: bool,
    /// Les six étapes, dans l'ordre.
    pub stages: Vec<Stage>,
    /// Sorties.
    pub outputs: Outputs,
}

impl Session {
    /// Étape par type.
    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind() == kind)
    }

    /// Table des symboles de l'étape sémantique.
    pub fn symbol_table(&self) -> Option<&SymbolTable> {
        self.stages.iter().find_map(|s| match &s.payload {
            StagePayload::SymbolTable(t) => Some(t),
            _ => None,
        })
    }

    /// Drapeaux de l'étape d'optimisation.
    pub fn optimizations(&self) -> Option<&Optimizations> {
        self.stages.iter().find_map(|s| match &s.payload {
            StagePayload::Optimizations(o) => Some(o),
            _ => None,
        })
    }

    /// Somme des durées.
    pub fn total_duration(&self) -> u64 {
        self.stages.iter().map(|s| u64::from(s.duration)).sum()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compilateur
// ─────────────────────────────────────────────────────────────────────────────

/// Plage (ms, bornes incluses) de la durée simulée d'une étape.
pub const fn duration_range(kind: StageKind) -> RangeInclusive<u32> {
    match kind {
        StageKind::Lexical => 50..=200,
        StageKind::Syntax => 100..=300,
        StageKind::Semantic => 80..=250,
        StageKind::Ir => 150..=400,
        StageKind::Optimization => 200..=500,
        StageKind::Codegen => 250..=600,
    }
}

/// Compilateur simulé.
#[derive(Debug, Clone)]
pub struct Compiler {
    ranges: [RangeInclusive<u32>; StageKind::COUNT],
}

impl Default for Compiler {
    fn default() -> Self {
        Self { ranges: StageKind::ALL.map(duration_range) }
    }
}

impl Compiler {
    /// Remplace la plage d'une étape (bancs d'essai, démos accélérées).
    #[must_use]
    pub fn with_range(mut self, kind: StageKind, range: RangeInclusive<u32>) -> Self {
        self.ranges[kind.index()] = range;
        self
    }

    /// Construit le document de session.
    ///
    /// Erreur `EmptyInput` si le source est vide ou ne contient que des blancs.
    pub fn compile<R: Rng + ?Sized>(&self, session_id: &str, source: &str, rng: &mut R) -> PipelineResult<Session> {
        if source.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let tokens = cpipe_lexer::tokenize(source);
        let ast = fixtures::fixture_ast();
        let ir = fixtures::fixture_ir();
        let asm = fixtures::fixture_assembly();

        let payloads = [
            StagePayload::Tokens(tokens.clone()),
            StagePayload::Ast(ast.clone()),
            StagePayload::SymbolTable(fixtures::fixture_symbol_table()),
            StagePayload::IrCode(ir.clone()),
            StagePayload::Optimizations(fixtures::fixture_optimizations()),
            StagePayload::Assembly(asm.clone()),
        ];
        let stages: Vec<Stage> = payloads
            .into_iter()
            .map(|p| {
                let range = self.ranges[p.kind().index()].clone();
                Stage::completed(rng.gen_range(range), p)
            })
            .collect();

        tracing::debug!(session = session_id, tokens = tokens.len(), "pipeline simulated");

        Ok(Session {
            session_id: session_id.to_owned(),
            success: true,
            stages,
            outputs: Outputs { tokens, ast, ir, asm },
        })
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(src: &str, seed: u64) -> Session {
        Compiler::default().compile("compile_test", src, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn end_to_end_minimal_program() {
        let s = run("int main(){return 0;}", 1);
        assert_eq!(s.stages.len(), 6);
        assert!(!s.outputs.tokens.is_empty());
        assert!(!s.outputs.asm.is_empty());
        assert!(matches!(s.outputs.ir.last(), Some(Instr::Op(op)) if op.op == cpipe_ir::Opcode::Ret));
        let names: Vec<_> = s.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Lexical Analysis",
                "Syntax Analysis",
                "Semantic Analysis",
                "IR Generation",
                "Optimization",
                "Code Generation"
            ]
        );
        assert!(s.stages.iter().all(|st| st.status == StageStatus::Completed));
    }

    #[test]
    fn empty_source_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(Compiler::default().compile("x", "", &mut rng), Err(PipelineError::EmptyInput));
        assert_eq!(Compiler::default().compile("x", " \n\t", &mut rng), Err(PipelineError::EmptyInput));
    }

    #[test]
    fn fixtures_do_not_depend_on_input() {
        let a = run("int x = 1;", 3);
        let b = run("while (y) { y = y - 1; }", 3);
        assert_ne!(a.outputs.tokens, b.outputs.tokens);
        for i in 1..6 {
            assert_eq!(a.stages[i].payload, b.stages[i].payload);
        }
        assert_eq!(a.outputs.ast, b.outputs.ast);
        assert_eq!(a.outputs.ir, b.outputs.ir);
        assert_eq!(a.outputs.asm, b.outputs.asm);
    }

    #[test]
    fn durations_in_range_and_seeded() {
        for seed in 0..50 {
            let s = run("int a;", seed);
            for st in &s.stages {
                assert!(duration_range(st.kind()).contains(&st.duration), "{} {}", st.name, st.duration);
            }
        }
        let d = |s: &Session| s.stages.iter().map(|st| st.duration).collect::<Vec<_>>();
        assert_eq!(d(&run("int a;", 42)), d(&run("int a;", 42)));
    }

    #[test]
    fn stage_json_is_flattened() {
        let s = run("int a = 5;", 9);
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["stages"][0]["tokens"][0]["type"], "KEYWORD");
        assert!(v["stages"][2]["symbol_table"]["main"].is_array());
        assert_eq!(v["stages"][3]["ir_code"][0]["op"], "ALLOC");
        assert_eq!(v["stages"][4]["optimizations"]["loop_unrolling"], false);
        assert_eq!(v["stages"][5]["assembly"][0], ".section .text");
        assert_eq!(v["outputs"]["asm"].as_array().unwrap().len(), 29);

        let back: Session = serde_json::from_value(v).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.symbol_table().unwrap().len(), 5);
        assert_eq!(back.total_duration(), s.stages.iter().map(|st| u64::from(st.duration)).sum::<u64>());
    }

    #[test]
    fn custom_range() {
        let c = Compiler::default().with_range(StageKind::Lexical, 7..=7);
        let s = c.compile("x", "a", &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(s.stages[0].duration, 7);
    }
}
