//! directives.rs: consignes d'interface associées à chaque étape
//!
//! Trois tables fixes, indépendantes du contenu de la session :
//!   - une animation par étape ;
//!   - une surbrillance `stage_<n>` colorée par la palette ;
//!   - un texte explicatif (repli sur l'entrée 0 hors table).

use cpipe_core::{StageKind, STAGE_PALETTE};
use serde::Serialize;

/// Descripteur d'animation, étiqueté par `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Animation {
    HighlightTokens { duration: u32, elements: Vec<String>, color: String },
    BuildAst { duration: u32, direction: String },
    ConnectSymbols { duration: u32, elements: Vec<String> },
    FlowAnimation { duration: u32, path: String, speed: String },
    Transform { duration: u32, before: String, after: String },
    AssemblyBuild { duration: u32, direction: String },
}

impl Animation {
    /// Durée (ms).
    pub const fn duration(&self) -> u32 {
        match self {
            Self::HighlightTokens { duration, .. }
            | Self::BuildAst { duration, .. }
            | Self::ConnectSymbols { duration, .. }
            | Self::FlowAnimation { duration, .. }
            | Self::Transform { duration, .. }
            | Self::AssemblyBuild { duration, .. } => *duration,
        }
    }
}

/// Animations de l'étape (toujours exactement une).
pub fn animations_for(kind: StageKind) -> Vec<Animation> {
    let anim = match kind {
        StageKind::Lexical => Animation::HighlightTokens {
            duration: 2000,
            elements: vec!["token_*".into()],
            color: "#f39c12".into(),
        },
        StageKind::Syntax => Animation::BuildAst { duration: 3000, direction: "top_down".into() },
        StageKind::Semantic => Animation::ConnectSymbols { duration: 2000, elements: vec!["symbol_*".into()] },
        StageKind::Ir => Animation::FlowAnimation { duration: 2500, path: "linear".into(), speed: "medium".into() },
        StageKind::Optimization => {
            Animation::Transform { duration: 2000, before: "ir_node".into(), after: "optimized_node".into() }
        }
        StageKind::Codegen => Animation::AssemblyBuild { duration: 3000, direction: "sequential".into() },
    };
    vec![anim]
}

/// Mise en évidence d'un nœud d'étape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    /// Élément ciblé (`stage_<n>`).
    pub element: String,
    /// Couleur.
    pub color: &'static str,
    /// Intensité (0..1).
    pub intensity: f64,
    /// Pulsation.
    pub pulse: bool,
}

/// Surbrillances pour l'étape `step`.
pub fn highlights_for(step: usize) -> Vec<Highlight> {
    vec![Highlight {
        element: format!("stage_{step}"),
        color: STAGE_PALETTE[step % STAGE_PALETTE.len()],
        intensity: 0.8,
        pulse: true,
    }]
}

/// Texte explicatif d'une étape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Explanation {
    /// Index.
    pub step: usize,
    /// Titre.
    pub title: &'static str,
    /// Résumé.
    pub description: &'static str,
    /// Détails.
    pub details: &'static str,
}

/// Table des explications.
pub const EXPLANATIONS: [Explanation; 6] = [
    Explanation {
        step: 0,
        title: "Lexical Analysis",
        description: "Breaking source code into tokens (keywords, identifiers, operators, etc.)",
        details: "Scanner reads characters and groups them into tokens according to language grammar.",
    },
    Explanation {
        step: 1,
        title: "Syntax Analysis",
        description: "Parsing tokens to build Abstract Syntax Tree (AST)",
        details: "Parser checks syntax validity and creates tree structure representing program hierarchy.",
    },
    Explanation {
        step: 2,
        title: "Semantic Analysis",
        description: "Validating program meaning and building symbol table",
        details: "Type checking, scope resolution, and semantic rule verification.",
    },
    Explanation {
        step: 3,
        title: "IR Generation",
        description: "Generating Intermediate Representation (IR) code",
        details: "Converting AST to platform-independent intermediate code for optimization.",
    },
    Explanation {
        step: 4,
        title: "Optimization",
        description: "Applying optimizations to improve code efficiency",
        details: "Constant folding, dead code elimination, loop optimizations, etc.",
    },
    Explanation {
        step: 5,
        title: "Code Generation",
        description: "Generating target assembly/machine code",
        details: "Converting optimized IR to specific architecture assembly code.",
    },
];

/// Explication de l'étape `step` (entrée 0 hors table).
pub fn explanation_for(step: usize) -> Explanation {
    EXPLANATIONS.get(step).copied().unwrap_or(EXPLANATIONS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn one_animation_per_stage() {
        let durations: Vec<u32> =
            StageKind::ALL.iter().map(|k| animations_for(*k)).inspect(|a| assert_eq!(a.len(), 1)).map(|a| a[0].duration()).collect();
        assert_eq!(durations, [2000, 3000, 2000, 2500, 2000, 3000]);
    }

    #[test]
    fn animation_json() {
        let v = serde_json::to_value(animations_for(StageKind::Lexical)).unwrap();
        assert_eq!(
            v,
            serde_json::json!([{"type": "highlight_tokens", "duration": 2000, "elements": ["token_*"], "color": "#f39c12"}])
        );
        let v = serde_json::to_value(animations_for(StageKind::Ir)).unwrap();
        assert_eq!(v[0], serde_json::json!({"type": "flow_animation", "duration": 2500, "path": "linear", "speed": "medium"}));
    }

    #[test]
    fn highlight_palette_wraps() {
        assert_eq!(highlights_for(2)[0].color, "#e74c3c");
        assert_eq!(highlights_for(7)[0].color, "#2ecc71");
        let v = serde_json::to_value(&highlights_for(0)[0]).unwrap();
        assert_eq!(v, serde_json::json!({"element": "stage_0", "color": "#3498db", "intensity": 0.8, "pulse": true}));
    }

    #[test]
    fn explanation_fallback() {
        assert_eq!(explanation_for(4).title, "Optimization");
        assert_eq!(explanation_for(42), EXPLANATIONS[0]);
    }
}
