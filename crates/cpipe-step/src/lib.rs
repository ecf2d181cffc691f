//! cpipe-step: navigation pas-à-pas dans les étapes d'une session
//!
//! Le curseur (`session_id`, étape courante) vit chez le client : chaque appel
//! recalcule l'étape cible à partir de l'étape fournie, sans état serveur.
//!
//! Transitions (dernier index = `total - 1`) :
//!   - `next` : `min(step + 1, dernier)`, saturé en haut ;
//!   - `prev` : `max(step - 1, 0)`, saturé en bas ;
//!   - `jump(to)` : `to` borné à `[0, dernier]` (un `to` négatif donne 0) ;
//!     sans `to`, on reste sur l'étape courante.
//!
//! Un résultat hors de la table des étapes (ex. `prev` depuis 99) donne
//! `InvalidStep` ; jamais d'étape nulle.
//!
//! ```rust
//! use cpipe_step::{target_step, StepAction};
//!
//! assert_eq!(target_step(5, StepAction::Next, 6).unwrap(), 5);
//! assert_eq!(target_step(0, StepAction::Jump(Some(-5)), 6).unwrap(), 0);
//! ```

#![deny(missing_docs)]

pub mod directives;

use std::fmt;

use cpipe_compiler::{Session, Stage};
use cpipe_core::{PipelineError, PipelineResult, StageKind};
use serde::Serialize;

pub use directives::{animations_for, explanation_for, highlights_for, Animation, Explanation, Highlight};

/* ─────────────────────────── Actions ─────────────────────────── */

/// Action demandée par le client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepAction {
    /// Étape suivante (action par défaut).
    #[default]
    Next,
    /// Étape précédente.
    Prev,
    /// Saut direct (`None` = rester sur place).
    Jump(Option<i64>),
}

impl StepAction {
    /// Depuis les paramètres bruts. Action absente = `next` ; inconnue = `InvalidRequest`.
    pub fn parse(action: Option<&str>, to: Option<i64>) -> PipelineResult<Self> {
        match action.map(str::trim) {
            None | Some("" | "next") => Ok(Self::Next),
            Some("prev") => Ok(Self::Prev),
            Some("jump") => Ok(Self::Jump(to)),
            Some(other) => Err(PipelineError::invalid(format!("Unknown action: {other}"))),
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => f.write_str("next"),
            Self::Prev => f.write_str("prev"),
            Self::Jump(Some(to)) => write!(f, "jump({to})"),
            Self::Jump(None) => f.write_str("jump"),
        }
    }
}

/* ─────────────────────────── Transitions ─────────────────────────── */

/// Étape cible pour `action` depuis `current`, sur une table de `total` étapes.
pub fn target_step(current: i64, action: StepAction, total: usize) -> PipelineResult<usize> {
    let last = i64::try_from(total).unwrap_or(i64::MAX) - 1;
    let next = match action {
        StepAction::Next => current.saturating_add(1).min(last),
        StepAction::Prev => current.saturating_sub(1).max(0),
        StepAction::Jump(to) => to.unwrap_or(current).min(last).max(0),
    };
    usize::try_from(next)
        .ok()
        .filter(|ix| *ix < total)
        .ok_or(PipelineError::InvalidStep(next))
}

/* ─────────────────────────── Vue ─────────────────────────── */

/// Réponse d'un pas de navigation.
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    /// Étape atteinte.
    pub current_step: usize,
    /// Nombre d'étapes de la session.
    pub total_steps: usize,
    /// Étape complète (avec sa charge utile).
    pub stage: Stage,
    /// Animations à jouer.
    pub animations: Vec<Animation>,
    /// Surbrillances.
    pub highlights: Vec<Highlight>,
    /// Texte explicatif.
    pub explanations: Explanation,
}

/// Applique `action` depuis `current` sur `session`.
pub fn navigate(session: &Session, current: i64, action: StepAction) -> PipelineResult<StepView> {
    let total = session.stages.len();
    let step = target_step(current, action, total)?;
    let stage = session.stages[step].clone();
    // au-delà des six étapes connues, on retombe sur le type porté par l'étape
    let kind = StageKind::from_index(step).unwrap_or_else(|| stage.kind());
    tracing::debug!(session = %session.session_id, from = current, %action, to = step, "step");
    Ok(StepView {
        current_step: step,
        total_steps: total,
        animations: animations_for(kind),
        highlights: highlights_for(step),
        explanations: explanation_for(step),
        stage,
    })
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use cpipe_compiler::Compiler;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session() -> Session {
        Compiler::default().compile("compile_t", "int a = 5;", &mut StdRng::seed_from_u64(1)).unwrap()
    }

    #[test]
    fn saturating_bounds() {
        assert_eq!(target_step(5, StepAction::Next, 6), Ok(5));
        assert_eq!(target_step(0, StepAction::Prev, 6), Ok(0));
        assert_eq!(target_step(2, StepAction::Next, 6), Ok(3));
        assert_eq!(target_step(2, StepAction::Prev, 6), Ok(1));
    }

    #[test]
    fn jump_is_clamped_both_ways() {
        assert_eq!(target_step(0, StepAction::Jump(Some(999)), 6), Ok(5));
        assert_eq!(target_step(3, StepAction::Jump(Some(-5)), 6), Ok(0));
        assert_eq!(target_step(3, StepAction::Jump(None), 6), Ok(3));
    }

    #[test]
    fn out_of_table_is_invalid_step() {
        assert_eq!(target_step(99, StepAction::Prev, 6), Err(PipelineError::InvalidStep(98)));
        assert_eq!(target_step(-5, StepAction::Next, 6), Err(PipelineError::InvalidStep(-4)));
        assert!(matches!(target_step(0, StepAction::Next, 0), Err(PipelineError::InvalidStep(_))));
        assert!(matches!(target_step(0, StepAction::Jump(Some(3)), 0), Err(PipelineError::InvalidStep(_))));
    }

    #[test]
    fn action_parsing() {
        assert_eq!(StepAction::parse(None, None), Ok(StepAction::Next));
        assert_eq!(StepAction::parse(Some("prev"), Some(3)), Ok(StepAction::Prev));
        assert_eq!(StepAction::parse(Some("jump"), Some(3)), Ok(StepAction::Jump(Some(3))));
        assert!(matches!(StepAction::parse(Some("sideways"), None), Err(PipelineError::InvalidRequest(_))));
    }

    #[test]
    fn view_carries_stage_and_directives() {
        let s = session();
        let v = navigate(&s, 0, StepAction::Next).unwrap();
        assert_eq!(v.current_step, 1);
        assert_eq!(v.total_steps, 6);
        assert_eq!(v.stage.name, "Syntax Analysis");
        assert_eq!(v.explanations.title, "Syntax Analysis");
        assert_eq!(v.highlights[0].element, "stage_1");

        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["animations"][0]["type"], "build_ast");
        assert_eq!(json["stage"]["ast"]["type"], "Program");
        assert_eq!(json["explanations"]["step"], 1);
    }

    #[test]
    fn view_rejects_bad_cursor() {
        let s = session();
        assert!(matches!(navigate(&s, 99, StepAction::Prev), Err(PipelineError::InvalidStep(98))));
    }

    proptest! {
        #[test]
        fn in_range_cursor_stays_in_range(cur in 0i64..6, to in proptest::option::of(-20i64..20), which in 0u8..3) {
            let action = match which { 0 => StepAction::Next, 1 => StepAction::Prev, _ => StepAction::Jump(to) };
            let step = target_step(cur, action, 6).unwrap();
            prop_assert!(step < 6);
            let delta = i64::try_from(step).unwrap() - cur;
            match action {
                StepAction::Next => prop_assert!(delta == 0 || delta == 1),
                StepAction::Prev => prop_assert!(delta == 0 || delta == -1),
                StepAction::Jump(_) => {}
            }
        }
    }
}
