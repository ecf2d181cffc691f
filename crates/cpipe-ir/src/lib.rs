//! cpipe-ir: représentation intermédiaire du pipeline de démonstration
//!
//! Fournit :
//! - [`Instr`] : soit une étiquette `{label}`, soit une opération `{op, dest?, …}`
//! - [`Opcode`] / [`Operand`] : jeu d'opérations et opérandes (entier ou nom)
//! - [`listing`] : rendu texte (`LABEL:` puis `    OP a, b, c`)
//! - [`validate`] : cibles de saut pendantes, étiquettes en double
//! - [`cfg`] : dérivation du graphe de flot de contrôle + rendus DOT/texte
//!
//! La forme JSON reprend exactement les clés des enregistrements : un champ
//! absent n'est pas sérialisé.

#![deny(missing_docs)]

pub mod cfg;

use std::collections::HashSet;
use std::fmt::{self, Write as _};

use cpipe_core::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

pub use cfg::{derive_cfg, CfgEdge, CfgNode, ControlFlowGraph};

/* ─────────────────────────── Opcodes ─────────────────────────── */

/// Opérations connues (sérialisées en majuscules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum Opcode {
    Alloc,
    Store,
    Load,
    Add,
    Sub,
    Mul,
    Div,
    Cmp,
    Jmp,
    Je,
    Jne,
    Jl,
    Jle,
    Jg,
    Jge,
    Call,
    Inc,
    Ret,
}

impl Opcode {
    /// Mnémonique (`ALLOC`, `JLE`, …).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alloc => "ALLOC",
            Self::Store => "STORE",
            Self::Load => "LOAD",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Cmp => "CMP",
            Self::Jmp => "JMP",
            Self::Je => "JE",
            Self::Jne => "JNE",
            Self::Jl => "JL",
            Self::Jle => "JLE",
            Self::Jg => "JG",
            Self::Jge => "JGE",
            Self::Call => "CALL",
            Self::Inc => "INC",
            Self::Ret => "RET",
        }
    }

    /// Saut (conditionnel ou non).
    pub const fn is_jump(self) -> bool {
        matches!(self, Self::Jmp | Self::Je | Self::Jne | Self::Jl | Self::Jle | Self::Jg | Self::Jge)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ─────────────────────────── Opérandes ─────────────────────────── */

/// Opérande : constante entière ou nom de variable/temporaire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// Constante.
    Int(i64),
    /// Variable ou temporaire.
    Name(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Name(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Operand {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Self::Name(s.to_owned())
    }
}

/* ─────────────────────────── Instructions ─────────────────────────── */

/// Opération (l'ordre des champs est celui de la sérialisation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Mnémonique.
    pub op: Opcode,
    /// Destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    /// Source unique (`LOAD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Premier opérande.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src1: Option<Operand>,
    /// Second opérande.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src2: Option<Operand>,
    /// Valeur immédiate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Operand>,
    /// Étiquette visée par un saut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Fonction appelée.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func: Option<String>,
    /// Arguments d'appel (texte brut).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Type déclaré (`ALLOC`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
}

#[allow(missing_docs)]
impl Operation {
    /// Opération sans champ.
    pub const fn new(op: Opcode) -> Self {
        Self { op, dest: None, src: None, src1: None, src2: None, value: None, target: None, func: None, args: None, ty: None }
    }

    #[must_use]
    pub fn dest(mut self, d: &str) -> Self {
        self.dest = Some(d.to_owned());
        self
    }

    #[must_use]
    pub fn src(mut self, s: &str) -> Self {
        self.src = Some(s.to_owned());
        self
    }

    #[must_use]
    pub fn srcs(mut self, a: impl Into<Operand>, b: impl Into<Operand>) -> Self {
        self.src1 = Some(a.into());
        self.src2 = Some(b.into());
        self
    }

    #[must_use]
    pub fn value(mut self, v: impl Into<Operand>) -> Self {
        self.value = Some(v.into());
        self
    }

    #[must_use]
    pub fn target(mut self, t: &str) -> Self {
        self.target = Some(t.to_owned());
        self
    }

    #[must_use]
    pub fn call(mut self, func: &str, args: &[&str]) -> Self {
        self.func = Some(func.to_owned());
        self.args = Some(args.iter().map(|a| (*a).to_owned()).collect());
        self
    }

    #[must_use]
    pub fn ty(mut self, t: &str) -> Self {
        self.ty = Some(t.to_owned());
        self
    }

    /// Opérandes affichés dans le listing, dans l'ordre `dest, src, src1, src2, value`.
    pub fn operands(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.extend(self.dest.iter().cloned());
        out.extend(self.src.iter().cloned());
        out.extend(self.src1.iter().map(ToString::to_string));
        out.extend(self.src2.iter().map(ToString::to_string));
        out.extend(self.value.iter().map(ToString::to_string));
        out
    }
}

/// Enregistrement IR. En JSON, `{label}` est essayé en premier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Instr {
    /// Étiquette.
    Label {
        /// Nom.
        label: String,
    },
    /// Opération.
    Op(Operation),
}

impl Instr {
    /// Raccourci : étiquette.
    pub fn label(name: &str) -> Self {
        Self::Label { label: name.to_owned() }
    }

    /// Cible de saut, s'il y en a une.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Op(op) => op.target.as_deref(),
            Self::Label { .. } => None,
        }
    }
}

impl From<Operation> for Instr {
    fn from(op: Operation) -> Self {
        Self::Op(op)
    }
}

/* ─────────────────────────── Listing ─────────────────────────── */

/// Listing texte : `L1:` pour une étiquette, `    OP a, b` pour une opération.
/// La cible d'un saut n'est pas imprimée.
pub fn listing(ir: &[Instr]) -> String {
    let mut out = String::new();
    for ins in ir {
        match ins {
            Instr::Label { label } => {
                let _ = writeln!(out, "{label}:");
            }
            Instr::Op(op) => {
                out.push_str("    ");
                out.push_str(op.op.as_str());
                let operands = op.operands();
                if !operands.is_empty() {
                    out.push(' ');
                    out.push_str(&operands.join(", "));
                }
                out.push('\n');
            }
        }
    }
    out
}

/* ─────────────────────────── Validation ─────────────────────────── */

/// Défaut de forme d'un programme IR.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrIssue {
    /// Saut vers une étiquette jamais émise.
    #[error("instruction {index}: jump target `{target}` has no label")]
    DanglingTarget {
        /// Position de l'instruction.
        index: usize,
        /// Cible manquante.
        target: String,
    },
    /// Étiquette émise deux fois.
    #[error("instruction {index}: label `{label}` already defined")]
    DuplicateLabel {
        /// Position de la seconde occurrence.
        index: usize,
        /// Étiquette.
        label: String,
    },
}

/// Liste tous les défauts, dans l'ordre des instructions.
pub fn issues(ir: &[Instr]) -> Vec<IrIssue> {
    let mut labels = HashSet::new();
    let mut out = Vec::new();
    for (index, ins) in ir.iter().enumerate() {
        if let Instr::Label { label } = ins {
            if !labels.insert(label.as_str()) {
                out.push(IrIssue::DuplicateLabel { index, label: label.clone() });
            }
        }
    }
    for (index, ins) in ir.iter().enumerate() {
        if let Some(t) = ins.target() {
            if !labels.contains(t) {
                out.push(IrIssue::DanglingTarget { index, target: t.to_owned() });
            }
        }
    }
    out.sort_by_key(|i| match i {
        IrIssue::DanglingTarget { index, .. } | IrIssue::DuplicateLabel { index, .. } => *index,
    });
    out
}

/// `Ok` si le programme est bien formé ; sinon `InvalidRequest` avec le premier défaut.
pub fn validate(ir: &[Instr]) -> PipelineResult<()> {
    match issues(ir).into_iter().next() {
        None => Ok(()),
        Some(issue) => Err(PipelineError::invalid(format!("malformed IR: {issue}"))),
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn small() -> Vec<Instr> {
        vec![
            Operation::new(Opcode::Alloc).dest("a").ty("int").into(),
            Operation::new(Opcode::Store).dest("a").value(5).into(),
            Operation::new(Opcode::Load).dest("t1").src("a").into(),
            Operation::new(Opcode::Cmp).dest("t2").srcs("t1", 10).into(),
            Operation::new(Opcode::Jle).target("L1").into(),
            Instr::label("L1"),
            Operation::new(Opcode::Ret).value(0).into(),
        ]
    }

    #[test]
    fn json_keys_match_records() {
        let v = serde_json::to_value(small()).unwrap();
        assert_eq!(v[0], serde_json::json!({"op": "ALLOC", "dest": "a", "type": "int"}));
        assert_eq!(v[3], serde_json::json!({"op": "CMP", "dest": "t2", "src1": "t1", "src2": 10}));
        assert_eq!(v[4], serde_json::json!({"op": "JLE", "target": "L1"}));
        assert_eq!(v[5], serde_json::json!({"label": "L1"}));
    }

    #[test]
    fn json_roundtrip_keeps_labels_apart() {
        let ir = small();
        let back: Vec<Instr> = serde_json::from_str(&serde_json::to_string(&ir).unwrap()).unwrap();
        assert_eq!(back, ir);
        assert!(matches!(back[5], Instr::Label { .. }));
    }

    #[test]
    fn listing_format() {
        assert_eq!(
            listing(&small()),
            "    ALLOC a\n    STORE a, 5\n    LOAD t1, a\n    CMP t2, t1, 10\n    JLE\nL1:\n    RET 0\n"
        );
    }

    #[test]
    fn call_args_are_kept_verbatim() {
        let ins: Instr = Operation::new(Opcode::Call).call("printf", &["\"x %d\\n\"", "sum"]).into();
        let v = serde_json::to_value(&ins).unwrap();
        assert_eq!(v, serde_json::json!({"op": "CALL", "func": "printf", "args": ["\"x %d\\n\"", "sum"]}));
    }

    #[test]
    fn validation_reports_dangling_and_duplicates() {
        assert_eq!(validate(&small()), Ok(()));
        let bad = vec![
            Instr::label("L1"),
            Operation::new(Opcode::Jmp).target("L9").into(),
            Instr::label("L1"),
        ];
        assert_eq!(
            issues(&bad),
            vec![
                IrIssue::DanglingTarget { index: 1, target: "L9".into() },
                IrIssue::DuplicateLabel { index: 2, label: "L1".into() },
            ]
        );
        let err = validate(&bad).unwrap_err();
        assert!(err.to_string().contains("L9"));
    }

    #[test]
    fn jump_opcodes() {
        assert!(Opcode::Jge.is_jump());
        assert!(!Opcode::Cmp.is_jump());
        assert_eq!(Opcode::Jle.to_string(), "JLE");
    }
}
