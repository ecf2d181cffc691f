// src/lib.rs
//! cpipe AST
//!
//! Nœuds de l'arbre syntaxique montré par le pipeline de démonstration.
//! La forme JSON suit la convention « ESTree » : chaque nœud porte un champ
//! `type` (`Program`, `FunctionDeclaration`, …) et ses champs propres.
//!
//! - Un seul enum [`Node`], sérialisé avec `#[serde(tag = "type")]`
//! - [`Node::children`] : les enfants suivis par les vues et l'export
//!   (`body`, `declarations`, `consequent`, `alternate`)
//! - [`Node::preorder`] : parcours pré-ordre sur pile explicite, avec
//!   identifiant séquentiel, profondeur et rang parmi les frères
//!
//! # Exemple
//! ```rust
//! use cpipe_ast::{Node, LiteralValue};
//!
//! let prog = Node::Program { body: vec![Node::ident("a")] };
//! assert_eq!(prog.preorder().len(), 2);
//! assert_eq!(Node::lit(5).value(), Some(&LiteralValue::Int(5)));
//! ```

#![deny(missing_docs)]

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

/* ─────────────────────────── Valeurs ─────────────────────────── */

/// Valeur d'un nœud `Literal` (entier ou chaîne, sans étiquette en JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    /// Entier signé.
    Int(i64),
    /// Chaîne brute.
    Str(String),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for LiteralValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for LiteralValue {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

/* ─────────────────────────── Nœuds ─────────────────────────── */

/// Nœud d'AST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    /// Racine.
    Program {
        /// Déclarations top-level.
        body: Vec<Node>,
    },
    /// Déclaration de fonction.
    FunctionDeclaration {
        /// Nom de la fonction.
        name: String,
        /// Paramètres.
        params: Vec<Node>,
        /// Instructions du corps.
        body: Vec<Node>,
    },
    /// `int a = 5, b = 10;`
    VariableDeclaration {
        /// Déclarateurs (`Identifier` avec `init`).
        declarations: Vec<Node>,
    },
    /// Identifiant, éventuellement initialisé (déclarateur).
    Identifier {
        /// Nom.
        name: String,
        /// Initialiseur.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        init: Option<Box<Node>>,
    },
    /// Littéral.
    Literal {
        /// Valeur.
        value: LiteralValue,
    },
    /// `left op right`
    BinaryExpression {
        /// Opérateur (`+`, `>`, …).
        operator: String,
        /// Opérande gauche.
        left: Box<Node>,
        /// Opérande droite.
        right: Box<Node>,
    },
    /// `if (test) consequent else alternate`
    IfStatement {
        /// Condition.
        test: Box<Node>,
        /// Branche vraie.
        consequent: Box<Node>,
        /// Branche fausse.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alternate: Option<Box<Node>>,
    },
    /// `{ … }`
    BlockStatement {
        /// Instructions.
        body: Vec<Node>,
    },
    /// Appel de fonction.
    CallExpression {
        /// Fonction appelée.
        callee: Box<Node>,
        /// Arguments.
        arguments: Vec<Node>,
    },
    /// `for (init; test; update) body`
    ForStatement {
        /// Initialisation.
        init: Box<Node>,
        /// Condition.
        test: Box<Node>,
        /// Mise à jour.
        update: Box<Node>,
        /// Corps.
        body: Box<Node>,
    },
    /// `i++`
    UpdateExpression {
        /// Opérateur (`++`, `--`).
        operator: String,
        /// Cible.
        argument: Box<Node>,
    },
    /// `return argument;`
    ReturnStatement {
        /// Valeur retournée.
        argument: Box<Node>,
    },
}

/// Visite produite par [`Node::preorder`].
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    /// Identifiant séquentiel (ordre pré-ordre, racine = 0).
    pub id: usize,
    /// Profondeur (racine = 0).
    pub depth: usize,
    /// Rang parmi les frères (0 pour la racine).
    pub sibling: usize,
    /// Identifiant du parent.
    pub parent: Option<usize>,
    /// Nœud visité.
    pub node: &'a Node,
}

impl Node {
    /// Raccourci : identifiant nu.
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Identifier { name: name.into(), init: None }
    }

    /// Raccourci : identifiant initialisé.
    pub fn declarator(name: impl Into<String>, init: Self) -> Self {
        Self::Identifier { name: name.into(), init: Some(Box::new(init)) }
    }

    /// Raccourci : littéral.
    pub fn lit(value: impl Into<LiteralValue>) -> Self {
        Self::Literal { value: value.into() }
    }

    /// Raccourci : expression binaire.
    pub fn binary(operator: &str, left: Self, right: Self) -> Self {
        Self::BinaryExpression { operator: operator.to_owned(), left: Box::new(left), right: Box::new(right) }
    }

    /// Nom du type, tel qu'écrit dans le champ JSON `type`.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Program { .. } => "Program",
            Self::FunctionDeclaration { .. } => "FunctionDeclaration",
            Self::VariableDeclaration { .. } => "VariableDeclaration",
            Self::Identifier { .. } => "Identifier",
            Self::Literal { .. } => "Literal",
            Self::BinaryExpression { .. } => "BinaryExpression",
            Self::IfStatement { .. } => "IfStatement",
            Self::BlockStatement { .. } => "BlockStatement",
            Self::CallExpression { .. } => "CallExpression",
            Self::ForStatement { .. } => "ForStatement",
            Self::UpdateExpression { .. } => "UpdateExpression",
            Self::ReturnStatement { .. } => "ReturnStatement",
        }
    }

    /// Champ `name`, s'il existe.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::FunctionDeclaration { name, .. } | Self::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Champ `value`, s'il existe.
    pub const fn value(&self) -> Option<&LiteralValue> {
        match self {
            Self::Literal { value } => Some(value),
            _ => None,
        }
    }

    /// Enfants structurels, avec leur rang : éléments de `body` et
    /// `declarations` (rang = position), puis `consequent` (0) et
    /// `alternate` (1). Les autres champs (`test`, `init`, opérandes…) ne
    /// sont pas suivis.
    pub fn children(&self) -> Vec<(usize, &Self)> {
        match self {
            Self::Program { body } | Self::FunctionDeclaration { body, .. } | Self::BlockStatement { body } => {
                body.iter().enumerate().collect()
            }
            Self::VariableDeclaration { declarations } => declarations.iter().enumerate().collect(),
            Self::ForStatement { body, .. } => vec![(0, body.as_ref())],
            Self::IfStatement { consequent, alternate, .. } => {
                let mut out = vec![(0, consequent.as_ref())];
                if let Some(alt) = alternate {
                    out.push((1, alt.as_ref()));
                }
                out
            }
            _ => Vec::new(),
        }
    }

    /// Parcours pré-ordre (pile explicite, pas de récursion).
    pub fn preorder(&self) -> Vec<Visit<'_>> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, usize, Option<usize>, &Self)> = vec![(0, 0, None, self)];
        while let Some((depth, sibling, parent, node)) = stack.pop() {
            let id = out.len();
            out.push(Visit { id, depth, sibling, parent, node });
            // empilés à l'envers pour ressortir dans l'ordre
            for (ix, child) in node.children().into_iter().rev() {
                stack.push((depth + 1, ix, Some(id), child));
            }
        }
        out
    }

    /// Nombre de nœuds suivis par le parcours.
    pub fn count(&self) -> usize {
        self.preorder().len()
    }

    /// Rendu texte indenté (deux espaces par niveau).
    pub fn to_text(&self) -> String {
        let mut s = String::new();
        for v in self.preorder() {
            let _ = write!(s, "{:indent$}{}", "", v.node.kind(), indent = v.depth * 2);
            if let Some(name) = v.node.name() {
                let _ = write!(s, " {name}");
            }
            if let Some(value) = v.node.value() {
                let _ = write!(s, " {value}");
            }
            s.push('\n');
        }
        s
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
