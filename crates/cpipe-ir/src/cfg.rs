//! cfg.rs: graphe de flot de contrôle dérivé de l'IR
//!
//! Règles de dérivation (balayage linéaire, un pointeur « bloc courant ») :
//!   - une étiquette ouvre le bloc `{id: L, label: "L:"}` et le rend courant ;
//!   - une opération ajoute son mnémonique au bloc courant ;
//!   - les opérations vues avant toute étiquette ne vont dans aucun bloc ;
//!   - tout enregistrement avec `target` émet l'arête `courant → target` (label `jump`),
//!     avec `start` comme origine tant qu'aucune étiquette n'est ouverte.
//!
//! `start` n'est donc qu'une extrémité d'arête, jamais un bloc de `nodes`.
//! Pas d'arête de repli (fall-through) : seules les cibles explicites comptent.
//! Les blocs gardent l'ordre de première apparition, les arêtes l'ordre de balayage.
//! Une étiquette répétée réutilise son bloc.

use std::fmt::Write as _;

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};

use crate::Instr;

/// Origine des sauts émis avant la première étiquette.
pub const START: &str = "start";

/// Bloc de base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgNode {
    /// Identifiant (nom d'étiquette ou `start`).
    pub id: String,
    /// Libellé affiché (`"L1:"`).
    pub label: String,
    /// Mnémoniques, dans l'ordre.
    pub instructions: Vec<String>,
}

/// Arête de saut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgEdge {
    /// Bloc d'origine.
    pub from: String,
    /// Étiquette visée.
    pub to: String,
    /// Libellé (`jump`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Graphe complet. Dérivé à la demande, jamais stocké.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlowGraph {
    /// Blocs.
    pub nodes: Vec<CfgNode>,
    /// Arêtes.
    pub edges: Vec<CfgEdge>,
}

/// Dérive le CFG. Déterministe.
pub fn derive_cfg(ir: &[Instr]) -> ControlFlowGraph {
    let mut nodes: IndexMap<String, CfgNode> = IndexMap::new();
    let mut edges = Vec::new();
    let mut current: Option<String> = None;

    for ins in ir {
        match ins {
            Instr::Label { label } => {
                nodes
                    .entry(label.clone())
                    .or_insert_with(|| CfgNode { id: label.clone(), label: format!("{label}:"), instructions: Vec::new() });
                current = Some(label.clone());
            }
            Instr::Op(op) => {
                if let Some(node) = current.as_ref().and_then(|id| nodes.get_mut(id)) {
                    node.instructions.push(op.op.as_str().to_owned());
                }
            }
        }
        if let Some(target) = ins.target() {
            edges.push(CfgEdge {
                from: current.clone().unwrap_or_else(|| START.to_owned()),
                to: target.to_owned(),
                label: Some("jump".to_owned()),
            });
        }
    }

    ControlFlowGraph { nodes: nodes.into_values().collect(), edges }
}

impl ControlFlowGraph {
    /// Position d'un bloc.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    /// Vrai si des sauts partent de `start` sans bloc de ce nom.
    pub fn has_entry(&self) -> bool {
        self.position(START).is_none() && self.edges.iter().any(|e| e.from == START)
    }

    /// Blocs visés depuis `start`, dans l'ordre des arêtes.
    fn entry_targets(&self) -> Vec<usize> {
        if !self.has_entry() {
            return Vec::new();
        }
        self.edges.iter().filter(|e| e.from == START).filter_map(|e| self.position(&e.to)).collect()
    }

    /// Graphe petgraph (poids = index du bloc). Les arêtes vers un bloc
    /// inconnu sont ignorées.
    pub fn to_graph(&self) -> DiGraph<usize, ()> {
        let mut g = DiGraph::with_capacity(self.nodes.len(), self.edges.len());
        let ix: Vec<NodeIndex> = (0..self.nodes.len()).map(|i| g.add_node(i)).collect();
        for e in &self.edges {
            if let (Some(a), Some(b)) = (self.position(&e.from), self.position(&e.to)) {
                g.add_edge(ix[a], ix[b], ());
            }
        }
        g
    }

    /// Profondeur BFS de chaque bloc (alignée sur `nodes`).
    ///
    /// Quand des sauts partent de `start`, `start` occupe la couche 0 et
    /// leurs cibles sont parcourues d'abord, à partir de la profondeur 1.
    /// Ensuite, tout bloc non atteint relance un parcours à la profondeur 0,
    /// dans l'ordre des blocs.
    pub fn layers(&self) -> Vec<usize> {
        let g = self.to_graph();
        let mut depth: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let roots = self
            .entry_targets()
            .into_iter()
            .map(|i| (NodeIndex::new(i), 1))
            .chain(g.node_indices().map(|n| (n, 0)));
        for (root, base) in roots {
            if depth[root.index()].is_some() {
                continue;
            }
            depth[root.index()] = Some(base);
            let mut bfs = Bfs::new(&g, root);
            while let Some(n) = bfs.next(&g) {
                let d = depth[n.index()].unwrap_or(0);
                for m in g.neighbors(n) {
                    if depth[m.index()].is_none() {
                        depth[m.index()] = Some(d + 1);
                    }
                }
            }
        }
        depth.into_iter().map(|d| d.unwrap_or(0)).collect()
    }

    /// Rendu Graphviz (`digraph CFG`).
    pub fn to_dot(&self) -> String {
        let mut s = String::from("digraph CFG {\n  node [shape=box, style=rounded];\n\n");
        for n in &self.nodes {
            let _ = writeln!(s, "  {} [label=\"{}\"];", dot_id(&n.id), escape(&n.label));
        }
        for e in &self.edges {
            let _ = write!(s, "  {} -> {}", dot_id(&e.from), dot_id(&e.to));
            if let Some(l) = &e.label {
                let _ = write!(s, " [label=\"{}\"]", escape(l));
            }
            s.push_str(";\n");
        }
        s.push_str("}\n");
        s
    }

    /// Rendu texte : blocs puis arêtes.
    pub fn to_text(&self) -> String {
        let mut s = String::new();
        for n in &self.nodes {
            let _ = writeln!(s, "{}", n.label);
            for i in &n.instructions {
                let _ = writeln!(s, "    {i}");
            }
        }
        s.push_str("\nEdges:\n");
        for e in &self.edges {
            let _ = write!(s, "  {} -> {}", e.from, e.to);
            if let Some(l) = &e.label {
                let _ = write!(s, " ({l})");
            }
            s.push('\n');
        }
        s
    }
}

/// Échappe `\` et `"` pour une chaîne DOT entre guillemets.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Identifiant DOT : nu s'il est simple, sinon entre guillemets.
fn dot_id(id: &str) -> String {
    let simple = id.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        id.to_owned()
    } else {
        format!("\"{}\"", escape(id))
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Opcode, Operation};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn op(o: Opcode) -> Instr {
        Operation::new(o).into()
    }

    fn jump(o: Opcode, t: &str) -> Instr {
        Operation::new(o).target(t).into()
    }

    fn branchy() -> Vec<Instr> {
        vec![
            op(Opcode::Cmp),
            jump(Opcode::Jle, "L1"),
            jump(Opcode::Jmp, "L2"),
            Instr::label("L1"),
            op(Opcode::Call),
            Instr::label("L2"),
            jump(Opcode::Jmp, "L1"),
        ]
    }

    #[test]
    fn prelabel_ops_are_dropped_but_jumps_leave_start() {
        let cfg = derive_cfg(&branchy());
        let ids: Vec<_> = cfg.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["L1", "L2"]);
        assert_eq!(cfg.nodes[0].instructions, ["CALL"]);
        assert_eq!(cfg.nodes[1].instructions, ["JMP"]);
        assert_eq!(cfg.position(START), None);
        let edges: Vec<_> = cfg.edges.iter().map(|e| (e.from.as_str(), e.to.as_str())).collect();
        assert_eq!(edges, [("start", "L1"), ("start", "L2"), ("L2", "L1")]);
        assert!(cfg.has_entry());
    }

    #[test]
    fn no_start_block_when_first_is_label() {
        let cfg = derive_cfg(&[Instr::label("L0"), op(Opcode::Ret)]);
        assert_eq!(cfg.nodes.len(), 1);
        assert_eq!(cfg.nodes[0].instructions, ["RET"]);
        assert!(cfg.edges.is_empty());
        assert!(!cfg.has_entry());
        assert_eq!(derive_cfg(&[]), ControlFlowGraph::default());
        assert_eq!(derive_cfg(&[op(Opcode::Add), op(Opcode::Ret)]), ControlFlowGraph::default());
    }

    #[test]
    fn repeated_label_reuses_block() {
        let cfg = derive_cfg(&[Instr::label("A"), op(Opcode::Inc), Instr::label("A"), op(Opcode::Ret)]);
        assert_eq!(cfg.nodes.len(), 1);
        assert_eq!(cfg.nodes[0].instructions, ["INC", "RET"]);
    }

    #[test]
    fn layers_by_bfs() {
        let cfg = derive_cfg(&branchy());
        assert_eq!(cfg.layers(), [1, 1]);
        let cfg = derive_cfg(&[Instr::label("A"), jump(Opcode::Jmp, "B"), Instr::label("B")]);
        assert_eq!(cfg.layers(), [0, 1]);
        // L3 n'est atteint par personne : nouvelle racine
        let cfg = derive_cfg(&[
            jump(Opcode::Jmp, "L1"),
            Instr::label("L1"),
            Instr::label("L3"),
            jump(Opcode::Jge, "L4"),
            Instr::label("L4"),
        ]);
        assert_eq!(cfg.layers(), [1, 0, 1]);
    }

    #[test]
    fn dot_rendering() {
        let cfg = derive_cfg(&branchy());
        assert_eq!(
            cfg.to_dot(),
            "digraph CFG {\n  node [shape=box, style=rounded];\n\n  L1 [label=\"L1:\"];\n  L2 [label=\"L2:\"];\n  start -> L1 [label=\"jump\"];\n  start -> L2 [label=\"jump\"];\n  L2 -> L1 [label=\"jump\"];\n}\n"
        );
        assert_eq!(dot_id("a b"), "\"a b\"");
        assert_eq!(escape(r#"x"y\"#), r#"x\"y\\"#);
    }

    #[test]
    fn text_rendering() {
        let cfg = derive_cfg(&[Instr::label("L1"), jump(Opcode::Jmp, "L1")]);
        assert_eq!(cfg.to_text(), "L1:\n    JMP\n\nEdges:\n  L1 -> L1 (jump)\n");
    }

    fn arb_ir() -> impl Strategy<Value = Vec<Instr>> {
        let labels = ["L0", "L1", "L2", "L3"];
        prop::collection::vec((0u8..3, 0usize..4), 0..24).prop_map(move |raw| {
            let mut emitted: Vec<&str> = Vec::new();
            let mut out = Vec::new();
            for (kind, n) in raw {
                match kind {
                    0 => {
                        emitted.push(labels[n]);
                        out.push(Instr::label(labels[n]));
                    }
                    1 => out.push(op(Opcode::Add)),
                    _ => {
                        // cible bien formée : une étiquette déjà émise, sinon on l'émet après
                        let t = labels[n];
                        out.push(jump(Opcode::Jmp, t));
                        if !emitted.contains(&t) {
                            emitted.push(t);
                            out.push(Instr::label(t));
                        }
                    }
                }
            }
            out
        })
    }

    proptest! {
        #[test]
        fn edge_endpoints_are_nodes(ir in arb_ir()) {
            prop_assert!(crate::issues(&ir).iter().all(|i| matches!(i, crate::IrIssue::DuplicateLabel { .. })), "unexpected non-DuplicateLabel issue");
            let cfg = derive_cfg(&ir);
            for e in &cfg.edges {
                prop_assert!(e.from == START || cfg.position(&e.from).is_some(), "from {}", e.from);
                prop_assert!(e.to == START || cfg.position(&e.to).is_some(), "to {}", e.to);
            }
            prop_assert_eq!(cfg.layers().len(), cfg.nodes.len());
            prop_assert_eq!(derive_cfg(&ir), cfg);
        }
    }
}
