//! visualize.rs: données de scène 3D (nœuds + arêtes) par vue
//!
//! Le rendu lui-même est fait côté client ; ici on ne produit que le contrat
//! de données : `{nodes, edges, metadata}`.
//!
//! Vues : `all` (pipeline), `lexical`, `syntax`, `semantic`, `ir`,
//! `optimization`, `codegen`. Les positions sont entières.

use std::fmt;
use std::str::FromStr;

use cpipe_ast::Node;
use cpipe_compiler::Session;
use cpipe_core::{PipelineError, PipelineResult, StageKind, TokenKind, STAGE_PALETTE};
use cpipe_ir::cfg::START;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Couleur de repli.
const FALLBACK_COLOR: &str = "#7f8c8d";

/* ─────────────────────────── Vue demandée ─────────────────────────── */

/// Vue de visualisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// Vue d'ensemble du pipeline.
    #[default]
    All,
    /// Vue d'une étape.
    Stage(StageKind),
}

impl View {
    /// Nom de paramètre (`all`, `lexical`, …).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Stage(k) => k.slug(),
        }
    }
}

impl FromStr for View {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Self::All);
        }
        StageKind::from_slug(s).map(Self::Stage).ok_or_else(|| PipelineError::invalid(format!("Unknown stage: {s}")))
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ─────────────────────────── Contrat ─────────────────────────── */

/// Position dans la scène.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct Position {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

const fn at(x: i64, y: i64) -> Position {
    Position { x, y, z: 0 }
}

/// Nœud de scène. Les attributs propres à la vue sont aplatis à la fin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node3D {
    /// Identifiant (`token_3`, `ast_0`, …).
    pub id: String,
    /// Famille (`stage`, `token`, …).
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Libellé.
    pub name: String,
    /// Position.
    pub position: Position,
    /// Couleur.
    pub color: &'static str,
    /// Attributs additionnels.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Arête de scène.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge3D {
    /// Origine.
    pub from: String,
    /// Destination.
    pub to: String,
    /// Famille (`pipeline`, `parent_child`, `scope`, `jump`).
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Libellé éventuel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Attributs additionnels.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge3D {
    fn new(from: String, to: String, kind: &'static str) -> Self {
        Self { from, to, kind, label: None, extra: Map::new() }
    }
}

/// Métadonnées de la scène.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Vue produite.
    pub stage: String,
    /// Session source.
    pub session_id: String,
    /// Nombre de nœuds.
    pub node_count: usize,
    /// Nombre d'arêtes.
    pub edge_count: usize,
}

/// Scène complète.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    /// Nœuds.
    pub nodes: Vec<Node3D>,
    /// Arêtes.
    pub edges: Vec<Edge3D>,
    /// Métadonnées.
    pub metadata: Metadata,
}

fn extra(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

/* ─────────────────────────── Palettes ─────────────────────────── */

const fn token_color(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Keyword => "#e74c3c",
        TokenKind::Identifier => "#3498db",
        TokenKind::Operator => "#f39c12",
        TokenKind::Delimiter => "#95a5a6",
        TokenKind::Literal => "#2ecc71",
        TokenKind::StringLiteral => "#9b59b6",
    }
}

fn ast_color(kind: &str) -> &'static str {
    match kind {
        "Program" => "#2c3e50",
        "FunctionDeclaration" => "#3498db",
        "VariableDeclaration" => "#2ecc71",
        "IfStatement" => "#e74c3c",
        "ForStatement" => "#9b59b6",
        "CallExpression" => "#f39c12",
        "Identifier" => "#1abc9c",
        "Literal" => "#34495e",
        _ => FALLBACK_COLOR,
    }
}

fn symbol_color(ty: &str) -> &'static str {
    match ty {
        "function" => "#3498db",
        "int" => "#2ecc71",
        "float" => "#e74c3c",
        "char" => "#9b59b6",
        _ => FALLBACK_COLOR,
    }
}

/* ─────────────────────────── Vues ─────────────────────────── */

/// Construit la scène de `view` pour `session`.
pub fn visualize(session: &Session, view: View) -> Scene {
    let (nodes, edges) = match view {
        View::All => pipeline_view(session),
        View::Stage(StageKind::Lexical) => lexical_view(session),
        View::Stage(StageKind::Syntax) => syntax_view(&session.outputs.ast),
        View::Stage(StageKind::Semantic) => semantic_view(session),
        View::Stage(StageKind::Ir) => ir_view(session),
        View::Stage(StageKind::Optimization) => optimization_view(session),
        View::Stage(StageKind::Codegen) => codegen_view(&session.outputs.asm),
    };
    let metadata = Metadata {
        stage: view.as_str().to_owned(),
        session_id: session.session_id.clone(),
        node_count: nodes.len(),
        edge_count: edges.len(),
    };
    Scene { nodes, edges, metadata }
}

/// Variante qui analyse le nom de vue (`InvalidRequest` si inconnu).
pub fn visualize_named(session: &Session, view: &str) -> PipelineResult<Scene> {
    Ok(visualize(session, view.parse()?))
}

fn ix(i: usize) -> i64 {
    i64::try_from(i).unwrap_or(i64::MAX)
}

fn pipeline_view(session: &Session) -> (Vec<Node3D>, Vec<Edge3D>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for (i, stage) in session.stages.iter().enumerate() {
        let complexity = stage.payload.size().clamp(1, 10);
        nodes.push(Node3D {
            id: format!("stage_{i}"),
            kind: "stage",
            name: stage.name.clone(),
            position: at(-300 + 120 * ix(i), 0),
            color: STAGE_PALETTE[i % STAGE_PALETTE.len()],
            extra: extra(json!({
                "status": stage.status,
                "metrics": { "duration": stage.duration, "complexity": complexity },
            })),
        });
        if i > 0 {
            let mut e = Edge3D::new(format!("stage_{}", i - 1), format!("stage_{i}"), "pipeline");
            e.extra.insert("flow".into(), Value::Bool(true));
            edges.push(e);
        }
    }
    (nodes, edges)
}

fn lexical_view(session: &Session) -> (Vec<Node3D>, Vec<Edge3D>) {
    let nodes = session
        .outputs
        .tokens
        .iter()
        .enumerate()
        .map(|(i, t)| Node3D {
            id: format!("token_{i}"),
            kind: "token",
            name: t.value.clone(),
            position: at(40 * ix(i) - 200, 50),
            color: token_color(t.kind),
            extra: extra(json!({ "token_type": t.kind, "line": t.line })),
        })
        .collect();
    (nodes, Vec::new())
}

fn syntax_view(ast: &Node) -> (Vec<Node3D>, Vec<Edge3D>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for v in ast.preorder() {
        let value = v.node.name().map(str::to_owned).or_else(|| v.node.value().map(ToString::to_string)).unwrap_or_default();
        nodes.push(Node3D {
            id: format!("ast_{}", v.id),
            kind: "ast_node",
            name: v.node.kind().to_owned(),
            position: at(100 * ix(v.sibling) - 200, -60 * ix(v.depth)),
            color: ast_color(v.node.kind()),
            extra: extra(json!({ "value": value })),
        });
        if let Some(parent) = v.parent {
            edges.push(Edge3D::new(format!("ast_{parent}"), format!("ast_{}", v.id), "parent_child"));
        }
    }
    (nodes, edges)
}

fn semantic_view(session: &Session) -> (Vec<Node3D>, Vec<Edge3D>) {
    let Some(table) = session.symbol_table() else {
        return (Vec::new(), Vec::new());
    };
    let symbols: Vec<_> = table.iter().collect();
    let nodes = symbols
        .iter()
        .enumerate()
        .map(|(i, (scope, sym))| Node3D {
            id: format!("symbol_{i}"),
            kind: "symbol",
            name: sym.name.clone(),
            position: at(-100 + 80 * ix(i % 3), 50 - 60 * ix(i / 3)),
            color: symbol_color(&sym.ty),
            extra: extra(json!({ "symbol_type": sym.ty, "scope": scope })),
        })
        .collect();

    // une fonction relie chaque symbole de la portée qui porte son nom
    let mut edges = Vec::new();
    for (fi, (_, f)) in symbols.iter().enumerate().filter(|(_, (_, s))| s.ty == "function") {
        for (si, (scope, _)) in symbols.iter().enumerate() {
            if *scope == f.name {
                edges.push(Edge3D::new(format!("symbol_{fi}"), format!("symbol_{si}"), "scope"));
            }
        }
    }
    (nodes, edges)
}

fn ir_view(session: &Session) -> (Vec<Node3D>, Vec<Edge3D>) {
    let cfg = cpipe_ir::derive_cfg(&session.outputs.ir);
    let layers = cfg.layers();
    let entry = cfg.has_entry();
    let mut slots: Vec<i64> = Vec::new();
    let mut nodes = Vec::with_capacity(cfg.nodes.len() + 1);
    if entry {
        slots.push(1);
        nodes.push(Node3D {
            id: format!("block_{START}"),
            kind: "basic_block",
            name: format!("{START}:"),
            position: at(-300, 0),
            color: STAGE_PALETTE[0],
            extra: extra(json!({ "instructions": [], "layer": 0 })),
        });
    }
    for (n, layer) in cfg.nodes.iter().zip(&layers) {
        if slots.len() <= *layer {
            slots.resize(layer + 1, 0);
        }
        let slot = slots[*layer];
        slots[*layer] += 1;
        nodes.push(Node3D {
            id: format!("block_{}", n.id),
            kind: "basic_block",
            name: n.label.clone(),
            position: at(-300 + 150 * ix(*layer), -80 * slot),
            color: STAGE_PALETTE[layer % STAGE_PALETTE.len()],
            extra: extra(json!({ "instructions": n.instructions, "layer": layer })),
        });
    }
    let edges = cfg
        .edges
        .iter()
        .filter(|e| ((entry && e.from == START) || cfg.position(&e.from).is_some()) && cfg.position(&e.to).is_some())
        .map(|e| {
            let mut edge = Edge3D::new(format!("block_{}", e.from), format!("block_{}", e.to), "jump");
            edge.label.clone_from(&e.label);
            edge
        })
        .collect();
    (nodes, edges)
}

fn optimization_view(session: &Session) -> (Vec<Node3D>, Vec<Edge3D>) {
    let Some(opts) = session.optimizations() else {
        return (Vec::new(), Vec::new());
    };
    let nodes = opts
        .flags()
        .iter()
        .enumerate()
        .map(|(i, (name, enabled))| Node3D {
            id: format!("opt_{i}"),
            kind: "optimization",
            name: (*name).to_owned(),
            position: at(-150 + 100 * ix(i), 0),
            color: if *enabled { "#2ecc71" } else { "#95a5a6" },
            extra: extra(json!({ "enabled": enabled })),
        })
        .collect();
    (nodes, Vec::new())
}

/// Nature d'une ligne d'assembleur.
fn asm_line_kind(line: &str) -> &'static str {
    let t = line.trim();
    if t.ends_with(':') {
        "label"
    } else if t.starts_with('#') {
        "comment"
    } else if t.starts_with('.') {
        "directive"
    } else {
        "instruction"
    }
}

fn codegen_view(asm: &[String]) -> (Vec<Node3D>, Vec<Edge3D>) {
    let nodes = asm
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let kind = asm_line_kind(line);
            let (x, color) = match kind {
                "label" => (-200, "#e74c3c"),
                "directive" => (-200, "#9b59b6"),
                "comment" => (-160, FALLBACK_COLOR),
                _ => (-160, "#1abc9c"),
            };
            Node3D {
                id: format!("asm_{i}"),
                kind: "asm_line",
                name: line.trim().to_owned(),
                position: at(x, 280 - 20 * ix(i)),
                color,
                extra: extra(json!({ "line_kind": kind })),
            }
        })
        .collect();

    let mut edges = Vec::new();
    for (i, line) in asm.iter().enumerate() {
        let mut parts = line.split_whitespace();
        let (Some(mnemonic), Some(target)) = (parts.next(), parts.next()) else {
            continue;
        };
        if !mnemonic.starts_with('j') {
            continue;
        }
        let wanted = format!("{target}:");
        if let Some(j) = asm.iter().position(|l| l.trim() == wanted) {
            let mut e = Edge3D::new(format!("asm_{i}"), format!("asm_{j}"), "jump");
            e.label = Some(mnemonic.to_owned());
            edges.push(e);
        }
    }
    (nodes, edges)
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use cpipe_compiler::Compiler;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session() -> Session {
        Compiler::default().compile("compile_v", "int a = 5;", &mut StdRng::seed_from_u64(4)).unwrap()
    }

    fn scene(view: &str) -> Scene {
        visualize_named(&session(), view).unwrap()
    }

    #[test]
    fn pipeline_layout() {
        let s = session();
        let sc = visualize(&s, View::All);
        assert_eq!(sc.nodes.len(), 6);
        assert_eq!(sc.edges.len(), 5);
        assert_eq!(sc.nodes[0].position, at(-300, 0));
        assert_eq!(sc.nodes[5].position, at(300, 0));
        let v = serde_json::to_value(&sc).unwrap();
        assert_eq!(v["nodes"][2]["metrics"]["duration"], s.stages[2].duration);
        assert_eq!(v["nodes"][0]["status"], "completed");
        assert_eq!(v["edges"][0], serde_json::json!({"from": "stage_0", "to": "stage_1", "type": "pipeline", "flow": true}));
        assert_eq!(
            v["metadata"],
            serde_json::json!({"stage": "all", "session_id": "compile_v", "node_count": 6, "edge_count": 5})
        );
        for n in &sc.nodes {
            let c = n.extra["metrics"]["complexity"].as_u64().unwrap();
            assert!((1..=10).contains(&c));
        }
    }

    #[test]
    fn lexical_tokens_in_a_row() {
        let sc = scene("lexical");
        assert_eq!(sc.nodes.len(), 5);
        assert_eq!(sc.nodes[1].position, at(-160, 50));
        assert_eq!(sc.nodes[0].color, "#e74c3c");
        assert_eq!(sc.nodes[0].extra["token_type"], "KEYWORD");
    }

    #[test]
    fn syntax_follows_unified_walk() {
        let sc = scene("syntax");
        let s = session();
        assert_eq!(sc.nodes.len(), s.outputs.ast.count());
        assert_eq!(sc.edges.len(), sc.nodes.len() - 1);
        assert_eq!(sc.nodes[0].name, "Program");
        assert_eq!(sc.nodes[1].extra["value"], "main");
        assert_eq!(sc.nodes[1].position, at(-200, -60));
        assert!(sc.edges.iter().all(|e| e.kind == "parent_child"));
    }

    #[test]
    fn semantic_grid_and_scope_edges() {
        let sc = scene("semantic");
        assert_eq!(sc.nodes.len(), 5);
        assert_eq!(sc.nodes[4].position, at(-20, -10));
        assert_eq!(sc.nodes[0].extra["scope"], "global");
        assert_eq!(sc.nodes[1].extra["scope"], "main");
        let e: Vec<_> = sc.edges.iter().map(|e| (e.from.as_str(), e.to.as_str())).collect();
        assert_eq!(e, [("symbol_0", "symbol_1"), ("symbol_0", "symbol_2"), ("symbol_0", "symbol_3"), ("symbol_0", "symbol_4")]);
    }

    #[test]
    fn ir_blocks_by_layer() {
        let sc = scene("ir");
        let ids: Vec<_> = sc.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["block_start", "block_L1", "block_L2", "block_L3", "block_L4"]);
        assert_eq!(sc.edges.len(), 4);
        assert_eq!(sc.nodes[0].extra["instructions"], json!([]));
        assert_eq!(sc.nodes[0].position, at(-300, 0));
        assert_eq!(sc.nodes[2].position, at(-150, -80));
        assert_eq!(sc.nodes[3].position, at(-300, -80));
        let from_start = sc.edges.iter().filter(|e| e.from == "block_start").count();
        assert_eq!(from_start, 2);
        assert!(sc.edges.iter().all(|e| e.label.as_deref() == Some("jump")));
    }

    #[test]
    fn optimization_and_codegen() {
        let opt = scene("optimization");
        assert_eq!(opt.nodes.len(), 4);
        assert_eq!(opt.nodes[0].extra["enabled"], true);
        assert_eq!(opt.nodes[1].color, "#95a5a6");

        let cg = scene("codegen");
        assert_eq!(cg.nodes.len(), 29);
        let jumps: Vec<_> = cg.edges.iter().map(|e| e.label.as_deref().unwrap_or("")).collect();
        assert_eq!(jumps, ["jle", "jmp", "jge", "jmp"]);
        assert_eq!(asm_line_kind(".L1:"), "label");
        assert_eq!(asm_line_kind("    # note"), "comment");
    }

    #[test]
    fn unknown_view_is_rejected() {
        assert!(matches!(visualize_named(&session(), "render"), Err(PipelineError::InvalidRequest(_))));
    }
}
