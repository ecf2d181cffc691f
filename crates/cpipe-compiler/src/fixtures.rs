//! fixtures.rs: sorties figées des étapes 2 à 6
//!
//! Simplification pédagogique assumée : quel que soit le source soumis,
//! l'AST, la table des symboles, l'IR, les drapeaux d'optimisation et
//! l'assembleur décrivent toujours le même programme de référence :
//!
//! ```c
//! int main() {
//!     int a = 5, b = 10, sum = a + b;
//!     if (sum > 10) printf("Sum is greater than 10: %d\n", sum);
//!     else          printf("Sum is 10 or less: %d\n", sum);
//!     for (int i = 0; i < 3; i++) printf("Iteration %d\n", i);
//!     return 0;
//! }
//! ```
//!
//! Seule l'analyse lexicale dépend réellement de l'entrée.

use cpipe_ast::Node;
use cpipe_ir::{Instr, Opcode, Operation};
use indexmap::IndexMap;

use crate::{Optimizations, Symbol, SymbolTable};

fn printf(fmt: &str, arg: &str) -> Node {
    Node::CallExpression {
        callee: Box::new(Node::ident("printf")),
        arguments: vec![Node::lit(fmt), Node::ident(arg)],
    }
}

fn block(body: Vec<Node>) -> Box<Node> {
    Box::new(Node::BlockStatement { body })
}

/// AST du programme de référence.
pub fn fixture_ast() -> Node {
    let decls = Node::VariableDeclaration {
        declarations: vec![
            Node::declarator("a", Node::lit(5)),
            Node::declarator("b", Node::lit(10)),
            Node::declarator("sum", Node::binary("+", Node::ident("a"), Node::ident("b"))),
        ],
    };
    let branch = Node::IfStatement {
        test: Box::new(Node::binary(">", Node::ident("sum"), Node::lit(10))),
        consequent: block(vec![printf("Sum is greater than 10: %d\\n", "sum")]),
        alternate: Some(block(vec![printf("Sum is 10 or less: %d\\n", "sum")])),
    };
    let lp = Node::ForStatement {
        init: Box::new(Node::VariableDeclaration { declarations: vec![Node::declarator("i", Node::lit(0))] }),
        test: Box::new(Node::binary("<", Node::ident("i"), Node::lit(3))),
        update: Box::new(Node::UpdateExpression { operator: "++".into(), argument: Box::new(Node::ident("i")) }),
        body: block(vec![printf("Iteration %d\\n", "i")]),
    };
    let ret = Node::ReturnStatement { argument: Box::new(Node::lit(0)) };

    Node::Program {
        body: vec![Node::FunctionDeclaration { name: "main".into(), params: vec![], body: vec![decls, branch, lp, ret] }],
    }
}

/// Table des symboles : portée `global` (main) puis portée `main` (locales).
pub fn fixture_symbol_table() -> SymbolTable {
    let local = |name: &str| Symbol {
        name: name.into(),
        ty: "int".into(),
        return_type: None,
        initialized: Some(true),
        scope: "local".into(),
    };
    let mut scopes = IndexMap::new();
    scopes.insert(
        "global".to_owned(),
        vec![Symbol {
            name: "main".into(),
            ty: "function".into(),
            return_type: Some("int".into()),
            initialized: None,
            scope: "global".into(),
        }],
    );
    scopes.insert("main".to_owned(), ["a", "b", "sum", "i"].into_iter().map(local).collect());
    SymbolTable { scopes }
}

/// IR à trois adresses ; se termine par `RET 0` et passe la validation.
pub fn fixture_ir() -> Vec<Instr> {
    use Opcode::*;
    let o = Operation::new;
    vec![
        o(Alloc).dest("a").ty("int").into(),
        o(Alloc).dest("b").ty("int").into(),
        o(Alloc).dest("sum").ty("int").into(),
        o(Store).dest("a").value(5).into(),
        o(Store).dest("b").value(10).into(),
        o(Load).dest("t1").src("a").into(),
        o(Load).dest("t2").src("b").into(),
        o(Add).dest("sum").srcs("t1", "t2").into(),
        o(Cmp).dest("t3").srcs("sum", 10).into(),
        o(Jle).target("L1").into(),
        o(Call).call("printf", &["\"Sum is greater than 10: %d\\n\"", "sum"]).into(),
        o(Jmp).target("L2").into(),
        Instr::label("L1"),
        o(Call).call("printf", &["\"Sum is 10 or less: %d\\n\"", "sum"]).into(),
        Instr::label("L2"),
        o(Store).dest("i").value(0).into(),
        Instr::label("L3"),
        o(Cmp).dest("t4").srcs("i", 3).into(),
        o(Jge).target("L4").into(),
        o(Call).call("printf", &["\"Iteration %d\\n\"", "i"]).into(),
        o(Inc).dest("i").into(),
        o(Jmp).target("L3").into(),
        Instr::label("L4"),
        o(Ret).value(0).into(),
    ]
}

/// Drapeaux de l'étape d'optimisation.
pub const fn fixture_optimizations() -> Optimizations {
    Optimizations {
        constant_folding: true,
        dead_code_elimination: false,
        common_subexpression: true,
        loop_unrolling: false,
    }
}

/// Assembleur x86-64 (syntaxe AT&T), une ligne par entrée.
pub fn fixture_assembly() -> Vec<String> {
    [
        ".section .text",
        ".globl main",
        "main:",
        "    push %rbp",
        "    mov %rsp, %rbp",
        "    sub $16, %rsp",
        "    movl $5, -4(%rbp)    # a = 5",
        "    movl $10, -8(%rbp)   # b = 10",
        "    movl -4(%rbp), %eax",
        "    addl -8(%rbp), %eax",
        "    movl %eax, -12(%rbp) # sum = a + b",
        "    cmpl $10, -12(%rbp)",
        "    jle .L1",
        "    # printf for greater than 10",
        "    jmp .L2",
        ".L1:",
        "    # printf for less or equal",
        ".L2:",
        "    movl $0, -16(%rbp)   # i = 0",
        ".L3:",
        "    cmpl $3, -16(%rbp)",
        "    jge .L4",
        "    # printf for iteration",
        "    incl -16(%rbp)",
        "    jmp .L3",
        ".L4:",
        "    movl $0, %eax",
        "    leave",
        "    ret",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ir_is_well_formed_and_ends_with_ret() {
        let ir = fixture_ir();
        assert_eq!(ir.len(), 24);
        assert_eq!(cpipe_ir::validate(&ir), Ok(()));
        match ir.last() {
            Some(Instr::Op(op)) => assert_eq!(op.op, Opcode::Ret),
            other => panic!("unexpected tail {other:?}"),
        }
    }

    #[test]
    fn ir_cfg_shape() {
        let cfg = cpipe_ir::derive_cfg(&fixture_ir());
        let ids: Vec<_> = cfg.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["L1", "L2", "L3", "L4"]);
        let sizes: Vec<_> = cfg.nodes.iter().map(|n| n.instructions.len()).collect();
        assert_eq!(sizes, [1, 1, 5, 1]);
        let edges: Vec<_> = cfg.edges.iter().map(|e| (e.from.as_str(), e.to.as_str())).collect();
        assert_eq!(edges, [("start", "L1"), ("start", "L2"), ("L3", "L4"), ("L3", "L3")]);
    }

    #[test]
    fn symbol_table_json() {
        let v = serde_json::to_value(fixture_symbol_table()).unwrap();
        assert_eq!(
            v["global"][0],
            serde_json::json!({"name": "main", "type": "function", "return_type": "int", "scope": "global"})
        );
        assert_eq!(
            v["main"][2],
            serde_json::json!({"name": "sum", "type": "int", "initialized": true, "scope": "local"})
        );
    }

    #[test]
    fn ast_literal_keeps_escape() {
        let json = serde_json::to_value(fixture_ast()).unwrap();
        let arg = &json["body"][0]["body"][1]["consequent"]["body"][0]["arguments"][0]["value"];
        assert_eq!(arg, "Sum is greater than 10: %d\\n");
        assert_eq!(fixture_assembly().len(), 29);
    }
}
