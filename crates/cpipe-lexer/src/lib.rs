//! cpipe-lexer: tokenizer du pipeline de démonstration
//!
//! Faits saillants :
//! - Découpage ligne par ligne (`\n`), lignes vides ignorées mais comptées
//! - Séparation sur les blancs **et** autour de `(){};=+-/*<>,` (ces caractères
//!   deviennent toujours des mots isolés, même collés à un identifiant)
//! - Classement par tables fixes, dans l'ordre : mot-clé, opérateur,
//!   délimiteur, nombre, chaîne (contient `"`), identifiant
//!
//! Ce n'est pas une vraie grammaire lexicale C : `==` est découpé en deux `=`,
//! une chaîne contenant des espaces donne plusieurs `STRING_LITERAL`.
//!
//! Exemple éclair :
//! ```
//! use cpipe_lexer::tokenize;
//! use cpipe_core::TokenKind;
//!
//! let toks = tokenize("int a = 5;");
//! assert_eq!(toks.len(), 5);
//! assert_eq!(toks[0].kind, TokenKind::Keyword);
//! ```

#![deny(missing_docs)]

use std::collections::VecDeque;
use std::iter::Enumerate;
use std::str::Split;

use cpipe_core::{Token, TokenKind};

/* ─────────────────────────── Tables ─────────────────────────── */

/// Mots-clés reconnus.
pub const KEYWORDS: [&str; 8] = ["int", "return", "if", "else", "for", "while", "printf", "main"];

/// Opérateurs reconnus. `==` et `!=` ne sortent jamais du découpage actuel
/// (le `=` est un séparateur) mais restent dans la table.
pub const OPERATORS: [&str; 9] = ["=", "+", "-", "*", "/", ">", "<", "==", "!="];

/// Délimiteurs reconnus.
pub const DELIMITERS: [&str; 6] = [";", "(", ")", "{", "}", ","];

/// Caractères qui forment toujours un mot à eux seuls.
pub const SPLIT_CHARS: [char; 13] = ['(', ')', '{', '}', ';', '=', '+', '-', '/', '*', '<', '>', ','];

#[inline]
fn is_split_char(c: char) -> bool {
    SPLIT_CHARS.contains(&c)
}

/* ─────────────────────────── Découpage / classement ─────────────────────────── */

/// Découpe une ligne en mots (blancs + bornes autour de [`SPLIT_CHARS`]).
pub fn split_words(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push(&line[s..i]);
            }
        } else if is_split_char(c) {
            if let Some(s) = start.take() {
                out.push(&line[s..i]);
            }
            out.push(&line[i..i + c.len_utf8()]);
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(&line[s..]);
    }
    out
}

/// Classe un mot selon les tables, par ordre de priorité.
pub fn classify(word: &str) -> TokenKind {
    if KEYWORDS.contains(&word) {
        TokenKind::Keyword
    } else if OPERATORS.contains(&word) {
        TokenKind::Operator
    } else if DELIMITERS.contains(&word) {
        TokenKind::Delimiter
    } else if is_numeric(word) {
        TokenKind::Literal
    } else if word.contains('"') {
        TokenKind::StringLiteral
    } else {
        TokenKind::Identifier
    }
}

/// Entier, décimal ou forme exposant (`5`, `3.14`, `.5`, `1e3`).
/// `inf`/`NaN` sont refusés : il faut au moins un chiffre.
fn is_numeric(word: &str) -> bool {
    word.bytes().any(|b| b.is_ascii_digit())
        && word.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        && word.parse::<f64>().is_ok()
}

/* ─────────────────────────── Lexer ─────────────────────────── */

/// Itérateur paresseux de jetons sur une source.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    lines: Enumerate<Split<'a, char>>,
    pending: VecDeque<Token>,
}

impl<'a> Lexer<'a> {
    /// Prépare le découpage de `src`.
    pub fn new(src: &'a str) -> Self {
        Self { lines: src.split('\n').enumerate(), pending: VecDeque::new() }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return Some(tok);
            }
            let (ix, raw) = self.lines.next()?;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let line_no = u32::try_from(ix + 1).unwrap_or(u32::MAX);
            self.pending
                .extend(split_words(line).into_iter().map(|w| Token::new(classify(w), w, line_no)));
        }
    }
}

/// Tokenize toute la source. Fonction pure.
pub fn tokenize(src: &str) -> Vec<Token> {
    let toks: Vec<Token> = Lexer::new(src).collect();
    #[cfg(feature = "trace")]
    tracing::trace!(count = toks.len(), bytes = src.len(), "tokenize");
    toks
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use TokenKind::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String, u32)> {
        tokenize(src).into_iter().map(|t| (t.kind, t.value, t.line)).collect()
    }

    #[test]
    fn simple_declaration() {
        assert_eq!(
            kinds("int a = 5;"),
            vec![
                (Keyword, "int".into(), 1),
                (Identifier, "a".into(), 1),
                (Operator, "=".into(), 1),
                (Literal, "5".into(), 1),
                (Delimiter, ";".into(), 1),
            ]
        );
    }

    #[test]
    fn empty_and_blank() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t\n").is_empty());
    }

    #[test]
    fn glued_punctuation_is_split() {
        let v: Vec<String> = tokenize("int main(){return 0;}").into_iter().map(|t| t.value).collect();
        assert_eq!(v, ["int", "main", "(", ")", "{", "return", "0", ";", "}"]);
    }

    #[test]
    fn blank_lines_still_count() {
        let toks = tokenize("int a;\n\n  \nreturn a;\r\n");
        assert_eq!(toks[0].line, 1);
        assert_eq!(toks[2].line, 1);
        assert_eq!((toks[3].value.as_str(), toks[3].line), ("return", 4));
        assert_eq!(toks.last().unwrap().value, ";");
    }

    #[test]
    fn equality_splits_into_two_operators() {
        assert_eq!(
            kinds("a==b"),
            vec![
                (Identifier, "a".into(), 1),
                (Operator, "=".into(), 1),
                (Operator, "=".into(), 1),
                (Identifier, "b".into(), 1),
            ]
        );
    }

    #[test]
    fn numbers_strings_and_idents() {
        assert_eq!(classify("42"), Literal);
        assert_eq!(classify("3.14"), Literal);
        assert_eq!(classify("1e3"), Literal);
        assert_eq!(classify("inf"), Identifier);
        assert_eq!(classify("\"hello"), StringLiteral);
        assert_eq!(classify("printf"), Keyword);
        assert_eq!(classify("x1"), Identifier);
        assert_eq!(classify("!="), Operator);
    }

    #[test]
    fn string_with_spaces_gives_several_pieces() {
        let toks = tokenize(r#"printf("a b", x);"#);
        let strs: Vec<_> = toks.iter().filter(|t| t.kind == StringLiteral).map(|t| t.value.as_str()).collect();
        assert_eq!(strs, ["\"a", "b\""]);
        assert_eq!(toks.iter().filter(|t| t.value == ",").count(), 1);
    }

    #[test]
    fn json_roundtrip_is_identical() {
        let toks = tokenize("int main() {\n  int a = 5;\n  return a + 1;\n}\n");
        let json = serde_json::to_string_pretty(&toks).unwrap();
        let back: Vec<Token> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, toks);
    }

    proptest! {
        #[test]
        fn tokens_never_hold_whitespace(src in "[a-z0-9 (){};=+*<>,\"\n\t-]{0,80}") {
            let line_count = src.split('\n').count() as u32;
            let mut last_line = 0;
            for t in tokenize(&src) {
                prop_assert!(!t.value.is_empty());
                prop_assert!(!t.value.chars().any(char::is_whitespace));
                prop_assert!(t.line >= 1 && t.line <= line_count);
                prop_assert!(t.line >= last_line);
                last_line = t.line;
            }
        }

        #[test]
        fn tokens_cover_all_non_blank_chars(src in "[a-z0-9 ();=+-]{0,60}") {
            let joined: String = tokenize(&src).into_iter().map(|t| t.value).collect();
            let expected: String = src.chars().filter(|c| !c.is_whitespace()).collect();
            prop_assert_eq!(joined, expected);
        }
    }
}
