//
// parser_pool.rs
//
// Thread-local Go parser reused across background parses
//

use std::cell::RefCell;
use tree_sitter::{LanguageError, Parser};

thread_local! {
    static PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

/// Execute a function with this thread's Go parser, creating it on first use.
///
/// Blocking pool threads are reused by the runtime, so each keeps its parser
/// between dispatches.
pub fn with_parser<F, R>(f: F) -> Result<R, LanguageError>
where
    F: FnOnce(&mut Parser) -> R,
{
    PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let parser = match slot.take() {
            Some(parser) => parser,
            None => {
                let mut parser = Parser::new();
                parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
                parser
            }
        };
        Ok(f(slot.insert(parser)))
    })
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn go_snippet() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z][a-z0-9_]{0,5}".prop_map(|name| format!("package {name}\n")),
            "[a-z][a-z0-9_]{0,5}".prop_map(|name| format!("package p\n\nfunc {name}() {{}}\n")),
            "[a-z][a-z0-9_]{0,5}".prop_map(|name| format!("package p\n\nvar {name} = 1\n")),
            Just("package p\n\nimport \"fmt\"\n".to_string()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_parser_reuse_yields_trees(snippets in prop::collection::vec(go_snippet(), 1..8)) {
            for snippet in &snippets {
                let tree = with_parser(|parser| parser.parse(snippet, None)).unwrap();
                prop_assert!(tree.is_some(), "Parser should parse: {}", snippet);
            }
        }
    }
}
