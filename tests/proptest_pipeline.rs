//! Property-based tests for the scanner, compiler and VM.
//!
//! Tests the following properties:
//! - the scanner terminates on arbitrary input with a single trailing EOF
//! - the compiler never panics, and everything it emits passes verification
//! - arithmetic evaluates the same as the equivalent f64 computation
//! - string concatenation and equality are by content

use clox::bytecode::{check_chunk, compile};
use clox::frontend::{Scanner, TokenKind};
use clox::{CompilerConfig, Value, VmConfig, run};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// A fully parenthesized arithmetic expression and its expected value.
fn arb_arith() -> impl Strategy<Value = (String, f64)> {
    let leaf = (0u32..100).prop_map(|n| (n.to_string(), n as f64));

    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|(s, v)| (format!("-({})", s), -v)),
            (inner.clone(), 0usize..4, inner).prop_map(|((ls, lv), op, (rs, rv))| {
                let (sym, value) = match op {
                    0 => ("+", lv + rv),
                    1 => ("-", lv - rv),
                    2 => ("*", lv * rv),
                    _ => ("/", lv / rv),
                };
                (format!("({} {} {})", ls, sym, rs), value)
            }),
        ]
    })
}

/// Token soup drawn from the language's own alphabet.
fn arb_token_soup() -> impl Strategy<Value = String> {
    let pieces = prop_oneof![
        Just("("),
        Just(")"),
        Just("-"),
        Just("+"),
        Just("*"),
        Just("/"),
        Just("!"),
        Just("=="),
        Just("!="),
        Just("<"),
        Just("<="),
        Just(">"),
        Just(">="),
        Just("nil"),
        Just("true"),
        Just("false"),
        Just("1"),
        Just("2.5"),
        Just("\"s\""),
        Just("\n"),
    ];
    prop::collection::vec(pieces, 0..24).prop_map(|v| v.join(" "))
}

fn eval(source: &str) -> Value {
    run(source, CompilerConfig::default(), VmConfig::default()).expect("should evaluate")
}

// =============================================================================
// Never-panic properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn scanner_terminates_with_one_eof(source in any::<String>()) {
        let tokens = Scanner::new(&source).tokenize();
        let eofs = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
        prop_assert_eq!(eofs, 1);
        prop_assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
        prop_assert!(tokens.iter().all(|t| t.line >= 1));
    }

    #[test]
    fn compiler_never_panics_on_arbitrary_text(source in any::<String>()) {
        if let Ok(chunks) = compile(&source) {
            prop_assert_eq!(chunks.len(), 1);
            prop_assert!(check_chunk(&chunks[0]).is_ok());
        }
    }

    #[test]
    fn compiled_token_soup_is_well_formed(source in arb_token_soup()) {
        match compile(&source) {
            Ok(chunks) => {
                prop_assert!(check_chunk(&chunks[0]).is_ok());
                // runtime errors are fine, internal errors are not
                let result = run(&source, CompilerConfig::default(), VmConfig::default());
                if let Err(clox::PipelineError::Vm(e)) = result {
                    prop_assert!(!e.is_internal(), "internal error for {:?}: {}", source, e);
                }
            }
            Err(e) => prop_assert!(!e.diagnostics.is_empty()),
        }
    }
}

// =============================================================================
// Semantic properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn arithmetic_matches_f64((source, expected) in arb_arith()) {
        let got = eval(&source).as_number().expect("number result");
        prop_assert!(
            got == expected || (got.is_nan() && expected.is_nan()),
            "{} evaluated to {}, expected {}", source, got, expected
        );
    }

    #[test]
    fn string_concat_is_by_content(a in "[a-z]{0,8}", b in "[a-z]{0,8}") {
        let value = eval(&format!("\"{}\" + \"{}\"", a, b));
        let expected = format!("{}{}", a, b);
        prop_assert_eq!(value.as_str(), Some(expected.as_str()));
    }

    #[test]
    fn equal_strings_compare_equal(s in "[a-z ]{0,12}") {
        prop_assert_eq!(eval(&format!("\"{0}\" == \"{0}\"", s)), Value::Bool(true));
    }

    #[test]
    fn numbers_never_equal_bools(n in 0u32..1000, b in any::<bool>()) {
        prop_assert_eq!(eval(&format!("{} == {}", n, b)), Value::Bool(false));
        prop_assert_eq!(eval(&format!("{} != {}", n, b)), Value::Bool(true));
    }
}
