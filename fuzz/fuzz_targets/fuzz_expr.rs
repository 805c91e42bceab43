#![no_main]
use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;

#[derive(Debug)]
pub struct ExprInput {
    pub expr: String,
}

impl<'a> Arbitrary<'a> for ExprInput {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let expr = random_expr_string(u)?;
        Ok(ExprInput { expr })
    }
}

const MAX_EXPR_LENGTH: usize = 2000;

/// Biased towards the operator alphabet so most inputs get past the lexer.
const ALPHABET: &[&str] = &[
    "σ", "π", "ρ", "∪", "∩", "−", "-", "⨯", "⋈", "▷", "⧑", "⧒", "⧓", "÷", "➡", "(", ")", "(", ")",
    " ", " ", "=", ">", "<", ",", ".", "'", "and", "or", "not", "A", "B", "sales", "products",
    "ProductID", "a", "id", "1", "42",
];

fn random_expr_string(u: &mut arbitrary::Unstructured) -> arbitrary::Result<String> {
    if u.arbitrary::<bool>()? {
        let s: String = u.arbitrary()?;
        return Ok(s.chars().take(MAX_EXPR_LENGTH).collect());
    }
    let mut expr = String::new();
    while expr.len() < MAX_EXPR_LENGTH && !u.is_empty() {
        expr.push_str(u.choose(ALPHABET)?);
    }
    Ok(expr)
}

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = arbitrary::Unstructured::new(data).arbitrary::<ExprInput>() {
        ra2sql::fuzz_helper::translate_expr(&input.expr);
    }
});
