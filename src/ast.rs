use crate::lex::{Token, TokenKind};

/// The clause an operator carries: the tokens between a unary operator (or a
///  conditional join) and its operand. `σ a=1 and b>2 (R)` carries
///  `a`, `=`, `1`, `and`, `b>2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    /// Kind of the operator owning the clause; it decides how column names
    ///  are read out of it.
    owner: TokenKind,
    tokens: Vec<Token>,
}

impl Attributes {
    pub fn new(owner: TokenKind, tokens: Vec<Token>) -> Self {
        Self { owner, tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Column names referenced by the clause, as written (possibly qualified,
    ///  `sales.ProductID`).
    ///
    /// For a projection this is the comma separated list. For conditions it
    ///  is the left hand side of every comparison: the clause is split on
    ///  `and`/`or`/`not`, then each condition on its comparison operator.
    pub fn column_names(&self) -> Vec<String> {
        match self.owner {
            TokenKind::Projection => split_list(&self.to_string()),
            TokenKind::Rename => vec![self.to_string()],
            _ => self.condition_columns(),
        }
    }

    /// Like [Attributes::column_names] with any table qualifier removed.
    pub fn bare_column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.column_names() {
            let bare = unqualified(&name);
            if !names.iter().any(|n| n == bare) {
                names.push(bare.to_string());
            }
        }
        names
    }

    fn condition_columns(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for condition in self.tokens.split(|t| t.kind.is_logical()) {
            let text = render(condition);
            let lhs = text.split(is_comparison).next().unwrap_or_default();
            let name = lhs.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());
            if is_column_name(name) && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

/// Renders the clause back to text: tokens are concatenated as written, with
///  single spaces around logical connectives and one redundant pair of outer
///  parentheses removed.
impl std::fmt::Display for Attributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = render(&self.tokens);
        write!(f, "{}", strip_outer_parens(text.trim()).trim())
    }
}

fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        if token.kind.is_logical() {
            if !out.is_empty() && !out.ends_with([' ', '(']) {
                out.push(' ');
            }
            out.push_str(&token.literal);
            out.push(' ');
        } else {
            out.push_str(&token.literal);
        }
    }
    out
}

/// Removes one pair of parentheses enclosing all of `text`. `(a) and (b)` is
///  left alone since its first parenthesis doesn't close at the end.
fn strip_outer_parens(text: &str) -> &str {
    if !(text.starts_with('(') && text.ends_with(')')) {
        return text;
    }

    let mut depth = 0usize;
    let mut in_literal = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_literal = !in_literal,
            '(' if !in_literal => depth += 1,
            ')' if !in_literal => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return if i == text.len() - 1 {
                        &text[1..i]
                    } else {
                        text
                    };
                }
            }
            _ => {}
        }
    }
    text
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn is_comparison(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '!')
}

/// Numbers and quoted literals can sit on the left of a comparison too; only
///  names count.
fn is_column_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
}

/// `sales.ProductID` => `ProductID`
pub fn unqualified(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, column)| column)
}
