use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::ast::Attributes;
use crate::error::{Error, Result};

/// #Notes
/// Comparison operators other than `=` are not reserved: `a>2` lexes as a
///  single identifier. That's fine because conditions are only ever rendered
///  back to text, never evaluated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Select,       // σ
    Projection,   // π
    Rename,       // ρ
    Union,        // ∪
    Intersection, // ∩
    Difference,   // -
    Cartesian,    // ⨯
    NaturalJoin,  // ⋈
    AntiJoin,     // ▷
    LeftJoin,     // ⧑
    RightJoin,    // ⧒
    FullJoin,     // ⧓
    Division,     // ÷
    Ident,
    Digit,
    Equals,
    And,
    Or,
    Not,
    OpenParen,
    CloseParen,
    Arrow, // ➡
    /// A single-quoted literal inside a condition, quotes included
    Expression,
}

impl TokenKind {
    /// Operators taking one relation plus an attribute clause.
    pub fn is_unary(self) -> bool {
        matches!(self, Self::Select | Self::Projection | Self::Rename)
    }

    /// Operators taking two relations.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Self::Union
                | Self::Intersection
                | Self::Difference
                | Self::Cartesian
                | Self::NaturalJoin
                | Self::AntiJoin
                | Self::LeftJoin
                | Self::RightJoin
                | Self::FullJoin
                | Self::Division
        )
    }

    pub fn is_operator(self) -> bool {
        self.is_unary() || self.is_binary()
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }

    pub fn is_set_operation(self) -> bool {
        matches!(self, Self::Union | Self::Intersection | Self::Difference)
    }

    /// Binary operators which may carry a join condition between the
    ///  operator and the right operand: `R ⧑ a=b (S)`
    pub fn accepts_condition(self) -> bool {
        matches!(
            self,
            Self::LeftJoin | Self::RightJoin | Self::FullJoin | Self::AntiJoin
        )
    }

    /// Whether a token of this kind can be the last token of a condition.
    /// An open parenthesis right after one of these starts an operand.
    fn ends_condition(self) -> bool {
        matches!(
            self,
            Self::Ident | Self::Digit | Self::Expression | Self::CloseParen
        )
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub attributes: Option<Attributes>,
    /// Byte offset into the source; zero for hand-built tokens
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>) -> Self {
        Self {
            kind,
            literal: literal.into(),
            attributes: None,
            position: 0,
        }
    }

    /// Builds a compound token: an operator plus the clause tokens which
    ///  followed it in the source.
    pub fn with_attributes(kind: TokenKind, literal: impl Into<String>, clause: Vec<Token>) -> Self {
        Self {
            kind,
            literal: literal.into(),
            attributes: Some(Attributes::new(kind, clause)),
            position: 0,
        }
    }

    fn at(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    fn fuse(mut self, clause: Vec<Token>) -> Self {
        trace!(
            operator = %self.literal,
            clause_len = clause.len(),
            "fusing operator with its attributes"
        );
        self.attributes = Some(Attributes::new(self.kind, clause));
        self
    }
}

// Equality ignores position: a token is the same token wherever it came from
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.literal == other.literal
            && self.attributes == other.attributes
    }
}

impl Eq for Token {}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.attributes {
            Some(attributes) => write!(f, "{} {}", self.literal, attributes),
            None => write!(f, "{}", self.literal),
        }
    }
}

/// Maps single-character symbols to their token kind. Brackets are handled
///  separately since they always stand alone.
pub fn reserved_symbol(c: char) -> Option<TokenKind> {
    use TokenKind::*;
    match c {
        'σ' => Some(Select),
        'π' => Some(Projection),
        'ρ' => Some(Rename),
        '∪' => Some(Union),
        '∩' => Some(Intersection),
        '-' | '−' => Some(Difference),
        '⨯' | '×' => Some(Cartesian),
        '⋈' | '⨝' => Some(NaturalJoin),
        '▷' => Some(AntiJoin),
        '⧑' | '⟕' => Some(LeftJoin),
        '⧒' | '⟖' => Some(RightJoin),
        '⧓' | '⟗' => Some(FullJoin),
        '÷' => Some(Division),
        '=' => Some(Equals),
        '➡' | '→' => Some(Arrow),
        _ => None,
    }
}

/// Multi-character keywords, matched case insensitively.
const KEYWORDS: [(&str, TokenKind); 3] = [
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("not", TokenKind::Not),
];

pub fn keyword(word: &str) -> Option<TokenKind> {
    KEYWORDS
        .iter()
        .find(|(kw, _)| kw.eq_ignore_ascii_case(word))
        .map(|(_, kind)| *kind)
}

/// Character scanner. Produces the flat token list; [tokenize] then runs the
///  attribute fusion pass over it.
pub struct Lexer<'input> {
    source: &'input str,
    current: usize,
    // Start of the identifier being accumulated and whether it's all digits
    //  so far
    ident: Option<(usize, bool)>,
    depth: usize,
    tokens: Vec<Token>,
}

impl<'input> Lexer<'input> {
    pub fn new(source: &'input str) -> Self {
        Self {
            source,
            current: 0,
            ident: None,
            depth: 0,
            tokens: Vec::new(),
        }
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    pub fn scan(mut self) -> Result<Vec<Token>> {
        while let Some(c) = self.peek() {
            let start = self.current;
            self.current += c.len_utf8();

            if c.is_whitespace() {
                self.flush(start);
            } else if c == '(' || c == ')' {
                self.flush(start);
                self.bracket(c, start)?;
            } else if let Some(kind) = reserved_symbol(c) {
                self.flush(start);
                let literal = &self.source[start..self.current];
                self.tokens.push(Token::new(kind, literal).at(start));
            } else if c == '\'' {
                self.flush(start);
                self.string_literal(start)?;
            } else {
                self.extend(c, start);
            }
        }
        self.flush(self.current);
        Ok(self.tokens)
    }

    /// Adds `c` to the current identifier. A run of digits followed by
    ///  anything else ends at the boundary: `2a` is two tokens.
    fn extend(&mut self, c: char, start: usize) {
        let numeric = c.is_numeric();
        match self.ident {
            None => self.ident = Some((start, numeric)),
            Some((_, true)) if !numeric => {
                self.flush(start);
                self.ident = Some((start, false));
            }
            Some((ident_start, all_digits)) => self.ident = Some((ident_start, all_digits && numeric)),
        }
    }

    /// Emits the accumulated identifier, if any, ending at `end`.
    fn flush(&mut self, end: usize) {
        let Some((start, all_digits)) = self.ident.take() else {
            return;
        };
        let word = &self.source[start..end];
        let kind = if let Some(kw) = keyword(word) {
            kw
        } else if all_digits {
            TokenKind::Digit
        } else {
            TokenKind::Ident
        };
        self.tokens.push(Token::new(kind, word).at(start));
    }

    fn bracket(&mut self, c: char, start: usize) -> Result<()> {
        let kind = if c == '(' {
            self.depth += 1;
            TokenKind::OpenParen
        } else {
            self.depth = self
                .depth
                .checked_sub(1)
                .ok_or_else(|| Error::malformed(start, "too many ) in the expression"))?;
            TokenKind::CloseParen
        };
        self.tokens.push(Token::new(kind, c.to_string()).at(start));
        Ok(())
    }

    fn string_literal(&mut self, start: usize) -> Result<()> {
        let Some(len) = self.source[self.current..].find('\'') else {
            return Err(Error::malformed(start, "unterminated string literal"));
        };
        self.current += len + 1;
        let literal = &self.source[start..self.current];
        self.tokens
            .push(Token::new(TokenKind::Expression, literal).at(start));
        Ok(())
    }
}

/// Converts raw relational algebra text into tokens. Unary operators (and
///  conditional joins) come out fused with their attribute clause; their
///  parenthesized operand is left in the stream for the parser.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let tokens = Lexer::new(source).scan()?;
    let tokens = fuse_attributes(tokens)?;
    debug!(tokens = tokens.len(), "tokenized relational algebra");
    Ok(tokens)
}

/// Second lexing pass: splices every unary operator together with the tokens
///  between it and its operand's opening parenthesis.
pub fn fuse_attributes(tokens: Vec<Token>) -> Result<Vec<Token>> {
    let mut fused = Vec::with_capacity(tokens.len());
    let mut rest: VecDeque<Token> = tokens.into();

    while let Some(token) = rest.pop_front() {
        if token.kind.is_unary() {
            let Some(open) = operand_start(rest.make_contiguous()) else {
                return Err(Error::malformed(
                    token.position,
                    format!("( could not be found after unary operator {}", token.literal),
                ));
            };
            let clause = rest.drain(..open).collect();
            fused.push(token.fuse(clause));
        } else if token.kind.accepts_condition() {
            match join_condition_len(rest.make_contiguous()) {
                Some(len) => {
                    let clause = rest.drain(..len).collect();
                    fused.push(token.fuse(clause));
                }
                None => fused.push(token),
            }
        } else {
            fused.push(token);
        }
    }
    Ok(fused)
}

/// Finds the opening parenthesis of the operand following a clause.
///
/// An open parenthesis directly after something that can end a condition
///  (`a=1 (R)`, `(a=1) (R)`) starts the operand. Anything else (the clause's
///  first token, or after `and`, `not`, ...) is grouping within the clause and
///  its balanced group gets skipped.
///
/// Returns None if the clause runs into a relation operator, an unmatched
///  close parenthesis, or the end of input.
fn operand_start(tokens: &[Token]) -> Option<usize> {
    let mut previous: Option<TokenKind> = None;
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].kind {
            TokenKind::OpenParen if previous.is_some_and(TokenKind::ends_condition) => {
                return Some(i);
            }
            TokenKind::OpenParen => {
                i = matching_paren(tokens, i)?;
                previous = Some(TokenKind::CloseParen);
            }
            TokenKind::CloseParen => return None,
            kind if kind.is_operator() => return None,
            kind => previous = Some(kind),
        }
        i += 1;
    }
    None
}

/// Length of a join condition at the start of `tokens`, if there is one.
/// `⧑ (S)` and `⧑ S` are unconditional joins; `⧑ (a=1 or b=2) (S)` carries
///  the parenthesized condition, the same as a selection would.
fn join_condition_len(tokens: &[Token]) -> Option<usize> {
    operand_start(tokens)
}

/// Index of the close parenthesis matching the open one at `open`.
pub(crate) fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
