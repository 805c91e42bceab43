use tracing::debug;

use crate::error::{Error, Result};
use crate::lex::{Token, TokenKind};

// NOTE precedence is the "binding power" of an operator: higher binds more
//  tightly. Every unary operator outranks every binary one; all binary
//  operators tie, so they associate left to right.
pub fn precedence(kind: TokenKind) -> Option<u8> {
    if kind.is_unary() {
        Some(2)
    } else if kind.is_binary() {
        Some(1)
    } else {
        None
    }
}

/// Reorders tokens from infix to postfix (operands before their operator)
///  with the shunting-yard algorithm. Parentheses only group: none are
///  emitted.
///
/// ```
/// # use ra2sql::{lex::tokenize, parser::parse};
/// let postfix = parse(tokenize("A ∪ B ⋈ C").unwrap()).unwrap();
/// let literals: Vec<_> = postfix.iter().map(|t| t.literal.as_str()).collect();
/// assert_eq!(literals, ["A", "B", "∪", "C", "⋈"]);
/// ```
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Token>> {
    let mut output = Vec::with_capacity(tokens.len());
    // Operators waiting for their operands, along with their input position
    let mut stack: Vec<(usize, Token)> = Vec::new();

    for (position, token) in tokens.into_iter().enumerate() {
        match token.kind {
            TokenKind::OpenParen => stack.push((position, token)),
            TokenKind::CloseParen => loop {
                match stack.pop() {
                    Some((_, top)) if top.kind == TokenKind::OpenParen => break,
                    Some((_, top)) => output.push(top),
                    None => return Err(Error::UnbalancedParentheses { position }),
                }
            },
            kind => {
                let Some(incoming) = precedence(kind) else {
                    output.push(token);
                    continue;
                };
                // Pop before push on ties: left associativity
                while let Some((_, top)) = stack.last() {
                    match precedence(top.kind) {
                        Some(p) if p >= incoming => {
                            if let Some((_, top)) = stack.pop() {
                                output.push(top);
                            }
                        }
                        _ => break,
                    }
                }
                stack.push((position, token));
            }
        }
    }

    while let Some((position, token)) = stack.pop() {
        if token.kind == TokenKind::OpenParen {
            return Err(Error::UnbalancedParentheses { position });
        }
        output.push(token);
    }

    debug!(postfix_len = output.len(), "parsed into postfix order");
    Ok(output)
}
