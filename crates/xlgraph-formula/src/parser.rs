//! Shunting-yard parser
//!
//! Converts the lexer's token stream into reverse-Polish order. Argument lists get
//! synthetic open/close markers so that separators and closing parentheses can find the
//! call they belong to, and a per-call "were values" flag tells `f()` apart from `f(x)`.

use crate::ast::{Ast, AstNode};
use crate::error::{FormulaError, FormulaResult};
use crate::lexer::{FormulaTokenizer, Lexer};
use crate::token::{Token, TokenKind, TokenSubkind};

/// Operator associativity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// A formula operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator {
    pub symbol: &'static str,
    pub precedence: u8,
    pub associativity: Associativity,
}

const fn left(symbol: &'static str, precedence: u8) -> Operator {
    Operator {
        symbol,
        precedence,
        associativity: Associativity::Left,
    }
}

/// Operator table; `u-` is the prefix minus
pub const OPERATORS: [Operator; 17] = [
    left(":", 8),
    left(" ", 8),
    left(",", 8),
    left("u-", 7),
    left("%", 6),
    left("^", 5),
    left("*", 4),
    left("/", 4),
    left("+", 3),
    left("-", 3),
    left("&", 2),
    left("=", 1),
    left("<", 1),
    left(">", 1),
    left("<=", 1),
    left(">=", 1),
    left("<>", 1),
];

/// Look up the operator a token denotes
pub fn operator_for(token: &Token) -> FormulaResult<Operator> {
    let symbol = if token.kind == TokenKind::OperatorPrefix && token.value == "-" {
        "u-"
    } else {
        token.value.as_str()
    };
    OPERATORS
        .iter()
        .copied()
        .find(|op| op.symbol == symbol)
        .ok_or_else(|| FormulaError::Parse(format!("Unknown operator: {}", token.value)))
}

fn is_function(token: &Token) -> bool {
    token.kind == TokenKind::Function && token.subkind == TokenSubkind::None
}

/// Order a token stream as reverse-Polish AST nodes
pub fn shunting_yard(tokens: Vec<Token>) -> FormulaResult<Vec<AstNode>> {
    // Function start becomes the function itself plus an argument-list start
    let mut expanded = Vec::with_capacity(tokens.len() + 8);
    for token in tokens {
        match (token.kind, token.subkind) {
            (TokenKind::Function, TokenSubkind::Start) => {
                expanded.push(Token::new(
                    token.value,
                    TokenKind::Function,
                    TokenSubkind::None,
                ));
                expanded.push(Token::new("(", TokenKind::ArgList, TokenSubkind::Start));
            }
            (TokenKind::Function, TokenSubkind::Stop) => {
                expanded.push(Token::new(")", TokenKind::ArgList, TokenSubkind::Stop));
            }
            _ => expanded.push(token),
        }
    }

    let mut output: Vec<AstNode> = Vec::with_capacity(expanded.len());
    let mut stack: Vec<Token> = Vec::new();
    let mut arg_count: Vec<usize> = Vec::new();
    let mut were_values: Vec<bool> = Vec::new();

    for token in expanded {
        if token.kind == TokenKind::Operand {
            output.push(AstNode::from_token(token));
            if let Some(top) = were_values.last_mut() {
                *top = true;
            }
        } else if is_function(&token) {
            stack.push(token);
            arg_count.push(0);
            if let Some(top) = were_values.last_mut() {
                *top = true;
            }
            were_values.push(false);
        } else if token.kind == TokenKind::Argument {
            pop_until_start(&mut stack, &mut output);
            match were_values.pop() {
                Some(true) => {
                    if let Some(count) = arg_count.last_mut() {
                        *count += 1;
                    }
                }
                Some(false) => {}
                None => return Err(FormulaError::MismatchedParentheses),
            }
            were_values.push(false);
            if stack.is_empty() {
                return Err(FormulaError::MismatchedParentheses);
            }
        } else if token.is_operator() {
            let o1 = operator_for(&token)?;
            while let Some(top) = stack.last() {
                if !top.is_operator() {
                    break;
                }
                let o2 = operator_for(top)?;
                let pops = match o1.associativity {
                    Associativity::Left => o1.precedence <= o2.precedence,
                    Associativity::Right => o1.precedence < o2.precedence,
                };
                if !pops {
                    break;
                }
                if let Some(op) = stack.pop() {
                    output.push(AstNode::from_token(op));
                }
            }
            stack.push(token);
        } else if token.is_start() {
            stack.push(token);
        } else if token.is_stop() {
            pop_until_start(&mut stack, &mut output);
            if stack.pop().is_none() {
                return Err(FormulaError::MismatchedParentheses);
            }
            if stack.last().map_or(false, is_function) {
                if let Some(function) = stack.pop() {
                    let count = arg_count
                        .pop()
                        .ok_or(FormulaError::MismatchedParentheses)?;
                    let last_was_value = were_values
                        .pop()
                        .ok_or(FormulaError::MismatchedParentheses)?;
                    let mut node = AstNode::from_token(function);
                    node.num_args = count + usize::from(last_was_value);
                    output.push(node);
                }
            }
        }
    }

    while let Some(token) = stack.pop() {
        if token.is_start() || token.is_stop() {
            return Err(FormulaError::MismatchedParentheses);
        }
        output.push(AstNode::from_token(token));
    }

    Ok(output)
}

fn pop_until_start(stack: &mut Vec<Token>, output: &mut Vec<AstNode>) {
    while let Some(top) = stack.last() {
        if top.is_start() {
            break;
        }
        if let Some(token) = stack.pop() {
            output.push(AstNode::from_token(token));
        }
    }
}

/// Parse formula text into a tree with the default lexer
///
/// A leading `=` is optional.
pub fn parse_formula(formula: &str) -> FormulaResult<Ast> {
    parse_formula_with(formula, &FormulaTokenizer)
}

/// Parse formula text into a tree with the given lexer
pub fn parse_formula_with(formula: &str, lexer: &dyn Lexer) -> FormulaResult<Ast> {
    Ast::build(shunting_yard(lexer.tokenize(strip_equals(formula))?)?)
}

/// Formula body without its leading `=`
pub fn strip_equals(formula: &str) -> &str {
    let formula = formula.trim();
    formula.strip_prefix('=').unwrap_or(formula)
}
