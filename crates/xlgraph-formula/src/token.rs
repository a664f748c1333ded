//! Formula tokens
//!
//! A token carries a kind, a subkind and its literal text. The lexer produces them in
//! source order and the parser consumes them.

use std::fmt;

/// Broad token category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Literal or reference
    Operand,
    /// Function call boundary; the start token's literal is the function name
    Function,
    /// Parenthesized sub-expression boundary
    Subexpression,
    /// Function argument list boundary, inserted by the parser
    ArgList,
    /// Argument separator
    Argument,
    /// Prefix operator (`-`)
    OperatorPrefix,
    /// Infix operator
    OperatorInfix,
    /// Postfix operator (`%`)
    OperatorPostfix,
}

/// Refinement of a [`TokenKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSubkind {
    None,
    Start,
    Stop,
    Text,
    Number,
    Logical,
    Error,
    Range,
    Math,
    Concat,
    Comparison,
    Intersect,
    Union,
}

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub subkind: TokenSubkind,
    pub value: String,
}

impl Token {
    /// Create a token
    pub fn new<S: Into<String>>(value: S, kind: TokenKind, subkind: TokenSubkind) -> Self {
        Self {
            kind,
            subkind,
            value: value.into(),
        }
    }

    /// Operand token
    pub fn operand<S: Into<String>>(value: S, subkind: TokenSubkind) -> Self {
        Self::new(value, TokenKind::Operand, subkind)
    }

    /// Infix operator token, with the subkind derived from the symbol
    pub fn infix<S: Into<String>>(value: S) -> Self {
        let value = value.into();
        let subkind = match value.as_str() {
            "&" => TokenSubkind::Concat,
            "=" | "<" | ">" | "<=" | ">=" | "<>" => TokenSubkind::Comparison,
            " " => TokenSubkind::Intersect,
            "," => TokenSubkind::Union,
            _ => TokenSubkind::Math,
        };
        Self::new(value, TokenKind::OperatorInfix, subkind)
    }

    /// Function start token for `name`
    pub fn function_start<S: Into<String>>(name: S) -> Self {
        Self::new(name, TokenKind::Function, TokenSubkind::Start)
    }

    /// Function stop token
    pub fn function_stop() -> Self {
        Self::new(")", TokenKind::Function, TokenSubkind::Stop)
    }

    /// Sub-expression start token
    pub fn subexpression_start() -> Self {
        Self::new("(", TokenKind::Subexpression, TokenSubkind::Start)
    }

    /// Sub-expression stop token
    pub fn subexpression_stop() -> Self {
        Self::new(")", TokenKind::Subexpression, TokenSubkind::Stop)
    }

    /// Argument separator token
    pub fn argument() -> Self {
        Self::new(",", TokenKind::Argument, TokenSubkind::None)
    }

    /// Check if this token opens a group
    pub fn is_start(&self) -> bool {
        self.subkind == TokenSubkind::Start
    }

    /// Check if this token closes a group
    pub fn is_stop(&self) -> bool {
        self.subkind == TokenSubkind::Stop
    }

    /// Check if this token is any kind of operator
    pub fn is_operator(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::OperatorPrefix | TokenKind::OperatorInfix | TokenKind::OperatorPostfix
        )
    }

    /// Check if this token ends an operand, so that a following `-` is infix
    pub(crate) fn ends_operand(&self) -> bool {
        match self.kind {
            TokenKind::Operand | TokenKind::OperatorPostfix => true,
            TokenKind::Function | TokenKind::Subexpression => self.is_stop(),
            _ => false,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
