//! Formula lexer
//!
//! Turns formula text (without the leading `=`) into a flat token stream. Whole references
//! such as `Sheet1!$A$1:B2` or `'My Sheet'!A:C` become a single range operand; array
//! literals `{1,2;3,4}` become nested `ARRAY`/`ARRAYROW` function calls.

use crate::error::{FormulaError, FormulaResult};
use crate::token::{Token, TokenKind, TokenSubkind};
use xlgraph_core::CellError;

/// Anything that can tokenize formula text
pub trait Lexer {
    /// Tokenize a formula body; the leading `=` must already be stripped
    fn tokenize(&self, formula: &str) -> FormulaResult<Vec<Token>>;
}

/// The default [`Lexer`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaTokenizer;

impl Lexer for FormulaTokenizer {
    fn tokenize(&self, formula: &str) -> FormulaResult<Vec<Token>> {
        Scanner::new(formula).run()
    }
}

/// Tokenize with [`FormulaTokenizer`]
pub fn tokenize(formula: &str) -> FormulaResult<Vec<Token>> {
    FormulaTokenizer.tokenize(formula)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Function,
    Subexpression,
    Array,
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    groups: Vec<Group>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            tokens: Vec::new(),
            groups: Vec::new(),
        }
    }

    fn run(mut self) -> FormulaResult<Vec<Token>> {
        while let Some(c) = self.peek_char() {
            match c {
                c if c.is_whitespace() => {
                    self.skip_whitespace();
                    // Whitespace between two operands is the intersection operator
                    if self.last_ends_operand() && self.next_starts_operand() {
                        self.tokens.push(Token::infix(" "));
                    }
                }
                '"' => self.scan_string()?,
                '#' => self.scan_error()?,
                '\'' => self.scan_reference()?,
                '{' => {
                    self.advance();
                    self.groups.push(Group::Array);
                    self.tokens.push(Token::function_start("ARRAY"));
                    self.tokens.push(Token::function_start("ARRAYROW"));
                }
                '}' => {
                    self.advance();
                    self.close_group();
                }
                ';' => {
                    self.advance();
                    if self.groups.last() != Some(&Group::Array) {
                        return Err(FormulaError::Parse(format!(
                            "Unexpected ';' at position {}",
                            self.pos - 1
                        )));
                    }
                    self.tokens.push(Token::function_stop());
                    self.tokens.push(Token::argument());
                    self.tokens.push(Token::function_start("ARRAYROW"));
                }
                '(' => {
                    self.advance();
                    self.groups.push(Group::Subexpression);
                    self.tokens.push(Token::subexpression_start());
                }
                ')' => {
                    self.advance();
                    self.close_group();
                }
                ',' => {
                    self.advance();
                    match self.groups.last() {
                        Some(Group::Function) | Some(Group::Array) => {
                            self.tokens.push(Token::argument())
                        }
                        _ => self.tokens.push(Token::infix(",")),
                    }
                }
                '+' | '-' => {
                    self.advance();
                    if self.last_ends_operand() {
                        self.tokens.push(Token::infix(c.to_string()));
                    } else if c == '-' {
                        self.tokens.push(Token::new(
                            "-",
                            TokenKind::OperatorPrefix,
                            TokenSubkind::Math,
                        ));
                    }
                    // Prefix plus is a no-op
                }
                '*' | '/' | '^' | '&' | '=' => {
                    self.advance();
                    self.tokens.push(Token::infix(c.to_string()));
                }
                '<' => {
                    self.advance();
                    let op = match self.peek_char() {
                        Some('=') => "<=",
                        Some('>') => "<>",
                        _ => "<",
                    };
                    if op.len() == 2 {
                        self.advance();
                    }
                    self.tokens.push(Token::infix(op));
                }
                '>' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        self.tokens.push(Token::infix(">="));
                    } else {
                        self.tokens.push(Token::infix(">"));
                    }
                }
                '%' => {
                    self.advance();
                    self.tokens.push(Token::new(
                        "%",
                        TokenKind::OperatorPostfix,
                        TokenSubkind::None,
                    ));
                }
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_char_at(1).map_or(false, |d| d.is_ascii_digit())) =>
                {
                    self.scan_number()
                }
                c if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.scan_word(),
                other => {
                    return Err(FormulaError::Parse(format!(
                        "Unexpected character '{}' at position {}",
                        other, self.pos
                    )))
                }
            }
        }
        Ok(self.tokens)
    }

    // === Token scanning ===

    fn close_group(&mut self) {
        match self.groups.pop() {
            Some(Group::Function) => self.tokens.push(Token::function_stop()),
            Some(Group::Array) => {
                self.tokens.push(Token::function_stop());
                self.tokens.push(Token::function_stop());
            }
            // An unmatched close is left for the parser to reject
            Some(Group::Subexpression) | None => self.tokens.push(Token::subexpression_stop()),
        }
    }

    fn scan_string(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => {
                    return Err(FormulaError::Parse(format!(
                        "Unterminated string starting at position {}",
                        start
                    )))
                }
            }
        }
        self.tokens.push(Token::operand(s, TokenSubkind::Text));
        Ok(())
    }

    fn scan_error(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        self.advance();
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || matches!(c, '/' | '!' | '?'))
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        let error = CellError::parse(text)
            .ok_or_else(|| FormulaError::Parse(format!("Unknown error literal: {}", text)))?;
        self.tokens
            .push(Token::operand(error.as_str(), TokenSubkind::Error));
        Ok(())
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        self.skip_digits();
        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }
        if matches!(self.peek_char(), Some('e') | Some('E'))
            && self.peek_char_at(1).map_or(false, |c| {
                c.is_ascii_digit()
                    || ((c == '+' || c == '-')
                        && self.peek_char_at(2).map_or(false, |d| d.is_ascii_digit()))
            })
        {
            self.advance();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.advance();
            }
            self.skip_digits();
        }
        let text = &self.input[start..self.pos];
        self.tokens.push(Token::operand(text, TokenSubkind::Number));
    }

    /// A reference starting with a quoted sheet name
    fn scan_reference(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        self.advance();
        let mut sheet = String::new();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    sheet.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    sheet.push(c);
                    self.advance();
                }
                None => {
                    return Err(FormulaError::Parse(format!(
                        "Unterminated sheet name starting at position {}",
                        start
                    )))
                }
            }
        }
        if self.peek_char() != Some('!') {
            return Err(FormulaError::Parse(format!(
                "Expected '!' after sheet name '{}'",
                sheet
            )));
        }
        let rest_start = self.pos;
        self.skip_reference_chars();
        let reference = format!("'{}'{}", sheet, &self.input[rest_start..self.pos]);
        self.tokens
            .push(Token::operand(reference, TokenSubkind::Range));
        Ok(())
    }

    /// A function name, boolean or unquoted reference
    fn scan_word(&mut self) {
        let start = self.pos;
        self.skip_reference_chars();
        let text = &self.input[start..self.pos];

        if self.peek_char() == Some('(') {
            self.advance();
            let name = strip_xlfn(text);
            self.groups.push(Group::Function);
            self.tokens.push(Token::function_start(name));
            return;
        }

        let upper = text.to_ascii_uppercase();
        if upper == "TRUE" || upper == "FALSE" {
            self.tokens
                .push(Token::operand(upper, TokenSubkind::Logical));
        } else {
            self.tokens.push(Token::operand(text, TokenSubkind::Range));
        }
    }

    // === Helper methods ===

    fn last_ends_operand(&self) -> bool {
        self.tokens.last().map_or(false, Token::ends_operand)
    }

    fn next_starts_operand(&self) -> bool {
        self.peek_char().map_or(false, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '"' | '#' | '\'' | '(' | '{' | '$' | '_' | '.')
        })
    }

    fn skip_reference_chars(&mut self) {
        while self.peek_char().map_or(false, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | '!' | ':')
        }) {
            self.advance();
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}

/// Remove the `_xlfn.` prefix newer Excel functions carry in files
pub fn strip_xlfn(name: &str) -> &str {
    const PREFIX: &str = "_xlfn.";
    if name.len() > PREFIX.len() && name[..PREFIX.len()].eq_ignore_ascii_case(PREFIX) {
        &name[PREFIX.len()..]
    } else {
        name
    }
}
