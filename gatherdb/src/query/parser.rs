//! Condition parser.
//!
//! A condition is a sequence of operands joined by `&&` or `||`. An operand
//! is either a clause `column operator value` or a parenthesized condition:
//!
//! ```text
//! Age >= 18 && (Name == 'Bob' || Age <= 5)
//! ```
//!
//! Operators are `>`, `>=`, `<`, `<=` and `==`. A value is either a bare
//! token or a string in single or double quotes, where a backslash before
//! the matching quote escapes it.
//!
//! Parsing is one left-to-right scan over an explicit state. Groups are
//! located by matching parentheses and parsed recursively over the same
//! character buffer, so every error position is an index into the whole
//! condition.

use crate::storage::Comparison;

/// Error raised for a malformed condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The condition being parsed.
    pub expression: String,
    /// Character index of the offending character.
    pub position: usize,
    pub reason: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at position {} in '{}'",
            self.reason, self.position, self.expression
        )
    }
}

impl std::error::Error for ParseError {}

/// Logical connector between two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

/// A single comparison against one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub column: String,
    pub comparison: Comparison,
    /// The value as written, quotes removed and escapes resolved.
    pub literal: String,
}

/// Parsed condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No clauses: every row.
    All,
    Clause(Clause),
    /// `operands.len() == connectors.len() + 1`; `connectors[i]` joins
    /// `operands[i]` and `operands[i + 1]`.
    Compound {
        operands: Vec<Condition>,
        connectors: Vec<Connector>,
    },
}

#[derive(Debug, Clone, Copy)]
enum State {
    /// Expecting a clause or a group.
    Operand,
    Column,
    AfterColumn,
    Operator,
    BeforeValue,
    Unquoted,
    Quoted { quote: char, start: usize },
    AfterOperand,
    Connector,
}

const fn is_operator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '!' | '&' | '|')
}

fn is_value_end(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '&' | '|')
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !is_operator_char(c) && !matches!(c, '(' | ')' | '\'' | '"')
}

/// Parse `condition`. Blank input yields [`Condition::All`].
pub fn parse(condition: &str) -> Result<Condition, ParseError> {
    let parser = Parser {
        expression: condition,
        chars: condition.chars().collect(),
    };
    parser.parse_range(0, parser.chars.len())
}

struct Parser<'a> {
    expression: &'a str,
    chars: Vec<char>,
}

impl Parser<'_> {
    fn error(&self, position: usize, reason: impl Into<String>) -> ParseError {
        ParseError {
            expression: self.expression.to_string(),
            position,
            reason: reason.into(),
        }
    }

    /// Parse `chars[start..end]`.
    #[allow(clippy::too_many_lines)]
    fn parse_range(&self, start: usize, end: usize) -> Result<Condition, ParseError> {
        let mut operands = Vec::new();
        let mut connectors = Vec::new();
        let mut state = State::Operand;
        let mut token = String::new();
        let mut token_start = start;
        let mut column = String::new();
        let mut comparison = None;

        let mut i = start;
        while i < end {
            let c = self.chars[i];
            match state {
                State::Operand => {
                    if c == '(' {
                        let close = self.matching_paren(i, end)?;
                        let inner = self.parse_range(i + 1, close)?;
                        if inner == Condition::All {
                            return Err(self.error(i, "empty group"));
                        }
                        operands.push(inner);
                        i = close;
                        state = State::AfterOperand;
                    } else if is_word_char(c) {
                        token.clear();
                        token.push(c);
                        state = State::Column;
                    } else if !c.is_whitespace() {
                        return Err(self.error(i, "column name expected"));
                    }
                }
                State::Column => {
                    if is_word_char(c) {
                        token.push(c);
                    } else if c.is_whitespace() {
                        column = std::mem::take(&mut token);
                        state = State::AfterColumn;
                    } else if is_operator_char(c) {
                        column = std::mem::take(&mut token);
                        token.push(c);
                        token_start = i;
                        state = State::Operator;
                    } else {
                        return Err(self.error(i, format!("unexpected '{c}' after column name")));
                    }
                }
                State::AfterColumn => {
                    if is_operator_char(c) {
                        token.push(c);
                        token_start = i;
                        state = State::Operator;
                    } else if !c.is_whitespace() {
                        return Err(self.error(i, "operator expected"));
                    }
                }
                State::Operator => {
                    if is_operator_char(c) {
                        token.push(c);
                    } else {
                        comparison = Some(self.comparison(&token, token_start)?);
                        token.clear();
                        state = State::BeforeValue;
                        continue;
                    }
                }
                State::BeforeValue => {
                    if c == '\'' || c == '"' {
                        state = State::Quoted { quote: c, start: i };
                    } else if (is_value_end(c) && !c.is_whitespace()) || is_operator_char(c) {
                        return Err(self.error(i, "value expected"));
                    } else if !c.is_whitespace() {
                        token.push(c);
                        state = State::Unquoted;
                    }
                }
                State::Unquoted => {
                    if is_value_end(c) {
                        self.push_clause(&mut operands, &mut column, &mut comparison, &mut token, i)?;
                        state = State::AfterOperand;
                        continue;
                    }
                    token.push(c);
                }
                State::Quoted { quote, .. } => {
                    if c == '\\' && i + 1 < end && self.chars[i + 1] == quote {
                        token.push(quote);
                        i += 1;
                    } else if c == quote {
                        self.push_clause(&mut operands, &mut column, &mut comparison, &mut token, i)?;
                        state = State::AfterOperand;
                    } else {
                        token.push(c);
                    }
                }
                State::AfterOperand => {
                    if c == '&' || c == '|' {
                        token.clear();
                        token.push(c);
                        token_start = i;
                        state = State::Connector;
                    } else if c == ')' {
                        return Err(self.error(i, "unmatched ')'"));
                    } else if !c.is_whitespace() {
                        return Err(self.error(i, "'&&' or '||' expected"));
                    }
                }
                State::Connector => {
                    if is_operator_char(c) {
                        token.push(c);
                    } else {
                        connectors.push(self.connector(&token, token_start)?);
                        token.clear();
                        state = State::Operand;
                        continue;
                    }
                }
            }
            i += 1;
        }

        match state {
            State::Operand if operands.is_empty() => return Ok(Condition::All),
            State::Unquoted => {
                self.push_clause(&mut operands, &mut column, &mut comparison, &mut token, end)?;
            }
            State::Quoted { start, .. } => {
                return Err(self.error(start, "unterminated string"));
            }
            State::AfterOperand => {}
            State::Operand
            | State::Column
            | State::AfterColumn
            | State::Operator
            | State::BeforeValue
            | State::Connector => {
                return Err(self.error(end.saturating_sub(1), "Incomplete expression"));
            }
        }

        if connectors.is_empty() && operands.len() == 1 {
            return Ok(operands.swap_remove(0));
        }
        Ok(Condition::Compound {
            operands,
            connectors,
        })
    }

    fn push_clause(
        &self,
        operands: &mut Vec<Condition>,
        column: &mut String,
        comparison: &mut Option<Comparison>,
        literal: &mut String,
        position: usize,
    ) -> Result<(), ParseError> {
        let Some(comparison) = comparison.take() else {
            return Err(self.error(position, "operator expected"));
        };
        operands.push(Condition::Clause(Clause {
            column: std::mem::take(column),
            comparison,
            literal: std::mem::take(literal),
        }));
        Ok(())
    }

    fn comparison(&self, token: &str, position: usize) -> Result<Comparison, ParseError> {
        Comparison::from_symbol(token).ok_or_else(|| self.invalid_operator(position))
    }

    fn connector(&self, token: &str, position: usize) -> Result<Connector, ParseError> {
        match token {
            "&&" => Ok(Connector::And),
            "||" => Ok(Connector::Or),
            _ => Err(self.invalid_operator(position)),
        }
    }

    fn invalid_operator(&self, position: usize) -> ParseError {
        self.error(
            position,
            "invalid operator, {>, >=, <, <=, ==, &&, ||} are supported",
        )
    }

    /// Index of the `)` closing the `(` at `open`, skipping quoted strings.
    fn matching_paren(&self, open: usize, end: usize) -> Result<usize, ParseError> {
        let mut depth = 0usize;
        let mut quote = None;
        let mut i = open;
        while i < end {
            let c = self.chars[i];
            match quote {
                Some(q) => {
                    if c == '\\' && i + 1 < end && self.chars[i + 1] == q {
                        i += 1;
                    } else if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '\'' | '"' => quote = Some(c),
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(i);
                        }
                    }
                    _ => {}
                },
            }
            i += 1;
        }
        Err(self.error(open, "')' expected"))
    }
}
