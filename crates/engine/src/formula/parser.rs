// Formula parser - converts expression text (without the leading '=') into an AST
// Supports: numbers, cell refs (A1), unary +/-, basic math (+, -, *, /), parentheses

use crate::position::Position;

use super::FormulaSyntaxError;

/// Expression tree for an arithmetic formula.
///
/// Parentheses are not kept as nodes; `format_expr` re-derives the ones the
/// tree shape requires.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Cell reference. May hold an out-of-grid position, which evaluates to #REF!.
    CellRef(Position),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn symbol(self) -> char {
        match self {
            Op::Add => '+',
            Op::Sub => '-',
            Op::Mul => '*',
            Op::Div => '/',
        }
    }
}

/// Parse an arithmetic expression.
pub fn parse(expression: &str) -> Result<Expr, FormulaSyntaxError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(FormulaSyntaxError::new("Empty formula"));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        nesting: 0,
    };
    let (expr, _) = parser.parse_add_sub()?;
    if parser.pos < tokens.len() {
        return Err(FormulaSyntaxError::new(format!(
            "Unexpected token at position {}",
            parser.pos
        )));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    CellRef(Position),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, FormulaSyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            'A'..='Z' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_uppercase() {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let mut has_digits = false;
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() {
                        ident.push(ch);
                        has_digits = true;
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !has_digits {
                    return Err(FormulaSyntaxError::new(format!(
                        "Invalid cell reference: {}",
                        ident
                    )));
                }
                // Well-formed but outside the grid: kept, evaluates to #REF!
                tokens.push(Token::CellRef(Position::from_a1(&ident)));
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Exponent: only when a digit (optionally signed) follows the 'e'
                if let Some(&e) = chars.peek() {
                    if e == 'e' || e == 'E' {
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        let mut exponent = String::from("e");
                        if let Some(&sign) = lookahead.peek() {
                            if sign == '+' || sign == '-' {
                                exponent.push(sign);
                                lookahead.next();
                            }
                        }
                        if lookahead.peek().is_some_and(|d| d.is_ascii_digit()) {
                            while let Some(&d) = lookahead.peek() {
                                if d.is_ascii_digit() {
                                    exponent.push(d);
                                    lookahead.next();
                                } else {
                                    break;
                                }
                            }
                            num_str.push_str(&exponent);
                            chars = lookahead;
                        }
                    }
                }
                let num = num_str
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| FormulaSyntaxError::new(format!("Invalid number: {}", num_str)))?;
                tokens.push(Token::Number(num));
            }
            _ => {
                return Err(FormulaSyntaxError::new(format!(
                    "Unexpected character: {}",
                    c
                )))
            }
        }
    }

    Ok(tokens)
}

/// Limit on parentheses and unary signs opened inside one another.
const MAX_NESTING: usize = 64;
/// Limit on the height of the expression tree. Evaluation, printing and
/// reference extraction recurse over the tree, so this bounds their stack use.
const MAX_HEIGHT: usize = 1024;

fn too_deep() -> FormulaSyntaxError {
    FormulaSyntaxError::new("Formula is nested too deeply")
}

/// Recursive descent over the token list. Every method returns the parsed
/// expression together with its tree height.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    nesting: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn enter(&mut self) -> Result<(), FormulaSyntaxError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(too_deep());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    fn binary(
        op: Op,
        (left, left_height): (Expr, usize),
        (right, right_height): (Expr, usize),
    ) -> Result<(Expr, usize), FormulaSyntaxError> {
        let height = 1 + left_height.max(right_height);
        if height > MAX_HEIGHT {
            return Err(too_deep());
        }
        let expr = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        Ok((expr, height))
    }

    fn parse_add_sub(&mut self) -> Result<(Expr, usize), FormulaSyntaxError> {
        let mut left = self.parse_mul_div()?;

        loop {
            let op = match self.peek() {
                Some(Token::Plus) => Op::Add,
                Some(Token::Minus) => Op::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_mul_div()?;
            left = Self::binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_mul_div(&mut self) -> Result<(Expr, usize), FormulaSyntaxError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek() {
                Some(Token::Star) => Op::Mul,
                Some(Token::Slash) => Op::Div,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<(Expr, usize), FormulaSyntaxError> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Minus) => UnaryOp::Minus,
            _ => return self.parse_primary(),
        };
        self.pos += 1;

        self.enter()?;
        let (operand, height) = self.parse_unary()?;
        self.leave();

        let expr = Expr::Unary {
            op,
            operand: Box::new(operand),
        };
        Ok((expr, height + 1))
    }

    fn parse_primary(&mut self) -> Result<(Expr, usize), FormulaSyntaxError> {
        let Some(token) = self.peek() else {
            return Err(FormulaSyntaxError::new("Unexpected end of expression"));
        };

        match token {
            Token::Number(n) => {
                let expr = Expr::Number(*n);
                self.pos += 1;
                Ok((expr, 1))
            }
            Token::CellRef(cell) => {
                let expr = Expr::CellRef(*cell);
                self.pos += 1;
                Ok((expr, 1))
            }
            Token::LParen => {
                self.pos += 1;
                self.enter()?;
                let inner = self.parse_add_sub()?;
                self.leave();
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    Some(_) => Err(FormulaSyntaxError::new("Expected closing parenthesis")),
                    None => Err(FormulaSyntaxError::new("Missing closing parenthesis")),
                }
            }
            _ => Err(FormulaSyntaxError::new(format!(
                "Unexpected token at position {}",
                self.pos
            ))),
        }
    }
}

// =============================================================================
// Formula Printing - Convert Expr back to canonical text
// =============================================================================

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_UNARY: u8 = 3;
const PREC_ATOM: u8 = 4;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Number(_) | Expr::CellRef(_) => PREC_ATOM,
        Expr::Unary { .. } => PREC_UNARY,
        Expr::BinaryOp { op: Op::Add | Op::Sub, .. } => PREC_ADD,
        Expr::BinaryOp { op: Op::Mul | Op::Div, .. } => PREC_MUL,
    }
}

/// Format an expression without the leading '='.
///
/// Emits only the parentheses needed to reproduce the same tree when parsed
/// again: `(1+2)*3` keeps them, `1+(2*3)` becomes `1+2*3`.
pub fn format_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(expr, &mut out);
    out
}

fn write_expr(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Number(n) => out.push_str(&n.to_string()),
        Expr::CellRef(cell) => {
            if cell.is_valid() {
                out.push_str(&cell.to_string());
            } else {
                out.push_str("#REF!");
            }
        }
        Expr::Unary { op, operand } => {
            out.push(match op {
                UnaryOp::Plus => '+',
                UnaryOp::Minus => '-',
            });
            write_operand(operand, precedence(operand) < PREC_UNARY, out);
        }
        Expr::BinaryOp { op, left, right } => {
            let own = precedence(expr);
            write_operand(left, precedence(left) < own, out);
            out.push(op.symbol());
            // a-(b-c) and a/(b/c) are not associative
            let right_prec = precedence(right);
            let right_parens =
                right_prec < own || (right_prec == own && matches!(op, Op::Sub | Op::Div));
            write_operand(right, right_parens, out);
        }
    }
}

fn write_operand(expr: &Expr, parens: bool, out: &mut String) {
    if parens {
        out.push('(');
        write_expr(expr, out);
        out.push(')');
    } else {
        write_expr(expr, out);
    }
}

// =============================================================================
// Cell Reference Extraction
// =============================================================================

/// Collect every cell reference in the expression, in occurrence order,
/// including duplicates and out-of-grid positions.
pub fn extract_cell_refs(expr: &Expr) -> Vec<Position> {
    let mut refs = Vec::new();
    collect_cell_refs(expr, &mut refs);
    refs
}

fn collect_cell_refs(expr: &Expr, refs: &mut Vec<Position>) {
    match expr {
        Expr::Number(_) => {}
        Expr::CellRef(cell) => refs.push(*cell),
        Expr::Unary { operand, .. } => collect_cell_refs(operand, refs),
        Expr::BinaryOp { left, right, .. } => {
            collect_cell_refs(left, refs);
            collect_cell_refs(right, refs);
        }
    }
}
