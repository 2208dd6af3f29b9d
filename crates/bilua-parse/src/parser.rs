use std::collections::HashSet;
use std::error::Error;
use std::fmt::{self, Display};

use bilua_common::{Location, Range};

use crate::ast::{
    BinOp, Block, Chunk, Expr, ExprKind, Field, FunctionBody, SpannedName, Stat, StatKind, UnOp,
};
use crate::tokenizer::{Token, TokenPayload, TokenType, Tokenizer, TokenizerError};

/// A parse error with the range it was detected at. Errors are collected
/// into [`Chunk::errors`] rather than raised.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub range: Range,
    pub message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.range.start, self.message)
    }
}

impl Error for ParseError {}

/// Tokenize and parse a whole source file.
pub fn parse_chunk(source: &str) -> Chunk {
    let tokenizer = match Tokenizer::new(source) {
        Ok(t) => t,
        Err(e) => {
            let location = location_of_byte(source, e.pos);
            return Chunk {
                block: Block {
                    stats: Vec::new(),
                    range: Range::default(),
                },
                errors: vec![ParseError {
                    range: Range::new(location, location),
                    message: e.message,
                }],
            };
        }
    };

    let mut parser = Parser::new(tokenizer.items);
    let block = parser.block(true);
    parser.expect_eof();

    let mut errors = parser.errors;
    resolve_gotos(&block, &mut Vec::new(), &mut errors);

    Chunk { block, errors }
}

fn location_of_byte(source: &str, byte: usize) -> Location {
    let mut line = 0;
    let mut column = 0;
    for c in source.as_bytes()[..byte.min(source.len())].iter() {
        if *c == b'\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    Location::new(line, column, byte)
}

/// Labels are resolved at parse time: a `goto` must name a label in its own
/// block or an enclosing block of the same function.
fn resolve_gotos(block: &Block, visible: &mut Vec<HashSet<String>>, errors: &mut Vec<ParseError>) {
    let labels: HashSet<String> = block
        .stats
        .iter()
        .filter_map(|stat| match &stat.kind {
            StatKind::Label { name } => Some(name.clone()),
            _ => None,
        })
        .collect();
    visible.push(labels);

    for stat in &block.stats {
        match &stat.kind {
            StatKind::Goto { label } => {
                if !visible.iter().any(|set| set.contains(label)) {
                    errors.push(ParseError {
                        range: stat.range,
                        message: format!("no visible label '{label}' for goto"),
                    });
                }
            }
            StatKind::Do(inner) => resolve_gotos(inner, visible, errors),
            StatKind::While { cond, body } => {
                resolve_gotos_in_expr(cond, errors);
                resolve_gotos(body, visible, errors);
            }
            StatKind::Repeat { body, cond } => {
                resolve_gotos(body, visible, errors);
                resolve_gotos_in_expr(cond, errors);
            }
            StatKind::If { arms, else_block } => {
                for (cond, arm) in arms {
                    resolve_gotos_in_expr(cond, errors);
                    resolve_gotos(arm, visible, errors);
                }
                if let Some(else_block) = else_block {
                    resolve_gotos(else_block, visible, errors);
                }
            }
            StatKind::NumericFor {
                start,
                end,
                step,
                body,
                ..
            } => {
                resolve_gotos_in_expr(start, errors);
                resolve_gotos_in_expr(end, errors);
                if let Some(step) = step {
                    resolve_gotos_in_expr(step, errors);
                }
                resolve_gotos(body, visible, errors);
            }
            StatKind::GenericFor { exprs, body, .. } => {
                for expr in exprs {
                    resolve_gotos_in_expr(expr, errors);
                }
                resolve_gotos(body, visible, errors);
            }
            StatKind::FunctionDecl { body, .. } | StatKind::LocalFunction { body, .. } => {
                // a new function starts a fresh label scope
                let mut inner = Vec::new();
                resolve_gotos(&body.block, &mut inner, errors);
            }
            StatKind::Local { values, .. } => {
                for value in values {
                    resolve_gotos_in_expr(value, errors);
                }
            }
            StatKind::Assign { targets, values } => {
                for expr in targets.iter().chain(values) {
                    resolve_gotos_in_expr(expr, errors);
                }
            }
            StatKind::Call(expr) => resolve_gotos_in_expr(expr, errors),
            StatKind::Return { exprs } => {
                for expr in exprs {
                    resolve_gotos_in_expr(expr, errors);
                }
            }
            StatKind::Break | StatKind::Label { .. } => {}
        }
    }

    visible.pop();
}

fn resolve_gotos_in_expr(expr: &Expr, errors: &mut Vec<ParseError>) {
    match &expr.kind {
        ExprKind::Function(body) => {
            let mut inner = Vec::new();
            resolve_gotos(&body.block, &mut inner, errors);
        }
        ExprKind::Index { obj, key } => {
            resolve_gotos_in_expr(obj, errors);
            resolve_gotos_in_expr(key, errors);
        }
        ExprKind::Field { obj, .. } => resolve_gotos_in_expr(obj, errors),
        ExprKind::Call { callee, args } => {
            resolve_gotos_in_expr(callee, errors);
            for arg in args {
                resolve_gotos_in_expr(arg, errors);
            }
        }
        ExprKind::MethodCall { obj, args, .. } => {
            resolve_gotos_in_expr(obj, errors);
            for arg in args {
                resolve_gotos_in_expr(arg, errors);
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            resolve_gotos_in_expr(lhs, errors);
            resolve_gotos_in_expr(rhs, errors);
        }
        ExprKind::Unary { operand, .. } => resolve_gotos_in_expr(operand, errors),
        ExprKind::TableCtor { fields } => {
            for field in fields {
                match field {
                    Field::Positional(value) | Field::Named { value, .. } => {
                        resolve_gotos_in_expr(value, errors)
                    }
                    Field::Keyed { key, value } => {
                        resolve_gotos_in_expr(key, errors);
                        resolve_gotos_in_expr(value, errors);
                    }
                }
            }
        }
        ExprKind::Paren(inner) => resolve_gotos_in_expr(inner, errors),
        _ => {}
    }
}

/// Keywords that may start a statement; used for error recovery.
const STAT_STARTERS: &[&str] = &[
    "do", "while", "repeat", "if", "for", "function", "local", "return", "break", "goto",
];

/// Keywords that terminate a block.
const BLOCK_ENDERS: &[&str] = &["end", "else", "elseif", "until"];

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub errors: Vec<ParseError>,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    /* ───────────────────── token cursor ───────────────────── */

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.current().token_type == TokenType::Eof
    }

    fn error_here<S: Into<String>>(&self, message: S) -> ParseError {
        ParseError {
            range: self.current().range,
            message: message.into(),
        }
    }

    fn accept_op(&mut self, op: &str) -> bool {
        if self.current().is_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> PResult<Range> {
        if self.current().is_op(op) {
            Ok(self.advance().range)
        } else {
            Err(self.error_here(format!("'{}' expected near '{}'", op, self.current().value)))
        }
    }

    fn accept_keyword(&mut self, kw: &str) -> bool {
        if self.current().is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> PResult<Range> {
        if self.current().is_keyword(kw) {
            Ok(self.advance().range)
        } else {
            Err(self.error_here(format!("'{}' expected near '{}'", kw, self.current().value)))
        }
    }

    fn expect_name(&mut self) -> PResult<SpannedName> {
        if self.current().token_type == TokenType::Name {
            let token = self.advance();
            Ok(SpannedName {
                name: token.value,
                range: token.range,
            })
        } else {
            Err(self.error_here(format!("name expected near '{}'", self.current().value)))
        }
    }

    pub fn expect_eof(&mut self) {
        if !self.at_eof() {
            let err = self.error_here(format!("unexpected '{}' after block", self.current().value));
            self.errors.push(err);
        }
    }

    /// Skip tokens until a plausible statement boundary.
    fn synchronize(&mut self) {
        if !self.at_eof() {
            self.advance();
        }
        while !self.at_eof() {
            let token = self.current();
            if token.is_op(";")
                || (token.token_type == TokenType::Keyword
                    && (STAT_STARTERS.contains(&token.value.as_str())
                        || BLOCK_ENDERS.contains(&token.value.as_str())))
            {
                break;
            }
            self.advance();
        }
    }

    /* ───────────────────── blocks & statements ───────────────────── */

    fn at_block_end(&self) -> bool {
        let token = self.current();
        token.token_type == TokenType::Eof
            || (token.token_type == TokenType::Keyword
                && BLOCK_ENDERS.contains(&token.value.as_str()))
    }

    /// Parse statements until a block ender. `top_level` blocks swallow
    /// statement errors (recording them) so that several can be reported.
    pub fn block(&mut self, top_level: bool) -> Block {
        let start = self.current().range;
        let mut stats = Vec::new();

        while !self.at_block_end() {
            if self.accept_op(";") {
                continue;
            }
            match self.statement() {
                Ok(stat) => {
                    let is_return = matches!(stat.kind, StatKind::Return { .. });
                    stats.push(stat);
                    if is_return {
                        // return ends the block
                        self.accept_op(";");
                        break;
                    }
                }
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                    if !top_level {
                        break;
                    }
                }
            }
        }

        let range = match (stats.first(), stats.last()) {
            (Some(first), Some(last)) => first.range.merge(last.range),
            _ => Range::new(start.start, start.start),
        };
        Block { stats, range }
    }

    fn statement(&mut self) -> PResult<Stat> {
        let start = self.current().range;
        let token = self.current().clone();

        let kind = match token.token_type {
            TokenType::Keyword => match token.value.as_str() {
                "do" => {
                    self.advance();
                    let body = self.block(false);
                    self.expect_keyword("end")?;
                    StatKind::Do(body)
                }
                "while" => {
                    self.advance();
                    let cond = self.expression()?;
                    self.expect_keyword("do")?;
                    let body = self.block(false);
                    self.expect_keyword("end")?;
                    StatKind::While { cond, body }
                }
                "repeat" => {
                    self.advance();
                    let body = self.block(false);
                    self.expect_keyword("until")?;
                    let cond = self.expression()?;
                    StatKind::Repeat { body, cond }
                }
                "if" => {
                    self.advance();
                    let mut arms = Vec::new();
                    let cond = self.expression()?;
                    self.expect_keyword("then")?;
                    arms.push((cond, self.block(false)));
                    let mut else_block = None;
                    loop {
                        if self.accept_keyword("elseif") {
                            let cond = self.expression()?;
                            self.expect_keyword("then")?;
                            arms.push((cond, self.block(false)));
                        } else if self.accept_keyword("else") {
                            else_block = Some(self.block(false));
                            self.expect_keyword("end")?;
                            break;
                        } else {
                            self.expect_keyword("end")?;
                            break;
                        }
                    }
                    StatKind::If { arms, else_block }
                }
                "for" => {
                    self.advance();
                    self.for_statement()?
                }
                "function" => {
                    self.advance();
                    self.function_statement()?
                }
                "local" => {
                    self.advance();
                    self.local_statement()?
                }
                "return" => {
                    self.advance();
                    let exprs = if self.at_block_end() || self.current().is_op(";") {
                        Vec::new()
                    } else {
                        self.expression_list()?
                    };
                    StatKind::Return { exprs }
                }
                "break" => {
                    self.advance();
                    StatKind::Break
                }
                "goto" => {
                    self.advance();
                    let label = self.expect_name()?;
                    StatKind::Goto { label: label.name }
                }
                other => {
                    return Err(self.error_here(format!("unexpected '{other}'")));
                }
            },
            TokenType::Op if token.value == "::" => {
                self.advance();
                let name = self.expect_name()?;
                self.expect_op("::")?;
                StatKind::Label { name: name.name }
            }
            _ => self.expression_statement()?,
        };

        let end = self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)].range;
        Ok(Stat {
            kind,
            range: start.merge(end),
        })
    }

    fn for_statement(&mut self) -> PResult<StatKind> {
        let first = self.expect_name()?;

        if self.accept_op("=") {
            let start = self.expression()?;
            self.expect_op(",")?;
            let end = self.expression()?;
            let step = if self.accept_op(",") {
                Some(self.expression()?)
            } else {
                None
            };
            self.expect_keyword("do")?;
            let body = self.block(false);
            self.expect_keyword("end")?;
            Ok(StatKind::NumericFor {
                var: first,
                start,
                end,
                step,
                body,
            })
        } else {
            let mut names = vec![first];
            while self.accept_op(",") {
                names.push(self.expect_name()?);
            }
            self.expect_keyword("in")?;
            let exprs = self.expression_list()?;
            self.expect_keyword("do")?;
            let body = self.block(false);
            self.expect_keyword("end")?;
            Ok(StatKind::GenericFor { names, exprs, body })
        }
    }

    fn function_statement(&mut self) -> PResult<StatKind> {
        // funcname: Name {'.' Name} [':' Name]
        let first = self.expect_name()?;
        let mut target = Expr {
            range: first.range,
            kind: ExprKind::Name(first.name),
        };
        let mut is_method = false;
        loop {
            if self.accept_op(".") {
                let name = self.expect_name()?;
                let range = target.range.merge(name.range);
                target = Expr {
                    kind: ExprKind::Field {
                        obj: Box::new(target),
                        name: name.name,
                    },
                    range,
                };
            } else if self.accept_op(":") {
                let name = self.expect_name()?;
                let range = target.range.merge(name.range);
                target = Expr {
                    kind: ExprKind::Field {
                        obj: Box::new(target),
                        name: name.name,
                    },
                    range,
                };
                is_method = true;
                break;
            } else {
                break;
            }
        }

        let mut body = self.function_body()?;
        if is_method {
            body.params.insert(
                0,
                SpannedName {
                    name: "self".to_string(),
                    range: body.range,
                },
            );
        }
        Ok(StatKind::FunctionDecl { target, body })
    }

    fn local_statement(&mut self) -> PResult<StatKind> {
        if self.accept_keyword("function") {
            let name = self.expect_name()?;
            let body = self.function_body()?;
            return Ok(StatKind::LocalFunction { name, body });
        }

        let mut names = vec![self.expect_name()?];
        while self.accept_op(",") {
            names.push(self.expect_name()?);
        }
        let values = if self.accept_op("=") {
            self.expression_list()?
        } else {
            Vec::new()
        };
        Ok(StatKind::Local { names, values })
    }

    fn expression_statement(&mut self) -> PResult<StatKind> {
        let first = self.suffixed_expression()?;

        if self.current().is_op("=") || self.current().is_op(",") {
            let mut targets = vec![first];
            while self.accept_op(",") {
                targets.push(self.suffixed_expression()?);
            }
            self.expect_op("=")?;
            for target in &targets {
                if !target.is_assign_target() {
                    return Err(ParseError {
                        range: target.range,
                        message: "cannot assign to this expression".to_string(),
                    });
                }
            }
            let values = self.expression_list()?;
            Ok(StatKind::Assign { targets, values })
        } else if matches!(
            first.kind,
            ExprKind::Call { .. } | ExprKind::MethodCall { .. }
        ) {
            Ok(StatKind::Call(first))
        } else {
            Err(ParseError {
                range: first.range,
                message: "syntax error: expression is not a statement".to_string(),
            })
        }
    }

    /* ───────────────────── expressions ───────────────────── */

    fn expression_list(&mut self) -> PResult<Vec<Expr>> {
        let mut exprs = vec![self.expression()?];
        while self.accept_op(",") {
            exprs.push(self.expression()?);
        }
        Ok(exprs)
    }

    pub fn expression(&mut self) -> PResult<Expr> {
        self.sub_expression(0)
    }

    /// Precedence climbing; `min_bp` is the lowest binding power an infix
    /// operator must exceed to be consumed at this level.
    fn sub_expression(&mut self, min_bp: u8) -> PResult<Expr> {
        let token = self.current().clone();

        let unop = match token.token_type {
            TokenType::Op => UnOp::from_str(&token.value),
            TokenType::Keyword if token.value == "not" => Some(UnOp::Not),
            _ => None,
        };

        let mut lhs = if let Some(op) = unop {
            self.advance();
            let operand = self.sub_expression(UnOp::PRECEDENCE)?;
            let range = token.range.merge(operand.range);
            Expr {
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                range,
            }
        } else {
            self.simple_expression()?
        };

        loop {
            let token = self.current();
            let op = match token.token_type {
                TokenType::Op => BinOp::from_str(&token.value),
                TokenType::Keyword if token.value == "and" => Some(BinOp::And),
                TokenType::Keyword if token.value == "or" => Some(BinOp::Or),
                _ => None,
            };
            let Some(op) = op else { break };
            let (left_bp, right_bp) = op.precedence();
            if left_bp <= min_bp {
                break;
            }
            self.advance();
            let rhs = self.sub_expression(right_bp)?;
            let range = lhs.range.merge(rhs.range);
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                range,
            };
        }

        Ok(lhs)
    }

    fn simple_expression(&mut self) -> PResult<Expr> {
        let token = self.current().clone();
        let kind = match token.token_type {
            TokenType::Keyword => match token.value.as_str() {
                "nil" => {
                    self.advance();
                    ExprKind::Nil
                }
                "true" => {
                    self.advance();
                    ExprKind::True
                }
                "false" => {
                    self.advance();
                    ExprKind::False
                }
                "function" => {
                    self.advance();
                    let body = self.function_body()?;
                    let range = token.range.merge(body.range);
                    return Ok(Expr {
                        kind: ExprKind::Function(body),
                        range,
                    });
                }
                other => return Err(self.error_here(format!("unexpected '{other}'"))),
            },
            TokenType::Number => {
                self.advance();
                match token.payload {
                    TokenPayload::Int(i) => ExprKind::Int(i),
                    TokenPayload::Float(f) => ExprKind::Float(f),
                    _ => unreachable!("number token without numeric payload"),
                }
            }
            TokenType::Str => {
                self.advance();
                match token.payload {
                    TokenPayload::Bytes(bytes) => ExprKind::Str(bytes),
                    _ => unreachable!("string token without byte payload"),
                }
            }
            TokenType::Op if token.value == "..." => {
                self.advance();
                ExprKind::Vararg
            }
            TokenType::Op if token.value == "{" => return self.table_constructor(),
            _ => return self.suffixed_expression(),
        };

        Ok(Expr {
            kind,
            range: token.range,
        })
    }

    fn primary_expression(&mut self) -> PResult<Expr> {
        let token = self.current().clone();
        if token.token_type == TokenType::Name {
            self.advance();
            Ok(Expr {
                kind: ExprKind::Name(token.value),
                range: token.range,
            })
        } else if token.is_op("(") {
            self.advance();
            let inner = self.expression()?;
            let close = self.expect_op(")")?;
            Ok(Expr {
                kind: ExprKind::Paren(Box::new(inner)),
                range: token.range.merge(close),
            })
        } else {
            Err(self.error_here(format!("unexpected '{}'", token.value)))
        }
    }

    fn suffixed_expression(&mut self) -> PResult<Expr> {
        let mut expr = self.primary_expression()?;

        loop {
            let token = self.current().clone();
            if token.is_op(".") {
                self.advance();
                let name = self.expect_name()?;
                let range = expr.range.merge(name.range);
                expr = Expr {
                    kind: ExprKind::Field {
                        obj: Box::new(expr),
                        name: name.name,
                    },
                    range,
                };
            } else if token.is_op("[") {
                self.advance();
                let key = self.expression()?;
                let close = self.expect_op("]")?;
                let range = expr.range.merge(close);
                expr = Expr {
                    kind: ExprKind::Index {
                        obj: Box::new(expr),
                        key: Box::new(key),
                    },
                    range,
                };
            } else if token.is_op(":") {
                self.advance();
                let method = self.expect_name()?;
                let (args, end) = self.call_arguments()?;
                let range = expr.range.merge(end);
                expr = Expr {
                    kind: ExprKind::MethodCall {
                        obj: Box::new(expr),
                        method: method.name,
                        args,
                    },
                    range,
                };
            } else if token.is_op("(")
                || token.is_op("{")
                || token.token_type == TokenType::Str
            {
                let (args, end) = self.call_arguments()?;
                let range = expr.range.merge(end);
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    range,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn call_arguments(&mut self) -> PResult<(Vec<Expr>, Range)> {
        let token = self.current().clone();
        if token.is_op("(") {
            self.advance();
            let args = if self.current().is_op(")") {
                Vec::new()
            } else {
                self.expression_list()?
            };
            let close = self.expect_op(")")?;
            Ok((args, close))
        } else if token.token_type == TokenType::Str {
            self.advance();
            let TokenPayload::Bytes(bytes) = token.payload else {
                unreachable!("string token without byte payload")
            };
            let arg = Expr {
                kind: ExprKind::Str(bytes),
                range: token.range,
            };
            Ok((vec![arg], token.range))
        } else if token.is_op("{") {
            let ctor = self.table_constructor()?;
            let range = ctor.range;
            Ok((vec![ctor], range))
        } else {
            Err(self.error_here("function arguments expected"))
        }
    }

    fn table_constructor(&mut self) -> PResult<Expr> {
        let open = self.expect_op("{")?;
        let mut fields = Vec::new();

        while !self.current().is_op("}") {
            if self.current().is_op("[") {
                self.advance();
                let key = self.expression()?;
                self.expect_op("]")?;
                self.expect_op("=")?;
                let value = self.expression()?;
                fields.push(Field::Keyed { key, value });
            } else if self.current().token_type == TokenType::Name
                && self.tokens.get(self.pos + 1).is_some_and(|t| t.is_op("="))
            {
                let name = self.expect_name()?;
                self.expect_op("=")?;
                let value = self.expression()?;
                fields.push(Field::Named {
                    name: name.name,
                    value,
                });
            } else {
                fields.push(Field::Positional(self.expression()?));
            }

            if !self.accept_op(",") && !self.accept_op(";") {
                break;
            }
        }

        let close = self.expect_op("}")?;
        Ok(Expr {
            kind: ExprKind::TableCtor { fields },
            range: open.merge(close),
        })
    }

    fn function_body(&mut self) -> PResult<FunctionBody> {
        let open = self.expect_op("(")?;
        let mut params = Vec::new();
        let mut is_vararg = false;

        if !self.current().is_op(")") {
            loop {
                if self.current().is_op("...") {
                    self.advance();
                    is_vararg = true;
                    break;
                }
                params.push(self.expect_name()?);
                if !self.accept_op(",") {
                    break;
                }
            }
        }
        self.expect_op(")")?;

        let block = self.block(false);
        let end = self.expect_keyword("end")?;
        Ok(FunctionBody {
            params,
            is_vararg,
            block,
            range: open.merge(end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Block {
        let chunk = parse_chunk(source);
        assert!(chunk.errors.is_empty(), "parse errors: {:?}", chunk.errors);
        chunk.block
    }

    fn only_stat(source: &str) -> Stat {
        let mut block = parse_ok(source);
        assert_eq!(block.stats.len(), 1);
        block.stats.pop().unwrap()
    }

    #[test]
    fn precedence_groups_mul_over_add() {
        let stat = only_stat("return 1 + 2 * 3");
        let StatKind::Return { exprs } = stat.kind else {
            panic!()
        };
        let ExprKind::Binary { op, rhs, .. } = &exprs[0].kind else {
            panic!()
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary { op: BinOp::Mul, .. }
        ));
    }

    #[test]
    fn concat_is_right_associative() {
        let stat = only_stat("return \"a\" .. \"b\" .. \"c\"");
        let StatKind::Return { exprs } = stat.kind else {
            panic!()
        };
        let ExprKind::Binary { op, lhs, rhs } = &exprs[0].kind else {
            panic!()
        };
        assert_eq!(*op, BinOp::Concat);
        assert!(matches!(lhs.kind, ExprKind::Str(_)));
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary {
                op: BinOp::Concat,
                ..
            }
        ));
    }

    #[test]
    fn unary_minus_binds_below_pow() {
        // -x^2 parses as -(x^2)
        let stat = only_stat("return -x^2");
        let StatKind::Return { exprs } = stat.kind else {
            panic!()
        };
        let ExprKind::Unary { op, operand } = &exprs[0].kind else {
            panic!()
        };
        assert_eq!(*op, UnOp::Neg);
        assert!(matches!(
            operand.kind,
            ExprKind::Binary { op: BinOp::Pow, .. }
        ));
    }

    #[test]
    fn literal_ranges_cover_the_source_text() {
        let stat = only_stat("return 25 + 13");
        let StatKind::Return { exprs } = stat.kind else {
            panic!()
        };
        let ExprKind::Binary { lhs, rhs, .. } = &exprs[0].kind else {
            panic!()
        };
        assert_eq!((lhs.range.start.byte, lhs.range.end.byte), (7, 9));
        assert_eq!((rhs.range.start.byte, rhs.range.end.byte), (12, 14));
    }

    #[test]
    fn method_call_and_field_chains() {
        let stat = only_stat("obj.child:render(1, 2)");
        let StatKind::Call(expr) = stat.kind else {
            panic!()
        };
        let ExprKind::MethodCall { obj, method, args } = expr.kind else {
            panic!()
        };
        assert_eq!(method, "render");
        assert_eq!(args.len(), 2);
        assert!(matches!(obj.kind, ExprKind::Field { .. }));
    }

    #[test]
    fn table_constructor_field_shapes() {
        let stat = only_stat("t = {1, x = 2, [3] = 4, 5}");
        let StatKind::Assign { values, .. } = stat.kind else {
            panic!()
        };
        let ExprKind::TableCtor { fields } = &values[0].kind else {
            panic!()
        };
        assert!(matches!(fields[0], Field::Positional(_)));
        assert!(matches!(fields[1], Field::Named { .. }));
        assert!(matches!(fields[2], Field::Keyed { .. }));
        assert!(matches!(fields[3], Field::Positional(_)));
    }

    #[test]
    fn numeric_and_generic_for() {
        parse_ok("for i = 1, 10, 2 do print(i) end");
        parse_ok("for k, v in pairs(t) do print(k, v) end");
    }

    #[test]
    fn goto_must_name_a_visible_label() {
        let chunk = parse_chunk("do goto missing end");
        assert_eq!(chunk.errors.len(), 1);
        assert!(chunk.errors[0].message.contains("missing"));

        parse_ok("do goto done ::done:: end");
        // label in an enclosing block is visible
        parse_ok("::top:: do goto top end");
    }

    #[test]
    fn goto_does_not_escape_functions() {
        let chunk = parse_chunk("::top:: local f = function() goto top end");
        assert_eq!(chunk.errors.len(), 1);
    }

    #[test]
    fn error_recovery_reports_multiple_statements() {
        let chunk = parse_chunk("local = 1\nreturn 2 +");
        assert!(chunk.errors.len() >= 2);
    }

    #[test]
    fn assignment_targets_are_validated() {
        let chunk = parse_chunk("f() = 3");
        assert!(!chunk.errors.is_empty());
    }
}
