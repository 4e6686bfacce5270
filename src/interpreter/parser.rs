use std::rc::Rc;

use crate::ast::{BinOp, ElseCase, IfCase, Node, NodeKind, UnaryOp};
use crate::diagnostic::Diagnostic;
use crate::position::Span;
use crate::token::{Keyword, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new("Invalid Syntax", self.message.clone(), self.span.clone())
    }
}

/// Accumulator threaded through every parse function. The advance counts
/// let the parser rewind a speculative alternative that failed
/// (`try_register`) and keep the deepest error when two alternatives both
/// partially matched.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub node: Option<Node>,
    pub error: Option<SyntaxError>,
    pub advance_count: usize,
    pub to_reverse_count: usize,
    pub last_registered_advance_count: usize,
}

impl ParseResult {
    fn new() -> Self {
        Self::default()
    }

    fn register_advancement(&mut self) {
        self.last_registered_advance_count = 1;
        self.advance_count += 1;
    }

    fn register(&mut self, result: ParseResult) -> Option<Node> {
        self.last_registered_advance_count = result.advance_count;
        self.advance_count += result.advance_count;
        if result.error.is_some() {
            self.error = result.error;
        }
        result.node
    }

    /// Like `register`, but a failure is not recorded; the caller rewinds
    /// by `to_reverse_count` and tries something else.
    fn try_register(&mut self, result: ParseResult) -> Option<Node> {
        if result.error.is_some() {
            self.to_reverse_count = result.advance_count;
            return None;
        }
        self.register(result)
    }

    fn success(mut self, node: Node) -> ParseResult {
        self.node = Some(node);
        self
    }

    // An error from a deeper alternative that consumed input wins over
    // one raised at the point of divergence.
    fn record_failure(&mut self, error: SyntaxError) {
        if self.error.is_none() || self.last_registered_advance_count == 0 {
            self.error = Some(error);
        }
    }

    fn failure(mut self, error: SyntaxError) -> ParseResult {
        self.record_failure(error);
        self
    }
}

/// Recursive-descent parser over a token stream that ends with `Eof`.
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    fn current(&self) -> &Token {
        let index = self.index.min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn current_span(&self) -> Span {
        self.current().span.clone()
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn reverse(&mut self, amount: usize) {
        self.index = self.index.saturating_sub(amount);
    }

    pub fn parse(&mut self) -> Result<Node, SyntaxError> {
        let result = self.parse_program();
        match result.error {
            Some(error) => Err(error),
            None => match result.node {
                Some(node) => Ok(node),
                None => Err(SyntaxError::new("Expected expression", self.current_span())),
            },
        }
    }

    fn parse_program(&mut self) -> ParseResult {
        let res = self.statements();
        if res.error.is_none() && !matches!(self.current().kind, TokenKind::Eof) {
            let span = self.current_span();
            return res.failure(SyntaxError::new(
                "Expected '+', '-', '*', '/', '^', '==', '!=', '<', '>', '<=', '>=', 'AND' or 'OR'",
                span,
            ));
        }
        res
    }

    /// One or more statements separated by newlines (or `;`), with any
    /// amount of leading and trailing separators. The list stops cleanly
    /// at the first token that cannot begin a statement.
    fn statements(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let mut statements = Vec::new();
        let start_span = self.current_span();

        while matches!(self.current().kind, TokenKind::Newline) {
            res.register_advancement();
            self.advance();
        }

        let Some(statement) = res.register(self.statement()) else {
            return res;
        };
        statements.push(statement);

        loop {
            let mut newline_count = 0;
            while matches!(self.current().kind, TokenKind::Newline) {
                res.register_advancement();
                self.advance();
                newline_count += 1;
            }
            if newline_count == 0 {
                break;
            }
            match res.try_register(self.statement()) {
                Some(statement) => statements.push(statement),
                None => {
                    let rewind = res.to_reverse_count;
                    self.reverse(rewind);
                    break;
                }
            }
        }

        let span = start_span.to(&self.current_span());
        res.success(Node::new(NodeKind::List(statements), span))
    }

    fn statement(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let start_span = self.current_span();

        if self.current().is_keyword(Keyword::Return) {
            res.register_advancement();
            self.advance();

            let value = match res.try_register(self.expr()) {
                Some(node) => Some(Box::new(node)),
                None => {
                    let rewind = res.to_reverse_count;
                    self.reverse(rewind);
                    None
                }
            };
            let span = match &value {
                Some(node) => start_span.to(&node.span),
                None => start_span,
            };
            return res.success(Node::new(NodeKind::Return(value), span));
        }

        if self.current().is_keyword(Keyword::Continue) {
            res.register_advancement();
            self.advance();
            return res.success(Node::new(NodeKind::Continue, start_span));
        }

        if self.current().is_keyword(Keyword::Break) {
            res.register_advancement();
            self.advance();
            return res.success(Node::new(NodeKind::Break, start_span));
        }

        let Some(expr) = res.register(self.expr()) else {
            let span = start_span.to(&self.current_span());
            return res.failure(SyntaxError::new(
                "Expected 'RETURN', 'CONTINUE', 'BREAK', 'VAR', 'IF', 'FOR', 'WHILE', 'FUN', \
                 int, float, identifier, '+', '-', '(', '[' or 'NOT'",
                span,
            ));
        };
        res.success(expr)
    }

    fn expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let start_span = self.current_span();

        if self.current().is_keyword(Keyword::Var) {
            res.register_advancement();
            self.advance();

            let name = match &self.current().kind {
                TokenKind::Ident(name) => name.clone(),
                _ => {
                    return res
                        .failure(SyntaxError::new("Expected identifier", self.current_span()));
                }
            };
            res.register_advancement();
            self.advance();

            if !matches!(self.current().kind, TokenKind::Eq) {
                return res.failure(SyntaxError::new("Expected '='", self.current_span()));
            }
            res.register_advancement();
            self.advance();

            let Some(value) = res.register(self.expr()) else {
                return res;
            };
            let span = start_span.to(&value.span);
            return res.success(Node::new(
                NodeKind::VarAssign {
                    name,
                    value: Box::new(value),
                },
                span,
            ));
        }

        let node = res.register(self.or_expr());
        let Some(node) = node else {
            let span = start_span.to(&self.current_span());
            return res.failure(SyntaxError::new(
                "Expected 'VAR', 'IF', 'FOR', 'WHILE', 'FUN', int, float, identifier, \
                 '+', '-', '(', '[' or 'NOT'",
                span,
            ));
        };
        res.success(node)
    }

    fn or_expr(&mut self) -> ParseResult {
        self.bin_op(
            Self::and_expr,
            |kind| match kind {
                TokenKind::Keyword(Keyword::Or) => Some(BinOp::Or),
                _ => None,
            },
            Self::and_expr,
        )
    }

    fn and_expr(&mut self) -> ParseResult {
        self.bin_op(
            Self::comp_expr,
            |kind| match kind {
                TokenKind::Keyword(Keyword::And) => Some(BinOp::And),
                _ => None,
            },
            Self::comp_expr,
        )
    }

    fn comp_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();

        if self.current().is_keyword(Keyword::Not) {
            let op_span = self.current_span();
            res.register_advancement();
            self.advance();

            let Some(operand) = res.register(self.comp_expr()) else {
                return res;
            };
            let span = op_span.to(&operand.span);
            return res.success(Node::new(
                NodeKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }

        let start_span = self.current_span();
        let node = res.register(self.bin_op(
            Self::arith_expr,
            |kind| match kind {
                TokenKind::EqEq => Some(BinOp::EqEq),
                TokenKind::NotEq => Some(BinOp::NotEq),
                TokenKind::Less => Some(BinOp::Less),
                TokenKind::Greater => Some(BinOp::Greater),
                TokenKind::LessEq => Some(BinOp::LessEq),
                TokenKind::GreaterEq => Some(BinOp::GreaterEq),
                _ => None,
            },
            Self::arith_expr,
        ));
        let Some(node) = node else {
            let span = start_span.to(&self.current_span());
            return res.failure(SyntaxError::new(
                "Expected int, float, identifier, '+', '-', '(', '[', 'IF', 'FOR', 'WHILE', \
                 'FUN' or 'NOT'",
                span,
            ));
        };
        res.success(node)
    }

    fn arith_expr(&mut self) -> ParseResult {
        self.bin_op(
            Self::term,
            |kind| match kind {
                TokenKind::Plus => Some(BinOp::Add),
                TokenKind::Minus => Some(BinOp::Sub),
                _ => None,
            },
            Self::term,
        )
    }

    fn term(&mut self) -> ParseResult {
        self.bin_op(
            Self::factor,
            |kind| match kind {
                TokenKind::Star => Some(BinOp::Mul),
                TokenKind::Slash => Some(BinOp::Div),
                _ => None,
            },
            Self::factor,
        )
    }

    fn factor(&mut self) -> ParseResult {
        let op = match self.current().kind {
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        let Some(op) = op else {
            return self.power();
        };

        let mut res = ParseResult::new();
        let op_span = self.current_span();
        res.register_advancement();
        self.advance();

        let Some(operand) = res.register(self.factor()) else {
            return res;
        };
        let span = op_span.to(&operand.span);
        res.success(Node::new(
            NodeKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    // `^` is right-associative: the right operand re-enters at `factor`.
    fn power(&mut self) -> ParseResult {
        self.bin_op(
            Self::call,
            |kind| match kind {
                TokenKind::Caret => Some(BinOp::Pow),
                _ => None,
            },
            Self::factor,
        )
    }

    fn call(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let Some(atom) = res.register(self.atom()) else {
            return res;
        };

        if !matches!(self.current().kind, TokenKind::LParen) {
            return res.success(atom);
        }
        res.register_advancement();
        self.advance();

        let mut args = Vec::new();
        let end_span;

        if matches!(self.current().kind, TokenKind::RParen) {
            end_span = self.current_span();
            res.register_advancement();
            self.advance();
        } else {
            let Some(first) = res.register(self.expr()) else {
                let span = self.current_span();
                return res.failure(SyntaxError::new(
                    "Expected ')', 'VAR', 'IF', 'FOR', 'WHILE', 'FUN', int, float, \
                     identifier, '+', '-', '(', '[' or 'NOT'",
                    span,
                ));
            };
            args.push(first);

            while matches!(self.current().kind, TokenKind::Comma) {
                res.register_advancement();
                self.advance();
                let Some(arg) = res.register(self.expr()) else {
                    return res;
                };
                args.push(arg);
            }

            if !matches!(self.current().kind, TokenKind::RParen) {
                return res.failure(SyntaxError::new("Expected ',' or ')'", self.current_span()));
            }
            end_span = self.current_span();
            res.register_advancement();
            self.advance();
        }

        let span = atom.span.to(&end_span);
        res.success(Node::new(
            NodeKind::Call {
                callee: Box::new(atom),
                args,
            },
            span,
        ))
    }

    fn atom(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let tok = self.current().clone();

        match tok.kind {
            TokenKind::Int(n) => {
                res.register_advancement();
                self.advance();
                res.success(Node::new(NodeKind::Number(n, false), tok.span))
            }
            TokenKind::Float(n) => {
                res.register_advancement();
                self.advance();
                res.success(Node::new(NodeKind::Number(n, true), tok.span))
            }
            TokenKind::Str(s) => {
                res.register_advancement();
                self.advance();
                res.success(Node::new(NodeKind::Str(s), tok.span))
            }
            TokenKind::Ident(name) => {
                res.register_advancement();
                self.advance();
                res.success(Node::new(NodeKind::VarAccess(name), tok.span))
            }
            TokenKind::LParen => {
                res.register_advancement();
                self.advance();
                let Some(expr) = res.register(self.expr()) else {
                    return res;
                };
                if !matches!(self.current().kind, TokenKind::RParen) {
                    return res.failure(SyntaxError::new("Expected ')'", self.current_span()));
                }
                res.register_advancement();
                self.advance();
                res.success(expr)
            }
            TokenKind::LSquare => {
                let Some(list) = res.register(self.list_expr()) else {
                    return res;
                };
                res.success(list)
            }
            TokenKind::Keyword(Keyword::If) => {
                let Some(node) = res.register(self.if_expr()) else {
                    return res;
                };
                res.success(node)
            }
            TokenKind::Keyword(Keyword::For) => {
                let Some(node) = res.register(self.for_expr()) else {
                    return res;
                };
                res.success(node)
            }
            TokenKind::Keyword(Keyword::While) => {
                let Some(node) = res.register(self.while_expr()) else {
                    return res;
                };
                res.success(node)
            }
            TokenKind::Keyword(Keyword::Fun) => {
                let Some(node) = res.register(self.func_def()) else {
                    return res;
                };
                res.success(node)
            }
            _ => res.failure(SyntaxError::new(
                "Expected int, float, identifier, '+', '-', '(', '[', 'IF', 'FOR', \
                 'WHILE' or 'FUN'",
                tok.span,
            )),
        }
    }

    fn list_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let start_span = self.current_span();
        res.register_advancement();
        self.advance();

        let mut elements = Vec::new();

        if matches!(self.current().kind, TokenKind::RSquare) {
            let end_span = self.current_span();
            res.register_advancement();
            self.advance();
            return res.success(Node::new(NodeKind::List(elements), start_span.to(&end_span)));
        }

        let Some(first) = res.register(self.expr()) else {
            let span = self.current_span();
            return res.failure(SyntaxError::new(
                "Expected ']', 'VAR', 'IF', 'FOR', 'WHILE', 'FUN', int, float, identifier, \
                 '+', '-', '(', '[' or 'NOT'",
                span,
            ));
        };
        elements.push(first);

        while matches!(self.current().kind, TokenKind::Comma) {
            res.register_advancement();
            self.advance();
            let Some(element) = res.register(self.expr()) else {
                return res;
            };
            elements.push(element);
        }

        if !matches!(self.current().kind, TokenKind::RSquare) {
            return res.failure(SyntaxError::new("Expected ',' or ']'", self.current_span()));
        }
        let end_span = self.current_span();
        res.register_advancement();
        self.advance();
        res.success(Node::new(NodeKind::List(elements), start_span.to(&end_span)))
    }

    fn if_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let start_span = self.current_span();

        let Some((cases, else_case)) = self.if_cases(Keyword::If, &mut res) else {
            return res;
        };

        let end_span = match (&else_case, cases.last()) {
            (Some(else_case), _) => else_case.body.span.clone(),
            (None, Some(case)) => case.body.span.clone(),
            (None, None) => start_span.clone(),
        };
        let span = start_span.to(&end_span);
        res.success(Node::new(
            NodeKind::If {
                cases,
                else_case: else_case.map(Box::new),
            },
            span,
        ))
    }

    /// Parses `<keyword> condition THEN ...` plus any chained `ELIF`/
    /// `ELSE` arms. Returns `None` with the error recorded in `res`.
    fn if_cases(
        &mut self,
        keyword: Keyword,
        res: &mut ParseResult,
    ) -> Option<(Vec<IfCase>, Option<ElseCase>)> {
        if !self.current().is_keyword(keyword) {
            res.record_failure(SyntaxError::new(
                format!("Expected '{}'", keyword.as_str()),
                self.current_span(),
            ));
            return None;
        }
        res.register_advancement();
        self.advance();

        let condition = res.register(self.expr())?;

        if !self.current().is_keyword(Keyword::Then) {
            res.record_failure(SyntaxError::new("Expected 'THEN'", self.current_span()));
            return None;
        }
        res.register_advancement();
        self.advance();

        let mut cases = Vec::new();
        let mut else_case = None;

        if matches!(self.current().kind, TokenKind::Newline) {
            res.register_advancement();
            self.advance();

            let body = res.register(self.statements())?;
            cases.push(IfCase {
                condition,
                body,
                block: true,
            });

            if self.current().is_keyword(Keyword::End) {
                res.register_advancement();
                self.advance();
            } else {
                let (more_cases, chained_else) = self.elif_or_else(res)?;
                cases.extend(more_cases);
                else_case = chained_else;
            }
        } else {
            let body = res.register(self.statement())?;
            cases.push(IfCase {
                condition,
                body,
                block: false,
            });

            let (more_cases, chained_else) = self.elif_or_else(res)?;
            cases.extend(more_cases);
            else_case = chained_else;
        }

        Some((cases, else_case))
    }

    fn elif_or_else(
        &mut self,
        res: &mut ParseResult,
    ) -> Option<(Vec<IfCase>, Option<ElseCase>)> {
        if self.current().is_keyword(Keyword::Elif) {
            self.if_cases(Keyword::Elif, res)
        } else {
            let else_case = self.else_case(res)?;
            Some((Vec::new(), else_case))
        }
    }

    // Outer None means a parse error; inner None means no ELSE arm.
    fn else_case(&mut self, res: &mut ParseResult) -> Option<Option<ElseCase>> {
        if !self.current().is_keyword(Keyword::Else) {
            return Some(None);
        }
        res.register_advancement();
        self.advance();

        if matches!(self.current().kind, TokenKind::Newline) {
            res.register_advancement();
            self.advance();

            let body = res.register(self.statements())?;

            if !self.current().is_keyword(Keyword::End) {
                res.record_failure(SyntaxError::new("Expected 'END'", self.current_span()));
                return None;
            }
            res.register_advancement();
            self.advance();
            Some(Some(ElseCase { body, block: true }))
        } else {
            let body = res.register(self.statement())?;
            Some(Some(ElseCase { body, block: false }))
        }
    }

    fn for_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let start_span = self.current_span();
        res.register_advancement();
        self.advance();

        let var = match &self.current().kind {
            TokenKind::Ident(name) => name.clone(),
            _ => {
                return res.failure(SyntaxError::new("Expected identifier", self.current_span()));
            }
        };
        res.register_advancement();
        self.advance();

        if !matches!(self.current().kind, TokenKind::Eq) {
            return res.failure(SyntaxError::new("Expected '='", self.current_span()));
        }
        res.register_advancement();
        self.advance();

        let Some(start_value) = res.register(self.expr()) else {
            return res;
        };

        if !self.current().is_keyword(Keyword::To) {
            return res.failure(SyntaxError::new("Expected 'TO'", self.current_span()));
        }
        res.register_advancement();
        self.advance();

        let Some(end_value) = res.register(self.expr()) else {
            return res;
        };

        let step = if self.current().is_keyword(Keyword::Step) {
            res.register_advancement();
            self.advance();
            let Some(step) = res.register(self.expr()) else {
                return res;
            };
            Some(Box::new(step))
        } else {
            None
        };

        if !self.current().is_keyword(Keyword::Then) {
            return res.failure(SyntaxError::new("Expected 'THEN'", self.current_span()));
        }
        res.register_advancement();
        self.advance();

        if matches!(self.current().kind, TokenKind::Newline) {
            res.register_advancement();
            self.advance();

            let Some(body) = res.register(self.statements()) else {
                return res;
            };

            if !self.current().is_keyword(Keyword::End) {
                return res.failure(SyntaxError::new("Expected 'END'", self.current_span()));
            }
            let end_span = self.current_span();
            res.register_advancement();
            self.advance();

            let span = start_span.to(&end_span);
            return res.success(Node::new(
                NodeKind::For {
                    var,
                    start: Box::new(start_value),
                    end: Box::new(end_value),
                    step,
                    body: Box::new(body),
                    block: true,
                },
                span,
            ));
        }

        let Some(body) = res.register(self.statement()) else {
            return res;
        };
        let span = start_span.to(&body.span);
        res.success(Node::new(
            NodeKind::For {
                var,
                start: Box::new(start_value),
                end: Box::new(end_value),
                step,
                body: Box::new(body),
                block: false,
            },
            span,
        ))
    }

    fn while_expr(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let start_span = self.current_span();
        res.register_advancement();
        self.advance();

        let Some(condition) = res.register(self.expr()) else {
            return res;
        };

        if !self.current().is_keyword(Keyword::Then) {
            return res.failure(SyntaxError::new("Expected 'THEN'", self.current_span()));
        }
        res.register_advancement();
        self.advance();

        if matches!(self.current().kind, TokenKind::Newline) {
            res.register_advancement();
            self.advance();

            let Some(body) = res.register(self.statements()) else {
                return res;
            };

            if !self.current().is_keyword(Keyword::End) {
                return res.failure(SyntaxError::new("Expected 'END'", self.current_span()));
            }
            let end_span = self.current_span();
            res.register_advancement();
            self.advance();

            let span = start_span.to(&end_span);
            return res.success(Node::new(
                NodeKind::While {
                    condition: Box::new(condition),
                    body: Box::new(body),
                    block: true,
                },
                span,
            ));
        }

        let Some(body) = res.register(self.statement()) else {
            return res;
        };
        let span = start_span.to(&body.span);
        res.success(Node::new(
            NodeKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
                block: false,
            },
            span,
        ))
    }

    fn func_def(&mut self) -> ParseResult {
        let mut res = ParseResult::new();
        let start_span = self.current_span();
        res.register_advancement();
        self.advance();

        let name = match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                res.register_advancement();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        if !matches!(self.current().kind, TokenKind::LParen) {
            let message = if name.is_some() {
                "Expected '('"
            } else {
                "Expected identifier or '('"
            };
            return res.failure(SyntaxError::new(message, self.current_span()));
        }
        res.register_advancement();
        self.advance();

        let mut params = Vec::new();
        if let TokenKind::Ident(param) = &self.current().kind {
            params.push(param.clone());
            res.register_advancement();
            self.advance();

            while matches!(self.current().kind, TokenKind::Comma) {
                res.register_advancement();
                self.advance();
                match &self.current().kind {
                    TokenKind::Ident(param) => {
                        params.push(param.clone());
                        res.register_advancement();
                        self.advance();
                    }
                    _ => {
                        return res.failure(SyntaxError::new(
                            "Expected identifier",
                            self.current_span(),
                        ));
                    }
                }
            }

            if !matches!(self.current().kind, TokenKind::RParen) {
                return res.failure(SyntaxError::new("Expected ',' or ')'", self.current_span()));
            }
        } else if !matches!(self.current().kind, TokenKind::RParen) {
            return res.failure(SyntaxError::new(
                "Expected identifier or ')'",
                self.current_span(),
            ));
        }
        res.register_advancement();
        self.advance();

        if matches!(self.current().kind, TokenKind::Arrow) {
            res.register_advancement();
            self.advance();

            let Some(body) = res.register(self.expr()) else {
                return res;
            };
            let span = start_span.to(&body.span);
            return res.success(Node::new(
                NodeKind::FuncDef {
                    name,
                    params,
                    body: Rc::new(body),
                    auto_return: true,
                },
                span,
            ));
        }

        if !matches!(self.current().kind, TokenKind::Newline) {
            return res.failure(SyntaxError::new(
                "Expected '->' or NEWLINE",
                self.current_span(),
            ));
        }
        res.register_advancement();
        self.advance();

        let Some(body) = res.register(self.statements()) else {
            return res;
        };

        if !self.current().is_keyword(Keyword::End) {
            return res.failure(SyntaxError::new("Expected 'END'", self.current_span()));
        }
        let end_span = self.current_span();
        res.register_advancement();
        self.advance();

        let span = start_span.to(&end_span);
        res.success(Node::new(
            NodeKind::FuncDef {
                name,
                params,
                body: Rc::new(body),
                auto_return: false,
            },
            span,
        ))
    }

    fn bin_op(
        &mut self,
        left_fn: fn(&mut Parser) -> ParseResult,
        op_for: impl Fn(&TokenKind) -> Option<BinOp>,
        right_fn: fn(&mut Parser) -> ParseResult,
    ) -> ParseResult {
        let mut res = ParseResult::new();
        let Some(mut left) = res.register(left_fn(self)) else {
            return res;
        };

        while let Some(op) = op_for(&self.current().kind) {
            res.register_advancement();
            self.advance();

            let Some(right) = res.register(right_fn(self)) else {
                return res;
            };
            let span = left.span.to(&right.span);
            left = Node::new(
                NodeKind::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        res.success(left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::position::Source;

    fn parse(source: &str) -> Node {
        let source = Source::new("<test>", source);
        let tokens = Lexer::new(&source).tokenize().expect("lexer failed");
        Parser::new(tokens).parse().expect("parser failed")
    }

    fn parse_err(source: &str) -> SyntaxError {
        let source = Source::new("<test>", source);
        let tokens = Lexer::new(&source).tokenize().expect("lexer failed");
        Parser::new(tokens).parse().expect_err("parser should fail")
    }

    fn statements(node: &Node) -> &[Node] {
        match &node.kind {
            NodeKind::List(items) => items,
            other => panic!("expected statement list, got {:?}", other),
        }
    }

    #[test]
    fn test_number_atom() {
        let root = parse("42");
        assert!(matches!(
            statements(&root)[0].kind,
            NodeKind::Number(n, false) if n == 42.0
        ));
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let root = parse("1 + 2 * 3");
        let NodeKind::BinOp { op, right, .. } = &statements(&root)[0].kind else {
            panic!("expected binop");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(
            right.kind,
            NodeKind::BinOp { op: BinOp::Mul, .. }
        ));
    }

    #[test]
    fn test_power_is_right_associative() {
        let root = parse("2 ^ 3 ^ 2");
        let NodeKind::BinOp { op, left, right } = &statements(&root)[0].kind else {
            panic!("expected binop");
        };
        assert_eq!(*op, BinOp::Pow);
        assert!(matches!(left.kind, NodeKind::Number(2.0, false)));
        assert!(matches!(
            right.kind,
            NodeKind::BinOp { op: BinOp::Pow, .. }
        ));
    }

    #[test]
    fn test_var_assignment() {
        let root = parse("VAR x = 1 + 2");
        let NodeKind::VarAssign { name, value } = &statements(&root)[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(name, "x");
        assert!(matches!(value.kind, NodeKind::BinOp { op: BinOp::Add, .. }));
    }

    #[test]
    fn test_or_binds_looser_than_and() {
        let root = parse("1 OR 2 AND 3");
        let NodeKind::BinOp { op, right, .. } = &statements(&root)[0].kind else {
            panic!("expected binop");
        };
        assert_eq!(*op, BinOp::Or);
        assert!(matches!(
            right.kind,
            NodeKind::BinOp { op: BinOp::And, .. }
        ));
    }

    #[test]
    fn test_call_with_args() {
        let root = parse("f(1, 2)");
        let NodeKind::Call { callee, args } = &statements(&root)[0].kind else {
            panic!("expected call");
        };
        assert!(matches!(&callee.kind, NodeKind::VarAccess(name) if name == "f"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_multiple_statements() {
        let root = parse("VAR a = 1\nVAR b = 2; a + b");
        assert_eq!(statements(&root).len(), 3);
    }

    #[test]
    fn test_inline_if_chain() {
        let root = parse("IF 1 THEN 2 ELIF 3 THEN 4 ELSE 5");
        let NodeKind::If { cases, else_case } = &statements(&root)[0].kind else {
            panic!("expected if");
        };
        assert_eq!(cases.len(), 2);
        assert!(!cases[0].block);
        assert!(else_case.is_some());
    }

    #[test]
    fn test_block_if_yields_block_flag() {
        let root = parse("IF 1 THEN\n2\nEND");
        let NodeKind::If { cases, else_case } = &statements(&root)[0].kind else {
            panic!("expected if");
        };
        assert!(cases[0].block);
        assert!(else_case.is_none());
    }

    #[test]
    fn test_for_with_step() {
        let root = parse("FOR i = 0 TO 10 STEP 2 THEN i");
        let NodeKind::For { var, step, block, .. } = &statements(&root)[0].kind else {
            panic!("expected for");
        };
        assert_eq!(var, "i");
        assert!(step.is_some());
        assert!(!block);
    }

    #[test]
    fn test_func_def_arrow() {
        let root = parse("FUN add(a, b) -> a + b");
        let NodeKind::FuncDef {
            name,
            params,
            auto_return,
            ..
        } = &statements(&root)[0].kind
        else {
            panic!("expected function definition");
        };
        assert_eq!(name.as_deref(), Some("add"));
        assert_eq!(params, &["a".to_string(), "b".to_string()]);
        assert!(auto_return);
    }

    #[test]
    fn test_anonymous_func_block_body() {
        let root = parse("FUN () \n RETURN 1 \n END");
        let NodeKind::FuncDef {
            name, auto_return, ..
        } = &statements(&root)[0].kind
        else {
            panic!("expected function definition");
        };
        assert!(name.is_none());
        assert!(!auto_return);
    }

    #[test]
    fn test_return_without_value() {
        let root = parse("FUN f()\nRETURN\nEND");
        let NodeKind::FuncDef { body, .. } = &statements(&root)[0].kind else {
            panic!("expected function definition");
        };
        let NodeKind::List(stmts) = &body.kind else {
            panic!("expected body list");
        };
        assert!(matches!(stmts[0].kind, NodeKind::Return(None)));
    }

    #[test]
    fn test_list_literal() {
        let root = parse("[1, 2, 3]");
        let NodeKind::List(items) = &statements(&root)[0].kind else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_missing_paren_error() {
        let err = parse_err("(1 + 2");
        assert_eq!(err.message, "Expected ')'");
    }

    #[test]
    fn test_var_without_identifier() {
        let err = parse_err("VAR = 5");
        assert_eq!(err.message, "Expected identifier");
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse_err("1 2");
        assert!(err.message.starts_with("Expected '+'"));
    }

    #[test]
    fn test_unclosed_block_reports_end() {
        let err = parse_err("WHILE 1 THEN\n1\n");
        assert_eq!(err.message, "Expected 'END'");
    }

    #[test]
    fn test_node_spans_are_ordered() {
        let root = parse("VAR total = (1 + 2) * [3, 4] / 5");
        fn check(node: &Node) {
            assert!(node.span.start.index <= node.span.end.index);
            match &node.kind {
                NodeKind::List(items) => items.iter().for_each(check),
                NodeKind::VarAssign { value, .. } => check(value),
                NodeKind::BinOp { left, right, .. } => {
                    check(left);
                    check(right);
                }
                NodeKind::UnaryOp { operand, .. } => check(operand),
                _ => {}
            }
        }
        check(&root);
    }
}
