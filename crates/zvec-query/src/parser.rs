//! Recursive-descent parser over the §6.2 grammar, producing a
//! [`SelectInfo`] whose `search_cond` is a [`FilterNode`] tree.

use zvec_types::{FilterNode, Literal, OrderByElem, RelOp, SelectInfo, SelectedElement, SortOrder};

use crate::error::QueryError;
use crate::lexer::{Lexer, Spanned, Token};

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    pub fn parse(input: &str) -> Result<SelectInfo, QueryError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Self { tokens, pos: 0 };
        let info = parser.parse_select()?;
        parser.expect(Token::Eof)?;
        Ok(info)
    }

    /// Parses a single vector/matrix literal in isolation — the cheap path
    /// the plan cache uses to re-parse a grafted-in vector operand without
    /// re-running the whole `SELECT` grammar.
    pub fn parse_literal_str(input: &str) -> Result<Literal, QueryError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Self { tokens, pos: 0 };
        let literal = parser.parse_literal()?;
        parser.expect(Token::Eof)?;
        Ok(literal)
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Spanned {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, token: &Token) -> bool {
        &self.cur().token == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<Spanned, QueryError> {
        if self.check(&token) {
            Ok(self.advance())
        } else {
            let cur = self.cur().clone();
            Err(QueryError::parse(
                format!("expected {:?}, found {:?}", token, cur.token),
                cur.line,
                cur.col,
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<String, QueryError> {
        match &self.cur().token {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => {
                let cur = self.cur();
                Err(QueryError::parse(
                    format!("expected identifier, found {other:?}"),
                    cur.line,
                    cur.col,
                ))
            }
        }
    }

    fn parse_select(&mut self) -> Result<SelectInfo, QueryError> {
        self.expect(Token::Select)?;
        let elements = self.parse_elements()?;
        self.expect(Token::From)?;
        let table = self.expect_ident()?;

        let mut info = SelectInfo::new(table);
        for e in elements {
            if e.is_wildcard {
                info.include_vector = true;
            }
            info.selected_elems.push(e);
        }

        if self.eat(&Token::Where) {
            info.search_cond = Some(self.parse_logic()?);
        }
        if self.check(&Token::Order) {
            self.advance();
            self.expect(Token::By)?;
            info.order_by = self.parse_order_elems()?;
        }
        if self.eat(&Token::Limit) {
            info.limit = Some(self.parse_int()?);
        }
        Ok(info)
    }

    fn parse_elements(&mut self) -> Result<Vec<SelectedElement>, QueryError> {
        if self.eat(&Token::Star) {
            return Ok(vec![SelectedElement::wildcard()]);
        }
        let mut elems = vec![self.parse_element()?];
        while self.eat(&Token::Comma) {
            elems.push(self.parse_element()?);
        }
        Ok(elems)
    }

    fn parse_element(&mut self) -> Result<SelectedElement, QueryError> {
        let name = self.expect_ident()?;
        let alias = if self.eat(&Token::As) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        Ok(SelectedElement {
            name,
            alias,
            is_wildcard: false,
        })
    }

    fn parse_order_elems(&mut self) -> Result<Vec<OrderByElem>, QueryError> {
        let mut elems = vec![self.parse_order_elem()?];
        while self.eat(&Token::Comma) {
            elems.push(self.parse_order_elem()?);
        }
        Ok(elems)
    }

    fn parse_order_elem(&mut self) -> Result<OrderByElem, QueryError> {
        let field = self.expect_ident()?;
        let order = if self.eat(&Token::Desc) {
            SortOrder::Desc
        } else {
            self.eat(&Token::Asc);
            SortOrder::Asc
        };
        Ok(OrderByElem { field, order })
    }

    fn parse_int(&mut self) -> Result<i64, QueryError> {
        match self.cur().token.clone() {
            Token::Int(v) => {
                self.advance();
                Ok(v)
            }
            other => {
                let cur = self.cur();
                Err(QueryError::parse(
                    format!("expected integer literal, found {other:?}"),
                    cur.line,
                    cur.col,
                ))
            }
        }
    }

    // logic = rel | logic "AND" logic | logic "OR" logic | "(" logic ")"
    // Implemented with standard precedence climbing: OR binds loosest, AND
    // tighter, parenthesized/`rel` atoms tightest.
    fn parse_logic(&mut self) -> Result<FilterNode, QueryError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<FilterNode, QueryError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = FilterNode::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<FilterNode, QueryError> {
        let mut lhs = self.parse_logic_atom()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_logic_atom()?;
            lhs = FilterNode::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_logic_atom(&mut self) -> Result<FilterNode, QueryError> {
        if self.eat(&Token::LParen) {
            let inner = self.parse_logic()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        self.parse_rel()
    }

    fn parse_rel(&mut self) -> Result<FilterNode, QueryError> {
        // function_call rel_op value_expr, or id-led productions. Both start
        // with an identifier; disambiguate on whether `(` follows.
        let lhs = self.parse_ident_or_call()?;

        if matches!(lhs, FilterNode::Call { .. }) {
            let op = self.parse_rel_op()?;
            let rhs = self.parse_value_expr()?;
            return Ok(FilterNode::Rel {
                op,
                lhs: Box::new(lhs),
                rhs: Some(Box::new(rhs)),
            });
        }

        if self.eat(&Token::Is) {
            let negate = self.eat(&Token::Not);
            self.expect(Token::Null)?;
            return Ok(FilterNode::Rel {
                op: if negate { RelOp::IsNotNull } else { RelOp::IsNull },
                lhs: Box::new(lhs),
                rhs: None,
            });
        }

        if self.eat(&Token::Like) {
            let rhs = self.parse_value_expr()?;
            return Ok(FilterNode::Rel {
                op: RelOp::Like,
                lhs: Box::new(lhs),
                rhs: Some(Box::new(rhs)),
            });
        }

        let negate = self.eat(&Token::Not);

        if self.eat(&Token::In) {
            let values = self.parse_value_list()?;
            return Ok(FilterNode::Rel {
                op: if negate { RelOp::NotIn } else { RelOp::In },
                lhs: Box::new(lhs),
                rhs: Some(Box::new(FilterNode::Const(Literal::InValueList(values)))),
            });
        }
        if self.eat(&Token::ContainAll) {
            let values = self.parse_value_list()?;
            return Ok(FilterNode::Rel {
                op: if negate {
                    RelOp::NotContainAll
                } else {
                    RelOp::ContainAll
                },
                lhs: Box::new(lhs),
                rhs: Some(Box::new(FilterNode::Const(Literal::InValueList(values)))),
            });
        }
        if self.eat(&Token::ContainAny) {
            let values = self.parse_value_list()?;
            return Ok(FilterNode::Rel {
                op: if negate {
                    RelOp::NotContainAny
                } else {
                    RelOp::ContainAny
                },
                lhs: Box::new(lhs),
                rhs: Some(Box::new(FilterNode::Const(Literal::InValueList(values)))),
            });
        }
        if negate {
            let cur = self.cur();
            return Err(QueryError::parse(
                format!("expected IN/CONTAIN_ALL/CONTAIN_ANY after NOT, found {:?}", cur.token),
                cur.line,
                cur.col,
            ));
        }

        let op = self.parse_rel_op()?;
        let rhs = self.parse_value_expr()?;
        Ok(FilterNode::Rel {
            op,
            lhs: Box::new(lhs),
            rhs: Some(Box::new(rhs)),
        })
    }

    fn parse_ident_or_call(&mut self) -> Result<FilterNode, QueryError> {
        let name = self.expect_ident()?;
        if self.eat(&Token::LParen) {
            let mut args = Vec::new();
            if !self.check(&Token::RParen) {
                args.push(self.parse_value_expr()?);
                while self.eat(&Token::Comma) {
                    args.push(self.parse_value_expr()?);
                }
            }
            self.expect(Token::RParen)?;
            Ok(FilterNode::Call { name, args })
        } else {
            Ok(FilterNode::Ident(name))
        }
    }

    /// `rel_op = "=" | "!=" | "<" | "<=" | ">" | ">=" | "<" "=" | ">" "="`
    /// — the last two alternatives are the same operator spelled as two
    /// adjacent tokens (possible if whitespace separates `<` and `=`); the
    /// lexer already merges the common adjacent-no-space spelling into a
    /// single `Le`/`Ge` token, so this only needs to additionally accept
    /// `Lt`/`Gt` immediately followed by a bare `Eq`.
    fn parse_rel_op(&mut self) -> Result<RelOp, QueryError> {
        let cur = self.cur().clone();
        let op = match cur.token {
            Token::Eq => {
                self.advance();
                RelOp::Eq
            }
            Token::Ne => {
                self.advance();
                RelOp::Ne
            }
            Token::Le => {
                self.advance();
                RelOp::Le
            }
            Token::Ge => {
                self.advance();
                RelOp::Ge
            }
            Token::Lt => {
                self.advance();
                if self.eat(&Token::Eq) {
                    RelOp::Le
                } else {
                    RelOp::Lt
                }
            }
            Token::Gt => {
                self.advance();
                if self.eat(&Token::Eq) {
                    RelOp::Ge
                } else {
                    RelOp::Gt
                }
            }
            other => {
                return Err(QueryError::parse(
                    format!("expected relational operator, found {other:?}"),
                    cur.line,
                    cur.col,
                ))
            }
        };
        Ok(op)
    }

    fn parse_value_list(&mut self) -> Result<Vec<Literal>, QueryError> {
        self.expect(Token::LParen)?;
        let mut values = Vec::new();
        if !self.check(&Token::RParen) {
            values.push(self.parse_literal()?);
            while self.eat(&Token::Comma) {
                values.push(self.parse_literal()?);
            }
        }
        self.expect(Token::RParen)?;
        Ok(values)
    }

    fn parse_value_expr(&mut self) -> Result<FilterNode, QueryError> {
        if let Token::Ident(_) = &self.cur().token {
            return self.parse_ident_or_call();
        }
        Ok(FilterNode::Const(self.parse_literal()?))
    }

    fn parse_literal(&mut self) -> Result<Literal, QueryError> {
        if self.eat(&Token::Minus) {
            let cur = self.cur().clone();
            return match cur.token {
                Token::Int(v) => {
                    self.advance();
                    Ok(Literal::Int(-v))
                }
                Token::Float(v) => {
                    self.advance();
                    Ok(Literal::Float(-v))
                }
                other => Err(QueryError::parse(
                    format!("expected number after unary '-', found {other:?}"),
                    cur.line,
                    cur.col,
                )),
            };
        }
        let cur = self.cur().clone();
        match cur.token {
            Token::Int(v) => {
                self.advance();
                Ok(Literal::Int(v))
            }
            Token::Float(v) => {
                self.advance();
                Ok(Literal::Float(v))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Literal::Str(s))
            }
            Token::Bool(b) => {
                self.advance();
                Ok(Literal::Bool(b))
            }
            Token::Null => {
                self.advance();
                Ok(Literal::Null)
            }
            Token::LBracket => self.parse_vector_or_matrix(),
            other => Err(QueryError::parse(
                format!("expected literal, found {other:?}"),
                cur.line,
                cur.col,
            )),
        }
    }

    fn parse_vector_or_matrix(&mut self) -> Result<Literal, QueryError> {
        self.expect(Token::LBracket)?;
        if self.check(&Token::LBracket) {
            let mut rows = vec![self.parse_vector_body()?];
            while self.eat(&Token::Comma) {
                rows.push(self.parse_vector_body()?);
            }
            self.expect(Token::RBracket)?;
            return Ok(Literal::Matrix(rows));
        }
        let values = self.parse_float_list()?;
        self.expect(Token::RBracket)?;
        Ok(Literal::Vector(values))
    }

    fn parse_vector_body(&mut self) -> Result<Vec<f32>, QueryError> {
        self.expect(Token::LBracket)?;
        let values = self.parse_float_list()?;
        self.expect(Token::RBracket)?;
        Ok(values)
    }

    fn parse_float_list(&mut self) -> Result<Vec<f32>, QueryError> {
        let mut values = vec![self.parse_float()?];
        while self.eat(&Token::Comma) {
            values.push(self.parse_float()?);
        }
        Ok(values)
    }

    fn parse_float(&mut self) -> Result<f32, QueryError> {
        let negative = self.eat(&Token::Minus);
        let cur = self.cur().clone();
        let value = match cur.token {
            Token::Float(v) => {
                self.advance();
                v as f32
            }
            Token::Int(v) => {
                self.advance();
                v as f32
            }
            other => {
                return Err(QueryError::parse(
                    format!("expected number, found {other:?}"),
                    cur.line,
                    cur.col,
                ))
            }
        };
        Ok(if negative { -value } else { value })
    }
}
