//! Recursive-descent parser: token stream -> [`AlgebraNode`].

use super::error::ParseError;
use super::lexer::{Lexer, Token};
use crate::algebra::{
    AlgebraNode, BinaryOp, Expr, FunctionCall, Modifiers, QueryForm, TriplePattern, UnaryOp,
    RDF_TYPE,
};
use crate::term::Term;
use std::collections::HashMap;

pub struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    prefixes: HashMap<String, String>,
}

const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";

impl Parser {
    pub fn parse(source: &str) -> Result<AlgebraNode, ParseError> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            prefixes: HashMap::new(),
        };
        parser.parse_query()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn peek_pos(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ParseError> {
        match self.peek() {
            Token::Punct(p) if *p == c => {
                self.bump();
                Ok(())
            }
            other => Err(ParseError::UnexpectedToken {
                found: format!("{other:?}"),
                pos: self.peek_pos(),
                expected: format!("'{c}'"),
            }),
        }
    }

    fn ident_is(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case(kw))
    }

    fn bump_ident_kw(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.ident_is(kw) {
            self.bump();
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                found: format!("{:?}", self.peek()),
                pos: self.peek_pos(),
                expected: kw.to_string(),
            })
        }
    }

    fn parse_query(&mut self) -> Result<AlgebraNode, ParseError> {
        self.parse_prologue()?;

        if self.ident_is("SELECT") {
            self.parse_select()
        } else if self.ident_is("ASK") {
            self.parse_ask()
        } else if self.ident_is("CONSTRUCT") {
            self.parse_construct()
        } else {
            Err(ParseError::Unsupported(
                "expected SELECT, ASK, or CONSTRUCT".into(),
            ))
        }
    }

    fn parse_prologue(&mut self) -> Result<(), ParseError> {
        loop {
            if self.ident_is("PREFIX") {
                self.bump();
                let (prefix_label, ) = match self.bump() {
                    Token::PrefixedName(p, l) if l.is_empty() => (p,),
                    Token::Ident(p) => (p,),
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            found: format!("{other:?}"),
                            pos: self.peek_pos(),
                            expected: "prefix label followed by ':'".into(),
                        })
                    }
                };
                let iri = match self.bump() {
                    Token::Iri(i) => i,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            found: format!("{other:?}"),
                            pos: self.peek_pos(),
                            expected: "<iri>".into(),
                        })
                    }
                };
                self.prefixes.insert(prefix_label, iri);
            } else if self.ident_is("BASE") {
                self.bump();
                self.bump(); // the <iri>
            } else {
                break;
            }
        }
        Ok(())
    }

    fn parse_select(&mut self) -> Result<AlgebraNode, ParseError> {
        self.bump_ident_kw("SELECT")?;
        let distinct = if self.ident_is("DISTINCT") {
            self.bump();
            true
        } else {
            if self.ident_is("REDUCED") {
                self.bump();
            }
            false
        };

        let mut explicit_vars: Option<Vec<String>> = None;
        if matches!(self.peek(), Token::Punct('*')) {
            self.bump();
        } else {
            let mut vars = Vec::new();
            while let Token::Variable(_) = self.peek() {
                if let Token::Variable(v) = self.bump() {
                    vars.push(v);
                }
            }
            explicit_vars = Some(vars);
        }

        self.skip_dataset_clauses()?;
        self.bump_ident_kw("WHERE")?;
        self.expect_punct('{')?;
        let pattern = self.parse_group_graph_pattern()?;
        self.expect_punct('}')?;

        let vars = explicit_vars.unwrap_or_else(|| {
            let mut v: Vec<String> = pattern.variables().into_iter().collect();
            v.sort();
            v
        });

        let mut modifiers = Modifiers {
            distinct,
            ..Default::default()
        };
        self.parse_solution_modifiers(&mut modifiers)?;

        Ok(AlgebraNode::Project {
            vars,
            child: Box::new(pattern),
            modifiers,
            form: QueryForm::Select,
            template: Vec::new(),
        })
    }

    fn parse_ask(&mut self) -> Result<AlgebraNode, ParseError> {
        self.bump_ident_kw("ASK")?;
        self.skip_dataset_clauses()?;
        self.bump_ident_kw("WHERE")?;
        self.expect_punct('{')?;
        let pattern = self.parse_group_graph_pattern()?;
        self.expect_punct('}')?;
        let vars: Vec<String> = {
            let mut v: Vec<String> = pattern.variables().into_iter().collect();
            v.sort();
            v
        };
        Ok(AlgebraNode::Project {
            vars,
            child: Box::new(pattern),
            modifiers: Modifiers::default(),
            form: QueryForm::Ask,
            template: Vec::new(),
        })
    }

    fn parse_construct(&mut self) -> Result<AlgebraNode, ParseError> {
        self.bump_ident_kw("CONSTRUCT")?;
        self.expect_punct('{')?;
        let template = self.parse_triple_block()?;
        self.expect_punct('}')?;
        self.skip_dataset_clauses()?;
        self.bump_ident_kw("WHERE")?;
        self.expect_punct('{')?;
        let pattern = self.parse_group_graph_pattern()?;
        self.expect_punct('}')?;

        let mut modifiers = Modifiers::default();
        self.parse_solution_modifiers(&mut modifiers)?;

        let vars: Vec<String> = {
            let mut v: Vec<String> = pattern.variables().into_iter().collect();
            v.sort();
            v
        };

        Ok(AlgebraNode::Project {
            vars,
            child: Box::new(pattern),
            modifiers,
            form: QueryForm::Construct,
            template,
        })
    }

    fn skip_dataset_clauses(&mut self) -> Result<(), ParseError> {
        while self.ident_is("FROM") {
            return Err(ParseError::GraphClauseUnsupported);
        }
        Ok(())
    }

    fn parse_solution_modifiers(&mut self, modifiers: &mut Modifiers) -> Result<(), ParseError> {
        if self.ident_is("ORDER") {
            self.bump();
            self.bump_ident_kw("BY")?;
            loop {
                let descending = if self.ident_is("DESC") {
                    self.bump();
                    true
                } else if self.ident_is("ASC") {
                    self.bump();
                    false
                } else {
                    false
                };
                match self.peek().clone() {
                    Token::Variable(v) => {
                        self.bump();
                        modifiers.order_by.push((v, descending));
                    }
                    Token::Punct('(') => {
                        self.bump();
                        if let Token::Variable(v) = self.bump() {
                            modifiers.order_by.push((v, descending));
                        }
                        self.expect_punct(')')?;
                    }
                    _ => break,
                }
                if !matches!(self.peek(), Token::Variable(_) | Token::Punct('(')) {
                    break;
                }
            }
        }
        if self.ident_is("LIMIT") {
            self.bump();
            modifiers.limit = Some(self.parse_unsigned_int()?);
        }
        if self.ident_is("OFFSET") {
            self.bump();
            modifiers.offset = Some(self.parse_unsigned_int()?);
        }
        Ok(())
    }

    fn parse_unsigned_int(&mut self) -> Result<u64, ParseError> {
        match self.bump() {
            Token::Number(n) => n.parse().map_err(|_| ParseError::MalformedTerm(n)),
            other => Err(ParseError::UnexpectedToken {
                found: format!("{other:?}"),
                pos: self.peek_pos(),
                expected: "an integer".into(),
            }),
        }
    }

    fn parse_group_graph_pattern(&mut self) -> Result<AlgebraNode, ParseError> {
        let mut triples = Vec::new();
        let mut filters = Vec::new();
        let mut joins: Vec<AlgebraNode> = Vec::new();
        let mut optionals: Vec<AlgebraNode> = Vec::new();

        loop {
            match self.peek().clone() {
                Token::Punct('}') => break,
                Token::Punct('{') => {
                    self.bump();
                    let block = self.parse_group_graph_pattern()?;
                    self.expect_punct('}')?;

                    if self.ident_is("UNION") {
                        let mut alts = vec![block];
                        while self.ident_is("UNION") {
                            self.bump();
                            self.expect_punct('{')?;
                            alts.push(self.parse_group_graph_pattern()?);
                            self.expect_punct('}')?;
                        }
                        joins.push(AlgebraNode::Union(alts));
                    } else {
                        joins.push(block);
                    }
                }
                Token::Ident(kw) if kw.eq_ignore_ascii_case("OPTIONAL") => {
                    self.bump();
                    self.expect_punct('{')?;
                    let opt = self.parse_group_graph_pattern()?;
                    self.expect_punct('}')?;
                    optionals.push(opt);
                }
                Token::Ident(kw) if kw.eq_ignore_ascii_case("FILTER") => {
                    self.bump();
                    filters.push(self.parse_filter_expr()?);
                }
                Token::Ident(kw) if kw.eq_ignore_ascii_case("GRAPH") => {
                    return Err(ParseError::GraphClauseUnsupported)
                }
                Token::Eof => {
                    return Err(ParseError::UnexpectedEof {
                        expected: "'}'".into(),
                    })
                }
                _ => {
                    let mut block_triples = self.parse_triple_block()?;
                    triples.append(&mut block_triples);
                }
            }
        }

        let mut children = Vec::new();
        let include_bgp =
            !triples.is_empty() || !filters.is_empty() || (joins.is_empty() && optionals.is_empty());
        if include_bgp {
            children.push(AlgebraNode::Bgp { triples, filters });
        }
        children.extend(joins);

        let mut result = if children.len() == 1 {
            children.into_iter().next().unwrap()
        } else {
            AlgebraNode::Join(children)
        };

        for opt in optionals {
            result = AlgebraNode::Optional {
                required: Box::new(result),
                optional: Box::new(opt),
            };
        }

        Ok(result)
    }

    /// Parses `subject predicate object (; predicate object)* (, object)*
    /// . ...` up to (but not consuming) the closing `}`.
    fn parse_triple_block(&mut self) -> Result<Vec<TriplePattern>, ParseError> {
        let mut triples = Vec::new();
        loop {
            if matches!(self.peek(), Token::Punct('}')) {
                break;
            }
            let subject = self.parse_term()?;
            let predicate = self.parse_predicate()?;
            let object = self.parse_term()?;
            triples.push(TriplePattern::new(subject.clone(), predicate.clone(), object));

            loop {
                match self.peek() {
                    Token::Punct(',') => {
                        self.bump();
                        let object = self.parse_term()?;
                        triples.push(TriplePattern::new(subject.clone(), predicate.clone(), object));
                    }
                    _ => break,
                }
            }

            if matches!(self.peek(), Token::Punct(';')) {
                self.bump();
                loop {
                    let predicate = self.parse_predicate()?;
                    let object = self.parse_term()?;
                    triples.push(TriplePattern::new(subject.clone(), predicate.clone(), object));
                    loop {
                        match self.peek() {
                            Token::Punct(',') => {
                                self.bump();
                                let object = self.parse_term()?;
                                triples.push(TriplePattern::new(
                                    subject.clone(),
                                    predicate.clone(),
                                    object,
                                ));
                            }
                            _ => break,
                        }
                    }
                    if matches!(self.peek(), Token::Punct(';')) {
                        self.bump();
                        continue;
                    }
                    break;
                }
            }

            if matches!(self.peek(), Token::Punct('.')) {
                self.bump();
                continue;
            }
            break;
        }
        Ok(triples)
    }

    fn parse_predicate(&mut self) -> Result<Term, ParseError> {
        if matches!(self.peek(), Token::A) {
            self.bump();
            return Ok(Term::Iri(RDF_TYPE.to_string()));
        }
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        match self.bump() {
            Token::Variable(v) => Ok(Term::Variable(v)),
            Token::Iri(i) => Ok(Term::Iri(i)),
            Token::PrefixedName(p, l) => self.expand_prefixed(&p, &l).map(Term::Iri),
            Token::StringLiteral(lexical) => {
                if matches!(self.peek(), Token::Caret) {
                    self.bump();
                    let dt = match self.bump() {
                        Token::Iri(i) => i,
                        Token::PrefixedName(p, l) => self.expand_prefixed(&p, &l)?,
                        other => {
                            return Err(ParseError::UnexpectedToken {
                                found: format!("{other:?}"),
                                pos: self.peek_pos(),
                                expected: "datatype IRI".into(),
                            })
                        }
                    };
                    Ok(Term::Literal {
                        lexical,
                        datatype: Some(dt),
                        language: None,
                    })
                } else if let Token::LangTag(tag) = self.peek().clone() {
                    self.bump();
                    Ok(Term::Literal {
                        lexical,
                        datatype: None,
                        language: Some(tag),
                    })
                } else {
                    Ok(Term::Literal {
                        lexical,
                        datatype: None,
                        language: None,
                    })
                }
            }
            Token::Number(n) => {
                let dt = if n.contains('.') {
                    XSD_DECIMAL
                } else {
                    XSD_INTEGER
                };
                Ok(Term::typed_literal(n, dt))
            }
            other => Err(ParseError::UnexpectedToken {
                found: format!("{other:?}"),
                pos: self.peek_pos(),
                expected: "a term".into(),
            }),
        }
    }

    fn expand_prefixed(&self, prefix: &str, local: &str) -> Result<String, ParseError> {
        let base = self
            .prefixes
            .get(prefix)
            .ok_or_else(|| ParseError::UnknownPrefix(prefix.to_string()))?;
        Ok(format!("{base}{local}"))
    }

    // --- Filter expressions ---------------------------------------------
    //
    // Precedence (low to high): Or < And < Comparison < Additive < Unary < Primary.

    fn parse_filter_expr(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Token::Punct('(')) {
            self.bump();
            let e = self.parse_or_expr()?;
            self.expect_punct(')')?;
            Ok(e)
        } else {
            self.parse_or_expr()
        }
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while matches!(self.peek(), Token::Op(op) if op == "||") {
            self.bump();
            let right = self.parse_and_expr()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison_expr()?;
        while matches!(self.peek(), Token::Op(op) if op == "&&") {
            self.bump();
            let right = self.parse_comparison_expr()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive_expr()?;
        let op = match self.peek() {
            Token::Op(op) => match op.as_str() {
                "=" => Some(BinaryOp::Eq),
                "!=" => Some(BinaryOp::Ne),
                "<" => Some(BinaryOp::Lt),
                "<=" => Some(BinaryOp::Le),
                ">" => Some(BinaryOp::Gt),
                ">=" => Some(BinaryOp::Ge),
                _ => None,
            },
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let right = self.parse_additive_expr()?;
            Ok(Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })
        } else {
            Ok(left)
        }
    }

    fn parse_additive_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek() {
                Token::Op(op) => match op.as_str() {
                    "+" => Some(BinaryOp::Add),
                    "-" => Some(BinaryOp::Sub),
                    "/" => Some(BinaryOp::Div),
                    _ => None,
                },
                _ => None,
            };
            match op {
                Some(op) => {
                    self.bump();
                    let right = self.parse_unary_expr()?;
                    left = Expr::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
                None => break,
            }
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Token::Op(op) if op == "!" => {
                self.bump();
                let inner = self.parse_unary_expr()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    arg: Box::new(inner),
                })
            }
            Token::Op(op) if op == "-" => {
                self.bump();
                let inner = self.parse_unary_expr()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    arg: Box::new(inner),
                })
            }
            _ => self.parse_primary_expr(),
        }
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Token::Punct('(')) {
            self.bump();
            let e = self.parse_or_expr()?;
            self.expect_punct(')')?;
            return Ok(e);
        }
        if let Token::Ident(name) = self.peek().clone() {
            if matches!(self.tokens.get(self.pos + 1).map(|(t, _)| t), Some(Token::Punct('('))) {
                self.bump();
                self.bump(); // '('
                let mut args = Vec::new();
                if !matches!(self.peek(), Token::Punct(')')) {
                    args.push(self.parse_or_expr()?);
                    while matches!(self.peek(), Token::Punct(',')) {
                        self.bump();
                        args.push(self.parse_or_expr()?);
                    }
                }
                self.expect_punct(')')?;
                return Ok(Expr::Call(FunctionCall { name, args }));
            }
        }
        self.parse_term().map(Expr::Term)
    }
}
