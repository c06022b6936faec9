//! Recursive-descent parser producing `ast::Node` trees directly — no
//! separate CST. Binary and unary operators desugar straight to the method
//! calls the built-in classes actually implement (`add`, `sub`, `lt`, `!`,
//! ...) at parse time, the same way `desugar.rs` turns `Attribute` into a
//! zero-arg `Call`: by the time scope analysis sees the tree, there is no
//! operator syntax left to special-case.

use crate::ast::{Node, NodeIdGen};
use crate::error::{Error, Result};
use crate::syntax::lexer::{Lexer, Token};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    ids: NodeIdGen,
}

impl Parser {
    pub fn new(src: &str) -> Result<Self> {
        let tokens = Lexer::new(src).tokenize()?;
        Ok(Parser { tokens, pos: 0, ids: NodeIdGen::new() })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&Token::Eof)
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, want: &Token) -> Result<()> {
        if self.peek() == want {
            self.bump();
            Ok(())
        } else {
            Err(Error::Syntax(format!("expected `{want:?}`, found `{:?}`", self.peek())))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.bump() {
            Token::Ident(s) => Ok(s),
            other => Err(Error::Syntax(format!("expected identifier, found `{other:?}`"))),
        }
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == kw)
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Parses a whole program: a flat list of top-level statements.
    pub fn parse_program(mut self) -> Result<(Vec<Node>, NodeIdGen)> {
        let mut stmts = Vec::new();
        while *self.peek() != Token::Eof {
            stmts.push(self.parse_stmt()?);
            while self.peek() == &Token::Semicolon {
                self.bump();
            }
        }
        Ok((stmts, self.ids))
    }

    fn parse_block(&mut self) -> Result<Node> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while *self.peek() != Token::RBrace {
            stmts.push(self.parse_stmt()?);
            while self.peek() == &Token::Semicolon {
                self.bump();
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Node::Block(stmts))
    }

    fn parse_params(&mut self) -> Result<Vec<(String, u32)>> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        while *self.peek() != Token::RParen {
            let name = self.expect_ident()?;
            params.push((name, self.ids.next()));
            if self.peek() == &Token::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(params)
    }

    fn parse_stmt(&mut self) -> Result<Node> {
        if self.at_keyword("import") {
            return self.parse_import();
        }
        if self.at_keyword("class") {
            return self.parse_class();
        }
        if self.at_keyword("has") {
            return self.parse_has();
        }
        if self.at_keyword("def") {
            return self.parse_def();
        }
        self.parse_expr()
    }

    /// `import a.b.c` / `import .a.b.c`.
    fn parse_import(&mut self) -> Result<Node> {
        self.bump(); // "import"
        let mut path = String::new();
        if self.peek() == &Token::Dot {
            self.bump();
            path.push('.');
        }
        path.push_str(&self.expect_ident()?);
        while self.peek() == &Token::Dot {
            self.bump();
            path.push('.');
            path.push_str(&self.expect_ident()?);
        }
        Ok(Node::Import { path })
    }

    /// `class Name { ... }` / `class Name : Super { ... }`.
    fn parse_class(&mut self) -> Result<Node> {
        self.bump(); // "class"
        let name = self.expect_ident()?;
        let superclass = if self.peek() == &Token::Colon {
            self.bump();
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while *self.peek() != Token::RBrace {
            if self.at_keyword("def") {
                body.push(self.parse_def()?);
            } else if self.at_keyword("has") {
                body.push(self.parse_has()?);
            } else {
                return Err(Error::Syntax(format!(
                    "only `def`/`has` are allowed in a class body, found `{:?}`",
                    self.peek()
                )));
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Node::ClassDefinition { name, superclass, body })
    }

    /// `has @name`.
    /// `has @name` optionally followed by one `is trait` clause per trait.
    fn parse_has(&mut self) -> Result<Node> {
        self.bump(); // "has"
        self.expect(&Token::At)?;
        let name = self.expect_ident()?;
        let mut traits = Vec::new();
        while self.eat_keyword("is") {
            traits.push(self.expect_ident()?);
        }
        Ok(Node::Has { name, traits })
    }

    /// `def name(params) { body }`, optionally followed by `is "<op>"` to
    /// also register the method under an operator alias.
    fn parse_def(&mut self) -> Result<Node> {
        self.bump(); // "def"
        let name = self.expect_ident()?;
        let id = self.ids.next();
        let params = self.parse_params()?;
        let alias = if self.eat_keyword("is") {
            match self.bump() {
                Token::Str(op) => Some(op),
                other => return Err(Error::Syntax(format!("expected a string operator alias after `is`, found `{other:?}`"))),
            }
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(Node::Definition { id, name, params, alias, body: Box::new(body) })
    }

    fn parse_expr(&mut self) -> Result<Node> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Node> {
        let lhs = self.parse_or()?;
        if self.peek() == &Token::Eq {
            self.bump();
            let value = Box::new(self.parse_assignment()?);
            return match lhs {
                Node::Variable { name, .. } => Ok(Node::Assign { id: self.ids.next(), name, value }),
                Node::GetScoped(name) => Ok(Node::SetScoped(name, value)),
                Node::GetIvar(name) => Ok(Node::SetIvar(name, value)),
                other => Err(Error::Syntax(format!("`{other:?}` is not assignable"))),
            };
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut lhs = self.parse_and()?;
        while self.peek() == &Token::OrOr {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = binop(lhs, "||", rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut lhs = self.parse_equality()?;
        while self.peek() == &Token::AndAnd {
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = binop(lhs, "&&", rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Node> {
        let mut lhs = self.parse_relational()?;
        loop {
            let method = match self.peek() {
                Token::EqEq => "==",
                Token::NotEq => "!=",
                _ => break,
            };
            self.bump();
            let rhs = self.parse_relational()?;
            lhs = binop(lhs, method, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Node> {
        let mut lhs = self.parse_additive()?;
        loop {
            let method = match self.peek() {
                Token::Lt => "lt",
                Token::Gt => "gt",
                Token::Le => "lte",
                Token::Ge => "gte",
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = binop(lhs, method, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Node> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let method = match self.peek() {
                Token::Plus => "add",
                Token::Minus => "sub",
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = binop(lhs, method, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Node> {
        let mut lhs = self.parse_unary()?;
        loop {
            let method = match self.peek() {
                Token::Star => "mul",
                Token::Slash => "div",
                Token::Percent => "mod",
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = binop(lhs, method, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        match self.peek() {
            Token::Minus => {
                self.bump();
                let operand = self.parse_unary()?;
                Ok(Node::Call {
                    receiver: Box::new(operand),
                    method: "neg".to_string(),
                    args: Vec::new(),
                    kwargs: Vec::new(),
                })
            }
            Token::Bang => {
                self.bump();
                let operand = self.parse_unary()?;
                Ok(Node::Call {
                    receiver: Box::new(operand),
                    method: "!".to_string(),
                    args: Vec::new(),
                    kwargs: Vec::new(),
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Node> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.bump();
                    node = self.parse_dotted(node, false)?;
                }
                Token::Caret => {
                    self.bump();
                    self.expect(&Token::Dot)?;
                    node = self.parse_dotted(node, true)?;
                }
                Token::PlusPlus => {
                    self.bump();
                    node = self.desugar_increment(node)?;
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// Parses `.name` / `.name(args)` after the receiver has already been
    /// consumed. `up_call` selects `UpCall` over `Call`/`Attribute`.
    fn parse_dotted(&mut self, receiver: Node, up_call: bool) -> Result<Node> {
        let name = self.expect_ident()?;
        if self.peek() != &Token::LParen {
            if up_call {
                return Err(Error::Syntax("up-calls require an argument list".to_string()));
            }
            return Ok(Node::Attribute { receiver: Box::new(receiver), name });
        }
        let (args, kwargs) = self.parse_args()?;
        if up_call {
            if !kwargs.is_empty() {
                return Err(Error::Syntax("up-calls do not support keyword arguments".to_string()));
            }
            Ok(Node::UpCall { receiver: Box::new(receiver), method: name, args, kwargs })
        } else {
            Ok(Node::Call { receiver: Box::new(receiver), method: name, args, kwargs })
        }
    }

    /// `(a, b, name: c)` — trailing `ident: expr` pairs become keyword
    /// arguments, everything before them positional.
    fn parse_args(&mut self) -> Result<(Vec<Node>, Vec<(String, Node)>)> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while *self.peek() != Token::RParen {
            if let Token::Ident(name) = self.peek().clone() {
                if self.peek_at(1) == &Token::Colon {
                    self.bump();
                    self.bump();
                    let value = self.parse_expr()?;
                    kwargs.push((name, value));
                    if self.peek() == &Token::Comma {
                        self.bump();
                    }
                    continue;
                }
            }
            args.push(self.parse_expr()?);
            if self.peek() == &Token::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok((args, kwargs))
    }

    /// `name++` -> `name = name.add(1)`, only ever on a plain variable.
    fn desugar_increment(&mut self, node: Node) -> Result<Node> {
        let name = match node {
            Node::Variable { name, .. } => name,
            other => return Err(Error::Syntax(format!("`++` requires a variable, found `{other:?}`"))),
        };
        let read_id = self.ids.next();
        let assign_id = self.ids.next();
        let incremented = Node::Call {
            receiver: Box::new(Node::Variable { id: read_id, name: name.clone() }),
            method: "add".to_string(),
            args: vec![Node::Int(1)],
            kwargs: Vec::new(),
        };
        Ok(Node::Assign { id: assign_id, name, value: Box::new(incremented) })
    }

    /// Looks ahead from a `(` to decide whether it opens an arrow-lambda
    /// parameter list (`(p1, p2) => body`) rather than a parenthesized
    /// expression — both start with `(`, so the distinguishing signal is
    /// what follows the matching `)`.
    fn at_arrow_lambda_params(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.pos;
        loop {
            match self.tokens.get(i) {
                Some(Token::LParen) => depth += 1,
                Some(Token::RParen) => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(self.tokens.get(i + 1), Some(Token::FatArrow));
                    }
                }
                Some(Token::Eof) | None => return false,
                _ => {}
            }
            i += 1;
        }
    }

    fn parse_arrow_lambda(&mut self, id: u32, params: Vec<(String, u32)>) -> Result<Node> {
        self.expect(&Token::FatArrow)?;
        let body = Box::new(if *self.peek() == Token::LBrace {
            self.parse_block()?
        } else {
            self.parse_expr()?
        });
        Ok(Node::Lambda { id, params, body })
    }

    fn parse_primary(&mut self) -> Result<Node> {
        if *self.peek() == Token::LParen && self.at_arrow_lambda_params() {
            let id = self.ids.next();
            let params = self.parse_params()?;
            return self.parse_arrow_lambda(id, params);
        }
        match self.bump() {
            Token::Int(n) => Ok(Node::Int(n)),
            Token::Str(s) => Ok(Node::Str(s)),
            Token::Dollar => {
                let name = self.expect_ident()?;
                Ok(Node::GetScoped(name))
            }
            Token::At => {
                let name = self.expect_ident()?;
                Ok(Node::GetIvar(name))
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                while *self.peek() != Token::RBracket {
                    items.push(self.parse_expr()?);
                    if self.peek() == &Token::Comma {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect(&Token::RBracket)?;
                Ok(Node::ListLit(items))
            }
            Token::MapOpen => {
                let mut pairs = Vec::new();
                while *self.peek() != Token::RBrace {
                    let key = if let Token::Ident(name) = self.peek().clone() {
                        if self.peek_at(1) == &Token::Colon {
                            self.bump();
                            Node::Str(name)
                        } else {
                            self.parse_expr()?
                        }
                    } else {
                        self.parse_expr()?
                    };
                    self.expect(&Token::Colon)?;
                    let value = self.parse_expr()?;
                    pairs.push((key, value));
                    if self.peek() == &Token::Comma {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect(&Token::RBrace)?;
                Ok(Node::MapLit(pairs))
            }
            Token::Ident(name) => self.parse_ident_primary(name),
            other => Err(Error::Syntax(format!("unexpected token `{other:?}`"))),
        }
    }

    fn parse_ident_primary(&mut self, name: String) -> Result<Node> {
        match name.as_str() {
            "nil" => return Ok(Node::Nil),
            "true" => return Ok(Node::Bool(true)),
            "false" => return Ok(Node::Bool(false)),
            "self" => return Ok(Node::SelfExpr),
            "if" => return self.parse_if(),
            "while" => return self.parse_while(),
            _ => {}
        }
        if *self.peek() == Token::FatArrow {
            // `name => body` — a single-parameter lambda literal with no
            // parens around its parameter list.
            let id = self.ids.next();
            let param_id = self.ids.next();
            return self.parse_arrow_lambda(id, vec![(name, param_id)]);
        }
        if self.peek() == &Token::LParen {
            let (args, kwargs) = self.parse_args()?;
            if !kwargs.is_empty() {
                return Err(Error::Syntax("a bare call invokes a local lambda and takes no keyword arguments".to_string()));
            }
            let callee = Node::Variable { id: self.ids.next(), name };
            return Ok(Node::Invoke { callee: Box::new(callee), args });
        }
        Ok(Node::Variable { id: self.ids.next(), name })
    }

    fn parse_if(&mut self) -> Result<Node> {
        let cond = Box::new(self.parse_expr()?);
        let then_branch = Box::new(self.parse_block()?);
        let else_branch = if self.eat_keyword("else") {
            if self.at_keyword("if") {
                self.bump();
                Some(Box::new(self.parse_if()?))
            } else {
                Some(Box::new(self.parse_block()?))
            }
        } else {
            None
        };
        Ok(Node::If { cond, then_branch, else_branch })
    }

    fn parse_while(&mut self) -> Result<Node> {
        let cond = Box::new(self.parse_expr()?);
        let body = Box::new(self.parse_block()?);
        Ok(Node::While { cond, body })
    }
}

fn binop(lhs: Node, method: &str, rhs: Node) -> Node {
    Node::Call {
        receiver: Box::new(lhs),
        method: method.to_string(),
        args: vec![rhs],
        kwargs: Vec::new(),
    }
}

/// Parses a whole program from source text.
pub fn parse(src: &str) -> Result<(Vec<Node>, NodeIdGen)> {
    Parser::new(src)?.parse_program()
}
