use log::debug;

use crate::{CompileError, CompileResult, Keyword, SourceLocation, Token, TokenKind};

/// Most argument registers the calling convention offers.
pub const MAX_CALL_ARGS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StmtId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Node<Kind> {
    pub kind: Kind,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(u64),
    Var(LocalId),

    Neg(ExprId),
    Addr(ExprId),
    Deref(ExprId),

    Add(ExprId, ExprId),
    Sub(ExprId, ExprId),
    Mul(ExprId, ExprId),
    Div(ExprId, ExprId),

    Eq(ExprId, ExprId),
    Ne(ExprId, ExprId),
    Lt(ExprId, ExprId),
    Lte(ExprId, ExprId),

    Assign(ExprId, ExprId),
    Call { name: String, args: Vec<ExprId> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(ExprId),
    Return(ExprId),
    If {
        cond: ExprId,
        then: StmtId,
        els: Option<StmtId>,
    },
    /// `for` and `while`. A missing condition loops forever.
    For {
        init: Option<ExprId>,
        cond: Option<ExprId>,
        inc: Option<ExprId>,
        body: StmtId,
    },
    Block(Vec<StmtId>),
}

pub type ExprNode = Node<ExprKind>;
pub type StmtNode = Node<StmtKind>;

/// Node storage. Children refer to each other by id, never by pointer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ast {
    exprs: Vec<ExprNode>,
    stmts: Vec<StmtNode>,
}

impl Ast {
    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.0]
    }

    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id.0]
    }

    fn push_expr(&mut self, kind: ExprKind, loc: SourceLocation) -> ExprId {
        self.exprs.push(Node { kind, loc });
        ExprId(self.exprs.len() - 1)
    }

    fn push_stmt(&mut self, kind: StmtKind, loc: SourceLocation) -> StmtId {
        self.stmts.push(Node { kind, loc });
        StmtId(self.stmts.len() - 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub name: String,
    /// Distance below %rbp. Zero until the frame is laid out.
    pub offset: usize,
}

/// The single implicit `main` function a program compiles to.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub ast: Ast,
    pub body: StmtId,
    /// In order of first appearance.
    pub locals: Vec<Local>,
    pub stack_size: usize,
}

impl Function {
    pub fn local(&self, id: LocalId) -> &Local {
        &self.locals[id.0]
    }
}

#[derive(Default)]
pub struct Parser {
    pub source: Vec<u8>,
    pub tokens: Vec<Token>,
    pub index: usize,
    ast: Ast,
    locals: Vec<Local>,
}

impl Parser {
    pub fn new(source: Vec<u8>, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            ..Default::default()
        }
    }

    // program = "{" compound-stmt
    pub fn parse(&mut self) -> CompileResult<Function> {
        self.skip("{")?;
        let body = self.compound_stmt()?;
        self.ensure_done()?;
        debug!(
            "parsed {} statements, {} expressions, {} locals",
            self.ast.stmts.len(),
            self.ast.exprs.len(),
            self.locals.len()
        );
        Ok(Function {
            ast: std::mem::take(&mut self.ast),
            body,
            locals: std::mem::take(&mut self.locals),
            stack_size: 0,
        })
    }

    // compound-stmt = stmt* "}"
    fn compound_stmt(&mut self) -> CompileResult<StmtId> {
        let loc = self.loc();
        let mut stmts = vec![];
        while !self.r#match("}") {
            stmts.push(self.stmt()?);
        }
        self.skip("}")?;
        Ok(self.ast.push_stmt(StmtKind::Block(stmts), loc))
    }

    // stmt = "return" expr ";"
    //      | "if" "(" expr ")" stmt ("else" stmt)?
    //      | "for" "(" expr? ";" expr? ";" expr? ")" stmt
    //      | "while" "(" expr ")" stmt
    //      | "{" compound-stmt
    //      | expr-stmt
    fn stmt(&mut self) -> CompileResult<StmtId> {
        let loc = self.loc();
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let node = self.expr()?;
                self.skip(";")?;
                Ok(self.ast.push_stmt(StmtKind::Return(node), loc))
            }
            TokenKind::Keyword(Keyword::If) => {
                self.advance();
                self.skip("(")?;
                let cond = self.expr()?;
                self.skip(")")?;
                let then = self.stmt()?;
                let els = if let TokenKind::Keyword(Keyword::Else) = self.peek().kind {
                    self.advance();
                    Some(self.stmt()?)
                } else {
                    None
                };
                Ok(self.ast.push_stmt(StmtKind::If { cond, then, els }, loc))
            }
            TokenKind::Keyword(Keyword::For) => {
                self.advance();
                self.skip("(")?;
                let init = self.opt_expr(";")?;
                self.skip(";")?;
                let cond = self.opt_expr(";")?;
                self.skip(";")?;
                let inc = self.opt_expr(")")?;
                self.skip(")")?;
                let body = self.stmt()?;
                Ok(self.ast.push_stmt(
                    StmtKind::For {
                        init,
                        cond,
                        inc,
                        body,
                    },
                    loc,
                ))
            }
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                self.skip("(")?;
                let cond = Some(self.expr()?);
                self.skip(")")?;
                let body = self.stmt()?;
                Ok(self.ast.push_stmt(
                    StmtKind::For {
                        init: None,
                        cond,
                        inc: None,
                        body,
                    },
                    loc,
                ))
            }
            _ if self.r#match("{") => {
                self.advance();
                self.compound_stmt()
            }
            _ => self.expr_stmt(),
        }
    }

    // expr-stmt = expr? ";"
    fn expr_stmt(&mut self) -> CompileResult<StmtId> {
        let loc = self.loc();
        if self.r#match(";") {
            self.advance();
            return Ok(self.ast.push_stmt(StmtKind::Block(vec![]), loc));
        }

        let node = self.expr()?;
        self.skip(";")?;
        Ok(self.ast.push_stmt(StmtKind::Expr(node), loc))
    }

    fn opt_expr(&mut self, terminator: &str) -> CompileResult<Option<ExprId>> {
        if self.r#match(terminator) {
            Ok(None)
        } else {
            self.expr().map(Some)
        }
    }

    // expr = assign
    fn expr(&mut self) -> CompileResult<ExprId> {
        self.assign()
    }

    // assign = equality ("=" assign)?
    fn assign(&mut self) -> CompileResult<ExprId> {
        let node = self.equality()?;
        if self.r#match("=") {
            let loc = self.loc();
            self.advance();
            let rhs = self.assign()?;
            return Ok(self.ast.push_expr(ExprKind::Assign(node, rhs), loc));
        }
        Ok(node)
    }

    // equality = relational ("==" relational | "!=" relational)*
    fn equality(&mut self) -> CompileResult<ExprId> {
        let mut node = self.relational()?;

        loop {
            let loc = self.loc();
            if self.r#match("==") {
                self.advance();
                let rhs = self.relational()?;
                node = self.ast.push_expr(ExprKind::Eq(node, rhs), loc);
            } else if self.r#match("!=") {
                self.advance();
                let rhs = self.relational()?;
                node = self.ast.push_expr(ExprKind::Ne(node, rhs), loc);
            } else {
                return Ok(node);
            }
        }
    }

    // relational = add ("<" add | "<=" add | ">" add | ">=" add)*
    //
    // `a > b` becomes `b < a` and `a >= b` becomes `b <= a`.
    fn relational(&mut self) -> CompileResult<ExprId> {
        let mut node = self.add()?;

        loop {
            let loc = self.loc();
            let kind = if self.r#match("<") {
                self.advance();
                ExprKind::Lt(node, self.add()?)
            } else if self.r#match("<=") {
                self.advance();
                ExprKind::Lte(node, self.add()?)
            } else if self.r#match(">") {
                self.advance();
                ExprKind::Lt(self.add()?, node)
            } else if self.r#match(">=") {
                self.advance();
                ExprKind::Lte(self.add()?, node)
            } else {
                return Ok(node);
            };
            node = self.ast.push_expr(kind, loc);
        }
    }

    // add = mul ("+" mul | "-" mul)*
    fn add(&mut self) -> CompileResult<ExprId> {
        let mut node = self.mul()?;

        loop {
            let loc = self.loc();
            if self.r#match("+") {
                self.advance();
                let rhs = self.mul()?;
                node = self.ast.push_expr(ExprKind::Add(node, rhs), loc);
            } else if self.r#match("-") {
                self.advance();
                let rhs = self.mul()?;
                node = self.ast.push_expr(ExprKind::Sub(node, rhs), loc);
            } else {
                return Ok(node);
            }
        }
    }

    // mul = unary ("*" unary | "/" unary)*
    fn mul(&mut self) -> CompileResult<ExprId> {
        let mut node = self.unary()?;

        loop {
            let loc = self.loc();
            if self.r#match("*") {
                self.advance();
                let rhs = self.unary()?;
                node = self.ast.push_expr(ExprKind::Mul(node, rhs), loc);
            } else if self.r#match("/") {
                self.advance();
                let rhs = self.unary()?;
                node = self.ast.push_expr(ExprKind::Div(node, rhs), loc);
            } else {
                return Ok(node);
            }
        }
    }

    // unary = ("+" | "-" | "&" | "*") unary
    //       | primary
    fn unary(&mut self) -> CompileResult<ExprId> {
        let loc = self.loc();

        if self.r#match("+") {
            self.advance();
            return self.unary();
        }
        let wrap: fn(ExprId) -> ExprKind = if self.r#match("-") {
            ExprKind::Neg
        } else if self.r#match("&") {
            ExprKind::Addr
        } else if self.r#match("*") {
            ExprKind::Deref
        } else {
            return self.primary();
        };
        self.advance();
        let operand = self.unary()?;
        Ok(self.ast.push_expr(wrap(operand), loc))
    }

    // primary = "(" expr ")" | ident func-args? | num
    fn primary(&mut self) -> CompileResult<ExprId> {
        let loc = self.loc();
        match self.peek().kind.clone() {
            TokenKind::Number(val) => {
                self.advance();
                Ok(self.ast.push_expr(ExprKind::Number(val), loc))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.r#match("(") {
                    return self.funcall(name, loc);
                }
                let var = self.find_or_declare(name);
                Ok(self.ast.push_expr(ExprKind::Var(var), loc))
            }
            _ if self.r#match("(") => {
                self.advance();
                let node = self.expr()?;
                self.skip(")")?;
                Ok(node)
            }
            _ => Err(self.error_tok(self.peek(), "expected an expression")),
        }
    }

    // func-args = "(" (assign ("," assign)*)? ")"
    fn funcall(&mut self, name: String, loc: SourceLocation) -> CompileResult<ExprId> {
        self.skip("(")?;
        let mut args = vec![];
        while !self.r#match(")") {
            if !args.is_empty() {
                self.skip(",")?;
            }
            if args.len() == MAX_CALL_ARGS {
                return Err(self.error_tok(self.peek(), "too many arguments"));
            }
            args.push(self.assign()?);
        }
        self.skip(")")?;
        Ok(self.ast.push_expr(ExprKind::Call { name, args }, loc))
    }

    // The first use of a name declares it.
    fn find_or_declare(&mut self, name: String) -> LocalId {
        if let Some(i) = self.locals.iter().rposition(|var| var.name == name) {
            return LocalId(i);
        }
        debug!("new local `{}`", name);
        self.locals.push(Local { name, offset: 0 });
        LocalId(self.locals.len() - 1)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index]
    }

    // Never steps past the Eof token.
    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }

    fn r#match(&self, s: &str) -> bool {
        let tok = self.peek();
        self.source
            .get(tok.loc.offset..tok.loc.offset + tok.length)
            .is_some_and(|text| text == s.as_bytes())
    }

    fn skip(&mut self, s: &str) -> CompileResult<()> {
        if !self.r#match(s) {
            return Err(self.error_tok(self.peek(), &format!("expected '{}'", s)));
        }
        self.advance();
        Ok(())
    }

    fn ensure_done(&self) -> CompileResult<()> {
        match self.peek().kind {
            TokenKind::Eof => Ok(()),
            _ => Err(self.error_tok(self.peek(), "extra token")),
        }
    }

    fn error_tok(&self, tok: &Token, msg: &str) -> CompileError {
        CompileError::syntax(tok.loc.offset, msg)
    }

    fn loc(&self) -> SourceLocation {
        self.peek().loc
    }
}
