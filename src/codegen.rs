use log::{debug, trace};

use crate::{CompileError, CompileResult, ExprId, ExprKind, Function, SourceLocation, StmtId, StmtKind};

/// Scratch registers backing the operand stack, bottom first. %r12-%r15
/// are callee-saved and get spilled by the prologue.
const REGS: [&str; 6] = ["%r10", "%r11", "%r12", "%r13", "%r14", "%r15"];
const CALLEE_SAVED: [(&str, i64); 4] = [("%r12", -8), ("%r13", -16), ("%r14", -24), ("%r15", -32)];
const ARG_REGS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];
/// Pool members the callee may clobber.
const CALLER_SAVED: [&str; 2] = ["%r10", "%r11"];

macro_rules! emit {
    ($cg:expr, $($arg:tt)*) => {{
        $cg.out.push_str(&format!($($arg)*));
        $cg.out.push('\n');
    }};
}

/// Operand stack living in [`REGS`]. Every expression leaves exactly one
/// value on it.
#[derive(Debug, Default)]
pub struct RegisterStack {
    top: usize,
}

impl RegisterStack {
    pub const CAPACITY: usize = REGS.len();

    /// Claims the next free register.
    pub fn push(&mut self, loc: SourceLocation) -> CompileResult<&'static str> {
        if self.top == Self::CAPACITY {
            return Err(CompileError::Capacity {
                offset: loc.offset,
                capacity: Self::CAPACITY,
            });
        }
        let reg = REGS[self.top];
        self.top += 1;
        trace!("push {} (depth {})", reg, self.top);
        Ok(reg)
    }

    /// Releases the top register and returns its name.
    pub fn pop(&mut self) -> &'static str {
        assert!(self.top > 0, "register stack underflow");
        self.top -= 1;
        trace!("pop {} (depth {})", REGS[self.top], self.top);
        REGS[self.top]
    }

    pub fn top(&self) -> &'static str {
        assert!(self.top > 0, "register stack is empty");
        REGS[self.top - 1]
    }

    pub fn depth(&self) -> usize {
        self.top
    }
}

pub struct Codegen<'a> {
    pub func: &'a Function,
    pub regs: RegisterStack,
    pub label: usize,
    out: String,
}

impl<'a> Codegen<'a> {
    pub fn new(func: &'a Function) -> Self {
        Self {
            func,
            regs: RegisterStack::default(),
            label: 0,
            out: String::new(),
        }
    }

    pub fn program(&mut self) -> CompileResult<String> {
        emit!(self, ".globl main");
        emit!(self, "main:");

        emit!(self, "  push %rbp");
        emit!(self, "  mov %rsp, %rbp");
        emit!(self, "  sub ${}, %rsp", self.func.stack_size);
        for (reg, offset) in CALLEE_SAVED {
            emit!(self, "  mov {}, {}(%rbp)", reg, offset);
        }

        self.stmt(self.func.body)?;
        assert_eq!(self.regs.depth(), 0, "register stack not empty after body");

        emit!(self, ".L.return:");
        for (reg, offset) in CALLEE_SAVED.iter().rev() {
            emit!(self, "  mov {}(%rbp), {}", offset, reg);
        }
        emit!(self, "  mov %rbp, %rsp");
        emit!(self, "  pop %rbp");
        emit!(self, "  ret");

        debug!("emitted {} bytes of assembly", self.out.len());
        Ok(std::mem::take(&mut self.out))
    }

    fn count(&mut self) -> usize {
        self.label += 1;
        self.label
    }

    // Pushes the address `node` designates.
    fn addr(&mut self, node: ExprId) -> CompileResult<()> {
        let func = self.func;
        let expr = func.ast.expr(node);
        match expr.kind {
            ExprKind::Var(var) => {
                let reg = self.regs.push(expr.loc)?;
                emit!(self, "  lea -{}(%rbp), {}", func.local(var).offset, reg);
                Ok(())
            }
            ExprKind::Deref(inner) => self.expr(inner),
            _ => Err(CompileError::NotAnLvalue {
                offset: expr.loc.offset,
            }),
        }
    }

    fn load(&mut self) {
        let reg = self.regs.top();
        emit!(self, "  mov ({}), {}", reg, reg);
    }

    // Stores the value below the top through the address on top, leaving
    // the value.
    fn store(&mut self) {
        let addr = self.regs.pop();
        let val = self.regs.top();
        emit!(self, "  mov {}, ({})", val, addr);
    }

    fn stmt(&mut self, node: StmtId) -> CompileResult<()> {
        let func = self.func;
        match func.ast.stmt(node).kind {
            StmtKind::Expr(lhs) => {
                self.expr(lhs)?;
                self.regs.pop();
            }
            StmtKind::Return(lhs) => {
                self.expr(lhs)?;
                let reg = self.regs.pop();
                emit!(self, "  mov {}, %rax", reg);
                emit!(self, "  jmp .L.return");
            }
            StmtKind::If { cond, then, els } => {
                let c = self.count();
                trace!("if: labels .L.else.{c} / .L.end.{c}");
                self.expr(cond)?;
                let reg = self.regs.pop();
                emit!(self, "  cmp $0, {}", reg);
                emit!(self, "  je .L.else.{}", c);
                self.stmt(then)?;
                emit!(self, "  jmp .L.end.{}", c);
                emit!(self, ".L.else.{}:", c);
                if let Some(els) = els {
                    self.stmt(els)?;
                }
                emit!(self, ".L.end.{}:", c);
            }
            StmtKind::For {
                init,
                cond,
                inc,
                body,
            } => {
                let c = self.count();
                trace!("loop: labels .L.begin.{c} / .L.break.{c}");
                if let Some(init) = init {
                    self.expr(init)?;
                    self.regs.pop();
                }
                emit!(self, ".L.begin.{}:", c);
                if let Some(cond) = cond {
                    self.expr(cond)?;
                    let reg = self.regs.pop();
                    emit!(self, "  cmp $0, {}", reg);
                    emit!(self, "  je .L.break.{}", c);
                }
                self.stmt(body)?;
                if let Some(inc) = inc {
                    self.expr(inc)?;
                    self.regs.pop();
                }
                emit!(self, "  jmp .L.begin.{}", c);
                emit!(self, ".L.break.{}:", c);
            }
            StmtKind::Block(ref stmts) => {
                for &stmt in stmts {
                    self.stmt(stmt)?;
                    assert_eq!(self.regs.depth(), 0, "value leaked across statements");
                }
            }
        }
        Ok(())
    }

    fn expr(&mut self, node: ExprId) -> CompileResult<()> {
        let func = self.func;
        let expr = func.ast.expr(node);
        let loc = expr.loc;
        let (lhs, rhs) = match &expr.kind {
            ExprKind::Number(val) => {
                let reg = self.regs.push(loc)?;
                emit!(self, "  mov ${}, {}", val, reg);
                return Ok(());
            }
            ExprKind::Var(_) => {
                self.addr(node)?;
                self.load();
                return Ok(());
            }
            ExprKind::Addr(inner) => return self.addr(*inner),
            ExprKind::Deref(inner) => {
                self.expr(*inner)?;
                self.load();
                return Ok(());
            }
            ExprKind::Neg(inner) => {
                self.expr(*inner)?;
                emit!(self, "  neg {}", self.regs.top());
                return Ok(());
            }
            ExprKind::Assign(lhs, rhs) => {
                self.expr(*rhs)?;
                self.addr(*lhs)?;
                self.store();
                return Ok(());
            }
            ExprKind::Call { name, args } => return self.funcall(name, args, loc),
            ExprKind::Add(l, r)
            | ExprKind::Sub(l, r)
            | ExprKind::Mul(l, r)
            | ExprKind::Div(l, r)
            | ExprKind::Eq(l, r)
            | ExprKind::Ne(l, r)
            | ExprKind::Lt(l, r)
            | ExprKind::Lte(l, r) => (*l, *r),
        };

        self.expr(lhs)?;
        self.expr(rhs)?;
        let rs = self.regs.pop();
        let rd = self.regs.top();

        match expr.kind {
            ExprKind::Add(..) => emit!(self, "  add {}, {}", rs, rd),
            ExprKind::Sub(..) => emit!(self, "  sub {}, {}", rs, rd),
            ExprKind::Mul(..) => emit!(self, "  imul {}, {}", rs, rd),
            ExprKind::Div(..) => {
                emit!(self, "  mov {}, %rax", rd);
                emit!(self, "  cqo");
                emit!(self, "  idiv {}", rs);
                emit!(self, "  mov %rax, {}", rd);
            }
            ExprKind::Eq(..) => self.compare("sete", rs, rd),
            ExprKind::Ne(..) => self.compare("setne", rs, rd),
            ExprKind::Lt(..) => self.compare("setl", rs, rd),
            ExprKind::Lte(..) => self.compare("setle", rs, rd),
            _ => unreachable!("not a binary expression"),
        }
        Ok(())
    }

    fn compare(&mut self, set: &str, rs: &str, rd: &str) {
        emit!(self, "  cmp {}, {}", rs, rd);
        emit!(self, "  {} %al", set);
        emit!(self, "  movzb %al, {}", rd);
    }

    fn funcall(&mut self, name: &str, args: &[ExprId], loc: SourceLocation) -> CompileResult<()> {
        assert!(args.len() <= ARG_REGS.len(), "too many call arguments");
        for &arg in args {
            self.expr(arg)?;
        }
        for i in (0..args.len()).rev() {
            let reg = self.regs.pop();
            emit!(self, "  mov {}, {}", reg, ARG_REGS[i]);
        }

        for reg in CALLER_SAVED {
            emit!(self, "  push {}", reg);
        }
        emit!(self, "  mov $0, %rax");
        emit!(self, "  call {}", name);
        for reg in CALLER_SAVED.iter().rev() {
            emit!(self, "  pop {}", reg);
        }

        let reg = self.regs.push(loc)?;
        emit!(self, "  mov %rax, {}", reg);
        Ok(())
    }
}
