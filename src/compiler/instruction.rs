// Three-address instructions for the target stack machine

use std::fmt;

/// Supported three-address operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Mul,
    Sub,
    Eq,
    Lt,
    Assign,
    Jpf,
    Jp,
    Print,
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Add => "ADD",
            Op::Mul => "MUL",
            Op::Sub => "SUB",
            Op::Eq => "EQ",
            Op::Lt => "LT",
            Op::Assign => "ASSIGN",
            Op::Jpf => "JPF",
            Op::Jp => "JP",
            Op::Print => "PRINT",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Addressing mode of a single instruction operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// `#k`: the value k itself
    Immediate(i32),
    /// `a`: the word stored at address a
    Direct(u32),
    /// `@a`: the word stored at the address held in a
    Indirect(u32),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Immediate(value) => write!(f, "#{}", value),
            Operand::Direct(addr) => write!(f, "{}", addr),
            Operand::Indirect(addr) => write!(f, "@{}", addr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub a: Option<Operand>,
    pub b: Option<Operand>,
    pub c: Option<Operand>,
}

impl Instruction {
    fn new(op: Op, a: Option<Operand>, b: Option<Operand>, c: Option<Operand>) -> Self {
        Instruction { op, a, b, c }
    }

    pub fn add(a: Operand, b: Operand, dst: Operand) -> Self {
        Self::new(Op::Add, Some(a), Some(b), Some(dst))
    }

    pub fn mul(a: Operand, b: Operand, dst: Operand) -> Self {
        Self::new(Op::Mul, Some(a), Some(b), Some(dst))
    }

    pub fn sub(a: Operand, b: Operand, dst: Operand) -> Self {
        Self::new(Op::Sub, Some(a), Some(b), Some(dst))
    }

    pub fn eq(a: Operand, b: Operand, dst: Operand) -> Self {
        Self::new(Op::Eq, Some(a), Some(b), Some(dst))
    }

    pub fn lt(a: Operand, b: Operand, dst: Operand) -> Self {
        Self::new(Op::Lt, Some(a), Some(b), Some(dst))
    }

    pub fn assign(src: Operand, dst: Operand) -> Self {
        Self::new(Op::Assign, Some(src), Some(dst), None)
    }

    /// Jump to `target` when `cond` is zero
    pub fn jpf(cond: Operand, target: usize) -> Self {
        Self::new(Op::Jpf, Some(cond), Some(Operand::Direct(target as u32)), None)
    }

    pub fn jp(target: usize) -> Self {
        Self::new(Op::Jp, Some(Operand::Direct(target as u32)), None, None)
    }

    /// Jump to the address stored in `target`
    pub fn jp_indirect(target: Operand) -> Self {
        Self::new(Op::Jp, Some(target), None, None)
    }

    pub fn print(value: Operand) -> Self {
        Self::new(Op::Print, Some(value), None, None)
    }

    /// Direct branch target of a `JP`/`JPF`, if any
    pub fn jump_target(&self) -> Option<usize> {
        let operand = match self.op {
            Op::Jp => self.a,
            Op::Jpf => self.b,
            _ => None,
        };
        match operand {
            Some(Operand::Direct(target)) => Some(target as usize),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let render = |operand: &Option<Operand>| match operand {
            Some(op) => op.to_string(),
            None => String::new(),
        };
        write!(
            f,
            "({}, {}, {}, {})",
            self.op,
            render(&self.a),
            render(&self.b),
            render(&self.c)
        )
    }
}

/// `<pc>\t(<OP>, a, b, c)`, one instruction per line
pub fn render_listing(instructions: &[Instruction]) -> String {
    let mut out = String::new();
    for (pc, instr) in instructions.iter().enumerate() {
        out.push_str(&format!("{}\t{}\n", pc, instr));
    }
    out
}
