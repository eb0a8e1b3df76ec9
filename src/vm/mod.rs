use std::collections::HashMap;
use std::io::{BufRead, Write};

use crate::bytecode::{Instruction, Opcode, Operand, OperandKind};
use crate::library::{self, LibraryFn};
use crate::loader::ConstantPool;
use crate::stack::{Stack, DEFAULT_STACK_SIZE};
use crate::value::MemCell;

mod arith;
mod branch;
mod call;
mod tables;

pub use arith::{modulo, ArithOp};
pub use branch::{equal, RelOp};

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("not a number in {op}: got {type_name}")]
    NotANumber { op: Opcode, type_name: &'static str },
    #[error("illegal use of {type_name} as table")]
    NotATable { type_name: &'static str },
    #[error("type mismatch in equality: {left} vs {right}")]
    TypeMismatch { left: &'static str, right: &'static str },
    #[error("undefined value involved in equality")]
    UndefinedInComparison,
    #[error("table key of type {type_name} is not supported")]
    UnsupportedKeyType { type_name: &'static str },
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack address {address} is outside the allocated region")]
    StackBounds { address: i64 },
    #[error("key not found: {key}")]
    KeyNotFound { key: String },
    #[error("unknown library function: {name}")]
    UnknownLibraryFunction { name: String, suggestion: Option<String> },
    #[error("cannot bind {type_name} to a function")]
    UnboundFunction { type_name: &'static str },
    #[error("operand of kind '{kind}' cannot be used as {role}")]
    InvalidOperand { kind: &'static str, role: &'static str },
    #[error("{pool} constant {index} does not exist")]
    ConstantOutOfRange { pool: &'static str, index: u32 },
    #[error("no user function starts at instruction {address}")]
    NoFunctionAt { address: usize },
    #[error("corrupt call environment at stack address {address}")]
    CorruptEnvironment { address: usize },
    #[error("program counter {pc} is past the end of code")]
    PcOutOfRange { pc: usize },
    #[error("{name}: {message}")]
    LibraryArgument { name: String, message: String },
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

impl VmError {
    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            VmError::NotANumber { .. } => "AVM-R001",
            VmError::NotATable { .. } => "AVM-R002",
            VmError::TypeMismatch { .. } => "AVM-R003",
            VmError::UndefinedInComparison => "AVM-R004",
            VmError::UnsupportedKeyType { .. } => "AVM-R005",
            VmError::StackOverflow => "AVM-R006",
            VmError::StackBounds { .. } => "AVM-R007",
            VmError::KeyNotFound { .. } => "AVM-R008",
            VmError::UnknownLibraryFunction { .. } => "AVM-R009",
            VmError::UnboundFunction { .. } => "AVM-R010",
            VmError::InvalidOperand { .. } => "AVM-R011",
            VmError::ConstantOutOfRange { .. } => "AVM-R012",
            VmError::NoFunctionAt { .. } => "AVM-R013",
            VmError::CorruptEnvironment { .. } => "AVM-R014",
            VmError::PcOutOfRange { .. } => "AVM-R015",
            VmError::LibraryArgument { .. } => "AVM-R016",
            VmError::Output(_) => "AVM-R017",
        }
    }
}

/// A fatal runtime error and where it happened.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExecError {
    pub pc: usize,
    /// Source line of the failing instruction, 0 when unknown.
    pub line: u32,
    #[source]
    pub error: VmError,
}

pub type VmResult<T> = Result<T, VmError>;

/// What happens to a `tablegetelem` whose key is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingKeyPolicy {
    #[default]
    Fatal,
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    pub stack_size: usize,
    pub missing_key: MissingKeyPolicy,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig { stack_size: DEFAULT_STACK_SIZE, missing_key: MissingKeyPolicy::Fatal }
    }
}

/// Scratch registers that hold materialized (read-only) operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reg {
    Ax = 0,
    Bx = 1,
    Cx = 2,
}

/// Where a resolved operand lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Loc {
    Stack(usize),
    RetVal,
    Reg(Reg),
}

/// Control transfer requested by an executor.
pub(crate) enum Flow {
    Next,
    Jump(usize),
}

pub struct Vm<'a> {
    pool: &'a ConstantPool,
    config: VmConfig,
    stack: Stack,
    retval: MemCell,
    regs: [MemCell; 3],
    pc: usize,
    total_actuals: usize,
    main_fp: usize,
    finished: bool,
    libraries: HashMap<String, LibraryFn>,
    input: Box<dyn BufRead + 'a>,
    output: Box<dyn Write + 'a>,
}

impl<'a> Vm<'a> {
    pub fn new(pool: &'a ConstantPool, config: VmConfig) -> VmResult<Self> {
        let stdin = std::io::BufReader::new(std::io::stdin());
        Vm::with_io(pool, config, Box::new(stdin), Box::new(std::io::stdout()))
    }

    pub fn with_io(
        pool: &'a ConstantPool,
        config: VmConfig,
        input: Box<dyn BufRead + 'a>,
        output: Box<dyn Write + 'a>,
    ) -> VmResult<Self> {
        let stack = Stack::new(config.stack_size, pool.total_globals)?;
        let main_fp = stack.fp();
        let mut vm = Vm {
            pool,
            config,
            stack,
            retval: MemCell::Undefined,
            regs: Default::default(),
            pc: 0,
            total_actuals: 0,
            main_fp,
            finished: false,
            libraries: HashMap::new(),
            input,
            output,
        };
        for (name, f) in library::STANDARD {
            vm.register_library(name, *f);
        }
        Ok(vm)
    }

    /// Registers (or replaces) the handler called for library function `name`.
    pub fn register_library(&mut self, name: &str, f: LibraryFn) {
        self.libraries.insert(name.to_string(), f);
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn top(&self) -> usize {
        self.stack.top()
    }

    pub fn frame_pointer(&self) -> usize {
        self.stack.fp()
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn retval(&self) -> &MemCell {
        &self.retval
    }

    pub fn set_retval(&mut self, value: MemCell) {
        self.retval = value;
    }

    pub fn global(&self, index: u32) -> VmResult<&MemCell> {
        let addr = self.stack.global_addr(index)?;
        self.stack.cell(addr)
    }

    pub(crate) fn output(&mut self) -> &mut (dyn Write + 'a) {
        &mut *self.output
    }

    pub(crate) fn input(&mut self) -> &mut (dyn BufRead + 'a) {
        &mut *self.input
    }

    // ── Fetch / decode / execute ──────────────────────────────────────

    /// Runs until the end of code or the first fatal error.
    pub fn run(&mut self) -> Result<(), ExecError> {
        while self.step()? {}
        self.output.flush().map_err(|e| ExecError { pc: self.pc, line: 0, error: e.into() })?;
        Ok(())
    }

    /// Executes one instruction. Returns `false` once execution has finished.
    pub fn step(&mut self) -> Result<bool, ExecError> {
        if self.finished {
            return Ok(false);
        }
        let pool = self.pool;
        if self.pc == pool.code.len() {
            self.finished = true;
            tracing::debug!("execution finished");
            return Ok(false);
        }
        let pc = self.pc;
        let instr = *pool.code.get(pc).ok_or(ExecError {
            pc,
            line: 0,
            error: VmError::PcOutOfRange { pc },
        })?;
        tracing::trace!(pc, op = %instr.opcode, top = self.stack.top(), fp = self.stack.fp(), "execute");
        match self.execute(&instr) {
            Ok(Flow::Next) => self.pc += 1,
            Ok(Flow::Jump(target)) if target <= pool.code.len() => self.pc = target,
            Ok(Flow::Jump(target)) => {
                return Err(ExecError { pc, line: instr.line, error: VmError::PcOutOfRange { pc: target } });
            }
            Err(error) => return Err(ExecError { pc, line: instr.line, error }),
        }
        Ok(true)
    }

    fn execute(&mut self, instr: &Instruction) -> VmResult<Flow> {
        match instr.opcode {
            Opcode::Assign => self.execute_assign(instr),
            Opcode::Add => self.execute_arithmetic(ArithOp::Add, instr),
            Opcode::Sub => self.execute_arithmetic(ArithOp::Sub, instr),
            Opcode::Mul => self.execute_arithmetic(ArithOp::Mul, instr),
            Opcode::Div => self.execute_arithmetic(ArithOp::Div, instr),
            Opcode::Mod => self.execute_arithmetic(ArithOp::Mod, instr),
            Opcode::Uminus => self.execute_uminus(instr),
            Opcode::And => self.execute_logical(instr, |a, b| a && b),
            Opcode::Or => self.execute_logical(instr, |a, b| a || b),
            Opcode::Not => self.execute_not(instr),
            Opcode::Jump => self.execute_jump(instr),
            Opcode::Jeq => self.execute_equality(instr, true),
            Opcode::Jne => self.execute_equality(instr, false),
            Opcode::Jle => self.execute_relational(RelOp::Le, instr),
            Opcode::Jge => self.execute_relational(RelOp::Ge, instr),
            Opcode::Jlt => self.execute_relational(RelOp::Lt, instr),
            Opcode::Jgt => self.execute_relational(RelOp::Gt, instr),
            Opcode::Call => self.execute_call(instr),
            Opcode::PushArg => self.execute_pusharg(instr),
            Opcode::FuncEnter => self.execute_funcenter(instr),
            Opcode::FuncExit => self.execute_funcexit(instr),
            Opcode::NewTable => self.execute_newtable(instr),
            Opcode::TableGetElem => self.execute_tablegetelem(instr),
            Opcode::TableSetElem => self.execute_tablesetelem(instr),
            Opcode::Nop => Ok(Flow::Next),
        }
    }

    fn execute_assign(&mut self, instr: &Instruction) -> VmResult<Flow> {
        let dst = self.slot(&instr.result)?;
        let src = self.translate(&instr.arg1, Reg::Ax)?;
        if dst != src {
            let value = self.cell(src)?.clone();
            crate::value::assign(self.cell_mut(dst)?, &value);
        }
        Ok(Flow::Next)
    }

    // ── Operand translation ───────────────────────────────────────────

    /// Resolves an operand that must name a writable cell.
    pub(crate) fn slot(&self, arg: &Operand) -> VmResult<Loc> {
        match arg.kind {
            OperandKind::Global => Ok(Loc::Stack(self.stack.global_addr(arg.value)?)),
            OperandKind::Local => Ok(Loc::Stack(self.stack.local_addr(arg.value)?)),
            OperandKind::Formal => Ok(Loc::Stack(self.stack.formal_addr(arg.value)?)),
            OperandKind::RetVal => Ok(Loc::RetVal),
            kind => Err(VmError::InvalidOperand { kind: kind.name(), role: "a destination" }),
        }
    }

    /// Resolves any value operand. Constants are materialized into `reg`.
    pub(crate) fn translate(&mut self, arg: &Operand, reg: Reg) -> VmResult<Loc> {
        if arg.kind.is_lvalue() {
            return self.slot(arg);
        }
        let pool = self.pool;
        let cell = match arg.kind {
            OperandKind::Number => MemCell::Number(pool.number(arg.value)?),
            OperandKind::String => MemCell::Str(pool.string(arg.value)?.to_string()),
            OperandKind::Bool => MemCell::Bool(arg.value != 0),
            OperandKind::Nil => MemCell::Nil,
            OperandKind::UserFunc => MemCell::UserFunc(pool.user_func(arg.value)?.address),
            OperandKind::LibFunc => MemCell::LibFunc(pool.lib_func(arg.value)?.to_string()),
            OperandKind::Absent => MemCell::Undefined,
            kind => return Err(VmError::InvalidOperand { kind: kind.name(), role: "a value" }),
        };
        self.regs[reg as usize] = cell;
        Ok(Loc::Reg(reg))
    }

    pub(crate) fn cell(&self, loc: Loc) -> VmResult<&MemCell> {
        match loc {
            Loc::Stack(addr) => self.stack.cell(addr),
            Loc::RetVal => Ok(&self.retval),
            Loc::Reg(r) => Ok(&self.regs[r as usize]),
        }
    }

    pub(crate) fn cell_mut(&mut self, loc: Loc) -> VmResult<&mut MemCell> {
        match loc {
            Loc::Stack(addr) => self.stack.cell_mut(addr),
            Loc::RetVal => Ok(&mut self.retval),
            Loc::Reg(r) => Ok(&mut self.regs[r as usize]),
        }
    }

    /// Resolves a jump target.
    pub(crate) fn label(&self, arg: &Operand) -> VmResult<usize> {
        match arg.kind {
            OperandKind::Label => Ok(arg.value as usize),
            kind => Err(VmError::InvalidOperand { kind: kind.name(), role: "a jump target" }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
