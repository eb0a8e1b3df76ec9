use serde::Serialize;

// ── Opcodes ──────────────────────────────────────────────────────────
//
// Discriminants are the wire codes written by the compiler.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    Assign = 0,
    Add = 1,
    Sub = 2,
    Mul = 3,
    Div = 4,
    Mod = 5,
    Uminus = 6,
    And = 7,
    Or = 8,
    Not = 9,
    Jump = 10,
    Jeq = 11,
    Jne = 12,
    Jle = 13,
    Jge = 14,
    Jlt = 15,
    Jgt = 16,
    Call = 17,
    PushArg = 18,
    FuncEnter = 19,
    FuncExit = 20,
    NewTable = 21,
    TableGetElem = 22,
    TableSetElem = 23,
    Nop = 24,
}

impl Opcode {
    const ALL: [Opcode; 25] = [
        Opcode::Assign,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Uminus,
        Opcode::And,
        Opcode::Or,
        Opcode::Not,
        Opcode::Jump,
        Opcode::Jeq,
        Opcode::Jne,
        Opcode::Jle,
        Opcode::Jge,
        Opcode::Jlt,
        Opcode::Jgt,
        Opcode::Call,
        Opcode::PushArg,
        Opcode::FuncEnter,
        Opcode::FuncExit,
        Opcode::NewTable,
        Opcode::TableGetElem,
        Opcode::TableSetElem,
        Opcode::Nop,
    ];

    pub fn from_code(code: u32) -> Option<Opcode> {
        Opcode::ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Assign => "assign",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Mod => "mod",
            Opcode::Uminus => "uminus",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Not => "not",
            Opcode::Jump => "jump",
            Opcode::Jeq => "jeq",
            Opcode::Jne => "jne",
            Opcode::Jle => "jle",
            Opcode::Jge => "jge",
            Opcode::Jlt => "jlt",
            Opcode::Jgt => "jgt",
            Opcode::Call => "call",
            Opcode::PushArg => "pusharg",
            Opcode::FuncEnter => "funcenter",
            Opcode::FuncExit => "funcexit",
            Opcode::NewTable => "newtable",
            Opcode::TableGetElem => "tablegetelem",
            Opcode::TableSetElem => "tablesetelem",
            Opcode::Nop => "nop",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Operands ─────────────────────────────────────────────────────────

/// Addressing mode of an instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperandKind {
    /// Absolute instruction index.
    Label = 0,
    /// Slot counted downward from the high end of the stack.
    Global = 1,
    /// Slot counted upward past the environment header of the frame.
    Formal = 2,
    /// Slot counted downward from the frame pointer.
    Local = 3,
    Number = 4,
    String = 5,
    Bool = 6,
    Nil = 7,
    UserFunc = 8,
    LibFunc = 9,
    RetVal = 10,
    Absent = 11,
}

impl OperandKind {
    pub fn from_code(code: u32) -> Option<OperandKind> {
        Some(match code {
            0 => OperandKind::Label,
            1 => OperandKind::Global,
            2 => OperandKind::Formal,
            3 => OperandKind::Local,
            4 => OperandKind::Number,
            5 => OperandKind::String,
            6 => OperandKind::Bool,
            7 => OperandKind::Nil,
            8 => OperandKind::UserFunc,
            9 => OperandKind::LibFunc,
            10 => OperandKind::RetVal,
            11 => OperandKind::Absent,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Whether an operand of this kind names a stack slot or the return register.
    pub fn is_lvalue(self) -> bool {
        matches!(
            self,
            OperandKind::Global | OperandKind::Formal | OperandKind::Local | OperandKind::RetVal
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            OperandKind::Label => "label",
            OperandKind::Global => "global",
            OperandKind::Formal => "formal",
            OperandKind::Local => "local",
            OperandKind::Number => "number",
            OperandKind::String => "string",
            OperandKind::Bool => "bool",
            OperandKind::Nil => "nil",
            OperandKind::UserFunc => "userfunc",
            OperandKind::LibFunc => "libfunc",
            OperandKind::RetVal => "retval",
            OperandKind::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Operand {
    pub kind: OperandKind,
    pub value: u32,
}

impl Operand {
    pub const ABSENT: Operand = Operand { kind: OperandKind::Absent, value: 0 };

    pub fn new(kind: OperandKind, value: u32) -> Self {
        Operand { kind, value }
    }

    pub fn label(target: u32) -> Self {
        Operand::new(OperandKind::Label, target)
    }

    pub fn global(index: u32) -> Self {
        Operand::new(OperandKind::Global, index)
    }

    pub fn local(index: u32) -> Self {
        Operand::new(OperandKind::Local, index)
    }

    pub fn formal(index: u32) -> Self {
        Operand::new(OperandKind::Formal, index)
    }

    pub fn number(const_index: u32) -> Self {
        Operand::new(OperandKind::Number, const_index)
    }

    pub fn string(const_index: u32) -> Self {
        Operand::new(OperandKind::String, const_index)
    }

    pub fn boolean(b: bool) -> Self {
        Operand::new(OperandKind::Bool, b as u32)
    }

    pub fn nil() -> Self {
        Operand::new(OperandKind::Nil, 0)
    }

    pub fn user_func(index: u32) -> Self {
        Operand::new(OperandKind::UserFunc, index)
    }

    pub fn lib_func(index: u32) -> Self {
        Operand::new(OperandKind::LibFunc, index)
    }

    pub fn retval() -> Self {
        Operand::new(OperandKind::RetVal, 0)
    }

    pub fn is_absent(&self) -> bool {
        self.kind == OperandKind::Absent
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            OperandKind::Absent => Ok(()),
            OperandKind::RetVal => write!(f, "[retval]"),
            kind => write!(f, "[{}, {}]", kind.name(), self.value),
        }
    }
}

// ── Instructions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub result: Operand,
    pub arg1: Operand,
    pub arg2: Operand,
    /// Source line in the compiled program, 0 when unknown.
    pub line: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode, result: Operand, arg1: Operand, arg2: Operand) -> Self {
        Instruction { opcode, result, arg1, arg2, line: 0 }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }
}

/// Descriptor of a compiled user function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFunc {
    /// Instruction index of the function's `funcenter`.
    pub address: u32,
    /// Number of local slots the function reserves on entry.
    pub local_size: u32,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_codes_are_dense() {
        for code in 0..25 {
            let op = Opcode::from_code(code).expect("opcode in range");
            assert_eq!(op.code(), code);
        }
        assert!(Opcode::from_code(25).is_none());
    }

    #[test]
    fn operand_kind_codes() {
        assert_eq!(OperandKind::from_code(0), Some(OperandKind::Label));
        assert_eq!(OperandKind::from_code(10), Some(OperandKind::RetVal));
        assert_eq!(OperandKind::from_code(11), Some(OperandKind::Absent));
        assert!(OperandKind::from_code(12).is_none());
    }

    #[test]
    fn lvalue_kinds() {
        assert!(OperandKind::Global.is_lvalue());
        assert!(OperandKind::RetVal.is_lvalue());
        assert!(!OperandKind::Number.is_lvalue());
        assert!(!OperandKind::Label.is_lvalue());
    }

    #[test]
    fn operand_display() {
        assert_eq!(Operand::global(3).to_string(), "[global, 3]");
        assert_eq!(Operand::retval().to_string(), "[retval]");
        assert_eq!(Operand::ABSENT.to_string(), "");
    }
}
