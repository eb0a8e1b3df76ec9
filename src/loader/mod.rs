use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::bytecode::{Instruction, Opcode, Operand, OperandKind, UserFunc};
use crate::vm::VmError;

/// Format marker every program file starts with.
pub const MAGIC_NUMBER: u32 = 340200501;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad magic number '{found}', expected {MAGIC_NUMBER}")]
    BadMagic { found: String },
    #[error("unexpected end of input while reading {what}")]
    Truncated { what: &'static str },
    #[error("malformed {what}: '{token}'")]
    Malformed { what: &'static str, token: String },
    #[error("unknown opcode {code} at instruction {index}")]
    UnknownOpcode { code: u32, index: usize },
    #[error("unknown operand kind {code} at instruction {index}")]
    UnknownOperandKind { code: u32, index: usize },
}

impl LoadError {
    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            LoadError::Io { .. } => "AVM-L001",
            LoadError::BadMagic { .. } => "AVM-L002",
            LoadError::Truncated { .. } => "AVM-L003",
            LoadError::Malformed { .. } => "AVM-L004",
            LoadError::UnknownOpcode { .. } => "AVM-L005",
            LoadError::UnknownOperandKind { .. } => "AVM-L006",
        }
    }
}

/// Everything a program file defines. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstantPool {
    pub strings: Vec<String>,
    pub numbers: Vec<f64>,
    pub user_funcs: Vec<UserFunc>,
    pub lib_funcs: Vec<String>,
    pub code: Vec<Instruction>,
    pub total_globals: usize,
}

// ── Reader ───────────────────────────────────────────────────────────

struct Reader<'s> {
    src: &'s [u8],
    pos: usize,
}

impl<'s> Reader<'s> {
    fn new(src: &'s [u8]) -> Self {
        Reader { src, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.src.len()
    }

    /// Next whitespace-delimited token.
    fn token(&mut self, what: &'static str) -> Result<&'s str, LoadError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.src.len() && !self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(LoadError::Truncated { what });
        }
        std::str::from_utf8(&self.src[start..self.pos]).map_err(|_| LoadError::Malformed {
            what,
            token: String::from_utf8_lossy(&self.src[start..self.pos]).into_owned(),
        })
    }

    fn count(&mut self, what: &'static str) -> Result<u32, LoadError> {
        let token = self.token(what)?;
        token.parse().map_err(|_| LoadError::Malformed { what, token: token.to_string() })
    }

    fn number(&mut self, what: &'static str) -> Result<f64, LoadError> {
        let token = self.token(what)?;
        token.parse().map_err(|_| LoadError::Malformed { what, token: token.to_string() })
    }

    /// `length content`: exactly one separator byte, then `length` raw bytes.
    fn sized_string(&mut self, what: &'static str) -> Result<String, LoadError> {
        let len = self.count(what)? as usize;
        // `count` stops on whitespace, so this byte is the separator.
        if self.pos >= self.src.len() {
            return Err(LoadError::Truncated { what });
        }
        self.pos += 1;
        let end = self.pos.checked_add(len).filter(|&end| end <= self.src.len());
        let Some(end) = end else {
            return Err(LoadError::Truncated { what });
        };
        let text = String::from_utf8_lossy(&self.src[self.pos..end]).into_owned();
        self.pos = end;
        Ok(text)
    }

    fn operand(&mut self, index: usize) -> Result<Operand, LoadError> {
        let code = self.count("operand kind")?;
        let kind = OperandKind::from_code(code).ok_or(LoadError::UnknownOperandKind { code, index })?;
        let value = self.count("operand value")?;
        Ok(Operand::new(kind, value))
    }
}

// ── Loading ──────────────────────────────────────────────────────────

impl ConstantPool {
    pub fn load_file(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path)
            .map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
        ConstantPool::load(&bytes)
    }

    /// Parses a program file: magic number, strings, numbers, user
    /// functions, library names, instructions, then the global count.
    pub fn load(src: &[u8]) -> Result<Self, LoadError> {
        let mut r = Reader::new(src);

        let magic = r.token("magic number")?;
        if magic.parse::<u32>().ok() != Some(MAGIC_NUMBER) {
            return Err(LoadError::BadMagic { found: magic.to_string() });
        }

        let mut pool = ConstantPool::default();

        let n = r.count("string count")?;
        for _ in 0..n {
            pool.strings.push(r.sized_string("string constant")?);
        }

        let n = r.count("number count")?;
        for _ in 0..n {
            pool.numbers.push(r.number("number constant")?);
        }

        let n = r.count("user function count")?;
        for _ in 0..n {
            let address = r.count("user function address")?;
            let local_size = r.count("user function local count")?;
            let name = r.sized_string("user function name")?;
            pool.user_funcs.push(UserFunc { address, local_size, name });
        }

        let n = r.count("library function count")?;
        for _ in 0..n {
            pool.lib_funcs.push(r.sized_string("library function name")?);
        }

        let n = r.count("instruction count")?;
        for index in 0..n as usize {
            let code = r.count("opcode")?;
            let opcode = Opcode::from_code(code).ok_or(LoadError::UnknownOpcode { code, index })?;
            let result = r.operand(index)?;
            let arg1 = r.operand(index)?;
            let arg2 = r.operand(index)?;
            pool.code.push(Instruction::new(opcode, result, arg1, arg2));
        }

        pool.total_globals = r.count("global count")? as usize;
        if !r.at_end() {
            tracing::warn!(offset = r.pos, "ignoring trailing data after global count");
        }

        tracing::debug!(
            strings = pool.strings.len(),
            numbers = pool.numbers.len(),
            user_funcs = pool.user_funcs.len(),
            lib_funcs = pool.lib_funcs.len(),
            instructions = pool.code.len(),
            globals = pool.total_globals,
            "program loaded"
        );
        Ok(pool)
    }

    /// Writes the pool back out in the program-file format.
    pub fn encode(&self) -> String {
        let mut out = format!("{MAGIC_NUMBER}\n{}\n", self.strings.len());
        for s in &self.strings {
            out.push_str(&format!("{} {}\n", s.len(), s));
        }
        out.push_str(&self.numbers.len().to_string());
        for n in &self.numbers {
            out.push_str(&format!(" {n}"));
        }
        out.push_str(&format!("\n{}\n", self.user_funcs.len()));
        for f in &self.user_funcs {
            out.push_str(&format!("{} {} {} {}\n", f.address, f.local_size, f.name.len(), f.name));
        }
        out.push_str(&format!("{}\n", self.lib_funcs.len()));
        for name in &self.lib_funcs {
            out.push_str(&format!("{} {}\n", name.len(), name));
        }
        out.push_str(&format!("{}\n", self.code.len()));
        for i in &self.code {
            out.push_str(&format!("{}", i.opcode.code()));
            for arg in [i.result, i.arg1, i.arg2] {
                out.push_str(&format!(" {} {}", arg.kind.code(), arg.value));
            }
            out.push('\n');
        }
        out.push_str(&format!("{}\n", self.total_globals));
        out
    }

    // ── Constant access ──────────────────────────────────────────────

    pub fn number(&self, index: u32) -> Result<f64, VmError> {
        self.numbers
            .get(index as usize)
            .copied()
            .ok_or(VmError::ConstantOutOfRange { pool: "number", index })
    }

    pub fn string(&self, index: u32) -> Result<&str, VmError> {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or(VmError::ConstantOutOfRange { pool: "string", index })
    }

    pub fn user_func(&self, index: u32) -> Result<&UserFunc, VmError> {
        self.user_funcs
            .get(index as usize)
            .ok_or(VmError::ConstantOutOfRange { pool: "user function", index })
    }

    pub fn lib_func(&self, index: u32) -> Result<&str, VmError> {
        self.lib_funcs
            .get(index as usize)
            .map(String::as_str)
            .ok_or(VmError::ConstantOutOfRange { pool: "library function", index })
    }
}

impl fmt::Display for ConstantPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "strings:")?;
        for (i, s) in self.strings.iter().enumerate() {
            writeln!(f, "  {i}: {s:?}")?;
        }
        writeln!(f, "numbers:")?;
        for (i, n) in self.numbers.iter().enumerate() {
            writeln!(f, "  {i}: {n}")?;
        }
        writeln!(f, "user functions:")?;
        for (i, func) in self.user_funcs.iter().enumerate() {
            writeln!(f, "  {i}: {} at {}, {} local(s)", func.name, func.address, func.local_size)?;
        }
        writeln!(f, "library functions:")?;
        for (i, name) in self.lib_funcs.iter().enumerate() {
            writeln!(f, "  {i}: {name}")?;
        }
        writeln!(f, "code:")?;
        writeln!(f, "  {:<6} {:<14} {:<20} {:<20} {:<20} line", "instr", "opcode", "result", "arg1", "arg2")?;
        for (i, instr) in self.code.iter().enumerate() {
            writeln!(
                f,
                "  {:<6} {:<14} {:<20} {:<20} {:<20} {}",
                i,
                instr.opcode.name(),
                instr.result.to_string(),
                instr.arg1.to_string(),
                instr.arg2.to_string(),
                instr.line
            )?;
        }
        write!(f, "globals: {}", self.total_globals)
    }
}
