use super::{Flow, Reg, Vm, VmError, VmResult};
use crate::bytecode::{Instruction, Opcode, OperandKind};
use crate::library;
use crate::stack::{ENV_SIZE, NUM_ACTUALS_OFFSET, SAVED_FP_OFFSET, SAVED_PC_OFFSET, SAVED_TOP_OFFSET};
use crate::value::{self, MemCell};

impl<'a> Vm<'a> {
    pub(super) fn execute_pusharg(&mut self, instr: &Instruction) -> VmResult<Flow> {
        let src = self.translate(&instr.arg1, Reg::Ax)?;
        let content = self.cell(src)?.clone();
        let top = self.stack.top();
        value::assign(self.stack.cell_mut(top)?, &content);
        self.total_actuals += 1;
        self.stack.dec_top()?;
        Ok(Flow::Next)
    }

    pub(super) fn execute_call(&mut self, instr: &Instruction) -> VmResult<Flow> {
        let loc = self.translate(&instr.arg1, Reg::Ax)?;
        let target = self.cell(loc)?.clone();
        match target {
            MemCell::UserFunc(address) => {
                let address = address as usize;
                match self.pool.code.get(address) {
                    Some(entry) if entry.opcode == Opcode::FuncEnter => {}
                    _ => return Err(VmError::NoFunctionAt { address }),
                }
                tracing::debug!(address, actuals = self.total_actuals, "call user function");
                self.save_environment()?;
                Ok(Flow::Jump(address))
            }
            MemCell::LibFunc(name) | MemCell::Str(name) => self.call_library(&name),
            other => Err(VmError::UnboundFunction { type_name: other.type_name() }),
        }
    }

    /// Pushes actual count, return pc, caller top and caller fp.
    fn save_environment(&mut self) -> VmResult<()> {
        let saved_top = self.stack.top() + self.total_actuals;
        self.stack.push_env(self.total_actuals)?;
        self.stack.push_env(self.pc + 1)?;
        self.stack.push_env(saved_top)?;
        self.stack.push_env(self.stack.fp())
    }

    pub(super) fn execute_funcenter(&mut self, instr: &Instruction) -> VmResult<Flow> {
        let pool = self.pool;
        let func = match instr.arg1.kind {
            OperandKind::UserFunc => pool.user_func(instr.arg1.value)?,
            kind => return Err(VmError::InvalidOperand { kind: kind.name(), role: "a function" }),
        };
        if func.address as usize != self.pc {
            return Err(VmError::NoFunctionAt { address: self.pc });
        }
        self.total_actuals = 0;
        self.stack.set_fp(self.stack.top());
        self.stack.reserve(func.local_size as usize)?;
        tracing::trace!(name = %func.name, fp = self.stack.fp(), "enter function");
        Ok(Flow::Next)
    }

    pub(super) fn execute_funcexit(&mut self, _instr: &Instruction) -> VmResult<Flow> {
        self.return_from_call()
    }

    /// Restores the caller's frame from the environment and releases
    /// everything the callee left on the stack.
    fn return_from_call(&mut self) -> VmResult<Flow> {
        let old_top = self.stack.top();
        let top = self.stack.env_value(SAVED_TOP_OFFSET)?;
        let pc = self.stack.env_value(SAVED_PC_OFFSET)?;
        let fp = self.stack.env_value(SAVED_FP_OFFSET)?;
        if top >= self.stack.size() || fp >= self.stack.size() {
            return Err(VmError::CorruptEnvironment { address: self.stack.fp() });
        }
        self.stack.set_top(top);
        self.stack.set_fp(fp);
        self.stack.clear_range(old_top + 1, top);
        Ok(Flow::Jump(pc))
    }

    fn call_library(&mut self, name: &str) -> VmResult<Flow> {
        let Some(&handler) = self.libraries.get(name) else {
            let suggestion = library::closest_match(name, self.libraries.keys().map(String::as_str));
            return Err(VmError::UnknownLibraryFunction { name: name.to_string(), suggestion });
        };
        tracing::debug!(name, actuals = self.total_actuals, "call library function");
        self.save_environment()?;
        self.stack.set_fp(self.stack.top());
        self.total_actuals = 0;
        self.retval = MemCell::Nil;
        handler(self)?;
        self.return_from_call()
    }

    // ── Frame access for library handlers ─────────────────────────────

    /// Number of arguments passed to the executing library function.
    pub fn total_actuals(&self) -> VmResult<usize> {
        self.frame_actuals(self.stack.fp())
    }

    /// Argument `index` of the executing library function, if passed.
    pub fn actual(&self, index: usize) -> VmResult<Option<&MemCell>> {
        self.frame_actual(self.stack.fp(), index)
    }

    /// Frame pointer of the user function that made the current library
    /// call, or `None` when it was made at global scope.
    pub fn caller_frame(&self) -> VmResult<Option<usize>> {
        let fp = self.stack.env_value(SAVED_FP_OFFSET)?;
        Ok((fp != self.main_fp).then_some(fp))
    }

    pub fn frame_actuals(&self, fp: usize) -> VmResult<usize> {
        self.stack.env_value_at(fp, NUM_ACTUALS_OFFSET)
    }

    pub fn frame_actual(&self, fp: usize, index: usize) -> VmResult<Option<&MemCell>> {
        if index >= self.frame_actuals(fp)? {
            return Ok(None);
        }
        self.stack.cell(fp + ENV_SIZE + 1 + index).map(Some)
    }
}
