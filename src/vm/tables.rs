use super::{Flow, MissingKeyPolicy, Reg, Vm, VmError, VmResult};
use crate::bytecode::Instruction;
use crate::table::{Table, TableRef};
use crate::value::{self, MemCell};

impl<'a> Vm<'a> {
    fn table_operand(&mut self, instr: &Instruction) -> VmResult<TableRef> {
        let loc = self.translate(&instr.arg1, Reg::Ax)?;
        match self.cell(loc)? {
            MemCell::Table(t) => Ok(t.clone()),
            other => Err(VmError::NotATable { type_name: other.type_name() }),
        }
    }

    pub(super) fn execute_newtable(&mut self, instr: &Instruction) -> VmResult<Flow> {
        let dst = self.slot(&instr.arg1)?;
        *self.cell_mut(dst)? = MemCell::Table(Table::create());
        Ok(Flow::Next)
    }

    pub(super) fn execute_tablegetelem(&mut self, instr: &Instruction) -> VmResult<Flow> {
        let dst = self.slot(&instr.result)?;
        let table = self.table_operand(instr)?;
        let key = self.translate(&instr.arg2, Reg::Bx)?;
        let key = self.cell(key)?;
        let content = match table.get(key)? {
            Some(content) => content,
            None => match self.config.missing_key {
                MissingKeyPolicy::Fatal => return Err(VmError::KeyNotFound { key: key.to_string() }),
                MissingKeyPolicy::Nil => MemCell::Nil,
            },
        };
        value::assign(self.cell_mut(dst)?, &content);
        Ok(Flow::Next)
    }

    pub(super) fn execute_tablesetelem(&mut self, instr: &Instruction) -> VmResult<Flow> {
        let table = self.table_operand(instr)?;
        let key = self.translate(&instr.arg2, Reg::Bx)?;
        let content = self.translate(&instr.result, Reg::Cx)?;
        table.set(self.cell(key)?, self.cell(content)?)?;
        Ok(Flow::Next)
    }
}
