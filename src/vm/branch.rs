use super::{Flow, Reg, Vm, VmError, VmResult};
use crate::bytecode::Instruction;
use crate::value::MemCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Le,
    Ge,
    Lt,
    Gt,
}

impl RelOp {
    pub fn holds(self, x: f64, y: f64) -> bool {
        match self {
            RelOp::Le => x <= y,
            RelOp::Ge => x >= y,
            RelOp::Lt => x < y,
            RelOp::Gt => x > y,
        }
    }
}

/// Equality as tested by `jeq`/`jne`.
///
/// A Bool on either side compares truthiness; Nil equals only Nil; all other
/// pairs must share a type.
pub fn equal(a: &MemCell, b: &MemCell) -> VmResult<bool> {
    use MemCell::*;
    if a.is_undefined() || b.is_undefined() {
        return Err(VmError::UndefinedInComparison);
    }
    if matches!(a, Bool(_)) || matches!(b, Bool(_)) {
        return Ok(a.to_bool() == b.to_bool());
    }
    if matches!(a, Nil) || matches!(b, Nil) {
        return Ok(matches!(a, Nil) && matches!(b, Nil));
    }
    match (a, b) {
        (Number(x), Number(y)) => Ok(x == y),
        (Str(x), Str(y)) => Ok(x == y),
        (Table(x), Table(y)) => Ok(x.same(y)),
        (UserFunc(x), UserFunc(y)) => Ok(x == y),
        (LibFunc(x), LibFunc(y)) => Ok(x == y),
        _ => Err(VmError::TypeMismatch { left: a.type_name(), right: b.type_name() }),
    }
}

impl<'a> Vm<'a> {
    pub(super) fn execute_jump(&mut self, instr: &Instruction) -> VmResult<Flow> {
        Ok(Flow::Jump(self.label(&instr.result)?))
    }

    pub(super) fn execute_relational(&mut self, op: RelOp, instr: &Instruction) -> VmResult<Flow> {
        let target = self.label(&instr.result)?;
        let (x, y) = self.relational_operands(instr)?;
        Ok(if op.holds(x, y) { Flow::Jump(target) } else { Flow::Next })
    }

    pub(super) fn execute_equality(&mut self, instr: &Instruction, on_equal: bool) -> VmResult<Flow> {
        let target = self.label(&instr.result)?;
        let a = self.translate(&instr.arg1, Reg::Ax)?;
        let b = self.translate(&instr.arg2, Reg::Bx)?;
        let eq = equal(self.cell(a)?, self.cell(b)?)?;
        Ok(if eq == on_equal { Flow::Jump(target) } else { Flow::Next })
    }

    pub(super) fn execute_logical(&mut self, instr: &Instruction, op: fn(bool, bool) -> bool) -> VmResult<Flow> {
        let dst = self.slot(&instr.result)?;
        let a = self.translate(&instr.arg1, Reg::Ax)?;
        let b = self.translate(&instr.arg2, Reg::Bx)?;
        let value = op(self.cell(a)?.to_bool(), self.cell(b)?.to_bool());
        *self.cell_mut(dst)? = MemCell::Bool(value);
        Ok(Flow::Next)
    }

    pub(super) fn execute_not(&mut self, instr: &Instruction) -> VmResult<Flow> {
        let dst = self.slot(&instr.result)?;
        let a = self.translate(&instr.arg1, Reg::Ax)?;
        let value = !self.cell(a)?.to_bool();
        *self.cell_mut(dst)? = MemCell::Bool(value);
        Ok(Flow::Next)
    }
}
