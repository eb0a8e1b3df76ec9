use super::{Flow, Reg, Vm, VmError, VmResult};
use crate::bytecode::{Instruction, Opcode, Operand};
use crate::value::MemCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    fn opcode(self) -> Opcode {
        match self {
            ArithOp::Add => Opcode::Add,
            ArithOp::Sub => Opcode::Sub,
            ArithOp::Mul => Opcode::Mul,
            ArithOp::Div => Opcode::Div,
            ArithOp::Mod => Opcode::Mod,
        }
    }

    /// Division by zero follows IEEE 754 and never traps.
    pub fn apply(self, x: f64, y: f64) -> f64 {
        match self {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => x / y,
            ArithOp::Mod => modulo(x, y),
        }
    }
}

/// Remainder of the truncated operands, with the dividend's sign.
/// A zero divisor gives NaN.
pub fn modulo(x: f64, y: f64) -> f64 {
    x.trunc() % y.trunc()
}

impl<'a> Vm<'a> {
    fn number_operand(&mut self, arg: &Operand, reg: Reg, op: Opcode) -> VmResult<f64> {
        let loc = self.translate(arg, reg)?;
        let cell = self.cell(loc)?;
        cell.as_number().ok_or(VmError::NotANumber { op, type_name: cell.type_name() })
    }

    pub(super) fn execute_arithmetic(&mut self, op: ArithOp, instr: &Instruction) -> VmResult<Flow> {
        let dst = self.slot(&instr.result)?;
        let x = self.number_operand(&instr.arg1, Reg::Ax, op.opcode())?;
        let y = self.number_operand(&instr.arg2, Reg::Bx, op.opcode())?;
        *self.cell_mut(dst)? = MemCell::Number(op.apply(x, y));
        Ok(Flow::Next)
    }

    pub(super) fn execute_uminus(&mut self, instr: &Instruction) -> VmResult<Flow> {
        let dst = self.slot(&instr.result)?;
        let x = self.number_operand(&instr.arg1, Reg::Ax, Opcode::Uminus)?;
        *self.cell_mut(dst)? = MemCell::Number(-x);
        Ok(Flow::Next)
    }

    pub(super) fn relational_operands(&mut self, instr: &Instruction) -> VmResult<(f64, f64)> {
        let x = self.number_operand(&instr.arg1, Reg::Ax, instr.opcode)?;
        let y = self.number_operand(&instr.arg2, Reg::Bx, instr.opcode)?;
        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Operand;
    use crate::vm::tests::{ins, pool, vm_with_output};
    use crate::vm::VmConfig;

    const A: Operand = Operand::ABSENT;

    fn eval(op: Opcode, x: MemCell, y: MemCell) -> Result<MemCell, VmError> {
        // globals: 0 = result, 1 = x, 2 = y
        let p = pool(vec![ins(op, Operand::global(0), Operand::global(1), Operand::global(2))], 3);
        let (mut vm, _) = vm_with_output(&p, VmConfig::default());
        let (gx, gy) = (vm.stack.global_addr(1).unwrap(), vm.stack.global_addr(2).unwrap());
        *vm.stack.cell_mut(gx).unwrap() = x;
        *vm.stack.cell_mut(gy).unwrap() = y;
        vm.run().map_err(|e| e.error)?;
        Ok(vm.global(0).unwrap().clone())
    }

    fn num(n: f64) -> MemCell {
        MemCell::Number(n)
    }

    #[test]
    fn add_sub_mul() {
        for (x, y) in [(1.0, 2.0), (-3.5, 0.25), (1e10, -1e10), (0.1, 0.2)] {
            assert!(matches!(eval(Opcode::Add, num(x), num(y)), Ok(MemCell::Number(n)) if n == x + y));
            assert!(matches!(eval(Opcode::Sub, num(x), num(y)), Ok(MemCell::Number(n)) if n == x - y));
            assert!(matches!(eval(Opcode::Mul, num(x), num(y)), Ok(MemCell::Number(n)) if n == x * y));
        }
    }

    #[test]
    fn division_by_zero_is_infinite() {
        assert!(matches!(eval(Opcode::Div, num(1.0), num(0.0)), Ok(MemCell::Number(n)) if n == f64::INFINITY));
        assert!(matches!(eval(Opcode::Div, num(-1.0), num(0.0)), Ok(MemCell::Number(n)) if n == f64::NEG_INFINITY));
        assert!(matches!(eval(Opcode::Div, num(0.0), num(0.0)), Ok(MemCell::Number(n)) if n.is_nan()));
    }

    #[test]
    fn modulo_truncates() {
        assert_eq!(modulo(7.9, 3.2), 1.0);
        assert_eq!(modulo(-7.0, 3.0), -1.0);
        assert_eq!(modulo(7.0, -3.0), 1.0);
        assert!(modulo(5.0, 0.4).is_nan());
        assert!(matches!(eval(Opcode::Mod, num(10.0), num(4.0)), Ok(MemCell::Number(n)) if n == 2.0));
    }

    #[test]
    fn non_number_operand_is_fatal() {
        let err = eval(Opcode::Add, MemCell::Str("1".into()), num(2.0)).unwrap_err();
        assert!(matches!(err, VmError::NotANumber { op: Opcode::Add, type_name: "string" }));
        let err = eval(Opcode::Div, num(2.0), MemCell::Nil).unwrap_err();
        assert!(matches!(err, VmError::NotANumber { op: Opcode::Div, type_name: "nil" }));
    }

    #[test]
    fn operands_may_alias_destination() {
        let p = pool(
            vec![ins(Opcode::Mul, Operand::global(0), Operand::global(0), Operand::global(0))],
            1,
        );
        let (mut vm, _) = vm_with_output(&p, VmConfig::default());
        let g = vm.stack.global_addr(0).unwrap();
        *vm.stack.cell_mut(g).unwrap() = num(3.0);
        vm.run().unwrap();
        assert!(matches!(vm.global(0).unwrap(), MemCell::Number(n) if *n == 9.0));
    }

    #[test]
    fn uminus_negates() {
        let mut p = pool(vec![ins(Opcode::Uminus, Operand::global(0), Operand::number(0), A)], 1);
        p.numbers = vec![4.5];
        let (mut vm, _) = vm_with_output(&p, VmConfig::default());
        vm.run().unwrap();
        assert!(matches!(vm.global(0).unwrap(), MemCell::Number(n) if *n == -4.5));
    }
}
