use crate::value::MemCell;
use crate::vm::VmError;

pub const DEFAULT_STACK_SIZE: usize = 4094;

/// Number of bookkeeping words saved on every call.
pub const ENV_SIZE: usize = 4;

// Environment word offsets, relative to the callee's frame pointer.
pub const SAVED_FP_OFFSET: usize = 1;
pub const SAVED_TOP_OFFSET: usize = 2;
pub const SAVED_PC_OFFSET: usize = 3;
pub const NUM_ACTUALS_OFFSET: usize = 4;

/// One flat cell array shared by globals, call frames and argument passing.
///
/// The stack grows toward index 0. Globals sit at the high end; `top` is the
/// next free slot and `fp` the base of the executing function's frame.
pub struct Stack {
    cells: Vec<MemCell>,
    top: usize,
    fp: usize,
    globals: usize,
}

impl Stack {
    pub fn new(size: usize, total_globals: usize) -> Result<Self, VmError> {
        if size == 0 || total_globals >= size {
            return Err(VmError::StackOverflow);
        }
        let top = size - 1 - total_globals;
        let mut cells = Vec::with_capacity(size);
        cells.resize_with(size, MemCell::default);
        Ok(Stack { cells, top, fp: top, globals: total_globals })
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn fp(&self) -> usize {
        self.fp
    }

    pub fn total_globals(&self) -> usize {
        self.globals
    }

    pub(crate) fn set_top(&mut self, top: usize) {
        self.top = top;
    }

    pub(crate) fn set_fp(&mut self, fp: usize) {
        self.fp = fp;
    }

    /// Accepts addresses strictly above `top` and inside the array.
    fn check(&self, addr: Option<usize>) -> Result<usize, VmError> {
        match addr {
            Some(a) if a > self.top && a < self.cells.len() => Ok(a),
            Some(a) => Err(VmError::StackBounds { address: a as i64 }),
            None => Err(VmError::StackBounds { address: -1 }),
        }
    }

    pub fn global_addr(&self, index: u32) -> Result<usize, VmError> {
        self.check((self.cells.len() - 1).checked_sub(index as usize))
    }

    pub fn local_addr(&self, index: u32) -> Result<usize, VmError> {
        self.check(self.fp.checked_sub(index as usize))
    }

    pub fn formal_addr(&self, index: u32) -> Result<usize, VmError> {
        self.check(self.fp.checked_add(ENV_SIZE + 1 + index as usize))
    }

    pub fn cell(&self, addr: usize) -> Result<&MemCell, VmError> {
        self.cells.get(addr).ok_or(VmError::StackBounds { address: addr as i64 })
    }

    pub fn cell_mut(&mut self, addr: usize) -> Result<&mut MemCell, VmError> {
        self.cells.get_mut(addr).ok_or(VmError::StackBounds { address: addr as i64 })
    }

    /// Moves `top` one slot down.
    pub fn dec_top(&mut self) -> Result<(), VmError> {
        if self.top == 0 {
            return Err(VmError::StackOverflow);
        }
        self.top -= 1;
        Ok(())
    }

    /// Reserves `count` slots below `top`.
    pub fn reserve(&mut self, count: usize) -> Result<(), VmError> {
        self.top = self.top.checked_sub(count).ok_or(VmError::StackOverflow)?;
        Ok(())
    }

    /// Writes a bookkeeping word at `top`, then moves `top` down.
    pub fn push_env(&mut self, value: usize) -> Result<(), VmError> {
        let top = self.top;
        self.cells[top] = MemCell::Number(value as f64);
        self.dec_top()
    }

    /// Reads the bookkeeping word at `fp + offset`.
    pub fn env_value(&self, offset: usize) -> Result<usize, VmError> {
        self.env_value_at(self.fp, offset)
    }

    /// Reads the bookkeeping word of the frame based at `base`.
    pub fn env_value_at(&self, base: usize, offset: usize) -> Result<usize, VmError> {
        let addr = base + offset;
        match self.cell(addr)? {
            MemCell::Number(n) if *n >= 0.0 && *n == n.trunc() => Ok(*n as usize),
            _ => Err(VmError::CorruptEnvironment { address: addr }),
        }
    }

    /// Clears every cell in `from..=to`.
    pub fn clear_range(&mut self, from: usize, to: usize) {
        let end = to.min(self.cells.len().saturating_sub(1));
        for cell in self.cells.iter_mut().take(end + 1).skip(from) {
            cell.clear();
        }
    }
}
