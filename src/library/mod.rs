use crate::table::{Table, TableRef};
use crate::value::MemCell;
use crate::vm::{Vm, VmError};

/// A library function handler. Arguments are read through
/// [`Vm::total_actuals`] and [`Vm::actual`]; the result goes to
/// [`Vm::set_retval`] (it is Nil unless set).
pub type LibraryFn = fn(&mut Vm<'_>) -> Result<(), VmError>;

/// Handlers registered on every new VM.
pub static STANDARD: &[(&str, LibraryFn)] = &[
    ("print", print),
    ("input", input),
    ("typeof", type_of),
    ("totalarguments", total_arguments),
    ("argument", argument),
    ("strtonum", str_to_num),
    ("sqrt", sqrt),
    ("cos", cos),
    ("sin", sin),
    ("objecttotalmembers", object_total_members),
    ("objectmemberkeys", object_member_keys),
    ("objectcopy", object_copy),
];

fn bad_argument(name: &str, message: impl Into<String>) -> VmError {
    VmError::LibraryArgument { name: name.to_string(), message: message.into() }
}

fn arg<'v>(vm: &'v Vm<'_>, name: &str, index: usize) -> Result<&'v MemCell, VmError> {
    vm.actual(index)?
        .ok_or_else(|| bad_argument(name, format!("expected at least {} argument(s)", index + 1)))
}

fn number_arg(vm: &Vm<'_>, name: &str, index: usize) -> Result<f64, VmError> {
    let cell = arg(vm, name, index)?;
    cell.as_number()
        .ok_or_else(|| bad_argument(name, format!("expected number, got {}", cell.type_name())))
}

fn table_arg(vm: &Vm<'_>, name: &str, index: usize) -> Result<TableRef, VmError> {
    match arg(vm, name, index)? {
        MemCell::Table(t) => Ok(t.clone()),
        other => Err(bad_argument(name, format!("expected table, got {}", other.type_name()))),
    }
}

// ── I/O ──────────────────────────────────────────────────────────────

fn print(vm: &mut Vm<'_>) -> Result<(), VmError> {
    let mut text = String::new();
    for i in 0..vm.total_actuals()? {
        text.push_str(&arg(vm, "print", i)?.to_string());
    }
    vm.output().write_all(text.as_bytes())?;
    Ok(())
}

fn input(vm: &mut Vm<'_>) -> Result<(), VmError> {
    vm.output().flush()?;
    let mut line = String::new();
    if vm.input().read_line(&mut line)? == 0 {
        return Ok(());
    }
    let line = line.trim_end_matches(['\r', '\n']);
    let value = match line.trim().parse::<f64>() {
        Ok(n) => MemCell::Number(n),
        Err(_) => MemCell::Str(line.to_string()),
    };
    vm.set_retval(value);
    Ok(())
}

// ── Reflection ───────────────────────────────────────────────────────

fn type_of(vm: &mut Vm<'_>) -> Result<(), VmError> {
    let name = arg(vm, "typeof", 0)?.type_name();
    vm.set_retval(MemCell::Str(name.to_string()));
    Ok(())
}

fn total_arguments(vm: &mut Vm<'_>) -> Result<(), VmError> {
    match vm.caller_frame()? {
        Some(fp) => {
            let total = vm.frame_actuals(fp)?;
            vm.set_retval(MemCell::Number(total as f64));
        }
        None => tracing::warn!("'totalarguments' called outside a function"),
    }
    Ok(())
}

fn argument(vm: &mut Vm<'_>) -> Result<(), VmError> {
    let n = number_arg(vm, "argument", 0)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(bad_argument("argument", format!("index {n} is not a non-negative integer")));
    }
    let Some(fp) = vm.caller_frame()? else {
        tracing::warn!("'argument' called outside a function");
        return Ok(());
    };
    let value = vm.frame_actual(fp, n as usize)?.cloned().unwrap_or(MemCell::Nil);
    vm.set_retval(value);
    Ok(())
}

// ── Numbers ──────────────────────────────────────────────────────────

fn str_to_num(vm: &mut Vm<'_>) -> Result<(), VmError> {
    let value = match arg(vm, "strtonum", 0)? {
        MemCell::Str(s) => s.trim().parse::<f64>().map_or(MemCell::Nil, MemCell::Number),
        other => return Err(bad_argument("strtonum", format!("expected string, got {}", other.type_name()))),
    };
    vm.set_retval(value);
    Ok(())
}

fn sqrt(vm: &mut Vm<'_>) -> Result<(), VmError> {
    let n = number_arg(vm, "sqrt", 0)?;
    if n >= 0.0 {
        vm.set_retval(MemCell::Number(n.sqrt()));
    }
    Ok(())
}

fn cos(vm: &mut Vm<'_>) -> Result<(), VmError> {
    let degrees = number_arg(vm, "cos", 0)?;
    vm.set_retval(MemCell::Number(degrees.to_radians().cos()));
    Ok(())
}

fn sin(vm: &mut Vm<'_>) -> Result<(), VmError> {
    let degrees = number_arg(vm, "sin", 0)?;
    vm.set_retval(MemCell::Number(degrees.to_radians().sin()));
    Ok(())
}

// ── Tables ───────────────────────────────────────────────────────────

fn object_total_members(vm: &mut Vm<'_>) -> Result<(), VmError> {
    let t = table_arg(vm, "objecttotalmembers", 0)?;
    vm.set_retval(MemCell::Number(t.len() as f64));
    Ok(())
}

fn object_member_keys(vm: &mut Vm<'_>) -> Result<(), VmError> {
    let t = table_arg(vm, "objectmemberkeys", 0)?;
    let keys = Table::create();
    for (i, key) in t.keys().iter().enumerate() {
        keys.set(&MemCell::Number(i as f64), key)?;
    }
    vm.set_retval(MemCell::Table(keys));
    Ok(())
}

fn object_copy(vm: &mut Vm<'_>) -> Result<(), VmError> {
    let t = table_arg(vm, "objectcopy", 0)?;
    vm.set_retval(MemCell::Table(t.shallow_copy()?));
    Ok(())
}

// ── Suggestions ──────────────────────────────────────────────────────

/// Closest candidate within edit distance 3, for "did you mean" hints.
pub fn closest_match<'c>(name: &str, candidates: impl Iterator<Item = &'c str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let dist = levenshtein(name, candidate);
        if dist <= 3 && best.is_none_or(|(b, d)| dist < d || (dist == d && candidate < b)) {
            best = Some((candidate, dist));
        }
    }
    best.map(|(s, _)| s.to_string())
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut row = vec![i; b.len() + 1];
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            row[j] = (prev[j] + 1).min(row[j - 1] + 1).min(prev[j - 1] + cost);
        }
        prev = row;
    }
    prev[b.len()]
}
