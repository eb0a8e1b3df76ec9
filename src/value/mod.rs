use crate::table::TableRef;

/// A tagged runtime value slot.
///
/// Owned payloads are released by drop glue: overwriting a cell frees its
/// string and releases its table reference, destroying the table when the
/// last reference goes away.
#[derive(Debug, Clone, Default)]
pub enum MemCell {
    Number(f64),
    Str(String),
    Bool(bool),
    Table(TableRef),
    /// Entry address of a user function.
    UserFunc(u32),
    LibFunc(String),
    Nil,
    #[default]
    Undefined,
}

impl MemCell {
    pub fn type_name(&self) -> &'static str {
        match self {
            MemCell::Number(_) => "number",
            MemCell::Str(_) => "string",
            MemCell::Bool(_) => "boolean",
            MemCell::Table(_) => "table",
            MemCell::UserFunc(_) => "userfunction",
            MemCell::LibFunc(_) => "libraryfunction",
            MemCell::Nil => "nil",
            MemCell::Undefined => "undefined",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, MemCell::Undefined)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MemCell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            MemCell::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Truthiness used by equality against booleans and by the logical opcodes.
    pub fn to_bool(&self) -> bool {
        match self {
            MemCell::Number(n) => *n != 0.0,
            MemCell::Str(s) => !s.is_empty(),
            MemCell::Bool(b) => *b,
            MemCell::Table(_) | MemCell::UserFunc(_) | MemCell::LibFunc(_) => true,
            MemCell::Nil | MemCell::Undefined => false,
        }
    }

    /// Releases the owned payload and resets the cell to Undefined.
    pub fn clear(&mut self) {
        *self = MemCell::Undefined;
    }
}

/// Copies `src` into `dst`, releasing what `dst` held.
///
/// Strings are deep-copied and tables gain a reference. Assigning from an
/// Undefined cell is allowed but reported. The borrow rules keep `dst` and
/// `src` distinct here; the VM skips assignments whose operands resolve to
/// the same slot before calling this.
pub fn assign(dst: &mut MemCell, src: &MemCell) {
    if src.is_undefined() {
        tracing::warn!("assigning from undefined content");
    }
    *dst = src.clone();
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl std::fmt::Display for MemCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemCell::Number(n) => f.write_str(&format_number(*n)),
            MemCell::Str(s) => write!(f, "{}", s),
            MemCell::Bool(b) => write!(f, "{}", b),
            MemCell::Table(t) => write!(f, "{}", t),
            MemCell::UserFunc(addr) => write!(f, "user function: {}", addr),
            MemCell::LibFunc(name) => write!(f, "library function: {}", name),
            MemCell::Nil => write!(f, "nil"),
            MemCell::Undefined => write!(f, "undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;

    #[test]
    fn assign_deep_copies_strings() {
        let mut src = MemCell::Str("hello".to_string());
        let mut dst = MemCell::Undefined;
        assign(&mut dst, &src);
        if let MemCell::Str(s) = &mut src {
            s.push_str(" world");
        }
        assert!(matches!(&dst, MemCell::Str(s) if s == "hello"));
    }

    #[test]
    fn assign_shares_tables() {
        let src = MemCell::Table(Table::create());
        let mut dst = MemCell::Nil;
        assign(&mut dst, &src);
        let (a, b) = (src.as_table().unwrap(), dst.as_table().unwrap());
        assert!(a.same(b));
        assert_eq!(a.ref_count(), 2);
    }

    #[test]
    fn assign_from_undefined_still_copies() {
        let mut dst = MemCell::Number(1.0);
        assign(&mut dst, &MemCell::Undefined);
        assert!(dst.is_undefined());
    }

    #[test]
    fn clear_releases_table_reference() {
        let t = Table::create();
        let mut cell = MemCell::Table(t.clone());
        assert_eq!(t.ref_count(), 2);
        cell.clear();
        assert!(cell.is_undefined());
        assert_eq!(t.ref_count(), 1);
        cell.clear();
        assert!(cell.is_undefined());
    }

    #[test]
    fn truthiness() {
        assert!(MemCell::Number(2.0).to_bool());
        assert!(!MemCell::Number(0.0).to_bool());
        assert!(MemCell::Str("x".to_string()).to_bool());
        assert!(!MemCell::Str(String::new()).to_bool());
        assert!(MemCell::UserFunc(4).to_bool());
        assert!(MemCell::LibFunc("print".to_string()).to_bool());
        assert!(!MemCell::Nil.to_bool());
        assert!(!MemCell::Undefined.to_bool());
    }

    #[test]
    fn display_numbers() {
        assert_eq!(MemCell::Number(7.0).to_string(), "7");
        assert_eq!(MemCell::Number(-2.5).to_string(), "-2.5");
        assert_eq!(MemCell::Number(f64::INFINITY).to_string(), "inf");
    }
}
