use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::value::{self, MemCell};
use crate::vm::VmError;

pub const HASH_SIZE: usize = 211;

struct Entry {
    key: MemCell,
    value: MemCell,
}

/// Associative container keyed by string or number.
///
/// Two independent chained hash structures of `HASH_SIZE` buckets each,
/// allocated on first insert. Stored keys and values are owned copies of
/// the caller's cells.
pub struct Table {
    str_indexed: Vec<Vec<Entry>>,
    num_indexed: Vec<Vec<Entry>>,
    total_str: usize,
    total_num: usize,
}

/// Shared, reference-counted handle to a [`Table`].
///
/// Cloning the handle adds a reference and dropping it releases one; the
/// table and every cell stored in it are destroyed with the last handle.
#[derive(Clone)]
pub struct TableRef(Rc<RefCell<Table>>);

/// Non-owning handle, used to observe whether a table is still alive.
pub struct WeakTable(Weak<RefCell<Table>>);

impl WeakTable {
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

enum Key<'a> {
    Str(&'a str),
    Num(f64),
}

fn classify(key: &MemCell) -> Result<Key<'_>, VmError> {
    match key {
        MemCell::Str(s) => Ok(Key::Str(s)),
        MemCell::Number(n) if n.is_nan() => {
            Err(VmError::UnsupportedKeyType { type_name: "nan" })
        }
        MemCell::Number(n) => Ok(Key::Num(*n)),
        other => Err(VmError::UnsupportedKeyType { type_name: other.type_name() }),
    }
}

fn hash_string(s: &str) -> usize {
    let mut hash: u64 = 5381;
    for b in s.bytes() {
        hash = (hash << 5).wrapping_add(hash).wrapping_add(b as u64);
    }
    (hash % HASH_SIZE as u64) as usize
}

fn hash_number(n: f64) -> usize {
    // 0.0 and -0.0 compare equal and must land in the same bucket.
    if n == 0.0 {
        return 0;
    }
    if n == n.trunc() && n.abs() < i64::MAX as f64 {
        (n as i64).rem_euclid(HASH_SIZE as i64) as usize
    } else {
        (n.to_bits() % HASH_SIZE as u64) as usize
    }
}

impl Table {
    fn new() -> Self {
        Table {
            str_indexed: Vec::new(),
            num_indexed: Vec::new(),
            total_str: 0,
            total_num: 0,
        }
    }

    /// Creates an empty table behind a fresh handle.
    pub fn create() -> TableRef {
        TableRef(Rc::new(RefCell::new(Table::new())))
    }

    fn bucket(&self, key: &Key<'_>) -> Option<&Vec<Entry>> {
        match key {
            Key::Str(s) => self.str_indexed.get(hash_string(s)),
            Key::Num(n) => self.num_indexed.get(hash_number(*n)),
        }
    }

    fn find(&self, key: &Key<'_>) -> Option<&Entry> {
        self.bucket(key)?.iter().find(|e| match (key, &e.key) {
            (Key::Str(s), MemCell::Str(k)) => k == s,
            (Key::Num(n), MemCell::Number(k)) => k == n,
            _ => false,
        })
    }

    pub fn get(&self, key: &MemCell) -> Result<Option<&MemCell>, VmError> {
        let key = classify(key)?;
        Ok(self.find(&key).map(|e| &e.value))
    }

    /// Inserts or overwrites. The previous value, if any, is released.
    pub fn set(&mut self, key: &MemCell, content: &MemCell) -> Result<(), VmError> {
        let k = classify(key)?;
        let (buckets, hash, total) = match k {
            Key::Str(s) => (&mut self.str_indexed, hash_string(s), &mut self.total_str),
            Key::Num(n) => (&mut self.num_indexed, hash_number(n), &mut self.total_num),
        };
        if buckets.is_empty() {
            buckets.resize_with(HASH_SIZE, Vec::new);
        }
        let bucket = &mut buckets[hash];
        let existing = bucket.iter_mut().find(|e| match (&k, &e.key) {
            (Key::Str(s), MemCell::Str(stored)) => stored == s,
            (Key::Num(n), MemCell::Number(stored)) => stored == n,
            _ => false,
        });
        match existing {
            Some(entry) => value::assign(&mut entry.value, content),
            None => {
                let mut entry = Entry { key: MemCell::Undefined, value: MemCell::Undefined };
                value::assign(&mut entry.key, key);
                value::assign(&mut entry.value, content);
                bucket.push(entry);
                *total += 1;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.total_str + self.total_num
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in bucket order, string-keyed entries first.
    pub fn keys(&self) -> Vec<MemCell> {
        self.entries().map(|e| e.key.clone()).collect()
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.str_indexed.iter().chain(self.num_indexed.iter()).flatten()
    }

    fn drain(&mut self) -> Vec<Entry> {
        self.total_str = 0;
        self.total_num = 0;
        self.str_indexed.iter_mut().chain(self.num_indexed.iter_mut()).flat_map(std::mem::take).collect()
    }
}

// Releasing nested tables recursively would overflow the native stack on
// long chains, so entries of tables losing their last reference are
// collected into one worklist instead.
impl Drop for Table {
    fn drop(&mut self) {
        let mut pending = self.drain();
        while let Some(entry) = pending.pop() {
            if let MemCell::Table(TableRef(rc)) = entry.value {
                if let Ok(cell) = Rc::try_unwrap(rc) {
                    pending.extend(cell.into_inner().drain());
                }
            }
        }
    }
}

impl TableRef {
    pub fn get(&self, key: &MemCell) -> Result<Option<MemCell>, VmError> {
        Ok(self.0.borrow().get(key)?.cloned())
    }

    pub fn set(&self, key: &MemCell, content: &MemCell) -> Result<(), VmError> {
        self.0.borrow_mut().set(key, content)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn keys(&self) -> Vec<MemCell> {
        self.0.borrow().keys()
    }

    /// New table holding the same keys and values. Nested tables are shared.
    pub fn shallow_copy(&self) -> Result<TableRef, VmError> {
        let copy = Table::create();
        {
            let src = self.0.borrow();
            let mut dst = copy.0.borrow_mut();
            for e in src.entries() {
                dst.set(&e.key, &e.value)?;
            }
        }
        Ok(copy)
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn same(&self, other: &TableRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakTable {
        WeakTable(Rc::downgrade(&self.0))
    }

    fn render(&self, f: &mut std::fmt::Formatter<'_>, seen: &mut Vec<*const RefCell<Table>>) -> std::fmt::Result {
        let ptr = Rc::as_ptr(&self.0);
        if seen.contains(&ptr) {
            return write!(f, "<cycle>");
        }
        seen.push(ptr);
        let table = self.0.borrow();
        write!(f, "[")?;
        for (i, e) in table.entries().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{{")?;
            render_cell(&e.key, f, seen)?;
            write!(f, " : ")?;
            render_cell(&e.value, f, seen)?;
            write!(f, "}}")?;
        }
        seen.pop();
        write!(f, "]")
    }
}

fn render_cell(cell: &MemCell, f: &mut std::fmt::Formatter<'_>, seen: &mut Vec<*const RefCell<Table>>) -> std::fmt::Result {
    match cell {
        MemCell::Table(t) => t.render(f, seen),
        MemCell::Str(s) => write!(f, "\"{}\"", s),
        other => write!(f, "{}", other),
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.render(f, &mut Vec::new())
    }
}

impl std::fmt::Debug for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Table(refs={}, len={})", self.ref_count(), self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> MemCell {
        MemCell::Str(text.to_string())
    }

    #[test]
    fn set_then_get_string_key() {
        let t = Table::create();
        t.set(&s("k"), &MemCell::Number(5.0)).unwrap();
        assert!(matches!(t.get(&s("k")).unwrap(), Some(MemCell::Number(n)) if n == 5.0));
        assert!(t.get(&s("missing")).unwrap().is_none());
    }

    #[test]
    fn numeric_keys_are_separate_from_strings() {
        let t = Table::create();
        t.set(&MemCell::Number(1.0), &s("one")).unwrap();
        t.set(&s("1"), &s("string one")).unwrap();
        assert!(matches!(t.get(&MemCell::Number(1.0)).unwrap(), Some(MemCell::Str(v)) if v == "one"));
        assert!(matches!(t.get(&s("1")).unwrap(), Some(MemCell::Str(v)) if v == "string one"));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn negative_zero_is_zero() {
        let t = Table::create();
        t.set(&MemCell::Number(-0.0), &MemCell::Bool(true)).unwrap();
        assert!(t.get(&MemCell::Number(0.0)).unwrap().is_some());
    }

    #[test]
    fn overwrite_keeps_single_entry() {
        let t = Table::create();
        t.set(&s("k"), &MemCell::Number(1.0)).unwrap();
        t.set(&s("k"), &MemCell::Number(2.0)).unwrap();
        assert_eq!(t.len(), 1);
        assert!(matches!(t.get(&s("k")).unwrap(), Some(MemCell::Number(n)) if n == 2.0));
    }

    #[test]
    fn colliding_string_keys_chain() {
        let t = Table::create();
        let keys: Vec<String> = (0..1000).map(|i| format!("key{i}")).collect();
        for (i, k) in keys.iter().enumerate() {
            t.set(&s(k), &MemCell::Number(i as f64)).unwrap();
        }
        assert_eq!(t.len(), 1000);
        for (i, k) in keys.iter().enumerate() {
            assert!(matches!(t.get(&s(k)).unwrap(), Some(MemCell::Number(n)) if n == i as f64));
        }
    }

    #[test]
    fn unsupported_key_types() {
        let t = Table::create();
        let err = t.get(&MemCell::Bool(true)).unwrap_err();
        assert!(matches!(err, VmError::UnsupportedKeyType { type_name: "boolean" }));
        assert!(t.set(&MemCell::Nil, &MemCell::Nil).is_err());
        assert!(t.get(&MemCell::Number(f64::NAN)).is_err());
    }

    #[test]
    fn stored_strings_are_copies() {
        let t = Table::create();
        let mut key = s("name");
        let mut val = s("alpha");
        t.set(&key, &val).unwrap();
        if let (MemCell::Str(k), MemCell::Str(v)) = (&mut key, &mut val) {
            k.push('!');
            v.push('!');
        }
        assert!(matches!(t.get(&s("name")).unwrap(), Some(MemCell::Str(v)) if v == "alpha"));
    }

    #[test]
    fn stored_table_gains_reference() {
        let outer = Table::create();
        let inner = Table::create();
        outer.set(&s("child"), &MemCell::Table(inner.clone())).unwrap();
        assert_eq!(inner.ref_count(), 2);
        drop(outer);
        assert_eq!(inner.ref_count(), 1);
    }

    #[test]
    fn last_reference_destroys_table() {
        let t = Table::create();
        let weak = t.downgrade();
        let a = MemCell::Table(t.clone());
        let mut b = MemCell::Table(t.clone());
        drop(t);
        assert!(weak.is_alive());
        b.clear();
        assert!(weak.is_alive());
        drop(a);
        assert!(!weak.is_alive());
    }

    #[test]
    fn shallow_copy_shares_nested_tables() {
        let t = Table::create();
        let inner = Table::create();
        t.set(&MemCell::Number(0.0), &MemCell::Table(inner.clone())).unwrap();
        let copy = t.shallow_copy().unwrap();
        assert!(!copy.same(&t));
        assert_eq!(copy.len(), 1);
        assert_eq!(inner.ref_count(), 3);
    }

    #[test]
    fn display_marks_cycles() {
        let t = Table::create();
        t.set(&s("me"), &MemCell::Table(t.clone())).unwrap();
        assert_eq!(t.to_string(), "[{\"me\" : <cycle>}]");
        // break the cycle so the test does not leak
        t.set(&s("me"), &MemCell::Nil).unwrap();
        assert_eq!(t.ref_count(), 1);
    }

    // head -> ... -> tail, each table holding the next under "next"
    fn chain(depth: usize) -> (TableRef, WeakTable) {
        let tail = Table::create();
        let weak = tail.downgrade();
        let mut head = tail;
        for _ in 0..depth {
            let link = Table::create();
            link.set(&s("next"), &MemCell::Table(head)).unwrap();
            head = link;
        }
        (head, weak)
    }

    /// Runs `f` on a thread whose stack is far too small for recursive release.
    fn on_small_stack(f: impl FnOnce() + Send + 'static) {
        std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap();
    }

    #[test]
    fn long_chain_is_released_on_drop() {
        on_small_stack(|| {
            let (head, tail) = chain(10_000);
            assert!(tail.is_alive());
            drop(head);
            assert!(!tail.is_alive());
        });
    }

    #[test]
    fn long_chain_is_released_on_overwrite() {
        on_small_stack(|| {
            let (head, tail) = chain(10_000);
            let holder = Table::create();
            holder.set(&s("list"), &MemCell::Table(head)).unwrap();
            holder.set(&s("list"), &MemCell::Nil).unwrap();
            assert!(!tail.is_alive());
            assert_eq!(holder.len(), 1);
        });
    }

    #[test]
    fn shared_link_survives_release_of_chain() {
        let (head, _) = chain(10);
        let mut middle = head.clone();
        for _ in 0..5 {
            let next = middle.get(&s("next")).unwrap().unwrap();
            middle = next.as_table().unwrap().clone();
        }
        drop(head);
        assert_eq!(middle.ref_count(), 1);
        assert!(middle.get(&s("next")).unwrap().is_some());
    }

    #[test]
    fn keys_lists_strings_then_numbers() {
        let t = Table::create();
        t.set(&MemCell::Number(3.0), &MemCell::Nil).unwrap();
        t.set(&s("a"), &MemCell::Nil).unwrap();
        let keys = t.keys();
        assert!(matches!(&keys[0], MemCell::Str(k) if k == "a"));
        assert!(matches!(&keys[1], MemCell::Number(n) if *n == 3.0));
    }
}
