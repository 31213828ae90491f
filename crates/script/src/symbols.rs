//! Two-tier symbol table.
//!
//! Bindings live in a small dense slot array scanned in reverse (most
//! recently defined first) until the table outgrows it, at which point every
//! slot spills into a hash map for the rest of the table's life. Script
//! evaluations are short-lived and rarely exceed the dense tier.

use crate::error::{ScriptError, ScriptErrorKind};
use crate::token::{SpannedToken, Token};
use crate::value::Value;
use std::collections::HashMap;
use std::f64::consts::{E, PI};
use std::rc::Rc;

const BASE_SIZE: usize = 16;

#[derive(Clone)]
struct Slot {
    name: String,
    value: Rc<Value>,
    is_const: bool,
}

/// Which reserved constants a script actually references.
///
/// Built from a pre-scan of the token stream so that tables for small scripts
/// install only the constants they use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageScan {
    pub uses_t: bool,
    pub uses_f: bool,
    pub uses_null: bool,
    pub uses_pi: bool,
    pub uses_e: bool,
    pub uses_inf: bool,
    pub uses_nan: bool,
}

impl UsageScan {
    pub fn of_tokens(tokens: &[SpannedToken]) -> Self {
        let mut scan = Self::default();
        for spanned in tokens {
            if let Token::Identifier(name) = &spanned.token {
                match name.as_str() {
                    "T" => scan.uses_t = true,
                    "F" => scan.uses_f = true,
                    "NULL" => scan.uses_null = true,
                    "PI" => scan.uses_pi = true,
                    "E" => scan.uses_e = true,
                    "INF" => scan.uses_inf = true,
                    "NAN" => scan.uses_nan = true,
                    _ => {}
                }
            }
        }
        scan
    }

    pub fn all() -> Self {
        Self {
            uses_t: true,
            uses_f: true,
            uses_null: true,
            uses_pi: true,
            uses_e: true,
            uses_inf: true,
            uses_nan: true,
        }
    }
}

#[derive(Clone)]
pub struct SymbolTable {
    slots: Vec<Slot>,
    hash: HashMap<String, Slot>,
    using_slots: bool,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(BASE_SIZE),
            hash: HashMap::new(),
            using_slots: true,
        }
    }

    /// A table with the reserved constants the scanned script references.
    ///
    /// Installed from least to most likely to be used, so the reverse slot
    /// scan finds the common ones first.
    pub fn with_reserved(scan: &UsageScan) -> Self {
        let mut table = Self::new();
        let mut install = |name: &str, value: Value| {
            table
                .define_constant(name, Rc::new(value))
                .expect("fresh table cannot hold duplicates");
        };
        if scan.uses_nan {
            install("NAN", Value::float(f64::NAN));
        }
        if scan.uses_inf {
            install("INF", Value::float(f64::INFINITY));
        }
        if scan.uses_pi {
            install("PI", Value::float(PI));
        }
        if scan.uses_e {
            install("E", Value::float(E));
        }
        if scan.uses_null {
            install("NULL", Value::Null);
        }
        if scan.uses_f {
            install("F", Value::logical(false));
        }
        if scan.uses_t {
            install("T", Value::logical(true));
        }
        table
    }

    fn slot_index(&self, name: &str) -> Option<usize> {
        // reverse order: most recently defined symbols first
        self.slots.iter().rposition(|slot| slot.name == name)
    }

    fn switch_to_hash(&mut self) {
        for slot in self.slots.drain(..) {
            self.hash.insert(slot.name.clone(), slot);
        }
        self.using_slots = false;
    }

    pub fn get(&self, name: &str) -> Result<Rc<Value>, ScriptError> {
        let found = if self.using_slots {
            self.slot_index(name).map(|i| &self.slots[i])
        } else {
            self.hash.get(name)
        };
        found.map(|slot| Rc::clone(&slot.value)).ok_or_else(|| {
            ScriptError::new(
                ScriptErrorKind::UndefinedSymbol,
                format!("undefined identifier {name}"),
            )
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        if self.using_slots {
            self.slot_index(name).is_some()
        } else {
            self.hash.contains_key(name)
        }
    }

    /// Bind a variable, replacing any existing non-constant binding.
    pub fn set(&mut self, name: &str, value: Rc<Value>) -> Result<(), ScriptError> {
        if self.using_slots {
            if let Some(index) = self.slot_index(name) {
                let slot = &mut self.slots[index];
                if slot.is_const {
                    return Err(const_violation(name));
                }
                slot.value = value;
                return Ok(());
            }
            if self.slots.len() < BASE_SIZE {
                self.slots.push(Slot {
                    name: name.to_string(),
                    value,
                    is_const: false,
                });
                return Ok(());
            }
            self.switch_to_hash();
        }

        match self.hash.get_mut(name) {
            Some(slot) if slot.is_const => Err(const_violation(name)),
            Some(slot) => {
                slot.value = value;
                Ok(())
            }
            None => {
                self.hash.insert(
                    name.to_string(),
                    Slot {
                        name: name.to_string(),
                        value,
                        is_const: false,
                    },
                );
                Ok(())
            }
        }
    }

    /// Define a new constant; the name must not already be bound.
    pub fn define_constant(&mut self, name: &str, value: Rc<Value>) -> Result<(), ScriptError> {
        if self.contains(name) {
            return Err(ScriptError::new(
                ScriptErrorKind::Redefinition,
                format!("identifier {name} is already defined"),
            ));
        }
        if self.using_slots {
            if self.slots.len() < BASE_SIZE {
                self.slots.push(Slot {
                    name: name.to_string(),
                    value,
                    is_const: true,
                });
                return Ok(());
            }
            self.switch_to_hash();
        }
        self.hash.insert(
            name.to_string(),
            Slot {
                name: name.to_string(),
                value,
                is_const: true,
            },
        );
        Ok(())
    }

    /// Names of all constant bindings, for diagnostics.
    pub fn constant_names(&self) -> Vec<String> {
        let iter: Box<dyn Iterator<Item = &Slot>> = if self.using_slots {
            Box::new(self.slots.iter())
        } else {
            Box::new(self.hash.values())
        };
        iter.filter(|s| s.is_const).map(|s| s.name.clone()).collect()
    }

    /// Names of all variable bindings, for diagnostics.
    pub fn variable_names(&self) -> Vec<String> {
        let iter: Box<dyn Iterator<Item = &Slot>> = if self.using_slots {
            Box::new(self.slots.iter())
        } else {
            Box::new(self.hash.values())
        };
        iter.filter(|s| !s.is_const).map(|s| s.name.clone()).collect()
    }
}

fn const_violation(name: &str) -> ScriptError {
    ScriptError::new(
        ScriptErrorKind::ConstViolation,
        format!("identifier {name} cannot be redefined because it is a constant"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn test_set_get() {
        let mut table = SymbolTable::new();
        table.set("x", Rc::new(Value::integer(7))).unwrap();
        assert_eq!(*table.get("x").unwrap(), Value::integer(7));
        table.set("x", Rc::new(Value::integer(8))).unwrap();
        assert_eq!(*table.get("x").unwrap(), Value::integer(8));
    }

    #[test]
    fn test_undefined_symbol() {
        let table = SymbolTable::new();
        let err = table.get("missing").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::UndefinedSymbol);
    }

    #[test]
    fn test_const_violation() {
        let mut table = SymbolTable::new();
        table.define_constant("K", Rc::new(Value::integer(1))).unwrap();
        let err = table.set("K", Rc::new(Value::integer(2))).unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::ConstViolation);
    }

    #[test]
    fn test_redefinition() {
        let mut table = SymbolTable::new();
        table.set("x", Rc::new(Value::integer(1))).unwrap();
        let err = table.define_constant("x", Rc::new(Value::integer(2))).unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::Redefinition);
    }

    #[test]
    fn test_spill_to_hash() {
        let mut table = SymbolTable::new();
        for i in 0..40 {
            table
                .set(&format!("v{i}"), Rc::new(Value::integer(i)))
                .unwrap();
        }
        assert!(!table.using_slots);
        for i in 0..40 {
            assert_eq!(*table.get(&format!("v{i}")).unwrap(), Value::integer(i));
        }
        // constness survives the spill
        table.define_constant("K", Rc::new(Value::integer(-1))).unwrap();
        assert_eq!(
            table.set("K", Rc::new(Value::integer(0))).unwrap_err().kind,
            ScriptErrorKind::ConstViolation
        );
    }

    #[test]
    fn test_reserved_constants_from_scan() {
        let tokens = tokenize("x = T; y = PI;").unwrap();
        let scan = UsageScan::of_tokens(&tokens);
        assert!(scan.uses_t);
        assert!(scan.uses_pi);
        assert!(!scan.uses_f);

        let table = SymbolTable::with_reserved(&scan);
        assert_eq!(*table.get("T").unwrap(), Value::logical(true));
        assert!(table.get("F").is_err());
        assert!(table.get("NAN").is_err());
    }
}
