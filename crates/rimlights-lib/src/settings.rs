//! Settings tree navigation for indicator configuration.
//!
//! The configuration file is kept as a raw TOML table and walked with
//! [`Clause`], which remembers its dotted path (for diagnostics) and its
//! enclosing clause (for inherited keys such as a group-level `value`).
//! Scalar-or-list fields are normalized here so callers never branch on arity.

use toml::{Table, Value};

use crate::error::{Result, RimlightsError};

/// A table in the settings tree, with its path and enclosing clause.
#[derive(Debug)]
pub struct Clause<'a> {
    table: &'a Table,
    path: String,
    parent: Option<&'a Clause<'a>>,
}

impl<'a> Clause<'a> {
    pub fn root(table: &'a Table) -> Self {
        Clause {
            table,
            path: String::new(),
            parent: None,
        }
    }

    /// Dotted path of this clause, `(root)` for the document itself.
    pub fn path(&self) -> &str {
        if self.path.is_empty() {
            "(root)"
        } else {
            &self.path
        }
    }

    /// Dotted path of `key` inside this clause.
    pub fn key_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.table.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    /// Child table at `key`. Missing is `None`; a non-table is an error.
    pub fn table<'s>(&'s self, key: &str) -> Result<Option<Clause<'s>>> {
        match self.table.get(key) {
            None => Ok(None),
            Some(Value::Table(t)) => Ok(Some(Clause {
                table: t,
                path: self.key_path(key),
                parent: Some(self),
            })),
            Some(other) => Err(config_error(
                &self.key_path(key),
                format!("expected a table, got {}", other.type_str()),
            )),
        }
    }

    /// Array of tables at `key`. Missing is an empty list.
    ///
    /// Elements are parented to this clause, so they inherit from it.
    pub fn list<'s>(&'s self, key: &str) -> Result<Vec<Clause<'s>>> {
        let path = self.key_path(key);
        match self.table.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Table(t) => Ok(Clause {
                        table: t,
                        path: format!("{path}[{i}]"),
                        parent: Some(self),
                    }),
                    other => Err(config_error(
                        &format!("{path}[{i}]"),
                        format!("expected a table, got {}", other.type_str()),
                    )),
                })
                .collect(),
            Some(other) => Err(config_error(
                &path,
                format!("expected an array of tables, got {}", other.type_str()),
            )),
        }
    }

    /// Nearest value for `key` in this clause or any enclosing one, with the
    /// dotted path where it was found.
    pub fn inherited(&self, key: &str) -> Option<(&'a Value, String)> {
        let mut cur = Some(self);
        while let Some(c) = cur {
            if let Some(v) = c.table.get(key) {
                return Some((v, c.key_path(key)));
            }
            cur = c.parent;
        }
        None
    }
}

pub(crate) fn config_error(path: &str, msg: impl std::fmt::Display) -> RimlightsError {
    RimlightsError::Config(format!("{path}: {msg}"))
}

// ── Normalization ──

/// Items of an array, or the value itself as a single item.
pub fn one_or_many(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        scalar => vec![scalar],
    }
}

/// A number; integers and floats coerce to each other.
pub fn number(value: &Value, path: &str) -> Result<f64> {
    match value {
        Value::Integer(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(config_error(
            path,
            format!("expected a number, got {}", other.type_str()),
        )),
    }
}

/// An integer; floats without a fractional part are accepted.
pub fn integer(value: &Value, path: &str) -> Result<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
        other => Err(config_error(
            path,
            format!("expected an integer, got {other}"),
        )),
    }
}

/// A flag; integers are true when non-zero.
pub fn flag(value: &Value, path: &str) -> Result<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Integer(n) => Ok(*n != 0),
        other => Err(config_error(
            path,
            format!("expected a boolean, got {}", other.type_str()),
        )),
    }
}

/// One number or a non-empty list of numbers.
pub fn numbers(value: &Value, path: &str) -> Result<Vec<f64>> {
    let items = one_or_many(value);
    if items.is_empty() {
        return Err(config_error(path, "list must not be empty"));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, v)| number(v, &format!("{path}[{i}]")))
        .collect()
}

/// One flag or a list of flags.
pub fn flags(value: &Value, path: &str) -> Result<Vec<bool>> {
    one_or_many(value)
        .iter()
        .enumerate()
        .map(|(i, v)| flag(v, &format!("{path}[{i}]")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Table {
        toml::from_str(s).unwrap()
    }

    // ── Clause navigation ──

    #[test]
    fn root_path_display() {
        let t = Table::new();
        let root = Clause::root(&t);
        assert_eq!(root.path(), "(root)");
        assert_eq!(root.key_path("cycle_ms"), "cycle_ms");
    }

    #[test]
    fn list_paths_are_indexed() {
        let t = parse(
            r#"
[[rpm.leds]]
n = 1
[[rpm.leds]]
n = 2
"#,
        );
        let root = Clause::root(&t);
        let rpm = root.table("rpm").unwrap().unwrap();
        let leds = rpm.list("leds").unwrap();
        assert_eq!(leds.len(), 2);
        assert_eq!(leds[1].path(), "rpm.leds[1]");
    }

    #[test]
    fn missing_list_is_empty() {
        let t = parse("x = 1");
        let root = Clause::root(&t);
        assert!(root.list("leds").unwrap().is_empty());
        assert!(root.table("rpm").unwrap().is_none());
    }

    #[test]
    fn list_of_scalars_is_error() {
        let t = parse("leds = [1, 2]");
        let root = Clause::root(&t);
        let err = root.list("leds").unwrap_err();
        assert!(err.to_string().contains("leds[0]"));
    }

    #[test]
    fn table_wrong_type_is_error() {
        let t = parse("rpm = 3");
        let root = Clause::root(&t);
        assert!(root.table("rpm").is_err());
    }

    // ── inherited ──

    #[test]
    fn inherited_prefers_nearest() {
        let t = parse(
            r#"
[rpm]
value = { offset = 8 }
[[rpm.leds]]
n = 1
[[rpm.leds]]
n = 2
value = { offset = 16 }
"#,
        );
        let root = Clause::root(&t);
        let rpm = root.table("rpm").unwrap().unwrap();
        let leds = rpm.list("leds").unwrap();

        let (v, path) = leds[0].inherited("value").unwrap();
        assert_eq!(path, "rpm.value");
        assert_eq!(v.get("offset").and_then(Value::as_integer), Some(8));

        let (v, path) = leds[1].inherited("value").unwrap();
        assert_eq!(path, "rpm.leds[1].value");
        assert_eq!(v.get("offset").and_then(Value::as_integer), Some(16));
    }

    #[test]
    fn inherited_reaches_root() {
        let t = parse(
            r#"
value = { offset = 4 }
[[buttons.leds]]
n = 1
"#,
        );
        let root = Clause::root(&t);
        let buttons = root.table("buttons").unwrap().unwrap();
        let leds = buttons.list("leds").unwrap();
        let (_, path) = leds[0].inherited("value").unwrap();
        assert_eq!(path, "value");
    }

    #[test]
    fn inherited_missing_is_none() {
        let t = parse("[[rpm.leds]]\nn = 1");
        let root = Clause::root(&t);
        let rpm = root.table("rpm").unwrap().unwrap();
        let leds = rpm.list("leds").unwrap();
        assert!(leds[0].inherited("value").is_none());
    }

    // ── Normalization ──

    #[test]
    fn numbers_scalar_and_list() {
        assert_eq!(numbers(&Value::Integer(5), "l").unwrap(), vec![5.0]);
        let list = Value::Array(vec![Value::Integer(1), Value::Float(2.5)]);
        assert_eq!(numbers(&list, "l").unwrap(), vec![1.0, 2.5]);
    }

    #[test]
    fn numbers_empty_list_is_error() {
        assert!(numbers(&Value::Array(vec![]), "level").is_err());
    }

    #[test]
    fn numbers_reject_strings_with_path() {
        let list = Value::Array(vec![Value::Integer(1), Value::String("x".into())]);
        let err = numbers(&list, "rpm.leds[0].level").unwrap_err();
        assert!(err.to_string().contains("rpm.leds[0].level[1]"));
    }

    #[test]
    fn flags_accept_ints_and_bools() {
        let list = Value::Array(vec![Value::Boolean(true), Value::Integer(0)]);
        assert_eq!(flags(&list, "inv").unwrap(), vec![true, false]);
        assert_eq!(flags(&Value::Boolean(true), "inv").unwrap(), vec![true]);
    }

    #[test]
    fn integer_coerces_whole_floats() {
        assert_eq!(integer(&Value::Float(12.0), "n").unwrap(), 12);
        assert!(integer(&Value::Float(1.5), "n").is_err());
    }
}
