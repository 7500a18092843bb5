//! Statement text plus bind variables.

use std::collections::BTreeMap;

use crate::error::DbError;
use crate::value::SqlValue;

/// Immutable statement with an ordered set of named bind variables.
///
/// `bind` returns a new query; the original is left untouched, so a base query
/// can be shared and specialised per call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    statement: String,
    bindings: BTreeMap<String, SqlValue>,
}

impl Query {
    /// Creates a query with the given statement and bindings.
    pub fn new(statement: impl Into<String>, bindings: BTreeMap<String, SqlValue>) -> Self {
        Self {
            statement: statement.into(),
            bindings,
        }
    }

    /// Creates a query without any bind variables.
    pub fn plain(statement: impl Into<String>) -> Self {
        Self::new(statement, BTreeMap::new())
    }

    /// Builds a query from a template where every `{}` becomes a fresh bind
    /// variable `@var_<n>` bound to the matching entry of `values`.
    ///
    /// `{{` and `}}` produce literal braces.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let q = Query::parameterized("SELECT * FROM x WHERE x.a = {}", vec!["a".into()])?;
    /// assert_eq!(q.statement(), "SELECT * FROM x WHERE x.a = @var_0");
    /// ```
    pub fn parameterized(template: &str, values: Vec<SqlValue>) -> Result<Self, DbError> {
        let mut statement = String::with_capacity(template.len() + values.len() * 8);
        let mut bindings = BTreeMap::new();
        let mut values = values.into_iter();
        let mut index = 0usize;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match (c, chars.peek()) {
                ('{', Some('{')) | ('}', Some('}')) => {
                    chars.next();
                    statement.push(c);
                }
                ('{', Some('}')) => {
                    chars.next();
                    let value = values.next().ok_or_else(|| DbError::Binding {
                        message: format!("template has more placeholders than the {} values given", index),
                    })?;
                    let name = format!("var_{}", index);
                    statement.push('@');
                    statement.push_str(&name);
                    bindings.insert(name, value);
                    index += 1;
                }
                ('{', _) | ('}', _) => {
                    return Err(DbError::Binding {
                        message: format!("unmatched '{}' in template", c),
                    });
                }
                _ => statement.push(c),
            }
        }

        let leftover = values.count();
        if leftover > 0 {
            return Err(DbError::Binding {
                message: format!("{} values given but template has {} placeholders", index + leftover, index),
            });
        }

        Ok(Self { statement, bindings })
    }

    /// Returns a new query with `name` bound to `value`, replacing any previous binding.
    pub fn bind(&self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        let mut bindings = self.bindings.clone();
        bindings.insert(name.into(), value.into());
        Self {
            statement: self.statement.clone(),
            bindings,
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Returns a reference to the underlying bindings map.
    pub fn bindings(&self) -> &BTreeMap<String, SqlValue> {
        &self.bindings
    }
}

/// Builds a [`Query`] from a template and values, see [`Query::parameterized`].
///
/// ```ignore
/// let q = sql!("SELECT name FROM users WHERE id = {} AND active = {}", 7, true)?;
/// ```
#[macro_export]
macro_rules! sql {
    ($template:expr $(, $value:expr)* $(,)?) => {
        $crate::Query::parameterized($template, vec![$($crate::SqlValue::from($value)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_bind_leaves_original_untouched() {
        let base = Query::plain("SELECT @a");
        let bound = base.bind("@a", "x");

        assert!(base.bindings().is_empty());
        assert_eq!(bound.bindings().get("@a"), Some(&SqlValue::Str("x".into())));
        assert_eq!(bound.statement(), base.statement());
    }

    #[rstest]
    fn test_bind_replaces_existing_value() {
        let q = Query::plain("SELECT :a").bind("a", 1).bind("a", 2);
        assert_eq!(q.bindings().len(), 1);
        assert_eq!(q.bindings().get("a"), Some(&SqlValue::Int(2)));
    }

    #[rstest]
    fn test_parameterized_replaces_placeholders() {
        let q = Query::parameterized("SELECT * FROM x WHERE x.a = {}", vec!["a".into()]).unwrap();
        assert_eq!(q.statement(), "SELECT * FROM x WHERE x.a = @var_0");
        assert_eq!(q.bindings().get("var_0"), Some(&SqlValue::Str("a".into())));
    }

    #[rstest]
    fn test_sql_macro_numbers_variables_in_order() {
        let q = sql!("UPDATE t SET a = {} WHERE b = {}", 10, "k").unwrap();
        assert_eq!(q.statement(), "UPDATE t SET a = @var_0 WHERE b = @var_1");
        assert_eq!(q.bindings().get("var_0"), Some(&SqlValue::Int(10)));
        assert_eq!(q.bindings().get("var_1"), Some(&SqlValue::Str("k".into())));
    }

    #[rstest]
    fn test_parameterized_escaped_braces() {
        let q = Query::parameterized("SELECT '{{}}', {}", vec![1.into()]).unwrap();
        assert_eq!(q.statement(), "SELECT '{}', @var_0");
    }

    #[rstest]
    #[case("SELECT {}, {}", 1)]
    #[case("SELECT {}", 2)]
    #[case("SELECT { ", 0)]
    fn test_parameterized_rejects_mismatches(#[case] template: &str, #[case] count: usize) {
        let values = (0..count as i64).map(SqlValue::from).collect();
        let err = Query::parameterized(template, values).unwrap_err();
        assert!(matches!(err, DbError::Binding { .. }));
    }
}
