//! Optional value container with singleton `Nothing`.

use std::hash::{Hash, Hasher};

use thiserror::Error;

/// Raised when the value of a [`Maybe::Nothing`] is requested.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Value was null")]
pub struct NoValue;

/// Marker that compares equal to every `Maybe::Nothing`, whatever its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nothing;

/// Either a value or nothing.
///
/// Unlike `Option`, equality and hashing treat every `Nothing` as the same
/// logical value: `Maybe::<A>::Nothing == Maybe::<B>::Nothing` whenever the two
/// types are comparable, and all of them compare equal to the [`Nothing`] marker
/// and hash identically.
#[derive(Debug, Clone, Copy)]
pub enum Maybe<T> {
    Just(T),
    Nothing,
}

impl<T> Maybe<T> {
    pub fn just(value: T) -> Self {
        Maybe::Just(value)
    }

    pub fn nothing() -> Self {
        Maybe::Nothing
    }

    /// Lifts an `Option` into a `Maybe`.
    pub fn of(value: Option<T>) -> Self {
        match value {
            Some(v) => Maybe::Just(v),
            None => Maybe::Nothing,
        }
    }

    pub fn exists(&self) -> bool {
        matches!(self, Maybe::Just(_))
    }

    /// Returns the wrapped value, or [`NoValue`] for `Nothing`.
    pub fn value(self) -> Result<T, NoValue> {
        match self {
            Maybe::Just(v) => Ok(v),
            Maybe::Nothing => Err(NoValue),
        }
    }

    pub fn as_ref(&self) -> Maybe<&T> {
        match self {
            Maybe::Just(v) => Maybe::Just(v),
            Maybe::Nothing => Maybe::Nothing,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Maybe<U> {
        match self {
            Maybe::Just(v) => Maybe::Just(f(v)),
            Maybe::Nothing => Maybe::Nothing,
        }
    }

    pub fn flat_map<U, F: FnOnce(T) -> Maybe<U>>(self, f: F) -> Maybe<U> {
        match self {
            Maybe::Just(v) => f(v),
            Maybe::Nothing => Maybe::Nothing,
        }
    }

    pub fn get_or_else(self, alt: T) -> T {
        match self {
            Maybe::Just(v) => v,
            Maybe::Nothing => alt,
        }
    }

    /// Like [`get_or_else`](Self::get_or_else) but only computes the default when needed.
    pub fn get_or_else_get<F: FnOnce() -> T>(self, alt: F) -> T {
        match self {
            Maybe::Just(v) => v,
            Maybe::Nothing => alt(),
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Maybe::Just(v) => Some(v),
            Maybe::Nothing => None,
        }
    }
}

impl<T> Default for Maybe<T> {
    fn default() -> Self {
        Maybe::Nothing
    }
}

impl<T> From<Option<T>> for Maybe<T> {
    fn from(value: Option<T>) -> Self {
        Maybe::of(value)
    }
}

impl<T> From<Maybe<T>> for Option<T> {
    fn from(value: Maybe<T>) -> Self {
        value.into_option()
    }
}

impl<A: PartialEq<B>, B> PartialEq<Maybe<B>> for Maybe<A> {
    fn eq(&self, other: &Maybe<B>) -> bool {
        match (self, other) {
            (Maybe::Just(a), Maybe::Just(b)) => a == b,
            (Maybe::Nothing, Maybe::Nothing) => true,
            _ => false,
        }
    }
}

impl<T: Eq> Eq for Maybe<T> {}

impl<T> PartialEq<Nothing> for Maybe<T> {
    fn eq(&self, _other: &Nothing) -> bool {
        matches!(self, Maybe::Nothing)
    }
}

impl<T> PartialEq<Maybe<T>> for Nothing {
    fn eq(&self, other: &Maybe<T>) -> bool {
        matches!(other, Maybe::Nothing)
    }
}

impl<T: Hash> Hash for Maybe<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Maybe::Just(v) => {
                state.write_u8(1);
                v.hash(state);
            }
            // Same bytes for every T
            Maybe::Nothing => state.write_u8(0),
        }
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Maybe<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Maybe::Just(v) => write!(f, "Just({})", v),
            Maybe::Nothing => write!(f, "Nothing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<H: Hash>(value: &H) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[rstest]
    fn test_nothing_is_a_singleton() {
        assert_eq!(Maybe::<i32>::Nothing, Nothing);
        assert_eq!(Maybe::<String>::Nothing, Nothing);
        assert_eq!(Nothing, Maybe::<Vec<u8>>::Nothing);
        assert_eq!(Maybe::<String>::Nothing, Maybe::<&str>::Nothing);
        assert_eq!(hash_of(&Maybe::<i32>::Nothing), hash_of(&Maybe::<String>::Nothing));
    }

    #[rstest]
    fn test_just_equality_follows_inner_value() {
        assert_eq!(Maybe::just(String::from("a")), Maybe::just("a"));
        assert_ne!(Maybe::just(1i32), Maybe::just(2i32));
        assert_ne!(Maybe::just(1i32), Maybe::<i32>::Nothing);
        assert_ne!(Maybe::just(1), Nothing);
    }

    #[rstest]
    fn test_value_on_nothing_fails() {
        assert_eq!(Maybe::<i32>::Nothing.value(), Err(NoValue));
        assert_eq!(Maybe::just(5).value(), Ok(5));
    }

    #[rstest]
    fn test_defaults() {
        assert_eq!(Maybe::Nothing.get_or_else(3), 3);
        assert_eq!(Maybe::just(1).get_or_else(3), 1);
        assert_eq!(Maybe::just(1).get_or_else_get(|| panic!("not evaluated")), 1);
        assert_eq!(Maybe::Nothing.get_or_else_get(|| 9), 9);
    }

    #[rstest]
    fn test_option_round_trip() {
        assert_eq!(Maybe::of(Some(1i32)), Maybe::just(1i32));
        assert_eq!(Maybe::<i32>::of(None), Nothing);
        assert_eq!(Option::from(Maybe::just(2)), Some(2));
    }

    #[rstest]
    fn test_display() {
        assert_eq!(Maybe::just(4).to_string(), "Just(4)");
        assert_eq!(Maybe::<i32>::Nothing.to_string(), "Nothing");
    }

    fn maybe_i64() -> impl Strategy<Value = Maybe<i64>> {
        proptest::option::of(any::<i64>()).prop_map(Maybe::of)
    }

    fn f(x: i64) -> i64 {
        x.wrapping_mul(3)
    }

    fn g(x: i64) -> i64 {
        x.wrapping_sub(7)
    }

    fn k(x: i64) -> Maybe<i64> {
        if x % 2 == 0 { Maybe::just(x / 2) } else { Maybe::Nothing }
    }

    fn h(x: i64) -> Maybe<i64> {
        if x > 0 { Maybe::just(x.wrapping_add(1)) } else { Maybe::Nothing }
    }

    proptest! {
        #[test]
        fn functor_identity(m in maybe_i64()) {
            prop_assert_eq!(m.map(|x| x), m);
        }

        #[test]
        fn functor_composition(m in maybe_i64()) {
            prop_assert_eq!(m.map(f).map(g), m.map(|x| g(f(x))));
        }

        #[test]
        fn monad_left_identity(x in any::<i64>()) {
            prop_assert_eq!(Maybe::just(x).flat_map(k), k(x));
        }

        #[test]
        fn monad_right_identity(m in maybe_i64()) {
            prop_assert_eq!(m.flat_map(Maybe::just), m);
        }

        #[test]
        fn monad_associativity(m in maybe_i64()) {
            prop_assert_eq!(m.flat_map(k).flat_map(h), m.flat_map(|x| k(x).flat_map(h)));
        }
    }
}
