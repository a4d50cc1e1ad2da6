//! The unit exchanged between a stream and its subscriber.

use std::fmt;

/// One emission from a stream.
///
/// A well-behaved stream emits zero or more `Value`s followed by at most one
/// terminal event (`Error` or `Complete`), and nothing after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T, E> {
    /// A payload value
    Value(T),

    /// Terminal failure
    Error(E),

    /// Terminal success
    Complete,
}

impl<T, E> Event<T, E> {
    /// Returns true for `Error` and `Complete`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Value(_))
    }

    /// Transforms the payload, leaving terminal events untouched.
    pub fn map_value<U>(self, f: impl FnOnce(T) -> U) -> Event<U, E> {
        match self {
            Event::Value(v) => Event::Value(f(v)),
            Event::Error(e) => Event::Error(e),
            Event::Complete => Event::Complete,
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Display for Event<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Value(v) => write!(f, "value {:?}", v),
            Event::Error(e) => write!(f, "error {:?}", e),
            Event::Complete => write!(f, "completion"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(!Event::<u8, ()>::Value(1).is_terminal());
        assert!(Event::<u8, ()>::Error(()).is_terminal());
        assert!(Event::<u8, ()>::Complete.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(Event::<_, ()>::Value("foo").to_string(), "value \"foo\"");
        assert_eq!(Event::<u8, _>::Error("boom").to_string(), "error \"boom\"");
        assert_eq!(Event::<u8, ()>::Complete.to_string(), "completion");
    }

    #[test]
    fn test_map_value_keeps_terminals() {
        let doubled: Event<u32, ()> = Event::Value(21).map_value(|v: u32| v * 2);
        assert_eq!(doubled, Event::Value(42));

        let err: Event<u32, &str> = Event::Error("x").map_value(|v: u8| v as u32);
        assert_eq!(err, Event::Error("x"));
    }
}
