//! Error handling foundation for flowscribe.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error types in their own
//! error modules. Pure layers (parsing, graph building, rendering) return
//! those plain enums; I/O boundaries wrap them in a rootcause `Report`.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Unreadable;

    impl std::fmt::Display for Unreadable {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "unreadable")
        }
    }

    impl std::error::Error for Unreadable {}

    fn fails() -> Result<(), Unreadable> {
        Err(Unreadable.into())
    }

    #[test]
    fn result_type_works() {
        let ok: Result<i32> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }

    #[test]
    fn report_displays_context() {
        let err = fails().unwrap_err();
        assert!(err.to_string().contains("unreadable"));
    }
}
