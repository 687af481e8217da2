//! SQL dialect support.
//!
//! The dialect owns everything that is spelled differently per database:
//! identifier quoting, literal escaping and the DDL synthesized from model
//! definitions.

mod mysql;

pub use mysql::MySqlDialect;

/// Trait for SQL dialect-specific behavior.
pub trait Dialect {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character (e.g., `"` for standard SQL, `` ` `` for MySQL).
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the escaped form of a single quote inside a string literal.
    fn string_escape(&self) -> &'static str {
        "''"
    }

    /// Returns the positional parameter placeholder.
    fn parameter_placeholder(&self) -> &'static str {
        "%s"
    }

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        format!("{quote}{name}{quote}")
    }

    /// Renders a single-quoted string literal.
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', self.string_escape()))
    }
}
