//! The pluggable-parser capability set and its registry.

use std::collections::HashMap;

use auditchain_model::event::Event;

/// What parsing one raw log line produced.
pub enum ParseOutcome {
    Event(Event),
    /// The line is not a statement worth auditing (e.g. a connection
    /// heartbeat); silently dropped, not an error.
    Skip,
    Error { message: String },
}

/// A single dialect's line-to-event capability.
pub trait LineParser: Send + Sync {
    fn parse_line(&self, line: &str) -> ParseOutcome;
}

/// Maps a `db_system` string (`"postgres"`, `"mysql"`, …) to the parser that
/// understands its raw log format.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Box<dyn LineParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        ParserRegistry {
            parsers: HashMap::new(),
        }
    }

    /// Register a parser under `db_system`. Registering the same name twice
    /// replaces the previous parser.
    pub fn register(&mut self, db_system: impl Into<String>, parser: Box<dyn LineParser>) {
        self.parsers.insert(db_system.into(), parser);
    }

    /// Build a registry with the two built-in dialects registered.
    pub fn with_builtins() -> Self {
        let mut registry = ParserRegistry::new();
        registry.register("postgres", Box::new(crate::postgres::PgAuditParser));
        registry.register("mysql", Box::new(crate::mysql::PerconaAuditParser));
        registry
    }

    /// Parse one line using the parser registered for `db_system`.
    pub fn parse_line(&self, db_system: &str, line: &str) -> ParseOutcome {
        match self.parsers.get(db_system) {
            Some(parser) => parser.parse_line(line),
            None => ParseOutcome::Error {
                message: format!("no parser registered for db_system '{db_system}'"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysSkip;
    impl LineParser for AlwaysSkip {
        fn parse_line(&self, _line: &str) -> ParseOutcome {
            ParseOutcome::Skip
        }
    }

    #[test]
    fn unregistered_db_system_produces_error() {
        let registry = ParserRegistry::new();
        match registry.parse_line("oracle", "anything") {
            ParseOutcome::Error { message } => assert!(message.contains("oracle")),
            _ => panic!("expected Error"),
        }
    }

    #[test]
    fn registering_a_parser_twice_replaces_it() {
        let mut registry = ParserRegistry::new();
        registry.register("test", Box::new(AlwaysSkip));
        registry.register("test", Box::new(AlwaysSkip));
        assert!(matches!(
            registry.parse_line("test", "x"),
            ParseOutcome::Skip
        ));
    }

    #[test]
    fn builtins_cover_postgres_and_mysql() {
        let registry = ParserRegistry::with_builtins();
        assert!(registry.parsers.contains_key("postgres"));
        assert!(registry.parsers.contains_key("mysql"));
    }
}
