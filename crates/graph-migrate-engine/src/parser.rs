//! Cypher statement splitter.
//!
//! Migration files hold any number of statements separated by `;` at the end
//! of a line. [`Statements`] walks the text line by line and yields each
//! statement with its terminator stripped:
//!
//! - lines whose trimmed text starts with `//` are comments and skipped;
//! - blank lines are skipped;
//! - a statement ends at the first line whose trimmed text ends with `;`;
//! - text left over after the last terminator is yielded as a final statement.
//!
//! The splitter does not understand string literals, so a `;` at the end of a
//! line inside a multi-line string still ends the statement.

/// The marker that starts a comment line.
pub const COMMENT_MARKER: &str = "//";

/// An iterator over the statements of a migration file.
///
/// A clone continues from the current position. Call [`Statements::new`]
/// again to start over.
///
/// # Examples
///
/// ```
/// use graph_migrate_engine::parser::Statements;
///
/// let text = "// users\nCREATE (u:User);\n\nMATCH (n)\nRETURN n;";
/// let statements: Vec<String> = Statements::new(text).collect();
/// assert_eq!(statements, vec!["CREATE (u:User)", "MATCH (n)\nRETURN n"]);
/// ```
#[derive(Debug, Clone)]
pub struct Statements<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> Statements<'a> {
    /// Creates a statement iterator over `text`.
    pub fn new(text: &'a str) -> Self {
        Self { lines: text.lines() }
    }
}

impl Iterator for Statements<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let mut buffer: Vec<&str> = Vec::new();

        for line in self.lines.by_ref() {
            let line = line.trim_end();
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
                continue;
            }

            if let Some(body) = line.strip_suffix(';') {
                buffer.push(body);
                let statement = buffer.join("\n").trim().to_string();
                if statement.is_empty() {
                    // A lone terminator closes nothing.
                    buffer.clear();
                    continue;
                }
                return Some(statement);
            }
            buffer.push(line);
        }

        let rest = buffer.join("\n").trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

impl std::iter::FusedIterator for Statements<'_> {}

/// Splits `text` into statements, in file order.
pub fn parse_statements(text: &str) -> Vec<String> {
    Statements::new(text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(parse_statements("").is_empty());
        assert!(parse_statements("\n\n   \n").is_empty());
    }

    #[test]
    fn test_comments_only() {
        let text = "// identity: core/001_init\n  // indented comment\n";
        assert!(parse_statements(text).is_empty());
    }

    #[test]
    fn test_single_line_statements() {
        let text = "CREATE (a:A);\nCREATE (b:B);\n";
        assert_eq!(parse_statements(text), vec!["CREATE (a:A)", "CREATE (b:B)"]);
    }

    #[test]
    fn test_multi_line_statement_joined_with_newlines() {
        let text = "MATCH (u:User)   \n  WHERE u.active\nRETURN u;";
        assert_eq!(
            parse_statements(text),
            vec!["MATCH (u:User)\n  WHERE u.active\nRETURN u"]
        );
    }

    #[test]
    fn test_comment_inside_statement_is_dropped() {
        let text = "MATCH (n)\n// explain\nRETURN n;";
        assert_eq!(parse_statements(text), vec!["MATCH (n)\nRETURN n"]);
    }

    #[test]
    fn test_lone_terminator_is_skipped() {
        let text = "CREATE (a:A);\n;\n  ;  \nCREATE (b:B);";
        assert_eq!(parse_statements(text), vec!["CREATE (a:A)", "CREATE (b:B)"]);
    }

    #[test]
    fn test_trailing_unterminated_statement() {
        let text = "CREATE (a:A);\nCREATE INDEX user_email\nFOR (u:User) ON (u.email)";
        assert_eq!(
            parse_statements(text),
            vec!["CREATE (a:A)", "CREATE INDEX user_email\nFOR (u:User) ON (u.email)"]
        );
    }

    #[test]
    fn test_terminator_with_trailing_whitespace() {
        assert_eq!(parse_statements("RETURN 1;   \t"), vec!["RETURN 1"]);
    }

    #[test]
    fn test_semicolon_mid_line_does_not_split() {
        assert_eq!(
            parse_statements("RETURN 'a;b' AS x;"),
            vec!["RETURN 'a;b' AS x"]
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = "CREATE (a:A);\r\nCREATE (b:B);\r\n";
        assert_eq!(parse_statements(text), vec!["CREATE (a:A)", "CREATE (b:B)"]);
    }

    #[test]
    fn test_iterator_is_restartable() {
        let text = "A;\nB;\nC;";
        let statements = Statements::new(text);
        let first: Vec<_> = statements.clone().collect();
        let second: Vec<_> = statements.collect();
        assert_eq!(first, second);
        assert_eq!(Statements::new(text).count(), 3);
    }

    #[test]
    fn test_clone_forks_at_position() {
        let mut statements = Statements::new("A;\nB;\nC;");
        assert_eq!(statements.next().as_deref(), Some("A"));
        let fork = statements.clone();
        assert_eq!(fork.collect::<Vec<_>>(), vec!["B", "C"]);
        assert_eq!(statements.collect::<Vec<_>>(), vec!["B", "C"]);
    }

    #[test]
    fn test_fused_after_end() {
        let mut statements = Statements::new("A;");
        assert!(statements.next().is_some());
        assert!(statements.next().is_none());
        assert!(statements.next().is_none());
    }
}
