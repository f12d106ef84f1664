//! User map files.
//!
//! Properties-style text: one `name=password` (or `name: password`) entry per
//! line, `#` and `!` start comments, blank lines are ignored, and a later
//! entry for the same name replaces an earlier one.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use trafficgen_core::{ConfigError, UserName};

/// Parses user map text.
///
/// # Errors
///
/// - `ConfigError::InvalidUserMap` - If a line has no separator or an invalid name
pub fn parse_user_map(text: &str) -> Result<BTreeMap<UserName, String>, ConfigError> {
    let mut users = BTreeMap::new();

    for (index, raw) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw.trim_start();
        if line.is_empty() || line.starts_with(['#', '!']) {
            continue;
        }

        let Some(split) = line.find(['=', ':']) else {
            return Err(ConfigError::InvalidUserMap {
                line: line_number,
                reason: "expected name=password".to_string(),
            });
        };
        let name = line[..split].trim_end();
        let password = line[split + 1..].trim();

        let user = UserName::new(name).map_err(|e| ConfigError::InvalidUserMap {
            line: line_number,
            reason: e.to_string(),
        })?;
        users.insert(user, password.to_string());
    }

    Ok(users)
}

/// Reads and parses a user map file.
///
/// # Errors
///
/// - If the file cannot be read or fails to parse
pub fn load_user_map(path: &Path) -> anyhow::Result<BTreeMap<UserName, String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read user map {}", path.display()))?;
    parse_user_map(&text).with_context(|| format!("Invalid user map {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn names(users: &BTreeMap<UserName, String>) -> Vec<(&str, &str)> {
        users
            .iter()
            .map(|(name, password)| (name.as_str(), password.as_str()))
            .collect()
    }

    #[test]
    fn test_parses_both_separators_and_comments() {
        let text = "\
# synthetic users
! another comment style

bob = pw2
alice:pw1
  carol=  pw with spaces
";
        let users = parse_user_map(text).unwrap();
        assert_eq!(
            names(&users),
            [("alice", "pw1"), ("bob", "pw2"), ("carol", "pw with spaces")]
        );
    }

    #[test]
    fn test_later_entry_wins() {
        let users = parse_user_map("alice=old\nalice=new\n").unwrap();
        assert_eq!(names(&users), [("alice", "new")]);
    }

    #[test]
    fn test_password_may_contain_separators() {
        let users = parse_user_map("alice=a=b:c\n").unwrap();
        assert_eq!(names(&users), [("alice", "a=b:c")]);
    }

    #[test]
    fn test_empty_password_is_kept_for_validation() {
        let users = parse_user_map("alice=\n").unwrap();
        assert_eq!(names(&users), [("alice", "")]);
    }

    #[test]
    fn test_reports_line_numbers() {
        assert_eq!(
            parse_user_map("alice=pw1\n\njust-a-name\n"),
            Err(ConfigError::InvalidUserMap {
                line: 3,
                reason: "expected name=password".to_string(),
            })
        );
        assert!(matches!(
            parse_user_map("Alice=pw1"),
            Err(ConfigError::InvalidUserMap { line: 1, .. })
        ));
    }

    #[test]
    fn test_empty_file_is_empty_map() {
        assert!(parse_user_map("").unwrap().is_empty());
        assert!(parse_user_map("# nobody\n").unwrap().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alice=pw1").unwrap();
        writeln!(file, "bob=pw2").unwrap();

        let users = load_user_map(file.path()).unwrap();
        assert_eq!(users.len(), 2);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let error = load_user_map(&dir.path().join("missing.properties")).unwrap_err();
        assert!(error.to_string().contains("Cannot read user map"));
    }
}
