use crate::role::Role;
use thiserror::Error;

/// Destructive operations refused for every role, administrators included.
const BLOCKED_COMMANDS: &[&str] = &[
    "rm -rf /",
    "sudo rm",
    "format c:",
    "mkfs",
    "dd if=",
    "> /dev/sda",
    "chmod 777 /",
    "chown root:root /",
    ":(){ :|:& };:",
];

/// Operations only the administrator role may issue.
const ADMIN_ONLY_COMMANDS: &[&str] = &[
    "userdel",
    "usermod",
    "passwd",
    "visudo",
    "systemctl",
    "service",
    "mount",
    "umount",
    "fdisk",
    "parted",
    "system delete",
    "user delete",
];

const STRIPPED_CHARS: &[char] = &[';', '&', '|', '`', '$', '(', ')'];
const MAX_COMMAND_LEN: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizerError {
    #[error("Dangerous command blocked: {0}")]
    Dangerous(String),

    #[error("Command '{pattern}' not allowed for role '{role}'")]
    InsufficientRole { pattern: String, role: Role },

    #[error("Malformed command: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandSanitizer;

impl CommandSanitizer {
    pub fn new() -> Self {
        Self
    }

    /// Check block lists for `role`, then strip separators, substitutions and
    /// traversal sequences. The lists are checked again on the stripped text
    /// so removed characters cannot splice a pattern together.
    pub fn sanitize(&self, command: &str, role: Role) -> Result<String, SanitizerError> {
        let cleaned = strip(command);
        let candidates = [command.trim().to_lowercase(), cleaned.to_lowercase()];

        for text in &candidates {
            if let Some(blocked) = BLOCKED_COMMANDS.iter().find(|b| text.contains(*b)) {
                return Err(SanitizerError::Dangerous(blocked.to_string()));
            }
        }

        if !role.is_admin() {
            for text in &candidates {
                if let Some(gated) = ADMIN_ONLY_COMMANDS.iter().find(|g| text.contains(*g)) {
                    return Err(SanitizerError::InsufficientRole {
                        pattern: gated.to_string(),
                        role,
                    });
                }
            }
        }

        Ok(cleaned)
    }

    /// Syntactic pre-check with no side effects.
    pub fn validate(&self, command: &str) -> bool {
        self.check_syntax(command).is_ok()
    }

    pub fn check_syntax(&self, command: &str) -> Result<(), SanitizerError> {
        if command.is_empty() {
            return Err(SanitizerError::Malformed("empty command".into()));
        }

        if command.chars().count() > MAX_COMMAND_LEN {
            return Err(SanitizerError::Malformed(format!(
                "command exceeds {} characters",
                MAX_COMMAND_LEN
            )));
        }

        if command.chars().any(is_binary_control) {
            return Err(SanitizerError::Malformed("control character in command".into()));
        }

        Ok(())
    }
}

fn strip(command: &str) -> String {
    let mut cleaned: String = command.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect();
    while cleaned.contains("../") {
        cleaned = cleaned.replace("../", "");
    }
    cleaned.trim().to_string()
}

fn is_binary_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_blocklist_applies_to_admin() {
        let sanitizer = CommandSanitizer::new();
        let result = sanitizer.sanitize("rm -rf /", Role::Admin);
        assert!(matches!(result, Err(SanitizerError::Dangerous(_))));
    }

    #[test]
    fn test_absolute_blocklist_every_role() {
        let sanitizer = CommandSanitizer::new();
        for role in Role::ALL {
            for blocked in BLOCKED_COMMANDS {
                let cmd = format!("echo hi && {}", blocked.to_uppercase());
                assert!(
                    matches!(sanitizer.sanitize(&cmd, role), Err(SanitizerError::Dangerous(_))),
                    "{} should be blocked for {}",
                    blocked,
                    role
                );
            }
        }
    }

    #[test]
    fn test_role_gated_list() {
        let sanitizer = CommandSanitizer::new();
        for gated in ADMIN_ONLY_COMMANDS {
            let cmd = format!("run {} now", gated);
            for role in Role::ALL {
                let result = sanitizer.sanitize(&cmd, role);
                if role.is_admin() {
                    assert!(result.is_ok(), "{} should pass for admin", gated);
                } else {
                    assert!(matches!(result, Err(SanitizerError::InsufficientRole { .. })));
                }
            }
        }
    }

    #[test]
    fn test_strips_metacharacters() {
        let sanitizer = CommandSanitizer::new();
        let clean = sanitizer
            .sanitize("pov list; cat ../../secret | grep $(whoami) `id`", Role::Dc)
            .unwrap();
        assert_eq!(clean, "pov list cat secret  grep whoami id");
    }

    #[test]
    fn test_stripping_cannot_splice_patterns() {
        let sanitizer = CommandSanitizer::new();
        assert!(matches!(
            sanitizer.sanitize("sys;temctl stop audit", Role::Dc),
            Err(SanitizerError::InsufficientRole { .. })
        ));
        assert!(matches!(
            sanitizer.sanitize("rm -rf $/", Role::Admin),
            Err(SanitizerError::Dangerous(_))
        ));
        assert_eq!(sanitizer.sanitize("cat ..././x", Role::Dc).unwrap(), "cat x");
    }

    #[test]
    fn test_catalog_style_command_passes() {
        let sanitizer = CommandSanitizer::new();
        let clean = sanitizer
            .sanitize("trr export --format csv --user-data-only", Role::Analyst)
            .unwrap();
        assert_eq!(clean, "trr export --format csv --user-data-only");
    }

    #[test]
    fn test_validate() {
        let sanitizer = CommandSanitizer::new();
        assert!(sanitizer.validate("pov list"));
        assert!(sanitizer.validate("line one\nline two\ttabbed"));
        assert!(!sanitizer.validate(""));
        assert!(!sanitizer.validate(&"a".repeat(1001)));
        assert!(sanitizer.validate(&"a".repeat(1000)));
        assert!(!sanitizer.validate("pov\u{0}list"));
        assert!(!sanitizer.validate("pov\u{7F}"));
    }
}
