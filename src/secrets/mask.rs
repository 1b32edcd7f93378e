//! Output masking for secret values.

use crate::config::ProvisionConfig;

/// Secrets shorter than this are masked only where they stand alone, so a
/// one-letter password does not shred unrelated words.
const SHORT_SECRET_LEN: usize = 6;

/// Masks secret values in text shown to the operator.
///
/// # Example
///
/// ```
/// use provision::secrets::OutputMasker;
///
/// let mut masker = OutputMasker::new();
/// masker.add_secret("s3cr3t");
///
/// let output = masker.mask("bench new-site erp --admin-password s3cr3t");
/// assert_eq!(output, "bench new-site erp --admin-password [REDACTED]");
/// ```
#[derive(Debug, Clone)]
pub struct OutputMasker {
    /// Secret values, longest first so overlapping secrets mask fully.
    secrets: Vec<String>,
    /// The mask string to use.
    mask: String,
}

impl OutputMasker {
    /// Create a new masker with default mask string.
    pub fn new() -> Self {
        Self {
            secrets: Vec::new(),
            mask: "[REDACTED]".to_string(),
        }
    }

    /// Create a masker for every credential in `config`.
    pub fn from_config(config: &ProvisionConfig) -> Self {
        let mut masker = Self::new();
        masker.add_secrets(
            [&config.admin_password, &config.db_root_password]
                .into_iter()
                .flatten()
                .cloned(),
        );
        masker
    }

    /// Register a secret value to be masked.
    ///
    /// Empty strings and duplicates are ignored.
    pub fn add_secret(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() || self.secrets.contains(&value) {
            return;
        }
        self.secrets.push(value);
        self.secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
    }

    /// Register multiple secret values.
    pub fn add_secrets(&mut self, values: impl IntoIterator<Item = impl Into<String>>) {
        for value in values {
            self.add_secret(value);
        }
    }

    /// Mask any secret values in the given string.
    pub fn mask(&self, input: &str) -> String {
        let mut result = input.to_string();
        for secret in &self.secrets {
            if !result.contains(secret.as_str()) {
                continue;
            }
            result = if secret.chars().count() < SHORT_SECRET_LEN {
                replace_standalone(&result, secret, &self.mask)
            } else {
                result.replace(secret.as_str(), &self.mask)
            };
        }
        result
    }

    /// Get the number of registered secrets.
    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }
}

/// Replace occurrences of `needle` not touching a letter or digit on either side.
fn replace_standalone(haystack: &str, needle: &str, replacement: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (start, _) in haystack.match_indices(needle) {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        if before.is_some_and(is_word) || after.is_some_and(is_word) {
            continue;
        }
        out.push_str(&haystack[last..start]);
        out.push_str(replacement);
        last = end;
    }
    out.push_str(&haystack[last..]);
    out
}

impl Default for OutputMasker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_single_secret() {
        let mut masker = OutputMasker::new();
        masker.add_secret("super-secret-value");

        let output = masker.mask("The key is super-secret-value here");

        assert_eq!(output, "The key is [REDACTED] here");
    }

    #[test]
    fn masks_every_occurrence() {
        let mut masker = OutputMasker::new();
        masker.add_secret("pw");

        assert_eq!(masker.mask("pw pw"), "[REDACTED] [REDACTED]");
    }

    #[test]
    fn longer_secret_wins_over_its_prefix() {
        let mut masker = OutputMasker::new();
        masker.add_secret("admin");
        masker.add_secret("admin-root-123");

        let output = masker.mask("root=admin-root-123");

        assert_eq!(output, "root=[REDACTED]");
        assert!(!output.contains("-root-123"));
    }

    #[test]
    fn ignores_empty_and_duplicate_secrets() {
        let mut masker = OutputMasker::new();
        masker.add_secret("");
        masker.add_secret("real-secret");
        masker.add_secret("real-secret");

        assert_eq!(masker.secret_count(), 1);
    }

    #[test]
    fn collects_passwords_from_config() {
        let config = ProvisionConfig {
            admin_password: Some("admin-pw".to_string()),
            db_root_password: Some("root-pw".to_string()),
            ..Default::default()
        };

        let masker = OutputMasker::from_config(&config);

        assert_eq!(masker.secret_count(), 2);
        assert!(!masker.mask("admin-pw root-pw").contains("pw"));
    }

    #[test]
    fn short_secret_leaves_other_words_alone() {
        let mut masker = OutputMasker::new();
        masker.add_secret("b");

        let output = masker.mask("docker compose -f docker-compose.yml build --admin-password b");

        assert_eq!(
            output,
            "docker compose -f docker-compose.yml build --admin-password [REDACTED]"
        );
    }

    #[test]
    fn short_secret_is_masked_next_to_punctuation() {
        let mut masker = OutputMasker::new();
        masker.add_secret("pw1");

        assert_eq!(masker.mask("password=pw1;"), "password=[REDACTED];");
        assert_eq!(masker.mask("pw12"), "pw12");
    }

    #[test]
    fn text_without_secrets_is_unchanged() {
        let mut masker = OutputMasker::new();
        masker.add_secret("hidden");

        assert_eq!(masker.mask("docker compose up -d"), "docker compose up -d");
    }
}
