//! Config validation logic.
//! Rejects rename parameters that could not produce a sibling file name.

use anyhow::{Result, bail};

use super::types::Config;
use crate::conflict::ConflictStrategy;

fn ensure_name_fragment(value: &str, field: &str) -> Result<()> {
    if value.contains(['/', '\\', '\0']) {
        bail!("{field} must not contain path separators or NUL: '{value}'");
    }
    Ok(())
}

impl Config {
    /// Validate settings that would otherwise only fail at the first conflict.
    pub fn validate(&self) -> Result<()> {
        if let ConflictStrategy::RenameWithNumber(numbered) = &self.conflict {
            if numbered.limit == 0 {
                bail!("number_limit must be at least 1");
            }
            ensure_name_fragment(&numbered.separator, "number_separator")?;
            ensure_name_fragment(&numbered.prefix, "number_prefix")?;
        }
        Ok(())
    }
}
