//! Column width and truncation policy.
//!
//! Widths default to the field definitions of the registry. Individual
//! columns can be overridden from TOML:
//!
//! ```toml
//! strategy = "reject"
//!
//! [columns.14]
//! max_width = 40
//! strategy = "truncate"
//! ```

use super::fields::FieldDef;
use super::registry::registry;
use super::Category;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// What happens to a value wider than its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationStrategy {
    /// Cut the value to the column width.
    #[default]
    Truncate,
    /// Fail the row with `Error::FieldTooLong`.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPolicy {
    pub max_width: usize,
    pub strategy: TruncationStrategy,
}

/// Width policy per field ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnWidthConfig {
    columns: BTreeMap<u8, ColumnPolicy>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    strategy: Option<TruncationStrategy>,
    #[serde(default)]
    columns: HashMap<String, ColumnOverride>,
}

#[derive(Debug, Deserialize)]
struct ColumnOverride {
    max_width: Option<usize>,
    strategy: Option<TruncationStrategy>,
}

impl ColumnWidthConfig {
    /// Widths of `fields`, all truncating.
    pub fn from_fields(fields: &[FieldDef]) -> Self {
        let columns = fields
            .iter()
            .map(|field| {
                (
                    field.ordinal,
                    ColumnPolicy {
                        max_width: field.max_len,
                        strategy: TruncationStrategy::Truncate,
                    },
                )
            })
            .collect();
        Self { columns }
    }

    /// Default policy for the data columns of `category` in `version`.
    pub fn for_fields(version: u16, category: Category) -> Result<Self> {
        let fields = registry().format_enum_for(category, version)?;
        Ok(Self::from_fields(fields))
    }

    /// Apply `strategy` to every column.
    pub fn with_strategy(mut self, strategy: TruncationStrategy) -> Self {
        for policy in self.columns.values_mut() {
            policy.strategy = strategy;
        }
        self
    }

    pub fn set(&mut self, ordinal: u8, policy: ColumnPolicy) {
        self.columns.insert(ordinal, policy);
    }

    pub fn policy(&self, ordinal: u8) -> Option<&ColumnPolicy> {
        self.columns.get(&ordinal)
    }

    /// Default policy for `category` in `version` with TOML overrides applied.
    pub fn from_toml_str(version: u16, category: Category, content: &str) -> Result<Self> {
        Self::for_fields(version, category)?.with_overrides(content)
    }

    /// Layer TOML overrides on top of this configuration.
    pub fn with_overrides(self, content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = match file.strategy {
            Some(strategy) => self.with_strategy(strategy),
            None => self,
        };
        for (key, column) in file.columns {
            let ordinal: u8 = key
                .parse()
                .map_err(|_| Error::Config(format!("column key '{}' is not an ordinal", key)))?;
            let policy = config
                .columns
                .get_mut(&ordinal)
                .ok_or_else(|| Error::Config(format!("column {} does not exist", ordinal)))?;
            if let Some(max_width) = column.max_width {
                if max_width == 0 {
                    return Err(Error::Config(format!("column {} has zero width", ordinal)));
                }
                policy.max_width = max_width;
            }
            if let Some(strategy) = column.strategy {
                policy.strategy = strategy;
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_registry() {
        let config = ColumnWidthConfig::for_fields(700, Category::BookingBatch).unwrap();
        let posting_text = config.policy(14).unwrap();
        assert_eq!(posting_text.max_width, 60);
        assert_eq!(posting_text.strategy, TruncationStrategy::Truncate);
        assert!(config.policy(99).is_none());
        assert!(matches!(
            ColumnWidthConfig::for_fields(999, Category::BookingBatch),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_toml_overrides() {
        let config = ColumnWidthConfig::from_toml_str(
            700,
            Category::BookingBatch,
            r#"
                strategy = "reject"

                [columns.14]
                max_width = 40
                strategy = "truncate"
                "#,
        )
        .unwrap();
        assert_eq!(config.policy(14).unwrap().max_width, 40);
        assert_eq!(config.policy(14).unwrap().strategy, TruncationStrategy::Truncate);
        assert_eq!(config.policy(11).unwrap().strategy, TruncationStrategy::Reject);
    }

    #[test]
    fn test_toml_errors() {
        let base = ColumnWidthConfig::for_fields(510, Category::AccountLabels).unwrap();
        assert!(matches!(
            base.clone().with_overrides("[columns.x]\nmax_width = 3"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            base.clone().with_overrides("[columns.40]\nmax_width = 3"),
            Err(Error::Config(_))
        ));
        assert!(matches!(base.with_overrides("strategy = \"drop\""), Err(Error::Config(_))));
    }
}
