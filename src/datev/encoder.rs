//! Row encoder: supplied values → positional, quoted DATEV cells.

use super::columns::{ColumnWidthConfig, TruncationStrategy};
use super::fields::FieldDef;
use super::registry::registry;
use super::Category;
use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::debug;

/// One encoded row. Cells are final text: alphanumeric cells already carry
/// their enclosure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow(Vec<String>);

impl CsvRow {
    pub fn cells(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop cells after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub fn to_line(&self, delimiter: char) -> String {
        self.0.join(&delimiter.to_string())
    }
}

/// Builds rows for one field list under one column policy.
#[derive(Debug, Clone)]
pub struct RowEncoder {
    fields: Vec<FieldDef>,
    config: ColumnWidthConfig,
    defaults: HashMap<&'static str, String>,
    enclosure: char,
}

impl RowEncoder {
    pub fn new(fields: &[FieldDef], config: ColumnWidthConfig) -> Self {
        let mut fields = fields.to_vec();
        fields.sort_by_key(|field| field.ordinal);
        Self {
            fields,
            config,
            defaults: HashMap::new(),
            enclosure: '"',
        }
    }

    /// Encoder for the data rows of `category` in `version`, truncating.
    pub fn for_category(version: u16, category: Category) -> Result<Self> {
        let fields = registry().format_enum_for(category, version)?;
        Ok(Self::new(fields, ColumnWidthConfig::from_fields(fields)))
    }

    pub fn with_config(mut self, config: ColumnWidthConfig) -> Self {
        self.config = config;
        self
    }

    /// Values used for keys the caller leaves unset.
    pub fn with_defaults(mut self, defaults: HashMap<&'static str, String>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_enclosure(mut self, enclosure: char) -> Self {
        self.enclosure = enclosure;
        self
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Encode one row in canonical field order.
    ///
    /// Values are looked up by field key; a missing key falls back to the
    /// default and then to the empty string. Alphanumeric cells are always
    /// enclosed, other cells never.
    pub fn build_row(&self, values: &HashMap<String, String>) -> Result<CsvRow> {
        let mut cells = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = values
                .get(field.key)
                .map(String::as_str)
                .or_else(|| self.defaults.get(field.key).map(String::as_str))
                .unwrap_or_default();
            let value = self.fit(field, value)?;
            if field.is_quoted() {
                cells.push(self.enclose(&value));
            } else {
                field.check_value(&value)?;
                cells.push(value);
            }
        }
        Ok(CsvRow(cells))
    }

    fn fit(&self, field: &FieldDef, value: &str) -> Result<String> {
        let (max, strategy) = match self.config.policy(field.ordinal) {
            Some(policy) => (policy.max_width, policy.strategy),
            None => (field.max_len, TruncationStrategy::Truncate),
        };
        let length = value.chars().count();
        if length <= max {
            return Ok(value.to_string());
        }
        match strategy {
            TruncationStrategy::Truncate => {
                debug!(field = field.label, length, max, "truncating DATEV value");
                Ok(value.chars().take(max).collect())
            }
            TruncationStrategy::Reject => Err(Error::FieldTooLong {
                field: field.label.to_string(),
                length,
                max,
            }),
        }
    }

    fn enclose(&self, value: &str) -> String {
        let doubled = format!("{}{}", self.enclosure, self.enclosure);
        let escaped = value.replace(self.enclosure, &doubled);
        format!("{}{}{}", self.enclosure, escaped, self.enclosure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn encoder() -> RowEncoder {
        RowEncoder::new(
            &[
                FieldDef::text(2, "label", "Beschriftung", 10),
                FieldDef::number(1, "account", "Konto", 9),
                FieldDef::amount(3, "amount", "Umsatz", 13),
            ],
            ColumnWidthConfig::from_fields(&[
                FieldDef::number(1, "account", "Konto", 9),
                FieldDef::text(2, "label", "Beschriftung", 10),
                FieldDef::amount(3, "amount", "Umsatz", 13),
            ]),
        )
    }

    #[test]
    fn test_canonical_order_and_quoting() {
        let row = encoder()
            .build_row(&values(&[("amount", "12,50"), ("account", "1200")]))
            .unwrap();
        assert_eq!(row.cells(), &["1200", "\"\"", "12,50"]);
        assert_eq!(row.to_line(';'), "1200;\"\";12,50");
    }

    #[test]
    fn test_inner_enclosures_are_doubled() {
        let row = encoder().build_row(&values(&[("label", "Say \"hi\"")])).unwrap();
        assert_eq!(row.cells()[1], "\"Say \"\"hi\"\"\"");
    }

    #[test]
    fn test_truncate_and_reject() {
        let long = values(&[("label", "Kassenbestand Filiale")]);
        let row = encoder().build_row(&long).unwrap();
        assert_eq!(row.cells()[1], "\"Kassenbest\"");

        let strict = encoder().with_config(
            ColumnWidthConfig::from_fields(encoder().fields()).with_strategy(TruncationStrategy::Reject),
        );
        match strict.build_row(&long) {
            Err(Error::FieldTooLong { field, length, max }) => {
                assert_eq!(field, "Beschriftung");
                assert_eq!((length, max), (21, 10));
            }
            other => panic!("expected FieldTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_and_validation() {
        let mut defaults = HashMap::new();
        defaults.insert("label", "Bank".to_string());
        let encoder = encoder().with_defaults(defaults);
        let row = encoder.build_row(&HashMap::new()).unwrap();
        assert_eq!(row.cells()[1], "\"Bank\"");

        assert!(encoder.build_row(&values(&[("account", "12;00")])).is_err());
    }

    #[test]
    fn test_width_counts_characters() {
        let row = encoder().build_row(&values(&[("label", "Straße Süd")])).unwrap();
        assert_eq!(row.cells()[1], "\"Straße Süd\"");
    }
}
