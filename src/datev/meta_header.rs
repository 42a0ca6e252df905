//! The 31-field meta header that opens every DATEV export.

use super::columns::ColumnWidthConfig;
use super::encoder::{CsvRow, RowEncoder};
use super::fields::FieldDef;
use super::flags::{BinaryFlag, Fixation};
use super::Category;
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;

/// Number of fields in every meta header.
pub const META_HEADER_FIELDS: usize = 31;

/// Field layout and pattern of one meta header position.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MetaFieldLayout {
    pub(crate) def: FieldDef,
    pub(crate) pattern: &'static str,
}

const fn meta_field(def: FieldDef, pattern: &'static str) -> MetaFieldLayout {
    MetaFieldLayout { def, pattern }
}

/// Layout shared by the 5.x and 7.x headers. Version modules replace the
/// positions that differ.
pub(crate) const STANDARD_FIELDS: [MetaFieldLayout; META_HEADER_FIELDS] = [
    meta_field(FieldDef::text(1, "format_id", "Kennzeichen", 4), r"^(EXTF|DTVF)$"),
    meta_field(FieldDef::number(2, "version", "Versionsnummer", 3), r"^\d{3}$"),
    meta_field(FieldDef::number(3, "category", "Formatkategorie", 2), r"^\d{2}$"),
    meta_field(FieldDef::text(4, "format_name", "Formatname", 40), r"^.{1,40}$"),
    meta_field(FieldDef::number(5, "format_version", "Formatversion", 3), r"^\d{1,3}$"),
    meta_field(FieldDef::number(6, "created", "Erzeugt am", 17), r"^(\d{17})?$"),
    meta_field(FieldDef::number(7, "imported", "Importiert", 17), r"^$"),
    meta_field(FieldDef::text(8, "origin", "Herkunft", 2), r"^[A-Z0-9]{0,2}$"),
    meta_field(FieldDef::text(9, "exported_by", "Exportiert von", 25), r"^.{0,25}$"),
    meta_field(FieldDef::text(10, "imported_by", "Importiert von", 25), r"^.{0,25}$"),
    meta_field(FieldDef::number(11, "consultant", "Beraternummer", 7), r"^(\d{4,7})?$"),
    meta_field(FieldDef::number(12, "client", "Mandantennummer", 5), r"^(\d{1,5})?$"),
    meta_field(FieldDef::date(13, "fiscal_year_start", "WJ-Beginn", 8), r"^(\d{8})?$"),
    meta_field(FieldDef::number(14, "account_length", "Sachkontenlänge", 1), r"^[4-8]?$"),
    meta_field(FieldDef::date(15, "date_from", "Datum vom", 8), r"^(\d{8})?$"),
    meta_field(FieldDef::date(16, "date_to", "Datum bis", 8), r"^(\d{8})?$"),
    meta_field(FieldDef::text(17, "description", "Bezeichnung", 30), r"^.{0,30}$"),
    meta_field(FieldDef::text(18, "dictation", "Diktatkürzel", 2), r"^([A-Z]{2})?$"),
    meta_field(FieldDef::number(19, "booking_type", "Buchungstyp", 1), r"^[12]?$"),
    meta_field(FieldDef::number(20, "accounting_purpose", "Rechnungslegungszweck", 2), r"^(\d{1,2})?$"),
    meta_field(FieldDef::number(21, "fixation", "Festschreibung", 1), r"^[01]?$"),
    meta_field(FieldDef::text(22, "currency", "WKZ", 3), r"^([A-Z]{3})?$"),
    meta_field(FieldDef::number(23, "reserved_23", "reserviert", 0), r"^$"),
    meta_field(FieldDef::text(24, "derivative", "Derivatskennzeichen", 0), r"^$"),
    meta_field(FieldDef::number(25, "reserved_25", "reserviert", 0), r"^$"),
    meta_field(FieldDef::number(26, "reserved_26", "reserviert", 0), r"^$"),
    meta_field(FieldDef::text(27, "chart_of_accounts", "SKR", 2), r"^(\d{2})?$"),
    meta_field(FieldDef::number(28, "industry_solution", "Branchen-Lösungs-ID", 5), r"^(\d{1,5})?$"),
    meta_field(FieldDef::number(29, "reserved_29", "reserviert", 0), r"^$"),
    meta_field(FieldDef::text(30, "reserved_30", "reserviert", 0), r"^$"),
    meta_field(FieldDef::text(31, "application_info", "Anwendungsinformation", 16), r"^.{0,16}$"),
];

/// Compiled meta header position.
#[derive(Debug, Clone)]
pub struct MetaField {
    pub def: FieldDef,
    pub pattern: Regex,
    pub default: Option<String>,
}

/// Versioned meta header layout for one category.
#[derive(Debug, Clone)]
pub struct MetaHeaderDefinition {
    pub version: u16,
    pub category: Category,
    pub fields: Vec<MetaField>,
}

impl MetaHeaderDefinition {
    /// Compile `layouts` with defaults from `default_value`.
    ///
    /// Patterns are compile-time constants, so a bad one is a programming
    /// error and panics on first registry use.
    pub(crate) fn build(
        version: u16,
        category: Category,
        layouts: &[MetaFieldLayout; META_HEADER_FIELDS],
        default_value: fn(Category, &str) -> Option<String>,
    ) -> Self {
        let fields = layouts
            .iter()
            .map(|layout| MetaField {
                def: layout.def,
                pattern: Regex::new(layout.pattern).expect("meta header pattern is valid"),
                default: default_value(category, layout.def.key),
            })
            .collect();
        Self {
            version,
            category,
            fields,
        }
    }

    pub fn field(&self, key: &str) -> Option<&MetaField> {
        self.fields.iter().find(|field| field.def.key == key)
    }

    pub fn field_defs(&self) -> Vec<FieldDef> {
        self.fields.iter().map(|field| field.def).collect()
    }

    /// Check `value` against the pattern of `key`.
    pub fn validate(&self, key: &str, value: &str) -> Result<()> {
        let field = self
            .field(key)
            .ok_or_else(|| Error::validation(key, "not a meta header field"))?;
        if field.pattern.is_match(value) {
            Ok(())
        } else {
            Err(Error::validation(
                field.def.label,
                format!("'{}' does not match {}", value, field.pattern.as_str()),
            ))
        }
    }

    fn encoder(&self) -> RowEncoder {
        let defs = self.field_defs();
        let defaults = self
            .fields
            .iter()
            .filter_map(|field| field.default.clone().map(|value| (field.def.key, value)))
            .collect();
        RowEncoder::new(&defs, ColumnWidthConfig::from_fields(&defs)).with_defaults(defaults)
    }
}

/// A filled meta header. Supplied values are validated on construction;
/// unset fields take the definition's default.
#[derive(Debug, Clone)]
pub struct MetaHeader {
    definition: &'static MetaHeaderDefinition,
    values: HashMap<String, String>,
}

impl MetaHeader {
    pub fn new(definition: &'static MetaHeaderDefinition, values: HashMap<String, String>) -> Result<Self> {
        for (key, value) in &values {
            definition.validate(key, value)?;
        }
        Ok(Self { definition, values })
    }

    pub fn definition(&self) -> &'static MetaHeaderDefinition {
        self.definition
    }

    pub fn version(&self) -> u16 {
        self.definition.version
    }

    pub fn category(&self) -> Category {
        self.definition.category
    }

    /// Supplied value, else default.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .or_else(|| self.definition.field(key).and_then(|field| field.default.as_deref()))
    }

    pub fn fixation(&self) -> Result<Fixation> {
        Fixation::from_field(self.value(Fixation::KEY).unwrap_or_default())
    }

    pub fn encode(&self) -> Result<CsvRow> {
        self.definition.encoder().build_row(&self.values)
    }

    /// Rebuild a header from the cells of a read row.
    pub(crate) fn from_cells(definition: &'static MetaHeaderDefinition, cells: &[String]) -> Result<Self> {
        let values = definition
            .fields
            .iter()
            .zip(cells)
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(field, cell)| (field.def.key.to_string(), cell.clone()))
            .collect();
        Self::new(definition, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datev::registry::registry;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_standard_layout_is_contiguous() {
        let defs: Vec<FieldDef> = STANDARD_FIELDS.iter().map(|layout| layout.def).collect();
        assert!(crate::datev::fields::is_contiguous(&defs));
    }

    #[test]
    fn test_every_registered_header_compiles() {
        let registry = registry();
        for version in registry.available_versions() {
            for category in [Category::BookingBatch, Category::AccountLabels] {
                let Ok(definition) = registry.meta_header_for(category, version) else {
                    continue;
                };
                assert_eq!(definition.fields.len(), META_HEADER_FIELDS);
                for field in &definition.fields {
                    if let Some(default) = &field.default {
                        assert!(field.pattern.is_match(default), "{} {} {}", category, version, field.def.key);
                    }
                }
                assert!(MetaHeader::new(definition, HashMap::new()).is_ok(), "{} {}", category, version);
            }
        }
    }

    #[test]
    fn test_defaults_fill_header() {
        let definition = registry().meta_header_for(Category::BookingBatch, 700).unwrap();
        let header = MetaHeader::new(definition, values(&[("consultant", "29098"), ("client", "55003")])).unwrap();
        let row = header.encode().unwrap();
        assert_eq!(row.len(), META_HEADER_FIELDS);
        assert_eq!(&row.cells()[..5], &["\"EXTF\"", "700", "21", "\"Buchungsstapel\"", "13"]);
        assert_eq!(row.cells()[10], "29098");
        assert_eq!(row.cells()[21], "\"EUR\"");
        assert!(!header.fixation().unwrap().is_locked());
    }

    #[test]
    fn test_values_are_validated() {
        let definition = registry().meta_header_for(Category::BookingBatch, 700).unwrap();
        assert!(matches!(
            MetaHeader::new(definition, values(&[("consultant", "12")])),
            Err(Error::Validation { .. })
        ));
        assert!(MetaHeader::new(definition, values(&[("currency", "eur")])).is_err());
        assert!(MetaHeader::new(definition, values(&[("unknown", "1")])).is_err());
    }
}
