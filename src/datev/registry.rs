//! Supported DATEV versions and their layouts.
//!
//! Versions register themselves through [`VERSION_MODULES`]; the table is
//! built on first use and read-only afterwards.

use super::fields::FieldDef;
use super::meta_header::MetaHeaderDefinition;
use super::{v510, v700, Category};
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Everything one format version defines.
#[derive(Debug)]
pub struct VersionEntry {
    pub version: u16,
    pub meta_headers: Vec<MetaHeaderDefinition>,
    pub layouts: Vec<(Category, &'static [FieldDef])>,
}

const VERSION_MODULES: &[fn() -> VersionEntry] = &[v510::register, v700::register];

static REGISTRY: Lazy<VersionRegistry> = Lazy::new(|| VersionRegistry::new(VERSION_MODULES.iter().map(|register| register())));

/// The process-wide registry.
pub fn registry() -> &'static VersionRegistry {
    &REGISTRY
}

#[derive(Debug)]
pub struct VersionRegistry {
    entries: BTreeMap<u16, VersionEntry>,
}

impl VersionRegistry {
    fn new(entries: impl Iterator<Item = VersionEntry>) -> Self {
        Self {
            entries: entries.map(|entry| (entry.version, entry)).collect(),
        }
    }

    /// Supported versions, ascending.
    pub fn available_versions(&self) -> Vec<u16> {
        self.entries.keys().copied().collect()
    }

    fn entry(&self, version: u16) -> Result<&VersionEntry> {
        self.entries
            .get(&version)
            .ok_or_else(|| Error::NotFound(format!("DATEV version {}", version)))
    }

    /// Meta header definition of the booking batch in `version`.
    pub fn definition_for(&self, version: u16) -> Result<&MetaHeaderDefinition> {
        self.meta_header_for(Category::BookingBatch, version)
    }

    pub fn meta_header_for(&self, category: Category, version: u16) -> Result<&MetaHeaderDefinition> {
        self.entry(version)?
            .meta_headers
            .iter()
            .find(|definition| definition.category == category)
            .ok_or_else(|| Error::NotFound(format!("{} meta header in DATEV version {}", category, version)))
    }

    /// Ordered data columns of `category` in `version`.
    pub fn format_enum_for(&self, category: Category, version: u16) -> Result<&'static [FieldDef]> {
        self.entry(version)?
            .layouts
            .iter()
            .find(|(layout, _)| *layout == category)
            .map(|(_, fields)| *fields)
            .ok_or_else(|| Error::NotFound(format!("{} in DATEV version {}", category, version)))
    }

    /// Category registered under a meta header id in `version`.
    pub fn category_for_id(&self, id: u8, version: u16) -> Result<Category> {
        self.entry(version)?
            .meta_headers
            .iter()
            .map(|definition| definition.category)
            .find(|category| category.id() == Some(id))
            .ok_or_else(|| Error::NotFound(format!("category {} in DATEV version {}", id, version)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datev::fields::is_contiguous;
    use crate::datev::meta_header::META_HEADER_FIELDS;

    #[test]
    fn test_available_versions() {
        assert_eq!(registry().available_versions(), vec![510, 700]);
    }

    #[test]
    fn test_definition_has_31_positions() {
        for version in registry().available_versions() {
            let definition = registry().definition_for(version).unwrap();
            assert_eq!(definition.fields.len(), META_HEADER_FIELDS);
            assert!(is_contiguous(&definition.field_defs()));
            assert_eq!(definition.version, version);
        }
    }

    #[test]
    fn test_unknown_version() {
        assert!(matches!(registry().definition_for(999), Err(Error::NotFound(_))));
        assert!(matches!(
            registry().format_enum_for(Category::BookingBatch, 600),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_layouts() {
        let widths: Vec<(u16, Category, usize)> = vec![
            (700, Category::BookingBatch, 20),
            (510, Category::BookingBatch, 19),
            (700, Category::AccountLabels, 4),
            (510, Category::AccountLabels, 3),
            (700, Category::BankTransactions, 34),
        ];
        for (version, category, expected) in widths {
            let fields = registry().format_enum_for(category, version).unwrap();
            assert_eq!(fields.len(), expected, "{} {}", category, version);
            assert!(is_contiguous(fields));
        }
    }

    #[test]
    fn test_bank_transactions_have_no_meta_header() {
        assert!(matches!(
            registry().meta_header_for(Category::BankTransactions, 700),
            Err(Error::NotFound(_))
        ));
        assert_eq!(registry().category_for_id(20, 510).unwrap(), Category::AccountLabels);
        assert!(registry().category_for_id(16, 700).is_err());
    }

    #[test]
    fn test_versions_differ() {
        let v510 = registry().definition_for(510).unwrap();
        let v700 = registry().definition_for(700).unwrap();
        assert!(v510.field("fixation").is_none());
        assert_eq!(v700.field("fixation").unwrap().default.as_deref(), Some("0"));
    }
}
