//! Positional field definitions shared by every DATEV layout.

use crate::error::{Error, Result};

/// Value class of a DATEV field. Only alphanumeric fields are enclosed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Alphanumeric,
    Numeric,
    /// `DDMM`, `YYYYMMDD` or `DD.MM.YYYY`, depending on the layout.
    Date,
    /// Decimal comma, optional sign.
    Amount,
}

impl FieldKind {
    pub fn is_quoted(&self) -> bool {
        matches!(self, FieldKind::Alphanumeric)
    }

    /// Character check for unquoted values, which must never contain the
    /// delimiter or the enclosure.
    pub(crate) fn accepts(&self, value: &str) -> bool {
        match self {
            FieldKind::Alphanumeric => true,
            FieldKind::Numeric => value.bytes().all(|b| b.is_ascii_digit()),
            FieldKind::Date => value.bytes().all(|b| b.is_ascii_digit() || b == b'.'),
            FieldKind::Amount => {
                let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
                let mut parts = unsigned.splitn(2, ',');
                let whole = parts.next().unwrap_or_default();
                let fraction = parts.next().unwrap_or("0");
                !whole.is_empty()
                    && whole.bytes().all(|b| b.is_ascii_digit())
                    && fraction.bytes().all(|b| b.is_ascii_digit())
            }
        }
    }
}

/// One positional field of a DATEV row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// 1-based position in the row.
    pub ordinal: u8,
    /// Lookup key for supplied values.
    pub key: &'static str,
    /// Column name as written in the header row.
    pub label: &'static str,
    pub kind: FieldKind,
    /// Maximum width in characters.
    pub max_len: usize,
}

impl FieldDef {
    pub const fn new(ordinal: u8, key: &'static str, label: &'static str, kind: FieldKind, max_len: usize) -> Self {
        Self {
            ordinal,
            key,
            label,
            kind,
            max_len,
        }
    }

    pub const fn text(ordinal: u8, key: &'static str, label: &'static str, max_len: usize) -> Self {
        Self::new(ordinal, key, label, FieldKind::Alphanumeric, max_len)
    }

    pub const fn number(ordinal: u8, key: &'static str, label: &'static str, max_len: usize) -> Self {
        Self::new(ordinal, key, label, FieldKind::Numeric, max_len)
    }

    pub const fn date(ordinal: u8, key: &'static str, label: &'static str, max_len: usize) -> Self {
        Self::new(ordinal, key, label, FieldKind::Date, max_len)
    }

    pub const fn amount(ordinal: u8, key: &'static str, label: &'static str, max_len: usize) -> Self {
        Self::new(ordinal, key, label, FieldKind::Amount, max_len)
    }

    pub fn is_quoted(&self) -> bool {
        self.kind.is_quoted()
    }

    /// Reject unquoted values with characters outside the field's class.
    pub(crate) fn check_value(&self, value: &str) -> Result<()> {
        if value.is_empty() || self.kind.accepts(value) {
            return Ok(());
        }
        Err(Error::validation(
            self.label,
            format!("'{}' is not a valid {:?} value", value, self.kind),
        ))
    }
}

/// Check that a field list is numbered 1..=n without gaps.
pub(crate) fn is_contiguous(fields: &[FieldDef]) -> bool {
    fields
        .iter()
        .enumerate()
        .all(|(index, field)| usize::from(field.ordinal) == index + 1)
}
