//! DATEV format 7.00.

use super::bank_transactions::BANK_TRANSACTION_FIELDS;
use super::fields::FieldDef;
use super::meta_header::{MetaHeaderDefinition, STANDARD_FIELDS};
use super::registry::VersionEntry;
use super::Category;

pub const VERSION: u16 = 700;

/// Booking batch (`Buchungsstapel`) columns.
pub static BOOKING_BATCH: [FieldDef; 20] = [
    FieldDef::amount(1, "amount", "Umsatz (ohne Soll/Haben-Kz)", 13),
    FieldDef::text(2, "debit_credit", "Soll/Haben-Kennzeichen", 1),
    FieldDef::text(3, "currency", "WKZ Umsatz", 3),
    FieldDef::amount(4, "exchange_rate", "Kurs", 11),
    FieldDef::amount(5, "base_amount", "Basis-Umsatz", 13),
    FieldDef::text(6, "base_currency", "WKZ Basis-Umsatz", 3),
    FieldDef::number(7, "account", "Konto", 9),
    FieldDef::number(8, "contra_account", "Gegenkonto (ohne BU-Schlüssel)", 9),
    FieldDef::text(9, "tax_key", "BU-Schlüssel", 4),
    FieldDef::date(10, "document_date", "Belegdatum", 4),
    FieldDef::text(11, "document_field_1", "Belegfeld 1", 36),
    FieldDef::text(12, "document_field_2", "Belegfeld 2", 12),
    FieldDef::amount(13, "discount", "Skonto", 11),
    FieldDef::text(14, "posting_text", "Buchungstext", 60),
    FieldDef::number(15, "item_lock", "Postensperre", 1),
    FieldDef::text(16, "address_number", "Diverse Adressnummer", 9),
    FieldDef::number(17, "partner_bank", "Geschäftspartnerbank", 3),
    FieldDef::number(18, "matter", "Sachverhalt", 2),
    FieldDef::number(19, "interest_lock", "Zinssperre", 1),
    FieldDef::number(20, "fixation", "Festschreibung", 1),
];

/// Account label (`Kontenbeschriftungen`) columns.
pub static ACCOUNT_LABELS: [FieldDef; 4] = [
    FieldDef::number(1, "account", "Konto", 9),
    FieldDef::text(2, "label", "Kontenbeschriftung", 40),
    FieldDef::text(3, "language", "Sprach-ID", 5),
    FieldDef::text(4, "long_label", "Kontenbeschriftung lang", 300),
];

fn default_value(category: Category, key: &str) -> Option<String> {
    let value = match (category, key) {
        (_, "format_id") => "EXTF".to_string(),
        (_, "version") => VERSION.to_string(),
        (_, "category") => category.id()?.to_string(),
        (_, "format_name") => category.name().to_string(),
        (Category::BookingBatch, "format_version") => "13".to_string(),
        (Category::AccountLabels, "format_version") => "3".to_string(),
        (_, "account_length") => "4".to_string(),
        (Category::BookingBatch, "booking_type") => "1".to_string(),
        (Category::BookingBatch, "fixation") => "0".to_string(),
        (Category::BookingBatch, "currency") => "EUR".to_string(),
        _ => return None,
    };
    Some(value)
}

pub(crate) fn register() -> VersionEntry {
    VersionEntry {
        version: VERSION,
        meta_headers: vec![
            MetaHeaderDefinition::build(VERSION, Category::BookingBatch, &STANDARD_FIELDS, default_value),
            MetaHeaderDefinition::build(VERSION, Category::AccountLabels, &STANDARD_FIELDS, default_value),
        ],
        layouts: vec![
            (Category::BookingBatch, &BOOKING_BATCH[..]),
            (Category::AccountLabels, &ACCOUNT_LABELS[..]),
            (Category::BankTransactions, &BANK_TRANSACTION_FIELDS[..]),
        ],
    }
}
