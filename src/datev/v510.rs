//! DATEV format 5.10. No fixation column, shorter document fields and a
//! header without fixation, chart of accounts or industry solution.

use super::bank_transactions::BANK_TRANSACTION_FIELDS;
use super::fields::FieldDef;
use super::meta_header::{MetaFieldLayout, MetaHeaderDefinition, META_HEADER_FIELDS, STANDARD_FIELDS};
use super::registry::VersionEntry;
use super::Category;

pub const VERSION: u16 = 510;

pub static BOOKING_BATCH: [FieldDef; 19] = [
    FieldDef::amount(1, "amount", "Umsatz (ohne Soll/Haben-Kz)", 13),
    FieldDef::text(2, "debit_credit", "Soll/Haben-Kennzeichen", 1),
    FieldDef::text(3, "currency", "WKZ Umsatz", 3),
    FieldDef::amount(4, "exchange_rate", "Kurs", 11),
    FieldDef::amount(5, "base_amount", "Basis-Umsatz", 13),
    FieldDef::text(6, "base_currency", "WKZ Basis-Umsatz", 3),
    FieldDef::number(7, "account", "Konto", 9),
    FieldDef::number(8, "contra_account", "Gegenkonto (ohne BU-Schlüssel)", 9),
    FieldDef::text(9, "tax_key", "BU-Schlüssel", 2),
    FieldDef::date(10, "document_date", "Belegdatum", 4),
    FieldDef::text(11, "document_field_1", "Belegfeld 1", 12),
    FieldDef::text(12, "document_field_2", "Belegfeld 2", 12),
    FieldDef::amount(13, "discount", "Skonto", 11),
    FieldDef::text(14, "posting_text", "Buchungstext", 60),
    FieldDef::number(15, "item_lock", "Postensperre", 1),
    FieldDef::text(16, "address_number", "Diverse Adressnummer", 9),
    FieldDef::number(17, "partner_bank", "Geschäftspartnerbank", 3),
    FieldDef::number(18, "matter", "Sachverhalt", 2),
    FieldDef::number(19, "interest_lock", "Zinssperre", 1),
];

pub static ACCOUNT_LABELS: [FieldDef; 3] = [
    FieldDef::number(1, "account", "Konto", 9),
    FieldDef::text(2, "label", "Kontenbeschriftung", 40),
    FieldDef::text(3, "language", "Sprach-ID", 5),
];

fn header_fields() -> [MetaFieldLayout; META_HEADER_FIELDS] {
    let mut fields = STANDARD_FIELDS;
    fields[20] = MetaFieldLayout {
        def: FieldDef::number(21, "reserved_21", "reserviert", 0),
        pattern: r"^$",
    };
    fields[26] = MetaFieldLayout {
        def: FieldDef::text(27, "reserved_27", "reserviert", 0),
        pattern: r"^$",
    };
    fields[27] = MetaFieldLayout {
        def: FieldDef::number(28, "reserved_28", "reserviert", 0),
        pattern: r"^$",
    };
    fields
}

fn default_value(category: Category, key: &str) -> Option<String> {
    let value = match (category, key) {
        (_, "format_id") => "EXTF".to_string(),
        (_, "version") => VERSION.to_string(),
        (_, "category") => category.id()?.to_string(),
        (_, "format_name") => category.name().to_string(),
        (Category::BookingBatch, "format_version") => "2".to_string(),
        (Category::AccountLabels, "format_version") => "1".to_string(),
        (_, "account_length") => "4".to_string(),
        (Category::BookingBatch, "booking_type") => "1".to_string(),
        (Category::BookingBatch, "currency") => "EUR".to_string(),
        _ => return None,
    };
    Some(value)
}

pub(crate) fn register() -> VersionEntry {
    let fields = header_fields();
    VersionEntry {
        version: VERSION,
        meta_headers: vec![
            MetaHeaderDefinition::build(VERSION, Category::BookingBatch, &fields, default_value),
            MetaHeaderDefinition::build(VERSION, Category::AccountLabels, &fields, default_value),
        ],
        layouts: vec![
            (Category::BookingBatch, &BOOKING_BATCH[..]),
            (Category::AccountLabels, &ACCOUNT_LABELS[..]),
            (Category::BankTransactions, &BANK_TRANSACTION_FIELDS[..]),
        ],
    }
}
