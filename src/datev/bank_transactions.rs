//! ASCII bank transaction files (`ASCII-Weiterverarbeitungsdatei`).
//!
//! One row per booked transaction, no header rows. Rows carry at least the
//! first 17 positions; trailing empty positions beyond that are dropped.

use super::columns::ColumnWidthConfig;
use super::encoder::{CsvRow, RowEncoder};
use super::fields::FieldDef;
use crate::field_grammar::wrap_lines;
use crate::types::{Statement, Transaction};
use crate::error::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

/// Positions every row carries, even when empty.
pub const MIN_FIELDS: usize = 17;

const NAME_WIDTH: usize = 27;
const PURPOSE_WIDTH: usize = 27;
const PURPOSE_LINES: usize = 18;

const PURPOSE_KEYS: [&str; PURPOSE_LINES] = [
    "purpose_1", "purpose_2", "purpose_3", "purpose_4", "purpose_5", "purpose_6", "purpose_7", "purpose_8",
    "purpose_9", "purpose_10", "purpose_11", "purpose_12", "purpose_13", "purpose_14", "purpose_15",
    "purpose_16", "purpose_17", "purpose_18",
];

pub static BANK_TRANSACTION_FIELDS: [FieldDef; 34] = [
    FieldDef::text(1, "bank_code", "BLZ/BIC Kontoinhaber", 11),
    FieldDef::text(2, "account", "Kontonummer/IBAN Kontoinhaber", 34),
    FieldDef::number(3, "statement_number", "Auszugsnummer", 5),
    FieldDef::date(4, "statement_date", "Auszugsdatum", 10),
    FieldDef::date(5, "value_date", "Valuta", 10),
    FieldDef::date(6, "booking_date", "Buchungsdatum", 10),
    FieldDef::amount(7, "amount", "Umsatz", 14),
    FieldDef::text(8, "counterparty_name_1", "Auftraggebername 1", NAME_WIDTH),
    FieldDef::text(9, "counterparty_name_2", "Auftraggebername 2", NAME_WIDTH),
    FieldDef::text(10, "counterparty_bank", "BLZ/BIC Auftraggeber", 11),
    FieldDef::text(11, "counterparty_account", "Kontonummer/IBAN Auftraggeber", 34),
    FieldDef::text(12, "purpose_1", "Verwendungszweck 1", PURPOSE_WIDTH),
    FieldDef::text(13, "purpose_2", "Verwendungszweck 2", PURPOSE_WIDTH),
    FieldDef::text(14, "purpose_3", "Verwendungszweck 3", PURPOSE_WIDTH),
    FieldDef::text(15, "purpose_4", "Verwendungszweck 4", PURPOSE_WIDTH),
    FieldDef::number(16, "business_code", "Geschäftsvorgangscode", 3),
    FieldDef::text(17, "currency", "Währung", 3),
    FieldDef::text(18, "posting_text", "Buchungstext", PURPOSE_WIDTH),
    FieldDef::text(19, "purpose_5", "Verwendungszweck 5", PURPOSE_WIDTH),
    FieldDef::text(20, "purpose_6", "Verwendungszweck 6", PURPOSE_WIDTH),
    FieldDef::text(21, "purpose_7", "Verwendungszweck 7", PURPOSE_WIDTH),
    FieldDef::text(22, "purpose_8", "Verwendungszweck 8", PURPOSE_WIDTH),
    FieldDef::text(23, "purpose_9", "Verwendungszweck 9", PURPOSE_WIDTH),
    FieldDef::text(24, "purpose_10", "Verwendungszweck 10", PURPOSE_WIDTH),
    FieldDef::text(25, "purpose_11", "Verwendungszweck 11", PURPOSE_WIDTH),
    FieldDef::text(26, "purpose_12", "Verwendungszweck 12", PURPOSE_WIDTH),
    FieldDef::text(27, "purpose_13", "Verwendungszweck 13", PURPOSE_WIDTH),
    FieldDef::text(28, "purpose_14", "Verwendungszweck 14", PURPOSE_WIDTH),
    FieldDef::text(29, "purpose_15", "Verwendungszweck 15", PURPOSE_WIDTH),
    FieldDef::text(30, "purpose_16", "Verwendungszweck 16", PURPOSE_WIDTH),
    FieldDef::text(31, "purpose_17", "Verwendungszweck 17", PURPOSE_WIDTH),
    FieldDef::text(32, "purpose_18", "Verwendungszweck 18", PURPOSE_WIDTH),
    FieldDef::text(33, "end_to_end_id", "Ende-zu-Ende-Referenz", 35),
    FieldDef::text(34, "mandate_id", "Mandatsreferenz", 35),
];

fn format_date(date: &NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

fn format_signed_amount(transaction: &Transaction) -> String {
    let sign = if transaction.mark.is_credit() { '+' } else { '-' };
    format!("{}{:.2}", sign, transaction.amount.value()).replace('.', ",")
}

/// Bank code and account number of `BLZ/account` ids; IBANs stay whole.
fn split_account(account_id: &str) -> (&str, &str) {
    match account_id.split_once('/') {
        Some((bank, account)) => (bank, account),
        None => ("", account_id),
    }
}

/// Leading statement number of `:28C:` (`00012/001` → `12`).
fn statement_number(statement: &Statement) -> Option<String> {
    let number = statement.statement_number.as_deref()?.split('/').next()?;
    let number = number.trim_start_matches('0');
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(number.to_string())
}

/// Field values of one transaction row, keyed like [`BANK_TRANSACTION_FIELDS`].
pub fn transaction_values(statement: &Statement, transaction: &Transaction) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut set = |key: &str, value: String| {
        if !value.is_empty() {
            values.insert(key.to_string(), value);
        }
    };

    let (bank_code, account) = split_account(&statement.account_id);
    set("bank_code", bank_code.to_string());
    set("account", account.to_string());
    set("statement_number", statement_number(statement).unwrap_or_default());
    set("statement_date", format_date(&statement.closing_balance.date));
    set("value_date", format_date(&transaction.value_date));
    set(
        "booking_date",
        format_date(&transaction.booking_date.unwrap_or(transaction.value_date)),
    );
    set("amount", format_signed_amount(transaction));

    let counterparty = &transaction.counterparty;
    if let Some(name) = &counterparty.name {
        let mut lines = wrap_lines(name, NAME_WIDTH, 2).into_iter();
        set("counterparty_name_1", lines.next().unwrap_or_default());
        set("counterparty_name_2", lines.next().unwrap_or_default());
    }
    set("counterparty_bank", counterparty.bic.clone().unwrap_or_default());
    set("counterparty_account", counterparty.iban.clone().unwrap_or_default());

    for (key, line) in PURPOSE_KEYS.iter().zip(wrap_lines(&transaction.purpose, PURPOSE_WIDTH, PURPOSE_LINES)) {
        set(*key, line);
    }
    set("business_code", transaction.business_code.clone().unwrap_or_default());
    set("currency", transaction.currency.to_string());
    set("posting_text", transaction.posting_text.clone().unwrap_or_default());
    set(
        "end_to_end_id",
        transaction.reference.end_to_end_id.clone().unwrap_or_default(),
    );
    set("mandate_id", transaction.reference.mandate_id.clone().unwrap_or_default());
    values
}

/// Encoder for bank transaction rows, truncating to the column widths.
pub fn encoder() -> RowEncoder {
    RowEncoder::new(&BANK_TRANSACTION_FIELDS, ColumnWidthConfig::from_fields(&BANK_TRANSACTION_FIELDS))
}

/// One row per transaction of `statement`.
pub fn rows_from_statement(statement: &Statement) -> Result<Vec<CsvRow>> {
    rows_with_encoder(statement, &encoder())
}

pub fn rows_with_encoder(statement: &Statement, encoder: &RowEncoder) -> Result<Vec<CsvRow>> {
    let rows = statement
        .transactions
        .iter()
        .map(|transaction| {
            let values = transaction_values(statement, transaction);
            let used = encoder
                .fields()
                .iter()
                .filter(|field| values.contains_key(field.key))
                .map(|field| usize::from(field.ordinal))
                .max()
                .unwrap_or(0);
            let mut row = encoder.build_row(&values)?;
            row.truncate(used.max(MIN_FIELDS));
            Ok(row)
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(rows = rows.len(), account = %statement.account_id, "built bank transaction rows");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datev::fields::is_contiguous;
    use crate::types::{Amount, Balance, BalanceSubtype, DebitCredit};
    use rust_decimal::Decimal;

    fn statement() -> Statement {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let balance = |subtype, amount| {
            Balance::new(
                subtype,
                DebitCredit::Credit,
                date,
                "EUR".parse().unwrap(),
                Amount::new(Decimal::new(amount, 2)).unwrap(),
            )
        };
        let mut statement = Statement::new(
            "STMT-1".to_string(),
            "37040044/0532013000".to_string(),
            balance(BalanceSubtype::OpeningBooked, 100000),
            balance(BalanceSubtype::ClosingBooked, 50000),
        );
        statement.statement_number = Some("00012/001".to_string());

        let mut transaction = Transaction::new(
            date,
            DebitCredit::Debit,
            Amount::new(Decimal::new(50000, 2)).unwrap(),
            "EUR".parse().unwrap(),
            "NDDT".to_string(),
        );
        transaction.business_code = Some("105".to_string());
        transaction.purpose = "Stromabschlag Januar Vertragskonto 4711".to_string();
        transaction.reference.end_to_end_id = Some("E2E-9".to_string());
        transaction.counterparty.name = Some("Stadtwerke \"Nord\" GmbH".to_string());
        statement.add_transaction(transaction);
        statement
    }

    #[test]
    fn test_layout() {
        assert!(is_contiguous(&BANK_TRANSACTION_FIELDS));
    }

    #[test]
    fn test_row_from_transaction() {
        let rows = rows_from_statement(&statement()).unwrap();
        assert_eq!(rows.len(), 1);
        let cells = rows[0].cells();
        assert_eq!(cells.len(), 33);
        assert_eq!(cells[0], "\"37040044\"");
        assert_eq!(cells[1], "\"0532013000\"");
        assert_eq!(cells[2], "12");
        assert_eq!(cells[4], "15.01.2026");
        assert_eq!(cells[6], "-500,00");
        assert_eq!(cells[7], "\"Stadtwerke \"\"Nord\"\" GmbH\"");
        assert_eq!(cells[11], "\"Stromabschlag Januar\"");
        assert_eq!(cells[12], "\"Vertragskonto 4711\"");
        assert_eq!(cells[15], "105");
        assert_eq!(cells[16], "\"EUR\"");
        assert_eq!(cells[32], "\"E2E-9\"");
    }

    #[test]
    fn test_short_rows_keep_minimum_width() {
        let mut statement = statement();
        let transaction = &mut statement.transactions[0];
        transaction.reference.end_to_end_id = None;
        transaction.purpose.clear();
        let rows = rows_from_statement(&statement).unwrap();
        assert_eq!(rows[0].len(), MIN_FIELDS);
    }
}
