//! Format conversion between camt.053 and MT940.
//!
//! CAMT carries more structure than MT940 can hold; what does not fit is
//! dropped. References survive both ways through the `:86:` codewords
//! (EREF, MREF, CRED, KREF) and the `:61:` bank reference. Inputs are never
//! modified.

use crate::camt053_format::{AccountStatement, BankTransactionCode, Camt053Document, CamtEntry, EntryTransaction};
use crate::error::{Error, Result};
use crate::iso20022::common::{Account, GroupHeader};
use crate::mt940_format::Mt940Statement;
use crate::types::{Balance, BalanceSubtype, Statement, Transaction};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

/// Customer reference placeholder of `:61:`.
const NONREF: &str = "NONREF";
const REFERENCE_LENGTH: usize = 16;
const FALLBACK_TYPE_CODE: &str = "NMSC";
const WILDCARD: &str = "*";

/// Bank transaction code (domain, family, subfamily) → `:61:` type code.
/// `*` matches any family or subfamily.
const TYPE_CODES: &[(&str, &str, &str, &str)] = &[
    ("PMNT", "RCDT", "ESCT", "NTRF"),
    ("PMNT", "ICDT", "ESCT", "NTRF"),
    ("PMNT", "ICDT", "STDO", "NSTO"),
    ("PMNT", "RCDT", "*", "NTRF"),
    ("PMNT", "ICDT", "*", "NTRF"),
    ("PMNT", "IDDT", "ESDD", "NDDT"),
    ("PMNT", "IDDT", "BBDD", "NDDT"),
    ("PMNT", "RDDT", "ESDD", "NDDT"),
    ("PMNT", "IDDT", "*", "NDDT"),
    ("PMNT", "RDDT", "*", "NDDT"),
    ("PMNT", "ICHQ", "*", "NCHK"),
    ("PMNT", "RCHQ", "*", "NCHK"),
    ("PMNT", "*", "*", "NTRF"),
    ("ACMT", "MDOP", "CHRG", "NCHG"),
    ("ACMT", "MDOP", "INTR", "NINT"),
    ("ACMT", "*", "*", "NMSC"),
    ("FORX", "*", "*", "NFEX"),
    ("SECU", "*", "*", "NSEC"),
];

/// `:61:` type code for a bank transaction code: exact match, then family
/// wildcard, then domain wildcard, then `NMSC`.
pub fn type_code_for(code: &BankTransactionCode) -> &'static str {
    let (Some(domain), family, subfamily) = (code.domain.as_deref(), code.family.as_deref(), code.subfamily.as_deref())
    else {
        return FALLBACK_TYPE_CODE;
    };
    let lookup = |family: &str, subfamily: &str| {
        TYPE_CODES
            .iter()
            .find(|(d, f, s, _)| *d == domain && *f == family && *s == subfamily)
            .map(|(_, _, _, code)| *code)
    };
    let family = family.unwrap_or(WILDCARD);
    let subfamily = subfamily.unwrap_or(WILDCARD);
    lookup(family, subfamily)
        .or_else(|| lookup(family, WILDCARD))
        .or_else(|| lookup(WILDCARD, WILDCARD))
        .unwrap_or(FALLBACK_TYPE_CODE)
}

/// Bank transaction code for a `:61:` type code. Codes without a standard
/// counterpart are kept as proprietary.
pub fn bank_transaction_code_for(transaction: &Transaction) -> BankTransactionCode {
    let credit = transaction.mark.is_credit();
    match transaction.type_code.as_str() {
        "NTRF" if credit => BankTransactionCode::domain("PMNT", "RCDT", "ESCT"),
        "NTRF" => BankTransactionCode::domain("PMNT", "ICDT", "ESCT"),
        "NSTO" => BankTransactionCode::domain("PMNT", "ICDT", "STDO"),
        "NDDT" if credit => BankTransactionCode::domain("PMNT", "RDDT", "ESDD"),
        "NDDT" => BankTransactionCode::domain("PMNT", "IDDT", "ESDD"),
        "NCHK" if credit => BankTransactionCode::domain("PMNT", "RCHQ", "CCHQ"),
        "NCHK" => BankTransactionCode::domain("PMNT", "ICHQ", "CCHQ"),
        "NCHG" => BankTransactionCode::domain("ACMT", "MDOP", "CHRG"),
        "NINT" => BankTransactionCode::domain("ACMT", "MDOP", "INTR"),
        other => BankTransactionCode {
            proprietary: Some(other.to_string()),
            ..BankTransactionCode::default()
        },
    }
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

fn with_subtype(balance: &Balance, subtype: BalanceSubtype) -> Balance {
    Balance {
        subtype,
        ..balance.clone()
    }
}

fn looks_like_iban(value: &str) -> bool {
    let bytes = value.as_bytes();
    (15..=34).contains(&bytes.len())
        && bytes[..2].iter().all(u8::is_ascii_uppercase)
        && bytes[2..4].iter().all(u8::is_ascii_digit)
        && bytes.iter().all(u8::is_ascii_alphanumeric)
}

/// Convert one camt.053 statement to MT940.
pub fn camt053_to_mt940(statement: &AccountStatement) -> Result<Mt940Statement> {
    let missing = |what: &str| Error::ConversionError(format!("statement {} has no {}", statement.id, what));

    let opening = statement.opening_balance().ok_or_else(|| missing("opening balance"))?;
    let closing = statement.closing_balance().ok_or_else(|| missing("closing balance"))?;
    let account_id = statement
        .account
        .iban
        .as_ref()
        .or(statement.account.other_id.as_ref())
        .ok_or_else(|| missing("account id"))?;

    let mut mt = Statement::new(
        truncate(&statement.id, REFERENCE_LENGTH),
        account_id.clone(),
        with_subtype(opening, BalanceSubtype::OpeningBooked),
        closing.clone(),
    );
    mt.statement_number = statement
        .legal_sequence
        .or(statement.electronic_sequence)
        .map(|number| format!("{:05}", number));
    mt.closing_available_balance = statement.balance(BalanceSubtype::ClosingAvailable).cloned();
    mt.forward_available_balances = statement
        .balances
        .iter()
        .filter(|balance| balance.subtype == BalanceSubtype::ForwardAvailable)
        .cloned()
        .collect();
    mt.information = statement.additional_information.clone();

    for entry in &statement.entries {
        mt.add_transaction(entry_to_transaction(entry, closing.date));
    }

    let check = mt.check_balance();
    if !check.is_consistent() {
        warn!(statement = %statement.id, expected = %check.expected, actual = %check.actual, "converted statement does not balance");
    }
    debug!(statement = %statement.id, transactions = mt.transactions.len(), "converted camt.053 statement");
    Ok(Mt940Statement::new(mt))
}

/// `undated` stands in for the value date when the entry carries neither
/// `ValDt` nor `BookgDt`.
fn entry_to_transaction(entry: &CamtEntry, undated: NaiveDate) -> Transaction {
    let value_date = entry.value_date.or(entry.booking_date).unwrap_or_else(|| {
        warn!(
            entry = entry.entry_reference.as_deref().unwrap_or(NONREF),
            date = %undated,
            "entry has neither value date nor booking date, using closing balance date"
        );
        undated
    });

    let mut transaction = Transaction::new(
        value_date,
        entry.mark,
        entry.amount,
        entry.currency.clone(),
        type_code_for(&entry.bank_transaction_code),
    );
    transaction.booking_date = entry.booking_date;

    let details = entry.primary_transaction().cloned().unwrap_or_default();
    let mut reference = details.reference;
    reference.entry_reference = reference.entry_reference.or_else(|| entry.entry_reference.clone());
    reference.account_servicer_reference = reference
        .account_servicer_reference
        .or_else(|| entry.account_servicer_reference.clone());

    if let Some(end_to_end) = reference.end_to_end_id.as_deref() {
        if end_to_end.chars().count() <= REFERENCE_LENGTH {
            transaction.customer_reference = end_to_end.to_string();
        }
    }
    transaction.bank_reference = reference
        .account_servicer_reference
        .as_deref()
        .map(|value| truncate(value, REFERENCE_LENGTH));
    transaction.reference = reference;

    transaction.purpose = if details.remittance.is_empty() {
        details
            .additional_information
            .or_else(|| entry.additional_information.clone())
            .unwrap_or_default()
    } else {
        details.remittance.join(" ")
    };
    transaction.counterparty = details.counterparty;
    transaction.posting_text = entry.bank_transaction_code.proprietary.clone();
    transaction
}

/// Convert every statement of a camt.053 document.
pub fn camt053_document_to_mt940(document: &Camt053Document) -> Result<Vec<Mt940Statement>> {
    document.statements.iter().map(camt053_to_mt940).collect()
}

/// Convert an MT940 statement to a camt.053 statement.
pub fn mt940_to_camt053(statement: &Mt940Statement) -> AccountStatement {
    let s = &statement.statement;
    let mut account = if looks_like_iban(&s.account_id) {
        Account::iban(s.account_id.clone())
    } else {
        Account {
            other_id: Some(s.account_id.clone()),
            ..Account::default()
        }
    };
    account.currency = Some(s.currency().clone());

    let mut camt = AccountStatement::new(s.transaction_reference.clone(), account);
    camt.electronic_sequence = s
        .statement_number
        .as_deref()
        .and_then(|number| number.split('/').next())
        .and_then(|number| number.parse().ok());

    let opening_subtype = match s.opening_balance.subtype {
        BalanceSubtype::InterimBooked => BalanceSubtype::InterimBooked,
        _ => BalanceSubtype::OpeningBooked,
    };
    camt.balances.push(with_subtype(&s.opening_balance, opening_subtype));
    camt.balances.push(with_subtype(&s.closing_balance, BalanceSubtype::ClosingBooked));
    if let Some(available) = &s.closing_available_balance {
        camt.balances.push(with_subtype(available, BalanceSubtype::ClosingAvailable));
    }
    camt.balances.extend(
        s.forward_available_balances
            .iter()
            .map(|balance| with_subtype(balance, BalanceSubtype::ForwardAvailable)),
    );

    camt.entries = s.transactions.iter().map(transaction_to_entry).collect();
    camt.additional_information = s.information.clone();
    camt
}

fn transaction_to_entry(transaction: &Transaction) -> CamtEntry {
    let mut entry = CamtEntry::new(transaction.amount, transaction.currency.clone(), transaction.mark);
    entry.booking_date = Some(transaction.booking_date.unwrap_or(transaction.value_date));
    entry.value_date = Some(transaction.value_date);
    entry.account_servicer_reference = transaction
        .reference
        .account_servicer_reference
        .clone()
        .or_else(|| transaction.bank_reference.clone());
    entry.bank_transaction_code = bank_transaction_code_for(transaction);
    entry.additional_information = transaction.posting_text.clone();

    let mut reference = transaction.reference.clone();
    if reference.end_to_end_id.is_none() && transaction.customer_reference != NONREF {
        reference.end_to_end_id = Some(transaction.customer_reference.clone());
    }
    entry.transactions.push(EntryTransaction {
        reference,
        counterparty: transaction.counterparty.clone(),
        remittance: Some(transaction.purpose.trim())
            .filter(|purpose| !purpose.is_empty())
            .map(|purpose| vec![purpose.to_string()])
            .unwrap_or_default(),
        additional_information: transaction.supplementary_details.clone(),
    });
    entry
}

/// Wrap MT940 statements in one camt.053 document.
pub fn mt940_to_camt053_document(statements: &[Mt940Statement], created: NaiveDateTime) -> Camt053Document {
    let message_id = statements
        .first()
        .map(|statement| statement.statement.transaction_reference.clone())
        .unwrap_or_else(|| NONREF.to_string());
    Camt053Document::new(
        GroupHeader::new(message_id, created),
        statements.iter().map(mt940_to_camt053).collect(),
    )
}

/// Convert from MT940 to camt.053, stamped with the current time.
impl From<Mt940Statement> for Camt053Document {
    fn from(mt940: Mt940Statement) -> Self {
        mt940_to_camt053_document(std::slice::from_ref(&mt940), chrono::Utc::now().naive_utc())
    }
}

impl TryFrom<&AccountStatement> for Mt940Statement {
    type Error = Error;

    fn try_from(statement: &AccountStatement) -> Result<Self> {
        camt053_to_mt940(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, CurrencyCode, DebitCredit};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn eur() -> CurrencyCode {
        "EUR".parse().unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    fn balance(subtype: BalanceSubtype, cents: i64) -> Balance {
        Balance::new(subtype, DebitCredit::Credit, date(), eur(), Amount::new(Decimal::new(cents, 2)).unwrap())
    }

    fn camt_statement() -> AccountStatement {
        let mut statement = AccountStatement::new("STMT-2026-01-15", Account::iban("DE89370400440532013000"));
        statement.electronic_sequence = Some(12);
        statement.balances = vec![
            balance(BalanceSubtype::OpeningBooked, 100000),
            balance(BalanceSubtype::ClosingBooked, 150000),
            balance(BalanceSubtype::ClosingAvailable, 150000),
            balance(BalanceSubtype::ForwardAvailable, 150000),
        ];

        let mut entry = CamtEntry::new(Amount::new(Decimal::new(50000, 2)).unwrap(), eur(), DebitCredit::Credit);
        entry.booking_date = Some(date());
        entry.value_date = Some(date());
        entry.account_servicer_reference = Some("BANKREF-0001".to_string());
        entry.bank_transaction_code = BankTransactionCode::domain("PMNT", "RCDT", "ESCT");
        let mut details = EntryTransaction::default();
        details.reference.end_to_end_id = Some("E2E-1".to_string());
        details.reference.mandate_id = Some("M-7".to_string());
        details.remittance = vec!["Invoice 4711".to_string()];
        details.counterparty.name = Some("ACME GmbH".to_string());
        entry.transactions.push(details);
        statement.entries.push(entry);
        statement
    }

    #[test]
    fn test_camt053_to_mt940() {
        let source = camt_statement();
        let mt940 = camt053_to_mt940(&source).unwrap();
        let s = &mt940.statement;

        assert_eq!(s.transaction_reference, "STMT-2026-01-15");
        assert_eq!(s.account_id, "DE89370400440532013000");
        assert_eq!(s.statement_number.as_deref(), Some("00012"));
        assert_eq!(s.closing_balance.amount.value(), Decimal::new(150000, 2));
        assert!(s.closing_available_balance.is_some());
        assert_eq!(s.forward_available_balances.len(), 1);
        assert!(s.check_balance().is_consistent());

        let t = &s.transactions[0];
        assert_eq!(t.mark, DebitCredit::Credit);
        assert_eq!(t.type_code, "NTRF");
        assert_eq!(t.customer_reference, "E2E-1");
        assert_eq!(t.bank_reference.as_deref(), Some("BANKREF-0001"));
        assert_eq!(t.reference.end_to_end_id.as_deref(), Some("E2E-1"));
        assert_eq!(t.reference.mandate_id.as_deref(), Some("M-7"));
        assert_eq!(t.purpose, "Invoice 4711");

        assert_eq!(source, camt_statement());
    }

    #[test]
    fn test_long_end_to_end_id_uses_nonref() {
        let mut source = camt_statement();
        source.entries[0].transactions[0].reference.end_to_end_id = Some("E2E-0123456789-ABCDEF".to_string());
        let mt940 = camt053_to_mt940(&source).unwrap();
        let t = &mt940.statement.transactions[0];
        assert_eq!(t.customer_reference, NONREF);
        assert_eq!(t.reference.end_to_end_id.as_deref(), Some("E2E-0123456789-ABCDEF"));
    }

    #[test]
    fn test_reversal_is_preserved() {
        let mut source = camt_statement();
        source.entries[0].mark = DebitCredit::ReversalDebit;
        let mt940 = camt053_to_mt940(&source).unwrap();
        assert_eq!(mt940.statement.transactions[0].mark, DebitCredit::ReversalDebit);
    }

    #[test]
    fn test_previously_closed_balance_opens() {
        let mut source = camt_statement();
        source.balances[0].subtype = BalanceSubtype::PreviouslyClosedBooked;
        let mt940 = camt053_to_mt940(&source).unwrap();
        assert_eq!(mt940.statement.opening_balance.subtype, BalanceSubtype::OpeningBooked);
    }

    #[test]
    fn test_undated_entry_takes_closing_date() {
        let mut source = camt_statement();
        let closing_date = NaiveDate::from_ymd_opt(2026, 1, 16).unwrap();
        source.balances[1].date = closing_date;
        source.entries[0].booking_date = None;
        source.entries[0].value_date = None;

        let mt940 = camt053_to_mt940(&source).unwrap();
        let t = &mt940.statement.transactions[0];
        assert_eq!(t.value_date, closing_date);
        assert_eq!(t.booking_date, None);
        assert!(mt940.statement.check_balance().is_consistent());
    }

    #[test]
    fn test_first_of_two_closing_balances_opens() {
        let mut source = camt_statement();
        source.balances = vec![
            balance(BalanceSubtype::ClosingBooked, 100000),
            balance(BalanceSubtype::ClosingBooked, 150000),
        ];

        let mt940 = camt053_to_mt940(&source).unwrap();
        let s = &mt940.statement;
        assert_eq!(s.opening_balance.subtype, BalanceSubtype::OpeningBooked);
        assert_eq!(s.opening_balance.amount.value(), Decimal::new(100000, 2));
        assert_eq!(s.closing_balance.amount.value(), Decimal::new(150000, 2));
        assert!(s.check_balance().is_consistent());
    }

    #[test]
    fn test_missing_balance_fails() {
        let mut source = camt_statement();
        source.balances.retain(|b| b.subtype != BalanceSubtype::ClosingBooked);
        assert!(matches!(camt053_to_mt940(&source), Err(Error::ConversionError(_))));
    }

    #[test]
    fn test_type_code_lookup() {
        let code = |d: &str, f: &str, s: &str| type_code_for(&BankTransactionCode::domain(d, f, s));
        assert_eq!(code("PMNT", "IDDT", "ESDD"), "NDDT");
        assert_eq!(code("PMNT", "RCDT", "XBCT"), "NTRF");
        assert_eq!(code("PMNT", "CCRD", "POSD"), "NTRF");
        assert_eq!(code("FORX", "SPOT", "OTHR"), "NFEX");
        assert_eq!(code("LDAS", "CSLN", "DDWN"), "NMSC");
        assert_eq!(type_code_for(&BankTransactionCode::default()), "NMSC");
    }

    #[test]
    fn test_round_trip_through_mt940() {
        let source = camt_statement();
        let mt940 = camt053_to_mt940(&source).unwrap();
        let back = mt940_to_camt053(&mt940);

        assert_eq!(back.account.iban.as_deref(), Some("DE89370400440532013000"));
        assert_eq!(back.electronic_sequence, Some(12));
        assert_eq!(back.balances.len(), 4);
        let entry = &back.entries[0];
        assert_eq!(entry.bank_transaction_code, BankTransactionCode::domain("PMNT", "RCDT", "ESCT"));
        assert_eq!(entry.account_servicer_reference.as_deref(), Some("BANKREF-0001"));
        let details = entry.primary_transaction().unwrap();
        assert_eq!(details.reference.end_to_end_id.as_deref(), Some("E2E-1"));
        assert_eq!(details.remittance, vec!["Invoice 4711".to_string()]);
        assert_eq!(back.check_balance().map(|c| c.is_consistent()), Some(true));
    }

    #[test]
    fn test_mt940_into_document() {
        let mut mt = Statement::new(
            "REF1".to_string(),
            "37040044/0532013000".to_string(),
            balance(BalanceSubtype::OpeningBooked, 100000),
            balance(BalanceSubtype::ClosingBooked, 100000),
        );
        mt.statement_number = Some("00003/001".to_string());
        let document: Camt053Document = Mt940Statement::new(mt).into();

        assert_eq!(document.header.message_id, "REF1");
        let statement = &document.statements[0];
        assert_eq!(statement.account.other_id.as_deref(), Some("37040044/0532013000"));
        assert_eq!(statement.account.currency, Some(eur()));
        assert_eq!(statement.electronic_sequence, Some(3));
        assert!(statement.entries.is_empty());
    }
}
