//! Common types used across different financial formats.
//!
//! Raw input is parsed into typed values first ([`CurrencyCode`], [`Amount`],
//! [`DebitCredit`]) and entities are then built only from those values, so
//! constructing a [`Balance`] or [`Transaction`] cannot fail.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance used when checking that balances and transactions add up.
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// ISO 4217 alphabetic currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() == 3 && s.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(CurrencyCode(s.to_string()))
        } else {
            Err(Error::validation(
                "currency",
                format!("'{}' is not a three-letter currency code", s),
            ))
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-negative monetary magnitude. The sign lives in [`DebitCredit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Wrap a decimal, rejecting negative values.
    pub fn new(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::validation(
                "amount",
                format!("{} is negative", value),
            ));
        }
        Ok(Amount(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

/// Accepts both `1234,56` (SWIFT, DATEV) and `1234.56` (ISO 20022).
impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().replace(',', ".");
        let normalized = normalized.strip_suffix('.').unwrap_or(&normalized);
        let value = Decimal::from_str(normalized)
            .map_err(|_| Error::validation("amount", format!("'{}' is not a decimal amount", s)))?;
        Amount::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Debit/Credit mark, including the MT940 reversal marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebitCredit {
    /// Credit transaction (incoming).
    Credit,
    /// Debit transaction (outgoing).
    Debit,
    /// Reversal of a credit (`RC`), books as a debit.
    ReversalCredit,
    /// Reversal of a debit (`RD`), books as a credit.
    ReversalDebit,
}

impl FromStr for DebitCredit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "D" | "DBIT" | "DEBIT" => Ok(DebitCredit::Debit),
            "C" | "CRDT" | "CREDIT" => Ok(DebitCredit::Credit),
            "RC" => Ok(DebitCredit::ReversalCredit),
            "RD" => Ok(DebitCredit::ReversalDebit),
            _ => Err(format!("Invalid debit/credit indicator: {}", s)),
        }
    }
}

impl DebitCredit {
    /// Build from an ISO 20022 `CdtDbtInd` plus `RvslInd`.
    pub fn from_iso(indicator: &str, reversal: bool) -> std::result::Result<Self, String> {
        let mark: DebitCredit = indicator.parse()?;
        Ok(match (mark, reversal) {
            (DebitCredit::Debit, true) => DebitCredit::ReversalCredit,
            (DebitCredit::Credit, true) => DebitCredit::ReversalDebit,
            (other, _) => other,
        })
    }

    /// MT representation (`C`, `D`, `RC`, `RD`).
    pub fn as_mt(&self) -> &'static str {
        match self {
            DebitCredit::Credit => "C",
            DebitCredit::Debit => "D",
            DebitCredit::ReversalCredit => "RC",
            DebitCredit::ReversalDebit => "RD",
        }
    }

    /// Convert to ISO 20022 format. Reversals report the booking direction.
    pub fn to_iso_format(&self) -> &'static str {
        if self.is_credit() {
            "CRDT"
        } else {
            "DBIT"
        }
    }

    pub fn is_reversal(&self) -> bool {
        matches!(self, DebitCredit::ReversalCredit | DebitCredit::ReversalDebit)
    }

    /// True when the booking increases the account balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, DebitCredit::Credit | DebitCredit::ReversalDebit)
    }

    /// Apply this mark's sign to a magnitude.
    pub fn apply(&self, amount: Amount) -> Decimal {
        if self.is_credit() {
            amount.value()
        } else {
            -amount.value()
        }
    }
}

impl fmt::Display for DebitCredit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mt())
    }
}

/// Role of a balance in a statement, named by its ISO 20022 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceSubtype {
    /// OPBD
    OpeningBooked,
    /// CLBD
    ClosingBooked,
    /// PRCD
    PreviouslyClosedBooked,
    /// CLAV
    ClosingAvailable,
    /// FWAV
    ForwardAvailable,
    /// ITBD, intermediate `:60M:`/`:62M:` balances.
    InterimBooked,
}

impl BalanceSubtype {
    pub fn code(&self) -> &'static str {
        match self {
            BalanceSubtype::OpeningBooked => "OPBD",
            BalanceSubtype::ClosingBooked => "CLBD",
            BalanceSubtype::PreviouslyClosedBooked => "PRCD",
            BalanceSubtype::ClosingAvailable => "CLAV",
            BalanceSubtype::ForwardAvailable => "FWAV",
            BalanceSubtype::InterimBooked => "ITBD",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "OPBD" => Some(BalanceSubtype::OpeningBooked),
            "CLBD" => Some(BalanceSubtype::ClosingBooked),
            "PRCD" => Some(BalanceSubtype::PreviouslyClosedBooked),
            "CLAV" => Some(BalanceSubtype::ClosingAvailable),
            "FWAV" => Some(BalanceSubtype::ForwardAvailable),
            "ITBD" => Some(BalanceSubtype::InterimBooked),
            _ => None,
        }
    }
}

/// Account statement balance information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub subtype: BalanceSubtype,
    pub mark: DebitCredit,
    pub date: NaiveDate,
    pub currency: CurrencyCode,
    pub amount: Amount,
}

impl Balance {
    pub fn new(
        subtype: BalanceSubtype,
        mark: DebitCredit,
        date: NaiveDate,
        currency: CurrencyCode,
        amount: Amount,
    ) -> Self {
        Self {
            subtype,
            mark,
            date,
            currency,
            amount,
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.mark.apply(self.amount)
    }
}

/// Which field of a [`Reference`] was selected as primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    EndToEnd,
    AccountServicer,
    Entry,
    Mandate,
    Instruction,
    Additional,
}

/// Structured references carried by a transaction (EREF/MREF/CRED/KREF and
/// the ISO 20022 reference set).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub end_to_end_id: Option<String>,
    pub mandate_id: Option<String>,
    pub creditor_id: Option<String>,
    pub entry_reference: Option<String>,
    pub account_servicer_reference: Option<String>,
    pub payment_information_id: Option<String>,
    pub instruction_id: Option<String>,
    pub additional: Option<String>,
}

impl Reference {
    pub fn is_empty(&self) -> bool {
        *self == Reference::default()
    }

    /// The reference that best identifies the transaction, by fixed precedence.
    pub fn primary(&self) -> Option<(ReferenceKind, &str)> {
        [
            (ReferenceKind::EndToEnd, &self.end_to_end_id),
            (ReferenceKind::AccountServicer, &self.account_servicer_reference),
            (ReferenceKind::Entry, &self.entry_reference),
            (ReferenceKind::Mandate, &self.mandate_id),
            (ReferenceKind::Instruction, &self.instruction_id),
            (ReferenceKind::Additional, &self.additional),
        ]
        .into_iter()
        .find_map(|(kind, value)| value.as_deref().map(|v| (kind, v)))
    }
}

/// Counterparty details recovered from a structured narrative or CAMT entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    pub name: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
}

impl Counterparty {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.iban.is_none() && self.bic.is_none()
    }
}

/// One statement line (`:61:` plus its `:86:`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub value_date: NaiveDate,
    pub booking_date: Option<NaiveDate>,
    pub mark: DebitCredit,
    /// Third character of the currency code, when the bank sends one.
    pub funds_code: Option<char>,
    pub amount: Amount,
    pub currency: CurrencyCode,
    /// Transaction type identification, e.g. `NTRF`.
    pub type_code: String,
    pub customer_reference: String,
    pub bank_reference: Option<String>,
    pub supplementary_details: Option<String>,
    pub reference: Reference,
    pub purpose: String,
    /// Business transaction code (GVC) of a structured narrative.
    pub business_code: Option<String>,
    pub posting_text: Option<String>,
    pub counterparty: Counterparty,
}

impl Transaction {
    pub fn new(
        value_date: NaiveDate,
        mark: DebitCredit,
        amount: Amount,
        currency: CurrencyCode,
        type_code: impl Into<String>,
    ) -> Self {
        Self {
            value_date,
            booking_date: None,
            mark,
            funds_code: None,
            amount,
            currency,
            type_code: type_code.into(),
            customer_reference: "NONREF".to_string(),
            bank_reference: None,
            supplementary_details: None,
            reference: Reference::default(),
            purpose: String::new(),
            business_code: None,
            posting_text: None,
            counterparty: Counterparty::default(),
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.mark.apply(self.amount)
    }
}

/// Result of checking `closing == opening + Σ transactions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceCheck {
    /// Opening balance plus the signed sum of all transactions.
    pub expected: Decimal,
    /// Reported closing balance.
    pub actual: Decimal,
}

impl BalanceCheck {
    pub fn difference(&self) -> Decimal {
        self.actual - self.expected
    }

    pub fn is_consistent(&self) -> bool {
        self.difference().abs() <= BALANCE_TOLERANCE
    }
}

/// Account statement containing transactions and balances (MT940/950 family).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Transaction reference number (`:20:`).
    pub transaction_reference: String,

    /// Related reference (`:21:`).
    pub related_reference: Option<String>,

    /// Account identification (`:25:`).
    pub account_id: String,

    /// Statement number/sequence number (`:28C:`).
    pub statement_number: Option<String>,

    pub opening_balance: Balance,
    pub closing_balance: Balance,
    pub closing_available_balance: Option<Balance>,
    pub forward_available_balances: Vec<Balance>,

    /// List of transactions.
    pub transactions: Vec<Transaction>,

    /// Statement-level information to account owner (trailing `:86:`).
    pub information: Option<String>,
}

impl Statement {
    /// Create a new statement with its mandatory parts.
    pub fn new(
        transaction_reference: String,
        account_id: String,
        opening_balance: Balance,
        closing_balance: Balance,
    ) -> Self {
        Self {
            transaction_reference,
            related_reference: None,
            account_id,
            statement_number: None,
            opening_balance,
            closing_balance,
            closing_available_balance: None,
            forward_available_balances: Vec::new(),
            transactions: Vec::new(),
            information: None,
        }
    }

    /// Account currency, taken from the opening balance.
    pub fn currency(&self) -> &CurrencyCode {
        &self.opening_balance.currency
    }

    /// Add a transaction to the statement.
    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    pub fn check_balance(&self) -> BalanceCheck {
        let movement: Decimal = self.transactions.iter().map(Transaction::signed_amount).sum();
        BalanceCheck {
            expected: self.opening_balance.signed_amount() + movement,
            actual: self.closing_balance.signed_amount(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eur() -> CurrencyCode {
        "EUR".parse().unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[test]
    fn test_currency_code_validation() {
        assert_eq!(eur().as_str(), "EUR");
        assert!("eur".parse::<CurrencyCode>().is_err());
        assert!("EURO".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_amount_parsing() {
        assert_eq!("500,00".parse::<Amount>().unwrap().value(), Decimal::new(50000, 2));
        assert_eq!("12.5".parse::<Amount>().unwrap().value(), Decimal::new(125, 1));
        assert_eq!("100,".parse::<Amount>().unwrap().value(), Decimal::new(100, 0));
        assert!(Amount::new(Decimal::new(-1, 0)).is_err());
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn test_debit_credit_signs() {
        let amount = Amount::new(Decimal::new(10, 0)).unwrap();
        assert_eq!(DebitCredit::Credit.apply(amount), Decimal::new(10, 0));
        assert_eq!(DebitCredit::Debit.apply(amount), Decimal::new(-10, 0));
        assert_eq!(DebitCredit::ReversalCredit.apply(amount), Decimal::new(-10, 0));
        assert_eq!(DebitCredit::ReversalDebit.apply(amount), Decimal::new(10, 0));
        assert_eq!("RC".parse::<DebitCredit>(), Ok(DebitCredit::ReversalCredit));
        assert_eq!(DebitCredit::from_iso("DBIT", true), Ok(DebitCredit::ReversalCredit));
        assert!("X".parse::<DebitCredit>().is_err());
    }

    #[test]
    fn test_reference_precedence() {
        let mut reference = Reference {
            mandate_id: Some("M-1".into()),
            additional: Some("X".into()),
            ..Reference::default()
        };
        assert_eq!(reference.primary(), Some((ReferenceKind::Mandate, "M-1")));

        reference.entry_reference = Some("NTRY".into());
        assert_eq!(reference.primary(), Some((ReferenceKind::Entry, "NTRY")));

        reference.end_to_end_id = Some("E2E".into());
        assert_eq!(reference.primary(), Some((ReferenceKind::EndToEnd, "E2E")));
        assert!(Reference::default().primary().is_none());
    }

    #[test]
    fn test_balance_check_tolerance() {
        let opening = Balance::new(
            BalanceSubtype::OpeningBooked,
            DebitCredit::Credit,
            date(),
            eur(),
            "100,00".parse().unwrap(),
        );
        let mut closing = opening.clone();
        closing.subtype = BalanceSubtype::ClosingBooked;
        closing.amount = "79,996".parse().unwrap();

        let mut statement = Statement::new("S1".into(), "ACC".into(), opening, closing);
        statement.add_transaction(Transaction::new(
            date(),
            DebitCredit::Debit,
            "20,00".parse().unwrap(),
            eur(),
            "NTRF",
        ));
        assert!(statement.check_balance().is_consistent());

        statement.closing_balance.amount = "79,00".parse().unwrap();
        let check = statement.check_balance();
        assert!(!check.is_consistent());
        assert_eq!(check.difference(), Decimal::new(-100, 2));
    }
}
