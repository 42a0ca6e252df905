//! MT940/MT950 customer statement parser and serializer.
//!
//! MT940 is a SWIFT format for electronic account statements. MT950 shares
//! its grammar but carries no `:86:` narrative per statement line.
//! Statements are read either from a full FIN envelope or from bare tag text
//! as banks usually export it.

use crate::error::{ParseError, Result};
use crate::field_grammar::{
    self, amount_len, balance_subtype, format_amount, format_balance, format_date, format_entry_date,
    parse_amount, parse_balance, parse_date, parse_entry_date, parse_narrative, Field,
};
use crate::swift_format::{split_messages, Envelope, Message};
use crate::types::{BalanceSubtype, CurrencyCode, DebitCredit, Statement, Transaction};
use rayon::prelude::*;
use std::io::{Read, Write};
use tracing::{debug, info, warn};

/// Which statement message a [`Mt940Statement`] is read from or written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementKind {
    #[default]
    Mt940,
    Mt950,
}

impl StatementKind {
    pub fn message_type(&self) -> &'static str {
        match self {
            StatementKind::Mt940 => "940",
            StatementKind::Mt950 => "950",
        }
    }

    /// Statement kind of a message type, if it is one.
    pub fn from_message_type(message_type: &str) -> Option<Self> {
        match message_type {
            "940" => Some(StatementKind::Mt940),
            "950" => Some(StatementKind::Mt950),
            _ => None,
        }
    }
}

/// Represents an MT940 or MT950 statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt940Statement {
    /// The underlying statement data.
    pub statement: Statement,
    pub kind: StatementKind,
}

impl Mt940Statement {
    pub fn new(statement: Statement) -> Self {
        Self {
            statement,
            kind: StatementKind::Mt940,
        }
    }

    /// Parse one statement from a FIN envelope or from bare tag text.
    pub fn parse(raw: &str) -> std::result::Result<Self, ParseError> {
        if raw.trim_start().starts_with('{') {
            Self::from_message(&Message::decode(raw.trim())?)
        } else {
            Self::from_fields(&field_grammar::tokenize(raw))
        }
    }

    /// Read the statement out of a decoded MT940 or MT950 message.
    pub fn from_message(message: &Message) -> std::result::Result<Self, ParseError> {
        let kind = StatementKind::from_message_type(message.message_type()).ok_or_else(|| {
            ParseError::UnrecognizedVersion(format!("MT{} is not a statement", message.message_type()))
        })?;
        let mut parsed = Self::from_fields(&message.text.fields)?;
        parsed.kind = kind;
        Ok(parsed)
    }

    /// Build a statement from block 4 fields.
    pub fn from_fields(fields: &[Field]) -> std::result::Result<Self, ParseError> {
        match fields.first() {
            Some(first) if first.tag == "20" => {}
            _ => return Err(ParseError::MissingMandatoryBlock(":20:".to_string())),
        }

        let mut reference = String::new();
        let mut related_reference = None;
        let mut account_id = None;
        let mut statement_number = None;
        let mut opening = None;
        let mut closing = None;
        let mut closing_available = None;
        let mut forward_available = Vec::new();
        let mut information: Vec<String> = Vec::new();
        let mut previous_tag = "";

        for field in fields {
            match field.tag.as_str() {
                "20" => reference = field.value.trim().to_string(),
                "21" => related_reference = Some(field.value.trim().to_string()),
                "25" | "25P" => account_id = field.lines().next().map(|l| l.trim().to_string()),
                "28C" => statement_number = Some(field.value.trim().to_string()),
                tag @ ("60F" | "60M") if opening.is_none() => {
                    opening = Some(parse_balance(field, balance_subtype(tag).unwrap_or(BalanceSubtype::OpeningBooked))?);
                }
                tag @ ("62F" | "62M") => {
                    closing = Some(parse_balance(field, balance_subtype(tag).unwrap_or(BalanceSubtype::ClosingBooked))?);
                }
                "64" => closing_available = Some(parse_balance(field, BalanceSubtype::ClosingAvailable)?),
                "65" => forward_available.push(parse_balance(field, BalanceSubtype::ForwardAvailable)?),
                "86" if previous_tag != "61" => information.push(field.lines().collect::<Vec<_>>().join("\n")),
                "61" | "86" | "60F" | "60M" => {}
                other => debug!(tag = other, "ignoring tag in statement"),
            }
            previous_tag = field.tag.as_str();
        }

        let account_id = account_id.ok_or_else(|| ParseError::missing("25"))?;
        let opening = opening.ok_or_else(|| ParseError::missing("60F"))?;
        let closing = closing.ok_or_else(|| ParseError::missing("62F"))?;

        let transactions = extract_transactions(fields, &opening.currency)?;
        let mut statement = Statement::new(reference, account_id, opening, closing);
        statement.related_reference = related_reference;
        statement.statement_number = statement_number;
        statement.closing_available_balance = closing_available;
        statement.forward_available_balances = forward_available;
        statement.transactions = transactions;
        statement.information = (!information.is_empty()).then(|| information.join("\n"));

        let check = statement.check_balance();
        if !check.is_consistent() {
            warn!(
                reference = %statement.transaction_reference,
                expected = %check.expected,
                actual = %check.actual,
                "closing balance does not match opening balance plus entries"
            );
        }

        Ok(Self::new(statement))
    }

    /// Block 4 fields in canonical order.
    pub fn to_fields(&self) -> Vec<Field> {
        let s = &self.statement;
        let mut fields = vec![Field::new("20", &s.transaction_reference)];
        if let Some(related) = &s.related_reference {
            fields.push(Field::new("21", related));
        }
        fields.push(Field::new("25", &s.account_id));
        if let Some(number) = &s.statement_number {
            fields.push(Field::new("28C", number));
        }

        let opening_tag = if s.opening_balance.subtype == BalanceSubtype::InterimBooked { "60M" } else { "60F" };
        fields.push(Field::new(opening_tag, format_balance(&s.opening_balance)));

        for transaction in &s.transactions {
            fields.push(Field::new("61", format_statement_line(transaction)));
            if self.kind == StatementKind::Mt940 {
                if let Some(narrative) = format_transaction_narrative(transaction) {
                    fields.push(Field::new("86", narrative));
                }
            }
        }

        let closing_tag = if s.closing_balance.subtype == BalanceSubtype::InterimBooked { "62M" } else { "62F" };
        fields.push(Field::new(closing_tag, format_balance(&s.closing_balance)));
        if let Some(available) = &s.closing_available_balance {
            fields.push(Field::new("64", format_balance(available)));
        }
        for forward in &s.forward_available_balances {
            fields.push(Field::new("65", format_balance(forward)));
        }
        if let Some(information) = &s.information {
            if self.kind == StatementKind::Mt940 {
                let lines = field_grammar::wrap_lines(information, 65, 6);
                fields.push(Field::new("86", lines.join("\n")));
            }
        }
        fields
    }

    /// Wrap the statement in a FIN message.
    pub fn build(&self, envelope: &Envelope) -> Message {
        envelope.wrap(self.kind.message_type(), self.to_fields())
    }

    /// Bare tag text, CRLF terminated and closed by a `-` line.
    pub fn to_mt_string(&self) -> String {
        let mut out = String::new();
        for field in self.to_fields() {
            out.push_str(&format!(":{}:{}\r\n", field.tag, field.lines().collect::<Vec<_>>().join("\r\n")));
        }
        out.push_str("-\r\n");
        out
    }

    /// Parse an MT940 statement from any source implementing `Read`.
    ///
    /// # Arguments
    ///
    /// * `reader` - A mutable reference to a type implementing `Read`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use ypbank_interchange::mt940_format::Mt940Statement;
    ///
    /// let mut file = File::open("statement.mt940")?;
    /// let statement = Mt940Statement::from_read(&mut file)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw)?;
        Ok(Self::parse(&raw)?)
    }

    /// Write the statement as bare MT940 tag text.
    ///
    /// # Arguments
    ///
    /// * `writer` - A mutable reference to a type implementing `Write`
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.to_mt_string().as_bytes())?;
        Ok(())
    }
}

/// Parse every `:61:` line (and the `:86:` directly after it) of a text block.
///
/// Transactions take the currency of the `:60a:` balance when one is present
/// and `fallback_currency` otherwise.
pub fn extract_transactions(
    fields: &[Field],
    fallback_currency: &CurrencyCode,
) -> std::result::Result<Vec<Transaction>, ParseError> {
    let currency = fields
        .iter()
        .find(|f| f.tag == "60F" || f.tag == "60M")
        .and_then(|f| f.value.get(7..10))
        .and_then(|c| c.parse::<CurrencyCode>().ok())
        .unwrap_or_else(|| fallback_currency.clone());

    let mut transactions: Vec<Transaction> = Vec::new();
    let mut previous_tag = "";
    for field in fields {
        match field.tag.as_str() {
            "61" => transactions.push(parse_statement_line(field, &currency)?),
            "86" if previous_tag == "61" => {
                if let Some(transaction) = transactions.last_mut() {
                    apply_narrative(transaction, &field.value);
                }
            }
            _ => {}
        }
        previous_tag = field.tag.as_str();
    }
    Ok(transactions)
}

/// Decode a `:61:` statement line.
pub fn parse_statement_line(field: &Field, currency: &CurrencyCode) -> std::result::Result<Transaction, ParseError> {
    let tag = field.tag.as_str();
    let mut lines = field.lines();
    let line = lines.next().unwrap_or("").trim();
    let supplementary = lines.next().map(str::trim).filter(|s| !s.is_empty());
    if !line.is_ascii() {
        return Err(ParseError::invalid(tag, "statement line must be ASCII"));
    }

    let value_date = parse_date(tag, line.get(0..6).unwrap_or(line))?;
    let mut rest = &line[6..];

    let booking_date = match rest.get(0..4) {
        Some(mmdd) if mmdd.bytes().all(|b| b.is_ascii_digit()) => {
            rest = &rest[4..];
            Some(parse_entry_date(tag, mmdd, value_date)?)
        }
        _ => None,
    };

    let mark = if let Some(r) = rest.strip_prefix("RC") {
        rest = r;
        DebitCredit::ReversalCredit
    } else if let Some(r) = rest.strip_prefix("RD") {
        rest = r;
        DebitCredit::ReversalDebit
    } else if let Some(r) = rest.strip_prefix('C') {
        rest = r;
        DebitCredit::Credit
    } else if let Some(r) = rest.strip_prefix('D') {
        rest = r;
        DebitCredit::Debit
    } else {
        return Err(ParseError::invalid(tag, format!("missing credit/debit mark in '{}'", line)));
    };

    let funds_code = rest.chars().next().filter(char::is_ascii_alphabetic);
    if funds_code.is_some() {
        rest = &rest[1..];
    }

    let len = amount_len(rest);
    let amount = parse_amount(tag, &rest[..len])?;
    rest = &rest[len..];

    let type_code = rest
        .get(0..4)
        .filter(|code| matches!(code.as_bytes()[0], b'N' | b'F' | b'S'))
        .ok_or_else(|| ParseError::invalid(tag, format!("missing transaction type in '{}'", line)))?;
    rest = &rest[4..];

    let (customer_reference, bank_reference) = match rest.split_once("//") {
        Some((customer, bank)) => (customer, Some(bank.trim()).filter(|b| !b.is_empty())),
        None => (rest, None),
    };

    let mut transaction = Transaction::new(value_date, mark, amount, currency.clone(), type_code);
    transaction.booking_date = booking_date;
    transaction.funds_code = funds_code;
    if !customer_reference.trim().is_empty() {
        transaction.customer_reference = customer_reference.trim().to_string();
    }
    transaction.bank_reference = bank_reference.map(str::to_string);
    transaction.supplementary_details = supplementary.map(str::to_string);
    Ok(transaction)
}

fn apply_narrative(transaction: &mut Transaction, value: &str) {
    let narrative = parse_narrative(value);
    transaction.reference = narrative.reference;
    transaction.purpose = narrative.purpose;
    transaction.business_code = narrative.business_code;
    transaction.posting_text = narrative.posting_text;
    transaction.counterparty = narrative.counterparty;
}

/// Encode a transaction as a `:61:` value.
pub fn format_statement_line(transaction: &Transaction) -> String {
    let mut out = format_date(&transaction.value_date);
    if let Some(booking) = &transaction.booking_date {
        out.push_str(&format_entry_date(booking));
    }
    out.push_str(transaction.mark.as_mt());
    out.extend(transaction.funds_code.iter());
    out.push_str(&format_amount(&transaction.amount));
    out.push_str(&transaction.type_code);
    out.push_str(&transaction.customer_reference);
    if let Some(bank) = &transaction.bank_reference {
        out.push_str("//");
        out.push_str(bank);
    }
    if let Some(details) = &transaction.supplementary_details {
        out.push('\n');
        out.push_str(details);
    }
    out
}

fn format_transaction_narrative(transaction: &Transaction) -> Option<String> {
    let text = field_grammar::format_narrative(&transaction.reference, &transaction.purpose, &transaction.counterparty);
    (!text.is_empty()).then_some(text)
}

/// Split bare tag text into one chunk per statement at each `:20:` line.
///
/// Tag text in front of the first `:20:` forms its own chunk so that it is
/// reported rather than dropped.
pub fn split_statements(text: &str) -> Vec<&str> {
    let mut starts = vec![0];
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.starts_with(":20:") && offset > 0 {
            starts.push(offset);
        }
        offset += line.len();
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| &text[start..starts.get(i + 1).copied().unwrap_or(text.len())])
        .filter(|chunk| chunk.lines().any(|l| field_grammar::tag_prefix(l).is_some()))
        .collect()
}

/// Decode every statement of a multi-statement file.
///
/// Each statement is parsed on its own, so one malformed statement does not
/// abort the batch. Results keep input order and carry the chunk index.
pub fn parse_batch(raw: &str) -> Vec<(usize, std::result::Result<Mt940Statement, ParseError>)> {
    let chunks = if raw.trim_start().starts_with('{') {
        split_messages(raw)
    } else {
        split_statements(raw)
    };

    let results: Vec<_> = chunks
        .par_iter()
        .enumerate()
        .map(|(index, chunk)| (index, Mt940Statement::parse(chunk)))
        .collect();

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    info!(statements = results.len(), failed, "parsed statement batch");
    results
}
