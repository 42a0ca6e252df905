//! Balance and interim reports (MT941, MT942) and the statement request (MT920).

use crate::error::ParseError;
use crate::field_grammar::{
    find_field, format_balance, format_date_time, parse_balance, parse_date_time, require_field, text_value,
    EntrySummary, Field, FloorLimit,
};
use crate::mt940_format::{extract_transactions, format_statement_line};
use crate::mt_document::MtMessage;
use crate::types::{Balance, BalanceSubtype, DebitCredit, Transaction};
use chrono::{DateTime, FixedOffset};
use tracing::debug;

fn first_line(field: &Field) -> String {
    field.lines().next().unwrap_or("").trim().to_string()
}

/// Split `:34F:` occurrences into debit (or both directions) and credit limits.
fn floor_limits(fields: &[Field]) -> Result<(Option<FloorLimit>, Option<FloorLimit>), ParseError> {
    let mut limits = fields
        .iter()
        .filter(|f| f.tag == "34F")
        .map(FloorLimit::parse)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let debit = limits.next();
    let credit = limits.next();
    if let Some(credit) = &credit {
        if credit.mark != Some(DebitCredit::Credit) {
            return Err(ParseError::invalid("34F", "second floor limit must be a credit limit"));
        }
    }
    Ok((debit, credit))
}

fn push_floor_limits(fields: &mut Vec<Field>, debit: &Option<FloorLimit>, credit: &Option<FloorLimit>) {
    for limit in [debit, credit].into_iter().flatten() {
        fields.push(Field::new("34F", limit.format()));
    }
}

fn summaries(fields: &[Field]) -> Result<(Option<EntrySummary>, Option<EntrySummary>), ParseError> {
    let debit = find_field(fields, "90D").map(EntrySummary::parse).transpose()?;
    let credit = find_field(fields, "90C").map(EntrySummary::parse).transpose()?;
    Ok((debit, credit))
}

/// MT942 interim transaction report.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt942Report {
    pub transaction_reference: String,
    pub related_reference: Option<String>,
    pub account_id: String,
    pub statement_number: String,
    /// Debit floor limit, or the limit for both directions when unmarked.
    pub debit_floor_limit: FloorLimit,
    pub credit_floor_limit: Option<FloorLimit>,
    pub date_time: DateTime<FixedOffset>,
    pub transactions: Vec<Transaction>,
    pub debit_summary: Option<EntrySummary>,
    pub credit_summary: Option<EntrySummary>,
    pub information: Option<String>,
}

impl MtMessage for Mt942Report {
    fn message_type(&self) -> &'static str {
        "942"
    }

    fn from_fields(fields: &[Field]) -> Result<Self, ParseError> {
        let (debit_floor_limit, credit_floor_limit) = floor_limits(fields)?;
        let debit_floor_limit = debit_floor_limit.ok_or_else(|| ParseError::missing("34F"))?;
        let (debit_summary, credit_summary) = summaries(fields)?;
        let transactions = extract_transactions(fields, &debit_floor_limit.currency)?;

        let information = fields
            .windows(2)
            .find(|pair| pair[1].tag == "86" && pair[0].tag != "61")
            .map(|pair| text_value(&pair[1]))
            .or_else(|| {
                fields
                    .first()
                    .filter(|f| f.tag == "86")
                    .map(text_value)
            });

        Ok(Self {
            transaction_reference: first_line(require_field(fields, "20")?),
            related_reference: find_field(fields, "21").map(first_line),
            account_id: first_line(require_field(fields, "25")?),
            statement_number: first_line(require_field(fields, "28C")?),
            debit_floor_limit,
            credit_floor_limit,
            date_time: parse_date_time(require_field(fields, "13D")?)?,
            transactions,
            debit_summary,
            credit_summary,
            information,
        })
    }

    fn to_fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::new("20", &self.transaction_reference)];
        if let Some(related) = &self.related_reference {
            fields.push(Field::new("21", related));
        }
        fields.push(Field::new("25", &self.account_id));
        fields.push(Field::new("28C", &self.statement_number));
        push_floor_limits(&mut fields, &Some(self.debit_floor_limit.clone()), &self.credit_floor_limit);
        fields.push(Field::new("13D", format_date_time(&self.date_time)));
        for transaction in &self.transactions {
            fields.push(Field::new("61", format_statement_line(transaction)));
            let narrative = crate::field_grammar::format_narrative(
                &transaction.reference,
                &transaction.purpose,
                &transaction.counterparty,
            );
            if !narrative.is_empty() {
                fields.push(Field::new("86", narrative));
            }
        }
        if let Some(summary) = &self.debit_summary {
            fields.push(Field::new("90D", summary.format()));
        }
        if let Some(summary) = &self.credit_summary {
            fields.push(Field::new("90C", summary.format()));
        }
        if let Some(information) = &self.information {
            fields.push(Field::new("86", information));
        }
        fields
    }
}

/// MT941 balance report.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt941Report {
    pub transaction_reference: String,
    pub related_reference: Option<String>,
    pub account_id: String,
    pub statement_number: String,
    pub date_time: Option<DateTime<FixedOffset>>,
    pub opening_balance: Option<Balance>,
    pub debit_summary: Option<EntrySummary>,
    pub credit_summary: Option<EntrySummary>,
    pub closing_balance: Balance,
    pub closing_available_balance: Option<Balance>,
    pub forward_available_balances: Vec<Balance>,
    pub information: Option<String>,
}

impl MtMessage for Mt941Report {
    fn message_type(&self) -> &'static str {
        "941"
    }

    fn from_fields(fields: &[Field]) -> Result<Self, ParseError> {
        let statement_number = find_field(fields, "28")
            .or_else(|| find_field(fields, "28C"))
            .map(first_line)
            .ok_or_else(|| ParseError::missing("28"))?;
        let (debit_summary, credit_summary) = summaries(fields)?;

        Ok(Self {
            transaction_reference: first_line(require_field(fields, "20")?),
            related_reference: find_field(fields, "21").map(first_line),
            account_id: first_line(require_field(fields, "25")?),
            statement_number,
            date_time: find_field(fields, "13D").map(parse_date_time).transpose()?,
            opening_balance: find_field(fields, "60F")
                .map(|f| parse_balance(f, BalanceSubtype::OpeningBooked))
                .transpose()?,
            debit_summary,
            credit_summary,
            closing_balance: parse_balance(require_field(fields, "62F")?, BalanceSubtype::ClosingBooked)?,
            closing_available_balance: find_field(fields, "64")
                .map(|f| parse_balance(f, BalanceSubtype::ClosingAvailable))
                .transpose()?,
            forward_available_balances: fields
                .iter()
                .filter(|f| f.tag == "65")
                .map(|f| parse_balance(f, BalanceSubtype::ForwardAvailable))
                .collect::<Result<Vec<_>, _>>()?,
            information: find_field(fields, "86").map(text_value),
        })
    }

    fn to_fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::new("20", &self.transaction_reference)];
        if let Some(related) = &self.related_reference {
            fields.push(Field::new("21", related));
        }
        fields.push(Field::new("25", &self.account_id));
        fields.push(Field::new("28", &self.statement_number));
        if let Some(date_time) = &self.date_time {
            fields.push(Field::new("13D", format_date_time(date_time)));
        }
        if let Some(opening) = &self.opening_balance {
            fields.push(Field::new("60F", format_balance(opening)));
        }
        if let Some(summary) = &self.debit_summary {
            fields.push(Field::new("90D", summary.format()));
        }
        if let Some(summary) = &self.credit_summary {
            fields.push(Field::new("90C", summary.format()));
        }
        fields.push(Field::new("62F", format_balance(&self.closing_balance)));
        if let Some(available) = &self.closing_available_balance {
            fields.push(Field::new("64", format_balance(available)));
        }
        for forward in &self.forward_available_balances {
            fields.push(Field::new("65", format_balance(forward)));
        }
        if let Some(information) = &self.information {
            fields.push(Field::new("86", information));
        }
        fields
    }
}

/// Statement types an MT920 may request.
const REQUESTABLE_TYPES: [&str; 4] = ["940", "941", "942", "950"];

/// MT920 request message.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt920Request {
    pub transaction_reference: String,
    /// Requested message type (`:12:`).
    pub requested_message_type: String,
    pub account_id: String,
    pub debit_floor_limit: Option<FloorLimit>,
    pub credit_floor_limit: Option<FloorLimit>,
}

impl MtMessage for Mt920Request {
    fn message_type(&self) -> &'static str {
        "920"
    }

    fn from_fields(fields: &[Field]) -> Result<Self, ParseError> {
        let requested_message_type = first_line(require_field(fields, "12")?);
        if !REQUESTABLE_TYPES.contains(&requested_message_type.as_str()) {
            return Err(ParseError::invalid(
                "12",
                format!("MT{} cannot be requested", requested_message_type),
            ));
        }
        let (debit_floor_limit, credit_floor_limit) = floor_limits(fields)?;
        if requested_message_type == "942" && debit_floor_limit.is_none() {
            debug!("MT920 requests an MT942 without floor limit");
        }

        Ok(Self {
            transaction_reference: first_line(require_field(fields, "20")?),
            requested_message_type,
            account_id: first_line(require_field(fields, "25")?),
            debit_floor_limit,
            credit_floor_limit,
        })
    }

    fn to_fields(&self) -> Vec<Field> {
        let mut fields = vec![
            Field::new("20", &self.transaction_reference),
            Field::new("12", &self.requested_message_type),
            Field::new("25", &self.account_id),
        ];
        push_floor_limits(&mut fields, &self.debit_floor_limit, &self.credit_floor_limit);
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_grammar::tokenize;
    use rust_decimal::Decimal;

    #[test]
    fn test_interim_report() {
        let raw = ":20:INTRA-1\r\n:25:DE89370400440532013000\r\n:28C:5/2\r\n:34F:EURD100,\r\n:34F:EURC50,\r\n\
:13D:2601151230+0100\r\n:61:260115C250,00NTRFNONREF\r\n:86:EREF+E2E-1\r\n:90C:1EUR250,00\r\n";
        let report = Mt942Report::from_fields(&tokenize(raw)).unwrap();
        assert_eq!(report.debit_floor_limit.mark, Some(DebitCredit::Debit));
        assert_eq!(report.credit_floor_limit.as_ref().map(|l| l.amount.value()), Some(Decimal::new(50, 0)));
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.transactions[0].currency.as_str(), "EUR");
        assert_eq!(report.transactions[0].reference.end_to_end_id.as_deref(), Some("E2E-1"));
        assert_eq!(report.credit_summary.as_ref().map(|s| s.count), Some(1));
        assert_eq!(report.information, None);

        let again = Mt942Report::from_fields(&report.to_fields()).unwrap();
        assert_eq!(again, report);
    }

    #[test]
    fn test_interim_report_requires_floor_limit() {
        let raw = ":20:X\r\n:25:ACC\r\n:28C:1\r\n:13D:2601151230+0100\r\n";
        assert_eq!(Mt942Report::from_fields(&tokenize(raw)).unwrap_err(), ParseError::missing("34F"));
    }

    #[test]
    fn test_balance_report() {
        let raw = ":20:BAL-1\r\n:25:ACC-1\r\n:28:12\r\n:60F:C260114EUR100,00\r\n:62F:C260115EUR150,00\r\n\
:64:C260115EUR150,00\r\n:65:C260116EUR150,00\r\n:65:C260117EUR160,00\r\n";
        let report = Mt941Report::from_fields(&tokenize(raw)).unwrap();
        assert_eq!(report.statement_number, "12");
        assert_eq!(report.forward_available_balances.len(), 2);
        assert_eq!(report.closing_balance.amount.value(), Decimal::new(15000, 2));
        assert_eq!(Mt941Report::from_fields(&report.to_fields()).unwrap(), report);
    }

    #[test]
    fn test_statement_request() {
        let raw = ":20:REQ-1\r\n:12:942\r\n:25:ACC-1\r\n:34F:EUR0,\r\n";
        let request = Mt920Request::from_fields(&tokenize(raw)).unwrap();
        assert_eq!(request.requested_message_type, "942");
        assert_eq!(request.debit_floor_limit.as_ref().and_then(|l| l.mark), None);

        let bad = ":20:REQ-1\r\n:12:103\r\n:25:ACC-1\r\n";
        assert!(matches!(
            Mt920Request::from_fields(&tokenize(bad)),
            Err(ParseError::InvalidField { .. })
        ));
    }
}
