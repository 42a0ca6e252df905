//! Payment messages: confirmations (MT900, MT910), transfers (MT103, MT200)
//! and the request for transfer (MT101).

use crate::error::ParseError;
use crate::field_grammar::{
    find_field, find_party, format_date, format_date_time, is_party_tag, parse_date, parse_date_time, require_field,
    text_value, CurrencyAmount, Field, PartyField, ValueDateAmount,
};
use crate::mt_document::MtMessage;
use chrono::{DateTime, FixedOffset, NaiveDate};

fn first_line(field: &Field) -> String {
    field.lines().next().unwrap_or("").trim().to_string()
}

fn party(fields: &[Field], number: &str) -> Option<PartyField> {
    find_party(fields, number).map(PartyField::parse)
}

fn require_party(fields: &[Field], number: &str) -> Result<PartyField, ParseError> {
    party(fields, number).ok_or_else(|| ParseError::missing(number))
}

fn push_party(fields: &mut Vec<Field>, number: &str, party: &Option<PartyField>) {
    if let Some(party) = party {
        fields.push(Field::new(party.tag(number), party.to_value()));
    }
}

fn push_text(fields: &mut Vec<Field>, tag: &str, value: &Option<String>) {
    if let Some(value) = value {
        fields.push(Field::new(tag, value));
    }
}

/// MT900 confirmation of debit.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt900Confirmation {
    pub transaction_reference: String,
    pub related_reference: String,
    pub account_id: String,
    pub date_time: Option<DateTime<FixedOffset>>,
    pub value: ValueDateAmount,
    pub ordering_institution: Option<PartyField>,
    pub sender_to_receiver: Option<String>,
}

impl MtMessage for Mt900Confirmation {
    fn message_type(&self) -> &'static str {
        "900"
    }

    fn from_fields(fields: &[Field]) -> Result<Self, ParseError> {
        Ok(Self {
            transaction_reference: first_line(require_field(fields, "20")?),
            related_reference: first_line(require_field(fields, "21")?),
            account_id: first_line(find_party(fields, "25").ok_or_else(|| ParseError::missing("25"))?),
            date_time: find_field(fields, "13D").map(parse_date_time).transpose()?,
            value: ValueDateAmount::parse(require_field(fields, "32A")?)?,
            ordering_institution: party(fields, "52"),
            sender_to_receiver: find_field(fields, "72").map(text_value),
        })
    }

    fn to_fields(&self) -> Vec<Field> {
        let mut fields = vec![
            Field::new("20", &self.transaction_reference),
            Field::new("21", &self.related_reference),
            Field::new("25", &self.account_id),
        ];
        if let Some(date_time) = &self.date_time {
            fields.push(Field::new("13D", format_date_time(date_time)));
        }
        fields.push(Field::new("32A", self.value.format()));
        push_party(&mut fields, "52", &self.ordering_institution);
        push_text(&mut fields, "72", &self.sender_to_receiver);
        fields
    }
}

/// MT910 confirmation of credit.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt910Confirmation {
    pub transaction_reference: String,
    pub related_reference: String,
    pub account_id: String,
    pub date_time: Option<DateTime<FixedOffset>>,
    pub value: ValueDateAmount,
    pub ordering_customer: Option<PartyField>,
    pub ordering_institution: Option<PartyField>,
    pub intermediary: Option<PartyField>,
    pub sender_to_receiver: Option<String>,
}

impl MtMessage for Mt910Confirmation {
    fn message_type(&self) -> &'static str {
        "910"
    }

    fn from_fields(fields: &[Field]) -> Result<Self, ParseError> {
        let ordering_customer = party(fields, "50");
        let ordering_institution = party(fields, "52");
        if ordering_customer.is_none() && ordering_institution.is_none() {
            return Err(ParseError::invalid("50a", "either :50a: or :52a: must be present"));
        }

        Ok(Self {
            transaction_reference: first_line(require_field(fields, "20")?),
            related_reference: first_line(require_field(fields, "21")?),
            account_id: first_line(find_party(fields, "25").ok_or_else(|| ParseError::missing("25"))?),
            date_time: find_field(fields, "13D").map(parse_date_time).transpose()?,
            value: ValueDateAmount::parse(require_field(fields, "32A")?)?,
            ordering_customer,
            ordering_institution,
            intermediary: party(fields, "56"),
            sender_to_receiver: find_field(fields, "72").map(text_value),
        })
    }

    fn to_fields(&self) -> Vec<Field> {
        let mut fields = vec![
            Field::new("20", &self.transaction_reference),
            Field::new("21", &self.related_reference),
            Field::new("25", &self.account_id),
        ];
        if let Some(date_time) = &self.date_time {
            fields.push(Field::new("13D", format_date_time(date_time)));
        }
        fields.push(Field::new("32A", self.value.format()));
        push_party(&mut fields, "50", &self.ordering_customer);
        push_party(&mut fields, "52", &self.ordering_institution);
        push_party(&mut fields, "56", &self.intermediary);
        push_text(&mut fields, "72", &self.sender_to_receiver);
        fields
    }
}

/// MT103 single customer credit transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt103Transfer {
    pub sender_reference: String,
    /// `:13C:` time indications, e.g. `/CLSTIME/0915+0100`.
    pub time_indications: Vec<String>,
    /// `:23B:` bank operation code, usually `CRED`.
    pub bank_operation_code: String,
    pub instruction_codes: Vec<String>,
    pub value: ValueDateAmount,
    pub instructed_amount: Option<CurrencyAmount>,
    pub exchange_rate: Option<String>,
    pub ordering_customer: PartyField,
    pub ordering_institution: Option<PartyField>,
    pub senders_correspondent: Option<PartyField>,
    pub intermediary: Option<PartyField>,
    pub account_with_institution: Option<PartyField>,
    pub beneficiary: PartyField,
    pub remittance_information: Option<String>,
    /// `:71A:` details of charges (`OUR`, `SHA`, `BEN`).
    pub charges: String,
    pub sender_charges: Vec<CurrencyAmount>,
    pub receiver_charges: Option<CurrencyAmount>,
    pub sender_to_receiver: Option<String>,
    pub regulatory_reporting: Option<String>,
}

impl MtMessage for Mt103Transfer {
    fn message_type(&self) -> &'static str {
        "103"
    }

    fn from_fields(fields: &[Field]) -> Result<Self, ParseError> {
        let charges = first_line(require_field(fields, "71A")?);
        if !matches!(charges.as_str(), "OUR" | "SHA" | "BEN") {
            return Err(ParseError::invalid("71A", format!("unknown charges code '{}'", charges)));
        }

        Ok(Self {
            sender_reference: first_line(require_field(fields, "20")?),
            time_indications: fields.iter().filter(|f| f.tag == "13C").map(first_line).collect(),
            bank_operation_code: first_line(require_field(fields, "23B")?),
            instruction_codes: fields.iter().filter(|f| f.tag == "23E").map(first_line).collect(),
            value: ValueDateAmount::parse(require_field(fields, "32A")?)?,
            instructed_amount: find_field(fields, "33B").map(CurrencyAmount::parse).transpose()?,
            exchange_rate: find_field(fields, "36").map(first_line),
            ordering_customer: require_party(fields, "50")?,
            ordering_institution: party(fields, "52"),
            senders_correspondent: party(fields, "53"),
            intermediary: party(fields, "56"),
            account_with_institution: party(fields, "57"),
            beneficiary: require_party(fields, "59")?,
            remittance_information: find_field(fields, "70").map(text_value),
            charges,
            sender_charges: fields
                .iter()
                .filter(|f| f.tag == "71F")
                .map(CurrencyAmount::parse)
                .collect::<Result<Vec<_>, _>>()?,
            receiver_charges: find_field(fields, "71G").map(CurrencyAmount::parse).transpose()?,
            sender_to_receiver: find_field(fields, "72").map(text_value),
            regulatory_reporting: find_field(fields, "77B").map(text_value),
        })
    }

    fn to_fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::new("20", &self.sender_reference)];
        for time in &self.time_indications {
            fields.push(Field::new("13C", time));
        }
        fields.push(Field::new("23B", &self.bank_operation_code));
        for code in &self.instruction_codes {
            fields.push(Field::new("23E", code));
        }
        fields.push(Field::new("32A", self.value.format()));
        if let Some(instructed) = &self.instructed_amount {
            fields.push(Field::new("33B", instructed.format()));
        }
        push_text(&mut fields, "36", &self.exchange_rate);
        push_party(&mut fields, "50", &Some(self.ordering_customer.clone()));
        push_party(&mut fields, "52", &self.ordering_institution);
        push_party(&mut fields, "53", &self.senders_correspondent);
        push_party(&mut fields, "56", &self.intermediary);
        push_party(&mut fields, "57", &self.account_with_institution);
        push_party(&mut fields, "59", &Some(self.beneficiary.clone()));
        push_text(&mut fields, "70", &self.remittance_information);
        fields.push(Field::new("71A", &self.charges));
        for charge in &self.sender_charges {
            fields.push(Field::new("71F", charge.format()));
        }
        if let Some(charge) = &self.receiver_charges {
            fields.push(Field::new("71G", charge.format()));
        }
        push_text(&mut fields, "72", &self.sender_to_receiver);
        push_text(&mut fields, "77B", &self.regulatory_reporting);
        fields
    }
}

/// MT200 financial institution transfer for its own account.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt200Transfer {
    pub transaction_reference: String,
    pub value: ValueDateAmount,
    pub senders_correspondent: Option<PartyField>,
    pub intermediary: Option<PartyField>,
    pub account_with_institution: PartyField,
    pub sender_to_receiver: Option<String>,
}

impl MtMessage for Mt200Transfer {
    fn message_type(&self) -> &'static str {
        "200"
    }

    fn from_fields(fields: &[Field]) -> Result<Self, ParseError> {
        Ok(Self {
            transaction_reference: first_line(require_field(fields, "20")?),
            value: ValueDateAmount::parse(require_field(fields, "32A")?)?,
            senders_correspondent: party(fields, "53"),
            intermediary: party(fields, "56"),
            account_with_institution: require_party(fields, "57")?,
            sender_to_receiver: find_field(fields, "72").map(text_value),
        })
    }

    fn to_fields(&self) -> Vec<Field> {
        let mut fields = vec![
            Field::new("20", &self.transaction_reference),
            Field::new("32A", self.value.format()),
        ];
        push_party(&mut fields, "53", &self.senders_correspondent);
        push_party(&mut fields, "56", &self.intermediary);
        push_party(&mut fields, "57", &Some(self.account_with_institution.clone()));
        push_text(&mut fields, "72", &self.sender_to_receiver);
        fields
    }
}

/// One repetition of MT101 sequence B.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferInstruction {
    pub reference: String,
    pub instruction_codes: Vec<String>,
    pub amount: CurrencyAmount,
    pub ordering_customer: Option<PartyField>,
    pub intermediary: Option<PartyField>,
    pub account_with_institution: Option<PartyField>,
    pub beneficiary: PartyField,
    pub remittance_information: Option<String>,
    pub regulatory_reporting: Option<String>,
    pub original_amount: Option<CurrencyAmount>,
    pub charges: String,
    pub exchange_rate: Option<String>,
}

impl TransferInstruction {
    fn from_fields(fields: &[Field]) -> Result<Self, ParseError> {
        Ok(Self {
            reference: first_line(require_field(fields, "21")?),
            instruction_codes: fields.iter().filter(|f| f.tag == "23E").map(first_line).collect(),
            amount: CurrencyAmount::parse(require_field(fields, "32B")?)?,
            ordering_customer: party(fields, "50"),
            intermediary: party(fields, "56"),
            account_with_institution: party(fields, "57"),
            beneficiary: require_party(fields, "59")?,
            remittance_information: find_field(fields, "70").map(text_value),
            regulatory_reporting: find_field(fields, "77B").map(text_value),
            original_amount: find_field(fields, "33B").map(CurrencyAmount::parse).transpose()?,
            charges: first_line(require_field(fields, "71A")?),
            exchange_rate: find_field(fields, "36").map(first_line),
        })
    }

    fn push_fields(&self, fields: &mut Vec<Field>) {
        fields.push(Field::new("21", &self.reference));
        for code in &self.instruction_codes {
            fields.push(Field::new("23E", code));
        }
        fields.push(Field::new("32B", self.amount.format()));
        push_party(fields, "50", &self.ordering_customer);
        push_party(fields, "56", &self.intermediary);
        push_party(fields, "57", &self.account_with_institution);
        push_party(fields, "59", &Some(self.beneficiary.clone()));
        push_text(fields, "70", &self.remittance_information);
        push_text(fields, "77B", &self.regulatory_reporting);
        if let Some(original) = &self.original_amount {
            fields.push(Field::new("33B", original.format()));
        }
        fields.push(Field::new("71A", &self.charges));
        push_text(fields, "36", &self.exchange_rate);
    }
}

/// MT101 request for transfer: one sequence A and repeating sequence B.
#[derive(Debug, Clone, PartialEq)]
pub struct Mt101Request {
    pub sender_reference: String,
    pub customer_reference: Option<String>,
    /// `:28D:` message index/total, e.g. `1/1`.
    pub message_index: String,
    pub instructing_party: Option<PartyField>,
    pub ordering_customer: Option<PartyField>,
    pub account_servicing_institution: Option<PartyField>,
    pub requested_execution_date: NaiveDate,
    pub authorisation: Option<String>,
    pub transactions: Vec<TransferInstruction>,
}

impl MtMessage for Mt101Request {
    fn message_type(&self) -> &'static str {
        "101"
    }

    fn from_fields(fields: &[Field]) -> Result<Self, ParseError> {
        let split = fields.iter().position(|f| f.tag == "21").unwrap_or(fields.len());
        let (sequence_a, sequence_b) = fields.split_at(split);

        let mut transactions = Vec::new();
        let mut start = 0;
        for end in (1..=sequence_b.len()).filter(|&i| i == sequence_b.len() || sequence_b[i].tag == "21") {
            transactions.push(TransferInstruction::from_fields(&sequence_b[start..end])?);
            start = end;
        }
        if transactions.is_empty() {
            return Err(ParseError::missing("21"));
        }

        // Option C and L identify the instructing party; F, G and H the ordering customer.
        let instructing_party = sequence_a
            .iter()
            .find(|f| f.tag == "50C" || f.tag == "50L")
            .map(PartyField::parse);
        let ordering_customer = sequence_a
            .iter()
            .find(|f| is_party_tag(&f.tag, "50") && matches!(f.option(), Some('F' | 'G' | 'H')))
            .map(PartyField::parse);

        Ok(Self {
            sender_reference: first_line(require_field(sequence_a, "20")?),
            customer_reference: find_field(sequence_a, "21R").map(first_line),
            message_index: first_line(require_field(sequence_a, "28D")?),
            instructing_party,
            ordering_customer,
            account_servicing_institution: party(sequence_a, "52"),
            requested_execution_date: parse_date("30", &first_line(require_field(sequence_a, "30")?))?,
            authorisation: find_field(sequence_a, "25").map(first_line),
            transactions,
        })
    }

    fn to_fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::new("20", &self.sender_reference)];
        push_text(&mut fields, "21R", &self.customer_reference);
        fields.push(Field::new("28D", &self.message_index));
        push_party(&mut fields, "50", &self.instructing_party);
        push_party(&mut fields, "50", &self.ordering_customer);
        push_party(&mut fields, "52", &self.account_servicing_institution);
        fields.push(Field::new("30", format_date(&self.requested_execution_date)));
        push_text(&mut fields, "25", &self.authorisation);
        for transaction in &self.transactions {
            transaction.push_fields(&mut fields);
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_grammar::tokenize;
    use rust_decimal::Decimal;

    #[test]
    fn test_customer_transfer() {
        let raw = ":20:PAY-1\r\n:23B:CRED\r\n:32A:260115EUR1234,56\r\n:50K:/DE89370400440532013000\r\nJOHN DOE\r\n\
:57A:COBADEFFXXX\r\n:59:/DE02120300000000202051\r\nJANE ROE\r\n:70:INVOICE 42\r\n:71A:SHA\r\n";
        let transfer = Mt103Transfer::from_fields(&tokenize(raw)).unwrap();
        assert_eq!(transfer.value.amount.value(), Decimal::new(123456, 2));
        assert_eq!(transfer.ordering_customer.option, Some('K'));
        assert_eq!(transfer.beneficiary.name(), Some("JANE ROE"));
        assert_eq!(
            transfer.account_with_institution.as_ref().and_then(|p| p.bic.as_deref()),
            Some("COBADEFFXXX")
        );
        assert_eq!(Mt103Transfer::from_fields(&transfer.to_fields()).unwrap(), transfer);
    }

    #[test]
    fn test_customer_transfer_rejects_unknown_charges() {
        let raw = ":20:PAY-1\r\n:23B:CRED\r\n:32A:260115EUR1,\r\n:50K:JOHN\r\n:59:JANE\r\n:71A:XXX\r\n";
        assert!(matches!(
            Mt103Transfer::from_fields(&tokenize(raw)),
            Err(ParseError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_request_for_transfer_sequences() {
        let raw = ":20:BATCH-1\r\n:28D:1/1\r\n:50H:/DE89370400440532013000\r\nACME GMBH\r\n:30:260120\r\n\
:21:TX-1\r\n:32B:EUR100,\r\n:59:/DE02120300000000202051\r\nSUPPLIER ONE\r\n:71A:SHA\r\n\
:21:TX-2\r\n:32B:EUR250,50\r\n:57A:COBADEFFXXX\r\n:59:SUPPLIER TWO\r\n:71A:OUR\r\n";
        let request = Mt101Request::from_fields(&tokenize(raw)).unwrap();
        assert_eq!(request.transactions.len(), 2);
        assert_eq!(request.ordering_customer.as_ref().map(|p| p.option), Some(Some('H')));
        assert_eq!(request.transactions[1].amount.amount.value(), Decimal::new(25050, 2));
        assert_eq!(request.transactions[1].charges, "OUR");
        assert_eq!(Mt101Request::from_fields(&request.to_fields()).unwrap(), request);
    }

    #[test]
    fn test_confirmations() {
        let debit = ":20:C-1\r\n:21:PAY-1\r\n:25:DE89370400440532013000\r\n:32A:260115EUR10,\r\n";
        let confirmation = Mt900Confirmation::from_fields(&tokenize(debit)).unwrap();
        assert_eq!(confirmation.related_reference, "PAY-1");

        let credit_without_orderer = ":20:C-2\r\n:21:PAY-2\r\n:25:ACC\r\n:32A:260115EUR10,\r\n";
        assert!(Mt910Confirmation::from_fields(&tokenize(credit_without_orderer)).is_err());

        let transfer = ":20:FI-1\r\n:32A:260115EUR5000,\r\n:57A:COBADEFFXXX\r\n";
        let transfer = Mt200Transfer::from_fields(&tokenize(transfer)).unwrap();
        assert_eq!(transfer.account_with_institution.bic.as_deref(), Some("COBADEFFXXX"));
    }
}
