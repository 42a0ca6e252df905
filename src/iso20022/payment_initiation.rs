//! Customer payment initiation: pain.001 credit transfers and pain.008
//! direct debits. Each document carries a single payment information block.

use super::common::{
    write_account, write_agent, write_amount, write_party, Account, ActiveAmount, Agent, GroupHeader, Party,
};
use super::{Dialect, IsoDocument, MessageKind, XmlWriter};
use crate::error::{Error, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Agent placeholder for IBAN-only SEPA payments.
const NOT_PROVIDED: &str = "NOTPROVIDED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeBearer {
    Debtor,
    Creditor,
    Shared,
    /// Following the service level (SEPA).
    ServiceLevel,
}

impl ChargeBearer {
    pub fn code(&self) -> &'static str {
        match self {
            ChargeBearer::Debtor => "DEBT",
            ChargeBearer::Creditor => "CRED",
            ChargeBearer::Shared => "SHAR",
            ChargeBearer::ServiceLevel => "SLEV",
        }
    }
}

fn control_sum<'a>(amounts: impl Iterator<Item = &'a ActiveAmount>) -> String {
    let total: Decimal = amounts.map(|a| a.amount).sum();
    format!("{:.2}", total)
}

fn write_totals(w: &mut XmlWriter, count: usize, sum: &str) -> Result<()> {
    w.element("NbOfTxs", &count.to_string())?;
    w.element("CtrlSum", sum)
}

fn write_initiation_header(
    w: &mut XmlWriter,
    header: &GroupHeader,
    initiating_party: &Party,
    count: usize,
    sum: &str,
    dialect: &Dialect,
) -> Result<()> {
    if initiating_party.is_empty() {
        return Err(Error::validation("InitgPty", "initiating party is required"));
    }
    w.wrap("GrpHdr", |w| {
        w.element("MsgId", &header.message_id)?;
        w.date_time("CreDtTm", &header.created)?;
        write_totals(w, count, sum)?;
        write_party(w, "InitgPty", initiating_party, dialect)
    })
}

/// Agent of a payment leg; an unknown agent is sent as `NOTPROVIDED`.
fn write_leg_agent(w: &mut XmlWriter, name: &str, agent: &Agent, dialect: &Dialect) -> Result<()> {
    if agent.is_empty() {
        return w.wrap(name, |w| {
            w.wrap("FinInstnId", |w| w.wrap("Othr", |w| w.element("Id", NOT_PROVIDED)))
        });
    }
    write_agent(w, name, agent, dialect)
}

fn require_account(field: &str, account: &Account) -> Result<()> {
    if account.is_empty() {
        return Err(Error::validation(field, "account identification is required"));
    }
    Ok(())
}

fn write_remittance(w: &mut XmlWriter, lines: &[String]) -> Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    w.wrap("RmtInf", |w| {
        for line in lines {
            w.element("Ustrd", line)?;
        }
        Ok(())
    })
}

/// One credit transfer transaction (`CdtTrfTxInf`).
#[derive(Debug, Clone, PartialEq)]
pub struct CreditTransfer {
    pub instruction_id: Option<String>,
    pub end_to_end_id: String,
    pub amount: ActiveAmount,
    pub creditor_agent: Agent,
    pub creditor: Party,
    pub creditor_account: Account,
    /// ISO external purpose code, e.g. `SALA`.
    pub purpose: Option<String>,
    pub remittance: Vec<String>,
}

impl CreditTransfer {
    pub fn new(end_to_end_id: impl Into<String>, amount: ActiveAmount, creditor: Party, creditor_account: Account) -> Self {
        Self {
            instruction_id: None,
            end_to_end_id: end_to_end_id.into(),
            amount,
            creditor_agent: Agent::default(),
            creditor,
            creditor_account,
            purpose: None,
            remittance: Vec::new(),
        }
    }
}

/// pain.001 customer credit transfer initiation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditTransferInitiation {
    pub header: GroupHeader,
    pub initiating_party: Party,
    pub payment_information_id: String,
    pub batch_booking: Option<bool>,
    /// Service level code, `SEPA` for SEPA credit transfers.
    pub service_level: Option<String>,
    pub requested_execution_date: NaiveDate,
    pub debtor: Party,
    pub debtor_account: Account,
    pub debtor_agent: Agent,
    pub charge_bearer: Option<ChargeBearer>,
    pub transfers: Vec<CreditTransfer>,
}

impl CreditTransferInitiation {
    pub fn number_of_transactions(&self) -> usize {
        self.transfers.len()
    }

    /// Sum of all instructed amounts, two decimals.
    pub fn control_sum(&self) -> String {
        control_sum(self.transfers.iter().map(|t| &t.amount))
    }
}

impl IsoDocument for CreditTransferInitiation {
    fn kind(&self) -> MessageKind {
        MessageKind::Pain001
    }

    fn write_body(&self, w: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        if self.transfers.is_empty() {
            return Err(Error::validation("CdtTrfTxInf", "at least one transfer is required"));
        }
        require_account("DbtrAcct", &self.debtor_account)?;
        for transfer in &self.transfers {
            if transfer.creditor.is_empty() {
                return Err(Error::validation("Cdtr", format!("creditor missing in {}", transfer.end_to_end_id)));
            }
            require_account("CdtrAcct", &transfer.creditor_account)?;
        }

        let count = self.number_of_transactions();
        let sum = self.control_sum();
        write_initiation_header(w, &self.header, &self.initiating_party, count, &sum, dialect)?;
        w.wrap("PmtInf", |w| {
            w.element("PmtInfId", &self.payment_information_id)?;
            w.element("PmtMtd", "TRF")?;
            if let Some(batch) = self.batch_booking {
                w.element("BtchBookg", if batch { "true" } else { "false" })?;
            }
            write_totals(w, count, &sum)?;
            if let Some(level) = &self.service_level {
                w.wrap("PmtTpInf", |w| w.wrap("SvcLvl", |w| w.element("Cd", level)))?;
            }
            if dialect.wraps_execution_date() {
                w.wrap("ReqdExctnDt", |w| w.date("Dt", &self.requested_execution_date))?;
            } else {
                w.date("ReqdExctnDt", &self.requested_execution_date)?;
            }
            write_party(w, "Dbtr", &self.debtor, dialect)?;
            write_account(w, "DbtrAcct", &self.debtor_account)?;
            write_leg_agent(w, "DbtrAgt", &self.debtor_agent, dialect)?;
            if let Some(bearer) = self.charge_bearer {
                w.element("ChrgBr", bearer.code())?;
            }
            for transfer in &self.transfers {
                w.wrap("CdtTrfTxInf", |w| {
                    w.wrap("PmtId", |w| {
                        w.optional("InstrId", transfer.instruction_id.as_deref())?;
                        w.element("EndToEndId", &transfer.end_to_end_id)
                    })?;
                    w.wrap("Amt", |w| write_amount(w, "InstdAmt", &transfer.amount))?;
                    write_agent(w, "CdtrAgt", &transfer.creditor_agent, dialect)?;
                    write_party(w, "Cdtr", &transfer.creditor, dialect)?;
                    write_account(w, "CdtrAcct", &transfer.creditor_account)?;
                    if let Some(purpose) = &transfer.purpose {
                        w.wrap("Purp", |w| w.element("Cd", purpose))?;
                    }
                    write_remittance(w, &transfer.remittance)
                })?;
            }
            Ok(())
        })
    }
}

/// Position of a collection within its mandate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceType {
    First,
    Recurring,
    Final,
    OneOff,
}

impl SequenceType {
    pub fn code(&self) -> &'static str {
        match self {
            SequenceType::First => "FRST",
            SequenceType::Recurring => "RCUR",
            SequenceType::Final => "FNAL",
            SequenceType::OneOff => "OOFF",
        }
    }
}

/// SEPA direct debit scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectDebitScheme {
    Core,
    BusinessToBusiness,
}

impl DirectDebitScheme {
    pub fn code(&self) -> &'static str {
        match self {
            DirectDebitScheme::Core => "CORE",
            DirectDebitScheme::BusinessToBusiness => "B2B",
        }
    }
}

/// One collection (`DrctDbtTxInf`).
#[derive(Debug, Clone, PartialEq)]
pub struct DirectDebit {
    pub end_to_end_id: String,
    pub amount: ActiveAmount,
    pub mandate_id: String,
    pub mandate_signed: NaiveDate,
    pub debtor_agent: Agent,
    pub debtor: Party,
    pub debtor_account: Account,
    pub remittance: Vec<String>,
}

/// pain.008 customer direct debit initiation.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectDebitInitiation {
    pub header: GroupHeader,
    pub initiating_party: Party,
    pub payment_information_id: String,
    pub scheme: DirectDebitScheme,
    pub sequence_type: SequenceType,
    pub collection_date: NaiveDate,
    pub creditor: Party,
    pub creditor_account: Account,
    pub creditor_agent: Agent,
    /// SEPA creditor identifier, e.g. `DE98ZZZ09999999999`.
    pub creditor_scheme_id: String,
    pub debits: Vec<DirectDebit>,
}

impl DirectDebitInitiation {
    pub fn number_of_transactions(&self) -> usize {
        self.debits.len()
    }

    pub fn control_sum(&self) -> String {
        control_sum(self.debits.iter().map(|d| &d.amount))
    }
}

impl IsoDocument for DirectDebitInitiation {
    fn kind(&self) -> MessageKind {
        MessageKind::Pain008
    }

    fn write_body(&self, w: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        if self.debits.is_empty() {
            return Err(Error::validation("DrctDbtTxInf", "at least one collection is required"));
        }
        if self.creditor_scheme_id.trim().is_empty() {
            return Err(Error::validation("CdtrSchmeId", "creditor identifier is required"));
        }
        require_account("CdtrAcct", &self.creditor_account)?;
        for debit in &self.debits {
            require_account("DbtrAcct", &debit.debtor_account)?;
        }

        let count = self.number_of_transactions();
        let sum = self.control_sum();
        write_initiation_header(w, &self.header, &self.initiating_party, count, &sum, dialect)?;
        w.wrap("PmtInf", |w| {
            w.element("PmtInfId", &self.payment_information_id)?;
            w.element("PmtMtd", "DD")?;
            write_totals(w, count, &sum)?;
            w.wrap("PmtTpInf", |w| {
                w.wrap("SvcLvl", |w| w.element("Cd", "SEPA"))?;
                w.wrap("LclInstrm", |w| w.element("Cd", self.scheme.code()))?;
                w.element("SeqTp", self.sequence_type.code())
            })?;
            w.date("ReqdColltnDt", &self.collection_date)?;
            write_party(w, "Cdtr", &self.creditor, dialect)?;
            write_account(w, "CdtrAcct", &self.creditor_account)?;
            write_leg_agent(w, "CdtrAgt", &self.creditor_agent, dialect)?;
            w.element("ChrgBr", ChargeBearer::ServiceLevel.code())?;
            w.wrap("CdtrSchmeId", |w| {
                w.wrap("Id", |w| {
                    w.wrap("PrvtId", |w| {
                        w.wrap("Othr", |w| {
                            w.element("Id", &self.creditor_scheme_id)?;
                            w.wrap("SchmeNm", |w| w.element("Prtry", "SEPA"))
                        })
                    })
                })
            })?;
            for debit in &self.debits {
                w.wrap("DrctDbtTxInf", |w| {
                    w.wrap("PmtId", |w| w.element("EndToEndId", &debit.end_to_end_id))?;
                    write_amount(w, "InstdAmt", &debit.amount)?;
                    w.wrap("DrctDbtTx", |w| {
                        w.wrap("MndtRltdInf", |w| {
                            w.element("MndtId", &debit.mandate_id)?;
                            w.date("DtOfSgntr", &debit.mandate_signed)
                        })
                    })?;
                    write_leg_agent(w, "DbtrAgt", &debit.debtor_agent, dialect)?;
                    write_party(w, "Dbtr", &debit.debtor, dialect)?;
                    write_account(w, "DbtrAcct", &debit.debtor_account)?;
                    write_remittance(w, &debit.remittance)
                })?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eur(cents: i64) -> ActiveAmount {
        ActiveAmount::new("EUR".parse().unwrap(), Decimal::new(cents, 2))
    }

    fn header() -> GroupHeader {
        let created = NaiveDate::from_ymd_opt(2026, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        GroupHeader::new("PAIN-1", created)
    }

    fn credit_transfer() -> CreditTransferInitiation {
        let mut first = CreditTransfer::new(
            "E2E-1",
            eur(10000),
            Party::named("Lieferant GmbH"),
            Account::iban("DE02120300000000202051"),
        );
        first.creditor_agent = Agent::bic("BYLADEM1001");
        first.remittance.push("Rechnung 4711".to_string());
        let second = CreditTransfer::new(
            "E2E-2",
            eur(2550),
            Party::named("Vermieter KG"),
            Account::iban("DE89370400440532013000"),
        );

        CreditTransferInitiation {
            header: header(),
            initiating_party: Party::named("Muster AG"),
            payment_information_id: "PMT-1".to_string(),
            batch_booking: Some(true),
            service_level: Some("SEPA".to_string()),
            requested_execution_date: NaiveDate::from_ymd_opt(2026, 6, 3).unwrap(),
            debtor: Party::named("Muster AG"),
            debtor_account: Account::iban("DE75512108001245126199"),
            debtor_agent: Agent::default(),
            charge_bearer: Some(ChargeBearer::ServiceLevel),
            transfers: vec![first, second],
        }
    }

    #[test]
    fn test_group_totals() {
        let document = credit_transfer();
        assert_eq!(document.number_of_transactions(), 2);
        assert_eq!(document.control_sum(), "125.50");

        let xml = document.to_xml(3).unwrap();
        assert_eq!(xml.matches("<NbOfTxs>2</NbOfTxs>").count(), 2);
        assert_eq!(xml.matches("<CtrlSum>125.50</CtrlSum>").count(), 2);
        assert!(xml.contains("<Id>NOTPROVIDED</Id>"));
    }

    #[test]
    fn test_execution_date_follows_version() {
        let document = credit_transfer();
        let v03 = document.to_xml(3).unwrap();
        assert!(v03.contains("<ReqdExctnDt>2026-06-03</ReqdExctnDt>"));
        assert!(v03.contains("<BIC>BYLADEM1001</BIC>"));

        let v09 = document.to_xml(9).unwrap();
        assert!(v09.contains("<Dt>2026-06-03</Dt>"));
        assert!(v09.contains("<BICFI>BYLADEM1001</BICFI>"));
    }

    #[test]
    fn test_credit_transfer_validation() {
        let mut document = credit_transfer();
        document.transfers[1].creditor = Party::default();
        assert!(matches!(document.to_xml(9), Err(Error::Validation { field, .. }) if field == "Cdtr"));

        document.transfers.clear();
        assert!(document.to_xml(9).is_err());
    }

    #[test]
    fn test_direct_debit() {
        let document = DirectDebitInitiation {
            header: header(),
            initiating_party: Party::named("Verein e.V."),
            payment_information_id: "DD-1".to_string(),
            scheme: DirectDebitScheme::Core,
            sequence_type: SequenceType::Recurring,
            collection_date: NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
            creditor: Party::named("Verein e.V."),
            creditor_account: Account::iban("DE89370400440532013000"),
            creditor_agent: Agent::bic("COBADEFFXXX"),
            creditor_scheme_id: "DE98ZZZ09999999999".to_string(),
            debits: vec![DirectDebit {
                end_to_end_id: "BEITRAG-2026-06".to_string(),
                amount: eur(1200),
                mandate_id: "MNDT-17".to_string(),
                mandate_signed: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                debtor_agent: Agent::default(),
                debtor: Party::named("Erika Mustermann"),
                debtor_account: Account::iban("DE02120300000000202051"),
                remittance: vec!["Mitgliedsbeitrag Juni".to_string()],
            }],
        };

        let xml = document.to_xml(8).unwrap();
        assert!(xml.contains("<PmtMtd>DD</PmtMtd>"));
        assert!(xml.contains("<SeqTp>RCUR</SeqTp>"));
        assert!(xml.contains("<Cd>CORE</Cd>"));
        assert!(xml.contains("<Id>DE98ZZZ09999999999</Id>"));
        assert!(xml.contains("<DtOfSgntr>2024-01-10</DtOfSgntr>"));
        assert!(xml.contains("<InstdAmt Ccy=\"EUR\">12.00</InstdAmt>"));
    }
}
