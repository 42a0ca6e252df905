//! Exceptions and investigations: camt.029, camt.038, camt.056 and camt.087.

use super::common::{
    write_agent, write_amount, write_assignment, write_case, write_original_group, write_party,
    write_party_or_agent, write_reason, ActiveAmount, Agent, Assignment, Case, OriginalGroup, Party,
    PartyOrAgent, ReasonInformation,
};
use super::{Dialect, IsoDocument, MessageKind, XmlWriter};
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};

/// Identification of a transaction in an earlier message.
#[derive(Debug, Clone, PartialEq)]
pub struct UnderlyingTransaction {
    pub original_group: OriginalGroup,
    pub original_instruction_id: Option<String>,
    pub original_end_to_end_id: Option<String>,
    pub original_transaction_id: Option<String>,
    pub original_amount: Option<ActiveAmount>,
    pub original_settlement_date: Option<NaiveDate>,
}

impl UnderlyingTransaction {
    pub fn new(original_group: OriginalGroup) -> Self {
        Self {
            original_group,
            original_instruction_id: None,
            original_end_to_end_id: None,
            original_transaction_id: None,
            original_amount: None,
            original_settlement_date: None,
        }
    }
}

fn write_underlying(w: &mut XmlWriter, underlying: &UnderlyingTransaction) -> Result<()> {
    write_original_group(w, "OrgnlGrpInf", &underlying.original_group)?;
    w.optional("OrgnlInstrId", underlying.original_instruction_id.as_deref())?;
    w.optional("OrgnlEndToEndId", underlying.original_end_to_end_id.as_deref())?;
    w.optional("OrgnlTxId", underlying.original_transaction_id.as_deref())?;
    if let Some(amount) = &underlying.original_amount {
        write_amount(w, "OrgnlIntrBkSttlmAmt", amount)?;
    }
    if let Some(date) = &underlying.original_settlement_date {
        w.date("OrgnlIntrBkSttlmDt", date)?;
    }
    Ok(())
}

/// Outcome of a cancellation request for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationStatus {
    Accepted,
    Rejected,
    Pending,
}

impl CancellationStatus {
    pub fn code(&self) -> &'static str {
        match self {
            CancellationStatus::Accepted => "ACCR",
            CancellationStatus::Rejected => "RJCR",
            CancellationStatus::Pending => "PDCR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionCancellationStatus {
    pub original_end_to_end_id: Option<String>,
    pub original_transaction_id: Option<String>,
    pub status: CancellationStatus,
    pub reason: ReasonInformation,
}

/// camt.029 resolution of investigation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOfInvestigation {
    pub assignment: Assignment,
    pub resolved_case: Option<Case>,
    /// Investigation status code, e.g. `CNCL` or `RJCR`.
    pub confirmation: String,
    pub original_group: Option<OriginalGroup>,
    pub transactions: Vec<TransactionCancellationStatus>,
}

impl IsoDocument for ResolutionOfInvestigation {
    fn kind(&self) -> MessageKind {
        MessageKind::Camt029
    }

    fn write_body(&self, w: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        write_assignment(w, &self.assignment, dialect)?;
        if let Some(case) = &self.resolved_case {
            write_case(w, "RslvdCase", case, dialect)?;
        }
        w.wrap("Sts", |w| w.element("Conf", &self.confirmation))?;
        if self.original_group.is_none() && self.transactions.is_empty() {
            return Ok(());
        }
        w.wrap("CxlDtls", |w| {
            if let Some(group) = &self.original_group {
                write_original_group(w, "OrgnlGrpInfAndSts", group)?;
            }
            for transaction in &self.transactions {
                w.wrap("TxInfAndSts", |w| {
                    w.optional("OrgnlEndToEndId", transaction.original_end_to_end_id.as_deref())?;
                    w.optional("OrgnlTxId", transaction.original_transaction_id.as_deref())?;
                    w.element("TxCxlSts", transaction.status.code())?;
                    write_reason(w, "CxlStsRsnInf", &transaction.reason)
                })?;
            }
            Ok(())
        })
    }
}

/// camt.038 case status report request.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseStatusReportRequest {
    pub request_id: String,
    pub created: NaiveDateTime,
    pub requester: Option<PartyOrAgent>,
    pub responder: Option<PartyOrAgent>,
    pub case: Case,
}

impl IsoDocument for CaseStatusReportRequest {
    fn kind(&self) -> MessageKind {
        MessageKind::Camt038
    }

    fn write_body(&self, w: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        w.wrap("ReqHdr", |w| {
            w.element("Id", &self.request_id)?;
            w.date_time("CreDtTm", &self.created)?;
            if let Some(requester) = &self.requester {
                write_party_or_agent(w, "Reqstr", requester, dialect)?;
            }
            if let Some(responder) = &self.responder {
                write_party_or_agent(w, "Rspndr", responder, dialect)?;
            }
            Ok(())
        })?;
        write_case(w, "Case", &self.case, dialect)
    }
}

/// One transaction of a camt.056 request.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationRequestTransaction {
    pub cancellation_id: Option<String>,
    pub underlying: UnderlyingTransaction,
    pub reason: ReasonInformation,
}

/// camt.056 FI-to-FI payment cancellation request.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCancellationRequest {
    pub assignment: Assignment,
    pub case: Option<Case>,
    pub transactions: Vec<CancellationRequestTransaction>,
}

impl IsoDocument for PaymentCancellationRequest {
    fn kind(&self) -> MessageKind {
        MessageKind::Camt056
    }

    fn write_body(&self, w: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        if self.transactions.is_empty() {
            return Err(Error::validation("Undrlyg", "at least one transaction is required"));
        }
        write_assignment(w, &self.assignment, dialect)?;
        if let Some(case) = &self.case {
            write_case(w, "Case", case, dialect)?;
        }
        w.wrap("Undrlyg", |w| {
            for transaction in &self.transactions {
                w.wrap("TxInf", |w| {
                    w.optional("CxlId", transaction.cancellation_id.as_deref())?;
                    write_underlying(w, &transaction.underlying)?;
                    write_reason(w, "CxlRsnInf", &transaction.reason)
                })?;
            }
            Ok(())
        })
    }
}

/// Values a camt.087 request asks to change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentModification {
    pub instruction_id: Option<String>,
    pub end_to_end_id: Option<String>,
    pub settlement_date: Option<NaiveDate>,
    pub settlement_amount: Option<ActiveAmount>,
    pub creditor_agent: Agent,
    pub creditor: Party,
    pub remittance: Vec<String>,
}

impl PaymentModification {
    pub fn is_empty(&self) -> bool {
        self.instruction_id.is_none()
            && self.end_to_end_id.is_none()
            && self.settlement_date.is_none()
            && self.settlement_amount.is_none()
            && self.creditor_agent.is_empty()
            && self.creditor.is_empty()
            && self.remittance.is_empty()
    }
}

/// camt.087 request to modify payment.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestToModifyPayment {
    pub assignment: Assignment,
    pub case: Case,
    pub underlying: UnderlyingTransaction,
    pub modification: PaymentModification,
}

impl IsoDocument for RequestToModifyPayment {
    fn kind(&self) -> MessageKind {
        MessageKind::Camt087
    }

    fn write_body(&self, w: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        let modification = &self.modification;
        if modification.is_empty() {
            return Err(Error::validation("Mod", "no modification requested"));
        }
        write_assignment(w, &self.assignment, dialect)?;
        write_case(w, "Case", &self.case, dialect)?;
        w.wrap("Undrlyg", |w| w.wrap("IntrBk", |w| write_underlying(w, &self.underlying)))?;
        w.wrap("Mod", |w| {
            w.optional("InstrId", modification.instruction_id.as_deref())?;
            w.optional("EndToEndId", modification.end_to_end_id.as_deref())?;
            if let Some(date) = &modification.settlement_date {
                w.date("IntrBkSttlmDt", date)?;
            }
            if let Some(amount) = &modification.settlement_amount {
                write_amount(w, "IntrBkSttlmAmt", amount)?;
            }
            write_agent(w, "CdtrAgt", &modification.creditor_agent, dialect)?;
            write_party(w, "Cdtr", &modification.creditor, dialect)?;
            if !modification.remittance.is_empty() {
                w.wrap("RmtInf", |w| {
                    for line in &modification.remittance {
                        w.element("Ustrd", line)?;
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn created() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap()
    }

    fn assignment() -> Assignment {
        Assignment {
            id: "ASSGN-1".to_string(),
            created: created(),
            assigner: PartyOrAgent::Agent(Agent::bic("COBADEFFXXX")),
            assignee: PartyOrAgent::Agent(Agent::bic("DEUTDEFFXXX")),
        }
    }

    fn underlying() -> UnderlyingTransaction {
        UnderlyingTransaction {
            original_end_to_end_id: Some("E2E-7".to_string()),
            original_amount: Some(ActiveAmount::new("EUR".parse().unwrap(), Decimal::new(12550, 2))),
            ..UnderlyingTransaction::new(OriginalGroup {
                message_id: "PACS-1".to_string(),
                message_name: "pacs.008.001.08".to_string(),
            })
        }
    }

    #[test]
    fn test_resolution_of_investigation() {
        let resolution = ResolutionOfInvestigation {
            assignment: assignment(),
            resolved_case: Some(Case::new("CASE-1")),
            confirmation: "CNCL".to_string(),
            original_group: None,
            transactions: vec![TransactionCancellationStatus {
                original_end_to_end_id: Some("E2E-7".to_string()),
                original_transaction_id: None,
                status: CancellationStatus::Accepted,
                reason: ReasonInformation::default(),
            }],
        };

        let v03 = resolution.to_xml(3).unwrap();
        assert!(v03.contains("camt.029.001.03"));
        assert!(v03.contains("<BIC>COBADEFFXXX</BIC>"));
        assert!(v03.contains("<Conf>CNCL</Conf>"));
        assert!(v03.contains("<TxCxlSts>ACCR</TxCxlSts>"));

        let v09 = resolution.to_xml(9).unwrap();
        assert!(v09.contains("<BICFI>COBADEFFXXX</BICFI>"));
        assert!(!v09.contains("CxlStsRsnInf"));
    }

    #[test]
    fn test_case_status_report_request() {
        let request = CaseStatusReportRequest {
            request_id: "REQ-1".to_string(),
            created: created(),
            requester: Some(PartyOrAgent::Party(Party::named("Muster GmbH"))),
            responder: None,
            case: Case::new("CASE-9"),
        };
        let xml = request.to_xml(4).unwrap();
        assert!(xml.contains("<Reqstr>"));
        assert!(xml.contains("<Pty>"));
        assert!(!xml.contains("Rspndr"));
        assert!(xml.find("</ReqHdr>").unwrap() < xml.find("<Case>").unwrap());
    }

    #[test]
    fn test_cancellation_request_needs_transactions() {
        let mut request = PaymentCancellationRequest {
            assignment: assignment(),
            case: None,
            transactions: Vec::new(),
        };
        assert!(matches!(request.to_xml(8), Err(Error::Validation { .. })));

        request.transactions.push(CancellationRequestTransaction {
            cancellation_id: Some("CXL-1".to_string()),
            underlying: underlying(),
            reason: ReasonInformation::code("DUPL"),
        });
        let xml = request.to_xml(8).unwrap();
        assert!(xml.contains("<OrgnlIntrBkSttlmAmt Ccy=\"EUR\">125.50</OrgnlIntrBkSttlmAmt>"));
        assert!(xml.contains("<Cd>DUPL</Cd>"));
        assert!(xml.find("<CxlId>").unwrap() < xml.find("<OrgnlGrpInf>").unwrap());
    }

    #[test]
    fn test_request_to_modify_payment() {
        let mut request = RequestToModifyPayment {
            assignment: assignment(),
            case: Case::new("CASE-2"),
            underlying: underlying(),
            modification: PaymentModification::default(),
        };
        assert!(request.to_xml(6).is_err());

        request.modification.creditor = Party::named("New Creditor AG");
        request.modification.remittance.push("Invoice 2026-17".to_string());
        let xml = request.to_xml(6).unwrap();
        assert!(xml.contains("<IntrBk>"));
        assert!(xml.contains("<Nm>New Creditor AG</Nm>"));
        assert!(xml.contains("<Ustrd>Invoice 2026-17</Ustrd>"));
    }
}
