//! Direct debit mandate management: pain.009 initiation, pain.010 amendment
//! and pain.018 suspension requests.

use super::common::{
    write_account, write_agent, write_amount, write_group_header, write_party, write_reason, Account, ActiveAmount,
    Agent, GroupHeader, Party, ReasonInformation,
};
use super::payment_initiation::{DirectDebitScheme, SequenceType};
use super::{Dialect, IsoDocument, MessageKind, XmlWriter};
use crate::error::{Error, Result};
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    SemiAnnual,
    Yearly,
    Adhoc,
}

impl Frequency {
    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAIL",
            Frequency::Weekly => "WEEK",
            Frequency::Monthly => "MNTH",
            Frequency::Quarterly => "QURT",
            Frequency::SemiAnnual => "MIAN",
            Frequency::Yearly => "YEAR",
            Frequency::Adhoc => "ADHO",
        }
    }
}

/// When and how often the mandate is collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrences {
    pub sequence_type: SequenceType,
    pub frequency: Option<Frequency>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub first_collection: Option<NaiveDate>,
    pub final_collection: Option<NaiveDate>,
}

impl Occurrences {
    pub fn new(sequence_type: SequenceType) -> Self {
        Self {
            sequence_type,
            frequency: None,
            valid_from: None,
            valid_to: None,
            first_collection: None,
            final_collection: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mandate {
    pub request_id: String,
    pub mandate_id: Option<String>,
    pub scheme: Option<DirectDebitScheme>,
    pub occurrences: Option<Occurrences>,
    pub collection_amount: Option<ActiveAmount>,
    pub maximum_amount: Option<ActiveAmount>,
    pub creditor: Party,
    pub creditor_account: Account,
    pub creditor_agent: Agent,
    pub debtor: Party,
    pub debtor_account: Account,
    pub debtor_agent: Agent,
}

impl Mandate {
    pub fn new(request_id: impl Into<String>, creditor: Party, debtor: Party) -> Self {
        Self {
            request_id: request_id.into(),
            mandate_id: None,
            scheme: None,
            occurrences: None,
            collection_amount: None,
            maximum_amount: None,
            creditor,
            creditor_account: Account::default(),
            creditor_agent: Agent::default(),
            debtor,
            debtor_account: Account::default(),
            debtor_agent: Agent::default(),
        }
    }
}

fn write_mandate(w: &mut XmlWriter, mandate: &Mandate, dialect: &Dialect) -> Result<()> {
    if mandate.creditor.is_empty() {
        return Err(Error::validation("Mndt/Cdtr", "creditor is required"));
    }
    if mandate.debtor.is_empty() {
        return Err(Error::validation("Mndt/Dbtr", "debtor is required"));
    }
    w.wrap("Mndt", |w| {
        w.optional("MndtId", mandate.mandate_id.as_deref())?;
        w.element("MndtReqId", &mandate.request_id)?;
        if let Some(scheme) = mandate.scheme {
            w.wrap("Tp", |w| {
                w.wrap("SvcLvl", |w| w.element("Cd", "SEPA"))?;
                w.wrap("LclInstrm", |w| w.element("Cd", scheme.code()))
            })?;
        }
        if let Some(occurrences) = &mandate.occurrences {
            write_occurrences(w, occurrences, dialect)?;
        }
        if let Some(amount) = &mandate.collection_amount {
            write_amount(w, "ColltnAmt", amount)?;
        }
        if let Some(amount) = &mandate.maximum_amount {
            write_amount(w, "MaxAmt", amount)?;
        }
        write_party(w, "Cdtr", &mandate.creditor, dialect)?;
        write_account(w, "CdtrAcct", &mandate.creditor_account)?;
        write_agent(w, "CdtrAgt", &mandate.creditor_agent, dialect)?;
        write_party(w, "Dbtr", &mandate.debtor, dialect)?;
        write_account(w, "DbtrAcct", &mandate.debtor_account)?;
        write_agent(w, "DbtrAgt", &mandate.debtor_agent, dialect)
    })
}

fn write_occurrences(w: &mut XmlWriter, occurrences: &Occurrences, dialect: &Dialect) -> Result<()> {
    w.wrap("Ocrncs", |w| {
        w.element("SeqTp", occurrences.sequence_type.code())?;
        if let Some(frequency) = occurrences.frequency {
            if dialect.structured_frequency() {
                w.wrap("Frqcy", |w| w.element("Tp", frequency.code()))?;
            } else {
                w.element("Frqcy", frequency.code())?;
            }
        }
        if occurrences.valid_from.is_some() || occurrences.valid_to.is_some() {
            w.wrap("Drtn", |w| {
                if let Some(from) = &occurrences.valid_from {
                    w.date("FrDt", from)?;
                }
                if let Some(to) = &occurrences.valid_to {
                    w.date("ToDt", to)?;
                }
                Ok(())
            })?;
        }
        if let Some(date) = &occurrences.first_collection {
            w.date("FrstColltnDt", date)?;
        }
        if let Some(date) = &occurrences.final_collection {
            w.date("FnlColltnDt", date)?;
        }
        Ok(())
    })
}

fn write_original_mandate(w: &mut XmlWriter, original_mandate_id: &str) -> Result<()> {
    w.wrap("OrgnlMndt", |w| w.element("OrgnlMndtId", original_mandate_id))
}

/// pain.009 mandate initiation request.
#[derive(Debug, Clone, PartialEq)]
pub struct MandateInitiationRequest {
    pub header: GroupHeader,
    pub mandates: Vec<Mandate>,
}

impl IsoDocument for MandateInitiationRequest {
    fn kind(&self) -> MessageKind {
        MessageKind::Pain009
    }

    fn write_body(&self, w: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        if self.mandates.is_empty() {
            return Err(Error::validation("Mndt", "at least one mandate is required"));
        }
        write_group_header(w, &self.header)?;
        for mandate in &self.mandates {
            write_mandate(w, mandate, dialect)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MandateAmendment {
    pub reason: ReasonInformation,
    /// The mandate as it reads after the amendment.
    pub mandate: Mandate,
    pub original_mandate_id: String,
}

/// pain.010 mandate amendment request.
#[derive(Debug, Clone, PartialEq)]
pub struct MandateAmendmentRequest {
    pub header: GroupHeader,
    pub amendments: Vec<MandateAmendment>,
}

impl IsoDocument for MandateAmendmentRequest {
    fn kind(&self) -> MessageKind {
        MessageKind::Pain010
    }

    fn write_body(&self, w: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        if self.amendments.is_empty() {
            return Err(Error::validation("UndrlygAmdmntDtls", "at least one amendment is required"));
        }
        write_group_header(w, &self.header)?;
        for amendment in &self.amendments {
            w.wrap("UndrlygAmdmntDtls", |w| {
                write_reason(w, "AmdmntRsn", &amendment.reason)?;
                write_mandate(w, &amendment.mandate, dialect)?;
                write_original_mandate(w, &amendment.original_mandate_id)
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MandateSuspension {
    pub reason: ReasonInformation,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub original_mandate_id: String,
}

/// pain.018 mandate suspension request.
#[derive(Debug, Clone, PartialEq)]
pub struct MandateSuspensionRequest {
    pub header: GroupHeader,
    pub suspensions: Vec<MandateSuspension>,
}

impl IsoDocument for MandateSuspensionRequest {
    fn kind(&self) -> MessageKind {
        MessageKind::Pain018
    }

    fn write_body(&self, w: &mut XmlWriter, _dialect: &Dialect) -> Result<()> {
        if self.suspensions.is_empty() {
            return Err(Error::validation("UndrlygSspnsnDtls", "at least one suspension is required"));
        }
        write_group_header(w, &self.header)?;
        for suspension in &self.suspensions {
            if let (Some(start), Some(end)) = (suspension.start, suspension.end) {
                if end < start {
                    return Err(Error::validation(
                        "MndtSspnsn",
                        format!("suspension of {} ends before it starts", suspension.original_mandate_id),
                    ));
                }
            }
            w.wrap("UndrlygSspnsnDtls", |w| {
                write_reason(w, "SspnsnRsn", &suspension.reason)?;
                if suspension.start.is_some() || suspension.end.is_some() {
                    w.wrap("MndtSspnsn", |w| {
                        if let Some(start) = &suspension.start {
                            w.date("SspnsnStartDt", start)?;
                        }
                        if let Some(end) = &suspension.end {
                            w.date("SspnsnEndDt", end)?;
                        }
                        Ok(())
                    })?;
                }
                write_original_mandate(w, &suspension.original_mandate_id)
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> GroupHeader {
        let created = NaiveDate::from_ymd_opt(2026, 7, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        GroupHeader::new("MNDT-MSG-1", created)
    }

    fn mandate() -> Mandate {
        let mut mandate = Mandate::new("REQ-1", Party::named("Stadtwerke"), Party::named("Erika Mustermann"));
        mandate.scheme = Some(DirectDebitScheme::Core);
        mandate.occurrences = Some(Occurrences {
            frequency: Some(Frequency::Monthly),
            first_collection: NaiveDate::from_ymd_opt(2026, 8, 1),
            ..Occurrences::new(SequenceType::Recurring)
        });
        mandate.debtor_account = Account::iban("DE02120300000000202051");
        mandate.debtor_agent = Agent::bic("BYLADEM1001");
        mandate
    }

    #[test]
    fn test_frequency_layout_follows_version() {
        let request = MandateInitiationRequest {
            header: header(),
            mandates: vec![mandate()],
        };
        let v01 = request.to_xml(1).unwrap();
        assert!(v01.contains("<Frqcy>MNTH</Frqcy>"));
        assert!(v01.contains("<BIC>BYLADEM1001</BIC>"));

        let v06 = request.to_xml(6).unwrap();
        assert!(v06.contains("<Tp>MNTH</Tp>"));
        assert!(v06.contains("<BICFI>BYLADEM1001</BICFI>"));
        assert!(v06.contains("<FrstColltnDt>2026-08-01</FrstColltnDt>"));
    }

    #[test]
    fn test_mandate_requires_parties() {
        let mut broken = mandate();
        broken.debtor = Party::default();
        let request = MandateInitiationRequest {
            header: header(),
            mandates: vec![broken],
        };
        assert!(matches!(request.to_xml(6), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_amendment_request() {
        let request = MandateAmendmentRequest {
            header: header(),
            amendments: vec![MandateAmendment {
                reason: ReasonInformation::code("MD16"),
                mandate: mandate(),
                original_mandate_id: "MNDT-OLD".to_string(),
            }],
        };
        let xml = request.to_xml(6).unwrap();
        assert!(xml.contains("<AmdmntRsn>"));
        assert!(xml.contains("<OrgnlMndtId>MNDT-OLD</OrgnlMndtId>"));
        assert!(xml.find("<AmdmntRsn>").unwrap() < xml.find("<Mndt>").unwrap());
    }

    #[test]
    fn test_suspension_dates() {
        let mut suspension = MandateSuspension {
            reason: ReasonInformation::code("MS03"),
            start: NaiveDate::from_ymd_opt(2026, 9, 1),
            end: NaiveDate::from_ymd_opt(2026, 10, 1),
            original_mandate_id: "MNDT-17".to_string(),
        };
        let request = MandateSuspensionRequest {
            header: header(),
            suspensions: vec![suspension.clone()],
        };
        let xml = request.to_xml(4).unwrap();
        assert!(xml.contains("<SspnsnStartDt>2026-09-01</SspnsnStartDt>"));

        suspension.end = NaiveDate::from_ymd_opt(2026, 8, 1);
        let request = MandateSuspensionRequest {
            header: header(),
            suspensions: vec![suspension],
        };
        assert!(request.to_xml(4).is_err());
    }
}
