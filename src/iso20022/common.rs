//! Building blocks shared by the CAMT and Pain generators.
//!
//! Each optional block checks its own emptiness so that nothing is written
//! for a structure whose fields are all unset.

use super::{Dialect, XmlWriter};
use crate::error::Result;
use crate::types::CurrencyCode;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Currency and amount, rendered as `<Amt Ccy="EUR">12.50</Amt>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAmount {
    pub currency: CurrencyCode,
    pub amount: Decimal,
}

impl ActiveAmount {
    pub fn new(currency: CurrencyCode, amount: Decimal) -> Self {
        Self { currency, amount }
    }
}

pub fn write_amount(w: &mut XmlWriter, name: &str, amount: &ActiveAmount) -> Result<()> {
    w.element_with(name, &[("Ccy", amount.currency.as_str())], &format!("{:.2}", amount.amount))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostalAddress {
    pub street_name: Option<String>,
    pub building_number: Option<String>,
    pub post_code: Option<String>,
    pub town_name: Option<String>,
    /// ISO 3166 alpha-2 country code.
    pub country: Option<String>,
    pub address_lines: Vec<String>,
}

impl PostalAddress {
    pub fn is_empty(&self) -> bool {
        self.street_name.is_none()
            && self.building_number.is_none()
            && self.post_code.is_none()
            && self.town_name.is_none()
            && self.country.is_none()
            && self.address_lines.is_empty()
    }
}

pub fn write_postal_address(w: &mut XmlWriter, address: &PostalAddress) -> Result<()> {
    if address.is_empty() {
        return Ok(());
    }
    w.wrap("PstlAdr", |w| {
        w.optional("StrtNm", address.street_name.as_deref())?;
        w.optional("BldgNb", address.building_number.as_deref())?;
        w.optional("PstCd", address.post_code.as_deref())?;
        w.optional("TwnNm", address.town_name.as_deref())?;
        w.optional("Ctry", address.country.as_deref())?;
        for line in &address.address_lines {
            w.element("AdrLine", line)?;
        }
        Ok(())
    })
}

/// Party identification (`PartyIdentification` in the schemas).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Party {
    pub name: Option<String>,
    pub postal_address: PostalAddress,
    /// Organisation BIC.
    pub bic: Option<String>,
    /// Other organisation identifier, e.g. a creditor scheme id.
    pub other_id: Option<String>,
}

impl Party {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.postal_address.is_empty() && self.bic.is_none() && self.other_id.is_none()
    }
}

/// `<name>` with the party's contents, skipped when the party is empty.
pub fn write_party(w: &mut XmlWriter, name: &str, party: &Party, dialect: &Dialect) -> Result<()> {
    if party.is_empty() {
        return Ok(());
    }
    w.wrap(name, |w| write_party_contents(w, party, dialect))
}

fn write_party_contents(w: &mut XmlWriter, party: &Party, dialect: &Dialect) -> Result<()> {
    w.optional("Nm", party.name.as_deref())?;
    write_postal_address(w, &party.postal_address)?;
    if party.bic.is_none() && party.other_id.is_none() {
        return Ok(());
    }
    let bic_element = if dialect.bic_element() == "BICFI" { "AnyBIC" } else { "BICOrBEI" };
    w.wrap("Id", |w| {
        w.wrap("OrgId", |w| {
            w.optional(bic_element, party.bic.as_deref())?;
            if let Some(other) = &party.other_id {
                w.wrap("Othr", |w| w.element("Id", other))?;
            }
            Ok(())
        })
    })
}

/// Financial institution identification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Agent {
    pub bic: Option<String>,
    /// Clearing system member id, e.g. a German Bankleitzahl.
    pub member_id: Option<String>,
    pub name: Option<String>,
}

impl Agent {
    pub fn bic(bic: impl Into<String>) -> Self {
        Self {
            bic: Some(bic.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bic.is_none() && self.member_id.is_none() && self.name.is_none()
    }
}

/// `<name><FinInstnId>…</FinInstnId></name>`, skipped when the agent is empty.
pub fn write_agent(w: &mut XmlWriter, name: &str, agent: &Agent, dialect: &Dialect) -> Result<()> {
    if agent.is_empty() {
        return Ok(());
    }
    w.wrap(name, |w| {
        w.wrap("FinInstnId", |w| {
            w.optional(dialect.bic_element(), agent.bic.as_deref())?;
            if let Some(member) = &agent.member_id {
                w.wrap("ClrSysMmbId", |w| w.element("MmbId", member))?;
            }
            w.optional("Nm", agent.name.as_deref())
        })
    })
}

/// Party or agent choice used by investigation messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyOrAgent {
    Party(Party),
    Agent(Agent),
}

impl PartyOrAgent {
    pub fn is_empty(&self) -> bool {
        match self {
            PartyOrAgent::Party(party) => party.is_empty(),
            PartyOrAgent::Agent(agent) => agent.is_empty(),
        }
    }
}

pub fn write_party_or_agent(w: &mut XmlWriter, name: &str, value: &PartyOrAgent, dialect: &Dialect) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    w.wrap(name, |w| match value {
        PartyOrAgent::Party(party) => write_party(w, "Pty", party, dialect),
        PartyOrAgent::Agent(agent) => write_agent(w, "Agt", agent, dialect),
    })
}

/// Cash account identified by IBAN or another identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub iban: Option<String>,
    pub other_id: Option<String>,
    pub currency: Option<CurrencyCode>,
}

impl Account {
    pub fn iban(iban: impl Into<String>) -> Self {
        Self {
            iban: Some(iban.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.iban.is_none() && self.other_id.is_none()
    }
}

pub fn write_account(w: &mut XmlWriter, name: &str, account: &Account) -> Result<()> {
    if account.is_empty() {
        return Ok(());
    }
    w.wrap(name, |w| {
        w.wrap("Id", |w| match (&account.iban, &account.other_id) {
            (Some(iban), _) => w.element("IBAN", iban),
            (None, Some(other)) => w.wrap("Othr", |w| w.element("Id", other)),
            (None, None) => Ok(()),
        })?;
        w.optional("Ccy", account.currency.as_ref().map(CurrencyCode::as_str))
    })
}

/// Investigation case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub id: String,
    pub creator: Option<PartyOrAgent>,
    pub reopen: Option<bool>,
}

impl Case {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            creator: None,
            reopen: None,
        }
    }
}

pub fn write_case(w: &mut XmlWriter, name: &str, case: &Case, dialect: &Dialect) -> Result<()> {
    w.wrap(name, |w| {
        w.element("Id", &case.id)?;
        if let Some(creator) = &case.creator {
            write_party_or_agent(w, "Cretr", creator, dialect)?;
        }
        if let Some(reopen) = case.reopen {
            w.element("ReopCaseIndctn", if reopen { "true" } else { "false" })?;
        }
        Ok(())
    })
}

/// Message identification and creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupHeader {
    pub message_id: String,
    pub created: NaiveDateTime,
}

impl GroupHeader {
    pub fn new(message_id: impl Into<String>, created: NaiveDateTime) -> Self {
        Self {
            message_id: message_id.into(),
            created,
        }
    }
}

/// `<GrpHdr>` with id and creation time only.
pub fn write_group_header(w: &mut XmlWriter, header: &GroupHeader) -> Result<()> {
    w.wrap("GrpHdr", |w| {
        w.element("MsgId", &header.message_id)?;
        w.date_time("CreDtTm", &header.created)
    })
}

/// Case assignment header of investigation messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    pub created: NaiveDateTime,
    pub assigner: PartyOrAgent,
    pub assignee: PartyOrAgent,
}

pub fn write_assignment(w: &mut XmlWriter, assignment: &Assignment, dialect: &Dialect) -> Result<()> {
    w.wrap("Assgnmt", |w| {
        w.element("Id", &assignment.id)?;
        write_party_or_agent(w, "Assgnr", &assignment.assigner, dialect)?;
        write_party_or_agent(w, "Assgne", &assignment.assignee, dialect)?;
        w.date_time("CreDtTm", &assignment.created)
    })
}

/// Reason code with optional free-text details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonInformation {
    pub code: Option<String>,
    pub additional_information: Vec<String>,
}

impl ReasonInformation {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            additional_information: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.additional_information.is_empty()
    }
}

pub fn write_reason(w: &mut XmlWriter, name: &str, reason: &ReasonInformation) -> Result<()> {
    if reason.is_empty() {
        return Ok(());
    }
    w.wrap(name, |w| {
        if let Some(code) = &reason.code {
            w.wrap("Rsn", |w| w.element("Cd", code))?;
        }
        for line in &reason.additional_information {
            w.element("AddtlInf", line)?;
        }
        Ok(())
    })
}

/// Reference to the original message of an investigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalGroup {
    pub message_id: String,
    /// Message name of the original, e.g. `pacs.008.001.08`.
    pub message_name: String,
}

pub fn write_original_group(w: &mut XmlWriter, name: &str, group: &OriginalGroup) -> Result<()> {
    w.wrap(name, |w| {
        w.element("OrgnlMsgId", &group.message_id)?;
        w.element("OrgnlMsgNmId", &group.message_name)
    })
}
