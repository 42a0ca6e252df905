//! CAMT.053 (ISO 20022) bank-to-customer statement reader and writer.
//!
//! Reading goes through `quick_xml::de` into private mirror structs which
//! are then checked and lifted into [`Camt053Document`]. Every supported
//! schema version is accepted; the element differences between them
//! (`BIC`/`BICFI`, coded entry status, `<Pty>` wrapped parties) are
//! absorbed by the mirror structs. Writing uses the shared
//! [`IsoDocument`] machinery.

use crate::error::{Error, ParseError, Result};
use crate::iso20022::common::{write_amount, write_group_header, Account, ActiveAmount, GroupHeader};
use crate::iso20022::{Dialect, IsoDocument, MessageKind, XmlWriter};
use crate::types::{
    Amount, Balance, BalanceCheck, BalanceSubtype, Counterparty, CurrencyCode, DebitCredit, Reference,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::{Read, Write};
use tracing::debug;

/// End-to-end id placeholder used when the originator supplied none.
const NOT_PROVIDED: &str = "NOTPROVIDED";

/// Booking status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryStatus {
    #[default]
    Booked,
    Pending,
    Information,
}

impl EntryStatus {
    pub fn code(&self) -> &'static str {
        match self {
            EntryStatus::Booked => "BOOK",
            EntryStatus::Pending => "PDNG",
            EntryStatus::Information => "INFO",
        }
    }

    fn from_code(code: &str) -> Result<Self> {
        match code {
            "BOOK" => Ok(EntryStatus::Booked),
            "PDNG" => Ok(EntryStatus::Pending),
            "INFO" => Ok(EntryStatus::Information),
            other => Err(Error::validation("Ntry/Sts", format!("unknown entry status '{}'", other))),
        }
    }
}

/// ISO bank transaction code: domain, family and subfamily, plus the
/// proprietary code banks often send alongside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankTransactionCode {
    pub domain: Option<String>,
    pub family: Option<String>,
    pub subfamily: Option<String>,
    pub proprietary: Option<String>,
}

impl BankTransactionCode {
    pub fn domain(domain: &str, family: &str, subfamily: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            family: Some(family.to_string()),
            subfamily: Some(subfamily.to_string()),
            proprietary: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_none() && self.proprietary.is_none()
    }
}

/// One `<TxDtls>` of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryTransaction {
    pub reference: Reference,
    /// The other side of the booking: debtor of a credit, creditor of a debit.
    pub counterparty: Counterparty,
    /// Unstructured remittance lines.
    pub remittance: Vec<String>,
    pub additional_information: Option<String>,
}

/// A statement entry (`<Ntry>`).
#[derive(Debug, Clone, PartialEq)]
pub struct CamtEntry {
    pub entry_reference: Option<String>,
    pub amount: Amount,
    pub currency: CurrencyCode,
    /// Credit/debit indicator combined with the reversal flag.
    pub mark: DebitCredit,
    pub status: EntryStatus,
    pub booking_date: Option<NaiveDate>,
    pub value_date: Option<NaiveDate>,
    pub account_servicer_reference: Option<String>,
    pub bank_transaction_code: BankTransactionCode,
    pub transactions: Vec<EntryTransaction>,
    pub additional_information: Option<String>,
}

impl CamtEntry {
    pub fn new(amount: Amount, currency: CurrencyCode, mark: DebitCredit) -> Self {
        Self {
            entry_reference: None,
            amount,
            currency,
            mark,
            status: EntryStatus::Booked,
            booking_date: None,
            value_date: None,
            account_servicer_reference: None,
            bank_transaction_code: BankTransactionCode::default(),
            transactions: Vec::new(),
            additional_information: None,
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.mark.apply(self.amount)
    }

    /// First transaction detail, where single-transaction entries keep
    /// their references.
    pub fn primary_transaction(&self) -> Option<&EntryTransaction> {
        self.transactions.first()
    }
}

/// One `<Stmt>` of a camt.053 document.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountStatement {
    pub id: String,
    pub electronic_sequence: Option<u64>,
    pub legal_sequence: Option<u64>,
    pub created: Option<NaiveDateTime>,
    pub account: Account,
    pub owner: Option<String>,
    pub servicer_bic: Option<String>,
    pub balances: Vec<Balance>,
    pub entries: Vec<CamtEntry>,
    pub additional_information: Option<String>,
}

impl AccountStatement {
    pub fn new(id: impl Into<String>, account: Account) -> Self {
        Self {
            id: id.into(),
            electronic_sequence: None,
            legal_sequence: None,
            created: None,
            account,
            owner: None,
            servicer_bic: None,
            balances: Vec::new(),
            entries: Vec::new(),
            additional_information: None,
        }
    }

    /// Opening balance: OPBD, else PRCD, else the first of several CLBD.
    pub fn opening_balance(&self) -> Option<&Balance> {
        self.balance(BalanceSubtype::OpeningBooked)
            .or_else(|| self.balance(BalanceSubtype::PreviouslyClosedBooked))
            .or_else(|| {
                let mut closing = self.balances.iter().filter(|b| b.subtype == BalanceSubtype::ClosingBooked);
                let first = closing.next();
                closing.next().and(first)
            })
    }

    /// Last CLBD balance.
    pub fn closing_balance(&self) -> Option<&Balance> {
        self.balances
            .iter()
            .rev()
            .find(|b| b.subtype == BalanceSubtype::ClosingBooked)
    }

    pub fn balance(&self, subtype: BalanceSubtype) -> Option<&Balance> {
        self.balances.iter().find(|b| b.subtype == subtype)
    }

    /// Compare the closing balance with opening plus booked entries.
    pub fn check_balance(&self) -> Option<BalanceCheck> {
        let opening = self.opening_balance()?;
        let closing = self.closing_balance()?;
        let movement: Decimal = self
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Booked)
            .map(CamtEntry::signed_amount)
            .sum();
        Some(BalanceCheck {
            expected: opening.signed_amount() + movement,
            actual: closing.signed_amount(),
        })
    }
}

/// A camt.053 document: group header and statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Camt053Document {
    pub header: GroupHeader,
    pub statements: Vec<AccountStatement>,
}

impl Camt053Document {
    pub fn new(header: GroupHeader, statements: Vec<AccountStatement>) -> Self {
        Self { header, statements }
    }

    /// Parse camt.053 XML of any supported version.
    pub fn parse(xml: &str) -> Result<Self> {
        let document: DocumentXml = quick_xml::de::from_str(xml)?;
        match document.xmlns.as_deref() {
            Some(namespace) => match MessageKind::from_namespace(namespace) {
                Some((MessageKind::Camt053, version)) => debug!(version, "reading camt.053"),
                _ => return Err(ParseError::UnrecognizedVersion(namespace.to_string()).into()),
            },
            None => debug!("camt.053 document without namespace"),
        }
        Self::from_xml(document.bk_to_cstmr_stmt)
    }

    /// Parse a camt.053 document from any source implementing `Read`.
    ///
    /// # Arguments
    ///
    /// * `reader` - A mutable reference to a type implementing `Read`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use ypbank_interchange::camt053_format::Camt053Document;
    ///
    /// let mut file = File::open("statement.xml")?;
    /// let document = Camt053Document::from_read(&mut file)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut xml_content = String::new();
        reader.read_to_string(&mut xml_content)?;
        Self::parse(&xml_content)
    }

    /// Write the document as camt.053 XML in `version`.
    ///
    /// # Arguments
    ///
    /// * `writer` - A mutable reference to a type implementing `Write`
    /// * `version` - Schema version, e.g. `8` for camt.053.001.08
    pub fn write_to<W: Write>(&self, writer: &mut W, version: u8) -> Result<()> {
        let xml = self.to_xml(version)?;
        writer.write_all(xml.as_bytes())?;
        Ok(())
    }

    fn from_xml(xml: BankToCustomerStatementXml) -> Result<Self> {
        let statements = xml
            .stmt
            .into_iter()
            .map(statement_from_xml)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            header: GroupHeader::new(xml.grp_hdr.msg_id, parse_date_time(&xml.grp_hdr.cre_dt_tm)?),
            statements,
        })
    }
}

impl IsoDocument for Camt053Document {
    fn kind(&self) -> MessageKind {
        MessageKind::Camt053
    }

    fn write_body(&self, w: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        write_group_header(w, &self.header)?;
        for statement in &self.statements {
            w.wrap("Stmt", |w| {
                w.element("Id", &statement.id)?;
                if let Some(sequence) = statement.electronic_sequence {
                    w.element("ElctrncSeqNb", &sequence.to_string())?;
                }
                if let Some(sequence) = statement.legal_sequence {
                    w.element("LglSeqNb", &sequence.to_string())?;
                }
                if let Some(created) = &statement.created {
                    w.date_time("CreDtTm", created)?;
                }
                write_report_account(w, &statement.account, &statement.owner, &statement.servicer_bic, dialect)?;
                for balance in &statement.balances {
                    write_balance(w, balance)?;
                }
                for entry in &statement.entries {
                    write_entry(w, entry, dialect)?;
                }
                w.optional("AddtlStmtInf", statement.additional_information.as_deref())
            })?;
        }
        Ok(())
    }
}

/// `<Acct>` of a report: identification, currency, owner and servicer.
pub(crate) fn write_report_account(
    w: &mut XmlWriter,
    account: &Account,
    owner: &Option<String>,
    servicer_bic: &Option<String>,
    dialect: &Dialect,
) -> Result<()> {
    w.wrap("Acct", |w| {
        // The schema requires an account id even when none is known.
        w.wrap("Id", |w| match (&account.iban, &account.other_id) {
            (Some(iban), _) => w.element("IBAN", iban),
            (None, Some(other)) => w.wrap("Othr", |w| w.element("Id", other)),
            (None, None) => w.wrap("Othr", |w| w.element("Id", NOT_PROVIDED)),
        })?;
        w.optional("Ccy", account.currency.as_ref().map(CurrencyCode::as_str))?;
        if let Some(owner) = owner {
            w.wrap("Ownr", |w| w.element("Nm", owner))?;
        }
        if let Some(bic) = servicer_bic {
            w.wrap("Svcr", |w| w.wrap("FinInstnId", |w| w.element(dialect.bic_element(), bic)))?;
        }
        Ok(())
    })
}

pub(crate) fn write_balance(w: &mut XmlWriter, balance: &Balance) -> Result<()> {
    w.wrap("Bal", |w| {
        w.wrap("Tp", |w| w.wrap("CdOrPrtry", |w| w.element("Cd", balance.subtype.code())))?;
        write_amount(w, "Amt", &ActiveAmount::new(balance.currency.clone(), balance.amount.value()))?;
        w.element("CdtDbtInd", balance.mark.to_iso_format())?;
        w.wrap("Dt", |w| w.date("Dt", &balance.date))
    })
}

/// `<Ntry>` shared by camt.053 and camt.054.
pub(crate) fn write_entry(w: &mut XmlWriter, entry: &CamtEntry, dialect: &Dialect) -> Result<()> {
    w.wrap("Ntry", |w| {
        w.optional("NtryRef", entry.entry_reference.as_deref())?;
        write_amount(w, "Amt", &ActiveAmount::new(entry.currency.clone(), entry.amount.value()))?;
        w.element("CdtDbtInd", entry.mark.to_iso_format())?;
        if entry.mark.is_reversal() {
            w.element("RvslInd", "true")?;
        }
        if dialect.coded_entry_status() {
            w.wrap("Sts", |w| w.element("Cd", entry.status.code()))?;
        } else {
            w.element("Sts", entry.status.code())?;
        }
        if let Some(date) = &entry.booking_date {
            w.wrap("BookgDt", |w| w.date("Dt", date))?;
        }
        if let Some(date) = &entry.value_date {
            w.wrap("ValDt", |w| w.date("Dt", date))?;
        }
        w.optional("AcctSvcrRef", entry.account_servicer_reference.as_deref())?;
        write_bank_transaction_code(w, &entry.bank_transaction_code)?;
        if !entry.transactions.is_empty() {
            w.wrap("NtryDtls", |w| {
                for transaction in &entry.transactions {
                    write_entry_transaction(w, transaction, entry.mark.is_credit(), dialect)?;
                }
                Ok(())
            })?;
        }
        w.optional("AddtlNtryInf", entry.additional_information.as_deref())
    })
}

fn write_bank_transaction_code(w: &mut XmlWriter, code: &BankTransactionCode) -> Result<()> {
    if code.is_empty() {
        return Ok(());
    }
    w.wrap("BkTxCd", |w| {
        if let Some(domain) = &code.domain {
            w.wrap("Domn", |w| {
                w.element("Cd", domain)?;
                if let Some(family) = &code.family {
                    w.wrap("Fmly", |w| {
                        w.element("Cd", family)?;
                        w.optional("SubFmlyCd", code.subfamily.as_deref())
                    })?;
                }
                Ok(())
            })?;
        }
        if let Some(proprietary) = &code.proprietary {
            w.wrap("Prtry", |w| w.element("Cd", proprietary))?;
        }
        Ok(())
    })
}

fn write_entry_transaction(
    w: &mut XmlWriter,
    transaction: &EntryTransaction,
    credit: bool,
    dialect: &Dialect,
) -> Result<()> {
    let reference = &transaction.reference;
    let counterparty = &transaction.counterparty;
    w.wrap("TxDtls", |w| {
        let refs = [
            ("AcctSvcrRef", &reference.account_servicer_reference),
            ("PmtInfId", &reference.payment_information_id),
            ("InstrId", &reference.instruction_id),
            ("EndToEndId", &reference.end_to_end_id),
            ("TxId", &reference.additional),
            ("MndtId", &reference.mandate_id),
        ];
        if refs.iter().any(|(_, value)| value.is_some()) {
            w.wrap("Refs", |w| {
                for (name, value) in refs {
                    w.optional(name, value.as_deref())?;
                }
                Ok(())
            })?;
        }

        let (party, account, agent) = if credit {
            ("Dbtr", "DbtrAcct", "DbtrAgt")
        } else {
            ("Cdtr", "CdtrAcct", "CdtrAgt")
        };
        let counterparty_name = counterparty.name.as_deref();
        let creditor_id = reference.creditor_id.as_deref();
        if counterparty_name.is_some() || counterparty.iban.is_some() || creditor_id.is_some() {
            w.wrap("RltdPties", |w| {
                // Debtor precedes creditor in the schema.
                if credit {
                    write_related_party(w, party, counterparty_name, None, dialect)?;
                    write_related_party(w, "Cdtr", None, creditor_id, dialect)?;
                } else {
                    write_related_party(w, party, counterparty_name, creditor_id, dialect)?;
                }
                if let Some(iban) = &counterparty.iban {
                    w.wrap(account, |w| w.wrap("Id", |w| w.element("IBAN", iban)))?;
                }
                Ok(())
            })?;
        }
        if let Some(bic) = &counterparty.bic {
            w.wrap("RltdAgts", |w| {
                w.wrap(agent, |w| w.wrap("FinInstnId", |w| w.element(dialect.bic_element(), bic)))
            })?;
        }
        if !transaction.remittance.is_empty() {
            w.wrap("RmtInf", |w| {
                for line in &transaction.remittance {
                    w.element("Ustrd", line)?;
                }
                Ok(())
            })?;
        }
        w.optional("AddtlTxInf", transaction.additional_information.as_deref())
    })
}

fn write_related_party(
    w: &mut XmlWriter,
    element: &str,
    name: Option<&str>,
    scheme_id: Option<&str>,
    dialect: &Dialect,
) -> Result<()> {
    if name.is_none() && scheme_id.is_none() {
        return Ok(());
    }
    let contents = |w: &mut XmlWriter| -> Result<()> {
        w.optional("Nm", name)?;
        if let Some(id) = scheme_id {
            w.wrap("Id", |w| w.wrap("PrvtId", |w| w.wrap("Othr", |w| w.element("Id", id))))?;
        }
        Ok(())
    };
    w.wrap(element, |w| {
        if dialect.wraps_related_party() {
            w.wrap("Pty", contents)
        } else {
            contents(w)
        }
    })
}

// XML structure definitions

#[derive(Debug, Deserialize)]
struct DocumentXml {
    #[serde(rename = "@xmlns", default)]
    xmlns: Option<String>,
    #[serde(rename = "BkToCstmrStmt")]
    bk_to_cstmr_stmt: BankToCustomerStatementXml,
}

#[derive(Debug, Deserialize)]
struct BankToCustomerStatementXml {
    #[serde(rename = "GrpHdr")]
    grp_hdr: GroupHeaderXml,
    #[serde(rename = "Stmt", default)]
    stmt: Vec<StatementXml>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupHeaderXml {
    #[serde(rename = "MsgId")]
    pub(crate) msg_id: String,
    #[serde(rename = "CreDtTm")]
    pub(crate) cre_dt_tm: String,
}

#[derive(Debug, Deserialize)]
struct StatementXml {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "ElctrncSeqNb", default)]
    elctrnc_seq_nb: Option<u64>,
    #[serde(rename = "LglSeqNb", default)]
    lgl_seq_nb: Option<u64>,
    #[serde(rename = "CreDtTm", default)]
    cre_dt_tm: Option<String>,
    #[serde(rename = "Acct")]
    acct: AccountInfoXml,
    #[serde(rename = "Bal", default)]
    bal: Vec<BalanceXml>,
    #[serde(rename = "Ntry", default)]
    ntry: Vec<EntryXml>,
    #[serde(rename = "AddtlStmtInf", default)]
    addtl_stmt_inf: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountInfoXml {
    #[serde(rename = "Id")]
    id: AccountIdXml,
    #[serde(rename = "Ccy", default)]
    ccy: Option<String>,
    #[serde(rename = "Ownr", default)]
    ownr: Option<PartyXml>,
    #[serde(rename = "Svcr", default)]
    svcr: Option<AgentXml>,
}

#[derive(Debug, Default, Deserialize)]
struct AccountIdXml {
    #[serde(rename = "IBAN", default)]
    iban: Option<String>,
    #[serde(rename = "Othr", default)]
    othr: Option<OtherIdXml>,
}

#[derive(Debug, Deserialize)]
struct OtherIdXml {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct AccountXml {
    #[serde(rename = "Id", default)]
    id: AccountIdXml,
}

#[derive(Debug, Default, Deserialize)]
struct AgentXml {
    #[serde(rename = "FinInstnId", default)]
    fin_instn_id: FinancialInstitutionIdXml,
}

#[derive(Debug, Default, Deserialize)]
struct FinancialInstitutionIdXml {
    #[serde(rename = "BIC", default)]
    bic: Option<String>,
    #[serde(rename = "BICFI", default)]
    bicfi: Option<String>,
}

impl AgentXml {
    fn bic(self) -> Option<String> {
        self.fin_instn_id.bicfi.or(self.fin_instn_id.bic)
    }
}

/// Party in both the flat (`<Nm>`) and the `<Pty>` wrapped layout.
#[derive(Debug, Default, Deserialize)]
struct PartyXml {
    #[serde(rename = "Nm", default)]
    nm: Option<String>,
    #[serde(rename = "Id", default)]
    id: Option<PartyIdXml>,
    #[serde(rename = "Pty", default)]
    pty: Option<Box<PartyXml>>,
}

impl PartyXml {
    fn flatten(self) -> PartyXml {
        match self.pty {
            Some(inner) => *inner,
            None => self,
        }
    }

    fn scheme_id(&self) -> Option<String> {
        self.id
            .as_ref()
            .and_then(|id| id.prvt_id.as_ref())
            .and_then(|p| p.othr.as_ref())
            .map(|o| o.id.clone())
    }
}

#[derive(Debug, Deserialize)]
struct PartyIdXml {
    #[serde(rename = "PrvtId", default)]
    prvt_id: Option<PrivateIdXml>,
}

#[derive(Debug, Deserialize)]
struct PrivateIdXml {
    #[serde(rename = "Othr", default)]
    othr: Option<OtherIdXml>,
}

#[derive(Debug, Deserialize)]
struct BalanceXml {
    #[serde(rename = "Tp")]
    tp: BalanceTypeXml,
    #[serde(rename = "Amt")]
    amt: AmountXml,
    #[serde(rename = "CdtDbtInd")]
    cdt_dbt_ind: String,
    #[serde(rename = "Dt")]
    dt: DateXml,
}

#[derive(Debug, Deserialize)]
struct BalanceTypeXml {
    #[serde(rename = "CdOrPrtry")]
    cd_or_prtry: CodeOrProprietaryXml,
}

#[derive(Debug, Deserialize)]
struct CodeOrProprietaryXml {
    #[serde(rename = "Cd", default)]
    cd: Option<String>,
    #[serde(rename = "Prtry", default)]
    prtry: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AmountXml {
    #[serde(rename = "$text")]
    pub(crate) value: String,
    #[serde(rename = "@Ccy")]
    pub(crate) ccy: String,
}

#[derive(Debug, Deserialize)]
struct DateXml {
    #[serde(rename = "Dt", default)]
    dt: Option<String>,
    #[serde(rename = "DtTm", default)]
    dt_tm: Option<String>,
}

impl DateXml {
    fn date(&self, field: &str) -> Result<NaiveDate> {
        match (&self.dt, &self.dt_tm) {
            (Some(date), _) => parse_date_only(date),
            (None, Some(date_time)) => Ok(parse_date_time(date_time)?.date()),
            (None, None) => Err(Error::validation(field, "neither Dt nor DtTm present")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusXml {
    #[serde(rename = "$text", default)]
    text: Option<String>,
    #[serde(rename = "Cd", default)]
    cd: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EntryXml {
    #[serde(rename = "NtryRef", default)]
    ntry_ref: Option<String>,
    #[serde(rename = "Amt")]
    amt: AmountXml,
    #[serde(rename = "CdtDbtInd")]
    cdt_dbt_ind: String,
    #[serde(rename = "RvslInd", default)]
    rvsl_ind: Option<bool>,
    #[serde(rename = "Sts")]
    sts: StatusXml,
    #[serde(rename = "BookgDt", default)]
    bookg_dt: Option<DateXml>,
    #[serde(rename = "ValDt", default)]
    val_dt: Option<DateXml>,
    #[serde(rename = "AcctSvcrRef", default)]
    acct_svcr_ref: Option<String>,
    #[serde(rename = "BkTxCd", default)]
    bk_tx_cd: Option<BankTransactionCodeXml>,
    #[serde(rename = "NtryDtls", default)]
    ntry_dtls: Vec<EntryDetailsXml>,
    #[serde(rename = "AddtlNtryInf", default)]
    addtl_ntry_inf: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BankTransactionCodeXml {
    #[serde(rename = "Domn", default)]
    domn: Option<DomainXml>,
    #[serde(rename = "Prtry", default)]
    prtry: Option<ProprietaryCodeXml>,
}

#[derive(Debug, Deserialize)]
struct DomainXml {
    #[serde(rename = "Cd")]
    cd: String,
    #[serde(rename = "Fmly", default)]
    fmly: Option<FamilyXml>,
}

#[derive(Debug, Deserialize)]
struct FamilyXml {
    #[serde(rename = "Cd")]
    cd: String,
    #[serde(rename = "SubFmlyCd", default)]
    sub_fmly_cd: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProprietaryCodeXml {
    #[serde(rename = "Cd")]
    cd: String,
}

#[derive(Debug, Deserialize)]
struct EntryDetailsXml {
    #[serde(rename = "TxDtls", default)]
    tx_dtls: Vec<TransactionDetailsXml>,
}

#[derive(Debug, Deserialize)]
struct TransactionDetailsXml {
    #[serde(rename = "Refs", default)]
    refs: Option<ReferencesXml>,
    #[serde(rename = "RltdPties", default)]
    rltd_pties: Option<RelatedPartiesXml>,
    #[serde(rename = "RltdAgts", default)]
    rltd_agts: Option<RelatedAgentsXml>,
    #[serde(rename = "RmtInf", default)]
    rmt_inf: Option<RemittanceInformationXml>,
    #[serde(rename = "AddtlTxInf", default)]
    addtl_tx_inf: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReferencesXml {
    #[serde(rename = "AcctSvcrRef", default)]
    acct_svcr_ref: Option<String>,
    #[serde(rename = "PmtInfId", default)]
    pmt_inf_id: Option<String>,
    #[serde(rename = "InstrId", default)]
    instr_id: Option<String>,
    #[serde(rename = "EndToEndId", default)]
    end_to_end_id: Option<String>,
    #[serde(rename = "TxId", default)]
    tx_id: Option<String>,
    #[serde(rename = "MndtId", default)]
    mndt_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RelatedPartiesXml {
    #[serde(rename = "Dbtr", default)]
    dbtr: Option<PartyXml>,
    #[serde(rename = "DbtrAcct", default)]
    dbtr_acct: Option<AccountXml>,
    #[serde(rename = "Cdtr", default)]
    cdtr: Option<PartyXml>,
    #[serde(rename = "CdtrAcct", default)]
    cdtr_acct: Option<AccountXml>,
}

#[derive(Debug, Default, Deserialize)]
struct RelatedAgentsXml {
    #[serde(rename = "DbtrAgt", default)]
    dbtr_agt: Option<AgentXml>,
    #[serde(rename = "CdtrAgt", default)]
    cdtr_agt: Option<AgentXml>,
}

#[derive(Debug, Deserialize)]
struct RemittanceInformationXml {
    #[serde(rename = "Ustrd", default)]
    ustrd: Vec<String>,
}

fn statement_from_xml(xml: StatementXml) -> Result<AccountStatement> {
    let account_currency = xml.acct.ccy.as_deref().map(str::parse::<CurrencyCode>).transpose()?;
    let account = Account {
        iban: xml.acct.id.iban,
        other_id: xml.acct.id.othr.map(|o| o.id),
        currency: account_currency,
    };

    let mut balances = Vec::new();
    for bal in &xml.bal {
        let code = bal
            .tp
            .cd_or_prtry
            .cd
            .as_deref()
            .or(bal.tp.cd_or_prtry.prtry.as_deref())
            .unwrap_or_default();
        match BalanceSubtype::from_code(code) {
            Some(subtype) => balances.push(balance_from_xml(bal, subtype)?),
            None => debug!(code, "skipping balance type"),
        }
    }

    let entries = xml
        .ntry
        .into_iter()
        .map(entry_from_xml)
        .collect::<Result<Vec<_>>>()?;

    Ok(AccountStatement {
        id: xml.id,
        electronic_sequence: xml.elctrnc_seq_nb,
        legal_sequence: xml.lgl_seq_nb,
        created: xml.cre_dt_tm.as_deref().map(parse_date_time).transpose()?,
        account,
        owner: xml.acct.ownr.and_then(|o| o.flatten().nm),
        servicer_bic: xml.acct.svcr.and_then(AgentXml::bic),
        balances,
        entries,
        additional_information: xml.addtl_stmt_inf,
    })
}

fn balance_from_xml(bal: &BalanceXml, subtype: BalanceSubtype) -> Result<Balance> {
    let mark = DebitCredit::from_iso(&bal.cdt_dbt_ind, false).map_err(|e| Error::validation("Bal/CdtDbtInd", e))?;
    Ok(Balance::new(
        subtype,
        mark,
        bal.dt.date("Bal/Dt")?,
        bal.amt.ccy.parse()?,
        bal.amt.value.trim().parse()?,
    ))
}

pub(crate) fn entry_from_xml(xml: EntryXml) -> Result<CamtEntry> {
    let mark = DebitCredit::from_iso(&xml.cdt_dbt_ind, xml.rvsl_ind.unwrap_or(false))
        .map_err(|e| Error::validation("Ntry/CdtDbtInd", e))?;
    let status_code = xml.sts.cd.as_deref().or(xml.sts.text.as_deref()).unwrap_or_default();

    let bank_transaction_code = xml
        .bk_tx_cd
        .map(|code| {
            let (domain, family, subfamily) = match code.domn {
                Some(domain) => {
                    let (family, subfamily) = match domain.fmly {
                        Some(family) => (Some(family.cd), family.sub_fmly_cd),
                        None => (None, None),
                    };
                    (Some(domain.cd), family, subfamily)
                }
                None => (None, None, None),
            };
            BankTransactionCode {
                domain,
                family,
                subfamily,
                proprietary: code.prtry.map(|p| p.cd),
            }
        })
        .unwrap_or_default();

    let credit = mark.is_credit();
    let transactions = xml
        .ntry_dtls
        .into_iter()
        .flat_map(|details| details.tx_dtls)
        .map(|details| transaction_from_xml(details, credit))
        .collect();

    Ok(CamtEntry {
        entry_reference: xml.ntry_ref,
        amount: xml.amt.value.trim().parse()?,
        currency: xml.amt.ccy.parse()?,
        mark,
        status: EntryStatus::from_code(status_code)?,
        booking_date: xml.bookg_dt.map(|d| d.date("Ntry/BookgDt")).transpose()?,
        value_date: xml.val_dt.map(|d| d.date("Ntry/ValDt")).transpose()?,
        account_servicer_reference: xml.acct_svcr_ref,
        bank_transaction_code,
        transactions,
        additional_information: xml.addtl_ntry_inf,
    })
}

fn transaction_from_xml(xml: TransactionDetailsXml, credit: bool) -> EntryTransaction {
    let refs = xml.refs.unwrap_or_default();
    let parties = xml.rltd_pties.unwrap_or_default();
    let agents = xml.rltd_agts.unwrap_or_default();

    let creditor = parties.cdtr.map(PartyXml::flatten);
    let debtor = parties.dbtr.map(PartyXml::flatten);
    let creditor_id = creditor.as_ref().and_then(PartyXml::scheme_id);

    let (party, account, agent) = if credit {
        (debtor, parties.dbtr_acct, agents.dbtr_agt)
    } else {
        (creditor, parties.cdtr_acct, agents.cdtr_agt)
    };

    EntryTransaction {
        reference: Reference {
            end_to_end_id: refs.end_to_end_id.filter(|id| id != NOT_PROVIDED),
            mandate_id: refs.mndt_id,
            creditor_id,
            account_servicer_reference: refs.acct_svcr_ref,
            payment_information_id: refs.pmt_inf_id,
            instruction_id: refs.instr_id,
            additional: refs.tx_id,
            ..Reference::default()
        },
        counterparty: Counterparty {
            name: party.and_then(|p| p.nm),
            iban: account.and_then(|a| a.id.iban),
            bic: agent.and_then(AgentXml::bic),
        },
        remittance: xml.rmt_inf.map(|r| r.ustrd).unwrap_or_default(),
        additional_information: xml.addtl_tx_inf,
    }
}

/// Parse an ISO date-time with or without offset and fractional seconds.
/// A bare date is taken as midnight.
pub(crate) fn parse_date_time(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Ok(with_offset.naive_local());
    }
    if let Ok(local) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(local);
    }
    let date = parse_date_only(value)?;
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::validation("CreDtTm", format!("invalid date time '{}'", value)))
}

fn parse_date_only(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| Error::validation("Dt", format!("invalid ISO date '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const SAMPLE_V02: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="urn:iso:std:iso:20022:tech:xsd:camt.053.001.02">
  <BkToCstmrStmt>
    <GrpHdr>
      <MsgId>MSG-1</MsgId>
      <CreDtTm>2026-01-15T18:00:00+01:00</CreDtTm>
    </GrpHdr>
    <Stmt>
      <Id>STMT-1</Id>
      <ElctrncSeqNb>7</ElctrncSeqNb>
      <Acct>
        <Id><IBAN>DE89370400440532013000</IBAN></Id>
        <Ccy>EUR</Ccy>
        <Svcr><FinInstnId><BIC>COBADEFFXXX</BIC></FinInstnId></Svcr>
      </Acct>
      <Bal>
        <Tp><CdOrPrtry><Cd>PRCD</Cd></CdOrPrtry></Tp>
        <Amt Ccy="EUR">1000.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Dt><Dt>2026-01-14</Dt></Dt>
      </Bal>
      <Bal>
        <Tp><CdOrPrtry><Cd>CLBD</Cd></CdOrPrtry></Tp>
        <Amt Ccy="EUR">1500.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Dt><Dt>2026-01-15</Dt></Dt>
      </Bal>
      <Bal>
        <Tp><CdOrPrtry><Cd>OPAV</Cd></CdOrPrtry></Tp>
        <Amt Ccy="EUR">1000.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Dt><Dt>2026-01-15</Dt></Dt>
      </Bal>
      <Ntry>
        <NtryRef>N-1</NtryRef>
        <Amt Ccy="EUR">500.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2026-01-15</Dt></BookgDt>
        <ValDt><DtTm>2026-01-15T09:30:00</DtTm></ValDt>
        <AcctSvcrRef>BANK-REF-1</AcctSvcrRef>
        <BkTxCd>
          <Domn><Cd>PMNT</Cd><Fmly><Cd>RCDT</Cd><SubFmlyCd>ESCT</SubFmlyCd></Fmly></Domn>
          <Prtry><Cd>NTRF+166</Cd></Prtry>
        </BkTxCd>
        <NtryDtls>
          <TxDtls>
            <Refs><EndToEndId>E2E-1</EndToEndId><MndtId>M-1</MndtId></Refs>
            <RltdPties>
              <Dbtr><Nm>Max Mustermann</Nm></Dbtr>
              <DbtrAcct><Id><IBAN>DE02120300000000202051</IBAN></Id></DbtrAcct>
            </RltdPties>
            <RltdAgts><DbtrAgt><FinInstnId><BIC>BYLADEM1001</BIC></FinInstnId></DbtrAgt></RltdAgts>
            <RmtInf><Ustrd>Invoice 42</Ustrd><Ustrd>January</Ustrd></RmtInf>
          </TxDtls>
        </NtryDtls>
      </Ntry>
    </Stmt>
  </BkToCstmrStmt>
</Document>"#;

    #[test]
    fn test_parse_date() {
        let date = parse_date_time("2023-04-20T23:24:31").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2023, 4, 20));
        assert!(parse_date_time("2023-04-20T23:24:31.123+02:00").is_ok());
        assert!(parse_date_time("20.04.2023").is_err());
    }

    #[test]
    fn test_parse_v02_statement() {
        let document = Camt053Document::parse(SAMPLE_V02).unwrap();
        assert_eq!(document.header.message_id, "MSG-1");
        let statement = &document.statements[0];
        assert_eq!(statement.electronic_sequence, Some(7));
        assert_eq!(statement.servicer_bic.as_deref(), Some("COBADEFFXXX"));
        assert_eq!(statement.balances.len(), 2);
        assert_eq!(
            statement.opening_balance().map(|b| b.subtype),
            Some(BalanceSubtype::PreviouslyClosedBooked)
        );

        let entry = &statement.entries[0];
        assert_eq!(entry.mark, DebitCredit::Credit);
        assert_eq!(entry.bank_transaction_code.subfamily.as_deref(), Some("ESCT"));
        assert_eq!(entry.value_date, NaiveDate::from_ymd_opt(2026, 1, 15));
        let transaction = entry.primary_transaction().unwrap();
        assert_eq!(transaction.reference.end_to_end_id.as_deref(), Some("E2E-1"));
        assert_eq!(transaction.counterparty.name.as_deref(), Some("Max Mustermann"));
        assert_eq!(transaction.counterparty.bic.as_deref(), Some("BYLADEM1001"));
        assert_eq!(transaction.remittance, vec!["Invoice 42", "January"]);
        assert!(statement.check_balance().unwrap().is_consistent());
    }

    #[test]
    fn test_not_provided_end_to_end_id() {
        let xml = SAMPLE_V02.replace("<EndToEndId>E2E-1</EndToEndId>", "<EndToEndId>NOTPROVIDED</EndToEndId>");
        let document = Camt053Document::parse(&xml).unwrap();
        let transaction = document.statements[0].entries[0].primary_transaction().unwrap();
        assert_eq!(transaction.reference.end_to_end_id, None);
    }

    #[test]
    fn test_foreign_namespace_is_rejected() {
        let xml = SAMPLE_V02.replace("camt.053.001.02", "camt.052.001.02");
        assert!(matches!(
            Camt053Document::parse(&xml),
            Err(Error::Parse(ParseError::UnrecognizedVersion(_)))
        ));
    }

    #[test]
    fn test_round_trip_every_version() {
        let document = Camt053Document::parse(SAMPLE_V02).unwrap();
        for version in MessageKind::Camt053.supported_versions() {
            let xml = document.to_xml(version).unwrap();
            assert_eq!(Camt053Document::parse(&xml).unwrap(), document, "version {}", version);
        }
    }

    #[test]
    fn test_version_dependent_elements() {
        let mut document = Camt053Document::parse(SAMPLE_V02).unwrap();
        document.statements[0].entries[0].mark = DebitCredit::ReversalDebit;

        let v02 = document.to_xml(2).unwrap();
        assert!(v02.contains("<Sts>BOOK</Sts>"));
        assert!(v02.contains("<BIC>BYLADEM1001</BIC>"));
        assert!(v02.contains("<RvslInd>true</RvslInd>"));

        let v08 = document.to_xml(8).unwrap();
        assert!(v08.contains("xmlns=\"urn:iso:std:iso:20022:tech:xsd:camt.053.001.08\""));
        assert!(v08.contains("<BICFI>BYLADEM1001</BICFI>"));
        assert!(v08.contains("<Pty>"));
        assert!(v08.contains("<Cd>BOOK</Cd>"));
    }
}
