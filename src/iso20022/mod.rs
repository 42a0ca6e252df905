//! ISO 20022 CAMT and Pain document generators.
//!
//! Every message type is a plain struct implementing [`IsoDocument`]. The
//! same document renders into any supported schema version; the version
//! picks the namespace from a static table and switches the few elements
//! whose grammar changed between releases.

pub mod common;
pub mod investigation;
pub mod mandate;
pub mod notification;
pub mod payment_initiation;
pub mod xml_writer;

use crate::camt053_format::Camt053Document;
use crate::error::{ParseError, Result};
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

pub use xml_writer::XmlWriter;

/// ISO 20022 message definitions supported by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Camt029,
    Camt038,
    Camt053,
    Camt054,
    Camt056,
    Camt059,
    Camt087,
    Pain001,
    Pain008,
    Pain009,
    Pain010,
    Pain018,
}

/// `(kind, version, namespace)`.
static NAMESPACES: &[(MessageKind, u8, &str)] = &[
    (MessageKind::Camt029, 3, "urn:iso:std:iso:20022:tech:xsd:camt.029.001.03"),
    (MessageKind::Camt029, 9, "urn:iso:std:iso:20022:tech:xsd:camt.029.001.09"),
    (MessageKind::Camt029, 11, "urn:iso:std:iso:20022:tech:xsd:camt.029.001.11"),
    (MessageKind::Camt038, 2, "urn:iso:std:iso:20022:tech:xsd:camt.038.001.02"),
    (MessageKind::Camt038, 3, "urn:iso:std:iso:20022:tech:xsd:camt.038.001.03"),
    (MessageKind::Camt038, 4, "urn:iso:std:iso:20022:tech:xsd:camt.038.001.04"),
    (MessageKind::Camt053, 2, "urn:iso:std:iso:20022:tech:xsd:camt.053.001.02"),
    (MessageKind::Camt053, 4, "urn:iso:std:iso:20022:tech:xsd:camt.053.001.04"),
    (MessageKind::Camt053, 8, "urn:iso:std:iso:20022:tech:xsd:camt.053.001.08"),
    (MessageKind::Camt054, 2, "urn:iso:std:iso:20022:tech:xsd:camt.054.001.02"),
    (MessageKind::Camt054, 4, "urn:iso:std:iso:20022:tech:xsd:camt.054.001.04"),
    (MessageKind::Camt054, 8, "urn:iso:std:iso:20022:tech:xsd:camt.054.001.08"),
    (MessageKind::Camt056, 1, "urn:iso:std:iso:20022:tech:xsd:camt.056.001.01"),
    (MessageKind::Camt056, 8, "urn:iso:std:iso:20022:tech:xsd:camt.056.001.08"),
    (MessageKind::Camt056, 10, "urn:iso:std:iso:20022:tech:xsd:camt.056.001.10"),
    (MessageKind::Camt059, 4, "urn:iso:std:iso:20022:tech:xsd:camt.059.001.04"),
    (MessageKind::Camt059, 6, "urn:iso:std:iso:20022:tech:xsd:camt.059.001.06"),
    (MessageKind::Camt087, 5, "urn:iso:std:iso:20022:tech:xsd:camt.087.001.05"),
    (MessageKind::Camt087, 6, "urn:iso:std:iso:20022:tech:xsd:camt.087.001.06"),
    (MessageKind::Camt087, 8, "urn:iso:std:iso:20022:tech:xsd:camt.087.001.08"),
    (MessageKind::Pain001, 3, "urn:iso:std:iso:20022:tech:xsd:pain.001.001.03"),
    (MessageKind::Pain001, 9, "urn:iso:std:iso:20022:tech:xsd:pain.001.001.09"),
    (MessageKind::Pain001, 11, "urn:iso:std:iso:20022:tech:xsd:pain.001.001.11"),
    (MessageKind::Pain008, 2, "urn:iso:std:iso:20022:tech:xsd:pain.008.001.02"),
    (MessageKind::Pain008, 8, "urn:iso:std:iso:20022:tech:xsd:pain.008.001.08"),
    (MessageKind::Pain009, 1, "urn:iso:std:iso:20022:tech:xsd:pain.009.001.01"),
    (MessageKind::Pain009, 6, "urn:iso:std:iso:20022:tech:xsd:pain.009.001.06"),
    (MessageKind::Pain010, 1, "urn:iso:std:iso:20022:tech:xsd:pain.010.001.01"),
    (MessageKind::Pain010, 6, "urn:iso:std:iso:20022:tech:xsd:pain.010.001.06"),
    (MessageKind::Pain018, 1, "urn:iso:std:iso:20022:tech:xsd:pain.018.001.01"),
    (MessageKind::Pain018, 4, "urn:iso:std:iso:20022:tech:xsd:pain.018.001.04"),
];

impl MessageKind {
    pub const ALL: [MessageKind; 12] = [
        MessageKind::Camt029,
        MessageKind::Camt038,
        MessageKind::Camt053,
        MessageKind::Camt054,
        MessageKind::Camt056,
        MessageKind::Camt059,
        MessageKind::Camt087,
        MessageKind::Pain001,
        MessageKind::Pain008,
        MessageKind::Pain009,
        MessageKind::Pain010,
        MessageKind::Pain018,
    ];

    /// Message identifier without version, e.g. `camt.053.001`.
    pub fn identifier(&self) -> &'static str {
        match self {
            MessageKind::Camt029 => "camt.029.001",
            MessageKind::Camt038 => "camt.038.001",
            MessageKind::Camt053 => "camt.053.001",
            MessageKind::Camt054 => "camt.054.001",
            MessageKind::Camt056 => "camt.056.001",
            MessageKind::Camt059 => "camt.059.001",
            MessageKind::Camt087 => "camt.087.001",
            MessageKind::Pain001 => "pain.001.001",
            MessageKind::Pain008 => "pain.008.001",
            MessageKind::Pain009 => "pain.009.001",
            MessageKind::Pain010 => "pain.010.001",
            MessageKind::Pain018 => "pain.018.001",
        }
    }

    /// Message root element inside `<Document>`.
    pub fn root_element(&self) -> &'static str {
        match self {
            MessageKind::Camt029 => "RsltnOfInvstgtn",
            MessageKind::Camt038 => "CaseStsRptReq",
            MessageKind::Camt053 => "BkToCstmrStmt",
            MessageKind::Camt054 => "BkToCstmrDbtCdtNtfctn",
            MessageKind::Camt056 => "FIToFIPmtCxlReq",
            MessageKind::Camt059 => "NtfctnToRcvStsRpt",
            MessageKind::Camt087 => "ReqToModfyPmt",
            MessageKind::Pain001 => "CstmrCdtTrfInitn",
            MessageKind::Pain008 => "CstmrDrctDbtInitn",
            MessageKind::Pain009 => "MndtInitnReq",
            MessageKind::Pain010 => "MndtAmdmntReq",
            MessageKind::Pain018 => "MndtSspnsnReq",
        }
    }

    /// First version whose agent identification is `BICFI` rather than `BIC`.
    fn bicfi_since(&self) -> u8 {
        match self {
            MessageKind::Camt029 => 5,
            MessageKind::Camt038 | MessageKind::Camt056 | MessageKind::Camt087 => 3,
            MessageKind::Camt053 | MessageKind::Camt054 | MessageKind::Camt059 => 4,
            MessageKind::Pain001 | MessageKind::Pain008 | MessageKind::Pain009 | MessageKind::Pain010 => 4,
            MessageKind::Pain018 => 2,
        }
    }

    pub fn supported_versions(&self) -> Vec<u8> {
        NAMESPACES
            .iter()
            .filter(|(kind, _, _)| kind == self)
            .map(|(_, version, _)| *version)
            .collect()
    }

    /// Namespace URI of `version`.
    pub fn namespace(&self, version: u8) -> std::result::Result<&'static str, ParseError> {
        NAMESPACES
            .iter()
            .find(|(kind, v, _)| kind == self && *v == version)
            .map(|(_, _, namespace)| *namespace)
            .ok_or_else(|| ParseError::UnrecognizedVersion(format!("{}.{:02}", self.identifier(), version)))
    }

    /// Kind and version of a namespace URI.
    pub fn from_namespace(namespace: &str) -> Option<(MessageKind, u8)> {
        NAMESPACES
            .iter()
            .find(|(_, _, ns)| *ns == namespace)
            .map(|(kind, version, _)| (*kind, *version))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Element grammar of one (kind, version) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub kind: MessageKind,
    pub version: u8,
}

impl Dialect {
    /// `BIC` in older schemas, `BICFI` from the kind's 2013 maintenance release on.
    pub fn bic_element(&self) -> &'static str {
        if self.version >= self.kind.bicfi_since() {
            "BICFI"
        } else {
            "BIC"
        }
    }

    /// pain.001 from version 08 wraps the execution date in a date choice.
    pub fn wraps_execution_date(&self) -> bool {
        self.kind == MessageKind::Pain001 && self.version >= 8
    }

    /// Newer schemas nest frequency codes in a `<Tp>` choice.
    pub fn structured_frequency(&self) -> bool {
        self.version >= 4
    }

    /// Report entries carry `<Sts><Cd>` instead of a bare status code.
    pub fn coded_entry_status(&self) -> bool {
        matches!(self.kind, MessageKind::Camt053 | MessageKind::Camt054) && self.version >= 7
    }

    /// Related parties of report entries are wrapped in a `<Pty>` choice.
    pub fn wraps_related_party(&self) -> bool {
        matches!(self.kind, MessageKind::Camt053 | MessageKind::Camt054) && self.version >= 8
    }
}

/// A document renderable as ISO 20022 XML.
pub trait IsoDocument {
    fn kind(&self) -> MessageKind;

    /// Write the children of the message root element.
    fn write_body(&self, writer: &mut XmlWriter, dialect: &Dialect) -> Result<()>;

    /// Render the complete document in `version`.
    fn to_xml(&self, version: u8) -> Result<String> {
        let kind = self.kind();
        let namespace = kind.namespace(version)?;
        let dialect = Dialect { kind, version };

        let mut writer = XmlWriter::new();
        writer.declaration()?;
        writer.start_with("Document", &[("xmlns", namespace)])?;
        writer.start(kind.root_element())?;
        self.write_body(&mut writer, &dialect)?;
        writer.end(kind.root_element())?;
        writer.end("Document")?;
        debug!(%kind, version, "rendered ISO 20022 document");
        writer.finish()
    }
}

/// Any supported ISO 20022 document.
#[derive(Debug, Clone, PartialEq)]
pub enum Iso20022Document {
    ResolutionOfInvestigation(investigation::ResolutionOfInvestigation),
    CaseStatusReportRequest(investigation::CaseStatusReportRequest),
    Statement(Camt053Document),
    Notification(notification::DebitCreditNotification),
    PaymentCancellationRequest(investigation::PaymentCancellationRequest),
    NotificationStatusReport(notification::NotificationStatusReport),
    RequestToModifyPayment(investigation::RequestToModifyPayment),
    CreditTransferInitiation(payment_initiation::CreditTransferInitiation),
    DirectDebitInitiation(payment_initiation::DirectDebitInitiation),
    MandateInitiationRequest(mandate::MandateInitiationRequest),
    MandateAmendmentRequest(mandate::MandateAmendmentRequest),
    MandateSuspensionRequest(mandate::MandateSuspensionRequest),
}

impl Iso20022Document {
    fn inner(&self) -> &dyn IsoDocument {
        match self {
            Iso20022Document::ResolutionOfInvestigation(d) => d,
            Iso20022Document::CaseStatusReportRequest(d) => d,
            Iso20022Document::Statement(d) => d,
            Iso20022Document::Notification(d) => d,
            Iso20022Document::PaymentCancellationRequest(d) => d,
            Iso20022Document::NotificationStatusReport(d) => d,
            Iso20022Document::RequestToModifyPayment(d) => d,
            Iso20022Document::CreditTransferInitiation(d) => d,
            Iso20022Document::DirectDebitInitiation(d) => d,
            Iso20022Document::MandateInitiationRequest(d) => d,
            Iso20022Document::MandateAmendmentRequest(d) => d,
            Iso20022Document::MandateSuspensionRequest(d) => d,
        }
    }
}

impl IsoDocument for Iso20022Document {
    fn kind(&self) -> MessageKind {
        self.inner().kind()
    }

    fn write_body(&self, writer: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        self.inner().write_body(writer, dialect)
    }
}

/// A document with a memoized rendering.
///
/// The last rendered version is kept until the document is borrowed
/// mutably through [`CachedXml::document_mut`].
#[derive(Debug)]
pub struct CachedXml<D> {
    document: D,
    cache: Mutex<Option<(u8, String)>>,
}

impl<D: IsoDocument> CachedXml<D> {
    pub fn new(document: D) -> Self {
        Self {
            document,
            cache: Mutex::new(None),
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    /// Mutable access. Drops the cached rendering.
    pub fn document_mut(&mut self) -> &mut D {
        *self.cache.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        &mut self.document
    }

    pub fn into_inner(self) -> D {
        self.document
    }

    pub fn to_xml(&self, version: u8) -> Result<String> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((cached_version, xml)) = cache.as_ref() {
            if *cached_version == version {
                return Ok(xml.clone());
            }
        }
        let xml = self.document.to_xml(version)?;
        *cache = Some((version, xml.clone()));
        Ok(xml)
    }

    /// Whether a rendering is cached.
    pub fn is_cached(&self) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_versions() {
        for kind in MessageKind::ALL {
            let versions = kind.supported_versions();
            assert!(!versions.is_empty(), "{} has no versions", kind);
            for version in versions {
                let namespace = kind.namespace(version).unwrap();
                assert!(namespace.ends_with(&format!("{}.{:02}", kind.identifier(), version)));
                assert_eq!(MessageKind::from_namespace(namespace), Some((kind, version)));
            }
        }
    }

    #[test]
    fn test_unknown_version() {
        assert_eq!(
            MessageKind::Pain001.namespace(5),
            Err(ParseError::UnrecognizedVersion("pain.001.001.05".to_string()))
        );
    }

    #[test]
    fn test_version_grammar() {
        let old = Dialect { kind: MessageKind::Pain001, version: 3 };
        let new = Dialect { kind: MessageKind::Pain001, version: 9 };
        assert_eq!(old.bic_element(), "BIC");
        assert_eq!(new.bic_element(), "BICFI");
        assert!(!old.wraps_execution_date());
        assert!(new.wraps_execution_date());
        assert!(!Dialect { kind: MessageKind::Pain008, version: 8 }.wraps_execution_date());
    }

    fn suspension_request() -> mandate::MandateSuspensionRequest {
        let created = chrono::NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        mandate::MandateSuspensionRequest {
            header: common::GroupHeader::new("SSP-1", created),
            suspensions: vec![mandate::MandateSuspension {
                reason: common::ReasonInformation::code("MS02"),
                start: None,
                end: None,
                original_mandate_id: "MNDT-1".to_string(),
            }],
        }
    }

    #[test]
    fn test_cached_rendering() {
        let mut cached = CachedXml::new(suspension_request());
        assert!(!cached.is_cached());

        let first = cached.to_xml(4).unwrap();
        assert!(cached.is_cached());
        assert_eq!(cached.to_xml(4).unwrap(), first);

        let other = cached.to_xml(1).unwrap();
        assert!(other.contains("pain.018.001.01"));

        cached.document_mut().suspensions[0].original_mandate_id = "MNDT-2".to_string();
        assert!(!cached.is_cached());
        assert!(cached.to_xml(4).unwrap().contains("MNDT-2"));
    }

    #[test]
    fn test_document_enum_dispatch() {
        let document = Iso20022Document::MandateSuspensionRequest(suspension_request());
        assert_eq!(document.kind(), MessageKind::Pain018);
        let xml = document.to_xml(4).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<MndtSspnsnReq>"));
    }
}
