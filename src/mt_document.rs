//! Typed MT documents and dispatch on the application header's message type.

use crate::error::ParseError;
use crate::field_grammar::Field;
use crate::mt940_format::Mt940Statement;
use crate::mt_payment_format::{Mt101Request, Mt103Transfer, Mt200Transfer, Mt900Confirmation, Mt910Confirmation};
use crate::mt_report_format::{Mt920Request, Mt941Report, Mt942Report};
use crate::swift_format::{Envelope, Message};
use tracing::warn;

/// A message type that can be read from and written to block 4 fields.
pub trait MtMessage: Sized {
    /// Three-digit message type, e.g. `"940"`.
    fn message_type(&self) -> &'static str;

    fn from_fields(fields: &[Field]) -> Result<Self, ParseError>;

    fn to_fields(&self) -> Vec<Field>;

    /// Wrap the fields in a FIN message.
    fn build(&self, envelope: &Envelope) -> Message {
        envelope.wrap(MtMessage::message_type(self), MtMessage::to_fields(self))
    }
}

impl MtMessage for Mt940Statement {
    fn message_type(&self) -> &'static str {
        self.kind.message_type()
    }

    fn from_fields(fields: &[Field]) -> Result<Self, ParseError> {
        Mt940Statement::from_fields(fields)
    }

    fn to_fields(&self) -> Vec<Field> {
        Mt940Statement::to_fields(self)
    }
}

/// Any supported MT message.
#[derive(Debug, Clone, PartialEq)]
pub enum MtDocument {
    /// MT940 or MT950.
    Statement(Mt940Statement),
    BalanceReport(Mt941Report),
    InterimReport(Mt942Report),
    StatementRequest(Mt920Request),
    DebitConfirmation(Mt900Confirmation),
    CreditConfirmation(Mt910Confirmation),
    RequestForTransfer(Mt101Request),
    CustomerTransfer(Mt103Transfer),
    InstitutionTransfer(Mt200Transfer),
}

impl MtDocument {
    /// Decode a FIN message and read its typed document.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        Self::from_message(&Message::decode(raw)?)
    }

    pub fn from_message(message: &Message) -> Result<Self, ParseError> {
        for unrecognized in message.unrecognized_tags() {
            warn!(%unrecognized, "message carries a tag outside its type");
        }

        let fields = message.text.fields.as_slice();
        let document = match message.message_type() {
            "940" | "950" => MtDocument::Statement(Mt940Statement::from_message(message)?),
            "941" => MtDocument::BalanceReport(Mt941Report::from_fields(fields)?),
            "942" => MtDocument::InterimReport(Mt942Report::from_fields(fields)?),
            "920" => MtDocument::StatementRequest(Mt920Request::from_fields(fields)?),
            "900" => MtDocument::DebitConfirmation(Mt900Confirmation::from_fields(fields)?),
            "910" => MtDocument::CreditConfirmation(Mt910Confirmation::from_fields(fields)?),
            "101" => MtDocument::RequestForTransfer(Mt101Request::from_fields(fields)?),
            "103" => MtDocument::CustomerTransfer(Mt103Transfer::from_fields(fields)?),
            "200" => MtDocument::InstitutionTransfer(Mt200Transfer::from_fields(fields)?),
            other => return Err(ParseError::UnrecognizedVersion(format!("MT{}", other))),
        };
        Ok(document)
    }

    pub fn message_type(&self) -> &'static str {
        self.as_message().message_type()
    }

    /// Encode the document inside `envelope`.
    pub fn to_message(&self, envelope: &Envelope) -> Message {
        self.as_message().build(envelope)
    }

    fn as_message(&self) -> &dyn DynMessage {
        match self {
            MtDocument::Statement(d) => d,
            MtDocument::BalanceReport(d) => d,
            MtDocument::InterimReport(d) => d,
            MtDocument::StatementRequest(d) => d,
            MtDocument::DebitConfirmation(d) => d,
            MtDocument::CreditConfirmation(d) => d,
            MtDocument::RequestForTransfer(d) => d,
            MtDocument::CustomerTransfer(d) => d,
            MtDocument::InstitutionTransfer(d) => d,
        }
    }

    /// The statement, when this is an MT940 or MT950.
    pub fn as_statement(&self) -> Option<&Mt940Statement> {
        match self {
            MtDocument::Statement(statement) => Some(statement),
            _ => None,
        }
    }
}

impl From<Mt940Statement> for MtDocument {
    fn from(statement: Mt940Statement) -> Self {
        MtDocument::Statement(statement)
    }
}

/// Object-safe view of [`MtMessage`] for the writing side.
trait DynMessage {
    fn message_type(&self) -> &'static str;
    fn build(&self, envelope: &Envelope) -> Message;
}

impl<T: MtMessage> DynMessage for T {
    fn message_type(&self) -> &'static str {
        MtMessage::message_type(self)
    }

    fn build(&self, envelope: &Envelope) -> Message {
        MtMessage::build(self, envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt940_format::StatementKind;

    const MT103: &str = "{1:F01YPBKDEFFAXXX0000000000}{2:I103COBADEFFXXXXN}{4:\r\n:20:PAY-1\r\n:23B:CRED\r\n\
:32A:260115EUR100,\r\n:50K:JOHN DOE\r\n:59:JANE ROE\r\n:71A:OUR\r\n-}";

    #[test]
    fn test_dispatch_on_message_type() {
        let document = MtDocument::parse(MT103).unwrap();
        assert_eq!(document.message_type(), "103");
        assert!(matches!(document, MtDocument::CustomerTransfer(_)));
        assert!(document.as_statement().is_none());
    }

    #[test]
    fn test_unknown_message_type() {
        let raw = MT103.replace("I103", "I999");
        assert_eq!(
            MtDocument::parse(&raw).unwrap_err(),
            ParseError::UnrecognizedVersion("MT999".to_string())
        );
    }

    #[test]
    fn test_document_round_trip() {
        let document = MtDocument::parse(MT103).unwrap();
        let envelope = Envelope {
            receiver: "COBADEFFXXXX".to_string(),
            ..Envelope::default()
        };
        let message = document.to_message(&envelope);
        assert_eq!(message.encode(), MT103);
        assert_eq!(MtDocument::from_message(&message).unwrap(), document);
    }

    #[test]
    fn test_statement_kind_follows_message_type() {
        let raw = "{1:F01YPBKDEFFAXXX0000000000}{2:I950YPBKDEFFXXXXN}{4:\r\n:20:S\r\n:25:ACC\r\n:28C:1\r\n\
:60F:C260115EUR1,\r\n:62F:C260115EUR1,\r\n-}";
        let document = MtDocument::parse(raw).unwrap();
        assert_eq!(document.as_statement().map(|s| s.kind), Some(StatementKind::Mt950));
        assert_eq!(document.message_type(), "950");
        assert_eq!(StatementKind::from_message_type("942"), None);
    }
}
