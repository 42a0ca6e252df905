//! YP Bank Interchange Library
//!
//! Codecs for the financial interchange formats a bank back office deals
//! with, and conversion between them.
//!
//! # Supported Formats
//!
//! - **SWIFT MT**: the FIN envelope and the MT9xx/MT1xx/MT2xx messages
//!   (statements, reports, confirmations, transfers)
//! - **ISO 20022**: camt.029/038/053/054/056/059/087 and
//!   pain.001/008/009/010/018, in several schema versions each
//! - **DATEV**: fixed-field CSV exports with a versioned meta header, and
//!   ASCII bank transaction files
//!
//! # Examples
//!
//! ## Parsing an MT940 file
//!
//! ```no_run
//! use std::fs::File;
//! use ypbank_interchange::mt940_format::Mt940Statement;
//!
//! let mut file = File::open("statement.mt940")?;
//! let statement = Mt940Statement::from_read(&mut file)?;
//! println!("Statement: {}", statement.statement.transaction_reference);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Converting CAMT.053 to MT940
//!
//! ```no_run
//! use std::fs::File;
//! use ypbank_interchange::camt053_format::Camt053Document;
//! use ypbank_interchange::conversion::camt053_document_to_mt940;
//!
//! let mut input = File::open("statement.xml")?;
//! let document = Camt053Document::from_read(&mut input)?;
//!
//! let mut output = File::create("statement.mt940")?;
//! for statement in camt053_document_to_mt940(&document)? {
//!     statement.write_to(&mut output)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod field_grammar;
pub mod swift_format;
pub mod mt940_format;
pub mod mt_report_format;
pub mod mt_payment_format;
pub mod mt_document;
pub mod iso20022;
pub mod camt053_format;
pub mod datev;
pub mod conversion;

use std::str::FromStr;

// Re-export commonly used types
pub use error::{Error, ParseError, Result};
pub use iso20022::{CachedXml, Iso20022Document, IsoDocument, MessageKind};
pub use types::{Amount, Balance, BalanceSubtype, CurrencyCode, DebitCredit, Reference, Statement, Transaction};

/// Formats the converter reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// MT940 SWIFT format
    Mt940,
    /// CAMT.053 ISO 20022 XML format
    Camt053,
    /// DATEV ASCII bank transaction file (write only)
    DatevAscii,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mt940" | "mt-940" | "swift" => Ok(Format::Mt940),
            "camt053" | "camt.053" | "camt" | "xml" => Ok(Format::Camt053),
            "datev" | "datev-ascii" | "ascii" => Ok(Format::DatevAscii),
            _ => Err(Error::InvalidFormat(s.to_string())),
        }
    }
}

impl Format {
    /// Get file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Mt940 => "mt940",
            Format::Camt053 => "xml",
            Format::DatevAscii => "csv",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("mt940".parse::<Format>().unwrap(), Format::Mt940);
        assert_eq!("MT940".parse::<Format>().unwrap(), Format::Mt940);
        assert_eq!("camt.053".parse::<Format>().unwrap(), Format::Camt053);
        assert_eq!("datev".parse::<Format>().unwrap(), Format::DatevAscii);
        assert!(matches!("csv".parse::<Format>(), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(Format::Mt940.extension(), "mt940");
        assert_eq!(Format::Camt053.extension(), "xml");
        assert_eq!(Format::DatevAscii.extension(), "csv");
    }
}
