//! DATEV fixed-field CSV.
//!
//! An export is a meta header row (31 fields), a column-name row and the
//! data rows of one category, `;`-delimited with CRLF line ends. Layouts
//! are versioned and looked up through [`registry::registry`].
//!
//! ```no_run
//! use std::collections::HashMap;
//! use ypbank_interchange::datev::{registry, Category, DatevWriter, MetaHeader, RowEncoder};
//!
//! let definition = registry().meta_header_for(Category::BookingBatch, 700)?;
//! let header = MetaHeader::new(definition, HashMap::new())?;
//! let encoder = RowEncoder::for_category(700, Category::BookingBatch)?;
//!
//! let mut writer = DatevWriter::new(std::io::stdout());
//! writer.write_meta_header(&header)?;
//! writer.write_column_names(encoder.fields())?;
//! writer.flush()?;
//! # Ok::<(), ypbank_interchange::Error>(())
//! ```

pub mod bank_transactions;
pub mod columns;
pub mod encoder;
pub mod fields;
pub mod flags;
pub mod meta_header;
pub mod registry;
pub mod v510;
pub mod v700;

pub use columns::{ColumnPolicy, ColumnWidthConfig, TruncationStrategy};
pub use encoder::{CsvRow, RowEncoder};
pub use fields::{FieldDef, FieldKind};
pub use flags::{BinaryFlag, Fixation, InterestLock, ItemLock, LockFlag};
pub use meta_header::{MetaHeader, MetaHeaderDefinition};
pub use registry::{registry, VersionRegistry};

use crate::error::{Error, Result};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use tracing::{debug, warn};

pub const DELIMITER: u8 = b';';

/// Data category of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// `Buchungsstapel`, category 21.
    BookingBatch,
    /// `Kontenbeschriftungen`, category 20.
    AccountLabels,
    /// ASCII bank transaction file. Has no meta header.
    BankTransactions,
}

impl Category {
    /// Category number of the meta header.
    pub fn id(&self) -> Option<u8> {
        match self {
            Category::BookingBatch => Some(21),
            Category::AccountLabels => Some(20),
            Category::BankTransactions => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::BookingBatch => "Buchungsstapel",
            Category::AccountLabels => "Kontenbeschriftungen",
            Category::BankTransactions => "ASCII-Bankumsätze",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Writes encoded rows. Cells are written as they are; enclosure is the
/// encoder's job.
pub struct DatevWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> DatevWriter<W> {
    pub fn new(writer: W) -> Self {
        let inner = WriterBuilder::new()
            .delimiter(DELIMITER)
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::CRLF)
            .flexible(true)
            .from_writer(writer);
        Self { inner }
    }

    pub fn write_meta_header(&mut self, header: &MetaHeader) -> Result<()> {
        self.write_row(&header.encode()?)
    }

    /// Column-name row, labels in ordinal order.
    pub fn write_column_names(&mut self, fields: &[FieldDef]) -> Result<()> {
        let mut fields = fields.to_vec();
        fields.sort_by_key(|field| field.ordinal);
        self.inner.write_record(fields.iter().map(|field| field.label))?;
        Ok(())
    }

    pub fn write_row(&mut self, row: &CsvRow) -> Result<()> {
        self.inner.write_record(row.cells())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Write a complete export: meta header, column names and one row per value
/// map, encoded with the column policy of the header's version.
pub fn write_export<W: Write>(writer: W, header: &MetaHeader, rows: &[HashMap<String, String>]) -> Result<()> {
    let encoder = RowEncoder::for_category(header.version(), header.category())?;
    write_export_with(writer, header, &encoder, rows)
}

pub fn write_export_with<W: Write>(
    writer: W,
    header: &MetaHeader,
    encoder: &RowEncoder,
    rows: &[HashMap<String, String>],
) -> Result<()> {
    // Encode everything first so a rejected value leaves no partial output.
    let encoded = rows
        .iter()
        .map(|values| encoder.build_row(values))
        .collect::<Result<Vec<_>>>()?;

    let mut writer = DatevWriter::new(writer);
    writer.write_meta_header(header)?;
    writer.write_column_names(encoder.fields())?;
    for row in &encoded {
        writer.write_row(row)?;
    }
    writer.flush()?;
    debug!(rows = encoded.len(), category = %header.category(), version = header.version(), "wrote DATEV export");
    Ok(())
}

/// A read export. Data rows are keyed by field key; empty cells are absent.
#[derive(Debug, Clone)]
pub struct DatevExport {
    pub header: MetaHeader,
    pub rows: Vec<HashMap<String, String>>,
}

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.delimiter(DELIMITER).has_headers(false).flexible(true);
    builder
}

fn record_cells(record: &StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}

/// Map the cells of a data row to field keys.
fn row_values(fields: &[FieldDef], record: &StringRecord) -> HashMap<String, String> {
    if record.len() > fields.len() {
        warn!(cells = record.len(), fields = fields.len(), "ignoring surplus DATEV cells");
    }
    fields
        .iter()
        .zip(record.iter())
        .filter(|(_, cell)| !cell.is_empty())
        .map(|(field, cell)| (field.key.to_string(), cell.to_string()))
        .collect()
}

/// Detect version and category from the first row and rebuild the header.
fn header_from_record(record: &StringRecord) -> Result<MetaHeader> {
    let cell = |index: usize, name: &str| {
        record
            .get(index)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::validation(name, "missing in meta header"))
    };
    let version: u16 = cell(1, "Versionsnummer")?
        .parse()
        .map_err(|_| Error::validation("Versionsnummer", "not a number"))?;
    let id: u8 = cell(2, "Formatkategorie")?
        .parse()
        .map_err(|_| Error::validation("Formatkategorie", "not a number"))?;

    let category = registry().category_for_id(id, version)?;
    let definition = registry().meta_header_for(category, version)?;
    MetaHeader::from_cells(definition, &record_cells(record))
}

/// Read only the meta header of an export.
pub fn read_meta_header<R: Read>(reader: R) -> Result<MetaHeader> {
    let mut records = reader_builder().from_reader(reader).into_records();
    let record = records
        .next()
        .ok_or_else(|| Error::validation("meta header", "empty input"))??;
    header_from_record(&record)
}

/// Reads whole exports back into value maps.
pub struct DatevReader<R: Read> {
    inner: csv::Reader<R>,
}

impl<R: Read> DatevReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: reader_builder().from_reader(reader),
        }
    }

    /// Meta header, column names, then data rows in the detected layout.
    pub fn read_export(mut self) -> Result<DatevExport> {
        let mut records = self.inner.records();
        let first = records
            .next()
            .ok_or_else(|| Error::validation("meta header", "empty input"))??;
        let header = header_from_record(&first)?;
        let fields = registry().format_enum_for(header.category(), header.version())?;

        // Column names are positional and not checked.
        records.next().transpose()?;

        let rows = records
            .map(|record| Ok(row_values(fields, &record?)))
            .collect::<Result<Vec<_>>>()?;
        debug!(rows = rows.len(), category = %header.category(), version = header.version(), "read DATEV export");
        Ok(DatevExport { header, rows })
    }

    /// Header-less rows laid out as `fields`, e.g. ASCII bank transactions.
    pub fn read_rows(mut self, fields: &[FieldDef]) -> Result<Vec<HashMap<String, String>>> {
        self.inner
            .records()
            .map(|record| Ok(row_values(fields, &record?)))
            .collect()
    }
}
