use pretty_assertions::assert_eq;
use std::collections::HashMap;
use ypbank_interchange::datev::bank_transactions::{rows_from_statement, BANK_TRANSACTION_FIELDS};
use ypbank_interchange::datev::{
    registry, write_export, write_export_with, BinaryFlag, Category, ColumnWidthConfig, DatevReader, DatevWriter, MetaHeader,
    RowEncoder,
};
use ypbank_interchange::mt940_format::Mt940Statement;
use ypbank_interchange::Error;

fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn registry_lists_versions_and_layouts() {
    let registry = registry();
    assert_eq!(registry.available_versions(), vec![510, 700]);

    let definition = registry.definition_for(700).unwrap();
    let ordinals: Vec<u8> = definition.fields.iter().map(|f| f.def.ordinal).collect();
    assert_eq!(ordinals, (1..=31).collect::<Vec<u8>>());

    assert!(matches!(registry.definition_for(999), Err(Error::NotFound(_))));
    assert!(matches!(
        registry.format_enum_for(Category::BookingBatch, 999),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn alphanumeric_cells_are_always_quoted() {
    let encoder = RowEncoder::for_category(700, Category::AccountLabels).unwrap();
    let row = encoder.build_row(&values(&[("account", "1200"), ("label", "Bank")])).unwrap();
    assert_eq!(row.cells(), &["1200", "\"Bank\"", "\"\"", "\"\""]);
}

#[test]
fn column_overrides_from_toml() {
    let config = ColumnWidthConfig::from_toml_str(
        700,
        Category::BookingBatch,
        r#"
            [columns.14]
            max_width = 10
            strategy = "reject"
        "#,
    )
    .unwrap();
    let encoder = RowEncoder::for_category(700, Category::BookingBatch)
        .unwrap()
        .with_config(config);
    let definition = registry().meta_header_for(Category::BookingBatch, 700).unwrap();
    let header = MetaHeader::new(definition, HashMap::new()).unwrap();

    let row = values(&[("amount", "10,00"), ("posting_text", "Office supplies January")]);
    let mut out = Vec::new();
    let result = write_export_with(&mut out, &header, &encoder, &[row]);
    assert!(matches!(
        result,
        Err(Error::FieldTooLong { length: 23, max: 10, .. })
    ));
    assert!(out.is_empty());

    // Other columns keep truncating.
    let long = "R".repeat(40);
    let row = values(&[("amount", "10,00"), ("document_field_1", long.as_str())]);
    let encoded = encoder.build_row(&row).unwrap();
    assert_eq!(encoded.cells()[10], format!("\"{}\"", "R".repeat(36)));

    assert!(matches!(
        ColumnWidthConfig::from_toml_str(700, Category::BookingBatch, "[columns.99]\nmax_width = 5"),
        Err(Error::Config(_))
    ));
}

#[test]
fn booking_batch_export_reads_back() {
    let definition = registry().meta_header_for(Category::BookingBatch, 700).unwrap();
    let header = MetaHeader::new(
        definition,
        values(&[("consultant", "29098"), ("client", "55003"), ("fixation", "1")]),
    )
    .unwrap();
    let rows = vec![values(&[
        ("amount", "99,90"),
        ("debit_credit", "H"),
        ("account", "1800"),
        ("contra_account", "4930"),
        ("posting_text", "Bürobedarf"),
        ("fixation", "1"),
    ])];

    let mut out = Vec::new();
    write_export(&mut out, &header, &rows).unwrap();
    let export = DatevReader::new(out.as_slice()).read_export().unwrap();

    assert_eq!(export.header.version(), 700);
    assert!(export.header.fixation().unwrap().is_locked());
    assert_eq!(export.rows, rows);
}

#[test]
fn mt940_statement_becomes_bank_transaction_file() {
    let raw = "\
:20:REF1\r\n\
:25:DE89370400440532013000\r\n\
:28C:00001/001\r\n\
:60F:C260115EUR1000,00\r\n\
:61:2601150115D500,00NDDTNONREF//BANKREF\r\n\
:86:EREF+E2E-9 MREF+M-7 SVWZ+Strom Januar\r\n\
:62F:C260115EUR500,00\r\n\
-\r\n";
    let statement = Mt940Statement::parse(raw).unwrap().statement;
    let rows = rows_from_statement(&statement).unwrap();

    let mut out = Vec::new();
    let mut writer = DatevWriter::new(&mut out);
    for row in &rows {
        writer.write_row(row).unwrap();
    }
    writer.flush().unwrap();
    drop(writer);

    let read = DatevReader::new(out.as_slice()).read_rows(&BANK_TRANSACTION_FIELDS).unwrap();
    assert_eq!(read.len(), 1);
    let row = &read[0];
    assert_eq!(row["account"], "DE89370400440532013000");
    assert_eq!(row["statement_number"], "1");
    assert_eq!(row["amount"], "-500,00");
    assert_eq!(row["purpose_1"], "Strom Januar");
    assert_eq!(row["end_to_end_id"], "E2E-9");
    assert_eq!(row["mandate_id"], "M-7");
    assert!(!row.contains_key("bank_code"));
}
