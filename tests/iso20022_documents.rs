use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use ypbank_interchange::camt053_format::{AccountStatement, Camt053Document, CamtEntry};
use ypbank_interchange::iso20022::common::{Account, GroupHeader};
use ypbank_interchange::{
    Amount, Balance, BalanceSubtype, CachedXml, CurrencyCode, DebitCredit, Error, Iso20022Document, IsoDocument, MessageKind,
    ParseError,
};

fn statement_document() -> Camt053Document {
    let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
    let amount = |cents| Amount::new(Decimal::new(cents, 2)).unwrap();
    let eur = || "EUR".parse::<CurrencyCode>().unwrap();

    let mut statement = AccountStatement::new("STMT-1", Account::iban("DE89370400440532013000"));
    statement.balances = vec![
        Balance::new(BalanceSubtype::OpeningBooked, DebitCredit::Credit, date, eur(), amount(100000)),
        Balance::new(BalanceSubtype::ClosingBooked, DebitCredit::Credit, date, eur(), amount(80000)),
    ];
    let mut entry = CamtEntry::new(amount(20000), eur(), DebitCredit::Debit);
    entry.booking_date = Some(date);
    entry.value_date = Some(date);
    statement.entries.push(entry);

    let created = date.and_hms_opt(18, 0, 0).unwrap();
    Camt053Document::new(GroupHeader::new("MSG-1", created), vec![statement])
}

#[test]
fn every_supported_version_round_trips() {
    let document = statement_document();
    for version in MessageKind::Camt053.supported_versions() {
        let xml = document.to_xml(version).unwrap();
        assert_eq!(Camt053Document::parse(&xml).unwrap(), document, "version {}", version);
    }
}

#[test]
fn entry_status_grammar_follows_version() {
    let document = statement_document();
    let v02 = document.to_xml(2).unwrap();
    assert!(v02.contains("<Sts>BOOK</Sts>"));
    assert!(!v02.contains("<Cd>BOOK</Cd>"));
    assert!(document.to_xml(8).unwrap().contains("<Cd>BOOK</Cd>"));
}

#[test]
fn unknown_version_is_rejected() {
    let document = Iso20022Document::Statement(statement_document());
    assert_eq!(document.kind(), MessageKind::Camt053);
    assert!(matches!(
        document.to_xml(5),
        Err(Error::Parse(ParseError::UnrecognizedVersion(_)))
    ));
}

#[test]
fn cached_rendering_is_stable() {
    let mut cached = CachedXml::new(statement_document());
    let first = cached.to_xml(4).unwrap();
    assert!(cached.is_cached());
    assert_eq!(cached.to_xml(4).unwrap(), first);

    cached.document_mut().header.message_id = "MSG-2".to_string();
    assert!(!cached.is_cached());
    assert!(cached.to_xml(4).unwrap().contains("<MsgId>MSG-2</MsgId>"));
}
