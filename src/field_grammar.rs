//! Tag-value and subfield grammar shared by every MT message.
//!
//! The functions here know nothing about message types. They turn tag text
//! into [`Field`]s and decompose the recurring SWIFT value formats (dates,
//! amounts, balances, party fields, `:86:` narratives) into typed values.

use crate::error::ParseError;
use crate::types::{
    Amount, Balance, BalanceSubtype, Counterparty, CurrencyCode, DebitCredit, Reference,
};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Maximum characters per narrative line and lines per `:86:` field.
const NARRATIVE_LINE_WIDTH: usize = 65;
const NARRATIVE_MAX_LINES: usize = 6;

/// A `(tag, value)` pair from an MT text block. Multi-line values keep their
/// line breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub tag: String,
    pub value: String,
}

impl Field {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }

    /// Value lines without their line terminators.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.value.split('\n').map(|line| line.trim_end_matches('\r'))
    }

    /// Option letter of the tag (`F` for `60F`), if any.
    pub fn option(&self) -> Option<char> {
        self.tag.chars().nth(2).filter(char::is_ascii_alphabetic)
    }
}

/// Recognize a `:NN:` or `:NNa:` tag at the start of a line.
///
/// Returns the tag and the length of the prefix including both colons.
pub fn tag_prefix(line: &str) -> Option<(&str, usize)> {
    let bytes = line.as_bytes();
    if bytes.len() < 4 || bytes[0] != b':' || !bytes[1].is_ascii_digit() || !bytes[2].is_ascii_digit() {
        return None;
    }
    if bytes[3] == b':' {
        return Some((&line[1..3], 4));
    }
    if bytes.len() >= 5 && bytes[3].is_ascii_alphabetic() && bytes[4] == b':' {
        return Some((&line[1..4], 5));
    }
    None
}

/// Split bare tag text (no `{n:` envelope) into fields.
///
/// Lines before the first tag are skipped, and `-` lines end the current
/// field so statement separators never leak into values.
pub fn tokenize(text: &str) -> Vec<Field> {
    let mut fields: Vec<Field> = Vec::new();
    let mut open = false;

    for line in text.lines() {
        if let Some((tag, prefix)) = tag_prefix(line) {
            fields.push(Field::new(tag, &line[prefix..]));
            open = true;
            continue;
        }

        let trimmed = line.trim();
        if trimmed == "-" || trimmed == "-}" {
            open = false;
        } else if open {
            if let Some(last) = fields.last_mut() {
                last.value.push('\n');
                last.value.push_str(line);
            }
        } else if !trimmed.is_empty() {
            debug!(line = trimmed, "skipping text outside of a tag");
        }
    }

    fields
}

/// First field with `tag`.
pub(crate) fn find_field<'a>(fields: &'a [Field], tag: &str) -> Option<&'a Field> {
    fields.iter().find(|f| f.tag == tag)
}

/// First field with `tag`, or `MissingField`.
pub(crate) fn require_field<'a>(fields: &'a [Field], tag: &str) -> Result<&'a Field, ParseError> {
    find_field(fields, tag).ok_or_else(|| ParseError::missing(tag))
}

/// First field whose tag is `number` with any option letter (`52` matches `52A`, `52D`).
pub(crate) fn find_party<'a>(fields: &'a [Field], number: &str) -> Option<&'a Field> {
    fields.iter().find(|f| is_party_tag(&f.tag, number))
}

pub(crate) fn is_party_tag(tag: &str, number: &str) -> bool {
    tag.strip_prefix(number)
        .is_some_and(|option| option.is_empty() || (option.len() == 1 && option.bytes().all(|b| b.is_ascii_uppercase())))
}

/// Value lines joined with `\n`, trimmed.
pub(crate) fn text_value(field: &Field) -> String {
    field.lines().collect::<Vec<_>>().join("\n").trim().to_string()
}

fn digits(tag: &str, s: &str, what: &str) -> Result<u32, ParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::invalid(tag, format!("{} '{}' is not numeric", what, s)));
    }
    s.parse::<u32>()
        .map_err(|_| ParseError::invalid(tag, format!("{} '{}' out of range", what, s)))
}

fn slice<'a>(tag: &str, s: &'a str, range: std::ops::Range<usize>, what: &str) -> Result<&'a str, ParseError> {
    s.get(range)
        .ok_or_else(|| ParseError::invalid(tag, format!("{} missing in '{}'", what, s)))
}

/// Parse a `YYMMDD` date. Years below 50 are 20xx.
pub fn parse_date(tag: &str, s: &str) -> Result<NaiveDate, ParseError> {
    if s.len() != 6 || !s.is_ascii() {
        return Err(ParseError::invalid(tag, format!("date '{}' must be YYMMDD", s)));
    }
    let year = digits(tag, &s[0..2], "year")? as i32;
    let month = digits(tag, &s[2..4], "month")?;
    let day = digits(tag, &s[4..6], "day")?;
    let full_year = if year < 50 { 2000 + year } else { 1900 + year };

    NaiveDate::from_ymd_opt(full_year, month, day)
        .ok_or_else(|| ParseError::invalid(tag, format!("{} is not a calendar date", s)))
}

/// Parse an `MMDD` entry date next to its value date.
///
/// Entry and value date may straddle a year end, so December entries of a
/// January value date belong to the previous year and vice versa.
pub fn parse_entry_date(tag: &str, s: &str, value_date: NaiveDate) -> Result<NaiveDate, ParseError> {
    if s.len() != 4 || !s.is_ascii() {
        return Err(ParseError::invalid(tag, format!("entry date '{}' must be MMDD", s)));
    }
    let month = digits(tag, &s[0..2], "month")?;
    let day = digits(tag, &s[2..4], "day")?;
    let year = match (value_date.month(), month) {
        (12, 1) => value_date.year() + 1,
        (1, 12) => value_date.year() - 1,
        _ => value_date.year(),
    };

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ParseError::invalid(tag, format!("{} is not a calendar date", s)))
}

/// Format NaiveDate to MT format (YYMMDD).
pub fn format_date(date: &NaiveDate) -> String {
    format!("{:02}{:02}{:02}", date.year() % 100, date.month(), date.day())
}

/// Format the MMDD entry date.
pub fn format_entry_date(date: &NaiveDate) -> String {
    format!("{:02}{:02}", date.month(), date.day())
}

pub fn parse_currency(tag: &str, s: &str) -> Result<CurrencyCode, ParseError> {
    s.parse()
        .map_err(|_| ParseError::invalid(tag, format!("currency '{}' is not ISO 4217", s)))
}

/// Parse a SWIFT amount (`1234,56`).
pub fn parse_amount(tag: &str, s: &str) -> Result<Amount, ParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit() || b == b',') || s.matches(',').count() > 1 {
        return Err(ParseError::invalid(tag, format!("amount '{}' is not a SWIFT decimal", s)));
    }
    s.parse()
        .map_err(|_| ParseError::invalid(tag, format!("amount '{}' is not a SWIFT decimal", s)))
}

/// Format an amount with a comma decimal separator. Whole amounts keep the
/// trailing comma SWIFT requires (`100,`).
pub fn format_amount(amount: &Amount) -> String {
    let text = amount.value().to_string();
    if text.contains('.') {
        text.replace('.', ",")
    } else {
        format!("{},", text)
    }
}

/// Length of the leading amount (digits and comma) of `s`.
pub(crate) fn amount_len(s: &str) -> usize {
    s.find(|c: char| !(c.is_ascii_digit() || c == ','))
        .unwrap_or(s.len())
}

fn parse_mark(tag: &str, s: &str) -> Result<DebitCredit, ParseError> {
    match s {
        "C" => Ok(DebitCredit::Credit),
        "D" => Ok(DebitCredit::Debit),
        other => Err(ParseError::invalid(tag, format!("balance mark '{}' must be C or D", other))),
    }
}

/// Balance subtype implied by a balance tag.
pub fn balance_subtype(tag: &str) -> Option<BalanceSubtype> {
    match tag {
        "60F" => Some(BalanceSubtype::OpeningBooked),
        "62F" => Some(BalanceSubtype::ClosingBooked),
        "60M" | "62M" => Some(BalanceSubtype::InterimBooked),
        "64" => Some(BalanceSubtype::ClosingAvailable),
        "65" => Some(BalanceSubtype::ForwardAvailable),
        _ => None,
    }
}

/// Parse a balance value: mark, `YYMMDD`, currency, amount (`C250218EUR1000,00`).
pub fn parse_balance(field: &Field, subtype: BalanceSubtype) -> Result<Balance, ParseError> {
    let tag = field.tag.as_str();
    let value = field.value.trim();
    if value.len() < 11 {
        return Err(ParseError::invalid(tag, format!("balance '{}' is too short", value)));
    }
    let mark = parse_mark(tag, slice(tag, value, 0..1, "mark")?)?;
    let date = parse_date(tag, slice(tag, value, 1..7, "date")?)?;
    let currency = parse_currency(tag, slice(tag, value, 7..10, "currency")?)?;
    let amount = parse_amount(tag, value.get(10..).unwrap_or(""))?;

    Ok(Balance::new(subtype, mark, date, currency, amount))
}

pub fn format_balance(balance: &Balance) -> String {
    format!(
        "{}{}{}{}",
        balance.mark.as_mt(),
        format_date(&balance.date),
        balance.currency,
        format_amount(&balance.amount)
    )
}

/// `:32A:` value date, currency and amount.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDateAmount {
    pub date: NaiveDate,
    pub currency: CurrencyCode,
    pub amount: Amount,
}

impl ValueDateAmount {
    pub fn parse(field: &Field) -> Result<Self, ParseError> {
        let tag = field.tag.as_str();
        let value = field.value.trim();
        let date = parse_date(tag, slice(tag, value, 0..6, "value date")?)?;
        let CurrencyAmount { currency, amount } = CurrencyAmount::parse_str(tag, value.get(6..).unwrap_or(""))?;
        Ok(Self { date, currency, amount })
    }

    pub fn format(&self) -> String {
        format!("{}{}{}", format_date(&self.date), self.currency, format_amount(&self.amount))
    }
}

/// `:32B:`/`:33B:` currency and amount.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyAmount {
    pub currency: CurrencyCode,
    pub amount: Amount,
}

impl CurrencyAmount {
    pub fn parse(field: &Field) -> Result<Self, ParseError> {
        Self::parse_str(&field.tag, field.value.trim())
    }

    fn parse_str(tag: &str, value: &str) -> Result<Self, ParseError> {
        let currency = parse_currency(tag, slice(tag, value, 0..3, "currency")?)?;
        let amount = parse_amount(tag, value.get(3..).unwrap_or(""))?;
        Ok(Self { currency, amount })
    }

    pub fn format(&self) -> String {
        format!("{}{}", self.currency, format_amount(&self.amount))
    }
}

/// `:34F:` floor limit. Without a mark the limit applies to both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct FloorLimit {
    pub currency: CurrencyCode,
    pub mark: Option<DebitCredit>,
    pub amount: Amount,
}

impl FloorLimit {
    pub fn parse(field: &Field) -> Result<Self, ParseError> {
        let tag = field.tag.as_str();
        let value = field.value.trim();
        let currency = parse_currency(tag, slice(tag, value, 0..3, "currency")?)?;
        let rest = &value[3..];
        let (mark, amount) = match rest.chars().next() {
            Some('D') => (Some(DebitCredit::Debit), &rest[1..]),
            Some('C') => (Some(DebitCredit::Credit), &rest[1..]),
            _ => (None, rest),
        };
        Ok(Self {
            currency,
            mark,
            amount: parse_amount(tag, amount)?,
        })
    }

    pub fn format(&self) -> String {
        let mark = self.mark.map(|m| m.as_mt()).unwrap_or("");
        format!("{}{}{}", self.currency, mark, format_amount(&self.amount))
    }
}

/// `:90D:`/`:90C:` number and sum of entries.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySummary {
    pub count: u32,
    pub currency: CurrencyCode,
    pub amount: Amount,
}

impl EntrySummary {
    pub fn parse(field: &Field) -> Result<Self, ParseError> {
        let tag = field.tag.as_str();
        let value = field.value.trim();
        let count_len = value
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ParseError::invalid(tag, "entry count without currency"))?;
        let count = digits(tag, &value[..count_len], "entry count")?;
        let CurrencyAmount { currency, amount } = CurrencyAmount::parse_str(tag, &value[count_len..])?;
        Ok(Self { count, currency, amount })
    }

    pub fn format(&self) -> String {
        format!("{}{}{}", self.count, self.currency, format_amount(&self.amount))
    }
}

/// Parse `:13D:` (`YYMMDDHHMM+HHMM`).
pub fn parse_date_time(field: &Field) -> Result<DateTime<FixedOffset>, ParseError> {
    let tag = field.tag.as_str();
    let value = field.value.trim();
    if value.len() != 15 || !value.is_ascii() {
        return Err(ParseError::invalid(tag, format!("date time '{}' must be YYMMDDHHMM+HHMM", value)));
    }
    let date = parse_date(tag, &value[0..6])?;
    let hour = digits(tag, &value[6..8], "hour")?;
    let minute = digits(tag, &value[8..10], "minute")?;
    let sign = match &value[10..11] {
        "+" => 1,
        "-" => -1,
        other => return Err(ParseError::invalid(tag, format!("offset sign '{}'", other))),
    };
    let offset_seconds = (digits(tag, &value[11..13], "offset hours")? * 3600
        + digits(tag, &value[13..15], "offset minutes")? * 60) as i32;
    let offset = FixedOffset::east_opt(sign * offset_seconds)
        .ok_or_else(|| ParseError::invalid(tag, "offset out of range"))?;
    let local = date
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| ParseError::invalid(tag, "time out of range"))?;

    offset
        .from_local_datetime(&local)
        .single()
        .ok_or_else(|| ParseError::invalid(tag, "ambiguous local time"))
}

pub fn format_date_time(value: &DateTime<FixedOffset>) -> String {
    let offset = value.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "{}{}{}{:02}{:02}",
        format_date(&value.date_naive()),
        value.format("%H%M"),
        sign,
        offset / 3600,
        (offset % 3600) / 60
    )
}

/// A party or institution field (`:50a:`, `:52a:`, `:57a:`, `:59a:`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartyField {
    /// Option letter of the tag, `None` for the letterless `:59:`.
    pub option: Option<char>,
    /// Account or party identifier from a leading `/` line.
    pub account: Option<String>,
    /// Identifier code (option A).
    pub bic: Option<String>,
    /// Name and address, or option-specific lines.
    pub lines: Vec<String>,
}

impl PartyField {
    pub fn parse(field: &Field) -> Self {
        let option = field.option();
        let mut lines: Vec<String> = field.lines().map(str::to_string).collect();
        let account = match lines.first() {
            Some(first) if first.starts_with('/') => Some(lines.remove(0)[1..].to_string()),
            _ => None,
        };
        let bic = if option == Some('A') && !lines.is_empty() {
            Some(lines.remove(0))
        } else {
            None
        };
        Self {
            option,
            account,
            bic,
            lines,
        }
    }

    /// Tag for this party given its field number, e.g. `50` → `50K`.
    pub fn tag(&self, number: &str) -> String {
        match self.option {
            Some(option) => format!("{}{}", number, option),
            None => number.to_string(),
        }
    }

    pub fn to_value(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        if let Some(account) = &self.account {
            lines.push(format!("/{}", account));
        }
        if let Some(bic) = &self.bic {
            lines.push(bic.clone());
        }
        lines.extend(self.lines.iter().cloned());
        lines.join("\r\n")
    }

    /// First name line, if any.
    pub fn name(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }
}

/// Decomposed `:86:` information to account owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Narrative {
    pub reference: Reference,
    pub purpose: String,
    pub business_code: Option<String>,
    pub posting_text: Option<String>,
    pub counterparty: Counterparty,
}

static CODEWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)(EREF|MREF|CRED|KREF|SVWZ|ABWA|ABWE|IBAN|BIC|DEBT|COAM|OAMT)\+")
        .expect("codeword pattern is valid")
});

static STRUCTURED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{3}\?").expect("structured narrative pattern is valid"));

static SUBFIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?(\d{2})").expect("subfield pattern is valid"));

static LEADING_CODEWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{3,4}\+").expect("codeword prefix pattern is valid"));

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Decompose an `:86:` value.
///
/// Both the free codeword layout (`EREF+… MREF+…`) and the German structured
/// layout (`166?00…?20EREF+…?30BIC?31IBAN?32Name`) are understood. SEPA
/// codewords fill the [`Reference`]; `SVWZ+` and anything not claimed by a
/// codeword becomes purpose text.
pub fn parse_narrative(value: &str) -> Narrative {
    let lines: Vec<&str> = value.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    let joined = lines.concat();

    if STRUCTURED.is_match(&joined) {
        parse_structured_narrative(&joined)
    } else {
        let text = join_narrative_lines(&lines);
        let mut narrative = Narrative::default();
        apply_codewords(&text, &mut narrative);
        narrative
    }
}

/// A full-width line was split inside a word and continues on the next
/// line as is, unless that line opens a codeword. Shorter lines end at a
/// word boundary.
fn join_narrative_lines(lines: &[&str]) -> String {
    let mut text = String::new();
    let mut previous_full = false;
    for line in lines {
        if previous_full && !LEADING_CODEWORD.is_match(line) {
            text.push_str(line.trim_end());
        } else {
            let line = line.trim();
            if !text.is_empty() && !line.is_empty() {
                text.push(' ');
            }
            text.push_str(line);
        }
        previous_full = line.chars().count() >= NARRATIVE_LINE_WIDTH;
    }
    text
}

fn parse_structured_narrative(joined: &str) -> Narrative {
    let mut narrative = Narrative {
        business_code: Some(joined[..3].to_string()),
        ..Narrative::default()
    };

    let body = &joined[3..];
    let markers: Vec<(usize, usize, &str)> = SUBFIELD
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let code = caps.get(1)?;
            Some((whole.start(), whole.end(), code.as_str()))
        })
        .collect();

    let mut sepa_text = String::new();
    let mut name = String::new();
    for (i, &(_, content_start, code)) in markers.iter().enumerate() {
        let content_end = markers.get(i + 1).map(|m| m.0).unwrap_or(body.len());
        let content = &body[content_start..content_end];
        match code.parse::<u8>().unwrap_or(u8::MAX) {
            0 => narrative.posting_text = non_empty(content),
            20..=29 | 60..=63 => {
                if !sepa_text.is_empty() && LEADING_CODEWORD.is_match(content) {
                    sepa_text.push(' ');
                }
                sepa_text.push_str(content);
            }
            30 => narrative.counterparty.bic = non_empty(content),
            31 => narrative.counterparty.iban = non_empty(content),
            32 | 33 => name.push_str(content),
            _ => debug!(code, "ignoring narrative subfield"),
        }
    }
    narrative.counterparty.name = non_empty(&name);
    apply_codewords(&sepa_text, &mut narrative);
    narrative
}

fn apply_codewords(text: &str, narrative: &mut Narrative) {
    let matches: Vec<(usize, usize, &str)> = CODEWORD
        .captures_iter(text)
        .filter_map(|caps| {
            let code = caps.get(1)?;
            Some((code.start(), caps.get(0)?.end(), code.as_str()))
        })
        .collect();

    let mut purpose: Vec<String> = Vec::new();
    let head_end = matches.first().map(|m| m.0).unwrap_or(text.len());
    if let Some(head) = non_empty(&text[..head_end]) {
        purpose.push(head);
    }

    let mut extra: Vec<String> = Vec::new();
    for (i, &(_, value_start, code)) in matches.iter().enumerate() {
        let value_end = matches.get(i + 1).map(|m| m.0).unwrap_or(text.len());
        let Some(value) = non_empty(&text[value_start..value_end]) else {
            continue;
        };
        let reference = &mut narrative.reference;
        match code {
            "EREF" => reference.end_to_end_id = Some(value),
            "MREF" => reference.mandate_id = Some(value),
            "CRED" => reference.creditor_id = Some(value),
            "KREF" => reference.instruction_id = Some(value),
            "SVWZ" => purpose.push(value),
            "IBAN" if narrative.counterparty.iban.is_none() => narrative.counterparty.iban = Some(value),
            "BIC" if narrative.counterparty.bic.is_none() => narrative.counterparty.bic = Some(value),
            _ => extra.push(format!("{}+{}", code, value)),
        }
    }

    purpose.extend(extra);
    narrative.purpose = purpose.join(" ");
}

/// Render references and purpose as codeword narrative, wrapped to the
/// `:86:` line limits.
pub fn format_narrative(reference: &Reference, purpose: &str, counterparty: &Counterparty) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let coded = [
        ("EREF", &reference.end_to_end_id),
        ("MREF", &reference.mandate_id),
        ("CRED", &reference.creditor_id),
        ("KREF", &reference.instruction_id),
    ];
    for (code, value) in coded {
        if let Some(value) = value {
            tokens.push(format!("{}+{}", code, value));
        }
    }
    if !purpose.trim().is_empty() {
        tokens.push(format!("SVWZ+{}", purpose.trim()));
    }
    if let Some(iban) = &counterparty.iban {
        tokens.push(format!("IBAN+{}", iban));
    }
    if let Some(bic) = &counterparty.bic {
        tokens.push(format!("BIC+{}", bic));
    }

    wrap_narrative(&tokens.join(" ")).join("\r\n")
}

/// Word wrap for `:86:` that [`join_narrative_lines`] reads back exactly.
///
/// Only lines split inside a word reach the full width. A word that follows
/// a full line starts with a space.
fn wrap_narrative(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let current_len = current.chars().count();
        if !current.is_empty() && current_len + 1 + word.chars().count() <= NARRATIVE_LINE_WIDTH {
            current.push(' ');
            current.push_str(word);
            continue;
        }

        let mut chars: Vec<char> = word.chars().collect();
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            if current_len >= NARRATIVE_LINE_WIDTH {
                chars.insert(0, ' ');
            }
        }
        while chars.len() > NARRATIVE_LINE_WIDTH {
            lines.push(chars.drain(..NARRATIVE_LINE_WIDTH).collect());
        }
        current = chars.into_iter().collect();
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > NARRATIVE_MAX_LINES {
        debug!(lines = lines.len(), max_lines = NARRATIVE_MAX_LINES, "narrative truncated");
        lines.truncate(NARRATIVE_MAX_LINES);
    }
    lines
}

/// Greedy word wrap. Words longer than a line are split.
pub(crate) fn wrap_lines(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }
        if current.is_empty() {
            current = word;
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(&word);
        } else {
            lines.push(std::mem::replace(&mut current, word));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        debug!(lines = lines.len(), max_lines, "narrative truncated");
        lines.truncate(max_lines);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_tag_prefix() {
        assert_eq!(tag_prefix(":20:REF"), Some(("20", 4)));
        assert_eq!(tag_prefix(":60F:C"), Some(("60F", 5)));
        assert_eq!(tag_prefix(":2:X"), None);
        assert_eq!(tag_prefix("20:X"), None);
        assert_eq!(tag_prefix(":ABC:"), None);
    }

    #[test]
    fn test_tokenize_multiline_and_separators() {
        let text = "preamble\r\n:20:REF\r\n:86:line one\r\nline two\r\n-\r\n:20:NEXT\r\n";
        let fields = tokenize(text);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1], Field::new("86", "line one\nline two"));
        assert_eq!(fields[2].value, "NEXT");
    }

    #[test]
    fn test_parse_mt_date() {
        let date = parse_date("61", "250218").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2025, 2, 18));
        assert_eq!(parse_date("61", "990101").unwrap().year(), 1999);
        assert!(parse_date("61", "251340").is_err());
    }

    #[test]
    fn test_entry_date_year_rollover() {
        let value = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert_eq!(
            parse_entry_date("61", "0102", value).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()
        );
        let value = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(
            parse_entry_date("61", "1231", value).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_amount_formatting() {
        assert_eq!(format_amount(&"500,00".parse().unwrap()), "500,00");
        assert_eq!(format_amount(&"100,".parse().unwrap()), "100,");
        assert!(parse_amount("61", "1.5").is_err());
        assert!(parse_amount("61", "1,5,0").is_err());
    }

    #[test]
    fn test_balance_field() {
        let field = Field::new("60F", "C250218EUR2732398848,02");
        let balance = parse_balance(&field, BalanceSubtype::OpeningBooked).unwrap();
        assert_eq!(balance.mark, DebitCredit::Credit);
        assert_eq!(balance.currency.as_str(), "EUR");
        assert_eq!(balance.amount.value(), Decimal::new(273239884802, 2));
        assert_eq!(format_balance(&balance), "C250218EUR2732398848,02");
        assert!(parse_balance(&Field::new("60F", "X250218EUR1,"), BalanceSubtype::OpeningBooked).is_err());
    }

    #[test]
    fn test_sub_formats() {
        let limit = FloorLimit::parse(&Field::new("34F", "EURD100,")).unwrap();
        assert_eq!(limit.mark, Some(DebitCredit::Debit));
        assert_eq!(limit.format(), "EURD100,");

        let summary = EntrySummary::parse(&Field::new("90C", "3EUR1500,00")).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.format(), "3EUR1500,00");

        let value = ValueDateAmount::parse(&Field::new("32A", "260115EUR1000,")).unwrap();
        assert_eq!(value.date, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert_eq!(value.format(), "260115EUR1000,");
    }

    #[test]
    fn test_date_time_field() {
        let field = Field::new("13D", "2601151230+0100");
        let parsed = parse_date_time(&field).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 3600);
        assert_eq!(format_date_time(&parsed), "2601151230+0100");
    }

    #[test]
    fn test_party_field() {
        let party = PartyField::parse(&Field::new("59", "/DE89370400440532013000\r\nJOHN DOE\r\nBERLIN"));
        assert_eq!(party.account.as_deref(), Some("DE89370400440532013000"));
        assert_eq!(party.name(), Some("JOHN DOE"));
        assert_eq!(party.to_value(), "/DE89370400440532013000\r\nJOHN DOE\r\nBERLIN");

        let agent = PartyField::parse(&Field::new("57A", "COBADEFFXXX"));
        assert_eq!(agent.bic.as_deref(), Some("COBADEFFXXX"));
        assert_eq!(agent.tag("57"), "57A");
    }

    #[test]
    fn test_narrative_patterns_compile() {
        for pattern in [&CODEWORD, &STRUCTURED, &SUBFIELD, &LEADING_CODEWORD] {
            Lazy::force(pattern);
        }
        assert!(LEADING_CODEWORD.is_match("SVWZ+Rent"));
    }

    #[test]
    fn test_codeword_narrative() {
        let narrative = parse_narrative("EREF+E2E-9 MREF+M-7");
        assert_eq!(narrative.reference.end_to_end_id.as_deref(), Some("E2E-9"));
        assert_eq!(narrative.reference.mandate_id.as_deref(), Some("M-7"));
        assert!(narrative.purpose.is_empty());

        let narrative = parse_narrative("Invoice 42 KREF+K1\r\nSVWZ+Rent March CRED+DE98ZZZ09999999999");
        assert_eq!(narrative.reference.instruction_id.as_deref(), Some("K1"));
        assert_eq!(narrative.reference.creditor_id.as_deref(), Some("DE98ZZZ09999999999"));
        assert_eq!(narrative.purpose, "Invoice 42 Rent March");
    }

    #[test]
    fn test_structured_narrative() {
        let value = "166?00SEPA-GUTSCHRIFT?109310?20EREF+ABC123?21SVWZ+Miete Januar?22 2026\r\n?30COBADEFFXXX?31DE89370400440532013000?32MAX MUSTERMANN";
        let narrative = parse_narrative(value);
        assert_eq!(narrative.business_code.as_deref(), Some("166"));
        assert_eq!(narrative.posting_text.as_deref(), Some("SEPA-GUTSCHRIFT"));
        assert_eq!(narrative.reference.end_to_end_id.as_deref(), Some("ABC123"));
        assert_eq!(narrative.purpose, "Miete Januar 2026");
        assert_eq!(narrative.counterparty.bic.as_deref(), Some("COBADEFFXXX"));
        assert_eq!(narrative.counterparty.name.as_deref(), Some("MAX MUSTERMANN"));
    }

    #[test]
    fn test_format_narrative_round_trip() {
        let reference = Reference {
            end_to_end_id: Some("E2E-1".into()),
            mandate_id: Some("M-1".into()),
            ..Reference::default()
        };
        let text = format_narrative(&reference, "Rent March", &Counterparty::default());
        assert_eq!(text, "EREF+E2E-1 MREF+M-1 SVWZ+Rent March");

        let parsed = parse_narrative(&text);
        assert_eq!(parsed.reference, reference);
        assert_eq!(parsed.purpose, "Rent March");
    }

    #[test]
    fn test_long_codeword_value_survives_wrapping() {
        let reference = Reference {
            end_to_end_id: Some(format!("E2E-{}123", "0123456789".repeat(6))),
            mandate_id: Some("M-1".into()),
            ..Reference::default()
        };
        let text = format_narrative(&reference, "Rent March", &Counterparty::default());
        assert!(text.split("\r\n").all(|l| l.chars().count() <= NARRATIVE_LINE_WIDTH));
        assert_eq!(text.split("\r\n").count(), 2);

        let parsed = parse_narrative(&text);
        assert_eq!(parsed.reference, reference);
        assert_eq!(parsed.purpose, "Rent March");
    }

    #[test]
    fn test_word_after_full_line_keeps_its_space() {
        let purpose = format!("{} Next", "a".repeat(60));
        let text = format_narrative(&Reference::default(), &purpose, &Counterparty::default());
        assert_eq!(text, format!("SVWZ+{}\r\n Next", "a".repeat(60)));
        assert_eq!(parse_narrative(&text).purpose, purpose);
    }

    #[test]
    fn test_wrap_lines() {
        let long = "word ".repeat(40);
        let lines = wrap_lines(&long, 65, 6);
        assert!(lines.iter().all(|l| l.chars().count() <= 65));
        assert_eq!(wrap_lines(&"x".repeat(70), 65, 6), vec!["x".repeat(65), "x".repeat(5)]);
    }
}
