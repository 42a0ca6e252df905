//! SWIFT FIN envelope: the `{1:}{2:}{3:}{4:}{5:}` block structure.
//!
//! Decoding splits the raw text into numbered blocks by brace nesting depth,
//! parses the two fixed-grammar headers and tokenizes block 4 into ordered
//! [`Field`]s. Values are kept exactly as received so that a decoded message
//! encodes back to the same text.

use crate::error::ParseError;
use crate::field_grammar::{tag_prefix, Field};
use tracing::debug;

/// Line terminator used inside block 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Crlf => "\r\n",
            LineEnding::Lf => "\n",
        }
    }
}

/// Block 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicHeader {
    /// `F` (FIN), `A` (GPA) or `L` (login).
    pub application_id: char,
    /// `01` for user-to-user messages.
    pub service_id: String,
    /// 12-character logical terminal address.
    pub lt_address: String,
    pub session_number: String,
    pub sequence_number: String,
}

impl BasicHeader {
    fn parse(value: &str, offset: usize) -> Result<Self, ParseError> {
        let malformed = |message: &str| ParseError::MalformedBlock {
            offset,
            message: format!("basic header: {}", message),
        };
        if value.len() != 25 || !value.is_ascii() {
            return Err(malformed("expected 25 characters"));
        }
        let application_id = value.chars().next().unwrap_or_default();
        if !matches!(application_id, 'F' | 'A' | 'L') {
            return Err(malformed("application id must be F, A or L"));
        }
        let numeric = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !numeric(&value[1..3]) || !numeric(&value[15..25]) {
            return Err(malformed("service id, session and sequence must be numeric"));
        }

        Ok(Self {
            application_id,
            service_id: value[1..3].to_string(),
            lt_address: value[3..15].to_string(),
            session_number: value[15..19].to_string(),
            sequence_number: value[19..25].to_string(),
        })
    }

    fn format(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.application_id, self.service_id, self.lt_address, self.session_number, self.sequence_number
        )
    }
}

/// Block 2, in its input (sent to SWIFT) or output (delivered by SWIFT) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationHeader {
    Input {
        message_type: String,
        receiver: String,
        priority: Option<char>,
        delivery_monitoring: Option<char>,
        obsolescence_period: Option<String>,
    },
    Output {
        message_type: String,
        input_time: String,
        /// Message input reference: date, LT address, session and sequence.
        input_reference: String,
        output_date: String,
        output_time: String,
        priority: Option<char>,
    },
}

impl ApplicationHeader {
    pub fn message_type(&self) -> &str {
        match self {
            ApplicationHeader::Input { message_type, .. } | ApplicationHeader::Output { message_type, .. } => {
                message_type
            }
        }
    }

    fn parse(value: &str, offset: usize) -> Result<Self, ParseError> {
        let malformed = |message: &str| ParseError::MalformedBlock {
            offset,
            message: format!("application header: {}", message),
        };
        if value.len() < 4 || !value.is_ascii() {
            return Err(malformed("too short"));
        }
        let message_type = &value[1..4];
        if !message_type.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("message type must be three digits"));
        }

        match &value[..1] {
            "I" => {
                if !(16..=21).contains(&value.len()) {
                    return Err(malformed("input header must have 16 to 21 characters"));
                }
                let rest = &value[16..];
                let mut chars = rest.chars();
                let priority = chars.next();
                let delivery_monitoring = chars.next();
                let obsolescence: String = chars.collect();
                if delivery_monitoring.is_some_and(|c| !c.is_ascii_digit()) {
                    return Err(malformed("delivery monitoring must be a digit"));
                }
                if !obsolescence.is_empty() && obsolescence.len() != 3 {
                    return Err(malformed("obsolescence period must have 3 digits"));
                }
                Ok(ApplicationHeader::Input {
                    message_type: message_type.to_string(),
                    receiver: value[4..16].to_string(),
                    priority,
                    delivery_monitoring,
                    obsolescence_period: (!obsolescence.is_empty()).then_some(obsolescence),
                })
            }
            "O" => {
                if value.len() != 46 && value.len() != 47 {
                    return Err(malformed("output header must have 46 or 47 characters"));
                }
                Ok(ApplicationHeader::Output {
                    message_type: message_type.to_string(),
                    input_time: value[4..8].to_string(),
                    input_reference: value[8..36].to_string(),
                    output_date: value[36..42].to_string(),
                    output_time: value[42..46].to_string(),
                    priority: value[46..].chars().next(),
                })
            }
            _ => Err(malformed("direction must be I or O")),
        }
    }

    fn format(&self) -> String {
        match self {
            ApplicationHeader::Input {
                message_type,
                receiver,
                priority,
                delivery_monitoring,
                obsolescence_period,
            } => {
                let mut out = format!("I{}{}", message_type, receiver);
                out.extend(priority.iter());
                out.extend(delivery_monitoring.iter());
                if let Some(period) = obsolescence_period {
                    out.push_str(period);
                }
                out
            }
            ApplicationHeader::Output {
                message_type,
                input_time,
                input_reference,
                output_date,
                output_time,
                priority,
            } => {
                let mut out = format!("O{}{}{}{}{}", message_type, input_time, input_reference, output_date, output_time);
                out.extend(priority.iter());
                out
            }
        }
    }
}

/// Blocks 3 and 5: a sequence of `{tag:value}` sub-blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagBlock {
    pub entries: Vec<(String, String)>,
}

impl TagBlock {
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, v)| v.as_str())
    }

    fn parse(content: &str, offset: usize) -> Result<Self, ParseError> {
        let malformed = |message: String| ParseError::MalformedBlock { offset, message };
        if content.is_empty() {
            return Err(malformed("empty optional block".to_string()));
        }

        let mut entries = Vec::new();
        let mut rest = content;
        while !rest.is_empty() {
            let inner = rest
                .strip_prefix('{')
                .ok_or_else(|| malformed(format!("expected '{{' in '{}'", rest)))?;
            let end = inner
                .find('}')
                .ok_or_else(|| malformed("unterminated sub-block".to_string()))?;
            let (tag, value) = inner[..end]
                .split_once(':')
                .ok_or_else(|| malformed(format!("sub-block '{}' has no tag", &inner[..end])))?;
            entries.push((tag.to_string(), value.to_string()));
            rest = &inner[end + 1..];
        }
        Ok(Self { entries })
    }

    fn format(&self) -> String {
        self.entries
            .iter()
            .map(|(tag, value)| format!("{{{}:{}}}", tag, value))
            .collect()
    }
}

/// Block 4: ordered tag fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextBlock {
    pub fields: Vec<Field>,
    pub eol: LineEnding,
}

impl TextBlock {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            eol: LineEnding::Crlf,
        }
    }

    /// First field with this tag.
    pub fn get(&self, tag: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Tokenize block 4. A tag is recognized after any line break, and each
    /// value keeps the breaks it was received with.
    fn parse(content: &str, offset: usize) -> Result<Self, ParseError> {
        let eol = if content.starts_with("\r\n") || (!content.starts_with('\n') && content.contains("\r\n")) {
            LineEnding::Crlf
        } else {
            LineEnding::Lf
        };
        let body = content.strip_prefix(eol.as_str()).unwrap_or(content);
        let body = body.strip_suffix('-').unwrap_or(body);
        let body = body.strip_suffix('\n').unwrap_or(body);
        let body = body.strip_suffix('\r').unwrap_or(body);
        if body.is_empty() {
            return Ok(Self { fields: Vec::new(), eol });
        }

        let mut fields: Vec<Field> = Vec::new();
        let mut line_break = "";
        for segment in body.split('\n') {
            let (line, next_break) = match segment.strip_suffix('\r') {
                Some(line) => (line, "\r\n"),
                None => (segment, "\n"),
            };
            match tag_prefix(line) {
                Some((tag, prefix)) => fields.push(Field::new(tag, &line[prefix..])),
                None => {
                    let last = fields.last_mut().ok_or_else(|| ParseError::MalformedBlock {
                        offset,
                        message: format!("text block starts without a tag: '{}'", line),
                    })?;
                    last.value.push_str(line_break);
                    last.value.push_str(line);
                }
            }
            line_break = next_break;
        }
        Ok(Self { fields, eol })
    }

    fn format(&self) -> String {
        let sep = self.eol.as_str();
        let mut out = String::from(sep);
        for field in &self.fields {
            out.push(':');
            out.push_str(&field.tag);
            out.push(':');
            out.push_str(&field.value);
            out.push_str(sep);
        }
        out.push('-');
        out
    }
}

/// A decoded SWIFT FIN message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub basic: BasicHeader,
    pub application: ApplicationHeader,
    pub user: Option<TagBlock>,
    pub text: TextBlock,
    pub trailer: Option<TagBlock>,
}

struct RawBlock<'a> {
    id: u8,
    offset: usize,
    content: &'a str,
}

/// Split `raw` into top-level blocks, tracking brace depth.
fn split_blocks(raw: &str) -> Result<Vec<RawBlock<'_>>, ParseError> {
    let bytes = raw.as_bytes();
    let mut blocks = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if bytes[pos] != b'{' {
            return Err(ParseError::MalformedBlock {
                offset: pos,
                message: "text outside of a block".to_string(),
            });
        }

        let start = pos;
        let colon = raw[start..]
            .find(':')
            .map(|i| start + i)
            .ok_or_else(|| ParseError::MalformedBlock {
                offset: start,
                message: "block without identifier".to_string(),
            })?;
        let id = match &raw[start + 1..colon] {
            "1" => 1,
            "2" => 2,
            "3" => 3,
            "4" => 4,
            "5" => 5,
            other => {
                return Err(ParseError::MalformedBlock {
                    offset: start,
                    message: format!("block identifier '{}' outside 1..5", other),
                })
            }
        };

        let mut depth = 1usize;
        let mut end = None;
        for (i, b) in bytes.iter().enumerate().skip(colon + 1) {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = end.ok_or_else(|| ParseError::MalformedBlock {
            offset: start,
            message: "unbalanced braces".to_string(),
        })?;

        blocks.push(RawBlock {
            id,
            offset: start,
            content: &raw[colon + 1..end],
        });
        pos = end + 1;
    }

    Ok(blocks)
}

impl Message {
    /// Decode a single FIN message.
    pub fn decode(raw: &str) -> Result<Self, ParseError> {
        let blocks = split_blocks(raw)?;
        let mut slots: [Option<&RawBlock>; 5] = [None; 5];
        for block in &blocks {
            let slot = &mut slots[(block.id - 1) as usize];
            if slot.is_some() {
                return Err(ParseError::MalformedBlock {
                    offset: block.offset,
                    message: format!("block {} repeats", block.id),
                });
            }
            *slot = Some(block);
        }

        let required = |id: usize| {
            slots[id - 1].ok_or_else(|| ParseError::MissingMandatoryBlock(format!("{{{}:", id)))
        };
        let basic = required(1)?;
        let application = required(2)?;
        let text = required(4)?;

        let message = Message {
            basic: BasicHeader::parse(basic.content, basic.offset)?,
            application: ApplicationHeader::parse(application.content, application.offset)?,
            user: slots[2].map(|b| TagBlock::parse(b.content, b.offset)).transpose()?,
            text: TextBlock::parse(text.content, text.offset)?,
            trailer: slots[4].map(|b| TagBlock::parse(b.content, b.offset)).transpose()?,
        };
        debug!(
            message_type = message.message_type(),
            fields = message.text.fields.len(),
            "decoded FIN message"
        );
        Ok(message)
    }

    /// Encode blocks in order 1-2-3-4-5.
    pub fn encode(&self) -> String {
        let mut out = format!("{{1:{}}}{{2:{}}}", self.basic.format(), self.application.format());
        if let Some(user) = &self.user {
            out.push_str(&format!("{{3:{}}}", user.format()));
        }
        out.push_str(&format!("{{4:{}}}", self.text.format()));
        if let Some(trailer) = &self.trailer {
            out.push_str(&format!("{{5:{}}}", trailer.format()));
        }
        out
    }

    pub fn message_type(&self) -> &str {
        self.application.message_type()
    }

    /// Tags the message type does not define, in input order.
    pub fn unrecognized_tags(&self) -> Vec<ParseError> {
        let message_type = self.message_type();
        let Some(known) = known_tags(message_type) else {
            debug!(message_type, "no tag table for message type");
            return Vec::new();
        };
        self.text
            .fields
            .iter()
            .filter(|f| !known.contains(&f.tag.as_str()))
            .map(|f| {
                debug!(tag = %f.tag, message_type, "unrecognized tag");
                ParseError::UnrecognizedTag {
                    tag: f.tag.clone(),
                    message_type: message_type.to_string(),
                }
            })
            .collect()
    }
}

/// Split a file of concatenated messages where block 1 repeats.
pub fn split_messages(raw: &str) -> Vec<&str> {
    let bytes = raw.as_bytes();
    let mut starts = Vec::new();
    let mut depth = 0usize;
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if depth == 0 && raw[i..].starts_with("{1:") {
                    starts.push(i);
                }
                depth += 1;
            }
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(raw.len());
            raw[start..end].trim()
        })
        .filter(|m| !m.is_empty())
        .collect()
}

/// Tag set of each supported message type.
fn known_tags(message_type: &str) -> Option<&'static [&'static str]> {
    let tags: &'static [&'static str] = match message_type {
        "940" => &["20", "21", "25", "25P", "28C", "60F", "60M", "61", "86", "62F", "62M", "64", "65"],
        "950" => &["20", "25", "28C", "60F", "60M", "61", "62F", "62M", "64", "65"],
        "941" => &["20", "21", "25", "25P", "28", "28C", "13D", "60F", "90D", "90C", "62F", "64", "65", "86"],
        "942" => &["20", "21", "25", "25P", "28C", "34F", "13D", "61", "86", "90D", "90C"],
        "920" => &["20", "12", "25", "34F"],
        "900" => &["20", "21", "25", "25P", "13D", "32A", "52A", "52D", "72"],
        "910" => &["20", "21", "25", "25P", "13D", "32A", "50A", "50F", "50K", "52A", "52D", "56A", "56D", "72"],
        "101" => &[
            "20", "21R", "28D", "50C", "50L", "50F", "50G", "50H", "52A", "52C", "51A", "30", "25", "21", "21F",
            "23E", "32B", "56A", "56C", "56D", "57A", "57C", "57D", "59", "59A", "59F", "70", "77B", "33B", "71A",
            "25A", "36",
        ],
        "103" => &[
            "20", "13C", "23B", "23E", "26T", "32A", "33B", "36", "50A", "50F", "50K", "51A", "52A", "52D", "53A",
            "53B", "53D", "54A", "54B", "54D", "55A", "55B", "55D", "56A", "56C", "56D", "57A", "57B", "57C", "57D",
            "59", "59A", "59F", "70", "71A", "71F", "71G", "72", "77B", "77T",
        ],
        "200" => &["20", "13C", "32A", "53B", "56A", "56D", "57A", "57B", "57D", "72"],
        _ => return None,
    };
    Some(tags)
}

/// Sender, receiver and sequencing used when building outgoing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// 12-character logical terminal address of the sender.
    pub sender: String,
    /// 12-character receiver address.
    pub receiver: String,
    pub session_number: String,
    pub sequence_number: String,
    pub user: Option<TagBlock>,
    pub eol: LineEnding,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            sender: "YPBKDEFFAXXX".to_string(),
            receiver: "YPBKDEFFXXXX".to_string(),
            session_number: "0000".to_string(),
            sequence_number: "000000".to_string(),
            user: None,
            eol: LineEnding::Crlf,
        }
    }
}

impl Envelope {
    /// Wrap text fields in an input message of the given type.
    pub fn wrap(&self, message_type: &str, fields: Vec<Field>) -> Message {
        Message {
            basic: BasicHeader {
                application_id: 'F',
                service_id: "01".to_string(),
                lt_address: self.sender.clone(),
                session_number: self.session_number.clone(),
                sequence_number: self.sequence_number.clone(),
            },
            application: ApplicationHeader::Input {
                message_type: message_type.to_string(),
                receiver: self.receiver.clone(),
                priority: Some('N'),
                delivery_monitoring: None,
                obsolescence_period: None,
            },
            user: self.user.clone(),
            text: TextBlock {
                fields: fields
                    .into_iter()
                    .map(|field| {
                        let value = field.lines().collect::<Vec<_>>().join(self.eol.as_str());
                        Field { value, ..field }
                    })
                    .collect(),
                eol: self.eol,
            },
            trailer: None,
        }
    }
}
