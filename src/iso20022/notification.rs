//! camt.054 debit/credit notifications and camt.059 notification status reports.

use super::common::{write_amount, write_group_header, write_reason, Account, ActiveAmount, GroupHeader, ReasonInformation};
use super::{Dialect, IsoDocument, MessageKind, XmlWriter};
use crate::camt053_format::{write_entry, write_report_account, CamtEntry};
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};

/// Entries booked on one account, reported ahead of the statement.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountNotification {
    pub id: String,
    pub created: Option<NaiveDateTime>,
    pub account: Account,
    pub owner: Option<String>,
    pub servicer_bic: Option<String>,
    pub entries: Vec<CamtEntry>,
}

impl AccountNotification {
    pub fn new(id: impl Into<String>, account: Account) -> Self {
        Self {
            id: id.into(),
            created: None,
            account,
            owner: None,
            servicer_bic: None,
            entries: Vec::new(),
        }
    }
}

/// camt.054 bank-to-customer debit/credit notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DebitCreditNotification {
    pub header: GroupHeader,
    pub notifications: Vec<AccountNotification>,
}

impl IsoDocument for DebitCreditNotification {
    fn kind(&self) -> MessageKind {
        MessageKind::Camt054
    }

    fn write_body(&self, w: &mut XmlWriter, dialect: &Dialect) -> Result<()> {
        if self.notifications.is_empty() {
            return Err(Error::validation("Ntfctn", "at least one notification is required"));
        }
        write_group_header(w, &self.header)?;
        for notification in &self.notifications {
            w.wrap("Ntfctn", |w| {
                w.element("Id", &notification.id)?;
                if let Some(created) = &notification.created {
                    w.date_time("CreDtTm", created)?;
                }
                write_report_account(w, &notification.account, &notification.owner, &notification.servicer_bic, dialect)?;
                for entry in &notification.entries {
                    write_entry(w, entry, dialect)?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

/// Status of one notified item.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationItemStatus {
    pub original_item_id: String,
    pub amount: Option<ActiveAmount>,
    pub expected_value_date: Option<NaiveDate>,
    /// Item status code, e.g. `RCVD` or `NOTR`.
    pub status: String,
    pub reason: ReasonInformation,
}

/// camt.059 notification to receive status report.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationStatusReport {
    pub header: GroupHeader,
    pub original_message_id: String,
    pub original_created: Option<NaiveDateTime>,
    /// Status of the whole original notification, when reported at that level.
    pub notification_status: Option<String>,
    pub items: Vec<NotificationItemStatus>,
}

impl IsoDocument for NotificationStatusReport {
    fn kind(&self) -> MessageKind {
        MessageKind::Camt059
    }

    fn write_body(&self, w: &mut XmlWriter, _dialect: &Dialect) -> Result<()> {
        write_group_header(w, &self.header)?;
        w.wrap("OrgnlNtfctnAndSts", |w| {
            w.element("OrgnlMsgId", &self.original_message_id)?;
            if let Some(created) = &self.original_created {
                w.date_time("OrgnlCreDtTm", created)?;
            }
            w.optional("NtfctnSts", self.notification_status.as_deref())?;
            for item in &self.items {
                w.wrap("OrgnlItmAndSts", |w| {
                    w.element("OrgnlItmId", &item.original_item_id)?;
                    if let Some(amount) = &item.amount {
                        write_amount(w, "Amt", amount)?;
                    }
                    if let Some(date) = &item.expected_value_date {
                        w.date("XpctdValDt", date)?;
                    }
                    w.element("ItmSts", &item.status)?;
                    write_reason(w, "AddtlStsRsnInf", &item.reason)
                })?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, DebitCredit};
    use rust_decimal::Decimal;

    fn header() -> GroupHeader {
        let created = NaiveDate::from_ymd_opt(2026, 5, 4)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        GroupHeader::new("NTF-1", created)
    }

    #[test]
    fn test_notification_reuses_entry_layout() {
        let mut notification = AccountNotification::new("N-1", Account::iban("DE89370400440532013000"));
        let mut entry = CamtEntry::new(
            Amount::new(Decimal::new(4200, 2)).unwrap(),
            "EUR".parse().unwrap(),
            DebitCredit::Debit,
        );
        entry.booking_date = NaiveDate::from_ymd_opt(2026, 5, 4);
        notification.entries.push(entry);

        let document = DebitCreditNotification {
            header: header(),
            notifications: vec![notification],
        };
        let xml = document.to_xml(8).unwrap();
        assert!(xml.contains("<BkToCstmrDbtCdtNtfctn>"));
        assert!(xml.contains("<Amt Ccy=\"EUR\">42.00</Amt>"));
        assert!(xml.contains("<CdtDbtInd>DBIT</CdtDbtInd>"));
        assert!(xml.contains("<Sts>\n"));
    }

    #[test]
    fn test_notification_requires_content() {
        let document = DebitCreditNotification {
            header: header(),
            notifications: Vec::new(),
        };
        assert!(document.to_xml(2).is_err());
    }

    #[test]
    fn test_status_report() {
        let report = NotificationStatusReport {
            header: header(),
            original_message_id: "NTR-77".to_string(),
            original_created: None,
            notification_status: None,
            items: vec![NotificationItemStatus {
                original_item_id: "ITEM-1".to_string(),
                amount: None,
                expected_value_date: NaiveDate::from_ymd_opt(2026, 5, 6),
                status: "RCVD".to_string(),
                reason: ReasonInformation::default(),
            }],
        };
        let xml = report.to_xml(6).unwrap();
        assert!(xml.contains("camt.059.001.06"));
        assert!(xml.contains("<XpctdValDt>2026-05-06</XpctdValDt>"));
        assert!(xml.contains("<ItmSts>RCVD</ItmSts>"));
    }
}
