//! Prefilled `wa.me` links. Nothing is sent from the server; the owner's
//! phone opens WhatsApp with the text ready to go.

use serde::Serialize;
use std::fmt::Write;

use crate::database::models::{Business, ChecklistItem, Client, Invoice, Job, JobPhoto};
use crate::types::{InvoiceStatus, PhotoType};

/// Which photos a photo message should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSelection {
    Before,
    After,
    All,
}

impl PhotoSelection {
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(|v| v.to_ascii_uppercase()).as_deref() {
            None | Some("ALL") => Some(PhotoSelection::All),
            Some("BEFORE") => Some(PhotoSelection::Before),
            Some("AFTER") => Some(PhotoSelection::After),
            _ => None,
        }
    }

    fn includes(&self, photo_type: PhotoType) -> bool {
        match self {
            PhotoSelection::All => true,
            PhotoSelection::Before => photo_type == PhotoType::Before,
            PhotoSelection::After => photo_type == PhotoType::After,
        }
    }
}

/// Digits-only international number. A leading `0` is read as a UK
/// national number and becomes `44`.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let has_plus = phone.trim_start().starts_with('+');
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    if !has_plus && digits.starts_with('0') {
        return Some(format!("44{}", &digits[1..]));
    }
    Some(digits)
}

pub fn link(phone: &str, message: &str) -> Option<String> {
    let number = normalize_phone(phone)?;
    Some(format!("https://wa.me/{}?text={}", number, urlencoding::encode(message)))
}

/// API payload for a prefilled message. When the client has no usable phone
/// number the URL is null and `error` says why.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppLink {
    pub whatsapp_url: Option<String>,
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<JobPhoto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WhatsAppLink {
    pub fn build(phone: Option<&str>, message: String) -> Self {
        match phone.and_then(|p| link(p, &message).map(|url| (p, url))) {
            Some((phone, url)) => Self {
                whatsapp_url: Some(url),
                phone_number: Some(phone.to_string()),
                message: Some(message),
                photos: None,
                error: None,
            },
            None => Self {
                whatsapp_url: None,
                phone_number: None,
                message: None,
                photos: None,
                error: Some("Client phone number not available".to_string()),
            },
        }
    }

    pub fn with_photos(mut self, photos: Vec<JobPhoto>) -> Self {
        if self.whatsapp_url.is_some() {
            self.photos = Some(photos);
        }
        self
    }
}

fn long_date(job: &Job) -> String {
    job.scheduled_date.format("%-d %B %Y").to_string()
}

fn sign_off(message: &mut String, business: &Business) {
    let _ = write!(message, "\nThank you for choosing {}!", business.name);
    if let Some(phone) = &business.phone {
        let _ = write!(message, "\n📞 {}", phone);
    }
}

pub fn invoice_message(invoice: &Invoice, business: &Business, client: &Client, job: Option<&Job>) -> String {
    let mut message = String::new();
    let _ = writeln!(message, "📄 *Invoice {}*\n", invoice.invoice_number);
    let _ = writeln!(message, "Hello {},\n", client.name);
    let _ = writeln!(message, "*Amount:* £{:.2}", invoice.amount);
    if !invoice.vat_amount.is_zero() {
        let _ = writeln!(message, "*VAT:* £{:.2}", invoice.vat_amount);
    }
    let _ = writeln!(message, "*Total:* £{:.2}", invoice.total_amount);
    let _ = writeln!(message, "*Due:* {}", invoice.due_date.format("%-d %B %Y"));
    if let Some(job) = job {
        let _ = writeln!(message, "*Service:* {} on {}", job.job_type.label(), job.scheduled_date.format("%d/%m/%Y"));
    }
    match invoice.status {
        InvoiceStatus::Paid => message.push_str("\n*Status:* ✅ Paid\n"),
        InvoiceStatus::Unpaid => {
            message.push_str("\n*Status:* ⏳ Unpaid\n");
            message.push_str("Please arrange payment at your earliest convenience.\n");
        }
    }
    sign_off(&mut message, business);
    message
}

pub fn photos_message(
    job: &Job,
    business: &Business,
    client: &Client,
    photos: &[JobPhoto],
    selection: PhotoSelection,
) -> String {
    let heading = match selection {
        PhotoSelection::Before => "📸 *Before Photos*",
        PhotoSelection::After => "✨ *After Photos - Job Complete*",
        PhotoSelection::All => "📸 *Job Photos*",
    };

    let mut message = String::new();
    let _ = writeln!(message, "{}\n", heading);
    let _ = writeln!(message, "Hello {},\n", client.name);
    let _ = writeln!(message, "*Job Date:* {}", long_date(job));
    if let Some(time) = &job.scheduled_time {
        let _ = writeln!(message, "*Time:* {}", time);
    }

    let selected: Vec<&JobPhoto> = photos.iter().filter(|p| selection.includes(p.photo_type)).collect();
    if !selected.is_empty() {
        message.push_str("\n*Photos:*\n");
        for (index, photo) in selected.iter().enumerate() {
            let _ = writeln!(message, "{}. {}", index + 1, photo.image_url);
        }
    }
    sign_off(&mut message, business);
    message
}

pub fn completion_message(
    job: &Job,
    business: &Business,
    client: &Client,
    checklist: &[ChecklistItem],
    photos: &[JobPhoto],
) -> String {
    let mut message = String::new();
    message.push_str("✨ *Job Completed*\n\n");
    let _ = writeln!(message, "Hello {},\n", client.name);
    let _ = writeln!(message, "• Date: {}", long_date(job));
    if let Some(time) = &job.scheduled_time {
        let _ = writeln!(message, "• Time: {}", time);
    }
    let _ = writeln!(message, "• Type: {}", job.job_type.label());

    if !checklist.is_empty() {
        let done = checklist.iter().filter(|i| i.completed).count();
        let _ = writeln!(message, "\n*Checklist:* {}/{} items completed", done, checklist.len());
    }

    let before = photos.iter().filter(|p| p.photo_type == PhotoType::Before).count();
    let after = photos.len() - before;
    if before > 0 {
        let _ = writeln!(message, "📸 Before photos: {}", before);
    }
    if after > 0 {
        let _ = writeln!(message, "✨ After photos: {}", after);
    }
    sign_off(&mut message, business);
    message
}
