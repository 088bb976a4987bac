//! Email bodies. Each builder returns the HTML and plain-text variants.

use crate::database::models::{Business, Client, Invoice, Job};
use crate::notifications::email::EmailMessage;

fn html_page(title: &str, paragraphs: &[String]) -> String {
    let body: String = paragraphs.iter().map(|p| format!("<p>{}</p>", escape(p))).collect();
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head>\
         <body style=\"font-family: Arial, sans-serif; color: #333\">\
         <h2 style=\"color: #4f46e5\">{}</h2>{}</body></html>",
        escape(title),
        body
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn message(to: &str, subject: String, title: &str, paragraphs: Vec<String>) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        html: html_page(title, &paragraphs),
        text: paragraphs.join("\n\n"),
        subject,
    }
}

/// "Monday, 8 January 2024" plus the time or "Time TBD".
fn when(job: &Job) -> (String, String) {
    (
        job.scheduled_date.format("%A, %-d %B %Y").to_string(),
        job.scheduled_time.clone().unwrap_or_else(|| "Time TBD".to_string()),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAudience {
    Owner,
    Cleaner,
    Client,
}

pub fn job_reminder(
    audience: ReminderAudience,
    to: &str,
    job: &Job,
    client: &Client,
    business: &Business,
) -> EmailMessage {
    let (date, time) = when(job);
    let address = client.address.clone().unwrap_or_else(|| "Address not provided".to_string());

    match audience {
        ReminderAudience::Owner => message(
            to,
            format!("Reminder: Job scheduled for {} on {}", client.name, date),
            "Upcoming job",
            vec![
                format!("You have a {} job for {} on {} at {}.", job.job_type.label(), client.name, date, time),
                format!("Address: {}", address),
            ],
        ),
        ReminderAudience::Cleaner => message(
            to,
            format!("Reminder: Job scheduled for {} on {}", client.name, date),
            "Your next job",
            vec![
                format!("You are booked to clean for {} on {} at {}.", client.name, date, time),
                format!("Address: {}", address),
                format!("Booked by {}.", business.name),
            ],
        ),
        ReminderAudience::Client => message(
            to,
            format!("Reminder: Cleaning appointment on {}", date),
            "Your cleaning appointment",
            vec![
                format!("Hello {},", client.name),
                format!("This is a reminder that {} will be with you on {} at {}.", business.name, date, time),
                match &business.phone {
                    Some(phone) => format!("Need to change something? Call us on {}.", phone),
                    None => "Need to change something? Just reply to this email.".to_string(),
                },
            ],
        ),
    }
}

pub fn cleaner_invitation(to: &str, business: &Business, link: &str, expiry_days: i64) -> EmailMessage {
    message(
        to,
        format!("You've been invited to join {}", business.name),
        "You're invited",
        vec![
            format!("{} has added you to their cleaning team.", business.name),
            format!("Set your password to get started: {}", link),
            format!("This link expires in {} days.", expiry_days),
        ],
    )
}

pub fn password_recovery(to: &str, link: &str) -> EmailMessage {
    message(
        to,
        "Reset your password".to_string(),
        "Reset your password",
        vec![
            "We received a request to reset your password.".to_string(),
            format!("Choose a new password here: {}", link),
            "If you did not ask for this, you can ignore this email.".to_string(),
        ],
    )
}

pub fn payment_reminder(to: &str, invoice: &Invoice, client: &Client, business: &Business) -> EmailMessage {
    message(
        to,
        format!("Payment reminder: invoice {}", invoice.invoice_number),
        "Payment reminder",
        vec![
            format!("Hello {},", client.name),
            format!(
                "Invoice {} for £{:.2} is due on {}.",
                invoice.invoice_number,
                invoice.total_amount,
                invoice.due_date.format("%-d %B %Y")
            ),
            format!("Thank you, {}", business.name),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_is_escaped() {
        let page = html_page("A & B", &["<script>".to_string()]);
        assert!(page.contains("A &amp; B"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }
}
