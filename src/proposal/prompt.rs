use chrono::{DateTime, Duration, Local, TimeZone};

use crate::config::BrandingConfig;
use crate::intake::ContactRecord;
use crate::transcript::Transcript;

/// How long a generated proposal stays valid.
pub const VALIDITY_HOURS: i64 = 48;

/// Marker the document model may append; never shown to the reader.
pub const COMPLETION_MARKER: &str = "[CONSULTATION_COMPLETED]";

fn format_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%d %B %Y").to_string()
}

/// Build the generation prompt from the whole conversation.
pub fn build_prompt(
    branding: &BrandingConfig,
    contact: &ContactRecord,
    transcript: &Transcript,
    now: DateTime<Local>,
) -> String {
    let valid_until = now + Duration::hours(VALIDITY_HOURS);
    let conversation = if transcript.is_empty() {
        "(no conversation was captured)".to_string()
    } else {
        transcript.to_prompt_lines()
    };

    let optional = |label: &str, value: &str| {
        if value.is_empty() {
            String::new()
        } else {
            format!("{label}: {value}\n")
        }
    };

    format!(
        r#"You are a proposal writer at {company}. Write a formal business proposal in Markdown for the client below, based only on the consultation transcript.

## Client
Name: {name}
Company: {client_company}
Interest: {interest}
{email}{phone}
## Dates
Proposal date: {today}
Valid until: {valid_until}

## Consultation transcript
{conversation}

## Required sections
1. Executive summary
2. Understanding of the client's needs
3. Proposed solution and scope
4. Timeline
5. Investment (use a Markdown table)
6. Next steps, mentioning the validity date

Prepared by {company}{contact_line}."#,
        company = branding.company,
        name = contact.name(),
        client_company = contact.company(),
        interest = contact.interest(),
        email = optional("Email", contact.email()),
        phone = optional("Phone", contact.phone()),
        today = format_date(&now),
        valid_until = format_date(&valid_until),
        conversation = conversation,
        contact_line = if branding.email.is_empty() {
            String::new()
        } else {
            format!(" ({})", branding.email)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{IntakeForm, Interest};
    use crate::transcript::Role;

    fn contact() -> ContactRecord {
        IntakeForm {
            name: "Asha".into(),
            company: "Nimbus Retail".into(),
            email: "asha@nimbus.example".into(),
            interest: Some(Interest::CloudSolutions),
            ..Default::default()
        }
        .submit()
        .unwrap()
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).single().unwrap()
    }

    #[test]
    fn prompt_embeds_transcript_in_order_and_contact() {
        let mut t = Transcript::new();
        t.push(Role::User, "We need better uptime");
        t.push(Role::Assistant, "I understand...");

        let prompt = build_prompt(&BrandingConfig::default(), &contact(), &t, fixed_now());

        let user = prompt.find("USER: We need better uptime").unwrap();
        let assistant = prompt.find("ASSISTANT: I understand...").unwrap();
        assert!(user < assistant);
        assert!(prompt.contains("Name: Asha"));
        assert!(prompt.contains("Company: Nimbus Retail"));
        assert!(prompt.contains("Interest: Cloud Solutions"));
        assert!(prompt.contains("Email: asha@nimbus.example"));
        assert!(!prompt.contains("Phone:"));
    }

    #[test]
    fn validity_is_two_days_after_today() {
        let prompt = build_prompt(
            &BrandingConfig::default(),
            &contact(),
            &Transcript::new(),
            fixed_now(),
        );
        assert!(prompt.contains("Proposal date: 19 October 2026"));
        assert!(prompt.contains("Valid until: 21 October 2026"));
        assert!(prompt.contains("(no conversation was captured)"));
    }
}
