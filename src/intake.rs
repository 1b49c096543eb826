//! Contact intake: the record collected before a call starts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service line the prospect is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interest {
    WebDevelopment,
    MobileApps,
    Cybersecurity,
    AiIntegration,
    MarketingAutomation,
    DigitalMarketing,
    #[default]
    BusinessConsulting,
    CloudSolutions,
}

impl Interest {
    /// Every interest in presentation order.
    pub const ALL: [Interest; 8] = [
        Interest::WebDevelopment,
        Interest::MobileApps,
        Interest::Cybersecurity,
        Interest::AiIntegration,
        Interest::MarketingAutomation,
        Interest::DigitalMarketing,
        Interest::BusinessConsulting,
        Interest::CloudSolutions,
    ];

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::WebDevelopment => "Web Development",
            Self::MobileApps => "Mobile Apps",
            Self::Cybersecurity => "Cybersecurity",
            Self::AiIntegration => "AI Integration",
            Self::MarketingAutomation => "Marketing Automation",
            Self::DigitalMarketing => "Digital Marketing",
            Self::BusinessConsulting => "Business Consulting",
            Self::CloudSolutions => "Cloud Solutions",
        }
    }

    /// Parse a label, case-insensitively. Unknown or empty labels yield the default.
    pub fn from_label(label: &str) -> Self {
        let wanted = label.trim();
        Self::ALL
            .into_iter()
            .find(|i| i.label().eq_ignore_ascii_case(wanted))
            .unwrap_or_default()
    }

    /// Position in [`Interest::ALL`].
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|i| *i == self).unwrap_or(0)
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Who the consultation is with. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    name: String,
    email: String,
    phone: String,
    company: String,
    interest: Interest,
}

impl ContactRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }
}

/// Intake field that failed the required-field check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("name is required")]
    MissingName,
    #[error("company is required")]
    MissingCompany,
}

/// Form state before submission.
#[derive(Debug, Clone, Default)]
pub struct IntakeForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub interest: Option<Interest>,
}

impl IntakeForm {
    /// Validate the required fields and freeze the record.
    pub fn submit(self) -> Result<ContactRecord, IntakeError> {
        let name = self.name.trim().to_string();
        let company = self.company.trim().to_string();
        if name.is_empty() {
            return Err(IntakeError::MissingName);
        }
        if company.is_empty() {
            return Err(IntakeError::MissingCompany);
        }
        Ok(ContactRecord {
            name,
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            company,
            interest: self.interest.unwrap_or_default(),
        })
    }
}
