use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{BusinessId, DomainError, DomainResult};

stockflow_core::domain_id!(
    CounterpartyId,
    "Counterparty identifier (scoped by the owning business)."
);

/// Counterparty kind: customer or supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterpartyKind {
    Customer,
    Supplier,
}

impl CounterpartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterpartyKind::Customer => "customer",
            CounterpartyKind::Supplier => "supplier",
        }
    }
}

impl core::fmt::Display for CounterpartyKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterpartyKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(CounterpartyKind::Customer),
            "supplier" => Ok(CounterpartyKind::Supplier),
            other => Err(DomainError::validation(format!(
                "unknown counterparty kind: {other}"
            ))),
        }
    }
}

/// Contact information for a counterparty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A customer or supplier the business trades with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    pub id: CounterpartyId,
    pub business_id: BusinessId,
    pub kind: CounterpartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCounterparty {
    pub kind: CounterpartyKind,
    pub name: String,
    #[serde(default)]
    pub contact: ContactInfo,
}

impl Counterparty {
    pub fn register(
        business_id: BusinessId,
        input: NewCounterparty,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let contact = ContactInfo {
            email: normalize(input.contact.email),
            phone: normalize(input.contact.phone),
        };
        if let Some(email) = &contact.email {
            if !email.contains('@') {
                return Err(DomainError::validation("email must contain '@'"));
            }
        }

        Ok(Self {
            id: CounterpartyId::generate(),
            business_id,
            kind: input.kind,
            name: name.to_string(),
            contact,
            created_at: now,
        })
    }

    /// Case-insensitive substring match on the counterparty name.
    pub fn name_matches(&self, filter: &str) -> bool {
        self.name.to_lowercase().contains(&filter.trim().to_lowercase())
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(name: &str) -> NewCounterparty {
        NewCounterparty {
            kind: CounterpartyKind::Customer,
            name: name.to_string(),
            contact: ContactInfo::default(),
        }
    }

    #[test]
    fn register_requires_a_name() {
        let err = Counterparty::register(BusinessId::new(), customer(" "), Utc::now()).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("name")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn blank_contact_fields_are_dropped() {
        let mut input = customer("Acme Textiles");
        input.contact = ContactInfo {
            email: Some("  ".to_string()),
            phone: Some(" +91 98765 43210 ".to_string()),
        };
        let c = Counterparty::register(BusinessId::new(), input, Utc::now()).unwrap();
        assert_eq!(c.contact.email, None);
        assert_eq!(c.contact.phone.as_deref(), Some("+91 98765 43210"));
    }

    #[test]
    fn rejects_malformed_email() {
        let mut input = customer("Acme");
        input.contact.email = Some("acme.example.com".to_string());
        assert!(Counterparty::register(BusinessId::new(), input, Utc::now()).is_err());
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!(
            "Supplier".parse::<CounterpartyKind>().unwrap(),
            CounterpartyKind::Supplier
        );
        assert!("vendor".parse::<CounterpartyKind>().is_err());
    }
}
