//! Recipient envelope and the assembled outgoing mail

use serde::Serialize;

/// Who a mail goes to and comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub to: Vec<String>,
    /// Overrides the transport's default sender
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl Envelope {
    pub fn to(address: impl Into<String>) -> Self {
        Self {
            to: vec![address.into()],
            ..Self::default()
        }
    }

    pub fn and_to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    pub fn sender(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Copy of this envelope addressed to a single recipient
    pub fn with_recipient(&self, address: impl Into<String>) -> Self {
        Self {
            to: vec![address.into()],
            ..self.clone()
        }
    }

    /// All addresses the transport will deliver to
    pub fn recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .cloned()
            .collect()
    }
}

/// A compiled mail ready for a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub envelope: Envelope,
    pub subject: String,
    pub html: String,
    /// Optional plain-text alternative
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_recipients() {
        let envelope = Envelope::to("a@example.com")
            .and_to("b@example.com")
            .cc("c@example.com")
            .bcc("d@example.com")
            .sender("noreply@example.com")
            .reply_to("support@example.com");

        assert_eq!(
            envelope.recipients(),
            vec!["a@example.com", "b@example.com", "c@example.com", "d@example.com"]
        );
        assert_eq!(envelope.from.as_deref(), Some("noreply@example.com"));
    }

    #[test]
    fn test_with_recipient_keeps_copies() {
        let shared = Envelope::default().cc("audit@example.com").sender("noreply@example.com");
        let single = shared.with_recipient("user@example.com");

        assert_eq!(single.to, vec!["user@example.com"]);
        assert_eq!(single.cc, vec!["audit@example.com"]);
        assert_eq!(single.from, shared.from);
    }
}
