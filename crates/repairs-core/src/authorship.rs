//! Authorship derivation for new tickets.
//!
//! `created_by` is never taken from the request body. It is derived from the
//! caller context the transport layer forwards (the Copilot tenant and
//! conversation headers), following a fixed chain:
//!
//! 1. tenant and conversation present: `"{tenant}|{conversation}"`
//! 2. tenant only: `"{tenant}"`
//! 3. anything else: [`UNKNOWN_CREATOR`]

/// Header carrying the caller's tenant identifier.
pub const TENANT_HEADER: &str = "x-microsoft-tenantid";

/// Header carrying the caller's conversation identifier.
pub const CONVERSATION_HEADER: &str = "x-microsoft-ai-conversationid";

/// Sentinel for direct or local calls that carry no tenant context.
pub const UNKNOWN_CREATOR: &str = "unknown";

/// Source of caller-context values, keyed by header name.
///
/// The HTTP layer implements this over its header map; tests use a fixed map.
pub trait ContextSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Tenant and conversation identifiers supplied with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    tenant_id: Option<String>,
    conversation_id: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl CallerContext {
    /// Build a context; empty or whitespace-only values count as absent.
    pub fn new(tenant_id: Option<String>, conversation_id: Option<String>) -> Self {
        Self {
            tenant_id: present(tenant_id),
            conversation_id: present(conversation_id),
        }
    }

    /// Context for calls that bypass the context-aware transport.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Read both identifiers from a [`ContextSource`].
    pub fn resolve(source: &dyn ContextSource) -> Self {
        Self::new(source.get(TENANT_HEADER), source.get(CONVERSATION_HEADER))
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Derive the `created_by` value for a ticket created in this context.
    pub fn created_by(&self) -> String {
        match (&self.tenant_id, &self.conversation_id) {
            (Some(tenant), Some(conversation)) => format!("{tenant}|{conversation}"),
            (Some(tenant), None) => tenant.clone(),
            (None, _) => UNKNOWN_CREATOR.to_string(),
        }
    }
}
