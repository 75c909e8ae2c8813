//! Bearer-token authentication and role capability checks.
//!
//! Auth backends (OTP, JWT issuance, password flows) live outside this
//! system; the API trusts an injected token → principal table with a role
//! bit and checks capabilities at the handler boundary.

use crate::core::http::response_envelope::ApiResponse;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Member,
    Owner,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadDocs,
    WriteDocs,
    AdminProject,
}

impl Role {
    pub fn can(&self, capability: Capability) -> bool {
        match capability {
            Capability::ReadDocs => true,
            Capability::WriteDocs => matches!(self, Role::Owner | Role::Admin),
            Capability::AdminProject => matches!(self, Role::Admin),
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "member" => Some(Role::Member),
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

/// Token table parsed from `API_AUTH_TOKENS`:
/// `token=principal:role` entries separated by commas.
#[derive(Debug, Clone, Default)]
pub struct AuthRegistry {
    tokens: HashMap<String, Principal>,
}

impl AuthRegistry {
    pub fn parse(raw: &str) -> Self {
        let mut tokens = HashMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((token, rest)) = entry.split_once('=') else {
                continue;
            };
            let Some((principal, role)) = rest.split_once(':') else {
                continue;
            };
            let Some(role) = Role::parse(role.trim()) else {
                continue;
            };
            tokens.insert(
                token.trim().to_string(),
                Principal {
                    id: principal.trim().to_string(),
                    role,
                },
            );
        }
        Self { tokens }
    }

    pub fn lookup(&self, token: &str) -> Option<&Principal> {
        self.tokens.get(token)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Resolve the caller from the `Authorization: Bearer` header, or produce
/// the 401 envelope.
pub fn authenticate(registry: &AuthRegistry, headers: &HeaderMap) -> Result<Principal, Response> {
    let token = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    match token.and_then(|t| registry.lookup(t)) {
        Some(principal) => {
            debug!(principal = %principal.id, "authenticated");
            Ok(principal.clone())
        }
        None => Err(ApiResponse::<()>::error(
            "UNAUTHORIZED",
            "Missing or invalid bearer token.",
            Vec::new(),
        )
        .into_response_with_status(StatusCode::UNAUTHORIZED)),
    }
}

/// Capability gate used by mutating handlers.
pub fn authorize(principal: &Principal, capability: Capability) -> Result<(), Response> {
    if principal.role.can(capability) {
        return Ok(());
    }
    Err(ApiResponse::<()>::error(
        "FORBIDDEN",
        "Insufficient role for this operation.",
        Vec::new(),
    )
    .into_response_with_status(StatusCode::FORBIDDEN))
}
