//! Gateway error taxonomy
//!
//! Failures split into two tiers. Encapsulation-tier errors surface as the
//! outer HTTP status (401 for a configuration mismatch, 400 otherwise).
//! Application-tier errors must never leak outward: they are sealed as an
//! inner response with the matching status under an outer 200, so the relay
//! cannot distinguish inner success from inner failure.

use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayError {
    /// Key id unknown or algorithm suite mismatch. Outer 401.
    #[error("configuration mismatch")]
    ConfigMismatch,

    /// Decapsulation or response sealing failed. Outer 400.
    #[error("encapsulation error")]
    Encapsulation,

    /// Inner bytes are not a valid binary HTTP message. Inner 400.
    #[error("invalid payload encoding")]
    PayloadMarshalling,

    /// Inner host not on the target allowlist. Inner 403.
    #[error("target forbidden on gateway")]
    TargetForbidden,

    /// The outbound fetch failed. Inner 500.
    #[error("target request failed")]
    TargetRequestFailed,

    /// The request failed to be processed after decapsulation. Inner 500.
    #[error("internal gateway error")]
    InternalServer,
}

impl GatewayError {
    /// Whether this error belongs to the application tier and must be sealed
    /// as an inner response rather than reported on the envelope.
    pub fn is_application(self) -> bool {
        matches!(
            self,
            GatewayError::PayloadMarshalling
                | GatewayError::TargetForbidden
                | GatewayError::TargetRequestFailed
                | GatewayError::InternalServer
        )
    }

    /// Outer envelope status for encapsulation-tier errors.
    pub fn outer_status(self) -> StatusCode {
        match self {
            GatewayError::ConfigMismatch => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Inner response status for application-tier errors.
    pub fn inner_status(self) -> StatusCode {
        match self {
            GatewayError::PayloadMarshalling => StatusCode::BAD_REQUEST,
            GatewayError::TargetForbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_partition() {
        assert!(!GatewayError::ConfigMismatch.is_application());
        assert!(!GatewayError::Encapsulation.is_application());
        assert!(GatewayError::PayloadMarshalling.is_application());
        assert!(GatewayError::TargetForbidden.is_application());
        assert!(GatewayError::TargetRequestFailed.is_application());
        assert!(GatewayError::InternalServer.is_application());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::ConfigMismatch.outer_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::Encapsulation.outer_status(), StatusCode::BAD_REQUEST);

        assert_eq!(
            GatewayError::PayloadMarshalling.inner_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GatewayError::TargetForbidden.inner_status(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayError::TargetRequestFailed.inner_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::InternalServer.inner_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
