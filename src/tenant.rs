use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::ServiceError;

pub const COMPANY_HEADER: &str = "x-company-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Tenant scoping for every core operation. The gateway in front of this
/// service authenticates the caller and stamps these headers; the core never
/// derives tenancy from ambient state, and every query re-filters by
/// `company_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub company_id: Uuid,
    pub actor_id: Uuid,
}

impl TenantContext {
    pub fn new(company_id: Uuid, actor_id: Uuid) -> Self {
        Self {
            company_id,
            actor_id,
        }
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, ServiceError> {
    let raw = parts
        .headers
        .get(name)
        .ok_or_else(|| ServiceError::ValidationError(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| ServiceError::ValidationError(format!("Malformed {} header", name)))?;

    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::ValidationError(format!("{} must be a valid UUID", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(TenantContext {
            company_id: header_uuid(parts, COMPANY_HEADER)?,
            actor_id: header_uuid(parts, ACTOR_HEADER)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::FromRequestParts;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<TenantContext, ServiceError> {
        let (mut parts, _) = req.into_parts();
        TenantContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_both_headers() {
        let company = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let req = Request::builder()
            .header(COMPANY_HEADER, company.to_string())
            .header(ACTOR_HEADER, actor.to_string())
            .body(())
            .unwrap();

        let ctx = extract(req).await.expect("extraction should succeed");
        assert_eq!(ctx.company_id, company);
        assert_eq!(ctx.actor_id, actor);
    }

    #[tokio::test]
    async fn rejects_missing_company_header() {
        let req = Request::builder()
            .header(ACTOR_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap();

        assert!(extract(req).await.is_err());
    }

    #[tokio::test]
    async fn rejects_malformed_uuid() {
        let req = Request::builder()
            .header(COMPANY_HEADER, "not-a-uuid")
            .header(ACTOR_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap();

        assert!(extract(req).await.is_err());
    }
}
