use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};

use crate::{
    AppState,
    config::Config,
    error::AppError,
    utils::{Claims, verify_token},
};

/// 只有白名单里的唯一管理员可以通过
pub fn authorize_admin(token: Option<&str>, config: &Config) -> Result<Claims, AppError> {
    let (Some(secret), Some(admin)) = (
        config.jwt_secret.as_deref(),
        config.admin_principal.as_deref(),
    ) else {
        tracing::warn!("Admin gate is not configured, rejecting maintenance request");
        return Err(AppError::Forbidden);
    };

    let token = token.ok_or(AppError::Unauthorized)?;
    let claims = verify_token(token, secret).map_err(|e| {
        tracing::debug!("Rejected admin token: {}", e);
        AppError::Unauthorized
    })?;

    if claims.sub != admin {
        tracing::warn!("Principal {} is not allowed to run maintenance", claims.sub);
        return Err(AppError::Forbidden);
    }

    Ok(claims)
}

pub async fn require_admin(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer.as_ref().ok().map(|TypedHeader(auth)| auth.token());
    let claims = authorize_admin(token, &state.config)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
