use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::{utils, OutputFormat};
use crate::config::config;

pub fn handle(user: &str, hours: Option<u64>, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config().security;
    let hours = hours.unwrap_or(security.jwt_expiry_hours);
    let claims = Claims::new(user, hours);
    let token = generate_jwt(&claims, security)?;

    utils::output(
        &output_format,
        &token,
        json!({
            "token": token,
            "user": user,
            "expires_at": claims.exp,
        }),
    )
}
