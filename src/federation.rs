use crate::aws_sso::RoleCredential;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use url::Url;

pub const FEDERATION_ENDPOINT: &str = "https://signin.aws.amazon.com/federation";
// 12 hours
const SESSION_DURATION: &str = "43200";
const ISSUER: &str = "-aws-sso-console";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Session<'a> {
    session_id: &'a str,
    session_key: &'a str,
    session_token: &'a str,
}

#[derive(Deserialize)]
struct SigninTokenResponse {
    #[serde(rename = "SigninToken")]
    signin_token: String,
}

fn signin_token_request(endpoint: &str, cred: &RoleCredential) -> Result<Url> {
    let session = serde_json::to_string(&Session {
        session_id: cred.access_key_id(),
        session_key: cred.secret_access_key(),
        session_token: cred.session_token(),
    })?;
    Ok(Url::parse_with_params(
        endpoint,
        &[
            ("Action", "getSigninToken"),
            ("SessionDuration", SESSION_DURATION),
            ("Session", session.as_str()),
        ],
    )?)
}

/// Exchanges session credentials for a one-time console sign-in token.
pub async fn signin_token(
    client: &reqwest::Client,
    endpoint: &str,
    cred: &RoleCredential,
) -> Result<String> {
    let url = signin_token_request(endpoint, cred)?;
    tracing::debug!("requesting sign-in token from {}", endpoint);
    let response: SigninTokenResponse = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(response.signin_token)
}

pub fn console_url(region: &str) -> String {
    format!("https://{}.console.aws.amazon.com/", region)
}

pub fn logout_url(region: &str) -> String {
    format!(
        "https://{}.console.aws.amazon.com/console/logout!doLogout",
        region
    )
}

pub fn signin_url(account_id: &str, region: &str, signin_token: &str) -> Result<Url> {
    let destination = console_url(region);
    Ok(Url::parse_with_params(
        &format!("https://{}.signin.aws.amazon.com/federation", account_id),
        &[
            ("Action", "login"),
            ("Issuer", ISSUER),
            ("Destination", destination.as_str()),
            ("SigninToken", signin_token),
        ],
    )?)
}
