use crate::cache::{self, CacheKey};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::runner::CommandRunner;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// A validated `[profile NAME]` section; every `sso_*` attribute is non-empty.
#[derive(Debug, PartialEq, Clone)]
pub struct Profile {
    name: String,
    sso_start_url: String,
    sso_account_id: String,
    sso_role_name: String,
    sso_region: String,
    sso_session: Option<String>,
    region: Option<String>,
}

impl Profile {
    pub fn new(
        name: String,
        sso_start_url: String,
        sso_account_id: String,
        sso_role_name: String,
        sso_region: String,
    ) -> Self {
        Self {
            name,
            sso_start_url,
            sso_account_id,
            sso_role_name,
            sso_region,
            sso_session: None,
            region: None,
        }
    }

    pub fn set_region(mut self, value: Option<String>) -> Self {
        self.region = value.filter(|v| !v.is_empty());
        self
    }

    pub fn set_sso_session(mut self, value: Option<String>) -> Self {
        self.sso_session = value.filter(|v| !v.is_empty());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sso_start_url(&self) -> &str {
        &self.sso_start_url
    }

    pub fn sso_account_id(&self) -> &str {
        &self.sso_account_id
    }

    pub fn sso_role_name(&self) -> &str {
        &self.sso_role_name
    }

    pub fn sso_region(&self) -> &str {
        &self.sso_region
    }

    pub fn sso_session(&self) -> Option<&str> {
        self.sso_session.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

/// Short-lived role credentials as the AWS CLI caches them.
///
/// The same shape, with `Version` set, is the credential-process payload.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RoleCredential {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}

impl RoleCredential {
    #[cfg(test)]
    pub fn new(
        access_key_id: String,
        secret_access_key: String,
        session_token: String,
        expiration: String,
    ) -> Self {
        Self {
            version: None,
            access_key_id,
            secret_access_key,
            session_token,
            expiration,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn expiration(&self) -> &str {
        &self.expiration
    }

    pub fn is_expired(&self) -> bool {
        cache::is_expired(&self.expiration, Utc::now())
    }
}

pub struct SSO<R> {
    config: Config,
    runner: R,
    http: reqwest::Client,
}

impl<R: CommandRunner> SSO<R> {
    pub fn new(config: Config, runner: R) -> Self {
        Self {
            config,
            runner,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Returns unexpired credentials for `profile`, asking the AWS CLI to refresh
    /// its cache at most once.
    pub async fn role_credentials<W: Write>(
        &self,
        profile: &Profile,
        silent: bool,
        out: &mut W,
    ) -> Result<RoleCredential> {
        let key = CacheKey::for_profile(profile)?;
        let cache_path = self.config.cli_cache_path();

        match cache::read_cached(cache_path, &key) {
            Ok(Some(cred)) if !cred.is_expired() => {
                tracing::debug!("using cached credentials for {}", profile.name());
                return Ok(cred);
            }
            Ok(Some(cred)) => tracing::info!(
                "cached credentials for {} expired at {}",
                profile.name(),
                cred.expiration()
            ),
            Ok(None) => tracing::debug!("no cached credentials for {}", profile.name()),
            Err(err) => tracing::debug!("ignoring cache entry: {}", err),
        }

        self.update_cached_credentials(profile.name(), silent, out)
            .await?;

        let cred = cache::read_cached(cache_path, &key)?
            .ok_or_else(|| Error::NoCredentials(profile.name().to_string()))?;
        if cred.is_expired() {
            return Err(Error::Expired(profile.name().to_string()));
        }
        Ok(cred)
    }

    /// `aws sts get-caller-identity` makes the AWS CLI rewrite its credential cache.
    async fn update_cached_credentials<W: Write>(
        &self,
        profile_name: &str,
        silent: bool,
        out: &mut W,
    ) -> Result<()> {
        let program = self.config.aws_cli();
        let args = [
            "sts",
            "get-caller-identity",
            "--query",
            "Arn",
            "--output",
            "text",
            "--profile",
            profile_name,
        ];
        tracing::info!("refreshing credentials for {}", profile_name);
        let output = self
            .runner
            .output(program, &args)
            .await
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.success {
            let detail = output.stderr.trim().to_string();
            tracing::error!("{}", detail);
            return Err(Error::NotAuthenticated {
                profile: profile_name.to_string(),
                detail,
            });
        }
        if !silent {
            writeln!(out, "Updated credentials for: {}", output.stdout.trim())?;
        }
        Ok(())
    }
}
