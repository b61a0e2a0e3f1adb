use crate::aws_sso::{Profile, RoleCredential};
use crate::error::{Error, Result};
use crate::federation::FEDERATION_ENDPOINT;
use ini::{EscapePolicy, Ini, ParseOption, Properties};
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::fs::create_dir_all;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

// keys an `[sso-session]` section may supply to the profiles referencing it
const SESSION_KEYS: [&str; 2] = ["sso_start_url", "sso_region"];

/// Where things live. Read once per invocation, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    aws_config_file: PathBuf,
    aws_credentials_file: PathBuf,
    aws_cli_cache_path: PathBuf,
    federation_endpoint: String,
    aws_cli: String,
}

impl Config {
    pub fn new(config_file: PathBuf, credentials_file: PathBuf, cli_cache_path: PathBuf) -> Self {
        Self {
            aws_config_file: config_file,
            aws_credentials_file: credentials_file,
            aws_cli_cache_path: cli_cache_path,
            federation_endpoint: String::from(FEDERATION_ENDPOINT),
            aws_cli: String::from("aws"),
        }
    }

    pub fn load_from_env() -> Result<Self> {
        let aws_path = dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".aws");

        let config_file = path_from_env("AWS_CONFIG_FILE").unwrap_or_else(|| aws_path.join("config"));
        let credentials_file = path_from_env("AWS_SHARED_CREDENTIALS_FILE")
            .unwrap_or_else(|| aws_path.join("credentials"));
        let cli_cache_path = aws_path.join("cli").join("cache");

        tracing::debug!(
            "config: {}, credentials: {}, cache: {}",
            config_file.display(),
            credentials_file.display(),
            cli_cache_path.display()
        );
        Ok(Self::new(config_file, credentials_file, cli_cache_path))
    }

    #[cfg(test)]
    pub fn set_federation_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.federation_endpoint = endpoint.into();
        self
    }

    pub fn federation_endpoint(&self) -> &str {
        &self.federation_endpoint
    }

    pub fn aws_cli(&self) -> &str {
        &self.aws_cli
    }

    pub fn cli_cache_path(&self) -> &Path {
        &self.aws_cli_cache_path
    }

    pub fn credentials_file(&self) -> &Path {
        &self.aws_credentials_file
    }

    fn load_config(path: &Path) -> Result<Ini> {
        Ini::load_from_file(path).map_err(|source| {
            tracing::error!("failed to load AWS config file at {}", path.display());
            Error::ConfigLoad {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Loads and validates `[profile NAME]` from the AWS config file.
    pub fn profile(&self, name: &str) -> Result<Profile> {
        let ini = Self::load_config(&self.aws_config_file)?;
        Self::load_profile(&ini, name, &self.aws_config_file)
    }

    fn load_profile(ini: &Ini, name: &str, path: &Path) -> Result<Profile> {
        let sec_re = Regex::new("^(?P<kind>profile|sso-session) +(?P<name>.+?) *$")?;
        let mut profile: Option<&Properties> = None;
        let mut sessions: HashMap<&str, &Properties> = HashMap::new();
        for (sec, prop) in ini.iter() {
            let Some(sec) = sec else {
                continue;
            };
            if sec == "default" && name == "default" {
                profile = profile.or(Some(prop));
                continue;
            }
            match sec_re.captures(sec) {
                Some(value) if "sso-session".eq(&value["kind"]) => {
                    if let Some(session) = value.name("name") {
                        sessions.insert(session.as_str(), prop);
                    }
                }
                Some(value) if "profile".eq(&value["kind"]) && name.eq(&value["name"]) => {
                    profile = Some(prop);
                }
                _ => continue,
            }
        }

        let prop = profile.ok_or_else(|| {
            tracing::error!("profile [profile {}] not found in {}", name, path.display());
            Error::ProfileNotFound {
                section: format!("profile {}", name),
                path: path.to_path_buf(),
            }
        })?;

        let sso_session = prop.get("sso_session").map(str::trim).filter(|s| !s.is_empty());
        let session = match sso_session {
            Some(session) => Some(*sessions.get(session).ok_or_else(|| Error::ProfileNotFound {
                section: format!("sso-session {}", session),
                path: path.to_path_buf(),
            })?),
            None => None,
        };

        let lookup = |key: &str| -> String {
            let from_session = || {
                session
                    .filter(|_| SESSION_KEYS.contains(&key))
                    .and_then(|s| s.get(key))
            };
            prop.get(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(from_session)
                .unwrap_or("")
                .trim()
                .to_string()
        };

        let require = |key: &'static str| -> Result<String> {
            let value = lookup(key);
            if value.is_empty() {
                return Err(Error::MissingAttribute {
                    attribute: key,
                    profile: name.to_string(),
                });
            }
            Ok(value)
        };
        let start_url = require("sso_start_url")?;
        let account_id = require("sso_account_id")?;
        let role_name = require("sso_role_name")?;
        let sso_region = require("sso_region")?;

        Ok(
            Profile::new(name.to_string(), start_url, account_id, role_name, sso_region)
                .set_sso_session(sso_session.map(String::from))
                .set_region(prop.get("region").map(|s| s.trim().to_string())),
        )
    }

    /// The shared credentials file, or an empty document when it does not exist yet.
    ///
    /// Values are read verbatim (no escape or quote processing) so sections this
    /// tool does not own are written back unchanged.
    pub fn load_credentials(&self) -> Result<Ini> {
        let verbatim = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        match Ini::load_from_file_opt(&self.aws_credentials_file, verbatim) {
            Ok(ini) => Ok(ini),
            Err(ini::Error::Io(err)) if err.kind() == ErrorKind::NotFound => Ok(Ini::new()),
            Err(source) => Err(Error::ConfigLoad {
                path: self.aws_credentials_file.clone(),
                source,
            }),
        }
    }

    /// Overwrites the credential keys of `[name]`; other keys in the section are kept.
    pub fn set_credentials(credentials: &mut Ini, name: &str, cred: &RoleCredential) {
        credentials
            .with_section(Some(name))
            .set("aws_access_key_id", cred.access_key_id())
            .set("aws_secret_access_key", cred.secret_access_key())
            .set("aws_session_token", cred.session_token())
            .set("aws_security_token", cred.session_token());
    }

    pub fn write_credentials(&self, credentials: &Ini) -> Result<()> {
        let path = &self.aws_credentials_file;
        let to_error = |source| Error::CredentialsWrite {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(to_error)?;
        }
        credentials
            .write_to_file_policy(path, EscapePolicy::Nothing)
            .map_err(to_error)
    }
}

fn path_from_env(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
