use crate::aws_sso::{Profile, RoleCredential};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Name of an entry in the AWS CLI credential cache (`~/.aws/cli/cache`).
///
/// The AWS CLI hashes the compact, key-sorted JSON of the role arguments, so
/// the digest does not depend on the order the attributes were collected in.
#[derive(Debug, PartialEq, Clone)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_profile(profile: &Profile) -> Result<Self> {
        let source = match profile.sso_session() {
            Some(session) => ("sessionName", session),
            None => ("startUrl", profile.sso_start_url()),
        };
        Self::from_args([
            ("accountId", profile.sso_account_id()),
            ("roleName", profile.sso_role_name()),
            source,
        ])
    }

    fn from_args<'a, I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let args: BTreeMap<&str, &str> = args.into_iter().collect();
        let mut hasher = Sha1::new();
        hasher.update(serde_json::to_vec(&args)?);
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

#[derive(Deserialize)]
struct CacheEntry {
    #[serde(rename = "Credentials")]
    credentials: RoleCredential,
}

/// Reads the cached credentials for `key`; a missing file is `Ok(None)`.
pub fn read_cached(cache_path: &Path, key: &CacheKey) -> Result<Option<RoleCredential>> {
    let path = cache_path.join(key.file_name());
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(Error::CacheRead { path, source }),
    };
    let entry: CacheEntry =
        serde_json::from_str(&data).map_err(|source| Error::CacheParse { path, source })?;
    Ok(Some(entry.credentials))
}

enum Layout {
    Rfc3339,
    Offset(&'static str),
    Utc(&'static str),
}

// tried in order
const TIME_LAYOUTS: [Layout; 3] = [
    Layout::Rfc3339,
    Layout::Offset("%Y-%m-%dT%H:%M:%S%z"),
    Layout::Utc("%Y-%m-%dT%H:%M:%SUTC"),
];

pub fn parse_expiration(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    TIME_LAYOUTS.iter().find_map(|layout| match layout {
        Layout::Rfc3339 => DateTime::parse_from_rfc3339(value).ok().map(|t| t.with_timezone(&Utc)),
        Layout::Offset(fmt) => DateTime::parse_from_str(value, fmt)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Layout::Utc(fmt) => NaiveDateTime::parse_from_str(value, fmt)
            .ok()
            .map(|t| Utc.from_utc_datetime(&t)),
    })
}

/// Unparsable timestamps count as expired.
pub fn is_expired(expiration: &str, now: DateTime<Utc>) -> bool {
    match parse_expiration(expiration) {
        Some(expires) => expires <= now,
        None => true,
    }
}
