use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can make a subcommand fail.
#[derive(Error, Debug)]
pub enum Error {
    #[error("must specify --profile")]
    MissingProfile,

    #[error("unable to locate the home directory")]
    NoHomeDir,

    #[error("failed to load {}: {source}", .path.display())]
    ConfigLoad { path: PathBuf, source: ini::Error },

    #[error("invalid section pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("cannot find profile [{section}] in {}", .path.display())]
    ProfileNotFound { section: String, path: PathBuf },

    #[error("missing required attribute {attribute:?} in profile {profile}")]
    MissingAttribute {
        attribute: &'static str,
        profile: String,
    },

    #[error("failed to run `{program}`: {source}")]
    Spawn { program: String, source: io::Error },

    /// The external CLI could not refresh its cache, usually because the SSO session is gone.
    #[error("{detail}\nplease login with 'aws sso login --profile={profile}'")]
    NotAuthenticated { profile: String, detail: String },

    #[error("failed to read cache file {}: {source}", .path.display())]
    CacheRead { path: PathBuf, source: io::Error },

    #[error("corrupt cache file {}: {source}", .path.display())]
    CacheParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("could not retrieve credentials for '{0}'")]
    NoCredentials(String),

    #[error("credentials for '{0}' are expired, please login with 'aws sso login --profile={0}'")]
    Expired(String),

    #[error("federation request failed: {0}")]
    Federation(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to write {}: {source}", .path.display())]
    CredentialsWrite { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
