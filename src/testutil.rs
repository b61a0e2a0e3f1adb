use crate::aws_sso::Profile;
use crate::cache::CacheKey;
use crate::config::Config;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const FUTURE: &str = "2099-01-01T00:00:00Z";
pub const PAST: &str = "2001-01-01T00:00:00Z";

pub const PROFILE_DEV: &str = "[profile dev]
sso_start_url = https://x.awsapps.com/start
sso_account_id = 123456789012
sso_role_name = Admin
sso_region = us-east-1
region = eu-west-1
";

/// Writes an AWS CLI cache entry with a fixed secret and session token.
pub fn write_cache(cache_dir: &Path, file_name: &str, access_key_id: &str, expiration: &str) {
    fs::create_dir_all(cache_dir).unwrap();
    let entry = serde_json::json!({
        "ProviderType": "sso",
        "Credentials": {
            "AccessKeyId": access_key_id,
            "SecretAccessKey": "secret",
            "SessionToken": "token",
            "Expiration": expiration
        }
    });
    fs::write(cache_dir.join(file_name), entry.to_string()).unwrap();
}

/// A throwaway `~/.aws` with a config file and an empty cache directory.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new(config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config"), config).unwrap();
        Self { dir }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cli").join("cache")
    }

    pub fn config(&self) -> Config {
        Config::new(
            self.dir.path().join("config"),
            self.dir.path().join("credentials"),
            self.cache_dir(),
        )
    }

    pub fn cache_credentials(&self, profile: &Profile, access_key_id: &str, expiration: &str) {
        let key = CacheKey::for_profile(profile).unwrap();
        write_cache(&self.cache_dir(), &key.file_name(), access_key_id, expiration);
    }

    pub fn cache_profile(&self, name: &str, access_key_id: &str, expiration: &str) {
        let profile = self.config().profile(name).unwrap();
        self.cache_credentials(&profile, access_key_id, expiration);
    }
}
