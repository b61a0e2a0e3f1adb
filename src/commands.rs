//! The four ways resolved credentials leave the process.

use crate::aws_sso::SSO;
use crate::browser::open_browser;
use crate::config::Config;
use crate::error::Result;
use crate::federation;
use crate::runner::CommandRunner;
use std::io::{self, Write};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleOptions {
    pub force_logout: bool,
    /// Seconds to wait after opening the logout page.
    pub logout_wait: u64,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            force_logout: true,
            logout_wait: 1,
        }
    }
}

impl<R: CommandRunner> SSO<R> {
    /// Prints `export` statements for the profile's credentials.
    pub async fn export<W: Write>(&self, profile_name: &str, out: &mut W) -> Result<()> {
        let profile = self.config().profile(profile_name)?;
        let cred = self.role_credentials(&profile, true, out).await?;

        print_env_variable(out, "AWS_ACCESS_KEY_ID", cred.access_key_id())?;
        print_env_variable(out, "AWS_SECRET_ACCESS_KEY", cred.secret_access_key())?;
        print_env_variable(out, "AWS_SESSION_TOKEN", cred.session_token())?;
        print_env_variable(out, "AWS_SECURITY_TOKEN", cred.session_token())?;
        if let Some(region) = profile.region() {
            print_env_variable(out, "AWS_DEFAULT_REGION", region)?;
        }
        Ok(())
    }

    /// Prints the credential-process JSON payload.
    pub async fn process<W: Write>(&self, profile_name: &str, out: &mut W) -> Result<()> {
        tracing::info!("processing credentials for profile: {}", profile_name);
        let profile = self.config().profile(profile_name)?;
        let cred = self.role_credentials(&profile, true, out).await?;

        let payload = serde_json::to_string(&cred.with_version(1))?;
        writeln!(out, "{}", payload)?;
        Ok(())
    }

    /// Stores the profile's credentials in the shared credentials file.
    pub async fn import<W: Write>(&self, profile_name: &str, out: &mut W) -> Result<()> {
        let profile = self.config().profile(profile_name)?;
        let cred = self.role_credentials(&profile, false, out).await?;

        let mut credentials = self.config().load_credentials()?;
        Config::set_credentials(&mut credentials, profile_name, &cred);
        self.config().write_credentials(&credentials)?;

        writeln!(
            out,
            "Wrote credentials to profile [{}] in {}",
            profile_name,
            self.config().credentials_file().display()
        )?;
        Ok(())
    }

    /// Signs into the web console, logging out of any previous session first when asked.
    pub async fn console<W: Write>(
        &self,
        profile_name: &str,
        options: &ConsoleOptions,
        out: &mut W,
    ) -> Result<()> {
        let profile = self.config().profile(profile_name)?;
        let cred = self.role_credentials(&profile, true, out).await?;

        let token =
            federation::signin_token(self.http(), self.config().federation_endpoint(), &cred)
                .await?;
        let signin_url =
            federation::signin_url(profile.sso_account_id(), profile.sso_region(), &token)?;

        if options.force_logout || options.logout_wait > 0 {
            let logout_url = federation::logout_url(profile.sso_region());
            open_browser(self.runner(), &logout_url, out)?;
            if options.logout_wait > 0 {
                tracing::debug!("waiting {}s for logout", options.logout_wait);
                tokio::time::sleep(Duration::from_secs(options.logout_wait)).await;
            }
        }
        open_browser(self.runner(), signin_url.as_str(), out)?;
        Ok(())
    }
}

fn print_env_variable<W: Write>(out: &mut W, name: &str, value: &str) -> io::Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    writeln!(out, "export {}={}", name, shell_quote(value))
}

/// Double-quotes `value` for POSIX shells; only `\`, `"`, `$` and `` ` `` stay special inside.
fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runner::fake::FakeRunner;
    use crate::testutil::{write_cache, Fixture, FUTURE, PROFILE_DEV};

    fn fixture() -> Fixture {
        let fixture = Fixture::new(PROFILE_DEV);
        fixture.cache_profile("dev", "ASIACACHED", FUTURE);
        fixture
    }

    #[tokio::test]
    async fn test_export() {
        let fixture = fixture();
        let sso = SSO::new(fixture.config(), FakeRunner::succeeding("arn"));
        let mut out = Vec::new();
        sso.export("dev", &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "export AWS_ACCESS_KEY_ID=\"ASIACACHED\"\n\
             export AWS_SECRET_ACCESS_KEY=\"secret\"\n\
             export AWS_SESSION_TOKEN=\"token\"\n\
             export AWS_SECURITY_TOKEN=\"token\"\n\
             export AWS_DEFAULT_REGION=\"eu-west-1\"\n"
        );
    }

    #[tokio::test]
    async fn test_export_skips_empty_values() {
        let fixture = Fixture::new(
            "[profile bare]\n\
             sso_start_url = https://x.awsapps.com/start\n\
             sso_account_id = 123456789012\n\
             sso_role_name = Admin\n\
             sso_region = us-east-1\n",
        );
        let profile = fixture.config().profile("bare").unwrap();
        let file_name = crate::cache::CacheKey::for_profile(&profile)
            .unwrap()
            .file_name();
        std::fs::create_dir_all(fixture.cache_dir()).unwrap();
        std::fs::write(
            fixture.cache_dir().join(file_name),
            serde_json::json!({
                "Credentials": {
                    "AccessKeyId": "ASIABARE",
                    "SecretAccessKey": "secret",
                    "SessionToken": "",
                    "Expiration": FUTURE
                }
            })
            .to_string(),
        )
        .unwrap();

        let sso = SSO::new(fixture.config(), FakeRunner::succeeding("arn"));
        let mut out = Vec::new();
        sso.export("bare", &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(!out.contains("AWS_SESSION_TOKEN"));
        assert!(!out.contains("AWS_DEFAULT_REGION"));
    }

    #[tokio::test]
    async fn test_process() {
        let fixture = fixture();
        let sso = SSO::new(fixture.config(), FakeRunner::succeeding("arn"));
        let mut out = Vec::new();
        sso.process("dev", &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 1);
        let payload: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "Version": 1,
                "AccessKeyId": "ASIACACHED",
                "SecretAccessKey": "secret",
                "SessionToken": "token",
                "Expiration": FUTURE
            })
        );
    }

    #[tokio::test]
    async fn test_import() {
        let fixture = fixture();
        let config = fixture.config();
        std::fs::write(
            config.credentials_file(),
            "[dev]\nregion = eu-west-1\naws_access_key_id = OLD\n\n[prod]\naws_access_key_id = PROD\n\n\
             [win]\ncredential_process = C:\\tools\\fetch.exe --profile win\n\n\
             [quoted]\nrole_arn = \"arn:aws:iam::123456789012:role/Admin\"\n",
        )
        .unwrap();

        let sso = SSO::new(config.clone(), FakeRunner::succeeding("arn"));
        let mut out = Vec::new();
        sso.import("dev", &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!(
                "Wrote credentials to profile [dev] in {}\n",
                config.credentials_file().display()
            )
        );

        let written = config.load_credentials().unwrap();
        let dev = written.section(Some("dev")).unwrap();
        assert_eq!(dev.get("aws_access_key_id"), Some("ASIACACHED"));
        assert_eq!(dev.get("aws_security_token"), Some("token"));
        assert_eq!(dev.get("region"), Some("eu-west-1"));
        assert_eq!(
            written.section(Some("prod")).unwrap().get("aws_access_key_id"),
            Some("PROD")
        );

        let raw = std::fs::read_to_string(config.credentials_file()).unwrap();
        assert!(raw.contains("C:\\tools\\fetch.exe --profile win"), "{raw}");
        assert!(raw.contains("\"arn:aws:iam::123456789012:role/Admin\""), "{raw}");
    }

    #[tokio::test]
    async fn test_import_reports_refresh() {
        let fixture = Fixture::new(PROFILE_DEV);
        let cache_dir = fixture.cache_dir();
        let profile = fixture.config().profile("dev").unwrap();
        let file_name = crate::cache::CacheKey::for_profile(&profile)
            .unwrap()
            .file_name();
        let runner = FakeRunner::new(move |_, _| {
            write_cache(&cache_dir, &file_name, "ASIANEW", FUTURE);
            Ok(crate::runner::CommandOutput {
                success: true,
                stdout: String::from("arn:aws:sts::123456789012:assumed-role/Admin/me\n"),
                stderr: String::new(),
            })
        });
        let sso = SSO::new(fixture.config(), runner);
        let mut out = Vec::new();
        sso.import("dev", &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with(
            "Updated credentials for: arn:aws:sts::123456789012:assumed-role/Admin/me\n"
        ));
    }

    #[tokio::test]
    async fn test_unknown_profile() {
        let fixture = fixture();
        let sso = SSO::new(fixture.config(), FakeRunner::succeeding("arn"));
        let err = sso.export("prod", &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, Error::ProfileNotFound { .. }));
        assert_eq!(sso.runner().call_count(), 0);
    }

    #[tokio::test]
    async fn test_console() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/federation")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"SigninToken":"one-time-token"}"#)
            .create_async()
            .await;

        let fixture = fixture();
        let config = fixture
            .config()
            .set_federation_endpoint(format!("{}/federation", server.url()));
        let runner = FakeRunner::succeeding("arn").with_spawnable(&["open"]);
        let sso = SSO::new(config, runner);

        let options = ConsoleOptions {
            force_logout: true,
            logout_wait: 0,
        };
        let mut out = Vec::new();
        sso.console("dev", &options, &mut out).await.unwrap();
        assert!(out.is_empty());

        let spawned = sso.runner().spawned();
        assert_eq!(spawned.len(), 2);
        assert_eq!(
            spawned[0],
            vec![
                "open",
                "https://us-east-1.console.aws.amazon.com/console/logout!doLogout"
            ]
        );
        let signin = url::Url::parse(&spawned[1][1]).unwrap();
        assert_eq!(signin.host_str(), Some("123456789012.signin.aws.amazon.com"));
        assert!(signin
            .query_pairs()
            .any(|(k, v)| k == "SigninToken" && v == "one-time-token"));
    }

    #[tokio::test]
    async fn test_console_without_logout_prints_url() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/federation")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"SigninToken":"one-time-token"}"#)
            .create_async()
            .await;

        let fixture = fixture();
        let config = fixture
            .config()
            .set_federation_endpoint(format!("{}/federation", server.url()));
        let sso = SSO::new(config, FakeRunner::succeeding("arn"));

        let options = ConsoleOptions {
            force_logout: false,
            logout_wait: 0,
        };
        let mut out = Vec::new();
        sso.console("dev", &options, &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with(
            "Please open your browser and navigate to: https://123456789012.signin.aws.amazon.com/federation?"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_logout_wait_without_force() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/federation")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"SigninToken":"one-time-token"}"#)
            .create_async()
            .await;

        let fixture = fixture();
        let config = fixture
            .config()
            .set_federation_endpoint(format!("{}/federation", server.url()));
        let runner = FakeRunner::succeeding("arn").with_spawnable(&["xdg-open"]);
        let sso = SSO::new(config, runner);

        let options = ConsoleOptions {
            force_logout: false,
            logout_wait: 1,
        };
        let start = tokio::time::Instant::now();
        sso.console("dev", &options, &mut Vec::new()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));

        let spawned = sso.runner().spawned();
        assert_eq!(spawned.len(), 2);
        assert_eq!(
            spawned[0],
            vec![
                "xdg-open",
                "https://us-east-1.console.aws.amazon.com/console/logout!doLogout"
            ]
        );
        assert!(spawned[1][1].starts_with("https://123456789012.signin.aws.amazon.com/federation?"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("ASIAFAKE"), "\"ASIAFAKE\"");
        assert_eq!(shell_quote("a/b+c=="), "\"a/b+c==\"");
        assert_eq!(shell_quote(r#"$x "y" `z` \"#), r#""\$x \"y\" \`z\` \\""#);
        assert_eq!(shell_quote("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_console_defaults() {
        let options = ConsoleOptions::default();
        assert!(options.force_logout);
        assert_eq!(options.logout_wait, 1);
    }
}
