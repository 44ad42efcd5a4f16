use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;

use vaultcore::version::format_version_info;
use vaultcore::{ApiClient, AuthService, ClientConfig, RequestOptions, Result, VaultError};

use crate::ui::UI;
use crate::{Commands, ConfigCommand, LoginArgs, RequestArgs};

/// CLI handler for processing commands
pub struct CliHandler {
    config_path: Option<PathBuf>,
    ui: UI,
}

impl CliHandler {
    /// Create a new CLI handler with a custom config path
    pub fn with_config_path(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            ui: UI::new(),
        }
    }

    fn load_config(&self) -> Result<ClientConfig> {
        ClientConfig::load(self.config_path.as_deref())
    }

    fn auth_service(&self) -> Result<AuthService> {
        let client = ApiClient::from_config(self.load_config()?)?;
        client.on_session_expired(|| {
            UI::new().warn("Session expired. Sign in again with `vaultcore login-url`.");
        });
        Ok(AuthService::new(client))
    }

    /// Execute a CLI command
    pub async fn execute(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::LoginUrl => self.handle_login_url(false),
            Commands::RegisterUrl => self.handle_login_url(true),
            Commands::Login(args) => self.handle_login(args).await,
            Commands::Logout => self.handle_logout().await,
            Commands::Status => self.handle_status(),
            Commands::Refresh => self.handle_refresh().await,
            Commands::Request(args) => self.handle_request(args).await,
            Commands::Config(args) => match args.command {
                ConfigCommand::Show => self.handle_config_show(),
            },
        }
    }

    fn handle_login_url(&self, register: bool) -> Result<()> {
        let service = self.auth_service()?;
        let url = if register {
            service.register_url()?
        } else {
            service.login_url()?
        };
        println!("{}", url);
        Ok(())
    }

    async fn handle_login(&mut self, args: LoginArgs) -> Result<()> {
        let service = self.auth_service()?;
        let outcome = service.login_with_code(&args.code).await?;

        let name = outcome
            .identity
            .map(|identity| identity.display_name)
            .unwrap_or_else(|| "User".to_string());
        let role = if outcome.is_admin { " (admin)" } else { "" };
        self.ui.done(&format!("Signed in as {}{}", name, role));
        Ok(())
    }

    async fn handle_logout(&mut self) -> Result<()> {
        let service = self.auth_service()?;
        service.logout().await;
        self.ui.done("Signed out");
        Ok(())
    }

    fn handle_status(&mut self) -> Result<()> {
        let service = self.auth_service()?;
        let status = service.status();

        let mut rows = vec![("State", Some(self.ui.session_state(&status)))];

        if status.authenticated || status.expired {
            let identity = status.identity.clone();
            let roles = status.roles.iter().cloned().collect::<Vec<_>>().join(", ");

            rows.extend([
                ("User", identity.as_ref().map(|i| i.display_name.clone())),
                ("Email", identity.as_ref().and_then(|i| i.email.clone())),
                ("Subject", identity.and_then(|i| i.subject)),
                ("Roles", (!roles.is_empty()).then_some(roles)),
                ("Admin", Some(if status.is_admin { "yes" } else { "no" }.to_string())),
                ("Expires", status.expires_at.map(|at| at.to_rfc3339())),
            ]);
        }
        rows.push((
            "Refresh token",
            Some(if status.has_refresh_token { "present" } else { "missing" }.to_string()),
        ));

        self.ui.fields(&format_version_info(), &rows);
        Ok(())
    }

    async fn handle_refresh(&mut self) -> Result<()> {
        let service = self.auth_service()?;
        service.client().refresh_session().await?;
        self.ui.done("Session refreshed");
        Ok(())
    }

    async fn handle_request(&mut self, args: RequestArgs) -> Result<()> {
        let service = self.auth_service()?;
        let options = build_request_options(&args).await?;

        let value: Value = service
            .client()
            .request_value(&args.endpoint, options)
            .await?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        Ok(())
    }

    fn handle_config_show(&mut self) -> Result<()> {
        let config = self.load_config()?;
        let session = config
            .session_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "(in memory)".to_string());

        self.ui.fields(
            "Configuration",
            &[
                ("API URL", Some(config.api_url.clone())),
                ("Timeout", Some(format!("{}s", config.timeout))),
                ("Proxy", Some(config.use_proxy.to_string())),
                ("Session file", Some(session)),
                ("Identity provider", Some(config.identity.url.clone())),
                ("Realm", Some(config.identity.realm.clone())),
                ("Client ID", Some(config.identity.client_id.clone())),
                ("Redirect URI", Some(config.identity.redirect_uri.clone())),
            ],
        );
        Ok(())
    }
}

async fn build_request_options(args: &RequestArgs) -> Result<RequestOptions> {
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .map_err(|_| VaultError::invalid_input(format!("Invalid HTTP method: {}", args.method)))?;
    let mut options = RequestOptions::new(method);

    for header in &args.headers {
        let (name, value) = header.split_once(':').ok_or_else(|| {
            VaultError::invalid_input(format!("Header must be `Name: value`: {}", header))
        })?;
        options = options.header(name.trim(), value.trim());
    }

    if let Some(data) = &args.data {
        let body = match data.strip_prefix('@') {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| VaultError::file_read(format!("Failed to read {}", path), e))?,
            None => data.clone(),
        };

        options = match serde_json::from_str::<Value>(&body) {
            Ok(json) => options.json(json),
            Err(_) => options.text(body),
        };
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(method: &str, data: Option<&str>, headers: &[&str]) -> RequestArgs {
        RequestArgs {
            endpoint: "/api/wallet".to_string(),
            method: method.to_string(),
            data: data.map(String::from),
            headers: headers.iter().map(|h| h.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_build_request_options() {
        let options = build_request_options(&args("post", Some(r#"{"amount":5}"#), &["X-Trace: 1"]))
            .await
            .unwrap();
        assert_eq!(options.method(), &Method::POST);
    }

    #[tokio::test]
    async fn test_bad_header_is_rejected() {
        let err = build_request_options(&args("GET", None, &["no-colon"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), vaultcore::ErrorCode::InvalidInput);
    }

    #[tokio::test]
    async fn test_body_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.json");
        std::fs::write(&path, r#"{"symbol":"BTC"}"#).unwrap();

        let data = format!("@{}", path.display());
        assert!(build_request_options(&args("POST", Some(&data), &[])).await.is_ok());

        let missing = format!("@{}", dir.path().join("missing.json").display());
        assert!(build_request_options(&args("POST", Some(&missing), &[])).await.is_err());
    }
}
