use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Password;

use hail_auth::auth::{
    AuthClient, CopyPasteLoginOptions, CreateSessionRequest, CreateUserRequest, UserinfoOptions,
};
use hail_auth::config::{CliArgs, Command, TransportSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    // Initialize logging with a configured level
    let log_level = args.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = TransportSettings {
        max_retries: args.http_retries,
        ..TransportSettings::from_env()
    };
    let mut client = AuthClient::from_env()
        .context("Failed to load auth configuration")?
        .with_settings(settings);

    match args.command {
        Command::Login { token, namespace } => {
            let token = match token {
                Some(token) => token,
                None => Password::new()
                    .with_prompt("Paste the token shown in your browser")
                    .interact()
                    .context("Failed to read copy-paste token")?,
            };
            let options = CopyPasteLoginOptions { namespace };
            let outcome = client
                .copy_paste_login(token.trim(), &options)
                .await
                .context("Login failed")?;
            println!(
                "Logged in as {} in namespace {}.",
                outcome.username, outcome.namespace
            );
        }

        Command::User { session_id } => {
            let options = UserinfoOptions { session_id };
            match client.get_userinfo(&options).await? {
                Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
                None => {
                    println!("Not logged in.");
                    std::process::exit(1);
                }
            }
        }

        Command::CreateUser {
            username,
            email,
            developer,
            service_account,
        } => {
            let request = CreateUserRequest::new(username, email)
                .developer(developer)
                .service_account(service_account);
            let resp = client.create_user(&request).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }

        Command::DeleteUser { username } => {
            let resp = client.delete_user(&username).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }

        Command::CreateSession {
            username,
            max_age_secs,
        } => {
            let request = CreateSessionRequest {
                username,
                max_age_secs,
            };
            let resp = client.create_session(&request).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }

        Command::DeleteSession { session_id } => {
            let resp = client.delete_session(&session_id).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
    }

    Ok(())
}
