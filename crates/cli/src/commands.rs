//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use dealdesk_core::ClientConfig;
use dealdesk_http::ApiClient;
use reqwest::Method;
use serde_json::Value;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::info;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session credentials
    Login {
        /// Merchant account username
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(long, env = "DEALDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session credentials
    Logout,

    /// Show the store profile of the logged in merchant
    Whoami,

    /// Product catalog operations
    Products {
        #[command(subcommand)]
        command: ProductCommands,
    },

    /// Order viewing
    Orders {
        #[command(subcommand)]
        command: OrderCommands,
    },

    /// Store branches
    Branches {
        #[command(subcommand)]
        command: BranchCommands,
    },

    /// Send an arbitrary authenticated request
    Request {
        /// HTTP method (GET, POST, PATCH, DELETE, ...)
        method: String,

        /// Path relative to the API base URL
        path: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ProductCommands {
    /// List products
    List {
        #[arg(long)]
        page: Option<u32>,
    },
    /// Show one product
    Get { id: u64 },
    /// Delete a product
    Delete { id: u64 },
}

#[derive(Subcommand)]
pub enum OrderCommands {
    /// List orders
    List {
        #[arg(long)]
        page: Option<u32>,
    },
    /// Show one order
    Get { id: u64 },
}

#[derive(Subcommand)]
pub enum BranchCommands {
    /// List branches
    List,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the default configuration as JSON
    Init {
        /// Output file path
        output: PathBuf,
    },
}

impl Commands {
    pub async fn execute(self, client: &ApiClient, config: &ClientConfig) -> Result<()> {
        match self {
            Self::Login { username, password } => {
                let password = match password {
                    Some(password) => password,
                    None => read_password()?,
                };
                client.login(&username, &password).await?;
                println!("Logged in as {username}");
                Ok(())
            }
            Self::Logout => {
                client.logout()?;
                println!("Logged out");
                Ok(())
            }
            Self::Whoami => print_json(&client.get_store().await?),
            Self::Products { command } => command.execute(client).await,
            Self::Orders { command } => command.execute(client).await,
            Self::Branches {
                command: BranchCommands::List,
            } => print_json(&client.list_branches().await?),
            Self::Request { method, path, body } => {
                raw_request(client, &method, &path, body.as_deref()).await
            }
            Self::Config { command } => command.execute(config),
        }
    }
}

impl ProductCommands {
    async fn execute(self, client: &ApiClient) -> Result<()> {
        match self {
            Self::List { page } => print_json(&client.list_products(page).await?),
            Self::Get { id } => print_json(&client.get_product(id).await?),
            Self::Delete { id } => {
                client.delete_product(id).await?;
                println!("Deleted product {id}");
                Ok(())
            }
        }
    }
}

impl OrderCommands {
    async fn execute(self, client: &ApiClient) -> Result<()> {
        match self {
            Self::List { page } => print_json(&client.list_orders(page).await?),
            Self::Get { id } => print_json(&client.get_order(id).await?),
        }
    }
}

impl ConfigCommands {
    fn execute(self, config: &ClientConfig) -> Result<()> {
        match self {
            Self::Show => print_json(config),
            Self::Init { output } => {
                if output.exists() {
                    bail!("{} already exists", output.display());
                }
                let content = serde_json::to_string_pretty(&ClientConfig::default())?;
                std::fs::write(&output, content)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                info!("Wrote default configuration to {}", output.display());
                Ok(())
            }
        }
    }
}

async fn raw_request(
    client: &ApiClient,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> Result<()> {
    let method = parse_method(method)?;
    let body: Option<Value> = body
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("Request body is not valid JSON")?;

    let response = client.request(method, path, body, None).await?;
    let status = response.status();
    let text = response.text().await?;

    println!("{status}");
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{text}"),
        Err(_) => {}
    }

    if !status.is_success() {
        bail!("request failed with status {status}");
    }
    Ok(())
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {method}"))
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("no password given");
    }
    Ok(password)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("patch").unwrap(), Method::PATCH);
        assert_eq!(parse_method("GET").unwrap(), Method::GET);
        assert!(parse_method("NOT A METHOD").is_err());
    }

    #[test]
    fn test_config_init_writes_loadable_file() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("dealdesk.json");

        ConfigCommands::Init {
            output: output.clone(),
        }
        .execute(&ClientConfig::default())
        .unwrap();

        let loaded = ClientConfig::load(Some(output.as_path())).unwrap();
        assert_eq!(loaded.timeout_secs, ClientConfig::default().timeout_secs);

        // Refuses to overwrite
        let again = ConfigCommands::Init { output }.execute(&ClientConfig::default());
        assert!(again.is_err());
    }
}
