//! Pixorus CLI - admin client for the Pixorus storefront
//!
//! Signs in against the store's Cognito user pool and drives the catalog,
//! order and image-upload APIs from the terminal.

mod api;
mod auth;
mod config;
mod models;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::StoreClient;
use crate::auth::{CognitoProvider, SessionManager, SystemClock};
use crate::config::storage::FileStore;
use crate::config::Config;
use crate::models::ProductFields;

#[derive(Parser)]
#[command(name = "pixorus-cli")]
#[command(about = "Admin client for the Pixorus storefront", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with username and password (password from PIXORUS_PASSWORD or prompt)
    Login {
        /// Username (email) to sign in as
        #[arg(short, long)]
        username: Option<String>,

        /// Sign in again even if a valid session exists
        #[arg(short, long)]
        force: bool,
    },

    /// Log out and clear the stored session
    Logout,

    /// Show current session status
    Status,

    /// Print a valid id token, refreshing if needed
    Token,

    /// Show effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },

    /// List products
    Products {
        /// Only list products marked active
        #[arg(short, long)]
        active_only: bool,
    },

    /// Create, update or delete a product
    #[command(subcommand)]
    Product(ProductCommand),

    /// List categories
    Categories,

    /// Create, update or delete a category
    #[command(subcommand)]
    Category(CategoryCommand),

    /// List orders (admin)
    Orders,

    /// Place an order
    #[command(subcommand)]
    Order(OrderCommand),

    /// Show sales totals computed from all orders
    Stats,

    /// Upload a product image and print its public URL
    Upload {
        /// Image file (jpg, png, webp or gif)
        file: PathBuf,

        /// MIME type (guessed from the extension by default)
        #[arg(long)]
        content_type: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProductCommand {
    /// Create a product
    Add(ProductArgs),
    /// Change fields of a product
    Update {
        id: u64,
        #[command(flatten)]
        fields: ProductArgs,
    },
    /// Delete a product
    Delete { id: u64 },
}

#[derive(Args)]
struct ProductArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    original_price: Option<f64>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    badge: Option<String>,
    #[arg(long)]
    rating: Option<f64>,
    #[arg(long)]
    reviews: Option<u64>,
    /// Image URL (see `upload`)
    #[arg(long)]
    image: Option<String>,
    #[arg(long)]
    desc: Option<String>,
    #[arg(long)]
    active: Option<bool>,
}

impl From<ProductArgs> for ProductFields {
    fn from(a: ProductArgs) -> Self {
        Self {
            name: a.name,
            price: a.price,
            original_price: a.original_price,
            category: a.category,
            badge: a.badge,
            rating: a.rating,
            reviews: a.reviews,
            image: a.image,
            desc: a.desc,
            active: a.active,
        }
    }
}

#[derive(Subcommand)]
enum CategoryCommand {
    /// Create a category
    Add {
        #[arg(long)]
        name: String,
        /// Font Awesome icon class
        #[arg(long)]
        icon: Option<String>,
    },
    /// Rename a category or change its icon
    Update {
        id: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Delete a category
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum OrderCommand {
    /// Place an order for active products
    Place {
        /// Cart line as <product id>:<qty>; repeatable
        #[arg(long = "item", required = true, value_parser = api::parse_cart_line)]
        items: Vec<(u64, u32)>,
    },
}

fn build_session(config: &Config, http: reqwest::Client) -> Result<SessionManager> {
    let provider = CognitoProvider::new(&config.auth_config(), http);
    let store = FileStore::new(Config::session_dir()?);
    Ok(SessionManager::with_key(
        Arc::new(provider),
        Arc::new(store),
        Arc::new(SystemClock),
        config.session_key.clone(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::load()?;
    let http = config.http_client()?;
    let session = build_session(&config, http.clone())?;
    let client = StoreClient::new(http, &config.api_base, session.clone());

    match cli.command {
        Commands::Login { username, force } => {
            tracing::info!("Starting sign-in...");
            auth::login(&session, username, force).await?;
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout(&session).await?;
        }
        Commands::Status => {
            auth::status(&session).await?;
        }
        Commands::Token => {
            auth::print_token(&session).await?;
        }
        Commands::Config { init } => {
            if init {
                config.save()?;
                println!("Configuration written.");
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Products { active_only } => {
            api::list_products(&client, active_only).await?;
        }
        Commands::Product(cmd) => match cmd {
            ProductCommand::Add(args) => {
                api::add_product(&client, &args.into()).await?;
            }
            ProductCommand::Update { id, fields } => {
                api::update_product(&client, id, &fields.into()).await?;
            }
            ProductCommand::Delete { id } => {
                api::delete_product(&client, id).await?;
            }
        },
        Commands::Categories => {
            api::list_categories(&client).await?;
        }
        Commands::Category(cmd) => match cmd {
            CategoryCommand::Add { name, icon } => {
                api::add_category(&client, &name, icon.as_deref()).await?;
            }
            CategoryCommand::Update { id, name, icon } => {
                api::update_category(&client, id, &name, icon.as_deref()).await?;
            }
            CategoryCommand::Delete { id } => {
                api::delete_category(&client, id).await?;
            }
        },
        Commands::Orders => {
            api::list_orders(&client).await?;
        }
        Commands::Order(OrderCommand::Place { items }) => {
            api::place_order(&client, &items).await?;
        }
        Commands::Stats => {
            api::show_stats(&client).await?;
        }
        Commands::Upload { file, content_type } => {
            tracing::info!("Uploading {}...", file.display());
            api::upload_image(&client, &file, content_type.as_deref()).await?;
        }
    }

    Ok(())
}
