//! Larder CLI - Terminal driver for the storefront client.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! larder products list --search oats
//! larder products show 10
//! larder categories
//!
//! # Work with a user's cart
//! larder --user-id 9 --email ada@example.com cart add 10 --qty 2
//! larder --user-id 9 --email ada@example.com cart show
//!
//! # Place an order from the cart
//! larder --user-id 9 --email ada@example.com checkout \
//!     --full-name "Ada Lovelace" --address "1 Main St" --city Springfield \
//!     --state IL --zip-code 62701 --country US --payment-method paypal
//! ```
//!
//! # Environment Variables
//!
//! - `LARDER_API_URL` - Backing service root (required)
//! - `LARDER_API_TOKEN` - Bearer token for the service
//! - `LARDER_USER_ID`, `LARDER_USER_EMAIL` - Default identity
//! - `SENTRY_DSN` - Enables error reporting

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;

use clap::{Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use larder_core::{PaymentMethod, ShippingMethod};
use larder_storefront::{AppState, StorefrontConfig};

mod commands;

use commands::{CliError, Profile};

#[derive(Parser)]
#[command(name = "larder")]
#[command(author, version, about = "Larder storefront client")]
struct Cli {
    #[command(flatten)]
    profile: ProfileArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Who the command runs as. Required for cart, order and checkout commands.
#[derive(Args)]
struct ProfileArgs {
    /// Signed-in user ID
    #[arg(long, global = true, env = "LARDER_USER_ID")]
    user_id: Option<i64>,

    /// Signed-in user's email
    #[arg(long, global = true, env = "LARDER_USER_EMAIL")]
    email: Option<String>,

    /// Profile first name (pre-fills checkout)
    #[arg(long, global = true)]
    first_name: Option<String>,

    /// Profile last name (pre-fills checkout)
    #[arg(long, global = true)]
    last_name: Option<String>,

    /// Profile street address (pre-fills checkout)
    #[arg(long = "profile-address", global = true)]
    profile_address: Option<String>,

    /// Profile phone number (pre-fills checkout)
    #[arg(long = "profile-phone", global = true)]
    profile_phone: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse products
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// List product categories
    Categories,
    /// Manage the user's cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Inspect and cancel orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Place an order from the current cart
    Checkout(Box<CheckoutArgs>),
}

#[derive(Subcommand)]
enum ProductAction {
    /// List products
    List {
        /// Only products in this category
        #[arg(short, long)]
        category: Option<i64>,

        /// Free-text search term
        #[arg(short, long, conflicts_with = "category")]
        search: Option<String>,
    },
    /// Show one product
    Show {
        /// Product ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and totals
    Show,
    /// Add a product to the cart
    Add {
        /// Product ID
        product_id: i64,

        /// Units to add
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        qty: i64,
    },
    /// Set a cart line's quantity
    SetQty {
        /// Cart item ID
        item_id: i64,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        qty: i64,
    },
    /// Remove a cart line
    Remove {
        /// Cart item ID
        item_id: i64,
    },
    /// Remove every cart line
    Clear,
}

#[derive(Subcommand)]
enum OrderAction {
    /// List the user's orders, most recent first
    List,
    /// Show one order
    Show {
        /// Order ID
        id: i64,
    },
    /// Cancel a pending order
    Cancel {
        /// Order ID
        id: i64,
    },
}

#[derive(Args)]
struct CheckoutArgs {
    /// Recipient name (defaults to the profile name)
    #[arg(long)]
    full_name: Option<String>,

    /// Street address (defaults to the profile address)
    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    state: Option<String>,

    #[arg(long)]
    zip_code: Option<String>,

    #[arg(long)]
    country: Option<String>,

    /// Contact phone (defaults to the profile phone)
    #[arg(long)]
    phone: Option<String>,

    /// `standard` or `express`
    #[arg(long, default_value_t = ShippingMethod::Standard)]
    shipping_method: ShippingMethod,

    /// `credit_card`, `paypal` or `bank_transfer`
    #[arg(long, default_value_t = PaymentMethod::CreditCard)]
    payment_method: PaymentMethod,

    #[arg(long)]
    card_number: Option<String>,

    #[arg(long)]
    name_on_card: Option<String>,

    /// Card expiry as MM/YY
    #[arg(long)]
    expiry_date: Option<String>,

    #[arg(long)]
    cvv: Option<String>,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "larder_storefront=info,larder_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env before parsing so profile defaults can come from it
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if let Err(e) = run(cli, config, &mut out).await {
        let _ = out.flush();
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig, out: &mut impl Write) -> Result<(), CliError> {
    let app = AppState::new(config)?;
    let profile = Profile::from(cli.profile);

    match cli.command {
        Commands::Products { action } => match action {
            ProductAction::List { category, search } => {
                commands::catalog::list(&app, category, search, out).await?;
            }
            ProductAction::Show { id } => commands::catalog::show(&app, id, out).await?,
        },
        Commands::Categories => commands::catalog::categories(&app, out).await?,
        Commands::Cart { action } => {
            profile.sign_in(&app)?;
            match action {
                CartAction::Show => commands::cart::show(&app, out).await?,
                CartAction::Add { product_id, qty } => {
                    commands::cart::add(&app, product_id, qty, out).await?;
                }
                CartAction::SetQty { item_id, qty } => {
                    commands::cart::set_quantity(&app, item_id, qty, out).await?;
                }
                CartAction::Remove { item_id } => commands::cart::remove(&app, item_id, out).await?,
                CartAction::Clear => commands::cart::clear(&app, out).await?,
            }
        }
        Commands::Orders { action } => {
            profile.sign_in(&app)?;
            match action {
                OrderAction::List => commands::orders::list(&app, out).await?,
                OrderAction::Show { id } => commands::orders::show(&app, id, out).await?,
                OrderAction::Cancel { id } => commands::orders::cancel(&app, id, out).await?,
            }
        }
        Commands::Checkout(args) => {
            profile.sign_in(&app)?;
            commands::checkout::run(&app, (*args).into(), out).await?;
        }
    }
    Ok(())
}

impl From<ProfileArgs> for Profile {
    fn from(args: ProfileArgs) -> Self {
        Self {
            user_id: args.user_id,
            email: args.email,
            first_name: args.first_name,
            last_name: args.last_name,
            address: args.profile_address,
            phone: args.profile_phone,
        }
    }
}

impl From<CheckoutArgs> for commands::checkout::CheckoutInput {
    fn from(args: CheckoutArgs) -> Self {
        Self {
            shipping: larder_storefront::checkout::ShippingUpdate {
                full_name: args.full_name,
                address: args.address,
                city: args.city,
                state: args.state,
                zip_code: args.zip_code,
                country: args.country,
                phone: args.phone,
            },
            shipping_method: args.shipping_method,
            payment_method: args.payment_method,
            payment: larder_storefront::checkout::PaymentUpdate {
                card_number: args.card_number,
                name_on_card: args.name_on_card,
                expiry_date: args.expiry_date,
                cvv: args.cvv,
            },
        }
    }
}
