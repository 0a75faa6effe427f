//! Medusa Store CLI - a terminal storefront.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! medusa-store products list --limit 10
//! medusa-store products show classic-tee
//!
//! # Build a cart (the cart id persists in ~/.medusa-store/cart.json)
//! medusa-store cart add variant_01H 2
//! medusa-store cart set item_01H 0   # removes the line
//! medusa-store cart show
//!
//! # Check out with the manual test provider
//! medusa-store checkout --email ada@example.com --first-name Ada \
//!     --last-name Lovelace --address "1 Main St" --city Springfield \
//!     --postal-code 12345
//!
//! # Or pay by card
//! medusa-store checkout ... --provider pp_stripe_stripe --card-token tok_visa
//! ```
//!
//! # Environment Variables
//!
//! - `MEDUSA_BASE_URL` - Commerce backend URL (default `http://localhost:9000`)
//! - `MEDUSA_PUBLISHABLE_API_KEY` - Publishable API key
//! - `STRIPE_PUBLISHABLE_KEY` - Needed for card payments
//! - `CART_STORE_PATH` - Where the cart id is kept

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use medusa_store_storefront::config::StorefrontConfig;
use medusa_store_storefront::error::{self, StorefrontError};
use medusa_store_storefront::telemetry;

mod commands;
mod render;

use commands::checkout::CheckoutArgs;

#[derive(Parser)]
#[command(name = "medusa-store")]
#[command(author, version, about = "Terminal storefront for a Medusa backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Check out the cart and place an order
    Checkout(CheckoutArgs),
    /// Look up orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List products
    List {
        /// Page size
        #[arg(short, long, default_value_t = 20)]
        limit: u32,

        /// Offset into the listing
        #[arg(short, long, default_value_t = 0)]
        offset: u32,
    },
    /// Show one product and its variants
    Show {
        /// Product handle
        handle: String,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a variant to the cart
    Add {
        /// Variant id
        variant_id: String,

        /// Quantity to add
        #[arg(default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (0 removes the line)
    Set {
        /// Line item id
        line_id: String,

        /// New quantity
        quantity: u32,
    },
    /// Remove a line
    Remove {
        /// Line item id
        line_id: String,
    },
    /// Forget the cart (the remote cart is left alone)
    Clear,
}

#[derive(Subcommand)]
enum OrderAction {
    /// Show a placed order
    Show {
        /// Order id
        order_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Configuration error: {e}");
            }
            std::process::exit(2);
        }
    };

    let _sentry_guard = telemetry::init(&config);

    if let Err(e) = run(cli, &config).await {
        error::report(&e);
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Error: {}", e.shopper_message());
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &StorefrontConfig) -> Result<(), StorefrontError> {
    let store = commands::Storefront::connect(config)?;

    match cli.command {
        Commands::Products { action } => match action {
            ProductsAction::List { limit, offset } => {
                commands::products::list(&store, limit, offset).await?;
            }
            ProductsAction::Show { handle } => commands::products::show(&store, &handle).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&store).await,
            CartAction::Add {
                variant_id,
                quantity,
            } => commands::cart::add(&store, &variant_id, quantity).await?,
            CartAction::Set { line_id, quantity } => {
                commands::cart::set(&store, &line_id, quantity).await?;
            }
            CartAction::Remove { line_id } => commands::cart::remove(&store, &line_id).await?,
            CartAction::Clear => commands::cart::clear(&store),
        },
        Commands::Checkout(args) => {
            let confirmer = commands::checkout::confirmer(config);
            commands::checkout::run(&store, confirmer, args).await?;
        }
        Commands::Order { action } => match action {
            OrderAction::Show { order_id } => commands::order::show(&store, &order_id).await?,
        },
    }
    Ok(())
}
