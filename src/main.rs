use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use conduit::app::AppContext;
use conduit::cli::{commands, Cli, Commands};
use conduit::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(&config)?;
    let acting_as = cli.acting_as.as_deref();

    let result = match cli.command {
        Commands::User { action } => commands::user(&ctx, acting_as, action).await,
        Commands::Article { action } => commands::article(&ctx, acting_as, action).await,
        Commands::Follow { username } => commands::follow(&ctx, acting_as, &username).await,
        Commands::Unfollow { username } => commands::unfollow(&ctx, acting_as, &username).await,
        Commands::Favorite { slug } => commands::favorite(&ctx, acting_as, &slug).await,
        Commands::Unfavorite { slug } => commands::unfavorite(&ctx, acting_as, &slug).await,
        Commands::Feed { page } => commands::feed(&ctx, acting_as, page).await,
        Commands::Comment { action } => commands::comment(&ctx, acting_as, action).await,
        Commands::Tags => commands::tags(&ctx).await,
    };

    // Let background fan-out and cleanup finish before the process exits.
    ctx.shutdown().await;
    result?;

    Ok(())
}
