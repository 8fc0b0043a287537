pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "conduit")]
#[command(about = "Operate a local Conduit article store", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/conduit/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Act as this user
    #[arg(long = "as", value_name = "USERNAME", global = true)]
    pub acting_as: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage articles
    Article {
        #[command(subcommand)]
        action: ArticleAction,
    },
    /// Follow a user
    Follow { username: String },
    /// Unfollow a user
    Unfollow { username: String },
    /// Favorite an article
    Favorite { slug: String },
    /// Remove an article from favorites
    Unfavorite { slug: String },
    /// Show the acting user's home feed
    Feed {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Manage comments
    Comment {
        #[command(subcommand)]
        action: CommentAction,
    },
    /// List every tag in use
    Tags,
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Register a user
    Add {
        username: String,
        email: String,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        image: Option<String>,
    },
    /// Show a profile
    Show { username: String },
}

#[derive(Subcommand)]
pub enum ArticleAction {
    /// Publish an article as the acting user
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        body: String,
        /// Repeat for several tags
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Show one article
    Get { slug: String },
    /// Edit an article owned by the acting user
    Update {
        slug: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    /// Delete an article owned by the acting user
    Delete { slug: String },
    /// List articles, newest first
    List {
        #[arg(long, conflicts_with_all = ["favorited", "tag"])]
        author: Option<String>,
        #[arg(long, conflicts_with = "tag")]
        favorited: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
pub enum CommentAction {
    /// Comment on an article
    Add { slug: String, body: String },
    /// List an article's comments
    List { slug: String },
    /// Delete a comment
    Delete { slug: String, id: uuid::Uuid },
}

#[derive(Args)]
pub struct PageArgs {
    /// Page size
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Token from a previous page's `nextPageToken`
    #[arg(long)]
    pub page_token: Option<String>,
}
