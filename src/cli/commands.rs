use serde::Serialize;
use uuid::Uuid;

use super::{ArticleAction, CommentAction, PageArgs, UserAction};
use crate::app::{AppContext, ConduitError, Result};
use crate::domain::{ArticleUpdate, NewArticle};
use crate::listing::ListingDimension;

/// The acting user, required for mutations.
async fn actor(ctx: &AppContext, acting_as: Option<&str>) -> Result<Uuid> {
    let username = acting_as.ok_or_else(|| {
        ConduitError::InvalidInput("--as <USERNAME> is required for this command".into())
    })?;
    Ok(ctx.users.get_by_username(username).await?.id)
}

/// The acting user if one was named; anonymous otherwise.
async fn viewer(ctx: &AppContext, acting_as: Option<&str>) -> Result<Option<Uuid>> {
    match acting_as {
        Some(_) => actor(ctx, acting_as).await.map(Some),
        None => Ok(None),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn user(ctx: &AppContext, acting_as: Option<&str>, action: UserAction) -> Result<()> {
    match action {
        UserAction::Add {
            username,
            email,
            bio,
            image,
        } => {
            let user = ctx.users.create_user(&username, &email, bio, image).await?;
            print_json(&user)
        }
        UserAction::Show { username } => {
            let viewer = viewer(ctx, acting_as).await?;
            print_json(&ctx.profiles.get_profile(viewer, &username).await?)
        }
    }
}

pub async fn article(
    ctx: &AppContext,
    acting_as: Option<&str>,
    action: ArticleAction,
) -> Result<()> {
    match action {
        ArticleAction::Create {
            title,
            description,
            body,
            tags,
        } => {
            let author = actor(ctx, acting_as).await?;
            let new = NewArticle {
                title,
                description,
                body,
                tag_list: tags,
            };
            print_json(&ctx.articles.create_article(author, new).await?)
        }
        ArticleAction::Get { slug } => {
            let viewer = viewer(ctx, acting_as).await?;
            print_json(&ctx.articles.get_article(&slug, viewer).await?)
        }
        ArticleAction::Update {
            slug,
            title,
            description,
            body,
        } => {
            let user = actor(ctx, acting_as).await?;
            let update = ArticleUpdate {
                title,
                description,
                body,
            };
            print_json(&ctx.articles.update_article(user, &slug, update).await?)
        }
        ArticleAction::Delete { slug } => {
            let user = actor(ctx, acting_as).await?;
            ctx.articles.delete_article(user, &slug).await?;
            println!("Deleted article: {}", slug);
            Ok(())
        }
        ArticleAction::List {
            author,
            favorited,
            tag,
            page,
        } => {
            let dimension = match (author, favorited, tag) {
                (Some(author), _, _) => ListingDimension::ByAuthor(author),
                (_, Some(username), _) => ListingDimension::ByFavoritedBy(username),
                (_, _, Some(tag)) => ListingDimension::ByTag(tag),
                _ => ListingDimension::Global,
            };
            let viewer = viewer(ctx, acting_as).await?;
            let view = ctx
                .listing
                .list(&dimension, viewer, page.limit, page.page_token.as_deref())
                .await?;
            print_json(&view)
        }
    }
}

pub async fn follow(ctx: &AppContext, acting_as: Option<&str>, username: &str) -> Result<()> {
    let follower = actor(ctx, acting_as).await?;
    print_json(&ctx.follows.follow(follower, username).await?)
}

pub async fn unfollow(ctx: &AppContext, acting_as: Option<&str>, username: &str) -> Result<()> {
    let follower = actor(ctx, acting_as).await?;
    print_json(&ctx.follows.unfollow(follower, username).await?)
}

pub async fn favorite(ctx: &AppContext, acting_as: Option<&str>, slug: &str) -> Result<()> {
    let user = actor(ctx, acting_as).await?;
    print_json(&ctx.articles.favorite_article(user, slug).await?)
}

pub async fn unfavorite(ctx: &AppContext, acting_as: Option<&str>, slug: &str) -> Result<()> {
    let user = actor(ctx, acting_as).await?;
    print_json(&ctx.articles.unfavorite_article(user, slug).await?)
}

pub async fn feed(ctx: &AppContext, acting_as: Option<&str>, page: PageArgs) -> Result<()> {
    let user = actor(ctx, acting_as).await?;
    // Fan-out from earlier commands in this process must land first.
    ctx.feed.flush().await;
    let view = ctx
        .listing
        .fetch_user_feed(user, page.limit, page.page_token.as_deref())
        .await?;
    print_json(&view)
}

pub async fn comment(
    ctx: &AppContext,
    acting_as: Option<&str>,
    action: CommentAction,
) -> Result<()> {
    match action {
        CommentAction::Add { slug, body } => {
            let user = actor(ctx, acting_as).await?;
            print_json(&ctx.comments.add_comment(user, &slug, &body).await?)
        }
        CommentAction::List { slug } => {
            let viewer = viewer(ctx, acting_as).await?;
            print_json(&ctx.comments.get_article_comments(&slug, viewer).await?)
        }
        CommentAction::Delete { slug, id } => {
            let user = actor(ctx, acting_as).await?;
            ctx.comments.delete_comment(user, &slug, id).await?;
            println!("Deleted comment: {}", id);
            Ok(())
        }
    }
}

pub async fn tags(ctx: &AppContext) -> Result<()> {
    print_json(&ctx.articles.list_tags().await?)
}
