use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};

use super::{Article, Comment, User};

/// Public profile of a user as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProfileView {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub following: bool,
}

impl ProfileView {
    pub fn new(user: &User, following: bool) -> Self {
        Self {
            username: user.username.clone(),
            bio: user.bio.clone(),
            image: user.image.clone(),
            following,
        }
    }
}

/// An article joined with its author and the viewer-relative flags. Built on
/// every read, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleAggregateView {
    pub article: Article,
    pub author: User,
    pub favorited: bool,
    pub following: bool,
}

impl ArticleAggregateView {
    pub fn slug(&self) -> &str {
        &self.article.slug
    }

    pub fn favorites_count(&self) -> i64 {
        self.article.favorites_count
    }
}

impl Serialize for ArticleAggregateView {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let author = ProfileView::new(&self.author, self.following);

        let mut s = serializer.serialize_struct("Article", 10)?;
        s.serialize_field("slug", &self.article.slug)?;
        s.serialize_field("title", &self.article.title)?;
        s.serialize_field("description", &self.article.description)?;
        s.serialize_field("body", &self.article.body)?;
        s.serialize_field("tagList", &self.article.tag_list)?;
        s.serialize_field("createdAt", &self.article.created_at)?;
        s.serialize_field("updatedAt", &self.article.updated_at)?;
        s.serialize_field("favorited", &self.favorited)?;
        s.serialize_field("favoritesCount", &self.article.favorites_count)?;
        s.serialize_field("author", &author)?;
        s.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleArticlesView {
    pub articles: Vec<ArticleAggregateView>,
    pub articles_count: usize,
    /// Absent on the last page.
    pub next_page_token: Option<String>,
}

impl MultipleArticlesView {
    pub fn new(articles: Vec<ArticleAggregateView>, next_page_token: Option<String>) -> Self {
        Self {
            articles_count: articles.len(),
            articles,
            next_page_token,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: uuid::Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub body: String,
    pub author: ProfileView,
}

impl CommentView {
    pub fn new(comment: Comment, author: &User, following: bool) -> Self {
        Self {
            id: comment.id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            body: comment.body,
            author: ProfileView::new(author, following),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewArticle;

    #[test]
    fn test_article_view_serializes_nested_author() {
        let mut author = User::new("jake".into(), "jake@jake.jake".into());
        author.bio = Some("I work at statefarm".into());
        let article = Article::new(
            author.id,
            NewArticle {
                title: "Dragons".into(),
                description: "d".into(),
                body: "b".into(),
                tag_list: vec!["dragons".into()],
            },
        );
        let view = ArticleAggregateView {
            article,
            author,
            favorited: true,
            following: false,
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["favorited"], true);
        assert_eq!(json["favoritesCount"], 0);
        assert_eq!(json["author"]["username"], "jake");
        assert_eq!(json["author"]["following"], false);
        assert_eq!(json["tagList"][0], "dragons");
    }

    #[test]
    fn test_final_page_token_is_null() {
        let json = serde_json::to_value(MultipleArticlesView::empty()).unwrap();
        assert_eq!(json["articlesCount"], 0);
        assert!(json["nextPageToken"].is_null());
    }
}
