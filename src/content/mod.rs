//! Forum content: posts and the comments attached to them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

mod store;

pub use store::ContentStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "post")]
pub struct Post {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "comment")]
pub struct Comment {
    pub id: i64,
    #[serde(rename = "postId")]
    pub post_id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub body: String,
}

/// XML envelope for post listings
#[derive(Debug, Serialize)]
#[serde(rename = "posts")]
pub struct PostList {
    #[serde(rename = "post")]
    pub posts: Vec<Post>,
}

/// XML envelope for comment listings
#[derive(Debug, Serialize)]
#[serde(rename = "comments")]
pub struct CommentList {
    #[serde(rename = "comment")]
    pub comments: Vec<Comment>,
}

/// POST /posts body
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// PUT /posts body
#[derive(Debug, Clone, Deserialize)]
pub struct PostUpdate {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// POST /comments body
#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    #[serde(rename = "postId", default)]
    pub post_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub body: String,
}

/// PUT /comments body
#[derive(Debug, Clone, Deserialize)]
pub struct CommentUpdate {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub body: String,
}

/// Content validation errors
#[derive(Debug, PartialEq)]
pub enum ValidationError {
    MissingField(&'static str),
    InvalidEmail(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "Field '{}' is required", field),
            ValidationError::InvalidEmail(email) => write!(f, "Invalid email '{}'", email),
        }
    }
}

impl std::error::Error for ValidationError {}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@]+@[^@]+\.\w{1,5}$").expect("valid email regex"))
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email_pattern().is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

impl NewPost {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.title, "title")?;
        require(&self.body, "body")
    }
}

impl PostUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.title, "title")?;
        require(&self.body, "body")
    }
}

impl NewComment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.post_id == 0 {
            return Err(ValidationError::MissingField("postId"));
        }
        require(&self.name, "name")?;
        require(&self.email, "email")?;
        require(&self.body, "body")?;
        validate_email(&self.email)
    }
}

impl CommentUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.name, "name")?;
        require(&self.body, "body")?;
        if !self.email.is_empty() {
            validate_email(&self.email)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("a.b@mail.example.co").is_ok());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("two@@example.com").is_err());
        assert!(validate_email("ada@example").is_err());
        assert!(validate_email("ada@example.toolong").is_err());
    }

    #[test]
    fn test_new_post_requires_title_and_body() {
        let post = NewPost {
            title: "Hello".to_string(),
            body: String::new(),
        };
        assert_eq!(post.validate(), Err(ValidationError::MissingField("body")));

        let post = NewPost {
            title: "Hello".to_string(),
            body: "World".to_string(),
        };
        assert!(post.validate().is_ok());
    }

    #[test]
    fn test_new_comment_validation() {
        let mut comment = NewComment {
            post_id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            body: "Nice post".to_string(),
        };
        assert!(comment.validate().is_ok());

        comment.email = "not-an-email".to_string();
        assert!(matches!(
            comment.validate(),
            Err(ValidationError::InvalidEmail(_))
        ));

        comment.post_id = 0;
        assert_eq!(
            comment.validate(),
            Err(ValidationError::MissingField("postId"))
        );
    }

    #[test]
    fn test_comment_update_allows_empty_email() {
        let update = CommentUpdate {
            id: 3,
            name: "Ada".to_string(),
            email: String::new(),
            body: "Edited".to_string(),
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_post_json_field_names() {
        let post = Post {
            id: 1,
            user_id: 2,
            title: "t".to_string(),
            body: "b".to_string(),
        };
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["userId"], 2);
        assert_eq!(json["title"], "t");
    }

    #[test]
    fn test_comment_body_deserialization() {
        let json = r#"{"postId": 5, "name": "n", "email": "e@x.io", "body": "b"}"#;
        let comment: NewComment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.post_id, 5);
        assert_eq!(comment.email, "e@x.io");
    }
}
