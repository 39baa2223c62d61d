use crate::auth::AuthUser;
use crate::db::models::Comment;
use crate::error::{AppError, AppResult};

/// A resource with exactly one owning user.
pub trait Owned {
    fn owner_id(&self) -> i64;
    fn kind(&self) -> &'static str;
}

impl Owned for Comment {
    fn owner_id(&self) -> i64 {
        self.user_id
    }

    fn kind(&self) -> &'static str {
        "comment"
    }
}

/// Only the creator of a resource may mutate it.
pub fn ensure_owner(actor: &AuthUser, resource: &impl Owned) -> AppResult<()> {
    if actor.id == resource.owner_id() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "You do not have permission to modify this {}",
            resource.kind()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment_by(user_id: i64) -> Comment {
        Comment {
            id: 1,
            user_id,
            article_id: 1,
            content: "댓글".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn actor(id: i64) -> AuthUser {
        AuthUser {
            id,
            email: format!("{}@test.com", id),
        }
    }

    #[test]
    fn test_owner_is_allowed() {
        assert!(ensure_owner(&actor(3), &comment_by(3)).is_ok());
    }

    #[test]
    fn test_other_user_is_forbidden() {
        let err = ensure_owner(&actor(4), &comment_by(3)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
