//! Business logic, independent of the HTTP layer.

pub mod articles;
pub mod auth;
pub mod comments;
pub mod permissions;
pub mod toggle;
pub mod users;

pub use articles::ArticleService;
pub use auth::AuthService;
pub use comments::CommentService;
pub use users::{CodeSender, LogCodeSender, UserService};

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::TokenCodec;
use crate::config::AppConfig;
use crate::db::Store;
use crate::error::AppResult;
use crate::storage::FileStorage;

/// Holds one instance of every service.
#[derive(Clone)]
pub struct ServiceContainer {
    pub auth: AuthService,
    pub users: UserService,
    pub articles: ArticleService,
    pub comments: CommentService,
}

impl ServiceContainer {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn Store>,
        tokens: Arc<dyn TokenCodec>,
        files: Arc<dyn FileStorage>,
        codes: Arc<dyn CodeSender>,
    ) -> Self {
        Self {
            auth: AuthService::new(store.clone(), tokens),
            users: UserService::new(
                store.clone(),
                codes,
                config.auth.bcrypt_cost,
                config.auth.require_email_code,
            ),
            articles: ArticleService::new(store.clone(), files, config.media.max_upload_bytes),
            comments: CommentService::new(store),
        }
    }
}

/// Display names for a set of user ids. Unknown ids are left out.
pub(crate) async fn user_names(store: &dyn Store, ids: &[i64]) -> AppResult<HashMap<i64, String>> {
    let mut names = HashMap::new();
    for &id in ids {
        if names.contains_key(&id) {
            continue;
        }
        if let Some(user) = store.find_user(id).await? {
            names.insert(id, user.name);
        }
    }
    Ok(names)
}
