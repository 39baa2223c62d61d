//! In-memory store, used when no database is configured and in tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::models::{Article, Comment, EmailCode, NewArticle, NewComment, NewUser, User};
use super::Store;
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    articles: BTreeMap<i64, Article>,
    comments: BTreeMap<i64, Comment>,
    likes: HashSet<(i64, i64)>,
    follows: HashSet<(i64, i64)>,
    email_codes: HashMap<String, EmailCode>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut articles: Vec<Article>) -> Vec<Article> {
    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    articles
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> AppResult<Duration> {
        let start = Instant::now();
        let _guard = self.tables.read().await;
        Ok(start.elapsed())
    }

    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Err(AppError::Validation("Email already registered".to_string()));
        }
        let id = tables.next_id();
        let user = User {
            id,
            email: new_user.email,
            name: new_user.name,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn save_email_code(&self, code: EmailCode) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.email_codes.insert(code.email.clone(), code);
        Ok(())
    }

    async fn find_email_code(&self, email: &str) -> AppResult<Option<EmailCode>> {
        Ok(self.tables.read().await.email_codes.get(email).cloned())
    }

    async fn delete_email_code(&self, email: &str) -> AppResult<()> {
        self.tables.write().await.email_codes.remove(email);
        Ok(())
    }

    async fn is_following(&self, follower_id: i64, following_id: i64) -> AppResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .follows
            .contains(&(follower_id, following_id)))
    }

    async fn add_follow(&self, follower_id: i64, following_id: i64) -> AppResult<()> {
        self.tables
            .write()
            .await
            .follows
            .insert((follower_id, following_id));
        Ok(())
    }

    async fn remove_follow(&self, follower_id: i64, following_id: i64) -> AppResult<()> {
        self.tables
            .write()
            .await
            .follows
            .remove(&(follower_id, following_id));
        Ok(())
    }

    async fn follow_counts(&self, user_id: i64) -> AppResult<(i64, i64)> {
        let tables = self.tables.read().await;
        let followers = tables.follows.iter().filter(|(_, to)| *to == user_id).count();
        let followings = tables.follows.iter().filter(|(from, _)| *from == user_id).count();
        Ok((followers as i64, followings as i64))
    }

    async fn create_article(&self, new_article: NewArticle) -> AppResult<Article> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&new_article.user_id) {
            return Err(AppError::NotFound(format!("User {} not found", new_article.user_id)));
        }
        let id = tables.next_id();
        let now = Utc::now();
        let article = Article {
            id,
            user_id: new_article.user_id,
            title: new_article.title,
            content: new_article.content,
            image: new_article.image,
            created_at: now,
            updated_at: now,
        };
        tables.articles.insert(id, article.clone());
        Ok(article)
    }

    async fn find_article(&self, id: i64) -> AppResult<Option<Article>> {
        Ok(self.tables.read().await.articles.get(&id).cloned())
    }

    async fn list_articles(&self, limit: i64, offset: i64) -> AppResult<(Vec<Article>, i64)> {
        let tables = self.tables.read().await;
        let total = tables.articles.len() as i64;
        let page = newest_first(tables.articles.values().cloned().collect())
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn articles_by_user(&self, user_id: i64) -> AppResult<Vec<Article>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .articles
                .values()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn articles_liked_by(&self, user_id: i64) -> AppResult<Vec<Article>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .likes
                .iter()
                .filter(|(liker, _)| *liker == user_id)
                .filter_map(|(_, article_id)| tables.articles.get(article_id).cloned())
                .collect(),
        ))
    }

    async fn has_like(&self, user_id: i64, article_id: i64) -> AppResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .likes
            .contains(&(user_id, article_id)))
    }

    async fn add_like(&self, user_id: i64, article_id: i64) -> AppResult<()> {
        self.tables.write().await.likes.insert((user_id, article_id));
        Ok(())
    }

    async fn remove_like(&self, user_id: i64, article_id: i64) -> AppResult<()> {
        self.tables.write().await.likes.remove(&(user_id, article_id));
        Ok(())
    }

    async fn like_count(&self, article_id: i64) -> AppResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .likes
            .iter()
            .filter(|(_, liked)| *liked == article_id)
            .count() as i64)
    }

    async fn create_comment(&self, new_comment: NewComment) -> AppResult<Comment> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let now = Utc::now();
        let comment = Comment {
            id,
            user_id: new_comment.user_id,
            article_id: new_comment.article_id,
            content: new_comment.content,
            created_at: now,
            updated_at: now,
        };
        tables.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: i64) -> AppResult<Option<Comment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn update_comment(&self, id: i64, content: &str) -> AppResult<Comment> {
        let mut tables = self.tables.write().await;
        let comment = tables
            .comments
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))?;
        comment.content = content.to_string();
        comment.updated_at = Utc::now();
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: i64) -> AppResult<bool> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }

    async fn comments_for_article(&self, article_id: i64) -> AppResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "tester".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected_case_insensitively() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@test.com")).await.unwrap();
        let err = store.create_user(new_user("A@Test.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_like_pair_is_unique() {
        let store = MemoryStore::new();
        store.add_like(1, 2).await.unwrap();
        store.add_like(1, 2).await.unwrap();
        assert_eq!(store.like_count(2).await.unwrap(), 1);
        store.remove_like(1, 2).await.unwrap();
        store.remove_like(1, 2).await.unwrap();
        assert_eq!(store.like_count(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_like_inserts_never_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.add_like(7, 9).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.like_count(9).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_articles_paginates_newest_first() {
        let store = MemoryStore::new();
        let owner = store.create_user(new_user("owner@test.com")).await.unwrap();
        for i in 0..5 {
            store
                .create_article(NewArticle {
                    user_id: owner.id,
                    title: format!("title {}", i),
                    content: "body".to_string(),
                    image: None,
                })
                .await
                .unwrap();
        }
        let (page, total) = store.list_articles(2, 0).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].title, "title 4");
        let (page, _) = store.list_articles(2, 4).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "title 0");
    }

    #[tokio::test]
    async fn test_update_missing_comment_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update_comment(42, "x").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!store.delete_comment(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_article_requires_existing_owner() {
        let store = MemoryStore::new();
        let result = store
            .create_article(NewArticle {
                user_id: 77,
                title: "orphan".to_string(),
                content: "body".to_string(),
                image: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
