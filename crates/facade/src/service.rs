//! [`SocialService`]: every caller-facing operation.
//!
//! All operations follow the same four steps:
//!
//! 1. validate arguments locally and fail with `E_INVALID_ARG` or
//!    `E_NOT_LOGGED_IN` before any network call;
//! 2. build the request envelope;
//! 3. call the [`Transport`];
//! 4. wrap the raw result into the expected model type, or fail with
//!    `E_BAD_RESPONSE` when it does not fit.
//!
//! Failures are returned, never swallowed. Use [`crate::with_callback`] for
//! the callback form.

use std::sync::Arc;

use objects::{
    codes, Comment, Data, ErrorModel, FormData, Media, ModelError, ModelType, ObjectId,
    Page, Post, RequestEnvelope, ResultList, ResultMap, Serializer, Session, TypeRegistry, User,
    UserId,
};
use serde_json::{json, Value};
use transport::{ClientConfig, HttpMethod, ReqwestClient, Transport, Url};

/// Registry holding the collection types and every social entity.
pub fn social_registry() -> Result<TypeRegistry, ModelError> {
    let mut registry = TypeRegistry::with_builtins();
    registry
        .check_in::<Post>()?
        .check_in::<User>()?
        .check_in::<Comment>()?
        .check_in::<Media>()?;
    Ok(registry)
}

/// Caller-facing social operations over one [`Transport`].
#[derive(Debug, Clone)]
pub struct SocialService {
    transport: Transport,
    serializer: Serializer,
}

impl SocialService {
    pub fn new(transport: Transport, serializer: Serializer) -> Self {
        Self {
            transport,
            serializer,
        }
    }

    /// A service talking to `config`'s host over `reqwest`, with the social
    /// registry.
    pub fn connect(config: ClientConfig, session: Arc<dyn Session>) -> Result<Self, ErrorModel> {
        let client = ReqwestClient::new()?;
        let registry = social_registry()?;
        let transport = Transport::new(Arc::new(config), Arc::new(client), session);
        Ok(Self::new(transport, Serializer::new(Arc::new(registry))))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    pub fn session(&self) -> &dyn Session {
        self.transport.session()
    }

    // -----------------------------------------------------------------------
    // Posts
    // -----------------------------------------------------------------------

    pub async fn fetch_post(&self, post_id: &str) -> Result<Post, ErrorModel> {
        let post_id = required_id(post_id, "post id")?;
        let url = self.url(&["u", "post", post_id.as_str()])?;
        self.fetch(HttpMethod::Get, url, RequestEnvelope::for_endpoint("fetch_post"))
            .await
    }

    /// Publishes a locally created post. Returns the stored post.
    pub async fn create_post(&self, post: &Post) -> Result<Post, ErrorModel> {
        self.require_signed_in()?;
        if !post.has_content() {
            return Err(ErrorModel::invalid_arg("post has neither text nor media"));
        }
        let url = self.url(&["u", "post"])?;
        let mut envelope = RequestEnvelope::for_endpoint("create_post");
        envelope.set_data(&Data::from(post.clone()));
        self.fetch(HttpMethod::Post, url, envelope).await
    }

    /// Saves changes to a stored post.
    pub async fn update_post(&self, post: &Post) -> Result<Post, ErrorModel> {
        self.require_signed_in()?;
        let post_id = match post.id() {
            Some(id) if !post.is_new() => id.clone(),
            _ => return Err(ErrorModel::invalid_arg("only stored posts can be updated")),
        };
        if !post.has_content() {
            return Err(ErrorModel::invalid_arg("post has neither text nor media"));
        }
        let url = self.url(&["u", "post", post_id.as_str()])?;
        let mut envelope = RequestEnvelope::for_endpoint("update_post");
        envelope.set_data(&Data::from(post.clone()));
        self.fetch(HttpMethod::Put, url, envelope).await
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<(), ErrorModel> {
        self.require_signed_in()?;
        let post_id = required_id(post_id, "post id")?;
        let url = self.url(&["u", "post", post_id.as_str()])?;
        self.transport
            .call(
                HttpMethod::Delete,
                url,
                &RequestEnvelope::for_endpoint("delete_post"),
            )
            .await
            .map(drop)
    }

    /// Likes a post. Returns the post with its updated like count.
    pub async fn like_post(&self, post_id: &str) -> Result<Post, ErrorModel> {
        self.require_signed_in()?;
        let post_id = required_id(post_id, "post id")?;
        let url = self.url(&["u", "post", post_id.as_str(), "like"])?;
        self.fetch(HttpMethod::Post, url, RequestEnvelope::for_endpoint("like_post"))
            .await
    }

    pub async fn unlike_post(&self, post_id: &str) -> Result<Post, ErrorModel> {
        self.require_signed_in()?;
        let post_id = required_id(post_id, "post id")?;
        let url = self.url(&["u", "post", post_id.as_str(), "like"])?;
        self.fetch(HttpMethod::Delete, url, RequestEnvelope::for_endpoint("unlike_post"))
            .await
    }

    /// One page of a post's comments.
    pub async fn fetch_comments(&self, post_id: &str, page: Page) -> Result<ResultList, ErrorModel> {
        let post_id = required_id(post_id, "post id")?;
        let url = self.paged_url(&["u", "post", post_id.as_str(), "comments"], page)?;
        self.fetch(HttpMethod::Get, url, RequestEnvelope::for_endpoint("fetch_comments"))
            .await
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub async fn fetch_user(&self, user_id: &str) -> Result<User, ErrorModel> {
        let user_id = required_id(user_id, "user id")?;
        let url = self.url(&["u", "user", user_id.as_str()])?;
        self.fetch(HttpMethod::Get, url, RequestEnvelope::for_endpoint("fetch_user"))
            .await
    }

    /// Follows `user_id`. Returns the caller's updated profile.
    pub async fn follow_user(&self, user_id: &str) -> Result<User, ErrorModel> {
        let me = self.require_signed_in()?;
        let target = self.follow_target(&me, user_id)?;
        let url = self.url(&["u", "user", target.as_str(), "follow"])?;
        self.fetch(HttpMethod::Post, url, RequestEnvelope::for_endpoint("follow_user"))
            .await
    }

    pub async fn unfollow_user(&self, user_id: &str) -> Result<User, ErrorModel> {
        let me = self.require_signed_in()?;
        let target = self.follow_target(&me, user_id)?;
        let url = self.url(&["u", "user", target.as_str(), "follow"])?;
        self.fetch(HttpMethod::Delete, url, RequestEnvelope::for_endpoint("unfollow_user"))
            .await
    }

    /// One page of a user's followers, keyed by user id.
    pub async fn fetch_followers(&self, user_id: &str, page: Page) -> Result<ResultMap, ErrorModel> {
        let user_id = required_id(user_id, "user id")?;
        let url = self.paged_url(&["u", "user", user_id.as_str(), "followers"], page)?;
        self.fetch(HttpMethod::Get, url, RequestEnvelope::for_endpoint("fetch_followers"))
            .await
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Signs in and stores the returned identity in the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ErrorModel> {
        if username.trim().is_empty() {
            return Err(ErrorModel::invalid_arg("username is required"));
        }
        if password.is_empty() {
            return Err(ErrorModel::invalid_arg("password is required"));
        }
        let url = self.url(&["u", "login"])?;
        let mut envelope = RequestEnvelope::for_endpoint("login");
        envelope.set_credential(None, None);
        envelope.set_content(json!({ "username": username, "password": password }));

        let user: User = self.fetch(HttpMethod::Post, url, envelope).await?;
        let (Some(user_id), Some(token)) = (user.user_id(), user.session_token()) else {
            return Err(ErrorModel::bad_response("login result carries no identity"));
        };
        tracing::info!(user = %user_id, "signed in");
        self.session().set_credential(user_id, token);
        Ok(user)
    }

    /// Signs out. The local session is cleared whatever the backend answers.
    pub async fn logout(&self) -> Result<(), ErrorModel> {
        if !self.session().is_signed_in() {
            self.session().clear();
            return Ok(());
        }
        let url = self.url(&["u", "logout"])?;
        let outcome = self
            .transport
            .call(HttpMethod::Post, url, &RequestEnvelope::for_endpoint("logout"))
            .await;
        // A rejected session was already cleared by the transport.
        if self.session().is_signed_in() {
            self.session().clear();
        }
        outcome.map(drop)
    }

    // -----------------------------------------------------------------------
    // Media
    // -----------------------------------------------------------------------

    /// Uploads one file as multipart form data.
    ///
    /// Fails with `E_TIMEOUT` when the upload does not complete within the
    /// configured watchdog interval; the in-flight request is dropped.
    pub async fn upload_media(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<Media, ErrorModel> {
        self.require_signed_in()?;
        if file_name.trim().is_empty() {
            return Err(ErrorModel::invalid_arg("file name is required"));
        }
        if bytes.is_empty() {
            return Err(ErrorModel::invalid_arg("file is empty"));
        }
        let url = self.url(&["u", "media"])?;
        let size = bytes.len();
        let mut envelope = RequestEnvelope::for_endpoint("upload_media");
        envelope.set_form_data(
            FormData::new()
                .with_content(json!({ "name": file_name, "mime": mime, "size": size }))
                .with_file("file", file_name, mime, bytes),
        );

        let watchdog = self.transport.config().upload_watchdog();
        match tokio::time::timeout(watchdog, self.fetch(HttpMethod::Post, url, envelope)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(file = file_name, ?watchdog, "upload stalled; cancelled");
                Err(ErrorModel::new(codes::TIMEOUT, "upload stalled").with_args([json!(file_name)]))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn fetch<T: ModelType>(
        &self,
        method: HttpMethod,
        url: Url,
        envelope: RequestEnvelope,
    ) -> Result<T, ErrorModel> {
        let value = self.transport.call(method, url, &envelope).await?;
        self.decode(value)
    }

    fn decode<T: ModelType>(&self, value: Value) -> Result<T, ErrorModel> {
        self.serializer.wrap_as::<T>(value).ok_or_else(|| {
            tracing::warn!(expected = T::TAG, "result does not fit the expected type");
            ErrorModel::bad_response(format!("expected a '{}' result", T::TAG))
        })
    }

    fn require_signed_in(&self) -> Result<UserId, ErrorModel> {
        let session = self.session();
        match (session.user_id(), session.token()) {
            (Some(user), Some(_)) => Ok(user),
            _ => Err(ErrorModel::new(codes::NOT_LOGGED_IN, "sign in first")),
        }
    }

    fn follow_target(&self, me: &UserId, user_id: &str) -> Result<ObjectId, ErrorModel> {
        let target = required_id(user_id, "user id")?;
        if target.as_str() == me.as_str() {
            return Err(ErrorModel::invalid_arg("cannot follow yourself"));
        }
        Ok(target)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ErrorModel> {
        Ok(self.transport.config().url(segments)?)
    }

    fn paged_url(&self, segments: &[&str], page: Page) -> Result<Url, ErrorModel> {
        if !page.is_valid() {
            return Err(ErrorModel::invalid_arg(format!(
                "page size must be between 1 and {}",
                Page::MAX_SIZE
            ))
            .with_args([json!(page.max)]));
        }
        Ok(self.transport.config().url_with_query(
            segments,
            [
                ("offset", page.offset.to_string()),
                ("max", page.max.to_string()),
            ],
        )?)
    }
}

fn required_id(value: &str, what: &str) -> Result<ObjectId, ErrorModel> {
    ObjectId::new(value.trim()).ok_or_else(|| ErrorModel::invalid_arg(format!("{what} is required")))
}
