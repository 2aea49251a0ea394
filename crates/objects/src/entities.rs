//! Social entities: posts, users, comments and media.
//!
//! Each entity is a [`ModelType`] view over a [`ModelObject`] with named
//! accessors for its own fields. Generic field access stays available
//! through `Deref`.

use crate::{AuthToken, Data, ModelObject, ModelType, ObjectId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Macro for entity newtypes.
// Generates: struct, ModelType impl, Deref/DerefMut to ModelObject,
// new() / Default, From<$name> for Data.
// ---------------------------------------------------------------------------
macro_rules! entity {
    (
        $(#[$attr:meta])*
        $name:ident = $tag:literal
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name(ModelObject);

        impl ModelType for $name {
            const TAG: &'static str = $tag;

            fn from_object(object: ModelObject) -> Self {
                Self(object)
            }

            fn as_object(&self) -> &ModelObject {
                &self.0
            }

            fn into_object(self) -> ModelObject {
                self.0
            }
        }

        impl $name {
            /// An empty instance without an id.
            pub fn new() -> Self {
                Self(ModelObject::new(Self::tag()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = ModelObject;

            fn deref(&self) -> &ModelObject {
                &self.0
            }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut ModelObject {
                &mut self.0
            }
        }

        impl From<$name> for Data {
            fn from(value: $name) -> Self {
                Data::from(value.0)
            }
        }
    };
}

const TEXT: &str = "txt";
const AUTHOR_ID: &str = "uid";
const CREATED: &str = "cdate";

fn user_id_field(object: &ModelObject, field: &str) -> Option<UserId> {
    object.get_str(field).and_then(UserId::new)
}

fn timestamp_field(object: &ModelObject, field: &str) -> Option<Timestamp> {
    object.get_i64(field).and_then(Timestamp::from_millis)
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

entity! {
    /// A post on a user's timeline.
    Post = "post"
}

impl Post {
    const TAGS: &'static str = "tags";
    const LIKES: &'static str = "likes";
    const MEDIA: &'static str = "media";
    const AUTHOR_AUX: &'static str = "author";

    /// A new local post by `author`, stamped with the current time.
    pub fn create_new(author: &UserId, text: impl Into<String>) -> Self {
        let mut object = ModelObject::create_new(Self::tag(), None);
        object.put(AUTHOR_ID, author.as_str());
        object.put(TEXT, text.into());
        object.put(CREATED, Timestamp::now());
        Self(object)
    }

    pub fn text(&self) -> Option<&str> {
        self.get_str(TEXT)
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.0.put(TEXT, text.into());
    }

    pub fn author_id(&self) -> Option<UserId> {
        user_id_field(&self.0, AUTHOR_ID)
    }

    pub fn created_at(&self) -> Option<Timestamp> {
        timestamp_field(&self.0, CREATED)
    }

    pub fn like_count(&self) -> i64 {
        self.get_i64(Self::LIKES).unwrap_or(0)
    }

    pub fn tags(&self) -> Vec<&str> {
        self.words(Self::TAGS)
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        self.0.push_word(Self::TAGS, tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.remove_word(Self::TAGS, tag)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.has_word(Self::TAGS, tag)
    }

    pub fn attach_media(&mut self, media: &ObjectId) -> bool {
        self.0.push_word(Self::MEDIA, media.as_str())
    }

    pub fn media_ids(&self) -> Vec<&str> {
        self.words(Self::MEDIA)
    }

    /// `true` when the post has non-blank text or at least one attachment.
    pub fn has_content(&self) -> bool {
        self.text().is_some_and(|t| !t.trim().is_empty()) || self.count_word(Self::MEDIA) > 0
    }

    /// The author summary bundled by the server, if any.
    pub fn author(&self) -> Option<User> {
        self.aux_object(Self::AUTHOR_AUX)
            .cloned()
            .and_then(|object| object.downcast::<User>().ok())
    }

    pub fn set_author(&mut self, author: User) {
        self.set_aux(Self::AUTHOR_AUX, author);
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

entity! {
    /// A user profile, with the users it follows and the posts it watches.
    User = "user"
}

impl User {
    const USERNAME: &'static str = "username";
    const NICKNAME: &'static str = "nickname";
    const FOLLOWING: &'static str = "following";
    const WATCHING: &'static str = "watching";
    const TOKEN_AUX: &'static str = "token";

    /// A new local profile (sign-up form).
    pub fn create_new(username: impl Into<String>) -> Self {
        let mut object = ModelObject::create_new(Self::tag(), None);
        object.put(Self::USERNAME, username.into());
        Self(object)
    }

    pub fn username(&self) -> Option<&str> {
        self.get_str(Self::USERNAME)
    }

    pub fn nickname(&self) -> Option<&str> {
        self.get_str(Self::NICKNAME)
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.0.put(Self::NICKNAME, nickname.into());
    }

    pub fn follow(&mut self, user: &str) -> bool {
        self.0.push_word(Self::FOLLOWING, user)
    }

    pub fn unfollow(&mut self, user: &str) -> bool {
        self.remove_word(Self::FOLLOWING, user)
    }

    pub fn is_following(&self, user: &str) -> bool {
        self.has_word(Self::FOLLOWING, user)
    }

    pub fn following_count(&self) -> usize {
        self.count_word(Self::FOLLOWING)
    }

    pub fn watch(&mut self, post: &str) -> bool {
        self.0.push_word(Self::WATCHING, post)
    }

    pub fn unwatch(&mut self, post: &str) -> bool {
        self.remove_word(Self::WATCHING, post)
    }

    pub fn is_watching(&self, post: &str) -> bool {
        self.has_word(Self::WATCHING, post)
    }

    /// Session token attached by the login endpoint.
    pub fn session_token(&self) -> Option<AuthToken> {
        self.aux(Self::TOKEN_AUX)
            .and_then(Data::as_str)
            .and_then(AuthToken::new)
    }

    /// The profile's id as a [`UserId`].
    pub fn user_id(&self) -> Option<UserId> {
        self.id().and_then(|id| UserId::new(id.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

entity! {
    /// A reply to a post.
    Comment = "cmt"
}

impl Comment {
    const POST_ID: &'static str = "pid";

    pub fn create_new(post: ObjectId, author: &UserId, text: impl Into<String>) -> Self {
        let mut object = ModelObject::create_new(Self::tag(), None);
        object.put(Self::POST_ID, post.as_str());
        object.put(AUTHOR_ID, author.as_str());
        object.put(TEXT, text.into());
        object.put(CREATED, Timestamp::now());
        Self(object)
    }

    pub fn text(&self) -> Option<&str> {
        self.get_str(TEXT)
    }

    pub fn post_id(&self) -> Option<ObjectId> {
        self.get_str(Self::POST_ID).and_then(ObjectId::new)
    }

    pub fn author_id(&self) -> Option<UserId> {
        user_id_field(&self.0, AUTHOR_ID)
    }

    pub fn created_at(&self) -> Option<Timestamp> {
        timestamp_field(&self.0, CREATED)
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

entity! {
    /// An uploaded file as stored by the backend.
    Media = "media"
}

impl Media {
    pub fn url(&self) -> Option<&str> {
        self.get_str("url")
    }

    pub fn mime(&self) -> Option<&str> {
        self.get_str("mime")
    }

    pub fn file_name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn byte_size(&self) -> Option<u64> {
        self.get_i64("size").and_then(|n| u64::try_from(n).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> UserId {
        UserId::new("ann").unwrap()
    }

    #[test]
    fn new_post_carries_author_text_and_time() {
        let post = Post::create_new(&ann(), "hello");
        assert!(post.is_new());
        assert_eq!(post.text(), Some("hello"));
        assert_eq!(post.author_id(), Some(ann()));
        assert!(post.created_at().is_some());
        assert!(post.has_content());
    }

    #[test]
    fn blank_post_has_no_content_until_media_is_attached() {
        let mut post = Post::create_new(&ann(), "  ");
        assert!(!post.has_content());
        assert!(post.attach_media(&ObjectId::new("m1").unwrap()));
        assert!(post.has_content());
    }

    #[test]
    fn tags_are_a_word_field() {
        let mut post = Post::new();
        assert!(post.add_tag("a"));
        assert!(!post.add_tag("a"));
        assert!(post.has_tag("a"));
        assert!(!post.remove_tag("b"));
        assert_eq!(post.tags(), ["a"]);
    }

    #[test]
    fn following_is_idempotent() {
        let mut user = User::create_new("ann");
        assert!(user.follow("bob"));
        assert!(!user.follow("bob"));
        assert_eq!(user.following_count(), 1);
        assert!(user.unfollow("bob"));
        assert!(!user.is_following("bob"));
        assert!(user.watch("p1"));
        assert!(user.is_watching("p1"));
    }

    #[test]
    fn author_summary_lives_in_aux_data() {
        let mut post = Post::new();
        let mut author = User::create_new("ann");
        author.set_nickname("Ann");
        post.set_author(author.clone());
        assert_eq!(post.author(), Some(author));
        assert!(post.get("author").is_none());
    }

    #[test]
    fn session_token_comes_from_aux() {
        let mut user = User::new();
        assert!(user.session_token().is_none());
        user.set_aux("token", "t0k");
        assert_eq!(user.session_token().unwrap().expose(), "t0k");
    }

    #[test]
    fn comment_links_to_post() {
        let comment = Comment::create_new(ObjectId::new("p1").unwrap(), &ann(), "nice");
        assert_eq!(comment.post_id().unwrap().as_str(), "p1");
        assert_eq!(comment.text(), Some("nice"));
        assert!(comment.created_at().is_some());
    }
}
