use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use spektr_db::{Database, keys};
use spektr_types::{Language, ProfileUpdate, Theme, User};

/// Id of the built-in administrator account.
pub const ADMIN_ID: &str = "admin-spektr";

/// Owns the current authenticated identity, the registered-user directory
/// and the user-facing preferences. Constructed once at startup; everything
/// else that needs the signed-in identity reads it from here.
pub struct SessionStore {
    db: Arc<Database>,
    users: Vec<User>,
    current: Option<User>,
    theme: Theme,
    language: Language,
}

impl SessionStore {
    /// Seeds the directory with the administrator account, then restores
    /// whatever a previous run persisted: a saved directory replaces the
    /// seed entirely, a saved session record signs the identity back in
    /// without re-authentication.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let mut users = vec![admin_account()];
        if let Some(saved) = db.get_json::<Vec<User>>(keys::SESSION_USERS)? {
            users = saved;
        }

        let current = db.get_json::<User>(keys::SESSION_USER)?;
        let theme = db.get_json::<Theme>(keys::SESSION_THEME)?.unwrap_or_default();
        let language = db
            .get_json::<Language>(keys::SESSION_LANGUAGE)?
            .unwrap_or_default();

        if let Some(user) = &current {
            info!(username = %user.username, "session restored");
        }

        Ok(Self {
            db,
            users,
            current,
            theme,
            language,
        })
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current.as_ref()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Exact username+password match against the directory. `remember`
    /// persists the session record so the next run restores it.
    pub fn login(&mut self, username: &str, password: &str, remember: bool) -> Result<bool> {
        let found = self
            .users
            .iter()
            .find(|u| u.username == username && u.password == password)
            .cloned();

        let Some(user) = found else {
            info!(username, "login rejected");
            return Ok(false);
        };

        if remember {
            self.db.put_json(keys::SESSION_USER, &user)?;
        }
        info!(username = %user.username, "login ok");
        self.current = Some(user);
        Ok(true)
    }

    /// Fails only on a taken username (case-sensitive exact match).
    pub fn register(
        &mut self,
        email: &str,
        username: &str,
        display_name: &str,
        password: &str,
        remember: bool,
    ) -> Result<bool> {
        if self.users.iter().any(|u| u.username == username) {
            info!(username, "registration rejected: username taken");
            return Ok(false);
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            password: password.to_string(),
            avatar: None,
            bio: None,
            is_verified: false,
            is_admin: false,
            created_at: Utc::now(),
        };

        self.users.push(user.clone());
        self.db.put_json(keys::SESSION_USERS, &self.users)?;

        if remember {
            self.db.put_json(keys::SESSION_USER, &user)?;
        }
        info!(username = %user.username, "registered");
        self.current = Some(user);
        Ok(true)
    }

    /// Clears the current identity and its persisted record. Preferences
    /// survive logout.
    pub fn logout(&mut self) -> Result<()> {
        if let Some(user) = self.current.take() {
            info!(username = %user.username, "logged out");
        }
        self.db.remove(keys::SESSION_USER)
    }

    /// Merges the present fields into the current identity and syncs both
    /// the directory entry and the session record. Signed out: no-op.
    pub fn update_profile(&mut self, updates: ProfileUpdate) -> Result<()> {
        let Some(current) = self.current.as_mut() else {
            warn!("update_profile while signed out");
            return Ok(());
        };

        if let Some(email) = updates.email {
            current.email = email;
        }
        if let Some(username) = updates.username {
            current.username = username;
        }
        if let Some(display_name) = updates.display_name {
            current.display_name = display_name;
        }
        if let Some(password) = updates.password {
            current.password = password;
        }
        if let Some(avatar) = updates.avatar {
            current.avatar = Some(avatar);
        }
        if let Some(bio) = updates.bio {
            current.bio = Some(bio);
        }

        let updated = current.clone();
        if let Some(entry) = self.users.iter_mut().find(|u| u.id == updated.id) {
            *entry = updated.clone();
        }

        self.db.put_json(keys::SESSION_USERS, &self.users)?;
        self.db.put_json(keys::SESSION_USER, &updated)?;
        Ok(())
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.theme = theme;
        self.db.put_json(keys::SESSION_THEME, &theme)?;
        debug!(class = ?theme.css_class(), "theme changed");
        Ok(())
    }

    pub fn set_language(&mut self, language: Language) -> Result<()> {
        self.language = language;
        self.db.put_json(keys::SESSION_LANGUAGE, &language)
    }
}

fn admin_account() -> User {
    User {
        id: ADMIN_ID.to_string(),
        email: "chats@spektr.ru".to_string(),
        username: "spektr".to_string(),
        display_name: "Spektr".to_string(),
        password: "zzzz-2014".to_string(),
        avatar: None,
        bio: None,
        is_verified: true,
        is_admin: true,
        created_at: seed_timestamp(),
    }
}

pub(crate) fn seed_timestamp() -> DateTime<Utc> {
    "2024-01-01T00:00:00Z".parse().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Arc<Database>, SessionStore) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = SessionStore::new(db.clone()).unwrap();
        (db, store)
    }

    #[test]
    fn directory_seeds_admin_account() {
        let (_db, store) = fresh();
        assert_eq!(store.users().len(), 1);
        let admin = &store.users()[0];
        assert_eq!(admin.id, ADMIN_ID);
        assert!(admin.is_admin);
        assert!(admin.is_verified);
    }

    #[test]
    fn login_requires_exact_match() {
        let (_db, mut store) = fresh();
        assert!(!store.login("spektr", "wrong", false).unwrap());
        assert!(!store.login("SPEKTR", "zzzz-2014", false).unwrap());
        assert!(store.current_user().is_none());

        assert!(store.login("spektr", "zzzz-2014", false).unwrap());
        assert_eq!(store.current_user().unwrap().id, ADMIN_ID);
    }

    #[test]
    fn register_taken_username_leaves_directory_unchanged() {
        let (_db, mut store) = fresh();
        let ok = store
            .register("x@y.z", "spektr", "Impostor", "pw", false)
            .unwrap();
        assert!(!ok);
        assert_eq!(store.users().len(), 1);
        assert!(store.current_user().is_none());
    }

    #[test]
    fn register_adds_exactly_one_identity_and_signs_in() {
        let (_db, mut store) = fresh();
        let ok = store
            .register("alice@example.com", "alice", "Alice", "secret", false)
            .unwrap();
        assert!(ok);
        assert_eq!(store.users().len(), 2);
        let current = store.current_user().unwrap();
        assert_eq!(current.username, "alice");
        assert!(!current.is_admin);
    }

    #[test]
    fn remember_me_restores_session_across_rebuilds() {
        let (db, mut store) = fresh();
        store
            .register("a@b.c", "alice", "Alice", "pw", true)
            .unwrap();

        let restored = SessionStore::new(db.clone()).unwrap();
        assert_eq!(restored.current_user().unwrap().username, "alice");
        // The directory itself was persisted too
        assert_eq!(restored.users().len(), 2);
    }

    #[test]
    fn without_remember_nothing_is_restored() {
        let (db, mut store) = fresh();
        store
            .register("a@b.c", "alice", "Alice", "pw", false)
            .unwrap();

        let restored = SessionStore::new(db).unwrap();
        assert!(restored.current_user().is_none());
    }

    #[test]
    fn logout_clears_session_record_but_not_preferences() {
        let (db, mut store) = fresh();
        store.register("a@b.c", "alice", "Alice", "pw", true).unwrap();
        store.set_theme(Theme::DarkBlue).unwrap();
        store.logout().unwrap();
        assert!(store.current_user().is_none());

        let restored = SessionStore::new(db).unwrap();
        assert!(restored.current_user().is_none());
        assert_eq!(restored.theme(), Theme::DarkBlue);
    }

    #[test]
    fn update_profile_syncs_directory_and_session_record() {
        let (db, mut store) = fresh();
        store.register("a@b.c", "alice", "Alice", "pw", true).unwrap();

        store
            .update_profile(ProfileUpdate {
                display_name: Some("Alice L.".into()),
                bio: Some("hi".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.current_user().unwrap().display_name, "Alice L.");
        let entry = store.users().iter().find(|u| u.username == "alice").unwrap();
        assert_eq!(entry.bio.as_deref(), Some("hi"));

        let restored = SessionStore::new(db).unwrap();
        assert_eq!(restored.current_user().unwrap().display_name, "Alice L.");
    }

    #[test]
    fn update_profile_while_signed_out_is_a_noop() {
        let (_db, mut store) = fresh();
        store
            .update_profile(ProfileUpdate {
                display_name: Some("Ghost".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(store.current_user().is_none());
        assert_eq!(store.users().len(), 1);
    }

    #[test]
    fn preferences_persist_immediately() {
        let (db, mut store) = fresh();
        store.set_theme(Theme::PurpleLime).unwrap();
        store.set_language(Language::En).unwrap();

        let restored = SessionStore::new(db).unwrap();
        assert_eq!(restored.theme(), Theme::PurpleLime);
        assert_eq!(restored.language(), Language::En);
    }
}
