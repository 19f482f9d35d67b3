use anyhow::Result;
use serde_json::{Value, json};
use tracing::debug;

/// Production endpoint of the hosted backend.
pub const DEFAULT_API_URL: &str =
    "https://functions.poehali.dev/b47e1733-15ac-48e5-a46e-c28b9a44ac93";

/// Thin client for the remote messenger endpoint: every call POSTs a JSON
/// body to `<base>/?action=<name>` and passes the response body through as
/// untyped JSON. Fire-and-forget: no retries, no response contract. The
/// local stores never call this; it is the integration point for a hosted
/// backend.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn request(&self, action: &str, body: &Value) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/", self.base_url))
            .query(&[("action", action)])
            .json(body)
    }

    async fn post(&self, action: &str, body: Value) -> Result<Value> {
        debug!(action, "remote api call");
        let response = self.request(action, &body).send().await?;
        Ok(response.json().await?)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Value> {
        self.post("login", json!({ "username": username, "password": password }))
            .await
    }

    pub async fn register(
        &self,
        email: &str,
        username: &str,
        display_name: &str,
        password: &str,
    ) -> Result<Value> {
        self.post(
            "register",
            json!({
                "email": email,
                "username": username,
                "displayName": display_name,
                "password": password,
            }),
        )
        .await
    }

    pub async fn get_chats(&self, user_id: &str) -> Result<Value> {
        self.post("get_chats", json!({ "userId": user_id })).await
    }

    pub async fn get_messages(&self, chat_id: &str) -> Result<Value> {
        self.post("get_messages", json!({ "chatId": chat_id })).await
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        content: &str,
        kind: &str,
        media_url: Option<&str>,
    ) -> Result<Value> {
        self.post(
            "send_message",
            json!({
                "chatId": chat_id,
                "senderId": sender_id,
                "content": content,
                "type": kind,
                "mediaUrl": media_url,
            }),
        )
        .await
    }

    pub async fn update_profile(&self, user_id: &str, updates: Value) -> Result<Value> {
        let mut body = json!({ "userId": user_id });
        if let (Some(obj), Some(extra)) = (body.as_object_mut(), updates.as_object()) {
            for (key, value) in extra {
                obj.insert(key.clone(), value.clone());
            }
        }
        self.post("update_profile", body).await
    }

    pub async fn search_users(&self, query: &str, user_id: &str) -> Result<Value> {
        self.post("search_users", json!({ "query": query, "userId": user_id }))
            .await
    }
}
