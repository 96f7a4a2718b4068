//! Kakao OAuth credential lifecycle and send-to-self messaging.
//!
//! Owns the access/refresh token pair persisted in the settings file and
//! hides expiry handling from callers. Every remote failure degrades to a
//! boolean `false` or a silent no-op; the one state-changing consequence of
//! failure is that a failed refresh forces a full logout (an unrefreshable
//! session is assumed permanently invalid).

use crate::config::KakaoConfig;
use crate::settings::SettingsStore;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Seconds subtracted from a refreshed token's lifetime so validity checks
/// refresh slightly before true expiry.
pub const REFRESH_SAFETY_MARGIN_SECS: i64 = 300;

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
}

/// Kakao OAuth client and message sender.
///
/// Holds the process-lifetime HTTP client; constructed once at startup and
/// shared via `Arc`.
pub struct KakaoClient {
    config: KakaoConfig,
    settings: Arc<SettingsStore>,
    http: reqwest::Client,
}

impl KakaoClient {
    /// Create a client over the given settings store.
    ///
    /// Every request is bounded by the configured timeout; callers hold the
    /// board lock across sends and must not wait on a hung endpoint.
    #[must_use]
    pub fn new(config: KakaoConfig, settings: Arc<SettingsStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            settings,
            http,
        }
    }

    /// The URL a user must visit to authorize this app.
    ///
    /// Pure construction from static configuration; no side effects.
    #[must_use]
    pub fn authorization_url(&self) -> String {
        format!(
            "{}/oauth/authorize?client_id={}&redirect_uri={}&response_type=code",
            self.config.auth_base_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
        )
    }

    /// Exchange a one-time authorization code for a token pair.
    ///
    /// Returns `false` on any transport/parse error or a response missing
    /// either token, leaving prior state unchanged.
    pub async fn authorize(&self, code: &str) -> bool {
        let mut form = HashMap::new();
        form.insert("grant_type", "authorization_code");
        form.insert("client_id", self.config.client_id.as_str());
        form.insert("redirect_uri", self.config.redirect_uri.as_str());
        form.insert("code", code);

        let token = match self.request_token(&form).await {
            Ok(token) => token,
            Err(e) => {
                warn!("kakao authorize failed: {e}");
                return false;
            }
        };

        let (Some(access), Some(refresh)) = (token.access_token, token.refresh_token) else {
            warn!("kakao authorize response missing tokens");
            return false;
        };

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        let saved = self.settings.update_and_save(|s| {
            s.kakao_access_token = Some(access);
            s.kakao_refresh_token = Some(refresh);
            s.kakao_token_expires_at = Some(expires_at);
        });
        if let Err(e) = saved {
            warn!("cannot persist kakao tokens: {e}");
        }

        true
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Returns `false` without side effects when no refresh token is stored.
    /// A failed exchange (unreachable endpoint or non-2xx) means the session
    /// is no longer valid and triggers [`Self::logout`] before returning
    /// `false`. On success the new expiry is `now + expires_in - 300s`; a
    /// rotated refresh token in the response replaces the stored one.
    pub async fn try_refresh(&self) -> bool {
        let Some(refresh_token) = self.settings.snapshot().kakao_refresh_token else {
            return false;
        };

        let mut form = HashMap::new();
        form.insert("grant_type", "refresh_token");
        form.insert("client_id", self.config.client_id.as_str());
        form.insert("refresh_token", refresh_token.as_str());

        let token = match self.request_token(&form).await {
            Ok(token) => token,
            Err(e) => {
                warn!("kakao refresh failed, logging out: {e}");
                self.logout().await;
                return false;
            }
        };

        let Some(access) = token.access_token else {
            warn!("kakao refresh response missing access token");
            return false;
        };

        let expires_at =
            Utc::now() + Duration::seconds(token.expires_in - REFRESH_SAFETY_MARGIN_SECS);
        let saved = self.settings.update_and_save(|s| {
            s.kakao_access_token = Some(access);
            s.kakao_token_expires_at = Some(expires_at);
            if let Some(rotated) = token.refresh_token {
                s.kakao_refresh_token = Some(rotated);
            }
        });
        if let Err(e) = saved {
            warn!("cannot persist refreshed kakao token: {e}");
        }

        true
    }

    /// Log out: best-effort remote revoke, then unconditional local clear.
    pub async fn logout(&self) {
        if let Some(access) = self.settings.snapshot().kakao_access_token {
            let url = format!("{}/v1/user/logout", self.config.api_base_url);
            let result = self.http.post(&url).bearer_auth(&access).send().await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    debug!("kakao logout returned {}", response.status());
                }
                Ok(_) => {}
                Err(e) => debug!("kakao logout request failed: {e}"),
            }
        }

        let saved = self.settings.update_and_save(|s| {
            s.kakao_access_token = None;
            s.kakao_refresh_token = None;
            s.kakao_token_expires_at = None;
        });
        if let Err(e) = saved {
            warn!("cannot persist kakao logout: {e}");
        }
    }

    /// Send a "to me" text message.
    ///
    /// No-op when logged out. An expired access token is refreshed first;
    /// when the refresh fails the send is silently skipped. Transport
    /// failures are logged, never propagated.
    pub async fn send_message(&self, text: &str) {
        let snapshot = self.settings.snapshot();
        if snapshot.kakao_access_token.is_none() {
            return;
        }

        let expired = snapshot
            .kakao_token_expires_at
            .is_none_or(|expires_at| Utc::now() >= expires_at);
        if expired && !self.try_refresh().await {
            return;
        }

        let Some(access) = self.settings.snapshot().kakao_access_token else {
            return;
        };

        let template = serde_json::json!({
            "object_type": "text",
            "text": text,
            "link": { "web_url": "", "mobile_web_url": "" },
        });
        let mut form = HashMap::new();
        form.insert("template_object", template.to_string());

        let url = format!(
            "{}/v2/api/talk/memo/default/send",
            self.config.api_base_url
        );
        match self.http.post(&url).bearer_auth(&access).form(&form).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!("kakao message send returned {}", response.status());
            }
            Ok(_) => debug!("kakao message sent"),
            Err(e) => warn!("kakao message send failed: {e}"),
        }
    }

    async fn request_token(&self, form: &HashMap<&str, &str>) -> anyhow::Result<TokenResponse> {
        let url = format!("{}/oauth/token", self.config.auth_base_url);
        let response = self.http.post(&url).form(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("token endpoint returned {status}: {body}");
        }

        Ok(response.json::<TokenResponse>().await?)
    }
}
