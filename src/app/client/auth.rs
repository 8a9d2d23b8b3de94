//! Provider login handshake
//!
//! Fetches the authentication URL, submits the provider's login form when
//! one is served, and checks the cookie jar for the session cookie the
//! provider is expected to set.

use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::app::client::session::Session;
use crate::auth::{AuthConfig, AuthUrl};
use crate::constants::auth;
use crate::errors::{AuthError, AuthResult, Result, ServerError};

/// Handles login round-trips for a session
pub struct AuthHandler;

impl AuthHandler {
    /// Log `session` in at `auth_url` on behalf of `destination`
    ///
    /// # Errors
    ///
    /// - `ServerError` if the provider answers with an error status
    /// - `AuthError::MissingPassword` if a login form is served without a
    ///   configured password
    /// - `AuthError::AuthenticationFailure` if the expected cookie is absent
    ///   once the round-trip completes
    /// - transport errors unmodified
    pub async fn authenticate(
        session: &Session,
        destination: &Url,
        auth_url: &AuthUrl,
        config: &AuthConfig,
    ) -> Result<()> {
        let login_url = Url::parse(auth_url.url()).map_err(|e| AuthError::InvalidUrl {
            url: auth_url.url().to_string(),
            reason: e.to_string(),
        })?;
        info!("Authenticating at {}", login_url);

        let mut response = session.send(session.client().get(login_url.clone())).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(identity) = config.identity() {
                debug!("Login page requires basic credentials, retrying");
                response = session
                    .send(
                        session
                            .client()
                            .get(login_url.clone())
                            .basic_auth(identity, config.password.as_deref()),
                    )
                    .await?;
            }
        }

        if !response.status().is_success() {
            return Err(ServerError::from_status(response.status()).into());
        }

        let page_url = response.url().clone();
        let html = response.text().await?;

        match LoginForm::parse(&html, &page_url, config)? {
            Some(form) => {
                debug!("Submitting login form to {}", form.action);
                let response = session
                    .send(session.client().post(form.action).form(&form.fields))
                    .await?;
                if !response.status().is_success() {
                    return Err(ServerError::from_status(response.status()).into());
                }
            }
            None => debug!("No login form at {}", page_url),
        }

        if auth_url.is_two_stage() {
            debug!("Revisiting {} for the provider's second redirect", destination);
            let response = session.send(session.client().get(destination.clone())).await?;
            debug!("Second stage answered {}", response.status());
        }

        Self::verify_cookie(session, destination, &login_url, config)?;
        info!("Authenticated for {}", destination);
        Ok(())
    }

    /// Check that the provider set the expected session cookie
    fn verify_cookie(
        session: &Session,
        destination: &Url,
        login_url: &Url,
        config: &AuthConfig,
    ) -> AuthResult<()> {
        let Some(cookie) = config.session_cookie() else {
            debug!("No session cookie expected, skipping verification");
            return Ok(());
        };

        let found = [destination, login_url]
            .into_iter()
            .any(|url| session.cookie_names(url).iter().any(|name| name == cookie));

        if found {
            Ok(())
        } else {
            Err(AuthError::AuthenticationFailure {
                cookie: cookie.to_string(),
                url: destination.to_string(),
            })
        }
    }
}

/// Login form extracted from a provider page
#[derive(Debug, Clone, PartialEq)]
struct LoginForm {
    action: Url,
    fields: Vec<(String, String)>,
}

impl LoginForm {
    /// First form on the page carrying a password input, filled in from
    /// `config`; `None` when the page has no such form
    fn parse(html: &str, page_url: &Url, config: &AuthConfig) -> AuthResult<Option<Self>> {
        let document = Html::parse_document(html);
        let (Ok(form_selector), Ok(input_selector)) = (
            Selector::parse(auth::FORM_SELECTOR),
            Selector::parse(auth::INPUT_SELECTOR),
        ) else {
            return Ok(None);
        };

        let Some(form) = document.select(&form_selector).find(|form| {
            form.select(&input_selector)
                .any(|input| input_type(&input) == "password")
        }) else {
            return Ok(None);
        };

        let action = match form.value().attr("action").map(str::trim) {
            Some(action) if !action.is_empty() => {
                page_url.join(action).map_err(|e| AuthError::InvalidUrl {
                    url: action.to_string(),
                    reason: e.to_string(),
                })?
            }
            _ => page_url.clone(),
        };

        let password = config
            .password
            .as_deref()
            .ok_or_else(|| AuthError::MissingPassword {
                url: page_url.to_string(),
            })?;

        let mut fields = Vec::new();
        let mut password_field = None;
        for input in form.select(&input_selector) {
            let Some(name) = input.value().attr("name") else {
                continue;
            };
            let value = input.value().attr("value").unwrap_or_default();
            match input_type(&input).as_str() {
                "password" => {
                    password_field.get_or_insert_with(|| name.to_string());
                }
                "submit" | "button" | "image" | "reset" | "file" => {}
                "checkbox" | "radio" if input.value().attr("checked").is_none() => {}
                _ => {
                    let value = if name == config.username_field && value.is_empty() {
                        config.identity().unwrap_or_default()
                    } else {
                        value
                    };
                    fields.push((name.to_string(), value.to_string()));
                }
            }
        }

        let password_field = if fields.iter().any(|(name, _)| *name == config.password_field) {
            fields.retain(|(name, _)| *name != config.password_field);
            config.password_field.clone()
        } else {
            password_field.unwrap_or_else(|| config.password_field.clone())
        };
        fields.push((password_field, password.to_string()));

        Ok(Some(Self { action, fields }))
    }
}

fn input_type(input: &ElementRef<'_>) -> String {
    input
        .value()
        .attr("type")
        .unwrap_or("text")
        .to_ascii_lowercase()
}
