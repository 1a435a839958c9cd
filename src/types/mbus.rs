// ABOUTME: Message bus URLs carry basic-auth credentials inline.
// ABOUTME: Splits them off so requests authenticate explicitly.

use url::Url;

/// An mbus URL with its userinfo removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MbusUrl {
    pub url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl MbusUrl {
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        let mut url = Url::parse(raw)?;
        let username = Some(url.username().to_string()).filter(|u| !u.is_empty());
        let password = url.password().map(str::to_string);
        // Only fails for cannot-be-a-base URLs, which have no credentials anyway.
        let _ = url.set_username("");
        let _ = url.set_password(None);
        Ok(Self {
            url,
            username,
            password,
        })
    }

    /// `<base>/<segment>` without doubling slashes.
    pub fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }
}
