//! Redirect parameter parsing
//!
//! The provider may put its parameters in the query string or in the URL
//! fragment depending on the flow. Both are parsed; for every key the first
//! non-empty value wins, looking at the fragment before the query.

use url::{form_urlencoded, Url};

use crate::models::{ConfirmationRequest, EventType};

/// Merged view over the fragment and query parameters of one redirect
#[derive(Debug, Clone, Default)]
pub struct RedirectParams {
    fragment: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    let raw = raw.trim_start_matches(['?', '#']);
    form_urlencoded::parse(raw.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

impl RedirectParams {
    /// Parse raw query and fragment strings, with or without their `?`/`#` prefix
    #[must_use]
    pub fn from_parts(query: &str, fragment: &str) -> Self {
        Self {
            fragment: parse_pairs(fragment),
            query: parse_pairs(query),
        }
    }

    /// Parse the parameters of a full redirect URL
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute URL
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(url)?;
        Ok(Self::from_parts(
            url.query().unwrap_or_default(),
            url.fragment().unwrap_or_default(),
        ))
    }

    /// First non-empty value for `key`, fragment first
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fragment
            .iter()
            .chain(self.query.iter())
            .find(|(k, v)| k == key && !v.trim().is_empty())
            .map(|(_, v)| v.as_str())
    }

    fn get_owned(&self, key: &str) -> Option<String> {
        self.get(key).map(ToString::to_string)
    }

    /// Classify the redirect into a [`ConfirmationRequest`]
    #[must_use]
    pub fn to_request(&self) -> ConfirmationRequest {
        ConfirmationRequest {
            access_token: self.get_owned("access_token"),
            refresh_token: self.get_owned("refresh_token"),
            event_type: self.get("type").map(EventType::parse),
            error_code: self.get_owned("error").or_else(|| self.get_owned("error_code")),
            error_description: self.get_owned("error_description"),
        }
    }
}

impl ConfirmationRequest {
    /// Build a request from the raw query string and URL fragment
    #[must_use]
    pub fn from_parts(query: &str, fragment: &str) -> Self {
        RedirectParams::from_parts(query, fragment).to_request()
    }

    /// Build a request from a full redirect URL
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute URL
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        Ok(RedirectParams::from_url(url)?.to_request())
    }
}
