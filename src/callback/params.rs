//! Parsing of the redirect URL the identity service sends users back with

use std::fmt;

/// Which email-link flow the user just completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowType {
    Signup,
    Recovery,
    EmailChange,
    Magiclink,
    Unknown,
}

impl FlowType {
    /// Parse the redirect's `type` value; anything unrecognised is `Unknown`
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("signup") => Self::Signup,
            Some("recovery") => Self::Recovery,
            Some("email_change") => Self::EmailChange,
            Some("magiclink") => Self::Magiclink,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Recovery => "recovery",
            Self::EmailChange => "email_change",
            Self::Magiclink => "magiclink",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable view of the parameters carried by a callback redirect
///
/// Values come from the URL fragment and the query string. The fragment
/// takes precedence when both carry a key, and empty values are treated
/// as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CallbackParameters {
    pub flow_type: Option<FlowType>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_hash: Option<String>,
    pub error_description: Option<String>,
}

/// One `application/x-www-form-urlencoded` source, first occurrence wins
struct ParamSource(Vec<(String, String)>);

impl ParamSource {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim_start_matches(['#', '?']);
        Self(
            url::form_urlencoded::parse(raw.as_bytes())
                .into_owned()
                .collect(),
        )
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

impl CallbackParameters {
    /// Build from the raw fragment and query strings (with or without their
    /// leading `#` / `?`)
    #[must_use]
    pub fn from_parts(fragment: &str, query: &str) -> Self {
        let fragment = ParamSource::parse(fragment);
        let query = ParamSource::parse(query);
        let lookup = |key: &str| {
            fragment
                .get(key)
                .or_else(|| query.get(key))
                .map(ToString::to_string)
        };

        Self {
            flow_type: lookup("type").map(|t| FlowType::parse(Some(&t))),
            access_token: lookup("access_token"),
            refresh_token: lookup("refresh_token"),
            token_hash: lookup("token_hash"),
            error_description: lookup("error_description"),
        }
    }

    /// The flow type, `Unknown` when the redirect carried none
    #[must_use]
    pub fn flow(&self) -> FlowType {
        self.flow_type.unwrap_or(FlowType::Unknown)
    }

    /// `error_description` with one extra percent-decoding pass
    ///
    /// The identity service sometimes double-encodes the description. Input
    /// that does not decode to UTF-8 is returned as received.
    #[must_use]
    pub fn decoded_error_description(&self) -> Option<String> {
        self.error_description.as_deref().map(|raw| {
            urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |decoded| decoded.into_owned())
        })
    }
}

impl fmt::Debug for CallbackParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let presence = |value: &Option<String>| if value.is_some() { "present" } else { "absent" };
        f.debug_struct("CallbackParameters")
            .field("flow_type", &self.flow_type)
            .field("access_token", &presence(&self.access_token))
            .field("refresh_token", &presence(&self.refresh_token))
            .field("token_hash", &presence(&self.token_hash))
            .field("error_description", &self.error_description)
            .finish()
    }
}
