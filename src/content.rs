use std::fmt;

pub const TYPE_JSON: &str = "application/json";
pub const TYPE_XML: &str = "application/xml";
pub const TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const TYPE_HTML: &str = "text/html";
pub const TYPE_TEXT: &str = "text/plain";

pub const UTF8: &str = "utf-8";

/// Content-type identifier used to pick a codec.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentType {
    #[default]
    Json,
    Xml,
    Form,
    Html,
    Text,
    /// Any other media type; the codec rejects it.
    Other(String),
}

impl ContentType {
    /// Parses a bare media type (no parameters), case-insensitively.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let known = [
            (TYPE_JSON, Self::Json),
            (TYPE_XML, Self::Xml),
            (TYPE_FORM, Self::Form),
            (TYPE_HTML, Self::Html),
            (TYPE_TEXT, Self::Text),
        ];
        known
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
            .map(|(_, kind)| kind)
            .unwrap_or_else(|| Self::Other(value.to_owned()))
    }

    /// Parses a `Content-Type` header value, dropping everything from the
    /// first `;` on.
    ///
    /// `"application/xml;charset=utf-8"` → [`ContentType::Xml`]
    pub fn from_header(value: &str) -> Self {
        let media = value.split(';').next().unwrap_or_default();
        Self::parse(media)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Json => TYPE_JSON,
            Self::Xml => TYPE_XML,
            Self::Form => TYPE_FORM,
            Self::Html => TYPE_HTML,
            Self::Text => TYPE_TEXT,
            Self::Other(value) => value,
        }
    }

    /// Header value for outgoing bodies, with an optional charset parameter.
    pub fn header_value(&self, charset: Option<&str>) -> String {
        match charset {
            Some(charset) if !charset.is_empty() => format!("{}; charset={charset}", self.as_str()),
            _ => self.as_str().to_owned(),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ContentType {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
