use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::message::Author;

/// Shown once sign-in succeeds.
pub const SIGNED_IN_NOTICE: &str = "Signed in Successfully!";

/// Background colours offered on the entry screen.
pub const THEME_OPTIONS: [ThemeColor; 5] = [
    ThemeColor::rgb(0x09, 0x0C, 0x08),
    ThemeColor::rgb(0x47, 0x40, 0x56),
    ThemeColor::rgb(0x8A, 0x95, 0xA5),
    ThemeColor::rgb(0xB9, 0xC6, 0xAE),
    ThemeColor::rgb(0xFF, 0xFF, 0xFF),
];

/// An `#RRGGBB` colour chosen for the chat background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThemeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ThemeColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Whether dark text reads better than light text on this colour.
    pub fn is_light(&self) -> bool {
        let luma = 299 * u32::from(self.r) + 587 * u32::from(self.g) + 114 * u32::from(self.b);
        luma / 1000 > 128
    }
}

impl Default for ThemeColor {
    fn default() -> Self {
        THEME_OPTIONS[4]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid colour {0:?}, expected #RRGGBB")]
pub struct InvalidColor(String);

impl FromStr for ThemeColor {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidColor(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for ThemeColor {
    type Error = InvalidColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ThemeColor> for String {
    fn from(color: ThemeColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for ThemeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Anonymous sign-in against an identity provider.
pub trait Authenticator: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the id of a freshly signed-in anonymous user.
    fn sign_in_anonymously(&self) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// Issues random ids locally, with no identity provider behind it.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousAuthenticator;

impl Authenticator for AnonymousAuthenticator {
    type Error = std::convert::Infallible;

    async fn sign_in_anonymously(&self) -> Result<String, Self::Error> {
        Ok(uuid::Uuid::new_v4().simple().to_string())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unable to sign in, try again later.")]
pub struct SessionError<E: std::error::Error + 'static>(#[source] pub E);

/// Identity and appearance handed from the entry screen to the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(flatten)]
    pub author: Author,
    pub theme_color: ThemeColor,
}

impl Session {
    /// Signs in anonymously and pairs the resulting id with `name`.
    #[instrument(skip(auth, name))]
    pub async fn start<A: Authenticator>(
        auth: &A,
        name: impl Into<String>,
        theme_color: ThemeColor,
    ) -> Result<Self, SessionError<A::Error>> {
        let id = auth.sign_in_anonymously().await.map_err(SessionError)?;
        let author = Author::new(id, name);
        info!(author = %author.id, "signed in");
        Ok(Self {
            author,
            theme_color,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_palette() {
        let parsed: Vec<ThemeColor> = ["#090C08", "#474056", "#8A95A5", "#B9C6AE", "#FFFFFF"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();

        assert_eq!(parsed, THEME_OPTIONS.to_vec());
        assert_eq!(THEME_OPTIONS[1].to_string(), "#474056");
        assert_eq!(ThemeColor::default().to_string(), "#FFFFFF");
    }

    #[test]
    fn lowercase_hex_is_accepted() {
        assert_eq!("#b9c6ae".parse::<ThemeColor>().unwrap(), THEME_OPTIONS[3]);
    }

    #[test]
    fn rejects_malformed_colours() {
        for bad in ["474056", "#47405", "#4740566", "#GGGGGG", "#ééé"] {
            assert!(bad.parse::<ThemeColor>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn lightness() {
        assert!(THEME_OPTIONS[4].is_light());
        assert!(!THEME_OPTIONS[0].is_light());
    }

    #[test]
    fn session_handoff_shape() {
        let session = Session {
            author: Author::new("uid-1", "Ada"),
            theme_color: THEME_OPTIONS[2],
        };

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["authorId"], "uid-1");
        assert_eq!(json["authorName"], "Ada");
        assert_eq!(json["themeColor"], "#8A95A5");
    }

    #[derive(Debug, thiserror::Error)]
    #[error("auth backend unreachable")]
    struct Unreachable;

    struct DownAuthenticator;

    impl Authenticator for DownAuthenticator {
        type Error = Unreachable;

        async fn sign_in_anonymously(&self) -> Result<String, Self::Error> {
            Err(Unreachable)
        }
    }

    #[tokio::test]
    async fn start_assigns_distinct_ids() {
        let a = Session::start(&AnonymousAuthenticator, "Ada", ThemeColor::default())
            .await
            .unwrap();
        let b = Session::start(&AnonymousAuthenticator, "Ada", ThemeColor::default())
            .await
            .unwrap();

        assert_eq!(a.author.name, "Ada");
        assert!(!a.author.id.is_empty());
        assert_ne!(a.author.id, b.author.id);
    }

    #[tokio::test]
    async fn sign_in_failure_becomes_a_notice() {
        let err = Session::start(&DownAuthenticator, "Ada", ThemeColor::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unable to sign in, try again later.");
    }
}
