use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lookup strategy of a locator, mirroring Selenium's eight `By.*` constants.
///
/// The set is closed: tokens outside it (`AppiumBy.ACCESSIBILITY_ID`) are
/// recognized when scanning a file but cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Id,
    Name,
    Xpath,
    LinkText,
    PartialLinkText,
    TagName,
    ClassName,
    CssSelector,
}

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::Id,
        Strategy::Name,
        Strategy::Xpath,
        Strategy::LinkText,
        Strategy::PartialLinkText,
        Strategy::TagName,
        Strategy::ClassName,
        Strategy::CssSelector,
    ];

    /// Canonical upper-case token as it appears after the namespace.
    pub fn token(self) -> &'static str {
        match self {
            Strategy::Id => "ID",
            Strategy::Name => "NAME",
            Strategy::Xpath => "XPATH",
            Strategy::LinkText => "LINK_TEXT",
            Strategy::PartialLinkText => "PARTIAL_LINK_TEXT",
            Strategy::TagName => "TAG_NAME",
            Strategy::ClassName => "CLASS_NAME",
            Strategy::CssSelector => "CSS_SELECTOR",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown locator strategy '{0}'")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    /// Case-insensitive; spaces and hyphens count as underscores, so
    /// `"css selector"`, `"css-selector"` and `"CSS_SELECTOR"` are equal.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized: String = input
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();

        match normalized.as_str() {
            "CSS" => return Ok(Strategy::CssSelector),
            "CLASS" => return Ok(Strategy::ClassName),
            _ => {}
        }

        Strategy::ALL
            .into_iter()
            .find(|s| s.token() == normalized)
            .ok_or_else(|| UnknownStrategy(input.to_string()))
    }
}
