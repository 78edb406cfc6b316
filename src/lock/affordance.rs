//! Control panel button (the "affordance") for the settings lock.
//!
//! Builds the UI extension XML the endpoint expects for
//! `UserInterface Extensions Panel Save`. The button always offers the
//! opposite of the current state: a locked menu shows the unlock button.

use super::state::LockState;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// Where a button icon comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum IconSource {
    /// Image downloaded onto the endpoint before use.
    Remote(String),
    /// One of the endpoint's built-in icons (e.g. `Lock`, `Sliders`).
    Named(String),
}

impl FromStr for IconSource {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("https://") || s.starts_with("http://") {
            Ok(IconSource::Remote(s.to_string()))
        } else {
            Ok(IconSource::Named(s.to_string()))
        }
    }
}

/// Display metadata for one button variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub name: String,
    pub icon: IconSource,
    #[serde(default)]
    pub color: Option<String>,
}

/// Button variants for both lock states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSet {
    /// Shown while unlocked; pressing it locks.
    pub lock: ButtonConfig,
    /// Shown while locked; pressing it asks for the PIN.
    pub unlock: ButtonConfig,
}

impl ButtonSet {
    pub fn for_state(&self, state: LockState) -> &ButtonConfig {
        match state {
            LockState::Locked => &self.unlock,
            LockState::Unlocked => &self.lock,
        }
    }
}

impl Default for ButtonSet {
    fn default() -> Self {
        Self {
            lock: ButtonConfig {
                name: "Lock Settings".to_string(),
                icon: IconSource::Remote(
                    "https://wxsd-sales.github.io/settings-lock-macro/images/locked.png"
                        .to_string(),
                ),
                color: None,
            },
            unlock: ButtonConfig {
                name: "Unlock Settings".to_string(),
                icon: IconSource::Remote(
                    "https://wxsd-sales.github.io/settings-lock-macro/images/unlocked.png"
                        .to_string(),
                ),
                color: None,
            },
        }
    }
}

/// Icon after any download has happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelIcon {
    /// Icon id returned by `Extensions Icon Download`.
    Custom(String),
    Named(String),
}

/// A fully resolved control panel button, ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelDefinition {
    pub name: String,
    pub icon: PanelIcon,
    pub color: Option<String>,
    /// Position among custom extensions; `None` appends.
    pub order: Option<u32>,
}

impl PanelDefinition {
    /// Render the `<Extensions>` document for `Panel Save`.
    pub fn to_xml(&self) -> String {
        let icon = match &self.icon {
            PanelIcon::Custom(id) => format!(
                "<Icon>Custom</Icon><CustomIcon><Id>{}</Id></CustomIcon>",
                escape_xml(id)
            ),
            PanelIcon::Named(name) => format!("<Icon>{}</Icon>", escape_xml(name)),
        };
        let color = self
            .color
            .as_deref()
            .map(|c| format!("<Color>{}</Color>", escape_xml(c)))
            .unwrap_or_default();
        let order = self
            .order
            .map(|o| format!("<Order>{o}</Order>"))
            .unwrap_or_default();

        format!(
            "<Extensions><Panel><Location>ControlPanel</Location>{icon}{color}<Name>{}</Name>{order}<ActivityType>Custom</ActivityType></Panel></Extensions>",
            escape_xml(&self.name)
        )
    }
}

/// An entry from `UserInterface Extensions List`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelListing {
    pub panel_id: String,
    pub order: Option<u32>,
}

/// Existing order of `panel_id` among listed panels, if it is already there.
pub fn existing_order(panels: &[PanelListing], panel_id: &str) -> Option<u32> {
    panels
        .iter()
        .find(|p| p.panel_id == panel_id)
        .and_then(|p| p.order)
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
