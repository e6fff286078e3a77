//! Desktop entry (.desktop file) parsing.
//!
//! Reads the `[Desktop Entry]` group of the XDG Desktop Entry Specification
//! and decides whether the application should be shown to the user.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

const MAIN_GROUP: &str = "[Desktop Entry]";
const TYPE_APPLICATION: &str = "Application";

/// `Key` or `Key[locale]`.
static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9-]+(\[[^\]\s]+\])?$").expect("Invalid regex pattern")
});

/// Why a desktop file could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesktopEntryError {
    #[error("could not find mandatory [Desktop Entry] header")]
    MissingMainGroup,

    #[error("{key}: '{value}' is not a valid boolean representation")]
    InvalidBool { key: String, value: String },
}

/// The fields of a desktop entry used to list applications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopEntry {
    /// Entry name (shown in menus), empty when absent.
    pub name: String,
    /// Entry type (`Application`, `Link`, `Directory`).
    pub entry_type: Option<String>,
    /// Raw `NoDisplay` value, checked only when visibility is decided.
    pub no_display: Option<String>,
    /// Raw `Hidden` value, checked only when visibility is decided.
    pub hidden: Option<String>,
    /// Desktops this entry is restricted to.
    pub only_show_in: Vec<String>,
    /// Desktops this entry is hidden from.
    pub not_show_in: Vec<String>,
}

impl DesktopEntry {
    /// Parse the content of a `.desktop` file.
    pub fn parse(content: &str) -> Result<Self, DesktopEntryError> {
        let fields = read_main_group(content)?;

        Ok(Self {
            name: fields.get("Name").cloned().unwrap_or_default(),
            entry_type: fields.get("Type").cloned(),
            no_display: fields.get("NoDisplay").cloned(),
            hidden: fields.get("Hidden").cloned(),
            only_show_in: read_list(&fields, "OnlyShowIn"),
            not_show_in: read_list(&fields, "NotShowIn"),
        })
    }

    pub fn is_application(&self) -> bool {
        self.entry_type.as_deref() == Some(TYPE_APPLICATION)
    }

    /// Whether this entry should not be displayed.
    pub fn no_display(&self) -> Result<bool, DesktopEntryError> {
        read_bool("NoDisplay", self.no_display.as_deref())
    }

    /// Whether this entry was deleted by the user.
    pub fn hidden(&self) -> Result<bool, DesktopEntryError> {
        read_bool("Hidden", self.hidden.as_deref())
    }

    /// Whether the entry should be presented on the given desktops
    /// (the `XDG_CURRENT_DESKTOP` list).
    ///
    /// Booleans are only validated for applications, `Hidden` only when
    /// `NoDisplay` is false. The first desktop named by either `OnlyShowIn`
    /// or `NotShowIn` decides. Without a match the entry is shown, unless it
    /// has an `OnlyShowIn` list.
    pub fn is_visible(&self, desktops: &[String]) -> Result<bool, DesktopEntryError> {
        if !self.is_application() || self.no_display()? || self.hidden()? {
            return Ok(false);
        }

        for desktop in desktops {
            if self.only_show_in.contains(desktop) {
                return Ok(true);
            }
            if self.not_show_in.contains(desktop) {
                return Ok(false);
            }
        }

        Ok(self.only_show_in.is_empty())
    }
}

/// Key/value pairs of the main group, localized keys kept as `Key[locale]`.
fn read_main_group(content: &str) -> Result<HashMap<String, String>, DesktopEntryError> {
    let mut lines = content.lines();
    lines
        .by_ref()
        .find(|line| line.trim_end() == MAIN_GROUP)
        .ok_or(DesktopEntryError::MissingMainGroup)?;

    let mut fields = HashMap::with_capacity(16);
    for line in lines {
        let line = line.trim();
        if line.starts_with('[') && line.ends_with(']') {
            break;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim_end();
        if KEY_PATTERN.is_match(key) {
            fields.insert(key.to_string(), value.trim_start().to_string());
        }
    }

    Ok(fields)
}

fn read_bool(key: &str, value: Option<&str>) -> Result<bool, DesktopEntryError> {
    match value.map(str::trim) {
        None => Ok(false),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(DesktopEntryError::InvalidBool {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

fn read_list(fields: &HashMap<String, String>, key: &str) -> Vec<String> {
    fields
        .get(key)
        .map(|list| {
            list.split(';')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desktops(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_parse_main_group_only() {
        let content = "\
# comment
[Desktop Entry]
Name=Calendar
Name[fr]=Calendrier
Type=Application
Exec=gnome-calendar

[Desktop Action new]
Name=New event
NoDisplay=true
";
        let entry = DesktopEntry::parse(content).unwrap();
        assert_eq!(entry.name, "Calendar");
        assert!(entry.is_application());
        assert_eq!(entry.no_display(), Ok(false));
        assert_eq!(entry.is_visible(&[]), Ok(true));
    }

    #[test]
    fn test_missing_main_group() {
        let result = DesktopEntry::parse("[Desktop Action x]\nName=x\n");
        assert_eq!(result, Err(DesktopEntryError::MissingMainGroup));
    }

    #[test]
    fn test_invalid_bool() {
        let entry = DesktopEntry::parse("[Desktop Entry]\nType=Application\nHidden=yes\n").unwrap();
        assert!(matches!(
            entry.is_visible(&[]),
            Err(DesktopEntryError::InvalidBool { .. })
        ));
    }

    #[test]
    fn test_invalid_bool_not_checked_when_already_decided() {
        // not an application
        let entry = DesktopEntry::parse("[Desktop Entry]\nName=x\nType=Link\nHidden=maybe\n").unwrap();
        assert_eq!(entry.is_visible(&[]), Ok(false));

        // NoDisplay already hides it
        let entry = DesktopEntry::parse(
            "[Desktop Entry]\nName=x\nType=Application\nNoDisplay=true\nHidden=maybe\n",
        )
        .unwrap();
        assert_eq!(entry.is_visible(&[]), Ok(false));

        let entry = DesktopEntry::parse(
            "[Desktop Entry]\nName=x\nType=Application\nNoDisplay=maybe\nHidden=true\n",
        )
        .unwrap();
        assert!(entry.is_visible(&[]).is_err());
    }

    #[test]
    fn test_missing_name_is_empty() {
        let entry = DesktopEntry::parse("[Desktop Entry]\nType=Application\n").unwrap();
        assert_eq!(entry.name, "");
    }

    #[test]
    fn test_spaces_around_separator() {
        let entry = DesktopEntry::parse("[Desktop Entry]\nName = Files \nType= Application\n").unwrap();
        assert_eq!(entry.name, "Files");
        assert!(entry.is_application());
    }

    #[test]
    fn test_hidden_kinds() {
        for content in [
            "[Desktop Entry]\nName=x\nType=Link\n",
            "[Desktop Entry]\nName=x\n",
            "[Desktop Entry]\nName=x\nType=Application\nNoDisplay=true\n",
            "[Desktop Entry]\nName=x\nType=Application\nHidden=true\n",
        ] {
            let entry = DesktopEntry::parse(content).unwrap();
            assert_eq!(entry.is_visible(&desktops(&["GNOME"])), Ok(false), "{}", content);
        }
    }

    #[test]
    fn test_show_in_rules() {
        let entry = DesktopEntry::parse(
            "[Desktop Entry]\nName=x\nType=Application\nOnlyShowIn=GNOME;Unity;\n",
        )
        .unwrap();
        assert_eq!(entry.only_show_in, desktops(&["GNOME", "Unity"]));
        assert_eq!(entry.is_visible(&desktops(&["ubuntu", "GNOME"])), Ok(true));
        assert_eq!(entry.is_visible(&desktops(&["KDE"])), Ok(false));
        assert_eq!(entry.is_visible(&[]), Ok(false));

        let entry = DesktopEntry::parse(
            "[Desktop Entry]\nName=x\nType=Application\nNotShowIn=KDE;\n",
        )
        .unwrap();
        assert_eq!(entry.is_visible(&desktops(&["KDE"])), Ok(false));
        assert_eq!(entry.is_visible(&desktops(&["GNOME"])), Ok(true));
        assert_eq!(entry.is_visible(&[]), Ok(true));

        // the first listed desktop that matches either list decides
        let entry = DesktopEntry::parse(
            "[Desktop Entry]\nName=x\nType=Application\nOnlyShowIn=GNOME;\nNotShowIn=ubuntu;\n",
        )
        .unwrap();
        assert_eq!(entry.is_visible(&desktops(&["ubuntu", "GNOME"])), Ok(false));
        assert_eq!(entry.is_visible(&desktops(&["GNOME", "ubuntu"])), Ok(true));
    }
}
