//! Reads values from the sync service's own `config.xml`.
//!
//! The service writes its configuration asynchronously after first boot, so
//! every failure here (missing file, half-written XML, missing element) means
//! "not ready yet" and is reported as `None`.

use std::path::{Path, PathBuf};
use tracing::trace;

/// File name of the service configuration inside its home directory.
pub const CONFIG_FILE_NAME: &str = "config.xml";

const GUI_ELEMENT: &str = "gui";
const API_KEY_ELEMENT: &str = "apikey";

/// Location of the configuration file for a home directory.
pub fn config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(CONFIG_FILE_NAME)
}

/// Extract the text of `<parent><child>` directly below the document root.
///
/// Returns `None` when the document cannot be parsed, either element is
/// missing, or the text is empty.
pub fn parse_child_text(xml: &str, parent: &str, child: &str) -> Option<String> {
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            trace!("Configuration is not valid XML yet: {}", e);
            return None;
        }
    };

    let text = doc
        .root_element()
        .children()
        .find(|node| node.has_tag_name(parent))?
        .children()
        .find(|node| node.has_tag_name(child))?
        .text()?
        .trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Read `<gui><name>` from the configuration file at `path`.
pub async fn read_gui_value(path: &Path, name: &str) -> Option<String> {
    let xml = match tokio::fs::read_to_string(path).await {
        Ok(xml) => xml,
        Err(e) => {
            trace!(path = %path.display(), "Configuration not readable: {}", e);
            return None;
        }
    };
    parse_child_text(&xml, GUI_ELEMENT, name)
}

/// Read the API key of the service living in `home_dir`.
pub async fn read_api_key(home_dir: &Path) -> Option<String> {
    read_gui_value(&config_path(home_dir), API_KEY_ELEMENT).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_key() {
        let xml = "<root><gui><apikey>ABC123</apikey></gui></root>";
        assert_eq!(
            parse_child_text(xml, "gui", "apikey"),
            Some("ABC123".to_string())
        );
    }

    #[test]
    fn test_missing_gui_element() {
        let xml = "<root><options><apikey>ABC123</apikey></options></root>";
        assert_eq!(parse_child_text(xml, "gui", "apikey"), None);
    }

    #[test]
    fn test_missing_apikey_and_empty_text() {
        assert_eq!(
            parse_child_text("<root><gui><address>127.0.0.1:8384</address></gui></root>", "gui", "apikey"),
            None
        );
        assert_eq!(
            parse_child_text("<root><gui><apikey></apikey></gui></root>", "gui", "apikey"),
            None
        );
    }

    #[test]
    fn test_malformed_document() {
        assert_eq!(parse_child_text("<root><gui><apikey>AB", "gui", "apikey"), None);
        assert_eq!(parse_child_text("", "gui", "apikey"), None);
    }

    #[test]
    fn test_real_world_layout() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<configuration version="37">
    <folder id="default" path="/data/Sync"></folder>
    <gui enabled="true" tls="false" debugging="false">
        <address>127.0.0.1:8384</address>
        <apikey>
            kq3SxMzUvR7pHd
        </apikey>
        <theme>default</theme>
    </gui>
</configuration>"#;
        assert_eq!(parse_child_text(xml, "gui", "apikey"), Some("kq3SxMzUvR7pHd".to_string()));
        assert_eq!(parse_child_text(xml, "gui", "address"), Some("127.0.0.1:8384".to_string()));
    }

    #[tokio::test]
    async fn test_read_api_key_missing_file() {
        let home = tempfile::tempdir().unwrap();
        assert_eq!(read_api_key(home.path()).await, None);
    }

    #[tokio::test]
    async fn test_read_api_key_from_file() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            config_path(home.path()),
            "<root><gui><apikey>ABC123</apikey></gui></root>",
        )
        .unwrap();
        assert_eq!(read_api_key(home.path()).await, Some("ABC123".to_string()));
    }
}
