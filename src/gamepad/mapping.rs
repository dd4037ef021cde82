//! Controller mapping data
//!
//! Two sources feed the backend:
//!
//! 1. a community database, one SDL mapping definition per line
//!    (`GUID,name,key:value,...`)
//! 2. a platform specific generic template, appended to a device GUID and name
//!    to synthesize a mapping for hardware the database does not know about
//!
//! Both ship with the crate and can be replaced from the configuration. They
//! are read once before the backend is built and never change afterwards.

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const BUNDLED_DATABASE: &str = include_str!("../../resources/database.txt");

#[cfg(target_os = "windows")]
const BUNDLED_GENERIC: &str = include_str!("../../resources/generic/windows.txt");
#[cfg(target_os = "macos")]
const BUNDLED_GENERIC: &str = include_str!("../../resources/generic/mac-osx.txt");
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const BUNDLED_GENERIC: &str = include_str!("../../resources/generic/linux.txt");

#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: Vec<String>,
    generic: Option<String>,
}

impl MappingTable {
    /// Loads the community database and the generic template.
    ///
    /// Without a configured path the bundled database and the generic template
    /// bundled for the build platform are used. An unreadable database leaves
    /// the table empty.
    pub fn load(database: Option<&Path>, generic_override: Option<&Path>) -> Self {
        let entries = match database {
            Some(path) => match fs::read_to_string(path) {
                Ok(content) => {
                    let entries = parse_database(&content);
                    info!(
                        "Loaded {} controller mappings from {}",
                        entries.len(),
                        path.display()
                    );
                    entries
                }
                Err(e) => {
                    debug!("Mapping database {} not readable: {}", path.display(), e);
                    Vec::new()
                }
            },
            None => {
                let entries = parse_database(BUNDLED_DATABASE);
                debug!("Using {} bundled controller mappings", entries.len());
                entries
            }
        };

        let generic = match generic_override {
            Some(path) => match fs::read_to_string(path) {
                Ok(content) => normalize_template(&content),
                Err(e) => {
                    warn!(
                        "Generic mapping {} not readable, unknown devices stay unmapped: {}",
                        path.display(),
                        e
                    );
                    None
                }
            },
            None => normalize_template(BUNDLED_GENERIC),
        };

        Self { entries, generic }
    }

    pub fn from_parts(entries: Vec<String>, generic: Option<String>) -> Self {
        Self { entries, generic }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn generic(&self) -> Option<&str> {
        self.generic.as_deref()
    }

    /// All database lines joined the way the backends ingest them
    pub fn as_database(&self) -> String {
        self.entries.join("\n")
    }

    /// Builds `GUID,name,template` for a device the backend does not recognize
    pub fn synthesize(&self, guid: &str, name: &str) -> Option<String> {
        let template = self.generic.as_deref()?;
        // Commas separate fields in the mapping grammar.
        let name = name.replace(',', " ");
        Some(format!("{},{},{}", guid, name, template))
    }
}

fn parse_database(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn normalize_template(content: &str) -> Option<String> {
    let template = content.trim();
    if template.is_empty() {
        None
    } else {
        Some(template.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "driverstation-input-{}-{}",
            std::process::id(),
            name
        ));
        fs::write(&path, content).expect("write temp file");
        path
    }

    #[test]
    fn database_skips_comments_and_blank_lines() {
        let path = temp_file(
            "db.txt",
            "# Windows\n\
             03000000022000000090000000000000,8Bitdo NES30 Pro,a:b1,b:b0,platform:Windows,\n\
             \n\
             030000004c050000c405000000000000,PS4 Controller,a:b1,b:b2,platform:Windows,\n",
        );

        let table = MappingTable::load(Some(&path), None);
        assert_eq!(table.entries().len(), 2);
        assert!(table.entries()[0].starts_with("03000000022000000090000000000000"));
        assert_eq!(table.as_database().lines().count(), 2);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_database_is_tolerated() {
        let table = MappingTable::load(Some(Path::new("/nonexistent/gamecontrollerdb.txt")), None);
        assert!(table.entries().is_empty());
        assert!(table.generic().is_some());
    }

    #[test]
    fn default_load_uses_bundled_database() {
        let table = MappingTable::load(None, None);
        assert!(!table.entries().is_empty());
        assert!(table
            .entries()
            .iter()
            .all(|line| !line.starts_with('#') && line.contains("platform:")));
        assert!(table.generic().is_some());
    }

    #[test]
    fn unreadable_generic_override_disables_synthesis() {
        let table = MappingTable::load(None, Some(Path::new("/nonexistent/generic.txt")));
        assert!(table.generic().is_none());
        assert!(table.synthesize("abc", "Pad").is_none());
    }

    #[test]
    fn generic_override_is_trimmed() {
        let path = temp_file("generic.txt", "  a:b0,b:b1,\n\n");
        let table = MappingTable::load(None, Some(&path));
        assert_eq!(table.generic(), Some("a:b0,b:b1,"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn synthesized_mapping_concatenates_guid_name_and_template() {
        let table = MappingTable::from_parts(Vec::new(), Some("a:b0,b:b1,".to_string()));
        let mapping = table
            .synthesize("0300000079000000110000000000", "Generic, USB Joystick")
            .expect("template present");
        assert_eq!(
            mapping,
            "0300000079000000110000000000,Generic  USB Joystick,a:b0,b:b1,"
        );
    }

    #[test]
    fn bundled_template_is_present() {
        assert!(normalize_template(BUNDLED_GENERIC).is_some());
    }
}
