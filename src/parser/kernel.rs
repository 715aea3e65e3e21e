//! Class extraction from the kernel container dump and from PHP sources.

use crate::types::{Result, ScanError};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Finds application classes, restricted to one root namespace.
///
/// The container dump is read leniently: ill-formed elements and attributes
/// are skipped, and a syntax error only ends the read with what was found.
#[derive(Clone)]
pub struct KernelParser {
    namespace: String,
    reference: Regex,
}

impl KernelParser {
    pub fn new(namespace: &str) -> Result<Self> {
        let reference = Regex::new(&format!(r"{}\\[0-9A-Za-z_\\]+", regex::escape(namespace)))
            .map_err(|e| ScanError::ParseError(format!("namespace {}: {}", namespace, e)))?;

        Ok(Self {
            namespace: namespace.to_string(),
            reference,
        })
    }

    /// Classes declared in the XML container: `class` of every service,
    /// `id` and `key` of every argument (anything after `:` dropped).
    pub fn container_classes(&self, xml: &str) -> BTreeSet<String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().check_end_names = false;
        let mut classes = BTreeSet::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    let wanted: &[&str] = match e.local_name().as_ref() {
                        b"service" => &["class"],
                        b"argument" => &["id", "key"],
                        _ => continue,
                    };
                    // Broken attributes are dropped, the rest of the element is kept.
                    for attr in e.attributes().flatten() {
                        let key = attr.key.local_name();
                        if !wanted.iter().any(|w| w.as_bytes() == key.as_ref()) {
                            continue;
                        }
                        let Ok(value) = attr.unescape_value() else {
                            continue;
                        };
                        let class = value.split(':').next().unwrap_or_default();
                        if self.in_namespace(class) {
                            classes.insert(class.to_string());
                        } else {
                            trace!("Ignoring {}", class);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(quick_xml::Error::IllFormed(e)) => {
                    debug!("Skipping ill-formed container markup: {}", e);
                }
                Err(e) => {
                    debug!(
                        "Container unreadable after byte {}: {}",
                        reader.buffer_position(),
                        e
                    );
                    break;
                }
            }
        }

        classes
    }

    /// Fully qualified class names mentioned in a source file.
    pub fn references(&self, content: &str) -> BTreeSet<String> {
        self.reference
            .find_iter(content)
            .map(|m| m.as_str().trim_end_matches('\\').to_string())
            .filter(|class| self.in_namespace(class))
            .collect()
    }

    fn in_namespace(&self, class: &str) -> bool {
        class
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('\\'))
            .is_some_and(|rest| !rest.is_empty())
    }
}

/// Source file holding a class, the root namespace mapped to `root`.
pub fn class_to_path(class: &str, root: &str) -> String {
    let mut path = root.trim_end_matches('/').to_string();
    for part in class.split('\\').skip(1).filter(|p| !p.is_empty()) {
        path.push('/');
        path.push_str(part);
    }
    path.push_str(".php");
    path
}
