//! Configuration for highlight painting

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Marker and cache settings shared by both painters and the renderer
#[derive(Debug, Clone, Deserialize)]
pub struct HighlightConfig {
    /// CSS class applied to every marker
    pub class_prefix: String,
    /// Element name used for markers
    pub marker_element: String,
    /// Data attribute carrying the primary annotation id
    pub id_attribute: String,
    /// Data attribute carrying all contributing annotation ids
    pub ids_attribute: String,
    /// Alpha applied uniformly to every highlight color (0.0-1.0)
    pub alpha: f32,
    /// Number of painted chapters kept by the renderer (0 disables caching)
    pub cache_capacity: usize,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            class_prefix: "ll-highlight".to_string(),
            marker_element: "span".to_string(),
            id_attribute: "data-annotation-id".to_string(),
            ids_attribute: "data-annotation-ids".to_string(),
            alpha: 0.3,
            cache_capacity: 64,
        }
    }
}

impl HighlightConfig {
    /// Read a `.env` file if present, then load from the environment
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Build the config from `HIGHLIGHT_*` environment variables.
    /// Missing or malformed values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            class_prefix: env::var("HIGHLIGHT_CLASS_PREFIX").unwrap_or(defaults.class_prefix),
            marker_element: name_var("HIGHLIGHT_MARKER_ELEMENT", defaults.marker_element),
            id_attribute: name_var("HIGHLIGHT_ID_ATTRIBUTE", defaults.id_attribute),
            ids_attribute: name_var("HIGHLIGHT_IDS_ATTRIBUTE", defaults.ids_attribute),
            alpha: parse_var("HIGHLIGHT_ALPHA", defaults.alpha)
                .clamp(0.0, 1.0),
            cache_capacity: parse_var("HIGHLIGHT_CACHE_CAPACITY", defaults.cache_capacity),
        }
    }

    /// Class attribute value for a marker
    pub fn marker_class(&self, overlapping: bool) -> String {
        if overlapping {
            format!("{} {}-overlap", self.class_prefix, self.class_prefix)
        } else {
            self.class_prefix.clone()
        }
    }
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: {:?}, using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Element and attribute names are written into markup verbatim
fn name_var(name: &str, default: String) -> String {
    match env::var(name) {
        Ok(raw) if is_xml_name(raw.trim()) => raw.trim().to_string(),
        Ok(raw) => {
            tracing::warn!("Invalid name for {}: {:?}, using {}", name, raw, default);
            default
        }
        Err(_) => default,
    }
}

fn is_xml_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}
