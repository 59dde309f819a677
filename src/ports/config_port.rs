//! Configuration access port trait.

/// Sectioned key/value configuration. Typed parsing and range checks live in
/// `domain::config_validation` so malformed values surface as errors.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn has_section(&self, section: &str) -> bool;
}
