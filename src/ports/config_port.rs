//! Configuration access port.

/// Read access to sectioned key/value configuration. Values are returned
/// raw; typed parsing and range checks live in `config_validation`.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Keys present in `section`, lowercased. Empty if the section is absent.
    fn keys(&self, section: &str) -> Vec<String>;
}
