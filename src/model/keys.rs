// Package model provides the hierarchical registry key layout.

/// Default root under which every service registers its instances.
pub const DEFAULT_ROOT: &str = "/services";

/// Registry key space of one logical service: `{root}/{service}/{instance_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    root: String,
    service: String,
}

impl Keyspace {
    pub fn new(root: impl AsRef<str>, service: impl Into<String>) -> Self {
        let root = root.as_ref().trim_end_matches('/');
        let root = if root.is_empty() {
            String::new()
        } else if root.starts_with('/') {
            root.to_string()
        } else {
            format!("/{}", root)
        };

        Self {
            root,
            service: service.into(),
        }
    }

    /// Logical service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Prefix enumerating all instances of the service. Always ends with '/'
    /// so that `svc` never matches the instances of `svc-2`.
    pub fn prefix(&self) -> String {
        format!("{}/{}/", self.root, self.service)
    }

    /// Key of a single instance.
    pub fn key(&self, instance_id: &str) -> String {
        format!("{}{}", self.prefix(), instance_id)
    }
}
