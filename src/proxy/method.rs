//! Identities of remote contracts and their operations.

use std::fmt;

/// Identity of a remote contract: interface type, logical name and base URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    type_name: String,
    name: String,
    url: String,
}

impl Target {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            url: url.into(),
        }
    }

    /// A target whose URL is the logical service address `http://<name>`.
    pub fn for_service(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let url = format!("http://{}", name);
        Self::new(type_name, name, url)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target(type={}, name={}, url={})", self.type_name, self.name, self.url)
    }
}

/// One operation of a remote interface, used as a dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub interface: &'static str,
    pub name: &'static str,
    pub params: &'static [&'static str],
}

impl MethodSignature {
    pub const fn new(interface: &'static str, name: &'static str, params: &'static [&'static str]) -> Self {
        Self {
            interface,
            name,
            params,
        }
    }

    /// `Interface#method(Param1,Param2)`.
    pub fn config_key(&self) -> String {
        config_key(self.interface, self)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.config_key())
    }
}

/// Configuration key of `method` as seen through the type `type_name`.
pub fn config_key(type_name: &str, method: &MethodSignature) -> String {
    format!("{}#{}({})", type_name, method.name, method.params.join(","))
}
