use std::collections::{
    HashMap,
    HashSet,
};

/// Why a request was refused at the authorization step. Logged, never
/// returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    MissingKey,
    UnknownKey,
    OutOfScope,
}

impl Denial {
    pub fn as_str(self) -> &'static str {
        match self {
            Denial::MissingKey => "missing_key",
            Denial::UnknownKey => "unknown_key",
            Denial::OutOfScope => "out_of_scope",
        }
    }
}

/// Maps each API key to the integrations it may submit for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeyGrants {
    grants: HashMap<String, HashSet<String>>,
}

impl ApiKeyGrants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant<I, S>(&mut self, key: impl Into<String>, integrations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grants
            .entry(key.into())
            .or_default()
            .extend(integrations.into_iter().map(Into::into));
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Every integration name referenced by some grant.
    pub fn referenced_integrations(&self) -> impl Iterator<Item = &str> {
        self.grants
            .values()
            .flat_map(|scope| scope.iter().map(String::as_str))
    }

    /// Decide whether `key` may be used for `integration`.
    ///
    /// A key that is present is always checked, even when the integration
    /// does not require one. An empty key counts as absent.
    pub fn authorize(
        &self,
        key: Option<&str>,
        integration: &str,
        key_required: bool,
    ) -> Result<(), Denial> {
        match key.filter(|k| !k.is_empty()) {
            None if key_required => Err(Denial::MissingKey),
            None => Ok(()),
            Some(key) => {
                match self.grants.get(key) {
                    None => Err(Denial::UnknownKey),
                    Some(scope) if scope.contains(integration) => Ok(()),
                    Some(_) => Err(Denial::OutOfScope),
                }
            }
        }
    }
}
