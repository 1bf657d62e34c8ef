use thiserror::Error;

use crate::ProviderType;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    #[error("No API key for {provider}: set one of {}", vars.join(", "))]
    Missing {
        provider: ProviderType,
        vars: Vec<String>,
    },

    #[error("API key is empty")]
    Empty,
}

/// Provider credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Result<Self, CredentialError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(CredentialError::Empty);
        }
        Ok(Self(key))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(***)")
    }
}

/// Resolve the provider credential from the environment.
///
/// `env_var` names an explicit variable to try before the provider defaults.
pub fn resolve_api_key(
    provider: ProviderType,
    env_var: Option<&str>,
) -> Result<ApiKey, CredentialError> {
    resolve_with(provider, env_var, |name| std::env::var(name).ok())
}

fn resolve_with<F>(
    provider: ProviderType,
    env_var: Option<&str>,
    lookup: F,
) -> Result<ApiKey, CredentialError>
where
    F: Fn(&str) -> Option<String>,
{
    let vars: Vec<&str> = env_var
        .into_iter()
        .chain(provider.api_key_vars().iter().copied())
        .collect();

    vars.iter()
        .filter_map(|name| lookup(name))
        .find_map(|value| ApiKey::new(value).ok())
        .ok_or_else(|| CredentialError::Missing {
            provider,
            vars: vars.iter().map(|v| v.to_string()).collect(),
        })
}
