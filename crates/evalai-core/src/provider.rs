//! Provider resolution.
//!
//! Maps a provider identifier to a completion transport handle. Handles are
//! constructed lazily on first use and cached for the life of the resolver;
//! the runner owns one resolver per run and passes handles down to scorers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use llm_transport::{CompletionTransport, EndpointConfig, OpenAiCompatibleClient};
use tracing::debug;

use crate::domain::{EvalError, Result};

/// Supported completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    OpenAi,
    AzureOpenAi,
    Ollama,
    GitHubModels,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::AzureOpenAi,
        Provider::Ollama,
        Provider::GitHubModels,
    ];

    /// Identifier used in configuration files and stored records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai_api",
            Provider::AzureOpenAi => "azure_openai",
            Provider::Ollama => "ollama",
            Provider::GitHubModels => "gh_models",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| EvalError::UnsupportedProvider(s.to_string()))
    }
}

type TransportFactory =
    Box<dyn Fn(Provider) -> Result<Arc<dyn CompletionTransport>> + Send + Sync>;

/// Resolves provider identifiers to transport handles.
pub struct ProviderResolver {
    factory: TransportFactory,
    cache: Mutex<HashMap<Provider, Arc<dyn CompletionTransport>>>,
}

impl ProviderResolver {
    /// Resolver that builds HTTP clients from environment variables.
    pub fn from_env() -> Self {
        Self::with_factory(|provider| {
            let config = match provider {
                Provider::OpenAi => EndpointConfig::openai_from_env()?,
                Provider::AzureOpenAi => EndpointConfig::azure_from_env()?,
                Provider::Ollama => EndpointConfig::ollama_from_env(),
                Provider::GitHubModels => EndpointConfig::github_models_from_env()?,
            };
            let client = OpenAiCompatibleClient::new(config)?;
            Ok(Arc::new(client) as Arc<dyn CompletionTransport>)
        })
    }

    /// Resolver with a custom construction function.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(Provider) -> Result<Arc<dyn CompletionTransport>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver that only knows explicitly registered handles. Resolving
    /// any other provider fails with `UnsupportedProvider`.
    pub fn empty() -> Self {
        Self::with_factory(|provider| Err(EvalError::UnsupportedProvider(provider.to_string())))
    }

    /// Pre-register a handle for `provider`, replacing any cached one.
    pub fn register(self, provider: Provider, transport: Arc<dyn CompletionTransport>) -> Self {
        self.lock_cache().insert(provider, transport);
        self
    }

    /// Handle for the provider named `id`.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn CompletionTransport>> {
        let provider: Provider = id.parse()?;
        self.resolve_provider(provider)
    }

    pub fn resolve_provider(&self, provider: Provider) -> Result<Arc<dyn CompletionTransport>> {
        if let Some(handle) = self.lock_cache().get(&provider) {
            return Ok(Arc::clone(handle));
        }

        debug!(provider = %provider, "constructing transport handle");
        let handle = (self.factory)(provider)?;
        self.lock_cache().insert(provider, Arc::clone(&handle));
        Ok(handle)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<Provider, Arc<dyn CompletionTransport>>> {
        // A poisoned cache only ever holds fully constructed handles.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_transport::fakes::ScriptedTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_known_providers() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
        }
    }

    #[test]
    fn test_unknown_provider_is_unsupported() {
        let err = "bedrock".parse::<Provider>().unwrap_err();
        assert!(matches!(err, EvalError::UnsupportedProvider(ref p) if p == "bedrock"));
    }

    #[test]
    fn test_registered_handle_is_returned() {
        let transport: Arc<dyn CompletionTransport> = Arc::new(ScriptedTransport::always("hi"));
        let resolver = ProviderResolver::empty().register(Provider::Ollama, Arc::clone(&transport));
        let resolved = resolver.resolve("ollama").unwrap();
        assert!(Arc::ptr_eq(&resolved, &transport));
        assert!(resolver.resolve("openai_api").is_err());
    }

    #[test]
    fn test_factory_called_once_per_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let resolver = ProviderResolver::with_factory(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedTransport::always("x")) as Arc<dyn CompletionTransport>)
        });

        resolver.resolve("ollama").unwrap();
        resolver.resolve("ollama").unwrap();
        resolver.resolve("gh_models").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_identifier_never_reaches_factory() {
        let resolver = ProviderResolver::with_factory(|_| panic!("factory must not run"));
        assert!(matches!(
            resolver.resolve("anthropic"),
            Err(EvalError::UnsupportedProvider(_))
        ));
    }
}
