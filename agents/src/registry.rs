//! Agent registry with explicit startup registration.
//!
//! Descriptors are registered once at startup via [`default_descriptors`]
//! (plus any caller-supplied extras) and resolved by name at request time.
//! Resolved agent instances are cached keyed on name and effective
//! generation settings, so repeated requests with the same overrides reuse
//! the same instance.

use std::{
    collections::{BTreeMap, HashMap},
    hash::{Hash, Hasher},
    sync::{Arc, RwLock},
};

use common::{
    error::AppError,
    utils::generation::{GenerationClient, GenerationParams},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    kinds::{
        chat::ChatAgent, evaluation::EvaluationAgent, flashcard::FlashcardAgent,
        flowchart::FlowchartAgent, podcast::PodcastAgent, quiz::QuizAgent, summary::SummaryAgent,
    },
    Agent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Quiz,
    Flashcard,
    Flowchart,
    Evaluation,
    Summary,
    Podcast,
    Chat,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Quiz => "quiz",
            Self::Flashcard => "flashcard",
            Self::Flowchart => "flowchart",
            Self::Evaluation => "evaluation",
            Self::Summary => "summary",
            Self::Podcast => "podcast",
            Self::Chat => "chat",
        };
        write!(f, "{name}")
    }
}

/// Baseline generation settings an agent kind ships with. Per-request
/// [`AgentConfig`] overrides take precedence field by field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationDefaults {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Startup-time description of one agent: its lookup name, persona, and
/// default generation settings.
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    pub name: String,
    pub description: String,
    pub persona: String,
    pub kind: AgentKind,
    pub defaults: GenerationDefaults,
}

/// Per-request overrides for an agent's generation settings. Unset fields
/// fall back to the descriptor defaults and the registry's default model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl AgentConfig {
    fn resolve(&self, defaults: GenerationDefaults, default_model: &str) -> GenerationParams {
        GenerationParams::new(
            self.model.as_deref().unwrap_or(default_model),
            self.temperature.unwrap_or(defaults.temperature),
            self.max_tokens.unwrap_or(defaults.max_tokens),
        )
    }

    fn fingerprint(&self, defaults: GenerationDefaults, default_model: &str) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.model
            .as_deref()
            .unwrap_or(default_model)
            .hash(&mut hasher);
        self.temperature
            .unwrap_or(defaults.temperature)
            .to_bits()
            .hash(&mut hasher);
        self.max_tokens.unwrap_or(defaults.max_tokens).hash(&mut hasher);
        hasher.finish()
    }
}

/// All agent kinds this crate ships, in their default configuration.
pub fn default_descriptors() -> Vec<AgentDescriptor> {
    vec![
        crate::kinds::quiz::descriptor(),
        crate::kinds::flashcard::descriptor(),
        crate::kinds::flowchart::descriptor(),
        crate::kinds::evaluation::descriptor(),
        crate::kinds::summary::descriptor(),
        crate::kinds::podcast::descriptor(),
        crate::kinds::chat::descriptor(),
    ]
}

pub struct AgentRegistry {
    client: Arc<dyn GenerationClient>,
    default_model: String,
    descriptors: RwLock<HashMap<String, Arc<AgentDescriptor>>>,
    instances: RwLock<HashMap<(String, u64), Arc<dyn Agent>>>,
}

impl AgentRegistry {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        default_model: impl Into<String>,
        descriptors: Vec<AgentDescriptor>,
    ) -> Result<Self, AppError> {
        let registry = Self {
            client,
            default_model: default_model.into(),
            descriptors: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
        };
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Registers or replaces a descriptor. Replacing evicts any cached
    /// instances built from the previous registration.
    pub fn register(&self, descriptor: AgentDescriptor) -> Result<(), AppError> {
        let name = descriptor.name.trim().to_lowercase();
        if name.is_empty() {
            return Err(AppError::Validation(
                "agent descriptor must have a non-empty name".to_owned(),
            ));
        }
        info!(agent = %name, kind = %descriptor.kind, "registering agent");
        let replaced = {
            let mut descriptors = self
                .descriptors
                .write()
                .map_err(|_| poisoned("descriptor registry"))?;
            descriptors.insert(name.clone(), Arc::new(descriptor)).is_some()
        };
        if replaced {
            self.evict_instances(&name)?;
        }
        Ok(())
    }

    /// Removes a descriptor and its cached instances. Unknown names are a
    /// no-op.
    pub fn unregister(&self, name: &str) -> Result<(), AppError> {
        let name = name.trim().to_lowercase();
        let removed = {
            let mut descriptors = self
                .descriptors
                .write()
                .map_err(|_| poisoned("descriptor registry"))?;
            descriptors.remove(&name).is_some()
        };
        if removed {
            self.evict_instances(&name)?;
        }
        Ok(())
    }

    /// Resolves an agent by name, building and caching the instance for the
    /// effective configuration if it is not cached yet.
    pub fn get(&self, name: &str, config: &AgentConfig) -> Result<Arc<dyn Agent>, AppError> {
        let name = name.trim().to_lowercase();
        let descriptor = {
            let descriptors = self
                .descriptors
                .read()
                .map_err(|_| poisoned("descriptor registry"))?;
            descriptors.get(&name).cloned()
        };
        let Some(descriptor) = descriptor else {
            let known = self.list()?.into_keys().collect::<Vec<_>>().join(", ");
            return Err(AppError::NotFound(format!(
                "no agent named '{name}'. Registered agents: {known}"
            )));
        };

        let key = (
            name.clone(),
            config.fingerprint(descriptor.defaults, &self.default_model),
        );
        {
            let instances = self
                .instances
                .read()
                .map_err(|_| poisoned("instance cache"))?;
            if let Some(agent) = instances.get(&key) {
                return Ok(Arc::clone(agent));
            }
        }

        let params = config.resolve(descriptor.defaults, &self.default_model);
        debug!(agent = %name, model = %params.model, "building agent instance");
        let agent = self.build(&descriptor, params);

        let mut instances = self
            .instances
            .write()
            .map_err(|_| poisoned("instance cache"))?;
        // Another caller may have built the same instance between the read
        // and write locks; keep whichever landed first.
        Ok(Arc::clone(instances.entry(key).or_insert(agent)))
    }

    /// Registered descriptors by name, sorted for stable display.
    pub fn list(&self) -> Result<BTreeMap<String, Arc<AgentDescriptor>>, AppError> {
        let descriptors = self
            .descriptors
            .read()
            .map_err(|_| poisoned("descriptor registry"))?;
        Ok(descriptors
            .iter()
            .map(|(name, descriptor)| (name.clone(), Arc::clone(descriptor)))
            .collect())
    }

    fn build(&self, descriptor: &AgentDescriptor, params: GenerationParams) -> Arc<dyn Agent> {
        let client = Arc::clone(&self.client);
        let persona = descriptor.persona.clone();
        match descriptor.kind {
            AgentKind::Quiz => Arc::new(QuizAgent::new(client, persona, params)),
            AgentKind::Flashcard => Arc::new(FlashcardAgent::new(client, persona, params)),
            AgentKind::Flowchart => Arc::new(FlowchartAgent::new(client, persona, params)),
            AgentKind::Evaluation => Arc::new(EvaluationAgent::new(client, persona, params)),
            AgentKind::Summary => Arc::new(SummaryAgent::new(client, persona, params)),
            AgentKind::Podcast => Arc::new(PodcastAgent::new(client, persona, params)),
            AgentKind::Chat => Arc::new(ChatAgent::new(client, persona, params)),
        }
    }

    fn evict_instances(&self, name: &str) -> Result<(), AppError> {
        let mut instances = self
            .instances
            .write()
            .map_err(|_| poisoned("instance cache"))?;
        instances.retain(|(cached_name, _), _| cached_name != name);
        Ok(())
    }
}

fn poisoned(what: &str) -> AppError {
    AppError::Configuration(format!("{what} lock poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::test_support::RecordingClient;

    fn registry() -> AgentRegistry {
        let client = Arc::new(RecordingClient::with_response("{}"));
        AgentRegistry::new(client, "test-model", default_descriptors()).unwrap()
    }

    #[test]
    fn default_descriptors_cover_all_kinds() {
        let registry = registry();
        let listed = registry.list().unwrap();
        assert_eq!(listed.len(), 7);
        for name in [
            "quiz",
            "flashcard",
            "flowchart",
            "evaluation",
            "summary",
            "podcast",
            "chat",
        ] {
            assert!(listed.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn lookup_is_case_insensitive_and_cached() {
        let registry = registry();
        let config = AgentConfig::default();
        let first = registry.get("Quiz", &config).unwrap();
        let second = registry.get("quiz", &config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn distinct_configs_get_distinct_instances() {
        let registry = registry();
        let default_instance = registry.get("quiz", &AgentConfig::default()).unwrap();
        let hot = AgentConfig {
            temperature: Some(1.2),
            ..AgentConfig::default()
        };
        let hot_instance = registry.get("quiz", &hot).unwrap();
        assert!(!Arc::ptr_eq(&default_instance, &hot_instance));
    }

    #[test]
    fn explicit_overrides_matching_defaults_share_the_cache_entry() {
        let registry = registry();
        let quiz_defaults = crate::kinds::quiz::descriptor().defaults;
        let explicit = AgentConfig {
            model: Some("test-model".to_owned()),
            temperature: Some(quiz_defaults.temperature),
            max_tokens: Some(quiz_defaults.max_tokens),
        };
        let implicit = registry.get("quiz", &AgentConfig::default()).unwrap();
        let explicit = registry.get("quiz", &explicit).unwrap();
        assert!(Arc::ptr_eq(&implicit, &explicit));
    }

    #[test]
    fn unknown_agent_lists_registered_names() {
        let registry = registry();
        let err = registry
            .get("essay", &AgentConfig::default())
            .err()
            .expect("expected NotFound");
        let AppError::NotFound(message) = err else {
            panic!("expected NotFound");
        };
        assert!(message.contains("essay"));
        assert!(message.contains("quiz"));
    }

    #[test]
    fn registering_blank_name_fails() {
        let registry = registry();
        let mut descriptor = crate::kinds::quiz::descriptor();
        descriptor.name = "   ".to_owned();
        assert!(registry.register(descriptor).is_err());
    }

    #[test]
    fn reregistering_evicts_cached_instances() {
        let registry = registry();
        let before = registry.get("quiz", &AgentConfig::default()).unwrap();
        registry.register(crate::kinds::quiz::descriptor()).unwrap();
        let after = registry.get("quiz", &AgentConfig::default()).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn unregister_removes_agent() {
        let registry = registry();
        registry.unregister("podcast").unwrap();
        assert!(matches!(
            registry.get("podcast", &AgentConfig::default()),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(registry.list().unwrap().len(), 6);
    }
}
