//! System prompt library per organization and prompt type.
//!
//! Lists live in client storage under `systemPrompts:<orgId>:<type>` and are
//! not mirrored to the relational store; client storage is authoritative.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::storage::{ClientStorage, StorageKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    Calling,
    Messaging,
}

impl PromptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptType::Calling => "calling",
            PromptType::Messaging => "messaging",
        }
    }

    fn default_name(&self) -> &'static str {
        match self {
            PromptType::Calling => "Default Calling Prompt",
            PromptType::Messaging => "Default Messaging Prompt",
        }
    }

    fn default_prompt(&self) -> &'static str {
        match self {
            PromptType::Calling => "You are a professional AI voice assistant for VOCA. Your goal is to have natural, helpful conversations with callers. Be polite, concise, and stay on topic. Always confirm important details before ending the call.",
            PromptType::Messaging => "You are a professional AI messaging assistant for VOCA. Your goal is to provide helpful, clear, and concise responses via text messages. Be polite, friendly, and efficient in your communications.",
        }
    }

    pub fn default_welcome(&self) -> &'static str {
        match self {
            PromptType::Calling => "Hello! Thank you for calling. How can I help you today?",
            PromptType::Messaging => "Hello! Thank you for contacting us. How can I help you today?",
        }
    }
}

impl FromStr for PromptType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calling" => Ok(PromptType::Calling),
            "messaging" => Ok(PromptType::Messaging),
            other => Err(ServiceError::Validation(format!("unknown prompt type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub id: Uuid,
    pub name: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub prompt_type: PromptType,
    pub welcome_message: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SystemPrompt {
    fn seed(prompt_type: PromptType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: prompt_type.default_name().into(),
            prompt: prompt_type.default_prompt().into(),
            prompt_type,
            welcome_message: prompt_type.default_welcome().into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Editable prompt fields. A blank welcome message falls back to the type's default.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptDraft {
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub welcome_message: Option<String>,
}

impl PromptDraft {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() || self.prompt.trim().is_empty() {
            return Err(ServiceError::Validation("Please provide a name and system prompt".into()));
        }
        Ok(())
    }

    fn welcome(&self, prompt_type: PromptType) -> String {
        self.welcome_message
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .unwrap_or(prompt_type.default_welcome())
            .to_string()
    }
}

#[derive(Clone)]
pub struct PromptLibrary {
    storage: Arc<dyn ClientStorage>,
}

impl PromptLibrary {
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self { storage }
    }

    fn key(organization_id: Uuid, prompt_type: PromptType) -> String {
        StorageKey::SystemPrompts { organization_id, prompt_type: prompt_type.as_str() }.to_string()
    }

    async fn load(&self, organization_id: Uuid, prompt_type: PromptType) -> Result<Option<Vec<SystemPrompt>>, ServiceError> {
        match self.storage.get(&Self::key(organization_id, prompt_type)).await {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| ServiceError::Storage(format!("corrupt prompt list: {e}"))),
            None => Ok(None),
        }
    }

    async fn save(&self, organization_id: Uuid, prompt_type: PromptType, prompts: &[SystemPrompt]) -> Result<(), ServiceError> {
        let raw = serde_json::to_string(prompts).map_err(|e| ServiceError::Storage(e.to_string()))?;
        self.storage.set(&Self::key(organization_id, prompt_type), raw).await
    }

    /// Stored prompts, seeding and persisting the type's default on first access.
    pub async fn list(&self, organization_id: Uuid, prompt_type: PromptType) -> Result<Vec<SystemPrompt>, ServiceError> {
        if let Some(prompts) = self.load(organization_id, prompt_type).await? {
            return Ok(prompts);
        }
        let seeded = vec![SystemPrompt::seed(prompt_type)];
        self.save(organization_id, prompt_type, &seeded).await?;
        debug!(%organization_id, prompt_type = prompt_type.as_str(), "seeded default prompt");
        Ok(seeded)
    }

    /// The active prompt, or the first one when none is flagged.
    pub async fn active(&self, organization_id: Uuid, prompt_type: PromptType) -> Result<Option<SystemPrompt>, ServiceError> {
        let prompts = self.list(organization_id, prompt_type).await?;
        Ok(prompts.iter().find(|p| p.is_active).or_else(|| prompts.first()).cloned())
    }

    pub async fn create(&self, organization_id: Uuid, prompt_type: PromptType, draft: PromptDraft) -> Result<SystemPrompt, ServiceError> {
        draft.validate()?;
        let mut prompts = self.list(organization_id, prompt_type).await?;
        let now = Utc::now();
        let prompt = SystemPrompt {
            id: Uuid::new_v4(),
            name: draft.name.trim().to_string(),
            prompt: draft.prompt.trim().to_string(),
            prompt_type,
            welcome_message: draft.welcome(prompt_type),
            is_active: prompts.is_empty(),
            created_at: now,
            updated_at: now,
        };
        prompts.push(prompt.clone());
        self.save(organization_id, prompt_type, &prompts).await?;
        info!(%organization_id, prompt_id = %prompt.id, "system prompt created");
        Ok(prompt)
    }

    pub async fn update(&self, organization_id: Uuid, prompt_type: PromptType, id: Uuid, draft: PromptDraft) -> Result<SystemPrompt, ServiceError> {
        draft.validate()?;
        let mut prompts = self.list(organization_id, prompt_type).await?;
        let prompt = prompts.iter_mut().find(|p| p.id == id).ok_or_else(|| ServiceError::not_found("prompt"))?;
        prompt.name = draft.name.trim().to_string();
        prompt.prompt = draft.prompt.trim().to_string();
        prompt.welcome_message = draft.welcome(prompt_type);
        prompt.updated_at = Utc::now();
        let updated = prompt.clone();
        self.save(organization_id, prompt_type, &prompts).await?;
        Ok(updated)
    }

    /// Remove a prompt. The last prompt cannot be removed; removing the active
    /// one promotes the first remaining prompt.
    pub async fn delete(&self, organization_id: Uuid, prompt_type: PromptType, id: Uuid) -> Result<Vec<SystemPrompt>, ServiceError> {
        let mut prompts = self.list(organization_id, prompt_type).await?;
        let idx = prompts.iter().position(|p| p.id == id).ok_or_else(|| ServiceError::not_found("prompt"))?;
        if prompts.len() == 1 {
            return Err(ServiceError::Validation("Cannot delete the last prompt".into()));
        }
        let removed = prompts.remove(idx);
        if removed.is_active {
            if let Some(first) = prompts.first_mut() {
                first.is_active = true;
            }
        }
        self.save(organization_id, prompt_type, &prompts).await?;
        info!(%organization_id, prompt_id = %id, "system prompt deleted");
        Ok(prompts)
    }

    /// Make `id` the only active prompt of its list.
    pub async fn set_active(&self, organization_id: Uuid, prompt_type: PromptType, id: Uuid) -> Result<Vec<SystemPrompt>, ServiceError> {
        let mut prompts = self.list(organization_id, prompt_type).await?;
        if !prompts.iter().any(|p| p.id == id) {
            return Err(ServiceError::not_found("prompt"));
        }
        for p in prompts.iter_mut() {
            p.is_active = p.id == id;
        }
        self.save(organization_id, prompt_type, &prompts).await?;
        Ok(prompts)
    }
}
