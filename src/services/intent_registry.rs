//! Declarative catalog of the intents the dialogue engine understands.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{IntentKind, IntentMetadata, SlotDefinition, SlotType};

/// Question asked for a slot with no entry in `slot_questions`.
pub const DEFAULT_SLOT_QUESTION: &str = "Please provide your {slot}.";

fn default_fallback_question() -> String {
    DEFAULT_SLOT_QUESTION.to_string()
}

/// Serialized form of an intent catalog, as read from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentCatalog {
    pub intents: Vec<IntentMetadata>,
    #[serde(default)]
    pub slot_questions: HashMap<String, String>,
    /// Template used when a slot has no question; `{slot}` is replaced
    #[serde(default = "default_fallback_question")]
    pub fallback_question: String,
}

impl IntentCatalog {
    /// Catalog shipped with the crate: account opening, share purchase,
    /// weather lookup and slot correction.
    pub fn builtin() -> Self {
        let intents = vec![
            IntentMetadata::new(
                "open_account",
                "Open a new securities trading account for the user",
                IntentKind::Business,
            )
            .with_slot(SlotDefinition::new(
                "education",
                "Highest level of education completed",
                SlotType::String,
            ))
            .with_slot(SlotDefinition::new(
                "occupation",
                "Current occupation",
                SlotType::String,
            ))
            .with_slot(SlotDefinition::new(
                "address",
                "Residential address",
                SlotType::String,
            )),
            IntentMetadata::new(
                "stock_purchase",
                "Buy shares of a listed stock",
                IntentKind::Business,
            )
            .with_slot(SlotDefinition::new(
                "ticker",
                "Stock ticker symbol, e.g. AAPL",
                SlotType::String,
            ))
            .with_slot(SlotDefinition::new(
                "quantity",
                "Number of shares to buy",
                SlotType::Integer,
            )),
            IntentMetadata::new(
                "check_weather",
                "Look up the current weather for a city",
                IntentKind::Digression,
            )
            .with_slot(
                SlotDefinition::new("city", "City name; defaults to Hangzhou", SlotType::String)
                    .optional(),
            ),
            IntentMetadata::new(
                "modify_slot",
                "Correct one previously provided value before confirming",
                IntentKind::Control,
            )
            .with_slot(SlotDefinition::new(
                "slot_name",
                "Name of the field to change",
                SlotType::String,
            ))
            .with_slot(SlotDefinition::new(
                "slot_value",
                "New value for the field",
                SlotType::String,
            )),
        ];

        let slot_questions = [
            ("education", "What is your highest level of education?"),
            ("occupation", "What is your current occupation?"),
            ("address", "What is your residential address?"),
            ("ticker", "Which stock would you like to buy? Please give the ticker symbol."),
            ("quantity", "How many shares would you like to buy?"),
        ]
        .into_iter()
        .map(|(slot, question)| (slot.to_string(), question.to_string()))
        .collect();

        Self {
            intents,
            slot_questions,
            fallback_question: default_fallback_question(),
        }
    }
}

/// Validated, immutable intent catalog.
#[derive(Debug, Clone)]
pub struct IntentRegistry {
    intents: Vec<IntentMetadata>,
    index: HashMap<String, usize>,
    slot_questions: HashMap<String, String>,
    fallback_question: String,
}

impl IntentRegistry {
    /// Build a registry from a catalog, validating it
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` for empty or duplicate intent
    /// names, or duplicate slot names within one intent
    pub fn from_catalog(catalog: IntentCatalog) -> DomainResult<Self> {
        let mut index = HashMap::with_capacity(catalog.intents.len());

        for (position, intent) in catalog.intents.iter().enumerate() {
            if intent.name.trim().is_empty() {
                return Err(DomainError::ValidationFailed(format!(
                    "Intent at position {position} has an empty name"
                )));
            }
            if index.insert(intent.name.clone(), position).is_some() {
                return Err(DomainError::ValidationFailed(format!(
                    "Duplicate intent name: {}",
                    intent.name
                )));
            }

            let mut seen = HashSet::new();
            for slot in &intent.slots {
                if slot.name.trim().is_empty() {
                    return Err(DomainError::ValidationFailed(format!(
                        "Intent '{}' declares a slot with an empty name",
                        intent.name
                    )));
                }
                if !seen.insert(slot.name.as_str()) {
                    return Err(DomainError::ValidationFailed(format!(
                        "Intent '{}' declares slot '{}' more than once",
                        intent.name, slot.name
                    )));
                }
            }
        }

        debug!(intents = catalog.intents.len(), "Intent registry validated");

        Ok(Self {
            intents: catalog.intents,
            index,
            slot_questions: catalog.slot_questions,
            fallback_question: catalog.fallback_question,
        })
    }

    /// Registry over the built-in catalog
    ///
    /// # Errors
    /// Only fails if the built-in catalog itself is inconsistent
    pub fn builtin() -> DomainResult<Self> {
        Self::from_catalog(IntentCatalog::builtin())
    }

    /// Parse and validate a YAML catalog
    ///
    /// # Errors
    /// Returns `DomainError::SerializationError` for malformed YAML, or a
    /// validation error from [`IntentRegistry::from_catalog`]
    pub fn from_yaml_str(yaml: &str) -> DomainResult<Self> {
        let catalog: IntentCatalog = serde_yaml::from_str(yaml)
            .map_err(|e| DomainError::SerializationError(format!("Invalid intent catalog: {e}")))?;
        Self::from_catalog(catalog)
    }

    /// Load a YAML catalog from disk
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if the file cannot be read,
    /// or any error from [`IntentRegistry::from_yaml_str`]
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load_from_file(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::ValidationFailed(format!(
                "Failed to read intent catalog {}: {e}",
                path.display()
            ))
        })?;
        let registry = Self::from_yaml_str(&content)?;
        info!(intents = registry.len(), "Loaded intent catalog from file");
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// All intents in declaration order
    pub fn all(&self) -> &[IntentMetadata] {
        &self.intents
    }

    pub fn get(&self, name: &str) -> Option<&IntentMetadata> {
        self.index.get(name).map(|&i| &self.intents[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Metadata for each known name, skipping unknown ones
    pub fn resolve(&self, names: &[&str]) -> Vec<IntentMetadata> {
        names
            .iter()
            .filter_map(|name| self.get(name).cloned())
            .collect()
    }

    /// Required slot names in declaration order; empty for unknown intents
    pub fn required_slots(&self, intent_name: &str) -> Vec<String> {
        self.get(intent_name)
            .map(IntentMetadata::required_slot_names)
            .unwrap_or_default()
    }

    pub fn question_for(&self, slot: &str) -> String {
        self.slot_questions
            .get(slot)
            .cloned()
            .unwrap_or_else(|| self.fallback_question.replace("{slot}", slot))
    }

    fn names_of_kind(&self, kind: IntentKind) -> Vec<&str> {
        self.intents
            .iter()
            .filter(|intent| intent.kind == kind)
            .map(|intent| intent.name.as_str())
            .collect()
    }

    pub fn business_intents(&self) -> Vec<&str> {
        self.names_of_kind(IntentKind::Business)
    }

    pub fn digression_intents(&self) -> Vec<&str> {
        self.names_of_kind(IntentKind::Digression)
    }

    /// The named intent, only if it is a control intent
    pub fn control_intent(&self, name: &str) -> Option<&IntentMetadata> {
        self.get(name).filter(|intent| intent.kind == IntentKind::Control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = IntentRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.business_intents(), vec!["open_account", "stock_purchase"]);
        assert_eq!(registry.digression_intents(), vec!["check_weather"]);
        assert!(registry.control_intent("modify_slot").is_some());
        assert!(registry.control_intent("stock_purchase").is_none());
    }

    #[test]
    fn test_required_slots_in_declaration_order() {
        let registry = IntentRegistry::builtin().unwrap();
        assert_eq!(
            registry.required_slots("open_account"),
            vec!["education", "occupation", "address"]
        );
        assert!(registry.required_slots("check_weather").is_empty());
        assert!(registry.required_slots("unknown").is_empty());
    }

    #[test]
    fn test_question_fallback() {
        let registry = IntentRegistry::builtin().unwrap();
        assert_eq!(registry.question_for("quantity"), "How many shares would you like to buy?");
        assert_eq!(registry.question_for("nickname"), "Please provide your nickname.");
    }

    #[test]
    fn test_resolve_skips_unknown() {
        let registry = IntentRegistry::builtin().unwrap();
        let resolved = registry.resolve(&["check_weather", "nope"]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "check_weather");
    }

    #[test]
    fn test_duplicate_intent_rejected() {
        let mut catalog = IntentCatalog::builtin();
        catalog.intents.push(catalog.intents[0].clone());
        let err = IntentRegistry::from_catalog(catalog).unwrap_err();
        assert!(err.to_string().contains("Duplicate intent name: open_account"));
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let yaml = r"
intents:
  - name: transfer
    slots:
      - name: amount
      - name: amount
";
        let err = IntentRegistry::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[test]
    fn test_yaml_catalog() {
        let yaml = r"
fallback_question: 'What is the {slot}?'
slot_questions:
  amount: How much would you like to transfer?
intents:
  - name: transfer
    description: Move money between accounts
    slots:
      - name: amount
        type: number
      - name: recipient
  - name: time_now
    kind: digression
";
        let registry = IntentRegistry::from_yaml_str(yaml).unwrap();
        assert_eq!(registry.business_intents(), vec!["transfer"]);
        assert_eq!(registry.question_for("recipient"), "What is the recipient?");
        assert_eq!(
            registry.get("transfer").unwrap().slots[0].value_type,
            SlotType::Number
        );
    }

    #[tokio::test]
    async fn test_load_from_missing_file() {
        let err = IntentRegistry::load_from_file("/nonexistent/catalog.yaml")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read intent catalog"));
    }
}
