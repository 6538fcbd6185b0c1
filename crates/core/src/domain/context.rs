use serde::{Deserialize, Serialize};

/// Response locale, decided per message from the raw text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    #[default]
    En,
}

/// Profile fields the info-collection flow requires, in the fixed order they
/// are asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextField {
    Name,
    BusinessLink,
    Objective,
}

impl ContextField {
    pub const ALL: [ContextField; 3] =
        [ContextField::Name, ContextField::BusinessLink, ContextField::Objective];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::BusinessLink => "business_link",
            Self::Objective => "objective",
        }
    }

    pub fn label(&self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Name, Language::Zh) => "你的称呼",
            (Self::Name, Language::En) => "your name",
            (Self::BusinessLink, Language::Zh) => "你的业务链接",
            (Self::BusinessLink, Language::En) => "a link to your business",
            (Self::Objective, Language::Zh) => "你的推广目标",
            (Self::Objective, Language::En) => "your marketing objective",
        }
    }
}

/// Structured profile derived from the history window on every inbound
/// message. Derived, never stored authoritatively: a field filled on one
/// turn may legitimately come back null on the next if extraction fails.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub name: Option<String>,
    pub business_link: Option<String>,
    pub objective: Option<String>,
    #[serde(default)]
    pub language: Language,
}

impl ConversationContext {
    /// All-null context in the given locale. This is the degrade target for
    /// every extraction failure.
    pub fn empty(language: Language) -> Self {
        Self { language, ..Self::default() }
    }

    pub fn field(&self, field: ContextField) -> Option<&str> {
        match field {
            ContextField::Name => self.name.as_deref(),
            ContextField::BusinessLink => self.business_link.as_deref(),
            ContextField::Objective => self.objective.as_deref(),
        }
    }

    /// Required fields still absent, in the fixed ask order.
    pub fn missing_fields(&self) -> Vec<ContextField> {
        ContextField::ALL
            .into_iter()
            .filter(|field| {
                self.field(*field).map(|value| value.trim().is_empty()).unwrap_or(true)
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ContextField, ConversationContext, Language};

    #[test]
    fn empty_context_is_missing_every_field() {
        let context = ConversationContext::empty(Language::Zh);
        assert_eq!(context.missing_fields(), ContextField::ALL.to_vec());
        assert!(!context.is_complete());
    }

    #[test]
    fn missing_fields_keeps_fixed_ask_order() {
        let context = ConversationContext {
            business_link: Some("https://shop.example".to_string()),
            ..ConversationContext::empty(Language::En)
        };

        assert_eq!(
            context.missing_fields(),
            vec![ContextField::Name, ContextField::Objective]
        );
    }

    #[test]
    fn whitespace_only_values_count_as_missing() {
        let context = ConversationContext {
            name: Some("  ".to_string()),
            business_link: Some("https://shop.example".to_string()),
            objective: Some("more leads".to_string()),
            language: Language::En,
        };

        assert_eq!(context.missing_fields(), vec![ContextField::Name]);
    }

    #[test]
    fn complete_context_has_no_missing_fields() {
        let context = ConversationContext {
            name: Some("Ali".to_string()),
            business_link: Some("https://shop.example".to_string()),
            objective: Some("more leads".to_string()),
            language: Language::En,
        };

        assert!(context.is_complete());
    }
}
