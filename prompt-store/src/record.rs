//! Template version records and their on-disk shapes.

use prompt_primitives::{PromptId, VersionLabel};
use serde::{Deserialize, Serialize};

/// One immutable version of a prompt template.
///
/// Regardless of which on-disk shape produced it, a version always carries
/// its template text and an optional description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVersion {
    id: PromptId,
    version: VersionLabel,
    template: String,
    description: Option<String>,
}

impl TemplateVersion {
    /// Creates a version record.
    #[must_use]
    pub fn new(
        id: PromptId,
        version: VersionLabel,
        template: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            id,
            version,
            template: template.into(),
            description,
        }
    }

    /// Returns the prompt id.
    #[must_use]
    pub fn id(&self) -> &PromptId {
        &self.id
    }

    /// Returns the version label.
    #[must_use]
    pub fn version(&self) -> VersionLabel {
        self.version
    }

    /// Returns the raw template text.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Consumes the record and returns the template text.
    #[must_use]
    pub fn into_template(self) -> String {
        self.template
    }
}

/// Object form of a stored version: `{version?, description?, template}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct VersionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) version: Option<VersionLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    pub(crate) template: String,
}

impl VersionDocument {
    pub(crate) fn new(
        version: Option<VersionLabel>,
        template: &str,
        description: Option<&str>,
    ) -> Self {
        Self {
            version,
            description: description.map(str::to_owned),
            template: template.to_owned(),
        }
    }
}

/// A single version as written in the combined document: either a bare
/// template string or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum VersionItem {
    Bare(String),
    Document(VersionDocument),
}

impl VersionItem {
    pub(crate) fn explicit_version(&self) -> Option<VersionLabel> {
        match self {
            Self::Bare(_) => None,
            Self::Document(doc) => doc.version,
        }
    }

    pub(crate) fn into_parts(self) -> (String, Option<String>) {
        match self {
            Self::Bare(template) => (template, None),
            Self::Document(doc) => (doc.template, doc.description),
        }
    }
}

/// Value stored under one id in the combined document.
///
/// A single item is the implicit first version; a sequence lists every
/// version in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum CombinedEntry {
    Single(VersionItem),
    History(Vec<VersionItem>),
}

impl CombinedEntry {
    /// Returns each item paired with its effective label.
    ///
    /// Items without an explicit `version` are labelled by position. Returns
    /// `Err` with a reason when the labels are not strictly increasing.
    pub(crate) fn labelled(self) -> Result<Vec<(VersionLabel, VersionItem)>, String> {
        let items = match self {
            Self::Single(item) => vec![item],
            Self::History(items) => items,
        };

        let mut labelled = Vec::with_capacity(items.len());
        let mut previous: Option<VersionLabel> = None;
        for (index, item) in items.into_iter().enumerate() {
            let positional = u32::try_from(index + 1)
                .ok()
                .and_then(VersionLabel::new)
                .ok_or_else(|| "too many versions".to_owned())?;
            let label = item.explicit_version().unwrap_or(positional);
            if previous.is_some_and(|prev| prev >= label) {
                return Err(format!("version {label} is out of order or duplicated"));
            }
            previous = Some(label);
            labelled.push((label, item));
        }
        Ok(labelled)
    }
}
