//! Asset metadata schema and its field co-occurrence invariants.
//!
//! [`AssetMetadata`] is the record persisted per asset. Known fields are
//! typed; anything else a producer wants to attach goes into the separate
//! [`AssetMetadata::extensions`] map so typed and free-form data never mix.
//!
//! Serialized field names are camelCase and are consumed verbatim by the
//! dashboard and asset browser.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::rigging::RiggingPhase;
use crate::types::{AssetId, TaskId, Timestamp};

/// Maximum length of an asset id.
pub const MAX_ASSET_ID_LENGTH: usize = 128;

/// Maximum length of a rigging error message.
pub const MAX_ERROR_LENGTH: usize = 2_000;

/// Well-known clip names. Any other non-empty name is accepted too.
pub const CLIP_WALKING: &str = "walking";
pub const CLIP_RUNNING: &str = "running";
pub const CLIP_TPOSE: &str = "tpose";

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Persisted rigging status. Absence of a status means "never attempted".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiggingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RiggingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Skeleton family assigned to a rigged asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RigType {
    HumanoidStandard,
    Creature,
    Custom,
}

impl RigType {
    /// Humanoid rigs are retargeted by height, so they must carry one.
    pub fn requires_height(self) -> bool {
        matches!(self, Self::HumanoidStandard)
    }
}

// ---------------------------------------------------------------------------
// Animation clips
// ---------------------------------------------------------------------------

/// Named animation clips mapped to their file paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimationClipSet(BTreeMap<String, String>);

impl AnimationClipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_clip(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.0.insert(name.into(), path.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), path.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn validate(&self, label: &str) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::Validation(format!(
                "Animation set '{label}' must contain at least one clip"
            )));
        }
        for (name, path) in self.iter() {
            if name.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "Animation set '{label}' contains a clip with an empty name"
                )));
            }
            if path.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "Animation clip '{label}.{name}' has an empty file path"
                )));
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnimationClipSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The clip sets produced by a successful rigging job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimationSets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<AnimationClipSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced: Option<AnimationClipSet>,
}

impl AnimationSets {
    pub fn basic(clips: AnimationClipSet) -> Self {
        Self {
            basic: Some(clips),
            advanced: None,
        }
    }

    /// True when neither set is present.
    pub fn is_empty(&self) -> bool {
        self.basic.is_none() && self.advanced.is_none()
    }

    /// Validate every present set. At least one set must be present.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::Validation(
                "Animations must include at least one clip set (basic or advanced)".to_string(),
            ));
        }
        if let Some(basic) = &self.basic {
            basic.validate("basic")?;
        }
        if let Some(advanced) = &self.advanced {
            advanced.validate("advanced")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RiggingMetadata
// ---------------------------------------------------------------------------

/// Rigging and animation state attached to an asset.
///
/// Only the lifecycle functions in [`crate::rigging`] produce changes to the
/// status-related fields; [`RiggingMetadata::validate`] checks that a record
/// is one the lifecycle could have produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RiggingMetadata {
    #[serde(default)]
    pub is_rigged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rigging_task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rigging_status: Option<RiggingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rigging_error: Option<String>,
    #[serde(default)]
    pub rigging_attempted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rig_type: Option<RigType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_height: Option<f64>,
    #[serde(default)]
    pub supports_animation: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub animation_compatibility: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animations: Option<AnimationSets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rigged_model_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpose_model_path: Option<String>,
    /// Set only while processing; the deadline sweeper fails the job after it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_deadline: Option<Timestamp>,
}

impl RiggingMetadata {
    pub fn phase(&self) -> RiggingPhase {
        RiggingPhase::from(self.rigging_status)
    }

    /// Check every field co-occurrence rule for the current status.
    pub fn validate(&self) -> Result<(), CoreError> {
        let status = self.rigging_status;
        let completed = status == Some(RiggingStatus::Completed);
        let failed = status == Some(RiggingStatus::Failed);

        match status {
            None => {
                if self.rigging_task_id.is_some() {
                    return Err(invalid("riggingTaskId requires a riggingStatus"));
                }
                if self.rigging_attempted {
                    return Err(invalid("riggingAttempted requires a riggingStatus"));
                }
            }
            Some(status) => {
                match &self.rigging_task_id {
                    None => {
                        return Err(CoreError::Validation(format!(
                            "riggingStatus '{}' requires a riggingTaskId",
                            status.as_str()
                        )))
                    }
                    Some(task) if task.as_str().trim().is_empty() => {
                        return Err(invalid("riggingTaskId must not be empty"))
                    }
                    Some(_) => {}
                }
                if !self.rigging_attempted {
                    return Err(CoreError::Validation(format!(
                        "riggingStatus '{}' requires riggingAttempted = true",
                        status.as_str()
                    )));
                }
            }
        }

        if self.is_rigged != completed {
            return Err(invalid("isRigged must be true exactly when riggingStatus is 'completed'"));
        }
        if self.supports_animation != completed {
            return Err(invalid(
                "supportsAnimation must be true exactly when riggingStatus is 'completed'",
            ));
        }

        match (&self.rigging_error, failed) {
            (Some(err), true) => validate_error_message(err)?,
            (None, true) => return Err(invalid("riggingStatus 'failed' requires a riggingError")),
            (Some(_), false) => {
                return Err(invalid("riggingError is only allowed when riggingStatus is 'failed'"))
            }
            (None, false) => {}
        }

        if completed {
            match &self.animations {
                Some(animations) => animations.validate()?,
                None => return Err(invalid("riggingStatus 'completed' requires animations")),
            }
            require_path("riggedModelPath", self.rigged_model_path.as_deref())?;
            require_path("tposeModelPath", self.tpose_model_path.as_deref())?;
            if self.rig_type.is_none() {
                return Err(invalid("riggingStatus 'completed' requires a rigType"));
            }
        } else {
            if self.animations.is_some() {
                return Err(invalid("animations are only allowed when riggingStatus is 'completed'"));
            }
            if self.rigged_model_path.is_some() || self.tpose_model_path.is_some() {
                return Err(invalid(
                    "riggedModelPath and tposeModelPath are only allowed when riggingStatus is 'completed'",
                ));
            }
        }

        if self.processing_deadline.is_some() && status != Some(RiggingStatus::Processing) {
            return Err(invalid(
                "processingDeadline is only allowed when riggingStatus is 'processing'",
            ));
        }

        validate_height(self.rig_type, self.character_height)?;

        if self
            .animation_compatibility
            .iter()
            .any(|pack| pack.trim().is_empty())
        {
            return Err(invalid("animationCompatibility entries must not be empty"));
        }

        Ok(())
    }
}

/// `characterHeight` must be a positive, finite number whenever it is
/// present, and is mandatory for rig types that need it.
pub fn validate_height(rig_type: Option<RigType>, height: Option<f64>) -> Result<(), CoreError> {
    match height {
        Some(h) if h.is_finite() && h > 0.0 => Ok(()),
        Some(h) => Err(CoreError::Validation(format!(
            "characterHeight must be a positive number (got {h})"
        ))),
        None if rig_type.is_some_and(RigType::requires_height) => Err(invalid(
            "characterHeight is required for humanoid-standard rigs",
        )),
        None => Ok(()),
    }
}

/// A rigging error must be non-blank and reasonably short.
pub fn validate_error_message(message: &str) -> Result<(), CoreError> {
    if message.trim().is_empty() {
        return Err(invalid("riggingError must not be empty"));
    }
    let length = message.chars().count();
    if length > MAX_ERROR_LENGTH {
        return Err(CoreError::Validation(format!(
            "riggingError exceeds maximum length of {MAX_ERROR_LENGTH} characters (got {length})"
        )));
    }
    Ok(())
}

fn require_path(field: &str, path: Option<&str>) -> Result<(), CoreError> {
    match path {
        Some(p) if !p.trim().is_empty() => Ok(()),
        _ => Err(CoreError::Validation(format!(
            "riggingStatus 'completed' requires a non-empty {field}"
        ))),
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::Validation(message.to_string())
}

// ---------------------------------------------------------------------------
// AssetMetadata
// ---------------------------------------------------------------------------

/// The per-asset record kept by the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssetMetadata {
    pub id: AssetId,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    /// True until the generation pipeline has produced the asset.
    pub is_placeholder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rigging: Option<RiggingMetadata>,
    /// Free-form producer data, keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl AssetMetadata {
    /// A freshly registered, not-yet-generated asset with no rigging data.
    pub fn placeholder(id: impl Into<AssetId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            asset_type: None,
            is_placeholder: true,
            rigging: None,
            extensions: BTreeMap::new(),
        }
    }

    /// A generated asset with no rigging data.
    pub fn generated(id: impl Into<AssetId>, name: impl Into<String>) -> Self {
        Self {
            is_placeholder: false,
            ..Self::placeholder(id, name)
        }
    }

    pub fn rigging_phase(&self) -> RiggingPhase {
        self.rigging
            .as_ref()
            .map(RiggingMetadata::phase)
            .unwrap_or(RiggingPhase::Unrigged)
    }

    /// Validate the whole record.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_asset_id(&self.id)?;
        if self.name.trim().is_empty() {
            return Err(invalid("Asset name must not be empty"));
        }
        if self.extensions.keys().any(|k| k.trim().is_empty()) {
            return Err(invalid("Extension keys must not be empty"));
        }
        if let Some(rigging) = &self.rigging {
            rigging.validate()?;
        }
        Ok(())
    }

    /// Validate the record as the payload of a write addressed to `asset_id`.
    pub fn validate_for(&self, asset_id: &str) -> Result<(), CoreError> {
        if self.id != asset_id {
            return Err(CoreError::Validation(format!(
                "Record id '{}' does not match target asset '{asset_id}'",
                self.id
            )));
        }
        self.validate()
    }
}

/// Asset ids are non-empty slugs without whitespace.
pub fn validate_asset_id(id: &str) -> Result<(), CoreError> {
    if id.is_empty() {
        return Err(invalid("Asset id must not be empty"));
    }
    if id.len() > MAX_ASSET_ID_LENGTH {
        return Err(CoreError::Validation(format!(
            "Asset id exceeds maximum length of {MAX_ASSET_ID_LENGTH} characters"
        )));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(format!(
            "Asset id '{id}' must not contain whitespace"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
