use std::{fmt, str::FromStr};

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HouseType {
    #[default]
    Townhouse,
    Villa,
    GardenHouse,
    Shophouse,
    Apartment,
}

impl HouseType {
    pub fn label(&self) -> &'static str {
        match self {
            HouseType::Townhouse => "Townhouse",
            HouseType::Villa => "Villa",
            HouseType::GardenHouse => "Garden House",
            HouseType::Shophouse => "Shophouse",
            HouseType::Apartment => "Apartment",
        }
    }
}

impl fmt::Display for HouseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DesignStyle {
    #[default]
    Modern,
    Minimalist,
    Neoclassical,
    Indochine,
    Tropical,
}

impl DesignStyle {
    pub fn label(&self) -> &'static str {
        match self {
            DesignStyle::Modern => "Modern",
            DesignStyle::Minimalist => "Minimalist",
            DesignStyle::Neoclassical => "Neoclassical",
            DesignStyle::Indochine => "Indochine",
            DesignStyle::Tropical => "Tropical",
        }
    }
}

impl fmt::Display for DesignStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUriError {
    #[error("data URI must start with 'data:'")]
    MissingScheme,
    #[error("data URI has no ',' separating header and payload")]
    MissingPayload,
    #[error("only base64 data URIs are supported")]
    NotBase64,
    #[error("data URI payload is not valid base64")]
    InvalidPayload,
}

/// An image carried inline as `data:<mime>;base64,<payload>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: String,
}

impl DataUri {
    /// Wraps an already base64-encoded payload. Used for API responses, which are trusted.
    pub fn from_base64(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self { mime_type: mime_type.into(), data: data.into() }
    }

    #[cfg(test)]
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::from_base64(mime_type, base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn mime_type(&self) -> &str { &self.mime_type }

    /// The bare base64 payload, without the `data:...,` header.
    pub fn data(&self) -> &str { &self.data }

    /// Short form for logs; payloads run to megabytes.
    pub fn preview(&self) -> String {
        if self.data.len() > 50 {
            let head: String = self.data.chars().take(50).collect();
            format!("{};{}...[{} chars]", self.mime_type, head, self.data.len())
        } else {
            format!("{};{}", self.mime_type, self.data)
        }
    }
}

impl FromStr for DataUri {
    type Err = DataUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.trim().strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingPayload)?;
        let mime_type = header.strip_suffix(";base64").ok_or(DataUriError::NotBase64)?;
        if payload.is_empty() {
            return Err(DataUriError::InvalidPayload);
        }
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|_| DataUriError::InvalidPayload)?;
        let mime_type = if mime_type.is_empty() { "image/png" } else { mime_type };
        Ok(Self::from_base64(mime_type, payload))
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Form body for `POST /api/designs`. Numeric fields stay strings and reach the prompt verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct DesignForm {
    #[serde(default)]
    pub house_type: HouseType,
    #[serde(default)]
    pub style: DesignStyle,
    #[serde(default = "default_budget")]
    pub budget: String,
    #[serde(default = "default_land_width")]
    pub land_width: String,
    #[serde(default = "default_land_length")]
    pub land_length: String,
    #[serde(default = "default_floors")]
    pub floors: String,
    #[serde(default = "default_front_yard")]
    pub front_yard: String,
    /// Raw data URI; validated when the form is turned into a [`DesignRequest`].
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
}

fn default_budget() -> String { "2.5".into() }
fn default_land_width() -> String { "5".into() }
fn default_land_length() -> String { "20".into() }
fn default_floors() -> String { "2".into() }
fn default_front_yard() -> String { "3".into() }

/// Snapshot of a submission, taken once and never changed.
#[derive(Debug, Clone, Serialize)]
pub struct DesignRequest {
    pub house_type: HouseType,
    pub style: DesignStyle,
    pub budget: String,
    pub land_width: String,
    pub land_length: String,
    pub floors: String,
    pub front_yard: String,
    #[serde(skip)]
    pub image: DataUri,
    pub birth_date: Option<String>,
}

impl TryFrom<DesignForm> for DesignRequest {
    type Error = AppError;

    fn try_from(form: DesignForm) -> Result<Self, Self::Error> {
        let raw = form
            .image
            .filter(|i| !i.trim().is_empty())
            .ok_or_else(|| AppError::Validation("please upload a photo of the plot".into()))?;
        let image = raw
            .parse::<DataUri>()
            .map_err(|e| AppError::Validation(format!("plot photo: {e}")))?;
        Ok(Self {
            house_type: form.house_type,
            style: form.style,
            budget: form.budget,
            land_width: form.land_width,
            land_length: form.land_length,
            floors: form.floors,
            front_yard: form.front_yard,
            image,
            birth_date: form.birth_date.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub variation: usize,
    pub image: DataUri,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DesignSuggestion {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub estimated_cost: String,
    pub image: DataUri,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DesignSuggestion {
    pub fn from_result(result: GenerationResult, request: &DesignRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: format!(
                "Variation {}: {} {} floors",
                result.variation + 1,
                request.house_type,
                request.floors
            ),
            description: result
                .description
                .unwrap_or_else(|| format!("Variation {}", result.variation + 1)),
            estimated_cost: format!("{} billion VND", request.budget),
            image: result.image,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FengShuiReport {
    pub text: String,
    /// Set only when the provider call failed.
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DesignSession {
    pub id: Uuid,
    pub request: DesignRequest,
    pub suggestions: Vec<DesignSuggestion>,
    pub feng_shui: Option<FengShuiReport>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditRequest {
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub changed: bool,
    pub suggestion: DesignSuggestion,
}
