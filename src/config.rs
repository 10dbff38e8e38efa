//! Desired-state document and connection settings.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lambda::types::FunctionSettings;
use crate::poll::PollPolicy;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub config: ConnectionSettings,
    #[serde(default)]
    pub lambda: Option<FunctionSpec>,
    #[serde(default)]
    pub api_gateway: Option<ApiGatewaySpec>,
    /// Directory relative template references resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Document {
    pub fn load(path: &Path) -> Result<Document> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Document::from_yaml(&text, base_dir)
    }

    pub fn from_yaml(text: &str, base_dir: PathBuf) -> Result<Document> {
        let mut document: Document = serde_yaml::from_str(text)
            .map_err(|e| Error::Configuration(format!("invalid configuration: {}", e)))?;
        document.base_dir = base_dir;
        Ok(document)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
    /// Replaces every service URL, e.g. a local emulator.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub consistency: ConsistencySettings,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            region: default_region(),
            profile: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint: None,
            consistency: ConsistencySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencySettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_interval_ms() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for ConsistencySettings {
    fn default() -> Self {
        ConsistencySettings {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ConsistencySettings {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(self.interval_ms), self.max_attempts)
    }
}

/// Function to publish. Anything beyond the name and role is handed to the
/// compute service as-is.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionSpec {
    pub function_name: String,
    pub role_name: String,
    #[serde(flatten)]
    pub settings: FunctionSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewaySpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceEntry>,
    #[serde(default)]
    pub method_definitions: BTreeMap<String, MethodSpec>,
}

/// A path's methods, either spelled out or as a list of verbs to fill from
/// `methodDefinitions`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResourceEntry {
    Methods(Vec<String>),
    Definitions(BTreeMap<String, MethodSpec>),
}

impl Default for ResourceEntry {
    fn default() -> Self {
        ResourceEntry::Definitions(BTreeMap::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSpec {
    #[serde(default)]
    pub authorization_type: Option<String>,
    #[serde(default)]
    pub api_key_required: Option<bool>,
    #[serde(default)]
    pub request_models: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub request: IntegrationSpec,
    #[serde(default, deserialize_with = "string_keyed")]
    pub responses: BTreeMap<String, ResponseSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationType {
    #[serde(rename = "MOCK")]
    Mock,
    #[serde(rename = "AWS")]
    Aws,
    #[serde(rename = "AWS_PROXY")]
    AwsProxy,
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTP_PROXY")]
    HttpProxy,
    /// Shorthand for an `AWS` integration invoking the configured function.
    #[serde(rename = "Lambda")]
    Lambda,
}

impl IntegrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationType::Mock => "MOCK",
            IntegrationType::Aws => "AWS",
            IntegrationType::AwsProxy => "AWS_PROXY",
            IntegrationType::Http => "HTTP",
            IntegrationType::HttpProxy => "HTTP_PROXY",
            IntegrationType::Lambda => "Lambda",
        }
    }
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integration request. Keys not modelled here (`passthroughBehavior`,
/// `requestParameters`, `timeoutInMillis`, ...) are kept in `other` and sent
/// and compared verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub integration_type: Option<IntegrationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_http_method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_templates: BTreeMap<String, TemplateSource>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateSource {
    Inline(String),
    File { file: PathBuf },
}

impl TemplateSource {
    pub fn as_inline(&self) -> Option<&str> {
        match self {
            TemplateSource::Inline(text) => Some(text),
            TemplateSource::File { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSpec {
    /// Header name to the value mapped into it.
    #[serde(default)]
    pub response_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub response_models: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub response_templates: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub selection_pattern: Option<String>,
}

/// Map keys that YAML may read as numbers (`200:`), taken as strings.
struct KeyString(String);

impl<'de> Deserialize<'de> for KeyString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = KeyString;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a status code")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<KeyString, E> {
                Ok(KeyString(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<KeyString, E> {
                Ok(KeyString(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<KeyString, E> {
                Ok(KeyString(v.to_string()))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

fn string_keyed<'de, D, V>(deserializer: D) -> std::result::Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct MapVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for MapVisitor<V> {
        type Value = BTreeMap<String, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map keyed by status code")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
            let mut map = BTreeMap::new();
            while let Some((KeyString(key), value)) = access.next_entry::<KeyString, V>()? {
                map.insert(key, value);
            }
            Ok(map)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(BTreeMap::new())
        }
    }

    deserializer.deserialize_any(MapVisitor(PhantomData))
}
