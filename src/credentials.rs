//! Credential resolution.
//!
//! Order: explicit keys in the configuration, then the named profile from
//! the shared credentials file, then the `AWS_ACCESS_KEY_ID` /
//! `AWS_SECRET_ACCESS_KEY` environment pair, then the `default` profile.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ConnectionSettings;
use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

type Profiles = HashMap<String, HashMap<String, String>>;

/// Parses the INI-style shared credentials file.
fn parse_profiles(content: &str) -> Profiles {
    let mut profiles = Profiles::new();
    let mut current: Option<String> = None;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = section.trim();
            let name = name.strip_prefix("profile ").unwrap_or(name).trim();
            profiles.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }
        if let (Some(profile), Some((key, value))) = (&current, line.split_once('=')) {
            if let Some(entries) = profiles.get_mut(profile) {
                entries.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
    }
    profiles
}

fn from_profile(profiles: &Profiles, name: &str) -> Option<Credentials> {
    let entries = profiles.get(name)?;
    Some(Credentials {
        access_key_id: entries.get("aws_access_key_id")?.clone(),
        secret_access_key: entries.get("aws_secret_access_key")?.clone(),
        session_token: entries.get("aws_session_token").cloned(),
    })
}

fn shared_credentials_path(env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(path) = env("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".aws").join("credentials"))
}

fn load_profiles(path: Option<&Path>) -> Result<Profiles> {
    let Some(path) = path else {
        return Ok(Profiles::new());
    };
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(parse_profiles(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Profiles::new()),
        Err(e) => Err(Error::io(format!("reading {}", path.display()), e)),
    }
}

/// Resolves credentials from the process environment and the user's
/// shared credentials file. `None` means nothing was found.
pub fn resolve(settings: &ConnectionSettings) -> Result<Option<Credentials>> {
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
    let path = shared_credentials_path(&env);
    resolve_with(settings, &env, path.as_deref())
}

pub fn resolve_with(
    settings: &ConnectionSettings,
    env: &dyn Fn(&str) -> Option<String>,
    credentials_file: Option<&Path>,
) -> Result<Option<Credentials>> {
    match (&settings.access_key_id, &settings.secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => {
            debug!("using credentials from configuration");
            return Ok(Some(Credentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: settings.session_token.clone(),
            }));
        }
        (None, None) => {}
        _ => {
            return Err(Error::Configuration(
                "accessKeyId and secretAccessKey must be given together".to_string(),
            ))
        }
    }

    if let Some(profile) = &settings.profile {
        let profiles = load_profiles(credentials_file)?;
        return match from_profile(&profiles, profile) {
            Some(creds) => {
                debug!(profile = %profile, "using credentials from profile");
                Ok(Some(creds))
            }
            None => Err(Error::Configuration(format!(
                "profile {} not found in shared credentials file",
                profile
            ))),
        };
    }

    if let (Some(access_key_id), Some(secret_access_key)) =
        (env("AWS_ACCESS_KEY_ID"), env("AWS_SECRET_ACCESS_KEY"))
    {
        debug!("using credentials from environment");
        return Ok(Some(Credentials {
            access_key_id,
            secret_access_key,
            session_token: env("AWS_SESSION_TOKEN"),
        }));
    }

    let profiles = load_profiles(credentials_file)?;
    let default_profile = env("AWS_PROFILE").unwrap_or_else(|| "default".to_string());
    Ok(from_profile(&profiles, &default_profile))
}
