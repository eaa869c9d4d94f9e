//! Persisted user preferences: the only client-side state the engine keeps
//! across sessions, and entirely optional (spec §6 "Persisted state").

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

use crate::error::CommonError;

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Preferences {
    /// `clusterId -> visible`.
    #[serde(default)]
    pub cluster_visibility: HashMap<u32, bool>,
    #[serde(default)]
    pub min_degree: Option<u32>,
}

pub fn preferences_path(path: Option<&str>) -> Result<PathBuf, CommonError> {
    if let Some(path) = path {
        return Ok(PathBuf::from(path));
    }
    if let Some(path) = std::env::var_os("GRAPH_PREFERENCES") {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir().ok_or(CommonError::NoHomeDir)?;
    Ok(dir.join("graph-engine").join("preferences.json"))
}

pub async fn write_preferences(
    path: Option<&str>,
    preferences: &Preferences,
) -> Result<(), CommonError> {
    let preferences_path = preferences_path(path)?;
    let contents = serde_json::to_string_pretty(preferences)?;
    if let Some(parent) = preferences_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&preferences_path, contents).await?;
    Ok(())
}

pub async fn load_preferences(path: Option<&str>) -> Result<Option<Preferences>, CommonError> {
    let preferences_path = preferences_path(path)?;
    let file = match tokio::fs::File::open(&preferences_path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CommonError::Io(e)),
    };
    let mut reader = tokio::io::BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents).await?;
    let preferences = serde_json::from_str::<Preferences>(&contents)?;
    Ok(Some(preferences))
}
