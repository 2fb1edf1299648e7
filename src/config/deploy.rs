//! `config-ftp.json` - deployment configuration.
//!
//! Absence of this file disables deployment entirely (a warning, never an
//! error). The wire format keeps the original camelCase keys.

use super::defaults;
use educe::Educe;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// `config-ftp.json` - remote host, mappings and keyboard shortcuts.
///
/// # Example
/// ```json
/// {
///   "connection": { "host": "ftp.example.com", "user": "u", "password": "p", "secure": false },
///   "deployment": {
///     "localFolder": "dist",
///     "basePath": "/www/site",
///     "mappings": {
///       "styles": { "local": "css", "remote": "assets/css", "exclude": ["*.map"], "description": "stylesheets" }
///     }
///   },
///   "shortcuts": {
///     "d": { "action": "toggleAutoDeploy", "description": "toggle auto-deploy" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    pub connection: ConnectionConfig,

    pub deployment: DeploymentConfig,

    /// Single-character keyboard shortcuts available in serve mode.
    #[serde(default)]
    pub shortcuts: FxHashMap<String, Shortcut>,
}

/// `"connection"` object - remote host credentials.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub host: String,
    pub user: String,
    pub password: String,

    /// Use explicit FTPS.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = defaults::r#false())]
    pub secure: bool,
}

/// `"deployment"` object - local root, remote base and named mappings.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Local directory deployed from (the build output directory).
    #[serde(rename = "localFolder", default = "defaults::deploy::local_folder")]
    #[educe(Default = defaults::deploy::local_folder())]
    pub local_folder: String,

    /// Remote directory all mappings are resolved under.
    #[serde(rename = "basePath", default = "defaults::deploy::base_path")]
    #[educe(Default = defaults::deploy::base_path())]
    pub base_path: String,

    /// Named deploy rules (styles, scripts, images, fonts, all, ...).
    #[serde(default)]
    pub mappings: FxHashMap<String, Mapping>,
}

/// One named deploy rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Mapping {
    /// Subpath under the local folder; `"."` deploys the whole output.
    pub local: String,

    /// Subpath under the remote base path.
    pub remote: String,

    /// Glob patterns (`*` matches any run) tested against entry names.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Human label used in logs.
    pub description: String,
}

/// One keyboard shortcut binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Shortcut {
    /// Action name, e.g. `deployStyles` or `toggleAutoDeploy`.
    pub action: String,

    pub description: String,
}
