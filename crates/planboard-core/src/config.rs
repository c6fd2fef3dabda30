use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::capability::{
  AccessPolicy,
  DEFAULT_RESTRICTED_ROLES,
  Role,
  Viewer
};
use crate::datetime::parse_timezone;

pub const CONFIG_ENV: &str =
  "PLANBOARD_CONFIG";
pub const DEFAULT_TIMEZONE: &str =
  "UTC";

fn default_data_location() -> String {
  "~/.planboard".to_string()
}

fn default_timeout_secs() -> u64 {
  15
}

fn default_role() -> String {
  "planner".to_string()
}

fn default_restricted_roles()
-> Vec<String> {
  DEFAULT_RESTRICTED_ROLES
    .iter()
    .map(|role| role.to_string())
    .collect()
}

fn default_timezone() -> String {
  DEFAULT_TIMEZONE.to_string()
}

fn config_true() -> bool {
  true
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
  #[default]
  File,
  Http,
  Memory
}

impl StoreBackend {
  pub fn parse(
    raw: &str
  ) -> anyhow::Result<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "file" => Ok(Self::File),
      | "http" => Ok(Self::Http),
      | "memory" => Ok(Self::Memory),
      | other => {
        Err(anyhow!(
          "unknown store backend \
           {other:?}; expected file, \
           http or memory"
        ))
      }
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | Self::File => "file",
      | Self::Http => "http",
      | Self::Memory => "memory"
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
pub struct DataSection {
  #[serde(
    default = "default_data_location"
  )]
  pub location: String
}

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
pub struct StoreSection {
  #[serde(default)]
  pub backend:      StoreBackend,
  #[serde(default)]
  pub url:          Option<String>,
  #[serde(
    default = "default_timeout_secs"
  )]
  pub timeout_secs: u64
}

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
pub struct AccessSection {
  #[serde(default = "default_role")]
  pub role:             String,
  #[serde(
    default = "default_restricted_roles"
  )]
  pub restricted_roles: Vec<String>
}

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
pub struct CalendarSection {
  #[serde(default = "default_timezone")]
  pub timezone: String
}

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
pub struct DisplaySection {
  #[serde(default = "config_true")]
  pub color: bool
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Default,
  Deserialize,
)]
pub struct Config {
  #[serde(default)]
  pub data:         DataSection,
  #[serde(default)]
  pub store:        StoreSection,
  #[serde(default)]
  pub access:       AccessSection,
  #[serde(default)]
  pub calendar:     CalendarSection,
  #[serde(default)]
  pub display:      DisplaySection,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

impl Default for DataSection {
  fn default() -> Self {
    Self {
      location: default_data_location()
    }
  }
}

impl Default for StoreSection {
  fn default() -> Self {
    Self {
      backend:      StoreBackend::File,
      url:          None,
      timeout_secs:
        default_timeout_secs()
    }
  }
}

impl Default for AccessSection {
  fn default() -> Self {
    Self {
      role:             default_role(),
      restricted_roles:
        default_restricted_roles()
    }
  }
}

impl Default for CalendarSection {
  fn default() -> Self {
    Self {
      timezone: default_timezone()
    }
  }
}

impl Default for DisplaySection {
  fn default() -> Self {
    Self {
      color: true
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_config_path(
        config_override
      )?
    else {
      info!(
        "no config file found; using \
         defaults"
      );
      return Ok(Self::default());
    };

    let path = expand_tilde(&path);
    info!(config = %path.display(), "loading config");
    let raw = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;

    let mut cfg = Self::from_toml_str(
      &raw
    )
    .with_context(|| {
      format!(
        "failed to parse TOML {}",
        path.display()
      )
    })?;
    cfg.loaded_files.push(path);
    Ok(cfg)
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let mut cfg =
      toml::from_str::<Self>(raw)
        .map_err(anyhow::Error::new)?;
    cfg.sanitize();
    Ok(cfg)
  }

  /// Applies `key=value` overrides on
  /// dotted keys. A leading `rc.` is
  /// accepted; unknown keys are an
  /// error.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .trim()
        .to_string();
      let value = v.trim();
      debug!(key = %key, value = %value, "applying override");

      match key.as_str() {
        | "data.location" => {
          self.data.location =
            value.to_string();
        }
        | "store.backend" => {
          self.store.backend =
            StoreBackend::parse(value)?;
        }
        | "store.url" => {
          self.store.url =
            if value.is_empty() {
              None
            } else {
              Some(value.to_string())
            };
        }
        | "store.timeout_secs" => {
          self.store.timeout_secs = value
            .parse()
            .with_context(|| {
              format!(
                "invalid \
                 store.timeout_secs \
                 {value:?}"
              )
            })?;
        }
        | "access.role" => {
          self.access.role =
            value.to_string();
        }
        | "access.restricted_roles" => {
          self.access.restricted_roles =
            value
              .split(',')
              .map(|role| {
                role.trim().to_string()
              })
              .collect();
        }
        | "calendar.timezone" => {
          self.calendar.timezone =
            value.to_string();
        }
        | "display.color" | "color" => {
          self.display.color =
            parse_bool(value);
        }
        | other => {
          bail!(
            "unknown config key \
             {other:?}"
          );
        }
      }
    }

    self.sanitize();
    Ok(())
  }

  fn sanitize(&mut self) {
    if self
      .data
      .location
      .trim()
      .is_empty()
    {
      self.data.location =
        default_data_location();
    }

    if self.store.timeout_secs == 0 {
      self.store.timeout_secs =
        default_timeout_secs();
    }

    if let Some(url) =
      self.store.url.as_ref()
      && url.trim().is_empty()
    {
      self.store.url = None;
    }

    if self
      .access
      .role
      .trim()
      .is_empty()
    {
      self.access.role = default_role();
    }

    self
      .access
      .restricted_roles
      .retain(|role| {
        !role.trim().is_empty()
      });

    if self
      .calendar
      .timezone
      .trim()
      .is_empty()
    {
      self.calendar.timezone =
        default_timezone();
    }
  }

  /// Configured timezone, or UTC when
  /// the id does not parse.
  pub fn timezone(&self) -> Tz {
    if let Some(tz) = parse_timezone(
      &self.calendar.timezone,
      "calendar.timezone"
    ) {
      return tz;
    }

    warn!(
      timezone = %self.calendar.timezone,
      "falling back to UTC"
    );
    chrono_tz::UTC
  }

  pub fn viewer(&self) -> Viewer {
    Viewer::new(
      Role::new(&self.access.role),
      AccessPolicy::new(
        &self.access.restricted_roles
      )
    )
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else {
    expand_tilde(Path::new(
      &cfg.data.location
    ))
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(from_env) =
    std::env::var(CONFIG_ENV)
  {
    let trimmed = from_env.trim();
    if trimmed == "/dev/null" {
      return Ok(None);
    }
    if !trimmed.is_empty() {
      return Ok(Some(PathBuf::from(
        trimmed
      )));
    }
  }

  let Some(home) = dirs::home_dir()
  else {
    debug!(
      "cannot determine home \
       directory; skipping \
       ~/.planboardrc.toml"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".planboardrc.toml");
  if candidate.is_file() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
