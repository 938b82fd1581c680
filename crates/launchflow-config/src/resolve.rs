//! Overrides, validation and conversion to `DesiredState`

use crate::error::{ConfigError, Result};
use crate::model::{DeployConfig, Scalar, VercelSection};
use launchflow_cloud::{
    ComputeSizing, DesiredState, ExposureMode, IamPolicySet, ImageSource, Platform,
    PublicExposure, StaticSite, default_bucket_name, validate_bucket_name,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROFILE: &str = "personal";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HEALTH_CHECK_PATH: &str = "/api/health";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";
const POLICY_VERSION: &str = "2012-10-17";

/// Values given on the command line; each one beats the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub replicas: Option<u32>,
    pub no_spot: bool,
    pub region: Option<String>,
    pub allow_create: bool,
    /// `KEY=VALUE` entries
    pub env: Vec<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub ephemeral_storage: Option<String>,
    pub profile: Option<String>,
    pub dockerfile: Option<String>,
}

/// Parse `21`, `"21"`, `"21gb"` or `"21 GiB"` into GiB.
pub fn parse_ephemeral_storage(value: &Scalar) -> Result<u32> {
    let bad = || {
        ConfigError::invalid(format!(
            "ephemeral_storage must be a positive number of GiB (e.g. 21 or \"21gb\"), got '{}'",
            value
        ))
    };
    let gib = match value {
        Scalar::Int(n) => u32::try_from(*n).map_err(|_| bad())?,
        Scalar::Text(s) => {
            let lower = s.trim().to_ascii_lowercase();
            let digits = lower
                .strip_suffix("gib")
                .or_else(|| lower.strip_suffix("gb"))
                .unwrap_or(&lower)
                .trim();
            digits.parse::<u32>().map_err(|_| bad())?
        }
        Scalar::Float(_) | Scalar::Bool(_) => return Err(bad()),
    };
    if gib == 0 {
        return Err(bad());
    }
    Ok(gib)
}

/// Settings for the Fly.io runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlySettings {
    pub app_name: String,
    pub replicas: u32,
    pub dockerfile: String,
}

/// Settings for the Vercel runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VercelSettings {
    pub app_name: String,
    pub project_name: String,
    pub team: Option<String>,
    pub scope: Option<String>,
    pub prod: bool,
    pub yes: bool,
    /// Passed as `--domain` when a public domain is configured
    pub domain: Option<String>,
    pub environment: BTreeMap<String, String>,
}

impl DeployConfig {
    /// Apply command line overrides.
    ///
    /// Returns a warning for every `--env` entry that is not `KEY=VALUE`.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(replicas) = overrides.replicas {
            self.task.replicas = Some(i64::from(replicas));
        }
        if overrides.no_spot {
            self.task.spot = Some(false);
        }
        if let Some(region) = &overrides.region {
            self.aws.region = Some(region.clone());
        }
        if overrides.allow_create {
            self.allow_create = true;
        }
        if let Some(profile) = &overrides.profile {
            self.aws.profile = Some(profile.clone());
        }
        if let Some(cpu) = &overrides.cpu {
            self.task.cpu = Some(Scalar::from(cpu.as_str()));
        }
        if let Some(memory) = &overrides.memory {
            self.task.memory = Some(Scalar::from(memory.as_str()));
        }
        if let Some(storage) = &overrides.ephemeral_storage {
            self.task.ephemeral_storage = Some(Scalar::from(storage.as_str()));
        }
        if let Some(dockerfile) = &overrides.dockerfile {
            self.dockerfile = Some(dockerfile.clone());
        }

        for entry in &overrides.env {
            match entry.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    self.environment
                        .insert(key.trim().to_string(), Scalar::from(value));
                }
                _ => warnings.push(format!(
                    "Ignoring --env '{}': expected KEY=VALUE",
                    entry
                )),
            }
        }

        warnings
    }

    pub fn app_name(&self) -> Result<&str> {
        self.app_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ConfigError::invalid("'app_name' is required"))
    }

    pub fn region(&self) -> Option<&str> {
        self.aws.region.as_deref()
    }

    pub fn profile(&self) -> &str {
        self.aws.profile.as_deref().unwrap_or(DEFAULT_PROFILE)
    }

    pub fn replicas(&self) -> i64 {
        self.task.replicas.unwrap_or(1)
    }

    fn exposure_mode(&self) -> Result<Option<ExposureMode>> {
        let Some(public) = &self.public else {
            return Ok(None);
        };
        match public.mode.as_deref() {
            None | Some("production") => Ok(Some(ExposureMode::Production)),
            Some("lightweight") => Ok(Some(ExposureMode::Lightweight)),
            Some(other) => Err(ConfigError::invalid(format!(
                "public.mode must be 'lightweight' or 'production', got '{}'",
                other
            ))),
        }
    }

    fn require_region(&self) -> Result<&str> {
        self.region()
            .ok_or_else(|| ConfigError::invalid("'aws.region' is required"))
    }

    /// Check everything that can be checked without talking to a provider.
    pub fn validate(&self) -> Result<()> {
        self.app_name()?;

        if self.replicas() < 1 {
            return Err(ConfigError::invalid("task.replicas must be at least 1"));
        }

        if let Some(public) = &self.public
            && public.domain.as_deref().is_none_or(|d| d.trim().is_empty())
        {
            return Err(ConfigError::invalid(
                "'public.domain' is required when 'public' is set",
            ));
        }
        let mode = self.exposure_mode()?;

        match self.platform {
            Platform::Fargate => {
                self.require_region()?;
                if self.task.cpu.is_none() {
                    return Err(ConfigError::invalid("'task.cpu' is required"));
                }
                if self.task.memory.is_none() {
                    return Err(ConfigError::invalid("'task.memory' is required"));
                }
                let storage = self
                    .task
                    .ephemeral_storage
                    .as_ref()
                    .ok_or_else(|| ConfigError::invalid("'task.ephemeral_storage' is required"))?;
                parse_ephemeral_storage(storage)?;
                if mode == Some(ExposureMode::Lightweight) && self.replicas() != 1 {
                    return Err(ConfigError::invalid(
                        "'lightweight' mode requires task.replicas to be 1",
                    ));
                }
            }
            Platform::StaticSite => {
                self.require_region()?;
                let folder = self.s3.as_ref().and_then(|s| s.folder.as_ref());
                if folder.is_none() {
                    return Err(ConfigError::invalid(
                        "'s3.folder' is required for platform 's3'",
                    ));
                }
                if let Some(name) = self.s3.as_ref().and_then(|s| s.bucket_name.as_deref()) {
                    validate_bucket_name(name).map_err(|reason| {
                        ConfigError::invalid(format!("s3.bucket_name '{}' {}", name, reason))
                    })?;
                }
            }
            Platform::Fly => {
                if self.public.is_some() {
                    return Err(ConfigError::invalid(
                        "platform 'fly' does not support public domains; remove the 'public' section",
                    ));
                }
            }
            Platform::Vercel => {}
        }

        Ok(())
    }

    fn environment_strings(&self) -> BTreeMap<String, String> {
        self.environment
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }

    fn iam_policies(&self) -> IamPolicySet {
        let mut set = IamPolicySet::with_defaults();
        if let Some(managed) = &self.iam_permissions {
            set.managed = managed.clone();
        }
        set.inline = self.custom_iam_policy.clone().map(|mut doc| {
            if let Some(object) = doc.as_object_mut() {
                object
                    .entry("Version")
                    .or_insert_with(|| serde_json::Value::String(POLICY_VERSION.to_string()));
            }
            doc
        });
        set
    }

    /// Resolve the AWS deployment intent.
    ///
    /// Relative paths (Dockerfile, static folder) are taken from `base_dir`.
    pub fn desired_state(&self, account_id: &str, base_dir: &Path) -> Result<DesiredState> {
        self.validate()?;
        let app_name = self.app_name()?.to_string();
        let region = match self.platform {
            Platform::Fargate | Platform::StaticSite => self.require_region()?.to_string(),
            Platform::Fly | Platform::Vercel => {
                return Err(ConfigError::invalid(format!(
                    "platform '{}' is not deployed through AWS",
                    self.platform
                )));
            }
        };

        let public = match (&self.public, self.exposure_mode()?) {
            (Some(section), Some(mode)) => Some(PublicExposure {
                domain: section.domain.clone().unwrap_or_default(),
                mode,
                certificate_id: section.certificate_id.clone(),
            }),
            _ => None,
        };

        let static_site = match (self.platform, &self.s3) {
            (Platform::StaticSite, Some(s3)) => {
                let folder = s3.folder.clone().unwrap_or_default();
                Some(StaticSite {
                    folder: resolve_path(base_dir, folder),
                    bucket_name: s3
                        .bucket_name
                        .clone()
                        .unwrap_or_else(|| default_bucket_name(&app_name)),
                })
            }
            _ => None,
        };

        let sizing = ComputeSizing {
            cpu: self
                .task
                .cpu
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_default(),
            memory: self
                .task
                .memory
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_default(),
            ephemeral_storage_gib: match &self.task.ephemeral_storage {
                Some(value) => parse_ephemeral_storage(value)?,
                None => 0,
            },
            replicas: u32::try_from(self.replicas()).unwrap_or(1),
            spot: self.task.spot.unwrap_or(true),
        };

        Ok(DesiredState {
            service_name: self
                .service_name
                .clone()
                .unwrap_or_else(|| format!("{}-service", app_name)),
            app_name,
            region,
            account_id: account_id.to_string(),
            platform: self.platform,
            sizing,
            port: self.task.port.unwrap_or(DEFAULT_PORT),
            health_check_path: self
                .health_check_path
                .clone()
                .unwrap_or_else(|| DEFAULT_HEALTH_CHECK_PATH.to_string()),
            image: ImageSource::Build {
                dockerfile: self
                    .dockerfile
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DOCKERFILE.to_string()),
                context: base_dir.to_path_buf(),
            },
            environment: self.environment_strings(),
            iam: self.iam_policies(),
            public,
            static_site,
            allow_create: self.allow_create,
        })
    }

    pub fn fly_settings(&self) -> Result<FlySettings> {
        self.validate()?;
        Ok(FlySettings {
            app_name: self.app_name()?.to_string(),
            replicas: u32::try_from(self.replicas()).unwrap_or(1),
            dockerfile: self
                .dockerfile
                .clone()
                .unwrap_or_else(|| DEFAULT_DOCKERFILE.to_string()),
        })
    }

    pub fn vercel_settings(&self) -> Result<VercelSettings> {
        self.validate()?;
        let app_name = self.app_name()?.to_string();
        let section = self.vercel.clone().unwrap_or_else(VercelSection::default);
        Ok(VercelSettings {
            project_name: section.project_name.unwrap_or_else(|| app_name.clone()),
            app_name,
            team: section.team,
            scope: section.scope,
            prod: section.prod,
            yes: section.yes,
            domain: self.public.as_ref().and_then(|p| p.domain.clone()),
            environment: self.environment_strings(),
        })
    }
}

fn resolve_path(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
