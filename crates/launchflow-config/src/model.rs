//! Deploy file schema

use launchflow_cloud::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// YAML scalar that may be written as a number, string or boolean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

fn default_platform() -> Platform {
    Platform::Fargate
}

fn yes() -> bool {
    true
}

/// Top-level deploy file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default = "default_platform")]
    pub platform: Platform,

    pub app_name: Option<String>,

    pub service_name: Option<String>,

    #[serde(default)]
    pub aws: AwsSection,

    #[serde(default)]
    pub task: TaskSection,

    pub health_check_path: Option<String>,

    pub dockerfile: Option<String>,

    #[serde(default)]
    pub allow_create: bool,

    #[serde(default)]
    pub environment: BTreeMap<String, Scalar>,

    /// Managed policy ARNs for the execution role
    pub iam_permissions: Option<Vec<String>>,

    /// Inline policy document
    pub custom_iam_policy: Option<serde_json::Value>,

    pub public: Option<PublicSection>,

    pub s3: Option<S3Section>,

    pub fly: Option<FlySection>,

    pub vercel: Option<VercelSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsSection {
    pub region: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSection {
    pub cpu: Option<Scalar>,
    pub memory: Option<Scalar>,
    /// GiB, either `21` or `"21gb"`
    pub ephemeral_storage: Option<Scalar>,
    pub replicas: Option<i64>,
    pub spot: Option<bool>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicSection {
    pub domain: Option<String>,
    /// `lightweight` or `production`
    pub mode: Option<String>,
    pub certificate_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Section {
    pub folder: Option<PathBuf>,
    pub bucket_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlySection {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VercelSection {
    pub project_name: Option<String>,
    pub team: Option<String>,
    pub scope: Option<String>,
    #[serde(default = "yes")]
    pub prod: bool,
    #[serde(default)]
    pub yes: bool,
}

impl Default for VercelSection {
    fn default() -> Self {
        Self {
            project_name: None,
            team: None,
            scope: None,
            prod: true,
            yes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_fargate_file() {
        let yaml = r#"
platform: fargate
app_name: shop
aws:
  region: eu-west-1
task:
  cpu: 512
  memory: "1024"
  ephemeral_storage: 21gb
  replicas: 2
  spot: false
environment:
  LOG_LEVEL: info
  WORKERS: 4
public:
  domain: shop.example.com
  mode: production
"#;
        let config: DeployConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.platform, Platform::Fargate);
        assert_eq!(config.task.cpu, Some(Scalar::Int(512)));
        assert_eq!(config.task.memory, Some(Scalar::from("1024")));
        assert_eq!(config.task.ephemeral_storage, Some(Scalar::from("21gb")));
        assert_eq!(config.environment["WORKERS"].to_string(), "4");
        assert_eq!(
            config.public.unwrap().mode.as_deref(),
            Some("production")
        );
    }

    #[test]
    fn test_platform_defaults_to_fargate() {
        let config: DeployConfig = serde_yaml::from_str("app_name: x").unwrap();
        assert_eq!(config.platform, Platform::Fargate);
        assert!(!config.allow_create);
    }

    #[test]
    fn test_s3_platform_keyword() {
        let config: DeployConfig =
            serde_yaml::from_str("platform: s3\napp_name: docs\ns3:\n  folder: ./dist\n").unwrap();
        assert_eq!(config.platform, Platform::StaticSite);
        assert_eq!(config.s3.unwrap().folder, Some(PathBuf::from("./dist")));
    }

    #[test]
    fn test_vercel_defaults() {
        let config: DeployConfig =
            serde_yaml::from_str("platform: vercel\napp_name: web\nvercel: {}\n").unwrap();
        let vercel = config.vercel.unwrap();
        assert!(vercel.prod);
        assert!(!vercel.yes);
    }
}
