use crate::common::*;

pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";

#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: Box<str>,
    pub secret_access_key: Box<str>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

/// Anything that can hand out an access key pair
pub trait CredentialSource {
    fn credentials(&self) -> anyhow::Result<AwsCredentials>;
}

/// Read the key pair from environment variables
#[derive(Clone, Debug)]
pub struct EnvCredentials {
    pub id_var: Box<str>,
    pub secret_var: Box<str>,
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self {
            id_var: ACCESS_KEY_ID_VAR.into(),
            secret_var: SECRET_ACCESS_KEY_VAR.into(),
        }
    }
}

fn read_var(name: &str) -> anyhow::Result<Box<str>> {
    let value = std::env::var(name)
        .with_context(|| format!("environment variable {} is not set", name))?;
    anyhow::ensure!(!value.is_empty(), "environment variable {} is empty", name);
    Ok(value.into_boxed_str())
}

impl CredentialSource for EnvCredentials {
    fn credentials(&self) -> anyhow::Result<AwsCredentials> {
        Ok(AwsCredentials {
            access_key_id: read_var(&self.id_var)?,
            secret_access_key: read_var(&self.secret_var)?,
        })
    }
}

/// Fixed key pair
#[cfg(test)]
#[derive(Clone, Debug)]
pub struct StaticCredentials(pub AwsCredentials);

#[cfg(test)]
impl StaticCredentials {
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Self {
        Self(AwsCredentials {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        })
    }
}

#[cfg(test)]
impl CredentialSource for StaticCredentials {
    fn credentials(&self) -> anyhow::Result<AwsCredentials> {
        Ok(self.0.clone())
    }
}
