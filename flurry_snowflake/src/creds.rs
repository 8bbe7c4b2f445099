use std::collections::HashSet;
use std::fs;

use anyhow::{anyhow, bail, Context, Result};
use flurry_core::connection::CredentialsMap;
use serde::Deserialize;

/// Credentials for authenticating to Snowflake.
///
/// Key-pair authentication only. The key is given inline as PEM text or as
/// a path to a PEM file.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct SnowflakeCredentials {
    pub(crate) account: String,
    pub(crate) role: String,
    pub(crate) user: String,
    pub(crate) warehouse: String,
    pub(crate) private_key: String,
    pub(crate) public_key_fp: String,
    pub(crate) url: Option<String>,
}

impl SnowflakeCredentials {
    /// Build credentials from the connection file.
    pub(crate) fn from_map(credentials: &CredentialsMap) -> Result<Self> {
        let mut conn = SnowflakeCredentials::default();
        let mut required_fields: HashSet<_> = vec![
            "account",
            "role",
            "user",
            "warehouse",
            "private_key",
            "public_key_fp",
            // "url" defaults to the account URL
        ]
        .into_iter()
        .collect();

        for (k, v) in credentials.iter() {
            match k.as_ref() {
                "account" => conn.account = v.to_string(),
                "role" => conn.role = v.to_string(),
                "user" => conn.user = v.to_string(),
                "warehouse" => conn.warehouse = v.to_string(),
                "private_key" => conn.private_key = v.to_string(),
                "private_key_path" => {
                    conn.private_key = fs::read_to_string(v)
                        .with_context(|| format!("reading private key from {v}"))?;
                    required_fields.remove("private_key");
                }
                "public_key_fp" => conn.public_key_fp = v.to_string(),
                "url" => conn.url = Some(v.to_string()),
                _ => (),
            }

            required_fields.remove::<str>(k);
        }

        if !required_fields.is_empty() {
            let mut missing: Vec<_> = required_fields.into_iter().collect();
            missing.sort();
            bail!(
                "Snowflake connection missing required fields: {}",
                missing.join(", ")
            );
        }
        Ok(conn)
    }

    /// Perform simple field validation to catch bad input.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.account.is_empty()
            || self.role.is_empty()
            || self.user.is_empty()
            || self.warehouse.is_empty()
            || self.private_key.is_empty()
            || self.public_key_fp.is_empty()
        {
            return Err(anyhow!(
                "Credentials are missing. Please make sure your connection.yaml file is correct. Account: {:?}, user: {:?}",
                self.account,
                self.user
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn map(pairs: &[(&str, &str)]) -> CredentialsMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
    }

    #[test]
    fn complete_maps_load() {
        let creds = SnowflakeCredentials::from_map(&map(&[
            ("account", "acct"),
            ("role", "SECURITYADMIN"),
            ("user", "deployer"),
            ("warehouse", "ADMIN_WH"),
            ("private_key", "pem"),
            ("public_key_fp", "SHA256:abc"),
        ]))
        .unwrap();
        assert_eq!(creds.warehouse, "ADMIN_WH");
        assert!(creds.url.is_none());
        creds.validate().unwrap();
    }

    #[test]
    fn missing_fields_are_listed() {
        let err = SnowflakeCredentials::from_map(&map(&[("account", "acct")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Snowflake connection missing required fields: private_key, public_key_fp, role, user, warehouse"
        );
    }

    #[test]
    fn key_path_must_exist() {
        let err = SnowflakeCredentials::from_map(&map(&[(
            "private_key_path",
            "/nonexistent/rsa_key.p8",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rsa_key.p8"));
    }
}
