use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context as _, Result};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Denial returned by [`Acl::authorize`]; its message is sent to the client.
#[derive(Debug, thiserror::Error)]
#[error("{subject} not permitted to {action} to {object}")]
pub struct Unauthorized {
    pub subject: String,
    pub object: String,
    pub action: String,
}

/// Subject-based access control: each subject maps to the set of
/// `(object, action)` pairs it is allowed. The `*` object in a policy row
/// matches any object.
#[derive(Debug, Default)]
pub struct Acl {
    policies: HashMap<String, HashSet<(String, String)>>,
}

impl Acl {
    /// Load policies from a CSV file of `p, subject, object, action` rows.
    /// Blank lines and `#` comments are skipped.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .await
            .with_context(|| format!("cannot open policy file {path:?}"))?;

        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut acl = Acl::default();
        let mut line_no = 0;

        loop {
            line.clear();

            let n = reader
                .read_line(&mut line)
                .await
                .context("reading policy line")?;

            if n == 0 {
                break Ok(acl);
            }
            line_no += 1;

            let row = line.trim();
            if row.is_empty() || row.starts_with('#') {
                continue;
            }

            let mut fields = row.split(',').map(str::trim);
            match (
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
            ) {
                (Some("p"), Some(subject), Some(object), Some(action), None) => {
                    acl.allow(subject, object, action);
                }
                _ => bail!("invalid policy row {line_no} in {path:?}: {row:?}"),
            }
        }
    }

    pub fn allow(&mut self, subject: &str, object: &str, action: &str) {
        self.policies
            .entry(subject.to_string())
            .or_default()
            .insert((object.to_string(), action.to_string()));
    }

    pub fn authorize(&self, subject: &str, object: &str, action: &str) -> Result<(), Unauthorized> {
        let denied = || Unauthorized {
            subject: subject.to_string(),
            object: object.to_string(),
            action: action.to_string(),
        };

        let Some(permissions) = self.policies.get(subject) else {
            return Err(denied());
        };

        let allowed = permissions.contains(&(object.to_string(), action.to_string()))
            || permissions.contains(&("*".to_string(), action.to_string()));

        if allowed {
            Ok(())
        } else {
            Err(denied())
        }
    }
}
