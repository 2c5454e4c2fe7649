//! Host catalog: the YAML file listing remote hosts.
//!
//! Provides:
//! - Catalog file discovery and loading
//! - Per-host credential resolution (host key/password, else the global one)
//! - Sorting, group filtering and pagination ([`Browser`])
//! - The host summary table ([`render_screen`])

mod browser;
mod summary;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::{
    CONFIG_ENV_VAR, CONFIG_FILE_NAME, DEFAULT_GROUP, DEFAULT_SSH_PORT, MIN_PAGE_SIZE,
};
use crate::target::{AuthMethod, ConnectionTarget, TermSize};
use crate::{Error, Result};

pub use browser::Browser;
pub use summary::{render_screen, summary_lines};

/// On-disk catalog layout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CatalogFile {
    page_size: usize,
    sort_by: String,
    auto_clear: bool,
    private_key: String,
    password: String,
    servers: Vec<HostRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HostRecord {
    name: String,
    user: String,
    host: String,
    port: u16,
    private_key: String,
    password: String,
    desc: String,
    group: String,
}

/// Host list ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// By group, then name.
    Name,
    /// By group, then host.
    Host,
    /// By group only, otherwise file order.
    #[default]
    Group,
    /// File order.
    Unsorted,
}

impl SortBy {
    pub fn from_config(value: &str) -> Self {
        match value {
            "name" => SortBy::Name,
            "host" => SortBy::Host,
            "disable" | "" => SortBy::Group,
            other => {
                warn!(sort_by = other, "unknown sortBy value, keeping file order");
                SortBy::Unsorted
            }
        }
    }
}

/// One resolved catalog host.
#[derive(Debug, Clone)]
pub struct HostEntry {
    pub name: String,
    pub user: String,
    pub host: String,
    pub port: u16,
    pub desc: String,
    pub group: String,
    auth: Option<AuthMethod>,
}

impl HostEntry {
    pub fn auth(&self) -> Option<&AuthMethod> {
        self.auth.as_ref()
    }

    /// Build the bridge's connection target for this host.
    ///
    /// `size` is the fallback used when the live terminal size is unknown.
    pub fn to_target(&self, term_type: &str, size: TermSize) -> ConnectionTarget {
        let target = ConnectionTarget::new(&self.host, self.port, &self.user)
            .with_term_type(term_type)
            .with_size(size);
        match &self.auth {
            Some(auth) => target.with_auth(auth.clone()),
            None => target,
        }
    }

    /// Name shown in messages; falls back to the host when unnamed.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.host
        } else {
            &self.name
        }
    }
}

/// A loaded host catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub page_size: usize,
    pub sort_by: SortBy,
    pub auto_clear: bool,
    hosts: Vec<HostEntry>,
}

impl Catalog {
    /// Locate and load the catalog.
    ///
    /// Order: `explicit`, `$HOP_CONFIG_FILE`, `~/.hop.yaml`, `./.hop.yaml`.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let path = locate(
            explicit,
            std::env::var(CONFIG_ENV_VAR).ok(),
            dirs::home_dir(),
        );
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading host catalog");
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Parse and resolve catalog text.
    pub fn parse(text: &str) -> Result<Self> {
        let file: CatalogFile = if text.trim().is_empty() {
            CatalogFile::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| Error::config(e.to_string()))?
        };

        let global_auth = resolve_auth(&file.private_key, &file.password)?;
        let mut hosts = file
            .servers
            .into_iter()
            .map(|record| resolve_host(record, global_auth.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let sort_by = SortBy::from_config(&file.sort_by);
        sort_hosts(&mut hosts, sort_by);

        Ok(Self {
            page_size: file.page_size.max(MIN_PAGE_SIZE),
            sort_by,
            auto_clear: file.auto_clear,
            hosts,
        })
    }

    pub fn hosts(&self) -> &[HostEntry] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Pick the catalog path from the explicit flag, the environment, and the
/// home and current directories.
pub fn locate(explicit: Option<&Path>, env_value: Option<String>, home: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return PathBuf::from(value);
    }
    if let Some(home) = home {
        let candidate = home.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return candidate;
        }
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

fn resolve_host(record: HostRecord, global_auth: Option<&AuthMethod>) -> Result<HostEntry> {
    if record.host.is_empty() {
        return Err(Error::config("the server host can not be empty"));
    }

    let auth = if record.private_key.is_empty() && record.password.is_empty() {
        global_auth.cloned()
    } else {
        resolve_auth(&record.private_key, &record.password)?
    };

    Ok(HostEntry {
        name: record.name,
        user: if record.user.is_empty() {
            default_user()
        } else {
            record.user
        },
        host: record.host,
        port: if record.port == 0 {
            DEFAULT_SSH_PORT
        } else {
            record.port
        },
        desc: record.desc,
        group: if record.group.is_empty() {
            DEFAULT_GROUP.to_string()
        } else {
            record.group
        },
        auth,
    })
}

/// A key path wins over a password; neither means no credential.
fn resolve_auth(private_key: &str, password: &str) -> Result<Option<AuthMethod>> {
    if !private_key.is_empty() {
        let path = expand_home(private_key);
        return AuthMethod::from_key_file(&path).map(Some);
    }
    if !password.is_empty() {
        return Ok(Some(AuthMethod::Password(password.to_string())));
    }
    Ok(None)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

fn default_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

fn sort_hosts(hosts: &mut [HostEntry], sort_by: SortBy) {
    match sort_by {
        SortBy::Name => hosts.sort_by(|a, b| (&a.group, &a.name).cmp(&(&b.group, &b.name))),
        SortBy::Host => hosts.sort_by(|a, b| (&a.group, &a.host).cmp(&(&b.group, &b.host))),
        SortBy::Group => hosts.sort_by(|a, b| a.group.cmp(&b.group)),
        SortBy::Unsorted => {}
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
pageSize: 2
sortBy: name
password: global-secret
servers:
  - name: web
    host: 10.0.0.2
    user: deploy
    group: prod
  - name: api
    host: 10.0.0.1
    port: 2222
    password: api-secret
    group: prod
  - name: box
    host: dev.local
"#;

    #[test]
    fn parse_resolves_defaults() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.page_size, MIN_PAGE_SIZE);
        assert_eq!(catalog.len(), 3);

        let dev = &catalog.hosts()[0];
        assert_eq!(dev.name, "box");
        assert_eq!(dev.port, 22);
        assert_eq!(dev.group, "default");
        assert!(!dev.user.is_empty());
    }

    #[test]
    fn sort_by_name_groups_first() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        let names: Vec<_> = catalog.hosts().iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["box", "api", "web"]);
    }

    #[test]
    fn sort_by_host() {
        let text = SAMPLE.replace("sortBy: name", "sortBy: host");
        let catalog = Catalog::parse(&text).unwrap();
        let hosts: Vec<_> = catalog.hosts().iter().map(|h| h.host.as_str()).collect();
        assert_eq!(hosts, ["dev.local", "10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn hosts_inherit_global_password() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        let web = catalog.hosts().iter().find(|h| h.name == "web").unwrap();
        match web.auth() {
            Some(AuthMethod::Password(p)) => assert_eq!(p, "global-secret"),
            other => panic!("unexpected auth: {:?}", other),
        }

        let api = catalog.hosts().iter().find(|h| h.name == "api").unwrap();
        match api.auth() {
            Some(AuthMethod::Password(p)) => assert_eq!(p, "api-secret"),
            other => panic!("unexpected auth: {:?}", other),
        }
    }

    #[test]
    fn no_credentials_anywhere_leaves_auth_empty() {
        let catalog = Catalog::parse("servers:\n  - host: a.example\n").unwrap();
        assert!(catalog.hosts()[0].auth().is_none());
    }

    #[test]
    fn empty_host_is_rejected() {
        let err = Catalog::parse("servers:\n  - name: nothing\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn unreadable_key_is_a_load_error() {
        let text = "servers:\n  - host: a\n    privateKey: /nonexistent/hop/id_ed25519\n";
        let err = Catalog::parse(text).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn empty_file_is_an_empty_catalog() {
        let catalog = Catalog::parse("").unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.page_size, MIN_PAGE_SIZE);
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = Catalog::parse("servers: [unterminated").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn target_carries_host_and_term() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        let api = catalog.hosts().iter().find(|h| h.name == "api").unwrap();
        let target = api.to_target("vt220", TermSize::default());
        assert_eq!(target.address(), "10.0.0.1:2222");
        assert_eq!(target.term_type(), "vt220");
        assert!(target.validate_auth().is_ok());
    }

    #[test]
    fn sort_by_unknown_keeps_file_order() {
        assert_eq!(SortBy::from_config("color"), SortBy::Unsorted);
        assert_eq!(SortBy::from_config("disable"), SortBy::Group);
        assert_eq!(SortBy::from_config(""), SortBy::Group);
    }

    #[test]
    fn locate_prefers_explicit_then_env() {
        let explicit = Path::new("/etc/hop.yaml");
        assert_eq!(
            locate(Some(explicit), Some("/env.yaml".into()), None),
            PathBuf::from("/etc/hop.yaml")
        );
        assert_eq!(
            locate(None, Some("/env.yaml".into()), None),
            PathBuf::from("/env.yaml")
        );
    }

    #[test]
    fn locate_uses_home_file_when_present() {
        let home = tempfile::tempdir().unwrap();
        assert_eq!(
            locate(None, None, Some(home.path().to_path_buf())),
            PathBuf::from(CONFIG_FILE_NAME)
        );

        std::fs::write(home.path().join(CONFIG_FILE_NAME), "servers: []\n").unwrap();
        assert_eq!(
            locate(None, Some(String::new()), Some(home.path().to_path_buf())),
            home.path().join(CONFIG_FILE_NAME)
        );
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(Catalog::load(&path).unwrap().len(), 3);

        let missing = Catalog::load(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, Error::Config { .. }));
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/tmp/key"), PathBuf::from("/tmp/key"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.ssh/id"), home.join(".ssh/id"));
        }
    }
}
