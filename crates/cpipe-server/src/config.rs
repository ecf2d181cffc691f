//! config.rs: configuration du serveur (`cpipe.toml`, optionnel)
//!
//! Ordre de priorité : drapeaux / variables `CPIPE_*` > fichier > défauts.
//! Sans `--config`, le fichier est cherché du répertoire courant vers la racine.
//!
//! ```toml
//! bind = "127.0.0.1:8080"
//! data_dir = "tmp"
//! static_dir = "public"
//! seed = 42
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Nom du fichier cherché.
pub const CONFIG_FILE: &str = "cpipe.toml";

/// Configuration effective.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Adresse d'écoute.
    #[serde(default = "d_bind")]
    pub bind: SocketAddr,
    /// Racine des sessions sur disque ; absent = stockage en mémoire.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Frontal statique servi en repli.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
    /// Graine des durées simulées.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn d_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: d_bind(), data_dir: None, static_dir: None, seed: None }
    }
}

impl ServerConfig {
    /// Analyse un document TOML.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid TOML configuration")
    }

    /// Charge `explicit`, sinon le premier `cpipe.toml` trouvé en remontant
    /// depuis `start`, sinon les défauts.
    pub fn load(explicit: Option<&Path>, start: &Path) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::read(p);
        }
        match find_upward(start) {
            Some(p) => Self::read(&p),
            None => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let cfg = Self::from_toml(&text).with_context(|| format!("in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(cfg)
    }

    /// Applique les surcharges venues de la ligne de commande / de l'environnement.
    #[must_use]
    pub fn with_overrides(mut self, o: Overrides) -> Self {
        if let Some(b) = o.bind {
            self.bind = b;
        }
        if o.data_dir.is_some() {
            self.data_dir = o.data_dir;
        }
        if o.static_dir.is_some() {
            self.static_dir = o.static_dir;
        }
        if o.seed.is_some() {
            self.seed = o.seed;
        }
        self
    }
}

/// Valeurs fournies par `clap` (drapeaux ou `CPIPE_*`).
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub struct Overrides {
    pub bind: Option<SocketAddr>,
    pub data_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// Premier `cpipe.toml` de `start` ou d'un de ses parents.
pub fn find_upward(start: &Path) -> Option<PathBuf> {
    start.ancestors().map(|d| d.join(CONFIG_FILE)).find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_fill_missing_keys() {
        let cfg = ServerConfig::from_toml("seed = 7\n").unwrap();
        assert_eq!(cfg.bind, d_bind());
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.data_dir, None);
        assert!(ServerConfig::from_toml("port = 1\n").is_err());
    }

    #[test]
    fn upward_search_and_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "bind = \"0.0.0.0:9000\"\ndata_dir = \"tmp\"\n").unwrap();

        let cfg = ServerConfig::load(None, &nested).unwrap();
        assert_eq!(cfg.bind.port(), 9000);
        assert_eq!(cfg.data_dir.as_deref(), Some(Path::new("tmp")));

        let cfg = cfg.with_overrides(Overrides { seed: Some(1), bind: Some(d_bind()), ..Overrides::default() });
        assert_eq!(cfg.bind, d_bind());
        assert_eq!(cfg.seed, Some(1));
        assert_eq!(cfg.data_dir.as_deref(), Some(Path::new("tmp")));
    }

    #[test]
    fn explicit_path_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ServerConfig::load(Some(&tmp.path().join("nope.toml")), tmp.path()).is_err());
    }
}
