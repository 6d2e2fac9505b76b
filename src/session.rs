//! Which display this client is.
//!
//! The chosen display id is remembered locally across runs. A remembered id
//! that no longer resolves is forgotten silently so the operator is simply
//! asked to pick again.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::{DisplayProfile, Settings};
use crate::error::BoardError;
use crate::models::Display;
use crate::store::BackingStore;
use crate::utils::fuzzy::find_near_display_matches;

/// Local persistence of the active display id
pub trait IdentityStore: Send + Sync {
    fn get(&self) -> Result<Option<i64>>;
    fn set(&self, display_id: i64) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

/// Identity kept in a one-line file (`~/.kboard/display` by default)
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> PathBuf {
        Settings::config_dir().join("display")
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Default for FileIdentityStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl IdentityStore for FileIdentityStore {
    fn get(&self) -> Result<Option<i64>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read display identity: {}", self.path.display()))?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let id = trimmed
            .parse::<i64>()
            .with_context(|| format!("Corrupt display identity '{}' in {}", trimmed, self.path.display()))?;
        Ok(Some(id))
    }

    fn set(&self, display_id: i64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&self.path, format!("{}\n", display_id))
            .with_context(|| format!("Failed to write display identity: {}", self.path.display()))
    }

    fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove display identity: {}", self.path.display())),
        }
    }
}

/// In-process identity, for tests and embedding
#[derive(Default)]
pub struct MemoryIdentityStore {
    id: Mutex<Option<i64>>,
}

impl MemoryIdentityStore {
    pub fn with_id(display_id: i64) -> Self {
        Self { id: Mutex::new(Some(display_id)) }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self) -> Result<Option<i64>> {
        Ok(*self.id.lock().unwrap_or_else(|err| err.into_inner()))
    }

    fn set(&self, display_id: i64) -> Result<()> {
        *self.id.lock().unwrap_or_else(|err| err.into_inner()) = Some(display_id);
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.id.lock().unwrap_or_else(|err| err.into_inner()) = None;
        Ok(())
    }
}

pub struct DisplaySession {
    store: Arc<dyn BackingStore>,
    identity: Box<dyn IdentityStore>,
    settings: Settings,
}

impl DisplaySession {
    pub fn new(store: Arc<dyn BackingStore>, identity: Box<dyn IdentityStore>, settings: Settings) -> Self {
        Self { store, identity, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn list_displays(&self) -> Result<Vec<Display>> {
        self.store.list_displays().context("Failed to list displays")
    }

    /// Make `display_id` the active display and remember it
    pub fn select(&self, display_id: i64) -> Result<DisplayProfile> {
        let display = self
            .store
            .get_display(display_id)
            .context("Failed to load display")?
            .ok_or(BoardError::UnknownDisplay(display_id))?;
        self.identity.set(display.id)?;
        log::info!("Selected display {} ({})", display.id, display.name);
        Ok(self.settings.resolve_for(&display))
    }

    pub fn forget(&self) -> Result<()> {
        self.identity.remove()?;
        log::info!("Display identity forgotten");
        Ok(())
    }

    /// Profile of the remembered display, if it still exists.
    ///
    /// A stale or unreadable identity is removed and `None` returned.
    pub fn restore(&self) -> Result<Option<DisplayProfile>> {
        let display_id = match self.identity.get() {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::warn!("Discarding display identity: {:#}", e);
                self.identity.remove()?;
                return Ok(None);
            }
        };

        match self.store.get_display(display_id).context("Failed to load display")? {
            Some(display) => Ok(Some(self.settings.resolve_for(&display))),
            None => {
                log::warn!("Remembered display {} no longer exists", display_id);
                self.identity.remove()?;
                Ok(None)
            }
        }
    }

    /// The restored profile, or `NoActiveDisplay`
    pub fn require(&self) -> Result<DisplayProfile> {
        self.restore()?.ok_or_else(|| BoardError::NoActiveDisplay.into())
    }

    /// Resolve an id or a (case-insensitive) display name
    pub fn lookup(&self, target: &str) -> Result<Option<Display>> {
        if let Ok(id) = target.parse::<i64>() {
            return self.store.get_display(id).context("Failed to load display");
        }
        let wanted = target.to_lowercase();
        Ok(self
            .list_displays()?
            .into_iter()
            .find(|d| d.name.to_lowercase() == wanted))
    }

    /// Display names close to `target`, for "did you mean" hints
    pub fn suggest(&self, target: &str) -> Result<Vec<(i64, String)>> {
        let names: Vec<(i64, String)> = self
            .list_displays()?
            .into_iter()
            .map(|d| (d.id, d.name))
            .collect();
        Ok(find_near_display_matches(target, &names, 3))
    }
}
