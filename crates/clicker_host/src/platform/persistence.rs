use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, Weak};

use async_trait::async_trait;
use clicker_core::Settings;
use clicker_engine::{
    AtomicFileWriter, EngineConfig, PersistError, SettingsObserver, SettingsObservers,
    SettingsStore,
};
use clicker_logging::{clicker_info, clicker_warn};

pub const CONFIG_FILENAME: &str = "clicker_host.ron";
const SETTINGS_FILENAME: &str = "settings.ron";

/// Engine configuration from `clicker_host.ron` in `dir`. A missing file
/// means defaults; an unreadable one is logged and also means defaults.
pub(crate) fn load_engine_config(dir: &Path) -> EngineConfig {
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    let content = match writer.read(CONFIG_FILENAME) {
        Ok(Some(text)) => text,
        Ok(None) => return EngineConfig::default(),
        Err(err) => {
            clicker_warn!("Failed to read {:?}: {}", dir.join(CONFIG_FILENAME), err);
            return EngineConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            clicker_info!("Loaded engine configuration from {:?}", dir);
            config
        }
        Err(err) => {
            clicker_warn!("Failed to parse {:?}: {}", dir.join(CONFIG_FILENAME), err);
            EngineConfig::default()
        }
    }
}

/// User settings in a RON file, rewritten atomically on every save.
pub struct FileSettingsStore {
    writer: AtomicFileWriter,
    current: Mutex<Settings>,
    observers: SettingsObservers,
}

impl FileSettingsStore {
    pub fn open(dir: PathBuf) -> Self {
        let writer = AtomicFileWriter::new(dir);
        let current = load_settings(&writer);
        Self {
            writer,
            current: Mutex::new(current),
            observers: SettingsObservers::default(),
        }
    }
}

fn load_settings(writer: &AtomicFileWriter) -> Settings {
    let content = match writer.read(SETTINGS_FILENAME) {
        Ok(Some(text)) => text,
        Ok(None) => return Settings::default(),
        Err(err) => {
            clicker_warn!("Failed to read settings from {:?}: {}", writer.dir(), err);
            return Settings::default();
        }
    };
    ron::from_str(&content).unwrap_or_else(|err| {
        clicker_warn!("Failed to parse settings from {:?}: {}", writer.dir(), err);
        Settings::default()
    })
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    fn snapshot(&self) -> Settings {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn save(&self, settings: Settings) -> Result<(), PersistError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(&settings, pretty)
            .map_err(|err| PersistError::Serialize(err.to_string()))?;
        self.writer.write(SETTINGS_FILENAME, &content)?;

        let previous = std::mem::replace(
            &mut *self.current.lock().unwrap_or_else(PoisonError::into_inner),
            settings.clone(),
        );
        clicker_info!("Saved settings (tier {})", settings.tier.as_str());
        self.observers.notify(&previous, &settings);
        Ok(())
    }

    fn subscribe(&self, observer: Weak<dyn SettingsObserver>) {
        self.observers.push(observer);
    }
}
