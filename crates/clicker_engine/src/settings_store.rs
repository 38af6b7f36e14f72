use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use clicker_core::Settings;

use crate::lock;
use crate::persist::PersistError;

/// Reacts to settings changes. Called synchronously from within `save`, with
/// no suspension point between the write and the notification.
pub trait SettingsObserver: Send + Sync {
    fn settings_changed(&self, previous: &Settings, current: &Settings);
}

/// Read/write access to the persisted user settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    fn snapshot(&self) -> Settings;
    async fn save(&self, settings: Settings) -> Result<(), PersistError>;
    fn subscribe(&self, observer: Weak<dyn SettingsObserver>);
}

/// Observer list shared by settings store implementations. Observers are held
/// weakly so a store never keeps its subscribers alive.
#[derive(Default)]
pub struct SettingsObservers {
    observers: Mutex<Vec<Weak<dyn SettingsObserver>>>,
}

impl SettingsObservers {
    pub fn push(&self, observer: Weak<dyn SettingsObserver>) {
        lock(&self.observers).push(observer);
    }

    pub fn notify(&self, previous: &Settings, current: &Settings) {
        let live: Vec<Arc<dyn SettingsObserver>> = {
            let mut observers = lock(&self.observers);
            observers.retain(|observer| observer.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in live {
            observer.settings_changed(previous, current);
        }
    }
}

/// Settings held in memory only.
#[derive(Default)]
pub struct MemorySettingsStore {
    current: Mutex<Settings>,
    observers: SettingsObservers,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: Mutex::new(settings),
            observers: SettingsObservers::default(),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    fn snapshot(&self) -> Settings {
        lock(&self.current).clone()
    }

    async fn save(&self, settings: Settings) -> Result<(), PersistError> {
        let previous = std::mem::replace(&mut *lock(&self.current), settings.clone());
        self.observers.notify(&previous, &settings);
        Ok(())
    }

    fn subscribe(&self, observer: Weak<dyn SettingsObserver>) {
        self.observers.push(observer);
    }
}
