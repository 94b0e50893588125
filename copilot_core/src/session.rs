//! Per-chat key/value session state.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const CHAT_PROFILE_KEY: &str = "chat_profile";
pub const THREAD_ID_KEY: &str = "thread_id";
pub const ASSISTANT_ID_KEY: &str = "assistant_id";
pub const CURRENT_RUN_STEP_KEY: &str = "current_run_step";

/// String-keyed slots scoped to one chat session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value);

    fn remove(&self, key: &str) -> Option<Value>;
}

/// Typed access on top of any [`SessionStore`].
pub trait SessionStoreExt: SessionStore {
    /// `None` when the slot is empty or holds a value of another shape.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<(), serde_json::Error> {
        self.set(key, serde_json::to_value(value)?);
        Ok(())
    }
}

impl<S: SessionStore + ?Sized> SessionStoreExt for S {}

#[derive(Debug, Default)]
pub struct InMemorySession {
    slots: RwLock<HashMap<String, Value>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

// A poisoned lock still holds consistent data: every write is a single insert.
impl SessionStore for InMemorySession {
    fn get(&self, key: &str) -> Option<Value> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<Value> {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::events::RunStep;
    use serde_json::json;

    #[test]
    fn test_slots() {
        let session = InMemorySession::new();
        assert_eq!(session.get(THREAD_ID_KEY), None);

        session.set(THREAD_ID_KEY, json!("thread_1"));
        assert_eq!(session.get_as::<String>(THREAD_ID_KEY).as_deref(), Some("thread_1"));
        assert_eq!(session.get_as::<u32>(THREAD_ID_KEY), None);

        assert_eq!(session.remove(THREAD_ID_KEY), Some(json!("thread_1")));
        assert_eq!(session.get(THREAD_ID_KEY), None);
    }

    #[test]
    fn test_typed_run_step() {
        let session = InMemorySession::new();
        let step = RunStep {
            id: "step_1".into(),
            run_id: "run_1".into(),
            thread_id: "thread_1".into(),
        };
        session.set_as(CURRENT_RUN_STEP_KEY, &step).unwrap();
        assert_eq!(session.get_as::<RunStep>(CURRENT_RUN_STEP_KEY), Some(step));
    }
}
