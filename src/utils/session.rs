use std::{cell::RefCell, collections::{BTreeMap, HashMap}, rc::Rc};
use dioxus::{logger::tracing::{info, warn}, prelude::*};
use uuid::Uuid;

use super::server::AppError;

const TOKEN_KEY: &str = "auth_token";
const DEVICE_ID_KEY: &str = "device_id";

/// Credentials attached to every outgoing request. Never mutated in place:
/// login and logout produce a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  token: Option<String>,
  device_id: String
}

impl Session {
  pub fn new(token: Option<String>, device_id: impl Into<String>) -> Self {
    Self { token: token.filter(|t| !t.is_empty()), device_id: device_id.into() }
  }

  pub fn token(&self) -> Option<&str> {
    self.token.as_deref()
  }

  pub fn device_id(&self) -> &str {
    &self.device_id
  }

  pub fn is_authenticated(&self) -> bool {
    self.token.is_some()
  }
}

pub trait KeyValueStore {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
  fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// `window.localStorage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

impl BrowserStorage {
  fn storage(&self) -> Result<web_sys::Storage, AppError> {
    let window = web_sys::window().ok_or_else(|| AppError::StorageError("global window unavailable".to_string()))?;
    window.local_storage()
      .map_err(|e| AppError::WasmError(format!("{:?}", e)))?
      .ok_or_else(|| AppError::StorageError("localStorage unavailable".to_string()))
  }
}

impl KeyValueStore for BrowserStorage {
  fn get(&self, key: &str) -> Option<String> {
    self.storage().ok()?.get_item(key).ok().flatten()
  }

  fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
    self.storage()?.set_item(key, value).map_err(|e| AppError::WasmError(format!("{:?}", e)))
  }

  fn remove(&self, key: &str) -> Result<(), AppError> {
    self.storage()?.remove_item(key).map_err(|e| AppError::WasmError(format!("{:?}", e)))
  }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
  items: RefCell<HashMap<String, String>>
}

impl KeyValueStore for MemoryStorage {
  fn get(&self, key: &str) -> Option<String> {
    self.items.borrow().get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
    self.items.borrow_mut().insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), AppError> {
    self.items.borrow_mut().remove(key);
    Ok(())
  }
}

/// Close hooks for everything that depends on the current session
/// (open event streams). Run all at once on logout.
#[derive(Clone, Default)]
pub struct TeardownRegistry {
  inner: Rc<RefCell<TeardownInner>>
}

#[derive(Default)]
struct TeardownInner {
  next_id: u64,
  hooks: BTreeMap<u64, Box<dyn FnOnce()>>
}

impl TeardownRegistry {
  pub fn register(&self, hook: impl FnOnce() + 'static) -> u64 {
    let mut inner = self.inner.borrow_mut();
    let id = inner.next_id;
    inner.next_id += 1;
    inner.hooks.insert(id, Box::new(hook));
    id
  }

  pub fn unregister(&self, id: u64) {
    self.inner.borrow_mut().hooks.remove(&id);
  }

  pub fn len(&self) -> usize {
    self.inner.borrow().hooks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Runs and clears every hook. Returns how many ran.
  pub fn teardown_all(&self) -> usize {
    // drained before running so hooks may call back into the registry
    let hooks = std::mem::take(&mut self.inner.borrow_mut().hooks);
    let count = hooks.len();
    for (_, hook) in hooks {
      hook();
    }
    count
  }
}

/// Owns the persisted token and device id. `login` and `logout` are the only
/// places the session changes.
pub struct SessionStore<S: KeyValueStore> {
  storage: Rc<S>,
  teardown: TeardownRegistry
}

impl<S: KeyValueStore> Clone for SessionStore<S> {
  fn clone(&self) -> Self {
    Self { storage: self.storage.clone(), teardown: self.teardown.clone() }
  }
}

pub type BrowserSessionStore = SessionStore<BrowserStorage>;

impl<S: KeyValueStore> SessionStore<S> {
  pub fn new(storage: S) -> Self {
    Self { storage: Rc::new(storage), teardown: TeardownRegistry::default() }
  }

  pub fn teardown(&self) -> &TeardownRegistry {
    &self.teardown
  }

  pub fn load(&self) -> Session {
    Session::new(self.storage.get(TOKEN_KEY), self.device_id())
  }

  pub fn login(&self, token: &str) -> Result<Session, AppError> {
    // streams opened under a previous identity must not survive the switch
    let closed = self.teardown.teardown_all();
    if closed > 0 {
      info!("closed {} streams from the previous session", closed);
    }
    self.storage.set(TOKEN_KEY, token)?;
    Ok(Session::new(Some(token.to_string()), self.device_id()))
  }

  pub fn logout(&self) -> Session {
    let closed = self.teardown.teardown_all();
    info!("logout: closed {} live streams", closed);
    if let Err(e) = self.storage.remove(TOKEN_KEY) {
      warn!("failed to clear stored token: {}", e);
    }
    Session::new(None, self.device_id())
  }

  fn device_id(&self) -> String {
    if let Some(id) = self.storage.get(DEVICE_ID_KEY).filter(|id| !id.is_empty()) {
      return id;
    }
    let id = Uuid::new_v4().to_string();
    if let Err(e) = self.storage.set(DEVICE_ID_KEY, &id) {
      warn!("device id could not be persisted: {}", e);
    }
    id
  }
}

/// Session signal plus its store, shared through context.
#[derive(Clone, Copy, PartialEq)]
pub struct Auth {
  pub session: Signal<Session>,
  store: Signal<BrowserSessionStore>
}

impl Auth {
  pub fn provide() -> Self {
    let store = use_context_provider(|| Signal::new(BrowserSessionStore::new(BrowserStorage)));
    let session = use_context_provider(|| Signal::new(store.peek().load()));
    use_context_provider(|| Auth { session, store })
  }

  pub fn login(&mut self, token: &str) -> Result<(), AppError> {
    let next = self.store.peek().login(token)?;
    self.session.set(next);
    Ok(())
  }

  pub fn logout(&mut self) {
    let next = self.store.peek().logout();
    self.session.set(next);
  }

  /// Passes a REST error through, ending the session first if the backend
  /// rejected the token. The layout's guard then redirects to login.
  pub fn intercept(&mut self, err: AppError) -> AppError {
    if err.is_unauthorized() && self.session.peek().is_authenticated() {
      warn!("backend rejected the session token, logging out");
      self.logout();
    }
    err
  }

  pub fn teardown(&self) -> TeardownRegistry {
    self.store.peek().teardown().clone()
  }
}

pub fn use_auth() -> Auth {
  use_context::<Auth>()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  #[test]
  fn device_id_is_generated_once() {
    let store = SessionStore::new(MemoryStorage::default());
    let first = store.load();
    let second = store.load();
    assert!(!first.device_id().is_empty());
    assert_eq!(first.device_id(), second.device_id());
    assert!(!first.is_authenticated());
  }

  #[test]
  fn login_persists_and_logout_clears() {
    let store = SessionStore::new(MemoryStorage::default());
    let session = store.login("tok-1").unwrap();
    assert_eq!(session.token(), Some("tok-1"));
    assert_eq!(store.load().token(), Some("tok-1"));

    let session = store.logout();
    assert!(session.token().is_none());
    assert!(store.load().token().is_none());
  }

  #[test]
  fn logout_closes_registered_streams() {
    let store = SessionStore::new(MemoryStorage::default());
    store.login("tok").unwrap();
    let closed = Rc::new(Cell::new(0));
    for _ in 0..3 {
      let closed = closed.clone();
      store.teardown().register(move || closed.set(closed.get() + 1));
    }
    let dropped = store.teardown().register(|| panic!("unregistered hook must not run"));
    store.teardown().unregister(dropped);

    store.logout();
    assert_eq!(closed.get(), 3);
    assert!(store.teardown().is_empty());
  }

  #[test]
  fn hooks_can_unregister_during_teardown() {
    let registry = TeardownRegistry::default();
    let reg = registry.clone();
    let id = Rc::new(Cell::new(0));
    let id_in_hook = id.clone();
    id.set(registry.register(move || reg.unregister(id_in_hook.get())));
    assert_eq!(registry.teardown_all(), 1);
  }

  #[test]
  fn empty_token_is_treated_as_absent() {
    let session = Session::new(Some(String::new()), "dev");
    assert!(!session.is_authenticated());
  }
}
