use std::marker::PhantomData;
use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StateResult;
use crate::state::State;
use crate::store::{Store, StoreOptions};
use crate::value::Value;

/// A typed wrapper over [`Store`] for any `serde`-representable data.
///
/// This should serve most needs for storing data: the type is bridged
/// through the canonical value form on the way in and out, so listeners,
/// dirty tracking and caching all behave exactly as they do for a plain
/// store. Dereferences to [`Store`] for handler registration and
/// execution.
///
/// # Examples
///
/// ```
/// use canister::{GenericDataStore, StoreOptions};
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Config {
///     retries: u32,
/// }
///
/// let store: GenericDataStore<Config> = GenericDataStore::new(StoreOptions::new("config"));
/// store.set_data(&Config { retries: 3 }).unwrap();
/// assert_eq!(store.data().unwrap().retries, 3);
/// ```
pub struct GenericDataStore<T> {
    store: Store,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> GenericDataStore<T> {
    /// Create a standalone typed store.
    pub fn new(options: StoreOptions) -> Self {
        Self::from_store(Store::new(options))
    }

    /// Create a typed store and add it to the given state registry, which
    /// also binds any unbound handlers waiting for this name.
    ///
    /// # Errors
    ///
    /// [`StateError::DuplicateStore`] if the name is already registered.
    ///
    /// [`StateError::DuplicateStore`]: crate::StateError::DuplicateStore
    pub fn create_store(state: &State, options: StoreOptions) -> StateResult<Self> {
        state.create_store(options).map(Self::from_store)
    }

    /// Wrap an existing store handle with a typed view.
    pub fn from_store(store: Store) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// The current data, bridged back into `T`.
    ///
    /// # Errors
    ///
    /// [`StateError::InvalidData`] if the stored value does not match the
    /// shape of `T` (for example before any data has been stored).
    ///
    /// [`StateError::InvalidData`]: crate::StateError::InvalidData
    pub fn data(&self) -> StateResult<T> {
        self.store.data().to_typed()
    }

    /// Replace the store data with a typed value.
    pub fn set_data(&self, data: &T) -> StateResult<()> {
        self.store.set_data(Value::from_serialize(data)?);
        Ok(())
    }

    /// The untyped store handle.
    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl<T> Deref for GenericDataStore<T> {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

impl<T> Clone for GenericDataStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}
