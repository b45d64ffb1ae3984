use crate::clock::Clock;
use crate::error::{Result, TagLockError};
use crate::store::{TagStore, Tags};
use chrono::{DateTime, TimeDelta, Utc};
use std::cell::{Cell, RefCell};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Clock that only moves when told to. `sleep` advances it instantly.
#[derive(Debug, Clone)]
pub(crate) struct FakeClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub(crate) fn at(start: &str) -> Self {
        Self {
            now: Arc::new(Mutex::new(ts(start))),
        }
    }

    pub(crate) fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::from_std(duration).unwrap();
    }

    pub(crate) fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

type WriteHook<'a, S> = Box<dyn FnOnce(&S) + 'a>;

/// Store wrapper that runs a hook right after the next write, modelling a
/// concurrent writer whose write lands between our write and our confirm-read.
pub(crate) struct RacingStore<'a, S> {
    inner: S,
    after_write: RefCell<Option<WriteHook<'a, S>>>,
}

impl<'a, S: TagStore> RacingStore<'a, S> {
    pub(crate) fn new<F>(inner: S, hook: F) -> Self
    where
        F: FnOnce(&S) + 'a,
    {
        Self {
            inner,
            after_write: RefCell::new(Some(Box::new(hook))),
        }
    }
}

impl<S: TagStore> TagStore for RacingStore<'_, S> {
    fn read(&self, resource_id: &str) -> Result<Tags> {
        self.inner.read(resource_id)
    }

    fn write(&self, resource_id: &str, key: &str, value: &str) -> Result<()> {
        self.inner.write(resource_id, key, value)?;
        let hook = self.after_write.borrow_mut().take();
        if let Some(hook) = hook {
            hook(&self.inner);
        }
        Ok(())
    }

    fn delete(&self, resource_id: &str, key: &str) -> Result<()> {
        self.inner.delete(resource_id, key)
    }
}

/// Store whose every call fails like an unreachable endpoint.
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    pub(crate) calls: Cell<usize>,
}

impl FailingStore {
    fn fail<T>(&self) -> Result<T> {
        self.calls.set(self.calls.get() + 1);
        Err(TagLockError::Store("connection refused".to_string()))
    }
}

impl TagStore for FailingStore {
    fn read(&self, _resource_id: &str) -> Result<Tags> {
        self.fail()
    }

    fn write(&self, _resource_id: &str, _key: &str, _value: &str) -> Result<()> {
        self.fail()
    }

    fn delete(&self, _resource_id: &str, _key: &str) -> Result<()> {
        self.fail()
    }
}
