//! Deferred - 1 回だけ解決される結果スロット
//!
//! # 不変条件
//! - 一度 ready になった値は変わらない（2 回目の `ready` は無視して warn）
//! - ready 前に登録した callback は ready の瞬間に 1 回だけ呼ばれる
//! - ready 後に登録した callback はその場で同期的に呼ばれる
//!
//! シングルスレッド前提（`Rc` / `RefCell`）。callback は RefCell の
//! 借用を外してから呼ぶので、callback の中から同じ Deferred に触れても
//! panic しません。

use std::cell::RefCell;
use std::fmt;

use tracing::warn;

type Callback<T> = Box<dyn FnOnce(T)>;

struct Slot<T> {
    result: Option<T>,
    callback: Option<Callback<T>>,
}

pub struct Deferred<T> {
    slot: RefCell<Slot<T>>,
}

impl<T: Clone + 'static> Deferred<T> {
    pub fn new() -> Self {
        Self {
            slot: RefCell::new(Slot {
                result: None,
                callback: None,
            }),
        }
    }

    pub fn with_callback(callback: impl FnOnce(T) + 'static) -> Self {
        let deferred = Self::new();
        deferred.slot.borrow_mut().callback = Some(Box::new(callback));
        deferred
    }

    /// 値を格納し、登録済みの callback があれば呼ぶ
    pub fn ready(&self, value: T) {
        let callback = {
            let mut slot = self.slot.borrow_mut();
            if slot.result.is_some() {
                warn!("deferred already resolved; ignoring second value");
                return;
            }
            slot.result = Some(value.clone());
            slot.callback.take()
        };
        if let Some(callback) = callback {
            callback(value);
        }
    }

    /// callback を差し替える。解決済みならその場で呼ぶ
    pub fn register(&self, callback: impl FnOnce(T) + 'static) {
        let value = {
            let mut slot = self.slot.borrow_mut();
            match slot.result.clone() {
                Some(value) => value,
                None => {
                    slot.callback = Some(Box::new(callback));
                    return;
                }
            }
        };
        callback(value);
    }

    /// callback が登録されているか（未解決のときのみ意味がある）
    pub fn has_callback(&self) -> bool {
        self.slot.borrow().callback.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.slot.borrow().result.is_some()
    }

    pub fn result(&self) -> Option<T> {
        self.slot.borrow().result.clone()
    }
}

impl<T: Clone + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Deferred")
            .field("ready", &slot.result.is_some())
            .field("has_callback", &slot.callback.is_some())
            .finish()
    }
}
