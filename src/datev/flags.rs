//! Lock flags of booking rows and the meta header.
//!
//! DATEV stores each lock as an optional `0`/`1` column. The concrete locks
//! are separate types sharing the [`BinaryFlag`] capability; [`LockFlag`]
//! tags them with the column they belong to.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// A tri-state column: empty, `0` or `1`.
pub trait BinaryFlag: Sized {
    /// Field key of the column holding the flag.
    const KEY: &'static str;

    fn from_state(state: Option<bool>) -> Self;

    fn state(&self) -> Option<bool>;

    fn is_none(&self) -> bool {
        self.state().is_none()
    }

    fn is_locked(&self) -> bool {
        self.state() == Some(true)
    }

    fn from_int(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::from_state(Some(false))),
            1 => Ok(Self::from_state(Some(true))),
            other => Err(Error::validation(Self::KEY, format!("flag value {} is neither 0 nor 1", other))),
        }
    }

    /// Parse the column text; empty means unset.
    fn from_field(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Self::from_state(None));
        }
        let number = value
            .parse::<u8>()
            .map_err(|_| Error::validation(Self::KEY, format!("'{}' is not a flag", value)))?;
        Self::from_int(number)
    }

    fn to_field(&self) -> &'static str {
        match self.state() {
            None => "",
            Some(false) => "0",
            Some(true) => "1",
        }
    }
}

/// Booking is fixed and may no longer be changed (`Festschreibung`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fixation(Option<bool>);

/// Open item is locked against dunning and payment (`Postensperre`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemLock(Option<bool>);

/// Item is excluded from interest calculation (`Zinssperre`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterestLock(Option<bool>);

macro_rules! binary_flag {
    ($flag:ident, $key:literal) => {
        impl BinaryFlag for $flag {
            const KEY: &'static str = $key;

            fn from_state(state: Option<bool>) -> Self {
                $flag(state)
            }

            fn state(&self) -> Option<bool> {
                self.0
            }
        }
    };
}

binary_flag!(Fixation, "fixation");
binary_flag!(ItemLock, "item_lock");
binary_flag!(InterestLock, "interest_lock");

/// Any lock flag, tagged by its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockFlag {
    Fixation(Fixation),
    ItemLock(ItemLock),
    InterestLock(InterestLock),
}

impl LockFlag {
    pub fn key(&self) -> &'static str {
        match self {
            LockFlag::Fixation(_) => Fixation::KEY,
            LockFlag::ItemLock(_) => ItemLock::KEY,
            LockFlag::InterestLock(_) => InterestLock::KEY,
        }
    }

    pub fn is_none(&self) -> bool {
        match self {
            LockFlag::Fixation(flag) => flag.is_none(),
            LockFlag::ItemLock(flag) => flag.is_none(),
            LockFlag::InterestLock(flag) => flag.is_none(),
        }
    }

    pub fn is_locked(&self) -> bool {
        match self {
            LockFlag::Fixation(flag) => flag.is_locked(),
            LockFlag::ItemLock(flag) => flag.is_locked(),
            LockFlag::InterestLock(flag) => flag.is_locked(),
        }
    }

    pub fn to_field(&self) -> &'static str {
        match self {
            LockFlag::Fixation(flag) => flag.to_field(),
            LockFlag::ItemLock(flag) => flag.to_field(),
            LockFlag::InterestLock(flag) => flag.to_field(),
        }
    }

    /// Parse the flag stored under `key`, if `key` is a lock column.
    pub fn parse(key: &str, value: &str) -> Result<Option<Self>> {
        Ok(match key {
            k if k == Fixation::KEY => Some(LockFlag::Fixation(Fixation::from_field(value)?)),
            k if k == ItemLock::KEY => Some(LockFlag::ItemLock(ItemLock::from_field(value)?)),
            k if k == InterestLock::KEY => Some(LockFlag::InterestLock(InterestLock::from_field(value)?)),
            _ => None,
        })
    }

    /// Store the flag in a row's value map. Unset flags leave the column empty.
    pub fn apply(&self, values: &mut HashMap<String, String>) {
        if self.is_none() {
            values.remove(self.key());
        } else {
            values.insert(self.key().to_string(), self.to_field().to_string());
        }
    }
}

impl From<Fixation> for LockFlag {
    fn from(flag: Fixation) -> Self {
        LockFlag::Fixation(flag)
    }
}

impl From<ItemLock> for LockFlag {
    fn from(flag: ItemLock) -> Self {
        LockFlag::ItemLock(flag)
    }
}

impl From<InterestLock> for LockFlag {
    fn from(flag: InterestLock) -> Self {
        LockFlag::InterestLock(flag)
    }
}
