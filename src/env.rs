//! Global parameters that can be overridden from environment variables.
//!
//! A parameter is read once, on first access; later changes to the
//! environment are ignored.

use once_cell::sync::OnceCell;
use std::str::FromStr;

pub struct EnvParam<T> {
    value: OnceCell<T>,
    env: &'static str,
    default: &'static str,
}

impl<T> EnvParam<T> {
    pub const fn new(env: &'static str, default: &'static str) -> EnvParam<T> {
        EnvParam {
            value: OnceCell::new(),
            env,
            default,
        }
    }
}

impl<T: FromStr> EnvParam<T> {
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        *self.get_ref()
    }

    pub fn get_ref(&self) -> &T {
        self.value.get_or_init(|| {
            let parsed = match std::env::var(self.env) {
                Ok(raw) => match T::from_str(&raw) {
                    Ok(value) => return value,
                    Err(_) => {
                        eprintln!(
                            "[dlnet] WARNING: could not parse \"{}\" for {}, using default \"{}\"",
                            raw, self.env, self.default
                        );
                        T::from_str(self.default)
                    }
                },
                Err(_) => T::from_str(self.default),
            };
            match parsed {
                Ok(value) => value,
                Err(_) => panic!("[dlnet] {}: invalid default value \"{}\"", self.env, self.default),
            }
        })
    }
}
