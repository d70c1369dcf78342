use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

mod error;
mod utils;

pub use error::{Error, Result};

/// The length of a short container id as printed by the kernel and `docker ps`.
pub const CONTAINER_ID_LEN: usize = 12;

/// `<prefix>-<index>-<friendly name>-<20 hex digit suffix>`, as generated by ECS-style
/// orchestrators (e.g. `ecs-billing-7-worker-c4e2b2d1a0f9e8d7c6b5`).
static FRIENDLY_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z-]+-[0-9]+-([a-zA-Z-]+)-[a-f0-9]{20}").expect("valid friendly name regex")
});

/// A validated short container identifier.
///
/// # Examples
///
/// ```
/// # use oom_exporter::container::ContainerID;
/// let container_id = ContainerID::new("abcdef012345").unwrap();
/// assert_eq!(container_id.as_ref(), "abcdef012345");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given short id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] unless the input is exactly
    /// [`CONTAINER_ID_LEN`] lowercase hex characters.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.len() != CONTAINER_ID_LEN || !utils::is_lowercase_hex(src.as_bytes()) {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    /// Creates a `ContainerID` from a full 64 character id by keeping its short prefix.
    ///
    /// # Examples
    ///
    /// ```
    /// # use oom_exporter::container::ContainerID;
    /// let full = "abcdef012345abcdef012345abcdef012345abcdef012345abcdef012345abcd";
    /// let id = ContainerID::from_full_id(full).unwrap();
    /// assert_eq!(id.as_ref(), "abcdef012345");
    /// ```
    pub fn from_full_id(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        match src.get(..CONTAINER_ID_LEN) {
            Some(short) => Self::new(short),
            None => Err(Error::InvalidContainerID(src.to_owned())),
        }
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a runtime name that does not follow the naming convention is handled.
///
/// The same policy applies to OOM events and to zero-fill passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamePolicy {
    /// Use the runtime name itself, without its leading `/`.
    #[default]
    Fallback,
    /// Reject the container.
    Strict,
}

impl NamePolicy {
    /// Derives the friendly name for a runtime-supplied container name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameMismatch`] if the name does not follow the convention and the
    /// policy is [`NamePolicy::Strict`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use oom_exporter::container::NamePolicy;
    /// let name = NamePolicy::Fallback
    ///     .friendly_name("/ecs-shop-3-checkout-aabbccddeeff00112233")
    ///     .unwrap();
    /// assert_eq!(&*name, "checkout");
    /// ```
    pub fn friendly_name(self, runtime_name: &str) -> Result<Arc<str>> {
        if let Some(friendly) = FRIENDLY_NAME_PATTERN
            .captures(runtime_name)
            .and_then(|captures| captures.get(1))
        {
            return Ok(friendly.as_str().into());
        }

        match self {
            NamePolicy::Fallback => {
                let raw = utils::trim_runtime_name(runtime_name);
                log::warn!(
                    "container name `{}` does not match the naming convention, using it as-is",
                    raw
                );
                Ok(raw.into())
            }
            NamePolicy::Strict => Err(Error::NameMismatch(runtime_name.to_owned())),
        }
    }
}
